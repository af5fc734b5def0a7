use crate::app::catalog::Suite;
use crate::demos::arith::{ArithError, add, classify_temperature, divide};
use crate::domain::assertion::{assert_equal, raises};

pub fn suite() -> Suite {
    Suite::new("1-simple-functions-example/test_main.py")
        .test("test_get_weather", &[], |_| {
            assert_equal(classify_temperature(25.0), "Hot")?;
            assert_equal(classify_temperature(15.0), "Cold")?;
            assert_equal(classify_temperature(20.0), "Cold")?;
            assert_equal(classify_temperature(21.0), "Hot")?;
            Ok(())
        })
        .test("test_add", &[], |_| {
            assert_equal(add(2, 3), 5)?;
            assert_equal(add(-1, 1), 0)?;
            assert_equal(add(-1, -1), -2)?;
            Ok(())
        })
        .test("test_divide", &[], |_| {
            assert_equal(divide(6.0, 3.0)?, 2.0)?;
            assert_equal(divide(5.0, 2.0)?, 2.5)?;
            raises::<ArithError>()
                .matching("Cannot divide by zero")
                .check(|| divide(10.0, 0.0))?;
            Ok(())
        })
}
