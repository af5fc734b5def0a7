use crate::app::catalog::Suite;
use crate::demos::prime::is_prime;
use crate::domain::assertion::assert_equal;
use crate::domain::parametrize::Parametrize;
use serde_json::json;

pub fn suite() -> Suite {
    let cases = Parametrize::new("input,expected").cases([
        [json!(1), json!(false)],
        [json!(2), json!(true)],
        [json!(3), json!(true)],
        [json!(4), json!(false)],
        [json!(5), json!(true)],
        [json!(16), json!(false)],
        [json!(17), json!(true)],
        [json!(18), json!(false)],
        [json!(19), json!(true)],
        [json!(20), json!(false)],
        [json!(23), json!(true)],
        [json!(24), json!(false)],
        [json!(25), json!(false)],
    ]);

    Suite::new("4-parametrized-testing/test_main.py").parametrized(
        "test_is_prime",
        &[],
        cases,
        |ctx| {
            let input: i64 = ctx.param_as("input")?;
            let expected: bool = ctx.param_as("expected")?;
            assert_equal(is_prime(input), expected)?;
            Ok(())
        },
    )
}
