use crate::app::catalog::Suite;
use crate::demos::users::{UserError, UserManager};
use crate::domain::assertion::{assert_equal, raises};
use crate::domain::fixture::FixtureProvider;

pub fn suite() -> Suite {
    Suite::new("2-fixtures-setup-example/test_main.py")
        .fixture(FixtureProvider::new("user_manager", |_| Ok(UserManager::new())))
        .test("test_add_user", &["user_manager"], |ctx| {
            let manager = ctx.fixture::<UserManager>("user_manager")?;
            assert_equal(manager.add_user("john_doe", "john@example.com")?, true)?;
            assert_equal(manager.get("john_doe"), Some("john@example.com"))?;
            Ok(())
        })
        .test("test_add_existing_user", &["user_manager"], |ctx| {
            let manager = ctx.fixture::<UserManager>("user_manager")?;
            manager.add_user("john_doe", "john@example.com")?;
            raises::<UserError>()
                .matching("User already exists")
                .check(|| manager.add_user("john_doe", "another@example.com"))?;
            Ok(())
        })
        .test("test_get_nonexistent_user", &["user_manager"], |ctx| {
            let manager = ctx.fixture::<UserManager>("user_manager")?;
            assert_equal(manager.get("nonexistent"), None::<&str>)?;
            Ok(())
        })
}
