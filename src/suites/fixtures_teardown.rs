use crate::app::catalog::Suite;
use crate::demos::database::{DataBase, DbError};
use crate::domain::assertion::{assert_equal, raises};
use crate::domain::fixture::FixtureProvider;

pub fn suite() -> Suite {
    let db = FixtureProvider::new("db", |_| Ok(DataBase::new())).with_teardown(
        |db: &mut DataBase| {
            db.clear();
            Ok(())
        },
    );

    Suite::new("3-fixtures-teardown/test_db.py")
        .fixture(db)
        .test("test_add_user", &["db"], |ctx| {
            let db = ctx.fixture::<DataBase>("db")?;
            db.add_user(1, "Alice")?;
            assert_equal(db.get(1), Some("Alice"))?;
            Ok(())
        })
        .test("test_add_existing_user", &["db"], |ctx| {
            let db = ctx.fixture::<DataBase>("db")?;
            db.add_user(1, "Alice")?;
            raises::<DbError>()
                .matching("User ID already exists")
                .check(|| db.add_user(1, "Bob"))?;
            Ok(())
        })
        .test("test_delete_user", &["db"], |ctx| {
            let db = ctx.fixture::<DataBase>("db")?;
            db.add_user(1, "Alice")?;
            db.delete(1)?;
            assert_equal(db.get(1), None::<&str>)?;
            raises::<DbError>()
                .matching("User ID not found")
                .check(|| db.delete(1))?;
            Ok(())
        })
}
