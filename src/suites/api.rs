use crate::app::catalog::Suite;
use crate::demos::api::{SharedStore, TestClient};
use crate::domain::assertion::assert_equal;
use crate::domain::fixture::{FixtureProvider, Scope};
use serde_json::json;

pub fn suite() -> Suite {
    let user_store = FixtureProvider::new("user_store", |_| Ok(SharedStore::new()))
        .scope(Scope::Session)
        .with_teardown(|store: &mut SharedStore| {
            store.lock().clear();
            Ok(())
        });
    let client = FixtureProvider::new("client", |req| {
        TestClient::new(req.get::<SharedStore>("user_store")?.clone())
    })
    .depends_on(["user_store"]);

    Suite::new("6-example-testing-an-api/test_api.py")
        .fixture(user_store)
        .fixture(client)
        .test("test_add_user", &["client"], |ctx| {
            let client = ctx.fixture::<TestClient>("client")?;
            let response = client.post_json(
                "/users",
                &json!({"name": "John Doe", "email": "john@email.com"}),
            )?;
            assert_equal(response.status, 201_u16)?;
            let id = response.json["id"].clone();
            assert_equal(
                response.json,
                json!({"id": id, "name": "John Doe", "email": "john@email.com"}),
            )?;
            Ok(())
        })
        .test("test_get_user", &["client"], |ctx| {
            let client = ctx.fixture::<TestClient>("client")?;
            let created = client.post_json(
                "/users",
                &json!({"name": "Bob Leck", "email": "bob@test.com"}),
            )?;
            let id = created.json["id"].clone();
            let response = client.get(&format!("/users/{id}"))?;
            assert_equal(response.status, 200_u16)?;
            assert_equal(
                response.json,
                json!({"id": id, "name": "Bob Leck", "email": "bob@test.com"}),
            )?;
            Ok(())
        })
        .test("test_get_user_not_found", &["client"], |ctx| {
            let client = ctx.fixture::<TestClient>("client")?;
            let response = client.get("/users/999")?;
            assert_equal(response.status, 404_u16)?;
            assert_equal(response.json, json!({"error": "User not found"}))?;
            Ok(())
        })
        .test("test_add_invalid_user", &["client"], |ctx| {
            let client = ctx.fixture::<TestClient>("client")?;
            let response = client.post_json("/users", &json!({"name": "Jane Doe"}))?;
            assert_equal(response.status, 400_u16)?;
            assert_equal(response.json, json!({"error": "Invalid input"}))?;
            Ok(())
        })
}
