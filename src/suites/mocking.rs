//! Suites that replace collaborators with recorders.

use crate::app::catalog::Suite;
use crate::demos::database::{
    Connection, Connector, Cursor, INSERT_USER, MemoryConnector, Statement, save_user,
};
use crate::demos::service::{ApiClient, UserService};
use crate::demos::weather::{HTTP_GET, WeatherError, get_weather, http_namespace};
use crate::domain::assertion::{assert_equal, assert_true, raises, raises_any};
use crate::domain::error::HarnessError;
use crate::domain::fixture::FixtureProvider;
use crate::domain::patch::Namespace;
use crate::domain::recorder::Recorder;
use serde_json::{Value, json};

// Recorders stand in for each link of the connect -> cursor -> execute chain.

impl Connector for Recorder {
    fn connect(&self, path: &str) -> anyhow::Result<Box<dyn Connection>> {
        self.call([json!(path)])?;
        Ok(Box::new(self.return_mock()))
    }
}

impl Connection for Recorder {
    fn cursor(&mut self) -> anyhow::Result<Box<dyn Cursor>> {
        self.call_method("cursor", ())?;
        Ok(Box::new(self.attr("cursor")?.return_mock()))
    }

    fn commit(&mut self) -> anyhow::Result<()> {
        self.call_method("commit", ())?;
        Ok(())
    }

    fn close(&mut self) -> anyhow::Result<()> {
        self.call_method("close", ())?;
        Ok(())
    }
}

impl Cursor for Recorder {
    fn execute(&mut self, sql: &str, params: &[Value]) -> anyhow::Result<()> {
        self.call_method("execute", [json!(sql), Value::Array(params.to_vec())])?;
        Ok(())
    }
}

impl ApiClient for Recorder {
    fn get_user_data(&self, user_id: i64) -> anyhow::Result<Value> {
        Ok(self.call_method("get_user_data", [json!(user_id)])?)
    }
}

pub fn function_suite() -> Suite {
    Suite::new("5-mocking/mocking-a-function/test_main.py")
        .fixture(FixtureProvider::new("http", |_| Ok(http_namespace())))
        .test("test_get_weather", &["http"], |ctx| {
            let http = ctx.fixture::<Namespace>("http")?.clone();
            let mock_get = ctx.mocker().patch(&http, HTTP_GET)?;
            mock_get.return_value(json!({
                "status_code": 200,
                "json": {"temp": 20, "condition": "Sunny"},
            }));

            let result = get_weather(&http, "London")?;

            assert_equal(result, json!({"temp": 20, "condition": "Sunny"}))?;
            mock_get.assert_called_once_with([json!("http://api.weatherapi.com/v1/London")])?;
            Ok(())
        })
        .test("test_get_weather_city_not_found", &["http"], |ctx| {
            let http = ctx.fixture::<Namespace>("http")?.clone();
            let mock_get = ctx.mocker().patch(&http, HTTP_GET)?;
            mock_get.return_value(json!({"status_code": 404, "json": null}));

            raises::<WeatherError>()
                .matching("City not found or API error")
                .check(|| get_weather(&http, "Atlantis"))?;
            mock_get.assert_called_once()?;
            Ok(())
        })
        .test("test_get_weather_spy_keeps_transport", &["http"], |ctx| {
            let http = ctx.fixture::<Namespace>("http")?.clone();
            let spy = ctx.mocker().spy(&http, HTTP_GET)?;

            raises::<WeatherError>().check(|| get_weather(&http, "Paris"))?;
            spy.assert_called_once_with([json!("http://api.weatherapi.com/v1/Paris")])?;
            Ok(())
        })
}

pub fn database_suite() -> Suite {
    Suite::new("5-mocking/mocking-a-database/test_db.py")
        .test("test_save_user_success", &[], |ctx| {
            let mock_conn = ctx.mocker().mock("sqlite3.connect");
            let conn = mock_conn.return_mock();
            let mock_cursor = conn.attr("cursor")?.return_mock();

            save_user(&mock_conn, "Alice", 30)?;

            mock_conn.assert_called_once_with([json!("users.db")])?;
            mock_cursor
                .attr("execute")?
                .assert_called_once_with([json!(INSERT_USER), json!(["Alice", 30])])?;
            conn.attr("commit")?.assert_called_once()?;
            conn.attr("close")?.assert_called_once()?;
            Ok(())
        })
        .test("test_save_user_database_error", &[], |ctx| {
            let mock_conn = ctx.mocker().mock("sqlite3.connect");
            let mock_cursor = mock_conn.return_mock().attr("cursor")?.return_mock();
            mock_cursor
                .attr("execute")?
                .side_effect(HarnessError::raised("Exception", "DB write failed"));

            raises_any()
                .matching("DB write failed")
                .check(|| save_user(&mock_conn, "Bob", 25))?;

            mock_conn.assert_called_once_with([json!("users.db")])?;
            mock_cursor.attr("execute")?.assert_called_once()?;
            mock_conn.return_mock().attr("commit")?.assert_not_called()?;
            Ok(())
        })
        .test("test_save_user_call_order", &[], |ctx| {
            let mock_conn = ctx.mocker().mock("sqlite3.connect");
            save_user(&mock_conn, "Carol", 41)?;

            let names: Vec<String> = mock_conn
                .mock_calls()
                .into_iter()
                .map(|(name, _)| name)
                .collect();
            assert_equal(
                names,
                vec![
                    "sqlite3.connect",
                    "sqlite3.connect().cursor",
                    "sqlite3.connect().cursor().execute",
                    "sqlite3.connect().commit",
                    "sqlite3.connect().close",
                ],
            )?;
            Ok(())
        })
        .fixture(FixtureProvider::new("memory_db", |_| Ok(MemoryConnector::new())))
        .test("test_save_user_against_memory_connector", &["memory_db"], |ctx| {
            let connector = ctx.fixture::<MemoryConnector>("memory_db")?;
            save_user(&*connector, "Dave", 52)?;

            assert_equal(
                connector.committed(),
                vec![Statement {
                    sql: INSERT_USER.to_string(),
                    params: vec![json!("Dave"), json!(52)],
                }],
            )?;
            Ok(())
        })
}

pub fn classes_suite() -> Suite {
    Suite::new("5-mocking/mocking-classes/test_service.py")
        .test("test_get_username", &[], |ctx| {
            let mock_api_client = ctx.mocker().mock_with_spec("APIClient", ["get_user_data"]);
            mock_api_client.configure("get_user_data", json!({"id": 1, "name": "John Doe"}))?;
            let user_service = UserService::new(mock_api_client.clone());

            let username = user_service.get_username(1)?;

            assert_equal(username.as_str(), "JOHN DOE")?;
            mock_api_client
                .attr("get_user_data")?
                .assert_called_once_with([json!(1)])?;
            Ok(())
        })
        .test("test_spec_rejects_unknown_method", &[], |ctx| {
            let mock_api_client = ctx.mocker().mock_with_spec("APIClient", ["get_user_data"]);
            match mock_api_client.attr("get_user") {
                Err(HarnessError::UnknownAttribute { attribute, .. }) => {
                    assert_equal(attribute.as_str(), "get_user")?;
                }
                other => assert_true(false, format!("expected UnknownAttribute, got {other:?}"))?,
            }
            Ok(())
        })
}
