use crate::domain::patch::Namespace;
use serde_json::{Value, json};
use thiserror::Error;

/// Namespace path of the HTTP GET collaborator.
pub const HTTP_GET: &str = "requests.get";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WeatherError {
    #[error("City not found or API error")]
    NotFound,
}

/// Namespace with an offline HTTP transport bound at [`HTTP_GET`]. Every
/// request answers 503; tests patch the binding.
pub fn http_namespace() -> Namespace {
    let namespace = Namespace::new();
    namespace.define(HTTP_GET, |_| Ok(json!({ "status_code": 503, "json": null })));
    namespace
}

/// Fetch weather data for `city`. Responses are `{"status_code", "json"}` objects.
pub fn get_weather(namespace: &Namespace, city: &str) -> anyhow::Result<Value> {
    let response = namespace.call(HTTP_GET, [json!(format!("http://api.weatherapi.com/v1/{city}"))])?;
    if response["status_code"] == 200 {
        Ok(response["json"].clone())
    } else {
        Err(WeatherError::NotFound.into())
    }
}
