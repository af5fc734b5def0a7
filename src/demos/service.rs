use crate::demos::weather::HTTP_GET;
use crate::domain::patch::Namespace;
use serde_json::{Value, json};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("HTTP error {0}")]
    Status(u64),
    #[error("user data has no name")]
    MissingName,
}

pub trait ApiClient {
    fn get_user_data(&self, user_id: i64) -> anyhow::Result<Value>;
}

/// Fetches users over the namespace-bound HTTP GET.
#[derive(Debug, Clone)]
pub struct HttpApiClient {
    namespace: Namespace,
}

impl HttpApiClient {
    pub fn new(namespace: Namespace) -> Self {
        Self { namespace }
    }
}

impl ApiClient for HttpApiClient {
    fn get_user_data(&self, user_id: i64) -> anyhow::Result<Value> {
        let url = format!("https://api.example.com/users/{user_id}");
        let response = self.namespace.call(HTTP_GET, [json!(url)])?;
        match response["status_code"].as_u64() {
            Some(200) => Ok(response["json"].clone()),
            status => Err(ServiceError::Status(status.unwrap_or_default()).into()),
        }
    }
}

pub struct UserService<C> {
    client: C,
}

impl<C: ApiClient> UserService<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Upper-cased display name of `user_id`.
    pub fn get_username(&self, user_id: i64) -> anyhow::Result<String> {
        let data = self.client.get_user_data(user_id)?;
        let name = data["name"].as_str().ok_or(ServiceError::MissingName)?;
        Ok(name.to_uppercase())
    }
}
