use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UserError {
    #[error("User already exists")]
    AlreadyExists,
}

/// Usernames mapped to email addresses, in memory.
#[derive(Debug, Default)]
pub struct UserManager {
    users: HashMap<String, String>,
}

impl UserManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&mut self, username: &str, email: &str) -> Result<bool, UserError> {
        if self.users.contains_key(username) {
            return Err(UserError::AlreadyExists);
        }
        self.users.insert(username.to_string(), email.to_string());
        Ok(true)
    }

    pub fn get(&self, username: &str) -> Option<&str> {
        self.users.get(username).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
