//! In-memory user table plus the ports a SQL-backed store is written against.

use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DbError {
    #[error("User ID already exists")]
    IdExists,
    #[error("User ID not found")]
    IdNotFound,
    #[error("connection is closed")]
    Closed,
}

/// User names keyed by id.
#[derive(Debug, Default)]
pub struct DataBase {
    data: BTreeMap<i64, String>,
}

impl DataBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&mut self, user_id: i64, name: &str) -> Result<(), DbError> {
        if self.data.contains_key(&user_id) {
            return Err(DbError::IdExists);
        }
        self.data.insert(user_id, name.to_string());
        Ok(())
    }

    pub fn get(&self, user_id: i64) -> Option<&str> {
        self.data.get(&user_id).map(String::as_str)
    }

    pub fn delete(&mut self, user_id: i64) -> Result<(), DbError> {
        self.data.remove(&user_id).map(|_| ()).ok_or(DbError::IdNotFound)
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

pub const USERS_DB: &str = "users.db";
pub const INSERT_USER: &str = "INSERT INTO users (name, age) VALUES (?, ?)";

pub trait Connector {
    fn connect(&self, path: &str) -> anyhow::Result<Box<dyn Connection>>;
}

pub trait Connection {
    fn cursor(&mut self) -> anyhow::Result<Box<dyn Cursor>>;
    fn commit(&mut self) -> anyhow::Result<()>;
    fn close(&mut self) -> anyhow::Result<()>;
}

pub trait Cursor {
    fn execute(&mut self, sql: &str, params: &[Value]) -> anyhow::Result<()>;
}

/// Insert one user row and commit.
pub fn save_user(connector: &dyn Connector, name: &str, age: u32) -> anyhow::Result<()> {
    let mut conn = connector.connect(USERS_DB)?;
    let mut cursor = conn.cursor()?;
    cursor.execute(INSERT_USER, &[json!(name), json!(age)])?;
    conn.commit()?;
    conn.close()
}

/// A statement and its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

type Log = Arc<Mutex<Vec<Statement>>>;

/// Connector that keeps committed statements in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    committed: Log,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn committed(&self) -> Vec<Statement> {
        self.committed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Connector for MemoryConnector {
    fn connect(&self, _path: &str) -> anyhow::Result<Box<dyn Connection>> {
        Ok(Box::new(MemoryConnection {
            committed: self.committed.clone(),
            pending: Arc::default(),
            open: true,
        }))
    }
}

struct MemoryConnection {
    committed: Log,
    pending: Log,
    open: bool,
}

impl Connection for MemoryConnection {
    fn cursor(&mut self) -> anyhow::Result<Box<dyn Cursor>> {
        if !self.open {
            return Err(DbError::Closed.into());
        }
        Ok(Box::new(MemoryCursor {
            pending: self.pending.clone(),
        }))
    }

    fn commit(&mut self) -> anyhow::Result<()> {
        if !self.open {
            return Err(DbError::Closed.into());
        }
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        self.committed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .append(&mut pending);
        Ok(())
    }

    fn close(&mut self) -> anyhow::Result<()> {
        self.open = false;
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }
}

struct MemoryCursor {
    pending: Log,
}

impl Cursor for MemoryCursor {
    fn execute(&mut self, sql: &str, params: &[Value]) -> anyhow::Result<()> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Statement {
                sql: sql.to_string(),
                params: params.to_vec(),
            });
        Ok(())
    }
}
