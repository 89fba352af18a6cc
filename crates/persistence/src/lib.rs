#![deny(warnings)]

//! Persistence layer: record stores and name-pool sources.
//!
//! The generation engine only talks to the [`RecordStore`] and
//! [`NamePoolProvider`] traits. [`SqliteStore`] backs them with `sqlx`
//! behind a private current-thread runtime so callers stay synchronous;
//! [`MemoryStore`] keeps rows in memory for dry runs and tests.

use roster_core::{ConfigError, NamePool, PlayerRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

mod memory;
mod names;
mod sqlite;

pub use memory::MemoryStore;
pub use names::{load_name_file, YamlNamePool};
pub use sqlite::{
    init_db, insert_player, insert_players, load_name_texts, load_players, seed_name_pool,
    SqliteStore,
};

/// Returns the default SQLite URL used for local saves.
pub fn default_sqlite_url() -> &'static str {
    "sqlite://./saves/roster.db"
}

/// Errors raised by stores.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("schema migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// A stored row could not be mapped back to a record.
    #[error("corrupt row: {0}")]
    Corrupt(String),
    /// The store refused the write (injected failure in [`MemoryStore`]).
    #[error("write rejected: {0}")]
    Rejected(String),
}

/// What a store reports back from a multi-row insert.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsertOutcome {
    /// One identity per inserted row, in insertion order.
    Ids(Vec<i64>),
    /// Only the number of affected rows.
    Affected(u64),
}

impl InsertOutcome {
    /// Number of rows the outcome accounts for.
    pub fn rows(&self) -> u64 {
        match self {
            InsertOutcome::Ids(ids) => ids.len() as u64,
            InsertOutcome::Affected(n) => *n,
        }
    }
}

/// Whether a store hands identities back from multi-row inserts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityReturn {
    #[default]
    Ids,
    AffectedCount,
}

/// Destination for generated records.
pub trait RecordStore {
    /// Insert one record and return its store-assigned identity.
    fn insert_one(&mut self, record: &PlayerRecord) -> Result<i64, PersistenceError>;

    /// Insert `records` as one committed unit.
    fn insert_many(&mut self, records: &[PlayerRecord]) -> Result<InsertOutcome, PersistenceError>;
}

impl<S: RecordStore + ?Sized> RecordStore for &mut S {
    fn insert_one(&mut self, record: &PlayerRecord) -> Result<i64, PersistenceError> {
        (**self).insert_one(record)
    }

    fn insert_many(&mut self, records: &[PlayerRecord]) -> Result<InsertOutcome, PersistenceError> {
        (**self).insert_many(records)
    }
}

impl<S: RecordStore + ?Sized> RecordStore for Box<S> {
    fn insert_one(&mut self, record: &PlayerRecord) -> Result<i64, PersistenceError> {
        (**self).insert_one(record)
    }

    fn insert_many(&mut self, records: &[PlayerRecord]) -> Result<InsertOutcome, PersistenceError> {
        (**self).insert_many(records)
    }
}

/// Source of first/last name lists.
pub trait NamePoolProvider {
    /// Load a validated pool; fails if either list is empty.
    fn load(&self) -> Result<NamePool, ConfigError>;
}

impl NamePoolProvider for NamePool {
    fn load(&self) -> Result<NamePool, ConfigError> {
        Ok(self.clone())
    }
}

impl<P: NamePoolProvider + ?Sized> NamePoolProvider for &P {
    fn load(&self) -> Result<NamePool, ConfigError> {
        (**self).load()
    }
}

impl<P: NamePoolProvider + ?Sized> NamePoolProvider for Arc<P> {
    fn load(&self) -> Result<NamePool, ConfigError> {
        (**self).load()
    }
}
