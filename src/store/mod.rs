//! Storage abstraction for map records.
//!
//! The [`MapStore`] trait is the only way the commit path touches the
//! database. [`SqliteMapStore`](sqlite::SqliteMapStore) is the production
//! backend; [`InMemoryMapStore`](memory::InMemoryMapStore) backs tests and
//! counts every call made against it.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{MapRecord, MapSummary};

/// Abstract map storage backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`find_by_name`](MapStore::find_by_name) | Look a record up by its unique name |
/// | [`save`](MapStore::save) | Insert or fully overwrite a record, zones included |
/// | [`list`](MapStore::list) | Summaries of every stored map |
/// | [`count`](MapStore::count) | Number of stored maps |
#[async_trait]
pub trait MapStore: Send + Sync {
    async fn find_by_name(&self, name: &str) -> Result<Option<MapRecord>>;

    /// Persist `record` in one step. An existing record with the same name
    /// keeps its id and is replaced field by field.
    async fn save(&self, record: &MapRecord) -> Result<()>;

    async fn list(&self) -> Result<Vec<MapSummary>>;

    async fn count(&self) -> Result<i64>;
}
