//! In-memory [`MapStore`] for tests and dry runs.
//!
//! Clones share state, so a test can hand one clone to the code under test
//! and inspect another afterwards. Every trait call bumps a counter.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::{MapRecord, MapSummary};

use super::MapStore;

#[derive(Clone, Default)]
pub struct InMemoryMapStore {
    records: Arc<RwLock<HashMap<String, MapRecord>>>,
    calls: Arc<AtomicUsize>,
}

impl InMemoryMapStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of [`MapStore`] calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory store lock poisoned")
}

#[async_trait]
impl MapStore for InMemoryMapStore {
    async fn find_by_name(&self, name: &str) -> Result<Option<MapRecord>> {
        self.touch();
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.get(name).cloned())
    }

    async fn save(&self, record: &MapRecord) -> Result<()> {
        self.touch();
        let mut records = self.records.write().map_err(poisoned)?;
        let mut stored = record.clone();
        if let Some(existing) = records.get(&record.name) {
            stored.id = existing.id.clone();
        }
        records.insert(record.name.clone(), stored);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<MapSummary>> {
        self.touch();
        let records = self.records.read().map_err(poisoned)?;
        let mut summaries: Vec<MapSummary> = records
            .values()
            .map(|r| MapSummary {
                name: r.name.clone(),
                description: r.description.clone(),
                modified: r.modified.timestamp(),
                width: r.width,
                height: r.height,
                resolution: r.resolution,
                has_image: r.image.is_some(),
                has_pbstream: r.pbstream.is_some(),
                has_node_graph: r.node_graph.is_some(),
                has_area_tree: r.area_tree.is_some(),
                zone_count: r.zones.len() as i64,
            })
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(summaries)
    }

    async fn count(&self) -> Result<i64> {
        self.touch();
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.len() as i64)
    }
}
