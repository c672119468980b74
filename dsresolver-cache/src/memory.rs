//! In-memory collaborators.
//!
//! Uses tokio::sync::RwLock for safe async access. Suitable for tests and
//! for embedders whose catalog is already held in process.

use std::collections::HashSet;

use async_trait::async_trait;
use dsresolver_core::{CatalogError, DataSourceRecord, TenantId};
use tokio::sync::RwLock;

use crate::traits::{CatalogSource, PluginRegistry};

/// Catalog backed by a replaceable list of records.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    records: RwLock<Vec<DataSourceRecord>>,
}

impl InMemoryCatalog {
    pub fn new(records: Vec<DataSourceRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    /// Load records from a JSON array, e.g.
    /// `[{"org_id":1,"uid":"abc","name":"Prometheus","type":"prometheus","internal_id":7,"is_default":true}]`.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let records: Vec<DataSourceRecord> = serde_json::from_str(json)?;
        Ok(Self::new(records))
    }

    /// Replace the full record list. Visible to the next refresh.
    pub async fn replace(&self, records: Vec<DataSourceRecord>) {
        *self.records.write().await = records;
    }

    pub async fn push(&self, record: DataSourceRecord) {
        self.records.write().await.push(record);
    }

    /// Remove every record with the given uid in the given tenant.
    pub async fn remove(&self, org_id: TenantId, uid: &str) -> usize {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| !(r.org_id == org_id && r.uid == uid));
        before - records.len()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl CatalogSource for InMemoryCatalog {
    async fn list_all_data_sources(&self) -> Result<Vec<DataSourceRecord>, CatalogError> {
        Ok(self.records.read().await.clone())
    }
}

/// Plugin registry backed by a set of installed plugin types.
#[derive(Debug, Default)]
pub struct InMemoryPluginRegistry {
    installed: RwLock<HashSet<String>>,
}

impl InMemoryPluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plugins<I, S>(plugin_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            installed: RwLock::new(plugin_types.into_iter().map(Into::into).collect()),
        }
    }

    /// Returns true if the type was not registered before.
    pub async fn register(&self, plugin_type: impl Into<String>) -> bool {
        self.installed.write().await.insert(plugin_type.into())
    }

    /// Returns true if the type was registered.
    pub async fn unregister(&self, plugin_type: &str) -> bool {
        self.installed.write().await.remove(plugin_type)
    }
}

#[async_trait]
impl PluginRegistry for InMemoryPluginRegistry {
    async fn exists(&self, plugin_type: &str) -> bool {
        self.installed.read().await.contains(plugin_type)
    }
}
