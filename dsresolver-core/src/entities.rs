//! Data source entities: catalog records and resolved descriptors

use serde::{Deserialize, Serialize};

use crate::identity::{InternalId, TenantId, BUILTIN_DATASOURCE_UID};

/// A configured data source as reported by the catalog.
///
/// Records carry the owning tenant; the cache partitions them by `org_id`
/// before indexing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceRecord {
    pub org_id: TenantId,
    pub uid: String,
    pub name: String,
    #[serde(rename = "type")]
    pub plugin_type: String,
    pub internal_id: InternalId,
    #[serde(default)]
    pub is_default: bool,
}

impl DataSourceRecord {
    pub fn new(
        org_id: TenantId,
        uid: impl Into<String>,
        name: impl Into<String>,
        plugin_type: impl Into<String>,
        internal_id: InternalId,
    ) -> Self {
        Self {
            org_id,
            uid: uid.into(),
            name: name.into(),
            plugin_type: plugin_type.into(),
            internal_id,
            is_default: false,
        }
    }

    /// Mark this record as the tenant's default data source.
    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }
}

/// Resolved descriptor of a data source. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedDataSource {
    pub internal_id: InternalId,
    pub is_default: bool,
    pub name: String,
    #[serde(rename = "type")]
    pub plugin_type: String,
    pub uid: String,
    /// Whether `plugin_type` resolved to an installed plugin at refresh time.
    pub plugin_exists: bool,
}

impl ResolvedDataSource {
    /// Build a descriptor from a catalog record and the plugin lookup result.
    pub fn from_record(record: &DataSourceRecord, plugin_exists: bool) -> Self {
        Self {
            internal_id: record.internal_id,
            is_default: record.is_default,
            name: record.name.clone(),
            plugin_type: record.plugin_type.clone(),
            uid: record.uid.clone(),
            plugin_exists,
        }
    }
}

/// Fixed identity of the synthetic built-in data source injected into
/// every tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuiltinDataSource {
    pub uid: String,
    pub name: String,
    #[serde(rename = "type")]
    pub plugin_type: String,
}

impl BuiltinDataSource {
    pub fn new(uid: impl Into<String>) -> Self {
        let uid = uid.into();
        Self {
            name: uid.clone(),
            plugin_type: uid.clone(),
            uid,
        }
    }

    /// The descriptor filed into tenant indexes. Always reports an
    /// installed plugin and is never itself marked default.
    pub fn descriptor(&self) -> ResolvedDataSource {
        ResolvedDataSource {
            internal_id: 0,
            is_default: false,
            name: self.name.clone(),
            plugin_type: self.plugin_type.clone(),
            uid: self.uid.clone(),
            plugin_exists: true,
        }
    }
}

impl Default for BuiltinDataSource {
    fn default() -> Self {
        Self::new(BUILTIN_DATASOURCE_UID)
    }
}
