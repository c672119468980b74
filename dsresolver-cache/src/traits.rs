//! Collaborator traits consumed by the resolution cache.
//!
//! The cache only mirrors what these report. Implementations are injected
//! at construction time and must be safe to share across tasks.

use async_trait::async_trait;
use dsresolver_core::{CatalogError, DataSourceRecord};

/// Authoritative source of configured data sources across all tenants.
///
/// # Implementation Requirements
///
/// - Return every data source of every tenant in one call
/// - Report transport or storage failures as [`CatalogError::Unavailable`]
/// - Respect cancellation: the cache drops the future when its timeout fires
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// List all data sources, across all tenants.
    async fn list_all_data_sources(&self) -> Result<Vec<DataSourceRecord>, CatalogError>;
}

/// Answers whether a plugin implementation for a type is registered.
///
/// A missing plugin is a normal `false`, never an error.
#[async_trait]
pub trait PluginRegistry: Send + Sync {
    async fn exists(&self, plugin_type: &str) -> bool;
}

#[async_trait]
impl<T: CatalogSource + ?Sized> CatalogSource for std::sync::Arc<T> {
    async fn list_all_data_sources(&self) -> Result<Vec<DataSourceRecord>, CatalogError> {
        (**self).list_all_data_sources().await
    }
}

#[async_trait]
impl<T: PluginRegistry + ?Sized> PluginRegistry for std::sync::Arc<T> {
    async fn exists(&self, plugin_type: &str) -> bool {
        (**self).exists(plugin_type).await
    }
}
