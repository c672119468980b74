//! DSRESOLVER Core - Data Types
//!
//! Pure data structures shared by the resolution cache and its collaborators.
//! This crate contains ONLY data types, errors and configuration - the cache
//! itself lives in `dsresolver-cache`.

pub mod config;
pub mod context;
pub mod entities;
pub mod error;
pub mod identity;

pub use config::{ResolverConfig, DEFAULT_CATALOG_TIMEOUT, DEFAULT_STALENESS_WINDOW};
pub use context::RequestContext;
pub use entities::{BuiltinDataSource, DataSourceRecord, ResolvedDataSource};
pub use error::{CatalogError, ConfigError, ResolveError, ResolveResult};
pub use identity::{
    InternalId, TenantId, Timestamp, BUILTIN_DATASOURCE_UID, DEFAULT_KEY, EMPTY_KEY,
};
