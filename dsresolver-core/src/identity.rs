//! Identity types for tenants and data sources

use chrono::{DateTime, Utc};

/// Tenant (organization) identifier. All lookups are partitioned by it.
pub type TenantId = i64;

/// Tenant-scoped numeric identifier assigned by the catalog.
pub type InternalId = i64;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Uid, name and plugin type of the synthetic built-in data source.
pub const BUILTIN_DATASOURCE_UID: &str = "grafana";

/// Lookup key that always resolves to the tenant's default data source.
pub const EMPTY_KEY: &str = "";

/// Literal alias for the tenant's default data source.
pub const DEFAULT_KEY: &str = "default";
