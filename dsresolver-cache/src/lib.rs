//! Data source resolution cache.
//!
//! Maps caller-supplied identifiers (uid, name, stringified internal id,
//! `""` or `"default"`) to a [`ResolvedDataSource`] within a tenant. The
//! cache mirrors an external catalog, rebuilt wholesale once the published
//! snapshot is older than the staleness window.
//!
//! # Collaborators
//!
//! - [`CatalogSource`]: lists every configured data source of every tenant
//! - [`PluginRegistry`]: says whether a plugin type is installed
//! - [`Clock`]: supplies build timestamps and drives staleness
//!
//! All three are injected at construction; the cache holds no global state.
//!
//! # Example
//!
//! ```ignore
//! let cache = ResolutionCache::with_defaults(
//!     Arc::new(InMemoryCatalog::new(records)),
//!     Arc::new(InMemoryPluginRegistry::with_plugins(["prometheus"])),
//! );
//!
//! // Identifier lookups within tenant 1
//! let by_uid = cache.resolve(1, "abc").await?;
//! let by_name = cache.resolve(1, "Prometheus").await?;
//! let default_ds = cache.resolve(1, "").await?;
//!
//! // Stale snapshots are still served when the catalog is down
//! let read = cache.resolve_detailed(1, "abc").await?;
//! if read.is_degraded() {
//!     tracing::warn!("catalog unavailable, serving cached descriptor");
//! }
//! ```

pub mod clock;
pub mod memory;
pub mod resolution;
pub mod resolver;
pub mod snapshot;
pub mod stats;
pub mod telemetry;
pub mod traits;

pub use clock::{Clock, SystemClock};
pub use memory::{InMemoryCatalog, InMemoryPluginRegistry};
pub use resolution::Resolution;
pub use resolver::{RefreshOutcome, ResolutionCache};
pub use snapshot::{CacheSnapshot, TenantIndex};
pub use stats::ResolverStats;
pub use telemetry::{init_tracing, TelemetryConfig, TelemetryError};
pub use traits::{CatalogSource, PluginRegistry};

pub use dsresolver_core::{
    BuiltinDataSource, CatalogError, DataSourceRecord, RequestContext, ResolveError,
    ResolveResult, ResolvedDataSource, ResolverConfig, TenantId,
};
