//! Resolution cache: bounded-staleness lookups over catalog snapshots.
//!
//! Lookups read the published [`CacheSnapshot`] under a shared lock. When the
//! snapshot is missing, invalidated or older than the staleness window, the
//! lookup first runs a refresh, which is serialized by a single async mutex.
//!
//! # Refresh guard
//!
//! A refresh records the snapshot stamp (build time and generation) it saw
//! *before* waiting for the refresh mutex and compares it with the live stamp
//! once the mutex is held. If they differ another caller already rebuilt
//! while this one waited, and the rebuild is skipped. The stale check, the
//! catalog query, the build and the publish all happen inside the one
//! critical section; readers never observe a partially built snapshot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dsresolver_core::{
    CatalogError, DataSourceRecord, RequestContext, ResolveError, ResolveResult,
    ResolvedDataSource, ResolverConfig, TenantId, Timestamp,
};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::resolution::Resolution;
use crate::snapshot::CacheSnapshot;
use crate::stats::{ResolverStats, StatsRecorder};
use crate::traits::{CatalogSource, PluginRegistry};

/// Build time and generation of a published snapshot.
type SnapshotStamp = Option<(Timestamp, u64)>;

fn stamp_of(snapshot: Option<&CacheSnapshot>) -> SnapshotStamp {
    snapshot.map(|s| (s.built_at(), s.generation()))
}

/// What a refresh call ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new snapshot was built and published.
    Rebuilt,
    /// Another caller published a snapshot while this one waited.
    AlreadyRefreshed,
}

/// Per-tenant data source resolution cache.
///
/// # Type Parameters
///
/// - `C`: catalog source listing all data sources
/// - `P`: plugin registry answering whether a plugin type is installed
/// - `K`: clock used for build timestamps and staleness
///
/// # Example
///
/// ```ignore
/// let cache = ResolutionCache::with_defaults(catalog, plugins);
///
/// let ds = cache.resolve(1, "Prometheus").await?;
/// let default_ds = cache.resolve_in(&ctx, "").await?;
/// ```
pub struct ResolutionCache<C, P, K = SystemClock>
where
    C: CatalogSource,
    P: PluginRegistry,
    K: Clock,
{
    catalog: Arc<C>,
    plugins: Arc<P>,
    clock: Arc<K>,
    config: ResolverConfig,
    /// Published snapshot. `None` until the first successful refresh.
    snapshot: RwLock<Option<Arc<CacheSnapshot>>>,
    /// Serializes refreshes.
    refresh_lock: Mutex<()>,
    /// Bumped by `invalidate`.
    invalidations: AtomicU64,
    /// Highest invalidation count covered by the published snapshot. Only
    /// advanced after a successful publish.
    applied_invalidations: AtomicU64,
    stats: StatsRecorder,
}

impl<C, P> ResolutionCache<C, P, SystemClock>
where
    C: CatalogSource,
    P: PluginRegistry,
{
    /// Create a cache on the system clock with default configuration.
    pub fn with_defaults(catalog: Arc<C>, plugins: Arc<P>) -> Self {
        Self::new(catalog, plugins, Arc::new(SystemClock), ResolverConfig::default())
    }

    /// Create a cache on the system clock.
    pub fn with_config(catalog: Arc<C>, plugins: Arc<P>, config: ResolverConfig) -> Self {
        Self::new(catalog, plugins, Arc::new(SystemClock), config)
    }
}

impl<C, P, K> ResolutionCache<C, P, K>
where
    C: CatalogSource,
    P: PluginRegistry,
    K: Clock,
{
    /// Create a new resolution cache. The cache starts empty; the first
    /// lookup populates it.
    pub fn new(catalog: Arc<C>, plugins: Arc<P>, clock: Arc<K>, config: ResolverConfig) -> Self {
        Self {
            catalog,
            plugins,
            clock,
            config,
            snapshot: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            invalidations: AtomicU64::new(0),
            applied_invalidations: AtomicU64::new(0),
            stats: StatsRecorder::default(),
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve an identifier for the tenant carried by `ctx`.
    pub async fn resolve_in(
        &self,
        ctx: &RequestContext,
        identifier: &str,
    ) -> ResolveResult<Arc<ResolvedDataSource>> {
        self.resolve(ctx.tenant_id(), identifier).await
    }

    /// Resolve a uid, name, stringified internal id, `""` or `"default"`
    /// within a tenant.
    ///
    /// A failed refresh does not fail the lookup; the previous snapshot is
    /// served and the failure is logged.
    pub async fn resolve(
        &self,
        tenant_id: TenantId,
        identifier: &str,
    ) -> ResolveResult<Arc<ResolvedDataSource>> {
        let resolution = self.resolve_detailed(tenant_id, identifier).await?;
        if let Some(err) = resolution.refresh_error() {
            warn!(
                tenant_id,
                identifier,
                error = %err,
                built_at = %resolution.built_at(),
                "Serving data source from stale snapshot"
            );
        }
        Ok(resolution.into_value())
    }

    /// Like [`ResolutionCache::resolve`], but returns the snapshot metadata
    /// and any refresh failure alongside the descriptor.
    pub async fn resolve_detailed(
        &self,
        tenant_id: TenantId,
        identifier: &str,
    ) -> ResolveResult<Resolution> {
        let mut refresh_error = None;
        let mut refreshed = false;

        let current = self.current().await;
        if self.is_stale(current.as_deref()) {
            match self.refresh_from(stamp_of(current.as_deref())).await {
                Ok(outcome) => refreshed = outcome == RefreshOutcome::Rebuilt,
                Err(err) => refresh_error = Some(err),
            }
        }

        let Some(snapshot) = self.current().await else {
            self.stats.record_lookup(false);
            return Err(ResolveError::TenantNotFound {
                tenant_id,
                refresh_error,
            });
        };

        match snapshot.lookup(tenant_id, identifier) {
            Some(ds) => {
                self.stats.record_lookup(true);
                debug!(tenant_id, identifier, uid = %ds.uid, "Resolved data source");
                Ok(Resolution::new(
                    Arc::clone(ds),
                    snapshot.built_at(),
                    refreshed,
                    refresh_error,
                ))
            }
            None => {
                self.stats.record_lookup(false);
                debug!(tenant_id, identifier, "Data source not found");
                Err(ResolveError::IdentifierNotFound {
                    tenant_id,
                    identifier: identifier.to_string(),
                    refresh_error,
                })
            }
        }
    }

    /// Rebuild the snapshot from the catalog.
    ///
    /// Returns [`RefreshOutcome::AlreadyRefreshed`] without querying the
    /// catalog if another refresh completed while this call waited. On
    /// catalog failure the previous snapshot stays published.
    pub async fn refresh(&self) -> Result<RefreshOutcome, CatalogError> {
        let observed = stamp_of(self.current().await.as_deref());
        self.refresh_from(observed).await
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn refresh_from(&self, observed: SnapshotStamp) -> Result<RefreshOutcome, CatalogError> {
        let _guard = self.refresh_lock.lock().await;

        let live = self.current().await;
        if stamp_of(live.as_deref()) != observed {
            self.stats.record_skipped_refresh();
            debug!("Snapshot refreshed while waiting, skipping rebuild");
            return Ok(RefreshOutcome::AlreadyRefreshed);
        }

        // Invalidations after this point stay pending for the next refresh.
        let covered = self.invalidations.load(Ordering::Acquire);

        let records = match self.list_records().await {
            Ok(records) => records,
            Err(err) => {
                self.stats.record_refresh_failure();
                warn!(
                    error = %err,
                    has_snapshot = live.is_some(),
                    "Catalog refresh failed, keeping previous snapshot"
                );
                return Err(err);
            }
        };

        let record_count = records.len();
        let generation = live.as_ref().map_or(1, |s| s.generation() + 1);
        let snapshot = CacheSnapshot::build(
            records,
            self.plugins.as_ref(),
            &self.config.builtin,
            self.clock.now(),
            generation,
        )
        .await;

        info!(
            records = record_count,
            tenants = snapshot.tenant_count(),
            entries = snapshot.entry_count(),
            generation,
            "Published data source snapshot"
        );

        let mut published = self.snapshot.write().await;
        *published = Some(Arc::new(snapshot));
        self.applied_invalidations.fetch_max(covered, Ordering::AcqRel);
        drop(published);
        self.stats.record_refresh();
        Ok(RefreshOutcome::Rebuilt)
    }

    async fn list_records(&self) -> Result<Vec<DataSourceRecord>, CatalogError> {
        match self.config.catalog_timeout {
            Some(timeout) => {
                tokio::time::timeout(timeout, self.catalog.list_all_data_sources())
                    .await
                    .map_err(|_| CatalogError::Timeout { timeout })?
            }
            None => self.catalog.list_all_data_sources().await,
        }
    }

    /// Mark the snapshot stale. It keeps serving until the next lookup
    /// refreshes it.
    ///
    /// The mark is only cleared by a published rebuild; a refresh that fails
    /// or is cancelled leaves it in place.
    pub fn invalidate(&self) {
        self.invalidations.fetch_add(1, Ordering::AcqRel);
        debug!("Data source snapshot invalidated");
    }

    /// The currently published snapshot, if any.
    pub async fn snapshot(&self) -> Option<Arc<CacheSnapshot>> {
        self.current().await
    }

    pub async fn stats(&self) -> ResolverStats {
        let current = self.current().await;
        self.stats.snapshot(
            current.as_ref().map_or(0, |s| s.tenant_count()),
            current.as_ref().map(|s| s.built_at()),
        )
    }

    async fn current(&self) -> Option<Arc<CacheSnapshot>> {
        self.snapshot.read().await.clone()
    }

    fn is_stale(&self, snapshot: Option<&CacheSnapshot>) -> bool {
        let Some(snapshot) = snapshot else {
            return true;
        };
        if self.invalidations.load(Ordering::Acquire)
            > self.applied_invalidations.load(Ordering::Acquire)
        {
            return true;
        }
        // Strictly older than the window; a clock that moved backwards
        // never counts as stale.
        self.clock
            .now()
            .signed_duration_since(snapshot.built_at())
            .to_std()
            .map(|age| age > self.config.staleness_window)
            .unwrap_or(false)
    }
}
