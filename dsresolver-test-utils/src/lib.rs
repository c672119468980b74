//! DSRESOLVER Test Utilities
//!
//! Centralized test infrastructure for the resolver workspace:
//! - Scriptable catalog and plugin registry doubles that count calls
//! - A manual clock for crossing the staleness window deterministically
//! - Proptest generators for catalog records
//! - Fixtures and assertions for common scenarios

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

// Re-export the types tests reach for most
pub use dsresolver_cache::{
    CacheSnapshot, CatalogSource, Clock, InMemoryCatalog, InMemoryPluginRegistry,
    PluginRegistry, RefreshOutcome, Resolution, ResolutionCache, ResolverStats, TenantIndex,
};
pub use dsresolver_core::{
    BuiltinDataSource, CatalogError, DataSourceRecord, RequestContext, ResolveError,
    ResolveResult, ResolvedDataSource, ResolverConfig, TenantId, Timestamp,
    BUILTIN_DATASOURCE_UID, DEFAULT_KEY,
};

// ============================================================================
// CLOCK
// ============================================================================

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    /// Start at the current system time.
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn starting_at(now: Timestamp) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        let delta = chrono::Duration::from_std(by).unwrap_or(chrono::Duration::MAX);
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += delta;
    }

    pub fn set(&self, to: Timestamp) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ============================================================================
// MOCK COLLABORATORS
// ============================================================================

/// Catalog wrapper that counts queries and can be told to fail or stall.
#[derive(Debug, Default)]
pub struct CountingCatalog<C = InMemoryCatalog> {
    inner: C,
    calls: AtomicUsize,
    failing: AtomicBool,
    delay_ms: AtomicU64,
}

impl<C: CatalogSource> CountingCatalog<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            delay_ms: AtomicU64::new(0),
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Number of `list_all_data_sources` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// While set, every query fails with [`CatalogError::Unavailable`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Sleep this long before answering each query.
    pub fn set_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.delay_ms.store(millis, Ordering::SeqCst);
    }
}

impl CountingCatalog<InMemoryCatalog> {
    pub fn with_records(records: Vec<DataSourceRecord>) -> Self {
        Self::new(InMemoryCatalog::new(records))
    }
}

#[async_trait]
impl<C: CatalogSource> CatalogSource for CountingCatalog<C> {
    async fn list_all_data_sources(&self) -> Result<Vec<DataSourceRecord>, CatalogError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(CatalogError::unavailable("catalog offline (test)"));
        }
        self.inner.list_all_data_sources().await
    }
}

/// Plugin registry wrapper that counts existence checks.
#[derive(Debug, Default)]
pub struct CountingPluginRegistry {
    inner: InMemoryPluginRegistry,
    calls: AtomicUsize,
}

impl CountingPluginRegistry {
    pub fn with_plugins<I, S>(plugin_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inner: InMemoryPluginRegistry::with_plugins(plugin_types),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &InMemoryPluginRegistry {
        &self.inner
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PluginRegistry for CountingPluginRegistry {
    async fn exists(&self, plugin_type: &str) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.exists(plugin_type).await
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for catalog contents.

    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    /// Plugin types the generated catalogs draw from. `"missing"` is never
    /// registered by the fixtures.
    pub const PLUGIN_TYPES: [&str; 4] = ["prometheus", "loki", "tempo", "missing"];

    pub fn arb_tenant_id() -> impl Strategy<Value = TenantId> {
        1i64..6
    }

    pub fn arb_uid() -> impl Strategy<Value = String> {
        "[a-z0-9]{1,8}"
    }

    /// Names are kept short so collisions within a tenant actually happen.
    pub fn arb_name() -> impl Strategy<Value = String> {
        "[A-Z][a-z]{0,2}"
    }

    pub fn arb_plugin_type() -> impl Strategy<Value = String> {
        prop::sample::select(PLUGIN_TYPES.to_vec()).prop_map(str::to_string)
    }

    pub fn arb_record() -> impl Strategy<Value = DataSourceRecord> {
        (
            arb_tenant_id(),
            arb_uid(),
            arb_name(),
            arb_plugin_type(),
            0i64..50,
            prop::bool::weighted(0.2),
        )
            .prop_map(|(org_id, uid, name, plugin_type, internal_id, is_default)| {
                DataSourceRecord {
                    org_id,
                    uid,
                    name,
                    plugin_type,
                    internal_id,
                    is_default,
                }
            })
    }

    /// A catalog listing with uids unique per tenant, as the catalog's
    /// primary key guarantees. Reserved keys (the built-in uid and
    /// `"default"`) are never generated as uids.
    pub fn arb_catalog(max_len: usize) -> impl Strategy<Value = Vec<DataSourceRecord>> {
        prop::collection::vec(arb_record(), 0..=max_len).prop_map(|records| {
            let mut seen = HashSet::new();
            records
                .into_iter()
                .filter(|r| r.uid != BUILTIN_DATASOURCE_UID && r.uid != DEFAULT_KEY)
                .filter(|r| seen.insert((r.org_id, r.uid.clone())))
                .collect()
        })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;

    /// Cache wired to counting doubles and a manual clock.
    pub type TestCache = ResolutionCache<CountingCatalog, CountingPluginRegistry, ManualClock>;

    /// A cache plus handles on its collaborators.
    pub struct Harness {
        pub cache: Arc<TestCache>,
        pub catalog: Arc<CountingCatalog>,
        pub plugins: Arc<CountingPluginRegistry>,
        pub clock: Arc<ManualClock>,
    }

    impl Harness {
        pub fn new(records: Vec<DataSourceRecord>, plugins: &[&str]) -> Self {
            Self::with_config(records, plugins, ResolverConfig::default())
        }

        pub fn with_config(
            records: Vec<DataSourceRecord>,
            plugins: &[&str],
            config: ResolverConfig,
        ) -> Self {
            let catalog = Arc::new(CountingCatalog::with_records(records));
            let plugins = Arc::new(CountingPluginRegistry::with_plugins(
                plugins.iter().copied(),
            ));
            let clock = Arc::new(ManualClock::new());
            let cache = Arc::new(ResolutionCache::new(
                Arc::clone(&catalog),
                Arc::clone(&plugins),
                Arc::clone(&clock),
                config,
            ));
            Self {
                cache,
                catalog,
                plugins,
                clock,
            }
        }

        /// Move the clock just past the configured staleness window.
        pub fn expire(&self) {
            let window = self.cache.config().staleness_window;
            self.clock.advance(window + Duration::from_millis(1));
        }
    }

    /// Tenant 1's default Prometheus data source.
    pub fn prometheus_record() -> DataSourceRecord {
        DataSourceRecord::new(1, "abc", "Prometheus", "prometheus", 7).as_default()
    }

    /// A small multi-tenant catalog:
    /// - tenant 1: default Prometheus plus a Loki source
    /// - tenant 3: a Tempo source with no default and an unregistered plugin
    pub fn sample_catalog() -> Vec<DataSourceRecord> {
        vec![
            prometheus_record(),
            DataSourceRecord::new(1, "lk1", "Logs", "loki", 8),
            DataSourceRecord::new(3, "tmp", "Traces", "tempo", 1),
            DataSourceRecord::new(3, "old", "Legacy", "graphite", 2),
        ]
    }

    /// Plugins installed alongside [`sample_catalog`].
    pub const SAMPLE_PLUGINS: [&str; 3] = ["prometheus", "loki", "tempo"];
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for resolver-specific outcomes.

    use super::*;

    /// Assert that a lookup returned the built-in data source.
    #[track_caller]
    pub fn assert_builtin(result: &ResolveResult<Arc<ResolvedDataSource>>) {
        match result {
            Ok(ds) => {
                assert_eq!(ds.uid, BUILTIN_DATASOURCE_UID, "Expected built-in, got {:?}", ds);
                assert!(ds.plugin_exists, "Built-in must report its plugin");
            }
            Err(err) => panic!("Expected built-in, got error: {:?}", err),
        }
    }

    /// Assert that a lookup resolved to the given uid.
    #[track_caller]
    pub fn assert_resolves_to(result: &ResolveResult<Arc<ResolvedDataSource>>, uid: &str) {
        match result {
            Ok(ds) => assert_eq!(ds.uid, uid, "Resolved to the wrong data source"),
            Err(err) => panic!("Expected {:?}, got error: {:?}", uid, err),
        }
    }

    /// Assert that a lookup failed with `IdentifierNotFound`.
    #[track_caller]
    pub fn assert_identifier_not_found<T: std::fmt::Debug>(result: &ResolveResult<T>) {
        match result {
            Err(ResolveError::IdentifierNotFound { .. }) => {}
            other => panic!("Expected IdentifierNotFound, got: {:?}", other),
        }
    }

    /// Assert that a lookup failed with `TenantNotFound`.
    #[track_caller]
    pub fn assert_tenant_not_found<T: std::fmt::Debug>(result: &ResolveResult<T>) {
        match result {
            Err(ResolveError::TenantNotFound { .. }) => {}
            other => panic!("Expected TenantNotFound, got: {:?}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let start = Utc::now();
        let clock = ManualClock::starting_at(start);
        assert_eq!(clock.now(), start);

        clock.advance(Duration::from_secs(90));
        assert_eq!(clock.now(), start + chrono::Duration::seconds(90));

        clock.set(start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn test_set_delay_saturates() {
        let catalog = CountingCatalog::with_records(Vec::new());
        catalog.set_delay(Duration::MAX);
        assert_eq!(catalog.delay_ms.load(Ordering::SeqCst), u64::MAX);

        catalog.set_delay(Duration::from_millis(250));
        assert_eq!(catalog.delay_ms.load(Ordering::SeqCst), 250);
    }
}
