//! Immutable cache snapshots and the index-building pass.
//!
//! A [`CacheSnapshot`] maps every tenant to a [`TenantIndex`] and is built
//! in one go from the full catalog listing. Published snapshots are never
//! mutated; a refresh builds a new one and swaps it in.
//!
//! # Key precedence within a tenant
//!
//! 1. Every catalog data source is filed under its `uid`.
//! 2. Each data source is then filed under its stringified `internal_id` and
//!    its `name`, but only if that key is still free. Data sources are
//!    visited in ascending `uid` order, so on a collision the lowest `uid`
//!    wins, and a `uid` key always beats a name or id key.
//! 3. The built-in data source is filed under its own `uid`, replacing any
//!    catalog entry with the same uid.
//! 4. The tenant default (its default-marked record, else the built-in) is
//!    filed under `""` unconditionally and under `"default"` if free.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use dsresolver_core::{
    BuiltinDataSource, DataSourceRecord, ResolvedDataSource, TenantId, Timestamp, DEFAULT_KEY,
    EMPTY_KEY,
};
use tracing::{debug, warn};

use crate::traits::PluginRegistry;

/// Lookup table for a single tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantIndex {
    entries: HashMap<String, Arc<ResolvedDataSource>>,
}

impl TenantIndex {
    /// Build the index for one tenant.
    ///
    /// `primary` holds the tenant's catalog data sources keyed by uid. It is
    /// read as a fixed, ordered view while secondary keys go to a separate
    /// target map.
    fn build(
        primary: &BTreeMap<String, Arc<ResolvedDataSource>>,
        builtin: &Arc<ResolvedDataSource>,
        default: Option<Arc<ResolvedDataSource>>,
    ) -> Self {
        let mut entries: HashMap<String, Arc<ResolvedDataSource>> = primary
            .iter()
            .map(|(uid, ds)| (uid.clone(), Arc::clone(ds)))
            .collect();

        for ds in primary.values() {
            entries
                .entry(ds.internal_id.to_string())
                .or_insert_with(|| Arc::clone(ds));
            entries
                .entry(ds.name.clone())
                .or_insert_with(|| Arc::clone(ds));
        }

        entries.insert(builtin.uid.clone(), Arc::clone(builtin));

        let default = default.unwrap_or_else(|| Arc::clone(builtin));
        entries.insert(EMPTY_KEY.to_string(), Arc::clone(&default));
        entries.entry(DEFAULT_KEY.to_string()).or_insert(default);

        Self { entries }
    }

    /// Index served to tenants that own no catalog data sources.
    fn builtin_only(builtin: &Arc<ResolvedDataSource>) -> Self {
        Self::build(&BTreeMap::new(), builtin, None)
    }

    pub fn get(&self, key: &str) -> Option<&Arc<ResolvedDataSource>> {
        self.entries.get(key)
    }

    /// The entry filed under `""`.
    pub fn default_entry(&self) -> Option<&Arc<ResolvedDataSource>> {
        self.entries.get(EMPTY_KEY)
    }

    /// All lookup keys, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Number of lookup keys, including aliases.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A complete, immutable view of all tenants at one point in time.
#[derive(Debug, Clone)]
pub struct CacheSnapshot {
    tenants: HashMap<TenantId, TenantIndex>,
    fallback: TenantIndex,
    built_at: Timestamp,
    generation: u64,
}

impl CacheSnapshot {
    /// Build a snapshot from a full catalog listing.
    ///
    /// Plugin existence is looked up once per distinct plugin type.
    pub async fn build<P>(
        records: Vec<DataSourceRecord>,
        plugins: &P,
        builtin: &BuiltinDataSource,
        built_at: Timestamp,
        generation: u64,
    ) -> Self
    where
        P: PluginRegistry + ?Sized,
    {
        let mut plugin_exists: HashMap<String, bool> = HashMap::new();
        let mut primary: BTreeMap<TenantId, BTreeMap<String, Arc<ResolvedDataSource>>> =
            BTreeMap::new();

        for record in &records {
            let exists = match plugin_exists.get(&record.plugin_type) {
                Some(exists) => *exists,
                None => {
                    let exists = plugins.exists(&record.plugin_type).await;
                    plugin_exists.insert(record.plugin_type.clone(), exists);
                    exists
                }
            };

            let ds = Arc::new(ResolvedDataSource::from_record(record, exists));
            let previous = primary
                .entry(record.org_id)
                .or_default()
                .insert(record.uid.clone(), ds);
            if previous.is_some() {
                debug!(
                    tenant_id = record.org_id,
                    uid = %record.uid,
                    "Duplicate uid in catalog, keeping the later record"
                );
            }
        }

        let builtin = Arc::new(builtin.descriptor());
        let tenants = primary
            .iter()
            .map(|(tenant_id, by_uid)| {
                let default = pick_default(*tenant_id, by_uid);
                (*tenant_id, TenantIndex::build(by_uid, &builtin, default))
            })
            .collect();

        Self {
            tenants,
            fallback: TenantIndex::builtin_only(&builtin),
            built_at,
            generation,
        }
    }

    /// Index for a tenant that appeared in the catalog.
    pub fn tenant(&self, tenant_id: TenantId) -> Option<&TenantIndex> {
        self.tenants.get(&tenant_id)
    }

    /// Index used to serve a tenant. Tenants without catalog data sources
    /// get the built-in-only index.
    pub fn index_for(&self, tenant_id: TenantId) -> &TenantIndex {
        self.tenants.get(&tenant_id).unwrap_or(&self.fallback)
    }

    pub fn lookup(
        &self,
        tenant_id: TenantId,
        identifier: &str,
    ) -> Option<&Arc<ResolvedDataSource>> {
        self.index_for(tenant_id).get(identifier)
    }

    /// Tenants present in the catalog, sorted.
    pub fn tenant_ids(&self) -> Vec<TenantId> {
        let mut ids: Vec<TenantId> = self.tenants.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn tenant_count(&self) -> usize {
        self.tenants.len()
    }

    /// Total number of lookup keys across catalog tenants.
    pub fn entry_count(&self) -> usize {
        self.tenants.values().map(TenantIndex::len).sum()
    }

    pub fn built_at(&self) -> Timestamp {
        self.built_at
    }

    /// Monotonic publish counter, starting at 1 for the first snapshot.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True if both snapshots index the same entries, ignoring build time.
    pub fn same_entries(&self, other: &CacheSnapshot) -> bool {
        self.tenants == other.tenants && self.fallback == other.fallback
    }
}

/// Choose the tenant default among default-marked records: lowest uid wins.
fn pick_default(
    tenant_id: TenantId,
    by_uid: &BTreeMap<String, Arc<ResolvedDataSource>>,
) -> Option<Arc<ResolvedDataSource>> {
    let mut defaults = by_uid.values().filter(|ds| ds.is_default);
    let chosen = defaults.next().cloned();

    let extra = defaults.count();
    if let (Some(ds), true) = (&chosen, extra > 0) {
        warn!(
            tenant_id,
            chosen_uid = %ds.uid,
            ignored = extra,
            "Multiple default data sources, using the lowest uid"
        );
    }

    chosen
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use crate::memory::InMemoryPluginRegistry;
    use chrono::Utc;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn record_strategy() -> impl Strategy<Value = DataSourceRecord> {
        (
            1i64..4,
            "[a-e]{1,3}",
            "[A-E]{1,2}",
            prop_oneof![Just("prometheus"), Just("loki"), Just("missing")],
            0i64..20,
            any::<bool>(),
        )
            .prop_map(|(org_id, uid, name, plugin_type, internal_id, is_default)| {
                DataSourceRecord {
                    org_id,
                    uid,
                    name,
                    plugin_type: plugin_type.to_string(),
                    internal_id,
                    is_default,
                }
            })
    }

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime should build")
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        /// Every catalog uid resolves in its own tenant.
        #[test]
        fn prop_every_uid_resolves(records in prop::collection::vec(record_strategy(), 0..24)) {
            let registry = InMemoryPluginRegistry::with_plugins(["prometheus", "loki"]);
            let builtin = BuiltinDataSource::default();
            let snapshot = runtime().block_on(
                CacheSnapshot::build(records.clone(), &registry, &builtin, Utc::now(), 1),
            );

            for record in &records {
                let ds = snapshot.lookup(record.org_id, &record.uid);
                prop_assert!(ds.is_some(), "uid {} missing in tenant {}", record.uid, record.org_id);
            }
        }

        /// "" and "default" agree unless a record is literally keyed "default",
        /// and "" is the lowest-uid default record or the built-in.
        #[test]
        fn prop_default_keys_agree(records in prop::collection::vec(record_strategy(), 0..24)) {
            let registry = InMemoryPluginRegistry::with_plugins(["prometheus"]);
            let builtin = BuiltinDataSource::default();
            let snapshot = runtime().block_on(
                CacheSnapshot::build(records.clone(), &registry, &builtin, Utc::now(), 1),
            );

            // Later records replace earlier ones with the same uid.
            let mut surviving: BTreeMap<(TenantId, String), bool> = BTreeMap::new();
            for record in &records {
                surviving.insert((record.org_id, record.uid.clone()), record.is_default);
            }

            let orgs: HashSet<TenantId> = records.iter().map(|r| r.org_id).collect();
            for org in orgs {
                let index = snapshot.index_for(org);
                let empty = index.get("").expect("\"\" always present");
                let default = index.get("default").expect("\"default\" always present");
                prop_assert_eq!(empty, default);

                let expected = surviving
                    .iter()
                    .filter(|((o, _), is_default)| *o == org && **is_default)
                    .map(|((_, uid), _)| uid.clone())
                    .min()
                    .unwrap_or_else(|| builtin.uid.clone());
                prop_assert_eq!(&empty.uid, &expected);
            }
        }

        /// The built-in resolves in every tenant and always has its plugin.
        #[test]
        fn prop_builtin_everywhere(records in prop::collection::vec(record_strategy(), 0..24), probe in 0i64..6) {
            let registry = InMemoryPluginRegistry::new();
            let builtin = BuiltinDataSource::default();
            let snapshot = runtime().block_on(
                CacheSnapshot::build(records, &registry, &builtin, Utc::now(), 1),
            );

            let ds = snapshot.lookup(probe, &builtin.uid);
            prop_assert!(ds.is_some());
            prop_assert!(ds.map(|d| d.plugin_exists).unwrap_or(false));
        }

        /// Building twice from the same records yields the same entries,
        /// whatever order the catalog returned them in.
        #[test]
        fn prop_build_is_deterministic(records in prop::collection::vec(record_strategy(), 0..24)) {
            // Duplicate uids make the surviving record order dependent.
            let mut seen = HashSet::new();
            let records: Vec<DataSourceRecord> = records
                .into_iter()
                .filter(|r| seen.insert((r.org_id, r.uid.clone())))
                .collect();

            let registry = InMemoryPluginRegistry::with_plugins(["loki"]);
            let builtin = BuiltinDataSource::default();
            let rt = runtime();

            let mut reversed = records.clone();
            reversed.reverse();

            let first = rt.block_on(CacheSnapshot::build(records, &registry, &builtin, Utc::now(), 1));
            let second = rt.block_on(CacheSnapshot::build(reversed, &registry, &builtin, Utc::now(), 2));
            prop_assert!(first.same_entries(&second));
        }
    }
}
