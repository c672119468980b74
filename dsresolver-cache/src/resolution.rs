//! Result of a successful lookup, carrying snapshot metadata.

use std::sync::Arc;
use std::time::Duration;

use dsresolver_core::{CatalogError, ResolvedDataSource, Timestamp};

/// A resolved descriptor plus the context it was served from.
///
/// A lookup can succeed against a stale snapshot after a failed refresh;
/// the failure is kept here so callers can surface it.
#[derive(Debug, Clone)]
pub struct Resolution {
    value: Arc<ResolvedDataSource>,
    built_at: Timestamp,
    refreshed: bool,
    refresh_error: Option<CatalogError>,
}

impl Resolution {
    pub(crate) fn new(
        value: Arc<ResolvedDataSource>,
        built_at: Timestamp,
        refreshed: bool,
        refresh_error: Option<CatalogError>,
    ) -> Self {
        Self {
            value,
            built_at,
            refreshed,
            refresh_error,
        }
    }

    pub fn value(&self) -> &ResolvedDataSource {
        &self.value
    }

    pub fn into_value(self) -> Arc<ResolvedDataSource> {
        self.value
    }

    /// When the snapshot that served this lookup was built.
    pub fn built_at(&self) -> Timestamp {
        self.built_at
    }

    /// Age of the serving snapshot as of `now`. Zero if `now` is earlier.
    pub fn staleness_at(&self, now: Timestamp) -> Duration {
        now.signed_duration_since(self.built_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// True if this call rebuilt the snapshot before looking up.
    pub fn was_refreshed(&self) -> bool {
        self.refreshed
    }

    /// The refresh failure observed by this call, if any.
    pub fn refresh_error(&self) -> Option<&CatalogError> {
        self.refresh_error.as_ref()
    }

    /// True if the descriptor came from a snapshot that failed to refresh.
    pub fn is_degraded(&self) -> bool {
        self.refresh_error.is_some()
    }
}

impl AsRef<ResolvedDataSource> for Resolution {
    fn as_ref(&self) -> &ResolvedDataSource {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use dsresolver_core::BuiltinDataSource;

    #[test]
    fn test_staleness_at() {
        let built_at = Utc::now();
        let resolution = Resolution::new(
            Arc::new(BuiltinDataSource::default().descriptor()),
            built_at,
            false,
            None,
        );

        let later = built_at + chrono::Duration::seconds(5);
        assert_eq!(resolution.staleness_at(later), Duration::from_secs(5));

        let earlier = built_at - chrono::Duration::seconds(5);
        assert_eq!(resolution.staleness_at(earlier), Duration::ZERO);
    }

    #[test]
    fn test_degraded_when_refresh_failed() {
        let resolution = Resolution::new(
            Arc::new(BuiltinDataSource::default().descriptor()),
            Utc::now(),
            false,
            Some(CatalogError::unavailable("down")),
        );

        assert!(resolution.is_degraded());
        assert!(!resolution.was_refreshed());
        assert_eq!(resolution.value().uid, "grafana");
    }
}
