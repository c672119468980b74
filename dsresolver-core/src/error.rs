//! Error types for resolution cache operations

use std::time::Duration;
use thiserror::Error;

use crate::identity::TenantId;

/// Failures reported by the catalog source.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Catalog unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Catalog query timed out after {timeout:?}")]
    Timeout { timeout: Duration },
}

impl CatalogError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Errors returned by `resolve`.
///
/// The not-found variants are authoritative. When a refresh was attempted
/// and failed just before the lookup, its error rides along in
/// `refresh_error` as diagnostic context.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// A catalog failure surfaced on its own, e.g. when a caller of
    /// `refresh()` propagates the error with `?`. Lookups never return it;
    /// they report refresh failures inside the not-found variants.
    #[error("Catalog error: {0}")]
    CatalogUnavailable(#[from] CatalogError),

    #[error("Tenant not found: {tenant_id}")]
    TenantNotFound {
        tenant_id: TenantId,
        #[source]
        refresh_error: Option<CatalogError>,
    },

    #[error("Data source not found in tenant {tenant_id}: {identifier:?}")]
    IdentifierNotFound {
        tenant_id: TenantId,
        identifier: String,
        #[source]
        refresh_error: Option<CatalogError>,
    },
}

impl ResolveError {
    /// The refresh failure captured alongside this error, if any.
    pub fn refresh_error(&self) -> Option<&CatalogError> {
        match self {
            Self::CatalogUnavailable(err) => Some(err),
            Self::TenantNotFound { refresh_error, .. }
            | Self::IdentifierNotFound { refresh_error, .. } => refresh_error.as_ref(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::TenantNotFound { .. } | Self::IdentifierNotFound { .. }
        )
    }
}

/// Result type alias for resolution operations.
pub type ResolveResult<T> = Result<T, ResolveError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_catalog_error_display_unavailable() {
        let err = CatalogError::unavailable("connection refused");
        let msg = format!("{}", err);
        assert!(msg.contains("Catalog unavailable"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn test_catalog_error_display_timeout() {
        let err = CatalogError::Timeout {
            timeout: Duration::from_millis(250),
        };
        assert!(format!("{}", err).contains("250ms"));
    }

    #[test]
    fn test_identifier_not_found_carries_refresh_error() {
        let err = ResolveError::IdentifierNotFound {
            tenant_id: 4,
            identifier: "missing".to_string(),
            refresh_error: Some(CatalogError::unavailable("db down")),
        };

        assert!(err.is_not_found());
        assert_eq!(
            err.refresh_error(),
            Some(&CatalogError::unavailable("db down"))
        );
        assert!(err.source().is_some());

        let msg = format!("{}", err);
        assert!(msg.contains("tenant 4"));
        assert!(msg.contains("\"missing\""));
    }

    #[test]
    fn test_tenant_not_found_without_refresh_error() {
        let err = ResolveError::TenantNotFound {
            tenant_id: 9,
            refresh_error: None,
        };
        assert!(err.is_not_found());
        assert!(err.refresh_error().is_none());
        assert!(err.source().is_none());
    }

    #[test]
    fn test_catalog_error_converts_into_resolve_error() {
        let err: ResolveError = CatalogError::unavailable("gone").into();
        assert!(!err.is_not_found());
        assert!(matches!(err, ResolveError::CatalogUnavailable(_)));
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "staleness_window".to_string(),
            value: "0s".to_string(),
            reason: "must be positive".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("staleness_window"));
        assert!(msg.contains("0s"));
        assert!(msg.contains("must be positive"));
    }
}
