//! Sync engine error types.
//!
//! Error definitions with transient/permanent classification for retry logic.

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during accounting synchronization.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The integration is not configured for this deployment.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// No accounting connection exists for the tenant.
    #[error("tenant {tenant_id} is not connected to the accounting provider")]
    NotConnected { tenant_id: Uuid },

    /// Credentials were rejected by the remote provider.
    #[error("authentication failed: {message}")]
    Auth { message: String },

    /// The refresh secret expired or was rejected; the tenant must
    /// re-authorize before any further remote calls can succeed.
    #[error("token refresh failed, re-authorization required: {message}")]
    RefreshFailed { message: String },

    /// Temporary remote fault; eligible for retry.
    #[error("transient remote error: {message}")]
    Transient { message: String },

    /// The remote provider throttled the request; eligible for retry.
    #[error("rate limited by remote provider: {message}")]
    RateLimited { message: String },

    /// The remote provider rejected a specific payload.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Failed to translate a record between the local and remote schema.
    #[error("mapping error: field '{field}' - {message}")]
    Mapping { field: String, message: String },

    /// The conflict was already resolved; resolution is terminal.
    #[error("conflict {conflict_id} is already resolved")]
    AlreadyResolved { conflict_id: Uuid },

    /// A sync run for the same tenant and entity kind is in flight.
    #[error("sync already in progress for tenant {tenant_id} ({entity_kind})")]
    SyncInProgress {
        tenant_id: Uuid,
        entity_kind: crate::types::EntityKind,
    },

    /// The run was cancelled before this batch started.
    #[error("sync run cancelled")]
    Cancelled,

    /// A referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Local store failure.
    #[error("store error: {message}")]
    Store { message: String },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl SyncError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an authentication error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create a refresh-failed error.
    pub fn refresh_failed(message: impl Into<String>) -> Self {
        Self::RefreshFailed {
            message: message.into(),
        }
    }

    /// Create a transient error.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Create a rate-limited error.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::RateLimited {
            message: message.into(),
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a mapping error.
    pub fn mapping(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Mapping {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a not-found error.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Create a store error.
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Check if this error is transient and the remote call should be retried.
    ///
    /// Authentication and validation failures are permanent for the purposes
    /// of a single call: retrying them against the same credentials or
    /// payload cannot succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SyncError::Transient { .. } | SyncError::RateLimited { .. }
        )
    }

    /// Check if this error aborts a whole sync run rather than a single item.
    ///
    /// Per-item failures are recorded in the run summary; these surface to
    /// the caller directly.
    pub fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::Configuration { .. }
                | SyncError::NotConnected { .. }
                | SyncError::Auth { .. }
                | SyncError::RefreshFailed { .. }
        )
    }

    /// Classify a remote HTTP status into the sync error taxonomy.
    ///
    /// 401 maps to an authentication failure, 429 and server faults are
    /// transient, any other 4xx is a payload rejection.
    pub fn from_http_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 => Self::Auth { message },
            429 => Self::RateLimited { message },
            400..=499 => Self::Validation { message },
            _ => Self::Transient { message },
        }
    }
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;
