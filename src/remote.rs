//! Remote accounting provider adapter.
//!
//! The provider is consumed as a narrow capability: list, create and update
//! records of each [`EntityKind`], every record carrying an opaque revision
//! token and a last-modified timestamp. All calls are routed through the
//! retry executor by the orchestrator.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::SyncResult;
use crate::types::EntityKind;

/// Default number of records fetched per listing page.
///
/// Listing "all" records is always chunked; the provider's hard limit
/// should be confirmed per deployment, this is a conservative default.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// A typed record as returned by the remote provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteRecord {
    /// Remote id, unique per entity kind.
    pub id: String,
    /// Optimistic-concurrency token required to update this record.
    pub revision_token: String,
    /// When the remote last modified this record.
    pub last_modified_at: DateTime<Utc>,
    /// The record body in the provider's schema.
    pub fields: serde_json::Value,
}

/// One page of a chunked listing.
#[derive(Debug, Clone)]
pub struct RemotePage {
    pub records: Vec<RemoteRecord>,
    /// Opaque cursor for the next page; `None` when exhausted.
    pub next_cursor: Option<String>,
}

impl RemotePage {
    /// A final page with the given records.
    #[must_use]
    pub fn last(records: Vec<RemoteRecord>) -> Self {
        Self {
            records,
            next_cursor: None,
        }
    }
}

/// Capability interface over the remote accounting API.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// List records of a kind, optionally filtered to those modified since
    /// the given instant, one page at a time.
    async fn list(
        &self,
        kind: EntityKind,
        modified_since: Option<DateTime<Utc>>,
        cursor: Option<&str>,
        page_size: usize,
    ) -> SyncResult<RemotePage>;

    /// Create a record from a payload in the provider's schema.
    async fn create(&self, kind: EntityKind, payload: &serde_json::Value)
        -> SyncResult<RemoteRecord>;

    /// Update a record the provider previously returned. The revision token
    /// must match the provider's current one or the update is rejected.
    async fn update(
        &self,
        kind: EntityKind,
        id: &str,
        revision_token: &str,
        payload: &serde_json::Value,
    ) -> SyncResult<RemoteRecord>;
}

/// Freshly-validated credentials for one tenant's remote company file.
#[derive(Clone)]
pub struct RemoteAccess {
    pub remote_company_id: String,
    pub access_secret: SecretString,
}

impl std::fmt::Debug for RemoteAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteAccess")
            .field("remote_company_id", &self.remote_company_id)
            .field("access_secret", &"[REDACTED]")
            .finish()
    }
}

/// Builds a [`RemoteClient`] from validated credentials.
///
/// Injected at the composition root so the orchestrator and credential
/// manager stay testable with fake clients.
pub trait RemoteClientFactory: Send + Sync {
    fn client_for(&self, access: &RemoteAccess) -> SyncResult<Arc<dyn RemoteClient>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;

    #[test]
    fn remote_access_debug_redacts_secret() {
        let access = RemoteAccess {
            remote_company_id: "9130".to_string(),
            access_secret: Secret::new("super-secret".to_string()),
        };
        let rendered = format!("{access:?}");
        assert!(rendered.contains("9130"));
        assert!(!rendered.contains("super-secret"));
    }

    #[test]
    fn last_page_has_no_cursor() {
        let page = RemotePage::last(Vec::new());
        assert!(page.next_cursor.is_none());
        assert!(page.records.is_empty());
    }

    #[test]
    fn remote_record_serde_roundtrip() {
        let record = RemoteRecord {
            id: "42".to_string(),
            revision_token: "7".to_string(),
            last_modified_at: Utc::now(),
            fields: serde_json::json!({"DisplayName": "Blackstone & Birch"}),
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: RemoteRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, record.id);
        assert_eq!(back.revision_token, record.revision_token);
        assert_eq!(back.fields["DisplayName"], "Blackstone & Birch");
    }
}
