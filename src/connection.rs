//! Tenant connection lifecycle: authorization, token refresh, revocation.
//!
//! The credential manager owns the per-tenant [`ConnectionRecord`] and is
//! the only component that mutates it. Refresh is serialized per tenant:
//! OAuth refresh rotation invalidates the previous refresh secret, so two
//! concurrent refreshes would strand one caller with dead credentials.

use chrono::{DateTime, Duration, Utc};
use secrecy::SecretString;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};
use crate::remote::{RemoteAccess, RemoteClient, RemoteClientFactory};
use crate::store::ConnectionStore;
use crate::types::{ConflictPolicy, EntityKind, TokenState};

/// Minutes before access expiry at which a refresh is forced.
const REFRESH_WINDOW_MINUTES: i64 = 5;

/// Per-tenant sync preferences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Whether the host scheduler may run syncs without an operator.
    pub auto_sync: bool,
    /// Default policy applied when resolving conflicts automatically.
    pub conflict_policy: ConflictPolicy,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            auto_sync: false,
            conflict_policy: ConflictPolicy::Manual,
        }
    }
}

/// A tenant's connection to the accounting provider.
#[derive(Debug, Clone)]
pub struct ConnectionRecord {
    pub tenant_id: Uuid,
    pub remote_company_id: String,
    pub access_secret: SecretString,
    pub refresh_secret: SecretString,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
    pub connected_at: DateTime<Utc>,
    /// Pull watermark per entity kind.
    pub last_sync_at: HashMap<EntityKind, DateTime<Utc>>,
    pub settings: ConnectionSettings,
}

impl ConnectionRecord {
    /// Current token state relative to `now`.
    #[must_use]
    pub fn token_state(&self, now: DateTime<Utc>) -> TokenState {
        if self.refresh_expires_at <= now {
            TokenState::Expired
        } else if self.access_expires_at - now <= Duration::minutes(REFRESH_WINDOW_MINUTES) {
            TokenState::NeedsRefresh
        } else {
            TokenState::Active
        }
    }

    /// Credentials for building a remote client.
    #[must_use]
    pub fn remote_access(&self) -> RemoteAccess {
        RemoteAccess {
            remote_company_id: self.remote_company_id.clone(),
            access_secret: self.access_secret.clone(),
        }
    }

    /// Replace both secrets from a freshly-issued grant. Replace-on-write:
    /// the caller persists the whole record in one save.
    #[must_use]
    pub fn with_grant(mut self, grant: TokenGrant, now: DateTime<Utc>) -> Self {
        self.access_secret = grant.access_secret;
        self.refresh_secret = grant.refresh_secret;
        self.access_expires_at = now + Duration::seconds(grant.expires_in_secs);
        self.refresh_expires_at = now + Duration::seconds(grant.refresh_expires_in_secs);
        self
    }
}

/// Tokens issued by the provider's token endpoint.
pub struct TokenGrant {
    pub access_secret: SecretString,
    pub refresh_secret: SecretString,
    pub expires_in_secs: i64,
    pub refresh_expires_in_secs: i64,
}

/// Connection state reported to callers.
#[derive(Debug, Clone)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub token_state: Option<TokenState>,
    pub last_sync_at: HashMap<EntityKind, DateTime<Utc>>,
}

impl ConnectionStatus {
    fn disconnected() -> Self {
        Self {
            connected: false,
            token_state: None,
            last_sync_at: HashMap::new(),
        }
    }
}

/// OAuth provider endpoints, consumed as a capability.
#[async_trait::async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Authorization URL the tenant's operator is redirected to.
    fn authorization_url(&self, state: &str) -> String;

    /// Exchange an authorization code for the first token pair.
    async fn exchange_code(&self, code: &str) -> SyncResult<TokenGrant>;

    /// Exchange a refresh secret for a rotated token pair.
    async fn refresh(&self, refresh_secret: &SecretString) -> SyncResult<TokenGrant>;

    /// Revoke the tenant's tokens remote-side.
    async fn revoke(&self, refresh_secret: &SecretString) -> SyncResult<()>;
}

/// Owns token acquisition, refresh-before-expiry and revocation.
pub struct CredentialManager {
    store: Arc<dyn ConnectionStore>,
    oauth: Arc<dyn OAuthProvider>,
    factory: Arc<dyn RemoteClientFactory>,
    refresh_locks: std::sync::Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl CredentialManager {
    /// Create a new credential manager.
    pub fn new(
        store: Arc<dyn ConnectionStore>,
        oauth: Arc<dyn OAuthProvider>,
        factory: Arc<dyn RemoteClientFactory>,
    ) -> Self {
        Self {
            store,
            oauth,
            factory,
            refresh_locks: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Begin the authorization flow: the returned URL carries the tenant id
    /// as the `state` parameter, which the callback must echo back.
    pub fn connect(&self, tenant_id: Uuid) -> String {
        self.oauth.authorization_url(&tenant_id.to_string())
    }

    /// Complete the authorization flow and persist the connection.
    #[instrument(skip(self, code))]
    pub async fn handle_callback(
        &self,
        code: &str,
        remote_company_id: &str,
        state: &str,
    ) -> SyncResult<ConnectionRecord> {
        let tenant_id: Uuid = state
            .parse()
            .map_err(|_| SyncError::validation(format!("invalid authorization state: {state}")))?;

        let grant = self.oauth.exchange_code(code).await?;
        let now = Utc::now();
        let record = ConnectionRecord {
            tenant_id,
            remote_company_id: remote_company_id.to_string(),
            access_secret: grant.access_secret,
            refresh_secret: grant.refresh_secret,
            access_expires_at: now + Duration::seconds(grant.expires_in_secs),
            refresh_expires_at: now + Duration::seconds(grant.refresh_expires_in_secs),
            connected_at: now,
            last_sync_at: HashMap::new(),
            settings: ConnectionSettings::default(),
        };
        self.store.save(record.clone()).await?;
        debug!(tenant_id = %tenant_id, "accounting connection established");
        Ok(record)
    }

    /// Load the tenant's connection record.
    pub async fn connection(&self, tenant_id: Uuid) -> SyncResult<ConnectionRecord> {
        self.store
            .load(tenant_id)
            .await?
            .ok_or(SyncError::NotConnected { tenant_id })
    }

    /// Valid credentials for the tenant, refreshing the access secret first
    /// when it is inside the refresh window.
    #[instrument(skip(self))]
    pub async fn access_for(&self, tenant_id: Uuid) -> SyncResult<RemoteAccess> {
        let record = self.connection(tenant_id).await?;
        match record.token_state(Utc::now()) {
            TokenState::Active => return Ok(record.remote_access()),
            TokenState::Expired => {
                return Err(SyncError::refresh_failed("refresh token expired"));
            }
            TokenState::NeedsRefresh => {}
        }

        let lock = self.refresh_lock(tenant_id);
        let _guard = lock.lock().await;

        // Re-read under the lock: a concurrent caller may have refreshed
        // while we waited, in which case the stored secrets are already new.
        let record = self.connection(tenant_id).await?;
        let now = Utc::now();
        match record.token_state(now) {
            TokenState::Active => return Ok(record.remote_access()),
            TokenState::Expired => {
                return Err(SyncError::refresh_failed("refresh token expired"));
            }
            TokenState::NeedsRefresh => {}
        }

        let grant = match self.oauth.refresh(&record.refresh_secret).await {
            Ok(grant) => grant,
            Err(err) if err.is_transient() => return Err(err),
            Err(err) => return Err(SyncError::refresh_failed(err.to_string())),
        };
        let updated = record.with_grant(grant, now);
        self.store.save(updated.clone()).await?;
        debug!(tenant_id = %tenant_id, "access token refreshed");
        Ok(updated.remote_access())
    }

    /// A remote client built from valid (freshly refreshed if needed)
    /// credentials.
    pub async fn client_for(&self, tenant_id: Uuid) -> SyncResult<Arc<dyn RemoteClient>> {
        let access = self.access_for(tenant_id).await?;
        self.factory.client_for(&access)
    }

    /// Revoke the tenant's tokens best-effort and delete the connection.
    #[instrument(skip(self))]
    pub async fn disconnect(&self, tenant_id: Uuid) -> SyncResult<()> {
        let record = self.connection(tenant_id).await?;
        if let Err(err) = self.oauth.revoke(&record.refresh_secret).await {
            warn!(
                tenant_id = %tenant_id,
                error = %err,
                "remote token revocation failed; deleting connection anyway"
            );
        }
        self.store.delete(tenant_id).await
    }

    /// Connection status for reporting.
    pub async fn status(&self, tenant_id: Uuid) -> SyncResult<ConnectionStatus> {
        match self.store.load(tenant_id).await? {
            None => Ok(ConnectionStatus::disconnected()),
            Some(record) => Ok(ConnectionStatus {
                connected: true,
                token_state: Some(record.token_state(Utc::now())),
                last_sync_at: record.last_sync_at.clone(),
            }),
        }
    }

    /// Persist the pull watermark for one entity kind.
    pub async fn record_sync_time(
        &self,
        tenant_id: Uuid,
        kind: EntityKind,
        at: DateTime<Utc>,
    ) -> SyncResult<()> {
        let mut record = self.connection(tenant_id).await?;
        record.last_sync_at.insert(kind, at);
        self.store.save(record).await
    }

    fn refresh_lock(&self, tenant_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .refresh_locks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        locks
            .entry(tenant_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}
