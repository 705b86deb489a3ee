//! HTTP adapters for the remote provider: OAuth endpoints and the REST API.
//!
//! These are the production implementations of [`OAuthProvider`],
//! [`RemoteClient`] and [`RemoteClientFactory`]. Network failures map to
//! transient errors; HTTP statuses are classified through
//! [`SyncError::from_http_status`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::connection::{OAuthProvider, TokenGrant};
use crate::error::{SyncError, SyncResult};
use crate::remote::{RemoteAccess, RemoteClient, RemoteClientFactory, RemotePage, RemoteRecord};
use crate::types::EntityKind;

/// OAuth application settings for the accounting provider.
#[derive(Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    pub auth_url: String,
    pub token_url: String,
    pub revoke_url: String,
    pub redirect_uri: String,
    pub scope: String,
}

impl OAuthConfig {
    /// Fail fast on settings that would only surface mid-flow.
    pub fn validate(&self) -> SyncResult<()> {
        if self.client_id.is_empty() {
            return Err(SyncError::configuration("oauth client id is empty"));
        }
        if self.redirect_uri.is_empty() {
            return Err(SyncError::configuration("oauth redirect uri is empty"));
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    #[serde(rename = "x_refresh_token_expires_in")]
    refresh_expires_in: i64,
}

impl From<TokenResponse> for TokenGrant {
    fn from(resp: TokenResponse) -> Self {
        TokenGrant {
            access_secret: SecretString::new(resp.access_token),
            refresh_secret: SecretString::new(resp.refresh_token),
            expires_in_secs: resp.expires_in,
            refresh_expires_in_secs: resp.refresh_expires_in,
        }
    }
}

/// [`OAuthProvider`] over the provider's authorization and token endpoints.
pub struct HttpOAuthProvider {
    http: reqwest::Client,
    config: OAuthConfig,
}

impl HttpOAuthProvider {
    pub fn new(http: reqwest::Client, config: OAuthConfig) -> SyncResult<Self> {
        config.validate()?;
        Ok(Self { http, config })
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> SyncResult<TokenGrant> {
        let response = self
            .http
            .post(&self.config.token_url)
            .basic_auth(
                &self.config.client_id,
                Some(self.config.client_secret.expose_secret()),
            )
            .form(params)
            .send()
            .await
            .map_err(|e| SyncError::transient(format!("token endpoint unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::from_http_status(status.as_u16(), body));
        }
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| SyncError::transient(format!("malformed token response: {e}")))?;
        Ok(token.into())
    }
}

#[async_trait]
impl OAuthProvider for HttpOAuthProvider {
    fn authorization_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&response_type=code&scope={}&redirect_uri={}&state={}",
            self.config.auth_url,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.scope),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode(state),
        )
    }

    async fn exchange_code(&self, code: &str) -> SyncResult<TokenGrant> {
        debug!("exchanging authorization code for tokens");
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", &self.config.redirect_uri),
        ])
        .await
    }

    async fn refresh(&self, refresh_secret: &SecretString) -> SyncResult<TokenGrant> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_secret.expose_secret()),
        ])
        .await
    }

    async fn revoke(&self, refresh_secret: &SecretString) -> SyncResult<()> {
        let response = self
            .http
            .post(&self.config.revoke_url)
            .basic_auth(
                &self.config.client_id,
                Some(self.config.client_secret.expose_secret()),
            )
            .json(&serde_json::json!({"token": refresh_secret.expose_secret()}))
            .send()
            .await
            .map_err(|e| SyncError::transient(format!("revoke endpoint unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::from_http_status(status.as_u16(), body));
        }
        Ok(())
    }
}

/// [`RemoteClient`] over the provider's REST API for one company file.
pub struct HttpRemoteClient {
    http: reqwest::Client,
    base_url: String,
    company_id: String,
    access_secret: SecretString,
}

#[derive(Deserialize)]
struct ListResponse {
    records: Vec<serde_json::Value>,
    next_cursor: Option<String>,
}

impl HttpRemoteClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        access: &RemoteAccess,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            company_id: access.remote_company_id.clone(),
            access_secret: access.access_secret.clone(),
        }
    }

    fn resource_url(&self, kind: EntityKind) -> String {
        format!(
            "{}/v1/company/{}/{}",
            self.base_url,
            self.company_id,
            kind.remote_resource()
        )
    }

    /// Lift a raw provider object into a [`RemoteRecord`], extracting the
    /// id, revision token and modification time it must carry.
    fn parse_record(fields: serde_json::Value) -> SyncResult<RemoteRecord> {
        let id = fields
            .get("Id")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| SyncError::mapping("Id", "missing in remote record"))?
            .to_string();
        let revision_token = fields
            .get("SyncToken")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| SyncError::mapping("SyncToken", "missing in remote record"))?
            .to_string();
        let raw_modified = fields
            .get("MetaData")
            .and_then(|m| m.get("LastUpdatedTime"))
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| {
                SyncError::mapping("MetaData.LastUpdatedTime", "missing in remote record")
            })?;
        let last_modified_at = DateTime::parse_from_rfc3339(raw_modified)
            .map_err(|e| {
                SyncError::mapping(
                    "MetaData.LastUpdatedTime",
                    format!("invalid timestamp {raw_modified}: {e}"),
                )
            })?
            .with_timezone(&Utc);
        Ok(RemoteRecord {
            id,
            revision_token,
            last_modified_at,
            fields,
        })
    }

    async fn read_record(&self, response: reqwest::Response) -> SyncResult<RemoteRecord> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::from_http_status(status.as_u16(), body));
        }
        let fields: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SyncError::transient(format!("malformed remote record: {e}")))?;
        Self::parse_record(fields)
    }
}

#[async_trait]
impl RemoteClient for HttpRemoteClient {
    async fn list(
        &self,
        kind: EntityKind,
        modified_since: Option<DateTime<Utc>>,
        cursor: Option<&str>,
        page_size: usize,
    ) -> SyncResult<RemotePage> {
        let mut request = self
            .http
            .get(self.resource_url(kind))
            .bearer_auth(self.access_secret.expose_secret())
            .query(&[("page_size", page_size.to_string())]);
        if let Some(since) = modified_since {
            request = request.query(&[("modified_since", since.to_rfc3339())]);
        }
        if let Some(cursor) = cursor {
            request = request.query(&[("cursor", cursor)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SyncError::transient(format!("remote unreachable: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::from_http_status(status.as_u16(), body));
        }
        let listing: ListResponse = response
            .json()
            .await
            .map_err(|e| SyncError::transient(format!("malformed listing: {e}")))?;

        let records = listing
            .records
            .into_iter()
            .map(Self::parse_record)
            .collect::<SyncResult<Vec<_>>>()?;
        Ok(RemotePage {
            records,
            next_cursor: listing.next_cursor,
        })
    }

    async fn create(
        &self,
        kind: EntityKind,
        payload: &serde_json::Value,
    ) -> SyncResult<RemoteRecord> {
        let response = self
            .http
            .post(self.resource_url(kind))
            .bearer_auth(self.access_secret.expose_secret())
            .json(payload)
            .send()
            .await
            .map_err(|e| SyncError::transient(format!("remote unreachable: {e}")))?;
        self.read_record(response).await
    }

    async fn update(
        &self,
        kind: EntityKind,
        id: &str,
        revision_token: &str,
        payload: &serde_json::Value,
    ) -> SyncResult<RemoteRecord> {
        let response = self
            .http
            .put(format!("{}/{}", self.resource_url(kind), id))
            .bearer_auth(self.access_secret.expose_secret())
            .query(&[("revision", revision_token)])
            .json(payload)
            .send()
            .await
            .map_err(|e| SyncError::transient(format!("remote unreachable: {e}")))?;
        self.read_record(response).await
    }
}

/// Builds [`HttpRemoteClient`]s bound to one tenant's credentials.
pub struct HttpClientFactory {
    http: reqwest::Client,
    base_url: String,
}

impl HttpClientFactory {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

impl RemoteClientFactory for HttpClientFactory {
    fn client_for(&self, access: &RemoteAccess) -> SyncResult<Arc<dyn RemoteClient>> {
        Ok(Arc::new(HttpRemoteClient::new(
            self.http.clone(),
            self.base_url.clone(),
            access,
        )))
    }
}
