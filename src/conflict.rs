//! Conflict detection and resolution.
//!
//! A conflict is recorded when both sides changed the same linked entity
//! since its last sync: the remote revision token moved on while the local
//! copy was edited after `last_synced_at`. Detection never mutates either
//! side; the conflicting write is skipped and a [`ConflictRecord`] carrying
//! both snapshots is persisted for resolution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::entity::{EntityLinkage, LocalEntity};
use crate::error::{SyncError, SyncResult};
use crate::mapper;
use crate::remote::{RemoteClient, RemoteRecord};
use crate::retry::RetryExecutor;
use crate::store::{link_index_for, ConflictStore, EntityStore};
use crate::types::{ConflictPolicy, ConflictStatus, EntityKind};

/// A detected conflict, retained after resolution for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub entity_kind: EntityKind,
    pub local_entity_id: Uuid,
    /// The remote copy at detection time.
    pub remote_snapshot: RemoteRecord,
    /// The local copy at detection time, serialized.
    pub local_snapshot: serde_json::Value,
    pub reason: String,
    pub status: ConflictStatus,
    /// The policy that effectively resolved the conflict. For
    /// [`ConflictPolicy::NewestWins`] this records the winner it chose.
    pub resolution: Option<ConflictPolicy>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Detects conflicts during sync runs and applies resolution policies.
pub struct ConflictManager {
    conflicts: Arc<dyn ConflictStore>,
    entities: Arc<dyn EntityStore>,
    retry: RetryExecutor,
}

impl ConflictManager {
    pub fn new(
        conflicts: Arc<dyn ConflictStore>,
        entities: Arc<dyn EntityStore>,
        retry: RetryExecutor,
    ) -> Self {
        Self {
            conflicts,
            entities,
            retry,
        }
    }

    /// Reason string when a pulled record conflicts with local edits, or
    /// `None` when the remote copy can be applied.
    ///
    /// Only meaningful for linked entities whose remote revision differs
    /// from the linkage; the caller filters unchanged records first.
    #[must_use]
    pub fn pull_conflict(local: &LocalEntity, remote: &RemoteRecord) -> Option<String> {
        let locally_edited = match local.linkage.last_synced_at {
            Some(synced_at) => local.updated_at > synced_at,
            // Linked but never stamped; treat any local edit as suspect.
            None => true,
        };
        if locally_edited {
            Some(format!(
                "local copy edited at {} while remote moved to revision {}",
                local.updated_at.to_rfc3339(),
                remote.revision_token
            ))
        } else {
            None
        }
    }

    /// Persist a conflict for a local entity, deduplicating against any
    /// pending conflict already recorded for it.
    #[instrument(skip(self, local, remote), fields(tenant_id = %tenant_id, kind = %local.kind()))]
    pub async fn record(
        &self,
        tenant_id: Uuid,
        local: &LocalEntity,
        remote: &RemoteRecord,
        reason: String,
    ) -> SyncResult<ConflictRecord> {
        if let Some(existing) = self
            .conflicts
            .find_pending_for_entity(tenant_id, local.id)
            .await?
        {
            return Ok(existing);
        }

        let record = ConflictRecord {
            id: Uuid::new_v4(),
            tenant_id,
            entity_kind: local.kind(),
            local_entity_id: local.id,
            remote_snapshot: remote.clone(),
            local_snapshot: serde_json::to_value(local)?,
            reason,
            status: ConflictStatus::Pending,
            resolution: None,
            created_at: Utc::now(),
            resolved_at: None,
        };
        warn!(
            conflict_id = %record.id,
            entity_id = %local.id,
            reason = %record.reason,
            "sync conflict detected"
        );
        self.conflicts.insert(record.clone()).await?;
        Ok(record)
    }

    /// Resolve a pending conflict under the given policy.
    ///
    /// [`ConflictPolicy::Manual`] marks the conflict resolved without
    /// touching either copy, for operators who reconciled out of band.
    /// Resolving an already-resolved conflict fails with
    /// [`SyncError::AlreadyResolved`].
    #[instrument(skip(self, client), fields(tenant_id = %tenant_id, conflict_id = %conflict_id, policy = %policy))]
    pub async fn resolve(
        &self,
        tenant_id: Uuid,
        conflict_id: Uuid,
        policy: ConflictPolicy,
        client: Arc<dyn RemoteClient>,
    ) -> SyncResult<ConflictRecord> {
        let mut conflict = self
            .conflicts
            .get(tenant_id, conflict_id)
            .await?
            .ok_or_else(|| SyncError::not_found("conflict", conflict_id.to_string()))?;
        if conflict.status.is_terminal() {
            return Err(SyncError::AlreadyResolved { conflict_id });
        }

        let entity = self
            .entities
            .get(tenant_id, conflict.local_entity_id)
            .await?
            .ok_or_else(|| {
                SyncError::not_found("entity", conflict.local_entity_id.to_string())
            })?;

        let effective = match policy {
            ConflictPolicy::NewestWins => {
                if entity.updated_at > conflict.remote_snapshot.last_modified_at {
                    ConflictPolicy::LocalWins
                } else {
                    ConflictPolicy::RemoteWins
                }
            }
            other => other,
        };

        match effective {
            ConflictPolicy::RemoteWins => {
                self.apply_remote(tenant_id, entity, &conflict.remote_snapshot)
                    .await?;
            }
            ConflictPolicy::LocalWins => {
                self.apply_local(tenant_id, entity, &conflict.remote_snapshot, client)
                    .await?;
            }
            ConflictPolicy::Manual => {}
            ConflictPolicy::NewestWins => unreachable!("collapsed above"),
        }

        conflict.status = ConflictStatus::Resolved;
        conflict.resolution = Some(effective);
        conflict.resolved_at = Some(Utc::now());
        self.conflicts.update(conflict.clone()).await?;
        info!(resolution = %effective, "conflict resolved");
        Ok(conflict)
    }

    /// Overwrite the local copy with the remote snapshot.
    async fn apply_remote(
        &self,
        tenant_id: Uuid,
        mut entity: LocalEntity,
        remote: &RemoteRecord,
    ) -> SyncResult<()> {
        let links = link_index_for(self.entities.as_ref(), tenant_id, entity.kind()).await?;
        entity.data = mapper::to_local(entity.kind(), remote, &links)?;
        entity.updated_at = remote.last_modified_at;
        entity.linkage = EntityLinkage::linked(
            remote.id.clone(),
            remote.revision_token.clone(),
            Utc::now(),
        );
        self.entities.update(entity).await
    }

    /// Push the local copy over the remote one, using the snapshot's
    /// revision token so the write lands on the revision that conflicted.
    async fn apply_local(
        &self,
        tenant_id: Uuid,
        mut entity: LocalEntity,
        remote: &RemoteRecord,
        client: Arc<dyn RemoteClient>,
    ) -> SyncResult<()> {
        let links = link_index_for(self.entities.as_ref(), tenant_id, entity.kind()).await?;
        let payload = mapper::to_remote(&entity, &links)?;
        let kind = entity.kind();
        let written = self
            .retry
            .execute(|| client.update(kind, &remote.id, &remote.revision_token, &payload))
            .await?;
        entity.updated_at = written.last_modified_at;
        entity.linkage = EntityLinkage::linked(
            written.id.clone(),
            written.revision_token.clone(),
            Utc::now(),
        );
        self.entities.update(entity).await
    }
}
