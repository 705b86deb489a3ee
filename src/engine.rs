//! Sync run orchestration.
//!
//! [`SyncEngine`] drives pull and push runs per tenant and entity kind,
//! guarding against overlapping runs, isolating per-item failures in the
//! run summary and recording a [`RunSnapshot`] for each run. It is also the
//! facade the host application calls for connection lifecycle and conflict
//! resolution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::conflict::{ConflictManager, ConflictRecord};
use crate::connection::{ConnectionRecord, ConnectionStatus, CredentialManager};
use crate::entity::{EntityData, EntityLinkage, LocalEntity};
use crate::error::{SyncError, SyncResult};
use crate::mapper::{self, LinkIndex};
use crate::remote::{RemoteClient, RemoteRecord, DEFAULT_PAGE_SIZE};
use crate::retry::RetryExecutor;
use crate::store::{link_index_for, ConflictStore, EntityStore, RunStore};
use crate::types::{ConflictPolicy, EntityKind, RunPhase, SyncDirection};

/// One record that failed inside an otherwise-continuing run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemError {
    pub kind: EntityKind,
    /// Remote id during pull, local id during push.
    pub item_id: String,
    pub message: String,
}

/// Pointer to a conflict recorded during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictRef {
    pub conflict_id: Uuid,
    pub local_entity_id: Uuid,
}

/// Accumulated outcome of one sync run.
///
/// Counters are disjoint: every processed record lands in exactly one of
/// them, and `errors`/`conflicts` carry the records that landed nowhere.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncSummary {
    /// Local records created from remote ones.
    pub created: u32,
    /// Local records overwritten with newer remote copies.
    pub updated: u32,
    /// Linked records whose remote revision had not moved.
    pub unchanged: u32,
    /// Local records created remote-side. This is the push-direction
    /// creation count; `created` only ever counts pull-direction imports,
    /// so the two never overlap.
    pub pushed: u32,
    /// Records skipped because a conflict was recorded.
    pub skipped: u32,
    pub errors: Vec<ItemError>,
    pub conflicts: Vec<ConflictRef>,
}

impl SyncSummary {
    /// Whether the run finished without item failures or open conflicts.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.conflicts.is_empty()
    }
}

/// Persisted state of one sync run, replaced per `(tenant, kind)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub tenant_id: Uuid,
    pub kind: EntityKind,
    pub direction: SyncDirection,
    pub phase: RunPhase,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub summary: SyncSummary,
}

/// A fetched record after the mapping step: either new to this tenant or
/// paired with the local entity linked to it.
enum PullItem {
    New { record: RemoteRecord, data: EntityData },
    Linked { record: RemoteRecord, local: LocalEntity },
}

/// Reconciliation outcome for one fetched record.
enum PullAction {
    Create {
        record: RemoteRecord,
        data: EntityData,
    },
    Update {
        record: RemoteRecord,
        local: LocalEntity,
    },
    Conflict {
        record: RemoteRecord,
        local: LocalEntity,
        reason: String,
    },
}

impl PullAction {
    fn remote_id(&self) -> &str {
        match self {
            Self::Create { record, .. }
            | Self::Update { record, .. }
            | Self::Conflict { record, .. } => &record.id,
        }
    }
}

/// Orchestrates sync runs and fronts the connection and conflict APIs.
pub struct SyncEngine {
    credentials: Arc<CredentialManager>,
    entities: Arc<dyn EntityStore>,
    conflicts: Arc<dyn ConflictStore>,
    conflict_manager: ConflictManager,
    runs: Arc<dyn RunStore>,
    retry: RetryExecutor,
    page_size: usize,
    in_flight: std::sync::Mutex<HashSet<(Uuid, EntityKind)>>,
}

impl SyncEngine {
    pub fn new(
        credentials: Arc<CredentialManager>,
        entities: Arc<dyn EntityStore>,
        conflicts: Arc<dyn ConflictStore>,
        runs: Arc<dyn RunStore>,
    ) -> Self {
        let retry = RetryExecutor::default();
        Self {
            conflict_manager: ConflictManager::new(
                conflicts.clone(),
                entities.clone(),
                retry.clone(),
            ),
            credentials,
            entities,
            conflicts,
            runs,
            retry,
            page_size: DEFAULT_PAGE_SIZE,
            in_flight: std::sync::Mutex::new(HashSet::new()),
        }
    }

    /// Replace the retry executor, also used for conflict resolution pushes.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryExecutor) -> Self {
        self.conflict_manager = ConflictManager::new(
            self.conflicts.clone(),
            self.entities.clone(),
            retry.clone(),
        );
        self.retry = retry;
        self
    }

    /// Replace the listing page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    // Connection lifecycle, delegated to the credential manager.

    /// Authorization URL to redirect the tenant's operator to.
    pub fn connect(&self, tenant_id: Uuid) -> String {
        self.credentials.connect(tenant_id)
    }

    /// Complete the authorization callback.
    pub async fn handle_callback(
        &self,
        code: &str,
        remote_company_id: &str,
        state: &str,
    ) -> SyncResult<ConnectionRecord> {
        self.credentials
            .handle_callback(code, remote_company_id, state)
            .await
    }

    /// Revoke and delete the tenant's connection.
    pub async fn disconnect(&self, tenant_id: Uuid) -> SyncResult<()> {
        self.credentials.disconnect(tenant_id).await
    }

    /// Connection status for reporting.
    pub async fn status(&self, tenant_id: Uuid) -> SyncResult<ConnectionStatus> {
        self.credentials.status(tenant_id).await
    }

    // Conflict surface.

    /// Pending conflicts for a tenant, oldest first.
    pub async fn list_conflicts(&self, tenant_id: Uuid) -> SyncResult<Vec<ConflictRecord>> {
        self.conflicts.list_pending(tenant_id).await
    }

    /// Resolve one pending conflict under an explicit policy.
    pub async fn resolve_conflict(
        &self,
        tenant_id: Uuid,
        conflict_id: Uuid,
        policy: ConflictPolicy,
    ) -> SyncResult<ConflictRecord> {
        let client = self.credentials.client_for(tenant_id).await?;
        self.conflict_manager
            .resolve(tenant_id, conflict_id, policy, client)
            .await
    }

    /// The last run snapshot for a tenant and kind.
    pub async fn last_run(
        &self,
        tenant_id: Uuid,
        kind: EntityKind,
    ) -> SyncResult<Option<RunSnapshot>> {
        self.runs.last(tenant_id, kind).await
    }

    // Sync runs.

    /// Run one sync for a tenant and entity kind.
    ///
    /// Per-item failures accumulate in the returned [`SyncSummary`]; only
    /// run-fatal errors (no connection, dead credentials, configuration)
    /// and cancellation surface as `Err`. The pull watermark advances only
    /// when the pull phase listed every page.
    #[instrument(skip(self, cancel), fields(tenant_id = %tenant_id, kind = %kind, direction = %direction))]
    pub async fn sync_entity(
        &self,
        tenant_id: Uuid,
        kind: EntityKind,
        direction: SyncDirection,
        cancel: &CancellationToken,
    ) -> SyncResult<SyncSummary> {
        let _guard = self.begin(tenant_id, kind)?;

        let connection = self.credentials.connection(tenant_id).await?;
        let client = self.credentials.client_for(tenant_id).await?;
        let started_at = Utc::now();

        let mut snapshot = RunSnapshot {
            tenant_id,
            kind,
            direction,
            phase: RunPhase::Fetching,
            started_at,
            finished_at: None,
            summary: SyncSummary::default(),
        };
        self.runs.save(snapshot.clone()).await?;

        let mut summary = SyncSummary::default();
        let outcome = self
            .run_phases(&mut snapshot, &connection, client, cancel, &mut summary)
            .await;

        snapshot.summary = summary.clone();
        snapshot.finished_at = Some(Utc::now());
        snapshot.phase = match outcome {
            Ok(()) => RunPhase::Completed,
            Err(_) => RunPhase::Failed,
        };
        self.runs.save(snapshot).await?;

        outcome?;
        info!(
            created = summary.created,
            updated = summary.updated,
            unchanged = summary.unchanged,
            pushed = summary.pushed,
            skipped = summary.skipped,
            errors = summary.errors.len(),
            "sync run completed"
        );
        Ok(summary)
    }

    /// Run syncs for several kinds sequentially, in the given order.
    ///
    /// Kinds should be ordered so referenced kinds come first (see
    /// [`EntityKind::ALL`]); foreign keys then resolve on the first pass.
    /// Cancellation is checked between kinds and between pages.
    pub async fn sync_all(
        &self,
        tenant_id: Uuid,
        kinds: &[EntityKind],
        direction: SyncDirection,
        cancel: &CancellationToken,
    ) -> SyncResult<HashMap<EntityKind, SyncSummary>> {
        let mut results = HashMap::new();
        for kind in kinds {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            let summary = self.sync_entity(tenant_id, *kind, direction, cancel).await?;
            results.insert(*kind, summary);
        }
        Ok(results)
    }

    async fn run_phases(
        &self,
        snapshot: &mut RunSnapshot,
        connection: &ConnectionRecord,
        client: Arc<dyn RemoteClient>,
        cancel: &CancellationToken,
        summary: &mut SyncSummary,
    ) -> SyncResult<()> {
        let tenant_id = snapshot.tenant_id;
        let kind = snapshot.kind;
        let direction = snapshot.direction;
        let policy = connection.settings.conflict_policy;

        if direction.includes_pull() {
            let watermark = connection.last_sync_at.get(&kind).copied();
            let (records, listed_everything) = self
                .fetch(kind, watermark, &client, cancel, summary)
                .await?;

            self.set_phase(snapshot, RunPhase::Mapping, summary).await?;
            let links = link_index_for(self.entities.as_ref(), tenant_id, kind).await?;
            let items = self
                .map_records(tenant_id, kind, records, &links, summary)
                .await?;

            self.set_phase(snapshot, RunPhase::Reconciling, summary)
                .await?;
            let actions = Self::reconcile(items, summary);

            self.set_phase(snapshot, RunPhase::Writing, summary).await?;
            self.apply(tenant_id, kind, actions, &links, policy, &client, cancel, summary)
                .await?;

            // The watermark is the run's start, not its end: records
            // modified while the run was listing are picked up next time.
            if listed_everything {
                self.credentials
                    .record_sync_time(tenant_id, kind, snapshot.started_at)
                    .await?;
            }
        }
        if direction.includes_push() {
            if snapshot.phase != RunPhase::Writing {
                self.set_phase(snapshot, RunPhase::Writing, summary).await?;
            }
            self.push(tenant_id, kind, client, cancel, summary).await?;
        }
        Ok(())
    }

    /// Advance the persisted snapshot to the next phase, carrying the
    /// counters accumulated so far.
    async fn set_phase(
        &self,
        snapshot: &mut RunSnapshot,
        phase: RunPhase,
        summary: &SyncSummary,
    ) -> SyncResult<()> {
        snapshot.phase = phase;
        snapshot.summary = summary.clone();
        self.runs.save(snapshot.clone()).await
    }

    /// List every page of remote changes since the watermark. Returns the
    /// fetched records and whether every page was listed; a failed listing
    /// ends the phase early without advancing the watermark.
    async fn fetch(
        &self,
        kind: EntityKind,
        watermark: Option<DateTime<Utc>>,
        client: &Arc<dyn RemoteClient>,
        cancel: &CancellationToken,
        summary: &mut SyncSummary,
    ) -> SyncResult<(Vec<RemoteRecord>, bool)> {
        let mut records = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            let page = match self
                .retry
                .execute(|| client.list(kind, watermark, cursor.as_deref(), self.page_size))
                .await
            {
                Ok(page) => page,
                Err(err) if err.is_run_fatal() => return Err(err),
                Err(err) => {
                    summary.errors.push(ItemError {
                        kind,
                        item_id: format!("page:{}", cursor.as_deref().unwrap_or("start")),
                        message: err.to_string(),
                    });
                    return Ok((records, false));
                }
            };
            records.extend(page.records);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => return Ok((records, true)),
            }
        }
    }

    /// Pair each fetched record with its linked local copy and translate
    /// the unlinked ones, which can only become creations. Linked records
    /// are translated later, once reconciliation has ruled out a conflict.
    async fn map_records(
        &self,
        tenant_id: Uuid,
        kind: EntityKind,
        records: Vec<RemoteRecord>,
        links: &LinkIndex,
        summary: &mut SyncSummary,
    ) -> SyncResult<Vec<PullItem>> {
        let mut items = Vec::with_capacity(records.len());
        for record in records {
            let local = match self
                .entities
                .find_by_remote_id(tenant_id, kind, &record.id)
                .await
            {
                Ok(local) => local,
                Err(err) if err.is_run_fatal() => return Err(err),
                Err(err) => {
                    summary.errors.push(ItemError {
                        kind,
                        item_id: record.id.clone(),
                        message: err.to_string(),
                    });
                    continue;
                }
            };
            match local {
                Some(local) => items.push(PullItem::Linked { record, local }),
                None => match mapper::to_local(kind, &record, links) {
                    Ok(data) => items.push(PullItem::New { record, data }),
                    Err(err) => summary.errors.push(ItemError {
                        kind,
                        item_id: record.id.clone(),
                        message: err.to_string(),
                    }),
                },
            }
        }
        Ok(items)
    }

    /// Decide what each mapped item means: import, overwrite, conflict, or
    /// nothing. Records whose remote revision has not moved are counted as
    /// unchanged and dropped here.
    fn reconcile(items: Vec<PullItem>, summary: &mut SyncSummary) -> Vec<PullAction> {
        let mut actions = Vec::with_capacity(items.len());
        for item in items {
            match item {
                PullItem::New { record, data } => {
                    actions.push(PullAction::Create { record, data });
                }
                PullItem::Linked { record, local } => {
                    if local.linkage.remote_revision_token.as_deref()
                        == Some(record.revision_token.as_str())
                    {
                        summary.unchanged += 1;
                    } else if let Some(reason) = ConflictManager::pull_conflict(&local, &record) {
                        actions.push(PullAction::Conflict {
                            record,
                            local,
                            reason,
                        });
                    } else {
                        actions.push(PullAction::Update { record, local });
                    }
                }
            }
        }
        actions
    }

    /// Apply the reconciled actions to the local store, isolating per-item
    /// failures.
    #[allow(clippy::too_many_arguments)]
    async fn apply(
        &self,
        tenant_id: Uuid,
        kind: EntityKind,
        actions: Vec<PullAction>,
        links: &LinkIndex,
        policy: ConflictPolicy,
        client: &Arc<dyn RemoteClient>,
        cancel: &CancellationToken,
        summary: &mut SyncSummary,
    ) -> SyncResult<()> {
        for action in actions {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            let item_id = action.remote_id().to_string();
            match self
                .apply_action(tenant_id, kind, action, links, policy, client, summary)
                .await
            {
                Ok(()) => {}
                Err(err) if err.is_run_fatal() => return Err(err),
                Err(err) => summary.errors.push(ItemError {
                    kind,
                    item_id,
                    message: err.to_string(),
                }),
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn apply_action(
        &self,
        tenant_id: Uuid,
        kind: EntityKind,
        action: PullAction,
        links: &LinkIndex,
        policy: ConflictPolicy,
        client: &Arc<dyn RemoteClient>,
        summary: &mut SyncSummary,
    ) -> SyncResult<()> {
        match action {
            PullAction::Create { record, data } => {
                let entity = LocalEntity::imported(
                    tenant_id,
                    data,
                    record.id.clone(),
                    record.revision_token.clone(),
                    record.last_modified_at,
                    Utc::now(),
                );
                self.entities.insert(entity).await?;
                summary.created += 1;
            }
            PullAction::Update { record, mut local } => {
                local.data = mapper::to_local(kind, &record, links)?;
                local.updated_at = record.last_modified_at;
                local.linkage = EntityLinkage::linked(
                    record.id.clone(),
                    record.revision_token.clone(),
                    Utc::now(),
                );
                self.entities.update(local).await?;
                summary.updated += 1;
            }
            PullAction::Conflict {
                record,
                local,
                reason,
            } => {
                let conflict = self
                    .conflict_manager
                    .record(tenant_id, &local, &record, reason)
                    .await?;
                summary.skipped += 1;
                summary.conflicts.push(ConflictRef {
                    conflict_id: conflict.id,
                    local_entity_id: local.id,
                });
                if policy != ConflictPolicy::Manual {
                    self.conflict_manager
                        .resolve(tenant_id, conflict.id, policy, client.clone())
                        .await?;
                }
            }
        }
        Ok(())
    }

    /// Push never-pushed local entities to the remote.
    async fn push(
        &self,
        tenant_id: Uuid,
        kind: EntityKind,
        client: Arc<dyn RemoteClient>,
        cancel: &CancellationToken,
        summary: &mut SyncSummary,
    ) -> SyncResult<()> {
        let unpushed = self.entities.find_unpushed(tenant_id, kind).await?;
        let links = link_index_for(self.entities.as_ref(), tenant_id, kind).await?;
        for entity in unpushed {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }
            let local_id = entity.id;
            match self.push_entity(entity, &links, &client).await {
                Ok(()) => summary.pushed += 1,
                Err(err) if err.is_run_fatal() => return Err(err),
                Err(err) => summary.errors.push(ItemError {
                    kind,
                    item_id: local_id.to_string(),
                    message: err.to_string(),
                }),
            }
        }
        Ok(())
    }

    async fn push_entity(
        &self,
        mut entity: LocalEntity,
        links: &LinkIndex,
        client: &Arc<dyn RemoteClient>,
    ) -> SyncResult<()> {
        let payload = mapper::to_remote(&entity, links)?;
        let kind = entity.kind();
        let created = self
            .retry
            .execute(|| client.create(kind, &payload))
            .await?;
        entity.linkage = EntityLinkage::linked(
            created.id.clone(),
            created.revision_token.clone(),
            Utc::now(),
        );
        self.entities.update(entity).await
    }

    /// Reserve the `(tenant, kind)` slot; at most one run may hold it.
    fn begin(&self, tenant_id: Uuid, kind: EntityKind) -> SyncResult<RunGuard<'_>> {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if !in_flight.insert((tenant_id, kind)) {
            return Err(SyncError::SyncInProgress {
                tenant_id,
                entity_kind: kind,
            });
        }
        Ok(RunGuard {
            engine: self,
            key: (tenant_id, kind),
        })
    }
}

/// Releases the in-flight slot when a run ends, on any path out.
struct RunGuard<'a> {
    engine: &'a SyncEngine,
    key: (Uuid, EntityKind),
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        let mut in_flight = self
            .engine
            .in_flight
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        in_flight.remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_is_clean_only_without_errors_or_conflicts() {
        let mut summary = SyncSummary::default();
        assert!(summary.is_clean());

        summary.created = 5;
        summary.unchanged = 2;
        assert!(summary.is_clean());

        summary.errors.push(ItemError {
            kind: EntityKind::Invoice,
            item_id: "9001".to_string(),
            message: "missing CustomerRef".to_string(),
        });
        assert!(!summary.is_clean());
    }
}
