//! Narrow interfaces over the host application's persistence.
//!
//! The engine never talks to a database directly: the encrypted connection
//! store, the entity store and the conflict store are collaborators the
//! host injects at the composition root. [`memory`] provides in-memory
//! implementations used by tests and as the reference semantics for real
//! adapters.

pub mod memory;

use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;

use crate::conflict::ConflictRecord;
use crate::connection::ConnectionRecord;
use crate::engine::RunSnapshot;
use crate::entity::LocalEntity;
use crate::error::SyncResult;
use crate::mapper::LinkIndex;
use crate::types::EntityKind;

/// Encrypted persistence of per-tenant connection records.
///
/// Encryption at rest is the implementation's concern; the engine only
/// requires replace-on-write semantics for `save`.
#[async_trait]
pub trait ConnectionStore: Send + Sync {
    /// Load a tenant's connection, if any.
    async fn load(&self, tenant_id: Uuid) -> SyncResult<Option<ConnectionRecord>>;

    /// Persist a connection record, replacing any existing one atomically.
    async fn save(&self, record: ConnectionRecord) -> SyncResult<()>;

    /// Delete a tenant's connection.
    async fn delete(&self, tenant_id: Uuid) -> SyncResult<()>;
}

/// Keyed upsert store over locally-persisted entities.
///
/// Implementations must reject any write that would leave two entities of
/// the same `(tenant, kind)` claiming one remote id.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Fetch one entity by local id.
    async fn get(&self, tenant_id: Uuid, id: Uuid) -> SyncResult<Option<LocalEntity>>;

    /// Fetch the entity linked to a remote record, if any.
    async fn find_by_remote_id(
        &self,
        tenant_id: Uuid,
        kind: EntityKind,
        remote_id: &str,
    ) -> SyncResult<Option<LocalEntity>>;

    /// Entities of a kind that were never pushed (`remote_id` unset).
    async fn find_unpushed(&self, tenant_id: Uuid, kind: EntityKind)
        -> SyncResult<Vec<LocalEntity>>;

    /// Insert a new entity.
    async fn insert(&self, entity: LocalEntity) -> SyncResult<()>;

    /// Update an existing entity.
    async fn update(&self, entity: LocalEntity) -> SyncResult<()>;

    /// Remote-id to local-id map for a kind, used to resolve foreign keys
    /// during mapping.
    async fn link_index(
        &self,
        tenant_id: Uuid,
        kind: EntityKind,
    ) -> SyncResult<HashMap<String, Uuid>>;
}

/// Build the reference-resolution index for mapping records of `kind`:
/// the linkages of the kind itself plus every kind it references.
pub async fn link_index_for(
    store: &dyn EntityStore,
    tenant_id: Uuid,
    kind: EntityKind,
) -> SyncResult<LinkIndex> {
    let mut index = LinkIndex::new();
    for indexed in std::iter::once(kind).chain(kind.references().iter().copied()) {
        for (remote_id, local_id) in store.link_index(tenant_id, indexed).await? {
            index.insert(indexed, remote_id, local_id);
        }
    }
    Ok(index)
}

/// Persistence of conflict records.
#[async_trait]
pub trait ConflictStore: Send + Sync {
    /// Insert a new conflict record.
    async fn insert(&self, record: ConflictRecord) -> SyncResult<()>;

    /// Fetch one conflict by id.
    async fn get(&self, tenant_id: Uuid, id: Uuid) -> SyncResult<Option<ConflictRecord>>;

    /// Update an existing conflict record.
    async fn update(&self, record: ConflictRecord) -> SyncResult<()>;

    /// All pending conflicts for a tenant.
    async fn list_pending(&self, tenant_id: Uuid) -> SyncResult<Vec<ConflictRecord>>;

    /// The pending conflict for one local entity, if any. A repeated sync
    /// run must not stack duplicate conflicts on the same entity.
    async fn find_pending_for_entity(
        &self,
        tenant_id: Uuid,
        local_entity_id: Uuid,
    ) -> SyncResult<Option<ConflictRecord>>;
}

/// Persistence of the last run summary per tenant and entity kind.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Persist a run snapshot, replacing the previous one for its key.
    async fn save(&self, snapshot: RunSnapshot) -> SyncResult<()>;

    /// The most recent snapshot for a tenant and kind.
    async fn last(&self, tenant_id: Uuid, kind: EntityKind) -> SyncResult<Option<RunSnapshot>>;
}
