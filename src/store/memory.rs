//! In-memory store implementations.
//!
//! Reference semantics for the store traits, and the backing used by the
//! engine's tests. Real deployments supply database-backed adapters from
//! the host application.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::conflict::ConflictRecord;
use crate::connection::ConnectionRecord;
use crate::engine::RunSnapshot;
use crate::entity::LocalEntity;
use crate::error::{SyncError, SyncResult};
use crate::types::{ConflictStatus, EntityKind};

use super::{ConflictStore, ConnectionStore, EntityStore, RunStore};

/// In-memory [`ConnectionStore`].
#[derive(Default)]
pub struct InMemoryConnectionStore {
    inner: RwLock<HashMap<Uuid, ConnectionRecord>>,
}

#[async_trait]
impl ConnectionStore for InMemoryConnectionStore {
    async fn load(&self, tenant_id: Uuid) -> SyncResult<Option<ConnectionRecord>> {
        Ok(self.inner.read().await.get(&tenant_id).cloned())
    }

    async fn save(&self, record: ConnectionRecord) -> SyncResult<()> {
        self.inner.write().await.insert(record.tenant_id, record);
        Ok(())
    }

    async fn delete(&self, tenant_id: Uuid) -> SyncResult<()> {
        self.inner.write().await.remove(&tenant_id);
        Ok(())
    }
}

/// In-memory [`EntityStore`] enforcing the unique-linkage invariant.
#[derive(Default)]
pub struct InMemoryEntityStore {
    inner: RwLock<HashMap<Uuid, LocalEntity>>,
}

impl InMemoryEntityStore {
    /// Number of stored entities of a kind for a tenant.
    pub async fn count(&self, tenant_id: Uuid, kind: EntityKind) -> usize {
        self.inner
            .read()
            .await
            .values()
            .filter(|e| e.tenant_id == tenant_id && e.kind() == kind)
            .count()
    }

    /// All entities of a kind for a tenant, in unspecified order.
    pub async fn all(&self, tenant_id: Uuid, kind: EntityKind) -> Vec<LocalEntity> {
        self.inner
            .read()
            .await
            .values()
            .filter(|e| e.tenant_id == tenant_id && e.kind() == kind)
            .cloned()
            .collect()
    }

    fn assert_unique_linkage(
        entities: &HashMap<Uuid, LocalEntity>,
        candidate: &LocalEntity,
    ) -> SyncResult<()> {
        let Some(remote_id) = candidate.linkage.remote_id.as_deref() else {
            return Ok(());
        };
        let taken = entities.values().any(|other| {
            other.id != candidate.id
                && other.tenant_id == candidate.tenant_id
                && other.kind() == candidate.kind()
                && other.linkage.remote_id.as_deref() == Some(remote_id)
        });
        if taken {
            return Err(SyncError::store(format!(
                "remote id {remote_id} already linked to another {} entity",
                candidate.kind()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn get(&self, tenant_id: Uuid, id: Uuid) -> SyncResult<Option<LocalEntity>> {
        Ok(self
            .inner
            .read()
            .await
            .get(&id)
            .filter(|e| e.tenant_id == tenant_id)
            .cloned())
    }

    async fn find_by_remote_id(
        &self,
        tenant_id: Uuid,
        kind: EntityKind,
        remote_id: &str,
    ) -> SyncResult<Option<LocalEntity>> {
        Ok(self
            .inner
            .read()
            .await
            .values()
            .find(|e| {
                e.tenant_id == tenant_id
                    && e.kind() == kind
                    && e.linkage.remote_id.as_deref() == Some(remote_id)
            })
            .cloned())
    }

    async fn find_unpushed(
        &self,
        tenant_id: Uuid,
        kind: EntityKind,
    ) -> SyncResult<Vec<LocalEntity>> {
        Ok(self
            .inner
            .read()
            .await
            .values()
            .filter(|e| {
                e.tenant_id == tenant_id && e.kind() == kind && e.linkage.remote_id.is_none()
            })
            .cloned()
            .collect())
    }

    async fn insert(&self, entity: LocalEntity) -> SyncResult<()> {
        let mut entities = self.inner.write().await;
        if entities.contains_key(&entity.id) {
            return Err(SyncError::store(format!(
                "entity {} already exists",
                entity.id
            )));
        }
        Self::assert_unique_linkage(&entities, &entity)?;
        entities.insert(entity.id, entity);
        Ok(())
    }

    async fn update(&self, entity: LocalEntity) -> SyncResult<()> {
        let mut entities = self.inner.write().await;
        if !entities.contains_key(&entity.id) {
            return Err(SyncError::not_found("entity", entity.id.to_string()));
        }
        Self::assert_unique_linkage(&entities, &entity)?;
        entities.insert(entity.id, entity);
        Ok(())
    }

    async fn link_index(
        &self,
        tenant_id: Uuid,
        kind: EntityKind,
    ) -> SyncResult<HashMap<String, Uuid>> {
        Ok(self
            .inner
            .read()
            .await
            .values()
            .filter(|e| e.tenant_id == tenant_id && e.kind() == kind)
            .filter_map(|e| e.linkage.remote_id.clone().map(|rid| (rid, e.id)))
            .collect())
    }
}

/// In-memory [`ConflictStore`].
#[derive(Default)]
pub struct InMemoryConflictStore {
    inner: RwLock<HashMap<Uuid, ConflictRecord>>,
}

#[async_trait]
impl ConflictStore for InMemoryConflictStore {
    async fn insert(&self, record: ConflictRecord) -> SyncResult<()> {
        self.inner.write().await.insert(record.id, record);
        Ok(())
    }

    async fn get(&self, tenant_id: Uuid, id: Uuid) -> SyncResult<Option<ConflictRecord>> {
        Ok(self
            .inner
            .read()
            .await
            .get(&id)
            .filter(|c| c.tenant_id == tenant_id)
            .cloned())
    }

    async fn update(&self, record: ConflictRecord) -> SyncResult<()> {
        let mut conflicts = self.inner.write().await;
        if !conflicts.contains_key(&record.id) {
            return Err(SyncError::not_found("conflict", record.id.to_string()));
        }
        conflicts.insert(record.id, record);
        Ok(())
    }

    async fn list_pending(&self, tenant_id: Uuid) -> SyncResult<Vec<ConflictRecord>> {
        let mut pending: Vec<ConflictRecord> = self
            .inner
            .read()
            .await
            .values()
            .filter(|c| c.tenant_id == tenant_id && c.status == ConflictStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|c| c.created_at);
        Ok(pending)
    }

    async fn find_pending_for_entity(
        &self,
        tenant_id: Uuid,
        local_entity_id: Uuid,
    ) -> SyncResult<Option<ConflictRecord>> {
        Ok(self
            .inner
            .read()
            .await
            .values()
            .find(|c| {
                c.tenant_id == tenant_id
                    && c.local_entity_id == local_entity_id
                    && c.status == ConflictStatus::Pending
            })
            .cloned())
    }
}

/// In-memory [`RunStore`].
#[derive(Default)]
pub struct InMemoryRunStore {
    inner: RwLock<HashMap<(Uuid, EntityKind), RunSnapshot>>,
}

#[async_trait]
impl RunStore for InMemoryRunStore {
    async fn save(&self, snapshot: RunSnapshot) -> SyncResult<()> {
        self.inner
            .write()
            .await
            .insert((snapshot.tenant_id, snapshot.kind), snapshot);
        Ok(())
    }

    async fn last(&self, tenant_id: Uuid, kind: EntityKind) -> SyncResult<Option<RunSnapshot>> {
        Ok(self.inner.read().await.get(&(tenant_id, kind)).cloned())
    }
}
