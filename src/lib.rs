//! Bidirectional synchronization between a multi-tenant legal practice
//! management platform and its external accounting provider.
//!
//! The engine pulls accounts, customers, vendors, invoices, payments and
//! bills from the provider into the local store, pushes never-synced local
//! records back, and records a conflict instead of overwriting when both
//! sides changed the same entity.
//!
//! ```text
//!                 +--------------------+
//!  host app ----> |     SyncEngine     | ----> RunStore (snapshots)
//!                 +---------+----------+
//!                     |           |
//!            +--------v---+   +---v------------+
//!            | Credential |   |   Conflict     |
//!            |  Manager   |   |   Manager      |
//!            +--------+---+   +---+------------+
//!                     |           |
//!              OAuthProvider   ConflictStore
//!              RemoteClient    EntityStore
//! ```
//!
//! Persistence and the HTTP edge are injected: the host supplies store
//! implementations and (outside tests) the [`http`] adapters.

pub mod conflict;
pub mod connection;
pub mod engine;
pub mod entity;
pub mod error;
pub mod http;
pub mod mapper;
pub mod remote;
pub mod retry;
pub mod store;
pub mod types;

pub use conflict::{ConflictManager, ConflictRecord};
pub use connection::{
    ConnectionRecord, ConnectionSettings, ConnectionStatus, CredentialManager, OAuthProvider,
    TokenGrant,
};
pub use engine::{ConflictRef, ItemError, RunSnapshot, SyncEngine, SyncSummary};
pub use entity::{EntityData, EntityLinkage, LocalEntity, Money};
pub use error::{SyncError, SyncResult};
pub use remote::{
    RemoteAccess, RemoteClient, RemoteClientFactory, RemotePage, RemoteRecord, DEFAULT_PAGE_SIZE,
};
pub use retry::{RetryExecutor, RetryPolicy};
pub use store::{ConflictStore, ConnectionStore, EntityStore, RunStore};
pub use types::{
    ConflictPolicy, ConflictStatus, EntityKind, RunPhase, SyncDirection, TokenState,
};
