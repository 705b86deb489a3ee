//! Common types for accounting synchronization.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of entity types exchanged with the accounting provider.
///
/// Dispatch over entity types is exhaustive: every kind carries its own
/// mapper and remote resource binding, so an unknown entity type cannot
/// exist at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Chart-of-accounts entry.
    Account,
    /// Client billed through the practice.
    Customer,
    /// Supplier the practice purchases from.
    Vendor,
    /// Outbound invoice with line items.
    Invoice,
    /// Payment received against a customer.
    Payment,
    /// Inbound bill from a vendor.
    Bill,
}

impl EntityKind {
    /// All kinds in dependency order: referenced kinds sync before kinds
    /// that reference them, so foreign keys resolve on the first pass.
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Account,
        EntityKind::Customer,
        EntityKind::Vendor,
        EntityKind::Invoice,
        EntityKind::Payment,
        EntityKind::Bill,
    ];

    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Account => "account",
            EntityKind::Customer => "customer",
            EntityKind::Vendor => "vendor",
            EntityKind::Invoice => "invoice",
            EntityKind::Payment => "payment",
            EntityKind::Bill => "bill",
        }
    }

    /// Resource segment in the remote provider's API paths.
    #[must_use]
    pub fn remote_resource(&self) -> &'static str {
        match self {
            EntityKind::Account => "accounts",
            EntityKind::Customer => "customers",
            EntityKind::Vendor => "vendors",
            EntityKind::Invoice => "invoices",
            EntityKind::Payment => "payments",
            EntityKind::Bill => "bills",
        }
    }

    /// Kinds this kind holds foreign keys into.
    #[must_use]
    pub fn references(&self) -> &'static [EntityKind] {
        match self {
            EntityKind::Account | EntityKind::Customer | EntityKind::Vendor => &[],
            EntityKind::Invoice | EntityKind::Payment => &[EntityKind::Customer],
            EntityKind::Bill => &[EntityKind::Vendor],
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "account" => Ok(EntityKind::Account),
            "customer" => Ok(EntityKind::Customer),
            "vendor" => Ok(EntityKind::Vendor),
            "invoice" => Ok(EntityKind::Invoice),
            "payment" => Ok(EntityKind::Payment),
            "bill" => Ok(EntityKind::Bill),
            _ => Err(format!("Unknown entity kind: {s}")),
        }
    }
}

/// Direction of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    /// Remote to local.
    Pull,
    /// Local to remote (never-pushed records only).
    Push,
    /// Pull, then push, sequentially.
    Both,
}

impl SyncDirection {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncDirection::Pull => "pull",
            SyncDirection::Push => "push",
            SyncDirection::Both => "both",
        }
    }

    /// Check if this direction includes the pull phase.
    #[must_use]
    pub fn includes_pull(&self) -> bool {
        matches!(self, SyncDirection::Pull | SyncDirection::Both)
    }

    /// Check if this direction includes the push phase.
    #[must_use]
    pub fn includes_push(&self) -> bool {
        matches!(self, SyncDirection::Push | SyncDirection::Both)
    }
}

impl fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SyncDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pull" => Ok(SyncDirection::Pull),
            "push" => Ok(SyncDirection::Push),
            "both" => Ok(SyncDirection::Both),
            _ => Err(format!("Unknown sync direction: {s}")),
        }
    }
}

/// Policy applied when resolving a detected conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Remote copy overwrites local.
    RemoteWins,
    /// Local copy is pushed to the remote.
    LocalWins,
    /// Whichever copy was modified last wins.
    NewestWins,
    /// No automatic action; an operator resolves explicitly.
    Manual,
}

impl ConflictPolicy {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictPolicy::RemoteWins => "remote_wins",
            ConflictPolicy::LocalWins => "local_wins",
            ConflictPolicy::NewestWins => "newest_wins",
            ConflictPolicy::Manual => "manual",
        }
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "remote_wins" => Ok(ConflictPolicy::RemoteWins),
            "local_wins" => Ok(ConflictPolicy::LocalWins),
            "newest_wins" => Ok(ConflictPolicy::NewestWins),
            "manual" => Ok(ConflictPolicy::Manual),
            _ => Err(format!("Unknown conflict policy: {s}")),
        }
    }
}

/// Lifecycle status of a conflict record.
///
/// Pending is the only non-terminal state; resolution flips the status and
/// retains the record for audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStatus {
    /// Awaiting resolution.
    Pending,
    /// Resolved; terminal.
    Resolved,
}

impl ConflictStatus {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictStatus::Pending => "pending",
            ConflictStatus::Resolved => "resolved",
        }
    }

    /// Check if this is a terminal status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConflictStatus::Resolved)
    }
}

impl fmt::Display for ConflictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ConflictStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ConflictStatus::Pending),
            "resolved" => Ok(ConflictStatus::Resolved),
            _ => Err(format!("Unknown conflict status: {s}")),
        }
    }
}

/// State of a tenant's access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenState {
    /// Access token valid beyond the refresh window.
    Active,
    /// Access token inside the refresh window; next use refreshes it.
    NeedsRefresh,
    /// Refresh token expired; re-authorization required.
    Expired,
}

impl TokenState {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenState::Active => "active",
            TokenState::NeedsRefresh => "needs_refresh",
            TokenState::Expired => "expired",
        }
    }
}

impl fmt::Display for TokenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TokenState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(TokenState::Active),
            "needs_refresh" => Ok(TokenState::NeedsRefresh),
            "expired" => Ok(TokenState::Expired),
            _ => Err(format!("Unknown token state: {s}")),
        }
    }
}

/// Phase of a sync run.
///
/// A run moves Fetching → Mapping → Reconciling → Writing → Completed.
/// Failed is reachable from any phase, but only on run-fatal errors;
/// per-item failures never fail the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    /// Listing remote or local records.
    Fetching,
    /// Translating between schemas.
    Mapping,
    /// Conflict detection.
    Reconciling,
    /// Upserting local or remote records.
    Writing,
    /// Run finished; summary persisted.
    Completed,
    /// Run aborted on an auth or configuration error.
    Failed,
}

impl RunPhase {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RunPhase::Fetching => "fetching",
            RunPhase::Mapping => "mapping",
            RunPhase::Reconciling => "reconciling",
            RunPhase::Writing => "writing",
            RunPhase::Completed => "completed",
            RunPhase::Failed => "failed",
        }
    }

    /// Check if this is a terminal phase.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Completed | RunPhase::Failed)
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
