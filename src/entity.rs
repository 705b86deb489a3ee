//! Local entity model and remote linkage.
//!
//! These are the canonical shapes the practice-management side exposes to
//! the sync engine. Persistence of the entities themselves belongs to the
//! host application; the engine only reads and upserts them through the
//! [`crate::store::EntityStore`] interface.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::types::EntityKind;

/// Monetary value carried in both representations.
///
/// Every mapping populates both fields so downstream consumers can pick
/// either without re-deriving it under different rounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// Decimal amount in major units.
    pub amount: Decimal,
    /// Amount in minor units, `round(amount * 100)`.
    pub minor_units: i64,
}

impl Money {
    /// Build from a decimal major-unit amount.
    #[must_use]
    pub fn from_decimal(amount: Decimal) -> Self {
        let minor = (amount * Decimal::from(100)).round();
        Self {
            amount,
            minor_units: minor.to_i64().unwrap_or(0),
        }
    }

    /// Zero in both representations.
    #[must_use]
    pub fn zero() -> Self {
        Self {
            amount: Decimal::ZERO,
            minor_units: 0,
        }
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

/// Linkage between a local entity and its remote counterpart.
///
/// `remote_id == None` means the entity was never pushed. A non-null
/// `remote_id` is unique per `(tenant, kind)`: no two local records may
/// claim the same remote record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityLinkage {
    /// Remote record id, if ever synced.
    pub remote_id: Option<String>,
    /// Opaque revision token the remote requires for updates.
    pub remote_revision_token: Option<String>,
    /// When this entity last round-tripped with the remote.
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl EntityLinkage {
    /// Linkage for a record imported from the remote.
    #[must_use]
    pub fn linked(remote_id: String, revision_token: String, synced_at: DateTime<Utc>) -> Self {
        Self {
            remote_id: Some(remote_id),
            remote_revision_token: Some(revision_token),
            last_synced_at: Some(synced_at),
        }
    }

    /// Check if the entity has a remote counterpart.
    #[must_use]
    pub fn is_linked(&self) -> bool {
        self.remote_id.is_some()
    }
}

/// Chart-of-accounts category, the local closed vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountCategory {
    Asset,
    Liability,
    Equity,
    Income,
    Expense,
    /// Safe fallback for remote account types with no local equivalent.
    Other,
}

impl AccountCategory {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountCategory::Asset => "asset",
            AccountCategory::Liability => "liability",
            AccountCategory::Equity => "equity",
            AccountCategory::Income => "income",
            AccountCategory::Expense => "expense",
            AccountCategory::Other => "other",
        }
    }
}

impl fmt::Display for AccountCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Invoice status in the local vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Issued, awaiting payment. Also the safe fallback.
    Open,
    Paid,
    Overdue,
    Voided,
}

impl InvoiceStatus {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Open => "open",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Voided => "voided",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payment method in the local vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Check,
    CreditCard,
    BankTransfer,
    /// Safe fallback for unmapped remote methods.
    Other,
}

impl PaymentMethod {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Check => "check",
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Other => "other",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Chart-of-accounts entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountData {
    pub name: String,
    pub number: Option<String>,
    pub category: AccountCategory,
    pub active: bool,
    pub balance: Money,
}

/// Billable client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerData {
    pub display_name: String,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub company_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub balance: Money,
    pub active: bool,
}

/// Supplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorData {
    pub display_name: String,
    pub company_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub balance: Money,
    pub active: bool,
}

/// One line of an invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub description: Option<String>,
    pub quantity: Decimal,
    pub unit_price: Money,
    pub amount: Money,
}

/// Outbound invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceData {
    pub doc_number: Option<String>,
    /// Local customer, resolved through linkage; `None` when the remote
    /// customer has not been imported yet.
    pub customer_id: Option<Uuid>,
    pub issued_on: Option<NaiveDate>,
    pub due_on: Option<NaiveDate>,
    pub status: InvoiceStatus,
    pub total: Money,
    pub balance: Money,
    pub lines: Vec<InvoiceLine>,
}

/// Payment received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentData {
    pub customer_id: Option<Uuid>,
    pub amount: Money,
    pub method: PaymentMethod,
    pub received_on: Option<NaiveDate>,
    pub reference: Option<String>,
}

/// One line of a vendor bill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillLine {
    pub description: Option<String>,
    pub amount: Money,
}

/// Inbound vendor bill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillData {
    pub vendor_id: Option<Uuid>,
    pub issued_on: Option<NaiveDate>,
    pub due_on: Option<NaiveDate>,
    pub total: Money,
    pub balance: Money,
    pub lines: Vec<BillLine>,
}

/// Per-kind payload of a local entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityData {
    Account(AccountData),
    Customer(CustomerData),
    Vendor(VendorData),
    Invoice(InvoiceData),
    Payment(PaymentData),
    Bill(BillData),
}

impl EntityData {
    /// The kind this payload belongs to.
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityData::Account(_) => EntityKind::Account,
            EntityData::Customer(_) => EntityKind::Customer,
            EntityData::Vendor(_) => EntityKind::Vendor,
            EntityData::Invoice(_) => EntityKind::Invoice,
            EntityData::Payment(_) => EntityKind::Payment,
            EntityData::Bill(_) => EntityKind::Bill,
        }
    }
}

/// A locally-stored entity with its remote linkage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalEntity {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub data: EntityData,
    /// Last local modification. Sync writes set this to the remote's
    /// modification time so an unmodified rerun does not look like a
    /// concurrent local edit.
    pub updated_at: DateTime<Utc>,
    pub linkage: EntityLinkage,
}

impl LocalEntity {
    /// A brand-new local entity that has never been pushed.
    #[must_use]
    pub fn new(tenant_id: Uuid, data: EntityData, updated_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            data,
            updated_at,
            linkage: EntityLinkage::default(),
        }
    }

    /// An entity imported from a remote record.
    #[must_use]
    pub fn imported(
        tenant_id: Uuid,
        data: EntityData,
        remote_id: String,
        revision_token: String,
        remote_modified_at: DateTime<Utc>,
        synced_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            data,
            updated_at: remote_modified_at,
            linkage: EntityLinkage::linked(remote_id, revision_token, synced_at),
        }
    }

    /// The entity kind, derived from the payload.
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.data.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn money_populates_both_representations() {
        let m = Money::from_decimal(Decimal::from_str("1234.56").unwrap());
        assert_eq!(m.amount, Decimal::from_str("1234.56").unwrap());
        assert_eq!(m.minor_units, 123_456);
    }

    #[test]
    fn money_rounds_half_up_to_minor_units() {
        let m = Money::from_decimal(Decimal::from_str("0.005").unwrap());
        assert_eq!(m.minor_units, 1);

        let m = Money::from_decimal(Decimal::from_str("10.004").unwrap());
        assert_eq!(m.minor_units, 1000);
    }

    #[test]
    fn money_zero() {
        let m = Money::zero();
        assert_eq!(m.amount, Decimal::ZERO);
        assert_eq!(m.minor_units, 0);
    }

    #[test]
    fn linkage_states() {
        let unpushed = EntityLinkage::default();
        assert!(!unpushed.is_linked());
        assert!(unpushed.remote_id.is_none());

        let linked = EntityLinkage::linked("77".to_string(), "3".to_string(), Utc::now());
        assert!(linked.is_linked());
        assert_eq!(linked.remote_id.as_deref(), Some("77"));
    }

    #[test]
    fn entity_data_kind() {
        let data = EntityData::Customer(CustomerData {
            display_name: "Acme Legal".to_string(),
            given_name: None,
            family_name: None,
            company_name: Some("Acme Legal LLP".to_string()),
            email: None,
            phone: None,
            balance: Money::zero(),
            active: true,
        });
        assert_eq!(data.kind(), EntityKind::Customer);

        let entity = LocalEntity::new(Uuid::new_v4(), data, Utc::now());
        assert_eq!(entity.kind(), EntityKind::Customer);
        assert!(!entity.linkage.is_linked());
    }
}
