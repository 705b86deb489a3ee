//! Bidirectional mapping between the local schema and the remote provider.
//!
//! One mapper per entity kind, dispatched exhaustively over [`EntityKind`].
//! Mappers are pure: no clock reads, no store access. Foreign keys are
//! resolved through a [`LinkIndex`] snapshot the orchestrator builds before
//! mapping; a missing link maps to `None` and never fails the record.

mod account;
mod bill;
mod customer;
mod invoice;
mod payment;
mod vendor;

use chrono::NaiveDate;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

use crate::entity::{EntityData, LocalEntity, Money};
use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteRecord;
use crate::types::EntityKind;

/// Snapshot of remote-id/local-id pairs used to resolve references in both
/// directions during mapping.
#[derive(Debug, Default, Clone)]
pub struct LinkIndex {
    by_remote: HashMap<(EntityKind, String), Uuid>,
    by_local: HashMap<(EntityKind, Uuid), String>,
}

impl LinkIndex {
    /// Empty index; every reference maps to unlinked.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one linked pair.
    pub fn insert(&mut self, kind: EntityKind, remote_id: String, local_id: Uuid) {
        self.by_remote.insert((kind, remote_id.clone()), local_id);
        self.by_local.insert((kind, local_id), remote_id);
    }

    /// Local entity for a remote foreign key.
    #[must_use]
    pub fn local_for(&self, kind: EntityKind, remote_id: &str) -> Option<Uuid> {
        self.by_remote.get(&(kind, remote_id.to_string())).copied()
    }

    /// Remote id for a local foreign key.
    #[must_use]
    pub fn remote_for(&self, kind: EntityKind, local_id: Uuid) -> Option<&str> {
        self.by_local.get(&(kind, local_id)).map(String::as_str)
    }
}

/// Map a remote record into the local schema.
pub fn to_local(
    kind: EntityKind,
    record: &RemoteRecord,
    links: &LinkIndex,
) -> SyncResult<EntityData> {
    match kind {
        EntityKind::Account => account::to_local(record).map(EntityData::Account),
        EntityKind::Customer => customer::to_local(record).map(EntityData::Customer),
        EntityKind::Vendor => vendor::to_local(record).map(EntityData::Vendor),
        EntityKind::Invoice => invoice::to_local(record, links).map(EntityData::Invoice),
        EntityKind::Payment => payment::to_local(record, links).map(EntityData::Payment),
        EntityKind::Bill => bill::to_local(record, links).map(EntityData::Bill),
    }
}

/// Map a local entity into a remote payload.
pub fn to_remote(entity: &LocalEntity, links: &LinkIndex) -> SyncResult<Value> {
    match &entity.data {
        EntityData::Account(data) => account::to_remote(data),
        EntityData::Customer(data) => customer::to_remote(data),
        EntityData::Vendor(data) => vendor::to_remote(data),
        EntityData::Invoice(data) => invoice::to_remote(data, links),
        EntityData::Payment(data) => payment::to_remote(data, links),
        EntityData::Bill(data) => bill::to_remote(data, links),
    }
}

// Field extraction helpers shared by the per-kind mappers. Remote payloads
// use the provider's PascalCase field names.

pub(crate) fn opt_str(fields: &Value, name: &str) -> Option<String> {
    fields
        .get(name)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

pub(crate) fn req_str(fields: &Value, name: &str) -> SyncResult<String> {
    opt_str(fields, name).ok_or_else(|| SyncError::mapping(name, "missing required field"))
}

pub(crate) fn opt_bool(fields: &Value, name: &str, default: bool) -> bool {
    fields.get(name).and_then(Value::as_bool).unwrap_or(default)
}

/// Nested reference value, e.g. `CustomerRef: { "value": "42" }`.
pub(crate) fn ref_value(fields: &Value, name: &str) -> Option<String> {
    fields
        .get(name)
        .and_then(|r| r.get("value"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Monetary field; absent means zero. Amounts are normalized to two
/// decimal places before the minor-unit representation is derived.
pub(crate) fn money_field(fields: &Value, name: &str) -> SyncResult<Money> {
    match fields.get(name) {
        None | Some(Value::Null) => Ok(Money::zero()),
        Some(value) => {
            let raw = value
                .as_f64()
                .ok_or_else(|| SyncError::mapping(name, "expected a number"))?;
            let amount = Decimal::from_f64(raw)
                .ok_or_else(|| SyncError::mapping(name, "amount is not representable"))?
                .round_dp(2);
            Ok(Money::from_decimal(amount))
        }
    }
}

/// Quantity or unit-rate field, normalized to four decimal places.
pub(crate) fn decimal_field(fields: &Value, name: &str, default: Decimal) -> SyncResult<Decimal> {
    match fields.get(name) {
        None | Some(Value::Null) => Ok(default),
        Some(value) => {
            let raw = value
                .as_f64()
                .ok_or_else(|| SyncError::mapping(name, "expected a number"))?;
            Decimal::from_f64(raw)
                .map(|d| d.round_dp(4))
                .ok_or_else(|| SyncError::mapping(name, "value is not representable"))
        }
    }
}

/// ISO date field (`YYYY-MM-DD`); absent maps to `None`, malformed fails.
pub(crate) fn opt_date(fields: &Value, name: &str) -> SyncResult<Option<NaiveDate>> {
    match fields.get(name).and_then(Value::as_str) {
        None => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| SyncError::mapping(name, format!("invalid date: {raw}"))),
    }
}

/// Decimal amount as a JSON number for the remote payload.
pub(crate) fn money_json(money: Money) -> Value {
    decimal_json(money.amount)
}

pub(crate) fn decimal_json(value: Decimal) -> Value {
    serde_json::Number::from_f64(value.to_f64().unwrap_or(0.0))
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

pub(crate) fn date_json(date: NaiveDate) -> Value {
    Value::String(date.format("%Y-%m-%d").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn link_index_resolves_both_directions() {
        let mut links = LinkIndex::new();
        let local = Uuid::new_v4();
        links.insert(EntityKind::Customer, "77".to_string(), local);

        assert_eq!(links.local_for(EntityKind::Customer, "77"), Some(local));
        assert_eq!(links.remote_for(EntityKind::Customer, local), Some("77"));

        // Unknown keys and wrong kinds stay unlinked.
        assert_eq!(links.local_for(EntityKind::Customer, "78"), None);
        assert_eq!(links.local_for(EntityKind::Vendor, "77"), None);
        assert_eq!(links.remote_for(EntityKind::Vendor, local), None);
    }

    #[test]
    fn money_field_populates_both_representations() {
        let fields = json!({"TotalAmt": 150.25});
        let money = money_field(&fields, "TotalAmt").unwrap();
        assert_eq!(money.amount.to_string(), "150.25");
        assert_eq!(money.minor_units, 15_025);
    }

    #[test]
    fn money_field_defaults_to_zero() {
        let fields = json!({});
        assert_eq!(money_field(&fields, "Balance").unwrap(), Money::zero());

        let fields = json!({"Balance": null});
        assert_eq!(money_field(&fields, "Balance").unwrap(), Money::zero());
    }

    #[test]
    fn money_field_rejects_non_numbers() {
        let fields = json!({"TotalAmt": "150.25"});
        assert!(matches!(
            money_field(&fields, "TotalAmt"),
            Err(SyncError::Mapping { .. })
        ));
    }

    #[test]
    fn date_parsing() {
        let fields = json!({"TxnDate": "2025-11-03"});
        let date = opt_date(&fields, "TxnDate").unwrap().unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 11, 3).unwrap());

        assert_eq!(opt_date(&json!({}), "TxnDate").unwrap(), None);
        assert!(opt_date(&json!({"TxnDate": "03/11/2025"}), "TxnDate").is_err());
    }

    #[test]
    fn ref_value_extraction() {
        let fields = json!({"CustomerRef": {"value": "42", "name": "Acme"}});
        assert_eq!(ref_value(&fields, "CustomerRef"), Some("42".to_string()));
        assert_eq!(ref_value(&fields, "VendorRef"), None);
        assert_eq!(ref_value(&json!({"CustomerRef": {"value": ""}}), "CustomerRef"), None);
    }

    #[test]
    fn req_str_reports_field_name() {
        let err = req_str(&json!({}), "DisplayName").unwrap_err();
        assert!(err.to_string().contains("DisplayName"));
    }
}
