//! Customer mapping.

use serde_json::{json, Value};

use crate::entity::CustomerData;
use crate::error::SyncResult;
use crate::remote::RemoteRecord;

use super::{money_field, opt_bool, opt_str, req_str};

pub(super) fn to_local(record: &RemoteRecord) -> SyncResult<CustomerData> {
    let fields = &record.fields;
    Ok(CustomerData {
        display_name: req_str(fields, "DisplayName")?,
        given_name: opt_str(fields, "GivenName"),
        family_name: opt_str(fields, "FamilyName"),
        company_name: opt_str(fields, "CompanyName"),
        email: fields
            .get("PrimaryEmailAddr")
            .and_then(|e| e.get("Address"))
            .and_then(Value::as_str)
            .map(ToString::to_string),
        phone: fields
            .get("PrimaryPhone")
            .and_then(|p| p.get("FreeFormNumber"))
            .and_then(Value::as_str)
            .map(ToString::to_string),
        balance: money_field(fields, "Balance")?,
        active: opt_bool(fields, "Active", true),
    })
}

pub(super) fn to_remote(data: &CustomerData) -> SyncResult<Value> {
    let mut payload = json!({
        "DisplayName": data.display_name,
        "Active": data.active,
    });
    if let Some(given) = &data.given_name {
        payload["GivenName"] = Value::String(given.clone());
    }
    if let Some(family) = &data.family_name {
        payload["FamilyName"] = Value::String(family.clone());
    }
    if let Some(company) = &data.company_name {
        payload["CompanyName"] = Value::String(company.clone());
    }
    if let Some(email) = &data.email {
        payload["PrimaryEmailAddr"] = json!({"Address": email});
    }
    if let Some(phone) = &data.phone {
        payload["PrimaryPhone"] = json!({"FreeFormNumber": phone});
    }
    // Balance is provider-computed and never pushed.
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Money;
    use chrono::Utc;
    use serde_json::json;

    fn record(fields: Value) -> RemoteRecord {
        RemoteRecord {
            id: "61".to_string(),
            revision_token: "2".to_string(),
            last_modified_at: Utc::now(),
            fields,
        }
    }

    #[test]
    fn maps_full_customer_record() {
        let data = to_local(&record(json!({
            "DisplayName": "Whitfield Estates",
            "GivenName": "Dana",
            "FamilyName": "Whitfield",
            "CompanyName": "Whitfield Estates LLC",
            "PrimaryEmailAddr": {"Address": "dana@whitfield.example"},
            "PrimaryPhone": {"FreeFormNumber": "(555) 010-2288"},
            "Balance": 1250.00,
            "Active": true,
        })))
        .unwrap();

        assert_eq!(data.display_name, "Whitfield Estates");
        assert_eq!(data.given_name.as_deref(), Some("Dana"));
        assert_eq!(data.email.as_deref(), Some("dana@whitfield.example"));
        assert_eq!(data.phone.as_deref(), Some("(555) 010-2288"));
        assert_eq!(data.balance.minor_units, 125_000);
        assert!(data.active);
    }

    #[test]
    fn sparse_record_maps_with_defaults() {
        let data = to_local(&record(json!({"DisplayName": "Walk-in"}))).unwrap();
        assert_eq!(data.display_name, "Walk-in");
        assert!(data.given_name.is_none());
        assert!(data.email.is_none());
        assert_eq!(data.balance, Money::zero());
        assert!(data.active);
    }

    #[test]
    fn missing_display_name_is_a_mapping_error() {
        assert!(to_local(&record(json!({"GivenName": "Dana"}))).is_err());
    }

    #[test]
    fn remote_payload_nests_contact_fields() {
        let data = CustomerData {
            display_name: "Whitfield Estates".to_string(),
            given_name: None,
            family_name: None,
            company_name: Some("Whitfield Estates LLC".to_string()),
            email: Some("dana@whitfield.example".to_string()),
            phone: None,
            balance: Money::zero(),
            active: false,
        };
        let payload = to_remote(&data).unwrap();
        assert_eq!(payload["DisplayName"], "Whitfield Estates");
        assert_eq!(payload["PrimaryEmailAddr"]["Address"], "dana@whitfield.example");
        assert_eq!(payload["Active"], false);
        assert!(payload.get("GivenName").is_none());
        assert!(payload.get("Balance").is_none());
    }
}
