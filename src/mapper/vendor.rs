//! Vendor mapping.

use serde_json::{json, Value};

use crate::entity::VendorData;
use crate::error::SyncResult;
use crate::remote::RemoteRecord;

use super::{money_field, opt_bool, opt_str, req_str};

pub(super) fn to_local(record: &RemoteRecord) -> SyncResult<VendorData> {
    let fields = &record.fields;
    Ok(VendorData {
        display_name: req_str(fields, "DisplayName")?,
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

pub(super) fn to_remote(data: &VendorData) -> SyncResult<Value> {
    let mut payload = json!({
        "DisplayName": data.display_name,
        "Active": data.active,
    });
    if let Some(company) = &data.company_name {
        payload["CompanyName"] = Value::String(company.clone());
    }
    if let Some(email) = &data.email {
        payload["PrimaryEmailAddr"] = json!({"Address": email});
    }
    if let Some(phone) = &data.phone {
        payload["PrimaryPhone"] = json!({"FreeFormNumber": phone});
    }
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
            id: "33".to_string(),
            revision_token: "1".to_string(),
            last_modified_at: Utc::now(),
            fields,
        }
    }

    #[test]
    fn maps_full_vendor_record() {
        let data = to_local(&record(json!({
            "DisplayName": "Meridian Court Reporting",
            "CompanyName": "Meridian Court Reporting Inc",
            "PrimaryEmailAddr": {"Address": "billing@meridiancr.example"},
            "Balance": 480.50,
            "Active": true,
        })))
        .unwrap();

        assert_eq!(data.display_name, "Meridian Court Reporting");
        assert_eq!(data.company_name.as_deref(), Some("Meridian Court Reporting Inc"));
        assert_eq!(data.balance.minor_units, 48_050);
    }

    #[test]
    fn sparse_record_maps_with_defaults() {
        let data = to_local(&record(json!({"DisplayName": "Courier"}))).unwrap();
        assert_eq!(data.balance, Money::zero());
        assert!(data.active);
        assert!(data.email.is_none());
    }

    #[test]
    fn remote_payload_skips_absent_fields() {
        let data = VendorData {
            display_name: "Meridian Court Reporting".to_string(),
            company_name: None,
            email: None,
            phone: Some("555-0100".to_string()),
            balance: Money::zero(),
            active: true,
        };
        let payload = to_remote(&data).unwrap();
        assert_eq!(payload["DisplayName"], "Meridian Court Reporting");
        assert_eq!(payload["PrimaryPhone"]["FreeFormNumber"], "555-0100");
        assert!(payload.get("CompanyName").is_none());
    }
}
