//! Chart-of-accounts mapping.

use serde_json::{json, Value};

use crate::entity::{AccountCategory, AccountData};
use crate::error::SyncResult;
use crate::remote::RemoteRecord;

use super::{money_field, opt_bool, opt_str, req_str};

/// Remote account types collapse into the local category vocabulary;
/// anything unrecognized lands on [`AccountCategory::Other`].
fn category_from_remote(account_type: &str) -> AccountCategory {
    match account_type {
        "Bank" | "Other Current Asset" | "Fixed Asset" | "Other Asset"
        | "Accounts Receivable" => AccountCategory::Asset,
        "Credit Card" | "Accounts Payable" | "Other Current Liability"
        | "Long Term Liability" => AccountCategory::Liability,
        "Equity" => AccountCategory::Equity,
        "Income" | "Other Income" => AccountCategory::Income,
        "Expense" | "Other Expense" | "Cost of Goods Sold" => AccountCategory::Expense,
        _ => AccountCategory::Other,
    }
}

/// Representative remote type for a local category. The mapping is lossy
/// in this direction; pushes use the most common type of each category.
fn category_to_remote(category: AccountCategory) -> &'static str {
    match category {
        AccountCategory::Asset => "Other Current Asset",
        AccountCategory::Liability => "Other Current Liability",
        AccountCategory::Equity => "Equity",
        AccountCategory::Income => "Income",
        AccountCategory::Expense => "Expense",
        AccountCategory::Other => "Other Expense",
    }
}

pub(super) fn to_local(record: &RemoteRecord) -> SyncResult<AccountData> {
    let fields = &record.fields;
    let account_type = opt_str(fields, "AccountType").unwrap_or_default();
    Ok(AccountData {
        name: req_str(fields, "Name")?,
        number: opt_str(fields, "AcctNum"),
        category: category_from_remote(&account_type),
        active: opt_bool(fields, "Active", true),
        balance: money_field(fields, "CurrentBalance")?,
    })
}

pub(super) fn to_remote(data: &AccountData) -> SyncResult<Value> {
    let mut payload = json!({
        "Name": data.name,
        "AccountType": category_to_remote(data.category),
        "Active": data.active,
    });
    if let Some(number) = &data.number {
        payload["AcctNum"] = Value::String(number.clone());
    }
    // CurrentBalance is provider-computed and never pushed.
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn record(fields: Value) -> RemoteRecord {
        RemoteRecord {
            id: "1".to_string(),
            revision_token: "0".to_string(),
            last_modified_at: Utc::now(),
            fields,
        }
    }

    #[test]
    fn maps_remote_account_types_into_categories() {
        for (remote, expected) in [
            ("Bank", AccountCategory::Asset),
            ("Accounts Receivable", AccountCategory::Asset),
            ("Credit Card", AccountCategory::Liability),
            ("Accounts Payable", AccountCategory::Liability),
            ("Equity", AccountCategory::Equity),
            ("Other Income", AccountCategory::Income),
            ("Cost of Goods Sold", AccountCategory::Expense),
        ] {
            assert_eq!(category_from_remote(remote), expected, "{remote}");
        }
    }

    #[test]
    fn unknown_account_type_falls_back_to_other() {
        assert_eq!(category_from_remote("Cryptocurrency"), AccountCategory::Other);
        assert_eq!(category_from_remote(""), AccountCategory::Other);
    }

    #[test]
    fn maps_full_account_record() {
        let data = to_local(&record(json!({
            "Name": "Client Trust Account",
            "AcctNum": "1100",
            "AccountType": "Bank",
            "Active": true,
            "CurrentBalance": 52_340.75,
        })))
        .unwrap();

        assert_eq!(data.name, "Client Trust Account");
        assert_eq!(data.number.as_deref(), Some("1100"));
        assert_eq!(data.category, AccountCategory::Asset);
        assert!(data.active);
        assert_eq!(data.balance.minor_units, 5_234_075);
    }

    #[test]
    fn missing_name_is_a_mapping_error() {
        assert!(to_local(&record(json!({"AccountType": "Bank"}))).is_err());
    }

    #[test]
    fn remote_payload_carries_name_and_type() {
        let data = AccountData {
            name: "Filing Fees".to_string(),
            number: Some("6200".to_string()),
            category: AccountCategory::Expense,
            active: true,
            balance: crate::entity::Money::zero(),
        };
        let payload = to_remote(&data).unwrap();
        assert_eq!(payload["Name"], "Filing Fees");
        assert_eq!(payload["AccountType"], "Expense");
        assert_eq!(payload["AcctNum"], "6200");
    }
}
