//! Invoice mapping, including line items and the customer reference.

use rust_decimal::Decimal;
use serde_json::{json, Value};

use crate::entity::{InvoiceData, InvoiceLine, InvoiceStatus};
use crate::error::SyncResult;
use crate::remote::RemoteRecord;
use crate::types::EntityKind;

use super::{
    date_json, decimal_field, decimal_json, money_field, money_json, opt_date, opt_str, ref_value,
    LinkIndex,
};

fn status_from_remote(status: &str, balance_is_zero: bool) -> InvoiceStatus {
    match status {
        "Paid" => InvoiceStatus::Paid,
        "Overdue" => InvoiceStatus::Overdue,
        "Voided" | "Void" => InvoiceStatus::Voided,
        "Open" | "Pending" => InvoiceStatus::Open,
        // Some provider versions omit TxnStatus; infer paid from balance.
        "" if balance_is_zero => InvoiceStatus::Paid,
        _ => InvoiceStatus::Open,
    }
}

fn status_to_remote(status: InvoiceStatus) -> &'static str {
    match status {
        InvoiceStatus::Open => "Open",
        InvoiceStatus::Paid => "Paid",
        InvoiceStatus::Overdue => "Overdue",
        InvoiceStatus::Voided => "Voided",
    }
}

fn line_to_local(line: &Value) -> SyncResult<InvoiceLine> {
    Ok(InvoiceLine {
        description: opt_str(line, "Description"),
        quantity: line
            .get("SalesItemLineDetail")
            .map(|d| decimal_field(d, "Qty", Decimal::ONE))
            .transpose()?
            .unwrap_or(Decimal::ONE),
        unit_price: line
            .get("SalesItemLineDetail")
            .map(|d| money_field(d, "UnitPrice"))
            .transpose()?
            .unwrap_or_default(),
        amount: money_field(line, "Amount")?,
    })
}

fn line_to_remote(line: &InvoiceLine) -> Value {
    let mut out = json!({
        "Amount": money_json(line.amount),
        "DetailType": "SalesItemLineDetail",
        "SalesItemLineDetail": {
            "Qty": decimal_json(line.quantity),
            "UnitPrice": money_json(line.unit_price),
        },
    });
    if let Some(description) = &line.description {
        out["Description"] = Value::String(description.clone());
    }
    out
}

pub(super) fn to_local(record: &RemoteRecord, links: &LinkIndex) -> SyncResult<InvoiceData> {
    let fields = &record.fields;
    let balance = money_field(fields, "Balance")?;
    let status_raw = opt_str(fields, "TxnStatus").unwrap_or_default();
    let lines = fields
        .get("Line")
        .and_then(Value::as_array)
        .map(|lines| lines.iter().map(line_to_local).collect::<SyncResult<Vec<_>>>())
        .transpose()?
        .unwrap_or_default();

    Ok(InvoiceData {
        doc_number: opt_str(fields, "DocNumber"),
        customer_id: ref_value(fields, "CustomerRef")
            .and_then(|remote_id| links.local_for(EntityKind::Customer, &remote_id)),
        issued_on: opt_date(fields, "TxnDate")?,
        due_on: opt_date(fields, "DueDate")?,
        status: status_from_remote(&status_raw, balance.minor_units == 0),
        total: money_field(fields, "TotalAmt")?,
        balance,
        lines,
    })
}

pub(super) fn to_remote(data: &InvoiceData, links: &LinkIndex) -> SyncResult<Value> {
    let mut payload = json!({
        "TotalAmt": money_json(data.total),
        "Balance": money_json(data.balance),
        "TxnStatus": status_to_remote(data.status),
        "Line": data.lines.iter().map(line_to_remote).collect::<Vec<_>>(),
    });
    if let Some(doc_number) = &data.doc_number {
        payload["DocNumber"] = Value::String(doc_number.clone());
    }
    if let Some(remote_customer) = data
        .customer_id
        .and_then(|id| links.remote_for(EntityKind::Customer, id))
    {
        payload["CustomerRef"] = json!({"value": remote_customer});
    }
    if let Some(issued) = data.issued_on {
        payload["TxnDate"] = date_json(issued);
    }
    if let Some(due) = data.due_on {
        payload["DueDate"] = date_json(due);
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn record(fields: Value) -> RemoteRecord {
        RemoteRecord {
            id: "9001".to_string(),
            revision_token: "4".to_string(),
            last_modified_at: Utc::now(),
            fields,
        }
    }

    #[test]
    fn maps_invoice_with_lines_and_customer_link() {
        let mut links = LinkIndex::new();
        let customer = Uuid::new_v4();
        links.insert(EntityKind::Customer, "61".to_string(), customer);

        let data = to_local(
            &record(json!({
                "DocNumber": "INV-1042",
                "CustomerRef": {"value": "61"},
                "TxnDate": "2026-01-15",
                "DueDate": "2026-02-14",
                "TxnStatus": "Open",
                "TotalAmt": 3200.00,
                "Balance": 3200.00,
                "Line": [
                    {
                        "Description": "Deposition preparation",
                        "Amount": 2400.00,
                        "SalesItemLineDetail": {"Qty": 8.0, "UnitPrice": 300.00}
                    },
                    {
                        "Description": "Filing fees",
                        "Amount": 800.00,
                        "SalesItemLineDetail": {"Qty": 1.0, "UnitPrice": 800.00}
                    }
                ],
            })),
            &links,
        )
        .unwrap();

        assert_eq!(data.doc_number.as_deref(), Some("INV-1042"));
        assert_eq!(data.customer_id, Some(customer));
        assert_eq!(data.status, InvoiceStatus::Open);
        assert_eq!(data.total.minor_units, 320_000);
        assert_eq!(data.lines.len(), 2);
        assert_eq!(data.lines[0].quantity, Decimal::from(8));
        assert_eq!(data.lines[0].unit_price.minor_units, 30_000);
    }

    #[test]
    fn unlinked_customer_maps_to_none() {
        let data = to_local(
            &record(json!({
                "CustomerRef": {"value": "999"},
                "TotalAmt": 10.00,
                "Balance": 10.00,
            })),
            &LinkIndex::new(),
        )
        .unwrap();
        assert_eq!(data.customer_id, None);
    }

    #[test]
    fn missing_status_with_zero_balance_infers_paid() {
        let data = to_local(
            &record(json!({"TotalAmt": 500.00, "Balance": 0.0})),
            &LinkIndex::new(),
        )
        .unwrap();
        assert_eq!(data.status, InvoiceStatus::Paid);

        let data = to_local(
            &record(json!({"TotalAmt": 500.00, "Balance": 500.00})),
            &LinkIndex::new(),
        )
        .unwrap();
        assert_eq!(data.status, InvoiceStatus::Open);
    }

    #[test]
    fn unknown_status_falls_back_to_open() {
        assert_eq!(status_from_remote("Draft", false), InvoiceStatus::Open);
        assert_eq!(status_from_remote("Void", false), InvoiceStatus::Voided);
    }

    #[test]
    fn invoice_round_trips_through_remote_payload() {
        let mut links = LinkIndex::new();
        let customer = Uuid::new_v4();
        links.insert(EntityKind::Customer, "61".to_string(), customer);

        let original = to_local(
            &record(json!({
                "DocNumber": "INV-1042",
                "CustomerRef": {"value": "61"},
                "TxnDate": "2026-01-15",
                "DueDate": "2026-02-14",
                "TxnStatus": "Overdue",
                "TotalAmt": 1250.50,
                "Balance": 1250.50,
                "Line": [
                    {
                        "Description": "Research",
                        "Amount": 1250.50,
                        "SalesItemLineDetail": {"Qty": 5.0, "UnitPrice": 250.10}
                    }
                ],
            })),
            &links,
        )
        .unwrap();

        let payload = to_remote(&original, &links).unwrap();
        let reparsed = to_local(&record(payload), &links).unwrap();

        assert_eq!(reparsed.doc_number, original.doc_number);
        assert_eq!(reparsed.customer_id, original.customer_id);
        assert_eq!(reparsed.issued_on, original.issued_on);
        assert_eq!(reparsed.due_on, original.due_on);
        assert_eq!(reparsed.status, original.status);
        assert_eq!(reparsed.total, original.total);
        assert_eq!(reparsed.lines, original.lines);
    }
}
