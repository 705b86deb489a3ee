//! Vendor bill mapping.

use serde_json::{json, Value};

use crate::entity::{BillData, BillLine};
use crate::error::SyncResult;
use crate::remote::RemoteRecord;
use crate::types::EntityKind;

use super::{date_json, money_field, money_json, opt_date, opt_str, ref_value, LinkIndex};

fn line_to_local(line: &Value) -> SyncResult<BillLine> {
    Ok(BillLine {
        description: opt_str(line, "Description"),
        amount: money_field(line, "Amount")?,
    })
}

fn line_to_remote(line: &BillLine) -> Value {
    let mut out = json!({
        "Amount": money_json(line.amount),
        "DetailType": "AccountBasedExpenseLineDetail",
    });
    if let Some(description) = &line.description {
        out["Description"] = Value::String(description.clone());
    }
    out
}

pub(super) fn to_local(record: &RemoteRecord, links: &LinkIndex) -> SyncResult<BillData> {
    let fields = &record.fields;
    let lines = fields
        .get("Line")
        .and_then(Value::as_array)
        .map(|lines| lines.iter().map(line_to_local).collect::<SyncResult<Vec<_>>>())
        .transpose()?
        .unwrap_or_default();

    Ok(BillData {
        vendor_id: ref_value(fields, "VendorRef")
            .and_then(|remote_id| links.local_for(EntityKind::Vendor, &remote_id)),
        issued_on: opt_date(fields, "TxnDate")?,
        due_on: opt_date(fields, "DueDate")?,
        total: money_field(fields, "TotalAmt")?,
        balance: money_field(fields, "Balance")?,
        lines,
    })
}

pub(super) fn to_remote(data: &BillData, links: &LinkIndex) -> SyncResult<Value> {
    let mut payload = json!({
        "TotalAmt": money_json(data.total),
        "Balance": money_json(data.balance),
        "Line": data.lines.iter().map(line_to_remote).collect::<Vec<_>>(),
    });
    if let Some(remote_vendor) = data
        .vendor_id
        .and_then(|id| links.remote_for(EntityKind::Vendor, id))
    {
        payload["VendorRef"] = json!({"value": remote_vendor});
    }
    if let Some(issued) = data.issued_on {
        payload["TxnDate"] = date_json(issued);
    }
    if let Some(due) = data.due_on {
        payload["DueDate"] = date_json(due);
    }
    Ok(payload)
}
