//! Payment mapping.

use serde_json::{json, Value};

use crate::entity::{PaymentData, PaymentMethod};
use crate::error::SyncResult;
use crate::remote::RemoteRecord;
use crate::types::EntityKind;

use super::{date_json, money_field, money_json, opt_date, opt_str, ref_value, LinkIndex};

fn method_from_remote(method: &str) -> PaymentMethod {
    match method {
        "Cash" => PaymentMethod::Cash,
        "Check" => PaymentMethod::Check,
        "CreditCard" | "Credit Card" => PaymentMethod::CreditCard,
        "ACH" | "BankTransfer" | "Wire" => PaymentMethod::BankTransfer,
        _ => PaymentMethod::Other,
    }
}

fn method_to_remote(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::Cash => "Cash",
        PaymentMethod::Check => "Check",
        PaymentMethod::CreditCard => "CreditCard",
        PaymentMethod::BankTransfer => "ACH",
        PaymentMethod::Other => "Other",
    }
}

pub(super) fn to_local(record: &RemoteRecord, links: &LinkIndex) -> SyncResult<PaymentData> {
    let fields = &record.fields;
    let method_raw = opt_str(fields, "PaymentMethod").unwrap_or_default();
    Ok(PaymentData {
        customer_id: ref_value(fields, "CustomerRef")
            .and_then(|remote_id| links.local_for(EntityKind::Customer, &remote_id)),
        amount: money_field(fields, "TotalAmt")?,
        method: method_from_remote(&method_raw),
        received_on: opt_date(fields, "TxnDate")?,
        reference: opt_str(fields, "PaymentRefNum"),
    })
}

pub(super) fn to_remote(data: &PaymentData, links: &LinkIndex) -> SyncResult<Value> {
    let mut payload = json!({
        "TotalAmt": money_json(data.amount),
        "PaymentMethod": method_to_remote(data.method),
    });
    if let Some(remote_customer) = data
        .customer_id
        .and_then(|id| links.remote_for(EntityKind::Customer, id))
    {
        payload["CustomerRef"] = json!({"value": remote_customer});
    }
    if let Some(received) = data.received_on {
        payload["TxnDate"] = date_json(received);
    }
    if let Some(reference) = &data.reference {
        payload["PaymentRefNum"] = Value::String(reference.clone());
    }
    Ok(payload)
}
