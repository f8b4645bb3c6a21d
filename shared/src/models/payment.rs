//! Payment Model

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::serde_helpers;

/// Payment status. Rows without a recognised status are treated as settled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    #[serde(alias = "completed", alias = "paid")]
    Done,
    Pending,
}

/// Payment entity (收款记录)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub member_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_name: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "serde_helpers::null_default")]
    pub payment_method: String,
    #[serde(default, deserialize_with = "serde_helpers::lenient_default")]
    pub status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Payment {
    pub fn is_done(&self) -> bool {
        self.status == PaymentStatus::Done
    }
}

/// Create payment payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentCreate {
    pub member_id: String,
    pub member_name: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub payment_date: Option<NaiveDate>,
    pub payment_method: String,
    pub status: Option<PaymentStatus>,
    pub plan_name: Option<String>,
    pub branch_id: Option<String>,
}

/// Update payment payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PaymentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_name: Option<String>,
}

impl PaymentUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply_to(&self, payment: &mut Payment) {
        if let Some(member_id) = &self.member_id {
            payment.member_id = member_id.clone();
        }
        if let Some(name) = &self.member_name {
            payment.member_name = Some(name.clone());
        }
        if let Some(amount) = self.amount {
            payment.amount = amount;
        }
        if let Some(date) = self.payment_date {
            payment.payment_date = Some(date);
        }
        if let Some(method) = &self.payment_method {
            payment.payment_method = method.clone();
        }
        if let Some(status) = self.status {
            payment.status = status;
        }
        if let Some(plan) = &self.plan_name {
            payment.plan_name = Some(plan.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_status_defaults_to_done() {
        let json = r#"{"id":"p1","member_id":"m1","amount":1500.0,"payment_method":"cash"}"#;
        let payment: Payment = serde_json::from_str(json).unwrap();
        assert_eq!(payment.status, PaymentStatus::Done);
        assert!(payment.is_done());

        let json = r#"{"id":"p2","member_id":"m1","amount":1500,"payment_method":"upi","status":null}"#;
        let payment: Payment = serde_json::from_str(json).unwrap();
        assert_eq!(payment.status, PaymentStatus::Done);
    }

    #[test]
    fn test_pending_status() {
        let json = r#"{"id":"p1","member_id":"m1","amount":99.5,"payment_method":"card","status":"pending"}"#;
        let payment: Payment = serde_json::from_str(json).unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.amount, Decimal::new(995, 1));
    }

    #[test]
    fn test_legacy_and_unknown_status_decode_as_done() {
        for status in ["completed", "paid", "refunded", "DONE"] {
            let json = format!(
                r#"{{"id":"p1","member_id":"m1","amount":500,"payment_method":"cash","status":"{status}"}}"#
            );
            let payment: Payment = serde_json::from_str(&json).unwrap();
            assert_eq!(payment.status, PaymentStatus::Done, "{status}");
        }
    }
}
