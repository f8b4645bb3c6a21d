//! Member Model

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::serde_helpers;

/// Lifecycle status of a member (会员状态)
///
/// Always derived from `expiry_date` and today's date; a value read from the
/// store is overwritten before the member reaches a snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    #[default]
    Active,
    Expiring,
    Expired,
}

impl MemberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expiring => "expiring",
            Self::Expired => "expired",
        }
    }
}

impl std::fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Member entity (会员)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub name: String,
    #[serde(default, deserialize_with = "serde_helpers::null_default")]
    pub email: String,
    #[serde(default, deserialize_with = "serde_helpers::null_default")]
    pub phone: String,
    /// Plan duration in months
    #[serde(default, deserialize_with = "serde_helpers::null_default")]
    pub plan_duration: u32,
    pub joining_date: NaiveDate,
    pub expiry_date: NaiveDate,
    #[serde(default, deserialize_with = "serde_helpers::lenient_default")]
    pub status: MemberStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Create member payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemberCreate {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub plan_duration: u32,
    pub joining_date: Option<NaiveDate>,
    /// Explicit expiry; derived from joining date + plan duration when absent
    pub expiry_date: Option<NaiveDate>,
    pub branch_id: Option<String>,
}

/// Update member payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemberUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_duration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub joining_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<String>,
}

impl MemberUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the present fields onto `member`
    pub fn apply_to(&self, member: &mut Member) {
        if let Some(name) = &self.name {
            member.name = name.clone();
        }
        if let Some(email) = &self.email {
            member.email = email.clone();
        }
        if let Some(phone) = &self.phone {
            member.phone = phone.clone();
        }
        if let Some(months) = self.plan_duration {
            member.plan_duration = months;
        }
        if let Some(date) = self.joining_date {
            member.joining_date = date;
        }
        if let Some(date) = self.expiry_date {
            member.expiry_date = date;
        }
        if let Some(branch) = &self.branch_id {
            member.branch_id = Some(branch.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_row_with_nulls() {
        let json = r#"{
            "id": "0b7e",
            "user_id": "acc-1",
            "name": "Asha",
            "email": null,
            "phone": "9876543210",
            "plan_duration": 3,
            "joining_date": "2025-01-10",
            "expiry_date": "2025-04-10",
            "status": null,
            "qr_token": "MDQR_ab12",
            "created_at": "2025-01-10T08:30:00.123456+00:00"
        }"#;
        let member: Member = serde_json::from_str(json).unwrap();
        assert_eq!(member.email, "");
        assert_eq!(member.status, MemberStatus::Active);
        assert_eq!(member.expiry_date, NaiveDate::from_ymd_opt(2025, 4, 10).unwrap());
        assert!(member.branch_id.is_none());
        assert!(member.created_at.is_some());
    }

    #[test]
    fn test_unknown_stored_status_does_not_fail_row() {
        let json = r#"{"id":"m9","name":"Ravi","joining_date":"2025-01-01",
            "expiry_date":"2025-02-01","status":"inactive"}"#;
        let member: Member = serde_json::from_str(json).unwrap();
        assert_eq!(member.name, "Ravi");
        assert_eq!(member.status, MemberStatus::Active);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&MemberStatus::Expiring).unwrap(), "\"expiring\"");
        let s: MemberStatus = serde_json::from_str("\"expired\"").unwrap();
        assert_eq!(s, MemberStatus::Expired);
    }

    #[test]
    fn test_update_only_serializes_present_fields() {
        let update = MemberUpdate {
            phone: Some("111".into()),
            ..Default::default()
        };
        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(value, serde_json::json!({"phone": "111"}));
        assert!(!update.is_empty());
        assert!(MemberUpdate::default().is_empty());
    }
}
