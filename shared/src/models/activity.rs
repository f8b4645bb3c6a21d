//! Activity log entries written after each confirmed mutation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of activity (活动类型)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    MemberAdded,
    MemberUpdated,
    MemberDeleted,
    PaymentAdded,
    PaymentUpdated,
    PaymentDeleted,
    PlanAdded,
    PlanUpdated,
    PlanDeleted,
    ProfileUpdated,
    CheckIn,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MemberAdded => "member_added",
            Self::MemberUpdated => "member_updated",
            Self::MemberDeleted => "member_deleted",
            Self::PaymentAdded => "payment_added",
            Self::PaymentUpdated => "payment_updated",
            Self::PaymentDeleted => "payment_deleted",
            Self::PlanAdded => "plan_added",
            Self::PlanUpdated => "plan_updated",
            Self::PlanDeleted => "plan_deleted",
            Self::ProfileUpdated => "profile_updated",
            Self::CheckIn => "check_in",
        }
    }
}

impl std::fmt::Display for ActivityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row in `activity_log`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub activity_type: ActivityType,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Insert payload for `activity_log`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityCreate {
    pub activity_type: ActivityType,
    pub description: String,
}

impl ActivityCreate {
    pub fn new(activity_type: ActivityType, description: impl Into<String>) -> Self {
        Self {
            activity_type,
            description: description.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_type_wire_name() {
        let json = serde_json::to_string(&ActivityType::PaymentDeleted).unwrap();
        assert_eq!(json, "\"payment_deleted\"");
        assert_eq!(ActivityType::MemberAdded.to_string(), "member_added");
    }
}
