//! Staff Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::serde_helpers;

/// Role of a profile or staff member
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    #[default]
    Owner,
    Manager,
    Trainer,
    FrontDesk,
}

/// Staff member (员工)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffMember {
    pub id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<String>,
    pub name: String,
    #[serde(default, deserialize_with = "serde_helpers::null_default")]
    pub email: String,
    #[serde(default, deserialize_with = "serde_helpers::null_default")]
    pub phone: String,
    #[serde(default, deserialize_with = "serde_helpers::null_default")]
    pub role: StaffRole,
    #[serde(default = "default_true", deserialize_with = "serde_helpers::bool_true")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}
