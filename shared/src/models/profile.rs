//! Account profile (the gym owner)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::staff::StaffRole;

pub const DEFAULT_OWNER_NAME: &str = "User";
pub const DEFAULT_GYM_NAME: &str = "My Gym";

/// Raw `users` row; every column may be missing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileRow {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub gym_name: Option<String>,
    #[serde(default)]
    pub role: Option<StaffRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Profile as shown to the signed-in owner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub owner_name: String,
    pub email: String,
    pub phone: String,
    pub gym_name: String,
    pub role: StaffRole,
}

/// Session identity fields used when the profile row is incomplete
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionIdentity<'a> {
    pub display_name: Option<&'a str>,
    pub email: Option<&'a str>,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

impl Profile {
    /// Build the profile view for `account_id`.
    ///
    /// Owner name falls back to the session display name, then the local part
    /// of the email, then "User".
    pub fn resolve(account_id: &str, row: Option<&ProfileRow>, session: SessionIdentity<'_>) -> Self {
        let row_name = row.and_then(|r| non_empty(r.name.as_deref()));
        let row_email = row.and_then(|r| non_empty(r.email.as_deref()));
        let email = row_email.or(non_empty(session.email)).unwrap_or_default();

        let owner_name = row_name
            .or(non_empty(session.display_name))
            .or_else(|| non_empty(session.email.and_then(|e| e.split('@').next())))
            .unwrap_or(DEFAULT_OWNER_NAME);

        Self {
            id: account_id.to_string(),
            owner_name: owner_name.to_string(),
            email: email.to_string(),
            phone: row
                .and_then(|r| r.phone.clone())
                .unwrap_or_default(),
            gym_name: row
                .and_then(|r| non_empty(r.gym_name.as_deref()))
                .unwrap_or(DEFAULT_GYM_NAME)
                .to_string(),
            role: row.and_then(|r| r.role).unwrap_or_default(),
        }
    }
}

/// Profile update payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gym_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}
