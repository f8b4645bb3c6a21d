//! Branch Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::serde_helpers;

/// Gym branch (门店)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    #[serde(default, deserialize_with = "serde_helpers::null_default")]
    pub address: String,
    #[serde(default, deserialize_with = "serde_helpers::null_default")]
    pub phone: String,
    #[serde(default, deserialize_with = "serde_helpers::bool_false")]
    pub is_main: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}
