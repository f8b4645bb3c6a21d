//! Plan Model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::serde_helpers;

/// Membership plan (套餐)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    /// Duration in months
    pub duration: u32,
    #[serde(default, deserialize_with = "serde_helpers::null_default")]
    pub features: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Create plan payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanCreate {
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub duration: u32,
    #[serde(default)]
    pub features: Vec<String>,
    pub branch_id: Option<String>,
}

/// Update plan payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<String>>,
}

impl PlanUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply_to(&self, plan: &mut Plan) {
        if let Some(name) = &self.name {
            plan.name = name.clone();
        }
        if let Some(price) = self.price {
            plan.price = price;
        }
        if let Some(duration) = self.duration {
            plan.duration = duration;
        }
        if let Some(features) = &self.features {
            plan.features = features.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_features_become_empty() {
        let json = r#"{"id":"pl1","name":"Quarterly","price":2500,"duration":3,"features":null}"#;
        let plan: Plan = serde_json::from_str(json).unwrap();
        assert!(plan.features.is_empty());
        assert_eq!(plan.duration, 3);
    }

    #[test]
    fn test_features_keep_order() {
        let json = r#"{"id":"pl1","name":"Gold","price":9000,"duration":12,"features":["Gym","Pool","Sauna"]}"#;
        let plan: Plan = serde_json::from_str(json).unwrap();
        assert_eq!(plan.features, vec!["Gym", "Pool", "Sauna"]);
    }
}
