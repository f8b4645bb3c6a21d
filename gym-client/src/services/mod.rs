//! Payment-link and recommendation services
//!
//! Both are outer collaborators: the cache never calls them. Requests are
//! assembled from a [`Snapshot`] and sent through [`HttpServices`] or any
//! other implementation of the traits below.

mod http;

pub use http::HttpServices;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::lifecycle::{EXPIRING_WINDOW_DAYS, days_left};
use shared::models::{Member, Plan};

use crate::cache::Snapshot;
use crate::error::ServiceResult;

/// Payment-link request (收款链接)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLinkRequest {
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(rename = "memberName")]
    pub payer_name: String,
    #[serde(rename = "memberEmail")]
    pub payer_email: String,
    #[serde(rename = "planName")]
    pub plan_label: String,
    #[serde(rename = "gymId")]
    pub account_id: String,
}

impl PaymentLinkRequest {
    /// Link for a member paying a plan at its list price
    pub fn for_member(member: &Member, plan: &Plan, account_id: &str) -> Self {
        Self {
            amount: plan.price,
            payer_name: member.name.clone(),
            payer_email: member.email.clone(),
            plan_label: plan.name.clone(),
            account_id: account_id.to_string(),
        }
    }

    /// Override the plan price
    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.amount = amount;
        self
    }
}

/// Created payment link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentLink {
    pub link_url: String,
    pub link_id: String,
}

/// Member counts sent for recommendations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemberSummary {
    pub total: usize,
    pub active: usize,
    /// Expiring within the next seven days, today excluded
    pub expiring: usize,
}

/// Revenue figures sent for recommendations
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PaymentSummary {
    #[serde(with = "rust_decimal::serde::float")]
    pub total_revenue: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub average_payment: Decimal,
    pub count: usize,
}

/// Recommendation request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationRequest {
    #[serde(rename = "members")]
    pub member_summary: MemberSummary,
    #[serde(rename = "payments")]
    pub payment_summary: PaymentSummary,
    pub context: String,
}

impl RecommendationRequest {
    /// Summarise a snapshot. Only settled payments count as revenue.
    pub fn from_snapshot(snapshot: &Snapshot, context: impl Into<String>) -> Self {
        let today = snapshot.today;
        let (active, _, _) = snapshot.status_counts();
        let expiring = snapshot
            .members
            .iter()
            .filter(|m| {
                let left = days_left(m.expiry_date, today);
                left > 0 && left <= EXPIRING_WINDOW_DAYS
            })
            .count();

        let (total_revenue, count) = snapshot
            .payments
            .iter()
            .filter(|p| p.is_done())
            .fold((Decimal::ZERO, 0usize), |(sum, n), p| (sum + p.amount, n + 1));
        let average_payment = if count == 0 {
            Decimal::ZERO
        } else {
            (total_revenue / Decimal::from(count)).round_dp(2)
        };

        Self {
            member_summary: MemberSummary {
                total: snapshot.members.len(),
                active,
                expiring,
            },
            payment_summary: PaymentSummary {
                total_revenue,
                average_payment,
                count,
            },
            context: context.into(),
        }
    }

    /// Default context line naming the gym
    pub fn gym_context(snapshot: &Snapshot) -> String {
        let name = snapshot.profile.gym_name.trim();
        format!("Gym Name: {}", if name.is_empty() { "N/A" } else { name })
    }
}

/// Creates hosted payment links
#[async_trait]
pub trait PaymentLinkService: Send + Sync {
    async fn create_link(&self, request: &PaymentLinkRequest) -> ServiceResult<PaymentLink>;
}

/// Generates business recommendation text
#[async_trait]
pub trait RecommendationService: Send + Sync {
    async fn recommend(&self, request: &RecommendationRequest) -> ServiceResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, FixedOffset, NaiveDate, Utc};
    use rust_decimal::Decimal;
    use shared::models::{MemberStatus, Payment, PaymentStatus, Profile, StaffRole};

    fn member(id: &str, expiry: NaiveDate) -> Member {
        Member {
            id: id.into(),
            user_id: Some("acc".into()),
            name: format!("Member {id}"),
            email: format!("{id}@mail.in"),
            phone: String::new(),
            plan_duration: 1,
            joining_date: expiry - Duration::days(30),
            expiry_date: expiry,
            status: MemberStatus::Active,
            qr_token: None,
            branch_id: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn payment(id: &str, amount: i64, status: PaymentStatus) -> Payment {
        Payment {
            id: id.into(),
            user_id: Some("acc".into()),
            member_id: "m1".into(),
            member_name: None,
            amount: Decimal::from(amount),
            payment_date: None,
            payment_method: "cash".into(),
            status,
            plan_name: None,
            branch_id: None,
            created_at: None,
        }
    }

    fn snapshot(today: NaiveDate, members: Vec<Member>, payments: Vec<Payment>) -> Snapshot {
        let mut members = members;
        shared::lifecycle::refresh_statuses(&mut members, today);
        Snapshot {
            account_id: "acc".into(),
            profile: Profile {
                id: "acc".into(),
                owner_name: "Owner".into(),
                email: String::new(),
                phone: String::new(),
                gym_name: "Iron Temple".into(),
                role: StaffRole::Owner,
            },
            branches: vec![],
            current_branch: None,
            staff: vec![],
            members,
            payments,
            plans: vec![],
            attendance: vec![],
            activity_log: vec![],
            reminders: vec![],
            today,
            utc_offset: FixedOffset::east_opt(0).unwrap(),
            fetched_at: Utc::now(),
            revision: 1,
            pending_writes: 0,
        }
    }

    #[test]
    fn test_recommendation_summary() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        let snap = snapshot(
            today,
            vec![
                member("m1", today + Duration::days(3)),
                member("m2", today),
                member("m3", today - Duration::days(2)),
                member("m4", today + Duration::days(60)),
            ],
            vec![
                payment("p1", 1000, PaymentStatus::Done),
                payment("p2", 500, PaymentStatus::Done),
                payment("p3", 900, PaymentStatus::Pending),
            ],
        );

        let request = RecommendationRequest::from_snapshot(&snap, RecommendationRequest::gym_context(&snap));
        assert_eq!(request.member_summary.total, 4);
        assert_eq!(request.member_summary.active, 1);
        // due today is not counted as expiring
        assert_eq!(request.member_summary.expiring, 1);
        assert_eq!(request.payment_summary.total_revenue, Decimal::from(1500));
        assert_eq!(request.payment_summary.average_payment, Decimal::from(750));
        assert_eq!(request.payment_summary.count, 2);
        assert_eq!(request.context, "Gym Name: Iron Temple");
    }

    #[test]
    fn test_empty_summary() {
        let snap = snapshot(NaiveDate::from_ymd_opt(2025, 6, 15).unwrap(), vec![], vec![]);
        let request = RecommendationRequest::from_snapshot(&snap, "ctx");
        assert_eq!(request.payment_summary.average_payment, Decimal::ZERO);
        assert_eq!(request.member_summary.total, 0);
    }

    #[test]
    fn test_payment_link_body_is_camel_case() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        let plan = Plan {
            id: "p1".into(),
            user_id: None,
            name: "Quarterly".into(),
            price: Decimal::from(2500),
            duration: 3,
            features: vec![],
            branch_id: None,
            created_at: None,
            updated_at: None,
        };
        let request = PaymentLinkRequest::for_member(&member("m1", today), &plan, "acc");
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["memberName"], "Member m1");
        assert_eq!(body["planName"], "Quarterly");
        assert_eq!(body["gymId"], "acc");
        assert_eq!(body["amount"], 2500.0);

        let custom = request.with_amount(Decimal::from(1999));
        assert_eq!(custom.amount, Decimal::from(1999));
    }
}
