//! Renewal reminders

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::status::{EXPIRING_WINDOW_DAYS, days_left};
use crate::models::Member;
use crate::util::plan_label;

/// Reminder status; reminders are never persisted so they are always pending.
pub const REMINDER_PENDING: &str = "pending";

/// Derived renewal reminder for a member close to expiry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub member_id: String,
    pub member_name: String,
    pub days_left: i64,
    /// "1 month", "3 months"
    pub plan: String,
    pub status: String,
    pub phone: String,
}

impl Reminder {
    fn for_member(member: &Member, days_left: i64) -> Self {
        Self {
            member_id: member.id.clone(),
            member_name: member.name.clone(),
            days_left,
            plan: plan_label(member.plan_duration),
            status: REMINDER_PENDING.to_string(),
            phone: member.phone.clone(),
        }
    }
}

/// Reminders for every member with `0 < days_left <= 7`, soonest first.
///
/// Members due today (`days_left == 0`) are `Expiring` but get no reminder.
/// Ties keep input order.
pub fn compute_reminders(members: &[Member], today: NaiveDate) -> Vec<Reminder> {
    let mut reminders: Vec<Reminder> = members
        .iter()
        .filter_map(|m| {
            let d = days_left(m.expiry_date, today);
            (d > 0 && d <= EXPIRING_WINDOW_DAYS).then(|| Reminder::for_member(m, d))
        })
        .collect();
    // sort_by_key is stable
    reminders.sort_by_key(|r| r.days_left);
    reminders
}
