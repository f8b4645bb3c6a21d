//! Member lifecycle engine
//!
//! Pure functions deriving member status and renewal reminders from stored
//! dates and today's calendar date. Nothing here touches the store or a clock:
//! callers pass `today` explicitly.

mod reminder;
mod status;

pub use reminder::{REMINDER_PENDING, Reminder, compute_reminders};
pub use status::{EXPIRING_WINDOW_DAYS, days_left, derive_status, derive_status_at};

use chrono::NaiveDate;

use crate::models::Member;
use crate::util::add_months;

/// Overwrite the status of every member from its expiry date.
pub fn refresh_statuses(members: &mut [Member], today: NaiveDate) {
    for member in members.iter_mut() {
        member.status = derive_status(member.expiry_date, today);
    }
}

/// Expiry date for a membership of `months` starting on `start`.
pub fn expiry_for(start: NaiveDate, months: u32) -> NaiveDate {
    add_months(start, months)
}
