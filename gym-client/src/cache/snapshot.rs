//! Snapshot: everything the UI reads for one account at one point in time

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::Serialize;
use shared::lifecycle::{Reminder, compute_reminders, refresh_statuses};
use shared::models::{
    ActivityEntry, Attendance, Branch, Member, MemberStatus, Payment, Plan, Profile, ProfileRow,
    SessionIdentity, StaffMember,
};

use super::pending::PendingWrites;

/// Rows as last read from (or confirmed by) the store. No derived fields.
#[derive(Debug, Clone)]
pub(crate) struct BaseData {
    pub account_id: String,
    pub profile_row: Option<ProfileRow>,
    pub branches: Vec<Branch>,
    pub staff: Vec<StaffMember>,
    pub members: Vec<Member>,
    pub payments: Vec<Payment>,
    pub plans: Vec<Plan>,
    pub attendance: Vec<Attendance>,
    /// Entries written during this session, newest first
    pub activity_log: Vec<ActivityEntry>,
    pub fetched_at: DateTime<Utc>,
}

/// Read-only view published to subscribers
///
/// Built from the base rows plus every pending optimistic write; member
/// statuses and reminders are derived against `today` at build time.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub account_id: String,
    pub profile: Profile,
    pub branches: Vec<Branch>,
    pub current_branch: Option<Branch>,
    pub staff: Vec<StaffMember>,
    pub members: Vec<Member>,
    pub payments: Vec<Payment>,
    pub plans: Vec<Plan>,
    pub attendance: Vec<Attendance>,
    pub activity_log: Vec<ActivityEntry>,
    pub reminders: Vec<Reminder>,
    /// Business date the derived fields were computed for
    pub today: NaiveDate,
    #[serde(skip)]
    pub utc_offset: FixedOffset,
    pub fetched_at: DateTime<Utc>,
    /// Sequence of the newest authoritative data in this view
    pub revision: u64,
    /// Optimistic writes still waiting for the store
    pub pending_writes: usize,
}

/// Attendance figures for one day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AttendanceStats {
    pub date: NaiveDate,
    pub present: usize,
    pub total_members: usize,
    /// Rounded percentage, 0 when there are no members
    pub rate: u32,
}

impl Snapshot {
    pub(crate) fn build(
        base: &BaseData,
        pending: &PendingWrites,
        identity: SessionIdentity<'_>,
        today: NaiveDate,
        utc_offset: FixedOffset,
        revision: u64,
    ) -> Self {
        let mut members = base.members.clone();
        let mut payments = base.payments.clone();
        let mut plans = base.plans.clone();
        pending.overlay(&mut members, &mut payments, &mut plans);

        refresh_statuses(&mut members, today);
        let reminders = compute_reminders(&members, today);

        Self {
            account_id: base.account_id.clone(),
            profile: Profile::resolve(&base.account_id, base.profile_row.as_ref(), identity),
            current_branch: base.branches.first().cloned(),
            branches: base.branches.clone(),
            staff: base.staff.clone(),
            members,
            payments,
            plans,
            attendance: base.attendance.clone(),
            activity_log: base.activity_log.clone(),
            reminders,
            today,
            utc_offset,
            fetched_at: base.fetched_at,
            revision,
            pending_writes: pending.len(),
        }
    }

    // ========== Lookups ==========

    /// Lookup by id; `None` for deleted or unknown members
    pub fn member(&self, id: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.id == id)
    }

    pub fn payment(&self, id: &str) -> Option<&Payment> {
        self.payments.iter().find(|p| p.id == id)
    }

    pub fn plan(&self, id: &str) -> Option<&Plan> {
        self.plans.iter().find(|p| p.id == id)
    }

    /// Member a payment refers to, if it still exists
    pub fn payment_member(&self, payment: &Payment) -> Option<&Member> {
        self.member(&payment.member_id)
    }

    pub fn payments_for(&self, member_id: &str) -> Vec<&Payment> {
        self.payments.iter().filter(|p| p.member_id == member_id).collect()
    }

    pub fn current_branch_id(&self) -> Option<&str> {
        self.current_branch.as_ref().map(|b| b.id.as_str())
    }

    // ========== Member queries ==========

    pub fn members_with_status(&self, status: MemberStatus) -> Vec<&Member> {
        self.members.iter().filter(|m| m.status == status).collect()
    }

    /// Case-insensitive match on name or email, substring match on phone,
    /// optionally narrowed to one status. An empty query matches everyone.
    pub fn search_members(&self, query: &str, status: Option<MemberStatus>) -> Vec<&Member> {
        let needle = query.trim().to_lowercase();
        self.members
            .iter()
            .filter(|m| status.is_none_or(|s| m.status == s))
            .filter(|m| {
                needle.is_empty()
                    || m.name.to_lowercase().contains(&needle)
                    || m.email.to_lowercase().contains(&needle)
                    || m.phone.contains(query.trim())
            })
            .collect()
    }

    pub fn status_counts(&self) -> (usize, usize, usize) {
        self.members.iter().fold((0, 0, 0), |(a, e, x), m| match m.status {
            MemberStatus::Active => (a + 1, e, x),
            MemberStatus::Expiring => (a, e + 1, x),
            MemberStatus::Expired => (a, e, x + 1),
        })
    }

    // ========== Attendance ==========

    fn local_date(&self, ts: &DateTime<Utc>) -> NaiveDate {
        ts.with_timezone(&self.utc_offset).date_naive()
    }

    pub fn attendance_on(&self, date: NaiveDate) -> Vec<&Attendance> {
        self.attendance
            .iter()
            .filter(|a| self.local_date(&a.check_in) == date)
            .collect()
    }

    pub fn has_checked_in(&self, member_id: &str, date: NaiveDate) -> bool {
        self.attendance
            .iter()
            .any(|a| a.member_id == member_id && self.local_date(&a.check_in) == date)
    }

    pub fn attendance_stats(&self, date: NaiveDate) -> AttendanceStats {
        let present = self.attendance_on(date).len();
        let total_members = self.members.len();
        let rate = if total_members == 0 {
            0
        } else {
            ((present as f64 / total_members as f64) * 100.0).round() as u32
        };
        AttendanceStats {
            date,
            present,
            total_members,
            rate,
        }
    }
}
