//! Member status derivation

use chrono::{DateTime, NaiveDate, TimeZone};

use crate::models::MemberStatus;

/// Members within this many days of expiry are `Expiring`.
pub const EXPIRING_WINDOW_DAYS: i64 = 7;

/// Whole calendar days from `today` until `expiry` (negative once past).
pub fn days_left(expiry: NaiveDate, today: NaiveDate) -> i64 {
    expiry.signed_duration_since(today).num_days()
}

/// Derive the lifecycle status for a member expiring on `expiry`.
///
/// - `days_left < 0`: expired
/// - `0 <= days_left <= 7`: expiring (a member due today is still expiring)
/// - otherwise active
pub fn derive_status(expiry: NaiveDate, today: NaiveDate) -> MemberStatus {
    match days_left(expiry, today) {
        d if d < 0 => MemberStatus::Expired,
        d if d <= EXPIRING_WINDOW_DAYS => MemberStatus::Expiring,
        _ => MemberStatus::Active,
    }
}

/// Timestamp form of [`derive_status`]: both instants are reduced to their
/// calendar date in `Tz` first, so time of day never changes the result.
pub fn derive_status_at<Tz: TimeZone>(expiry: &DateTime<Tz>, now: &DateTime<Tz>) -> MemberStatus {
    derive_status(expiry.date_naive(), now.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, FixedOffset, Utc};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_boundaries() {
        let today = day(2025, 6, 15);
        let cases = [
            (-30, MemberStatus::Expired),
            (-1, MemberStatus::Expired),
            (0, MemberStatus::Expiring),
            (1, MemberStatus::Expiring),
            (7, MemberStatus::Expiring),
            (8, MemberStatus::Active),
            (365, MemberStatus::Active),
        ];
        for (offset, expected) in cases {
            let expiry = today + Duration::days(offset);
            assert_eq!(derive_status(expiry, today), expected, "offset {offset}");
            assert_eq!(days_left(expiry, today), offset);
        }
    }

    #[test]
    fn test_across_month_and_year() {
        assert_eq!(days_left(day(2025, 1, 2), day(2024, 12, 30)), 3);
        assert_eq!(derive_status(day(2024, 3, 1), day(2024, 2, 28)), MemberStatus::Expiring);
    }

    #[test]
    fn test_time_of_day_is_ignored() {
        let tz = FixedOffset::east_opt(5 * 3600 + 1800).unwrap();
        let expiry = tz.with_ymd_and_hms(2025, 6, 22, 0, 0, 1).unwrap();
        let late = tz.with_ymd_and_hms(2025, 6, 15, 23, 59, 59).unwrap();
        let early = tz.with_ymd_and_hms(2025, 6, 15, 0, 0, 0).unwrap();
        assert_eq!(derive_status_at(&expiry, &late), MemberStatus::Expiring);
        assert_eq!(derive_status_at(&expiry, &early), MemberStatus::Expiring);

        // expiry at the very end of yesterday is still expired this morning
        let yesterday_late = Utc.with_ymd_and_hms(2025, 6, 14, 23, 59, 59).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 6, 15, 0, 0, 1).unwrap();
        assert_eq!(derive_status_at(&yesterday_late, &now), MemberStatus::Expired);
    }
}
