use chrono::{Months, NaiveDate};

/// Prefix of locally generated ids that have not been confirmed by the store.
pub const TEMP_ID_PREFIX: &str = "temp-";

/// Prefix every member QR token carries.
pub const QR_TOKEN_PREFIX: &str = "MDQR_";

/// Generate a temporary id for an optimistic entity.
///
/// Store-issued ids are UUIDs, so the `temp-` prefix never collides with them.
pub fn temp_id() -> String {
    format!("{}{}", TEMP_ID_PREFIX, uuid::Uuid::new_v4().simple())
}

/// Whether `id` was generated by [`temp_id`].
pub fn is_temp_id(id: &str) -> bool {
    id.starts_with(TEMP_ID_PREFIX)
}

/// Generate an attendance QR token for a new member: `MDQR_<32 hex>`.
pub fn qr_token() -> String {
    use rand::Rng;
    let bytes: [u8; 16] = rand::thread_rng().r#gen();
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    format!("{QR_TOKEN_PREFIX}{hex}")
}

/// Whether a decoded QR payload follows the member token convention.
pub fn is_member_qr_token(token: &str) -> bool {
    token
        .strip_prefix(QR_TOKEN_PREFIX)
        .is_some_and(|rest| !rest.is_empty() && !rest.chars().any(char::is_whitespace))
}

/// Add calendar months, clamping to the last day of the target month
/// (Jan 31 + 1 month = Feb 28/29).
pub fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_add_months(Months::new(months))
        .unwrap_or(NaiveDate::MAX)
}

/// Human plan label used in reminders and payment links: "1 month", "3 months".
pub fn plan_label(months: u32) -> String {
    if months == 1 {
        "1 month".to_string()
    } else {
        format!("{months} months")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_ids_are_distinguishable() {
        let id = temp_id();
        assert!(is_temp_id(&id));
        assert!(!is_temp_id("6f1c2b9e-1d4a-4c8e-9a57-2f0c7e1b3d5a"));
        assert_ne!(temp_id(), temp_id());
    }

    #[test]
    fn test_qr_token_format() {
        let token = qr_token();
        assert!(token.starts_with("MDQR_"));
        assert_eq!(token.len(), 5 + 32);
        assert!(is_member_qr_token(&token));
    }

    #[test]
    fn test_member_qr_token_rejects_foreign_payloads() {
        assert!(!is_member_qr_token("https://example.com"));
        assert!(!is_member_qr_token("MDQR_"));
        assert!(!is_member_qr_token("mdqr_abc"));
        assert!(!is_member_qr_token("MDQR_ab cd"));
        assert!(is_member_qr_token("MDQR_0b7e"));
    }

    #[test]
    fn test_add_months_clamps_to_month_end() {
        let jan31 = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        assert_eq!(add_months(jan31, 1), NaiveDate::from_ymd_opt(2025, 2, 28).unwrap());
        let leap = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        assert_eq!(add_months(leap, 1), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        let mid = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap();
        assert_eq!(add_months(mid, 12), NaiveDate::from_ymd_opt(2026, 3, 15).unwrap());
    }

    #[test]
    fn test_plan_label() {
        assert_eq!(plan_label(1), "1 month");
        assert_eq!(plan_label(6), "6 months");
    }
}
