//! Error category classification

use super::codes::ErrorCode;
use serde::{Deserialize, Serialize};

/// Error category classification based on error code ranges
///
/// Categories are determined by the leading digit of the error code:
/// - 0xxx: General errors
/// - 1xxx: Authentication errors
/// - 4xxx: Member errors
/// - 5xxx: Payment errors
/// - 6xxx: Plan errors
/// - 7xxx: Attendance errors
/// - everything else: Store / system errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// General errors (0xxx)
    General,
    /// Authentication errors (1xxx)
    Auth,
    /// Member errors (4xxx)
    Member,
    /// Payment errors (5xxx)
    Payment,
    /// Plan errors (6xxx)
    Plan,
    /// Attendance errors (7xxx)
    Attendance,
    /// Store / system errors (9xxx)
    System,
}

impl ErrorCategory {
    /// Determine category from error code value
    pub fn from_code(code: u16) -> Self {
        match code {
            0..1000 => Self::General,
            1000..2000 => Self::Auth,
            4000..5000 => Self::Member,
            5000..6000 => Self::Payment,
            6000..7000 => Self::Plan,
            7000..8000 => Self::Attendance,
            _ => Self::System,
        }
    }

    /// Get the string name for this category
    pub fn name(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Auth => "auth",
            Self::Member => "member",
            Self::Payment => "payment",
            Self::Plan => "plan",
            Self::Attendance => "attendance",
            Self::System => "system",
        }
    }
}

impl ErrorCode {
    /// Get the category for this error code
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::from_code(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_code() {
        assert_eq!(ErrorCategory::from_code(0), ErrorCategory::General);
        assert_eq!(ErrorCategory::from_code(999), ErrorCategory::General);
        assert_eq!(ErrorCategory::from_code(1001), ErrorCategory::Auth);
        assert_eq!(ErrorCategory::from_code(4001), ErrorCategory::Member);
        assert_eq!(ErrorCategory::from_code(5001), ErrorCategory::Payment);
        assert_eq!(ErrorCategory::from_code(6001), ErrorCategory::Plan);
        assert_eq!(ErrorCategory::from_code(7001), ErrorCategory::Attendance);
        assert_eq!(ErrorCategory::from_code(9101), ErrorCategory::System);
        // unassigned ranges fall through to system
        assert_eq!(ErrorCategory::from_code(2001), ErrorCategory::System);
    }

    #[test]
    fn test_error_code_category() {
        assert_eq!(ErrorCode::NotAuthenticated.category(), ErrorCategory::Auth);
        assert_eq!(ErrorCode::MemberNotFound.category(), ErrorCategory::Member);
        assert_eq!(
            ErrorCode::AlreadyCheckedIn.category(),
            ErrorCategory::Attendance
        );
        assert_eq!(ErrorCode::StoreWriteFailed.category(), ErrorCategory::System);
    }

    #[test]
    fn test_category_serialize() {
        let json = serde_json::to_string(&ErrorCategory::Attendance).unwrap();
        assert_eq!(json, "\"attendance\"");
        let category: ErrorCategory = serde_json::from_str("\"plan\"").unwrap();
        assert_eq!(category, ErrorCategory::Plan);
    }
}
