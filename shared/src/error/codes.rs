//! Unified error codes for the gym workspace
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 4xxx: Member errors
//! - 5xxx: Payment errors
//! - 6xxx: Plan errors
//! - 7xxx: Attendance errors
//! - 9xxx: Store / system errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists (unique constraint)
    AlreadyExists = 4,
    /// External service refused the request
    InvalidRequest = 5,
    /// Required field missing
    RequiredField = 7,
    /// Value out of range
    ValueOutOfRange = 8,

    // ==================== 1xxx: Auth ====================
    /// No account session is active
    NotAuthenticated = 1001,
    /// Store refused the request for this account (row-level security)
    PermissionDenied = 1003,

    // ==================== 4xxx: Member ====================
    /// Member not found
    MemberNotFound = 4001,
    /// Member expiry date is before the join date
    MemberExpiryBeforeJoin = 4002,

    // ==================== 5xxx: Payment ====================
    /// Payment not found
    PaymentNotFound = 5001,
    /// Payment amount is not positive
    PaymentAmountInvalid = 5002,

    // ==================== 6xxx: Plan ====================
    /// Plan not found
    PlanNotFound = 6001,
    /// Plan duration is outside the accepted range
    PlanDurationInvalid = 6002,

    // ==================== 7xxx: Attendance ====================
    /// QR token does not follow the member QR convention
    QrTokenInvalid = 7001,
    /// Check-in procedure rejected the token
    CheckInRejected = 7002,
    /// Member already checked in today
    AlreadyCheckedIn = 7003,

    // ==================== 9xxx: Store / System ====================
    /// Internal error
    InternalError = 9001,
    /// Remote store read failed
    StoreReadFailed = 9101,
    /// Remote store write failed
    StoreWriteFailed = 9102,
    /// Change subscription failed
    SubscriptionFailed = 9103,
    /// External service (payment link / recommendations) failed
    ServiceUnavailable = 9201,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::RequiredField => "Required field is missing",
            ErrorCode::ValueOutOfRange => "Value is out of range",

            // Auth
            ErrorCode::NotAuthenticated => "Please log in first",
            ErrorCode::PermissionDenied => "Permission denied",

            // Member
            ErrorCode::MemberNotFound => "Member not found",
            ErrorCode::MemberExpiryBeforeJoin => "Expiry date is before the joining date",

            // Payment
            ErrorCode::PaymentNotFound => "Payment not found",
            ErrorCode::PaymentAmountInvalid => "Payment amount must be positive",

            // Plan
            ErrorCode::PlanNotFound => "Plan not found",
            ErrorCode::PlanDurationInvalid => "Plan duration is out of range",

            // Attendance
            ErrorCode::QrTokenInvalid => "This is not a valid member QR code",
            ErrorCode::CheckInRejected => "Could not check in member",
            ErrorCode::AlreadyCheckedIn => "Member has already checked in today",

            // System
            ErrorCode::InternalError => "Internal error",
            ErrorCode::StoreReadFailed => "Failed to load data",
            ErrorCode::StoreWriteFailed => "Failed to save changes",
            ErrorCode::SubscriptionFailed => "Failed to subscribe to live updates",
            ErrorCode::ServiceUnavailable => "Service unavailable",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),
            7 => Ok(ErrorCode::RequiredField),
            8 => Ok(ErrorCode::ValueOutOfRange),

            // Auth
            1001 => Ok(ErrorCode::NotAuthenticated),
            1003 => Ok(ErrorCode::PermissionDenied),

            // Member
            4001 => Ok(ErrorCode::MemberNotFound),
            4002 => Ok(ErrorCode::MemberExpiryBeforeJoin),

            // Payment
            5001 => Ok(ErrorCode::PaymentNotFound),
            5002 => Ok(ErrorCode::PaymentAmountInvalid),

            // Plan
            6001 => Ok(ErrorCode::PlanNotFound),
            6002 => Ok(ErrorCode::PlanDurationInvalid),

            // Attendance
            7001 => Ok(ErrorCode::QrTokenInvalid),
            7002 => Ok(ErrorCode::CheckInRejected),
            7003 => Ok(ErrorCode::AlreadyCheckedIn),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9101 => Ok(ErrorCode::StoreReadFailed),
            9102 => Ok(ErrorCode::StoreWriteFailed),
            9103 => Ok(ErrorCode::SubscriptionFailed),
            9201 => Ok(ErrorCode::ServiceUnavailable),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_values() {
        assert_eq!(ErrorCode::Success.code(), 0);
        assert_eq!(ErrorCode::ValidationFailed.code(), 2);
        assert_eq!(ErrorCode::NotAuthenticated.code(), 1001);
        assert_eq!(ErrorCode::MemberNotFound.code(), 4001);
        assert_eq!(ErrorCode::PaymentAmountInvalid.code(), 5002);
        assert_eq!(ErrorCode::PlanDurationInvalid.code(), 6002);
        assert_eq!(ErrorCode::AlreadyCheckedIn.code(), 7003);
        assert_eq!(ErrorCode::StoreWriteFailed.code(), 9102);
    }

    #[test]
    fn test_is_success() {
        assert!(ErrorCode::Success.is_success());
        assert!(!ErrorCode::StoreReadFailed.is_success());
    }

    #[test]
    fn test_try_from_covers_every_code() {
        let all = [
            ErrorCode::Success,
            ErrorCode::ValidationFailed,
            ErrorCode::NotFound,
            ErrorCode::AlreadyExists,
            ErrorCode::InvalidRequest,
            ErrorCode::RequiredField,
            ErrorCode::ValueOutOfRange,
            ErrorCode::NotAuthenticated,
            ErrorCode::PermissionDenied,
            ErrorCode::MemberNotFound,
            ErrorCode::MemberExpiryBeforeJoin,
            ErrorCode::PaymentNotFound,
            ErrorCode::PaymentAmountInvalid,
            ErrorCode::PlanNotFound,
            ErrorCode::PlanDurationInvalid,
            ErrorCode::QrTokenInvalid,
            ErrorCode::CheckInRejected,
            ErrorCode::AlreadyCheckedIn,
            ErrorCode::InternalError,
            ErrorCode::StoreReadFailed,
            ErrorCode::StoreWriteFailed,
            ErrorCode::SubscriptionFailed,
            ErrorCode::ServiceUnavailable,
        ];
        for code in all {
            assert_eq!(ErrorCode::try_from(code.code()), Ok(code));
        }
    }

    #[test]
    fn test_try_from_invalid() {
        assert_eq!(ErrorCode::try_from(1), Err(InvalidErrorCode(1)));
        assert_eq!(ErrorCode::try_from(6), Err(InvalidErrorCode(6)));
        assert_eq!(ErrorCode::try_from(4242), Err(InvalidErrorCode(4242)));
    }

    #[test]
    fn test_serialize_as_number() {
        let json = serde_json::to_string(&ErrorCode::AlreadyCheckedIn).unwrap();
        assert_eq!(json, "7003");
        let code: ErrorCode = serde_json::from_str("4001").unwrap();
        assert_eq!(code, ErrorCode::MemberNotFound);
        assert!(serde_json::from_str::<ErrorCode>("12345").is_err());
    }

    #[test]
    fn test_message() {
        assert_eq!(ErrorCode::NotAuthenticated.message(), "Please log in first");
        assert_eq!(
            ErrorCode::QrTokenInvalid.message(),
            "This is not a valid member QR code"
        );
    }
}
