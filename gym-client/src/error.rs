//! Client error types

use shared::error::{AppError, ErrorCode};
use thiserror::Error;

/// Error returned by a remote store call: the store's own `(code, message)` pair
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} ({code})")]
pub struct StoreError {
    pub code: String,
    pub message: String,
}

impl StoreError {
    /// No row matched (PostgREST `PGRST116`)
    pub const NOT_FOUND: &'static str = "PGRST116";
    /// Transport failure before the store answered
    pub const NETWORK: &'static str = "NETWORK";
    /// Row-level security / permission denial
    pub const DENIED: &'static str = "42501";
    /// Unique constraint violation
    pub const DUPLICATE: &'static str = "23505";
    /// Response body did not match the expected row shape
    pub const DECODE: &'static str = "DECODE";

    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(Self::NOT_FOUND, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(Self::NETWORK, message)
    }

    pub fn decode(err: serde_json::Error) -> Self {
        Self::new(Self::DECODE, err.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        self.code == Self::NOT_FOUND
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::new(Self::DECODE, err.to_string())
        } else {
            Self::network(err.to_string())
        }
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Error surfaced by the reconciling cache
///
/// Cloneable: one fetch failure is handed to every coalesced waiter.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// Input rejected before anything was published or sent
    #[error("{0}")]
    Validation(AppError),

    /// No signed-in account
    #[error("Please log in first")]
    AuthRequired,

    /// The store rejected an insert/update/delete
    #[error("{message}")]
    RemoteWrite { code: String, message: String },

    /// A snapshot read failed
    #[error("{message}")]
    RemoteRead { code: String, message: String },

    /// Target entity is not in the snapshot or the store
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Scanned payload is not a member QR token
    #[error("This is not a valid member QR code")]
    InvalidQrToken,

    /// The check-in procedure answered `success: false`
    #[error("{0}")]
    CheckInRejected(String),

    #[error("{member_name} has already checked in today")]
    AlreadyCheckedIn { member_name: String },

    /// Change feed subscription could not be established
    #[error("Live updates unavailable: {0}")]
    Subscription(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    pub fn remote_write(err: StoreError) -> Self {
        Self::RemoteWrite {
            code: err.code,
            message: err.message,
        }
    }

    pub fn remote_read(err: StoreError) -> Self {
        Self::RemoteRead {
            code: err.code,
            message: err.message,
        }
    }

    /// Map to the unified error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(e) => e.code,
            Self::AuthRequired => ErrorCode::NotAuthenticated,
            Self::RemoteWrite { code, .. } | Self::RemoteRead { code, .. } if code == StoreError::DENIED => {
                ErrorCode::PermissionDenied
            }
            Self::RemoteWrite { code, .. } if code == StoreError::DUPLICATE => ErrorCode::AlreadyExists,
            Self::RemoteWrite { .. } => ErrorCode::StoreWriteFailed,
            Self::RemoteRead { .. } => ErrorCode::StoreReadFailed,
            Self::NotFound { entity, .. } => match *entity {
                "member" => ErrorCode::MemberNotFound,
                "payment" => ErrorCode::PaymentNotFound,
                "plan" => ErrorCode::PlanNotFound,
                _ => ErrorCode::NotFound,
            },
            Self::InvalidQrToken => ErrorCode::QrTokenInvalid,
            Self::CheckInRejected(_) => ErrorCode::CheckInRejected,
            Self::AlreadyCheckedIn { .. } => ErrorCode::AlreadyCheckedIn,
            Self::Subscription(_) => ErrorCode::SubscriptionFailed,
            Self::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Text for a user-facing notice
    pub fn user_message(&self) -> String {
        match self {
            Self::RemoteWrite { message, .. } => format!("Error: {message}"),
            Self::RemoteRead { message, .. } => format!("Failed to load data: {message}"),
            other => other.to_string(),
        }
    }

    /// Whether the failure happened before any remote call
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::AuthRequired | Self::InvalidQrToken | Self::AlreadyCheckedIn { .. }
        )
    }
}

impl From<AppError> for CacheError {
    fn from(err: AppError) -> Self {
        if err.code == ErrorCode::NotAuthenticated {
            Self::AuthRequired
        } else {
            Self::Validation(err)
        }
    }
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Payment-link / recommendation service error
#[derive(Debug, Error)]
pub enum ServiceError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with `{ "error": ... }`
    #[error("{0}")]
    Api(String),

    /// Invalid response format
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ServiceError {
    /// Map to the unified error code
    pub fn code(&self) -> ErrorCode {
        match self {
            // 服务端明确拒绝
            Self::Api(_) => ErrorCode::InvalidRequest,
            Self::Http(_) | Self::InvalidResponse(_) | Self::Serialization(_) => ErrorCode::ServiceUnavailable,
        }
    }
}

/// Result type for service calls
pub type ServiceResult<T> = Result<T, ServiceError>;
