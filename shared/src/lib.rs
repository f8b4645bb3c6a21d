//! Shared types for the gym workspace
//!
//! Domain models, the member lifecycle engine (status and reminders), error
//! codes, change notifications and the intent types every mutation goes through.

pub mod error;
pub mod intent;
pub mod lifecycle;
pub mod message;
pub mod models;
pub mod util;
pub mod validation;

// Re-exports
pub use serde::{Deserialize, Serialize};

pub use error::{AppError, AppResult, ErrorCategory, ErrorCode};
pub use intent::{CrudAction, GymIntent};
pub use lifecycle::{Reminder, compute_reminders, derive_status};
pub use message::{ChangeEvent, ChangeOperation, ChangeTable, Notice, NoticeLevel};
