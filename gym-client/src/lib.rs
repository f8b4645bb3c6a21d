//! Gym Client - reconciling data cache for a gym front desk
//!
//! One [`GymCache`] per signed-in account: it reads every collection from a
//! [`RemoteStore`], derives member statuses and renewal reminders, applies
//! writes optimistically and keeps itself in sync from a [`ChangeFeed`].

pub mod auth;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod logger;
pub mod realtime;
pub mod services;
pub mod store;

pub use auth::{AccountSession, AuthProvider, StaticAuth};
pub use cache::{AttendanceStats, CacheState, CheckInResult, GymCache, MutationOutcome, Snapshot};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{CacheConfig, ServiceConfig, StoreConfig};
pub use error::{CacheError, CacheResult, ServiceError, ServiceResult, StoreError, StoreResult};
pub use realtime::{ChangeFeed, MemoryChangeFeed};
pub use services::{
    HttpServices, PaymentLink, PaymentLinkRequest, PaymentLinkService, RecommendationRequest,
    RecommendationService,
};
pub use store::{Filter, MemoryStore, Query, RemoteStore, RestStore, StoreOp};

// Re-export shared types for convenience
pub use shared::lifecycle::Reminder;
pub use shared::message::{ChangeEvent, ChangeOperation, ChangeTable, Notice, NoticeLevel};
pub use shared::{CrudAction, GymIntent};
