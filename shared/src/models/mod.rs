//! Data models
//!
//! Row types mirror the remote store's tables. All ids are opaque strings
//! issued by the store; optimistic rows carry a `temp-` id until confirmed.

pub mod activity;
pub mod attendance;
pub mod branch;
pub mod member;
pub mod payment;
pub mod plan;
pub mod profile;
pub mod serde_helpers;
pub mod staff;

// Re-exports
pub use activity::*;
pub use attendance::*;
pub use branch::*;
pub use member::*;
pub use payment::*;
pub use plan::*;
pub use profile::*;
pub use staff::*;
