use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a cache instance
///
/// `Unauthenticated → Loading → Ready ⇄ Refreshing`; a failed fetch with no
/// snapshot to fall back on moves to `Error`, and a retry goes back to `Loading`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheState {
    #[default]
    Unauthenticated,
    Loading,
    Ready,
    Refreshing,
    Error,
}

impl CacheState {
    /// A snapshot is available to read
    pub fn has_snapshot(&self) -> bool {
        matches!(self, Self::Ready | Self::Refreshing)
    }

    /// State to enter when a fetch starts
    pub(crate) fn on_fetch_start(self) -> Self {
        match self {
            Self::Ready => Self::Refreshing,
            Self::Error => Self::Loading,
            other => other,
        }
    }
}

impl fmt::Display for CacheState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthenticated => write!(f, "unauthenticated"),
            Self::Loading => write!(f, "loading"),
            Self::Ready => write!(f, "ready"),
            Self::Refreshing => write!(f, "refreshing"),
            Self::Error => write!(f, "error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_start_transitions() {
        assert_eq!(CacheState::Ready.on_fetch_start(), CacheState::Refreshing);
        assert_eq!(CacheState::Error.on_fetch_start(), CacheState::Loading);
        assert_eq!(CacheState::Loading.on_fetch_start(), CacheState::Loading);
        assert!(CacheState::Refreshing.has_snapshot());
        assert!(!CacheState::Error.has_snapshot());
    }
}
