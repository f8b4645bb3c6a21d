//! Auth provider seam
//!
//! The cache never talks to an auth service itself; it only reads the current
//! session and watches for sign-in / sign-out.

use serde::{Deserialize, Serialize};
use shared::models::SessionIdentity;
use tokio::sync::watch;

/// Signed-in account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSession {
    pub account_id: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Name from the auth provider's user metadata
    #[serde(default)]
    pub display_name: Option<String>,
    /// Bearer token for the store, when it needs one
    #[serde(default, skip_serializing)]
    pub access_token: Option<String>,
}

impl AccountSession {
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            email: None,
            display_name: None,
            access_token: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn identity(&self) -> SessionIdentity<'_> {
        SessionIdentity {
            display_name: self.display_name.as_deref(),
            email: self.email.as_deref(),
        }
    }
}

pub trait AuthProvider: Send + Sync + 'static {
    /// Current session, if any
    fn session(&self) -> Option<AccountSession>;

    /// Fires on every sign-in / sign-out / account switch
    fn watch(&self) -> watch::Receiver<Option<AccountSession>>;
}

/// In-process auth provider driven by explicit calls
#[derive(Debug)]
pub struct StaticAuth {
    tx: watch::Sender<Option<AccountSession>>,
}

impl StaticAuth {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    pub fn signed_in(session: AccountSession) -> Self {
        let (tx, _) = watch::channel(Some(session));
        Self { tx }
    }

    pub fn sign_in(&self, session: AccountSession) {
        tracing::info!(account_id = %session.account_id, "Signed in");
        self.tx.send_replace(Some(session));
    }

    pub fn sign_out(&self) {
        if self.tx.send_replace(None).is_some() {
            tracing::info!("Signed out");
        }
    }
}

impl Default for StaticAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthProvider for StaticAuth {
    fn session(&self) -> Option<AccountSession> {
        self.tx.borrow().clone()
    }

    fn watch(&self) -> watch::Receiver<Option<AccountSession>> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_auth_notifies_watchers() {
        let auth = StaticAuth::new();
        let mut rx = auth.watch();
        assert!(auth.session().is_none());

        auth.sign_in(AccountSession::new("acc-1").with_email("owner@gym.in"));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().as_ref().map(|s| s.account_id.as_str()), Some("acc-1"));

        auth.sign_out();
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_none());
    }

    #[test]
    fn test_token_not_serialized() {
        let session = AccountSession::new("acc").with_access_token("secret");
        let json = serde_json::to_string(&session).unwrap();
        assert!(!json.contains("secret"));
    }
}
