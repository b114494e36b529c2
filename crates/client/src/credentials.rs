//! Credentials handed to the connection manager by the session owner.
//!
//! The manager never reads ambient storage: whoever owns login state pushes
//! credentials in with `ConnectionManager::set_credentials` and listens for
//! `ConnectionEvent::AuthenticationFailed` to force a logout.

use std::fmt;

use hearth_shared::bearer;
use serde::{Deserialize, Serialize};

/// Bearer token and the logical user it belongs to.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub token: String,
    pub user_id: String,
}

impl Credentials {
    pub fn new(token: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            user_id: user_id.into(),
        }
    }

    /// Read `HEARTH_TOKEN` and `HEARTH_USER_ID`.
    pub fn from_env() -> Option<Self> {
        let token = std::env::var("HEARTH_TOKEN").ok()?;
        let user_id = std::env::var("HEARTH_USER_ID").ok()?;
        Some(Self::new(token, user_id)).filter(Credentials::is_usable)
    }

    /// An empty token counts as no credentials at all.
    pub fn is_usable(&self) -> bool {
        !self.token.trim().is_empty()
    }

    /// Value of the `Authorization` header.
    pub fn authorization(&self) -> String {
        bearer(&self.token)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"<redacted>")
            .field("user_id", &self.user_id)
            .finish()
    }
}
