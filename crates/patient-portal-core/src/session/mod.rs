//! Durable session storage: bearer token plus the signed-in user.
//!
//! The store is the only writer of the session record. Callers pass it
//! explicitly to the API client and the auth context.

pub mod token;

use std::path::Path;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use crate::db::{Database, DbError, AUTH_TOKEN_KEY, AUTH_USER_KEY};
use crate::models::User;

/// Session storage errors.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session storage error: {0}")]
    Storage(#[from] DbError),

    #[error("Session encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// A snapshot of the stored session.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub user: Option<User>,
}

/// Wrapper around the durable session record.
pub struct SessionStore {
    db: Database,
}

impl SessionStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Open a file-backed store, creating it if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> SessionResult<Self> {
        Ok(Self::new(Database::open(path)?))
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> SessionResult<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    /// Persist the token, and the user when one is given.
    ///
    /// Passing `None` leaves any previously stored user in place.
    pub fn set_auth_data(&self, token: &str, user: Option<&User>) -> SessionResult<()> {
        self.db.set_session_value(AUTH_TOKEN_KEY, token)?;
        if let Some(user) = user {
            let json = serde_json::to_string(user)?;
            self.db.set_session_value(AUTH_USER_KEY, &json)?;
        }
        debug!(with_user = user.is_some(), "stored auth data");
        Ok(())
    }

    pub fn get_token(&self) -> SessionResult<Option<String>> {
        Ok(self.db.get_session_value(AUTH_TOKEN_KEY)?)
    }

    /// Stored user, if any. A record that no longer parses reads as absent.
    pub fn get_user(&self) -> SessionResult<Option<User>> {
        let Some(json) = self.db.get_session_value(AUTH_USER_KEY)? else {
            return Ok(None);
        };
        match serde_json::from_str(&json) {
            Ok(user) => Ok(Some(user)),
            Err(e) => {
                warn!(error = %e, "ignoring unreadable stored user");
                Ok(None)
            }
        }
    }

    /// Token and user together, if a token is stored.
    pub fn session(&self) -> SessionResult<Option<Session>> {
        let Some(token) = self.get_token()? else {
            return Ok(None);
        };
        Ok(Some(Session {
            token,
            user: self.get_user()?,
        }))
    }

    /// Remove token and user.
    pub fn clear_auth_data(&self) -> SessionResult<()> {
        let removed = self
            .db
            .delete_session_values(&[AUTH_TOKEN_KEY, AUTH_USER_KEY])?;
        debug!(removed, "cleared auth data");
        Ok(())
    }

    /// True only for a stored, well-formed, unexpired token.
    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated_at(Utc::now())
    }

    /// Expiry check against an explicit clock. Fails closed on storage errors.
    pub fn is_authenticated_at(&self, now: DateTime<Utc>) -> bool {
        match self.get_token() {
            Ok(Some(token)) => token::is_unexpired(&token, now),
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "could not read token");
                false
            }
        }
    }

    /// `Authorization` header value for the stored token.
    pub fn bearer_header(&self) -> SessionResult<Option<String>> {
        Ok(self.get_token()?.map(|token| format!("Bearer {token}")))
    }
}
