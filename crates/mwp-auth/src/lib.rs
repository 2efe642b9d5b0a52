//! # mwp-auth
//!
//! Authentication for the ministry work planner.
//!
//! ## Features
//!
//! - Argon2 password hashing
//! - Session login with opaque bearer tokens
//! - Idle expiry and session purging

pub mod password;
pub mod session;
pub mod token;

use mwp_core::error::MwpError;
use mwp_db::RepositoryError;
use thiserror::Error;

pub use password::{hash_password, verify_password};
pub use session::{Authenticated, ClientInfo, LoginGrant, SessionManager};
pub use token::{generate_token, new_session_id, token_digest};

/// Authentication errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid employee id or password")]
    InvalidCredentials,
    #[error("Invalid session token")]
    InvalidToken,
    #[error("Session expired")]
    SessionExpired,
    #[error("Password hashing failed: {0}")]
    Hashing(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub type AuthResult<T> = Result<T, AuthError>;

impl From<AuthError> for MwpError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials | AuthError::InvalidToken | AuthError::SessionExpired => {
                MwpError::unauthorized(err.to_string())
            }
            AuthError::Hashing(message) => MwpError::Internal(message),
            AuthError::Repository(e) => e.into(),
        }
    }
}
