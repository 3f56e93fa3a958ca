//! Credentials and bearer tokens.

mod password;
mod token;

pub use password::{hash_password, verify_password};
pub use token::{Claims, TokenManager};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Failed to hash password: {0}")]
    Hash(String),
    #[error("Failed to sign token: {0}")]
    Sign(#[source] jsonwebtoken::errors::Error),
    #[error("Invalid token: {0}")]
    InvalidToken(#[source] jsonwebtoken::errors::Error),
}
