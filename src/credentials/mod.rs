//! Credential lifecycle: issuing token pairs, rotating refresh tokens with
//! reuse detection, and revocation.
//!
//! The refresh token ledger in the database is the single source of truth.
//! Nothing here holds mutable in-process state, so any number of handlers and
//! processes can share one [`Credentials`] per database.

mod error;
mod issuer;
mod meta;
mod revocation;
mod rotation;

use std::fmt;
use std::sync::Arc;

use crate::db::Database;
use crate::jwt::JwtConfig;

pub use error::CredentialError;
pub use meta::{MAX_IP_LEN, MAX_USER_AGENT_LEN, RequestMeta, UNKNOWN_USER_AGENT};

/// Token issuance, rotation and revocation over the refresh token ledger.
#[derive(Clone)]
pub struct Credentials {
    db: Database,
    jwt: Arc<JwtConfig>,
}

impl Credentials {
    pub fn new(db: Database, jwt: Arc<JwtConfig>) -> Self {
        Self { db, jwt }
    }

    pub fn jwt(&self) -> &JwtConfig {
        &self.jwt
    }
}

/// A freshly issued access + refresh token pair.
///
/// The raw refresh token is handed out exactly once, here.
#[derive(Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Fingerprint of `refresh_token`, as stored in the ledger
    pub refresh_token_hash: String,
    /// Access token lifetime in seconds
    pub access_expires_in: u64,
    /// Refresh token lifetime in seconds
    pub refresh_expires_in: u64,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("refresh_token_hash", &self.refresh_token_hash)
            .field("access_expires_in", &self.access_expires_in)
            .field("refresh_expires_in", &self.refresh_expires_in)
            .finish()
    }
}
