//! Signed token codec and refresh-token fingerprints.
//!
//! Access and refresh tokens share one claim layout and differ by the `typ`
//! discriminator, their signing secret and their lifetime. Both are HS256 and
//! carry issuer and audience claims that are pinned on verification.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Token type for distinguishing access vs refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Short-lived bearer token, never persisted
    Access,
    /// Long-lived token, tracked in the ledger by fingerprint
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

/// Claims carried by both token types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user UUID)
    pub sub: String,
    pub email: String,
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    pub iss: String,
    pub aud: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Unique token id
    pub jti: String,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Default access token lifetime: 15 minutes
pub const DEFAULT_ACCESS_TOKEN_TTL: Duration = Duration::from_secs(15 * 60);

/// Default refresh token lifetime: 7 days
pub const DEFAULT_REFRESH_TOKEN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Inputs for building a [`JwtConfig`].
#[derive(Clone)]
pub struct JwtSettings {
    pub access_secret: Vec<u8>,
    pub refresh_secret: Vec<u8>,
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl JwtSettings {
    /// Settings with default lifetimes, issuer and audience.
    pub fn new(access_secret: &[u8], refresh_secret: &[u8]) -> Self {
        Self {
            access_secret: access_secret.to_vec(),
            refresh_secret: refresh_secret.to_vec(),
            issuer: "tokenward".to_string(),
            audience: "tokenward-clients".to_string(),
            access_ttl: DEFAULT_ACCESS_TOKEN_TTL,
            refresh_ttl: DEFAULT_REFRESH_TOKEN_TTL,
        }
    }
}

/// Signing and verification keys plus claim policy.
#[derive(Clone)]
pub struct JwtConfig {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    issuer: String,
    audience: String,
    access_ttl_secs: u64,
    refresh_ttl_secs: u64,
}

/// A freshly signed token.
#[derive(Debug, Clone)]
pub struct SignedToken {
    /// The JWT token string
    pub token: String,
    pub jti: String,
    /// Issued at timestamp (Unix seconds)
    pub issued_at: u64,
    /// Expiration timestamp (Unix seconds)
    pub expires_at: u64,
    /// Token duration in seconds
    pub duration: u64,
}

impl JwtConfig {
    pub fn new(settings: &JwtSettings) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(&settings.access_secret),
            access_decoding: DecodingKey::from_secret(&settings.access_secret),
            refresh_encoding: EncodingKey::from_secret(&settings.refresh_secret),
            refresh_decoding: DecodingKey::from_secret(&settings.refresh_secret),
            issuer: settings.issuer.clone(),
            audience: settings.audience.clone(),
            access_ttl_secs: settings.access_ttl.as_secs(),
            refresh_ttl_secs: settings.refresh_ttl.as_secs(),
        }
    }

    pub fn access_ttl_secs(&self) -> u64 {
        self.access_ttl_secs
    }

    pub fn refresh_ttl_secs(&self) -> u64 {
        self.refresh_ttl_secs
    }

    /// Sign a short-lived access token for a user.
    pub fn sign_access(&self, user_uuid: &str, email: &str) -> Result<SignedToken, JwtError> {
        self.sign(
            user_uuid,
            email,
            TokenType::Access,
            self.access_ttl_secs,
            &self.access_encoding,
        )
    }

    /// Sign a long-lived refresh token for a user.
    pub fn sign_refresh(&self, user_uuid: &str, email: &str) -> Result<SignedToken, JwtError> {
        self.sign(
            user_uuid,
            email,
            TokenType::Refresh,
            self.refresh_ttl_secs,
            &self.refresh_encoding,
        )
    }

    fn sign(
        &self,
        user_uuid: &str,
        email: &str,
        token_type: TokenType,
        duration: u64,
        key: &EncodingKey,
    ) -> Result<SignedToken, JwtError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| JwtError::TimeError)?
            .as_secs();

        let jti = uuid::Uuid::new_v4().to_string();
        let exp = now + duration;

        let claims = Claims {
            sub: user_uuid.to_string(),
            email: email.to_string(),
            token_type,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now,
            jti: jti.clone(),
            exp,
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, key)
            .map_err(JwtError::Encoding)?;

        Ok(SignedToken {
            token,
            jti,
            issued_at: now,
            expires_at: exp,
            duration,
        })
    }

    /// Validate and decode an access token.
    pub fn verify_access(&self, token: &str) -> Result<Claims, JwtError> {
        self.verify(token, TokenType::Access, &self.access_decoding)
    }

    /// Validate and decode a refresh token.
    pub fn verify_refresh(&self, token: &str) -> Result<Claims, JwtError> {
        self.verify(token, TokenType::Refresh, &self.refresh_decoding)
    }

    fn verify(
        &self,
        token: &str,
        expected: TokenType,
        key: &DecodingKey,
    ) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

        let token_data = jsonwebtoken::decode::<Claims>(token, key, &validation).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::Expired,
                _ => JwtError::Malformed(e),
            },
        )?;

        if token_data.claims.token_type != expected {
            return Err(JwtError::WrongTokenType);
        }

        Ok(token_data.claims)
    }
}

/// One-way storage key for a raw token: lowercase hex SHA-256.
pub fn fingerprint(raw_token: &str) -> String {
    hex::encode(openssl::sha::sha256(raw_token.as_bytes()))
}

/// Short, loggable prefix of a fingerprint.
pub fn fingerprint_prefix(hash: &str) -> &str {
    hash.get(..8).unwrap_or(hash)
}

/// Current Unix time in seconds.
pub fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// Errors that can occur during JWT operations.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("failed to encode token: {0}")]
    Encoding(jsonwebtoken::errors::Error),
    #[error("malformed token: {0}")]
    Malformed(jsonwebtoken::errors::Error),
    #[error("token expired")]
    Expired,
    #[error("system time error")]
    TimeError,
    /// e.g. a refresh token presented as an access token
    #[error("wrong token type")]
    WrongTokenType,
}
