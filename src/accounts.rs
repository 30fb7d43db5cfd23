//! Account operations independent of the HTTP layer: registration, password
//! login, refresh, and logout.
//!
//! Login establishes both authentication modes at once: a token pair and a
//! server-side session.

use std::fmt;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use tracing::{info, warn};

use crate::credentials::{CredentialError, Credentials, RequestMeta, TokenPair};
use crate::db::{Database, NewUser, User, is_unique_violation};
use crate::jwt::{fingerprint, now_secs};
use crate::password::{hash_password, validate_password, verify_password};

/// Default lifetime of a server-side session.
pub const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 60 * 60;

const MAX_EMAIL_LEN: usize = 254;
const MAX_NAME_LEN: usize = 100;
const SESSION_INSERT_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct Accounts {
    db: Database,
    credentials: Credentials,
    session_ttl_secs: u64,
}

/// Everything a successful login hands back to the client.
pub struct LoginOutcome {
    pub user: User,
    pub tokens: TokenPair,
    /// Raw session id for the session cookie. Only its fingerprint is stored.
    pub session_id: String,
}

impl fmt::Debug for LoginOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginOutcome")
            .field("user_id", &self.user.id)
            .field("user_uuid", &self.user.uuid)
            .field("tokens", &self.tokens)
            .field("session_id", &"<redacted>")
            .finish()
    }
}

/// Registration input. `confirm_password`, when given, must match.
#[derive(Debug, Clone, Copy)]
pub struct Registration<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub name: Option<&'a str>,
    pub confirm_password: Option<&'a str>,
}

impl Accounts {
    pub fn new(db: Database, credentials: Credentials, session_ttl_secs: u64) -> Self {
        Self {
            db,
            credentials,
            session_ttl_secs,
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn session_ttl_secs(&self) -> u64 {
        self.session_ttl_secs
    }

    /// Create a password account. No tokens are issued; the client logs in next.
    pub async fn register(&self, input: Registration<'_>) -> Result<User, CredentialError> {
        let email = normalize_email(input.email);
        validate_email(&email)?;
        validate_password(input.password)
            .map_err(|msg| CredentialError::Validation(msg.to_string()))?;
        if input.confirm_password.is_some_and(|c| c != input.password) {
            return Err(CredentialError::Validation(
                "Confirm password must match password".into(),
            ));
        }

        let name = input.name.map(str::trim).unwrap_or_default();
        if name.chars().count() > MAX_NAME_LEN {
            return Err(CredentialError::Validation(format!(
                "Name must be at most {MAX_NAME_LEN} characters"
            )));
        }

        let users = self.db.users();
        if users.get_by_email(&email).await?.is_some() {
            return Err(CredentialError::Conflict("Email already registered".into()));
        }

        let password_hash = hash_blocking(input.password.to_string()).await?;
        let uuid = uuid::Uuid::new_v4().to_string();

        let id = match users
            .create(&NewUser {
                uuid: &uuid,
                email: &email,
                name,
                password_hash: Some(&password_hash),
            })
            .await
        {
            Ok(id) => id,
            // Lost a race with a concurrent registration
            Err(e) if is_unique_violation(&e) => {
                return Err(CredentialError::Conflict("Email already registered".into()));
            }
            Err(e) => return Err(e.into()),
        };

        let user = users
            .get_by_id(id)
            .await?
            .ok_or_else(|| CredentialError::Internal("user vanished after insert".into()))?;

        info!(user_id = user.id, "User registered");
        Ok(user)
    }

    /// Verify a password and establish a session plus a token pair.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        meta: &RequestMeta,
    ) -> Result<LoginOutcome, CredentialError> {
        let email = normalize_email(email);
        let user = self.db.users().get_by_email(&email).await?;

        // Accounts without a password hash belong to an external provider
        let Some((user, hash)) =
            user.and_then(|u| u.password_hash.clone().map(|hash| (u, hash)))
        else {
            return Err(CredentialError::InvalidCredentials);
        };

        if !verify_blocking(password.to_string(), hash).await? {
            warn!(user_id = user.id, "Failed login attempt");
            return Err(CredentialError::InvalidCredentials);
        }

        let tokens = self.credentials.create_tokens(&user, meta).await?;
        let session_id = match self.create_session(user.id).await {
            Ok(session_id) => session_id,
            Err(e) => {
                // No cookie will ever carry the new refresh token
                if let Err(revoke_err) = self
                    .credentials
                    .revoke_one(&tokens.refresh_token_hash)
                    .await
                {
                    warn!(error = %revoke_err, "Failed to revoke token of aborted login");
                }
                return Err(e);
            }
        };

        info!(user_id = user.id, "User logged in");
        Ok(LoginOutcome {
            user,
            tokens,
            session_id,
        })
    }

    /// Rotate the refresh token presented by the client.
    pub async fn refresh(
        &self,
        refresh_token: Option<&str>,
        meta: &RequestMeta,
    ) -> Result<TokenPair, CredentialError> {
        let token = refresh_token
            .filter(|t| !t.is_empty())
            .ok_or(CredentialError::NotAuthenticated)?;
        self.credentials.rotate(token, meta).await
    }

    /// Revoke the presented refresh token and delete the presented session.
    /// Returns true if either existed. Safe to call repeatedly.
    pub async fn logout(
        &self,
        refresh_token: Option<&str>,
        session_id: Option<&str>,
    ) -> Result<bool, CredentialError> {
        let mut revoked = false;

        if let Some(token) = refresh_token.filter(|t| !t.is_empty()) {
            revoked |= self.credentials.revoke_presented(token).await?;
        }
        if let Some(session) = session_id.filter(|s| !s.is_empty()) {
            revoked |= self.db.sessions().delete(&fingerprint(session)).await?;
        }

        Ok(revoked)
    }

    /// Revoke every refresh token and session of a user.
    /// Returns the number of refresh tokens revoked.
    pub async fn logout_all(&self, user_id: i64) -> Result<u64, CredentialError> {
        let count = self.credentials.revoke_all(user_id).await?;
        let sessions = self.db.sessions().delete_all_for_user(user_id).await?;
        info!(user_id, count, sessions, "Logged out everywhere");
        Ok(count)
    }

    /// Resolve a raw session id to its user.
    pub async fn session_user(&self, session_id: &str) -> Result<Option<User>, CredentialError> {
        let Some(user_id) = self
            .db
            .sessions()
            .lookup(&fingerprint(session_id), now_secs())
            .await?
        else {
            return Ok(None);
        };
        Ok(self.db.users().get_by_id(user_id).await?)
    }

    async fn create_session(&self, user_id: i64) -> Result<String, CredentialError> {
        let now = now_secs();
        let expires_at = now + self.session_ttl_secs as i64;

        for _ in 0..SESSION_INSERT_ATTEMPTS {
            let session_id = generate_session_id();
            match self
                .db
                .sessions()
                .create(&fingerprint(&session_id), user_id, now, expires_at)
                .await
            {
                Ok(_) => return Ok(session_id),
                Err(e) if is_unique_violation(&e) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(CredentialError::Internal(
            "failed to generate unique session id".into(),
        ))
    }
}

/// 32 random bytes, base64url without padding.
fn generate_session_id() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_email(email: &str) -> Result<(), CredentialError> {
    let invalid = || CredentialError::Validation("Invalid email address".into());

    if email.is_empty() || email.len() > MAX_EMAIL_LEN || email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return Err(invalid());
    }
    Ok(())
}

async fn hash_blocking(password: String) -> Result<String, CredentialError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| CredentialError::Internal(format!("hash task failed: {e}")))?
        .map_err(|e| CredentialError::Internal(e.to_string()))
}

async fn verify_blocking(password: String, hash: String) -> Result<bool, CredentialError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| CredentialError::Internal(format!("verify task failed: {e}")))?
        .map_err(|e| CredentialError::Internal(e.to_string()))
}
