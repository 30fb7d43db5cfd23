use tracing::debug;

use super::{CredentialError, Credentials, RequestMeta, TokenPair};
use crate::db::{NewRefreshToken, User};
use crate::jwt::{fingerprint, fingerprint_prefix};

/// A signed pair whose ledger record has not been written yet.
pub(super) struct PendingPair {
    pub(super) pair: TokenPair,
    user_id: i64,
    created_at: i64,
    expires_at: i64,
    ip: Option<String>,
    user_agent: String,
}

impl PendingPair {
    pub(super) fn record(&self) -> NewRefreshToken<'_> {
        NewRefreshToken {
            token_hash: &self.pair.refresh_token_hash,
            user_id: self.user_id,
            created_at: self.created_at,
            expires_at: self.expires_at,
            ip: self.ip.as_deref(),
            user_agent: &self.user_agent,
        }
    }
}

impl Credentials {
    /// Mint an access + refresh pair for `user` and record the refresh token
    /// in the ledger.
    ///
    /// Both tokens are signed before anything is written, so a signing failure
    /// leaves no record behind. Fingerprint uniqueness is left to the store's
    /// unique constraint.
    pub async fn create_tokens(
        &self,
        user: &User,
        meta: &RequestMeta,
    ) -> Result<TokenPair, CredentialError> {
        let pending = self.sign_pair(user, meta)?;
        self.db.refresh_tokens().insert(&pending.record()).await?;

        debug!(
            user_id = user.id,
            token_hash_prefix = fingerprint_prefix(&pending.pair.refresh_token_hash),
            "Issued token pair"
        );

        Ok(pending.pair)
    }

    /// Sign both tokens without touching the ledger.
    pub(super) fn sign_pair(
        &self,
        user: &User,
        meta: &RequestMeta,
    ) -> Result<PendingPair, CredentialError> {
        let access = self.jwt.sign_access(&user.uuid, &user.email)?;
        let refresh = self.jwt.sign_refresh(&user.uuid, &user.email)?;
        let token_hash = fingerprint(&refresh.token);

        Ok(PendingPair {
            pair: TokenPair {
                access_token: access.token,
                refresh_token: refresh.token,
                refresh_token_hash: token_hash,
                access_expires_in: access.duration,
                refresh_expires_in: refresh.duration,
            },
            user_id: user.id,
            created_at: refresh.issued_at as i64,
            expires_at: refresh.expires_at as i64,
            ip: meta.sanitized_ip(),
            user_agent: meta.sanitized_user_agent(),
        })
    }
}
