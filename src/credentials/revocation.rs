use tracing::info;

use super::{CredentialError, Credentials};
use crate::db::RefreshTokenRecord;
use crate::jwt::{fingerprint, fingerprint_prefix, now_secs};

impl Credentials {
    /// Revoke a single refresh token by fingerprint.
    /// Returns false if it was unknown or already revoked.
    pub async fn revoke_one(&self, token_hash: &str) -> Result<bool, CredentialError> {
        let revoked = self
            .db
            .refresh_tokens()
            .revoke(token_hash, now_secs())
            .await?;

        if revoked {
            info!(
                token_hash_prefix = fingerprint_prefix(token_hash),
                "Revoked refresh token"
            );
        }
        Ok(revoked)
    }

    /// Revoke a raw refresh token as presented by a client.
    ///
    /// The signature is not checked: logout must work for expired tokens
    /// too, and an unknown fingerprint simply revokes nothing.
    pub async fn revoke_presented(&self, raw_token: &str) -> Result<bool, CredentialError> {
        self.revoke_one(&fingerprint(raw_token)).await
    }

    /// Revoke every active refresh token of a user. Returns how many were revoked.
    pub async fn revoke_all(&self, user_id: i64) -> Result<u64, CredentialError> {
        let count = self
            .db
            .refresh_tokens()
            .revoke_all_for_user(user_id, now_secs())
            .await?;

        info!(user_id, count, "Revoked all refresh tokens");
        Ok(count)
    }

    /// A user's active refresh tokens, newest first.
    pub async fn active_tokens(
        &self,
        user_id: i64,
    ) -> Result<Vec<RefreshTokenRecord>, CredentialError> {
        Ok(self
            .db
            .refresh_tokens()
            .list_active_by_user(user_id, now_secs())
            .await?)
    }

    /// Revoke one of a user's refresh tokens by record id.
    /// Records owned by someone else are left alone.
    pub async fn revoke_owned(&self, user_id: i64, id: i64) -> Result<bool, CredentialError> {
        let revoked = self
            .db
            .refresh_tokens()
            .revoke_by_id(id, user_id, now_secs())
            .await?;

        if revoked {
            info!(user_id, token_id = id, "Revoked refresh token");
        }
        Ok(revoked)
    }
}
