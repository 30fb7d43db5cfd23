//! Refresh token rotation with reuse detection.
//!
//! A presented token moves through: signature check, ledger lookup, activity
//! check, then rotation. Garbage never reaches the ledger, and only a token
//! with a valid signature that is absent from the active chain counts as
//! reuse.

use tracing::{info, warn};

use super::{CredentialError, Credentials, RequestMeta, TokenPair};
use crate::db::RefreshTokenRecord;
use crate::jwt::{Claims, fingerprint, fingerprint_prefix, now_secs};

impl Credentials {
    /// Exchange a refresh token for a new pair, invalidating the old one.
    ///
    /// The claim of the old record, the successor insert and the link between
    /// them commit together. A failure anywhere leaves the old record active
    /// and no successor behind.
    pub async fn rotate(
        &self,
        raw_token: &str,
        meta: &RequestMeta,
    ) -> Result<TokenPair, CredentialError> {
        let claims = self.jwt.verify_refresh(raw_token)?;
        let record = self.rotatable_record(&claims, raw_token).await?;
        self.replace_record(&record, meta).await
    }

    /// Ledger lookup: succeeds only for an active record that was never
    /// rotated. Anything else with a valid signature is reuse.
    async fn rotatable_record(
        &self,
        claims: &Claims,
        raw_token: &str,
    ) -> Result<RefreshTokenRecord, CredentialError> {
        let token_hash = fingerprint(raw_token);
        let ledger = self.db.refresh_tokens();
        let now = now_secs();

        let record = match ledger.find_by_hash(&token_hash).await? {
            Some(record) if !record.is_rotated() => record,
            superseded => {
                // Either unknown to the ledger or already replaced by a
                // successor: somebody is replaying an old token.
                let revoked = match &superseded {
                    Some(record) => ledger.revoke_all_for_user(record.user_id, now).await?,
                    None => match self.db.users().get_by_uuid(&claims.sub).await? {
                        Some(user) => ledger.revoke_all_for_user(user.id, now).await?,
                        None => 0,
                    },
                };
                warn!(
                    sub = %claims.sub,
                    token_hash_prefix = fingerprint_prefix(&token_hash),
                    known = superseded.is_some(),
                    revoked,
                    "Refresh token reuse detected, revoked all sessions"
                );
                return Err(CredentialError::ReuseDetected);
            }
        };

        if !record.is_active(now) {
            return Err(CredentialError::InactiveToken);
        }
        Ok(record)
    }

    /// Issue a successor for `record` and swap it in atomically.
    async fn replace_record(
        &self,
        record: &RefreshTokenRecord,
        meta: &RequestMeta,
    ) -> Result<TokenPair, CredentialError> {
        let user = self
            .db
            .users()
            .get_by_id(record.user_id)
            .await?
            .ok_or(CredentialError::UserNotFound)?;

        let pending = self.sign_pair(&user, meta)?;

        // Lost race with a concurrent rotation or revocation
        if !self
            .db
            .refresh_tokens()
            .rotate(&record.token_hash, now_secs(), &pending.record())
            .await?
        {
            return Err(CredentialError::InactiveToken);
        }

        info!(
            user_id = user.id,
            token_hash_prefix = fingerprint_prefix(&record.token_hash),
            successor_prefix = fingerprint_prefix(&pending.pair.refresh_token_hash),
            "Rotated refresh token"
        );

        Ok(pending.pair)
    }
}
