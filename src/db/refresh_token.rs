//! Refresh token ledger.
//!
//! Only refresh tokens are stored, keyed by their fingerprint; the raw token
//! never reaches the database. Every mutation is a conditional UPDATE so the
//! store itself arbitrates concurrent rotations and revocations.

use std::collections::HashSet;

use sqlx::sqlite::SqlitePool;

/// A refresh token ledger record. Timestamps are Unix seconds.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RefreshTokenRecord {
    pub id: i64,
    pub token_hash: String,
    pub user_id: i64,
    pub created_at: i64,
    pub expires_at: i64,
    pub revoked: Option<i64>,
    pub replaced_by_hash: Option<String>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl RefreshTokenRecord {
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }

    /// Active iff not revoked and not yet expired.
    pub fn is_active(&self, now: i64) -> bool {
        self.revoked.is_none() && !self.is_expired(now)
    }

    /// Whether this record has been superseded by a rotation.
    pub fn is_rotated(&self) -> bool {
        self.replaced_by_hash.is_some()
    }
}

const INSERT_RECORD: &str = "INSERT INTO refresh_tokens (token_hash, user_id, created_at, expires_at, ip, user_agent) VALUES (?, ?, ?, ?, ?, ?)";

/// Fields for a new ledger record.
#[derive(Debug, Clone)]
pub struct NewRefreshToken<'a> {
    pub token_hash: &'a str,
    pub user_id: i64,
    pub created_at: i64,
    pub expires_at: i64,
    pub ip: Option<&'a str>,
    pub user_agent: &'a str,
}

/// Store for the refresh token ledger.
pub struct RefreshTokenStore {
    pool: SqlitePool,
}

impl RefreshTokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new record. A duplicate fingerprint fails with a unique violation.
    pub async fn insert(&self, token: &NewRefreshToken<'_>) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(INSERT_RECORD)
            .bind(token.token_hash)
            .bind(token.user_id)
            .bind(token.created_at)
            .bind(token.expires_at)
            .bind(token.ip)
            .bind(token.user_agent)
            .execute(&self.pool)
            .await?;

        Ok(result.last_insert_rowid())
    }

    /// Look up a record by fingerprint.
    pub async fn find_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, token_hash, user_id, created_at, expires_at, revoked, replaced_by_hash, ip, user_agent FROM refresh_tokens WHERE token_hash = ?",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
    }

    /// Replace an active record with `successor` in one transaction: revoke
    /// the record, insert the successor and link the two.
    ///
    /// Returns false and writes nothing when the record is no longer active.
    /// A concurrent `revoke_all_for_user` therefore either runs first and
    /// wins the claim, or runs after commit and also revokes the successor.
    pub async fn rotate(
        &self,
        token_hash: &str,
        now: i64,
        successor: &NewRefreshToken<'_>,
    ) -> Result<bool, sqlx::Error> {
        if successor.token_hash == token_hash {
            return Ok(false);
        }

        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query(
            "UPDATE refresh_tokens SET revoked = ? WHERE token_hash = ? AND revoked IS NULL AND expires_at > ?",
        )
        .bind(now)
        .bind(token_hash)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        if claimed.rows_affected() == 0 {
            // Dropping the transaction rolls it back
            return Ok(false);
        }

        sqlx::query(INSERT_RECORD)
            .bind(successor.token_hash)
            .bind(successor.user_id)
            .bind(successor.created_at)
            .bind(successor.expires_at)
            .bind(successor.ip)
            .bind(successor.user_agent)
            .execute(&mut *tx)
            .await?;

        let linked = sqlx::query(
            "UPDATE refresh_tokens SET replaced_by_hash = ? WHERE token_hash = ? AND replaced_by_hash IS NULL",
        )
        .bind(successor.token_hash)
        .bind(token_hash)
        .execute(&mut *tx)
        .await?;
        if linked.rows_affected() == 0 {
            return Ok(false);
        }

        tx.commit().await?;
        Ok(true)
    }

    /// Revoke a single record if it is not revoked yet.
    pub async fn revoke(&self, token_hash: &str, now: i64) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE refresh_tokens SET revoked = ? WHERE token_hash = ? AND revoked IS NULL")
                .bind(now)
                .bind(token_hash)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Revoke one of a user's records by its row id.
    pub async fn revoke_by_id(&self, id: i64, user_id: i64, now: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked = ? WHERE id = ? AND user_id = ? AND revoked IS NULL",
        )
        .bind(now)
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Revoke every active record owned by a user.
    pub async fn revoke_all_for_user(&self, user_id: i64, now: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked = ? WHERE user_id = ? AND revoked IS NULL AND expires_at > ?",
        )
        .bind(now)
        .bind(user_id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// List a user's active records, newest first.
    pub async fn list_active_by_user(
        &self,
        user_id: i64,
        now: i64,
    ) -> Result<Vec<RefreshTokenRecord>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, token_hash, user_id, created_at, expires_at, revoked, replaced_by_hash, ip, user_agent FROM refresh_tokens WHERE user_id = ? AND revoked IS NULL AND expires_at > ? ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await
    }

    /// Follow `replaced_by_hash` links starting at `token_hash`.
    /// Stops at the end of the chain or at the first revisited hash.
    pub async fn rotation_chain(
        &self,
        token_hash: &str,
    ) -> Result<Vec<RefreshTokenRecord>, sqlx::Error> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(token_hash.to_string());

        while let Some(hash) = next.take() {
            if !seen.insert(hash.clone()) {
                break;
            }
            let Some(record) = self.find_by_hash(&hash).await? else {
                break;
            };
            next = record.replaced_by_hash.clone();
            chain.push(record);
        }

        Ok(chain)
    }

    /// Delete all expired records.
    pub async fn delete_expired(&self, now: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, NewUser, is_unique_violation};

    const NOW: i64 = 1_700_000_000;

    async fn setup() -> (Database, i64) {
        let db = Database::open(":memory:").await.unwrap();
        let user_id = db
            .users()
            .create(&NewUser::new("uuid-1", "alice@example.com"))
            .await
            .unwrap();
        (db, user_id)
    }

    fn record(hash: &str, user_id: i64, expires_at: i64) -> NewRefreshToken<'_> {
        NewRefreshToken {
            token_hash: hash,
            user_id,
            created_at: NOW,
            expires_at,
            ip: Some("127.0.0.1"),
            user_agent: "test-agent",
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let (db, user_id) = setup().await;
        let store = db.refresh_tokens();

        store.insert(&record("hash-a", user_id, NOW + 60)).await.unwrap();

        let found = store.find_by_hash("hash-a").await.unwrap().unwrap();
        assert_eq!(found.user_id, user_id);
        assert_eq!(found.ip.as_deref(), Some("127.0.0.1"));
        assert_eq!(found.user_agent.as_deref(), Some("test-agent"));
        assert!(found.is_active(NOW));
        assert!(!found.is_rotated());

        assert!(store.find_by_hash("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_hash_rejected_by_store() {
        let (db, user_id) = setup().await;
        let store = db.refresh_tokens();

        store.insert(&record("hash-a", user_id, NOW + 60)).await.unwrap();
        let err = store
            .insert(&record("hash-a", user_id, NOW + 60))
            .await
            .unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[tokio::test]
    async fn test_expired_record_never_active() {
        let (db, user_id) = setup().await;
        let store = db.refresh_tokens();

        store.insert(&record("hash-old", user_id, NOW - 1)).await.unwrap();
        let found = store.find_by_hash("hash-old").await.unwrap().unwrap();

        assert!(found.revoked.is_none());
        assert!(found.is_expired(NOW));
        assert!(!found.is_active(NOW));
        // Expiry boundary is exclusive
        assert!(!found.is_active(NOW - 1));

        assert!(
            !store
                .rotate("hash-old", NOW, &record("hash-new", user_id, NOW + 60))
                .await
                .unwrap()
        );
        assert!(store.find_by_hash("hash-new").await.unwrap().is_none());
        assert!(store.list_active_by_user(user_id, NOW).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let (db, user_id) = setup().await;
        let store = db.refresh_tokens();
        store.insert(&record("hash-a", user_id, NOW + 60)).await.unwrap();

        assert!(store.revoke("hash-a", NOW).await.unwrap());
        assert!(!store.revoke("hash-a", NOW + 10).await.unwrap());

        let found = store.find_by_hash("hash-a").await.unwrap().unwrap();
        assert_eq!(found.revoked, Some(NOW));
    }

    #[tokio::test]
    async fn test_rotate_succeeds_once() {
        let (db, user_id) = setup().await;
        let store = db.refresh_tokens();
        store.insert(&record("hash-a", user_id, NOW + 60)).await.unwrap();

        assert!(
            store
                .rotate("hash-a", NOW, &record("hash-b", user_id, NOW + 60))
                .await
                .unwrap()
        );
        assert!(
            !store
                .rotate("hash-a", NOW, &record("hash-c", user_id, NOW + 60))
                .await
                .unwrap()
        );

        let old = store.find_by_hash("hash-a").await.unwrap().unwrap();
        assert_eq!(old.revoked, Some(NOW));
        assert_eq!(old.replaced_by_hash.as_deref(), Some("hash-b"));
        assert!(store.find_by_hash("hash-b").await.unwrap().unwrap().is_active(NOW));
        assert!(store.find_by_hash("hash-c").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rotate_after_revoke_all_writes_nothing() {
        let (db, user_id) = setup().await;
        let store = db.refresh_tokens();
        store.insert(&record("hash-a", user_id, NOW + 60)).await.unwrap();

        assert_eq!(store.revoke_all_for_user(user_id, NOW).await.unwrap(), 1);
        assert!(
            !store
                .rotate("hash-a", NOW, &record("hash-b", user_id, NOW + 60))
                .await
                .unwrap()
        );

        assert!(store.find_by_hash("hash-b").await.unwrap().is_none());
        let old = store.find_by_hash("hash-a").await.unwrap().unwrap();
        assert!(old.replaced_by_hash.is_none());
        assert!(store.list_active_by_user(user_id, NOW).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_successor_insert_rolls_back_claim() {
        let (db, user_id) = setup().await;
        let store = db.refresh_tokens();
        store.insert(&record("hash-a", user_id, NOW + 60)).await.unwrap();
        store.insert(&record("hash-taken", user_id, NOW + 60)).await.unwrap();

        let err = store
            .rotate("hash-a", NOW, &record("hash-taken", user_id, NOW + 60))
            .await
            .unwrap_err();
        assert!(is_unique_violation(&err));

        let old = store.find_by_hash("hash-a").await.unwrap().unwrap();
        assert!(old.is_active(NOW));
        assert!(old.replaced_by_hash.is_none());
    }

    #[tokio::test]
    async fn test_rotation_links_chain() {
        let (db, user_id) = setup().await;
        let store = db.refresh_tokens();
        store.insert(&record("hash-a", user_id, NOW + 60)).await.unwrap();

        for (from, to) in [("hash-a", "hash-b"), ("hash-b", "hash-c")] {
            assert!(
                store
                    .rotate(from, NOW, &record(to, user_id, NOW + 60))
                    .await
                    .unwrap()
            );
        }
        // A record can never succeed itself
        assert!(
            !store
                .rotate("hash-c", NOW, &record("hash-c", user_id, NOW + 60))
                .await
                .unwrap()
        );
        assert!(store.find_by_hash("hash-c").await.unwrap().unwrap().is_active(NOW));

        let chain = store.rotation_chain("hash-a").await.unwrap();
        let hashes: Vec<_> = chain.iter().map(|r| r.token_hash.as_str()).collect();
        assert_eq!(hashes, ["hash-a", "hash-b", "hash-c"]);
    }

    #[tokio::test]
    async fn test_revoke_all_only_touches_active_records_of_user() {
        let (db, user_id) = setup().await;
        let other_id = db
            .users()
            .create(&NewUser::new("uuid-2", "bob@example.com"))
            .await
            .unwrap();
        let store = db.refresh_tokens();

        store.insert(&record("a1", user_id, NOW + 60)).await.unwrap();
        store.insert(&record("a2", user_id, NOW + 60)).await.unwrap();
        store.insert(&record("a3", user_id, NOW + 60)).await.unwrap();
        store.insert(&record("a-expired", user_id, NOW - 60)).await.unwrap();
        store.insert(&record("b1", other_id, NOW + 60)).await.unwrap();
        store.revoke("a3", NOW).await.unwrap();

        assert_eq!(store.revoke_all_for_user(user_id, NOW).await.unwrap(), 2);
        assert_eq!(store.revoke_all_for_user(user_id, NOW).await.unwrap(), 0);

        let bob = store.find_by_hash("b1").await.unwrap().unwrap();
        assert!(bob.is_active(NOW));
    }

    #[tokio::test]
    async fn test_revoke_by_id_requires_owner() {
        let (db, user_id) = setup().await;
        let store = db.refresh_tokens();
        let id = store.insert(&record("a1", user_id, NOW + 60)).await.unwrap();

        assert!(!store.revoke_by_id(id, user_id + 1, NOW).await.unwrap());
        assert!(store.revoke_by_id(id, user_id, NOW).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_expired() {
        let (db, user_id) = setup().await;
        let store = db.refresh_tokens();
        store.insert(&record("live", user_id, NOW + 60)).await.unwrap();
        store.insert(&record("dead", user_id, NOW - 60)).await.unwrap();

        assert_eq!(store.delete_expired(NOW).await.unwrap(), 1);
        assert!(store.find_by_hash("dead").await.unwrap().is_none());
        assert!(store.find_by_hash("live").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_records_cascade_with_user() {
        let (db, user_id) = setup().await;
        db.refresh_tokens()
            .insert(&record("a1", user_id, NOW + 60))
            .await
            .unwrap();

        db.users().delete(user_id).await.unwrap();
        assert!(db.refresh_tokens().find_by_hash("a1").await.unwrap().is_none());
    }
}
