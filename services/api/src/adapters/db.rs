//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `ProfileStore` port from the `core` crate. The remote store keeps one
//! row per user holding the aggregate as an opaque JSONB blob, plus the
//! idempotency ledger for payment credits.

use arcana_core::domain::UserProfile;
use arcana_core::ports::{PortError, PortResult, ProfileStore};
use arcana_core::reconcile;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A Postgres adapter that implements the `ProfileStore` port.
#[derive(Clone)]
pub struct PgProfileStore {
    pool: PgPool,
}

impl PgProfileStore {
    /// Creates a new `PgProfileStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

//=========================================================================================
// `ProfileStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn fetch(&self, user_id: Uuid) -> PortResult<Option<UserProfile>> {
        let blob: Option<serde_json::Value> =
            sqlx::query_scalar("SELECT data FROM profiles WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // The blob is loosely typed; parsing goes through the sanitizing path.
        Ok(blob.map(reconcile::profile_from_blob))
    }

    async fn upsert(&self, user_id: Uuid, profile: &UserProfile) -> PortResult<()> {
        let blob = serde_json::to_value(profile)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        sqlx::query(
            "INSERT INTO profiles (user_id, data, updated_at) VALUES ($1, $2, now()) \
             ON CONFLICT (user_id) DO UPDATE SET data = EXCLUDED.data, updated_at = now()",
        )
        .bind(user_id)
        .bind(blob)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn record_payment(
        &self,
        payment_id: &str,
        user_id: Uuid,
        coins: u32,
        provider: &str,
    ) -> PortResult<bool> {
        // The primary key on payment_id arbitrates replays: only the first
        // insert takes effect, so a given payment credits at most once.
        let result = sqlx::query(
            "INSERT INTO payment_credits (payment_id, user_id, coins, provider) \
             VALUES ($1, $2, $3, $4) ON CONFLICT (payment_id) DO NOTHING",
        )
        .bind(payment_id)
        .bind(user_id)
        .bind(coins as i64)
        .bind(provider)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }
}
