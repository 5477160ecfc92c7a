use async_trait::async_trait;
use sqlx::PgPool;
use tracing::error;

use crate::errors::AppError;
use crate::models::UserProfile;

/// Source of stored quit plans, used to personalise `launch` turns.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn find_by_user_id(&self, user_id: &str) -> Result<Option<UserProfile>, AppError>;
}

#[derive(Clone)]
pub struct ProfileRepository {
    pool: PgPool,
}

impl ProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileSource for ProfileRepository {
    async fn find_by_user_id(&self, user_id: &str) -> Result<Option<UserProfile>, AppError> {
        sqlx::query_as::<_, UserProfile>(
            "SELECT quit_date::timestamptz AS quit_date,
                    motivation,
                    substance_type,
                    daily_usage::int4 AS daily_usage,
                    COALESCE(triggers, '{}') AS triggers
             FROM profiles
             WHERE id::text = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to load profile for user {user_id}: {e}");
            AppError::db_query(format!("Failed to load profile for user {user_id}"), e)
        })
    }
}
