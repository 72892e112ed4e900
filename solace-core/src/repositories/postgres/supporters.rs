// src/repositories/postgres/supporters.rs

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use solace_common::models::supporter::{SupporterProfile, SupporterStatus};
use solace_common::traits::repository_traits::SupporterRepository;
use crate::Error;

/// Read-mostly access to `peer_supporters`; only the availability column is written here.
pub struct PostgresSupporterRepository {
    pool: PgPool,
}

impl PostgresSupporterRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SupporterRepository for PostgresSupporterRepository {
    async fn get_profile(&self, supporter_id: i64) -> Result<Option<SupporterProfile>, Error> {
        let row = sqlx::query(
            r#"
            SELECT ps.user_id,
                   COALESCE(ps.display_name, u.name) AS display_name,
                   ps.is_verified,
                   ps.availability_status
            FROM peer_supporters ps
            JOIN users u ON u.id = ps.user_id
            WHERE ps.user_id = $1
            "#,
        )
            .bind(supporter_id)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(r) = row {
            let status: String = r.try_get("availability_status")?;
            Ok(Some(SupporterProfile {
                supporter_id: r.try_get("user_id")?,
                display_name: r.try_get("display_name")?,
                is_verified: r.try_get("is_verified")?,
                status: status.parse::<SupporterStatus>()?,
            }))
        } else {
            Ok(None)
        }
    }

    async fn set_status(&self, supporter_id: i64, status: SupporterStatus) -> Result<bool, Error> {
        let result = sqlx::query(
            r#"
            UPDATE peer_supporters
            SET availability_status = $2,
                updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
            .bind(supporter_id)
            .bind(status.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
