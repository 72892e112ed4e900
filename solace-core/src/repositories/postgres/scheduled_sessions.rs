// src/repositories/postgres/scheduled_sessions.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use solace_common::models::session::{NewScheduledSession, ScheduledSession, SessionStatus, SessionType};
use solace_common::traits::repository_traits::ScheduledSessionRepository;
use crate::Error;

pub struct PostgresScheduledSessionRepository {
    pool: PgPool,
}

impl PostgresScheduledSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Columns of `scheduled_sessions s` plus the supporter's display name.
const SESSION_COLUMNS: &str = r#"
    s.id,
    s.user_id,
    s.supporter_id,
    s.session_type,
    s.scheduled_time,
    s.duration_minutes,
    s.title,
    s.notes,
    s.status,
    s.end_time,
    s.created_at,
    COALESCE(ps.display_name, u.name) AS supporter_name
"#;

const SUPPORTER_JOIN: &str = r#"
    LEFT JOIN peer_supporters ps ON ps.user_id = s.supporter_id
    LEFT JOIN users u ON u.id = s.supporter_id
"#;

fn row_to_session(r: &PgRow) -> Result<ScheduledSession, Error> {
    let session_type: String = r.try_get("session_type")?;
    let status: String = r.try_get("status")?;
    Ok(ScheduledSession {
        session_id: r.try_get("id")?,
        user_id: r.try_get("user_id")?,
        supporter_id: r.try_get("supporter_id")?,
        session_type: session_type.parse::<SessionType>()?,
        scheduled_time: r.try_get::<DateTime<Utc>, _>("scheduled_time")?,
        duration_minutes: r.try_get("duration_minutes")?,
        title: r.try_get("title")?,
        notes: r.try_get("notes")?,
        status: status.parse::<SessionStatus>()?,
        end_time: r.try_get::<Option<DateTime<Utc>>, _>("end_time")?,
        created_at: r.try_get::<DateTime<Utc>, _>("created_at")?,
        supporter_name: r.try_get("supporter_name")?,
    })
}

#[async_trait]
impl ScheduledSessionRepository for PostgresScheduledSessionRepository {
    async fn create(&self, session: &NewScheduledSession) -> Result<ScheduledSession, Error> {
        let sql = format!(
            r#"
            WITH s AS (
                INSERT INTO scheduled_sessions (
                    user_id, supporter_id, session_type, scheduled_time,
                    duration_minutes, title, notes, status
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, 'scheduled')
                RETURNING *
            )
            SELECT {SESSION_COLUMNS}
            FROM s
            {SUPPORTER_JOIN}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(session.user_id)
            .bind(session.supporter_id)
            .bind(session.session_type.to_string())
            .bind(session.scheduled_time)
            .bind(session.duration_minutes)
            .bind(&session.title)
            .bind(&session.notes)
            .fetch_one(&self.pool)
            .await?;

        row_to_session(&row)
    }

    async fn get(&self, session_id: i64) -> Result<Option<ScheduledSession>, Error> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM scheduled_sessions s {SUPPORTER_JOIN} WHERE s.id = $1"
        );
        let row = sqlx::query(&sql)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_session).transpose()
    }

    async fn find_conflicts(
        &self,
        supporter_id: i64,
        scheduled_time: DateTime<Utc>,
        duration_minutes: i32,
    ) -> Result<Vec<i64>, Error> {
        // BETWEEN is inclusive: touching windows count as a conflict.
        let rows = sqlx::query(
            r#"
            SELECT id
            FROM scheduled_sessions
            WHERE supporter_id = $1
              AND status IN ('scheduled', 'active')
              AND scheduled_time BETWEEN $2 - make_interval(mins => $3)
                                     AND $2 + make_interval(mins => $3)
            ORDER BY scheduled_time
            "#,
        )
            .bind(supporter_id)
            .bind(scheduled_time)
            .bind(duration_minutes)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|r| r.try_get::<i64, _>("id").map_err(Error::from))
            .collect()
    }

    async fn update_status(
        &self,
        session_id: i64,
        status: SessionStatus,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<bool, Error> {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_sessions
            SET status = $2,
                end_time = COALESCE($3, end_time)
            WHERE id = $1
            "#,
        )
            .bind(session_id)
            .bind(status.to_string())
            .bind(end_time)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_for_supporter(&self, supporter_id: i64) -> Result<Vec<ScheduledSession>, Error> {
        let sql = format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM scheduled_sessions s
            {SUPPORTER_JOIN}
            WHERE s.supporter_id = $1
            ORDER BY s.scheduled_time ASC
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(supporter_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_session).collect()
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<ScheduledSession>, Error> {
        let sql = format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM scheduled_sessions s
            {SUPPORTER_JOIN}
            WHERE s.user_id = $1
            ORDER BY s.scheduled_time ASC
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_session).collect()
    }
}
