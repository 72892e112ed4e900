// src/repositories/postgres/chat_sessions.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::debug;
use solace_common::models::chat::{
    ActiveChatSummary, ChatSession, ChatSessionStatus, EnsureActiveChatSession, EnsureOutcome,
};
use solace_common::models::session::SessionType;
use solace_common::traits::repository_traits::ChatSessionRepository;
use crate::Error;

/// Postgres `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

const CHAT_COLUMNS: &str = r#"
    id, user_id, supporter_id, session_type, status,
    start_time, end_time, title, scheduled_session_id
"#;

pub struct PostgresChatSessionRepository {
    pool: PgPool,
}

impl PostgresChatSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_active_pair(&self, user_id: i64, supporter_id: i64) -> Result<Option<ChatSession>, Error> {
        let sql = format!(
            "SELECT {CHAT_COLUMNS} FROM chat_sessions
             WHERE user_id = $1 AND supporter_id = $2 AND status = 'active'"
        );
        let row = sqlx::query(&sql)
            .bind(user_id)
            .bind(supporter_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_chat_session).transpose()
    }

    /// Select-then-write inside one transaction. The latest row for the pair is locked
    /// so concurrent reactivations serialize; concurrent first inserts are caught by the
    /// partial unique index and reported as a unique violation.
    async fn ensure_active_tx(&self, req: &EnsureActiveChatSession) -> Result<EnsureOutcome, Error> {
        let mut tx = self.pool.begin().await?;

        let select = format!(
            "SELECT {CHAT_COLUMNS} FROM chat_sessions
             WHERE user_id = $1 AND supporter_id = $2
             ORDER BY (status = 'active') DESC, id DESC
             LIMIT 1
             FOR UPDATE"
        );
        let existing = sqlx::query(&select)
            .bind(req.user_id)
            .bind(req.supporter_id)
            .fetch_optional(&mut *tx)
            .await?;
        let existing = existing.as_ref().map(row_to_chat_session).transpose()?;

        let outcome = match existing {
            Some(current) if current.status == ChatSessionStatus::Active => {
                let needs_link = req.scheduled_session_id.is_some()
                    && current.scheduled_session_id != req.scheduled_session_id;
                if needs_link {
                    let sql = format!(
                        "UPDATE chat_sessions SET scheduled_session_id = $2
                         WHERE id = $1 RETURNING {CHAT_COLUMNS}"
                    );
                    let row = sqlx::query(&sql)
                        .bind(current.session_id)
                        .bind(req.scheduled_session_id)
                        .fetch_one(&mut *tx)
                        .await?;
                    EnsureOutcome::AlreadyActive(row_to_chat_session(&row)?)
                } else {
                    EnsureOutcome::AlreadyActive(current)
                }
            }
            Some(previous) => {
                let sql = format!(
                    "UPDATE chat_sessions
                     SET status = 'active',
                         start_time = NOW(),
                         end_time = NULL,
                         session_type = $2,
                         title = COALESCE($3, title),
                         scheduled_session_id = COALESCE($4, scheduled_session_id)
                     WHERE id = $1
                     RETURNING {CHAT_COLUMNS}"
                );
                let row = sqlx::query(&sql)
                    .bind(previous.session_id)
                    .bind(req.session_type.to_string())
                    .bind(&req.title)
                    .bind(req.scheduled_session_id)
                    .fetch_one(&mut *tx)
                    .await?;
                EnsureOutcome::Reactivated(row_to_chat_session(&row)?)
            }
            None => {
                let sql = format!(
                    "INSERT INTO chat_sessions
                        (user_id, supporter_id, session_type, status, start_time, title, scheduled_session_id)
                     VALUES ($1, $2, $3, 'active', NOW(), $4, $5)
                     RETURNING {CHAT_COLUMNS}"
                );
                let row = sqlx::query(&sql)
                    .bind(req.user_id)
                    .bind(req.supporter_id)
                    .bind(req.session_type.to_string())
                    .bind(&req.title)
                    .bind(req.scheduled_session_id)
                    .fetch_one(&mut *tx)
                    .await?;
                EnsureOutcome::Created(row_to_chat_session(&row)?)
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }
}

fn row_to_chat_session(r: &PgRow) -> Result<ChatSession, Error> {
    let session_type: String = r.try_get("session_type")?;
    let status: String = r.try_get("status")?;
    Ok(ChatSession {
        session_id: r.try_get("id")?,
        user_id: r.try_get("user_id")?,
        supporter_id: r.try_get("supporter_id")?,
        session_type: session_type.parse::<SessionType>()?,
        status: status.parse::<ChatSessionStatus>()?,
        start_time: r.try_get::<DateTime<Utc>, _>("start_time")?,
        end_time: r.try_get::<Option<DateTime<Utc>>, _>("end_time")?,
        title: r.try_get("title")?,
        scheduled_session_id: r.try_get("scheduled_session_id")?,
    })
}

fn is_unique_violation(err: &Error) -> bool {
    match err {
        Error::Database(e) => e
            .as_database_error()
            .and_then(|db| db.code())
            .map(|code| code == UNIQUE_VIOLATION)
            .unwrap_or(false),
        _ => false,
    }
}

#[async_trait]
impl ChatSessionRepository for PostgresChatSessionRepository {
    async fn ensure_active(&self, request: &EnsureActiveChatSession) -> Result<EnsureOutcome, Error> {
        match self.ensure_active_tx(request).await {
            Err(e) if is_unique_violation(&e) => {
                debug!(
                    "ensure_active lost an insert race for user={} supporter={}; re-reading",
                    request.user_id, request.supporter_id
                );
                match self.find_active_pair(request.user_id, request.supporter_id).await? {
                    Some(current) => Ok(EnsureOutcome::AlreadyActive(current)),
                    None => Err(e),
                }
            }
            other => other,
        }
    }

    async fn get(&self, session_id: i64) -> Result<Option<ChatSession>, Error> {
        let sql = format!("SELECT {CHAT_COLUMNS} FROM chat_sessions WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_chat_session).transpose()
    }

    async fn close(&self, session_id: i64, end_time: DateTime<Utc>) -> Result<bool, Error> {
        let result = sqlx::query(
            r#"
            UPDATE chat_sessions
            SET status = 'completed', end_time = $2
            WHERE id = $1 AND status = 'active'
            "#,
        )
            .bind(session_id)
            .bind(end_time)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn close_for_scheduled(
        &self,
        scheduled_session_id: i64,
        end_time: DateTime<Utc>,
    ) -> Result<u64, Error> {
        let result = sqlx::query(
            r#"
            UPDATE chat_sessions
            SET status = 'completed', end_time = $2
            WHERE scheduled_session_id = $1 AND status = 'active'
            "#,
        )
            .bind(scheduled_session_id)
            .bind(end_time)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn list_active_for_supporter(&self, supporter_id: i64) -> Result<Vec<ActiveChatSummary>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT cs.id,
                   cs.user_id,
                   u.name AS user_name,
                   cs.title,
                   cs.start_time,
                   lm.content AS last_message,
                   lm.created_at AS last_message_at,
                   (
                       SELECT COUNT(*)
                       FROM chat_messages m
                       WHERE m.session_id = cs.id
                         AND m.is_read = FALSE
                         AND m.sender_id <> cs.supporter_id
                   ) AS unread_count
            FROM chat_sessions cs
            LEFT JOIN users u ON u.id = cs.user_id
            LEFT JOIN LATERAL (
                SELECT content, created_at
                FROM chat_messages m
                WHERE m.session_id = cs.id
                ORDER BY m.created_at DESC, m.id DESC
                LIMIT 1
            ) lm ON TRUE
            WHERE cs.supporter_id = $1
              AND cs.status = 'active'
            ORDER BY COALESCE(lm.created_at, cs.start_time) DESC
            "#,
        )
            .bind(supporter_id)
            .fetch_all(&self.pool)
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            out.push(ActiveChatSummary {
                session_id: r.try_get("id")?,
                user_id: r.try_get("user_id")?,
                user_name: r.try_get("user_name")?,
                title: r.try_get("title")?,
                start_time: r.try_get::<DateTime<Utc>, _>("start_time")?,
                last_message: r.try_get("last_message")?,
                last_message_at: r.try_get::<Option<DateTime<Utc>>, _>("last_message_at")?,
                unread_count: r.try_get("unread_count")?,
            });
        }
        Ok(out)
    }
}
