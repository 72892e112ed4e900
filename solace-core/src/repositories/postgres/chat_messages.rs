// src/repositories/postgres/chat_messages.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use solace_common::models::chat::{ChatMessage, MarkReadOutcome, NewChatMessage};
use solace_common::traits::repository_traits::ChatMessageRepository;
use crate::Error;

pub struct PostgresChatMessageRepository {
    pool: PgPool,
}

impl PostgresChatMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_message(r: &PgRow) -> Result<ChatMessage, Error> {
    Ok(ChatMessage {
        message_id: r.try_get("id")?,
        session_id: r.try_get("session_id")?,
        sender_id: r.try_get("sender_id")?,
        content: r.try_get("content")?,
        message_type: r.try_get("message_type")?,
        is_read: r.try_get("is_read")?,
        created_at: r.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

#[async_trait]
impl ChatMessageRepository for PostgresChatMessageRepository {
    async fn insert(&self, message: &NewChatMessage) -> Result<ChatMessage, Error> {
        let row = sqlx::query(
            r#"
            INSERT INTO chat_messages (session_id, sender_id, content, message_type, is_read, created_at)
            VALUES ($1, $2, $3, $4, FALSE, NOW())
            RETURNING id, session_id, sender_id, content, message_type, is_read, created_at
            "#,
        )
            .bind(message.session_id)
            .bind(message.sender_id)
            .bind(&message.content)
            .bind(&message.message_type)
            .fetch_one(&self.pool)
            .await?;

        row_to_message(&row)
    }

    async fn get(&self, message_id: i64) -> Result<Option<ChatMessage>, Error> {
        let row = sqlx::query(
            r#"
            SELECT id, session_id, sender_id, content, message_type, is_read, created_at
            FROM chat_messages
            WHERE id = $1
            "#,
        )
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_message).transpose()
    }

    async fn list_for_session(&self, session_id: i64) -> Result<Vec<ChatMessage>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, session_id, sender_id, content, message_type, is_read, created_at
            FROM chat_messages
            WHERE session_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
            .bind(session_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_message).collect()
    }

    async fn mark_read(&self, message_id: i64) -> Result<MarkReadOutcome, Error> {
        // The WHERE clause makes the flip single-shot even under concurrent readers.
        let flipped = sqlx::query(
            r#"
            UPDATE chat_messages
            SET is_read = TRUE
            WHERE id = $1 AND is_read = FALSE
            RETURNING id, session_id, sender_id
            "#,
        )
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(r) = flipped {
            return Ok(MarkReadOutcome::Transitioned {
                message_id: r.try_get("id")?,
                session_id: r.try_get("session_id")?,
                sender_id: r.try_get("sender_id")?,
            });
        }

        let existing = sqlx::query("SELECT sender_id FROM chat_messages WHERE id = $1")
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await?;

        match existing {
            Some(r) => Ok(MarkReadOutcome::AlreadyRead { sender_id: r.try_get("sender_id")? }),
            None => Ok(MarkReadOutcome::NotFound),
        }
    }
}
