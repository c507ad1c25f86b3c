//! SQLite conversation repository implementation.
//!
//! Implements `ConversationRepository` from `axkan-core` using sqlx with split
//! read/write pools: raw queries, private Row structs, writes on the single
//! writer connection.

use axkan_core::repository::conversation::ConversationRepository;
use axkan_types::conversation::{
    Client, Conversation, ConversationSummary, Direction, Message, MessageKind, Sender,
};
use axkan_types::error::RepositoryError;
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, query_err};

/// SQLite-backed implementation of `ConversationRepository`.
pub struct SqliteConversationRepository {
    pool: DatabasePool,
}

impl SqliteConversationRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct ConversationRow {
    id: String,
    wa_id: String,
    client_id: Option<i64>,
    client_name: Option<String>,
    last_message_at: String,
    unread_count: i64,
    intent: Option<String>,
    ai_summary: Option<String>,
    insights_data: Option<String>,
    created_at: String,
    updated_at: String,
}

impl ConversationRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            wa_id: row.try_get("wa_id")?,
            client_id: row.try_get("client_id")?,
            client_name: row.try_get("client_name")?,
            last_message_at: row.try_get("last_message_at")?,
            unread_count: row.try_get("unread_count")?,
            intent: row.try_get("intent")?,
            ai_summary: row.try_get("ai_summary")?,
            insights_data: row.try_get("insights_data")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_conversation(self) -> Result<Conversation, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid conversation id: {e}")))?;
        // A corrupt insights blob is not worth failing a read over.
        let insights = self
            .insights_data
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok());

        Ok(Conversation {
            id,
            wa_id: self.wa_id,
            client_id: self.client_id,
            client_name: self.client_name,
            last_message_at: parse_datetime(&self.last_message_at)?,
            unread_count: self.unread_count.max(0) as u32,
            intent: self.intent,
            ai_summary: self.ai_summary,
            insights,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

struct MessageRow {
    id: String,
    conversation_id: String,
    wa_message_id: Option<String>,
    direction: String,
    sender: String,
    message_type: String,
    content: String,
    media_url: Option<String>,
    metadata: String,
    created_at: String,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            conversation_id: row.try_get("conversation_id")?,
            wa_message_id: row.try_get("wa_message_id")?,
            direction: row.try_get("direction")?,
            sender: row.try_get("sender")?,
            message_type: row.try_get("message_type")?,
            content: row.try_get("content")?,
            media_url: row.try_get("media_url")?,
            metadata: row.try_get("metadata")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_message(self) -> Result<Message, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid message id: {e}")))?;
        let conversation_id = Uuid::parse_str(&self.conversation_id)
            .map_err(|e| RepositoryError::Query(format!("invalid conversation_id: {e}")))?;
        let direction: Direction = self.direction.parse().map_err(RepositoryError::Query)?;
        let sender: Sender = self.sender.parse().map_err(RepositoryError::Query)?;
        let kind: MessageKind = self.message_type.parse().map_err(RepositoryError::Query)?;
        let metadata = serde_json::from_str(&self.metadata)
            .map_err(|e| RepositoryError::Query(format!("invalid message metadata: {e}")))?;

        Ok(Message {
            id,
            conversation_id,
            wa_message_id: self.wa_message_id,
            direction,
            sender,
            kind,
            content: self.content,
            media_url: self.media_url,
            metadata,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

fn messages_from_rows(rows: &[sqlx::sqlite::SqliteRow]) -> Result<Vec<Message>, RepositoryError> {
    let mut messages = Vec::with_capacity(rows.len());
    for row in rows {
        let msg_row = MessageRow::from_row(row).map_err(query_err)?;
        messages.push(msg_row.into_message()?);
    }
    Ok(messages)
}

// ---------------------------------------------------------------------------
// ConversationRepository implementation
// ---------------------------------------------------------------------------

impl ConversationRepository for SqliteConversationRepository {
    async fn upsert_conversation(
        &self,
        wa_id: &str,
        client_name: &str,
        at: DateTime<Utc>,
    ) -> Result<Conversation, RepositoryError> {
        let now = format_datetime(&at);
        let row = sqlx::query(
            r#"INSERT INTO conversations (id, wa_id, client_name, last_message_at, unread_count, created_at, updated_at)
               VALUES (?, ?, ?, ?, 0, ?, ?)
               ON CONFLICT(wa_id) DO UPDATE SET
                   client_name = excluded.client_name,
                   last_message_at = MAX(conversations.last_message_at, excluded.last_message_at),
                   updated_at = excluded.updated_at
               RETURNING *"#,
        )
        .bind(Uuid::now_v7().to_string())
        .bind(wa_id)
        .bind(client_name)
        .bind(&now)
        .bind(&now)
        .bind(&now)
        .fetch_one(&self.pool.writer)
        .await
        .map_err(query_err)?;

        ConversationRow::from_row(&row)
            .map_err(query_err)?
            .into_conversation()
    }

    async fn get_conversation(&self, id: &Uuid) -> Result<Option<Conversation>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM conversations WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        match row {
            Some(row) => Ok(Some(
                ConversationRow::from_row(&row)
                    .map_err(query_err)?
                    .into_conversation()?,
            )),
            None => Ok(None),
        }
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT c.*,
                   (SELECT m.content FROM messages m
                     WHERE m.conversation_id = c.id
                     ORDER BY m.created_at DESC, m.id DESC LIMIT 1) AS last_message,
                   (SELECT COUNT(*) FROM messages m WHERE m.conversation_id = c.id) AS message_count
               FROM conversations c
               ORDER BY c.last_message_at DESC"#,
        )
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in &rows {
            let conversation = ConversationRow::from_row(row)
                .map_err(query_err)?
                .into_conversation()?;
            let last_message: Option<String> = row.try_get("last_message").map_err(query_err)?;
            let message_count: i64 = row.try_get("message_count").map_err(query_err)?;
            summaries.push(ConversationSummary {
                conversation,
                last_message,
                message_count: message_count.max(0) as u32,
            });
        }

        Ok(summaries)
    }

    async fn link_client(&self, conversation_id: &Uuid, client_id: i64) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE conversations SET client_id = ?, updated_at = ? WHERE id = ? AND client_id IS NULL",
        )
        .bind(client_id)
        .bind(format_datetime(&Utc::now()))
        .bind(conversation_id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        Ok(result.rows_affected() == 1)
    }

    async fn touch(&self, conversation_id: &Uuid, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        let at = format_datetime(&at);
        sqlx::query(
            "UPDATE conversations SET last_message_at = MAX(last_message_at, ?), updated_at = ? WHERE id = ?",
        )
        .bind(&at)
        .bind(&at)
        .bind(conversation_id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        Ok(())
    }

    async fn increment_unread(&self, conversation_id: &Uuid) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE conversations SET unread_count = unread_count + 1 WHERE id = ?")
            .bind(conversation_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;

        Ok(())
    }

    async fn mark_read(&self, conversation_id: &Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE conversations SET unread_count = 0 WHERE id = ?")
            .bind(conversation_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_err)?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_insight(
        &self,
        conversation_id: &Uuid,
        intent: &str,
        summary: Option<&str>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE conversations SET intent = ?, ai_summary = COALESCE(?, ai_summary), updated_at = ? WHERE id = ?",
        )
        .bind(intent)
        .bind(summary)
        .bind(format_datetime(&Utc::now()))
        .bind(conversation_id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        Ok(())
    }

    async fn message_exists(&self, wa_message_id: &str) -> Result<bool, RepositoryError> {
        let row = sqlx::query("SELECT 1 FROM messages WHERE wa_message_id = ? LIMIT 1")
            .bind(wa_message_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_err)?;

        Ok(row.is_some())
    }

    async fn insert_message(&self, message: &Message) -> Result<bool, RepositoryError> {
        let metadata = serde_json::to_string(&message.metadata)
            .map_err(|e| RepositoryError::Query(format!("unserializable metadata: {e}")))?;

        let result = sqlx::query(
            r#"INSERT INTO messages (id, conversation_id, wa_message_id, direction, sender, message_type, content, media_url, metadata, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(wa_message_id) DO NOTHING"#,
        )
        .bind(message.id.to_string())
        .bind(message.conversation_id.to_string())
        .bind(&message.wa_message_id)
        .bind(message.direction.to_string())
        .bind(message.sender.to_string())
        .bind(message.kind.to_string())
        .bind(&message.content)
        .bind(&message.media_url)
        .bind(metadata)
        .bind(format_datetime(&message.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(query_err)?;

        Ok(result.rows_affected() == 1)
    }

    async fn recent_messages(
        &self,
        conversation_id: &Uuid,
        limit: u32,
    ) -> Result<Vec<Message>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM messages WHERE conversation_id = ? ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(conversation_id.to_string())
        .bind(i64::from(limit))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        let mut messages = messages_from_rows(&rows)?;
        messages.reverse();
        Ok(messages)
    }

    async fn list_messages(&self, conversation_id: &Uuid) -> Result<Vec<Message>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM messages WHERE conversation_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(conversation_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        messages_from_rows(&rows)
    }

    async fn find_client_by_phone_suffix(&self, digits: &str) -> Result<Option<Client>, RepositoryError> {
        if digits.is_empty() {
            return Ok(None);
        }
        // Compare trailing digits with common phone formatting removed.
        let row = sqlx::query(
            r#"SELECT id, name, phone FROM clients
               WHERE REPLACE(REPLACE(REPLACE(REPLACE(REPLACE(REPLACE(phone, ' ', ''), '-', ''), '(', ''), ')', ''), '+', ''), '.', '')
                     LIKE '%' || ?
               ORDER BY id ASC LIMIT 1"#,
        )
        .bind(digits)
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(query_err)?;

        match row {
            Some(row) => Ok(Some(Client {
                id: row.try_get("id").map_err(query_err)?,
                name: row.try_get("name").map_err(query_err)?,
                phone: row.try_get("phone").map_err(query_err)?,
            })),
            None => Ok(None),
        }
    }
}
