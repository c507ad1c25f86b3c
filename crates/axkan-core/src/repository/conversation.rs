//! Conversation repository trait definition.
//!
//! Covers conversations, their messages, and the read-only client lookup
//! used to link a conversation to a known client.

use axkan_types::conversation::{Client, Conversation, ConversationSummary, Message};
use axkan_types::error::RepositoryError;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Repository trait for conversation and message persistence.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait ConversationRepository: Send + Sync {
    // -----------------------------------------------------------------------
    // Conversations
    // -----------------------------------------------------------------------

    /// Insert the conversation for `wa_id` if absent, otherwise refresh its
    /// display name and move `last_message_at` forward (never backward).
    ///
    /// Must be a single atomic statement: concurrent deliveries for the
    /// same thread race here.
    fn upsert_conversation(
        &self,
        wa_id: &str,
        client_name: &str,
        at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Conversation, RepositoryError>> + Send;

    /// Get a conversation by id.
    fn get_conversation(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Conversation>, RepositoryError>> + Send;

    /// All conversations, most recent activity first, with a preview of the
    /// last message and the message count.
    fn list_conversations(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<ConversationSummary>, RepositoryError>> + Send;

    /// Link a client to the conversation. Only takes effect while the
    /// conversation has no client; an existing link is never replaced.
    /// Returns `true` if the link was written.
    fn link_client(
        &self,
        conversation_id: &Uuid,
        client_id: i64,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Move `last_message_at` forward to `at` (never backward).
    fn touch(
        &self,
        conversation_id: &Uuid,
        at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Add one to the unread counter.
    fn increment_unread(
        &self,
        conversation_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Reset the unread counter. Returns `false` if the conversation does not exist.
    fn mark_read(
        &self,
        conversation_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Cache the latest telemetry intent on the conversation, and the summary
    /// when one is given. A `None` summary keeps the previous one.
    fn update_insight(
        &self,
        conversation_id: &Uuid,
        intent: &str,
        summary: Option<&str>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    // -----------------------------------------------------------------------
    // Messages
    // -----------------------------------------------------------------------

    /// Whether a message with this provider id is already stored.
    fn message_exists(
        &self,
        wa_message_id: &str,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Insert a message. Returns `false` (and writes nothing) when another
    /// message already holds the same `wa_message_id`.
    fn insert_message(
        &self,
        message: &Message,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// The most recent `limit` messages of a conversation, oldest first.
    fn recent_messages(
        &self,
        conversation_id: &Uuid,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<Vec<Message>, RepositoryError>> + Send;

    /// Every message of a conversation, oldest first.
    fn list_messages(
        &self,
        conversation_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<Message>, RepositoryError>> + Send;

    // -----------------------------------------------------------------------
    // Clients (read only)
    // -----------------------------------------------------------------------

    /// First client (lowest id) whose phone contains `digits`.
    fn find_client_by_phone_suffix(
        &self,
        digits: &str,
    ) -> impl std::future::Future<Output = Result<Option<Client>, RepositoryError>> + Send;
}
