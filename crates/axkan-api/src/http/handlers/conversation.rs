//! Operator conversation handlers.
//!
//! Endpoints:
//! - GET  /api/v1/conversations               - List conversations, latest activity first
//! - GET  /api/v1/conversations/{id}/messages - Messages of a conversation, oldest first
//! - POST /api/v1/conversations/{id}/reply    - Send a manual reply (text and/or image)
//! - PUT  /api/v1/conversations/{id}/read     - Reset the unread counter

use std::time::Instant;

use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use axkan_core::outbound::{OutboundDispatcher, OutboundImage, OutboundReply};
use axkan_core::pipeline::TurnPorts;
use axkan_core::repository::conversation::ConversationRepository;
use axkan_types::conversation::{Conversation, ConversationSummary, Message, Sender};

use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// Body of a manual reply.
#[derive(Debug, Deserialize)]
pub struct ReplyRequest {
    pub message: Option<String>,
    pub image_url: Option<String>,
    pub caption: Option<String>,
}

impl ReplyRequest {
    fn into_outbound(self) -> Result<OutboundReply, AppError> {
        let text = self.message.filter(|m| !m.trim().is_empty());
        let image_url = self.image_url.filter(|u| !u.trim().is_empty());
        if text.is_none() && image_url.is_none() {
            return Err(AppError::Validation(
                "Provide at least one of 'message' or 'image_url'".to_string(),
            ));
        }

        Ok(OutboundReply {
            text,
            images: image_url
                .map(|url| OutboundImage {
                    url,
                    caption: self.caption.filter(|c| !c.is_empty()),
                })
                .into_iter()
                .collect(),
            metadata: json!({ "source": "operator" }),
        })
    }
}

/// Parse a UUID from a path parameter, returning a 400 error on invalid format.
fn parse_uuid(s: &str) -> Result<Uuid, AppError> {
    s.parse::<Uuid>()
        .map_err(|_| AppError::Validation(format!("Invalid conversation id: {s}")))
}

async fn find_conversation(state: &AppState, id: &Uuid) -> Result<Conversation, AppError> {
    state
        .ports()
        .repo()
        .get_conversation(id)
        .await?
        .ok_or(AppError::ConversationNotFound)
}

/// GET /api/v1/conversations - List conversations.
pub async fn list_conversations(
    State(state): State<AppState>,
    _auth: Authenticated,
) -> Result<Json<ApiResponse<Vec<ConversationSummary>>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let conversations = state.ports().repo().list_conversations().await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(
        ApiResponse::success(conversations, request_id, elapsed)
            .with_link("self", "/api/v1/conversations"),
    ))
}

/// GET /api/v1/conversations/{id}/messages - Messages of a conversation.
pub async fn list_messages(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Vec<Message>>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let id = parse_uuid(&id)?;
    let conversation = find_conversation(&state, &id).await?;
    let messages = state.ports().repo().list_messages(&conversation.id).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(
        ApiResponse::success(messages, request_id, elapsed)
            .with_link("self", &format!("/api/v1/conversations/{id}/messages"))
            .with_link("reply", &format!("/api/v1/conversations/{id}/reply")),
    ))
}

/// POST /api/v1/conversations/{id}/reply - Send a manual reply.
///
/// Sends through the same monitored client as AI replies. Every attempted
/// send is stored as an `admin` message, delivered or not.
pub async fn reply(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<String>,
    Json(body): Json<ReplyRequest>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let id = parse_uuid(&id)?;
    let outbound = body.into_outbound()?;
    let conversation = find_conversation(&state, &id).await?;

    let ports = state.ports();
    let report = OutboundDispatcher::new(ports.api(), ports.repo())
        .deliver(&conversation, Sender::Admin, &outbound)
        .await;

    tracing::info!(
        conversation_id = %conversation.id,
        text_delivered = report.text_delivered,
        images_delivered = report.images_delivered,
        images_failed = report.images_failed,
        "operator reply sent"
    );

    let wanted_text = outbound.text.is_some();
    let delivered = (!wanted_text || report.text_delivered) && report.images_failed == 0;
    let data = json!({
        "delivered": delivered,
        "text_delivered": report.text_delivered,
        "images_delivered": report.images_delivered,
        "images_failed": report.images_failed,
        "messages": report.stored,
    });

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(
        ApiResponse::success(data, request_id, elapsed)
            .with_link("messages", &format!("/api/v1/conversations/{id}/messages")),
    ))
}

/// PUT /api/v1/conversations/{id}/read - Reset the unread counter.
pub async fn mark_read(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let id = parse_uuid(&id)?;
    if !state.ports().repo().mark_read(&id).await? {
        return Err(AppError::ConversationNotFound);
    }

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(
        json!({ "id": id, "unread_count": 0 }),
        request_id,
        elapsed,
    )))
}
