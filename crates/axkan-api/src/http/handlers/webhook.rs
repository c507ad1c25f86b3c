//! WhatsApp Cloud API webhook.
//!
//! - GET  /webhook - Verification handshake: echoes `hub.challenge` when
//!   `hub.verify_token` matches the configured token.
//! - POST /webhook - Delivery: acknowledged with 200 as soon as the body is
//!   read. Valid deliveries are handed to the turn worker; the response never
//!   waits on them and never reflects their outcome.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use serde::Deserialize;
use secrecy::ExposeSecret;
use tracing::{debug, warn};

use axkan_infra::whatsapp::signature::verify_signature;
use axkan_types::webhook::WebhookPayload;

use crate::http::error::AppError;
use crate::http::extractors::auth::{digests_match, hash_api_key};
use crate::state::AppState;

/// Query parameters of the verification handshake.
#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// GET /webhook - Subscription verification.
pub async fn verify(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> Result<String, AppError> {
    let Some(expected) = state.verify_token() else {
        warn!("webhook verification attempted but WHATSAPP_VERIFY_TOKEN is not set");
        return Err(AppError::Forbidden("Verification failed".to_string()));
    };

    let token_ok = query.verify_token.as_deref().is_some_and(|token| {
        digests_match(&hash_api_key(token), &hash_api_key(expected.expose_secret()))
    });

    match (query.mode.as_deref(), token_ok, query.challenge) {
        (Some("subscribe"), true, Some(challenge)) => {
            tracing::info!("webhook verified");
            Ok(challenge)
        }
        _ => {
            warn!(mode = ?query.mode, "webhook verification rejected");
            Err(AppError::Forbidden("Verification failed".to_string()))
        }
    }
}

/// POST /webhook - Receive a delivery.
pub async fn receive(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> StatusCode {
    if let Some(secret) = state.app_secret() {
        let header = headers
            .get("x-hub-signature-256")
            .and_then(|v| v.to_str().ok());
        if let Err(e) = verify_signature(secret.expose_secret().as_bytes(), &body, header) {
            warn!(error = %e, "dropping webhook delivery with bad signature");
            return StatusCode::OK;
        }
    }

    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "dropping unparseable webhook delivery");
            return StatusCode::OK;
        }
    };

    let envelopes = payload.into_envelopes();
    if envelopes.is_empty() {
        debug!("webhook delivery carried no messages");
        return StatusCode::OK;
    }

    debug!(count = envelopes.len(), "webhook delivery accepted");
    state.worker.submit(envelopes);
    StatusCode::OK
}
