//! HTTP layer for Axkan.
//!
//! Axum router with the WhatsApp webhook (`/webhook`), liveness (`/health`),
//! and the operator API under `/api/v1/` with API key authentication and the
//! envelope response format.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod response;
pub mod router;
