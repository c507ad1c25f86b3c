//! Shared domain types for Axkan.
//!
//! Conversations, messages, inbound webhook envelopes, catalog entries,
//! order intents, LLM request shapes, configuration, and their error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror, secrecy.

pub mod catalog;
pub mod config;
pub mod conversation;
pub mod error;
pub mod inbound;
pub mod llm;
pub mod order;
pub mod webhook;
