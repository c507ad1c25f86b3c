//! HTTP request handlers.

pub mod conversation;
pub mod health;
pub mod webhook;
