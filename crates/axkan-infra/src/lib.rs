//! Infrastructure layer for Axkan.
//!
//! Contains implementations of the port traits defined in `axkan-core`:
//! SQLite storage, the WhatsApp Cloud API client, the Anthropic Messages
//! provider, Cloudinary media storage, Google speech recognition, the
//! operator email notifier, the external order sink, and the config loader.

pub mod config;
pub mod http;
pub mod llm;
pub mod media;
pub mod notify;
pub mod optional;
pub mod sink;
pub mod sqlite;
pub mod whatsapp;
