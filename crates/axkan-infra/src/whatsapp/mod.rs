//! WhatsApp Cloud API adapters: the outbound client and inbound webhook
//! signature verification.

pub mod client;
pub mod signature;

pub use client::WhatsAppClient;
