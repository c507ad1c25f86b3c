//! The messaging channel: the WhatsApp Cloud API port, the credential
//! health monitor, and the decorator that puts one in front of the other.

pub mod api;
pub mod health;
pub mod monitored;
