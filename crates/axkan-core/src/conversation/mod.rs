//! Conversation threads: resolving the thread for an inbound message and
//! building the bounded model context from its history.

pub mod context;
pub mod resolver;
