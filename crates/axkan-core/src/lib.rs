//! Turn pipeline and collaborator trait definitions for Axkan.
//!
//! This crate defines the "ports" (repository and provider traits) that the
//! infrastructure layer implements, plus every stage of the inbound turn:
//! dedup and thread resolution, media handling, context building, the model
//! call, reply parsing, order execution, and outbound dispatch. It depends
//! only on `axkan-types`, never on `axkan-infra` or any IO crate.

pub mod agent;
pub mod catalog;
pub mod channel;
pub mod conversation;
pub mod llm;
pub mod media;
pub mod order;
pub mod outbound;
pub mod pipeline;
pub mod repository;

#[cfg(test)]
pub(crate) mod testing;
