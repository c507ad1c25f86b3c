//! Language model provider abstraction.

pub mod provider;
