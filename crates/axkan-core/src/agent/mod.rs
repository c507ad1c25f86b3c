//! The sales agent: prompt assembly, the model call, and reply parsing.

pub mod dispatcher;
pub mod intent;
pub mod parser;
pub mod prompt;
