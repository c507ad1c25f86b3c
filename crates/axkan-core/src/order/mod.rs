//! Order execution for confirmed order directives.

pub mod executor;
