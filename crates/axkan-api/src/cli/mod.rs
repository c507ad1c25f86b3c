//! CLI command definitions and dispatch for the `axkan` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod conversation;
pub mod status;

use clap::{Parser, Subcommand};
use uuid::Uuid;

/// WhatsApp sales assistant for AXKAN.
#[derive(Parser)]
#[command(name = "axkan", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the webhook and operator API server.
    Serve {
        /// Port to listen on (defaults to `[http] port`).
        #[arg(short, long, env = "PORT")]
        port: Option<u16>,

        /// Host to bind to (defaults to `[http] host`).
        #[arg(long)]
        host: Option<String>,
    },

    /// List conversations, latest activity first.
    #[command(alias = "ls")]
    Conversations,

    /// Show the messages of a conversation.
    Messages {
        /// Conversation id.
        id: Uuid,
    },

    /// Check the configured provider credentials.
    #[command(name = "token-status")]
    TokenStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_serve_with_overrides() {
        let cli = Cli::try_parse_from(["axkan", "-vv", "serve", "--port", "8080"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(
            cli.command,
            Commands::Serve { port: Some(8080), host: None }
        ));
    }

    #[test]
    fn test_parse_messages_requires_uuid() {
        assert!(Cli::try_parse_from(["axkan", "messages", "not-a-uuid"]).is_err());
        let cli = Cli::try_parse_from([
            "axkan",
            "messages",
            "0190f5a2-7b1c-7d3e-8f00-123456789abc",
            "--json",
        ])
        .unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::Messages { .. }));
    }
}
