//! Credential status command.
//!
//! The running server keeps its breaker state in memory (see
//! `GET /api/v1/health/token`). This command instead checks the WhatsApp
//! token directly and reports which optional providers are configured.

use std::time::Duration;

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use serde::Serialize;

use axkan_infra::whatsapp::WhatsAppClient;
use axkan_types::error::ProviderError;

use crate::state::AppState;

#[derive(Debug, Serialize)]
struct CredentialRow {
    credential: &'static str,
    configured: bool,
    status: String,
}

fn row(credential: &'static str, configured: bool) -> CredentialRow {
    CredentialRow {
        credential,
        configured,
        status: if configured { "configured" } else { "missing" }.to_string(),
    }
}

fn check_status_label(result: &Result<(), ProviderError>) -> String {
    match result {
        Ok(()) => "healthy".to_string(),
        Err(ProviderError::Auth { status, .. }) => format!("broken (HTTP {status})"),
        Err(ProviderError::NotConfigured(_)) => "missing".to_string(),
        Err(e) => format!("unreachable ({e})"),
    }
}

/// Check the WhatsApp token and list the other credentials.
pub async fn token_status(state: &AppState, json: bool) -> Result<()> {
    let config = &state.config;
    let timeout = Duration::from_secs(config.pipeline.http_timeout_secs);

    let whatsapp = match WhatsAppClient::new(&config.whatsapp, timeout) {
        Ok(client) => client.check_token().await,
        Err(e) => Err(e),
    };

    let mut rows = vec![CredentialRow {
        credential: "whatsapp",
        configured: !matches!(whatsapp, Err(ProviderError::NotConfigured(_))),
        status: check_status_label(&whatsapp),
    }];
    rows.push(row("anthropic", config.llm.api_key.is_some()));
    rows.push(row("speech", config.speech.api_key.is_some()));
    rows.push(row(
        "storage",
        !config.storage.cloud_name.is_empty() && config.storage.api_secret.is_some(),
    ));
    rows.push(row("order_sink", config.order_sink.url.is_some()));
    rows.push(row("alerts", config.notify.admin_email.is_some() && config.notify.api_key.is_some()));
    rows.push(row("webhook_verify", config.whatsapp.verify_token.is_some()));
    rows.push(row("operator_api", state.admin_key_digest.is_some()));

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Credential").fg(Color::White),
        Cell::new("Status").fg(Color::White),
    ]);

    for r in &rows {
        let color = match r.status.as_str() {
            "healthy" | "configured" => Color::Green,
            "missing" => Color::DarkGrey,
            _ => Color::Red,
        };
        table.add_row(vec![
            Cell::new(r.credential).fg(Color::Cyan),
            Cell::new(&r.status).fg(color),
        ]);
    }

    println!();
    println!("  {} Axkan v{}", style("⚡").bold(), env!("CARGO_PKG_VERSION"));
    println!("  {}", style(state.data_dir.display()).dim());
    println!();
    println!("{table}");
    println!();

    Ok(())
}
