//! Conversation browsing commands: list conversations, show messages.

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use uuid::Uuid;

use axkan_core::pipeline::TurnPorts;
use axkan_core::repository::conversation::ConversationRepository;
use axkan_types::conversation::{Direction, Sender};

use crate::state::AppState;

/// Cut `s` to `max` characters, marking the cut with an ellipsis.
fn preview(s: &str, max: usize) -> String {
    let flat = s.replace('\n', " ");
    if flat.chars().count() > max {
        let cut: String = flat.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    } else {
        flat
    }
}

/// List conversations with unread count, intent, and last message preview.
///
/// # Examples
///
/// ```bash
/// axkan conversations
/// axkan conversations --json
/// ```
pub async fn list_conversations(state: &AppState, json: bool) -> Result<()> {
    let conversations = state.ports().repo().list_conversations().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&conversations)?);
        return Ok(());
    }

    if conversations.is_empty() {
        println!();
        println!(
            "  {} No conversations yet. They appear once the webhook receives a message.",
            style("i").blue().bold()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Id").fg(Color::White),
        Cell::new("Contact").fg(Color::White),
        Cell::new("Last activity").fg(Color::White),
        Cell::new("Unread").fg(Color::White),
        Cell::new("Intent").fg(Color::White),
        Cell::new("Last message").fg(Color::White),
    ]);

    for summary in &conversations {
        let c = &summary.conversation;
        let contact = match &c.client_name {
            Some(name) => format!("{name} ({})", c.wa_id),
            None => c.wa_id.clone(),
        };
        let unread = if c.unread_count > 0 {
            Cell::new(c.unread_count.to_string()).fg(Color::Yellow)
        } else {
            Cell::new("0").fg(Color::DarkGrey)
        };

        table.add_row(vec![
            Cell::new(c.id.to_string()).fg(Color::DarkGrey),
            Cell::new(contact).fg(Color::Cyan),
            Cell::new(c.last_message_at.format("%Y-%m-%d %H:%M").to_string()),
            unread,
            Cell::new(c.intent.as_deref().unwrap_or("-")),
            Cell::new(preview(summary.last_message.as_deref().unwrap_or(""), 50)),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} conversation{}",
        style(conversations.len()).bold(),
        if conversations.len() == 1 { "" } else { "s" }
    );
    println!();

    Ok(())
}

/// Print the messages of one conversation, oldest first.
///
/// # Examples
///
/// ```bash
/// axkan messages 0190f5a2-7b1c-7d3e-8f00-123456789abc
/// ```
pub async fn show_messages(state: &AppState, id: Uuid, json: bool) -> Result<()> {
    let repo = state.ports().repo();
    let conversation = repo
        .get_conversation(&id)
        .await?
        .with_context(|| format!("Conversation '{id}' not found"))?;
    let messages = repo.list_messages(&conversation.id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&messages)?);
        return Ok(());
    }

    println!();
    println!(
        "  Conversation with {}",
        style(conversation.client_name.as_deref().unwrap_or(&conversation.wa_id))
            .cyan()
            .bold()
    );
    if let Some(summary) = &conversation.ai_summary {
        println!("  {}", style(summary).dim());
    }
    println!();

    for message in &messages {
        let who = match (message.direction, message.sender) {
            (Direction::Inbound, _) => style("client".to_string()).cyan(),
            (Direction::Outbound, Sender::Admin) => style("admin".to_string()).magenta(),
            (Direction::Outbound, _) => style("bot".to_string()).green(),
        };
        let undelivered = message
            .metadata
            .get("delivered")
            .and_then(|v| v.as_bool())
            == Some(false);

        println!(
            "  {} {:>6} [{}] {}{}",
            style(message.created_at.format("%m-%d %H:%M")).dim(),
            who,
            message.kind,
            message.content,
            if undelivered {
                format!(" {}", style("(not delivered)").red())
            } else {
                String::new()
            }
        );
        if let Some(url) = &message.media_url {
            println!("  {:>19} {}", "", style(url).dim());
        }
    }

    println!();
    println!(
        "  {} message{}",
        style(messages.len()).bold(),
        if messages.len() == 1 { "" } else { "s" }
    );
    println!();

    Ok(())
}
