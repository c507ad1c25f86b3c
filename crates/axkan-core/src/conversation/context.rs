//! Model context construction.
//!
//! Stored messages become two-party turns (inbound is the user, outbound is
//! the assistant), the new inbound turn is appended, and the sequence is
//! sanitized for the model API's strict alternation contract. Everything here
//! is pure: the same history always yields the same context.

use axkan_types::conversation::{Direction, Message, MessageKind};
use axkan_types::llm::{ChatTurn, ContentBlock, MessageRole};

use crate::media::fetcher::{ProcessedInbound, UNTRANSCRIBED_AUDIO};

/// Bracketed tag standing in for media the model cannot see.
pub fn media_tag(kind: MessageKind) -> Option<&'static str> {
    match kind {
        MessageKind::Text => None,
        MessageKind::Image => Some("[Imagen]"),
        MessageKind::Audio => Some("[Nota de voz]"),
        MessageKind::Document => Some("[Documento]"),
        MessageKind::Video => Some("[Video]"),
        MessageKind::Sticker => Some("[Sticker]"),
    }
}

/// Text shown to the model for a stored message of `kind`.
///
/// Audio shows its transcript; other media show their tag followed by the
/// caption, if any.
pub fn render_text(kind: MessageKind, content: &str) -> String {
    let content = content.trim();
    match kind {
        MessageKind::Text => content.to_string(),
        MessageKind::Audio if !content.is_empty() => content.to_string(),
        MessageKind::Audio => UNTRANSCRIBED_AUDIO.to_string(),
        MessageKind::Image | MessageKind::Document | MessageKind::Video | MessageKind::Sticker => {
            let tag = media_tag(kind).unwrap_or_default();
            if content.is_empty() {
                tag.to_string()
            } else {
                format!("{tag} {content}")
            }
        }
    }
}

/// Map a stored message to a model turn.
pub fn history_turn(message: &Message) -> ChatTurn {
    let role = match message.direction {
        Direction::Inbound => MessageRole::User,
        Direction::Outbound => MessageRole::Assistant,
    };
    ChatTurn::text(role, render_text(message.kind, &message.content))
}

/// The user turn for a freshly processed inbound message, with the image
/// attached inline when one was re-hosted.
pub fn inbound_turn(inbound: &ProcessedInbound) -> ChatTurn {
    let turn = ChatTurn::user(render_text(inbound.kind, &inbound.content));
    match inbound.model_image_url() {
        Some(url) => turn.with_image(url),
        None => turn,
    }
}

/// Build the sanitized context: `history` (oldest first) followed by `new_turn`.
pub fn build_context(history: &[Message], new_turn: ChatTurn) -> Vec<ChatTurn> {
    let turns = history
        .iter()
        .map(history_turn)
        .chain(std::iter::once(new_turn))
        .collect();
    sanitize(turns)
}

/// Enforce strict user/assistant alternation.
///
/// Blank turns are dropped, consecutive turns of the same role are merged
/// (texts joined by a newline), and assistant turns at either end are
/// trimmed so the result starts and ends on a user turn.
pub fn sanitize(turns: Vec<ChatTurn>) -> Vec<ChatTurn> {
    let mut out: Vec<ChatTurn> = Vec::with_capacity(turns.len());

    for turn in turns {
        if turn.is_blank() {
            continue;
        }
        match out.last_mut() {
            Some(last) if last.role == turn.role => merge(last, turn),
            _ => out.push(turn),
        }
    }

    while out.first().is_some_and(|t| t.role == MessageRole::Assistant) {
        out.remove(0);
    }
    while out.last().is_some_and(|t| t.role == MessageRole::Assistant) {
        out.pop();
    }

    out
}

fn merge(into: &mut ChatTurn, next: ChatTurn) {
    let texts: Vec<String> = [into.joined_text(), next.joined_text()]
        .into_iter()
        .filter(|t| !t.trim().is_empty())
        .collect();

    let images = into
        .content
        .drain(..)
        .chain(next.content)
        .filter(|b| matches!(b, ContentBlock::ImageUrl { .. }));

    let mut content = Vec::new();
    if !texts.is_empty() {
        content.push(ContentBlock::Text {
            text: texts.join("\n"),
        });
    }
    content.extend(images.collect::<Vec<_>>());
    into.content = content;
}
