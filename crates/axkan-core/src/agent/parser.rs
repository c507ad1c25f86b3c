//! Structured directives embedded in model replies.
//!
//! The model embeds an order as `[CREATE_ORDER]{json}[/CREATE_ORDER]` and
//! asks for product photos with `[SEND_IMAGE]product name[/SEND_IMAGE]`.
//! Every directive, and any stray marker, is stripped from the text the
//! client sees. A malformed image directive is logged and dropped. A
//! malformed order directive is flagged in [`ParsedReply::order_rejected`] so
//! the caller can ask the client to confirm again instead of sending the
//! model's confirmation for an order that was never created.

use axkan_types::error::DirectiveError;
use axkan_types::order::ParsedOrderIntent;
use tracing::warn;

use super::intent::{Intent, classify};

pub const ORDER_OPEN: &str = "[CREATE_ORDER]";
pub const ORDER_CLOSE: &str = "[/CREATE_ORDER]";
pub const IMAGE_OPEN: &str = "[SEND_IMAGE]";
pub const IMAGE_CLOSE: &str = "[/SEND_IMAGE]";

/// A model reply split into client-facing text and directives.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReply {
    /// Reply text with every directive removed.
    pub text: String,
    /// The first order directive, if it was well formed.
    pub order: Option<ParsedOrderIntent>,
    /// An order directive was present but could not be parsed.
    pub order_rejected: bool,
    /// Product names the model asked to send photos of, in order.
    pub image_requests: Vec<String>,
    pub intent: Intent,
}

/// Parse a raw model reply.
pub fn parse_reply(raw: &str) -> ParsedReply {
    let (text, order_bodies) = extract_blocks(raw, ORDER_OPEN, ORDER_CLOSE);
    let (text, image_bodies) = extract_blocks(&text, IMAGE_OPEN, IMAGE_CLOSE);

    if order_bodies.len() > 1 {
        warn!(count = order_bodies.len(), "reply carried several order directives, using the first");
    }
    let mut order_rejected = false;
    let order = order_bodies
        .into_iter()
        .next()
        .and_then(|body| match body.and_then(|b| parse_order(&b)) {
            Ok(order) => Some(order),
            Err(e) => {
                warn!(error = %e, "discarding malformed order directive");
                order_rejected = true;
                None
            }
        });

    let image_requests = image_bodies
        .into_iter()
        .filter_map(|body| match body {
            Ok(name) if !name.trim().is_empty() => Some(name.trim().to_string()),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "discarding malformed image directive");
                None
            }
        })
        .collect();

    let text = tidy(&strip_markers(&text));
    let intent = if order.is_some() {
        Intent::OrderCreation
    } else {
        classify(&text)
    };

    ParsedReply {
        text,
        order,
        order_rejected,
        image_requests,
        intent,
    }
}

fn parse_order(body: &str) -> Result<ParsedOrderIntent, DirectiveError> {
    serde_json::from_str(body.trim()).map_err(|e| DirectiveError::InvalidJson(e.to_string()))
}

/// Remove every `open ... close` block from `text`, returning the remaining
/// text and each block body.
///
/// A block with no closing marker is removed up to the end of its line.
fn extract_blocks(
    text: &str,
    open: &str,
    close: &str,
) -> (String, Vec<Result<String, DirectiveError>>) {
    let mut remaining = String::with_capacity(text.len());
    let mut bodies = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find(open) {
        remaining.push_str(&rest[..start]);
        let after_open = &rest[start + open.len()..];

        match after_open.find(close) {
            Some(end) => {
                bodies.push(Ok(after_open[..end].to_string()));
                rest = &after_open[end + close.len()..];
            }
            None => {
                bodies.push(Err(DirectiveError::Unterminated));
                rest = match after_open.find('\n') {
                    Some(nl) => &after_open[nl..],
                    None => "",
                };
            }
        }
    }
    remaining.push_str(rest);

    (remaining, bodies)
}

/// Remove markers left outside a well-formed block, such as a stray closing
/// marker or one nested inside the other kind of block.
fn strip_markers(text: &str) -> String {
    [ORDER_OPEN, ORDER_CLOSE, IMAGE_OPEN, IMAGE_CLOSE]
        .iter()
        .fold(text.to_string(), |acc, marker| acc.replace(marker, ""))
}

/// Trim trailing spaces per line and collapse runs of blank lines.
fn tidy(text: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for line in text.lines().map(str::trim_end) {
        if line.trim().is_empty() && out.last().is_none_or(|l| l.trim().is_empty()) {
            continue;
        }
        out.push(line);
    }
    out.join("\n").trim().to_string()
}
