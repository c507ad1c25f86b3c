//! Dedup and thread resolution for inbound messages.

use axkan_types::conversation::Conversation;
use axkan_types::error::RepositoryError;
use axkan_types::inbound::InboundEnvelope;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::repository::conversation::ConversationRepository;

/// Outcome of resolving an inbound envelope.
#[derive(Debug)]
pub enum Resolution {
    /// The message id is already stored; nothing more to do.
    Duplicate,
    /// The conversation the message belongs to, created or refreshed.
    Thread(Conversation),
}

/// Finds or creates the conversation for an inbound message and links it to
/// a known client when possible.
pub struct ThreadResolver<'a, R> {
    repo: &'a R,
    suffix_digits: usize,
}

impl<'a, R: ConversationRepository> ThreadResolver<'a, R> {
    pub fn new(repo: &'a R, suffix_digits: usize) -> Self {
        Self {
            repo,
            suffix_digits,
        }
    }

    pub async fn resolve(&self, envelope: &InboundEnvelope) -> Result<Resolution, RepositoryError> {
        if self.repo.message_exists(&envelope.wa_message_id).await? {
            debug!(wa_message_id = %envelope.wa_message_id, "duplicate delivery, skipping");
            return Ok(Resolution::Duplicate);
        }

        let mut conversation = self
            .repo
            .upsert_conversation(&envelope.from, envelope.display_name_or_id(), Utc::now())
            .await?;

        if conversation.client_id.is_none() {
            conversation.client_id = self.link_client(&conversation).await;
        }

        Ok(Resolution::Thread(conversation))
    }

    /// Best-effort phone-suffix match. Failures are logged and ignored.
    async fn link_client(&self, conversation: &Conversation) -> Option<i64> {
        let digits = phone_suffix(&conversation.wa_id, self.suffix_digits);
        if digits.is_empty() {
            return None;
        }

        let client = match self.repo.find_client_by_phone_suffix(&digits).await {
            Ok(Some(client)) => client,
            Ok(None) => return None,
            Err(e) => {
                warn!(conversation_id = %conversation.id, error = %e, "client lookup failed");
                return None;
            }
        };

        match self.repo.link_client(&conversation.id, client.id).await {
            Ok(true) => {
                info!(
                    conversation_id = %conversation.id,
                    client_id = client.id,
                    "linked conversation to client"
                );
                Some(client.id)
            }
            // Another delivery linked it first; that link stands.
            Ok(false) => None,
            Err(e) => {
                warn!(conversation_id = %conversation.id, error = %e, "failed to link client");
                None
            }
        }
    }
}

/// The last `n` digits of a phone number, ignoring any non-digit characters.
pub fn phone_suffix(phone: &str, n: usize) -> String {
    let digits: Vec<char> = phone.chars().filter(char::is_ascii_digit).collect();
    let start = digits.len().saturating_sub(n);
    digits[start..].iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_suffix() {
        assert_eq!(phone_suffix("5215512345678", 10), "5512345678");
        assert_eq!(phone_suffix("+52 (55) 1234-5678", 10), "5512345678");
        assert_eq!(phone_suffix("1234", 10), "1234");
        assert_eq!(phone_suffix("", 10), "");
    }
}
