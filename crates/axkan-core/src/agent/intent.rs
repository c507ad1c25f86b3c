//! Keyword-based intent labels for telemetry.
//!
//! Labels are cached on the conversation for the operator dashboard and
//! never drive control flow. Rules are checked in table order and the first
//! rule with a matching keyword wins.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greeting,
    ProductInquiry,
    CollectingInfo,
    OrderSummary,
    StatusInquiry,
    OrderCreation,
    General,
    /// The model call failed and the fallback reply was sent.
    Error,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Greeting => "greeting",
            Intent::ProductInquiry => "product_inquiry",
            Intent::CollectingInfo => "collecting_info",
            Intent::OrderSummary => "order_summary",
            Intent::StatusInquiry => "status_inquiry",
            Intent::OrderCreation => "order_creation",
            Intent::General => "general",
            Intent::Error => "error",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keywords (lowercase) that map a reply to an intent.
#[derive(Debug, Clone, Copy)]
pub struct IntentRule {
    pub intent: Intent,
    pub keywords: &'static [&'static str],
}

pub const INTENT_RULES: &[IntentRule] = &[
    IntentRule {
        intent: Intent::StatusInquiry,
        keywords: &["déjame revisar tu pedido", "revisar el estado"],
    },
    IntentRule {
        intent: Intent::Greeting,
        keywords: &["bienvenido", "hola"],
    },
    IntentRule {
        intent: Intent::ProductInquiry,
        keywords: &["catálogo", "tenemos", "precio"],
    },
    IntentRule {
        intent: Intent::OrderSummary,
        keywords: &["pedido queda así", "resumen", "total de"],
    },
    IntentRule {
        intent: Intent::CollectingInfo,
        keywords: &["dirección", "nombre completo", "cuántas personas"],
    },
];

/// Classify a reply with [`INTENT_RULES`].
pub fn classify(text: &str) -> Intent {
    classify_with(INTENT_RULES, text)
}

/// Classify a reply with a custom rule table.
pub fn classify_with(rules: &[IntentRule], text: &str) -> Intent {
    let lower = text.to_lowercase();
    rules
        .iter()
        .find(|rule| rule.keywords.iter().any(|k| lower.contains(k)))
        .map(|rule| rule.intent)
        .unwrap_or(Intent::General)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_table_order() {
        assert_eq!(
            classify("Hola! Déjame revisar tu pedido, un momento."),
            Intent::StatusInquiry
        );
        assert_eq!(classify("Hola! Bienvenido a AXKAN"), Intent::Greeting);
        assert_eq!(classify("Tenemos imanes y llaveros"), Intent::ProductInquiry);
        assert_eq!(
            classify("Perfecto, tu pedido queda así: 200 imanes"),
            Intent::OrderSummary
        );
        assert_eq!(classify("Me compartes tu DIRECCIÓN?"), Intent::CollectingInfo);
        assert_eq!(classify("Va, gracias"), Intent::General);
    }

    #[test]
    fn test_custom_rules() {
        let rules = [IntentRule {
            intent: Intent::Greeting,
            keywords: &["buenas"],
        }];
        assert_eq!(classify_with(&rules, "Buenas tardes"), Intent::Greeting);
        assert_eq!(classify_with(&rules, "hola"), Intent::General);
    }

    #[test]
    fn test_serde_label() {
        let json = serde_json::to_string(&Intent::ProductInquiry).unwrap();
        assert_eq!(json, "\"product_inquiry\"");
        assert_eq!(Intent::OrderCreation.to_string(), "order_creation");
    }
}
