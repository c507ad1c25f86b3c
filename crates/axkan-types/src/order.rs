//! Order intents parsed from model replies and the priced drafts built from them.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::OrderError;

/// Value the model is told to put in `clientPhone`; replaced with the real
/// WhatsApp id before the order is persisted.
pub const PHONE_PLACEHOLDER: &str = "PHONE_PLACEHOLDER";

/// Order data embedded by the model inside a `[CREATE_ORDER]` directive.
///
/// Every field defaults so that a syntactically valid but incomplete
/// directive still deserializes and is rejected by [`ParsedOrderIntent::validate`]
/// rather than by the JSON parser.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParsedOrderIntent {
    pub client_name: String,
    pub client_phone: Option<String>,
    pub items: Vec<OrderLineIntent>,
    pub event_type: Option<String>,
    pub delivery_date: Option<String>,
    pub client_address: Option<String>,
    pub client_city: Option<String>,
    pub client_state: Option<String>,
    pub notes: Option<String>,
}

/// A single line as the model wrote it.
///
/// Models write numbers as `100`, `100.0`, or `"100"`; all are accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrderLineIntent {
    pub product_name: String,
    #[serde(deserialize_with = "lenient_quantity")]
    pub quantity: u32,
    #[serde(deserialize_with = "lenient_price")]
    pub unit_price: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LooseNumber {
    Int(u64),
    Float(f64),
    Text(String),
}

impl LooseNumber {
    fn as_f64(&self) -> Option<f64> {
        match self {
            LooseNumber::Int(n) => Some(*n as f64),
            LooseNumber::Float(f) => Some(*f),
            LooseNumber::Text(s) => s.trim().parse().ok(),
        }
    }
}

fn lenient_quantity<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = LooseNumber::deserialize(deserializer)?;
    if let LooseNumber::Int(n) = value {
        return u32::try_from(n).map_err(|_| D::Error::custom(format!("quantity {n} is too large")));
    }
    match value.as_f64() {
        Some(f) if f.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&f) => Ok(f as u32),
        _ => Err(D::Error::custom("quantity must be a whole number")),
    }
}

fn lenient_price<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    LooseNumber::deserialize(deserializer)?
        .as_f64()
        .ok_or_else(|| D::Error::custom("unitPrice must be a number"))
}

impl ParsedOrderIntent {
    /// Check the fields an order cannot be created without.
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.client_name.trim().is_empty() {
            return Err(OrderError::Validation("clientName is required".to_string()));
        }
        if self.items.is_empty() {
            return Err(OrderError::Validation("order has no items".to_string()));
        }
        for (i, item) in self.items.iter().enumerate() {
            if item.product_name.trim().is_empty() {
                return Err(OrderError::Validation(format!("item {i} has no productName")));
            }
            if item.quantity == 0 {
                return Err(OrderError::Validation(format!(
                    "item '{}' has zero quantity",
                    item.product_name
                )));
            }
            if !item.unit_price.is_finite() || item.unit_price < 0.0 {
                return Err(OrderError::Validation(format!(
                    "item '{}' has an invalid unitPrice",
                    item.product_name
                )));
            }
        }
        Ok(())
    }

    /// The phone to record: the placeholder (or nothing) becomes the channel address.
    pub fn resolved_phone(&self, wa_id: &str) -> String {
        match self.client_phone.as_deref().map(str::trim) {
            None | Some("") | Some(PHONE_PLACEHOLDER) => wa_id.to_string(),
            Some(phone) => phone.to_string(),
        }
    }
}

/// A line with its catalog-resolved cost basis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricedLine {
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: f64,
    pub unit_cost: f64,
}

impl PricedLine {
    pub fn line_price(&self) -> f64 {
        f64::from(self.quantity) * self.unit_price
    }

    pub fn line_cost(&self) -> f64 {
        f64::from(self.quantity) * self.unit_cost
    }
}

/// An order ready to persist and hand to the order sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDraft {
    pub id: Uuid,
    pub order_number: String,
    pub client_name: String,
    pub client_phone: String,
    pub client_address: Option<String>,
    pub client_city: Option<String>,
    pub client_state: Option<String>,
    pub event_type: Option<String>,
    pub delivery_date: Option<String>,
    pub notes: String,
    pub items: Vec<PricedLine>,
    pub total_price: f64,
    pub production_cost: f64,
}

/// Sum of quantity x unit price across lines.
pub fn total_price(items: &[PricedLine]) -> f64 {
    items.iter().map(PricedLine::line_price).sum()
}

/// Sum of quantity x unit cost across lines.
pub fn total_cost(items: &[PricedLine]) -> f64 {
    items.iter().map(PricedLine::line_cost).sum()
}

/// Result of a successfully committed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderReceipt {
    pub order_id: Uuid,
    pub order_number: String,
    /// Identifier assigned by the external order sink.
    pub external_id: String,
    pub total_price: f64,
}

/// Image the model asked to send, resolved against the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMediaDirective {
    pub product_name: String,
    pub media_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent() -> ParsedOrderIntent {
        ParsedOrderIntent {
            client_name: "Ana López".to_string(),
            client_phone: Some(PHONE_PLACEHOLDER.to_string()),
            items: vec![OrderLineIntent {
                product_name: "Imanes".to_string(),
                quantity: 100,
                unit_price: 11.0,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_camel_case_deserialize() {
        let json = r#"{"clientName":"Ana","clientPhone":"PHONE_PLACEHOLDER","items":[{"productName":"Imanes","quantity":100,"unitPrice":11.0}],"eventType":"Boda","deliveryDate":"2026-03-20"}"#;
        let parsed: ParsedOrderIntent = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.client_name, "Ana");
        assert_eq!(parsed.items[0].quantity, 100);
        assert_eq!(parsed.event_type.as_deref(), Some("Boda"));
        assert!(parsed.client_city.is_none());
    }

    #[test]
    fn test_quantity_accepts_whole_floats_and_strings() {
        let line: OrderLineIntent =
            serde_json::from_str(r#"{"productName":"Imanes","quantity":100.0,"unitPrice":"11.5"}"#).unwrap();
        assert_eq!(line.quantity, 100);
        assert_eq!(line.unit_price, 11.5);

        let line: OrderLineIntent =
            serde_json::from_str(r#"{"productName":"Imanes","quantity":" 40 ","unitPrice":11}"#).unwrap();
        assert_eq!(line.quantity, 40);

        for bad in [r#""quantity":2.5"#, r#""quantity":-3"#, r#""quantity":"muchos""#] {
            let json = format!(r#"{{"productName":"Imanes",{bad},"unitPrice":11}}"#);
            assert!(serde_json::from_str::<OrderLineIntent>(&json).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_validate_ok() {
        assert!(intent().validate().is_ok());
    }

    #[test]
    fn test_validate_missing_name() {
        let mut i = intent();
        i.client_name = "  ".to_string();
        assert!(matches!(i.validate(), Err(OrderError::Validation(_))));
    }

    #[test]
    fn test_validate_zero_quantity() {
        let mut i = intent();
        i.items[0].quantity = 0;
        assert!(matches!(i.validate(), Err(OrderError::Validation(_))));
    }

    #[test]
    fn test_resolved_phone_substitutes_placeholder() {
        assert_eq!(intent().resolved_phone("5215512345678"), "5215512345678");
        let mut i = intent();
        i.client_phone = Some("5550001111".to_string());
        assert_eq!(i.resolved_phone("5215512345678"), "5550001111");
    }

    #[test]
    fn test_totals() {
        let items = vec![
            PricedLine {
                product_name: "A".into(),
                quantity: 50,
                unit_price: 10.0,
                unit_cost: 2.0,
            },
            PricedLine {
                product_name: "B".into(),
                quantity: 30,
                unit_price: 5.0,
                unit_cost: 1.0,
            },
        ];
        assert_eq!(total_price(&items), 650.0);
        assert_eq!(total_cost(&items), 130.0);
    }
}
