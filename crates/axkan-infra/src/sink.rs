//! HTTP order sink: hands reserved orders to the external order system.
//!
//! With no URL configured the local order store is the system of record and
//! the order number doubles as the external id.

use std::time::Duration;

use axkan_core::repository::order::OrderSink;
use axkan_types::config::OrderSinkConfig;
use axkan_types::error::ProviderError;
use axkan_types::order::OrderDraft;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::http::{build_client, check_status, transport_error};

pub struct HttpOrderSink {
    client: reqwest::Client,
    url: Option<String>,
    token: Option<SecretString>,
}

#[derive(Debug, Deserialize)]
struct SinkResponse {
    #[serde(alias = "orderId", alias = "order_id")]
    id: Value,
}

impl HttpOrderSink {
    pub fn new(config: &OrderSinkConfig, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_client(timeout).map_err(transport_error)?,
            url: config.url.clone().filter(|u| !u.trim().is_empty()),
            token: config.token.clone(),
        })
    }
}

/// Body sent to the order system.
pub fn order_payload(draft: &OrderDraft) -> Value {
    json!({
        "orderNumber": draft.order_number,
        "clientName": draft.client_name,
        "clientPhone": draft.client_phone,
        "clientAddress": draft.client_address,
        "clientCity": draft.client_city,
        "clientState": draft.client_state,
        "eventType": draft.event_type,
        "deliveryDate": draft.delivery_date,
        "notes": draft.notes,
        "totalPrice": draft.total_price,
        "productionCost": draft.production_cost,
        "status": "new",
        "department": "design",
        "priority": "normal",
        "items": draft.items.iter().map(|item| json!({
            "productName": item.product_name,
            "quantity": item.quantity,
            "unitPrice": item.unit_price,
            "unitCost": item.unit_cost,
            "lineTotal": item.line_price(),
        })).collect::<Vec<_>>(),
    })
}

fn external_id(value: Value) -> Result<String, ProviderError> {
    match value {
        Value::String(s) if !s.is_empty() => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(ProviderError::Decode(format!("unexpected order id: {other}"))),
    }
}

impl OrderSink for HttpOrderSink {
    async fn submit(&self, draft: &OrderDraft) -> Result<String, ProviderError> {
        let Some(url) = &self.url else {
            debug!(order_number = %draft.order_number, "no external order system configured");
            return Ok(draft.order_number.clone());
        };

        let mut request = self.client.post(url).json(&order_payload(draft));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }
        let response = request.send().await.map_err(transport_error)?;
        let body: SinkResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Decode(format!("order sink response: {e}")))?;

        external_id(body.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axkan_types::order::PricedLine;
    use uuid::Uuid;

    fn draft() -> OrderDraft {
        OrderDraft {
            id: Uuid::now_v7(),
            order_number: "WA-20260301-0A1B".into(),
            client_name: "Ana López".into(),
            client_phone: "5215512345678".into(),
            client_address: None,
            client_city: None,
            client_state: None,
            event_type: Some("Boda".into()),
            delivery_date: Some("2026-03-20".into()),
            notes: "Pedido creado via WhatsApp".into(),
            items: vec![PricedLine {
                product_name: "Imanes".into(),
                quantity: 100,
                unit_price: 11.0,
                unit_cost: 2.5,
            }],
            total_price: 1100.0,
            production_cost: 250.0,
        }
    }

    #[test]
    fn test_payload_shape() {
        let payload = order_payload(&draft());
        assert_eq!(payload["orderNumber"], "WA-20260301-0A1B");
        assert_eq!(payload["status"], "new");
        assert_eq!(payload["items"][0]["lineTotal"], 1100.0);
        assert!(payload["clientAddress"].is_null());
    }

    #[test]
    fn test_external_id_accepts_strings_and_numbers() {
        assert_eq!(external_id(json!("ord_1")).unwrap(), "ord_1");
        assert_eq!(external_id(json!(42)).unwrap(), "42");
        assert!(external_id(json!(null)).is_err());

        let body: SinkResponse = serde_json::from_str(r#"{"orderId": 7}"#).unwrap();
        assert_eq!(external_id(body.id).unwrap(), "7");
    }

    #[tokio::test]
    async fn test_unconfigured_sink_uses_order_number() {
        let sink = HttpOrderSink::new(&OrderSinkConfig::default(), Duration::from_secs(5)).unwrap();
        assert_eq!(sink.submit(&draft()).await.unwrap(), "WA-20260301-0A1B");
    }
}
