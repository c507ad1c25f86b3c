//! Turns a parsed order directive into a persisted order.
//!
//! Each line gets a production-cost basis from the live catalog. Lines with
//! no catalog match cost zero and are logged; they do not block the order.

use axkan_types::catalog::CatalogItem;
use axkan_types::error::OrderError;
use axkan_types::order::{
    OrderDraft, OrderReceipt, ParsedOrderIntent, PricedLine, total_cost, total_price,
};
use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::catalog::find_product;
use crate::repository::order::{OrderSink, OrderStore};

/// Sent to the client when an order could not be recorded.
pub const ORDER_FAILURE_REPLY: &str =
    "Hubo un problema al registrar tu pedido. Podrías intentar confirmarlo de nuevo? Disculpa la molestia.";

/// Validates, prices, and persists orders.
pub struct OrderExecutor<'a, St, Si> {
    store: &'a St,
    sink: &'a Si,
}

impl<'a, St: OrderStore, Si: OrderSink> OrderExecutor<'a, St, Si> {
    pub fn new(store: &'a St, sink: &'a Si) -> Self {
        Self { store, sink }
    }

    pub async fn execute(
        &self,
        intent: &ParsedOrderIntent,
        wa_id: &str,
        catalog: &[CatalogItem],
    ) -> Result<OrderReceipt, OrderError> {
        intent.validate()?;
        let draft = build_draft(intent, wa_id, catalog, Utc::now());

        let receipt = self.store.create_order(&draft, self.sink).await?;
        info!(
            order_number = %receipt.order_number,
            external_id = %receipt.external_id,
            total_price = receipt.total_price,
            items = draft.items.len(),
            "order created from chat"
        );
        Ok(receipt)
    }
}

/// Price a validated intent into a draft.
pub fn build_draft(
    intent: &ParsedOrderIntent,
    wa_id: &str,
    catalog: &[CatalogItem],
    now: DateTime<Utc>,
) -> OrderDraft {
    let items: Vec<PricedLine> = intent
        .items
        .iter()
        .map(|line| {
            let unit_cost = match find_product(catalog, &line.product_name) {
                Some(product) => product.cost,
                None => {
                    warn!(product = %line.product_name, "no catalog match for order line, using zero cost");
                    0.0
                }
            };
            PricedLine {
                product_name: line.product_name.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                unit_cost,
            }
        })
        .collect();

    let id = Uuid::now_v7();
    OrderDraft {
        id,
        order_number: order_number(now, &id),
        client_name: intent.client_name.trim().to_string(),
        client_phone: intent.resolved_phone(wa_id),
        client_address: non_empty(&intent.client_address),
        client_city: non_empty(&intent.client_city),
        client_state: non_empty(&intent.client_state),
        event_type: non_empty(&intent.event_type),
        delivery_date: non_empty(&intent.delivery_date),
        notes: order_notes(intent),
        total_price: total_price(&items),
        production_cost: total_cost(&items),
        items,
    }
}

/// `WA-YYYYMMDD-XXXX`, the suffix taken from the random tail of the order id.
pub fn order_number(now: DateTime<Utc>, id: &Uuid) -> String {
    let bytes = id.as_bytes();
    format!(
        "WA-{}-{:02X}{:02X}",
        now.format("%Y%m%d"),
        bytes[14],
        bytes[15]
    )
}

/// Notes shown in the order system, pipe separated.
pub fn order_notes(intent: &ParsedOrderIntent) -> String {
    let mut parts = Vec::with_capacity(4);
    if let Some(event) = non_empty(&intent.event_type) {
        parts.push(format!("Evento: {event}"));
    }
    if let Some(date) = non_empty(&intent.delivery_date) {
        parts.push(format!("Fecha entrega: {date}"));
    }
    if let Some(notes) = non_empty(&intent.notes) {
        parts.push(notes);
    }
    parts.push("Pedido creado via WhatsApp".to_string());
    parts.join(" | ")
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
