//! SQLite order store.
//!
//! Orders are reserved, then confirmed. The order and its lines are written
//! with status `pending` in one short transaction. The sink is called with no
//! connection held, so other conversations keep writing while it runs. A
//! successful sink call sets the external id and moves the order to `new`; a
//! failed one deletes the reservation. `pending` orders are never reported
//! as created.

use axkan_core::repository::order::{OrderSink, OrderStore};
use axkan_types::error::OrderError;
use axkan_types::order::{OrderDraft, OrderReceipt};
use chrono::Utc;
use tracing::warn;

use super::format_datetime;
use super::pool::DatabasePool;

pub struct SqliteOrderStore {
    pool: DatabasePool,
}

impl SqliteOrderStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    async fn reserve(&self, draft: &OrderDraft) -> Result<(), OrderError> {
        let mut tx = self.pool.writer.begin().await.map_err(persistence)?;

        sqlx::query(
            r#"INSERT INTO orders (id, order_number, client_name, client_phone, client_address, client_city, client_state,
                                   event_type, delivery_date, notes, total_price, production_cost, status, department, priority, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'pending', 'design', 'normal', ?)"#,
        )
        .bind(draft.id.to_string())
        .bind(&draft.order_number)
        .bind(&draft.client_name)
        .bind(&draft.client_phone)
        .bind(&draft.client_address)
        .bind(&draft.client_city)
        .bind(&draft.client_state)
        .bind(&draft.event_type)
        .bind(&draft.delivery_date)
        .bind(&draft.notes)
        .bind(draft.total_price)
        .bind(draft.production_cost)
        .bind(format_datetime(&Utc::now()))
        .execute(&mut *tx)
        .await
        .map_err(persistence)?;

        for item in &draft.items {
            sqlx::query(
                "INSERT INTO order_items (order_id, product_name, quantity, unit_price, unit_cost) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(draft.id.to_string())
            .bind(&item.product_name)
            .bind(i64::from(item.quantity))
            .bind(item.unit_price)
            .bind(item.unit_cost)
            .execute(&mut *tx)
            .await
            .map_err(persistence)?;
        }

        tx.commit().await.map_err(persistence)
    }

    async fn confirm(&self, draft: &OrderDraft, external_id: &str) -> Result<(), OrderError> {
        sqlx::query("UPDATE orders SET external_id = ?, status = 'new' WHERE id = ? AND status = 'pending'")
            .bind(external_id)
            .bind(draft.id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(persistence)?;
        Ok(())
    }

    /// Drop a reservation. Lines go with it through `ON DELETE CASCADE`.
    async fn release(&self, draft: &OrderDraft) {
        let result = sqlx::query("DELETE FROM orders WHERE id = ? AND status = 'pending'")
            .bind(draft.id.to_string())
            .execute(&self.pool.writer)
            .await;
        if let Err(e) = result {
            warn!(order_number = %draft.order_number, error = %e, "failed to release pending order");
        }
    }
}

fn persistence(e: sqlx::Error) -> OrderError {
    OrderError::Persistence(e.to_string())
}

impl OrderStore for SqliteOrderStore {
    async fn create_order<S: OrderSink>(
        &self,
        draft: &OrderDraft,
        sink: &S,
    ) -> Result<OrderReceipt, OrderError> {
        self.reserve(draft).await?;

        let external_id = match sink.submit(draft).await {
            Ok(id) => id,
            Err(e) => {
                self.release(draft).await;
                return Err(OrderError::Sink(e.to_string()));
            }
        };

        if let Err(e) = self.confirm(draft, &external_id).await {
            self.release(draft).await;
            return Err(e);
        }

        Ok(OrderReceipt {
            order_id: draft.id,
            order_number: draft.order_number.clone(),
            external_id,
            total_price: draft.total_price,
        })
    }
}
