//! Order persistence and the external order sink.

use axkan_types::error::{OrderError, ProviderError};
use axkan_types::order::{OrderDraft, OrderReceipt};

/// The external order system. Returns the identifier it assigned.
pub trait OrderSink: Send + Sync {
    fn submit(
        &self,
        draft: &OrderDraft,
    ) -> impl std::future::Future<Output = Result<String, ProviderError>> + Send;
}

/// Local order store.
pub trait OrderStore: Send + Sync {
    /// Persist the order and its lines and submit it to `sink` as one unit.
    ///
    /// The sink call must not hold a database connection or lock. Any
    /// failure leaves no order behind, and an order is only reported as
    /// created once the sink has accepted it.
    fn create_order<S: OrderSink>(
        &self,
        draft: &OrderDraft,
        sink: &S,
    ) -> impl std::future::Future<Output = Result<OrderReceipt, OrderError>> + Send;
}
