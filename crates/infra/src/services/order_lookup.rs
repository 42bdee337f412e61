use thiserror::Error;
use tracing::instrument;

use storefront_core::OrderId;
use storefront_orders::Order;

use crate::store::{OrderRepository, StoreError};

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("order {0} not found")]
    NotFound(OrderId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Read side for placed orders.
#[derive(Debug, Clone)]
pub struct OrderLookup<O> {
    orders: O,
}

impl<O> OrderLookup<O>
where
    O: OrderRepository,
{
    pub fn new(orders: O) -> Self {
        Self { orders }
    }

    #[instrument(skip(self), fields(order_id = %order_id), err)]
    pub async fn find_order(&self, order_id: OrderId) -> Result<Order, LookupError> {
        self.orders
            .find_by_id(order_id)
            .await?
            .ok_or(LookupError::NotFound(order_id))
    }
}
