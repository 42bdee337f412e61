use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{CustomerId, DomainResult, Entity, Money, OrderId, ProductId};

use crate::error::OrderError;

/// One requested (product, quantity) pair.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemRequest {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// A request to place an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub customer_id: CustomerId,
    pub items: Vec<OrderItemRequest>,
}

impl OrderRequest {
    pub fn new(
        customer_id: CustomerId,
        items: impl IntoIterator<Item = (ProductId, i64)>,
    ) -> Self {
        Self {
            customer_id,
            items: items
                .into_iter()
                .map(|(product_id, quantity)| OrderItemRequest {
                    product_id,
                    quantity,
                })
                .collect(),
        }
    }

    /// Check the request shape without consulting any state.
    ///
    /// Rejects empty requests, non-positive quantities and repeated product
    /// ids. With distinct ids, "every id resolved" and "as many products found
    /// as items requested" mean the same thing.
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.items.is_empty() {
            return Err(OrderError::EmptyOrder);
        }

        let mut seen = HashSet::with_capacity(self.items.len());
        for item in &self.items {
            if item.quantity <= 0 {
                return Err(OrderError::InvalidQuantity {
                    product_id: item.product_id,
                    quantity: item.quantity,
                });
            }
            if !seen.insert(item.product_id) {
                return Err(OrderError::DuplicateProduct(item.product_id));
            }
        }

        Ok(())
    }

    /// Requested product ids, in request order.
    pub fn product_ids(&self) -> Vec<ProductId> {
        self.items.iter().map(|i| i.product_id).collect()
    }
}

/// Order line: product, unit price frozen at order time, quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineItem {
    pub product_id: ProductId,
    pub unit_price: Money,
    pub quantity: i64,
}

impl OrderLineItem {
    pub fn line_total(&self) -> DomainResult<Money> {
        // Quantities are validated positive before a line item exists.
        self.unit_price
            .times(u64::try_from(self.quantity).unwrap_or_default())
    }
}

/// A placed order. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub line_items: Vec<OrderLineItem>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn total(&self) -> DomainResult<Money> {
        line_items_total(&self.line_items)
    }

    pub fn line_for(&self, product_id: ProductId) -> Option<&OrderLineItem> {
        self.line_items.iter().find(|l| l.product_id == product_id)
    }
}

impl Entity for Order {
    type Id = OrderId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

pub(crate) fn line_items_total(line_items: &[OrderLineItem]) -> DomainResult<Money> {
    line_items
        .iter()
        .try_fold(Money::zero(), |total, line| total.checked_add(line.line_total()?))
}

/// An order ready to be persisted (identity and timestamp assigned by the store).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub customer_id: CustomerId,
    pub line_items: Vec<OrderLineItem>,
}

impl NewOrder {
    pub fn into_order(self, id: OrderId, created_at: DateTime<Utc>) -> Order {
        Order {
            id,
            customer_id: self.customer_id,
            line_items: self.line_items,
            created_at,
        }
    }
}
