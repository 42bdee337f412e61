//! Order placement planning: the pure part of placing an order.
//!
//! Given a request and the products the catalog returned for it, decide the
//! line items (with frozen prices) and the stock decrements to apply. Nothing
//! here performs IO; the infra layer persists the resulting plan inside a
//! single transaction.

use storefront_core::{CustomerId, Money, index_by_id};
use storefront_products::{Product, StockUpdate};

use crate::error::OrderError;
use crate::order::{NewOrder, OrderItemRequest, OrderLineItem, OrderRequest, line_items_total};

/// Everything needed to persist an accepted order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementPlan {
    pub customer_id: CustomerId,
    pub line_items: Vec<OrderLineItem>,
    pub stock_updates: Vec<StockUpdate>,
    total: Money,
}

impl PlacementPlan {
    pub fn total(&self) -> Money {
        self.total
    }

    /// Split the plan into the order to create and the decrements to apply.
    pub fn into_parts(self) -> (NewOrder, Vec<StockUpdate>) {
        (
            NewOrder {
                customer_id: self.customer_id,
                line_items: self.line_items,
            },
            self.stock_updates,
        )
    }
}

/// Compute line items and stock decrements for `request` against `products`.
///
/// `products` is whatever the catalog returned for the requested ids: possibly
/// a subset, in any order. The plan is all-or-nothing:
///
/// 1. the request shape is validated ([`OrderRequest::validate`]);
/// 2. every requested id must resolve, otherwise [`OrderError::InvalidProduct`]
///    lists all the missing ones;
/// 3. every item must fit in current stock, otherwise the first shortfall (in
///    request order) is reported as [`OrderError::InsufficientStock`];
/// 4. each line item captures the product's price as read here;
/// 5. the order total must fit in [`Money`], otherwise
///    [`OrderError::TotalTooLarge`].
pub fn plan_placement(
    request: &OrderRequest,
    products: &[Product],
) -> Result<PlacementPlan, OrderError> {
    request.validate()?;

    let by_id = index_by_id(products);

    let mut resolved: Vec<(&OrderItemRequest, &Product)> = Vec::with_capacity(request.items.len());
    let mut missing = Vec::new();
    for item in &request.items {
        match by_id.get(&item.product_id) {
            Some(&product) => resolved.push((item, product)),
            None => missing.push(item.product_id),
        }
    }
    if !missing.is_empty() {
        return Err(OrderError::InvalidProduct(missing));
    }

    let mut line_items = Vec::with_capacity(resolved.len());
    let mut stock_updates = Vec::with_capacity(resolved.len());
    for (item, product) in resolved {
        let remaining =
            product
                .remaining_after(item.quantity)
                .ok_or(OrderError::InsufficientStock {
                    product_id: product.id,
                    requested: item.quantity,
                    available: product.quantity,
                })?;

        stock_updates.push(StockUpdate {
            product_id: product.id,
            quantity: item.quantity,
            remaining,
        });
        line_items.push(OrderLineItem {
            product_id: product.id,
            unit_price: product.price,
            quantity: item.quantity,
        });
    }

    let total = line_items_total(&line_items).map_err(|_| OrderError::TotalTooLarge)?;

    Ok(PlacementPlan {
        customer_id: request.customer_id,
        line_items,
        stock_updates,
        total,
    })
}
