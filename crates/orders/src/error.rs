use thiserror::Error;

use storefront_core::{CustomerId, Money, ProductId};

/// Reasons an order is rejected before anything is written.
///
/// Every variant is deterministic given the request and the state it was
/// evaluated against; none of them is worth retrying unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrderError {
    #[error("order must contain at least one item")]
    EmptyOrder,

    #[error("quantity for product {product_id} must be positive (got {quantity})")]
    InvalidQuantity { product_id: ProductId, quantity: i64 },

    #[error("product {0} appears more than once in the order")]
    DuplicateProduct(ProductId),

    #[error("unknown customer {0}")]
    InvalidCustomer(CustomerId),

    #[error("unknown product id(s): {ids}", ids = join_ids(.0))]
    InvalidProduct(Vec<ProductId>),

    #[error(
        "not enough stock for product {product_id} (requested {requested}, available {available})"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: i64,
        available: i64,
    },

    #[error("order total exceeds the maximum amount of {}", Money::max())]
    TotalTooLarge,
}

fn join_ids(ids: &[ProductId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
