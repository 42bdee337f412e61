//! Storage ports and their adapters.
//!
//! Services depend on the traits defined here, never on a concrete backend:
//!
//! - [`CustomerLookup`]: customer reads and creation
//! - [`ProductCatalog`]: product reads, creation and standalone stock updates
//! - [`OrderRepository`]: order reads and the transactional write path
//!   ([`OrderTransaction`])
//!
//! Two backends implement all of them: [`InMemoryStore`] (tests/dev) and
//! [`PostgresStore`].

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use storefront_core::{CustomerId, OrderId, ProductId};
use storefront_customers::{Customer, NewCustomer};
use storefront_orders::{NewOrder, Order};
use storefront_products::{NewProduct, Product, StockUpdate};

pub mod in_memory;
pub mod postgres;

pub use in_memory::{InMemoryStore, InMemoryTransaction};
pub use postgres::{PostgresStore, PostgresTransaction};

/// Errors surfaced by storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint (email, product name) rejected the write.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// A conditional stock decrement found less stock than requested.
    #[error(
        "not enough stock for product {product_id} (requested {requested}, available {available})"
    )]
    StockConflict {
        product_id: ProductId,
        requested: i64,
        available: i64,
    },

    /// A stock decrement was not a positive quantity, or a batch's total
    /// for one product does not fit in an `i64`.
    #[error("invalid stock decrement for product {product_id}: {quantity}")]
    InvalidQuantity { product_id: ProductId, quantity: i64 },

    /// A referenced record does not exist.
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("database error in {operation}: {message}")]
    Database {
        operation: &'static str,
        message: String,
    },

    /// A stored row could not be turned back into a domain value.
    #[error("failed to decode row: {0}")]
    Decode(String),

    #[error("store lock poisoned")]
    LockPoisoned,
}

/// Reject any decrement that would not lower stock.
fn ensure_positive_decrements(updates: &[StockUpdate]) -> Result<(), StoreError> {
    match updates.iter().find(|u| u.quantity <= 0) {
        Some(update) => Err(StoreError::InvalidQuantity {
            product_id: update.product_id,
            quantity: update.quantity,
        }),
        None => Ok(()),
    }
}

#[async_trait]
pub trait CustomerLookup: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Customer>, StoreError>;

    async fn find_by_id(&self, id: CustomerId) -> Result<Option<Customer>, StoreError>;

    /// Persist a new customer. Fails with [`StoreError::UniqueViolation`] when
    /// the email is already taken.
    async fn create(&self, customer: NewCustomer) -> Result<Customer, StoreError>;
}

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Fetch the products among `ids` that exist. Missing ids are silently
    /// absent from the result; order is unspecified.
    async fn find_all_by_id(&self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError>;

    async fn find_by_name(&self, name: &str) -> Result<Option<Product>, StoreError>;

    /// Persist a new product. Fails with [`StoreError::UniqueViolation`] when
    /// the name is already taken.
    async fn create(&self, product: NewProduct) -> Result<Product, StoreError>;

    /// Apply a batch of decrements atomically. Each decrement only succeeds if
    /// the product still holds at least the requested quantity; otherwise the
    /// whole batch fails with [`StoreError::StockConflict`]. A non-positive
    /// quantity fails the batch with [`StoreError::InvalidQuantity`].
    async fn update_quantities(&self, updates: &[StockUpdate]) -> Result<(), StoreError>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    type Transaction: OrderTransaction;

    /// Open a unit of work for placing one order.
    async fn begin(&self) -> Result<Self::Transaction, StoreError>;

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, StoreError>;
}

/// One atomic write: the order row(s) plus the matching stock decrements.
///
/// Nothing is visible to other readers until [`commit`](Self::commit)
/// succeeds. Dropping the transaction without committing discards it.
#[async_trait]
pub trait OrderTransaction: Send {
    async fn create_order(&mut self, order: NewOrder) -> Result<Order, StoreError>;

    /// Conditional decrements, same contract as
    /// [`ProductCatalog::update_quantities`].
    async fn update_quantities(&mut self, updates: &[StockUpdate]) -> Result<(), StoreError>;

    async fn commit(self) -> Result<(), StoreError>;

    async fn rollback(self) -> Result<(), StoreError>;
}

#[async_trait]
impl<S> CustomerLookup for Arc<S>
where
    S: CustomerLookup + ?Sized,
{
    async fn find_by_email(&self, email: &str) -> Result<Option<Customer>, StoreError> {
        (**self).find_by_email(email).await
    }

    async fn find_by_id(&self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        (**self).find_by_id(id).await
    }

    async fn create(&self, customer: NewCustomer) -> Result<Customer, StoreError> {
        (**self).create(customer).await
    }
}

#[async_trait]
impl<S> ProductCatalog for Arc<S>
where
    S: ProductCatalog + ?Sized,
{
    async fn find_all_by_id(&self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
        (**self).find_all_by_id(ids).await
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Product>, StoreError> {
        (**self).find_by_name(name).await
    }

    async fn create(&self, product: NewProduct) -> Result<Product, StoreError> {
        (**self).create(product).await
    }

    async fn update_quantities(&self, updates: &[StockUpdate]) -> Result<(), StoreError> {
        (**self).update_quantities(updates).await
    }
}

#[async_trait]
impl<S> OrderRepository for Arc<S>
where
    S: OrderRepository,
{
    type Transaction = S::Transaction;

    async fn begin(&self) -> Result<Self::Transaction, StoreError> {
        (**self).begin().await
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        (**self).find_by_id(id).await
    }
}
