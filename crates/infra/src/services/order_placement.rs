//! Order placement orchestration.
//!
//! ```text
//! OrderRequest
//!   ↓
//! 1. Validate request shape (no IO)
//!   ↓
//! 2. Resolve customer            → InvalidCustomer
//!   ↓
//! 3. Batch-load products
//!   ↓
//! 4. Plan line items + stock     → InvalidProduct / InsufficientStock / TotalTooLarge
//!   ↓
//! 5. One transaction: create order, conditional decrements, commit
//! ```
//!
//! The planning step is pure (`storefront_orders::plan_placement`); this
//! module only composes it with the storage ports.

use thiserror::Error;
use tracing::{Span, info, instrument, warn};

use storefront_orders::{NewOrder, Order, OrderError, OrderRequest, plan_placement};
use storefront_products::StockUpdate;

use crate::store::{
    CustomerLookup, OrderRepository, OrderTransaction, ProductCatalog, StoreError,
};

#[derive(Debug, Error)]
pub enum PlacementError {
    /// The order was refused; nothing was written.
    #[error(transparent)]
    Rejected(#[from] OrderError),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for PlacementError {
    fn from(value: StoreError) -> Self {
        match value {
            // A concurrent order drained the stock after planning.
            StoreError::StockConflict {
                product_id,
                requested,
                available,
            } => PlacementError::Rejected(OrderError::InsufficientStock {
                product_id,
                requested,
                available,
            }),
            other => PlacementError::Store(other),
        }
    }
}

/// Places orders against the customer, product and order stores.
#[derive(Debug, Clone)]
pub struct OrderPlacement<C, P, O> {
    customers: C,
    products: P,
    orders: O,
}

impl<C, P, O> OrderPlacement<C, P, O>
where
    C: CustomerLookup,
    P: ProductCatalog,
    O: OrderRepository,
{
    pub fn new(customers: C, products: P, orders: O) -> Self {
        Self {
            customers,
            products,
            orders,
        }
    }

    /// Place an order for an existing customer.
    ///
    /// Either the order and every stock decrement are persisted together, or
    /// nothing is.
    #[instrument(
        skip(self, request),
        fields(
            customer_id = %request.customer_id,
            item_count = request.items.len(),
            order_id = tracing::field::Empty
        ),
        err
    )]
    pub async fn place_order(&self, request: OrderRequest) -> Result<Order, PlacementError> {
        request.validate()?;

        if self.customers.find_by_id(request.customer_id).await?.is_none() {
            warn!("unknown customer");
            return Err(OrderError::InvalidCustomer(request.customer_id).into());
        }

        let products = self
            .products
            .find_all_by_id(&request.product_ids())
            .await?;

        let plan = plan_placement(&request, &products).inspect_err(|err| {
            warn!(reason = %err, "order rejected");
        })?;
        let total = plan.total();
        let (new_order, stock_updates) = plan.into_parts();

        let mut tx = self.orders.begin().await?;
        let order = match persist(&mut tx, new_order, &stock_updates).await {
            Ok(order) => order,
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "rollback failed");
                }
                return Err(err.into());
            }
        };
        tx.commit().await?;

        Span::current().record("order_id", tracing::field::display(order.id));
        info!(order_id = %order.id, total = %total, "order placed");
        Ok(order)
    }
}

async fn persist<T>(
    tx: &mut T,
    new_order: NewOrder,
    stock_updates: &[StockUpdate],
) -> Result<Order, StoreError>
where
    T: OrderTransaction,
{
    let order = tx.create_order(new_order).await?;
    tx.update_quantities(stock_updates).await?;
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use storefront_core::{CustomerId, Money, ProductId};
    use storefront_customers::NewCustomer;
    use storefront_products::{NewProduct, Product};

    use crate::store::InMemoryStore;

    type Placement = OrderPlacement<Arc<InMemoryStore>, Arc<InMemoryStore>, Arc<InMemoryStore>>;

    fn placement(store: &Arc<InMemoryStore>) -> Placement {
        OrderPlacement::new(Arc::clone(store), Arc::clone(store), Arc::clone(store))
    }

    async fn customer(store: &InMemoryStore) -> CustomerId {
        CustomerLookup::create(store, NewCustomer::new("Ann", "ann@example.com").unwrap())
            .await
            .unwrap()
            .id
    }

    async fn product(store: &InMemoryStore, name: &str, price: Money, stock: i64) -> Product {
        ProductCatalog::create(store, NewProduct::new(name, price, stock).unwrap())
            .await
            .unwrap()
    }

    async fn stock_of(store: &InMemoryStore, id: ProductId) -> i64 {
        store.find_all_by_id(&[id]).await.unwrap()[0].quantity
    }

    /// Counts catalog reads so tests can assert none happened.
    struct CountingCatalog {
        inner: Arc<InMemoryStore>,
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl ProductCatalog for CountingCatalog {
        async fn find_all_by_id(&self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.find_all_by_id(ids).await
        }

        async fn find_by_name(&self, name: &str) -> Result<Option<Product>, StoreError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.find_by_name(name).await
        }

        async fn create(&self, product: NewProduct) -> Result<Product, StoreError> {
            ProductCatalog::create(&self.inner, product).await
        }

        async fn update_quantities(&self, updates: &[StockUpdate]) -> Result<(), StoreError> {
            self.inner.update_quantities(updates).await
        }
    }

    #[tokio::test]
    async fn places_order_and_decrements_stock() {
        let store = Arc::new(InMemoryStore::new());
        let customer_id = customer(&store).await;
        let a = product(&store, "A", Money::new(dec!(10.00)).unwrap(), 5).await;
        let b = product(&store, "B", Money::new(dec!(20.00)).unwrap(), 2).await;

        let order = placement(&store)
            .place_order(OrderRequest::new(customer_id, [(a.id, 3), (b.id, 2)]))
            .await
            .unwrap();

        assert_eq!(order.customer_id, customer_id);
        assert_eq!(order.line_items.len(), 2);
        assert_eq!(order.line_for(a.id).map(|l| l.unit_price), Some(a.price));
        assert_eq!(order.line_for(b.id).map(|l| l.unit_price), Some(b.price));
        assert_eq!(order.total().unwrap().amount(), dec!(70.00));
        assert_eq!(stock_of(&store, a.id).await, 2);
        assert_eq!(stock_of(&store, b.id).await, 0);

        let stored = OrderRepository::find_by_id(&*store, order.id).await.unwrap();
        assert_eq!(stored, Some(order));
    }

    #[tokio::test]
    async fn over_request_changes_nothing() {
        let store = Arc::new(InMemoryStore::new());
        let customer_id = customer(&store).await;
        let a = product(&store, "A", Money::new(dec!(10.00)).unwrap(), 5).await;
        let b = product(&store, "B", Money::new(dec!(20.00)).unwrap(), 2).await;

        let err = placement(&store)
            .place_order(OrderRequest::new(customer_id, [(a.id, 3), (b.id, 3)]))
            .await
            .unwrap_err();

        match err {
            PlacementError::Rejected(OrderError::InsufficientStock {
                product_id,
                requested,
                available,
            }) => {
                assert_eq!(product_id, b.id);
                assert_eq!(requested, 3);
                assert_eq!(available, 2);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
        assert_eq!(stock_of(&store, a.id).await, 5);
        assert_eq!(stock_of(&store, b.id).await, 2);
        assert_eq!(store.order_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn unknown_product_changes_nothing() {
        let store = Arc::new(InMemoryStore::new());
        let customer_id = customer(&store).await;
        let a = product(&store, "A", Money::new(dec!(10.00)).unwrap(), 5).await;
        let ghost = ProductId::new();

        let err = placement(&store)
            .place_order(OrderRequest::new(customer_id, [(a.id, 1), (ghost, 1)]))
            .await
            .unwrap_err();

        match err {
            PlacementError::Rejected(OrderError::InvalidProduct(missing)) => {
                assert_eq!(missing, vec![ghost]);
            }
            other => panic!("expected InvalidProduct, got {other:?}"),
        }
        assert_eq!(stock_of(&store, a.id).await, 5);
        assert_eq!(store.order_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn unknown_customer_skips_product_lookup() {
        let store = Arc::new(InMemoryStore::new());
        let a = product(&store, "A", Money::new(dec!(10.00)).unwrap(), 5).await;
        let catalog = Arc::new(CountingCatalog {
            inner: Arc::clone(&store),
            lookups: AtomicUsize::new(0),
        });
        let placement = OrderPlacement::new(
            Arc::clone(&store),
            Arc::clone(&catalog),
            Arc::clone(&store),
        );
        let stranger = CustomerId::new();

        let err = placement
            .place_order(OrderRequest::new(stranger, [(a.id, 1)]))
            .await
            .unwrap_err();

        match err {
            PlacementError::Rejected(OrderError::InvalidCustomer(id)) => assert_eq!(id, stranger),
            other => panic!("expected InvalidCustomer, got {other:?}"),
        }
        assert_eq!(catalog.lookups.load(Ordering::SeqCst), 0);
        assert_eq!(stock_of(&store, a.id).await, 5);
    }

    #[tokio::test]
    async fn malformed_requests_are_rejected_before_io() {
        let store = Arc::new(InMemoryStore::new());
        let catalog = Arc::new(CountingCatalog {
            inner: Arc::clone(&store),
            lookups: AtomicUsize::new(0),
        });
        let placement = OrderPlacement::new(
            Arc::clone(&store),
            Arc::clone(&catalog),
            Arc::clone(&store),
        );
        let customer_id = customer(&store).await;
        let a = ProductId::new();

        let cases = [
            (
                OrderRequest::new(customer_id, Vec::<(ProductId, i64)>::new()),
                OrderError::EmptyOrder,
            ),
            (
                OrderRequest::new(customer_id, [(a, 0)]),
                OrderError::InvalidQuantity {
                    product_id: a,
                    quantity: 0,
                },
            ),
            (
                OrderRequest::new(customer_id, [(a, 1), (a, 1)]),
                OrderError::DuplicateProduct(a),
            ),
        ];

        for (request, expected) in cases {
            match placement.place_order(request).await {
                Err(PlacementError::Rejected(err)) => assert_eq!(err, expected),
                other => panic!("expected {expected:?}, got {other:?}"),
            }
        }
        assert_eq!(catalog.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn oversized_total_is_rejected_without_writes() {
        let store = Arc::new(InMemoryStore::new());
        let customer_id = customer(&store).await;
        let pricey = product(&store, "Pricey", Money::max(), 100).await;

        let err = placement(&store)
            .place_order(OrderRequest::new(customer_id, [(pricey.id, 50)]))
            .await
            .unwrap_err();

        match err {
            PlacementError::Rejected(OrderError::TotalTooLarge) => {}
            other => panic!("expected TotalTooLarge, got {other:?}"),
        }
        assert_eq!(stock_of(&store, pricey.id).await, 100);
        assert_eq!(store.order_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn placed_order_keeps_its_prices() {
        let store = Arc::new(InMemoryStore::new());
        let customer_id = customer(&store).await;
        let a = product(&store, "A", Money::new(dec!(10.00)).unwrap(), 5).await;

        let order = placement(&store)
            .place_order(OrderRequest::new(customer_id, [(a.id, 1)]))
            .await
            .unwrap();

        let mut repriced = store.find_all_by_id(&[a.id]).await.unwrap().remove(0);
        repriced.price = Money::new(dec!(99.99)).unwrap();
        store.seed_product(repriced).unwrap();

        let stored = OrderRepository::find_by_id(&*store, order.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.line_items[0].unit_price.amount(), dec!(10.00));
    }

    #[test]
    fn stock_conflict_becomes_insufficient_stock() {
        let product_id = ProductId::new();
        let err = PlacementError::from(StoreError::StockConflict {
            product_id,
            requested: 2,
            available: 1,
        });

        assert!(matches!(
            err,
            PlacementError::Rejected(OrderError::InsufficientStock {
                requested: 2,
                available: 1,
                ..
            })
        ));
        assert!(matches!(
            PlacementError::from(StoreError::LockPoisoned),
            PlacementError::Store(StoreError::LockPoisoned)
        ));
    }
}
