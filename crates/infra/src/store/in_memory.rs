use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;

use storefront_core::{CustomerId, OrderId, ProductId};
use storefront_customers::{Customer, NewCustomer};
use storefront_orders::{NewOrder, Order};
use storefront_products::{NewProduct, Product, StockUpdate};

use super::{
    CustomerLookup, OrderRepository, OrderTransaction, ProductCatalog, StoreError,
    ensure_positive_decrements,
};

#[derive(Debug, Default)]
struct State {
    customers: HashMap<CustomerId, Customer>,
    customer_emails: HashMap<String, CustomerId>,
    products: HashMap<ProductId, Product>,
    product_names: HashMap<String, ProductId>,
    orders: HashMap<OrderId, Order>,
}

impl State {
    /// Check every decrement against current stock, then apply them all.
    ///
    /// Decrements for the same product are summed first so a batch can never
    /// take a product below zero through repetition.
    fn apply_stock_updates(&mut self, updates: &[StockUpdate]) -> Result<(), StoreError> {
        ensure_positive_decrements(updates)?;

        let mut totals: Vec<(ProductId, i64)> = Vec::with_capacity(updates.len());
        for update in updates {
            match totals.iter_mut().find(|(id, _)| *id == update.product_id) {
                Some((_, total)) => {
                    *total = total.checked_add(update.quantity).ok_or(
                        StoreError::InvalidQuantity {
                            product_id: update.product_id,
                            quantity: update.quantity,
                        },
                    )?;
                }
                None => totals.push((update.product_id, update.quantity)),
            }
        }

        for (product_id, requested) in &totals {
            let product = self
                .products
                .get(product_id)
                .ok_or_else(|| StoreError::NotFound(format!("product {product_id}")))?;
            if product.remaining_after(*requested).is_none() {
                return Err(StoreError::StockConflict {
                    product_id: *product_id,
                    requested: *requested,
                    available: product.quantity,
                });
            }
        }

        for (product_id, requested) in totals {
            if let Some(product) = self.products.get_mut(&product_id) {
                product.quantity -= requested;
            }
        }
        Ok(())
    }
}

/// In-memory implementation of every storage port.
///
/// Intended for tests/dev. All collections live behind one lock so a
/// committed order and its stock decrements become visible together.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a product as-is (fixtures, price changes in tests).
    ///
    /// Fails with [`StoreError::UniqueViolation`] if another product already
    /// holds the name.
    pub fn seed_product(&self, product: Product) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| StoreError::LockPoisoned)?;
        let holder = state.product_names.get(&product.name).copied();
        if holder.is_some_and(|id| id != product.id) {
            return Err(StoreError::UniqueViolation(format!(
                "products.name = {}",
                product.name
            )));
        }
        let previous_name = state.products.get(&product.id).map(|p| p.name.clone());
        if let Some(name) = previous_name {
            state.product_names.remove(&name);
        }
        state.product_names.insert(product.name.clone(), product.id);
        state.products.insert(product.id, product);
        Ok(())
    }

    pub fn order_count(&self) -> Result<usize, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(state.orders.len())
    }
}

#[async_trait]
impl CustomerLookup for InMemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Customer>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(state
            .customer_emails
            .get(email)
            .and_then(|id| state.customers.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(state.customers.get(&id).cloned())
    }

    async fn create(&self, customer: NewCustomer) -> Result<Customer, StoreError> {
        let mut state = self.state.write().map_err(|_| StoreError::LockPoisoned)?;
        if state.customer_emails.contains_key(customer.email()) {
            return Err(StoreError::UniqueViolation(format!(
                "customers.email = {}",
                customer.email()
            )));
        }

        let customer = customer.into_customer(CustomerId::new(), Utc::now());
        state
            .customer_emails
            .insert(customer.email.clone(), customer.id);
        state.customers.insert(customer.id, customer.clone());
        Ok(customer)
    }
}

#[async_trait]
impl ProductCatalog for InMemoryStore {
    async fn find_all_by_id(&self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::LockPoisoned)?;
        let mut found: Vec<Product> = Vec::with_capacity(ids.len());
        for id in ids {
            if found.iter().any(|p| p.id == *id) {
                continue;
            }
            if let Some(product) = state.products.get(id) {
                found.push(product.clone());
            }
        }
        Ok(found)
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Product>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(state
            .product_names
            .get(name)
            .and_then(|id| state.products.get(id))
            .cloned())
    }

    async fn create(&self, product: NewProduct) -> Result<Product, StoreError> {
        let mut state = self.state.write().map_err(|_| StoreError::LockPoisoned)?;
        if state.product_names.contains_key(product.name()) {
            return Err(StoreError::UniqueViolation(format!(
                "products.name = {}",
                product.name()
            )));
        }

        let product = product.into_product(ProductId::new(), Utc::now());
        state.product_names.insert(product.name.clone(), product.id);
        state.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn update_quantities(&self, updates: &[StockUpdate]) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| StoreError::LockPoisoned)?;
        state.apply_stock_updates(updates)
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    type Transaction = InMemoryTransaction;

    async fn begin(&self) -> Result<Self::Transaction, StoreError> {
        Ok(InMemoryTransaction {
            state: Arc::clone(&self.state),
            orders: Vec::new(),
            stock_updates: Vec::new(),
        })
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(state.orders.get(&id).cloned())
    }
}

/// Staged writes against an [`InMemoryStore`].
///
/// Writes are buffered locally and applied under a single write lock on
/// commit, where stock is checked again against the state at that moment.
#[derive(Debug)]
pub struct InMemoryTransaction {
    state: Arc<RwLock<State>>,
    orders: Vec<Order>,
    stock_updates: Vec<StockUpdate>,
}

#[async_trait]
impl OrderTransaction for InMemoryTransaction {
    async fn create_order(&mut self, order: NewOrder) -> Result<Order, StoreError> {
        let order = order.into_order(OrderId::new(), Utc::now());
        self.orders.push(order.clone());
        Ok(order)
    }

    async fn update_quantities(&mut self, updates: &[StockUpdate]) -> Result<(), StoreError> {
        // Fail early against a scratch copy; commit re-checks for real.
        {
            let state = self.state.read().map_err(|_| StoreError::LockPoisoned)?;
            let mut scratch = State {
                products: state.products.clone(),
                ..State::default()
            };
            scratch.apply_stock_updates(&self.stock_updates)?;
            scratch.apply_stock_updates(updates)?;
        }
        self.stock_updates.extend_from_slice(updates);
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| StoreError::LockPoisoned)?;

        for order in &self.orders {
            if !state.customers.contains_key(&order.customer_id) {
                return Err(StoreError::NotFound(format!(
                    "customer {}",
                    order.customer_id
                )));
            }
            if let Some(line) = order
                .line_items
                .iter()
                .find(|l| !state.products.contains_key(&l.product_id))
            {
                return Err(StoreError::NotFound(format!("product {}", line.product_id)));
            }
        }

        state.apply_stock_updates(&self.stock_updates)?;
        for order in self.orders {
            state.orders.insert(order.id, order);
        }
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        Ok(())
    }
}
