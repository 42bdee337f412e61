//! Service wiring for a chosen storage backend.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use storefront_core::{Money, OrderId};
use storefront_customers::Customer;
use storefront_orders::{Order, OrderRequest};
use storefront_products::Product;

use crate::config::{StoreBackend, StoreConfig};
use crate::services::{
    CustomerOnboarding, ListingError, LookupError, OnboardingError, OrderLookup, OrderPlacement,
    PlacementError, ProductListing,
};
use crate::store::{
    CustomerLookup, InMemoryStore, OrderRepository, PostgresStore, ProductCatalog,
};

/// Every service, sharing one store.
#[derive(Debug)]
pub struct Services<S> {
    pub store: Arc<S>,
    pub onboarding: CustomerOnboarding<Arc<S>>,
    pub listing: ProductListing<Arc<S>>,
    pub placement: OrderPlacement<Arc<S>, Arc<S>, Arc<S>>,
    pub lookup: OrderLookup<Arc<S>>,
}

impl<S> Services<S>
where
    S: CustomerLookup + ProductCatalog + OrderRepository,
{
    pub fn new(store: Arc<S>) -> Self {
        Self {
            onboarding: CustomerOnboarding::new(Arc::clone(&store)),
            listing: ProductListing::new(Arc::clone(&store)),
            placement: OrderPlacement::new(
                Arc::clone(&store),
                Arc::clone(&store),
                Arc::clone(&store),
            ),
            lookup: OrderLookup::new(Arc::clone(&store)),
            store,
        }
    }
}

impl<S> Clone for Services<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            onboarding: self.onboarding.clone(),
            listing: self.listing.clone(),
            placement: self.placement.clone(),
            lookup: self.lookup.clone(),
        }
    }
}

/// The assembled application, over whichever backend was configured.
#[derive(Debug, Clone)]
pub enum Storefront {
    InMemory(Services<InMemoryStore>),
    Postgres(Services<PostgresStore>),
}

impl Storefront {
    pub fn in_memory() -> Self {
        Storefront::InMemory(Services::new(Arc::new(InMemoryStore::new())))
    }

    /// Build services for `config`, connecting (and migrating) if needed.
    pub async fn connect(config: &StoreConfig) -> anyhow::Result<Self> {
        match config.backend {
            StoreBackend::InMemory => {
                info!("using in-memory store");
                Ok(Self::in_memory())
            }
            StoreBackend::Postgres => {
                let url = config
                    .database_url
                    .as_deref()
                    .context("DATABASE_URL is required for the postgres store")?;

                let store = PostgresStore::connect(url, config.max_connections)
                    .await
                    .context("failed to connect to postgres")?;
                if config.run_migrations {
                    store
                        .migrate()
                        .await
                        .context("failed to run database migrations")?;
                }

                info!(max_connections = config.max_connections, "using postgres store");
                Ok(Storefront::Postgres(Services::new(Arc::new(store))))
            }
        }
    }

    /// Load configuration from the environment and connect.
    pub async fn from_env() -> anyhow::Result<Self> {
        let config = StoreConfig::from_env().context("failed to load store configuration")?;
        Self::connect(&config).await
    }

    pub async fn register_customer(
        &self,
        name: &str,
        email: &str,
    ) -> Result<Customer, OnboardingError> {
        match self {
            Storefront::InMemory(s) => s.onboarding.register(name, email).await,
            Storefront::Postgres(s) => s.onboarding.register(name, email).await,
        }
    }

    pub async fn list_product(
        &self,
        name: &str,
        price: Money,
        quantity: i64,
    ) -> Result<Product, ListingError> {
        match self {
            Storefront::InMemory(s) => s.listing.register(name, price, quantity).await,
            Storefront::Postgres(s) => s.listing.register(name, price, quantity).await,
        }
    }

    pub async fn place_order(&self, request: OrderRequest) -> Result<Order, PlacementError> {
        match self {
            Storefront::InMemory(s) => s.placement.place_order(request).await,
            Storefront::Postgres(s) => s.placement.place_order(request).await,
        }
    }

    pub async fn find_order(&self, order_id: OrderId) -> Result<Order, LookupError> {
        match self {
            Storefront::InMemory(s) => s.lookup.find_order(order_id).await,
            Storefront::Postgres(s) => s.lookup.find_order(order_id).await,
        }
    }
}
