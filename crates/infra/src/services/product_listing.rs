use thiserror::Error;
use tracing::{info, instrument, warn};

use storefront_core::{DomainError, Money};
use storefront_products::{NewProduct, Product};

use crate::store::{ProductCatalog, StoreError};

#[derive(Debug, Error)]
pub enum ListingError {
    #[error("a product named {0:?} already exists")]
    DuplicateName(String),

    #[error(transparent)]
    Invalid(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Adds products to the catalog under unique names.
#[derive(Debug, Clone)]
pub struct ProductListing<P> {
    products: P,
}

impl<P> ProductListing<P>
where
    P: ProductCatalog,
{
    pub fn new(products: P) -> Self {
        Self { products }
    }

    #[instrument(skip(self, name), fields(name = %name, price = %price), err)]
    pub async fn register(
        &self,
        name: &str,
        price: Money,
        quantity: i64,
    ) -> Result<Product, ListingError> {
        let new_product = NewProduct::new(name, price, quantity)?;

        if self
            .products
            .find_by_name(new_product.name())
            .await?
            .is_some()
        {
            warn!("product name already listed");
            return Err(ListingError::DuplicateName(new_product.name().to_string()));
        }

        let listed_name = new_product.name().to_string();
        let product = self
            .products
            .create(new_product)
            .await
            .map_err(|err| match err {
                StoreError::UniqueViolation(_) => ListingError::DuplicateName(listed_name),
                other => ListingError::Store(other),
            })?;

        info!(product_id = %product.id, "product listed");
        Ok(product)
    }
}
