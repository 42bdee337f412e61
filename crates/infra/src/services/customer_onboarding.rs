use thiserror::Error;
use tracing::{info, instrument, warn};

use storefront_core::DomainError;
use storefront_customers::{Customer, NewCustomer};

use crate::store::{CustomerLookup, StoreError};

#[derive(Debug, Error)]
pub enum OnboardingError {
    #[error("a customer with email {0} already exists")]
    DuplicateEmail(String),

    #[error(transparent)]
    Invalid(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Registers customers, keeping email addresses unique.
#[derive(Debug, Clone)]
pub struct CustomerOnboarding<C> {
    customers: C,
}

impl<C> CustomerOnboarding<C>
where
    C: CustomerLookup,
{
    pub fn new(customers: C) -> Self {
        Self { customers }
    }

    /// Create a customer unless the email is already taken.
    ///
    /// The email is compared verbatim (no case folding, no format check).
    #[instrument(skip(self, name), fields(email = %email), err)]
    pub async fn register(&self, name: &str, email: &str) -> Result<Customer, OnboardingError> {
        let new_customer = NewCustomer::new(name, email)?;

        if self.customers.find_by_email(email).await?.is_some() {
            warn!("email already registered");
            return Err(OnboardingError::DuplicateEmail(email.to_string()));
        }

        // A concurrent registration can still win the race; the store's
        // uniqueness constraint is the final word.
        let customer = self
            .customers
            .create(new_customer)
            .await
            .map_err(|err| match err {
                StoreError::UniqueViolation(_) => OnboardingError::DuplicateEmail(email.to_string()),
                other => OnboardingError::Store(other),
            })?;

        info!(customer_id = %customer.id, "customer registered");
        Ok(customer)
    }
}
