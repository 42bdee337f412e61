use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{CustomerId, DomainError, DomainResult, Entity};

/// A registered customer.
///
/// Customers are created once through onboarding and never mutated afterwards.
/// `email` is the natural key: at most one customer exists per exact email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl Entity for Customer {
    type Id = CustomerId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// Validated input for creating a customer.
///
/// The email is treated as an opaque key: no format validation, no case
/// folding. Only the display name is checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCustomer {
    name: String,
    email: String,
}

impl NewCustomer {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> DomainResult<Self> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        Ok(Self {
            name,
            email: email.into(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// Materialize the record the store will persist.
    pub fn into_customer(self, id: CustomerId, created_at: DateTime<Utc>) -> Customer {
        Customer {
            id,
            name: self.name,
            email: self.email,
            created_at,
        }
    }
}
