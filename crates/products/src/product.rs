use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{DomainError, DomainResult, Entity, Money, ProductId};

/// A catalog product.
///
/// `quantity` is the available-to-sell stock. It never goes negative: every
/// decrement is computed through [`Product::remaining_after`] and re-checked by
/// the store when applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Stock left after taking `requested` units, or `None` if there is not
    /// enough stock (or the arithmetic would overflow).
    pub fn remaining_after(&self, requested: i64) -> Option<i64> {
        self.quantity
            .checked_sub(requested)
            .filter(|remaining| *remaining >= 0)
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// Validated input for listing a new product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    name: String,
    price: Money,
    quantity: i64,
}

impl NewProduct {
    pub fn new(name: impl Into<String>, price: Money, quantity: i64) -> DomainResult<Self> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if quantity < 0 {
            return Err(DomainError::validation("quantity cannot be negative"));
        }

        Ok(Self {
            name,
            price,
            quantity,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price(&self) -> Money {
        self.price
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn into_product(self, id: ProductId, created_at: DateTime<Utc>) -> Product {
        Product {
            id,
            name: self.name,
            price: self.price,
            quantity: self.quantity,
            created_at,
        }
    }
}

/// A stock decrement computed for one product.
///
/// `quantity` is the number of units to take; `remaining` is the stock level
/// the decrement was computed against. Stores apply the decrement
/// conditionally (`stock >= quantity` at write time) rather than blindly
/// writing `remaining`, so a stale read cannot overdraw stock.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockUpdate {
    pub product_id: ProductId,
    pub quantity: i64,
    pub remaining: i64,
}
