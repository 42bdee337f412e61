//! Postgres-backed storage adapter.
//!
//! ## Error Mapping
//!
//! | PostgreSQL Error Code | StoreError | Scenario |
//! |-----------------------|------------|----------|
//! | `23505` | `UniqueViolation` | Duplicate email or product name |
//! | `23503` | `NotFound` | Order references a missing customer/product |
//! | `23514` | `Database` | Check constraint (negative stock/price) |
//! | other / pool / io | `Database` | Connection failures and the like |
//!
//! Stock decrements are conditional (`... WHERE quantity >= $n`), so two
//! transactions racing for the last units cannot both succeed: the loser sees
//! zero affected rows and reports [`StoreError::StockConflict`]. Rows are
//! always locked in product id order, so batches touching the same products
//! in different orders queue behind each other instead of deadlocking.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, Row, Transaction};
use tracing::{Span, instrument};
use uuid::Uuid;

use storefront_core::{CustomerId, Money, OrderId, ProductId};
use storefront_customers::{Customer, NewCustomer};
use storefront_orders::{NewOrder, Order, OrderLineItem};
use storefront_products::{NewProduct, Product, StockUpdate};

use super::{
    CustomerLookup, OrderRepository, OrderTransaction, ProductCatalog, StoreError,
    ensure_positive_decrements,
};

/// Postgres implementation of every storage port.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a connection pool against `database_url`.
    #[instrument(skip(database_url), err)]
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply the embedded schema migrations.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&*self.pool)
            .await
            .map_err(|e| StoreError::Database {
                operation: "migrate",
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl CustomerLookup for PostgresStore {
    #[instrument(skip(self), fields(operation = tracing::field::Empty), err)]
    async fn find_by_email(&self, email: &str) -> Result<Option<Customer>, StoreError> {
        Span::current().record("operation", "find_customer_by_email");

        let row = sqlx::query(
            r#"
            SELECT id, name, email, created_at
            FROM customers
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_customer_by_email", e))?;

        row.map(|r| decode::<CustomerRow>(&r).map(Customer::from))
            .transpose()
    }

    #[instrument(skip(self), fields(customer_id = %id), err)]
    async fn find_by_id(&self, id: CustomerId) -> Result<Option<Customer>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, email, created_at
            FROM customers
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_customer_by_id", e))?;

        row.map(|r| decode::<CustomerRow>(&r).map(Customer::from))
            .transpose()
    }

    #[instrument(skip(self, customer), fields(email = %customer.email()), err)]
    async fn create(&self, customer: NewCustomer) -> Result<Customer, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO customers (id, name, email)
            VALUES ($1, $2, $3)
            RETURNING id, name, email, created_at
            "#,
        )
        .bind(CustomerId::new().as_uuid())
        .bind(customer.name())
        .bind(customer.email())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::UniqueViolation(format!("customers.email = {}", customer.email()))
            } else {
                map_sqlx_error("create_customer", e)
            }
        })?;

        decode::<CustomerRow>(&row).map(Customer::from)
    }
}

#[async_trait]
impl ProductCatalog for PostgresStore {
    #[instrument(skip(self, ids), fields(requested = ids.len(), found = tracing::field::Empty), err)]
    async fn find_all_by_id(&self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
        let ids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let rows = sqlx::query(
            r#"
            SELECT id, name, price, quantity, created_at
            FROM products
            WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_products_by_id", e))?;

        let mut products = Vec::with_capacity(rows.len());
        for row in rows {
            products.push(Product::try_from(decode::<ProductRow>(&row)?)?);
        }

        Span::current().record("found", products.len());
        Ok(products)
    }

    #[instrument(skip(self), err)]
    async fn find_by_name(&self, name: &str) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, price, quantity, created_at
            FROM products
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_product_by_name", e))?;

        row.map(|r| decode::<ProductRow>(&r).and_then(Product::try_from))
            .transpose()
    }

    #[instrument(skip(self, product), fields(name = %product.name()), err)]
    async fn create(&self, product: NewProduct) -> Result<Product, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO products (id, name, price, quantity)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, price, quantity, created_at
            "#,
        )
        .bind(ProductId::new().as_uuid())
        .bind(product.name())
        .bind(product.price().amount())
        .bind(product.quantity())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::UniqueViolation(format!("products.name = {}", product.name()))
            } else {
                map_sqlx_error("create_product", e)
            }
        })?;

        Product::try_from(decode::<ProductRow>(&row)?)
    }

    #[instrument(skip(self, updates), fields(update_count = updates.len()), err)]
    async fn update_quantities(&self, updates: &[StockUpdate]) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        // On error the transaction is dropped, which rolls it back.
        apply_stock_updates(&mut tx, updates).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }
}

#[async_trait]
impl OrderRepository for PostgresStore {
    type Transaction = PostgresTransaction;

    #[instrument(skip(self), err)]
    async fn begin(&self) -> Result<Self::Transaction, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(PostgresTransaction { tx })
    }

    #[instrument(skip(self), fields(order_id = %id), err)]
    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let Some(order_row) = sqlx::query(
            r#"
            SELECT id, customer_id, created_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_order", e))?
        else {
            return Ok(None);
        };
        let order_row = decode::<OrderRow>(&order_row)?;

        let item_rows = sqlx::query(
            r#"
            SELECT product_id, price, quantity
            FROM order_items
            WHERE order_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_order_items", e))?;

        let mut line_items = Vec::with_capacity(item_rows.len());
        for row in item_rows {
            line_items.push(OrderLineItem::try_from(decode::<OrderItemRow>(&row)?)?);
        }

        Ok(Some(Order {
            id: OrderId::from_uuid(order_row.id),
            customer_id: CustomerId::from_uuid(order_row.customer_id),
            line_items,
            created_at: order_row.created_at,
        }))
    }
}

/// A live database transaction for one order placement.
///
/// Dropping it without calling [`commit`](OrderTransaction::commit) rolls the
/// transaction back.
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl OrderTransaction for PostgresTransaction {
    #[instrument(
        skip(self, order),
        fields(customer_id = %order.customer_id, line_count = order.line_items.len()),
        err
    )]
    async fn create_order(&mut self, order: NewOrder) -> Result<Order, StoreError> {
        let id = OrderId::new();
        let created_at: DateTime<Utc> = sqlx::query_scalar(
            r#"
            INSERT INTO orders (id, customer_id)
            VALUES ($1, $2)
            RETURNING created_at
            "#,
        )
        .bind(id.as_uuid())
        .bind(order.customer_id.as_uuid())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("create_order", e))?;

        for (position, line) in order.line_items.iter().enumerate() {
            let position = i32::try_from(position).map_err(|_| StoreError::Database {
                operation: "create_order_item",
                message: format!("line position {position} out of range"),
            })?;

            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, product_id, position, price, quantity)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(Uuid::now_v7())
            .bind(id.as_uuid())
            .bind(line.product_id.as_uuid())
            .bind(position)
            .bind(line.unit_price.amount())
            .bind(line.quantity)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("create_order_item", e))?;
        }

        Ok(order.into_order(id, created_at))
    }

    #[instrument(skip(self, updates), fields(update_count = updates.len()), err)]
    async fn update_quantities(&mut self, updates: &[StockUpdate]) -> Result<(), StoreError> {
        apply_stock_updates(&mut self.tx, updates).await
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

/// Conditionally decrement stock, one product at a time in id order, on `conn`.
async fn apply_stock_updates(
    conn: &mut PgConnection,
    updates: &[StockUpdate],
) -> Result<(), StoreError> {
    ensure_positive_decrements(updates)?;

    let mut ordered: Vec<&StockUpdate> = updates.iter().collect();
    ordered.sort_by_key(|u| u.product_id);

    for update in ordered {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET quantity = quantity - $2, updated_at = now()
            WHERE id = $1 AND quantity >= $2
            "#,
        )
        .bind(update.product_id.as_uuid())
        .bind(update.quantity)
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("update_quantity", e))?;

        if result.rows_affected() == 0 {
            let available: Option<i64> =
                sqlx::query_scalar("SELECT quantity FROM products WHERE id = $1")
                    .bind(update.product_id.as_uuid())
                    .fetch_optional(&mut *conn)
                    .await
                    .map_err(|e| map_sqlx_error("read_quantity", e))?;

            return Err(match available {
                Some(available) => StoreError::StockConflict {
                    product_id: update.product_id,
                    requested: update.quantity,
                    available,
                },
                None => StoreError::NotFound(format!("product {}", update.product_id)),
            });
        }
    }
    Ok(())
}

fn decode<T>(row: &PgRow) -> Result<T, StoreError>
where
    T: for<'r> FromRow<'r, PgRow>,
{
    T::from_row(row).map_err(|e| StoreError::Decode(e.to_string()))
}

fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let message = db_err.message().to_string();
            match db_err.code().as_deref() {
                Some("23505") => StoreError::UniqueViolation(message),
                Some("23503") => StoreError::NotFound(message),
                _ => StoreError::Database { operation, message },
            }
        }
        sqlx::Error::PoolClosed => StoreError::Database {
            operation,
            message: "connection pool closed".to_string(),
        },
        other => StoreError::Database {
            operation,
            message: other.to_string(),
        },
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().as_deref() == Some("23505");
    }
    false
}

// SQLx row types

#[derive(Debug)]
struct CustomerRow {
    id: Uuid,
    name: String,
    email: String,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for CustomerRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(CustomerRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Customer {
            id: CustomerId::from_uuid(row.id),
            name: row.name,
            email: row.email,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug)]
struct ProductRow {
    id: Uuid,
    name: String,
    price: Decimal,
    quantity: i64,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for ProductRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ProductRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            price: row.try_get("price")?,
            quantity: row.try_get("quantity")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl TryFrom<ProductRow> for Product {
    type Error = StoreError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Product {
            id: ProductId::from_uuid(row.id),
            name: row.name,
            price: Money::new(row.price).map_err(|e| StoreError::Decode(e.to_string()))?,
            quantity: row.quantity,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug)]
struct OrderRow {
    id: Uuid,
    customer_id: Uuid,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for OrderRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(OrderRow {
            id: row.try_get("id")?,
            customer_id: row.try_get("customer_id")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[derive(Debug)]
struct OrderItemRow {
    product_id: Uuid,
    price: Decimal,
    quantity: i64,
}

impl<'r> FromRow<'r, PgRow> for OrderItemRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(OrderItemRow {
            product_id: row.try_get("product_id")?,
            price: row.try_get("price")?,
            quantity: row.try_get("quantity")?,
        })
    }
}

impl TryFrom<OrderItemRow> for OrderLineItem {
    type Error = StoreError;

    fn try_from(row: OrderItemRow) -> Result<Self, Self::Error> {
        Ok(OrderLineItem {
            product_id: ProductId::from_uuid(row.product_id),
            unit_price: Money::new(row.price).map_err(|e| StoreError::Decode(e.to_string()))?,
            quantity: row.quantity,
        })
    }
}
