//! Products domain module (catalog).
//!
//! This crate contains the product record, its stock arithmetic and listing
//! validation, implemented as plain deterministic code (no IO, no storage).

pub mod product;

pub use product::{NewProduct, Product, StockUpdate};
