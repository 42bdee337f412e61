//! Customers domain module.
//!
//! Customer records and the validated input used to create them. Pure data and
//! validation only (no IO, no storage).

pub mod customer;

pub use customer::{Customer, NewCustomer};
