//! Orders domain module.
//!
//! Order records, order requests and the placement planner that turns a
//! request plus current catalog state into priced line items and stock
//! decrements. Deterministic domain logic only (no IO, no storage).

pub mod error;
pub mod order;
pub mod placement;

pub use error::OrderError;
pub use order::{NewOrder, Order, OrderItemRequest, OrderLineItem, OrderRequest};
pub use placement::{PlacementPlan, plan_placement};
