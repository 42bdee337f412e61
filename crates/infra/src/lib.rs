//! Infrastructure layer: storage ports and adapters, application services,
//! configuration and wiring.

pub mod bootstrap;
pub mod config;
pub mod services;
pub mod store;


pub use bootstrap::{Services, Storefront};
pub use config::{StoreBackend, StoreConfig};
