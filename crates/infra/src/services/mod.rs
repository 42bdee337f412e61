//! Application services.
//!
//! Each service takes its storage ports by value (usually `Arc`s) and maps
//! store failures into its own error type. None of them performs IO except
//! through those ports.

pub mod customer_onboarding;
pub mod order_lookup;
pub mod order_placement;
pub mod product_listing;

pub use customer_onboarding::{CustomerOnboarding, OnboardingError};
pub use order_lookup::{LookupError, OrderLookup};
pub use order_placement::{OrderPlacement, PlacementError};
pub use product_listing::{ListingError, ProductListing};
