//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have **no identity**: two instances with the same attribute
/// values are interchangeable. They are immutable; "changing" one means building
/// a new one.
///
/// - `Money { 10.00 }` is a value object
/// - `Customer { id: CustomerId(...), .. }` is an entity
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
