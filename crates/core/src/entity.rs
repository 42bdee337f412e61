//! Entity trait: identity + continuity across state changes.

use std::collections::HashMap;

/// Entity marker + minimal interface.
///
/// Customers, products and orders are all entities: two records with the same
/// id describe the same thing, even when other attributes differ.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;
}

/// Index a slice of entities by id. Later duplicates win.
pub fn index_by_id<E: Entity>(entities: &[E]) -> HashMap<E::Id, &E> {
    entities.iter().map(|e| (e.id(), e)).collect()
}
