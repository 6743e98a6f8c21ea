//! Color sets and the colored k-mer index
//!
//! A color is a provenance label (a source genome or sample) given as an index into a color
//! universe of fixed size. The [`ColorSetStore`] deduplicates sets of colors and names each
//! distinct set with a [`ColorSetId`]; the [`ColorIndex`] maps canonical k-mers to those ids.

mod bitvector;
mod index;
mod store;
mod table;

use std::fmt;
use std::sync::Arc;

use auto_impl::auto_impl;

pub use bitvector::ColorBits;
pub use index::{ColorIndex, IndexStats};
pub use store::{ColorSetStore, StoreStats, MAX_UNIVERSE_SIZE};
pub use table::TableHeader;

use crate::Result;

/// Identifier of a stored color set, stable for the lifetime of its store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ColorSetId(pub u32);

impl ColorSetId {
    /// The empty color set, present in every store
    pub const EMPTY: Self = Self(0);

    /// The pre-seeded singleton set `{color}`
    #[must_use]
    pub fn primary(color: usize) -> Self {
        Self(color as u32 + 1)
    }

    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ColorSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Shared registry of color sets used while building an index
///
/// Implemented by [`ColorSetStore`] and forwarded through `&T` and `Arc<T>`, so producer
/// threads can hold either a borrowed or a reference-counted handle to the same store.
#[auto_impl(&, Arc)]
pub trait ColorRegistry: Send + Sync {
    /// Width of every color set in the registry
    fn universe_size(&self) -> usize;

    /// Number of stored color sets
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the id of `bits`, storing it if it is new
    fn get_or_create(&self, bits: &ColorBits) -> Result<ColorSetId>;

    /// Returns the id of the set named by `id` with `color` added
    fn add_color(&self, id: ColorSetId, color: usize) -> Result<ColorSetId>;

    /// Read-only view of the set named by `id`
    fn get(&self, id: ColorSetId) -> Result<Arc<ColorBits>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve<R: ColorRegistry>(registry: R, color: usize) -> ColorSetId {
        registry.add_color(ColorSetId::EMPTY, color).unwrap()
    }

    #[test]
    fn test_primary_ids() {
        assert_eq!(ColorSetId::primary(0), ColorSetId(1));
        assert_eq!(ColorSetId::primary(9).index(), 10);
        assert_eq!(ColorSetId::default(), ColorSetId::EMPTY);
        assert_eq!(ColorSetId(7).to_string(), "7");
    }

    #[test]
    fn test_registry_through_handles() {
        let store = Arc::new(ColorSetStore::new(3).unwrap());
        assert_eq!(resolve(&*store, 2), ColorSetId(3));
        assert_eq!(resolve(Arc::clone(&store), 1), ColorSetId(2));
        assert!(!ColorRegistry::is_empty(&store));
    }
}
