//! Arc storage allocation for digraph writers
//!
//! The digraph algebra sizes its output optimistically and falls back to an
//! exact count when that allocation is refused. Allocation goes through
//! [`ArcAllocator`] so callers can impose an arc budget per digraph.

use super::Digraph;
use crate::error::{Error, Result};

/// Source of fresh digraph storage
pub trait ArcAllocator {
    /// Allocate a digraph over `vertices` vertices with room for `capacity` arcs
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be provided.
    fn allocate(&self, vertices: usize, capacity: usize) -> Result<Digraph>;
}

/// Heap allocation with fallible reservation
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapAllocator;

impl ArcAllocator for HeapAllocator {
    fn allocate(&self, vertices: usize, capacity: usize) -> Result<Digraph> {
        Digraph::init(vertices, capacity)
    }
}

/// Heap allocation that refuses any request above `max_arcs` arcs
///
/// # Example
///
/// ```
/// use trueno_cluster::{ArcAllocator, CappedAllocator};
///
/// let alloc = CappedAllocator::new(8);
/// assert!(alloc.allocate(4, 8).is_ok());
/// assert!(alloc.allocate(4, 9).is_err());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct CappedAllocator {
    max_arcs: usize,
}

impl CappedAllocator {
    /// Create an allocator with an arc budget
    #[must_use]
    pub const fn new(max_arcs: usize) -> Self {
        Self { max_arcs }
    }

    /// Arc budget per allocation
    #[must_use]
    pub const fn max_arcs(&self) -> usize {
        self.max_arcs
    }
}

impl ArcAllocator for CappedAllocator {
    fn allocate(&self, vertices: usize, capacity: usize) -> Result<Digraph> {
        if capacity > self.max_arcs {
            return Err(Error::allocation("arcs", capacity));
        }
        Digraph::init(vertices, capacity)
    }
}

impl<A: ArcAllocator + ?Sized> ArcAllocator for &A {
    fn allocate(&self, vertices: usize, capacity: usize) -> Result<Digraph> {
        (**self).allocate(vertices, capacity)
    }
}
