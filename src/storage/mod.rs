//! Digraph storage layer
//!
//! Provides CSR (Compressed Sparse Row) digraph representation, arc storage
//! allocation and Parquet persistence.

pub mod alloc;
pub mod csr;
#[cfg(feature = "storage")]
pub mod parquet;

pub use alloc::{ArcAllocator, CappedAllocator, HeapAllocator};
pub use csr::{Digraph, NodeId, MAX_VERTICES};
