//! trueno-cluster: size-constrained clustering over sparse digraphs
//!
//! # Overview
//!
//! trueno-cluster partitions a set of points into clusters that each hold at
//! least `size_constraint` points, using nothing but distance queries against
//! a [`DataSource`]. It also provides the CSR digraph algebra (union,
//! transpose, two-hop adjacency product) used to post-process neighbor graphs.
//!
//! # Quick Start
//!
//! ```
//! use trueno_cluster::{greedy_clustering, DenseDataSet, GreedyConfig, NodeId};
//!
//! # fn example() -> trueno_cluster::Result<()> {
//! // Two well-separated pairs on a line
//! let data = DenseDataSet::new(1, vec![0.0, 0.1, 10.0, 10.1])?;
//!
//! let config = GreedyConfig::new(2)?;
//! let clustering = greedy_clustering(&data, &config)?;
//!
//! assert_eq!(clustering.num_clusters(), 2);
//! assert_eq!(clustering.label(NodeId(0)), clustering.label(NodeId(1)));
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! ```
//! use trueno_cluster::{adjacency_product, transpose, union, Digraph};
//!
//! let a = Digraph::from_arcs(3, &[(0, 1), (1, 2)]).unwrap();
//! let b = transpose(&a).unwrap();
//!
//! let both = union(&[&a, &b]).unwrap();
//! assert_eq!(both.num_arcs(), 4);
//!
//! // Two hops: 0 → 1 → 2
//! let two_hop = adjacency_product(&a, &a, false, false).unwrap();
//! assert_eq!(two_hop.head(), &[2]);
//! ```
//!
//! # Architecture
//!
//! - **Storage**: CSR digraphs with fallible, budgetable arc allocation
//! - **Algebra**: two-phase (bound, then exact count) output allocation
//! - **Clustering**: greedy divisive bisection around approximate diameters
//! - **Persistence**: Parquet-backed (feature `storage`)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod algorithms;
pub mod clustering;
pub mod config;
pub mod data;
pub mod error;
pub mod storage;

// Re-export core types
pub use algorithms::{
    adjacency_product, adjacency_product_in, greedy_break_clustering, greedy_clustering,
    greedy_clustering_into, transpose, transpose_in, union, union_in,
};
pub use clustering::{ClusterLabel, Clustering};
pub use config::{GreedyConfig, GreedyConfigBuilder};
pub use data::{DataSource, DenseDataSet, DistanceMatrix};
pub use storage::{ArcAllocator, CappedAllocator, Digraph, HeapAllocator, NodeId};

// Error type
pub use error::{DataSourceError, Error, Result};
