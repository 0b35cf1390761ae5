//! Digraph algebra and greedy divisive clustering

pub mod greedy;
pub mod operations;
mod split;
mod stack;

pub use greedy::{greedy_break_clustering, greedy_clustering, greedy_clustering_into};
pub use operations::{
    adjacency_product, adjacency_product_in, transpose, transpose_in, union, union_in,
};
