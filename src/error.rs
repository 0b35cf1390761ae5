//! Error types for digraph algebra and clustering
//!
//! Every fallible operation returns one of these as a value. There is no
//! process-wide "last error" slot; the variant and its fields carry all the
//! context a caller needs for a message.

use thiserror::Error;

/// Errors produced by a [`DataSource`](crate::DataSource) query.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DataSourceError {
    /// A point id was outside the data set.
    #[error("point {index} is out of bounds for a data set of {len} points")]
    OutOfBounds {
        /// Offending point id
        index: usize,
        /// Number of points in the data set
        len: usize,
    },

    /// Two points had different dimensionality.
    #[error("dimension mismatch: left={left}, right={right}")]
    DimensionMismatch {
        /// Dimension of the left operand
        left: usize,
        /// Dimension of the right operand
        right: usize,
    },

    /// The oracle returned an answer the clustering engine cannot use.
    #[error("invalid distance query response: {0}")]
    InvalidResponse(String),

    /// Failure reported by an external distance backend.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Crate error type.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// A null digraph was passed where a valid one is required.
    #[error("input digraph is null")]
    NullDigraph,

    /// Digraphs combined by an operation disagree on vertex count.
    #[error("digraph vertex counts differ: expected {expected}, found {found}")]
    VertexCountMismatch {
        /// Vertex count of the first operand
        expected: usize,
        /// Vertex count of the offending operand
        found: usize,
    },

    /// `force_diagonal` and `ignore_diagonal` were both requested.
    #[error("force_diagonal and ignore_diagonal are mutually exclusive")]
    ConflictingDiagonalFlags,

    /// Raw CSR parts violate the digraph invariants.
    #[error("invalid digraph: {0}")]
    InvalidDigraph(String),

    /// Vertex id outside the digraph.
    #[error("vertex {vertex} out of bounds for {vertices} vertices")]
    VertexOutOfBounds {
        /// Offending vertex id
        vertex: u32,
        /// Vertex count of the digraph
        vertices: usize,
    },

    /// Size constraint below two.
    #[error("size constraint must be at least 2 (got {got})")]
    InvalidSizeConstraint {
        /// Requested size constraint
        got: usize,
    },

    /// The data set cannot satisfy the requested clustering.
    #[error("data set has {points} points but at least {required} are required")]
    TooFewPoints {
        /// Points available
        points: usize,
        /// Points required
        required: usize,
    },

    /// The clustering problem does not fit the vertex id type.
    #[error("clustering problem is too large: {points} points")]
    TooLargeProblem {
        /// Points requested
        points: usize,
    },

    /// An input clustering is inconsistent.
    #[error("invalid clustering: {0}")]
    InvalidClustering(String),

    /// Caller-supplied label buffer has the wrong length.
    #[error("label buffer has length {len} but the data set has {points} points")]
    LabelBufferMismatch {
        /// Buffer length
        len: usize,
        /// Points in the data set
        points: usize,
    },

    /// Memory could not be reserved.
    #[error("cannot allocate memory for {items} {what}")]
    Allocation {
        /// What was being allocated
        what: &'static str,
        /// Number of elements requested
        items: usize,
    },

    /// The distance oracle failed.
    #[error("failed to calculate distances: {0}")]
    Query(#[from] DataSourceError),

    /// More clusters were produced than labels are available.
    #[error("cluster label space exhausted after {limit} clusters")]
    LabelSpaceExhausted {
        /// Number of labels available
        limit: u32,
    },
}

impl Error {
    pub(crate) const fn allocation(what: &'static str, items: usize) -> Self {
        Self::Allocation { what, items }
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Reserve exactly `additional` slots in `vec`, mapping failure to [`Error::Allocation`].
pub(crate) fn try_reserve<T>(vec: &mut Vec<T>, additional: usize, what: &'static str) -> Result<()> {
    vec.try_reserve_exact(additional)
        .map_err(|_| Error::allocation(what, additional))
}

/// Allocate a vector of `len` copies of `value` without aborting on exhaustion.
pub(crate) fn try_filled<T: Clone>(len: usize, value: T, what: &'static str) -> Result<Vec<T>> {
    let mut vec = Vec::new();
    try_reserve(&mut vec, len, what)?;
    vec.resize(len, value);
    Ok(vec)
}
