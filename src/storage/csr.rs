//! CSR (Compressed Sparse Row) digraph representation
//!
//! # CSR Format
//!
//! ```text
//! Digraph: 0 → 1, 0 → 2, 1 → 2
//!
//! CSR:
//!   tail_ptr: [0, 2, 3, 3]  // Vertex 0: arcs [0..2), Vertex 1: [2..3), Vertex 2: [3..3)
//!   head:     [1, 2, 2]     // Arc 0 → vertex 1, arc 1 → vertex 2, arc 2 → vertex 2
//! ```
//!
//! A digraph exclusively owns its `tail_ptr` and `head` storage. The *null*
//! digraph carries no `tail_ptr` at all and stands for "no digraph"; it is
//! distinct from an empty digraph, which is valid and simply has no arcs.

use crate::error::{try_filled, try_reserve, Error, Result};

/// Vertex identifier (zero-indexed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(pub u32);

/// Largest vertex count a digraph may have.
///
/// `u32::MAX` itself is reserved as the "unset" row marker in the algebra.
pub const MAX_VERTICES: usize = u32::MAX as usize;

/// Sparse directed graph in CSR form
///
/// # Example
///
/// ```
/// use trueno_cluster::{Digraph, NodeId};
///
/// let dg = Digraph::from_arcs(3, &[(0, 1), (0, 2), (1, 2)]).unwrap();
///
/// assert_eq!(dg.num_arcs(), 3);
/// assert_eq!(dg.out_neighbors(NodeId(0)).unwrap(), &[1, 2]);
/// ```
#[derive(Debug, Clone)]
pub struct Digraph {
    /// Number of vertices
    vertices: usize,

    /// Row offsets: vertex v's arcs are `head[tail_ptr[v]..tail_ptr[v + 1]]`
    /// Length: `vertices` + 1, or `None` for the null digraph
    tail_ptr: Option<Vec<usize>>,

    /// Arc heads
    /// Length: `tail_ptr[vertices]`
    head: Vec<u32>,

    /// Arcs the head storage was sized for
    max_arcs: usize,
}

impl Digraph {
    /// Allocate a digraph over `vertices` vertices with room for `capacity` arcs
    ///
    /// Row offsets start out zero; writers fill them in as rows are produced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDigraph`] if `vertices` exceeds [`MAX_VERTICES`]
    /// and [`Error::Allocation`] if storage cannot be reserved.
    pub fn init(vertices: usize, capacity: usize) -> Result<Self> {
        if vertices > MAX_VERTICES {
            return Err(Error::InvalidDigraph(format!(
                "{vertices} vertices exceeds the maximum of {MAX_VERTICES}"
            )));
        }

        let tail_ptr = try_filled(vertices + 1, 0_usize, "row offsets")?;
        let mut head = Vec::new();
        try_reserve(&mut head, capacity, "arcs")?;

        Ok(Self {
            vertices,
            tail_ptr: Some(tail_ptr),
            head,
            max_arcs: capacity,
        })
    }

    /// Create a valid digraph with no arcs and room for `capacity` arcs
    ///
    /// # Errors
    ///
    /// Same as [`Digraph::init`].
    pub fn empty(vertices: usize, capacity: usize) -> Result<Self> {
        let mut dg = Self::init(vertices, capacity)?;
        if let Some(tail_ptr) = dg.tail_ptr.as_mut() {
            tail_ptr.fill(0);
        }
        Ok(dg)
    }

    /// The null digraph sentinel
    #[must_use]
    pub const fn null() -> Self {
        Self {
            vertices: 0,
            tail_ptr: None,
            head: Vec::new(),
            max_arcs: 0,
        }
    }

    /// Digraph where every vertex has exactly `arcs_per_vertex` arcs
    ///
    /// Vertex `v` points to `heads[v * arcs_per_vertex..(v + 1) * arcs_per_vertex]`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDigraph`] if `heads` has the wrong length or
    /// names a vertex outside the digraph.
    pub fn balanced(vertices: usize, arcs_per_vertex: usize, heads: Vec<u32>) -> Result<Self> {
        let arcs = vertices
            .checked_mul(arcs_per_vertex)
            .ok_or_else(|| Error::InvalidDigraph("arc count overflows".to_string()))?;
        if heads.len() != arcs {
            return Err(Error::InvalidDigraph(format!(
                "expected {arcs} heads for a balanced digraph, got {}",
                heads.len()
            )));
        }

        let mut dg = Self::init(vertices, 0)?;
        check_heads(&heads, vertices)?;
        if let Some(tail_ptr) = dg.tail_ptr.as_mut() {
            for (v, offset) in tail_ptr.iter_mut().enumerate() {
                *offset = v * arcs_per_vertex;
            }
        }
        dg.head = heads;
        dg.max_arcs = arcs;

        Ok(dg)
    }

    /// Build a digraph from per-vertex out-neighbor lists
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDigraph`] if any head is out of range.
    pub fn from_adjacency(adjacency: &[Vec<u32>]) -> Result<Self> {
        let vertices = adjacency.len();
        let arcs = adjacency.iter().map(Vec::len).sum();

        let mut dg = Self::init(vertices, arcs)?;
        let Some(tail_ptr) = dg.tail_ptr.as_mut() else {
            return Err(Error::NullDigraph);
        };

        for (v, neighbors) in adjacency.iter().enumerate() {
            check_heads(neighbors, vertices)?;
            dg.head.extend_from_slice(neighbors);
            tail_ptr[v + 1] = dg.head.len();
        }

        Ok(dg)
    }

    /// Build a digraph from an arc list
    ///
    /// Arcs keep their relative order within each tail's row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDigraph`] if any endpoint is out of range.
    pub fn from_arcs(vertices: usize, arcs: &[(u32, u32)]) -> Result<Self> {
        let mut dg = Self::init(vertices, arcs.len())?;
        let Some(tail_ptr) = dg.tail_ptr.as_mut() else {
            return Err(Error::NullDigraph);
        };

        for &(tail, head) in arcs {
            check_heads(&[tail, head], vertices)?;
            tail_ptr[tail as usize + 1] += 1;
        }
        for v in 1..=vertices {
            tail_ptr[v] += tail_ptr[v - 1];
        }

        let mut cursor = tail_ptr.clone();
        dg.head.resize(arcs.len(), 0);
        for &(tail, head) in arcs {
            let slot = &mut cursor[tail as usize];
            dg.head[*slot] = head;
            *slot += 1;
        }

        Ok(dg)
    }

    /// Assemble a digraph from raw CSR parts
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDigraph`] if the parts violate the CSR invariants.
    pub fn from_parts(vertices: usize, tail_ptr: Vec<usize>, head: Vec<u32>) -> Result<Self> {
        if vertices > MAX_VERTICES {
            return Err(Error::InvalidDigraph(format!(
                "{vertices} vertices exceeds the maximum of {MAX_VERTICES}"
            )));
        }
        if tail_ptr.len() != vertices + 1 {
            return Err(Error::InvalidDigraph(format!(
                "tail_ptr has length {} but {} vertices need {}",
                tail_ptr.len(),
                vertices,
                vertices + 1
            )));
        }
        if tail_ptr[0] != 0 {
            return Err(Error::InvalidDigraph("tail_ptr[0] must be 0".to_string()));
        }
        if tail_ptr.windows(2).any(|w| w[0] > w[1]) {
            return Err(Error::InvalidDigraph(
                "tail_ptr must be non-decreasing".to_string(),
            ));
        }
        if tail_ptr[vertices] != head.len() {
            return Err(Error::InvalidDigraph(format!(
                "tail_ptr ends at {} but {} heads were given",
                tail_ptr[vertices],
                head.len()
            )));
        }
        check_heads(&head, vertices)?;

        let max_arcs = head.len();
        Ok(Self {
            vertices,
            tail_ptr: Some(tail_ptr),
            head,
            max_arcs,
        })
    }

    /// Resize arc storage to exactly `new_capacity` arcs
    ///
    /// Used after a writer finishes to release over-allocation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NullDigraph`] for the null digraph,
    /// [`Error::InvalidDigraph`] if `new_capacity` is below the arcs already
    /// written, and [`Error::Allocation`] if growing fails.
    pub fn change_capacity(&mut self, new_capacity: usize) -> Result<()> {
        if self.is_null() {
            return Err(Error::NullDigraph);
        }
        if new_capacity < self.head.len() {
            return Err(Error::InvalidDigraph(format!(
                "cannot shrink storage to {new_capacity} arcs, {} are in use",
                self.head.len()
            )));
        }

        if new_capacity <= self.head.capacity() {
            self.head.shrink_to(new_capacity);
        } else {
            let additional = new_capacity - self.head.len();
            try_reserve(&mut self.head, additional, "arcs")?;
        }
        self.max_arcs = new_capacity;

        Ok(())
    }

    /// Is this the null digraph?
    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.tail_ptr.is_none()
    }

    /// Check every CSR invariant
    ///
    /// The null digraph is never valid.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let Some(tail_ptr) = self.tail_ptr.as_deref() else {
            return false;
        };

        tail_ptr.len() == self.vertices + 1
            && tail_ptr[0] == 0
            && tail_ptr.windows(2).all(|w| w[0] <= w[1])
            && tail_ptr[self.vertices] == self.head.len()
            && self.head.len() <= self.max_arcs
            && self.head.iter().all(|&h| (h as usize) < self.vertices)
    }

    /// Get number of vertices
    #[must_use]
    pub const fn vertices(&self) -> usize {
        self.vertices
    }

    /// Get number of arcs
    #[must_use]
    pub fn num_arcs(&self) -> usize {
        self.head.len()
    }

    /// Arcs the storage is sized for
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.max_arcs
    }

    /// Row offsets (empty for the null digraph)
    #[must_use]
    pub fn tail_ptr(&self) -> &[usize] {
        self.tail_ptr.as_deref().unwrap_or(&[])
    }

    /// Arc heads
    #[must_use]
    pub fn head(&self) -> &[u32] {
        &self.head
    }

    /// Get out-neighbors of a vertex
    ///
    /// # Errors
    ///
    /// Returns error for the null digraph or an out-of-range vertex
    pub fn out_neighbors(&self, vertex: NodeId) -> Result<&[u32]> {
        if self.is_null() {
            return Err(Error::NullDigraph);
        }
        if (vertex.0 as usize) >= self.vertices {
            return Err(Error::VertexOutOfBounds {
                vertex: vertex.0,
                vertices: self.vertices,
            });
        }

        Ok(self.row(vertex.0 as usize))
    }

    /// Iterate over rows as (`vertex`, out-neighbors)
    pub fn rows(&self) -> impl Iterator<Item = (u32, &[u32])> + '_ {
        let vertices = if self.is_null() { 0 } else { self.vertices };
        (0..vertices).map(move |v| {
            #[allow(clippy::cast_possible_truncation)] // vertices <= MAX_VERTICES
            (v as u32, self.row(v))
        })
    }

    /// Unchecked row access for the algebra; empty for the null digraph.
    pub(crate) fn row(&self, v: usize) -> &[u32] {
        match self.tail_ptr.as_deref() {
            Some(tail_ptr) => &self.head[tail_ptr[v]..tail_ptr[v + 1]],
            None => &[],
        }
    }

    pub(crate) fn row_len(&self, v: usize) -> usize {
        self.tail_ptr
            .as_deref()
            .map_or(0, |tail_ptr| tail_ptr[v + 1] - tail_ptr[v])
    }

    /// Mutable CSR storage for writers.
    pub(crate) fn storage_mut(&mut self) -> Result<(&mut [usize], &mut Vec<u32>)> {
        match self.tail_ptr.as_mut() {
            Some(tail_ptr) => Ok((tail_ptr.as_mut_slice(), &mut self.head)),
            None => Err(Error::NullDigraph),
        }
    }
}

impl Default for Digraph {
    fn default() -> Self {
        Self::null()
    }
}

/// Digraphs compare by structure; spare capacity is ignored.
impl PartialEq for Digraph {
    fn eq(&self, other: &Self) -> bool {
        self.vertices == other.vertices && self.tail_ptr == other.tail_ptr && self.head == other.head
    }
}

impl Eq for Digraph {}

fn check_heads(heads: &[u32], vertices: usize) -> Result<()> {
    match heads.iter().find(|&&h| (h as usize) >= vertices) {
        Some(&vertex) => Err(Error::VertexOutOfBounds { vertex, vertices }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_digraph() {
        let dg = Digraph::init(10, 0).unwrap();
        assert!(!dg.is_null());
        assert_eq!(dg.vertices(), 10);
        assert_eq!(dg.capacity(), 0);
        assert_eq!(dg.tail_ptr().len(), 11);
        assert!(dg.is_valid());
    }

    #[test]
    fn test_empty_digraph() {
        let dg = Digraph::empty(0, 0).unwrap();
        assert!(dg.is_valid());
        assert_eq!(dg.vertices(), 0);
        assert_eq!(dg.tail_ptr(), &[0]);

        let dg = Digraph::empty(10, 100).unwrap();
        assert!(dg.is_valid());
        assert_eq!(dg.capacity(), 100);
        assert_eq!(dg.num_arcs(), 0);
        assert!(dg.tail_ptr().iter().all(|&o| o == 0));
    }

    #[test]
    fn test_null_is_not_empty() {
        let null = Digraph::null();
        let empty = Digraph::empty(0, 0).unwrap();

        assert!(null.is_null());
        assert!(!null.is_valid());
        assert!(!empty.is_null());
        assert_ne!(null, empty);
        assert!(matches!(
            null.out_neighbors(NodeId(0)),
            Err(Error::NullDigraph)
        ));
    }

    #[test]
    fn test_balanced_digraph() {
        let heads: Vec<u32> = (0..40).map(|i| i % 10).collect();
        let dg = Digraph::balanced(10, 4, heads.clone()).unwrap();

        assert!(dg.is_valid());
        assert_eq!(dg.capacity(), 40);
        for (v, &offset) in dg.tail_ptr().iter().enumerate() {
            assert_eq!(offset, v * 4);
        }
        assert_eq!(dg.head(), heads.as_slice());

        let dg = Digraph::balanced(0, 0, Vec::new()).unwrap();
        assert!(dg.is_valid());
        assert_eq!(dg.tail_ptr(), &[0]);
    }

    #[test]
    fn test_balanced_rejects_bad_heads() {
        assert!(Digraph::balanced(3, 2, vec![0, 1, 2]).is_err());
        assert!(matches!(
            Digraph::balanced(2, 1, vec![0, 5]),
            Err(Error::VertexOutOfBounds { vertex: 5, .. })
        ));
    }

    #[test]
    fn test_from_arcs_keeps_row_order() {
        let dg = Digraph::from_arcs(3, &[(1, 2), (0, 2), (1, 0), (0, 1)]).unwrap();

        assert_eq!(dg.tail_ptr(), &[0, 2, 4, 4]);
        assert_eq!(dg.out_neighbors(NodeId(0)).unwrap(), &[2, 1]);
        assert_eq!(dg.out_neighbors(NodeId(1)).unwrap(), &[2, 0]);
        let empty: &[u32] = &[];
        assert_eq!(dg.out_neighbors(NodeId(2)).unwrap(), empty);
    }

    #[test]
    fn test_from_adjacency() {
        let dg = Digraph::from_adjacency(&[vec![1, 2], vec![2], vec![]]).unwrap();

        assert_eq!(dg.tail_ptr(), &[0, 2, 3, 3]);
        assert_eq!(dg.head(), &[1, 2, 2]);
        assert!(Digraph::from_adjacency(&[vec![3]]).is_err());
    }

    #[test]
    fn test_from_parts_validation() {
        assert!(Digraph::from_parts(2, vec![0, 1, 2], vec![1, 0]).is_ok());
        assert!(Digraph::from_parts(2, vec![0, 1], vec![1]).is_err());
        assert!(Digraph::from_parts(2, vec![1, 1, 2], vec![1, 0]).is_err());
        assert!(Digraph::from_parts(2, vec![0, 2, 1], vec![1, 0]).is_err());
        assert!(Digraph::from_parts(2, vec![0, 1, 3], vec![1, 0]).is_err());
        assert!(Digraph::from_parts(2, vec![0, 1, 2], vec![1, 2]).is_err());
    }

    #[test]
    fn test_out_of_bounds_vertex() {
        let dg = Digraph::from_arcs(2, &[(0, 1)]).unwrap();
        assert!(matches!(
            dg.out_neighbors(NodeId(2)),
            Err(Error::VertexOutOfBounds { vertex: 2, vertices: 2 })
        ));
    }

    #[test]
    fn test_change_capacity() {
        let mut dg = Digraph::empty(4, 16).unwrap();
        dg.change_capacity(2).unwrap();
        assert_eq!(dg.capacity(), 2);
        assert!(dg.is_valid());

        dg.change_capacity(32).unwrap();
        assert_eq!(dg.capacity(), 32);
        assert!(dg.head().is_empty());

        // Growing past the current allocation keeps written arcs
        let mut grown = Digraph::from_arcs(3, &[(0, 1), (2, 0)]).unwrap();
        grown.change_capacity(64).unwrap();
        assert_eq!(grown.capacity(), 64);
        assert_eq!(grown.head(), &[1, 0]);
        assert!(grown.is_valid());

        let mut full = Digraph::from_arcs(2, &[(0, 1), (1, 0)]).unwrap();
        assert!(full.change_capacity(1).is_err());
        assert!(Digraph::null().change_capacity(0).is_err());
    }

    #[test]
    fn test_rows_iterator() {
        let dg = Digraph::from_arcs(3, &[(0, 1), (2, 0), (2, 1)]).unwrap();
        let rows: Vec<_> = dg.rows().map(|(v, r)| (v, r.to_vec())).collect();

        assert_eq!(rows, vec![(0, vec![1]), (1, vec![]), (2, vec![0, 1])]);
        assert_eq!(Digraph::null().rows().count(), 0);
    }
}
