//! Digraph algebra: union, transpose and adjacency product
//!
//! Every operation reads its inputs and allocates a fresh output; input
//! storage is never aliased.
//!
//! # Allocation
//!
//! Union and adjacency product cannot know their exact output size without
//! doing the work twice, so they first try to allocate a cheap upper bound
//! (candidate count before de-duplication). If the allocator refuses, the
//! same row traversal runs once in counting mode to get the exact size, and
//! that is allocated instead. Both passes go through [`run_pass`], so the
//! count always matches what the writing pass produces.
//!
//! # De-duplication
//!
//! A row-marker array holds, for each vertex, the last row that emitted it.
//! Comparing against the current row index avoids clearing between rows.

use crate::error::{try_filled, Error, Result};
use crate::storage::{ArcAllocator, Digraph, HeapAllocator};
use tracing::debug;

const UNSET: u32 = u32::MAX;

/// Candidate heads for each output row, before de-duplication.
trait RowSource {
    fn vertices(&self) -> usize;

    /// Cheap bound on the number of output arcs.
    fn upper_bound(&self) -> usize;

    fn visit_row(&self, v: usize, emit: &mut impl FnMut(u32));
}

/// Receives the de-duplicated arcs of a pass.
trait ArcSink {
    fn push(&mut self, head: u32);

    fn end_row(&mut self, v: usize, arcs_so_far: usize);
}

/// Counting mode: writes suppressed.
struct CountOnly;

impl ArcSink for CountOnly {
    fn push(&mut self, _head: u32) {}

    fn end_row(&mut self, _v: usize, _arcs_so_far: usize) {}
}

struct RowWriter<'a> {
    tail_ptr: &'a mut [usize],
    head: &'a mut Vec<u32>,
}

impl ArcSink for RowWriter<'_> {
    fn push(&mut self, head: u32) {
        self.head.push(head);
    }

    fn end_row(&mut self, v: usize, arcs_so_far: usize) {
        self.tail_ptr[v + 1] = arcs_so_far;
    }
}

fn run_pass<S: RowSource, K: ArcSink>(source: &S, row_markers: &mut [u32], sink: &mut K) -> usize {
    row_markers.fill(UNSET);
    let mut counter = 0;

    for v in 0..source.vertices() {
        #[allow(clippy::cast_possible_truncation)] // vertices <= MAX_VERTICES
        let row = v as u32;
        source.visit_row(v, &mut |head| {
            let marker = &mut row_markers[head as usize];
            if *marker != row {
                *marker = row;
                sink.push(head);
                counter += 1;
            }
        });
        sink.end_row(v, counter);
    }

    counter
}

fn build<S: RowSource, A: ArcAllocator + ?Sized>(source: &S, alloc: &A) -> Result<Digraph> {
    let vertices = source.vertices();
    let mut row_markers = try_filled(vertices, UNSET, "row markers")?;

    let upper_bound = source.upper_bound();
    let mut out = match alloc.allocate(vertices, upper_bound) {
        Ok(dg) => dg,
        Err(err) => {
            debug!(
                upper_bound,
                error = %err,
                "optimistic arc allocation refused, counting exact arcs"
            );
            let exact = run_pass(source, &mut row_markers, &mut CountOnly);
            alloc.allocate(vertices, exact)?
        }
    };

    let written = {
        let (tail_ptr, head) = out.storage_mut()?;
        tail_ptr[0] = 0;
        head.clear();
        run_pass(source, &mut row_markers, &mut RowWriter { tail_ptr, head })
    };
    out.change_capacity(written)?;

    Ok(out)
}

struct UnionRows<'a> {
    vertices: usize,
    dgs: &'a [&'a Digraph],
}

impl RowSource for UnionRows<'_> {
    fn vertices(&self) -> usize {
        self.vertices
    }

    fn upper_bound(&self) -> usize {
        self.dgs
            .iter()
            .fold(0_usize, |acc, dg| acc.saturating_add(dg.num_arcs()))
    }

    fn visit_row(&self, v: usize, emit: &mut impl FnMut(u32)) {
        for dg in self.dgs {
            for &head in dg.row(v) {
                emit(head);
            }
        }
    }
}

struct ProductRows<'a> {
    a: &'a Digraph,
    b: &'a Digraph,
    force_diagonal: bool,
    ignore_diagonal: bool,
}

impl ProductRows<'_> {
    fn skips(&self, v: usize, a_head: u32) -> bool {
        a_head as usize == v && (self.force_diagonal || self.ignore_diagonal)
    }
}

impl RowSource for ProductRows<'_> {
    fn vertices(&self) -> usize {
        self.a.vertices()
    }

    fn upper_bound(&self) -> usize {
        let mut bound = 0_usize;
        for v in 0..self.vertices() {
            if self.force_diagonal {
                bound = bound.saturating_add(self.b.row_len(v));
            }
            for &a_head in self.a.row(v) {
                if !self.skips(v, a_head) {
                    bound = bound.saturating_add(self.b.row_len(a_head as usize));
                }
            }
        }
        bound
    }

    fn visit_row(&self, v: usize, emit: &mut impl FnMut(u32)) {
        if self.force_diagonal {
            for &head in self.b.row(v) {
                emit(head);
            }
        }
        for &a_head in self.a.row(v) {
            if self.skips(v, a_head) {
                continue;
            }
            for &head in self.b.row(a_head as usize) {
                emit(head);
            }
        }
    }
}

/// Union of digraphs over the same vertex set
///
/// Row `v` of the result is the de-duplicated union of row `v` of every
/// input, in order of first appearance (input index, then arc order).
/// Zero inputs give the empty digraph over 0 vertices.
///
/// # Errors
///
/// Returns [`Error::NullDigraph`] or [`Error::VertexCountMismatch`] for bad
/// inputs, and [`Error::Allocation`] if even the exact-size allocation fails.
///
/// # Example
///
/// ```
/// use trueno_cluster::{union, Digraph, NodeId};
///
/// let a = Digraph::from_arcs(3, &[(0, 1), (1, 2)]).unwrap();
/// let b = Digraph::from_arcs(3, &[(0, 1), (0, 2)]).unwrap();
///
/// let u = union(&[&a, &b]).unwrap();
/// assert_eq!(u.out_neighbors(NodeId(0)).unwrap(), &[1, 2]);
/// assert_eq!(u.num_arcs(), 3);
/// ```
pub fn union(dgs: &[&Digraph]) -> Result<Digraph> {
    union_in(dgs, &HeapAllocator)
}

/// [`union`] with output storage from `alloc`
///
/// # Errors
///
/// Same as [`union`].
pub fn union_in<A: ArcAllocator + ?Sized>(dgs: &[&Digraph], alloc: &A) -> Result<Digraph> {
    let Some(first) = dgs.first() else {
        return Digraph::empty(0, 0);
    };

    let vertices = first.vertices();
    for dg in dgs {
        if dg.is_null() {
            return Err(Error::NullDigraph);
        }
        if dg.vertices() != vertices {
            return Err(Error::VertexCountMismatch {
                expected: vertices,
                found: dg.vertices(),
            });
        }
    }

    build(&UnionRows { vertices, dgs }, alloc)
}

/// Reverse every arc
///
/// Counting sort over heads: in-degree histogram, prefix sum into the row
/// offsets, then a scatter that reuses the histogram as per-row write
/// cursor. Linear in arcs plus vertices.
///
/// # Errors
///
/// Returns [`Error::NullDigraph`] for the null digraph and
/// [`Error::Allocation`] if the output cannot be allocated.
///
/// # Example
///
/// ```
/// use trueno_cluster::{transpose, Digraph, NodeId};
///
/// let dg = Digraph::from_arcs(3, &[(0, 2), (1, 2)]).unwrap();
/// let t = transpose(&dg).unwrap();
///
/// assert_eq!(t.out_neighbors(NodeId(2)).unwrap(), &[0, 1]);
/// ```
pub fn transpose(dg: &Digraph) -> Result<Digraph> {
    transpose_in(dg, &HeapAllocator)
}

/// [`transpose`] with output storage from `alloc`
///
/// # Errors
///
/// Same as [`transpose`].
pub fn transpose_in<A: ArcAllocator + ?Sized>(dg: &Digraph, alloc: &A) -> Result<Digraph> {
    if dg.is_null() {
        return Err(Error::NullDigraph);
    }
    let vertices = dg.vertices();
    if vertices == 0 {
        return Digraph::empty(0, 0);
    }

    let arcs = dg.num_arcs();
    let mut row_count = try_filled(vertices + 1, 0_usize, "row counts")?;
    let mut out = alloc.allocate(vertices, arcs)?;

    for &head in dg.head() {
        row_count[head as usize + 1] += 1;
    }

    {
        let (tail_ptr, head) = out.storage_mut()?;
        tail_ptr[0] = 0;
        for v in 1..=vertices {
            row_count[v] += row_count[v - 1];
            tail_ptr[v] = row_count[v];
        }

        head.clear();
        head.resize(arcs, 0);
        for (tail, row) in dg.rows() {
            for &h in row {
                let cursor = &mut row_count[h as usize];
                head[*cursor] = tail;
                *cursor += 1;
            }
        }
    }
    out.change_capacity(arcs)?;

    Ok(out)
}

/// Two-step adjacency product: reachability through `a` then `b`
///
/// Row `v` of the result is the de-duplicated union of `b`'s rows for every
/// out-neighbor of `v` in `a`.
///
/// * `force_diagonal`: also include `v`'s own row of `b` (first), and skip
///   `v` if it appears among its `a`-neighbors.
/// * `ignore_diagonal`: skip `v` among its `a`-neighbors without adding
///   anything in its place.
///
/// # Errors
///
/// Returns [`Error::ConflictingDiagonalFlags`] if both flags are set,
/// [`Error::NullDigraph`] / [`Error::VertexCountMismatch`] for bad inputs,
/// and [`Error::Allocation`] if even the exact-size allocation fails.
///
/// # Example
///
/// ```
/// use trueno_cluster::{adjacency_product, Digraph, NodeId};
///
/// let a = Digraph::from_arcs(3, &[(0, 1)]).unwrap();
/// let b = Digraph::from_arcs(3, &[(0, 0), (1, 2)]).unwrap();
///
/// let p = adjacency_product(&a, &b, true, false).unwrap();
/// assert_eq!(p.out_neighbors(NodeId(0)).unwrap(), &[0, 2]);
/// ```
pub fn adjacency_product(
    a: &Digraph,
    b: &Digraph,
    force_diagonal: bool,
    ignore_diagonal: bool,
) -> Result<Digraph> {
    adjacency_product_in(a, b, force_diagonal, ignore_diagonal, &HeapAllocator)
}

/// [`adjacency_product`] with output storage from `alloc`
///
/// # Errors
///
/// Same as [`adjacency_product`].
pub fn adjacency_product_in<A: ArcAllocator + ?Sized>(
    a: &Digraph,
    b: &Digraph,
    force_diagonal: bool,
    ignore_diagonal: bool,
    alloc: &A,
) -> Result<Digraph> {
    if force_diagonal && ignore_diagonal {
        return Err(Error::ConflictingDiagonalFlags);
    }
    if a.is_null() || b.is_null() {
        return Err(Error::NullDigraph);
    }
    if a.vertices() != b.vertices() {
        return Err(Error::VertexCountMismatch {
            expected: a.vertices(),
            found: b.vertices(),
        });
    }
    if a.vertices() == 0 {
        return Digraph::empty(0, 0);
    }

    build(
        &ProductRows {
            a,
            b,
            force_diagonal,
            ignore_diagonal,
        },
        alloc,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{CappedAllocator, NodeId};
    use std::cell::RefCell;

    /// Records every request and refuses the first one.
    struct RefuseFirst {
        requests: RefCell<Vec<usize>>,
    }

    impl RefuseFirst {
        fn new() -> Self {
            Self {
                requests: RefCell::new(Vec::new()),
            }
        }
    }

    impl ArcAllocator for RefuseFirst {
        fn allocate(&self, vertices: usize, capacity: usize) -> Result<Digraph> {
            let mut requests = self.requests.borrow_mut();
            requests.push(capacity);
            if requests.len() == 1 {
                return Err(Error::allocation("arcs", capacity));
            }
            Digraph::init(vertices, capacity)
        }
    }

    fn neighbors(dg: &Digraph, v: u32) -> Vec<u32> {
        dg.out_neighbors(NodeId(v)).unwrap().to_vec()
    }

    #[test]
    fn test_union_zero_inputs() {
        let u = union(&[]).unwrap();
        assert!(u.is_valid());
        assert_eq!(u.vertices(), 0);
        assert_eq!(u.num_arcs(), 0);
    }

    #[test]
    fn test_union_order_and_dedup() {
        let a = Digraph::from_arcs(4, &[(0, 3), (0, 1), (0, 3), (2, 0)]).unwrap();
        let b = Digraph::from_arcs(4, &[(0, 2), (0, 1), (3, 3)]).unwrap();

        let u = union(&[&a, &b]).unwrap();

        assert!(u.is_valid());
        assert_eq!(neighbors(&u, 0), vec![3, 1, 2]);
        assert_eq!(neighbors(&u, 1), Vec::<u32>::new());
        assert_eq!(neighbors(&u, 2), vec![0]);
        assert_eq!(neighbors(&u, 3), vec![3]);
        assert_eq!(u.capacity(), u.num_arcs());
    }

    #[test]
    fn test_union_rejects_bad_inputs() {
        let a = Digraph::empty(3, 0).unwrap();
        let b = Digraph::empty(4, 0).unwrap();
        let null = Digraph::null();

        assert!(matches!(
            union(&[&a, &b]),
            Err(Error::VertexCountMismatch { expected: 3, found: 4 })
        ));
        assert!(matches!(union(&[&a, &null]), Err(Error::NullDigraph)));
    }

    #[test]
    fn test_union_falls_back_to_counting_pass() {
        let a = Digraph::from_arcs(3, &[(0, 1), (0, 2), (1, 2)]).unwrap();
        let b = Digraph::from_arcs(3, &[(0, 1), (0, 2), (2, 0)]).unwrap();

        let alloc = RefuseFirst::new();
        let u = union_in(&[&a, &b], &alloc).unwrap();

        assert_eq!(*alloc.requests.borrow(), vec![6, 4]);
        assert_eq!(u, union(&[&a, &b]).unwrap());
        assert_eq!(u.capacity(), 4);
    }

    #[test]
    fn test_union_fails_when_exact_count_also_refused() {
        let a = Digraph::from_arcs(3, &[(0, 1), (0, 2)]).unwrap();
        let alloc = CappedAllocator::new(1);

        assert!(matches!(
            union_in(&[&a, &a], &alloc),
            Err(Error::Allocation { items: 2, .. })
        ));
    }

    #[test]
    fn test_transpose() {
        let dg = Digraph::from_arcs(4, &[(0, 1), (0, 2), (1, 2), (3, 0), (3, 2)]).unwrap();
        let t = transpose(&dg).unwrap();

        assert!(t.is_valid());
        assert_eq!(t.tail_ptr(), &[0, 1, 2, 5, 5]);
        assert_eq!(neighbors(&t, 0), vec![3]);
        assert_eq!(neighbors(&t, 1), vec![0]);
        assert_eq!(neighbors(&t, 2), vec![0, 1, 3]);
        assert_eq!(neighbors(&t, 3), Vec::<u32>::new());
    }

    #[test]
    fn test_transpose_edge_cases() {
        assert!(matches!(transpose(&Digraph::null()), Err(Error::NullDigraph)));

        let t = transpose(&Digraph::empty(0, 0).unwrap()).unwrap();
        assert!(t.is_valid());
        assert_eq!(t.vertices(), 0);

        let t = transpose(&Digraph::empty(5, 10).unwrap()).unwrap();
        assert!(t.is_valid());
        assert_eq!(t.num_arcs(), 0);
    }

    #[test]
    fn test_product_plain() {
        let a = Digraph::from_arcs(4, &[(0, 0), (0, 1), (1, 2), (3, 1)]).unwrap();
        let b = Digraph::from_arcs(4, &[(0, 3), (1, 2), (1, 3), (2, 0)]).unwrap();

        let p = adjacency_product(&a, &b, false, false).unwrap();

        assert!(p.is_valid());
        assert_eq!(neighbors(&p, 0), vec![3, 2]);
        assert_eq!(neighbors(&p, 1), vec![0]);
        assert_eq!(neighbors(&p, 2), Vec::<u32>::new());
        assert_eq!(neighbors(&p, 3), vec![2, 3]);
    }

    #[test]
    fn test_product_diagonal_flags() {
        let a = Digraph::from_arcs(3, &[(0, 0), (0, 1), (1, 1)]).unwrap();
        let b = Digraph::from_arcs(3, &[(0, 2), (1, 0), (2, 1)]).unwrap();

        let forced = adjacency_product(&a, &b, true, false).unwrap();
        assert_eq!(neighbors(&forced, 0), vec![2, 0]);
        assert_eq!(neighbors(&forced, 1), vec![0]);
        assert_eq!(neighbors(&forced, 2), vec![1]);

        let ignored = adjacency_product(&a, &b, false, true).unwrap();
        assert_eq!(neighbors(&ignored, 0), vec![0]);
        assert_eq!(neighbors(&ignored, 1), Vec::<u32>::new());
        assert_eq!(neighbors(&ignored, 2), Vec::<u32>::new());
    }

    #[test]
    fn test_product_rejects_bad_inputs() {
        let a = Digraph::empty(3, 0).unwrap();
        let b = Digraph::empty(2, 0).unwrap();

        assert!(matches!(
            adjacency_product(&a, &a, true, true),
            Err(Error::ConflictingDiagonalFlags)
        ));
        assert!(matches!(
            adjacency_product(&a, &b, false, false),
            Err(Error::VertexCountMismatch { .. })
        ));
        assert!(matches!(
            adjacency_product(&a, &Digraph::null(), false, false),
            Err(Error::NullDigraph)
        ));

        let zero = Digraph::empty(0, 0).unwrap();
        let p = adjacency_product(&zero, &zero, false, false).unwrap();
        assert!(p.is_valid());
        assert_eq!(p.vertices(), 0);
    }

    #[test]
    fn test_product_falls_back_to_counting_pass() {
        let a = Digraph::from_arcs(3, &[(0, 1), (0, 2), (1, 2)]).unwrap();
        let b = Digraph::from_arcs(3, &[(1, 0), (1, 2), (2, 0), (2, 2)]).unwrap();

        let alloc = RefuseFirst::new();
        let p = adjacency_product_in(&a, &b, false, false, &alloc).unwrap();

        // Upper bound: row 0 sees 2 + 2 candidates, row 1 sees 2.
        assert_eq!(*alloc.requests.borrow(), vec![6, 4]);
        assert_eq!(p, adjacency_product(&a, &b, false, false).unwrap());
        assert_eq!(neighbors(&p, 0), vec![0, 2]);
        assert_eq!(neighbors(&p, 1), vec![0, 2]);
    }
}
