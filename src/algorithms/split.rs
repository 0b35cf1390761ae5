//! Greedy bisection of one oversized cluster
//!
//! # Algorithm
//!
//! 1. Approximate the cluster's diameter endpoints by repeated farthest-point
//!    queries from a sparse sample of members.
//! 2. Sort all members by distance to each endpoint.
//! 3. Seed each half with its endpoint and top it up to exactly
//!    `size_constraint` members from its nearest unclaimed candidates. The
//!    side whose `(size_constraint - 1)`-th candidate is farther picks first.
//! 4. Hand out the remaining members by comparing the next unclaimed
//!    distance on each side (one member at a time, or in chunks of
//!    `size_constraint` in batch mode).
//!
//! Every query and allocation happens before the member list is rewritten,
//! so a failed split leaves the cluster's members as they were.

use super::stack::{ClusterItem, Marker, VertexMarkers};
use crate::data::DataSource;
use crate::error::{try_reserve, DataSourceError, Result};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy)]
struct DistanceEdge {
    vertex: u32,
    distance: f64,
}

/// Members sorted by distance to one center, chained by "next unclaimed" indices.
///
/// Slot 0 is the list head; slots `1..` are the sorted members. Claimed
/// entries are unlinked lazily when a walk steps over them.
struct DistanceList {
    edges: Vec<DistanceEdge>,
    next: Vec<usize>,
}

impl DistanceList {
    const HEAD: usize = 0;

    fn with_capacity(size: usize) -> Result<Self> {
        let mut edges = Vec::new();
        let mut next = Vec::new();
        try_reserve(&mut edges, size, "distance list entries")?;
        try_reserve(&mut next, size, "distance list links")?;
        Ok(Self { edges, next })
    }

    /// Sort `members` (minus `center`) by `distances`. Returns false if
    /// `center` is not exactly one of the members.
    fn fill(&mut self, members: &[u32], center: u32, distances: &[f64]) -> bool {
        self.edges.clear();
        self.edges.push(DistanceEdge {
            vertex: center,
            distance: 0.0,
        });
        for (&vertex, &distance) in members.iter().zip(distances) {
            if vertex != center {
                self.edges.push(DistanceEdge { vertex, distance });
            }
        }

        self.edges[1..].sort_by(|a, b| a.distance.total_cmp(&b.distance));

        self.next.clear();
        self.next.extend(1..=self.edges.len());

        self.edges.len() == members.len()
    }

    fn vertex(&self, index: usize) -> u32 {
        self.edges[index].vertex
    }

    fn distance(&self, index: usize) -> f64 {
        self.edges[index].distance
    }

    /// First unclaimed entry after `prev`, unlinking claimed ones on the way.
    fn next_unclaimed(&mut self, prev: usize, markers: &VertexMarkers, marker: Marker) -> usize {
        loop {
            let candidate = self.next[prev];
            debug_assert!(candidate < self.edges.len(), "distance list exhausted");
            if !markers.is_marked(self.edges[candidate].vertex, marker) {
                return candidate;
            }
            self.next[prev] = self.next[candidate];
        }
    }

    /// Collect the next `k` unclaimed vertices after `prev` into `out`;
    /// returns the index of the last one.
    fn next_k(
        &mut self,
        mut prev: usize,
        k: usize,
        out: &mut Vec<u32>,
        markers: &VertexMarkers,
        marker: Marker,
    ) -> usize {
        out.clear();
        for _ in 0..k {
            prev = self.next_unclaimed(prev, markers, marker);
            out.push(self.edges[prev].vertex);
        }
        prev
    }
}

fn claim(vertex: u32, cluster: &mut Vec<u32>, markers: &mut VertexMarkers, marker: Marker) {
    debug_assert!(!markers.is_marked(vertex, marker), "vertex {vertex} claimed twice");
    markers.mark(vertex, marker);
    cluster.push(vertex);
}

fn claim_all(vertices: &[u32], cluster: &mut Vec<u32>, markers: &mut VertexMarkers, marker: Marker) {
    for &vertex in vertices {
        claim(vertex, cluster, markers, marker);
    }
}

/// Approximate diameter endpoints of `cluster`.
///
/// Starts from every `step`-th member, `step = max(2, size / 1000)`, and keeps
/// querying farthest points of newly discovered vertices until no new ones
/// appear. The pair with the largest distance seen wins.
pub(crate) fn find_centers<D: DataSource + ?Sized>(
    data: &D,
    cluster: &mut ClusterItem,
    markers: &mut VertexMarkers,
) -> Result<(u32, u32)> {
    let marker = cluster.next_marker(markers);
    let size = cluster.len();
    let step = (size / 1000).max(2);

    let mut to_check = Vec::new();
    try_reserve(&mut to_check, 1 + (size - 1) / step, "center candidates")?;
    to_check.extend(cluster.members.iter().step_by(step).copied());
    for &v in &to_check {
        markers.mark(v, marker);
    }

    let mut best: Option<(u32, u32, f64)> = None;
    let mut round = 0_usize;
    while !to_check.is_empty() {
        let farthest = data.farthest_points(&to_check, &cluster.members)?;
        if farthest.len() != to_check.len() {
            return Err(DataSourceError::InvalidResponse(format!(
                "{} farthest points returned for {} queries",
                farthest.len(),
                to_check.len()
            ))
            .into());
        }

        let mut discovered = Vec::new();
        for (&query, &(far, distance)) in to_check.iter().zip(&farthest) {
            if far as usize >= markers.len() {
                return Err(DataSourceError::InvalidResponse(format!(
                    "farthest point {far} is outside the data set"
                ))
                .into());
            }
            if !distance.is_finite() {
                return Err(DataSourceError::InvalidResponse(format!(
                    "non-finite distance {distance} from {query} to {far}"
                ))
                .into());
            }
            if best.map_or(true, |(_, _, max)| distance > max) {
                best = Some((query, far, distance));
            }
            if !markers.is_marked(far, marker) {
                markers.mark(far, marker);
                discovered.push(far);
            }
        }

        trace!(
            round,
            queried = to_check.len(),
            discovered = discovered.len(),
            "center search round"
        );
        to_check = discovered;
        round += 1;
    }

    match best {
        Some((center1, center2, _)) if center1 != center2 => Ok((center1, center2)),
        _ => Err(DataSourceError::InvalidResponse(
            "farthest-point search did not yield two distinct centers".to_string(),
        )
        .into()),
    }
}

/// Split `cluster` in two around approximate diameter endpoints.
///
/// `cluster` keeps the first half; the second half is returned. Both have at
/// least `size_constraint` members.
///
/// # Panics
///
/// If `cluster` has fewer than `2 * size_constraint` members or
/// `size_constraint < 2`.
pub(crate) fn split<D: DataSource + ?Sized>(
    data: &D,
    cluster: &mut ClusterItem,
    size_constraint: usize,
    batch_assign: bool,
    markers: &mut VertexMarkers,
) -> Result<ClusterItem> {
    assert!(size_constraint >= 2, "size constraint below 2");
    assert!(
        cluster.len() >= 2 * size_constraint,
        "cluster of {} is too small to split under constraint {}",
        cluster.len(),
        size_constraint
    );

    let old_size = cluster.len();
    let k = size_constraint;

    let (center1, center2) = find_centers(data, cluster, markers)?;
    let marker = cluster.next_marker(markers);

    let mut list1 = DistanceList::with_capacity(old_size)?;
    let mut list2 = DistanceList::with_capacity(old_size)?;
    let mut knn1 = Vec::new();
    let mut knn2 = Vec::new();
    try_reserve(&mut knn1, k, "nearest-neighbor buffer")?;
    try_reserve(&mut knn2, k, "nearest-neighbor buffer")?;
    let mut members1 = Vec::new();
    let mut members2 = Vec::new();
    try_reserve(&mut members1, old_size, "cluster members")?;
    try_reserve(&mut members2, old_size, "cluster members")?;

    let distances = data.row_distances(&[center1, center2], &cluster.members)?;
    if distances.len() != 2 * old_size {
        return Err(DataSourceError::InvalidResponse(format!(
            "{} distances returned for 2 x {old_size} pairs",
            distances.len()
        ))
        .into());
    }
    if let Some(bad) = distances.iter().find(|d| !d.is_finite()) {
        return Err(DataSourceError::InvalidResponse(format!(
            "non-finite distance {bad} to a cluster member"
        ))
        .into());
    }
    let (row1, row2) = distances.split_at(old_size);
    if !list1.fill(&cluster.members, center1, row1) || !list2.fill(&cluster.members, center2, row2)
    {
        return Err(DataSourceError::InvalidResponse(format!(
            "centers {center1} and {center2} must both be cluster members"
        ))
        .into());
    }

    // Nothing below can fail.
    claim(center1, &mut members1, markers, marker);
    claim(center2, &mut members2, markers, marker);

    let mut last1 = DistanceList::HEAD;
    let mut last2 = DistanceList::HEAD;

    let boundary1 = list1.next_k(last1, k - 1, &mut knn1, markers, marker);
    let boundary2 = list2.next_k(last2, k - 1, &mut knn2, markers, marker);

    if list1.distance(boundary1) >= list2.distance(boundary2) {
        claim_all(&knn1, &mut members1, markers, marker);
        last1 = boundary1;

        last2 = list2.next_k(last2, k - 1, &mut knn2, markers, marker);
        claim_all(&knn2, &mut members2, markers, marker);
    } else {
        claim_all(&knn2, &mut members2, markers, marker);
        last2 = boundary2;

        last1 = list1.next_k(last1, k - 1, &mut knn1, markers, marker);
        claim_all(&knn1, &mut members1, markers, marker);
    }

    debug_assert_eq!(members1.len(), k);
    debug_assert_eq!(members2.len(), k);

    if batch_assign {
        let mut batch = k;
        let mut assigned = 2 * k;
        while assigned < old_size {
            batch = batch.min(old_size - assigned);

            let end1 = list1.next_k(last1, batch, &mut knn1, markers, marker);
            let end2 = list2.next_k(last2, batch, &mut knn2, markers, marker);

            if list1.distance(end1) <= list2.distance(end2) {
                claim_all(&knn1, &mut members1, markers, marker);
                last1 = end1;
            } else {
                claim_all(&knn2, &mut members2, markers, marker);
                last2 = end2;
            }
            assigned += batch;
        }
    } else {
        for _ in 2 * k..old_size {
            let next1 = list1.next_unclaimed(last1, markers, marker);
            let next2 = list2.next_unclaimed(last2, markers, marker);

            if list1.distance(next1) <= list2.distance(next2) {
                claim(list1.vertex(next1), &mut members1, markers, marker);
                last1 = next1;
            } else {
                claim(list2.vertex(next2), &mut members2, markers, marker);
                last2 = next2;
            }
        }
    }

    debug_assert_eq!(members1.len() + members2.len(), old_size);

    members1.shrink_to_fit();
    members2.shrink_to_fit();

    debug!(
        size = old_size,
        center1,
        center2,
        first = members1.len(),
        second = members2.len(),
        "split cluster"
    );

    cluster.members = members1;
    Ok(ClusterItem::new(members2, marker))
}
