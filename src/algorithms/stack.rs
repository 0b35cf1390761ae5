//! Working storage for divisive clustering
//!
//! Clusters waiting to be split or labelled live on a LIFO [`ClusterStack`].
//! Membership tests during a split use generation markers: every vertex
//! remembers the last marker that touched it in a shared [`VertexMarkers`]
//! array, and every [`ClusterItem`] owns the counter it draws markers from.
//! A fresh marker invalidates all earlier claims without clearing the array.

use crate::clustering::Clustering;
use crate::error::{try_filled, try_reserve, Result};

pub(crate) type Marker = u16;

/// Last marker that touched each vertex, shared by every item in one run.
#[derive(Debug)]
pub(crate) struct VertexMarkers {
    marks: Vec<Marker>,
}

impl VertexMarkers {
    pub(crate) fn new(vertices: usize) -> Result<Self> {
        Ok(Self {
            marks: try_filled(vertices, 0, "vertex markers")?,
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.marks.len()
    }

    pub(crate) fn is_marked(&self, vertex: u32, marker: Marker) -> bool {
        self.marks[vertex as usize] == marker
    }

    pub(crate) fn mark(&mut self, vertex: u32, marker: Marker) {
        self.marks[vertex as usize] = marker;
    }
}

/// One cluster in progress.
#[derive(Debug, Default)]
pub(crate) struct ClusterItem {
    pub(crate) members: Vec<u32>,
    pub(crate) marker: Marker,
}

impl ClusterItem {
    pub(crate) const fn new(members: Vec<u32>, marker: Marker) -> Self {
        Self { members, marker }
    }

    pub(crate) fn len(&self) -> usize {
        self.members.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Draw the next marker for this item.
    ///
    /// On overflow only this item's members are reset, then counting
    /// restarts. All of them hold markers at most the current one, so none
    /// can collide with the restarted sequence.
    pub(crate) fn next_marker(&mut self, markers: &mut VertexMarkers) -> Marker {
        if self.marker == Marker::MAX {
            for &v in &self.members {
                markers.mark(v, 0);
            }
            self.marker = 0;
        }
        self.marker += 1;
        self.marker
    }
}

/// LIFO of clusters with geometric capacity growth.
#[derive(Debug)]
pub(crate) struct ClusterStack {
    items: Vec<ClusterItem>,
    capacity: usize,
}

impl ClusterStack {
    pub(crate) fn with_capacity(capacity: usize) -> Result<Self> {
        let mut items = Vec::new();
        try_reserve(&mut items, capacity, "cluster stack slots")?;
        Ok(Self { items, capacity })
    }

    /// One item holding every vertex.
    pub(crate) fn fresh(vertices: usize) -> Result<Self> {
        let mut stack = Self::with_capacity(1 + log2_slots(vertices, 20.0))?;

        let mut members = Vec::new();
        try_reserve(&mut members, vertices, "cluster members")?;
        #[allow(clippy::cast_possible_truncation)] // vertices < MAX_VERTICES
        members.extend((0..vertices).map(|v| v as u32));

        stack.push(ClusterItem::new(members, 0))?;
        Ok(stack)
    }

    /// One item per existing cluster, in label order; unassigned vertices are left out.
    pub(crate) fn from_clustering(clustering: &Clustering) -> Result<Self> {
        let num_clusters = clustering.num_clusters();
        let mut stack =
            Self::with_capacity(num_clusters + log2_slots(clustering.vertices(), 10.0))?;

        let sizes = clustering.cluster_sizes();
        for &size in &sizes {
            let mut members = Vec::new();
            try_reserve(&mut members, size, "cluster members")?;
            stack.push(ClusterItem::new(members, 0))?;
        }

        for (v, label) in clustering.labels().iter().enumerate() {
            if let Some(label) = label {
                #[allow(clippy::cast_possible_truncation)] // vertices < MAX_VERTICES
                stack.items[label.0 as usize].members.push(v as u32);
            }
        }

        Ok(stack)
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn peek_mut(&mut self) -> Option<&mut ClusterItem> {
        self.items.last_mut()
    }

    pub(crate) fn pop(&mut self) -> Option<ClusterItem> {
        self.items.pop()
    }

    /// Push, growing by `max(1, ⌈20·log2(item size)⌉)` slots when full.
    pub(crate) fn push(&mut self, item: ClusterItem) -> Result<()> {
        if self.items.len() == self.capacity {
            let growth = growth_for(item.len());
            try_reserve(&mut self.items, growth, "cluster stack slots")?;
            self.capacity += growth;
        }
        self.items.push(item);
        Ok(())
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn growth_for(size: usize) -> usize {
    if size <= 1 {
        return 1;
    }
    ((20.0 * (size as f64).log2()).ceil() as usize).max(1)
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn log2_slots(vertices: usize, factor: f64) -> usize {
    if vertices <= 1 {
        return 0;
    }
    (factor * (vertices as f64).log2()) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::ClusterLabel;

    #[test]
    fn test_fresh_stack() {
        let mut stack = ClusterStack::fresh(1024).unwrap();
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.capacity(), 201);

        let top = stack.peek_mut().unwrap();
        assert_eq!(top.len(), 1024);
        assert_eq!(top.members[..3], [0, 1, 2]);
        assert_eq!(top.marker, 0);
    }

    #[test]
    fn test_lifo_order() {
        let mut stack = ClusterStack::with_capacity(4).unwrap();
        stack.push(ClusterItem::new(vec![1], 0)).unwrap();
        stack.push(ClusterItem::new(vec![2, 3], 0)).unwrap();

        stack.peek_mut().unwrap().members.push(4);
        assert_eq!(stack.pop().unwrap().members, vec![2, 3, 4]);
        stack.push(ClusterItem::new(vec![2, 3], 0)).unwrap();
        assert_eq!(stack.pop().unwrap().members, vec![2, 3]);
        assert_eq!(stack.pop().unwrap().members, vec![1]);
        assert!(stack.pop().is_none());
        assert!(stack.peek_mut().is_none());
    }

    #[test]
    fn test_push_grows_by_log_of_incoming_size() {
        let mut stack = ClusterStack::with_capacity(1).unwrap();
        stack.push(ClusterItem::new(vec![0], 0)).unwrap();
        assert_eq!(stack.capacity(), 1);

        // ⌈20·log2(8)⌉ = 60
        stack.push(ClusterItem::new((0..8).collect(), 0)).unwrap();
        assert_eq!(stack.capacity(), 61);
        assert_eq!(stack.len(), 2);

        let mut stack = ClusterStack::with_capacity(0).unwrap();
        stack.push(ClusterItem::default()).unwrap();
        assert_eq!(stack.capacity(), 1);
    }

    #[test]
    fn test_from_clustering() {
        let clustering = Clustering::new(
            vec![
                Some(ClusterLabel(1)),
                None,
                Some(ClusterLabel(0)),
                Some(ClusterLabel(1)),
            ],
            3,
        )
        .unwrap();

        let mut stack = ClusterStack::from_clustering(&clustering).unwrap();
        assert_eq!(stack.len(), 3);
        assert_eq!(stack.capacity(), 3 + 20);

        assert!(stack.pop().unwrap().is_empty());
        assert_eq!(stack.pop().unwrap().members, vec![0, 3]);
        assert_eq!(stack.pop().unwrap().members, vec![2]);
    }

    #[test]
    fn test_next_marker_increments() {
        let mut markers = VertexMarkers::new(4).unwrap();
        let mut item = ClusterItem::new(vec![0, 1], 0);

        assert_eq!(item.next_marker(&mut markers), 1);
        assert_eq!(item.next_marker(&mut markers), 2);
        assert_eq!(markers.len(), 4);
    }

    #[test]
    fn test_next_marker_overflow_resets_only_members() {
        let mut markers = VertexMarkers::new(5).unwrap();
        for v in 0..5 {
            markers.mark(v, 7);
        }
        let mut item = ClusterItem::new(vec![1, 3], Marker::MAX);

        assert_eq!(item.next_marker(&mut markers), 1);
        assert!(markers.is_marked(1, 0));
        assert!(markers.is_marked(3, 0));
        assert!(markers.is_marked(0, 7));
        assert!(markers.is_marked(2, 7));
        assert!(markers.is_marked(4, 7));
    }
}
