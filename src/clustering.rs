//! Clustering results
//!
//! A [`Clustering`] maps every vertex to a cluster label or leaves it
//! unassigned (`None`). Labels run from `0` to `num_clusters - 1`.

use crate::error::{Error, Result};
use crate::storage::NodeId;

/// Cluster identifier (zero-indexed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClusterLabel(pub u32);

impl ClusterLabel {
    /// Largest representable label
    pub const MAX: Self = Self(u32::MAX);
}

/// Assignment of vertices to clusters
///
/// # Example
///
/// ```
/// use trueno_cluster::{ClusterLabel, Clustering, NodeId};
///
/// let cl = Clustering::new(
///     vec![Some(ClusterLabel(0)), Some(ClusterLabel(1)), None, Some(ClusterLabel(0))],
///     2,
/// )
/// .unwrap();
///
/// assert_eq!(cl.label(NodeId(3)), Some(ClusterLabel(0)));
/// assert_eq!(cl.cluster_sizes(), vec![2, 1]);
/// assert_eq!(cl.members(ClusterLabel(0)), vec![0, 3]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clustering {
    labels: Vec<Option<ClusterLabel>>,
    num_clusters: usize,
}

impl Clustering {
    /// Wrap labels produced elsewhere
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidClustering`] if any label is `>= num_clusters`.
    pub fn new(labels: Vec<Option<ClusterLabel>>, num_clusters: usize) -> Result<Self> {
        let cl = Self {
            labels,
            num_clusters,
        };
        if let Some((v, label)) = cl.first_out_of_range() {
            return Err(Error::InvalidClustering(format!(
                "vertex {v} has label {} but there are only {num_clusters} clusters",
                label.0
            )));
        }
        Ok(cl)
    }

    pub(crate) const fn from_parts_unchecked(
        labels: Vec<Option<ClusterLabel>>,
        num_clusters: usize,
    ) -> Self {
        Self {
            labels,
            num_clusters,
        }
    }

    /// Internal consistency: every label lies below `num_clusters`
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.first_out_of_range().is_none()
    }

    fn first_out_of_range(&self) -> Option<(usize, ClusterLabel)> {
        self.labels.iter().enumerate().find_map(|(v, label)| match label {
            Some(l) if l.0 as usize >= self.num_clusters => Some((v, *l)),
            _ => None,
        })
    }

    /// Number of vertices
    #[must_use]
    pub fn vertices(&self) -> usize {
        self.labels.len()
    }

    /// Number of clusters
    #[must_use]
    pub const fn num_clusters(&self) -> usize {
        self.num_clusters
    }

    /// Label of a vertex (`None` if unassigned or out of range)
    #[must_use]
    pub fn label(&self, vertex: NodeId) -> Option<ClusterLabel> {
        self.labels.get(vertex.0 as usize).copied().flatten()
    }

    /// All labels, indexed by vertex
    #[must_use]
    pub fn labels(&self) -> &[Option<ClusterLabel>] {
        &self.labels
    }

    /// Take the label storage
    #[must_use]
    pub fn into_labels(self) -> Vec<Option<ClusterLabel>> {
        self.labels
    }

    /// Number of vertices carrying each label
    #[must_use]
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.num_clusters];
        for label in self.labels.iter().flatten() {
            if let Some(size) = sizes.get_mut(label.0 as usize) {
                *size += 1;
            }
        }
        sizes
    }

    /// Vertices carrying `label`, ascending
    #[must_use]
    pub fn members(&self, label: ClusterLabel) -> Vec<u32> {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, l)| **l == Some(label))
            .filter_map(|(v, _)| u32::try_from(v).ok())
            .collect()
    }

    /// Number of vertices without a label
    #[must_use]
    pub fn unassigned(&self) -> usize {
        self.labels.iter().filter(|l| l.is_none()).count()
    }
}
