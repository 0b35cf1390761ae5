//! Size-constrained divisive clustering
//!
//! Clusters live on a LIFO stack. Any cluster with at least twice the size
//! constraint is split in two (see [`split`](super::split)); anything smaller
//! is final and gets the next label. Every emitted cluster therefore has at
//! least `size_constraint` members.
//!
//! # Example
//!
//! ```
//! use trueno_cluster::{greedy_clustering, ClusterLabel, DenseDataSet, GreedyConfig, NodeId};
//!
//! let data = DenseDataSet::new(1, vec![0.0, 0.1, 10.0, 10.1]).unwrap();
//! let clustering = greedy_clustering(&data, &GreedyConfig::new(2).unwrap()).unwrap();
//!
//! assert_eq!(clustering.num_clusters(), 2);
//! assert_eq!(clustering.label(NodeId(0)), clustering.label(NodeId(1)));
//! assert_eq!(clustering.label(NodeId(2)), clustering.label(NodeId(3)));
//! assert_ne!(clustering.label(NodeId(0)), clustering.label(NodeId(2)));
//! ```

use super::split::split;
use super::stack::{ClusterStack, VertexMarkers};
use crate::clustering::{ClusterLabel, Clustering};
use crate::config::GreedyConfig;
use crate::data::DataSource;
use crate::error::{try_filled, Error, Result};
use crate::storage::MAX_VERTICES;
use tracing::debug;

/// Number of distinct labels a run may hand out.
const LABEL_LIMIT: u32 = ClusterLabel::MAX.0;

/// Cluster every point of `data` from scratch.
///
/// # Errors
///
/// * [`Error::InvalidSizeConstraint`] if the config was not validated
/// * [`Error::TooFewPoints`] if `data` has fewer than `max(2, size_constraint)` points
/// * [`Error::TooLargeProblem`] if the point ids do not fit a `u32`
/// * [`Error::Query`] if the data source fails
/// * [`Error::Allocation`] if working memory cannot be reserved
pub fn greedy_clustering<D: DataSource + ?Sized>(
    data: &D,
    config: &GreedyConfig,
) -> Result<Clustering> {
    let points = check_data(data, config, config.size_constraint())?;
    let mut labels = try_filled(points, None, "cluster labels")?;
    let stack = ClusterStack::fresh(points)?;

    let num_clusters = run(data, stack, &mut labels, config, LABEL_LIMIT)?;
    Ok(Clustering::from_parts_unchecked(labels, num_clusters))
}

/// Like [`greedy_clustering`] but writes labels into a caller-owned buffer.
///
/// Returns the number of clusters. On error the buffer contents are
/// unspecified.
///
/// # Errors
///
/// As [`greedy_clustering`], plus [`Error::LabelBufferMismatch`] if
/// `labels.len()` differs from the number of points.
pub fn greedy_clustering_into<D: DataSource + ?Sized>(
    data: &D,
    config: &GreedyConfig,
    labels: &mut [Option<ClusterLabel>],
) -> Result<usize> {
    let points = check_data(data, config, config.size_constraint())?;
    if labels.len() != points {
        return Err(Error::LabelBufferMismatch {
            len: labels.len(),
            points,
        });
    }
    labels.fill(None);

    let stack = ClusterStack::fresh(points)?;
    run(data, stack, labels, config, LABEL_LIMIT)
}

/// Refine an existing clustering so no cluster has `2 * size_constraint`
/// members or more.
///
/// Clusters already below that bound are kept whole (and may be smaller
/// than the constraint). Unassigned vertices stay unassigned. Labels are
/// renumbered. Unlike [`greedy_clustering`], the data set may hold fewer
/// points than the size constraint; every cluster is then kept as is.
///
/// # Errors
///
/// As [`greedy_clustering`] (with [`Error::TooFewPoints`] only below 2
/// points), plus [`Error::InvalidClustering`] if
/// `clustering` is inconsistent, has fewer than 2 vertices, or covers more
/// vertices than `data` has points.
pub fn greedy_break_clustering<D: DataSource + ?Sized>(
    data: &D,
    clustering: &Clustering,
    config: &GreedyConfig,
) -> Result<Clustering> {
    let points = check_data(data, config, 2)?;
    if !clustering.is_valid() {
        return Err(Error::InvalidClustering(
            "labels exceed the cluster count".to_string(),
        ));
    }
    if clustering.vertices() < 2 {
        return Err(Error::InvalidClustering(format!(
            "{} vertices, at least 2 required",
            clustering.vertices()
        )));
    }
    if clustering.vertices() > points {
        return Err(Error::InvalidClustering(format!(
            "{} vertices but the data set has only {points} points",
            clustering.vertices()
        )));
    }

    let mut labels = try_filled(clustering.vertices(), None, "cluster labels")?;
    let stack = ClusterStack::from_clustering(clustering)?;

    let num_clusters = run(data, stack, &mut labels, config, LABEL_LIMIT)?;
    Ok(Clustering::from_parts_unchecked(labels, num_clusters))
}

fn check_data<D: DataSource + ?Sized>(
    data: &D,
    config: &GreedyConfig,
    min_points: usize,
) -> Result<usize> {
    config.validate()?;

    let points = data.point_count();
    let required = min_points.max(2);
    if points < required {
        return Err(Error::TooFewPoints { points, required });
    }
    if points >= MAX_VERTICES {
        return Err(Error::TooLargeProblem { points });
    }
    Ok(points)
}

fn run<D: DataSource + ?Sized>(
    data: &D,
    mut stack: ClusterStack,
    labels: &mut [Option<ClusterLabel>],
    config: &GreedyConfig,
    label_limit: u32,
) -> Result<usize> {
    let k = config.size_constraint();
    let mut markers = VertexMarkers::new(labels.len())?;
    let mut next_label = 0_u32;
    let mut splits = 0_usize;

    debug!(
        points = labels.len(),
        size_constraint = k,
        batch_assign = config.batch_assign(),
        initial_clusters = stack.len(),
        "starting greedy clustering"
    );

    while let Some(top) = stack.peek_mut() {
        if top.len() < 2 * k {
            let Some(item) = stack.pop() else { break };
            if item.is_empty() {
                continue;
            }
            if next_label == label_limit {
                return Err(Error::LabelSpaceExhausted { limit: label_limit });
            }
            for &v in &item.members {
                labels[v as usize] = Some(ClusterLabel(next_label));
            }
            next_label += 1;
        } else {
            let second = split(data, top, k, config.batch_assign(), &mut markers)?;
            stack.push(second)?;
            splits += 1;
        }
    }

    debug!(
        clusters = next_label,
        splits,
        stack_capacity = stack.capacity(),
        "greedy clustering finished"
    );
    Ok(next_label as usize)
}
