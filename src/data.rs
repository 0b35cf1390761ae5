//! Distance oracles consumed by the clustering engine
//!
//! The engine never looks at raw data. It asks a [`DataSource`] for the
//! number of points, for farthest members within a subset, and for rows of
//! distances between query points and a subset. Implementations only have to
//! provide [`DataSource::distance`]; the batch queries have exhaustive
//! default implementations that a backend with an index can override.

use crate::error::DataSourceError;

/// Abstraction over a collection of points that can yield pairwise distances.
///
/// # Examples
/// ```
/// use trueno_cluster::{DataSource, DataSourceError};
///
/// struct Line(Vec<f64>);
///
/// impl DataSource for Line {
///     fn point_count(&self) -> usize { self.0.len() }
///     fn distance(&self, a: u32, b: u32) -> Result<f64, DataSourceError> {
///         let x = self.0.get(a as usize).ok_or(DataSourceError::OutOfBounds { index: a as usize, len: self.0.len() })?;
///         let y = self.0.get(b as usize).ok_or(DataSourceError::OutOfBounds { index: b as usize, len: self.0.len() })?;
///         Ok((x - y).abs())
///     }
/// }
///
/// let line = Line(vec![0.0, 1.0, 5.0]);
/// let far = line.farthest_points(&[0], &[0, 1, 2])?;
/// assert_eq!(far, vec![(2, 5.0)]);
/// # Ok::<(), DataSourceError>(())
/// ```
pub trait DataSource {
    /// Number of points in the source.
    fn point_count(&self) -> usize;

    /// Distance between two points.
    ///
    /// # Errors
    /// Returns an error if either id is out of bounds or the backend fails.
    fn distance(&self, a: u32, b: u32) -> Result<f64, DataSourceError>;

    /// For each query point, the farthest point in `members` and its distance.
    ///
    /// The default scans every member, skips the query point itself and keeps
    /// the first strict maximum.
    ///
    /// # Errors
    /// Returns an error if a distance query fails or `members` holds no point
    /// other than the query.
    fn farthest_points(
        &self,
        query: &[u32],
        members: &[u32],
    ) -> Result<Vec<(u32, f64)>, DataSourceError> {
        let mut out = Vec::with_capacity(query.len());
        for &q in query {
            let mut best: Option<(u32, f64)> = None;
            for &m in members {
                if m == q {
                    continue;
                }
                let d = self.distance(q, m)?;
                if best.map_or(true, |(_, best_d)| d > best_d) {
                    best = Some((m, d));
                }
            }
            let found = best.ok_or_else(|| {
                DataSourceError::InvalidResponse(format!(
                    "no member other than {q} to search for a farthest point"
                ))
            })?;
            out.push(found);
        }
        Ok(out)
    }

    /// Distances from each query point to each member, row-major.
    ///
    /// Row `i` holds the distances from `query[i]` to `members[..]`.
    ///
    /// # Errors
    /// Returns an error if any distance query fails; nothing is returned then.
    fn row_distances(&self, query: &[u32], members: &[u32]) -> Result<Vec<f64>, DataSourceError> {
        let mut out = Vec::with_capacity(query.len() * members.len());
        for &q in query {
            for &m in members {
                out.push(self.distance(q, m)?);
            }
        }
        Ok(out)
    }
}

impl<D: DataSource + ?Sized> DataSource for &D {
    fn point_count(&self) -> usize {
        (**self).point_count()
    }

    fn distance(&self, a: u32, b: u32) -> Result<f64, DataSourceError> {
        (**self).distance(a, b)
    }

    fn farthest_points(
        &self,
        query: &[u32],
        members: &[u32],
    ) -> Result<Vec<(u32, f64)>, DataSourceError> {
        (**self).farthest_points(query, members)
    }

    fn row_distances(&self, query: &[u32], members: &[u32]) -> Result<Vec<f64>, DataSourceError> {
        (**self).row_distances(query, members)
    }
}

/// Dense row-major points under Euclidean distance
///
/// # Example
///
/// ```
/// use trueno_cluster::{DataSource, DenseDataSet};
///
/// let data = DenseDataSet::new(2, vec![0.0, 0.0, 3.0, 4.0]).unwrap();
/// assert_eq!(data.point_count(), 2);
/// assert_eq!(data.distance(0, 1).unwrap(), 5.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DenseDataSet {
    dimension: usize,
    values: Vec<f64>,
}

impl DenseDataSet {
    /// Wrap `values` as consecutive points of `dimension` coordinates each
    ///
    /// # Errors
    /// Returns [`DataSourceError::DimensionMismatch`] if `values.len()` is not
    /// a multiple of `dimension`, or `dimension` is zero.
    pub fn new(dimension: usize, values: Vec<f64>) -> Result<Self, DataSourceError> {
        if dimension == 0 || values.len() % dimension != 0 {
            return Err(DataSourceError::DimensionMismatch {
                left: values.len(),
                right: dimension,
            });
        }
        Ok(Self { dimension, values })
    }

    /// Build from a list of points
    ///
    /// # Errors
    /// Returns [`DataSourceError::DimensionMismatch`] if the points disagree
    /// on dimension.
    pub fn from_points(points: &[Vec<f64>]) -> Result<Self, DataSourceError> {
        let dimension = points.first().map_or(1, Vec::len);
        let mut values = Vec::with_capacity(points.len() * dimension);
        for point in points {
            if point.len() != dimension {
                return Err(DataSourceError::DimensionMismatch {
                    left: dimension,
                    right: point.len(),
                });
            }
            values.extend_from_slice(point);
        }
        Self::new(dimension, values)
    }

    /// Coordinates per point
    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    fn point(&self, id: u32) -> Result<&[f64], DataSourceError> {
        let start = id as usize * self.dimension;
        self.values
            .get(start..start + self.dimension)
            .ok_or(DataSourceError::OutOfBounds {
                index: id as usize,
                len: self.point_count(),
            })
    }
}

impl DataSource for DenseDataSet {
    fn point_count(&self) -> usize {
        self.values.len() / self.dimension
    }

    fn distance(&self, a: u32, b: u32) -> Result<f64, DataSourceError> {
        let x = self.point(a)?;
        let y = self.point(b)?;
        Ok(x.iter()
            .zip(y)
            .map(|(p, q)| (p - q) * (p - q))
            .sum::<f64>()
            .sqrt())
    }
}

/// Explicit square distance matrix
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    points: usize,
    distances: Vec<f64>,
}

impl DistanceMatrix {
    /// Wrap a row-major `points × points` matrix
    ///
    /// # Errors
    /// Returns [`DataSourceError::DimensionMismatch`] if `distances` is not
    /// `points * points` long.
    pub fn new(points: usize, distances: Vec<f64>) -> Result<Self, DataSourceError> {
        if distances.len() != points * points {
            return Err(DataSourceError::DimensionMismatch {
                left: distances.len(),
                right: points * points,
            });
        }
        Ok(Self { points, distances })
    }

    /// Evaluate `f` on every pair to fill the matrix
    pub fn from_fn(points: usize, mut f: impl FnMut(usize, usize) -> f64) -> Self {
        let mut distances = Vec::with_capacity(points * points);
        for a in 0..points {
            for b in 0..points {
                distances.push(f(a, b));
            }
        }
        Self { points, distances }
    }
}

impl DataSource for DistanceMatrix {
    fn point_count(&self) -> usize {
        self.points
    }

    fn distance(&self, a: u32, b: u32) -> Result<f64, DataSourceError> {
        let (a, b) = (a as usize, b as usize);
        if a >= self.points || b >= self.points {
            return Err(DataSourceError::OutOfBounds {
                index: a.max(b),
                len: self.points,
            });
        }
        Ok(self.distances[a * self.points + b])
    }
}
