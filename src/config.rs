//! Greedy clustering configuration

use crate::error::{Error, Result};

/// Parameters of a greedy divisive clustering run
///
/// # Examples
/// ```
/// use trueno_cluster::GreedyConfig;
///
/// let config = GreedyConfig::builder()
///     .with_size_constraint(4)
///     .with_batch_assign(true)
///     .build()
///     .unwrap();
/// assert_eq!(config.size_constraint(), 4);
/// assert!(config.batch_assign());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GreedyConfig {
    size_constraint: usize,
    batch_assign: bool,
}

impl GreedyConfig {
    /// Config with the given size constraint and per-member assignment
    ///
    /// # Errors
    /// Returns [`Error::InvalidSizeConstraint`] if `size_constraint < 2`.
    pub fn new(size_constraint: usize) -> Result<Self> {
        GreedyConfigBuilder::default()
            .with_size_constraint(size_constraint)
            .build()
    }

    /// Start from the defaults
    #[must_use]
    pub fn builder() -> GreedyConfigBuilder {
        GreedyConfigBuilder::default()
    }

    /// Minimum number of points in every emitted cluster
    #[must_use]
    pub const fn size_constraint(&self) -> usize {
        self.size_constraint
    }

    /// Whether leftover members are assigned in chunks of `size_constraint`
    #[must_use]
    pub const fn batch_assign(&self) -> bool {
        self.batch_assign
    }

    /// Check the invariants a deserialized config may have skipped
    ///
    /// # Errors
    /// Returns [`Error::InvalidSizeConstraint`] if `size_constraint < 2`.
    pub fn validate(&self) -> Result<()> {
        if self.size_constraint < 2 {
            return Err(Error::InvalidSizeConstraint {
                got: self.size_constraint,
            });
        }
        Ok(())
    }
}

impl Default for GreedyConfig {
    fn default() -> Self {
        Self {
            size_constraint: 2,
            batch_assign: false,
        }
    }
}

/// Configures and validates [`GreedyConfig`] instances.
#[derive(Debug, Clone, Default)]
pub struct GreedyConfigBuilder {
    config: GreedyConfig,
}

impl GreedyConfigBuilder {
    /// Set the minimum cluster size
    #[must_use]
    pub fn with_size_constraint(mut self, size_constraint: usize) -> Self {
        self.config.size_constraint = size_constraint;
        self
    }

    /// Assign leftover members in chunks instead of one at a time
    #[must_use]
    pub fn with_batch_assign(mut self, batch_assign: bool) -> Self {
        self.config.batch_assign = batch_assign;
        self
    }

    /// Validate and produce the config
    ///
    /// # Errors
    /// Returns [`Error::InvalidSizeConstraint`] if the size constraint is below 2.
    pub fn build(self) -> Result<GreedyConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
