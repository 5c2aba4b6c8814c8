//! Error types for the segmentation pipeline

use thiserror::Error;

/// Errors surfaced by the segmentation engine.
///
/// Malformed numeric fields are never errors: they are coerced to zero at
/// feature-build time and logged. Only structural misconfiguration fails.
#[derive(Debug, Error)]
pub enum SegmentationError {
    /// The requested cluster count cannot be satisfied by the input.
    #[error("invalid cluster count: requested {requested}, but only {available} distinct record(s) available")]
    InvalidClusterCount {
        /// Number of clusters asked for
        requested: usize,
        /// Number of distinct input records supplied
        available: usize,
    },
}

impl SegmentationError {
    /// Create an InvalidClusterCount error.
    pub fn invalid_cluster_count(requested: usize, available: usize) -> Self {
        Self::InvalidClusterCount {
            requested,
            available,
        }
    }
}
