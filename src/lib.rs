//! SegmentForge: customer segmentation using deterministic K-Means clustering
//!
//! This library derives RFM (Recency, Frequency, Monetary) features from
//! customer purchase records, clusters them with a fully deterministic
//! K-Means++ variant, and maps each cluster onto a fixed business segment
//! taxonomy (`premium`, `regular`, `budget`, `at_risk`).

pub mod cli;
pub mod data;
pub mod error;
pub mod model;
pub mod segment;

// Re-export public items for easier access
pub use cli::Args;
pub use data::{build_rfm_features, normalize_features, CustomerRecord, FeatureSpace, RfmFeature};
pub use error::SegmentationError;
pub use model::{fit_kmeans, init_centroids, lloyd, KMeansModel, LloydFit};
pub use segment::{
    segment_customers, ClusterProfile, Segment, SegmentationConfig, SegmentationOutcome,
    SegmentedCustomer,
};

/// Common result type used throughout the library
pub type Result<T> = std::result::Result<T, SegmentationError>;
