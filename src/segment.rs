//! Segment taxonomy and the end-to-end segmentation pipeline
//!
//! Labels are assigned from cluster statistics sorted by average monetary
//! value, never from raw cluster indices, so the output does not depend on
//! which centroid index Lloyd's iteration happened to converge to.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::{build_rfm_features, normalize_features, CustomerRecord, FeatureSpace, RfmFeature};
use crate::model::{fit_kmeans, KMeansModel};
use crate::Result;

/// Business segment assigned to a customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    Premium,
    Regular,
    Budget,
    AtRisk,
}

impl Segment {
    /// Stable wire name of the segment.
    pub fn as_str(&self) -> &'static str {
        match self {
            Segment::Premium => "premium",
            Segment::Regular => "regular",
            Segment::Budget => "budget",
            Segment::AtRisk => "at_risk",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Tuning knobs for the segmentation pipeline.
#[derive(Debug, Clone)]
pub struct SegmentationConfig {
    /// Number of clusters; the four-label taxonomy assumes 4
    pub clusters: usize,
    /// Iteration cap for Lloyd's loop
    pub max_iterations: usize,
    /// Centroid movement tolerance in normalized units
    pub tolerance: f64,
    /// Reference "now" for recency; `None` uses the invocation time.
    /// Inject a fixed value for reproducible results in tests.
    pub reference_time: Option<DateTime<Utc>>,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            clusters: 4,
            max_iterations: 100,
            tolerance: 0.01,
            reference_time: None,
        }
    }
}

/// Aggregate statistics for one non-empty cluster, used for labeling and
/// reported for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterProfile {
    /// Cluster index as assigned by the model
    pub cluster: usize,
    /// Member count
    pub size: usize,
    /// Average raw RFM of the members
    pub avg_raw: RfmFeature,
    /// Average normalized RFM of the members; labeling thresholds apply here
    pub avg_normalized: RfmFeature,
    /// Label every member inherits
    pub segment: Segment,
}

/// One input record with its computed features and assigned segment.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentedCustomer {
    pub record: CustomerRecord,
    pub rfm: RfmFeature,
    pub cluster: usize,
    pub segment: Segment,
}

/// Full pipeline output: labeled customers in input order plus the cluster
/// diagnostics the labels were derived from.
#[derive(Debug)]
pub struct SegmentationOutcome {
    /// Same count and order as the input records
    pub customers: Vec<SegmentedCustomer>,
    /// Non-empty clusters, sorted descending by average monetary value
    pub profiles: Vec<ClusterProfile>,
    /// Fitted model; `None` when the input was empty
    pub model: Option<KMeansModel>,
    /// Normalized feature space; `None` when the input was empty
    pub feature_space: Option<FeatureSpace>,
}

/// Segment a batch of customers.
///
/// Pure function of its inputs: caller data is never mutated, nothing is
/// cached across calls, and identical input always yields identical output.
/// An empty input returns an empty outcome; the only hard failure is a
/// cluster count the input cannot satisfy.
pub fn segment_customers(
    records: &[CustomerRecord],
    config: &SegmentationConfig,
) -> Result<SegmentationOutcome> {
    if records.is_empty() {
        return Ok(SegmentationOutcome {
            customers: Vec::new(),
            profiles: Vec::new(),
            model: None,
            feature_space: None,
        });
    }

    let reference_time = config.reference_time.unwrap_or_else(Utc::now);
    let raw = build_rfm_features(records, reference_time);
    let space = normalize_features(raw);
    let model = fit_kmeans(
        &space.features,
        config.clusters,
        config.max_iterations,
        config.tolerance,
    )?;

    debug!(
        clusters = config.clusters,
        iterations = model.iterations,
        converged = model.converged,
        "k-means fit complete"
    );

    let profiles = build_profiles(&space, &model);

    let mut segment_by_cluster = vec![Segment::Regular; config.clusters];
    for profile in &profiles {
        segment_by_cluster[profile.cluster] = profile.segment;
    }

    let customers = records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let cluster = model.labels[i];
            SegmentedCustomer {
                record: record.clone(),
                rfm: space.raw[i],
                cluster,
                segment: segment_by_cluster[cluster],
            }
        })
        .collect();

    Ok(SegmentationOutcome {
        customers,
        profiles,
        model: Some(model),
        feature_space: Some(space),
    })
}

/// Compute per-cluster averages, sort descending by average monetary value,
/// and apply the labeling rules. Empty clusters produce no profile.
fn build_profiles(space: &FeatureSpace, model: &KMeansModel) -> Vec<ClusterProfile> {
    let k = model.n_clusters;
    let mut raw_sums = vec![[0.0f64; 3]; k];
    let mut norm_sums = vec![[0.0f64; 3]; k];
    let mut counts = vec![0usize; k];

    for (row, &cluster) in model.labels.iter().enumerate() {
        counts[cluster] += 1;
        let raw = &space.raw[row];
        raw_sums[cluster][0] += raw.recency;
        raw_sums[cluster][1] += raw.frequency;
        raw_sums[cluster][2] += raw.monetary;
        for dim in 0..3 {
            norm_sums[cluster][dim] += space.features[[row, dim]];
        }
    }

    let mut profiles: Vec<ClusterProfile> = (0..k)
        .filter(|&cluster| counts[cluster] > 0)
        .map(|cluster| {
            let n = counts[cluster] as f64;
            ClusterProfile {
                cluster,
                size: counts[cluster],
                avg_raw: RfmFeature {
                    recency: raw_sums[cluster][0] / n,
                    frequency: raw_sums[cluster][1] / n,
                    monetary: raw_sums[cluster][2] / n,
                },
                avg_normalized: RfmFeature {
                    recency: norm_sums[cluster][0] / n,
                    frequency: norm_sums[cluster][1] / n,
                    monetary: norm_sums[cluster][2] / n,
                },
                // Placeholder until the sorted rank is known
                segment: Segment::Regular,
            }
        })
        .collect();

    // Stable sort: monetary ties keep cluster-index order
    profiles.sort_by(|a, b| b.avg_normalized.monetary.total_cmp(&a.avg_normalized.monetary));

    for rank in 0..profiles.len() {
        profiles[rank].segment = label_for(rank, &profiles[rank].avg_normalized);
    }

    profiles
}

/// Labeling rules, applied in priority order to monetary-sorted clusters.
///
/// Rank 0 qualifies as premium only above the 0.5 monetary threshold;
/// otherwise it falls through to the remaining rules like any other cluster.
fn label_for(rank: usize, avg: &RfmFeature) -> Segment {
    if rank == 0 && avg.monetary > 0.5 {
        Segment::Premium
    } else if avg.recency > 0.6 && avg.frequency < 0.4 {
        Segment::AtRisk
    } else if avg.monetary < 0.4 {
        Segment::Budget
    } else {
        Segment::Regular
    }
}
