//! Deterministic K-Means clustering over normalized RFM features
//!
//! Centroid initialization uses a reproducible farthest-point rule instead
//! of random sampling, so repeated runs on identical input always produce
//! identical clusters. That is a correctness requirement for segmentation:
//! a customer must not flip segments between two renders of the same data.

use ndarray::{Array1, Array2, ArrayView1};

use crate::error::SegmentationError;
use crate::Result;

/// Fitted K-Means model with assignments and diagnostics.
#[derive(Debug, Clone)]
pub struct KMeansModel {
    /// Number of clusters
    pub n_clusters: usize,
    /// Cluster assignment per input row
    pub labels: Array1<usize>,
    /// Final centroids in normalized space, shape (k, 3)
    pub centroids: Array2<f64>,
    /// Within-cluster sum of squares
    pub inertia: f64,
    /// Iterations actually run
    pub iterations: usize,
    /// False when the iteration cap stopped the run before the tolerance was met
    pub converged: bool,
}

impl KMeansModel {
    /// Assign a normalized point to its nearest centroid.
    ///
    /// Exact distance ties go to the lowest cluster index.
    pub fn predict(&self, point: &Array1<f64>) -> usize {
        nearest_centroid(&point.view(), &self.centroids)
    }

    /// Member count per cluster, indexed by cluster.
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.n_clusters];
        for &label in self.labels.iter() {
            sizes[label] += 1;
        }
        sizes
    }

    /// Compute a silhouette coefficient over the first `sample_size` points.
    ///
    /// Restricting to a sample keeps this O(sample²) regardless of input
    /// size; it is a diagnostic, not part of the segmentation contract.
    pub fn compute_silhouette_sample(&self, features: &Array2<f64>, sample_size: usize) -> f64 {
        let n_samples = features.nrows().min(sample_size);
        if n_samples < 2 {
            return 0.0;
        }

        let mut silhouette_sum = 0.0;

        for i in 0..n_samples {
            let point = features.row(i);
            let cluster_label = self.labels[i];

            let mut same_cluster_distances = Vec::new();
            let mut other_cluster_distances: Vec<Vec<f64>> = vec![Vec::new(); self.n_clusters];

            for j in 0..n_samples {
                if i == j {
                    continue;
                }

                let distance = euclidean_distance(&point, &features.row(j));
                let other_label = self.labels[j];

                if other_label == cluster_label {
                    same_cluster_distances.push(distance);
                } else {
                    other_cluster_distances[other_label].push(distance);
                }
            }

            let a_i = if same_cluster_distances.is_empty() {
                0.0
            } else {
                same_cluster_distances.iter().sum::<f64>() / same_cluster_distances.len() as f64
            };

            let b_i = other_cluster_distances
                .iter()
                .filter(|distances| !distances.is_empty())
                .map(|distances| distances.iter().sum::<f64>() / distances.len() as f64)
                .fold(f64::INFINITY, f64::min);

            let silhouette_i = if b_i.is_infinite() || (a_i == 0.0 && b_i == 0.0) {
                0.0
            } else {
                (b_i - a_i) / a_i.max(b_i)
            };

            silhouette_sum += silhouette_i;
        }

        silhouette_sum / n_samples as f64
    }
}

/// Pick `k` starting centroids deterministically.
///
/// The first centroid is the row sitting at the median position when rows
/// are ordered descending by monetary value (stable sort, so ties keep
/// input order). Each further centroid is the row whose minimum distance to
/// the already-chosen centroids is largest, with the earliest row winning
/// exact ties.
///
/// `k` is validated against the number of distinct rows, not the row count:
/// duplicate points cannot seed separate centroids, and the farthest-point
/// rule would otherwise re-select an already-chosen point and produce
/// byte-identical centroids that permanently shadow each other.
pub fn init_centroids(features: &Array2<f64>, k: usize) -> Result<Array2<f64>> {
    let n = features.nrows();
    let distinct = count_distinct_rows(features);
    if k == 0 || k > distinct {
        return Err(SegmentationError::invalid_cluster_count(k, distinct));
    }

    // Monetary is column 2 of the normalized feature matrix
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| features[[b, 2]].total_cmp(&features[[a, 2]]));
    let median_row = order[n / 2];

    let mut chosen = vec![median_row];

    while chosen.len() < k {
        let mut max_dist = -1.0;
        let mut farthest = 0;

        for row in 0..n {
            let point = features.row(row);
            let min_dist_to_chosen = chosen
                .iter()
                .map(|&c| euclidean_distance(&point, &features.row(c)))
                .fold(f64::INFINITY, f64::min);

            if min_dist_to_chosen > max_dist {
                max_dist = min_dist_to_chosen;
                farthest = row;
            }
        }

        chosen.push(farthest);
    }

    let mut centroids = Array2::zeros((k, 3));
    for (c, &row) in chosen.iter().enumerate() {
        centroids.row_mut(c).assign(&features.row(row));
    }

    Ok(centroids)
}

/// Result of running Lloyd's iteration from a given set of centroids.
#[derive(Debug, Clone)]
pub struct LloydFit {
    pub centroids: Array2<f64>,
    pub labels: Array1<usize>,
    pub iterations: usize,
    pub converged: bool,
}

/// Run Lloyd's assign/update loop until convergence or the iteration cap.
///
/// A cluster that receives zero members keeps its previous centroid
/// unchanged, so centroid state never contains NaN. Hitting the cap is not
/// an error; the partition at that point is returned as final.
pub fn lloyd(
    features: &Array2<f64>,
    mut centroids: Array2<f64>,
    max_iters: usize,
    tolerance: f64,
) -> LloydFit {
    let n = features.nrows();
    let k = centroids.nrows();
    let mut labels = Array1::zeros(n);
    let mut iterations = 0;
    let mut converged = false;

    while iterations < max_iters {
        // Assignment pass: ties go to the lowest cluster index
        for row in 0..n {
            labels[row] = nearest_centroid(&features.row(row), &centroids);
        }

        // Update pass: dimension-wise mean of each cluster's members
        let mut sums = Array2::<f64>::zeros((k, 3));
        let mut counts = vec![0usize; k];
        for row in 0..n {
            let cluster = labels[row];
            counts[cluster] += 1;
            for dim in 0..3 {
                sums[[cluster, dim]] += features[[row, dim]];
            }
        }

        let mut moved = false;
        for cluster in 0..k {
            if counts[cluster] == 0 {
                // Empty cluster: previous centroid stays put
                continue;
            }
            for dim in 0..3 {
                let updated = sums[[cluster, dim]] / counts[cluster] as f64;
                if (updated - centroids[[cluster, dim]]).abs() > tolerance {
                    moved = true;
                }
                centroids[[cluster, dim]] = updated;
            }
        }

        iterations += 1;

        if !moved {
            converged = true;
            break;
        }
    }

    LloydFit {
        centroids,
        labels,
        iterations,
        converged,
    }
}

/// Fit a deterministic K-Means model on normalized features.
///
/// # Arguments
/// * `features` - Normalized feature matrix, shape (n, 3)
/// * `k` - Number of clusters; must not exceed the number of distinct rows
/// * `max_iters` - Iteration cap for Lloyd's loop
/// * `tolerance` - Per-dimension centroid movement below which iteration stops
pub fn fit_kmeans(
    features: &Array2<f64>,
    k: usize,
    max_iters: usize,
    tolerance: f64,
) -> Result<KMeansModel> {
    let centroids = init_centroids(features, k)?;
    let fit = lloyd(features, centroids, max_iters, tolerance);
    let inertia = compute_inertia(features, &fit.labels, &fit.centroids);

    Ok(KMeansModel {
        n_clusters: k,
        labels: fit.labels,
        centroids: fit.centroids,
        inertia,
        iterations: fit.iterations,
        converged: fit.converged,
    })
}

/// Number of distinct coordinate rows in the feature matrix.
fn count_distinct_rows(features: &Array2<f64>) -> usize {
    let n = features.nrows();
    (0..n)
        .filter(|&row| (0..row).all(|prev| features.row(prev) != features.row(row)))
        .count()
}

/// Index of the centroid nearest to `point`, lowest index winning ties.
fn nearest_centroid(point: &ArrayView1<f64>, centroids: &Array2<f64>) -> usize {
    let mut min_distance = f64::INFINITY;
    let mut closest = 0;

    for (cluster, centroid) in centroids.outer_iter().enumerate() {
        let distance: f64 = point
            .iter()
            .zip(centroid.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum();

        if distance < min_distance {
            min_distance = distance;
            closest = cluster;
        }
    }

    closest
}

/// Compute within-cluster sum of squares (inertia)
fn compute_inertia(features: &Array2<f64>, labels: &Array1<usize>, centroids: &Array2<f64>) -> f64 {
    let mut inertia = 0.0;

    for (row, &cluster) in labels.iter().enumerate() {
        let point = features.row(row);
        let centroid = centroids.row(cluster);
        inertia += point
            .iter()
            .zip(centroid.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>();
    }

    inertia
}

/// Calculate Euclidean distance between two points
fn euclidean_distance(point1: &ArrayView1<f64>, point2: &ArrayView1<f64>) -> f64 {
    point1
        .iter()
        .zip(point2.iter())
        .map(|(a, b)| (a - b).powi(2))
        .sum::<f64>()
        .sqrt()
}
