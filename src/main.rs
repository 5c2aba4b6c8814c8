//! SegmentForge: customer segmentation CLI using deterministic K-Means on RFM features
//!
//! This is the main entrypoint that orchestrates record loading,
//! segmentation, reporting, and single-point prediction.

use std::fs;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use segmentforge::{segment_customers, Args, CustomerRecord, SegmentationOutcome};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // Parse command-line arguments
    let args = Args::parse();

    if args.verbose {
        println!("SegmentForge - Customer Segmentation using K-Means");
        println!("==================================================\n");
    }

    // Check if in prediction mode
    if let Some(rfm_values) = args.parse_rfm_values()? {
        run_prediction_mode(&args, rfm_values)?;
    } else {
        run_full_pipeline(&args)?;
    }

    Ok(())
}

/// Load customer records from a JSON array file.
fn load_records(path: &str) -> Result<Vec<CustomerRecord>> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    let records: Vec<CustomerRecord> =
        serde_json::from_str(&raw).with_context(|| format!("parsing {path}"))?;
    Ok(records)
}

/// Run prediction mode for a single customer
fn run_prediction_mode(args: &Args, rfm_values: segmentforge::RfmFeature) -> Result<()> {
    println!("=== Prediction Mode ===");
    println!(
        "Input RFM values: R={}, F={}, M={}",
        rfm_values.recency, rfm_values.frequency, rfm_values.monetary
    );

    let start_time = Instant::now();

    if args.verbose {
        println!("\nLoading training data from: {}", args.input);
    }
    let records = load_records(&args.input)?;

    if args.verbose {
        println!("Loaded {} customers", records.len());
        println!("\nSegmenting into {} clusters...", args.clusters);
    }

    let outcome = segment_customers(&records, &args.segmentation_config()?)?;
    let (Some(model), Some(space)) = (&outcome.model, &outcome.feature_space) else {
        anyhow::bail!("no customers in {}; cannot predict against an empty batch", args.input);
    };

    let cluster = model.predict(&space.scale(&rfm_values));
    let segment = describe_predicted_segment(&outcome.profiles, cluster);

    let elapsed = start_time.elapsed();

    println!("\n✓ Predicted cluster: {cluster}");
    println!("  Segment: {segment}");
    println!("  Processing time: {:.2}s", elapsed.as_secs_f64());

    let cluster_sizes = model.cluster_sizes();
    let cluster_percentage = (cluster_sizes[cluster] as f64 / records.len() as f64) * 100.0;

    println!("\nCluster {cluster} details:");
    println!(
        "  Size: {} customers ({:.1}% of total)",
        cluster_sizes[cluster], cluster_percentage
    );
    println!(
        "  Centroid (normalized): R={:.2}, F={:.2}, M={:.2}",
        model.centroids[[cluster, 0]],
        model.centroids[[cluster, 1]],
        model.centroids[[cluster, 2]]
    );

    Ok(())
}

/// Run full segmentation pipeline
fn run_full_pipeline(args: &Args) -> Result<()> {
    println!("=== Customer Segmentation ===\n");

    let start_time = Instant::now();

    if args.verbose {
        println!("Step 1: Loading customer records");
        println!("  Input file: {}", args.input);
    }

    let load_start = Instant::now();
    let records = load_records(&args.input)?;
    let load_time = load_start.elapsed();

    println!("✓ Data loaded: {} customers", records.len());
    if args.verbose {
        println!("  Loading time: {:.2}s", load_time.as_secs_f64());
    }

    if args.verbose {
        println!("\nStep 2: Clustering and labeling");
        println!("  Number of clusters: {}", args.clusters);
        println!("  Max iterations: {}", args.max_iters);
        println!("  Tolerance: {}", args.tolerance);
    }

    let fit_start = Instant::now();
    let outcome = segment_customers(&records, &args.segmentation_config()?)?;
    let fit_time = fit_start.elapsed();

    println!("✓ Segmentation complete");
    if args.verbose {
        println!("  Fitting time: {:.2}s", fit_time.as_secs_f64());
        if let Some(model) = &outcome.model {
            println!(
                "  Iterations: {} (converged: {})",
                model.iterations, model.converged
            );
            println!("  Inertia: {:.2}", model.inertia);
        }
    }

    print_segment_report(&outcome);

    if let (Some(model), Some(space)) = (&outcome.model, &outcome.feature_space) {
        let silhouette_score =
            model.compute_silhouette_sample(&space.features, 100.min(space.len()));
        println!("\nSilhouette score (sample): {silhouette_score:.3}");
        println!("Within-cluster sum of squares: {:.2}", model.inertia);
    }

    let total_time = start_time.elapsed();
    println!("\n=== Pipeline Complete ===");
    println!("Total processing time: {:.2}s", total_time.as_secs_f64());

    Ok(())
}

/// Segment line for a predicted cluster.
///
/// A cluster that received no members during fitting carries no profile and
/// therefore no label; report that instead of defaulting to a real segment.
fn describe_predicted_segment(
    profiles: &[segmentforge::ClusterProfile],
    cluster: usize,
) -> String {
    match profiles.iter().find(|p| p.cluster == cluster) {
        Some(profile) => profile.segment.to_string(),
        None => format!("unlabeled (cluster {cluster} received no customers during fitting)"),
    }
}

/// Print per-segment counts and average RFM profiles.
fn print_segment_report(outcome: &SegmentationOutcome) {
    if outcome.customers.is_empty() {
        println!("\nNo customers to segment.");
        return;
    }

    println!("\n=== Segment Distribution ===");
    let total = outcome.customers.len();
    for profile in &outcome.profiles {
        let percentage = (profile.size as f64 / total as f64) * 100.0;
        println!(
            "{:<8} {:>5} customers ({:>5.1}%)  avg R={:.0}d F={:.1} M={:.2}",
            profile.segment,
            profile.size,
            percentage,
            profile.avg_raw.recency,
            profile.avg_raw.frequency,
            profile.avg_raw.monetary
        );
    }
}
