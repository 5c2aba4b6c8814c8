//! Command-line interface definitions and argument parsing

use chrono::{DateTime, Utc};
use clap::Parser;

use crate::data::RfmFeature;
use crate::segment::SegmentationConfig;

/// Customer segmentation CLI using deterministic K-Means clustering on RFM data
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input JSON file (an array of customer records)
    #[arg(short, long, default_value = "customers.json")]
    pub input: String,

    /// Number of clusters for K-Means
    #[arg(short = 'k', long, default_value = "4")]
    pub clusters: usize,

    /// Prediction mode: provide R,F,M values as comma-separated string
    /// Example: --predict "30,10,500.0" for Recency=30, Frequency=10, Monetary=500.0
    #[arg(short, long)]
    pub predict: Option<String>,

    /// Maximum iterations for K-Means algorithm
    #[arg(long, default_value = "100")]
    pub max_iters: usize,

    /// Tolerance for K-Means convergence, in normalized units
    #[arg(long, default_value = "0.01")]
    pub tolerance: f64,

    /// Reference date for recency computation (RFC 3339); defaults to now
    #[arg(long)]
    pub reference_date: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Parse RFM values from the predict string
    /// Expected format: "recency,frequency,monetary"
    pub fn parse_rfm_values(&self) -> anyhow::Result<Option<RfmFeature>> {
        let Some(ref predict_str) = self.predict else {
            return Ok(None);
        };

        let parts: Vec<&str> = predict_str.split(',').collect();
        if parts.len() != 3 {
            anyhow::bail!("Predict values must be in format 'recency,frequency,monetary'");
        }

        let recency: f64 = parts[0]
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid recency value: {}", parts[0]))?;
        let frequency: f64 = parts[1]
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid frequency value: {}", parts[1]))?;
        let monetary: f64 = parts[2]
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid monetary value: {}", parts[2]))?;

        Ok(Some(RfmFeature {
            recency,
            frequency,
            monetary,
        }))
    }

    /// Build the pipeline configuration from the parsed arguments.
    pub fn segmentation_config(&self) -> anyhow::Result<SegmentationConfig> {
        let reference_time = match &self.reference_date {
            Some(raw) => Some(
                DateTime::parse_from_rfc3339(raw.trim())
                    .map_err(|e| anyhow::anyhow!("Invalid reference date '{raw}': {e}"))?
                    .with_timezone(&Utc),
            ),
            None => None,
        };

        Ok(SegmentationConfig {
            clusters: self.clusters,
            max_iterations: self.max_iters,
            tolerance: self.tolerance,
            reference_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> Args {
        Args {
            input: "test.json".to_string(),
            clusters: 4,
            predict: None,
            max_iters: 100,
            tolerance: 0.01,
            reference_date: None,
            verbose: false,
        }
    }

    #[test]
    fn test_parse_rfm_values() {
        let mut args = args();
        args.predict = Some("30,10,500.0".to_string());

        let result = args.parse_rfm_values().unwrap();
        assert_eq!(
            result,
            Some(RfmFeature {
                recency: 30.0,
                frequency: 10.0,
                monetary: 500.0
            })
        );

        args.predict = None;
        let result = args.parse_rfm_values().unwrap();
        assert_eq!(result, None);

        args.predict = Some("invalid".to_string());
        assert!(args.parse_rfm_values().is_err());
    }

    #[test]
    fn test_segmentation_config_from_args() {
        let mut args = args();
        args.reference_date = Some("2024-06-01T00:00:00Z".to_string());

        let config = args.segmentation_config().unwrap();
        assert_eq!(config.clusters, 4);
        assert_eq!(config.max_iterations, 100);
        assert!(config.reference_time.is_some());

        args.reference_date = Some("not-a-date".to_string());
        assert!(args.segmentation_config().is_err());
    }
}
