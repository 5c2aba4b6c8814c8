//! Customer records and RFM feature computation

use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

/// A customer purchase summary as supplied by the caller.
///
/// Numeric fields tolerate malformed input: a JSON number, a numeric string,
/// or garbage are all accepted, with garbage mapping to `None`. Missing
/// values are coerced to zero during feature computation rather than
/// rejected, so a bad record never fails the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    /// Lifetime purchase count
    #[serde(default, deserialize_with = "lenient_count")]
    pub total_purchases: Option<u64>,
    /// Lifetime spend
    #[serde(default, deserialize_with = "lenient_amount")]
    pub total_spent: Option<f64>,
    /// Timestamp of the most recent purchase; absent means no purchase history
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub last_purchase_date: Option<DateTime<Utc>>,
}

/// Raw RFM values for one customer, in input order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RfmFeature {
    /// Days since last purchase relative to the reference time
    pub recency: f64,
    /// Number of purchases
    pub frequency: f64,
    /// Total amount spent
    pub monetary: f64,
}

/// RFM features normalized into the unit cube, plus the scaling context
/// needed to place new points into the same space.
#[derive(Debug, Clone)]
pub struct FeatureSpace {
    /// Min-max normalized features, shape (n_customers, 3), each entry in [0, 1]
    pub features: Array2<f64>,
    /// Per-dimension divisors (recency, frequency, monetary), each floored at 1.0
    pub maxima: [f64; 3],
    /// Raw RFM values in the same row order
    pub raw: Vec<RfmFeature>,
}

impl FeatureSpace {
    /// Scale a raw RFM triple into this batch's normalized space.
    pub fn scale(&self, rfm: &RfmFeature) -> Array1<f64> {
        Array1::from_vec(vec![
            rfm.recency / self.maxima[0],
            rfm.frequency / self.maxima[1],
            rfm.monetary / self.maxima[2],
        ])
    }

    /// Number of customers in the batch.
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// True when the batch holds no customers.
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

/// Derive RFM features from customer records, order-preserving.
///
/// Recency is whole days between `reference_time` and the last purchase,
/// clamped at zero. A record with no `last_purchase_date` is scored as if it
/// purchased at `reference_time` (recency 0). That default biases customers
/// with no history toward the best recency score; it is kept intentionally
/// to match the established segmentation behavior and is logged per record.
pub fn build_rfm_features(
    records: &[CustomerRecord],
    reference_time: DateTime<Utc>,
) -> Vec<RfmFeature> {
    records
        .iter()
        .map(|record| {
            let recency = match record.last_purchase_date {
                Some(date) => (reference_time - date).num_days().max(0) as f64,
                None => {
                    warn!(customer = %record.id, "no last_purchase_date, treating as purchased now");
                    0.0
                }
            };

            let frequency = match record.total_purchases {
                Some(count) => count as f64,
                None => {
                    warn!(customer = %record.id, "missing or malformed total_purchases, using 0");
                    0.0
                }
            };

            let monetary = match record.total_spent {
                Some(amount) => amount.max(0.0),
                None => {
                    warn!(customer = %record.id, "missing or malformed total_spent, using 0");
                    0.0
                }
            };

            RfmFeature {
                recency,
                frequency,
                monetary,
            }
        })
        .collect()
}

/// Min-max normalize RFM features into the unit cube.
///
/// Each dimension is divided by its observed maximum, floored at 1.0 so an
/// all-zero dimension divides by one instead of zero. Row order is preserved.
pub fn normalize_features(raw: Vec<RfmFeature>) -> FeatureSpace {
    let max_recency = raw.iter().map(|f| f.recency).fold(1.0_f64, f64::max);
    let max_frequency = raw.iter().map(|f| f.frequency).fold(1.0_f64, f64::max);
    let max_monetary = raw.iter().map(|f| f.monetary).fold(1.0_f64, f64::max);

    let mut data = Vec::with_capacity(raw.len() * 3);
    for f in &raw {
        data.push(f.recency / max_recency);
        data.push(f.frequency / max_frequency);
        data.push(f.monetary / max_monetary);
    }

    let features = Array2::from_shape_vec((raw.len(), 3), data)
        .expect("row count times three always matches the buffer length");

    FeatureSpace {
        features,
        maxima: [max_recency, max_frequency, max_monetary],
        raw,
    }
}

fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_number(deserializer)?
        .filter(|n| n.is_finite() && *n >= 0.0)
        .map(|n| n.trunc() as u64))
}

fn lenient_amount<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_number(deserializer)?.filter(|n| n.is_finite()))
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
        Other(serde_json::Value),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Number(n)) => Some(n),
        Some(Raw::Text(s)) => s.trim().parse().ok(),
        Some(Raw::Other(_)) | None => None,
    })
}

fn lenient_datetime<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
        .map(|dt| dt.with_timezone(&Utc)))
}
