//! Integration tests for SegmentForge

use std::io::Write;

use chrono::{DateTime, TimeZone, Utc};
use segmentforge::{
    segment_customers, CustomerRecord, Segment, SegmentationConfig, SegmentationError,
};
use tempfile::NamedTempFile;

fn reference_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
}

fn config(clusters: usize) -> SegmentationConfig {
    SegmentationConfig {
        clusters,
        reference_time: Some(reference_time()),
        ..SegmentationConfig::default()
    }
}

fn customer(id: &str, purchases: u64, spent: f64, days_ago: Option<i64>) -> CustomerRecord {
    let json = serde_json::json!({
        "id": id,
        "name": format!("Customer {id}"),
        "total_purchases": purchases,
        "total_spent": spent,
        "last_purchase_date": days_ago
            .map(|d| (reference_time() - chrono::Duration::days(d)).to_rfc3339()),
    });
    serde_json::from_value(json).unwrap()
}

/// Eight customers forming four well-separated behavioral groups.
fn four_group_customers() -> Vec<CustomerRecord> {
    vec![
        customer("premium-1", 40, 9000.0, Some(5)),
        customer("premium-2", 38, 8800.0, Some(8)),
        customer("budget-1", 5, 200.0, Some(30)),
        customer("budget-2", 6, 250.0, Some(35)),
        customer("stale-1", 1, 400.0, Some(300)),
        customer("stale-2", 2, 350.0, Some(320)),
        customer("regular-1", 20, 4000.0, Some(20)),
        customer("regular-2", 18, 4200.0, Some(25)),
    ]
}

#[test]
fn test_high_spenders_split_from_low_and_top_cluster_is_premium() {
    // Two high-monetary customers and two near-zero ones, all recent
    let records = vec![
        customer("big-1", 50, 10000.0, Some(0)),
        customer("big-2", 40, 8000.0, Some(0)),
        customer("small-1", 1, 100.0, Some(0)),
        customer("small-2", 1, 50.0, Some(0)),
    ];

    let outcome = segment_customers(&records, &config(4)).unwrap();

    let by_id: std::collections::HashMap<&str, Segment> = outcome
        .customers
        .iter()
        .map(|c| (c.record.id.as_str(), c.segment))
        .collect();

    assert_eq!(by_id["big-1"], Segment::Premium);
    // The low spenders never share a segment with the high spenders
    assert_eq!(by_id["small-1"], Segment::Budget);
    assert_eq!(by_id["small-2"], Segment::Budget);
    assert_ne!(by_id["big-2"], Segment::Budget);

    // Highest-monetary profile carries the premium label
    assert_eq!(outcome.profiles[0].segment, Segment::Premium);
    assert!(outcome.profiles[0].avg_normalized.monetary > 0.5);
}

#[test]
fn test_single_stale_customer_is_at_risk() {
    let records = vec![customer("dormant", 0, 0.0, Some(400))];

    let outcome = segment_customers(&records, &config(1)).unwrap();

    assert_eq!(outcome.customers.len(), 1);
    assert_eq!(outcome.customers[0].segment, Segment::AtRisk);
    assert_eq!(outcome.customers[0].rfm.recency, 400.0);

    // Recency ratio 1.0 > 0.6 and frequency ratio 0 < 0.4
    let profile = &outcome.profiles[0];
    assert_eq!(profile.avg_normalized.recency, 1.0);
    assert_eq!(profile.avg_normalized.frequency, 0.0);
}

#[test]
fn test_cluster_count_exceeding_records_fails_without_output() {
    let records = vec![
        customer("a", 3, 100.0, Some(10)),
        customer("b", 5, 300.0, Some(20)),
    ];

    let result = segment_customers(&records, &config(4));
    assert!(matches!(
        result,
        Err(SegmentationError::InvalidClusterCount {
            requested: 4,
            available: 2
        })
    ));
}

#[test]
fn test_duplicate_records_count_once_toward_cluster_capacity() {
    // Four records but only two distinct RFM points; four clusters cannot
    // be seeded from them
    let records = vec![
        customer("twin-a1", 10, 900.0, Some(10)),
        customer("twin-b1", 1, 50.0, Some(200)),
        customer("twin-a2", 10, 900.0, Some(10)),
        customer("twin-b2", 1, 50.0, Some(200)),
    ];

    let result = segment_customers(&records, &config(4));
    assert!(matches!(
        result,
        Err(SegmentationError::InvalidClusterCount {
            requested: 4,
            available: 2
        })
    ));

    // At k = 2 the fit succeeds and the centroids are genuinely distinct
    let outcome = segment_customers(&records, &config(2)).unwrap();
    let model = outcome.model.unwrap();
    assert_ne!(model.centroids.row(0), model.centroids.row(1));
    assert_eq!(outcome.customers.len(), 4);
}

#[test]
fn test_missing_last_purchase_date_scores_as_just_purchased() {
    let records = vec![
        customer("no-history", 2, 100.0, None),
        customer("old-buyer", 2, 100.0, Some(200)),
    ];

    let outcome = segment_customers(&records, &config(1)).unwrap();
    assert_eq!(outcome.customers[0].rfm.recency, 0.0);
    assert_eq!(outcome.customers[1].rfm.recency, 200.0);
}

#[test]
fn test_pipeline_is_deterministic() {
    let records = four_group_customers();

    let first = segment_customers(&records, &config(4)).unwrap();
    let second = segment_customers(&records, &config(4)).unwrap();

    for (a, b) in first.customers.iter().zip(second.customers.iter()) {
        assert_eq!(a.record.id, b.record.id);
        assert_eq!(a.cluster, b.cluster);
        assert_eq!(a.segment, b.segment);
    }

    let model_a = first.model.unwrap();
    let model_b = second.model.unwrap();
    assert_eq!(model_a.centroids, model_b.centroids);
    assert_eq!(model_a.labels, model_b.labels);
}

#[test]
fn test_labels_are_input_order_invariant() {
    let records = four_group_customers();
    let mut reversed = records.clone();
    reversed.reverse();

    let forward = segment_customers(&records, &config(4)).unwrap();
    let backward = segment_customers(&reversed, &config(4)).unwrap();

    let forward_by_id: std::collections::HashMap<String, Segment> = forward
        .customers
        .iter()
        .map(|c| (c.record.id.clone(), c.segment))
        .collect();

    for customer in &backward.customers {
        assert_eq!(
            forward_by_id[&customer.record.id], customer.segment,
            "segment for {} changed when input order was permuted",
            customer.record.id
        );
    }
}

#[test]
fn test_all_four_segments_emerge_from_distinct_groups() {
    let outcome = segment_customers(&four_group_customers(), &config(4)).unwrap();

    let by_id: std::collections::HashMap<&str, Segment> = outcome
        .customers
        .iter()
        .map(|c| (c.record.id.as_str(), c.segment))
        .collect();

    assert_eq!(by_id["premium-1"], Segment::Premium);
    assert_eq!(by_id["premium-2"], Segment::Premium);
    assert_eq!(by_id["budget-1"], Segment::Budget);
    assert_eq!(by_id["budget-2"], Segment::Budget);
    assert_eq!(by_id["stale-1"], Segment::AtRisk);
    assert_eq!(by_id["stale-2"], Segment::AtRisk);
    assert_eq!(by_id["regular-1"], Segment::Regular);
    assert_eq!(by_id["regular-2"], Segment::Regular);
}

#[test]
fn test_every_record_labeled_exactly_once_in_input_order() {
    let records = four_group_customers();
    let outcome = segment_customers(&records, &config(3)).unwrap();

    // N in, N out, same order
    assert_eq!(outcome.customers.len(), records.len());
    for (input, output) in records.iter().zip(outcome.customers.iter()) {
        assert_eq!(input.id, output.record.id);
    }

    // Profile sizes account for every record
    let profiled: usize = outcome.profiles.iter().map(|p| p.size).sum();
    assert_eq!(profiled, records.len());
}

#[test]
fn test_normalized_features_stay_in_unit_cube() {
    let outcome = segment_customers(&four_group_customers(), &config(4)).unwrap();
    let space = outcome.feature_space.unwrap();

    for &value in space.features.iter() {
        assert!(
            (0.0..=1.0).contains(&value),
            "normalized value {value} outside [0, 1]"
        );
    }
}

#[test]
fn test_empty_input_yields_empty_outcome() {
    let outcome = segment_customers(&[], &config(4)).unwrap();
    assert!(outcome.customers.is_empty());
    assert!(outcome.profiles.is_empty());
    assert!(outcome.model.is_none());
}

#[test]
fn test_malformed_records_are_coerced_not_dropped() {
    // Records straight from a JSON file, some with junk numeric fields
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"[
            {{"id": "ok", "total_purchases": 12, "total_spent": 900.0,
              "last_purchase_date": "2024-05-20T00:00:00Z"}},
            {{"id": "stringy", "total_purchases": "7", "total_spent": "120.5",
              "last_purchase_date": "2024-04-01T00:00:00Z"}},
            {{"id": "junk", "total_purchases": "many", "total_spent": null,
              "last_purchase_date": "not a date"}}
        ]"#
    )
    .unwrap();

    let raw = std::fs::read_to_string(file.path()).unwrap();
    let records: Vec<CustomerRecord> = serde_json::from_str(&raw).unwrap();
    assert_eq!(records.len(), 3);

    let outcome = segment_customers(&records, &config(2)).unwrap();
    assert_eq!(outcome.customers.len(), 3);

    let junk = &outcome.customers[2];
    assert_eq!(junk.rfm.frequency, 0.0);
    assert_eq!(junk.rfm.monetary, 0.0);
    assert_eq!(junk.rfm.recency, 0.0);

    let stringy = &outcome.customers[1];
    assert_eq!(stringy.rfm.frequency, 7.0);
    assert_eq!(stringy.rfm.monetary, 120.5);
}

#[test]
fn test_predicting_a_new_point_lands_in_a_labeled_cluster() {
    let outcome = segment_customers(&four_group_customers(), &config(4)).unwrap();
    let model = outcome.model.as_ref().unwrap();
    let space = outcome.feature_space.as_ref().unwrap();

    // A heavy recent spender should land in the premium cluster
    let point = space.scale(&segmentforge::RfmFeature {
        recency: 6.0,
        frequency: 39.0,
        monetary: 8900.0,
    });
    let cluster = model.predict(&point);

    let profile = outcome
        .profiles
        .iter()
        .find(|p| p.cluster == cluster)
        .unwrap();
    assert_eq!(profile.segment, Segment::Premium);
}
