//! Experiment aggregation tests (daily, snapshot, overall)

use abtest_stats::experiment::{
    aggregate, reduce_overall, Arm, ExperimentAggregator, ExperimentRow, ExperimentSummary,
    TimeBucket,
};
use abtest_stats::stats::{p_value, SignificanceTester};
use abtest_stats::Error;

fn row(day: i64, arm: &str, views: u64, clicks: u64, orders: u64) -> ExperimentRow {
    ExperimentRow::new(arm, views, clicks, orders).with_time_bucket(day)
}

/// Two weeks of a two-arm test, treatment lifting CTR
fn two_weeks() -> Vec<ExperimentRow> {
    (1..=14)
        .flat_map(|day: i64| {
            let base = 1000 + 10 * day.unsigned_abs();
            [
                row(day, "control_group", base, base / 10, base / 20),
                row(day, "treatment", base, base * 13 / 100, base / 20 + 2),
            ]
        })
        .collect()
}

// =============================================================================
// Snapshot
// =============================================================================

#[test]
fn test_snapshot_concrete_scenario() {
    let rows = vec![
        ExperimentRow::new("control_group", 1000, 100, 50),
        ExperimentRow::new("treatment", 1000, 150, 55),
    ];
    let records = aggregate(&rows).unwrap();

    assert_eq!(records.len(), 2);
    for record in &records {
        assert!((record.p_value_ctr() - 0.000_698_117_146_317_844_8).abs() < 1e-9);
        assert!((record.p_value_cr() - 0.616_147_556_898_529_3).abs() < 1e-9);
        assert!(record.significant_ctr());
        assert!(!record.significant_cr());
    }
    assert!((records[0].ctr() - 0.10).abs() < f64::EPSILON);
    assert!((records[1].cr() - 0.055).abs() < f64::EPSILON);
}

#[test]
fn test_missing_treatment_returns_no_partial_result() {
    let rows = vec![
        row(1, "control_group", 1000, 100, 50),
        row(2, "control_group", 1000, 100, 50),
    ];
    let result = aggregate(&rows);
    assert!(matches!(result, Err(Error::DataShape(_))));
}

// =============================================================================
// Daily
// =============================================================================

#[test]
fn test_daily_one_record_per_bucket_and_arm() {
    let records = aggregate(&two_weeks()).unwrap();
    assert_eq!(records.len(), 28);

    for pair in records.chunks(2) {
        assert_eq!(pair[0].time_bucket(), pair[1].time_bucket());
        assert_eq!(pair[0].arm(), &Arm::Control);
        assert_eq!(pair[1].arm(), &Arm::Treatment);
        assert!((pair[0].p_value_cr() - pair[1].p_value_cr()).abs() < f64::EPSILON);
        assert!((pair[0].p_value_ctr() - pair[1].p_value_ctr()).abs() < f64::EPSILON);
    }
}

#[test]
fn test_daily_sorted_by_bucket() {
    let mut rows = two_weeks();
    rows.reverse();
    let records = aggregate(&rows).unwrap();

    let buckets: Vec<_> = records.iter().filter_map(|r| r.time_bucket()).collect();
    assert!(buckets.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(buckets[0], &TimeBucket::Day(1));
}

#[test]
fn test_daily_p_value_matches_formula() {
    let records = aggregate(&two_weeks()).unwrap();
    let day3 = &records[4];
    assert_eq!(day3.time_bucket(), Some(&TimeBucket::Day(3)));

    let control = &records[4];
    let treatment = &records[5];
    let expected = p_value(
        control.view_count(),
        treatment.view_count(),
        control.ctr(),
        treatment.ctr(),
    );
    assert!((day3.p_value_ctr() - expected).abs() < 1e-12);
}

#[test]
fn test_label_buckets_sort_lexicographically() {
    let rows = vec![
        ExperimentRow::new("treatment", 1000, 150, 55).with_time_bucket("2024-03-02"),
        ExperimentRow::new("control_group", 1000, 100, 50).with_time_bucket("2024-03-02"),
        ExperimentRow::new("treatment", 1000, 150, 55).with_time_bucket("2024-03-01"),
        ExperimentRow::new("control_group", 1000, 100, 50).with_time_bucket("2024-03-01"),
    ];
    let records = aggregate(&rows).unwrap();
    assert_eq!(records[0].time_bucket().unwrap().to_string(), "2024-03-01");
    // first-appearance arm order within a bucket
    assert_eq!(records[0].arm(), &Arm::Treatment);
}

#[test]
fn test_input_is_not_mutated() {
    let rows = two_weeks();
    let snapshot = rows.clone();
    let first = aggregate(&rows).unwrap();
    let second = aggregate(&rows).unwrap();
    assert_eq!(rows, snapshot);
    assert_eq!(first, second);
}

// =============================================================================
// Overall
// =============================================================================

#[test]
fn test_overall_sums_daily_counts() {
    let rows = two_weeks();
    let records = reduce_overall(&rows).unwrap();
    assert_eq!(records.len(), 2);

    for record in &records {
        let views: u64 = rows
            .iter()
            .filter(|r| r.arm() == record.arm())
            .map(ExperimentRow::view_count)
            .sum();
        let clicks: u64 = rows
            .iter()
            .filter(|r| r.arm() == record.arm())
            .map(ExperimentRow::click_count)
            .sum();
        assert_eq!(record.view_count(), views);
        #[allow(clippy::cast_precision_loss)]
        let ctr = clicks as f64 / views as f64;
        assert!((record.ctr() - ctr).abs() < 1e-15);
        assert!(record.time_bucket().is_none());
    }
    assert!(records[1].significant_ctr());
}

#[test]
fn test_overall_with_custom_aggregator() {
    let aggregator = ExperimentAggregator::new(SignificanceTester::default(), 1e-12);
    let records = aggregator.reduce_overall(&two_weeks()).unwrap();
    assert!(!records[1].significant_cr());
}

#[test]
fn test_overall_orders_arms_by_label() {
    let rows = vec![
        row(1, "treatment", 1000, 150, 55),
        row(1, "control_group", 1000, 100, 50),
        row(1, "a_variant", 1000, 120, 50),
    ];
    let records = reduce_overall(&rows).unwrap();
    let labels: Vec<_> = records.iter().map(|r| r.arm().label().to_string()).collect();
    assert_eq!(labels, vec!["a_variant", "control_group", "treatment"]);
}

// =============================================================================
// Summary
// =============================================================================

#[test]
fn test_summary_over_two_weeks() {
    let records = aggregate(&two_weeks()).unwrap();
    let summary = ExperimentSummary::from_records(&records).unwrap();

    assert_eq!(summary.run_days, 14);
    let expected_ctr = records
        .iter()
        .filter(|r| r.arm() == &Arm::Treatment && r.significant_ctr())
        .count();
    assert_eq!(summary.ctr_significant_count, expected_ctr);
    assert!(!summary.split_issue);
}
