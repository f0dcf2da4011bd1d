//! Experiment aggregation
//!
//! Reshapes long-format rows (one per time bucket per arm) into cohorts (one
//! per time bucket, holding every arm's metrics), tests each cohort, and
//! un-pivots the result back into one [`ComparisonRecord`] per arm.
//!
//! Join policy: a time bucket is kept only when every arm reported it
//! (exact-match cohorts). Buckets missing from any arm are dropped silently.
//!
//! Multi-arm policy: `control_group` and `treatment` rows carry the
//! control-vs-treatment p-values. Every other arm is tested pairwise against
//! `control_group` and carries its own p-values.

use super::{Arm, ArmMetricSet, ComparisonRecord, ExperimentRow, Metric, PValues, TimeBucket};
use crate::stats::SignificanceTester;
use crate::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, trace};

/// Default p-value threshold for significance flags
pub const DEFAULT_SIGNIFICANCE_LEVEL: f64 = 0.05;

const ARM_HINT: &str = "Expected arms 'control_group' and 'treatment' in column experiments";

/// All arms' metrics for one time bucket (or the single snapshot).
#[derive(Debug)]
struct Cohort {
    time_bucket: Option<TimeBucket>,
    /// Indexed like the aggregator's arm list
    metrics: Vec<ArmMetricSet>,
}

/// Arms in first-appearance order plus the positions of the two canonical roles.
#[derive(Debug)]
struct ArmLayout {
    arms: Vec<Arm>,
    index: HashMap<Arm, usize>,
    control: usize,
    treatment: usize,
}

impl ArmLayout {
    fn from_rows(rows: &[ExperimentRow]) -> Result<Self> {
        let mut arms = Vec::new();
        let mut index = HashMap::new();
        for row in rows {
            if !index.contains_key(row.arm()) {
                index.insert(row.arm().clone(), arms.len());
                arms.push(row.arm().clone());
            }
        }

        if arms.len() < 2 {
            return Err(Error::DataShape(format!(
                "At least two arms are required, found {}: [{}]\n{ARM_HINT}",
                arms.len(),
                labels(&arms)
            )));
        }

        let control = *index.get(&Arm::Control).ok_or_else(|| {
            Error::DataShape(format!(
                "Control arm 'control_group' not found among [{}]\n{ARM_HINT}",
                labels(&arms)
            ))
        })?;
        let treatment = *index.get(&Arm::Treatment).ok_or_else(|| {
            Error::DataShape(format!(
                "Treatment arm 'treatment' not found among [{}]\n{ARM_HINT}",
                labels(&arms)
            ))
        })?;

        Ok(Self {
            arms,
            index,
            control,
            treatment,
        })
    }

    fn position(&self, arm: &Arm) -> usize {
        // every row's arm was registered in from_rows
        self.index.get(arm).copied().unwrap_or_default()
    }
}

fn labels(arms: &[Arm]) -> String {
    arms.iter().map(Arm::label).collect::<Vec<_>>().join(", ")
}

/// Computes comparison tables from experiment rows.
///
/// Holds configuration only; every call rebuilds its result from the rows it
/// is given and never mutates them.
///
/// # Example
///
/// ```rust
/// use abtest_stats::experiment::{ExperimentAggregator, ExperimentRow};
///
/// let rows = vec![
///     ExperimentRow::new("control_group", 1000, 100, 50),
///     ExperimentRow::new("treatment", 1000, 150, 55),
/// ];
///
/// let records = ExperimentAggregator::default().aggregate(&rows)?;
/// assert_eq!(records.len(), 2);
/// assert!(records[1].significant_ctr());
/// # Ok::<(), abtest_stats::Error>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExperimentAggregator {
    tester: SignificanceTester,
    significance_level: f64,
}

impl Default for ExperimentAggregator {
    fn default() -> Self {
        Self::new(SignificanceTester::default(), DEFAULT_SIGNIFICANCE_LEVEL)
    }
}

impl ExperimentAggregator {
    /// Create an aggregator with an explicit tester and significance threshold
    #[must_use]
    pub const fn new(tester: SignificanceTester, significance_level: f64) -> Self {
        Self {
            tester,
            significance_level,
        }
    }

    /// Get the significance threshold
    #[must_use]
    pub const fn significance_level(&self) -> f64 {
        self.significance_level
    }

    /// Get the significance tester
    #[must_use]
    pub const fn tester(&self) -> SignificanceTester {
        self.tester
    }

    /// Compare arms per time bucket.
    ///
    /// Rows with a time bucket produce one record per (bucket, arm) for every
    /// bucket shared by all arms, sorted by bucket ascending and then by arm
    /// first-appearance order. Rows without a time bucket are a snapshot and
    /// must hold exactly one row per arm.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DataShape`] if:
    /// - the dataset is empty
    /// - only some rows carry a time bucket
    /// - any row has zero views
    /// - fewer than two arms are present, or `control_group`/`treatment` is missing
    /// - an arm appears twice in the same time bucket (or twice in a snapshot)
    ///
    /// Returns [`Error::DegenerateVariance`] under the strict variance policy.
    pub fn aggregate(&self, rows: &[ExperimentRow]) -> Result<Vec<ComparisonRecord>> {
        if rows.is_empty() {
            return Err(Error::DataShape("Dataset is empty".to_string()));
        }

        let timed = rows.iter().filter(|r| r.time_bucket().is_some()).count();
        if timed != 0 && timed != rows.len() {
            return Err(Error::DataShape(format!(
                "Time bucket 'dy' present on {timed} of {} rows; it must be on all rows or none",
                rows.len()
            )));
        }

        if let Some(row) = rows.iter().find(|r| r.view_count() == 0) {
            return Err(Error::DataShape(format!(
                "Arm '{}' has zero views{}; rates are undefined",
                row.arm(),
                row.time_bucket()
                    .map(|b| format!(" in time bucket {b}"))
                    .unwrap_or_default()
            )));
        }

        let layout = ArmLayout::from_rows(rows)?;
        debug!(
            rows = rows.len(),
            arms = layout.arms.len(),
            daily = timed > 0,
            "Aggregating experiment rows"
        );

        let cohorts = if timed > 0 {
            Self::join_on_time_bucket(rows, &layout)?
        } else {
            vec![Self::snapshot(rows, &layout)?]
        };

        let per_cohort = cohorts
            .iter()
            .map(|cohort| self.compare(cohort, &layout))
            .collect::<Result<Vec<_>>>()?;

        Ok(per_cohort.into_iter().flatten().collect())
    }

    /// Compare arms over the whole experiment.
    ///
    /// Sums counts per arm (dropping time buckets) and aggregates the
    /// collapsed rows. Produces exactly one record per arm, ordered by arm
    /// label.
    ///
    /// # Errors
    ///
    /// Same conditions as [`aggregate`](Self::aggregate), evaluated on the
    /// collapsed rows, plus [`Error::DataShape`] if a summed count overflows.
    pub fn reduce_overall(&self, rows: &[ExperimentRow]) -> Result<Vec<ComparisonRecord>> {
        let collapsed = collapse_arms(rows)?;
        self.aggregate(&collapsed)
    }

    /// Inner join of every arm's rows on time bucket.
    fn join_on_time_bucket(rows: &[ExperimentRow], layout: &ArmLayout) -> Result<Vec<Cohort>> {
        let mut table: BTreeMap<TimeBucket, Vec<Option<ArmMetricSet>>> = BTreeMap::new();

        for row in rows {
            let Some(bucket) = row.time_bucket() else {
                continue;
            };
            let slots = table
                .entry(bucket.clone())
                .or_insert_with(|| vec![None; layout.arms.len()]);
            if slots[layout.position(row.arm())]
                .replace(row.metrics())
                .is_some()
            {
                return Err(Error::DataShape(format!(
                    "Arm '{}' appears more than once in time bucket {bucket}",
                    row.arm()
                )));
            }
        }

        let buckets = table.len();
        let cohorts: Vec<Cohort> = table
            .into_iter()
            .filter_map(|(bucket, slots)| {
                let metrics = slots.into_iter().collect::<Option<Vec<_>>>();
                if metrics.is_none() {
                    trace!("Dropping time bucket {bucket}: not reported by every arm");
                }
                metrics.map(|metrics| Cohort {
                    time_bucket: Some(bucket),
                    metrics,
                })
            })
            .collect();

        debug!(
            buckets,
            kept = cohorts.len(),
            dropped = buckets - cohorts.len(),
            "Joined arms on time bucket"
        );
        Ok(cohorts)
    }

    /// Side-by-side snapshot: exactly one row per arm.
    fn snapshot(rows: &[ExperimentRow], layout: &ArmLayout) -> Result<Cohort> {
        let mut slots = vec![None; layout.arms.len()];
        for row in rows {
            if slots[layout.position(row.arm())]
                .replace(row.metrics())
                .is_some()
            {
                return Err(Error::DataShape(format!(
                    "Arm '{}' has more than one row; without 'dy' each arm needs exactly one",
                    row.arm()
                )));
            }
        }

        Ok(Cohort {
            time_bucket: None,
            metrics: slots.into_iter().flatten().collect(),
        })
    }

    /// Test one cohort and un-pivot it into one record per arm.
    fn compare(&self, cohort: &Cohort, layout: &ArmLayout) -> Result<Vec<ComparisonRecord>> {
        let control = &cohort.metrics[layout.control];
        let headline = self.p_values(control, &cohort.metrics[layout.treatment])?;

        layout
            .arms
            .iter()
            .zip(&cohort.metrics)
            .map(|(arm, metrics)| {
                let p_values = match arm {
                    Arm::Variant(_) => self.p_values(control, metrics)?,
                    Arm::Control | Arm::Treatment => headline,
                };
                Ok(ComparisonRecord::new(
                    cohort.time_bucket.clone(),
                    arm.clone(),
                    *metrics,
                    p_values,
                    self.significance_level,
                ))
            })
            .collect()
    }

    fn p_values(&self, control: &ArmMetricSet, treatment: &ArmMetricSet) -> Result<PValues> {
        let test = |metric: Metric| {
            self.tester.test(
                metric.name(),
                control.view_count,
                treatment.view_count,
                control.rate(metric),
                treatment.rate(metric),
            )
        };
        Ok(PValues {
            cr: test(Metric::Cr)?,
            ctr: test(Metric::Ctr)?,
        })
    }
}

/// Sum counts per arm, discarding time buckets.
///
/// Output is ordered by arm label.
///
/// # Errors
///
/// Returns [`Error::DataShape`] if a summed count overflows `u64`.
pub fn collapse_arms(rows: &[ExperimentRow]) -> Result<Vec<ExperimentRow>> {
    let mut totals: BTreeMap<&str, (u64, u64, u64)> = BTreeMap::new();

    for row in rows {
        let entry = totals.entry(row.arm().label()).or_default();
        let overflow = || {
            Error::DataShape(format!("Summed counts overflow for arm '{}'", row.arm()))
        };
        entry.0 = entry.0.checked_add(row.view_count()).ok_or_else(overflow)?;
        entry.1 = entry.1.checked_add(row.click_count()).ok_or_else(overflow)?;
        entry.2 = entry.2.checked_add(row.order_count()).ok_or_else(overflow)?;
    }

    debug!(rows = rows.len(), arms = totals.len(), "Collapsed time buckets per arm");

    Ok(totals
        .into_iter()
        .map(|(label, (views, clicks, orders))| ExperimentRow::new(label, views, clicks, orders))
        .collect())
}

/// Daily (or snapshot) comparison with default settings.
///
/// # Errors
///
/// See [`ExperimentAggregator::aggregate`].
pub fn aggregate(rows: &[ExperimentRow]) -> Result<Vec<ComparisonRecord>> {
    ExperimentAggregator::default().aggregate(rows)
}

/// Overall comparison with default settings.
///
/// # Errors
///
/// See [`ExperimentAggregator::reduce_overall`].
pub fn reduce_overall(rows: &[ExperimentRow]) -> Result<Vec<ComparisonRecord>> {
    ExperimentAggregator::default().reduce_overall(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{p_value, VariancePolicy};

    fn daily(day: i64, arm: &str, views: u64, clicks: u64, orders: u64) -> ExperimentRow {
        ExperimentRow::new(arm, views, clicks, orders).with_time_bucket(day)
    }

    #[test]
    fn test_snapshot_two_arms() {
        let rows = vec![
            ExperimentRow::new("control_group", 1000, 100, 50),
            ExperimentRow::new("treatment", 1000, 150, 55),
        ];
        let records = aggregate(&rows).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].arm(), &Arm::Control);
        assert_eq!(records[1].arm(), &Arm::Treatment);
        assert!((records[0].p_value_cr() - records[1].p_value_cr()).abs() < f64::EPSILON);
        assert!((records[0].p_value_ctr() - records[1].p_value_ctr()).abs() < f64::EPSILON);
        assert!((records[0].p_value_ctr() - 0.000_698_117_146_317_844_8).abs() < 1e-9);
        assert!((records[0].p_value_cr() - 0.616_147_556_898_529_3).abs() < 1e-9);
        assert!(records[1].significant_ctr());
        assert!(!records[1].significant_cr());
        assert!(records[0].time_bucket().is_none());
    }

    #[test]
    fn test_arm_order_follows_first_appearance() {
        let rows = vec![
            ExperimentRow::new("treatment", 1000, 150, 55),
            ExperimentRow::new("control_group", 1000, 100, 50),
        ];
        let records = aggregate(&rows).unwrap();
        assert_eq!(records[0].arm(), &Arm::Treatment);
        assert_eq!(records[1].arm(), &Arm::Control);
    }

    #[test]
    fn test_daily_sorted_and_inner_joined() {
        let rows = vec![
            daily(2, "control_group", 900, 90, 40),
            daily(1, "control_group", 1000, 100, 50),
            daily(3, "control_group", 800, 80, 30),
            daily(1, "treatment", 1000, 150, 55),
            daily(2, "treatment", 950, 120, 45),
        ];
        let records = aggregate(&rows).unwrap();

        // day 3 has no treatment row and is dropped
        assert_eq!(records.len(), 4);
        let days: Vec<_> = records.iter().map(|r| r.time_bucket().cloned()).collect();
        assert_eq!(
            days,
            vec![
                Some(TimeBucket::Day(1)),
                Some(TimeBucket::Day(1)),
                Some(TimeBucket::Day(2)),
                Some(TimeBucket::Day(2)),
            ]
        );
        assert_eq!(records[0].arm(), &Arm::Control);
        assert_eq!(records[1].arm(), &Arm::Treatment);
    }

    #[test]
    fn test_daily_p_values_per_bucket() {
        let rows = vec![
            daily(1, "control_group", 1000, 100, 50),
            daily(1, "treatment", 1000, 150, 55),
            daily(2, "control_group", 2000, 200, 100),
            daily(2, "treatment", 2100, 220, 101),
        ];
        let records = aggregate(&rows).unwrap();

        let expected = p_value(2000, 2100, 0.1, 220.0 / 2100.0);
        assert!((records[2].p_value_ctr() - expected).abs() < 1e-12);
        assert!((records[3].p_value_ctr() - expected).abs() < 1e-12);
        assert!((records[0].p_value_ctr() - records[2].p_value_ctr()).abs() > 1e-6);
    }

    #[test]
    fn test_no_shared_bucket_gives_empty_result() {
        let rows = vec![
            daily(1, "control_group", 1000, 100, 50),
            daily(2, "treatment", 1000, 150, 55),
        ];
        assert!(aggregate(&rows).unwrap().is_empty());
    }

    #[test]
    fn test_missing_treatment_fails() {
        let rows = vec![
            ExperimentRow::new("control_group", 1000, 100, 50),
            ExperimentRow::new("variant_b", 1000, 150, 55),
        ];
        let err = aggregate(&rows).unwrap_err();
        assert!(matches!(err, Error::DataShape(_)));
        assert!(err.to_string().contains("'treatment' not found"));
    }

    #[test]
    fn test_missing_control_fails() {
        let rows = vec![
            ExperimentRow::new("variant_a", 1000, 100, 50),
            ExperimentRow::new("treatment", 1000, 150, 55),
        ];
        assert!(aggregate(&rows).unwrap_err().to_string().contains("'control_group'"));
    }

    #[test]
    fn test_single_arm_fails() {
        let rows = vec![ExperimentRow::new("control_group", 1000, 100, 50)];
        assert!(aggregate(&rows)
            .unwrap_err()
            .to_string()
            .contains("At least two arms"));
    }

    #[test]
    fn test_empty_dataset_fails() {
        assert!(matches!(aggregate(&[]), Err(Error::DataShape(_))));
    }

    #[test]
    fn test_mixed_time_bucket_fails() {
        let rows = vec![
            daily(1, "control_group", 1000, 100, 50),
            ExperimentRow::new("treatment", 1000, 150, 55),
        ];
        assert!(aggregate(&rows).unwrap_err().to_string().contains("1 of 2 rows"));
    }

    #[test]
    fn test_zero_views_fails() {
        let rows = vec![
            daily(4, "control_group", 0, 0, 0),
            daily(4, "treatment", 1000, 150, 55),
        ];
        let msg = aggregate(&rows).unwrap_err().to_string();
        assert!(msg.contains("zero views"));
        assert!(msg.contains("time bucket 4"));
    }

    #[test]
    fn test_duplicate_arm_in_bucket_fails() {
        let rows = vec![
            daily(1, "control_group", 1000, 100, 50),
            daily(1, "control_group", 1000, 100, 50),
            daily(1, "treatment", 1000, 150, 55),
        ];
        assert!(aggregate(&rows)
            .unwrap_err()
            .to_string()
            .contains("more than once"));
    }

    #[test]
    fn test_duplicate_arm_in_snapshot_fails() {
        let rows = vec![
            ExperimentRow::new("control_group", 1000, 100, 50),
            ExperimentRow::new("treatment", 1000, 150, 55),
            ExperimentRow::new("treatment", 1000, 150, 55),
        ];
        assert!(aggregate(&rows).is_err());
    }

    #[test]
    fn test_extra_variant_compared_against_control() {
        let rows = vec![
            ExperimentRow::new("control_group", 1000, 100, 50),
            ExperimentRow::new("treatment", 1000, 150, 55),
            ExperimentRow::new("treatment_b", 1000, 100, 80),
        ];
        let records = aggregate(&rows).unwrap();
        assert_eq!(records.len(), 3);

        let variant = &records[2];
        assert_eq!(variant.arm(), &Arm::Variant("treatment_b".to_string()));
        assert!((variant.p_value_cr() - p_value(1000, 1000, 0.05, 0.08)).abs() < 1e-12);
        assert!((variant.p_value_ctr() - 1.0).abs() < 1e-12);

        // control keeps the headline comparison
        assert!((records[0].p_value_ctr() - records[1].p_value_ctr()).abs() < f64::EPSILON);
    }

    #[test]
    fn test_strict_policy_surfaces_degenerate_variance() {
        let aggregator = ExperimentAggregator::new(
            SignificanceTester::new(VariancePolicy::Strict),
            DEFAULT_SIGNIFICANCE_LEVEL,
        );
        let rows = vec![
            ExperimentRow::new("control_group", 1000, 100, 0),
            ExperimentRow::new("treatment", 1000, 150, 0),
        ];
        assert!(matches!(
            aggregator.aggregate(&rows),
            Err(Error::DegenerateVariance { .. })
        ));
        // masked policy reports no difference
        let records = aggregate(&rows).unwrap();
        assert!((records[0].p_value_cr() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_custom_significance_level() {
        let aggregator = ExperimentAggregator::new(SignificanceTester::default(), 0.0001);
        let rows = vec![
            ExperimentRow::new("control_group", 1000, 100, 50),
            ExperimentRow::new("treatment", 1000, 150, 55),
        ];
        let records = aggregator.aggregate(&rows).unwrap();
        assert!(!records[1].significant_ctr());
        assert!((aggregator.significance_level() - 0.0001).abs() < f64::EPSILON);
    }

    #[test]
    fn test_collapse_sums_per_arm_sorted_by_label() {
        let rows = vec![
            daily(1, "treatment", 1000, 150, 55),
            daily(1, "control_group", 1000, 100, 50),
            daily(2, "treatment", 500, 50, 5),
            daily(2, "control_group", 700, 70, 7),
        ];
        let collapsed = collapse_arms(&rows).unwrap();

        assert_eq!(collapsed.len(), 2);
        assert_eq!(collapsed[0].arm(), &Arm::Control);
        assert_eq!(collapsed[0].view_count(), 1700);
        assert_eq!(collapsed[0].click_count(), 170);
        assert_eq!(collapsed[0].order_count(), 57);
        assert_eq!(collapsed[1].view_count(), 1500);
        assert!(collapsed.iter().all(|r| r.time_bucket().is_none()));
    }

    #[test]
    fn test_collapse_overflow_fails() {
        let rows = vec![
            ExperimentRow::new("control_group", u64::MAX, 0, 0),
            ExperimentRow::new("control_group", 1, 0, 0),
        ];
        assert!(collapse_arms(&rows).is_err());
    }

    #[test]
    fn test_reduce_overall_one_record_per_arm() {
        let rows = vec![
            daily(1, "control_group", 1000, 100, 50),
            daily(1, "treatment", 1000, 150, 55),
            daily(2, "control_group", 1000, 110, 45),
            daily(2, "treatment", 1000, 140, 60),
            // unmatched day still counts toward the totals
            daily(3, "control_group", 500, 50, 20),
        ];
        let records = reduce_overall(&rows).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].view_count(), 2500);
        assert_eq!(records[1].view_count(), 2000);
        assert!(records.iter().all(|r| r.time_bucket().is_none()));
        assert!((records[0].ctr() - 260.0 / 2500.0).abs() < 1e-15);
    }
}
