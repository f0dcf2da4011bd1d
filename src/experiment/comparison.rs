//! Comparison Record - one row of the result table

use super::{Arm, ArmMetricSet, Metric, TimeBucket};
use serde::{Deserialize, Serialize};

/// Shared p-values of one comparison, one per tested metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PValues {
    /// P-value of the conversion rate comparison
    pub cr: f64,
    /// P-value of the click-through rate comparison
    pub ctr: f64,
}

/// Result for one arm in one time bucket.
///
/// P-values belong to the comparison, not the arm: every arm row of a two-arm
/// bucket carries the same pair. Field names serialize as the result table
/// column names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRecord {
    #[serde(rename = "dy", default, skip_serializing_if = "Option::is_none")]
    time_bucket: Option<TimeBucket>,
    #[serde(rename = "view_user_cnt")]
    view_count: u64,
    ctr: f64,
    cr: f64,
    #[serde(rename = "p-value-cr")]
    p_value_cr: f64,
    #[serde(rename = "p-value-ctr")]
    p_value_ctr: f64,
    #[serde(rename = "experiments")]
    arm: Arm,
    significant_cr: bool,
    significant_ctr: bool,
}

impl ComparisonRecord {
    /// Build a record from an arm's metrics and the comparison p-values.
    ///
    /// A metric is significant when its p-value is at most `significance_level`.
    #[must_use]
    pub fn new(
        time_bucket: Option<TimeBucket>,
        arm: Arm,
        metrics: ArmMetricSet,
        p_values: PValues,
        significance_level: f64,
    ) -> Self {
        Self {
            time_bucket,
            view_count: metrics.view_count,
            ctr: metrics.ctr,
            cr: metrics.cr,
            p_value_cr: p_values.cr,
            p_value_ctr: p_values.ctr,
            arm,
            significant_cr: p_values.cr <= significance_level,
            significant_ctr: p_values.ctr <= significance_level,
        }
    }

    /// Get the time bucket (`None` for overall results).
    #[must_use]
    pub const fn time_bucket(&self) -> Option<&TimeBucket> {
        self.time_bucket.as_ref()
    }

    /// Get the arm.
    #[must_use]
    pub const fn arm(&self) -> &Arm {
        &self.arm
    }

    /// Get the view count.
    #[must_use]
    pub const fn view_count(&self) -> u64 {
        self.view_count
    }

    /// Get the click-through rate.
    #[must_use]
    pub const fn ctr(&self) -> f64 {
        self.ctr
    }

    /// Get the conversion rate.
    #[must_use]
    pub const fn cr(&self) -> f64 {
        self.cr
    }

    /// Get the conversion rate p-value.
    #[must_use]
    pub const fn p_value_cr(&self) -> f64 {
        self.p_value_cr
    }

    /// Get the click-through rate p-value.
    #[must_use]
    pub const fn p_value_ctr(&self) -> f64 {
        self.p_value_ctr
    }

    /// Whether the conversion rate difference is significant.
    #[must_use]
    pub const fn significant_cr(&self) -> bool {
        self.significant_cr
    }

    /// Whether the click-through rate difference is significant.
    #[must_use]
    pub const fn significant_ctr(&self) -> bool {
        self.significant_ctr
    }

    /// P-value for the given metric.
    #[must_use]
    pub const fn p_value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Cr => self.p_value_cr,
            Metric::Ctr => self.p_value_ctr,
        }
    }

    /// Significance flag for the given metric.
    #[must_use]
    pub const fn is_significant(&self, metric: Metric) -> bool {
        match metric {
            Metric::Cr => self.significant_cr,
            Metric::Ctr => self.significant_ctr,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> ArmMetricSet {
        ArmMetricSet {
            view_count: 1000,
            ctr: 0.15,
            cr: 0.055,
        }
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let p = PValues { cr: 0.05, ctr: 0.050_000_1 };
        let record = ComparisonRecord::new(None, Arm::Treatment, metrics(), p, 0.05);
        assert!(record.significant_cr());
        assert!(!record.significant_ctr());
        assert!(record.is_significant(Metric::Cr));
    }

    #[test]
    fn test_serializes_with_result_columns() {
        let p = PValues { cr: 0.6, ctr: 0.001 };
        let record = ComparisonRecord::new(
            Some(TimeBucket::Day(1)),
            Arm::Control,
            metrics(),
            p,
            0.05,
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["dy"], 1);
        assert_eq!(json["experiments"], "control_group");
        assert_eq!(json["view_user_cnt"], 1000);
        assert_eq!(json["significant_ctr"], true);
        assert!((json["p-value-cr"].as_f64().unwrap() - 0.6).abs() < f64::EPSILON);
    }

    #[test]
    fn test_overall_record_omits_dy() {
        let p = PValues { cr: 0.6, ctr: 0.6 };
        let record = ComparisonRecord::new(None, Arm::Control, metrics(), p, 0.05);
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("dy").is_none());
        assert_eq!(record.p_value(Metric::Ctr), record.p_value_ctr());
    }
}
