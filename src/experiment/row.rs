//! Experiment Row - one observation per (time bucket, arm)

use super::{Arm, TimeBucket};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw counts for one arm, optionally within one time bucket.
///
/// A row without a time bucket belongs to a single overall snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentRow {
    #[serde(rename = "dy", default, skip_serializing_if = "Option::is_none")]
    time_bucket: Option<TimeBucket>,
    #[serde(rename = "experiments")]
    arm: Arm,
    #[serde(rename = "view_user_cnt")]
    view_count: u64,
    #[serde(rename = "click_user_cnt")]
    click_count: u64,
    #[serde(rename = "order_user_cnt")]
    order_count: u64,
}

impl ExperimentRow {
    /// Create a snapshot row (no time bucket).
    ///
    /// # Arguments
    ///
    /// * `arm` - Arm the counts belong to
    /// * `view_count` - Users who saw the experience
    /// * `click_count` - Users who clicked
    /// * `order_count` - Users who ordered
    #[must_use]
    pub fn new(arm: impl Into<Arm>, view_count: u64, click_count: u64, order_count: u64) -> Self {
        Self {
            time_bucket: None,
            arm: arm.into(),
            view_count,
            click_count,
            order_count,
        }
    }

    /// Place the row in a time bucket.
    #[must_use]
    pub fn with_time_bucket(mut self, bucket: impl Into<TimeBucket>) -> Self {
        self.time_bucket = Some(bucket.into());
        self
    }

    /// Get the time bucket, if any.
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

    /// Get the click count.
    #[must_use]
    pub const fn click_count(&self) -> u64 {
        self.click_count
    }

    /// Get the order count.
    #[must_use]
    pub const fn order_count(&self) -> u64 {
        self.order_count
    }

    /// Click-through rate, `clicks / views`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn ctr(&self) -> f64 {
        self.click_count as f64 / self.view_count as f64
    }

    /// Conversion rate, `orders / views`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn cr(&self) -> f64 {
        self.order_count as f64 / self.view_count as f64
    }

    /// Project the row onto the metrics used for comparison.
    #[must_use]
    pub fn metrics(&self) -> ArmMetricSet {
        ArmMetricSet {
            view_count: self.view_count,
            ctr: self.ctr(),
            cr: self.cr(),
        }
    }
}

/// Metrics of one arm in one time bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArmMetricSet {
    /// Users who saw the experience
    pub view_count: u64,
    /// Click-through rate
    pub ctr: f64,
    /// Conversion rate
    pub cr: f64,
}

impl ArmMetricSet {
    /// Rate for the given metric
    #[must_use]
    pub const fn rate(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Cr => self.cr,
            Metric::Ctr => self.ctr,
        }
    }
}

/// Rate metrics that are significance-tested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    /// Conversion rate (orders / views)
    Cr,
    /// Click-through rate (clicks / views)
    Ctr,
}

impl Metric {
    /// Column name of the metric
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Cr => "cr",
            Self::Ctr => "ctr",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
