//! # abtest-stats: A/B Test Statistics over Arrow Datasets
//!
//! **Version**: 0.1.0
//!
//! Plans experiments (required sample size and run length) and evaluates them
//! (two-sided two-proportion z-tests on click-through and conversion rates),
//! either per time bucket or over the whole run.
//!
//! ## Design Principles (Toyota Way Aligned)
//!
//! - **Muda elimination**: One pass pivots arms into cohorts; no per-arm column copies
//! - **Poka-Yoke safety**: Typed arms and buckets replace string-keyed columns
//! - **Genchi Genbutsu**: Same formulas as the reference calculator, checked to 1e-9
//! - **Jidoka**: Data shape errors stop the computation; no partial results
//!
//! ## Example Usage
//!
//! ```rust
//! use abtest_stats::experiment::ExperimentRow;
//! use abtest_stats::storage::Dataset;
//! use abtest_stats::{AbTest, TestDesign};
//!
//! // Plan
//! let plan = TestDesign::builder()
//!     .baseline_rate(0.10)
//!     .min_detectable_effect(0.02)
//!     .build()?
//!     .plan()?;
//! println!("Need {} views per arm", plan.sample_size_per_arm.ceil());
//!
//! // Evaluate
//! let dataset = Dataset::from_rows(&[
//!     ExperimentRow::new("control_group", 1000, 100, 50).with_time_bucket(1_i64),
//!     ExperimentRow::new("treatment", 1000, 150, 55).with_time_bucket(1_i64),
//! ])?;
//! let ab = AbTest::builder().build();
//! let daily = ab.daily(&dataset)?;
//! assert_eq!(daily.num_rows(), 2);
//! # Ok::<(), abtest_stats::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod design;
pub mod error;
pub mod experiment;
pub mod stats;
pub mod storage;

pub use design::{TestDesign, TestDesignBuilder, TestPlan};
pub use error::{Error, Result};

use arrow::record_batch::RecordBatch;
use experiment::{ComparisonRecord, ExperimentAggregator, DEFAULT_SIGNIFICANCE_LEVEL};
use stats::{SignificanceTester, VariancePolicy};
use storage::{records_to_batch, Dataset};

/// Analysis entry point over Arrow datasets
#[derive(Debug, Clone, Copy, Default)]
pub struct AbTest {
    aggregator: ExperimentAggregator,
}

impl AbTest {
    /// Create a new analysis builder
    #[must_use]
    pub fn builder() -> AbTestBuilder {
        AbTestBuilder::default()
    }

    /// Get the underlying aggregator
    #[must_use]
    pub const fn aggregator(&self) -> ExperimentAggregator {
        self.aggregator
    }

    /// Per-bucket comparison records (snapshot when `dy` is absent)
    ///
    /// # Errors
    ///
    /// Returns error if the dataset cannot be decoded or fails aggregation
    pub fn daily_records(&self, dataset: &Dataset) -> Result<Vec<ComparisonRecord>> {
        self.aggregator.aggregate(&dataset.rows()?)
    }

    /// Whole-run comparison records, one per arm
    ///
    /// # Errors
    ///
    /// Returns error if the dataset cannot be decoded or fails aggregation
    pub fn overall_records(&self, dataset: &Dataset) -> Result<Vec<ComparisonRecord>> {
        self.aggregator.reduce_overall(&dataset.rows()?)
    }

    /// Per-bucket result table
    ///
    /// # Errors
    ///
    /// Returns error if the dataset cannot be decoded or fails aggregation
    pub fn daily(&self, dataset: &Dataset) -> Result<RecordBatch> {
        records_to_batch(&self.daily_records(dataset)?)
    }

    /// Whole-run result table
    ///
    /// # Errors
    ///
    /// Returns error if the dataset cannot be decoded or fails aggregation
    pub fn overall(&self, dataset: &Dataset) -> Result<RecordBatch> {
        records_to_batch(&self.overall_records(dataset)?)
    }
}

/// Analysis builder
#[derive(Debug, Clone, Copy)]
pub struct AbTestBuilder {
    significance_level: f64,
    variance_policy: VariancePolicy,
}

impl Default for AbTestBuilder {
    fn default() -> Self {
        Self {
            significance_level: DEFAULT_SIGNIFICANCE_LEVEL,
            variance_policy: VariancePolicy::default(),
        }
    }
}

impl AbTestBuilder {
    /// Set the p-value threshold for significance flags
    #[must_use]
    pub const fn significance_level(mut self, level: f64) -> Self {
        self.significance_level = level;
        self
    }

    /// Set how degenerate variance is handled
    #[must_use]
    pub const fn variance_policy(mut self, policy: VariancePolicy) -> Self {
        self.variance_policy = policy;
        self
    }

    /// Build the analysis
    #[must_use]
    pub const fn build(self) -> AbTest {
        AbTest {
            aggregator: ExperimentAggregator::new(
                SignificanceTester::new(self.variance_policy),
                self.significance_level,
            ),
        }
    }
}
