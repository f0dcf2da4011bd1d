//! Experiment data model and comparison pipeline
//!
//! ## Pipeline
//!
//! ```text
//! ExperimentRow (long: one per bucket per arm)
//!        │
//!        ├── reduce_overall: sum counts per arm, drop buckets
//!        ▼
//! ExperimentAggregator::aggregate
//!        │  pivot by arm → inner join on bucket → z-test per metric
//!        ▼
//! ComparisonRecord (one per bucket per arm, p-values shared per bucket)
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use abtest_stats::experiment::{aggregate, reduce_overall, ExperimentRow};
//!
//! let rows = vec![
//!     ExperimentRow::new("control_group", 1000, 100, 50).with_time_bucket(1_i64),
//!     ExperimentRow::new("treatment", 1000, 150, 55).with_time_bucket(1_i64),
//!     ExperimentRow::new("control_group", 1200, 130, 61).with_time_bucket(2_i64),
//!     ExperimentRow::new("treatment", 1180, 160, 70).with_time_bucket(2_i64),
//! ];
//!
//! let daily = aggregate(&rows)?;
//! assert_eq!(daily.len(), 4);
//!
//! let overall = reduce_overall(&rows)?;
//! assert_eq!(overall.len(), 2);
//! # Ok::<(), abtest_stats::Error>(())
//! ```

mod aggregator;
mod arm;
mod comparison;
mod row;
mod summary;
mod time_bucket;

pub use aggregator::{
    aggregate, collapse_arms, reduce_overall, ExperimentAggregator, DEFAULT_SIGNIFICANCE_LEVEL,
};
pub use arm::{Arm, CONTROL_LABEL, TREATMENT_LABEL};
pub use comparison::{ComparisonRecord, PValues};
pub use row::{ArmMetricSet, ExperimentRow, Metric};
pub use summary::ExperimentSummary;
pub use time_bucket::TimeBucket;
