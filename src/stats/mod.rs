//! Statistical kernels for A/B testing
//!
//! All functions here are pure: they take plain numbers and return plain
//! numbers (or a [`Result`](crate::Result) when a policy can reject input).
//!
//! - [`sample_size`]: required per-arm sample size for a planned test
//! - [`significance`]: two-sided two-proportion z-test
//! - [`srm`]: sample ratio mismatch check on arm traffic

pub mod normal;
pub mod sample_size;
pub mod significance;
pub mod srm;

pub use sample_size::required_sample_size;
pub use significance::{p_value, SignificanceTester, VariancePolicy};
pub use srm::sample_ratio_mismatch;
