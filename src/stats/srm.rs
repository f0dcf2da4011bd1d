//! Sample ratio mismatch (SRM) check
//!
//! Compares observed traffic per arm against an equal split with a
//! chi-square goodness-of-fit test. A tiny p-value means the randomization
//! or logging is broken and the comparison itself should not be trusted.

use crate::{Error, Result};
use statrs::distribution::{ChiSquared, ContinuousCDF};

/// P-value below which a split is reported as mismatched.
pub const SRM_THRESHOLD: f64 = 0.001;

/// Chi-square goodness-of-fit p-value for an equal split of `views` across arms.
///
/// # Errors
///
/// Returns [`Error::DataShape`] with fewer than two arms or zero total traffic.
///
/// # Example
///
/// ```rust
/// use abtest_stats::stats::sample_ratio_mismatch;
///
/// let p = sample_ratio_mismatch(&[10_000, 10_050])?;
/// assert!(p > 0.5);
/// # Ok::<(), abtest_stats::Error>(())
/// ```
#[allow(clippy::cast_precision_loss)]
pub fn sample_ratio_mismatch(views: &[u64]) -> Result<f64> {
    if views.len() < 2 {
        return Err(Error::DataShape(format!(
            "Sample ratio check needs at least two arms, got {}",
            views.len()
        )));
    }

    let total = views
        .iter()
        .try_fold(0_u64, |acc, &v| acc.checked_add(v))
        .ok_or_else(|| Error::DataShape("Sample ratio check: total views overflow".to_string()))?;
    if total == 0 {
        return Err(Error::DataShape(
            "Sample ratio check needs non-zero traffic".to_string(),
        ));
    }

    let expected = total as f64 / views.len() as f64;
    let statistic: f64 = views
        .iter()
        .map(|&observed| {
            let diff = observed as f64 - expected;
            diff * diff / expected
        })
        .sum();

    let dist = ChiSquared::new((views.len() - 1) as f64)
        .map_err(|e| Error::DataShape(format!("Invalid chi-square degrees of freedom: {e}")))?;

    Ok(1.0 - dist.cdf(statistic))
}
