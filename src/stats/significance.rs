//! Two-sided two-proportion z-test
//!
//! Each arm's rate is treated as a Bernoulli proportion estimate with variance
//! `r(1-r)`. The statistic is the unpooled difference of means:
//!
//! ```text
//! S_mean = r_t - r_c
//! S_var  = r_c(1-r_c)/n_c + r_t(1-r_t)/n_t
//! Z      = S_mean / sqrt(|S_var|)
//! p      = 2·(1 - Φ(Z)), reflected to 2 - p when above 1
//! ```

use super::normal;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// How a zero or negative combined variance is handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariancePolicy {
    /// Use `|S_var|`. Output matches the raw formula bit for bit except for
    /// `0/0` (both rates degenerate and equal), which reports p = 1.
    #[default]
    Masked,
    /// Reject rates outside `[0, 1]` and `S_var <= 0` with
    /// [`Error::DegenerateVariance`].
    Strict,
}

/// Two-sided p-value for control vs treatment proportions.
///
/// Sample sizes are counts of exposed units (views). Always returns a value in
/// `[0, 1]` for finite rates and positive sample sizes.
///
/// # Example
///
/// ```rust
/// use abtest_stats::stats::p_value;
///
/// let p = p_value(1000, 1000, 0.10, 0.15);
/// assert!(p < 0.001);
/// ```
#[must_use]
#[allow(clippy::float_cmp)]
pub fn p_value(n_control: u64, n_treatment: u64, rate_control: f64, rate_treatment: f64) -> f64 {
    let (mean, var) = difference(n_control, n_treatment, rate_control, rate_treatment);
    if mean == 0.0 && var == 0.0 {
        return 1.0;
    }
    two_sided(mean / var.abs().sqrt())
}

#[allow(clippy::cast_precision_loss)]
fn difference(
    n_control: u64,
    n_treatment: u64,
    rate_control: f64,
    rate_treatment: f64,
) -> (f64, f64) {
    let var_control = rate_control * (1.0 - rate_control);
    let var_treatment = rate_treatment * (1.0 - rate_treatment);

    let mean = rate_treatment - rate_control;
    let var = var_control / n_control as f64 + var_treatment / n_treatment as f64;
    (mean, var)
}

fn two_sided(z: f64) -> f64 {
    let p = (1.0 - normal::cdf(z)) * 2.0;
    if p > 1.0 {
        2.0 - p
    } else {
        p
    }
}

/// Significance tester with an explicit variance policy.
///
/// Stateless apart from its configuration; one instance can be reused for
/// any number of comparisons.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignificanceTester {
    policy: VariancePolicy,
}

impl SignificanceTester {
    /// Create a tester with the given variance policy
    #[must_use]
    pub const fn new(policy: VariancePolicy) -> Self {
        Self { policy }
    }

    /// Get the variance policy
    #[must_use]
    pub const fn policy(&self) -> VariancePolicy {
        self.policy
    }

    /// Two-sided p-value for one metric.
    ///
    /// `metric` only labels the error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DegenerateVariance`] under [`VariancePolicy::Strict`]
    /// when either rate is outside `[0, 1]` or the combined variance is not
    /// strictly positive.
    pub fn test(
        &self,
        metric: &str,
        n_control: u64,
        n_treatment: u64,
        rate_control: f64,
        rate_treatment: f64,
    ) -> Result<f64> {
        match self.policy {
            VariancePolicy::Masked => Ok(p_value(
                n_control,
                n_treatment,
                rate_control,
                rate_treatment,
            )),
            VariancePolicy::Strict => {
                let proportion = |rate: f64| (0.0..=1.0).contains(&rate);
                let (mean, var) = difference(n_control, n_treatment, rate_control, rate_treatment);
                if !(proportion(rate_control) && proportion(rate_treatment))
                    || !(var.is_finite() && var > 0.0)
                {
                    return Err(Error::DegenerateVariance {
                        metric: metric.to_string(),
                        control_rate: rate_control,
                        treatment_rate: rate_treatment,
                    });
                }
                Ok(two_sided(mean / var.sqrt()))
            }
        }
    }
}
