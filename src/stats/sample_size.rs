//! Sample size estimation for a two-sided two-proportion z-test

use super::normal;

/// Required sample size per arm.
///
/// Uses the classic two-proportion formula:
///
/// ```text
/// n = ((z_{1-α/2}·sqrt(2p(1-p)) + z_{power}·sqrt(p(1-p) + (p+δ)(1-p-δ)))²) / δ²
/// ```
///
/// Baselines above 0.5 are folded to `1 - p` (variance of a proportion is
/// symmetric around one half); the effect `δ` is always applied as given.
///
/// # Arguments
///
/// * `alpha` - Two-sided significance level, in `(0, 1)`
/// * `power` - Desired statistical power, in `(0, 1)`
/// * `baseline_rate` - Control conversion rate, in `(0, 1)`
/// * `min_detectable_effect` - Absolute rate delta to detect, non-zero
///
/// # Returns
///
/// Real-valued sample size per arm. The domain is not validated here: out of
/// range inputs yield a non-finite result, which callers must treat as
/// invalid input. Use [`TestDesign::plan`](crate::TestDesign::plan) for a
/// validated entry point.
///
/// # Example
///
/// ```rust
/// use abtest_stats::stats::required_sample_size;
///
/// let n = required_sample_size(0.05, 0.8, 0.10, 0.02);
/// assert!((n - 3622.6).abs() < 0.1);
/// ```
#[must_use]
pub fn required_sample_size(
    alpha: f64,
    power: f64,
    baseline_rate: f64,
    min_detectable_effect: f64,
) -> f64 {
    let p = if baseline_rate > 0.5 {
        1.0 - baseline_rate
    } else {
        baseline_rate
    };
    let delta = min_detectable_effect;

    let z_alpha = normal::quantile(1.0 - alpha / 2.0);
    let z_power = normal::quantile(power);

    let sd_null = (2.0 * p * (1.0 - p)).sqrt();
    let sd_alt = (p * (1.0 - p) + (p + delta) * (1.0 - p - delta)).sqrt();

    (z_alpha * sd_null + z_power * sd_alt).powi(2) / delta.powi(2)
}
