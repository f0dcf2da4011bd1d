//! Test design configuration and run-length planning
//!
//! A [`TestDesign`] carries every parameter of a planned experiment. It is a
//! plain value: build it, validate it, and pass it by value. Nothing here is
//! global or session-scoped.

use crate::stats::required_sample_size;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Parameters of a planned A/B test.
///
/// Rates are fractions (0.1855 means 18.55%).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestDesign {
    /// Two-sided significance level α
    pub alpha: f64,
    /// Statistical power 1−β
    pub power: f64,
    /// Baseline rate of the KPI being improved
    pub baseline_rate: f64,
    /// Absolute minimum detectable effect
    pub min_detectable_effect: f64,
    /// Share of traffic routed into the experiment
    pub traffic_ratio: f64,
    /// Average daily views across all traffic
    pub daily_views: f64,
}

impl Default for TestDesign {
    fn default() -> Self {
        Self {
            alpha: 0.05,
            power: 0.80,
            baseline_rate: 0.1855,
            min_detectable_effect: 0.001,
            traffic_ratio: 0.10,
            daily_views: 520_501.0,
        }
    }
}

impl TestDesign {
    /// Create a builder starting from the default design
    #[must_use]
    pub fn builder() -> TestDesignBuilder {
        TestDesignBuilder::default()
    }

    /// Parse a design from JSON. Missing fields take their default value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDesign`] if the JSON is malformed or the
    /// resulting design fails [`validate`](Self::validate).
    pub fn from_json(json: &str) -> Result<Self> {
        let design: Self = serde_json::from_str(json)
            .map_err(|e| Error::InvalidDesign(format!("Malformed design JSON: {e}")))?;
        design.validate()?;
        Ok(design)
    }

    /// Check every parameter against its domain.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDesign`] naming the first offending parameter.
    pub fn validate(&self) -> Result<()> {
        let open_unit = |name: &str, value: f64| {
            if value > 0.0 && value < 1.0 {
                Ok(())
            } else {
                Err(Error::InvalidDesign(format!(
                    "{name} must be in (0, 1), got {value}"
                )))
            }
        };

        open_unit("alpha", self.alpha)?;
        open_unit("power", self.power)?;
        open_unit("baseline_rate", self.baseline_rate)?;

        if !self.min_detectable_effect.is_finite() || self.min_detectable_effect == 0.0 {
            return Err(Error::InvalidDesign(format!(
                "min_detectable_effect must be finite and non-zero, got {}",
                self.min_detectable_effect
            )));
        }
        if !(self.traffic_ratio > 0.0 && self.traffic_ratio <= 1.0) {
            return Err(Error::InvalidDesign(format!(
                "traffic_ratio must be in (0, 1], got {}",
                self.traffic_ratio
            )));
        }
        if !(self.daily_views.is_finite() && self.daily_views > 0.0) {
            return Err(Error::InvalidDesign(format!(
                "daily_views must be positive, got {}",
                self.daily_views
            )));
        }
        Ok(())
    }

    /// Required sample size per arm (not validated, see
    /// [`required_sample_size`]).
    #[must_use]
    pub fn sample_size_per_arm(&self) -> f64 {
        required_sample_size(
            self.alpha,
            self.power,
            self.baseline_rate,
            self.min_detectable_effect,
        )
    }

    /// Validate the design and derive the full run plan.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDesign`] if validation fails or the sample
    /// size comes out non-finite.
    pub fn plan(&self) -> Result<TestPlan> {
        self.validate()?;

        let sample_size_per_arm = self.sample_size_per_arm();
        if !sample_size_per_arm.is_finite() {
            return Err(Error::InvalidDesign(format!(
                "Sample size is not finite for {self:?}"
            )));
        }

        let total_sample_size = sample_size_per_arm * 2.0;
        Ok(TestPlan {
            sample_size_per_arm,
            total_sample_size,
            required_days: total_sample_size / (self.daily_views * self.traffic_ratio),
            relative_lift: self.min_detectable_effect / self.baseline_rate,
        })
    }
}

/// Builder for `TestDesign`.
#[derive(Debug, Default)]
pub struct TestDesignBuilder {
    design: TestDesign,
}

impl TestDesignBuilder {
    /// Set the significance level.
    #[must_use]
    pub const fn alpha(mut self, alpha: f64) -> Self {
        self.design.alpha = alpha;
        self
    }

    /// Set the statistical power.
    #[must_use]
    pub const fn power(mut self, power: f64) -> Self {
        self.design.power = power;
        self
    }

    /// Set the baseline rate.
    #[must_use]
    pub const fn baseline_rate(mut self, rate: f64) -> Self {
        self.design.baseline_rate = rate;
        self
    }

    /// Set the absolute minimum detectable effect.
    #[must_use]
    pub const fn min_detectable_effect(mut self, effect: f64) -> Self {
        self.design.min_detectable_effect = effect;
        self
    }

    /// Set the share of traffic in the experiment.
    #[must_use]
    pub const fn traffic_ratio(mut self, ratio: f64) -> Self {
        self.design.traffic_ratio = ratio;
        self
    }

    /// Set the average daily views.
    #[must_use]
    pub const fn daily_views(mut self, views: f64) -> Self {
        self.design.daily_views = views;
        self
    }

    /// Build and validate the design.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDesign`] if any parameter is out of range.
    pub fn build(self) -> Result<TestDesign> {
        self.design.validate()?;
        Ok(self.design)
    }
}

/// Run-length plan derived from a [`TestDesign`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TestPlan {
    /// Required views per arm
    pub sample_size_per_arm: f64,
    /// Required views across both arms
    pub total_sample_size: f64,
    /// Days needed at the configured traffic
    pub required_days: f64,
    /// Effect relative to the baseline (0.0054 means +0.54%)
    pub relative_lift: f64,
}
