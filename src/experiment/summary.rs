//! Key metrics over a comparison table

use super::{Arm, ComparisonRecord, Metric};
use crate::stats::srm::{sample_ratio_mismatch, SRM_THRESHOLD};
use crate::{Error, Result};
use serde::Serialize;
use std::collections::BTreeSet;

/// Headline KPIs of a daily (or overall) result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExperimentSummary {
    /// Distinct time buckets in the result (0 for an overall result)
    pub run_days: usize,
    /// Treatment buckets with a significant CTR difference
    pub ctr_significant_count: usize,
    /// Treatment buckets with a significant CR difference
    pub cr_significant_count: usize,
    /// Total views per arm, in first-appearance order
    pub arm_views: Vec<(Arm, u64)>,
    /// Sample ratio mismatch p-value against an equal split
    pub srm_p_value: f64,
    /// True when the traffic split looks broken
    pub split_issue: bool,
}

impl ExperimentSummary {
    /// Summarize a comparison table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DataShape`] for an empty table or one with fewer
    /// than two arms.
    pub fn from_records(records: &[ComparisonRecord]) -> Result<Self> {
        if records.is_empty() {
            return Err(Error::DataShape(
                "Cannot summarize an empty result".to_string(),
            ));
        }

        let run_days = records
            .iter()
            .filter_map(ComparisonRecord::time_bucket)
            .collect::<BTreeSet<_>>()
            .len();

        let significant = |metric: Metric| {
            records
                .iter()
                .filter(|r| r.arm() == &Arm::Treatment && r.is_significant(metric))
                .count()
        };

        let mut arm_views: Vec<(Arm, u64)> = Vec::new();
        for record in records {
            match arm_views.iter_mut().find(|(arm, _)| arm == record.arm()) {
                Some((arm, views)) => {
                    *views = views.checked_add(record.view_count()).ok_or_else(|| {
                        Error::DataShape(format!("Summed views overflow for arm '{arm}'"))
                    })?;
                }
                None => arm_views.push((record.arm().clone(), record.view_count())),
            }
        }

        let totals: Vec<u64> = arm_views.iter().map(|(_, views)| *views).collect();
        let srm_p_value = sample_ratio_mismatch(&totals)?;

        Ok(Self {
            run_days,
            ctr_significant_count: significant(Metric::Ctr),
            cr_significant_count: significant(Metric::Cr),
            arm_views,
            srm_p_value,
            split_issue: srm_p_value < SRM_THRESHOLD,
        })
    }
}
