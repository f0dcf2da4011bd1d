//! A/B test report: plan an experiment, then evaluate two weeks of data
//!
//! This demo:
//! - Derives the sample size and run length for a design
//! - Simulates a two-week daily table and runs daily and overall comparisons
//! - Summarizes the result (significant days, SRM check)
//! - Writes the daily table to Parquet and prints the overall table as JSON
//!
//! Run with: RUST_LOG=abtest_stats=debug cargo run --example ab_report

use abtest_stats::experiment::{ExperimentRow, ExperimentSummary};
use abtest_stats::storage::{save_parquet, Dataset};
use abtest_stats::{AbTest, TestDesign};
use anyhow::Context;
use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::EnvFilter;

const DAYS: i64 = 14;

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    println!("=== A/B Test Report ===\n");

    // Plan
    let design = TestDesign::builder()
        .baseline_rate(0.10)
        .min_detectable_effect(0.005)
        .traffic_ratio(0.5)
        .daily_views(100_000.0)
        .build()?;
    let plan = design.plan()?;
    println!("Plan:");
    println!("  Sample size per arm: {:.0}", plan.sample_size_per_arm.ceil());
    println!("  Total sample size:   {:.0}", plan.total_sample_size.ceil());
    println!("  Required days:       {:.1}", plan.required_days);
    println!("  Relative lift:       {:.2}%\n", plan.relative_lift * 100.0);

    // Evaluate
    let dataset = Dataset::from_rows(&simulate_rows()?)?;
    println!("Loaded {} rows (daily: {})\n", dataset.num_rows(), dataset.has_time_bucket());

    let ab = AbTest::default();
    let daily = ab.daily_records(&dataset)?;
    let overall = ab.overall_records(&dataset)?;

    println!("Daily results:");
    for record in daily.iter().filter(|r| !r.arm().is_control()) {
        if let Some(day) = record.time_bucket() {
            println!(
                "  {day}  ctr {:.4} (p={:.4}{})  cr {:.4} (p={:.4}{})",
                record.ctr(),
                record.p_value_ctr(),
                if record.significant_ctr() { " *" } else { "" },
                record.cr(),
                record.p_value_cr(),
                if record.significant_cr() { " *" } else { "" },
            );
        }
    }

    let summary = ExperimentSummary::from_records(&daily)?;
    println!("\nSummary:");
    println!("  Run days:              {}", summary.run_days);
    println!("  CTR significant days:  {}", summary.ctr_significant_count);
    println!("  CR significant days:   {}", summary.cr_significant_count);
    for (arm, views) in &summary.arm_views {
        println!("  Views ({arm}): {views}");
    }
    println!(
        "  SRM p-value:           {:.4}{}",
        summary.srm_p_value,
        if summary.split_issue { "  (check traffic split)" } else { "" }
    );

    let path = std::env::temp_dir().join("ab_report_daily.parquet");
    save_parquet(&path, &ab.daily(&dataset)?)
        .with_context(|| format!("writing {}", path.display()))?;
    println!("\nDaily table written to {}", path.display());

    println!("\nOverall:");
    println!("{}", serde_json::to_string_pretty(&overall)?);

    Ok(())
}

/// Two weeks of traffic with a 10% relative CTR lift in treatment
fn simulate_rows() -> anyhow::Result<Vec<ExperimentRow>> {
    let start = NaiveDate::from_ymd_opt(2024, 3, 1).context("invalid start date")?;
    let mut rng = StdRng::seed_from_u64(7);

    let mut rows = Vec::new();
    for offset in 0..DAYS {
        let day = start + Duration::days(offset);
        for (arm, ctr, cr) in [("control_group", 0.10, 0.050), ("treatment", 0.11, 0.052)] {
            let views: u64 = rng.gen_range(24_000..26_000);
            let clicks = draw(&mut rng, views, ctr);
            let orders = draw(&mut rng, views, cr);
            rows.push(ExperimentRow::new(arm, views, clicks, orders).with_time_bucket(day));
        }
    }
    Ok(rows)
}

/// Binomial draw by summing Bernoulli trials
fn draw(rng: &mut StdRng, trials: u64, rate: f64) -> u64 {
    (0..trials).map(|_| u64::from(rng.gen_bool(rate))).sum()
}
