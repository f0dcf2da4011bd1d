//! Test design and planning tests

use abtest_stats::{Error, TestDesign};

#[test]
fn test_default_plan_matches_calculator() {
    let plan = TestDesign::default().plan().unwrap();

    // reference calculator: 18.55% baseline, 0.1% MDE, 10% of 520,501 daily views
    assert_eq!(plan.sample_size_per_arm.trunc(), 2_373_250.0);
    assert!((plan.required_days - plan.total_sample_size / 52_050.1).abs() < 1e-6);
    assert!((plan.relative_lift * 100.0 - 0.539).abs() < 1e-3);
}

#[test]
fn test_plan_scales_with_traffic() {
    let half = TestDesign::builder().traffic_ratio(0.05).build().unwrap();
    let full = TestDesign::builder().traffic_ratio(0.10).build().unwrap();
    let ratio = half.plan().unwrap().required_days / full.plan().unwrap().required_days;
    assert!((ratio - 2.0).abs() < 1e-9);
}

#[test]
fn test_relative_lift_uses_unfolded_baseline() {
    let plan = TestDesign::builder()
        .baseline_rate(0.8)
        .min_detectable_effect(0.02)
        .build()
        .unwrap()
        .plan()
        .unwrap();
    assert!((plan.relative_lift - 0.025).abs() < 1e-12);
}

#[test]
fn test_invalid_designs() {
    let cases = [
        TestDesign::builder().alpha(0.0),
        TestDesign::builder().power(1.0),
        TestDesign::builder().baseline_rate(-0.1),
        TestDesign::builder().min_detectable_effect(f64::INFINITY),
        TestDesign::builder().traffic_ratio(1.5),
        TestDesign::builder().daily_views(0.0),
    ];
    for builder in cases {
        assert!(matches!(builder.build(), Err(Error::InvalidDesign(_))));
    }
}

#[test]
fn test_plan_validates_struct_literal() {
    let design = TestDesign {
        alpha: 0.05,
        power: 0.8,
        baseline_rate: 1.2,
        ..TestDesign::default()
    };
    assert!(design.plan().is_err());
}

#[test]
fn test_design_json_round_trip() {
    let design = TestDesign::builder()
        .alpha(0.01)
        .power(0.9)
        .build()
        .unwrap();
    let json = serde_json::to_string(&design).unwrap();
    let back = TestDesign::from_json(&json).unwrap();
    assert_eq!(design, back);
}

#[test]
fn test_design_json_rejects_invalid_values() {
    let err = TestDesign::from_json(r#"{"power": 1.4}"#).unwrap_err();
    assert!(err.to_string().contains("power"));
}
