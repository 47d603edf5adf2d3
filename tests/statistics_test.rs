use mvextras::statistics::{
    approximate_p_value, classify_attribute_type, classify_value, compute_correlation,
    compute_correlation_ci, AttributeTypeCategory, IntervalStatus, Observation, RawValue,
    CI_ERROR_OUT_OF_RANGE, CI_ERROR_SAMPLE_TOO_SMALL, CI_NOTE_PERFECT,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const TOL: f64 = 1e-9;

fn complete(pairs: &[(f64, f64)]) -> Vec<Observation> {
    pairs.iter().map(|&p| Observation::from(p)).collect()
}

/// Noisy linear samples with roughly 10% of each side missing.
fn random_sample(rng: &mut StdRng, n: usize) -> Vec<Observation> {
    let slope = rng.gen_range(-3.0..3.0);
    (0..n)
        .map(|_| {
            let x: f64 = rng.gen_range(-100.0..100.0);
            let y = slope * x + rng.gen_range(-50.0..50.0);
            let x = (rng.gen::<f64>() >= 0.1).then_some(x);
            let y = (rng.gen::<f64>() >= 0.1).then_some(y);
            Observation::new(x, y)
        })
        .collect()
}

#[test]
fn test_correlation_stays_in_range() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..200 {
        let n = rng.gen_range(2..60);
        let result = compute_correlation(&random_sample(&mut rng, n));
        if result.correlation.is_finite() {
            assert!(
                (-1.0 - TOL..=1.0 + TOL).contains(&result.correlation),
                "r = {}",
                result.correlation
            );
        }
        if result.missingness_correlation.is_finite() {
            assert!((-1.0 - TOL..=1.0 + TOL).contains(&result.missingness_correlation));
        }
    }
}

#[test]
fn test_correlation_is_symmetric() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..50 {
        let sample = random_sample(&mut rng, 40);
        let swapped: Vec<Observation> = sample
            .iter()
            .map(|o| Observation::new(o.y, o.x))
            .collect();
        let a = compute_correlation(&sample);
        let b = compute_correlation(&swapped);
        assert!((a.correlation - b.correlation).abs() < TOL);
        assert_eq!(a.nx_missing, b.ny_missing);
        assert_eq!(a.ny_missing, b.nx_missing);
    }
}

#[test]
fn test_self_correlation_is_one() {
    let xs = [3.5, -1.0, 8.25, 0.0, 12.0, 7.0];
    let sample: Vec<Observation> = xs.iter().map(|&x| Observation::from((x, x))).collect();
    let result = compute_correlation(&sample);
    assert!((result.correlation - 1.0).abs() < TOL);
}

#[test]
fn test_constant_input_is_nan() {
    let sample = complete(&[(5.0, 1.0), (5.0, 2.0), (5.0, 3.0), (5.0, 9.0)]);
    let result = compute_correlation(&sample);
    assert!(result.correlation.is_nan());
    assert_eq!(result.n_complete_cases, 4);

    // Constant only among the complete rows
    let sample = vec![
        Observation::new(Some(2.0), Some(1.0)),
        Observation::new(Some(2.0), Some(3.0)),
        Observation::new(Some(9.0), None),
    ];
    assert!(compute_correlation(&sample).correlation.is_nan());
}

#[test]
fn test_missingness_accounting() {
    let mut rng = StdRng::seed_from_u64(23);
    for _ in 0..100 {
        let n = rng.gen_range(0..50);
        let sample = random_sample(&mut rng, n);
        let result = compute_correlation(&sample);
        let either_missing = sample.iter().filter(|o| !o.is_complete()).count();
        assert_eq!(result.total_cases, sample.len());
        assert_eq!(result.n_complete_cases, result.total_cases - either_missing);
        assert_eq!(
            result.nx_missing,
            sample.iter().filter(|o| o.x.is_none()).count()
        );
        assert_eq!(
            result.ny_missing,
            sample.iter().filter(|o| o.y.is_none()).count()
        );
    }
}

#[test]
fn test_empty_sample() {
    let result = compute_correlation(&[]);
    assert_eq!(result.total_cases, 0);
    assert_eq!(result.n_complete_cases, 0);
    assert_eq!(result.nx_missing, 0);
    assert_eq!(result.ny_missing, 0);
    assert!(result.correlation.is_nan());
    assert!(result.missingness_correlation.is_nan());
    assert!(!result.has_correlation());
}

#[test]
fn test_single_row_sample() {
    let result = compute_correlation(&complete(&[(3.0, 4.0)]));
    assert_eq!(result.total_cases, 1);
    assert_eq!(result.n_complete_cases, 1);
    assert_eq!(result.nx_missing, 0);
    assert!(result.correlation.is_nan());
    assert!(result.missingness_correlation.is_nan());
}

#[test]
fn test_one_side_all_missing() {
    let sample = vec![
        Observation::new(None, Some(1.0)),
        Observation::new(None, Some(2.0)),
        Observation::new(None, Some(5.0)),
    ];
    let result = compute_correlation(&sample);
    assert_eq!(result.total_cases, 3);
    assert_eq!(result.n_complete_cases, 0);
    assert_eq!(result.nx_missing, 3);
    assert_eq!(result.ny_missing, 0);
    assert!(result.correlation.is_nan());
    // x's missingness indicator is constant
    assert!(result.missingness_correlation.is_nan());
}

#[test]
fn test_ci_monotone_in_r() {
    for n in [4usize, 10, 50, 500] {
        let mut previous = compute_correlation_ci(-0.99, n, 1.96);
        for i in -98..=99 {
            let r = i as f64 / 100.0;
            let ci = compute_correlation_ci(r, n, 1.96);
            assert!(ci.low >= previous.low - TOL, "low decreased at r={r}, n={n}");
            assert!(ci.high >= previous.high - TOL, "high decreased at r={r}, n={n}");
            previous = ci;
        }
    }
}

#[test]
fn test_ci_contains_r() {
    for n in [4usize, 5, 30, 1000] {
        for i in -99..=99 {
            let r = i as f64 / 100.0;
            let ci = compute_correlation_ci(r, n, 1.96);
            assert!(ci.is_valid());
            assert!(ci.low <= r + TOL && r - TOL <= ci.high, "r={r}, n={n}");
        }
    }
}

#[test]
fn test_perfect_linear_relation() {
    let result = compute_correlation(&complete(&[(1.0, 2.0), (2.0, 4.0), (3.0, 6.0), (4.0, 8.0)]));
    assert!((result.correlation - 1.0).abs() < TOL);
    assert_eq!(result.n_complete_cases, 4);
    assert_eq!(result.nx_missing, 0);
    assert_eq!(result.ny_missing, 0);
}

#[test]
fn test_correlation_skips_incomplete_rows() {
    let sample = vec![
        Observation::new(Some(1.0), None),
        Observation::new(Some(2.0), Some(4.0)),
        Observation::new(None, Some(6.0)),
        Observation::new(Some(4.0), Some(8.0)),
    ];
    let result = compute_correlation(&sample);
    assert_eq!(result.n_complete_cases, 2);
    assert_eq!(result.nx_missing, 1);
    assert_eq!(result.ny_missing, 1);
    assert!((result.correlation - 1.0).abs() < TOL);
    // x and y are never missing together
    assert!(result.missingness_correlation < 0.0);
}

#[test]
fn test_ci_small_samples() {
    let ci = compute_correlation_ci(0.5, 4, 1.96);
    assert!(ci.is_valid());
    assert!(ci.low < 0.5 && 0.5 < ci.high);
    assert!((ci.low - -0.887_64).abs() < 1e-4);
    assert!((ci.high - 0.986_86).abs() < 1e-4);

    let ci = compute_correlation_ci(0.5, 3, 1.96);
    assert_eq!(ci.status, IntervalStatus::SampleTooSmall);
    assert_eq!(ci.error(), Some(CI_ERROR_SAMPLE_TOO_SMALL));
    assert!(ci.low.is_nan() && ci.high.is_nan());
}

#[test]
fn test_ci_perfect_correlation() {
    let ci = compute_correlation_ci(1.0, 10, 1.96);
    assert_eq!(ci.low, 1.0);
    assert_eq!(ci.high, 1.0);
    assert_eq!(ci.status, IntervalStatus::PointEstimate);
    assert_eq!(ci.message(), Some(CI_NOTE_PERFECT));
    assert_eq!(ci.error(), None);

    // Range check comes before the sample-size check
    let ci = compute_correlation_ci(1.5, 2, 1.96);
    assert_eq!(ci.error(), Some(CI_ERROR_OUT_OF_RANGE));
}

#[test]
fn test_attribute_type_classification() {
    assert_eq!(
        classify_attribute_type("numeric"),
        AttributeTypeCategory::EssentiallyNumeric
    );
    assert_eq!(
        classify_attribute_type(""),
        AttributeTypeCategory::EssentiallyCategorical
    );
    assert_eq!(classify_attribute_type("boundary"), AttributeTypeCategory::Other);
    assert_eq!(classify_attribute_type("frobnicate"), AttributeTypeCategory::Other);
    assert_eq!(
        classify_attribute_type("date"),
        AttributeTypeCategory::EssentiallyNumeric
    );
    assert_eq!(
        classify_attribute_type("checkbox"),
        AttributeTypeCategory::EssentiallyCategorical
    );
    // Tokens are case-sensitive
    assert_eq!(classify_attribute_type("Numeric"), AttributeTypeCategory::Other);
}

#[test]
fn test_missing_values_normalize() {
    assert_eq!(classify_value(&RawValue::Null), None);
    assert_eq!(classify_value(&RawValue::Text(String::new())), None);
    assert_eq!(classify_value(&RawValue::Text("n/a".into())), None);
    assert_eq!(classify_value(&RawValue::Number(f64::NAN)), None);
    assert_eq!(classify_value(&RawValue::Text("7.5".into())), Some(7.5));
    assert_eq!(classify_value(&RawValue::Number(-2.0)), Some(-2.0));
}

#[test]
fn test_p_value_behaviour() {
    assert_eq!(approximate_p_value(0.5, 3), None);
    assert_eq!(approximate_p_value(f64::NAN, 20), None);
    assert_eq!(approximate_p_value(-1.0, 20), Some(0.0));

    let p = approximate_p_value(0.0, 20).unwrap();
    assert!((p - 1.0).abs() < 1e-6);

    // Stronger correlation, same n: smaller p
    let weak = approximate_p_value(0.2, 30).unwrap();
    let strong = approximate_p_value(0.6, 30).unwrap();
    assert!(strong < weak);
    assert!((0.0..=1.0).contains(&weak));
}
