/// Calculate a percentile of a slice using linear interpolation between
/// the two closest ranks.
pub fn calc_percentile(x: &[f64], percentile: f64) -> f64 {
    if x.is_empty() {
        panic!("Cannot calculate a percentile of an empty vector.");
    }

    let mut sorted = x.to_vec();
    sorted.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let fraction = (percentile / 100.0).clamp(0.0, 1.0);
    let position = fraction * (sorted.len() - 1) as f64;

    #[allow(clippy::cast_possible_truncation)]
    #[allow(clippy::cast_sign_loss)]
    let lower = position.floor() as usize;
    #[allow(clippy::cast_possible_truncation)]
    #[allow(clippy::cast_sign_loss)]
    let upper = position.ceil() as usize;

    if lower == upper {
        sorted[lower]
    } else {
        let weight = position - lower as f64;
        sorted[lower] * (1.0 - weight) + sorted[upper] * weight
    }
}

#[test]
fn test_calc_percentile() {
    assert!((calc_percentile(&[1.0, 2.0, 3.0, 4.0, 5.0], 50.0) - 3.0).abs() < 1e-12);
    assert!((calc_percentile(&[4.0, 1.0, 3.0, 2.0], 50.0) - 2.5).abs() < 1e-12);
    assert!((calc_percentile(&[1.0, 2.0, 3.0], 0.0) - 1.0).abs() < 1e-12);
    assert!((calc_percentile(&[1.0, 2.0, 3.0], 100.0) - 3.0).abs() < 1e-12);
    // position 2.5% of the way between the two lowest of three values
    assert!((calc_percentile(&[-0.5, -2.0, -0.5], 2.5) + 1.925).abs() < 1e-12);
}

/// Calculate the median value of a slice.
pub fn calc_median(x: &[f64]) -> f64 {
    calc_percentile(x, 50.0)
}

#[test]
fn test_calc_median() {
    assert!((calc_median(&[5.0, 3.0, 4.0, 2.0, 1.0]) - 3.0).abs() < 1e-12);
    assert!((calc_median(&[1.0, 3.0, 4.0, 2.0]) - 2.5).abs() < 1e-12);
}
