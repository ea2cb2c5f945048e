// =============================================================================
// Volume multiple
// =============================================================================

/// Ratio of `current` volume to the mean volume of `window`.
///
/// `None` for an empty window or a zero average.
pub fn volume_multiple(window_volumes: &[f64], current: f64) -> Option<f64> {
    if window_volumes.is_empty() || !current.is_finite() {
        return None;
    }
    let avg = window_volumes.iter().sum::<f64>() / window_volumes.len() as f64;
    if avg <= 0.0 || !avg.is_finite() {
        return None;
    }
    Some(current / avg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiple_of_average() {
        let m = volume_multiple(&[100.0, 200.0, 300.0], 360.0).unwrap();
        assert!((m - 1.8).abs() < 1e-10);
    }

    #[test]
    fn degenerate_windows() {
        assert_eq!(volume_multiple(&[], 10.0), None);
        assert_eq!(volume_multiple(&[0.0, 0.0], 10.0), None);
    }
}
