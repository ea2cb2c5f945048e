// =============================================================================
// Moving averages over close series
// =============================================================================
//
// EMA:
//   multiplier = 2 / (period + 1)
//   EMA_t      = close_t * multiplier + EMA_{t-1} * (1 - multiplier)
// seeded with the mean of the first `period` closes.
// =============================================================================

/// Compute the EMA series for `closes` over `period`.
///
/// Returns an empty `Vec` when the input is shorter than `period` or the
/// period is zero.  A non-finite intermediate value ends the series.
pub fn calculate_ema(closes: &[f64], period: usize) -> Vec<f64> {
    let Some(seed) = trailing_mean(&closes[..period.min(closes.len())], period) else {
        return Vec::new();
    };

    let multiplier = 2.0 / (period + 1) as f64;
    let mut result = Vec::with_capacity(closes.len() - period + 1);
    result.push(seed);

    let mut prev = seed;
    for &close in &closes[period..] {
        let ema = close * multiplier + prev * (1.0 - multiplier);
        if !ema.is_finite() {
            break;
        }
        result.push(ema);
        prev = ema;
    }

    result
}

/// Most recent EMA value.
pub fn last_ema(closes: &[f64], period: usize) -> Option<f64> {
    calculate_ema(closes, period).last().copied()
}

/// Mean of the last `period` values.
///
/// `None` when fewer than `period` values exist, the period is zero, or the
/// mean is not finite.
pub fn trailing_mean(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    let mean = window.iter().sum::<f64>() / period as f64;
    mean.is_finite().then_some(mean)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema_insufficient_data() {
        assert!(calculate_ema(&[1.0, 2.0], 5).is_empty());
        assert!(calculate_ema(&[1.0, 2.0, 3.0], 0).is_empty());
    }

    #[test]
    fn ema_seed_is_mean() {
        let ema = calculate_ema(&[2.0, 4.0, 6.0], 3);
        assert_eq!(ema.len(), 1);
        assert!((ema[0] - 4.0).abs() < 1e-10);
    }

    #[test]
    fn ema_known_values() {
        let closes: Vec<f64> = (1..=10).map(|x| x as f64).collect();
        let ema = calculate_ema(&closes, 5);
        assert_eq!(ema.len(), 6);

        let mult = 2.0 / 6.0;
        let mut expected = 3.0;
        for &c in &closes[5..] {
            expected = c * mult + expected * (1.0 - mult);
        }
        assert!((last_ema(&closes, 5).unwrap() - expected).abs() < 1e-10);
    }

    #[test]
    fn ema_stops_on_nan() {
        let ema = calculate_ema(&[1.0, 2.0, 3.0, f64::NAN, 5.0], 3);
        assert_eq!(ema.len(), 1);
    }

    #[test]
    fn trailing_mean_uses_tail() {
        assert_eq!(trailing_mean(&[100.0, 1.0, 2.0, 3.0], 3), Some(2.0));
        assert_eq!(trailing_mean(&[1.0], 3), None);
        assert_eq!(trailing_mean(&[1.0, f64::INFINITY], 2), None);
    }
}
