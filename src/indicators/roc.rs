// =============================================================================
// Percentage change
// =============================================================================
//
//   change = (to - from) / from * 100

/// Percentage change from `from` to `to`; `None` if `from` is not positive
/// or the result is not finite.
pub fn pct_change(from: f64, to: f64) -> Option<f64> {
    if from.is_nan() || from <= 0.0 {
        return None;
    }
    let pct = (to - from) / from * 100.0;
    pct.is_finite().then_some(pct)
}

/// Percentage change from the close `bars` bars before the last close to
/// `price`.
///
/// With closes `[.., c(n-1-bars), .., c(n-1)]` the base is `c(n-1-bars)`.
pub fn change_over(closes: &[f64], bars: usize, price: f64) -> Option<f64> {
    if bars == 0 || closes.len() <= bars {
        return None;
    }
    pct_change(closes[closes.len() - 1 - bars], price)
}
