//! # Generation Mathematics
//!
//! Interpolation and share calculations used for difficulty and budgets.

/// Linear interpolation between `lo` and `hi` at `t` in `[0, 1]`.
pub fn lerp(lo: f64, hi: f64, t: f64) -> f64 {
    lo + (hi - lo) * t.clamp(0.0, 1.0)
}

/// Interpolates an inclusive integer level range, rounding to nearest.
///
/// # Examples
///
/// ```
/// use worldweave::utils::lerp_level;
///
/// assert_eq!(lerp_level(1, 10, 0.0), 1);
/// assert_eq!(lerp_level(1, 10, 1.0), 10);
/// assert_eq!(lerp_level(1, 10, 0.5), 6);
/// ```
pub fn lerp_level(lo: u32, hi: u32, t: f64) -> u32 {
    lerp(lo as f64, hi as f64, t).round() as u32
}

/// Position of item `index` of `count` as a fraction in `[0, 1]`.
///
/// The first item maps to 0 and the last to 1; a single item maps to 0.
pub fn fraction(index: usize, count: usize) -> f64 {
    if count <= 1 {
        return 0.0;
    }
    index.min(count - 1) as f64 / (count - 1) as f64
}

/// Splits `total` across `weights` proportionally.
///
/// Returns all zeros if every weight is zero.
pub fn proportional_shares(total: f64, weights: &[f64]) -> Vec<f64> {
    let sum: f64 = weights.iter().sum();
    if sum <= 0.0 {
        return vec![0.0; weights.len()];
    }
    weights.iter().map(|w| total * w / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lerp_clamps() {
        assert_eq!(lerp(0.0, 10.0, -1.0), 0.0);
        assert_eq!(lerp(0.0, 10.0, 2.0), 10.0);
        assert_eq!(lerp(2.0, 4.0, 0.5), 3.0);
    }

    #[test]
    fn test_fraction() {
        assert_eq!(fraction(0, 1), 0.0);
        assert_eq!(fraction(0, 5), 0.0);
        assert_eq!(fraction(4, 5), 1.0);
        assert_eq!(fraction(2, 5), 0.5);
    }

    #[test]
    fn test_proportional_shares() {
        assert_eq!(proportional_shares(10.0, &[1.0, 4.0]), vec![2.0, 8.0]);
        assert_eq!(proportional_shares(10.0, &[0.0, 0.0]), vec![0.0, 0.0]);
    }
}
