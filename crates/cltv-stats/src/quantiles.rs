/// Precomputed quantile values for a dataset.
///
/// Stores quantile-value pairs for efficient lookup of commonly used quantile
/// points. Quantiles are fractions in `[0, 1]` and are computed with linear
/// interpolation between the closest ranks.
///
/// # Examples
///
/// ```
/// use cltv_stats::quantiles::Quantiles;
///
/// let values = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
/// let quantiles = Quantiles::new(&values, &[0.25, 0.5, 0.75]);
///
/// assert_eq!(quantiles.get(0.5), Some(5.5));
/// assert_eq!(quantiles.get(0.25), Some(3.25));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Quantiles {
    /// Quantile-value pairs in the order they were requested.
    values: Vec<(f64, f64)>,
}

impl Quantiles {
    /// Computes quantiles from sorted values.
    ///
    /// # Panics
    ///
    /// Panics if `sorted_values` is not sorted in ascending order.
    #[must_use]
    pub fn from_sorted(sorted_values: &[f64], quantile_points: &[f64]) -> Self {
        assert!(
            sorted_values.is_sorted_by(|a, b| a <= b),
            "values must be sorted in ascending order"
        );

        let values = quantile_points
            .iter()
            .map(|&q| (q, compute_quantile(sorted_values, q)))
            .collect();
        Self { values }
    }

    /// Computes quantiles from unsorted values.
    ///
    /// This method will sort the values internally before computing quantiles.
    #[must_use]
    pub fn new(values: &[f64], quantile_points: &[f64]) -> Self {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        Self::from_sorted(&sorted, quantile_points)
    }

    /// Gets the value at a specific quantile.
    ///
    /// Returns `None` if the quantile was not precomputed.
    ///
    /// # Examples
    ///
    /// ```
    /// use cltv_stats::quantiles::Quantiles;
    ///
    /// let quantiles = Quantiles::new(&[1.0, 2.0, 3.0], &[0.5]);
    /// assert_eq!(quantiles.get(0.5), Some(2.0));
    /// assert_eq!(quantiles.get(0.9), None);
    /// ```
    #[must_use]
    pub fn get(&self, quantile: f64) -> Option<f64> {
        self.values
            .iter()
            .find_map(|(q, value)| ((q - quantile).abs() < f64::EPSILON).then_some(*value))
    }

    /// Returns an iterator over all (quantile, value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.values.iter().copied()
    }
}

/// Computes a single quantile from sorted data.
///
/// Uses linear interpolation: for `n` values the `q`-th quantile lies at
/// fractional rank `q * (n - 1)` and is interpolated between the two
/// neighbouring values. `q` is clamped to `[0, 1]`.
///
/// Returns `f64::NAN` if the input is empty.
///
/// # Examples
///
/// ```
/// use cltv_stats::quantiles::compute_quantile;
///
/// let values = [1.0, 2.0, 3.0, 4.0, 5.0];
/// assert_eq!(compute_quantile(&values, 0.5), 3.0);
/// assert_eq!(compute_quantile(&values, 0.125), 1.5);
/// ```
#[expect(
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss
)]
#[must_use]
pub fn compute_quantile(sorted_values: &[f64], quantile: f64) -> f64 {
    let Some(&last) = sorted_values.last() else {
        return f64::NAN;
    };
    let position = quantile.clamp(0.0, 1.0) * (sorted_values.len() - 1) as f64;
    let lower = position.floor() as usize;
    if lower + 1 >= sorted_values.len() {
        return last;
    }
    let fraction = position - position.floor();
    let (lo, hi) = (sorted_values[lower], sorted_values[lower + 1]);
    fraction.mul_add(hi - lo, lo)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extremes() {
        let values = [3.0, 7.0, 11.0];
        assert_eq!(compute_quantile(&values, 0.0), 3.0);
        assert_eq!(compute_quantile(&values, 1.0), 11.0);
        assert_eq!(compute_quantile(&values, 0.5), 7.0);
    }

    #[test]
    fn test_single_value() {
        assert_eq!(compute_quantile(&[42.0], 0.99), 42.0);
        assert!(compute_quantile(&[], 0.5).is_nan());
    }

    #[test]
    fn test_unsorted_input() {
        let quantiles = Quantiles::new(&[5.0, 1.0, 3.0], &[0.0, 1.0]);
        assert_eq!(quantiles.iter().collect::<Vec<_>>(), vec![(0.0, 1.0), (1.0, 5.0)]);
    }
}
