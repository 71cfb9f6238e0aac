//! Per-dimension standardization (z-score scaling).

/// Mean and standard deviation of every dimension of a build input.
///
/// A dimension whose standard deviation is zero is given a scale of `1.0`,
/// so constant features contribute nothing to distances instead of
/// dividing by zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Scaling {
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl Scaling {
    /// Fit the scaling parameters over `rows`.
    ///
    /// Every row must have `dimension` components; callers validate this
    /// before fitting. Uses the population standard deviation.
    pub fn fit<'a, I>(rows: I, dimension: usize) -> Self
    where
        I: IntoIterator<Item = &'a [f32]> + Clone,
    {
        let mut means = vec![0.0_f64; dimension];
        let mut count = 0_usize;
        for row in rows.clone() {
            for (mean, &value) in means.iter_mut().zip(row) {
                *mean += f64::from(value);
            }
            count += 1;
        }

        if count == 0 {
            return Self {
                means,
                stds: vec![1.0; dimension],
            };
        }

        #[allow(clippy::cast_precision_loss)]
        let n = count as f64;
        for mean in &mut means {
            *mean /= n;
        }

        let mut variances = vec![0.0_f64; dimension];
        for row in rows {
            for ((variance, &value), mean) in variances.iter_mut().zip(row).zip(&means) {
                let delta = f64::from(value) - mean;
                *variance += delta * delta;
            }
        }

        let stds = variances
            .into_iter()
            .map(|variance| {
                let std = (variance / n).sqrt();
                if std == 0.0 {
                    1.0
                } else {
                    std
                }
            })
            .collect();

        Self { means, stds }
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.means.len()
    }

    #[must_use]
    pub fn means(&self) -> &[f64] {
        &self.means
    }

    /// Scale factors; zero deviations are already replaced by `1.0`.
    #[must_use]
    pub fn stds(&self) -> &[f64] {
        &self.stds
    }

    /// Standardize one vector.
    #[must_use]
    pub fn transform(&self, row: &[f32]) -> Vec<f64> {
        row.iter()
            .zip(&self.means)
            .zip(&self.stds)
            .map(|((&value, mean), std)| (f64::from(value) - mean) / std)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_mean_and_std() {
        let rows: Vec<Vec<f32>> = vec![vec![0.0, 10.0], vec![2.0, 10.0], vec![4.0, 10.0]];
        let scaling = Scaling::fit(rows.iter().map(Vec::as_slice), 2);

        assert_eq!(scaling.means(), &[2.0, 10.0]);
        let expected_std = (8.0_f64 / 3.0).sqrt();
        assert!((scaling.stds()[0] - expected_std).abs() < 1e-12);
        // Constant dimension falls back to a unit scale.
        assert_eq!(scaling.stds()[1], 1.0);
    }

    #[test]
    fn test_transform_standardizes() {
        let rows: Vec<Vec<f32>> = vec![vec![1.0], vec![3.0]];
        let scaling = Scaling::fit(rows.iter().map(Vec::as_slice), 1);

        assert_eq!(scaling.transform(&[1.0]), vec![-1.0]);
        assert_eq!(scaling.transform(&[3.0]), vec![1.0]);
    }

    #[test]
    fn test_single_row_has_unit_scale() {
        let rows: Vec<Vec<f32>> = vec![vec![5.0, -2.0]];
        let scaling = Scaling::fit(rows.iter().map(Vec::as_slice), 2);

        assert_eq!(scaling.stds(), &[1.0, 1.0]);
        assert_eq!(scaling.transform(&[5.0, -2.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_fit_empty_input() {
        let rows: Vec<Vec<f32>> = Vec::new();
        let scaling = Scaling::fit(rows.iter().map(Vec::as_slice), 3);
        assert_eq!(scaling.dimension(), 3);
        assert_eq!(scaling.stds(), &[1.0, 1.0, 1.0]);
    }
}
