//! Descriptive statistics for offset measurements.

/// Count, minimum, mean, sample standard deviation and maximum of a series.
///
/// NaN inputs are skipped. With no usable values every statistic is NaN and
/// `count` is zero; with a single value the standard deviation is NaN because
/// the sample estimator divides by `n - 1`.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct OffsetStats {
    pub count: usize,
    pub min: f64,
    pub mean: f64,
    pub std: f64,
    pub max: f64,
}

impl OffsetStats {
    /// Computes the statistics in two passes over `values`.
    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let values: Vec<f64> = values.into_iter().filter(|v| !v.is_nan()).collect();
        let count = values.len();
        if count == 0 {
            return Self::empty();
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = values.iter().sum::<f64>() / count as f64;
        let std = if count < 2 {
            f64::NAN
        } else {
            let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
            (ss / (count - 1) as f64).sqrt()
        };
        Self {
            count,
            min,
            mean,
            std,
            max,
        }
    }

    /// Statistics of an empty series.
    pub fn empty() -> Self {
        Self {
            count: 0,
            min: f64::NAN,
            mean: f64::NAN,
            std: f64::NAN,
            max: f64::NAN,
        }
    }

    /// The four reported statistics in display order.
    pub fn rows(&self) -> [(&'static str, f64); 4] {
        [
            ("min", self.min),
            ("mean", self.mean),
            ("std", self.std),
            ("max", self.max),
        ]
    }
}
