//! Box-plot statistics of small samples.
//!
//! Two quartile conventions are supported. `Hinges` are Tukey's hinges: the lower (upper)
//! quartile is the median of the lower (upper) half of the sorted sample, where the half
//! includes the overall median for odd sample sizes. `Linear` interpolates between the closest
//! ranks at position `p * (n - 1)`, which is what most plotting libraries use by default.

use serde::{Deserialize, Serialize};

/// Convention used to compute the lower and upper quartile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuartileMethod {
    Hinges,
    #[default]
    Linear,
}

/// Five-number summary plus the arithmetic mean.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoxStats {
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
    pub mean: f64,
}

impl BoxStats {
    /// Compute the statistics of `values`. Returns `None` for an empty sample or if any value is
    /// not finite.
    pub fn compute(values: &[f64], method: QuartileMethod) -> Option<Self> {
        if values.is_empty() || values.iter().any(|x| !x.is_finite()) {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let n = sorted.len();

        let (q1, q3) = match method {
            QuartileMethod::Hinges => {
                let half = (n + 1) / 2;
                (median_sorted(&sorted[..half]), median_sorted(&sorted[n - half..]))
            }
            QuartileMethod::Linear => (percentile_sorted(&sorted, 0.25), percentile_sorted(&sorted, 0.75)),
        };

        Some(Self {
            min: sorted[0],
            q1,
            median: median_sorted(&sorted),
            q3,
            max: sorted[n - 1],
            mean: sorted.iter().sum::<f64>() / n as f64,
        })
    }

    /// Returns the names of all statistics in which `self` and `other` differ by more than the
    /// relative tolerance `rel_tol`.
    pub fn deviations(&self, other: &Self, rel_tol: f64) -> Vec<&'static str> {
        [
            ("min", self.min, other.min),
            ("q1", self.q1, other.q1),
            ("median", self.median, other.median),
            ("q3", self.q3, other.q3),
            ("max", self.max, other.max),
            ("mean", self.mean, other.mean),
        ]
        .into_iter()
        .filter(|(_, a, b)| !approx_eq(*a, *b, rel_tol))
        .map(|(name, _, _)| name)
        .collect()
    }
}

/// Median of an already sorted, non-empty slice.
pub fn median_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Percentile `p` (in `[0, 1]`) of an already sorted, non-empty slice using linear
/// interpolation between closest ranks.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let pos = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (pos - lo as f64) * (sorted[hi] - sorted[lo])
}

/// Relative comparison that degrades to an absolute one around zero.
pub fn approx_eq(a: f64, b: f64, rel_tol: f64) -> bool {
    let scale = a.abs().max(b.abs()).max(1.0);
    (a - b).abs() <= rel_tol * scale
}
