// PCES-SWEEP: Parameter Sweeps over External Network Simulations with Box-Plot Summaries
// Copyright (C) 2024-2025 Roland Schmid <roschmi@ethz.ch> and Tibor Schneider <sctibor@ethz.ch>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//! Reconstruction of a synthetic six-point sample from a reported summary line.
//!
//! The simulator reports its measurements as `min, q1, mean, median, q3, max`. Plotting
//! libraries, however, want raw samples. This module builds the six values `[min, q1, a, b, q3,
//! max]`, where one of `a`/`b` is the reported median and the other one is chosen such that the
//! arithmetic mean of all six values equals the reported mean.
//!
//! Six points cannot reproduce all six statistics at once in general. Min, max and mean survive
//! as long as the sixth value lies within `[min, max]`, but a plotting library interpolating its
//! quartiles linearly will draw q1 and q3 in between the neighbouring values, and the median only
//! survives if the sixth value equals it. Every sample therefore carries a [`Fidelity`] verdict,
//! computed by recomputing its statistics under [`VERIFY_QUARTILES`].

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use pces_utils::stats::{approx_eq, BoxStats, QuartileMethod};

/// Number of values in a reconstructed sample.
pub const SAMPLE_LEN: usize = 6;
/// Scaling applied to each value (seconds to milliseconds).
pub const UNIT_SCALE: f64 = 1000.0;
/// Relative tolerance used when verifying a reconstructed sample.
pub const REL_TOL: f64 = 1e-9;
/// Quartile convention of the plotting front-end, which decides the [`Fidelity`] verdict.
pub const VERIFY_QUARTILES: QuartileMethod = QuartileMethod::Linear;

lazy_static! {
    /// A token is numeric if it consists of digits and decimal points only, and contains at
    /// least one digit.
    static ref NUMERIC_TOKEN: Regex = Regex::new(r"^[0-9.]*[0-9][0-9.]*$").unwrap();
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SummaryError {
    #[error("Expected exactly {} numeric values in the summary line, found {found}", SAMPLE_LEN)]
    Malformed { found: usize },
    #[error("Numeric token {position} of the summary line is not a number")]
    Unparsable { position: usize },
    #[error("The simulator output contains no summary line{}", category_suffix(.category))]
    NoSummaryLine { category: Option<String> },
}

fn category_suffix(category: &Option<String>) -> String {
    category
        .as_ref()
        .map(|c| format!(" for category {c:?}"))
        .unwrap_or_default()
}

/// Extract all numeric tokens of a line, in the order they appear. Commas are treated as
/// whitespace. A token that looks numeric but cannot be parsed (e.g., `1.2.3`) is kept as `NaN`,
/// so it still counts towards the six values and the line is rejected.
pub fn numeric_tokens(line: &str) -> Vec<f64> {
    line.replace(',', " ")
        .split_whitespace()
        .filter(|word| NUMERIC_TOKEN.is_match(word))
        .map(|word| word.parse::<f64>().unwrap_or(f64::NAN))
        .collect()
}

/// Select the line holding the summary statistics from the complete simulator output.
///
/// Without a `category`, this is the first line with exactly six numeric tokens. With a
/// `category`, it is the first line containing that label, which must then hold exactly six
/// numeric tokens.
pub fn find_summary_line<'a>(
    output: &'a str,
    category: Option<&str>,
) -> Result<&'a str, SummaryError> {
    match category {
        Some(category) => {
            let line = output.lines().find(|l| l.contains(category)).ok_or_else(|| {
                SummaryError::NoSummaryLine {
                    category: Some(category.to_string()),
                }
            })?;
            let found = numeric_tokens(line).len();
            if found == SAMPLE_LEN {
                Ok(line)
            } else {
                Err(SummaryError::Malformed { found })
            }
        }
        None => output
            .lines()
            .find(|l| numeric_tokens(l).len() == SAMPLE_LEN)
            .ok_or(SummaryError::NoSummaryLine { category: None }),
    }
}

/// The statistics as reported by the simulator, in seconds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReportedSummary {
    pub min: f64,
    pub q1: f64,
    pub mean: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

impl ReportedSummary {
    /// Parse a summary line. The six numeric tokens are expected in the order min, 25th
    /// percentile, mean, median, 75th percentile, max.
    pub fn parse(line: &str) -> Result<Self, SummaryError> {
        let tokens = numeric_tokens(line);
        if tokens.len() == SAMPLE_LEN {
            if let Some(pos) = tokens.iter().position(|x| x.is_nan()) {
                return Err(SummaryError::Unparsable { position: pos + 1 });
            }
        }
        match tokens.as_slice() {
            &[min, q1, mean, median, q3, max] => Ok(Self {
                min,
                q1,
                mean,
                median,
                q3,
                max,
            }),
            tokens => Err(SummaryError::Malformed {
                found: tokens.len(),
            }),
        }
    }

    pub fn stats(&self) -> BoxStats {
        BoxStats {
            min: self.min,
            q1: self.q1,
            median: self.median,
            q3: self.q3,
            max: self.max,
            mean: self.mean,
        }
    }
}

/// How faithfully a reconstructed sample reproduces the reported statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fidelity {
    /// The value derived from the mean lies outside of `[min, max]`.
    pub out_of_range: bool,
    /// Names of the statistics that the sample does not reproduce.
    pub deviations: Vec<String>,
}

impl Fidelity {
    pub fn is_exact(&self) -> bool {
        !self.out_of_range && self.deviations.is_empty()
    }
}

impl std::fmt::Display for Fidelity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_exact() {
            return write!(f, "exact");
        }
        let mut parts = Vec::new();
        if self.out_of_range {
            parts.push("out-of-range".to_string());
        }
        if !self.deviations.is_empty() {
            parts.push(format!("deviates in {}", self.deviations.join("/")));
        }
        write!(f, "{}", parts.join(", "))
    }
}

/// A synthetic sample of six values in milliseconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReconstructedSample {
    pub values: [f64; SAMPLE_LEN],
    pub reported: ReportedSummary,
    pub fidelity: Fidelity,
}

impl ReconstructedSample {
    /// Box-plot statistics of the (scaled) sample, as the plotting front-end computes them.
    pub fn stats(&self) -> Option<BoxStats> {
        BoxStats::compute(&self.values, VERIFY_QUARTILES)
    }
}

/// Reconstruct the sample from a single summary line.
pub fn reconstruct(line: &str) -> Result<ReconstructedSample, SummaryError> {
    Ok(reconstruct_from(ReportedSummary::parse(line)?))
}

/// Reconstruct the sample from the complete simulator output, see [`find_summary_line`].
pub fn reconstruct_output(
    output: &str,
    category: Option<&str>,
) -> Result<ReconstructedSample, SummaryError> {
    reconstruct(find_summary_line(output, category)?)
}

/// Build the six values from already parsed statistics.
pub fn reconstruct_from(reported: ReportedSummary) -> ReconstructedSample {
    let ReportedSummary {
        min,
        q1,
        mean,
        median,
        q3,
        max,
    } = reported;

    // the one value that makes the mean of all six equal to the reported mean
    let x0 = SAMPLE_LEN as f64 * mean - (min + q1 + median + q3 + max);

    let mut sample = [min, q1, 0.0, 0.0, q3, max];
    if x0 < median {
        sample[2] = x0;
        sample[3] = median;
    } else {
        sample[2] = median;
        sample[3] = x0;
    }

    let out_of_range =
        (x0 < min && !approx_eq(x0, min, REL_TOL)) || (x0 > max && !approx_eq(x0, max, REL_TOL));
    let deviations = match BoxStats::compute(&sample, VERIFY_QUARTILES) {
        Some(actual) => actual
            .deviations(&reported.stats(), REL_TOL)
            .into_iter()
            .map(String::from)
            .collect(),
        None => vec!["finite".to_string()],
    };

    ReconstructedSample {
        values: sample.map(|x| x * UNIT_SCALE),
        reported,
        fidelity: Fidelity {
            out_of_range,
            deviations,
        },
    }
}
