//! Confidence intervals for hazard statistics.
//!
//! Given the mean and standard deviation of a hazard value across `n`
//! realizations, the two-sided interval is
//!
//! ```text
//! lower = mean + z(p)     * std_dev / sqrt(n)
//! upper = mean + z(1 - p) * std_dev / sqrt(n)
//! ```
//!
//! with `p = (1 - confidence_level) / 2` and `z` the inverse CDF of the
//! chosen distribution. Only the standard normal is implemented.

use std::num::NonZeroU32;
use std::str::FromStr;

use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};

use crate::error::{Error, Result};

/// Summary statistics of a hazard across realizations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HazardStats {
    mean: f64,
    std_dev: f64,
}

impl HazardStats {
    pub fn new(mean: f64, std_dev: f64) -> Result<Self> {
        if !mean.is_finite() {
            return Err(Error::InvalidInput(
                "Please pass a valid mean value in the haz_stats parameter".into(),
            ));
        }
        if !std_dev.is_finite() || std_dev < 0.0 {
            return Err(Error::InvalidInput(
                "Please pass a valid std_dev value in the haz_stats parameter".into(),
            ));
        }
        Ok(Self { mean, std_dev })
    }

    #[must_use]
    pub fn mean(&self) -> f64 {
        self.mean
    }

    #[must_use]
    pub fn std_dev(&self) -> f64 {
        self.std_dev
    }
}

/// Distribution used for the critical quantile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Distribution {
    Normal,
    /// Accepted at the boundary, rejected by [`compute_ci`]
    Unsupported(String),
}

impl FromStr for Distribution {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "normal" => Self::Normal,
            other => Self::Unsupported(other.to_string()),
        })
    }
}

impl std::fmt::Display for Distribution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::Unsupported(name) => write!(f, "{name}"),
        }
    }
}

/// Interval bounds and the quantiles they correspond to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfidenceIntervalResult {
    #[serde(rename = "lower_val")]
    pub lower_value: f64,
    #[serde(rename = "upper_val")]
    pub upper_value: f64,
    #[serde(rename = "lower_bound")]
    pub lower_label: String,
    #[serde(rename = "upper_bound")]
    pub upper_label: String,
}

/// Validate a confidence level, which must lie strictly inside (0, 1).
pub fn check_confidence_level(level: f64) -> Result<f64> {
    if level.is_finite() && level > 0.0 && level < 1.0 {
        Ok(level)
    } else {
        Err(Error::InvalidInput(
            "Please pass a confidence_level between 0 and 1 (exclusive)".into(),
        ))
    }
}

/// Compute a two-sided confidence interval.
///
/// The distribution is checked before anything is computed.
pub fn compute_ci(
    stats: HazardStats,
    realizations: NonZeroU32,
    distribution: &Distribution,
    confidence_level: f64,
) -> Result<ConfidenceIntervalResult> {
    let standard_normal = match distribution {
        Distribution::Normal => Normal::new(0.0, 1.0)
            .map_err(|e| Error::Internal(format!("standard normal: {e}")))?,
        Distribution::Unsupported(name) => {
            return Err(Error::UnsupportedDistribution(name.clone()));
        }
    };
    let confidence_level = check_confidence_level(confidence_level)?;

    let alpha = 1.0 - confidence_level;
    let p = alpha / 2.0;

    // Both tails computed independently
    let z_lower = standard_normal.inverse_cdf(p);
    let z_upper = standard_normal.inverse_cdf(1.0 - p);

    let standard_error = stats.std_dev / f64::from(realizations.get()).sqrt();

    Ok(ConfidenceIntervalResult {
        lower_value: stats.mean + z_lower * standard_error,
        upper_value: stats.mean + z_upper * standard_error,
        lower_label: format!("{p:.2}"),
        upper_label: format!("{:.2}", 1.0 - p),
    })
}
