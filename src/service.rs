//! Request records and the shared service core.
//!
//! Both HTTP hosts, and the CLI, go through [`HazardService`]. Request
//! records arrive loosely typed (every field optional) so each missing or
//! invalid field can be reported with its own message; `validate` turns them
//! into typed queries before any raster is touched.

use std::num::NonZeroU32;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ci::{self, ConfidenceIntervalResult, Distribution, HazardStats};
use crate::error::{Error, Result};
use crate::geometry::GeoPoint;
use crate::point_query::{BandQuery, PointQuery};
use crate::storage::RasterStore;

/// Returned for bodies that are not a JSON object of the expected shape.
pub const VALUES_USAGE: &str = "Please pass a JSON object with {'file' (string), 'bands' (int array), 'lat' (float), 'lon' (float)} fields in the request body";

pub const CI_USAGE: &str = "Please pass a JSON object with {'haz_stats': {'mean' (float), 'std_dev' (float)}, [optional] 'realizations' (int), [optional] 'distribution' (string), [optional] 'confidence_level' (float)} fields in the request body";

const DEFAULT_REALIZATIONS: u32 = 5;
const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.9;

// ============================================================================
// Sampling
// ============================================================================

/// Body of a `get_values` request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValuesRequest {
    pub file: Option<String>,
    pub bands: Option<Vec<i64>>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

/// A validated sampling request.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleQuery {
    pub file: String,
    pub bands: Vec<BandQuery>,
    pub point: GeoPoint,
}

impl ValuesRequest {
    pub fn validate(&self) -> Result<SampleQuery> {
        let file = match self.file.as_deref() {
            Some(file) if !file.trim().is_empty() => file.to_string(),
            _ => {
                return Err(Error::InvalidInput(
                    "Please pass a file name in the request body".into(),
                ));
            }
        };

        let bands = match &self.bands {
            Some(bands) if !bands.is_empty() => bands.iter().map(|&b| BandQuery(b)).collect(),
            _ => {
                return Err(Error::InvalidInput(
                    "Please pass an array containing at least one band in the request body".into(),
                ));
            }
        };

        let lat = self.lat.ok_or_else(|| {
            Error::InvalidInput("Please pass a valid latitude in the request body".into())
        })?;
        let lon = self.lon.ok_or_else(|| {
            Error::InvalidInput("Please pass a valid longitude in the request body".into())
        })?;
        let point = GeoPoint::new(lon, lat)?;

        Ok(SampleQuery { file, bands, point })
    }
}

/// One entry of a `get_values` response; no-data serializes as `null`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandValue {
    pub band: i64,
    pub value: Option<f32>,
}

// ============================================================================
// Confidence intervals
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HazStatsPayload {
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
}

/// Body of a `get_ci_values` request. Absent or `null` optional fields take
/// their defaults (5 realizations, normal distribution, 0.9 confidence).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CiRequest {
    pub haz_stats: Option<HazStatsPayload>,
    pub realizations: Option<i64>,
    pub distribution: Option<String>,
    pub confidence_level: Option<f64>,
}

/// A validated confidence interval request.
#[derive(Debug, Clone, PartialEq)]
pub struct CiQuery {
    pub stats: HazardStats,
    pub realizations: NonZeroU32,
    pub distribution: Distribution,
    pub confidence_level: f64,
}

impl CiRequest {
    pub fn validate(&self) -> Result<CiQuery> {
        let haz_stats = self.haz_stats.as_ref().ok_or_else(|| {
            Error::InvalidInput("Please pass a haz_stats object in the request body".into())
        })?;

        let (Some(mean), Some(std_dev)) = (haz_stats.mean, haz_stats.std_dev) else {
            return Err(Error::InvalidInput(
                "Please pass both 'mean' (float) and 'std_dev' (float) properties in the 'haz_stats' parameter".into(),
            ));
        };
        let stats = HazardStats::new(mean, std_dev)?;

        let realizations = match self.realizations {
            None => NonZeroU32::new(DEFAULT_REALIZATIONS),
            Some(n) => u32::try_from(n).ok().and_then(NonZeroU32::new),
        }
        .ok_or_else(|| {
            Error::InvalidInput("Please pass a realizations value of at least 1".into())
        })?;

        let distribution = self
            .distribution
            .as_deref()
            .unwrap_or("normal")
            .parse::<Distribution>()
            .unwrap_or_else(|never| match never {});
        if let Distribution::Unsupported(name) = &distribution {
            return Err(Error::UnsupportedDistribution(name.clone()));
        }

        let confidence_level = ci::check_confidence_level(
            self.confidence_level.unwrap_or(DEFAULT_CONFIDENCE_LEVEL),
        )?;

        Ok(CiQuery {
            stats,
            realizations,
            distribution,
            confidence_level,
        })
    }
}

// ============================================================================
// Service
// ============================================================================

/// The operations exposed over HTTP and the CLI.
#[derive(Clone)]
pub struct HazardService {
    store: Arc<dyn RasterStore>,
}

impl HazardService {
    pub fn new(store: Arc<dyn RasterStore>) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn RasterStore> {
        &self.store
    }

    /// Sample band values at a location. Blocking: performs raster I/O.
    pub fn get_values(&self, request: &ValuesRequest) -> Result<Vec<BandValue>> {
        let query = request.validate()?;
        self.sample(&query)
    }

    /// Run a validated sampling query.
    ///
    /// The raster is opened and released within this call; no handle
    /// outlives it, whatever the outcome.
    pub fn sample(&self, query: &SampleQuery) -> Result<Vec<BandValue>> {
        let raster = self.store.open_raster(&query.file)?;
        debug!(file = %query.file, raster = ?raster, "Sampling");

        let results = raster.sample_lonlat(query.point, &query.bands)?;
        Ok(results
            .into_iter()
            .map(|r| BandValue {
                band: r.band.index(),
                value: r.value.value(),
            })
            .collect())
    }

    /// Compute a confidence interval. Pure; never blocks.
    pub fn get_ci_values(&self, request: &CiRequest) -> Result<ConfidenceIntervalResult> {
        let query = request.validate()?;
        ci::compute_ci(
            query.stats,
            query.realizations,
            &query.distribution,
            query.confidence_level,
        )
    }
}
