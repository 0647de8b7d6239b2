//! Point queries: resolve a WGS84 location to a pixel, then read band values.
//!
//! # Example
//!
//! ```rust,ignore
//! use hazpoint::{BandQuery, GeoPoint, PointQuery};
//!
//! let raster = store.open_raster("flood/rp100.tif")?;
//! let point = GeoPoint::new(-122.4, 37.8)?;
//! for result in raster.sample_lonlat(point, &[BandQuery(1), BandQuery(2)])? {
//!     println!("Band {}: {:?}", result.band, result.value);
//! }
//! ```

use tracing::debug;

use crate::error::{Error, Result};
use crate::geometry::projection::{CoordinateTransformation, SpatialReference};
use crate::geometry::{GeoPoint, PixelCoordinate};
use crate::raster::RasterHandle;

/// A requested one-based band index, validated against a specific raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BandQuery(pub i64);

impl BandQuery {
    #[must_use]
    pub fn index(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for BandQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A band value, or the explicit no-data marker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleValue {
    Value(f32),
    NoData,
}

impl SampleValue {
    #[must_use]
    pub fn value(&self) -> Option<f32> {
        match self {
            Self::Value(v) => Some(*v),
            Self::NoData => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleResult {
    pub band: BandQuery,
    pub value: SampleValue,
}

/// Round a fractional pixel coordinate by adding one half and flooring.
///
/// Identical to add-then-truncate for everything at or right of -0.5; further
/// left the result stays negative, so the bounds check rejects it instead of
/// folding it onto pixel 0.
pub fn round_pixel(fractional: f64) -> Result<i64> {
    if !fractional.is_finite() {
        return Err(Error::Projection(format!(
            "Pixel coordinate {fractional} is not finite"
        )));
    }
    Ok((fractional + 0.5).floor() as i64)
}

/// Whether a read value equals the declared no-data sentinel.
///
/// Exact IEEE equality on the widened value; a NaN sentinel matches NaN reads.
#[must_use]
pub fn is_nodata(value: f32, nodata: Option<f64>) -> bool {
    match nodata {
        Some(nd) if nd.is_nan() => value.is_nan(),
        Some(nd) => f64::from(value) == nd,
        None => false,
    }
}

/// Sampling operations on an opened raster.
pub trait PointQuery {
    /// Check every band against this raster's band count before any read,
    /// returning the one-based indices. Fails on the first invalid index.
    fn check_bands(&self, bands: &[BandQuery]) -> Result<Vec<usize>>;

    /// Resolve a WGS84 point to the pixel containing it.
    fn resolve(&self, point: GeoPoint) -> Result<PixelCoordinate>;

    /// Read one value per band at `pixel`, preserving band order.
    fn sample(&self, pixel: PixelCoordinate, bands: &[BandQuery]) -> Result<Vec<SampleResult>>;

    /// Bands are checked first, then the point is resolved, then bands are read.
    fn sample_lonlat(&self, point: GeoPoint, bands: &[BandQuery]) -> Result<Vec<SampleResult>> {
        self.check_bands(bands)?;
        let pixel = self.resolve(point)?;
        self.sample(pixel, bands)
    }
}

impl PointQuery for RasterHandle {
    fn check_bands(&self, bands: &[BandQuery]) -> Result<Vec<usize>> {
        let band_count = self.band_count();
        bands
            .iter()
            .map(|band| {
                usize::try_from(band.0)
                    .ok()
                    .filter(|&b| (1..=band_count).contains(&b))
                    .ok_or(Error::InvalidBand {
                        band: band.0,
                        band_count,
                    })
            })
            .collect()
    }

    fn resolve(&self, point: GeoPoint) -> Result<PixelCoordinate> {
        let native = self.spatial_reference()?;
        let transformation = CoordinateTransformation::new(SpatialReference::wgs84(), native)?;
        let (x, y, _) = transformation.transform_point(point.lon(), point.lat())?;

        let inverse = self.geo_transform()?.invert().ok_or_else(|| {
            Error::Projection(format!("{} has a non-invertible geotransform", self.identifier()))
        })?;
        let (px, py) = inverse.apply(x, y);

        let column = round_pixel(px)?;
        let row = round_pixel(py)?;

        debug!(
            source = self.identifier(),
            crs = %native,
            x,
            y,
            px,
            py,
            column,
            row,
            "Resolved point"
        );

        PixelCoordinate::checked(column, row, self.width(), self.height())
    }

    fn sample(&self, pixel: PixelCoordinate, bands: &[BandQuery]) -> Result<Vec<SampleResult>> {
        let indices = self.check_bands(bands)?;
        if pixel.column >= self.width() || pixel.row >= self.height() {
            return Err(Error::OutOfBounds {
                column: pixel.column as i64,
                row: pixel.row as i64,
                width: self.width(),
                height: self.height(),
            });
        }

        let nodata = self.nodata();
        let mut reader = self.pixel_reader(pixel);

        bands
            .iter()
            .zip(indices)
            .map(|(&band, index)| {
                let raw = reader.read_band(index).map_err(|source| Error::RasterRead {
                    file: self.identifier().to_string(),
                    band: band.0,
                    source,
                })?;

                let value = if is_nodata(raw, nodata) {
                    SampleValue::NoData
                } else {
                    SampleValue::Value(raw)
                };
                Ok(SampleResult { band, value })
            })
            .collect()
    }
}
