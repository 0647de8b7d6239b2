pub mod projection;

use crate::error::{Error, Result};

/// A query location in WGS84 degrees, longitude first.
///
/// ```rust
/// use hazpoint::GeoPoint;
///
/// let p = GeoPoint::new(-122.4, 37.8).unwrap();
/// assert_eq!(p.lon(), -122.4);
/// assert_eq!(p.lat(), 37.8);
///
/// assert!(GeoPoint::new(0.0, 91.0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    lon: f64,
    lat: f64,
}

impl GeoPoint {
    /// Validate and build a point. Latitude is checked first.
    pub fn new(lon: f64, lat: f64) -> Result<Self> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(Error::InvalidInput(
                "Please pass a valid latitude in the request body".into(),
            ));
        }
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(Error::InvalidInput(
                "Please pass a valid longitude in the request body".into(),
            ));
        }
        Ok(Self { lon, lat })
    }

    #[inline]
    #[must_use]
    pub fn lon(&self) -> f64 {
        self.lon
    }

    #[inline]
    #[must_use]
    pub fn lat(&self) -> f64 {
        self.lat
    }
}

/// An integer pixel location inside a raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelCoordinate {
    pub column: usize,
    pub row: usize,
}

impl PixelCoordinate {
    #[inline]
    #[must_use]
    pub fn new(column: usize, row: usize) -> Self {
        Self { column, row }
    }

    /// Bounds-check a signed pixel against a `width` x `height` grid.
    pub fn checked(column: i64, row: i64, width: usize, height: usize) -> Result<Self> {
        let inside = |v: i64, limit: usize| usize::try_from(v).ok().filter(|&v| v < limit);

        match (inside(column, width), inside(row, height)) {
            (Some(column), Some(row)) => Ok(Self { column, row }),
            _ => Err(Error::OutOfBounds {
                column,
                row,
                width,
                height,
            }),
        }
    }
}

/// Affine pixel-to-world transform in GDAL coefficient order:
/// `[x0, dx/dcol, dx/drow, y0, dy/dcol, dy/drow]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform(pub [f64; 6]);

impl GeoTransform {
    /// Transform from a north-up origin and pixel size (`pixel_height` positive).
    #[must_use]
    pub fn north_up(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self([origin_x, pixel_width, 0.0, origin_y, 0.0, -pixel_height])
    }

    #[inline]
    #[must_use]
    pub fn coefficients(&self) -> [f64; 6] {
        self.0
    }

    /// Apply the transform to a (fractional) pixel position.
    #[inline]
    #[must_use]
    pub fn apply(&self, column: f64, row: f64) -> (f64, f64) {
        let gt = &self.0;
        (
            gt[0] + column * gt[1] + row * gt[2],
            gt[3] + column * gt[4] + row * gt[5],
        )
    }

    /// Inverse transform, or `None` if the matrix is singular.
    #[must_use]
    pub fn invert(&self) -> Option<Self> {
        let gt = &self.0;
        let det = gt[1] * gt[5] - gt[2] * gt[4];
        if det == 0.0 || !det.is_finite() {
            return None;
        }

        Some(Self([
            (gt[2] * gt[3] - gt[0] * gt[5]) / det,
            gt[5] / det,
            -gt[2] / det,
            (-gt[1] * gt[3] + gt[0] * gt[4]) / det,
            -gt[4] / det,
            gt[1] / det,
        ]))
    }

    /// Shift the origin by half a pixel, turning a PixelIsPoint
    /// georeference into the equivalent PixelIsArea one.
    #[must_use]
    pub fn shifted_half_pixel(&self) -> Self {
        let (x0, y0) = self.apply(-0.5, -0.5);
        let gt = self.0;
        Self([x0, gt[1], gt[2], y0, gt[4], gt[5]])
    }
}
