//! Pure-Rust coordinate transformation (proj4rs + crs-definitions).
//!
//! Spatial references are identified by EPSG code and expanded to PROJ.4
//! definitions through the crs-definitions database, which covers thousands
//! of codes including UTM zones and national grids.

use proj4rs::proj::Proj;
use proj4rs::transform::transform;

use crate::error::{Error, Result};

/// EPSG code of WGS84 longitude/latitude
pub const WGS84: i32 = 4326;

/// Get PROJ4 string for an EPSG code using the crs-definitions database
#[inline]
pub fn get_proj_string(epsg: i32) -> Option<&'static str> {
    u16::try_from(epsg)
        .ok()
        .and_then(crs_definitions::from_code)
        .map(|def| def.proj4)
}

/// Check if an EPSG code represents a geographic (lon/lat) CRS
#[inline]
pub fn is_geographic_crs(epsg: i32) -> bool {
    if let Some(proj_str) = get_proj_string(epsg) {
        proj_str.contains("+proj=longlat")
    } else {
        epsg == WGS84 || (4000..5000).contains(&epsg)
    }
}

/// A raster's native coordinate reference system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpatialReference {
    epsg: i32,
}

impl SpatialReference {
    /// Look up an EPSG code; unknown codes are a projection failure.
    pub fn from_epsg(epsg: i32) -> Result<Self> {
        if get_proj_string(epsg).is_none() {
            return Err(Error::Projection(format!(
                "EPSG:{epsg} is not in the crs-definitions database"
            )));
        }
        Ok(Self { epsg })
    }

    #[must_use]
    pub fn wgs84() -> Self {
        Self { epsg: WGS84 }
    }

    #[must_use]
    pub fn epsg(&self) -> i32 {
        self.epsg
    }

    #[must_use]
    pub fn is_geographic(&self) -> bool {
        is_geographic_crs(self.epsg)
    }

    /// PROJ.4 definition of this reference
    pub fn proj4(&self) -> Result<&'static str> {
        get_proj_string(self.epsg)
            .ok_or_else(|| Error::Projection(format!("EPSG:{} has no PROJ.4 definition", self.epsg)))
    }

    fn to_proj(self) -> Result<Proj> {
        Proj::from_proj_string(self.proj4()?)
            .map_err(|e| Error::Projection(format!("Invalid projection EPSG:{}: {e:?}", self.epsg)))
    }
}

impl std::fmt::Display for SpatialReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EPSG:{}", self.epsg)
    }
}

/// A transformation between two spatial references, axis order (x, y).
///
/// Geographic references take and return degrees in longitude-first order.
pub struct CoordinateTransformation {
    source: SpatialReference,
    target: SpatialReference,
    projs: Option<(Proj, Proj)>,
}

impl std::fmt::Debug for CoordinateTransformation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinateTransformation")
            .field("source", &self.source)
            .field("target", &self.target)
            .finish()
    }
}

impl CoordinateTransformation {
    pub fn new(source: SpatialReference, target: SpatialReference) -> Result<Self> {
        // No-op if same CRS
        let projs = if source == target {
            None
        } else {
            Some((source.to_proj()?, target.to_proj()?))
        };

        Ok(Self {
            source,
            target,
            projs,
        })
    }

    #[must_use]
    pub fn source(&self) -> SpatialReference {
        self.source
    }

    #[must_use]
    pub fn target(&self) -> SpatialReference {
        self.target
    }

    /// Transform one point, returning (x, y, z). The z component is whatever
    /// the datum shift leaves behind and is normally ignored by callers.
    pub fn transform_point(&self, x: f64, y: f64) -> Result<(f64, f64, f64)> {
        let Some((source_proj, target_proj)) = &self.projs else {
            return Ok((x, y, 0.0));
        };

        // proj4rs uses radians for geographic coordinates
        let mut point = if self.source.is_geographic() {
            (x.to_radians(), y.to_radians(), 0.0)
        } else {
            (x, y, 0.0)
        };

        transform(source_proj, target_proj, &mut point).map_err(|e| {
            Error::Projection(format!(
                "Transform from {} to {} failed: {e:?}",
                self.source, self.target
            ))
        })?;

        let (out_x, out_y) = if self.target.is_geographic() {
            (point.0.to_degrees(), point.1.to_degrees())
        } else {
            (point.0, point.1)
        };

        if !out_x.is_finite() || !out_y.is_finite() {
            return Err(Error::Projection(format!(
                "Transform from {} to {} produced a non-finite coordinate",
                self.source, self.target
            )));
        }

        Ok((out_x, out_y, point.2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < EPS
    }

    fn transformation(source: i32, target: i32) -> CoordinateTransformation {
        CoordinateTransformation::new(
            SpatialReference::from_epsg(source).unwrap(),
            SpatialReference::from_epsg(target).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_same_crs_is_identity() {
        let ct = transformation(4326, 4326);
        let (x, y, z) = ct.transform_point(10.0, 51.5).unwrap();
        assert!(approx_eq(x, 10.0));
        assert!(approx_eq(y, 51.5));
        assert!(approx_eq(z, 0.0));
    }

    #[test]
    fn test_wgs84_to_mercator_origin() {
        let (x, y, _) = transformation(4326, 3857).transform_point(0.0, 0.0).unwrap();
        assert!(approx_eq(x, 0.0));
        assert!(approx_eq(y, 0.0));
    }

    #[test]
    fn test_roundtrip_4326_3857() {
        let forward = transformation(4326, 3857);
        let back = transformation(3857, 4326);

        for (lon, lat) in [(10.0, 51.5), (-122.4, 37.8), (139.7, 35.7)] {
            let (x, y, _) = forward.transform_point(lon, lat).unwrap();
            let (lon2, lat2, _) = back.transform_point(x, y).unwrap();
            assert!(approx_eq(lon, lon2), "lon: {lon} != {lon2}");
            assert!(approx_eq(lat, lat2), "lat: {lat} != {lat2}");
        }
    }

    #[test]
    fn test_wgs84_to_utm() {
        // EPSG:32633 is UTM zone 33N
        let (x, y, _) = transformation(4326, 32633).transform_point(15.0, 52.0).unwrap();
        assert!(x > 400000.0 && x < 600000.0, "UTM easting: {x}");
        assert!(y > 5000000.0 && y < 6000000.0, "UTM northing: {y}");
    }

    #[test]
    fn test_roundtrip_utm() {
        let (x, y, _) = transformation(4326, 32633).transform_point(15.0, 52.0).unwrap();
        let (lon, lat, _) = transformation(32633, 4326).transform_point(x, y).unwrap();
        assert!((lon - 15.0).abs() < 1e-5, "lon roundtrip: {lon}");
        assert!((lat - 52.0).abs() < 1e-5, "lat roundtrip: {lat}");
    }

    #[test]
    fn test_is_geographic_crs() {
        assert!(is_geographic_crs(4326));
        assert!(!is_geographic_crs(3857));
        assert!(!is_geographic_crs(32633));
        assert!(SpatialReference::wgs84().is_geographic());
    }

    #[test]
    fn test_unknown_epsg_code() {
        let err = SpatialReference::from_epsg(999999).unwrap_err();
        assert!(matches!(err, Error::Projection(_)));
        assert!(err.to_string().contains("not in the crs-definitions database"));
    }

    #[test]
    fn test_display() {
        assert_eq!(SpatialReference::wgs84().to_string(), "EPSG:4326");
    }
}
