//! # hazpoint - Point sampling of GeoTIFF hazard rasters
//!
//! Looks up hazard raster values at a WGS84 location and computes confidence
//! intervals from hazard statistics, without GDAL.
//!
//! ## Features
//!
//! - **Metadata-only open**: only the header and first IFD are read on open
//! - **Range reads**: single chunks fetched from local files, HTTP, S3 or Azure
//! - **Compression**: DEFLATE, LZW, ZSTD, JPEG and uncompressed
//! - **Coordinate transforms**: pure Rust proj4rs from EPSG:4326 to the raster CRS
//! - **No-data aware**: values matching `GDAL_NODATA` come back as `null`
//! - **Confidence intervals**: normal-distribution bounds via statrs
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hazpoint::{BandQuery, GeoPoint, LocalStore, PointQuery, RasterStore};
//!
//! let store = LocalStore::new("data");
//! let raster = store.open_raster("flood_depth.tif")?;
//!
//! let point = GeoPoint::new(-122.4, 37.8)?;
//! for result in raster.sample_lonlat(point, &[BandQuery(1), BandQuery(2)])? {
//!     println!("Band {}: {:?}", result.band, result.value.value());
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`tiff`]: TIFF/GeoTIFF tag parsing and chunk decoding
//! - [`raster`]: raster metadata and single-pixel reads via [`RasterHandle`]
//! - [`point_query`]: geographic sampling via the [`PointQuery`] trait
//! - [`geometry`]: coordinate types ([`GeoPoint`], [`GeoTransform`]) and projections
//! - [`range_reader`]: I/O abstraction for local/HTTP/object-store sources
//! - [`storage`]: resolves request identifiers to rasters ([`RasterStore`])
//! - [`ci`]: confidence interval calculation
//! - [`service`]: request validation and the shared [`HazardService`]
//! - [`http`]: axum router for the web-app and functions hosts
//! - [`config`]: TOML configuration

// ============================================================================
// Public modules
// ============================================================================

pub mod ci;
pub mod config;
pub mod error;
pub mod geometry;
pub mod http;
pub mod point_query;
pub mod range_reader;
pub mod raster;
pub mod service;
pub mod storage;
pub mod tiff;

#[cfg(test)]
mod test_utils;

// ============================================================================
// Errors & Configuration
// ============================================================================

pub use error::{Error, Result};
pub use config::{Config, ConfigError, StorageConfig};

// ============================================================================
// Rasters
// ============================================================================

pub use raster::{
    RasterHandle,
    RasterMetadata,
};

pub use tiff::{
    Compression,
    SampleType,
};

// ============================================================================
// Point Queries
// ============================================================================

pub use point_query::{
    BandQuery,
    PointQuery,
    SampleResult,
    SampleValue,
};

// ============================================================================
// Geometry & Projections
// ============================================================================

pub use geometry::{GeoPoint, GeoTransform, PixelCoordinate};
pub use geometry::projection::{
    CoordinateTransformation,
    SpatialReference,
    get_proj_string,
    is_geographic_crs,
};

// ============================================================================
// Range Readers (I/O Abstraction)
// ============================================================================

pub use range_reader::{
    RangeReader,
    LocalRangeReader,
    HttpRangeReader,
    MemoryRangeReader,
    ObjectRangeReader,
};

// ============================================================================
// Storage
// ============================================================================

pub use storage::{
    RasterStore,
    LocalStore,
    HttpStore,
    ObjectStoreBackend,
    build_store,
};

// ============================================================================
// Confidence Intervals & Service
// ============================================================================

pub use ci::{ConfidenceIntervalResult, Distribution, HazardStats, compute_ci};
pub use service::{BandValue, CiRequest, HazardService, ValuesRequest};
pub use http::{HostKind, router};
