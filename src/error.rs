//! Error types for hazpoint.
//!
//! Request-facing failures (bad input, missing raster, band or extent
//! violations, unsupported distribution) are terminal for the request and
//! carry enough context for the caller to correct and resubmit. Projection,
//! read and internal failures indicate a problem with the raster or the host.

use thiserror::Error;

use crate::config::ConfigError;

/// Boxed error used by the low-level TIFF and range-reading code.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Top-level error type for hazpoint.
#[derive(Debug, Error)]
pub enum Error {
    // ═══════════════════════════════════════════════════════════════════
    // Caller errors: reported as-is so the request can be corrected
    // ═══════════════════════════════════════════════════════════════════

    #[error("{0}")]
    InvalidInput(String),

    #[error("File {file} cannot be opened or does not exist")]
    RasterOpen {
        file: String,
        #[source]
        source: BoxError,
    },

    #[error("Band {band} does not exist in the raster")]
    InvalidBand { band: i64, band_count: usize },

    #[error(
        "Lat/lon coordinates resolved to col/row ({column}, {row}) and are outside of the raster extent ((0, 0), ({width}, {height}))"
    )]
    OutOfBounds {
        column: i64,
        row: i64,
        width: usize,
        height: usize,
    },

    #[error("only normal distribution is currently implemented")]
    UnsupportedDistribution(String),

    // ═══════════════════════════════════════════════════════════════════
    // Raster / host failures
    // ═══════════════════════════════════════════════════════════════════

    #[error("Projection error: {0}")]
    Projection(String),

    #[error("Failed to read band {band} of {file}: {source}")]
    RasterRead {
        file: String,
        band: i64,
        #[source]
        source: BoxError,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an open failure for a logical file identifier.
    pub fn raster_open(file: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::RasterOpen {
            file: file.into(),
            source: source.into(),
        }
    }

    /// Whether the failure was caused by the request rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_)
                | Self::RasterOpen { .. }
                | Self::InvalidBand { .. }
                | Self::OutOfBounds { .. }
                | Self::UnsupportedDistribution(_)
        )
    }
}

/// Result type alias for hazpoint.
pub type Result<T> = std::result::Result<T, Error>;
