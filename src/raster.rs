//! Opened GeoTIFF rasters.
//!
//! Opening reads only the header and the first IFD (plus any out-of-line tag
//! arrays it points at). Pixel data is fetched chunk by chunk when a value is
//! requested. Overview IFDs are never touched: every read is at full
//! resolution.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::geometry::projection::{SpatialReference, WGS84};
use crate::geometry::{GeoTransform, PixelCoordinate};
use crate::range_reader::RangeReader;
use crate::tiff::{
    self, AnyResult, ChunkLayout, Compression, GeoKeys, Ifd, SampleType, TiffHeader,
    GEO_KEY_USER_DEFINED, HEADER_SIZE,
};

/// IFD read size estimate; most IFDs fit comfortably
const IFD_SIZE_ESTIMATE: u64 = 4096;

/// Largest decoded chunk accepted on open (1 GiB)
const MAX_CHUNK_BYTES: usize = 1 << 30;

/// Raster metadata, read from the first IFD without loading pixel data
#[derive(Debug, Clone)]
pub struct RasterMetadata {
    pub width: usize,
    pub height: usize,
    pub band_count: usize,

    pub sample_type: SampleType,
    pub compression: Compression,
    /// 1=none, 2=horizontal differencing, 3=floating point
    pub predictor: u16,
    pub little_endian: bool,

    /// Bands stored in separate planes (PlanarConfiguration=2)
    pub planar: bool,
    pub is_tiled: bool,

    /// Tile size, or (image width, rows per strip) for stripped files
    pub chunk_width: usize,
    pub chunk_height: usize,
    pub chunks_across: usize,
    pub chunks_down: usize,
    pub chunk_offsets: Vec<u64>,
    pub chunk_byte_counts: Vec<u64>,

    pub jpeg_tables: Option<Vec<u8>>,

    pub geo_transform: Option<GeoTransform>,
    pub geo_keys: GeoKeys,
    pub nodata: Option<f64>,
}

impl RasterMetadata {
    fn parse(ifd: &Ifd, reader: &dyn RangeReader) -> AnyResult<Self> {
        let required = |tag: u16, name: &str| -> AnyResult<usize> {
            ifd.first_u64(tag, reader)?
                .map(|v| v as usize)
                .ok_or_else(|| format!("Missing {name} tag").into())
        };
        let optional = |tag: u16, default: u64| -> AnyResult<u64> {
            Ok(ifd.first_u64(tag, reader)?.unwrap_or(default))
        };

        let width = required(tiff::TAG_IMAGE_WIDTH, "ImageWidth")?;
        let height = required(tiff::TAG_IMAGE_LENGTH, "ImageLength")?;
        if width == 0 || height == 0 {
            return Err(format!("Invalid raster dimensions {width}x{height}").into());
        }

        let band_count = optional(tiff::TAG_SAMPLES_PER_PIXEL, 1)? as usize;
        if band_count == 0 {
            return Err("SamplesPerPixel is zero".into());
        }

        let bits_per_sample = optional(tiff::TAG_BITS_PER_SAMPLE, 1)? as u16;
        let sample_format = optional(tiff::TAG_SAMPLE_FORMAT, 1)? as u16;
        let sample_type = SampleType::from_tags(bits_per_sample, sample_format).ok_or_else(|| {
            format!("Unsupported data type: bits={bits_per_sample}, format={sample_format}")
        })?;

        let compression_val = optional(tiff::TAG_COMPRESSION, 1)? as u16;
        let compression = Compression::from_tag(compression_val)
            .ok_or_else(|| format!("Unsupported compression: {compression_val}"))?;

        let predictor = optional(tiff::TAG_PREDICTOR, 1)? as u16;
        let planar = optional(tiff::TAG_PLANAR_CONFIGURATION, 1)? == 2 && band_count > 1;

        let is_tiled = ifd.contains(tiff::TAG_TILE_OFFSETS);
        let (chunk_width, chunk_height, offsets_tag, counts_tag) = if is_tiled {
            (
                required(tiff::TAG_TILE_WIDTH, "TileWidth")?,
                required(tiff::TAG_TILE_LENGTH, "TileLength")?,
                tiff::TAG_TILE_OFFSETS,
                tiff::TAG_TILE_BYTE_COUNTS,
            )
        } else if ifd.contains(tiff::TAG_STRIP_OFFSETS) {
            // Strips are chunks spanning the full image width
            let rows_per_strip = optional(tiff::TAG_ROWS_PER_STRIP, height as u64)? as usize;
            (
                width,
                rows_per_strip.clamp(1, height),
                tiff::TAG_STRIP_OFFSETS,
                tiff::TAG_STRIP_BYTE_COUNTS,
            )
        } else {
            return Err("TIFF has neither tile nor strip tags".into());
        };

        if chunk_width == 0 || chunk_height == 0 {
            return Err("Invalid zero chunk size".into());
        }

        let chunks_across = width.div_ceil(chunk_width);
        let chunks_down = height.div_ceil(chunk_height);
        let planes = if planar { band_count } else { 1 };
        let expected = chunks_across
            .checked_mul(chunks_down)
            .and_then(|n| n.checked_mul(planes))
            .ok_or_else(|| format!("Chunk grid for {width}x{height} raster overflows"))?;

        let samples_per_chunk_pixel = if planar { 1 } else { band_count };
        let chunk_bytes = chunk_width
            .checked_mul(chunk_height)
            .and_then(|n| n.checked_mul(samples_per_chunk_pixel))
            .and_then(|n| n.checked_mul(sample_type.bytes_per_sample()))
            .filter(|&n| n <= MAX_CHUNK_BYTES)
            .ok_or_else(|| {
                format!("Chunk size {chunk_width}x{chunk_height} with {samples_per_chunk_pixel} samples is too large")
            })?;
        debug!(chunk_bytes, expected, "Chunk grid");

        let chunk_offsets = ifd
            .u64_values(offsets_tag, reader)?
            .ok_or("Missing chunk offsets")?;
        let chunk_byte_counts = ifd
            .u64_values(counts_tag, reader)?
            .ok_or("Missing chunk byte counts")?;
        if chunk_offsets.len() < expected || chunk_byte_counts.len() < expected {
            return Err(format!(
                "Expected {expected} chunks, found {} offsets and {} byte counts",
                chunk_offsets.len(),
                chunk_byte_counts.len()
            )
            .into());
        }

        let jpeg_tables = if compression == Compression::Jpeg {
            ifd.bytes(tiff::TAG_JPEG_TABLES, reader)?
        } else {
            None
        };

        let geo_keys = GeoKeys::parse(ifd, reader)?;
        let geo_transform = read_geo_transform(ifd, reader, &geo_keys)?;

        let nodata = match ifd.ascii(tiff::TAG_GDAL_NODATA, reader)? {
            Some(text) => match text.parse::<f64>() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(nodata = %text, "Ignoring unparseable GDAL_NODATA value");
                    None
                }
            },
            None => None,
        };

        Ok(Self {
            width,
            height,
            band_count,
            sample_type,
            compression,
            predictor,
            little_endian: ifd.little_endian(),
            planar,
            is_tiled,
            chunk_width,
            chunk_height,
            chunks_across,
            chunks_down,
            chunk_offsets,
            chunk_byte_counts,
            jpeg_tables,
            geo_transform,
            geo_keys,
            nodata,
        })
    }

    /// Chunk index and sample index within the decoded chunk for a pixel of
    /// a zero-based band.
    fn locate(&self, pixel: PixelCoordinate, band: usize) -> (usize, usize) {
        let chunk_col = pixel.column / self.chunk_width;
        let chunk_row = pixel.row / self.chunk_height;
        let local_x = pixel.column - chunk_col * self.chunk_width;
        let local_y = pixel.row - chunk_row * self.chunk_height;
        let in_plane = chunk_row * self.chunks_across + chunk_col;
        let pixel_index = local_y * self.chunk_width + local_x;

        if self.planar {
            let per_plane = self.chunks_across * self.chunks_down;
            (band * per_plane + in_plane, pixel_index)
        } else {
            (in_plane, pixel_index * self.band_count + band)
        }
    }

    fn chunk_layout(&self) -> ChunkLayout {
        ChunkLayout {
            width: self.chunk_width,
            height: self.chunk_height,
            samples_per_pixel: if self.planar { 1 } else { self.band_count },
            sample_type: self.sample_type,
            compression: self.compression,
            predictor: self.predictor,
            little_endian: self.little_endian,
            jpeg_tables: self.jpeg_tables.clone(),
        }
    }
}

/// Build the forward affine transform from ModelTransformation, or from
/// ModelTiepoint + ModelPixelScale.
fn read_geo_transform(
    ifd: &Ifd,
    reader: &dyn RangeReader,
    geo_keys: &GeoKeys,
) -> AnyResult<Option<GeoTransform>> {
    let transform = if let Some(m) = ifd.f64_values(tiff::TAG_MODEL_TRANSFORMATION, reader, 16)? {
        Some(GeoTransform([m[3], m[0], m[1], m[7], m[4], m[5]]))
    } else {
        let tiepoint = ifd.f64_values(tiff::TAG_MODEL_TIEPOINT, reader, 6)?;
        let scale = ifd.f64_values(tiff::TAG_MODEL_PIXEL_SCALE, reader, 2)?;
        match (tiepoint, scale) {
            (Some(tie), Some(scale)) => {
                let (sx, sy) = (scale[0], scale[1]);
                Some(GeoTransform([
                    tie[3] - tie[0] * sx,
                    sx,
                    0.0,
                    tie[4] + tie[1] * sy,
                    0.0,
                    -sy,
                ]))
            }
            _ => None,
        }
    };

    // PixelIsPoint: tie points reference pixel centres
    Ok(transform.map(|gt| {
        if geo_keys.is_pixel_is_point() {
            gt.shifted_half_pixel()
        } else {
            gt
        }
    }))
}

/// An opened, read-only raster.
///
/// The underlying source (file handle, HTTP client, object-store reader) is
/// released when the handle is dropped.
pub struct RasterHandle {
    reader: Box<dyn RangeReader>,
    metadata: RasterMetadata,
}

impl std::fmt::Debug for RasterHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterHandle")
            .field("source", &self.reader.identifier())
            .field("width", &self.metadata.width)
            .field("height", &self.metadata.height)
            .field("bands", &self.metadata.band_count)
            .finish()
    }
}

impl RasterHandle {
    /// Open a GeoTIFF from a range reader
    pub fn open(reader: Box<dyn RangeReader>) -> AnyResult<Self> {
        let header_bytes = reader.read_range(0, HEADER_SIZE)?;
        let header = TiffHeader::parse(&header_bytes)?;
        let ifd_offset = u64::from(header.first_ifd_offset);
        let little_endian = header.little_endian;

        let file_size = reader.size();
        let estimate = if file_size == 0 {
            IFD_SIZE_ESTIMATE
        } else {
            IFD_SIZE_ESTIMATE.min(file_size.saturating_sub(ifd_offset))
        };

        let mut ifd_bytes = reader.read_range(ifd_offset, estimate as usize)?;
        if ifd_bytes.len() < 2 {
            return Err(format!("IFD offset {ifd_offset} is past the end of the file").into());
        }

        // Re-read when the IFD is larger than the estimate
        let entry_count = tiff::read_u16(&ifd_bytes[0..2], little_endian) as usize;
        let needed = Ifd::byte_len(entry_count);
        if ifd_bytes.len() < needed {
            ifd_bytes = reader.read_range(ifd_offset, needed)?;
        }

        let ifd = Ifd::parse(&ifd_bytes, little_endian)?;
        let metadata = RasterMetadata::parse(&ifd, reader.as_ref())?;

        debug!(
            source = reader.identifier(),
            width = metadata.width,
            height = metadata.height,
            bands = metadata.band_count,
            sample_type = ?metadata.sample_type,
            compression = ?metadata.compression,
            tiled = metadata.is_tiled,
            planar = metadata.planar,
            "Opened raster"
        );

        Ok(Self { reader, metadata })
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.metadata.width
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.metadata.height
    }

    #[must_use]
    pub fn band_count(&self) -> usize {
        self.metadata.band_count
    }

    #[must_use]
    pub fn identifier(&self) -> &str {
        self.reader.identifier()
    }

    #[must_use]
    pub fn metadata(&self) -> &RasterMetadata {
        &self.metadata
    }

    /// No-data sentinel shared by every band
    #[must_use]
    pub fn nodata(&self) -> Option<f64> {
        self.metadata.nodata
    }

    /// Native spatial reference from the GeoKey directory.
    ///
    /// A raster with no CRS key is taken to be WGS84 longitude/latitude.
    pub fn spatial_reference(&self) -> Result<SpatialReference> {
        let keys = &self.metadata.geo_keys;
        match keys.crs_code() {
            Some(code) if code == i32::from(GEO_KEY_USER_DEFINED) => Err(Error::Projection(format!(
                "{} uses a user-defined coordinate system",
                self.identifier()
            ))),
            Some(code) => SpatialReference::from_epsg(code),
            None => {
                warn!(source = self.identifier(), "Raster has no CRS GeoKey, assuming EPSG:{WGS84}");
                Ok(SpatialReference::wgs84())
            }
        }
    }

    /// Forward pixel-to-world affine transform
    pub fn geo_transform(&self) -> Result<GeoTransform> {
        self.metadata.geo_transform.ok_or_else(|| {
            Error::Projection(format!("{} has no georeferencing", self.identifier()))
        })
    }

    /// Reader for the band values of a single pixel.
    #[must_use]
    pub fn pixel_reader(&self, pixel: PixelCoordinate) -> PixelReader<'_> {
        PixelReader {
            raster: self,
            pixel,
            decoded: HashMap::new(),
        }
    }

    fn read_chunk(&self, chunk_index: usize) -> AnyResult<Vec<f32>> {
        let layout = self.metadata.chunk_layout();
        let offset = self.metadata.chunk_offsets[chunk_index];
        let byte_count = self.metadata.chunk_byte_counts[chunk_index] as usize;

        if byte_count == 0 {
            // Sparse chunk: GDAL reports nodata (or zero) for these
            let fill = self.metadata.nodata.map_or(0.0, |v| v as f32);
            let count = layout.sample_count().ok_or("Chunk size overflows")?;
            return Ok(vec![fill; count]);
        }

        let compressed = self.reader.read_range(offset, byte_count)?;
        if compressed.len() < byte_count {
            return Err(format!(
                "Chunk {chunk_index} truncated: expected {byte_count} bytes, got {}",
                compressed.len()
            )
            .into());
        }

        tiff::decode_chunk(&compressed, &layout)
    }
}

impl Drop for RasterHandle {
    fn drop(&mut self) {
        debug!(source = self.reader.identifier(), "Released raster");
    }
}

/// Reads one pixel band by band, decoding each chunk at most once.
pub struct PixelReader<'a> {
    raster: &'a RasterHandle,
    pixel: PixelCoordinate,
    decoded: HashMap<usize, Vec<f32>>,
}

impl PixelReader<'_> {
    /// Value of a one-based band at this pixel, as a 32-bit float
    pub fn read_band(&mut self, band: usize) -> AnyResult<f32> {
        let metadata = &self.raster.metadata;
        if band == 0 || band > metadata.band_count {
            return Err(format!("Band {band} out of range 1..={}", metadata.band_count).into());
        }
        if self.pixel.column >= metadata.width || self.pixel.row >= metadata.height {
            return Err(format!(
                "Pixel ({}, {}) outside {}x{} raster",
                self.pixel.column, self.pixel.row, metadata.width, metadata.height
            )
            .into());
        }

        let (chunk_index, sample_index) = metadata.locate(self.pixel, band - 1);

        if !self.decoded.contains_key(&chunk_index) {
            let chunk = self.raster.read_chunk(chunk_index)?;
            self.decoded.insert(chunk_index, chunk);
        }

        self.decoded
            .get(&chunk_index)
            .and_then(|chunk| chunk.get(sample_index).copied())
            .ok_or_else(|| format!("Sample {sample_index} missing from chunk {chunk_index}").into())
    }
}
