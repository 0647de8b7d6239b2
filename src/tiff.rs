//! TIFF plumbing: tag constants, IFD decoding and chunk decoding.
//!
//! A "chunk" is either a tile or a strip. Chunks are decompressed, the
//! predictor is reversed, and samples are widened to `f32` (the same buffer
//! type GDAL hands back for a Float32 read).

use std::collections::HashMap;

use crate::error::BoxError;
use crate::range_reader::RangeReader;

pub type AnyResult<T> = Result<T, BoxError>;

// TIFF tag constants
pub const TAG_IMAGE_WIDTH: u16 = 256;
pub const TAG_IMAGE_LENGTH: u16 = 257;
pub const TAG_BITS_PER_SAMPLE: u16 = 258;
pub const TAG_COMPRESSION: u16 = 259;
pub const TAG_PHOTOMETRIC: u16 = 262;
pub const TAG_STRIP_OFFSETS: u16 = 273;
pub const TAG_SAMPLES_PER_PIXEL: u16 = 277;
pub const TAG_ROWS_PER_STRIP: u16 = 278;
pub const TAG_STRIP_BYTE_COUNTS: u16 = 279;
pub const TAG_PLANAR_CONFIGURATION: u16 = 284;
pub const TAG_PREDICTOR: u16 = 317;
pub const TAG_TILE_WIDTH: u16 = 322;
pub const TAG_TILE_LENGTH: u16 = 323;
pub const TAG_TILE_OFFSETS: u16 = 324;
pub const TAG_TILE_BYTE_COUNTS: u16 = 325;
pub const TAG_SAMPLE_FORMAT: u16 = 339;
pub const TAG_JPEG_TABLES: u16 = 347;
pub const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
pub const TAG_MODEL_TIEPOINT: u16 = 33922;
pub const TAG_MODEL_TRANSFORMATION: u16 = 34264;
pub const TAG_GEO_KEY_DIRECTORY: u16 = 34735;
pub const TAG_GDAL_NODATA: u16 = 42113;

// GeoKey constants
pub const GEO_KEY_MODEL_TYPE: u16 = 1024;
pub const GEO_KEY_RASTER_TYPE: u16 = 1025;
pub const GEO_KEY_GEOGRAPHIC_TYPE: u16 = 2048;
pub const GEO_KEY_PROJECTED_CRS: u16 = 3072;
pub const RASTER_PIXEL_IS_AREA: u16 = 1;
pub const RASTER_PIXEL_IS_POINT: u16 = 2;
pub const GEO_KEY_USER_DEFINED: u16 = 32767;

// Field types
pub const TYPE_BYTE: u16 = 1;
pub const TYPE_ASCII: u16 = 2;
pub const TYPE_SHORT: u16 = 3;
pub const TYPE_LONG: u16 = 4;
pub const TYPE_DOUBLE: u16 = 12;
pub const TYPE_LONG8: u16 = 16;

// Compression constants
const COMPRESSION_NONE: u16 = 1;
const COMPRESSION_LZW: u16 = 5;
const COMPRESSION_JPEG: u16 = 7;
const COMPRESSION_DEFLATE: u16 = 8;
const COMPRESSION_DEFLATE_LEGACY: u16 = 32946;
const COMPRESSION_ZSTD: u16 = 50000;

// Sample format constants
const SAMPLE_FORMAT_UINT: u16 = 1;
const SAMPLE_FORMAT_INT: u16 = 2;
const SAMPLE_FORMAT_FLOAT: u16 = 3;

/// Sample type detected from TIFF tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleType {
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
}

impl SampleType {
    #[must_use]
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            SampleType::UInt8 | SampleType::Int8 => 1,
            SampleType::UInt16 | SampleType::Int16 => 2,
            SampleType::UInt32 | SampleType::Int32 | SampleType::Float32 => 4,
            SampleType::UInt64 | SampleType::Int64 | SampleType::Float64 => 8,
        }
    }

    /// Detect sample type from BitsPerSample / SampleFormat
    #[must_use]
    pub fn from_tags(bits_per_sample: u16, sample_format: u16) -> Option<Self> {
        match (sample_format, bits_per_sample) {
            (SAMPLE_FORMAT_UINT, 8) => Some(SampleType::UInt8),
            (SAMPLE_FORMAT_UINT, 16) => Some(SampleType::UInt16),
            (SAMPLE_FORMAT_UINT, 32) => Some(SampleType::UInt32),
            (SAMPLE_FORMAT_UINT, 64) => Some(SampleType::UInt64),
            (SAMPLE_FORMAT_INT, 8) => Some(SampleType::Int8),
            (SAMPLE_FORMAT_INT, 16) => Some(SampleType::Int16),
            (SAMPLE_FORMAT_INT, 32) => Some(SampleType::Int32),
            (SAMPLE_FORMAT_INT, 64) => Some(SampleType::Int64),
            (SAMPLE_FORMAT_FLOAT, 32) => Some(SampleType::Float32),
            (SAMPLE_FORMAT_FLOAT, 64) => Some(SampleType::Float64),
            // Default to unsigned if sample format not specified
            (_, 8) => Some(SampleType::UInt8),
            (_, 16) => Some(SampleType::UInt16),
            (_, 32) => Some(SampleType::UInt32),
            _ => None,
        }
    }
}

/// Compression method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Lzw,
    Jpeg,
    Deflate,
    Zstd,
}

impl Compression {
    #[must_use]
    pub fn from_tag(value: u16) -> Option<Self> {
        match value {
            COMPRESSION_NONE => Some(Compression::None),
            COMPRESSION_LZW => Some(Compression::Lzw),
            COMPRESSION_JPEG => Some(Compression::Jpeg),
            COMPRESSION_DEFLATE | COMPRESSION_DEFLATE_LEGACY => Some(Compression::Deflate),
            COMPRESSION_ZSTD => Some(Compression::Zstd),
            _ => None,
        }
    }
}

// ============================================================================
// Byte helpers
// ============================================================================

#[inline]
pub fn read_u16(bytes: &[u8], little_endian: bool) -> u16 {
    let b = [bytes[0], bytes[1]];
    if little_endian {
        u16::from_le_bytes(b)
    } else {
        u16::from_be_bytes(b)
    }
}

#[inline]
pub fn read_u32(bytes: &[u8], little_endian: bool) -> u32 {
    let b = [bytes[0], bytes[1], bytes[2], bytes[3]];
    if little_endian {
        u32::from_le_bytes(b)
    } else {
        u32::from_be_bytes(b)
    }
}

#[inline]
pub fn read_u64(bytes: &[u8], little_endian: bool) -> u64 {
    let b = [
        bytes[0], bytes[1], bytes[2], bytes[3],
        bytes[4], bytes[5], bytes[6], bytes[7],
    ];
    if little_endian {
        u64::from_le_bytes(b)
    } else {
        u64::from_be_bytes(b)
    }
}

#[inline]
pub fn read_f64(bytes: &[u8], little_endian: bool) -> f64 {
    f64::from_bits(read_u64(bytes, little_endian))
}

/// Size in bytes of one value of a TIFF field type.
fn field_type_size(field_type: u16) -> Option<usize> {
    match field_type {
        1 | 2 | 6 | 7 => Some(1),
        3 | 8 => Some(2),
        4 | 9 | 11 => Some(4),
        5 | 10 | 12 | 16 | 17 => Some(8),
        _ => None,
    }
}

// ============================================================================
// IFD decoding
// ============================================================================

/// Size of the fixed TIFF header (byte order, magic, first IFD offset)
pub const HEADER_SIZE: usize = 8;

/// Parsed classic TIFF header
#[derive(Debug, Clone, Copy)]
pub struct TiffHeader {
    pub little_endian: bool,
    pub first_ifd_offset: u32,
}

impl TiffHeader {
    pub fn parse(bytes: &[u8]) -> AnyResult<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err("File is too small to be a TIFF".into());
        }

        let little_endian = match &bytes[0..2] {
            b"II" => true,
            b"MM" => false,
            _ => return Err("Invalid TIFF signature".into()),
        };

        match read_u16(&bytes[2..4], little_endian) {
            42 => {}
            43 => return Err("BigTIFF files are not supported".into()),
            version => return Err(format!("Invalid TIFF version: {version}").into()),
        }

        Ok(Self {
            little_endian,
            first_ifd_offset: read_u32(&bytes[4..8], little_endian),
        })
    }
}

#[derive(Debug, Clone)]
pub struct IfdEntry {
    pub field_type: u16,
    pub count: u32,
    pub value_offset: u32,
    pub raw_bytes: [u8; 4],
}

/// A decoded image file directory
#[derive(Debug, Clone)]
pub struct Ifd {
    entries: HashMap<u16, IfdEntry>,
    little_endian: bool,
    pub next_ifd_offset: u32,
}

impl Ifd {
    /// Number of bytes an IFD with `entry_count` entries occupies
    #[must_use]
    pub fn byte_len(entry_count: usize) -> usize {
        2 + entry_count * 12 + 4
    }

    /// Parse an IFD from bytes starting at the entry count
    pub fn parse(ifd_bytes: &[u8], little_endian: bool) -> AnyResult<Self> {
        if ifd_bytes.len() < 2 {
            return Err("Truncated IFD".into());
        }
        let entry_count = read_u16(&ifd_bytes[0..2], little_endian) as usize;
        if ifd_bytes.len() < 2 + entry_count * 12 {
            return Err(format!("Truncated IFD: {entry_count} entries declared").into());
        }

        let mut entries = HashMap::with_capacity(entry_count);
        for i in 0..entry_count {
            let offset = 2 + i * 12;
            let tag = read_u16(&ifd_bytes[offset..offset + 2], little_endian);
            let field_type = read_u16(&ifd_bytes[offset + 2..offset + 4], little_endian);
            let count = read_u32(&ifd_bytes[offset + 4..offset + 8], little_endian);
            let value_offset = read_u32(&ifd_bytes[offset + 8..offset + 12], little_endian);

            entries.insert(
                tag,
                IfdEntry {
                    field_type,
                    count,
                    value_offset,
                    raw_bytes: [
                        ifd_bytes[offset + 8],
                        ifd_bytes[offset + 9],
                        ifd_bytes[offset + 10],
                        ifd_bytes[offset + 11],
                    ],
                },
            );
        }

        // The next IFD offset is right after all entries
        let next_ifd_pos = 2 + entry_count * 12;
        let next_ifd_offset = if next_ifd_pos + 4 <= ifd_bytes.len() {
            read_u32(&ifd_bytes[next_ifd_pos..next_ifd_pos + 4], little_endian)
        } else {
            0
        };

        Ok(Self {
            entries,
            little_endian,
            next_ifd_offset,
        })
    }

    #[must_use]
    pub fn contains(&self, tag: u16) -> bool {
        self.entries.contains_key(&tag)
    }

    #[must_use]
    pub fn little_endian(&self) -> bool {
        self.little_endian
    }

    /// Raw value bytes of a tag, read inline or from its offset
    fn raw(&self, tag: u16, reader: &dyn RangeReader) -> AnyResult<Option<(u16, usize, Vec<u8>)>> {
        let Some(entry) = self.entries.get(&tag) else {
            return Ok(None);
        };

        let type_size = field_type_size(entry.field_type)
            .ok_or_else(|| format!("Unsupported field type {} for tag {tag}", entry.field_type))?;
        let count = entry.count as usize;
        let total_bytes = count * type_size;

        let bytes = if total_bytes <= 4 {
            entry.raw_bytes[..total_bytes].to_vec()
        } else {
            let bytes = reader.read_range(u64::from(entry.value_offset), total_bytes)?;
            if bytes.len() < total_bytes {
                return Err(format!("Truncated value for tag {tag}").into());
            }
            bytes
        };

        Ok(Some((entry.field_type, count, bytes)))
    }

    /// Integer values of a BYTE/SHORT/LONG/LONG8 tag
    pub fn u64_values(&self, tag: u16, reader: &dyn RangeReader) -> AnyResult<Option<Vec<u64>>> {
        let Some((field_type, count, bytes)) = self.raw(tag, reader)? else {
            return Ok(None);
        };

        let le = self.little_endian;
        let values = match field_type {
            TYPE_BYTE => bytes.iter().map(|&b| u64::from(b)).collect(),
            TYPE_SHORT => (0..count).map(|i| u64::from(read_u16(&bytes[i * 2..], le))).collect(),
            TYPE_LONG => (0..count).map(|i| u64::from(read_u32(&bytes[i * 4..], le))).collect(),
            TYPE_LONG8 => (0..count).map(|i| read_u64(&bytes[i * 8..], le)).collect(),
            other => return Err(format!("Unsupported type {other} for tag {tag}").into()),
        };

        Ok(Some(values))
    }

    /// First integer value of a tag (authoritative for per-sample arrays)
    pub fn first_u64(&self, tag: u16, reader: &dyn RangeReader) -> AnyResult<Option<u64>> {
        Ok(self.u64_values(tag, reader)?.and_then(|v| v.first().copied()))
    }

    /// Values of a DOUBLE tag, if present with at least `min_count` values
    pub fn f64_values(
        &self,
        tag: u16,
        reader: &dyn RangeReader,
        min_count: usize,
    ) -> AnyResult<Option<Vec<f64>>> {
        match self.entries.get(&tag) {
            Some(entry) if entry.field_type == TYPE_DOUBLE && entry.count as usize >= min_count => {}
            _ => return Ok(None),
        }

        let Some((_, count, bytes)) = self.raw(tag, reader)? else {
            return Ok(None);
        };
        Ok(Some((0..count).map(|i| read_f64(&bytes[i * 8..], self.little_endian)).collect()))
    }

    /// Value of an ASCII tag with the trailing NUL stripped
    pub fn ascii(&self, tag: u16, reader: &dyn RangeReader) -> AnyResult<Option<String>> {
        let Some((_, _, bytes)) = self.raw(tag, reader)? else {
            return Ok(None);
        };
        let text = String::from_utf8_lossy(&bytes);
        Ok(Some(text.trim_end_matches('\0').trim().to_string()))
    }

    /// Undecoded bytes of a tag (e.g. JPEGTables)
    pub fn bytes(&self, tag: u16, reader: &dyn RangeReader) -> AnyResult<Option<Vec<u8>>> {
        Ok(self.raw(tag, reader)?.map(|(_, _, bytes)| bytes))
    }
}

/// The GeoKeys relevant to locating a raster on the Earth
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeoKeys {
    pub model_type: Option<u16>,
    pub raster_type: Option<u16>,
    pub geographic_type: Option<u16>,
    pub projected_type: Option<u16>,
}

impl GeoKeys {
    /// Parse the GeoKey directory (SHORT array)
    ///
    /// Layout: KeyDirectoryVersion, KeyRevision, MinorRevision, NumberOfKeys,
    /// then (KeyID, TIFFTagLocation, Count, Value_Offset) per key. Only keys
    /// stored inline (location 0) are needed here.
    pub fn parse(ifd: &Ifd, reader: &dyn RangeReader) -> AnyResult<Self> {
        let Some(values) = ifd.u64_values(TAG_GEO_KEY_DIRECTORY, reader)? else {
            return Ok(Self::default());
        };
        if values.len() < 4 {
            return Ok(Self::default());
        }

        let mut keys = Self::default();
        let num_keys = values[3] as usize;
        for key in values[4..].chunks_exact(4).take(num_keys) {
            let (key_id, location, value) = (key[0] as u16, key[1], key[3] as u16);
            if location != 0 {
                continue;
            }
            match key_id {
                GEO_KEY_MODEL_TYPE => keys.model_type = Some(value),
                GEO_KEY_RASTER_TYPE => keys.raster_type = Some(value),
                GEO_KEY_GEOGRAPHIC_TYPE => keys.geographic_type = Some(value),
                GEO_KEY_PROJECTED_CRS => keys.projected_type = Some(value),
                _ => {}
            }
        }

        Ok(keys)
    }

    /// EPSG code of the raster CRS, projected preferred over geographic
    #[must_use]
    pub fn crs_code(&self) -> Option<i32> {
        self.projected_type
            .filter(|&v| v > 0)
            .or(self.geographic_type.filter(|&v| v > 0))
            .map(i32::from)
    }

    #[must_use]
    pub fn is_pixel_is_point(&self) -> bool {
        self.raster_type == Some(RASTER_PIXEL_IS_POINT)
    }
}

// ============================================================================
// Chunk decoding
// ============================================================================

/// Everything needed to decode one tile or strip into `f32` samples
#[derive(Debug, Clone)]
pub struct ChunkLayout {
    /// Chunk width in pixels
    pub width: usize,
    /// Chunk height in pixels
    pub height: usize,
    /// Samples stored per pixel in this chunk (1 for planar layouts)
    pub samples_per_pixel: usize,
    pub sample_type: SampleType,
    pub compression: Compression,
    pub predictor: u16,
    pub little_endian: bool,
    pub jpeg_tables: Option<Vec<u8>>,
}

impl ChunkLayout {
    /// Samples in the decoded chunk, `None` if the dimensions overflow.
    #[must_use]
    pub fn sample_count(&self) -> Option<usize> {
        self.width
            .checked_mul(self.height)?
            .checked_mul(self.samples_per_pixel)
    }

    /// Decoded chunk size in bytes, `None` if it overflows.
    #[must_use]
    pub fn byte_len(&self) -> Option<usize> {
        self.sample_count()?
            .checked_mul(self.sample_type.bytes_per_sample())
    }

    fn checked_byte_len(&self) -> AnyResult<usize> {
        self.byte_len().ok_or_else(|| {
            format!(
                "Chunk size {}x{}x{} overflows",
                self.width, self.height, self.samples_per_pixel
            )
            .into()
        })
    }
}

/// Decompress, reverse the predictor, and widen to `f32`.
pub fn decode_chunk(compressed: &[u8], layout: &ChunkLayout) -> AnyResult<Vec<f32>> {
    let byte_len = layout.checked_byte_len()?;
    let mut decompressed = decompress(compressed, layout, byte_len)?;

    // Partial strips/tiles are zero-padded to the full chunk size
    decompressed.resize(byte_len, 0);

    let unpredicted = apply_predictor(
        &decompressed,
        layout.predictor,
        layout.width,
        layout.samples_per_pixel,
        layout.sample_type.bytes_per_sample(),
        layout.little_endian,
    )?;

    Ok(convert_to_f32(&unpredicted, layout.sample_type, layout.little_endian))
}

fn decompress(compressed: &[u8], layout: &ChunkLayout, byte_len: usize) -> AnyResult<Vec<u8>> {
    match layout.compression {
        Compression::None => Ok(compressed.to_vec()),
        Compression::Deflate => {
            use std::io::Read;
            let mut decoder = flate2::read::ZlibDecoder::new(compressed);
            let mut decompressed = Vec::with_capacity(byte_len);
            decoder.read_to_end(&mut decompressed)?;
            Ok(decompressed)
        }
        Compression::Lzw => {
            let mut decoder = weezl::decode::Decoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8);
            Ok(decoder.decode(compressed)?)
        }
        Compression::Jpeg => decode_jpeg(compressed, layout.jpeg_tables.as_deref()),
        Compression::Zstd => Ok(zstd::stream::decode_all(compressed)?),
    }
}

fn decode_jpeg(compressed: &[u8], tables: Option<&[u8]>) -> AnyResult<Vec<u8>> {
    use image::ImageReader;
    use std::io::Cursor;

    // Abbreviated streams need the shared tables spliced in: tables without
    // their EOI marker, followed by the chunk without its SOI marker.
    let stream = match tables {
        Some(tables) if tables.len() > 4 && compressed.len() > 2 => {
            let mut stream = tables[..tables.len() - 2].to_vec();
            stream.extend_from_slice(&compressed[2..]);
            stream
        }
        _ => compressed.to_vec(),
    };

    let reader = ImageReader::with_format(Cursor::new(stream), image::ImageFormat::Jpeg);
    let img = reader.decode().map_err(|e| format!("JPEG decode error: {e}"))?;

    let raw = match img {
        image::DynamicImage::ImageRgb8(rgb) => rgb.into_raw(),
        image::DynamicImage::ImageRgba8(rgba) => rgba.into_raw(),
        image::DynamicImage::ImageLuma8(gray) => gray.into_raw(),
        image::DynamicImage::ImageLumaA8(gray_alpha) => gray_alpha.into_raw(),
        other => other.to_rgb8().into_raw(),
    };

    Ok(raw)
}

/// Reverses TIFF predictor encoding to recover original sample values.
///
/// - **Predictor 1**: no prediction, data returned unchanged.
/// - **Predictor 2**: horizontal differencing. Each component stores the
///   difference from the same component of the previous pixel, so
///   accumulation runs with a stride of `samples_per_pixel` and operates on
///   whole samples (carries between bytes must propagate).
/// - **Predictor 3**: floating-point predictor (Adobe Technote 3). Bytes are
///   differenced with a stride of `samples_per_pixel` across the whole row,
///   then the row is stored as byte planes, most significant byte first.
///
/// Rows are independent: the first pixel of a row never accumulates from the
/// previous row.
pub fn apply_predictor(
    data: &[u8],
    predictor: u16,
    width: usize,
    samples_per_pixel: usize,
    bytes_per_sample: usize,
    little_endian: bool,
) -> AnyResult<Vec<u8>> {
    let row_bytes = width * samples_per_pixel * bytes_per_sample;
    if row_bytes == 0 {
        return Ok(data.to_vec());
    }

    match predictor {
        1 => Ok(data.to_vec()),

        2 => {
            let mut result = data.to_vec();
            for row in result.chunks_mut(row_bytes) {
                let samples = row.len() / bytes_per_sample;
                for i in samples_per_pixel..samples {
                    let prev = read_sample_bits(row, i - samples_per_pixel, bytes_per_sample, little_endian);
                    let curr = read_sample_bits(row, i, bytes_per_sample, little_endian);
                    write_sample_bits(row, i, bytes_per_sample, little_endian, curr.wrapping_add(prev));
                }
            }
            Ok(result)
        }

        3 => {
            let mut result = vec![0u8; data.len()];
            for (row_index, row) in data.chunks(row_bytes).enumerate() {
                let mut row = row.to_vec();
                for i in samples_per_pixel..row.len() {
                    row[i] = row[i].wrapping_add(row[i - samples_per_pixel]);
                }

                let count = row.len() / bytes_per_sample;
                let out = &mut result[row_index * row_bytes..row_index * row_bytes + row.len()];
                for k in 0..count {
                    for b in 0..bytes_per_sample {
                        let pos = if little_endian { bytes_per_sample - 1 - b } else { b };
                        out[k * bytes_per_sample + pos] = row[b * count + k];
                    }
                }
            }
            Ok(result)
        }

        _ => Err(format!("Unsupported predictor: {predictor}").into()),
    }
}

#[inline]
fn read_sample_bits(row: &[u8], index: usize, size: usize, little_endian: bool) -> u64 {
    let bytes = &row[index * size..(index + 1) * size];
    let mut buf = [0u8; 8];
    if little_endian {
        buf[..size].copy_from_slice(bytes);
        u64::from_le_bytes(buf)
    } else {
        buf[8 - size..].copy_from_slice(bytes);
        u64::from_be_bytes(buf)
    }
}

#[inline]
fn write_sample_bits(row: &mut [u8], index: usize, size: usize, little_endian: bool, value: u64) {
    let target = &mut row[index * size..(index + 1) * size];
    if little_endian {
        target.copy_from_slice(&value.to_le_bytes()[..size]);
    } else {
        target.copy_from_slice(&value.to_be_bytes()[8 - size..]);
    }
}

/// Widen raw samples to `f32`
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn convert_to_f32(data: &[u8], sample_type: SampleType, little_endian: bool) -> Vec<f32> {
    let bytes_per_sample = sample_type.bytes_per_sample();
    let le = little_endian;

    data.chunks_exact(bytes_per_sample)
        .map(|bytes| match sample_type {
            SampleType::UInt8 => f32::from(bytes[0]),
            SampleType::Int8 => f32::from(bytes[0] as i8),
            SampleType::UInt16 => f32::from(read_u16(bytes, le)),
            SampleType::Int16 => f32::from(read_u16(bytes, le) as i16),
            SampleType::UInt32 => read_u32(bytes, le) as f32,
            SampleType::Int32 => read_u32(bytes, le) as i32 as f32,
            SampleType::Float32 => f32::from_bits(read_u32(bytes, le)),
            SampleType::UInt64 => read_u64(bytes, le) as f32,
            SampleType::Int64 => read_u64(bytes, le) as i64 as f32,
            SampleType::Float64 => read_f64(bytes, le) as f32,
        })
        .collect()
}
