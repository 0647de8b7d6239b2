//! In-memory GeoTIFF fixtures for tests.
//!
//! Layout: header | pixel chunks | IFD | out-of-line tag values.

use std::io::Write;

type ValueFn = Box<dyn Fn(usize, usize, usize) -> f32>;

/// Georeferencing written as ModelTiepoint + ModelPixelScale
#[derive(Debug, Clone, Copy)]
pub struct Georef {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
    pub pixel_is_point: bool,
}

impl Georef {
    pub fn area(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            pixel_is_point: false,
        }
    }

    pub fn point(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            pixel_is_point: true,
            ..Self::area(origin_x, origin_y, pixel_width, pixel_height)
        }
    }
}

/// Builds Float32 GeoTIFFs with configurable layout.
pub struct TiffBuilder {
    width: usize,
    height: usize,
    bands: usize,
    tile: Option<(usize, usize)>,
    declared_tile: Option<(u32, u32)>,
    declared_width: Option<u32>,
    rows_per_strip: usize,
    planar: bool,
    big_endian: bool,
    deflate: bool,
    epsg: Option<u16>,
    georef: Georef,
    nodata: Option<String>,
    values: ValueFn,
}

struct Entry {
    tag: u16,
    field_type: u16,
    count: u32,
    payload: Vec<u8>,
}

impl TiffBuilder {
    /// A stripped (one row per strip) WGS84 raster whose value at
    /// (band, col, row) is `band * 100 + row * 10 + col`.
    pub fn new(width: usize, height: usize, bands: usize) -> Self {
        Self {
            width,
            height,
            bands,
            tile: None,
            declared_tile: None,
            declared_width: None,
            rows_per_strip: 1,
            planar: false,
            big_endian: false,
            deflate: false,
            epsg: Some(4326),
            georef: Georef::area(0.0, 0.0, 1.0, 1.0),
            nodata: None,
            values: Box::new(|band, col, row| (band * 100 + row * 10 + col) as f32),
        }
    }

    pub fn tiled(mut self, tile_width: usize, tile_height: usize) -> Self {
        self.tile = Some((tile_width, tile_height));
        self
    }

    /// TileWidth/TileLength written to the IFD instead of the encoded size
    pub fn declared_tile_size(mut self, width: u32, height: u32) -> Self {
        self.declared_tile = Some((width, height));
        self
    }

    /// ImageWidth written to the IFD instead of the encoded width
    pub fn declared_width(mut self, width: u32) -> Self {
        self.declared_width = Some(width);
        self
    }

    pub fn rows_per_strip(mut self, rows: usize) -> Self {
        self.rows_per_strip = rows;
        self
    }

    pub fn planar(mut self) -> Self {
        self.planar = true;
        self
    }

    pub fn big_endian(mut self) -> Self {
        self.big_endian = true;
        self
    }

    pub fn deflate(mut self) -> Self {
        self.deflate = true;
        self
    }

    pub fn epsg(mut self, code: u16) -> Self {
        self.epsg = Some(code);
        self
    }

    pub fn without_crs(mut self) -> Self {
        self.epsg = None;
        self
    }

    pub fn georef(mut self, georef: Georef) -> Self {
        self.georef = georef;
        self
    }

    pub fn nodata(mut self, nodata: &str) -> Self {
        self.nodata = Some(nodata.to_string());
        self
    }

    /// Pixel values by (zero-based band, column, row)
    pub fn values(mut self, f: impl Fn(usize, usize, usize) -> f32 + 'static) -> Self {
        self.values = Box::new(f);
        self
    }

    fn u16_bytes(&self, v: u16) -> [u8; 2] {
        if self.big_endian { v.to_be_bytes() } else { v.to_le_bytes() }
    }

    fn u32_bytes(&self, v: u32) -> [u8; 4] {
        if self.big_endian { v.to_be_bytes() } else { v.to_le_bytes() }
    }

    fn f32_bytes(&self, v: f32) -> [u8; 4] {
        if self.big_endian { v.to_be_bytes() } else { v.to_le_bytes() }
    }

    fn f64_bytes(&self, v: f64) -> [u8; 8] {
        if self.big_endian { v.to_be_bytes() } else { v.to_le_bytes() }
    }

    fn shorts(&self, tag: u16, values: &[u16]) -> Entry {
        Entry {
            tag,
            field_type: 3,
            count: values.len() as u32,
            payload: values.iter().flat_map(|&v| self.u16_bytes(v)).collect(),
        }
    }

    fn longs(&self, tag: u16, values: &[u32]) -> Entry {
        Entry {
            tag,
            field_type: 4,
            count: values.len() as u32,
            payload: values.iter().flat_map(|&v| self.u32_bytes(v)).collect(),
        }
    }

    fn doubles(&self, tag: u16, values: &[f64]) -> Entry {
        Entry {
            tag,
            field_type: 12,
            count: values.len() as u32,
            payload: values.iter().flat_map(|&v| self.f64_bytes(v)).collect(),
        }
    }

    /// Encode every chunk, returning their bytes in file order
    fn encode_chunks(&self) -> Vec<Vec<u8>> {
        let (chunk_w, chunk_h) = self.tile.unwrap_or((self.width, self.rows_per_strip));
        let across = self.width.div_ceil(chunk_w);
        let down = self.height.div_ceil(chunk_h);
        let planes: Vec<Vec<usize>> = if self.planar {
            (0..self.bands).map(|b| vec![b]).collect()
        } else {
            vec![(0..self.bands).collect()]
        };

        let mut chunks = Vec::new();
        for plane in &planes {
            for chunk_row in 0..down {
                for chunk_col in 0..across {
                    // Strips stop at the last image row; tiles are always full
                    let rows = if self.tile.is_some() {
                        chunk_h
                    } else {
                        chunk_h.min(self.height - chunk_row * chunk_h)
                    };

                    let mut raw = Vec::new();
                    for y in 0..rows {
                        for x in 0..chunk_w {
                            let (col, row) = (chunk_col * chunk_w + x, chunk_row * chunk_h + y);
                            for &band in plane {
                                let value = if col < self.width && row < self.height {
                                    (self.values)(band, col, row)
                                } else {
                                    0.0
                                };
                                raw.extend_from_slice(&self.f32_bytes(value));
                            }
                        }
                    }

                    if self.deflate {
                        let mut encoder =
                            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
                        encoder.write_all(&raw).unwrap();
                        raw = encoder.finish().unwrap();
                    }
                    chunks.push(raw);
                }
            }
        }
        chunks
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(if self.big_endian { b"MM" } else { b"II" });
        out.extend_from_slice(&self.u16_bytes(42));
        out.extend_from_slice(&[0; 4]); // IFD offset, patched below

        let mut offsets = Vec::new();
        let mut byte_counts = Vec::new();
        for chunk in self.encode_chunks() {
            offsets.push(out.len() as u32);
            byte_counts.push(chunk.len() as u32);
            out.extend_from_slice(&chunk);
            if out.len() % 2 == 1 {
                out.push(0);
            }
        }

        let bands = self.bands as u16;
        let mut entries = vec![
            self.longs(256, &[self.declared_width.unwrap_or(self.width as u32)]),
            self.longs(257, &[self.height as u32]),
            self.shorts(258, &vec![32; self.bands]),
            self.shorts(259, &[if self.deflate { 8 } else { 1 }]),
            self.shorts(262, &[1]),
        ];

        match self.tile {
            None => {
                entries.push(self.longs(273, &offsets));
                entries.push(self.shorts(277, &[bands]));
                entries.push(self.longs(278, &[self.rows_per_strip as u32]));
                entries.push(self.longs(279, &byte_counts));
                entries.push(self.shorts(284, &[if self.planar { 2 } else { 1 }]));
            }
            Some((tw, th)) => {
                let (tw, th) = self.declared_tile.unwrap_or((tw as u32, th as u32));
                entries.push(self.shorts(277, &[bands]));
                entries.push(self.shorts(284, &[if self.planar { 2 } else { 1 }]));
                entries.push(self.longs(322, &[tw]));
                entries.push(self.longs(323, &[th]));
                entries.push(self.longs(324, &offsets));
                entries.push(self.longs(325, &byte_counts));
            }
        }

        entries.push(self.shorts(339, &vec![3; self.bands]));

        let g = &self.georef;
        entries.push(self.doubles(33550, &[g.pixel_width, g.pixel_height, 0.0]));
        entries.push(self.doubles(33922, &[0.0, 0.0, 0.0, g.origin_x, g.origin_y, 0.0]));

        let raster_type = if g.pixel_is_point { 2 } else { 1 };
        let geo_keys: Vec<u16> = match self.epsg {
            Some(code) => {
                let geographic = (4000..5000).contains(&code);
                let (model_type, crs_key) = if geographic { (2, 2048) } else { (1, 3072) };
                vec![
                    1, 1, 0, 3,
                    1024, 0, 1, model_type,
                    1025, 0, 1, raster_type,
                    crs_key, 0, 1, code,
                ]
            }
            None => vec![1, 1, 0, 1, 1025, 0, 1, raster_type],
        };
        entries.push(self.shorts(34735, &geo_keys));

        if let Some(nodata) = &self.nodata {
            let mut payload = nodata.as_bytes().to_vec();
            payload.push(0);
            entries.push(Entry {
                tag: 42113,
                field_type: 2,
                count: payload.len() as u32,
                payload,
            });
        }

        let ifd_offset = out.len() as u32;
        let ifd_offset_bytes = self.u32_bytes(ifd_offset);
        out[4..8].copy_from_slice(&ifd_offset_bytes);

        let ifd_len = 2 + entries.len() * 12 + 4;
        let mut extra = Vec::new();
        let extra_base = ifd_offset as usize + ifd_len;

        out.extend_from_slice(&self.u16_bytes(entries.len() as u16));
        for entry in &entries {
            out.extend_from_slice(&self.u16_bytes(entry.tag));
            out.extend_from_slice(&self.u16_bytes(entry.field_type));
            out.extend_from_slice(&self.u32_bytes(entry.count));
            if entry.payload.len() <= 4 {
                let mut inline = entry.payload.clone();
                inline.resize(4, 0);
                out.extend_from_slice(&inline);
            } else {
                out.extend_from_slice(&self.u32_bytes((extra_base + extra.len()) as u32));
                extra.extend_from_slice(&entry.payload);
                if extra.len() % 2 == 1 {
                    extra.push(0);
                }
            }
        }
        out.extend_from_slice(&[0; 4]); // no next IFD
        out.extend_from_slice(&extra);
        out
    }
}
