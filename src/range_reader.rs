//! Range-based reader interface for GeoTIFF files
//!
//! A raster is read with a handful of small byte-range requests (header, IFD,
//! tag arrays, one chunk per band), which keeps remote reads cheap. Every
//! source implements [`RangeReader`]: local files, HTTP(S) servers, object
//! stores, and in-memory buffers.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use object_store::path::Path as ObjectPath;
use object_store::{GetOptions, GetRange, ObjectStore};
use tokio::runtime::Handle;

use crate::tiff::AnyResult;

/// Trait for reading byte ranges from any source
///
/// Reads past the end of the source are truncated rather than failing, so
/// callers that over-fetch (e.g. an IFD size estimate) get what exists.
pub trait RangeReader: Send + Sync {
    /// Read a range of bytes from the source
    fn read_range(&self, offset: u64, length: usize) -> AnyResult<Vec<u8>>;

    /// Total size of the source in bytes (0 if unknown)
    fn size(&self) -> u64;

    /// Human-readable identifier for this source (for logging/errors)
    fn identifier(&self) -> &str;
}

/// Clamp a requested range to a known source size.
fn clamp_range(offset: u64, length: usize, size: u64) -> Range<u64> {
    let end = offset.saturating_add(length as u64);
    if size == 0 {
        return offset..end;
    }
    offset.min(size)..end.min(size)
}

/// Local file range reader
///
/// The file is opened once and closed when the reader is dropped.
pub struct LocalRangeReader {
    path: PathBuf,
    display: String,
    size: u64,
    file: Mutex<File>,
}

impl LocalRangeReader {
    pub fn new(path: impl AsRef<Path>) -> AnyResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            display: path.display().to_string(),
            path,
            size,
            file: Mutex::new(file),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RangeReader for LocalRangeReader {
    fn read_range(&self, offset: u64, length: usize) -> AnyResult<Vec<u8>> {
        let range = clamp_range(offset, length, self.size);
        let mut buffer = vec![0u8; (range.end - range.start) as usize];

        let mut file = self.file.lock().map_err(|_| "file handle lock poisoned")?;
        file.seek(SeekFrom::Start(range.start))?;
        file.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn identifier(&self) -> &str {
        &self.display
    }
}

/// HTTP range reader for remote GeoTIFF files
/// Uses reqwest's blocking client; readers are only driven from worker threads
pub struct HttpRangeReader {
    url: String,
    size: u64,
    client: reqwest::blocking::Client,
}

impl HttpRangeReader {
    pub fn new(url: &str, timeout: Duration) -> AnyResult<Self> {
        let client = reqwest::blocking::Client::builder().timeout(timeout).build()?;

        // Get file size via HEAD request; a missing object fails here
        let response = client.head(url).send()?.error_for_status()?;
        let size = response
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        Ok(Self {
            url: url.to_string(),
            size,
            client,
        })
    }
}

impl RangeReader for HttpRangeReader {
    fn read_range(&self, offset: u64, length: usize) -> AnyResult<Vec<u8>> {
        let range = clamp_range(offset, length, self.size);
        if range.is_empty() {
            return Ok(Vec::new());
        }

        let header = format!("bytes={}-{}", range.start, range.end - 1);
        let response = self
            .client
            .get(&self.url)
            .header(reqwest::header::RANGE, header)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP request failed: {status}").into());
        }

        let bytes = response.bytes()?;

        // Servers without range support answer 200 with the whole body
        if status == reqwest::StatusCode::PARTIAL_CONTENT {
            Ok(bytes.to_vec())
        } else {
            let start = (range.start as usize).min(bytes.len());
            let end = (range.end as usize).min(bytes.len());
            Ok(bytes[start..end].to_vec())
        }
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn identifier(&self) -> &str {
        &self.url
    }
}

/// Object-store range reader (S3, Azure Blob, in-memory)
///
/// Bridges the async `object_store` API onto the runtime handle captured at
/// construction. Must be driven from a thread outside the async executor
/// (e.g. `spawn_blocking`), where `Handle::block_on` is allowed.
pub struct ObjectRangeReader {
    store: Arc<dyn ObjectStore>,
    path: ObjectPath,
    size: u64,
    url: String,
    runtime: Handle,
}

impl ObjectRangeReader {
    /// Open an object, fetching its size with a HEAD request.
    pub fn new(
        store: Arc<dyn ObjectStore>,
        path: ObjectPath,
        url: String,
        runtime: Handle,
    ) -> AnyResult<Self> {
        let meta = runtime.block_on(store.head(&path))?;

        Ok(Self {
            store,
            path,
            size: meta.size as u64,
            url,
            runtime,
        })
    }

    async fn read_range_async(&self, range: Range<u64>) -> AnyResult<Vec<u8>> {
        let options = GetOptions {
            range: Some(GetRange::Bounded(range)),
            ..Default::default()
        };

        let result = self.store.get_opts(&self.path, options).await?;
        let bytes = result.bytes().await?;
        Ok(bytes.to_vec())
    }
}

impl RangeReader for ObjectRangeReader {
    fn read_range(&self, offset: u64, length: usize) -> AnyResult<Vec<u8>> {
        let range = clamp_range(offset, length, self.size);
        if range.is_empty() {
            return Ok(Vec::new());
        }
        self.runtime.block_on(self.read_range_async(range))
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn identifier(&self) -> &str {
        &self.url
    }
}

/// In-memory range reader
pub struct MemoryRangeReader {
    data: Vec<u8>,
    name: String,
}

impl MemoryRangeReader {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            data,
            name: name.into(),
        }
    }
}

impl RangeReader for MemoryRangeReader {
    fn read_range(&self, offset: u64, length: usize) -> AnyResult<Vec<u8>> {
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(self.data.len());
        let end = start.saturating_add(length).min(self.data.len());
        Ok(self.data[start..end].to_vec())
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn identifier(&self) -> &str {
        &self.name
    }
}
