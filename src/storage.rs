//! Resolving logical file identifiers to opened rasters.
//!
//! The service only ever asks a [`RasterStore`] to open an identifier; where
//! that identifier lives (a directory, a blob container, a bucket, a web
//! server) and which credentials reach it is fixed when the store is built.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use object_store::ObjectStore;
use object_store::aws::AmazonS3Builder;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::path::Path as ObjectPath;
use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::config::{self, ConfigError, StorageConfig};
use crate::error::{Error, Result};
use crate::range_reader::{HttpRangeReader, LocalRangeReader, ObjectRangeReader};
use crate::raster::RasterHandle;

/// Capability to open a raster by logical identifier.
pub trait RasterStore: Send + Sync {
    /// Open a raster. Missing, unreadable or corrupt files are
    /// [`Error::RasterOpen`]; malformed identifiers are [`Error::InvalidInput`].
    fn open_raster(&self, file: &str) -> Result<RasterHandle>;

    /// Where identifiers are resolved, for logging
    fn location(&self) -> String;
}

/// Reject identifiers that could escape the store's root.
pub fn validate_identifier(file: &str) -> Result<&str> {
    if file.trim().is_empty() {
        return Err(Error::InvalidInput(
            "Please pass a file name in the request body".into(),
        ));
    }

    let path = Path::new(file);
    let escapes = file.contains('\0')
        || file.starts_with('/')
        || file.starts_with('\\')
        || path.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        })
        || file.split(['/', '\\']).any(|segment| segment == "..");

    if escapes {
        return Err(Error::InvalidInput(format!(
            "File {file} is not a valid relative file name"
        )));
    }
    Ok(file)
}

// ============================================================================
// Local filesystem
// ============================================================================

/// Rasters under a local directory.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl RasterStore for LocalStore {
    fn open_raster(&self, file: &str) -> Result<RasterHandle> {
        let file = validate_identifier(file)?;
        let path = self.root.join(file);
        debug!(path = %path.display(), "Opening local raster");

        let reader = LocalRangeReader::new(&path).map_err(|e| Error::raster_open(file, e))?;
        RasterHandle::open(Box::new(reader)).map_err(|e| Error::raster_open(file, e))
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }
}

// ============================================================================
// Object stores (S3, Azure Blob, in-memory)
// ============================================================================

/// Rasters in an object store container or bucket.
pub struct ObjectStoreBackend {
    store: Arc<dyn ObjectStore>,
    base_url: String,
    prefix: Option<String>,
    runtime: Handle,
}

impl ObjectStoreBackend {
    /// Wrap an object store. `base_url` (e.g. `s3://bucket`) is used in
    /// logs and error sources only.
    pub fn new(
        store: Arc<dyn ObjectStore>,
        base_url: impl Into<String>,
        prefix: Option<String>,
        runtime: Handle,
    ) -> Self {
        let prefix = prefix
            .map(|p| p.trim_matches('/').to_string())
            .filter(|p| !p.is_empty());

        Self {
            store,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            prefix,
            runtime,
        }
    }

    /// S3 or an S3-compatible store with explicit credentials
    #[allow(clippy::too_many_arguments)]
    pub fn s3(
        bucket: &str,
        region: Option<&str>,
        endpoint: Option<&str>,
        access_key_id: Option<&str>,
        secret_access_key: Option<&str>,
        allow_http: bool,
        skip_signature: bool,
        prefix: Option<String>,
        runtime: Handle,
    ) -> Result<Self> {
        let mut builder = AmazonS3Builder::new().with_bucket_name(bucket);

        if let Some(region) = region {
            builder = builder.with_region(region);
        }
        if let Some(endpoint) = endpoint {
            builder = builder.with_endpoint(endpoint);
        }
        if let Some(access_key) = access_key_id {
            builder = builder.with_access_key_id(access_key);
        }
        if let Some(secret_key) = secret_access_key {
            builder = builder.with_secret_access_key(secret_key);
        }
        if allow_http {
            builder = builder.with_allow_http(true);
        }
        if skip_signature {
            builder = builder.with_skip_signature(true);
        }

        let store = builder
            .build()
            .map_err(|e| ConfigError::Invalid(format!("S3 store: {e}")))?;

        Ok(Self::new(Arc::new(store), format!("s3://{bucket}"), prefix, runtime))
    }

    /// Azure Blob Storage container
    pub fn azure(
        account: &str,
        container: &str,
        access_key: Option<&str>,
        endpoint: Option<&str>,
        allow_http: bool,
        prefix: Option<String>,
        runtime: Handle,
    ) -> Result<Self> {
        let mut builder = MicrosoftAzureBuilder::new()
            .with_account(account)
            .with_container_name(container);

        if let Some(key) = access_key {
            builder = builder.with_access_key(key);
        }
        if let Some(endpoint) = endpoint {
            builder = builder.with_endpoint(endpoint.to_string());
        }
        if allow_http {
            builder = builder.with_allow_http(true);
        }

        let store = builder
            .build()
            .map_err(|e| ConfigError::Invalid(format!("Azure store: {e}")))?;

        Ok(Self::new(
            Arc::new(store),
            format!("az://{account}/{container}"),
            prefix,
            runtime,
        ))
    }

    fn object_path(&self, file: &str) -> Result<ObjectPath> {
        let key = match &self.prefix {
            Some(prefix) => format!("{prefix}/{file}"),
            None => file.to_string(),
        };
        ObjectPath::parse(&key).map_err(|e| Error::InvalidInput(format!("File {file} is not a valid object name: {e}")))
    }
}

impl RasterStore for ObjectStoreBackend {
    fn open_raster(&self, file: &str) -> Result<RasterHandle> {
        let file = validate_identifier(file)?;
        let path = self.object_path(file)?;
        let url = format!("{}/{}", self.base_url, path);
        debug!(url = %url, "Opening object-store raster");

        let reader = ObjectRangeReader::new(self.store.clone(), path, url, self.runtime.clone())
            .map_err(|e| Error::raster_open(file, e))?;
        RasterHandle::open(Box::new(reader)).map_err(|e| Error::raster_open(file, e))
    }

    fn location(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}/{prefix}", self.base_url),
            None => self.base_url.clone(),
        }
    }
}

// ============================================================================
// HTTP
// ============================================================================

/// Rasters served over HTTP(S) with range request support.
#[derive(Debug, Clone)]
pub struct HttpStore {
    base_url: url::Url,
    timeout: Duration,
}

impl HttpStore {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        // A trailing slash makes `join` append rather than replace
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let base_url = url::Url::parse(&normalized)
            .map_err(|e| ConfigError::Invalid(format!("storage.base_url is not a URL: {e}")))?;

        Ok(Self { base_url, timeout })
    }

    fn resolve(&self, file: &str) -> Result<url::Url> {
        self.base_url
            .join(file)
            .map_err(|e| Error::InvalidInput(format!("File {file} is not a valid URL path: {e}")))
    }
}

impl RasterStore for HttpStore {
    fn open_raster(&self, file: &str) -> Result<RasterHandle> {
        let file = validate_identifier(file)?;
        let url = self.resolve(file)?;
        debug!(url = %url, "Opening remote raster");

        let reader = HttpRangeReader::new(url.as_str(), self.timeout)
            .map_err(|e| Error::raster_open(file, e))?;
        RasterHandle::open(Box::new(reader)).map_err(|e| Error::raster_open(file, e))
    }

    fn location(&self) -> String {
        self.base_url.to_string()
    }
}

/// Build the configured store. Secrets are resolved here, once.
pub fn build_store(storage: &StorageConfig, runtime: Handle) -> Result<Arc<dyn RasterStore>> {
    let store: Arc<dyn RasterStore> = match storage {
        StorageConfig::Local { root } => Arc::new(LocalStore::new(root.clone())),

        StorageConfig::Azure {
            container,
            prefix,
            endpoint,
            allow_http,
            ..
        } => {
            let creds = config::resolve_azure_credentials(storage)?;
            Arc::new(ObjectStoreBackend::azure(
                &creds.account,
                container,
                creds.access_key.as_deref(),
                endpoint.as_deref(),
                *allow_http,
                prefix.clone(),
                runtime,
            )?)
        }

        StorageConfig::S3 {
            bucket,
            region,
            endpoint,
            access_key_id,
            access_key_id_env,
            secret_access_key,
            secret_access_key_env,
            allow_http,
            skip_signature,
            prefix,
        } => {
            let access_key_id = config::resolve_secret(
                access_key_id.as_deref(),
                access_key_id_env.as_deref(),
                "storage.access_key_id",
            )?;
            let secret_access_key = config::resolve_secret(
                secret_access_key.as_deref(),
                secret_access_key_env.as_deref(),
                "storage.secret_access_key",
            )?;
            Arc::new(ObjectStoreBackend::s3(
                bucket,
                region.as_deref(),
                endpoint.as_deref(),
                access_key_id.as_deref(),
                secret_access_key.as_deref(),
                *allow_http,
                *skip_signature,
                prefix.clone(),
                runtime,
            )?)
        }

        StorageConfig::Http {
            base_url,
            timeout_secs,
        } => Arc::new(HttpStore::new(base_url, Duration::from_secs(*timeout_secs))?),
    };

    info!(
        backend = storage.backend_name(),
        location = %store.location(),
        "Raster store ready"
    );
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TiffBuilder;
    use object_store::PutPayload;
    use object_store::memory::InMemory;

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("flood/rp100.tif").is_ok());
        assert!(validate_identifier("a.tif").is_ok());

        let err = validate_identifier("").unwrap_err();
        assert_eq!(err.to_string(), "Please pass a file name in the request body");

        for bad in ["/etc/passwd", "../secret.tif", "a/../../b.tif", "\\\\server\\share", "a\0b"] {
            assert!(
                matches!(validate_identifier(bad), Err(Error::InvalidInput(_))),
                "{bad:?} accepted"
            );
        }
    }

    #[test]
    fn test_local_store_opens_raster() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("flood")).unwrap();
        std::fs::write(dir.path().join("flood/rp100.tif"), TiffBuilder::new(4, 3, 2).build()).unwrap();

        let store = LocalStore::new(dir.path());
        let raster = store.open_raster("flood/rp100.tif").unwrap();
        assert_eq!((raster.width(), raster.height(), raster.band_count()), (4, 3, 2));
    }

    #[test]
    fn test_local_store_missing_and_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.tif"), b"definitely not a tiff").unwrap();
        let store = LocalStore::new(dir.path());

        let err = store.open_raster("missing.tif").unwrap_err();
        assert!(matches!(err, Error::RasterOpen { .. }));
        assert_eq!(err.to_string(), "File missing.tif cannot be opened or does not exist");

        let err = store.open_raster("broken.tif").unwrap_err();
        assert_eq!(err.to_string(), "File broken.tif cannot be opened or does not exist");
    }

    #[test]
    fn test_object_store_backend_with_prefix() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let memory: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
        runtime
            .block_on(memory.put(
                &ObjectPath::from("hazards/wind.tif"),
                PutPayload::from(TiffBuilder::new(6, 5, 1).build()),
            ))
            .unwrap();

        let store = ObjectStoreBackend::new(
            memory,
            "mem://test",
            Some("/hazards/".into()),
            runtime.handle().clone(),
        );
        assert_eq!(store.location(), "mem://test/hazards");

        let raster = store.open_raster("wind.tif").unwrap();
        assert_eq!((raster.width(), raster.height()), (6, 5));

        let err = store.open_raster("other.tif").unwrap_err();
        assert!(matches!(err, Error::RasterOpen { ref file, .. } if file == "other.tif"));
    }

    #[test]
    fn test_http_store_joins_identifiers() {
        let store = HttpStore::new("https://data.example.com/rasters", Duration::from_secs(5)).unwrap();
        assert_eq!(
            store.resolve("flood/rp100.tif").unwrap().as_str(),
            "https://data.example.com/rasters/flood/rp100.tif"
        );
        assert!(HttpStore::new("not a url", Duration::from_secs(5)).is_err());
    }

    #[test]
    fn test_build_local_store() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageConfig::Local {
            root: dir.path().to_path_buf(),
        };
        let store = build_store(&storage, runtime.handle().clone()).unwrap();
        assert_eq!(store.location(), dir.path().display().to_string());
    }

    #[test]
    fn test_build_s3_store_missing_secret_env() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let storage = StorageConfig::S3 {
            bucket: "hazards".into(),
            region: Some("us-east-1".into()),
            endpoint: None,
            access_key_id: None,
            access_key_id_env: Some("HAZPOINT_TEST_UNSET_ACCESS_KEY".into()),
            secret_access_key: None,
            secret_access_key_env: None,
            allow_http: false,
            skip_signature: false,
            prefix: None,
        };
        let err = build_store(&storage, runtime.handle().clone()).err().unwrap();
        assert!(matches!(err, Error::Config(ConfigError::MissingSecret { .. })));
    }
}
