//! Configuration for hazpoint.
//!
//! Loaded from a TOML file. Every section has defaults, so an empty file (or
//! no file at all) yields a service listening on `127.0.0.1:8000` that reads
//! rasters from the working directory. Secrets may be written inline or
//! resolved from environment variables named in the config.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Listener settings for the web-app host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Maximum level logged: trace, debug, info, warn or error
    /// (`--verbose` forces debug)
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".to_string()
}

impl LoggingConfig {
    /// Level the subscriber is capped at.
    pub fn max_level(&self, verbose: bool) -> Result<tracing::Level, ConfigError> {
        if verbose {
            return Ok(tracing::Level::DEBUG);
        }
        self.level
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("logging.level is not a level: {}", self.level)))
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

/// Where raster files are resolved from.
///
/// A request's `file` field is a logical identifier, interpreted relative to
/// the configured root, container, bucket or base URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Files on the local filesystem
    Local {
        #[serde(default = "default_root")]
        root: PathBuf,
    },

    /// Azure Blob Storage
    Azure {
        /// Storage account name (taken from the connection string if absent)
        #[serde(default)]
        account: Option<String>,

        #[serde(default = "default_container")]
        container: String,

        #[serde(default)]
        access_key: Option<String>,

        #[serde(default)]
        access_key_env: Option<String>,

        /// Full connection string (`AccountName=...;AccountKey=...`)
        #[serde(default)]
        connection_string: Option<String>,

        #[serde(default = "default_connection_string_env")]
        connection_string_env: Option<String>,

        /// Blob name prefix prepended to every identifier
        #[serde(default)]
        prefix: Option<String>,

        /// Custom endpoint (e.g. Azurite)
        #[serde(default)]
        endpoint: Option<String>,

        #[serde(default)]
        allow_http: bool,
    },

    /// S3 or an S3-compatible store
    S3 {
        bucket: String,

        #[serde(default)]
        region: Option<String>,

        #[serde(default)]
        endpoint: Option<String>,

        #[serde(default)]
        access_key_id: Option<String>,

        #[serde(default)]
        access_key_id_env: Option<String>,

        #[serde(default)]
        secret_access_key: Option<String>,

        #[serde(default)]
        secret_access_key_env: Option<String>,

        #[serde(default)]
        allow_http: bool,

        /// Anonymous access to public buckets
        #[serde(default)]
        skip_signature: bool,

        #[serde(default)]
        prefix: Option<String>,
    },

    /// Plain HTTP(S) server supporting range requests
    Http {
        base_url: String,

        #[serde(default = "default_timeout")]
        timeout_secs: u64,
    },
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_container() -> String {
    "data".to_string()
}

fn default_connection_string_env() -> Option<String> {
    Some("AZURE_STORAGE_CONNECTION_STRING".to_string())
}

fn default_timeout() -> u64 {
    30
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Local {
            root: default_root(),
        }
    }
}

impl StorageConfig {
    /// Short backend name for logging.
    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::Local { .. } => "local",
            Self::Azure { .. } => "azure",
            Self::S3 { .. } => "s3",
            Self::Http { .. } => "http",
        }
    }
}

/// Azure credentials after inline values and environment lookups are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AzureCredentials {
    pub account: String,
    pub access_key: Option<String>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_owned(),
            source: e,
        })?;

        Self::from_toml(&content).map_err(|e| ConfigError::Parse {
            path: path.to_owned(),
            source: e,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load from `path` if given, else fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Check settings that serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::Invalid("server.host must not be empty".into()));
        }
        self.logging.max_level(false)?;

        match &self.storage {
            StorageConfig::Azure { container, .. } if container.trim().is_empty() => {
                Err(ConfigError::Invalid("storage.container must not be empty".into()))
            }
            StorageConfig::S3 { bucket, .. } if bucket.trim().is_empty() => {
                Err(ConfigError::Invalid("storage.bucket must not be empty".into()))
            }
            StorageConfig::Http { base_url, .. } => url::Url::parse(base_url)
                .map(|_| ())
                .map_err(|e| ConfigError::Invalid(format!("storage.base_url is not a URL: {e}"))),
            _ => Ok(()),
        }
    }
}

/// Resolve a secret from an inline value or the named environment variable.
///
/// An inline value wins. A named variable that is unset is an error; no name
/// at all means the secret is simply not configured.
pub fn resolve_secret(
    inline: Option<&str>,
    env_var: Option<&str>,
    field: &str,
) -> Result<Option<String>, ConfigError> {
    if let Some(value) = inline {
        return Ok(Some(value.to_string()));
    }

    match env_var {
        Some(var) => std::env::var(var).map(Some).map_err(|_| ConfigError::MissingSecret {
            field: field.to_string(),
            env_var: var.to_string(),
        }),
        None => Ok(None),
    }
}

/// Pull a key out of an Azure connection string
/// (`DefaultEndpointsProtocol=https;AccountName=acct;AccountKey=...`).
pub fn connection_string_value<'a>(connection_string: &'a str, key: &str) -> Option<&'a str> {
    connection_string
        .split(';')
        .filter_map(|part| part.split_once('='))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case(key))
        .map(|(_, v)| v.trim())
        .filter(|v| !v.is_empty())
}

/// Resolve Azure account name and key.
///
/// Explicit `account`/`access_key` settings take precedence over values from
/// the connection string. A connection string environment variable that is
/// unset is not an error, since the default variable name is always present.
pub fn resolve_azure_credentials(storage: &StorageConfig) -> Result<AzureCredentials, ConfigError> {
    let StorageConfig::Azure {
        account,
        access_key,
        access_key_env,
        connection_string,
        connection_string_env,
        ..
    } = storage
    else {
        return Err(ConfigError::Invalid("storage backend is not azure".into()));
    };

    let connection_string = connection_string
        .clone()
        .or_else(|| connection_string_env.as_deref().and_then(|var| std::env::var(var).ok()));

    let from_connection =
        |key: &str| connection_string.as_deref().and_then(|cs| connection_string_value(cs, key)).map(str::to_string);

    let account = account
        .clone()
        .or_else(|| from_connection("AccountName"))
        .ok_or_else(|| ConfigError::Invalid("storage.account is not set and no connection string provides AccountName".into()))?;

    let access_key = match resolve_secret(access_key.as_deref(), access_key_env.as_deref(), "storage.access_key")? {
        Some(key) => Some(key),
        None => from_connection("AccountKey"),
    };

    Ok(AzureCredentials { account, access_key })
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Missing secret '{field}': set {env_var} env var or {field} in config")]
    MissingSecret { field: String, env_var: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.logging.level, "info");
        assert!(matches!(config.storage, StorageConfig::Local { ref root } if root == Path::new(".")));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_logging_level() {
        let mut logging = LoggingConfig::default();
        assert_eq!(logging.max_level(false).unwrap(), tracing::Level::INFO);
        assert_eq!(logging.max_level(true).unwrap(), tracing::Level::DEBUG);

        logging.level = "WARN".into();
        assert_eq!(logging.max_level(false).unwrap(), tracing::Level::WARN);

        logging.level = "loud".into();
        assert!(logging.max_level(false).is_err());
        assert_eq!(logging.max_level(true).unwrap(), tracing::Level::DEBUG);

        let config = Config::from_toml("[logging]\nlevel = \"loud\"").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_azure_section_defaults_container() {
        let config = Config::from_toml(
            r#"
            [storage]
            backend = "azure"
            account = "hazards"
            "#,
        )
        .unwrap();

        match config.storage {
            StorageConfig::Azure {
                account,
                container,
                connection_string_env,
                ..
            } => {
                assert_eq!(account.as_deref(), Some("hazards"));
                assert_eq!(container, "data");
                assert_eq!(connection_string_env.as_deref(), Some("AZURE_STORAGE_CONNECTION_STRING"));
            }
            other => panic!("expected azure storage, got {other:?}"),
        }
    }

    #[test]
    fn test_s3_requires_bucket() {
        let err = Config::from_toml(
            r#"
            [storage]
            backend = "s3"
            region = "eu-west-1"
            "#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_validate_rejects_bad_http_base_url() {
        let config = Config::from_toml(
            r#"
            [storage]
            backend = "http"
            base_url = "not a url"
            "#,
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_from_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hazpoint.toml");
        std::fs::write(&path, "[server\nport = 1").unwrap();

        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("hazpoint.toml"));

        let missing = Config::from_file(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::FileRead { .. }));
    }

    #[test]
    fn test_resolve_secret_prefers_inline() {
        let value = resolve_secret(Some("inline"), Some("HAZPOINT_TEST_UNSET_VAR"), "key").unwrap();
        assert_eq!(value.as_deref(), Some("inline"));
    }

    #[test]
    fn test_resolve_secret_missing_env_var() {
        let err = resolve_secret(None, Some("HAZPOINT_TEST_DEFINITELY_UNSET"), "storage.access_key").unwrap_err();
        assert!(err.to_string().contains("HAZPOINT_TEST_DEFINITELY_UNSET"));
        assert_eq!(resolve_secret(None, None, "key").unwrap(), None);
    }

    #[test]
    fn test_connection_string_parsing() {
        let cs = "DefaultEndpointsProtocol=https;AccountName=hazards;AccountKey=abc==;EndpointSuffix=core.windows.net";
        assert_eq!(connection_string_value(cs, "AccountName"), Some("hazards"));
        assert_eq!(connection_string_value(cs, "accountkey"), Some("abc=="));
        assert_eq!(connection_string_value(cs, "Missing"), None);
    }

    #[test]
    fn test_azure_credentials_from_connection_string() {
        let storage = StorageConfig::Azure {
            account: None,
            container: default_container(),
            access_key: None,
            access_key_env: None,
            connection_string: Some("AccountName=hazards;AccountKey=secret".into()),
            connection_string_env: None,
            prefix: None,
            endpoint: None,
            allow_http: false,
        };

        let creds = resolve_azure_credentials(&storage).unwrap();
        assert_eq!(creds.account, "hazards");
        assert_eq!(creds.access_key.as_deref(), Some("secret"));
    }

    #[test]
    fn test_azure_credentials_need_account() {
        let storage = StorageConfig::Azure {
            account: None,
            container: default_container(),
            access_key: None,
            access_key_env: None,
            connection_string: None,
            connection_string_env: None,
            prefix: None,
            endpoint: None,
            allow_http: false,
        };
        assert!(matches!(resolve_azure_credentials(&storage), Err(ConfigError::Invalid(_))));
    }
}
