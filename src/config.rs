//! Configuration loading.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.cachine/config.toml` (user)
//! 3. `/etc/cachine/config.toml` (system)
//!
//! ```toml
//! [origin]
//! kind = "fs"
//! root = "/srv/originals"
//!
//! [cache]
//! kind = "fs"
//! root = "/var/cache/cachine"
//!
//! [processor]
//! kind = "imagemagick"
//! program = "convert"
//!
//! [stream]
//! buffer = 64
//! ```

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::orchestrator::{Cachine, DEFAULT_STREAM_BUFFER, Orchestrator};
use crate::processor::{IdentityProcessor, ImageMagickProcessor};
use crate::resolver::VariantPathResolver;
use crate::store::{FsStore, MemoryStore, Store};
use crate::types::ImageProperties;
use crate::{CachineError, Result};

/// Orchestrator configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub origin: StoreConfig,
    pub cache: StoreConfig,
    #[serde(default)]
    pub processor: ProcessorConfig,
    #[serde(default)]
    pub stream: StreamConfig,
}

/// Store backend selection, keyed by `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoreConfig {
    /// Local directory tree.
    Fs { root: PathBuf },
    /// In-process memory (lost on exit).
    Memory {
        #[serde(default = "default_max_entries")]
        max_entries: u64,
    },
    /// Read-only static hosting (requires feature `http`).
    Http {
        base_url: String,
        /// Connect and per-read timeout in seconds (default: 30).
        #[serde(default = "default_http_timeout")]
        timeout_secs: u64,
    },
    /// S3 or a compatible service (requires feature `s3`).
    S3 {
        bucket: String,
        #[serde(default = "default_region")]
        region: String,
        #[serde(default)]
        endpoint: Option<String>,
        #[serde(default)]
        prefix: Option<String>,
    },
}

fn default_max_entries() -> u64 {
    10_000
}

fn default_http_timeout() -> u64 {
    30
}

fn default_region() -> String {
    "us-east-1".to_string()
}

/// Processor selection, keyed by `kind` (default: ImageMagick).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProcessorConfig {
    ImageMagick {
        /// Executable to run (default: `convert`).
        #[serde(default = "default_program")]
        program: String,
    },
    Identity,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        ProcessorConfig::ImageMagick {
            program: default_program(),
        }
    }
}

fn default_program() -> String {
    ImageMagickProcessor::new().program().to_string()
}

/// Event stream tuning.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StreamConfig {
    /// Events buffered ahead of a slow consumer (default: 64).
    #[serde(default = "default_buffer")]
    pub buffer: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            buffer: default_buffer(),
        }
    }
}

fn default_buffer() -> usize {
    DEFAULT_STREAM_BUFFER
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided)
    /// 2. `~/.cachine/config.toml`
    /// 3. `/etc/cachine/config.toml`
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?;
        let content = fs::read_to_string(&path).map_err(|e| {
            CachineError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        Self::parse(&content).map_err(|e| {
            CachineError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Resolve the config file path.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(CachineError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".cachine").join("config.toml");
            if user_config.exists() {
                return Ok(user_config);
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/cachine/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }

        Err(CachineError::Configuration(
            "No config file found. Create ~/.cachine/config.toml or /etc/cachine/config.toml"
                .to_string(),
        ))
    }

    /// Wire an image-variant orchestrator from this configuration.
    pub async fn build(&self) -> Result<Orchestrator<ImageProperties>> {
        let origin = self.origin.build().await?;
        let cache = self.cache.build().await?;
        let builder = Cachine::builder::<ImageProperties>()
            .origin_shared(origin)
            .cache_shared(cache)
            .resolver(VariantPathResolver)
            .stream_buffer(self.stream.buffer);

        match &self.processor {
            ProcessorConfig::ImageMagick { program } => builder
                .processor(ImageMagickProcessor::with_program(program))
                .build(),
            ProcessorConfig::Identity => builder.processor(IdentityProcessor).build(),
        }
    }
}

impl StoreConfig {
    /// Construct the configured backend.
    pub async fn build(&self) -> Result<Arc<dyn Store>> {
        match self {
            StoreConfig::Fs { root } => Ok(Arc::new(FsStore::new(root))),
            StoreConfig::Memory { max_entries } => {
                Ok(Arc::new(MemoryStore::with_max_entries(*max_entries)))
            }
            #[cfg(feature = "http")]
            StoreConfig::Http {
                base_url,
                timeout_secs,
            } => {
                let store = crate::store::HttpStore::with_timeout(
                    base_url.as_str(),
                    std::time::Duration::from_secs(*timeout_secs),
                )?;
                Ok(Arc::new(store))
            }
            #[cfg(not(feature = "http"))]
            StoreConfig::Http { .. } => Err(feature_disabled("http")),
            #[cfg(feature = "s3")]
            StoreConfig::S3 {
                bucket,
                region,
                endpoint,
                prefix,
            } => {
                let store = crate::store::S3Store::connect(crate::store::S3Config {
                    bucket: bucket.clone(),
                    region: region.clone(),
                    endpoint: endpoint.clone(),
                    prefix: prefix.clone(),
                })
                .await;
                Ok(Arc::new(store))
            }
            #[cfg(not(feature = "s3"))]
            StoreConfig::S3 { .. } => Err(feature_disabled("s3")),
        }
    }
}

#[cfg(any(not(feature = "http"), not(feature = "s3")))]
fn feature_disabled(kind: &str) -> CachineError {
    CachineError::Configuration(format!(
        "store kind {kind:?} requires cachine to be built with the {kind:?} feature"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let toml = r#"
            [origin]
            kind = "fs"
            root = "/srv/originals"

            [cache]
            kind = "memory"
        "#;
        let config = Config::parse(toml).unwrap();
        assert_eq!(
            config.origin,
            StoreConfig::Fs {
                root: PathBuf::from("/srv/originals")
            }
        );
        assert_eq!(
            config.cache,
            StoreConfig::Memory {
                max_entries: 10_000
            }
        );
        // Defaults preserved
        assert_eq!(config.processor, ProcessorConfig::default());
        assert_eq!(config.stream.buffer, 64);
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
            [origin]
            kind = "http"
            base_url = "https://static.example.com/originals"
            timeout_secs = 5

            [cache]
            kind = "s3"
            bucket = "variants"
            endpoint = "http://localhost:9000"
            prefix = "/derived/"

            [processor]
            kind = "imagemagick"
            program = "magick"

            [stream]
            buffer = 8
        "#;
        let config = Config::parse(toml).unwrap();
        assert_eq!(
            config.origin,
            StoreConfig::Http {
                base_url: "https://static.example.com/originals".to_string(),
                timeout_secs: 5,
            }
        );
        assert_eq!(
            config.cache,
            StoreConfig::S3 {
                bucket: "variants".to_string(),
                region: "us-east-1".to_string(),
                endpoint: Some("http://localhost:9000".to_string()),
                prefix: Some("/derived/".to_string()),
            }
        );
        assert_eq!(
            config.processor,
            ProcessorConfig::ImageMagick {
                program: "magick".to_string()
            }
        );
        assert_eq!(config.stream.buffer, 8);
    }

    #[test]
    fn identity_processor_needs_no_options() {
        let toml = r#"
            origin = { kind = "memory" }
            cache = { kind = "memory" }
            processor = { kind = "identity" }
        "#;
        let config = Config::parse(toml).unwrap();
        assert_eq!(config.processor, ProcessorConfig::Identity);
    }

    #[test]
    fn unknown_store_kind_is_rejected() {
        let toml = r#"
            origin = { kind = "ftp" }
            cache = { kind = "memory" }
        "#;
        assert!(Config::parse(toml).is_err());
    }

    #[test]
    fn missing_cache_is_rejected() {
        let toml = r#"origin = { kind = "memory" }"#;
        assert!(Config::parse(toml).is_err());
    }

    #[test]
    fn config_not_found_returns_error() {
        let result = Config::load(Some(Path::new("/nonexistent/config.toml")));
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Config file not found"));
    }

    #[tokio::test]
    async fn builds_orchestrator() {
        let toml = r#"
            origin = { kind = "memory" }
            cache = { kind = "fs", root = "/tmp/cachine-config-test" }
            processor = { kind = "identity" }
        "#;
        let orchestrator = Config::parse(toml).unwrap().build().await.unwrap();
        assert_eq!(orchestrator.processor_name(), "identity");
        assert_eq!(orchestrator.cache().name(), "fs:/tmp/cachine-config-test");
    }

    #[cfg(not(feature = "s3"))]
    #[tokio::test]
    async fn s3_without_feature_is_a_configuration_error() {
        let store = StoreConfig::S3 {
            bucket: "b".to_string(),
            region: default_region(),
            endpoint: None,
            prefix: None,
        };
        let err = store.build().await.err().unwrap();
        assert!(matches!(err, CachineError::Configuration(_)));
    }
}
