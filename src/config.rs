//! Job configuration
//!
//! The job reads a single YAML file with three sections: storage
//! credentials, the two input locations and the output root.
//!
//! ```yaml
//! storage:
//!   access_key_id: AKIA...
//!   secret_access_key: ...
//!   region: us-west-2
//! input:
//!   song_data: s3://udacity-dend/song_data/*/*/*/*.json
//!   log_data: s3://udacity-dend/log_data/*/*/*.json
//! output:
//!   root: s3://my-bucket/sparkify/
//! ```

use crate::error::{Error, Result, ResultExt};
use crate::output::{Location, ParquetOptions};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Default config file, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "dl.yaml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Complete job configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtlConfig {
    /// Object storage credentials (only needed for remote locations)
    #[serde(default)]
    pub storage: Option<StorageConfig>,

    /// Input dataset locations
    pub input: InputConfig,

    /// Output location
    pub output: OutputConfig,
}

impl EtlConfig {
    /// Load and validate a config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml_str(&content)
    }

    /// Parse and validate config from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every location is present and parseable, and that
    /// credentials exist whenever a location is remote
    pub fn validate(&self) -> Result<()> {
        let locations = [
            ("input.song_data", self.input.song_data.as_str()),
            ("input.log_data", self.input.log_data.as_str()),
            ("output.root", self.output.root.as_str()),
        ];

        let mut any_remote = false;
        for (field, value) in locations {
            if value.trim().is_empty() {
                return Err(Error::missing_field(field));
            }
            let location = Location::parse(value)
                .map_err(|e| Error::invalid_value(field, e.to_string()))?;
            any_remote |= location.is_remote();
        }

        if any_remote {
            let storage = self
                .storage
                .as_ref()
                .ok_or_else(|| Error::missing_field("storage"))?;
            storage.validate()?;
        }

        Ok(())
    }

    /// Parsed song dataset location
    pub fn song_data(&self) -> Result<Location> {
        Location::parse(&self.input.song_data)
    }

    /// Parsed log dataset location
    pub fn log_data(&self) -> Result<Location> {
        Location::parse(&self.input.log_data)
    }

    /// Parsed output root
    pub fn output_root(&self) -> Result<Location> {
        Location::parse(&self.output.root)
    }
}

// ============================================================================
// Storage
// ============================================================================

/// Static S3 credentials, handed to the engine and storage clients directly
#[derive(Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Access key id
    #[serde(default)]
    pub access_key_id: String,

    /// Secret access key
    #[serde(default)]
    pub secret_access_key: String,

    /// Bucket region
    #[serde(default = "default_region")]
    pub region: String,

    /// Custom endpoint for S3-compatible stores (MinIO, R2, ...)
    #[serde(default)]
    pub endpoint: Option<String>,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl StorageConfig {
    /// Build credentials with the default region
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            region: default_region(),
            endpoint: None,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.access_key_id.trim().is_empty() {
            return Err(Error::missing_field("storage.access_key_id"));
        }
        if self.secret_access_key.trim().is_empty() {
            return Err(Error::missing_field("storage.secret_access_key"));
        }
        if let Some(endpoint) = &self.endpoint {
            url::Url::parse(endpoint)
                .map_err(|e| Error::invalid_value("storage.endpoint", e.to_string()))?;
        }
        Ok(())
    }
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"****")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

// ============================================================================
// Input / Output
// ============================================================================

/// Input dataset locations (globs allowed)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Song metadata, newline-delimited JSON
    #[serde(default)]
    pub song_data: String,

    /// User activity logs, newline-delimited JSON
    #[serde(default)]
    pub log_data: String,
}

/// Output root; table directories are appended to it verbatim
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root location, normally ending with `/`
    #[serde(default)]
    pub root: String,

    /// Parquet writer settings
    #[serde(default)]
    pub parquet: ParquetOptions,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::Compression;

    const REMOTE: &str = r"
storage:
  access_key_id: AKIATEST
  secret_access_key: shh
  region: us-west-2
input:
  song_data: s3a://udacity-dend/song_data/*/*/*/*.json
  log_data: s3a://udacity-dend/log_data/*/*/*.json
output:
  root: s3://my-bucket/lake/
";

    #[test]
    fn test_parse_remote_config() {
        let config = EtlConfig::from_yaml_str(REMOTE).unwrap();
        let storage = config.storage.as_ref().unwrap();
        assert_eq!(storage.access_key_id, "AKIATEST");
        assert_eq!(storage.region, "us-west-2");
        assert!(storage.endpoint.is_none());
        assert!(config.song_data().unwrap().is_remote());
        assert!(config.output_root().unwrap().is_remote());
    }

    #[test]
    fn test_local_config_needs_no_storage() {
        let yaml = r"
input:
  song_data: /data/song_data/*.json
  log_data: /data/log_data/*.json
output:
  root: /tmp/lake/
";
        let config = EtlConfig::from_yaml_str(yaml).unwrap();
        assert!(config.storage.is_none());
    }

    #[test]
    fn test_remote_config_requires_storage() {
        let yaml = r"
input:
  song_data: s3://bucket/song_data/*.json
  log_data: /data/log_data/*.json
output:
  root: /tmp/lake/
";
        let err = EtlConfig::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, Error::MissingConfigField { ref field } if field == "storage"));
    }

    #[test]
    fn test_missing_secret() {
        let yaml = REMOTE.replace("secret_access_key: shh", "secret_access_key: ''");
        let err = EtlConfig::from_yaml_str(&yaml).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing required config field: storage.secret_access_key"
        );
    }

    #[test]
    fn test_missing_location() {
        let yaml = r"
input:
  song_data: /data/song_data/*.json
output:
  root: /tmp/lake/
";
        let err = EtlConfig::from_yaml_str(yaml).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("input.log_data"));
    }

    #[test]
    fn test_parquet_options() {
        let yaml = format!("{REMOTE}  parquet:\n    compression: zstd\n    row_group_size: 5000\n");
        let config = EtlConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(config.output.parquet.compression, Compression::Zstd);
        assert_eq!(config.output.parquet.row_group_size, Some(5000));

        let config = EtlConfig::from_yaml_str(REMOTE).unwrap();
        assert_eq!(config.output.parquet, ParquetOptions::default());
    }

    #[test]
    fn test_default_region() {
        let yaml = REMOTE.replace("  region: us-west-2\n", "");
        let config = EtlConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(config.storage.unwrap().region, "us-east-1");
    }

    #[test]
    fn test_debug_masks_secret() {
        let storage = StorageConfig::new("AKIATEST", "super-secret");
        let debug = format!("{storage:?}");
        assert!(debug.contains("AKIATEST"));
        assert!(!debug.contains("super-secret"));
    }

    #[test]
    fn test_invalid_yaml() {
        let err = EtlConfig::from_yaml_str("input: [").unwrap_err();
        assert!(matches!(err, Error::YamlParse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = EtlConfig::from_file("/definitely/not/here/dl.yaml").unwrap_err();
        assert!(matches!(err, Error::FileNotFound { .. }));
    }
}
