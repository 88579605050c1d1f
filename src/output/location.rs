//! Input/output locations and object store access
//!
//! A location is either an S3 object key (possibly a glob) or a local path.
//! The engine reads and writes locations by their URL form. The
//! [`StorageClient`] lists them through `object_store` using credentials
//! passed in explicitly.

use crate::config::StorageConfig;
use crate::error::{Error, Result};
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Characters that start a glob pattern in a location
const GLOB_CHARS: [char; 4] = ['*', '?', '[', '{'];

/// A parsed storage location
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Local filesystem path, kept verbatim (including any trailing `/`)
    Local { path: PathBuf },
    /// S3 bucket and key; `s3a://` and `s3n://` collapse into this
    S3 { bucket: String, key: String },
}

impl Location {
    /// Parse a location
    ///
    /// Supported formats:
    /// - `s3://bucket/key`, `s3a://bucket/key`, `s3n://bucket/key`
    /// - `file:///abs/path`
    /// - `/local/path` or `relative/path`
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(Error::config("Empty location"));
        }

        for scheme in ["s3://", "s3a://", "s3n://"] {
            if let Some(rest) = raw.strip_prefix(scheme) {
                return Self::parse_s3(raw, rest);
            }
        }

        if raw.starts_with("file://") {
            let url = url::Url::parse(raw)?;
            let path = url
                .to_file_path()
                .map_err(|()| Error::config(format!("Invalid file URL: {raw}")))?;
            return Ok(Self::Local { path });
        }

        if let Some((scheme, _)) = raw.split_once("://") {
            return Err(Error::config(format!(
                "Unsupported location scheme '{scheme}' in {raw}"
            )));
        }

        Ok(Self::Local {
            path: PathBuf::from(raw),
        })
    }

    fn parse_s3(raw: &str, without_scheme: &str) -> Result<Self> {
        let (bucket, key) = match without_scheme.find('/') {
            Some(idx) => (&without_scheme[..idx], &without_scheme[idx + 1..]),
            None => (without_scheme, ""),
        };

        if bucket.is_empty() {
            return Err(Error::config(format!("Missing bucket in {raw}")));
        }

        Ok(Self::S3 {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }

    /// Whether this location lives in object storage
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::S3 { .. })
    }

    /// Whether the location contains a glob pattern
    pub fn is_glob(&self) -> bool {
        self.to_string().contains(GLOB_CHARS)
    }

    /// Append a raw suffix to the location text.
    ///
    /// No separator is inserted; `s3://b/out/` + `songs` is `s3://b/out/songs`.
    #[must_use]
    pub fn append(&self, suffix: &str) -> Self {
        match self {
            Self::Local { path } => Self::Local {
                path: PathBuf::from(format!("{}{suffix}", path.to_string_lossy())),
            },
            Self::S3 { bucket, key } => Self::S3 {
                bucket: bucket.clone(),
                key: format!("{key}{suffix}"),
            },
        }
    }

    /// Append a path segment, inserting `/` when needed
    #[must_use]
    pub fn child(&self, segment: &str) -> Self {
        let text = self.to_string();
        if text.ends_with('/') {
            self.append(segment)
        } else {
            self.append(&format!("/{segment}"))
        }
    }

    /// The non-glob leading part of the location, used for listing
    pub fn listing_prefix(&self) -> String {
        let text = match self {
            Self::Local { path } => path.to_string_lossy().to_string(),
            Self::S3 { key, .. } => key.clone(),
        };

        let mut kept = Vec::new();
        for segment in text.split('/') {
            if segment.contains(GLOB_CHARS) {
                break;
            }
            kept.push(segment);
        }
        kept.join("/")
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local { path } => write!(f, "{}", path.to_string_lossy()),
            Self::S3 { bucket, key } => write!(f, "s3://{bucket}/{key}"),
        }
    }
}

/// Object store client scoped to one location
#[derive(Debug, Clone)]
pub struct StorageClient {
    /// The object store implementation
    store: Arc<dyn ObjectStore>,
    /// Key prefix inside the store
    prefix: Option<ObjectPath>,
    /// Location this client was built for (for logging)
    location: Location,
}

impl StorageClient {
    /// Create a client for a location.
    ///
    /// S3 locations need credentials; they are never read from the environment.
    pub fn new(location: &Location, storage: Option<&StorageConfig>) -> Result<Self> {
        match location {
            Location::S3 { bucket, .. } => {
                let storage = storage.ok_or_else(|| Error::missing_field("storage"))?;
                Self::s3(location, bucket, storage)
            }
            Location::Local { .. } => Self::local(location),
        }
    }

    fn s3(location: &Location, bucket: &str, storage: &StorageConfig) -> Result<Self> {
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(bucket)
            .with_region(&storage.region)
            .with_access_key_id(&storage.access_key_id)
            .with_secret_access_key(&storage.secret_access_key);

        if let Some(endpoint) = &storage.endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"));
        }

        let store = builder
            .build()
            .map_err(|e| Error::storage(format!("Failed to create S3 client: {e}")))?;

        let prefix = location.listing_prefix();
        Ok(Self {
            store: Arc::new(store),
            prefix: (!prefix.is_empty()).then(|| ObjectPath::from(prefix)),
            location: location.clone(),
        })
    }

    fn local(location: &Location) -> Result<Self> {
        let prefix = location.listing_prefix();
        let dir = if prefix.is_empty() { "." } else { prefix.as_str() };

        // A single file is listed from its parent directory
        let path = Path::new(dir);
        let (root, key) = match (path.is_file(), path.file_name()) {
            (true, Some(name)) => (
                path.parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .unwrap_or_else(|| Path::new(".")),
                Some(ObjectPath::from(name.to_string_lossy().as_ref())),
            ),
            _ => (path, None),
        };

        let store = LocalFileSystem::new_with_prefix(root)
            .map_err(|e| Error::storage(format!("Cannot open {}: {e}", root.display())))?;

        Ok(Self {
            store: Arc::new(store),
            prefix: key,
            location: location.clone(),
        })
    }

    /// Location this client lists
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Confirm the location can be listed; returns the number of direct
    /// entries, or 1 when the location is a single object
    pub async fn probe(&self) -> Result<usize> {
        let listing = self
            .store
            .list_with_delimiter(self.prefix.as_ref())
            .await
            .map_err(|e| Error::storage(format!("Cannot list {}: {e}", self.location)))?;

        let entries = listing.common_prefixes.len() + listing.objects.len();
        if entries > 0 {
            return Ok(entries);
        }
        Ok(usize::from(self.single_object().await?.is_some()))
    }

    /// Recursively list object keys below the location
    pub async fn list_files(&self) -> Result<Vec<String>> {
        let objects: Vec<_> = self.store.list(self.prefix.as_ref()).try_collect().await?;

        let mut keys: Vec<String> = objects.into_iter().map(|m| m.location.to_string()).collect();
        if keys.is_empty() {
            keys.extend(self.single_object().await?);
        }
        keys.sort();
        Ok(keys)
    }

    /// Key of the object the prefix names exactly, if there is one
    async fn single_object(&self) -> Result<Option<String>> {
        let Some(prefix) = &self.prefix else {
            return Ok(None);
        };
        match self.store.head(prefix).await {
            Ok(meta) => Ok(Some(meta.location.to_string())),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(Error::storage(format!("Cannot read {}: {e}", self.location))),
        }
    }

    /// Count files below the location whose key ends with `suffix`
    pub async fn count_files(&self, suffix: &str) -> Result<usize> {
        let files = self.list_files().await?;
        Ok(files.iter().filter(|k| k.ends_with(suffix)).count())
    }
}
