use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::array::dimension::{Dimension, DimensionKind};
use crate::codec::CompressionSettings;
use crate::foundation::dtype::DataType;
use crate::foundation::error::{ZarrError, ZarrResult};

/// On-disk dialect of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZarrVersion {
    V2,
    V3,
}

impl Serialize for ZarrVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u8(match self {
            Self::V2 => 2,
            Self::V3 => 3,
        })
    }
}

impl<'de> Deserialize<'de> for ZarrVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        match u8::deserialize(deserializer)? {
            2 => Ok(Self::V2),
            3 => Ok(Self::V3),
            n => Err(serde::de::Error::custom(format!(
                "invalid Zarr version: {n}"
            ))),
        }
    }
}

/// Connection settings for an S3-compatible object store. Credentials come
/// from the environment, as the underlying store expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Settings {
    pub endpoint: String,
    pub bucket_name: String,
    #[serde(default)]
    pub region: Option<String>,
}

impl S3Settings {
    pub fn validate(&self) -> ZarrResult<()> {
        if self.endpoint.trim().is_empty() {
            return Err(ZarrError::invalid_argument("S3 endpoint is empty"));
        }
        let bucket_len = self.bucket_name.trim().len();
        if !(3..=63).contains(&bucket_len) {
            return Err(ZarrError::invalid_argument(format!(
                "invalid length for S3 bucket name: {bucket_len}. Must be between 3 and 63 characters"
            )));
        }
        Ok(())
    }
}

/// Everything needed to open a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamSettings {
    pub version: ZarrVersion,
    /// Local path (optionally `file://`-prefixed), or the object-key prefix
    /// when `s3` is set.
    pub store_path: String,
    #[serde(default)]
    pub s3: Option<S3Settings>,
    #[serde(default)]
    pub compression: Option<CompressionSettings>,
    pub data_type: DataType,
    /// At least three entries; the first is the append dimension, the last
    /// two must be `space` (Y then X).
    pub dimensions: Vec<Dimension>,
    #[serde(default)]
    pub multiscale: bool,
    /// Worker threads for compression and I/O. 0 means hardware concurrency.
    #[serde(default)]
    pub max_threads: u32,
}

impl StreamSettings {
    pub fn validate(&self) -> ZarrResult<()> {
        let store_path = self.store_path.trim();
        if store_path.is_empty() {
            return Err(ZarrError::invalid_argument("store path is empty"));
        }

        match &self.s3 {
            Some(s3) => s3.validate()?,
            None => validate_filesystem_store_path(crate::sink::path::strip_file_scheme(
                store_path,
            ))?,
        }

        if let Some(compression) = &self.compression {
            compression.validate()?;
        }

        let ndims = self.dimensions.len();
        if ndims < 3 {
            return Err(ZarrError::invalid_argument(format!(
                "invalid number of dimensions: {ndims}. Must be at least 3"
            )));
        }
        if self.dimensions[ndims - 1].kind != DimensionKind::Space {
            return Err(ZarrError::invalid_argument(
                "last dimension must be of type space",
            ));
        }
        if self.dimensions[ndims - 2].kind != DimensionKind::Space {
            return Err(ZarrError::invalid_argument(
                "second to last dimension must be of type space",
            ));
        }

        let sharded = self.version == ZarrVersion::V3;
        for (i, dim) in self.dimensions.iter().enumerate() {
            dim.validate(i == 0, sharded)?;
        }

        Ok(())
    }
}

fn validate_filesystem_store_path(data_root: &str) -> ZarrResult<()> {
    let path = Path::new(data_root);
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => Path::new(".").to_path_buf(),
    };

    if !parent.is_dir() {
        return Err(ZarrError::invalid_argument(format!(
            "parent path '{}' does not exist or is not a directory",
            parent.display()
        )));
    }

    let writable = std::fs::metadata(&parent)
        .map(|m| !m.permissions().readonly())
        .unwrap_or(false);
    if !writable {
        return Err(ZarrError::invalid_argument(format!(
            "parent path '{}' is not writable",
            parent.display()
        )));
    }

    Ok(())
}
