use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::foundation::dtype::DataType;
use crate::foundation::error::{ZarrError, ZarrResult};

/// Compressor family. Blosc is currently the only real compressor; `None`
/// keeps the settings struct expressible for raw acquisitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compressor {
    None,
    Blosc1,
}

/// Inner codec for the Blosc compressor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompressionCodec {
    None,
    BloscLz4,
    BloscZstd,
}

/// Blosc shuffle filter applied before compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShuffleMode {
    None,
    Byte,
    Bit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionSettings {
    pub compressor: Compressor,
    pub codec: CompressionCodec,
    pub level: u8,
    pub shuffle: ShuffleMode,
}

impl CompressionSettings {
    pub fn validate(&self) -> ZarrResult<()> {
        if self.compressor != Compressor::None && self.codec == CompressionCodec::None {
            return Err(ZarrError::invalid_argument(
                "compression codec must be set when using a compressor",
            ));
        }
        if self.level > 9 {
            return Err(ZarrError::invalid_argument(format!(
                "invalid compression level: {}. Must be between 0 and 9",
                self.level
            )));
        }
        Ok(())
    }
}

/// Worst-case growth of a Blosc frame over its input.
pub(crate) const BLOSC_MAX_OVERHEAD: usize = 16;

/// Fully resolved Blosc parameters for one array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BloscParams {
    pub codec: CompressionCodec,
    pub level: u8,
    pub shuffle: ShuffleMode,
    pub typesize: usize,
}

impl BloscParams {
    /// Resolve user settings against the array dtype. Returns `None` for raw
    /// acquisitions.
    pub fn resolve(settings: Option<&CompressionSettings>, dtype: DataType) -> Option<Self> {
        let settings = settings?;
        if settings.compressor == Compressor::None {
            return None;
        }
        Some(Self {
            codec: settings.codec,
            level: settings.level,
            shuffle: settings.shuffle,
            typesize: dtype.size_of(),
        })
    }

    pub fn cname(&self) -> &'static str {
        match self.codec {
            CompressionCodec::BloscLz4 => "lz4",
            CompressionCodec::BloscZstd => "zstd",
            CompressionCodec::None => "lz4",
        }
    }

    /// Largest buffer `compress` can produce for `nbytes` of input.
    pub fn max_compressed_size(&self, nbytes: usize) -> usize {
        nbytes + BLOSC_MAX_OVERHEAD
    }

    /// Compress one chunk into a fresh buffer.
    pub fn compress(&self, src: &[u8]) -> ZarrResult<Vec<u8>> {
        let compressor = match self.codec {
            CompressionCodec::BloscLz4 => blosc::Compressor::LZ4,
            CompressionCodec::BloscZstd => blosc::Compressor::Zstd,
            CompressionCodec::None => {
                return Err(ZarrError::unsupported("no compression codec configured"))
            }
        };

        let ctx = blosc::Context::new()
            .compressor(compressor)
            .map_err(|_| {
                ZarrError::unsupported(format!("codec '{}' is not available", self.cname()))
            })?
            .clevel(clevel(self.level))
            .shuffle(match self.shuffle {
                ShuffleMode::None => blosc::ShuffleMode::None,
                ShuffleMode::Byte => blosc::ShuffleMode::Byte,
                ShuffleMode::Bit => blosc::ShuffleMode::Bit,
            })
            .typesize(Some(self.typesize));

        let buffer: Vec<u8> = ctx.compress(src).into();
        if buffer.len() > self.max_compressed_size(src.len()) {
            return Err(ZarrError::codec(format!(
                "compressed chunk exceeds declared bound: {} > {}",
                buffer.len(),
                self.max_compressed_size(src.len())
            )));
        }
        Ok(buffer)
    }

    /// Zarr v2 `compressor` metadata object.
    pub fn v2_metadata(&self) -> Value {
        json!({
            "id": "blosc",
            "cname": self.cname(),
            "clevel": self.level,
            "shuffle": match self.shuffle {
                ShuffleMode::None => 0,
                ShuffleMode::Byte => 1,
                ShuffleMode::Bit => 2,
            },
            "blocksize": 0,
        })
    }

    /// Zarr v3 codec-chain entry.
    pub fn v3_metadata(&self) -> Value {
        json!({
            "name": "blosc",
            "configuration": {
                "cname": self.cname(),
                "clevel": self.level,
                "shuffle": match self.shuffle {
                    ShuffleMode::None => "noshuffle",
                    ShuffleMode::Byte => "shuffle",
                    ShuffleMode::Bit => "bitshuffle",
                },
                "typesize": self.typesize,
                "blocksize": 0,
            },
        })
    }
}

fn clevel(level: u8) -> blosc::Clevel {
    match level {
        0 => blosc::Clevel::None,
        1 => blosc::Clevel::L1,
        2 => blosc::Clevel::L2,
        3 => blosc::Clevel::L3,
        4 => blosc::Clevel::L4,
        5 => blosc::Clevel::L5,
        6 => blosc::Clevel::L6,
        7 => blosc::Clevel::L7,
        8 => blosc::Clevel::L8,
        _ => blosc::Clevel::L9,
    }
}
