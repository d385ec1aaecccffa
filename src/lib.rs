//! zarr-stream is a streaming writer for chunked, optionally compressed
//! Zarr v2/v3 stores.
//!
//! Producers push raw image frames (N-dimensional tensors whose last two
//! axes are Y then X) as opaque byte buffers of any size; the stream slices
//! them into whole frames, optionally builds a multiscale pyramid, tiles
//! frames into fixed-size chunks along every dimension, compresses chunks
//! with Blosc, and persists chunks plus sidecar metadata to a local
//! filesystem or an S3-compatible object store.
//!
//! # Pipeline overview
//!
//! 1. **Assemble**: arbitrary-sized appends -> whole frames ([`ZarrStream::append`])
//! 2. **Fan out**: each frame goes to the level-0 writer and, with
//!    `multiscale`, through 2x2 local-mean downsampling to deeper levels
//! 3. **Tile + flush**: writers stage frames into chunk buffers and flush a
//!    band of chunks (v2: one file/object per chunk; v3: sharded with a
//!    trailing index) whenever the append-axis chunk extent fills
//! 4. **Finalize**: partial bands flush, group and per-array metadata land
//!    ([`ZarrStream::finalize`])
//!
//! Key design constraints:
//!
//! - **No unsafe**: `unsafe` is forbidden in this crate.
//! - **Single writer per store**: no cross-process coordination is attempted.
//! - **Append-only sinks**: storage backends only ever see non-decreasing
//!   offsets, which is what keeps files and S3 multipart uploads uniform.
//! - **Fail-latched**: the first fatal error wins; later appends refuse with
//!   the latched message, and finalize proceeds best-effort.
#![forbid(unsafe_code)]

mod array;
mod codec;
mod foundation;
mod meta;
mod scale;
mod settings;
mod sink;
mod stream;

pub use array::dimension::{ArrayDimensions, Dimension, DimensionKind};
pub use codec::{CompressionCodec, CompressionSettings, Compressor, ShuffleMode};
pub use foundation::dtype::DataType;
pub use foundation::error::{StatusCode, ZarrError, ZarrResult};
pub use settings::{S3Settings, StreamSettings, ZarrVersion};
pub use stream::ZarrStream;
