//! Append-and-flush byte destinations.
//!
//! A [`Sink`] is the capability boundary between the array writers and
//! storage: writers never know whether bytes land in a file or an S3 object.
//! The stream coordinator decides that once, by constructing a
//! [`SinkFactory`], and hands the factory to every writer.

mod file;
pub(crate) mod path;
mod s3;

use std::sync::Arc;

use rayon::prelude::*;

use crate::foundation::error::ZarrResult;
use crate::array::dimension::{ArrayDimensions, DimensionPartsFn};

pub(crate) use file::FileSink;
pub(crate) use s3::{S3ConnectionPool, S3Sink};

/// Write contract: `write` places `buf` at `offset`; offsets never decrease
/// for a given sink. `flush` drains any internal buffering; after
/// [`finalize_sink`] the sink is gone and further writes are impossible by
/// construction.
pub(crate) trait Sink: Send {
    fn write(&mut self, offset: u64, buf: &[u8]) -> ZarrResult<()>;
    fn flush(&mut self) -> ZarrResult<()>;
}

/// Flush and release a sink.
pub(crate) fn finalize_sink(mut sink: Box<dyn Sink>) -> ZarrResult<()> {
    sink.flush()
}

/// Builds sinks for one storage backend without leaking the backend kind
/// into the writers.
#[derive(Clone)]
pub(crate) enum SinkFactory {
    Filesystem,
    S3 { pool: Arc<S3ConnectionPool> },
}

impl SinkFactory {
    /// Create a single sink, materializing parent directories as needed on
    /// the filesystem backend.
    pub fn make_sink(&self, sink_path: &str) -> ZarrResult<Box<dyn Sink>> {
        match self {
            Self::Filesystem => {
                let sink_path = path::strip_file_scheme(sink_path);
                path::ensure_parent_dir(sink_path)?;
                Ok(Box::new(FileSink::create(sink_path)?))
            }
            Self::S3 { pool } => Ok(Box::new(S3Sink::new(Arc::clone(pool), sink_path))),
        }
    }

    /// Create the full set of chunk/shard sinks for one append band, in path
    /// order. Directory creation and file opening fan out on the worker pool.
    pub fn make_data_sinks(
        &self,
        base_path: &str,
        dims: &ArrayDimensions,
        parts_along_dimension: DimensionPartsFn,
        pool: &rayon::ThreadPool,
    ) -> ZarrResult<Vec<Box<dyn Sink>>> {
        let base_path = path::strip_file_scheme(base_path);
        let paths = path::construct_data_paths(base_path, dims, parts_along_dimension);

        match self {
            Self::Filesystem => {
                path::make_dirs(&path::parent_paths(&paths), pool)?;
                pool.install(|| {
                    paths
                        .par_iter()
                        .map(|p| {
                            FileSink::create(p).map(|sink| Box::new(sink) as Box<dyn Sink>)
                        })
                        .collect()
                })
            }
            Self::S3 { pool: s3 } => Ok(paths
                .iter()
                .map(|p| Box::new(S3Sink::new(Arc::clone(s3), p)) as Box<dyn Sink>)
                .collect()),
        }
    }
}
