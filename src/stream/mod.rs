//! The stream coordinator: owns one array writer per pyramid level, routes
//! incoming bytes through the frame assembler, and drives finalization.

mod frame_buffer;

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::array::dimension::ArrayDimensions;
use crate::array::v2::ZarrV2Writer;
use crate::array::v3::ZarrV3Writer;
use crate::array::writer::{downsample, ArrayWriter, WriterConfig};
use crate::codec::BloscParams;
use crate::foundation::error::{ZarrError, ZarrResult};
use crate::meta;
use crate::scale;
use crate::settings::{StreamSettings, ZarrVersion};
use crate::sink::{finalize_sink, path, S3ConnectionPool, Sink, SinkFactory};
use crate::stream::frame_buffer::FrameAssembler;

const CUSTOM_METADATA_KEY: &str = "acquire.json";

/// A live streaming acquisition.
///
/// Push bytes with [`append`](Self::append); call
/// [`finalize`](Self::finalize) exactly once when done (a second call is an
/// accepted no-op). Group metadata is written both at construction and at
/// finalize — a reader observing the store mid-stream sees a pyramid with
/// fewer datasets than will ultimately exist; the finalize copy is
/// authoritative.
pub struct ZarrStream {
    version: ZarrVersion,
    store_root: String,
    dims: Arc<ArrayDimensions>,
    multiscale: bool,

    factory: SinkFactory,
    pool: Arc<rayon::ThreadPool>,

    writers: Vec<Box<dyn ArrayWriter>>,
    metadata_sinks: HashMap<String, Box<dyn Sink>>,

    /// Per level >= 1: the previous downsampled frame awaiting its partner.
    scaled_frames: Vec<Option<Vec<u8>>>,
    frame_buffer: FrameAssembler,

    custom_metadata_written: bool,
    error: Option<String>,
    finalized: bool,
}

impl ZarrStream {
    /// Validate `settings`, create the store root, spin up the worker pool,
    /// and emit base and group metadata.
    ///
    /// A local store root that already exists is cleared first.
    pub fn new(settings: StreamSettings) -> ZarrResult<Self> {
        settings.validate()?;

        let pool = build_thread_pool(settings.max_threads)?;

        let store_root = if settings.s3.is_some() {
            settings.store_path.trim().to_string()
        } else {
            path::strip_file_scheme(settings.store_path.trim()).to_string()
        };

        let factory = match &settings.s3 {
            Some(s3) => {
                let s3_pool = Arc::new(S3ConnectionPool::connect(s3)?);
                if !s3_pool.bucket_exists() {
                    return Err(ZarrError::io(format!(
                        "failed to connect to S3 bucket '{}'",
                        s3.bucket_name.trim()
                    )));
                }
                SinkFactory::S3 { pool: s3_pool }
            }
            None => {
                create_store_root(&store_root)?;
                SinkFactory::Filesystem
            }
        };

        let dims = Arc::new(ArrayDimensions::new(
            settings.dimensions.clone(),
            settings.data_type,
        ));
        let compression = BloscParams::resolve(settings.compression.as_ref(), settings.data_type);

        let make_writer = |level: usize, dims: Arc<ArrayDimensions>| -> Box<dyn ArrayWriter> {
            let config = WriterConfig {
                dims,
                level_of_detail: level,
                store_root: store_root.clone(),
                compression,
            };
            match settings.version {
                ZarrVersion::V2 => {
                    Box::new(ZarrV2Writer::new(config, factory.clone(), Arc::clone(&pool)))
                }
                ZarrVersion::V3 => {
                    Box::new(ZarrV3Writer::new(config, factory.clone(), Arc::clone(&pool)))
                }
            }
        };

        let mut writers = vec![make_writer(0, Arc::clone(&dims))];
        if settings.multiscale {
            let mut level_dims = Arc::clone(&dims);
            loop {
                let (down, again) = downsample(&level_dims);
                level_dims = Arc::new(down);
                writers.push(make_writer(writers.len(), Arc::clone(&level_dims)));
                if !again {
                    break;
                }
            }
        }

        let frame_buffer = FrameAssembler::new(dims.frame_bytes());
        let scaled_frames = writers.iter().map(|_| None).collect();

        let mut stream = Self {
            version: settings.version,
            store_root,
            dims,
            multiscale: settings.multiscale,
            factory,
            pool,
            writers,
            metadata_sinks: HashMap::new(),
            scaled_frames,
            frame_buffer,
            custom_metadata_written: false,
            error: None,
            finalized: false,
        };

        stream.create_metadata_sinks()?;
        stream.write_base_metadata()?;
        stream.write_group_metadata()?;
        Ok(stream)
    }

    /// Append raw frame bytes. Returns the number of bytes consumed; a short
    /// return means a fatal error latched mid-append, and subsequent calls
    /// refuse with the latched message.
    pub fn append(&mut self, data: &[u8]) -> ZarrResult<usize> {
        if self.finalized {
            return Err(ZarrError::precondition(
                "cannot append to a finalized stream",
            ));
        }
        if let Some(msg) = &self.error {
            return Err(ZarrError::precondition(format!("cannot append data: {msg}")));
        }
        if data.is_empty() {
            return Ok(0);
        }

        let mut assembler = std::mem::take(&mut self.frame_buffer);
        let consumed = assembler.append(data, |frame| self.dispatch_frame(frame));
        self.frame_buffer = assembler;
        Ok(consumed)
    }

    /// Write user-supplied JSON to `<root>/acquire.json`, canonicalized with
    /// a 4-space indent. A second write fails with
    /// [`ZarrError::WillNotOverwrite`] unless `overwrite` is set.
    pub fn write_custom_metadata(
        &mut self,
        custom_metadata: &str,
        overwrite: bool,
    ) -> ZarrResult<()> {
        if custom_metadata.trim().is_empty() {
            return Err(ZarrError::invalid_argument("custom metadata is empty"));
        }
        let parsed: serde_json::Value = serde_json::from_str(custom_metadata).map_err(|e| {
            ZarrError::invalid_argument(format!("invalid JSON: '{custom_metadata}': {e}"))
        })?;

        if self.custom_metadata_written && !overwrite {
            return Err(ZarrError::will_not_overwrite(
                "custom metadata already written, use the overwrite flag",
            ));
        }

        let text = meta::to_json_text(&parsed);
        let sink_path = format!("{}/{CUSTOM_METADATA_KEY}", self.store_root);

        if self.finalized {
            // the metadata sink map is gone; write through a transient sink
            let mut sink = self.factory.make_sink(&sink_path)?;
            sink.write(0, text.as_bytes())?;
            finalize_sink(sink)?;
        } else {
            if overwrite {
                // recreate so a shorter document fully replaces the old one
                self.metadata_sinks.remove(CUSTOM_METADATA_KEY);
            }
            if !self.metadata_sinks.contains_key(CUSTOM_METADATA_KEY) {
                let sink = self.factory.make_sink(&sink_path)?;
                self.metadata_sinks
                    .insert(CUSTOM_METADATA_KEY.to_string(), sink);
            }
            let sink = self
                .metadata_sinks
                .get_mut(CUSTOM_METADATA_KEY)
                .expect("custom metadata sink just inserted");
            sink.write(0, text.as_bytes())?;
        }

        self.custom_metadata_written = true;
        Ok(())
    }

    /// Flush every partial band, emit terminal metadata, and drain the
    /// worker pool. Failures are reported but finalization continues through
    /// the remaining steps; the first error is returned.
    pub fn finalize(&mut self) -> ZarrResult<()> {
        if self.finalized {
            debug!("stream already finalized");
            return Ok(());
        }
        self.finalized = true;

        let mut first_error: Option<ZarrError> = None;

        // the finalize copy of the group document is authoritative
        if let Err(err) = self.write_group_metadata() {
            warn!(%err, "failed to write group metadata");
            first_error.get_or_insert(err);
        }

        for (name, sink) in self.metadata_sinks.drain() {
            if let Err(err) = finalize_sink(sink) {
                warn!(name = %name, %err, "failed to finalize metadata sink");
                first_error.get_or_insert(err);
            }
        }

        for writer in self.writers.iter_mut() {
            if let Err(err) = writer.finalize() {
                warn!(%err, "failed to finalize array writer");
                first_error.get_or_insert(err);
            }
        }

        // every compression/I-O batch joins synchronously on the pool, so
        // reaching this point means the scheduler is quiescent
        debug!(
            threads = self.pool.current_num_threads(),
            "worker pool drained"
        );

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// The latched fatal error, if any.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn set_error(&mut self, msg: String) {
        warn!(error = %msg, "latching stream error");
        if self.error.is_none() {
            self.error = Some(msg);
        }
    }

    /// Route one whole frame to the writer fleet. Returns false on a fatal
    /// error, stopping the assembler.
    fn dispatch_frame(&mut self, frame: &[u8]) -> bool {
        if let Err(err) = self.writers[0].write_frame(frame) {
            self.set_error(format!("incomplete write to full-resolution array: {err}"));
            return false;
        }
        if self.multiscale {
            if let Err(err) = self.write_multiscale_frames(frame) {
                self.set_error(err.to_string());
                return false;
            }
        }
        true
    }

    /// Walk the pyramid: downsample, pair with the stashed frame when one
    /// exists, and push the average one level down.
    fn write_multiscale_frames(&mut self, frame: &[u8]) -> ZarrResult<()> {
        let dtype = self.dims.dtype();
        let mut width = self.dims.width_dim().array_size_px as usize;
        let mut height = self.dims.height_dim().array_size_px as usize;

        let mut current: Cow<'_, [u8]> = Cow::Borrowed(frame);
        for level in 1..self.writers.len() {
            let scaled = scale::scale_frame(dtype, &current, &mut width, &mut height)?;

            match self.scaled_frames[level].take() {
                Some(stash) => {
                    let mut averaged = scaled;
                    scale::average_frames(dtype, &mut averaged, &stash)?;
                    self.writers[level].write_frame(&averaged)?;
                    current = Cow::Owned(averaged);
                }
                None => {
                    self.scaled_frames[level] = Some(scaled);
                    break;
                }
            }
        }
        Ok(())
    }

    fn create_metadata_sinks(&mut self) -> ZarrResult<()> {
        let keys: &[&str] = match self.version {
            ZarrVersion::V2 => &[".zgroup", ".zattrs"],
            ZarrVersion::V3 => &["zarr.json"],
        };
        for key in keys {
            let sink = self.factory.make_sink(&format!("{}/{key}", self.store_root))?;
            self.metadata_sinks.insert(key.to_string(), sink);
        }
        Ok(())
    }

    fn write_metadata_document(&mut self, key: &str, doc: &serde_json::Value) -> ZarrResult<()> {
        let text = meta::to_json_text(doc);
        let sink = self.metadata_sinks.get_mut(key).ok_or_else(|| {
            ZarrError::internal(format!("metadata sink '{key}' not found"))
        })?;
        sink.write(0, text.as_bytes())
    }

    fn write_base_metadata(&mut self) -> ZarrResult<()> {
        match self.version {
            ZarrVersion::V2 => {
                let doc = meta::v2_base_metadata(&self.dims, self.writers.len());
                self.write_metadata_document(".zattrs", &doc)
            }
            ZarrVersion::V3 => {
                let doc = meta::v3_base_metadata();
                self.write_metadata_document("zarr.json", &doc)
            }
        }
    }

    fn write_group_metadata(&mut self) -> ZarrResult<()> {
        match self.version {
            ZarrVersion::V2 => self.write_metadata_document(".zgroup", &meta::v2_group_metadata()),
            ZarrVersion::V3 => {
                let doc = meta::v3_group_metadata(&self.dims, self.writers.len());
                self.write_metadata_document("zarr.json", &doc)
            }
        }
    }
}

impl Drop for ZarrStream {
    fn drop(&mut self) {
        if !self.finalized {
            warn!("stream dropped without finalize; buffered frames and metadata were not flushed");
        }
    }
}

/// One worker pool per stream. `max_threads == 0` means hardware
/// concurrency.
fn build_thread_pool(max_threads: u32) -> ZarrResult<Arc<rayon::ThreadPool>> {
    let mut builder = rayon::ThreadPoolBuilder::new();
    if max_threads > 0 {
        builder = builder.num_threads(max_threads as usize);
    }
    builder
        .build()
        .map(Arc::new)
        .map_err(|e| ZarrError::internal(format!("failed to build worker pool: {e}")))
}

/// Clear and recreate a local store root.
fn create_store_root(store_root: &str) -> ZarrResult<()> {
    let root = std::path::Path::new(store_root);
    if root.exists() {
        std::fs::remove_dir_all(root).map_err(|e| {
            ZarrError::io(format!(
                "failed to remove existing store path '{store_root}': {e}"
            ))
        })?;
    }
    std::fs::create_dir_all(root).map_err(|e| {
        ZarrError::io(format!("failed to create store path '{store_root}': {e}"))
    })
}
