//! Zarr v2 array writer: one sink per chunk, rolled every append band.

use std::sync::Arc;

use rayon::prelude::*;
use tracing::warn;

use crate::array::dimension::chunks_along;
use crate::array::writer::{ArrayWriter, WriterConfig, WriterCore};
use crate::foundation::error::{ZarrError, ZarrResult};
use crate::meta;
use crate::sink::{finalize_sink, Sink, SinkFactory};

pub(crate) struct ZarrV2Writer {
    core: WriterCore,
    sinks: Vec<Box<dyn Sink>>,
}

impl ZarrV2Writer {
    pub fn new(
        config: WriterConfig,
        factory: SinkFactory,
        pool: Arc<rayon::ThreadPool>,
    ) -> Self {
        Self {
            core: WriterCore::new(config, factory, pool),
            sinks: Vec::new(),
        }
    }

    /// Chunk files for the current band live under
    /// `<root>/<level>/<append-chunk-index>`.
    fn data_root(&self) -> String {
        format!(
            "{}/{}/{}",
            self.core.config.store_root, self.core.config.level_of_detail,
            self.core.append_chunk_index
        )
    }

    fn metadata_path(&self) -> String {
        format!(
            "{}/{}/.zarray",
            self.core.config.store_root, self.core.config.level_of_detail
        )
    }

    fn flush_band(&mut self) -> ZarrResult<()> {
        if self.core.frames_in_band() == 0 {
            return Ok(());
        }

        if self.sinks.is_empty() {
            self.sinks = self.core.factory.make_data_sinks(
                &self.data_root(),
                &self.core.config.dims,
                chunks_along,
                &self.core.pool,
            )?;
        }

        let payloads = self.core.band_payloads()?;
        self.core.pool.install(|| {
            self.sinks
                .par_iter_mut()
                .zip(payloads.par_iter())
                .try_for_each(|(sink, payload)| {
                    sink.write(0, payload)?;
                    sink.flush()
                })
        })?;
        drop(payloads);

        for sink in self.sinks.drain(..) {
            finalize_sink(sink)?;
        }
        self.core.advance_band();
        Ok(())
    }

    fn write_array_metadata(&mut self) -> ZarrResult<()> {
        let doc = meta::v2_array_metadata(
            &self.core.config.dims,
            self.core.frames_written,
            self.core.config.compression.as_ref(),
        );
        let text = meta::to_json_text(&doc);

        let mut sink = self.core.factory.make_sink(&self.metadata_path())?;
        sink.write(0, text.as_bytes())?;
        finalize_sink(sink)
    }
}

impl ArrayWriter for ZarrV2Writer {
    fn write_frame(&mut self, frame: &[u8]) -> ZarrResult<()> {
        self.core.refuse_if_latched()?;
        self.core.check_frame(frame)?;

        self.core.stage_frame(frame);
        self.core.frames_written += 1;

        if self.core.band_complete() {
            if let Err(err) = self.flush_band() {
                self.core.latch(&err);
                return Err(err);
            }
        }
        Ok(())
    }

    fn finalize(&mut self) -> ZarrResult<()> {
        self.core.is_finalizing = true;
        let mut first_error: Option<ZarrError> = None;

        if self.core.frames_in_band() > 0 {
            if let Err(err) = self.flush_band() {
                warn!(level = self.core.config.level_of_detail, %err, "failed to flush final band");
                first_error.get_or_insert(err);
            }
        }

        if let Err(err) = self.write_array_metadata() {
            warn!(level = self.core.config.level_of_detail, %err, "failed to write array metadata");
            first_error.get_or_insert(err);
        }

        for sink in self.sinks.drain(..) {
            if let Err(err) = finalize_sink(sink) {
                warn!(level = self.core.config.level_of_detail, %err, "failed to finalize chunk sink");
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
