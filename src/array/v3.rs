//! Zarr v3 array writer: chunks pack into shard objects with a trailing
//! `[offset, nbytes]` index, and sinks roll at shard boundaries along the
//! append axis rather than every band.

use std::sync::Arc;

use rayon::prelude::*;
use tracing::warn;

use crate::array::dimension::shards_along;
use crate::array::writer::{ArrayWriter, WriterConfig, WriterCore};
use crate::foundation::error::{ZarrError, ZarrResult};
use crate::meta;
use crate::sink::{finalize_sink, Sink, SinkFactory};

/// One open shard object: its sink, the index accumulated so far in
/// canonical order, and the running body length.
struct ShardState {
    sink: Box<dyn Sink>,
    index: Vec<(u64, u64)>,
    body_len: u64,
}

pub(crate) struct ZarrV3Writer {
    core: WriterCore,
    shards: Vec<ShardState>,
    /// For each shard, the band-relative chunk index occupying each of its
    /// per-band slots, row-major over the shard's non-append chunk grid.
    /// `None` marks slots past the array edge.
    shard_slots: Vec<Vec<Option<usize>>>,
}

impl ZarrV3Writer {
    pub fn new(
        config: WriterConfig,
        factory: SinkFactory,
        pool: Arc<rayon::ThreadPool>,
    ) -> Self {
        let dims = &config.dims;
        let slots_per_band = dims.chunks_per_shard_band() as usize;
        let mut shard_slots =
            vec![vec![None; slots_per_band]; dims.shards_per_frame() as usize];
        for chunk in 0..dims.chunks_per_frame() {
            let shard = dims.shard_index_for_chunk(chunk) as usize;
            let slot = dims.shard_internal_index(chunk) as usize;
            shard_slots[shard][slot] = Some(chunk as usize);
        }

        Self {
            core: WriterCore::new(config, factory, pool),
            shards: Vec::new(),
            shard_slots,
        }
    }

    /// Shard objects live under `<root>/<level>/c/<append-shard-index>`,
    /// matching the default v3 chunk-key encoding.
    fn data_root(&self) -> String {
        let shard_chunks = self.core.config.dims.append_dim().shard_size_chunks;
        format!(
            "{}/{}/c/{}",
            self.core.config.store_root,
            self.core.config.level_of_detail,
            self.core.append_chunk_index / shard_chunks
        )
    }

    fn metadata_path(&self) -> String {
        format!(
            "{}/{}/zarr.json",
            self.core.config.store_root, self.core.config.level_of_detail
        )
    }

    /// True once the band just flushed filled the shard's append extent.
    fn shard_complete(&self) -> bool {
        self.core
            .append_chunk_index
            .is_multiple_of(self.core.config.dims.append_dim().shard_size_chunks)
    }

    fn flush_band(&mut self) -> ZarrResult<()> {
        if self.core.frames_in_band() == 0 {
            return Ok(());
        }

        if self.shards.is_empty() {
            let sinks = self.core.factory.make_data_sinks(
                &self.data_root(),
                &self.core.config.dims,
                shards_along,
                &self.core.pool,
            )?;
            self.shards = sinks
                .into_iter()
                .map(|sink| ShardState {
                    sink,
                    index: Vec::new(),
                    body_len: 0,
                })
                .collect();
        }

        let payloads = self.core.band_payloads()?;
        let shard_slots = &self.shard_slots;
        self.core.pool.install(|| {
            self.shards
                .par_iter_mut()
                .zip(shard_slots.par_iter())
                .try_for_each(|(shard, slots)| -> ZarrResult<()> {
                    for slot in slots {
                        match slot {
                            Some(chunk) => {
                                let body: &[u8] = payloads[*chunk].as_ref();
                                shard.sink.write(shard.body_len, body)?;
                                shard.index.push((shard.body_len, body.len() as u64));
                                shard.body_len += body.len() as u64;
                            }
                            None => shard.index.push((shard.body_len, 0)),
                        }
                    }
                    Ok(())
                })
        })?;
        drop(payloads);

        self.core.advance_band();
        if self.shard_complete() || self.core.is_finalizing {
            self.close_shards()?;
        }
        Ok(())
    }

    /// Write each shard's trailing index and release its sink. Index slots
    /// for bands that never arrived (finalize mid-shard) are zero-length
    /// entries pointing at the end of the body.
    fn close_shards(&mut self) -> ZarrResult<()> {
        let chunks_per_shard = self.core.config.dims.chunks_per_shard() as usize;

        for shard in &mut self.shards {
            while shard.index.len() < chunks_per_shard {
                shard.index.push((shard.body_len, 0));
            }

            let mut footer = Vec::with_capacity(chunks_per_shard * 16);
            for (offset, nbytes) in &shard.index {
                footer.extend_from_slice(&offset.to_le_bytes());
                footer.extend_from_slice(&nbytes.to_le_bytes());
            }
            shard.sink.write(shard.body_len, &footer)?;
        }

        for shard in self.shards.drain(..) {
            finalize_sink(shard.sink)?;
        }
        Ok(())
    }

    fn write_array_metadata(&mut self) -> ZarrResult<()> {
        let doc = meta::v3_array_metadata(
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

impl ArrayWriter for ZarrV3Writer {
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

        // finalize can land exactly on a band boundary with the shard's
        // append extent only partially covered
        if !self.shards.is_empty() {
            if let Err(err) = self.close_shards() {
                warn!(level = self.core.config.level_of_detail, %err, "failed to close shards");
                first_error.get_or_insert(err);
            }
        }

        if let Err(err) = self.write_array_metadata() {
            warn!(level = self.core.config.level_of_detail, %err, "failed to write array metadata");
            first_error.get_or_insert(err);
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
