//! Shared machinery for the per-level array writers.
//!
//! A writer owns the chunk staging buffers for one pyramid level and turns
//! whole frames into flushed chunks. The v2/v3 split is only about how a
//! finished band reaches storage (one sink per chunk vs. shard packing), so
//! everything up to that point lives here.

use std::borrow::Cow;
use std::sync::Arc;

use rayon::prelude::*;
use smallvec::SmallVec;

use crate::array::dimension::{ArrayDimensions, Dimension};
use crate::codec::BloscParams;
use crate::foundation::error::{ZarrError, ZarrResult};
use crate::sink::SinkFactory;

/// Immutable configuration of one array writer.
pub(crate) struct WriterConfig {
    pub dims: Arc<ArrayDimensions>,
    pub level_of_detail: usize,
    /// Store root: filesystem directory or object-key prefix.
    pub store_root: String,
    pub compression: Option<BloscParams>,
}

/// One pyramid level's writer.
pub(crate) trait ArrayWriter: Send {
    /// Write one whole frame. Refuses after a latched error.
    fn write_frame(&mut self, frame: &[u8]) -> ZarrResult<()>;

    /// Flush any partial band, emit array metadata, release sinks.
    /// Best-effort: later steps still run after a failure; the first error
    /// is returned.
    fn finalize(&mut self) -> ZarrResult<()>;
}

/// Derive the next pyramid level from `dims`: the append axis and both
/// spatial axes halve (rounding up), chunk extents clamp to the new array
/// extents, everything else is unchanged.
///
/// The returned flag is false when this level's scaled extents dropped below
/// their configured chunk size, i.e. no further level should be created.
pub(crate) fn downsample(dims: &ArrayDimensions) -> (ArrayDimensions, bool) {
    let ndims = dims.ndims();
    let mut can_downsample_again = true;

    let mut out = Vec::with_capacity(ndims);
    for (i, dim) in dims.iter().enumerate() {
        let scaled_axis = i == 0 || i >= ndims - 2;
        if !scaled_axis || dim.array_size_px == 0 {
            out.push(dim.clone());
            continue;
        }

        let array_size_px = dim.array_size_px.div_ceil(2);
        if array_size_px < dim.chunk_size_px {
            can_downsample_again = false;
        }
        out.push(Dimension {
            name: dim.name.clone(),
            kind: dim.kind,
            array_size_px,
            chunk_size_px: dim.chunk_size_px.min(array_size_px),
            shard_size_chunks: dim.shard_size_chunks,
        });
    }

    (ArrayDimensions::new(out, dims.dtype()), can_downsample_again)
}

/// Staging buffers and band bookkeeping shared by the v2 and v3 writers.
pub(crate) struct WriterCore {
    pub config: WriterConfig,
    pub factory: SinkFactory,
    pub pool: Arc<rayon::ThreadPool>,

    chunk_buffers: Vec<Vec<u8>>,

    pub bytes_to_flush: u64,
    pub frames_written: u64,
    pub append_chunk_index: u64,
    pub is_finalizing: bool,
    pub error: Option<String>,
}

impl WriterCore {
    pub fn new(config: WriterConfig, factory: SinkFactory, pool: Arc<rayon::ThreadPool>) -> Self {
        let chunk_bytes = config.dims.chunk_bytes();
        let chunk_buffers = (0..config.dims.chunks_per_frame())
            .map(|_| vec![0u8; chunk_bytes])
            .collect();

        Self {
            config,
            factory,
            pool,
            chunk_buffers,
            bytes_to_flush: 0,
            frames_written: 0,
            append_chunk_index: 0,
            is_finalizing: false,
            error: None,
        }
    }

    pub fn refuse_if_latched(&self) -> ZarrResult<()> {
        match &self.error {
            Some(msg) => Err(ZarrError::precondition(format!(
                "writer for level {} has failed: {msg}",
                self.config.level_of_detail
            ))),
            None => Ok(()),
        }
    }

    pub fn latch(&mut self, err: &ZarrError) {
        if self.error.is_none() {
            self.error = Some(err.to_string());
        }
    }

    pub fn check_frame(&self, frame: &[u8]) -> ZarrResult<()> {
        let expected = self.config.dims.frame_bytes();
        if frame.len() != expected {
            return Err(ZarrError::internal(format!(
                "expected a frame of {expected} bytes at level {}, got {}",
                self.config.level_of_detail,
                frame.len()
            )));
        }
        Ok(())
    }

    /// Frames staged into the current append-axis band.
    pub fn frames_in_band(&self) -> u64 {
        let band = self.config.dims.append_dim().chunk_size_px;
        self.frames_written
            .saturating_sub(self.append_chunk_index * band)
    }

    pub fn band_complete(&self) -> bool {
        self.frames_in_band() == self.config.dims.append_dim().chunk_size_px
    }

    /// Scatter one frame across the chunk buffers of the current band.
    ///
    /// Rows (all axes but X) are copied in X-chunk-sized segments; within a
    /// chunk, samples are row-major with the append axis slowest. Tiles past
    /// the array edge leave the zero fill in place.
    pub fn stage_frame(&mut self, frame: &[u8]) {
        let dims = &self.config.dims;
        let dsize = dims.dtype().size_of();
        let ndims = dims.ndims();

        let width = dims.width_dim().array_size_px as usize;
        let chunk_w = dims.width_dim().chunk_size_px as usize;
        let x_chunks = dims.width_dim().chunks_along() as usize;

        // extents of every axis between append and X
        let row_dims: SmallVec<[(usize, usize, usize); 4]> = (1..ndims - 1)
            .map(|i| {
                let d = dims.at(i);
                (
                    d.array_size_px as usize,
                    d.chunk_size_px as usize,
                    d.chunks_along() as usize,
                )
            })
            .collect();

        let n_rows: usize = row_dims.iter().map(|(size, _, _)| *size).product();
        let inner_chunk_elems = dims.chunk_inner_elems();
        let slot_base = self.frames_in_band() as usize * inner_chunk_elems;

        for row in 0..n_rows {
            // coordinates of this row over the non-X axes
            let mut coords: SmallVec<[usize; 4]> = SmallVec::from_elem(0, row_dims.len());
            let mut rem = row;
            for (axis, (size, _, _)) in row_dims.iter().enumerate().rev() {
                coords[axis] = rem % size;
                rem /= size;
            }

            let mut grid_row = 0usize;
            let mut within_row = 0usize;
            for (axis, (_, chunk, chunks)) in row_dims.iter().enumerate() {
                grid_row = grid_row * chunks + coords[axis] / chunk;
                within_row = within_row * chunk + coords[axis] % chunk;
            }

            let src_row = row * width;
            let dst_row = slot_base + within_row * chunk_w;
            for xc in 0..x_chunks {
                let x0 = xc * chunk_w;
                let len = chunk_w.min(width - x0);

                let chunk_index = grid_row * x_chunks + xc;
                let src = &frame[(src_row + x0) * dsize..(src_row + x0 + len) * dsize];
                self.chunk_buffers[chunk_index][dst_row * dsize..(dst_row + len) * dsize]
                    .copy_from_slice(src);
            }
        }

        self.bytes_to_flush += frame.len() as u64;
    }

    /// Produce the bytes each chunk of the band will flush: the staged
    /// buffers as-is, or one Blosc frame per chunk, compressed in parallel.
    /// The whole batch joins before any sink write begins.
    pub fn band_payloads(&self) -> ZarrResult<Vec<Cow<'_, [u8]>>> {
        match self.config.compression {
            Some(params) => self.pool.install(|| {
                self.chunk_buffers
                    .par_iter()
                    .map(|buf| params.compress(buf).map(Cow::Owned))
                    .collect::<ZarrResult<Vec<_>>>()
            }),
            None => Ok(self
                .chunk_buffers
                .iter()
                .map(|buf| Cow::Borrowed(buf.as_slice()))
                .collect()),
        }
    }

    /// Zero the staging buffers and advance to the next band.
    pub fn advance_band(&mut self) {
        for buf in &mut self.chunk_buffers {
            buf.fill(0);
        }
        self.bytes_to_flush = 0;
        self.append_chunk_index += 1;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/array/writer.rs"]
mod tests;
