use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::foundation::dtype::DataType;
use crate::foundation::error::{ZarrError, ZarrResult};

/// Semantic kind of an axis, mirrored into the OME `axes` metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DimensionKind {
    Time,
    Channel,
    Space,
    Other,
}

impl DimensionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Time => "time",
            Self::Channel => "channel",
            Self::Space => "space",
            Self::Other => "other",
        }
    }
}

/// One named axis of the array.
///
/// `array_size_px == 0` on the first (append) dimension means unbounded.
/// `shard_size_chunks` is only meaningful for Zarr v3.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub kind: DimensionKind,
    pub array_size_px: u64,
    pub chunk_size_px: u64,
    #[serde(default)]
    pub shard_size_chunks: u64,
}

impl Dimension {
    pub fn validate(&self, is_append: bool, sharded: bool) -> ZarrResult<()> {
        if self.name.trim().is_empty() {
            return Err(ZarrError::invalid_argument("dimension name is empty"));
        }
        if !is_append && self.array_size_px == 0 {
            return Err(ZarrError::invalid_argument(format!(
                "array size must be nonzero for dimension '{}'",
                self.name
            )));
        }
        if self.chunk_size_px == 0 {
            return Err(ZarrError::invalid_argument(format!(
                "invalid chunk size for dimension '{}': 0",
                self.name
            )));
        }
        if sharded && self.shard_size_chunks == 0 {
            return Err(ZarrError::invalid_argument(format!(
                "shard size must be nonzero for dimension '{}'",
                self.name
            )));
        }
        Ok(())
    }

    /// Number of chunks along this axis. Zero for the unbounded append axis.
    pub fn chunks_along(&self) -> u64 {
        self.array_size_px.div_ceil(self.chunk_size_px)
    }

    /// Number of shards along this axis (v3).
    pub fn shards_along(&self) -> u64 {
        self.chunks_along().div_ceil(self.shard_size_chunks.max(1))
    }
}

/// Number of parts (chunks or shards) a writer tiles along one axis.
pub(crate) type DimensionPartsFn = fn(&Dimension) -> u64;

pub(crate) fn chunks_along(dim: &Dimension) -> u64 {
    dim.chunks_along()
}

pub(crate) fn shards_along(dim: &Dimension) -> u64 {
    dim.shards_along()
}

/// The full ordered axis list of one array plus its dtype.
///
/// Immutable after construction; all geometry the writers need is derived
/// here. Axis 0 is the append axis, the last two axes are Y then X.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayDimensions {
    dims: Vec<Dimension>,
    dtype: DataType,
}

impl ArrayDimensions {
    pub fn new(dims: Vec<Dimension>, dtype: DataType) -> Self {
        debug_assert!(dims.len() >= 3);
        Self { dims, dtype }
    }

    pub fn ndims(&self) -> usize {
        self.dims.len()
    }

    pub fn at(&self, index: usize) -> &Dimension {
        &self.dims[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Dimension> {
        self.dims.iter()
    }

    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    pub fn append_dim(&self) -> &Dimension {
        &self.dims[0]
    }

    pub fn height_dim(&self) -> &Dimension {
        &self.dims[self.dims.len() - 2]
    }

    pub fn width_dim(&self) -> &Dimension {
        &self.dims[self.dims.len() - 1]
    }

    /// Bytes in one frame: all samples at a fixed append index.
    pub fn frame_bytes(&self) -> usize {
        self.dims[1..]
            .iter()
            .map(|d| d.array_size_px as usize)
            .product::<usize>()
            * self.dtype.size_of()
    }

    /// Bytes in one fully populated chunk, across every axis.
    pub fn chunk_bytes(&self) -> usize {
        self.dims
            .iter()
            .map(|d| d.chunk_size_px as usize)
            .product::<usize>()
            * self.dtype.size_of()
    }

    /// Samples in the non-append cross-section of one chunk.
    pub(crate) fn chunk_inner_elems(&self) -> usize {
        self.dims[1..]
            .iter()
            .map(|d| d.chunk_size_px as usize)
            .product()
    }

    /// Number of chunks a single frame touches.
    pub fn chunks_per_frame(&self) -> u64 {
        self.dims[1..].iter().map(Dimension::chunks_along).product()
    }

    /// Number of shards a single frame touches (v3).
    pub fn shards_per_frame(&self) -> u64 {
        self.dims[1..].iter().map(Dimension::shards_along).product()
    }

    /// Chunks grouped into one shard, across every axis (v3).
    pub fn chunks_per_shard(&self) -> u64 {
        self.dims.iter().map(|d| d.shard_size_chunks).product()
    }

    /// Within-shard slots contributed by a single append-axis chunk band.
    pub(crate) fn chunks_per_shard_band(&self) -> u64 {
        self.dims[1..].iter().map(|d| d.shard_size_chunks).product()
    }

    /// Row-major chunk-grid extents over the non-append axes.
    pub(crate) fn chunk_grid_shape(&self) -> SmallVec<[u64; 6]> {
        self.dims[1..].iter().map(Dimension::chunks_along).collect()
    }

    /// Row-major shard-grid extents over the non-append axes (v3).
    pub(crate) fn shard_grid_shape(&self) -> SmallVec<[u64; 6]> {
        self.dims[1..].iter().map(Dimension::shards_along).collect()
    }

    /// Shard that owns the chunk at `chunk_linear` (row-major over the
    /// non-append chunk grid), as a row-major index over the shard grid.
    pub(crate) fn shard_index_for_chunk(&self, chunk_linear: u64) -> u64 {
        let grid = self.chunk_grid_shape();
        let coords = unravel(chunk_linear, &grid);

        let shard_grid = self.shard_grid_shape();
        let mut index = 0;
        for (axis, coord) in coords.iter().enumerate() {
            let shard_coord = coord / self.dims[axis + 1].shard_size_chunks;
            index = index * shard_grid[axis] + shard_coord;
        }
        index
    }

    /// Position of the chunk within its shard's per-band slot grid, row-major
    /// over the non-append `shard_size_chunks` extents.
    pub(crate) fn shard_internal_index(&self, chunk_linear: u64) -> u64 {
        let grid = self.chunk_grid_shape();
        let coords = unravel(chunk_linear, &grid);

        let mut index = 0;
        for (axis, coord) in coords.iter().enumerate() {
            let within = coord % self.dims[axis + 1].shard_size_chunks;
            index = index * self.dims[axis + 1].shard_size_chunks + within;
        }
        index
    }
}

fn unravel(mut linear: u64, shape: &[u64]) -> SmallVec<[u64; 6]> {
    let mut coords: SmallVec<[u64; 6]> = SmallVec::from_elem(0, shape.len());
    for axis in (0..shape.len()).rev() {
        coords[axis] = linear % shape[axis];
        linear /= shape[axis];
    }
    coords
}

#[cfg(test)]
#[path = "../../tests/unit/array/dimension.rs"]
mod tests;
