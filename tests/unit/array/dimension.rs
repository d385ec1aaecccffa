use super::*;
use crate::foundation::dtype::DataType;

fn dim(name: &str, kind: DimensionKind, size: u64, chunk: u64, shard: u64) -> Dimension {
    Dimension {
        name: name.into(),
        kind,
        array_size_px: size,
        chunk_size_px: chunk,
        shard_size_chunks: shard,
    }
}

fn dims_4d() -> ArrayDimensions {
    ArrayDimensions::new(
        vec![
            dim("t", DimensionKind::Time, 0, 5, 2),
            dim("c", DimensionKind::Channel, 3, 1, 1),
            dim("y", DimensionKind::Space, 48, 16, 3),
            dim("x", DimensionKind::Space, 64, 16, 2),
        ],
        DataType::Uint16,
    )
}

#[test]
fn chunks_along_rounds_up() {
    let d = dim("y", DimensionKind::Space, 65, 16, 1);
    assert_eq!(d.chunks_along(), 5);
    let d = dim("y", DimensionKind::Space, 64, 16, 1);
    assert_eq!(d.chunks_along(), 4);
}

#[test]
fn shards_along_rounds_up() {
    let d = dim("x", DimensionKind::Space, 64, 16, 3);
    assert_eq!(d.chunks_along(), 4);
    assert_eq!(d.shards_along(), 2);
}

#[test]
fn axis_accessors() {
    let dims = dims_4d();
    assert_eq!(dims.ndims(), 4);
    assert_eq!(dims.append_dim().name, "t");
    assert_eq!(dims.height_dim().name, "y");
    assert_eq!(dims.width_dim().name, "x");
    assert_eq!(dims.dtype(), DataType::Uint16);
}

#[test]
fn frame_and_chunk_geometry() {
    let dims = dims_4d();
    // 3 channels x 48 x 64 samples of u16
    assert_eq!(dims.frame_bytes(), 3 * 48 * 64 * 2);
    // 5 x 1 x 16 x 16 samples of u16
    assert_eq!(dims.chunk_bytes(), 5 * 16 * 16 * 2);
    assert_eq!(dims.chunk_inner_elems(), 16 * 16);
    // 3 x 3 x 4 chunks per frame
    assert_eq!(dims.chunks_per_frame(), 36);
    // 3 x 1 x 2 shards per frame
    assert_eq!(dims.shards_per_frame(), 6);
    // 2 x 1 x 3 x 2 chunks per shard
    assert_eq!(dims.chunks_per_shard(), 12);
    assert_eq!(dims.chunks_per_shard_band(), 6);
}

#[test]
fn equality_is_semantic() {
    assert_eq!(dims_4d(), dims_4d());
    let axes: Vec<Dimension> = dims_4d().iter().cloned().collect();
    let other = ArrayDimensions::new(axes, DataType::Uint32);
    assert_ne!(dims_4d(), other);
}

#[test]
fn shard_mapping_on_a_2x2_shard_grid() {
    // 4x4 spatial chunk grid, 2x2 shards -> 2x2 shard grid
    let dims = ArrayDimensions::new(
        vec![
            dim("t", DimensionKind::Time, 0, 1, 1),
            dim("y", DimensionKind::Space, 8, 2, 2),
            dim("x", DimensionKind::Space, 8, 2, 2),
        ],
        DataType::Uint8,
    );
    assert_eq!(dims.chunks_per_frame(), 16);
    assert_eq!(dims.shards_per_frame(), 4);

    // chunk (row 0, col 0..3): shards 0, 0, 1, 1
    assert_eq!(dims.shard_index_for_chunk(0), 0);
    assert_eq!(dims.shard_index_for_chunk(1), 0);
    assert_eq!(dims.shard_index_for_chunk(2), 1);
    assert_eq!(dims.shard_index_for_chunk(3), 1);
    // chunk (row 2, col 1) -> shard row 1, shard col 0 -> shard 2
    assert_eq!(dims.shard_index_for_chunk(9), 2);

    // within-shard slots are row-major over the 2x2 shard extents
    assert_eq!(dims.shard_internal_index(0), 0);
    assert_eq!(dims.shard_internal_index(1), 1);
    assert_eq!(dims.shard_internal_index(4), 2);
    assert_eq!(dims.shard_internal_index(5), 3);
    // same pattern in the next shard column
    assert_eq!(dims.shard_internal_index(2), 0);
    assert_eq!(dims.shard_internal_index(6), 2);
}

#[test]
fn shard_mapping_with_partial_edge_shards() {
    // 3 chunks along x with 2-chunk shards: second shard is half empty
    let dims = ArrayDimensions::new(
        vec![
            dim("t", DimensionKind::Time, 0, 1, 1),
            dim("y", DimensionKind::Space, 2, 2, 1),
            dim("x", DimensionKind::Space, 6, 2, 2),
        ],
        DataType::Uint8,
    );
    assert_eq!(dims.chunks_per_frame(), 3);
    assert_eq!(dims.shards_per_frame(), 2);
    assert_eq!(dims.shard_index_for_chunk(2), 1);
    assert_eq!(dims.shard_internal_index(2), 0);
}
