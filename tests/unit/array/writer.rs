use std::sync::Arc;

use super::*;
use crate::array::dimension::DimensionKind;
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

fn core_for(dims: Vec<Dimension>, dtype: DataType) -> WriterCore {
    let config = WriterConfig {
        dims: Arc::new(ArrayDimensions::new(dims, dtype)),
        level_of_detail: 0,
        store_root: "unused".into(),
        compression: None,
    };
    let pool = Arc::new(
        rayon::ThreadPoolBuilder::new()
            .num_threads(2)
            .build()
            .unwrap(),
    );
    WriterCore::new(config, SinkFactory::Filesystem, pool)
}

#[test]
fn downsample_halves_append_and_spatial_axes() {
    let dims = ArrayDimensions::new(
        vec![
            dim("t", DimensionKind::Time, 100, 10, 1),
            dim("c", DimensionKind::Channel, 3, 1, 1),
            dim("y", DimensionKind::Space, 64, 16, 1),
            dim("x", DimensionKind::Space, 64, 16, 1),
        ],
        DataType::Uint8,
    );
    let (down, again) = downsample(&dims);
    assert_eq!(down.append_dim().array_size_px, 50);
    assert_eq!(down.at(1).array_size_px, 3);
    assert_eq!(down.height_dim().array_size_px, 32);
    assert_eq!(down.width_dim().array_size_px, 32);
    assert!(again);
}

#[test]
fn downsample_rounds_odd_extents_up() {
    let dims = ArrayDimensions::new(
        vec![
            dim("t", DimensionKind::Time, 0, 1, 1),
            dim("y", DimensionKind::Space, 5, 2, 1),
            dim("x", DimensionKind::Space, 5, 2, 1),
        ],
        DataType::Uint8,
    );
    let (down, _) = downsample(&dims);
    assert_eq!(down.height_dim().array_size_px, 3);
    assert_eq!(down.width_dim().array_size_px, 3);
}

#[test]
fn downsample_stops_below_chunk_size_and_clamps() {
    let dims = ArrayDimensions::new(
        vec![
            dim("t", DimensionKind::Time, 0, 1, 1),
            dim("y", DimensionKind::Space, 4, 4, 1),
            dim("x", DimensionKind::Space, 4, 4, 1),
        ],
        DataType::Uint16,
    );
    let (down, again) = downsample(&dims);
    assert!(!again);
    assert_eq!(down.height_dim().array_size_px, 2);
    assert_eq!(down.height_dim().chunk_size_px, 2);
}

#[test]
fn downsample_keeps_unbounded_append_axis() {
    let dims = ArrayDimensions::new(
        vec![
            dim("t", DimensionKind::Time, 0, 4, 1),
            dim("y", DimensionKind::Space, 64, 8, 1),
            dim("x", DimensionKind::Space, 64, 8, 1),
        ],
        DataType::Uint8,
    );
    let (down, again) = downsample(&dims);
    assert_eq!(down.append_dim().array_size_px, 0);
    assert_eq!(down.append_dim().chunk_size_px, 4);
    assert!(again);
}

#[test]
fn stage_frame_tiles_row_major_within_chunks() {
    let mut core = core_for(
        vec![
            dim("t", DimensionKind::Time, 0, 1, 1),
            dim("y", DimensionKind::Space, 4, 2, 1),
            dim("x", DimensionKind::Space, 4, 2, 1),
        ],
        DataType::Uint8,
    );

    let frame: Vec<u8> = (0..16).collect();
    core.stage_frame(&frame);

    assert_eq!(core.chunk_buffers.len(), 4);
    assert_eq!(core.chunk_buffers[0], vec![0, 1, 4, 5]);
    assert_eq!(core.chunk_buffers[1], vec![2, 3, 6, 7]);
    assert_eq!(core.chunk_buffers[2], vec![8, 9, 12, 13]);
    assert_eq!(core.chunk_buffers[3], vec![10, 11, 14, 15]);
}

#[test]
fn stage_frame_zero_pads_edge_chunks() {
    let mut core = core_for(
        vec![
            dim("t", DimensionKind::Time, 0, 1, 1),
            dim("y", DimensionKind::Space, 2, 2, 1),
            dim("x", DimensionKind::Space, 3, 2, 1),
        ],
        DataType::Uint8,
    );

    let frame: Vec<u8> = vec![1, 2, 3, 4, 5, 6];
    core.stage_frame(&frame);

    assert_eq!(core.chunk_buffers[0], vec![1, 2, 4, 5]);
    // the x tail covers one sample per row; the rest keeps the zero fill
    assert_eq!(core.chunk_buffers[1], vec![3, 0, 6, 0]);
}

#[test]
fn stage_frame_places_later_frames_behind_earlier_ones() {
    let mut core = core_for(
        vec![
            dim("t", DimensionKind::Time, 0, 2, 1),
            dim("y", DimensionKind::Space, 2, 2, 1),
            dim("x", DimensionKind::Space, 2, 2, 1),
        ],
        DataType::Uint8,
    );

    core.stage_frame(&[1, 2, 3, 4]);
    core.frames_written += 1;
    core.stage_frame(&[5, 6, 7, 8]);
    core.frames_written += 1;

    assert_eq!(core.chunk_buffers[0], vec![1, 2, 3, 4, 5, 6, 7, 8]);
    assert!(core.band_complete());
}

#[test]
fn stage_frame_splits_interior_axes_across_chunks() {
    let mut core = core_for(
        vec![
            dim("t", DimensionKind::Time, 0, 1, 1),
            dim("c", DimensionKind::Channel, 2, 1, 1),
            dim("y", DimensionKind::Space, 2, 2, 1),
            dim("x", DimensionKind::Space, 2, 2, 1),
        ],
        DataType::Uint8,
    );

    let frame: Vec<u8> = (10..18).collect();
    core.stage_frame(&frame);

    // one chunk per channel plane
    assert_eq!(core.chunk_buffers.len(), 2);
    assert_eq!(core.chunk_buffers[0], vec![10, 11, 12, 13]);
    assert_eq!(core.chunk_buffers[1], vec![14, 15, 16, 17]);
}

#[test]
fn band_bookkeeping() {
    let mut core = core_for(
        vec![
            dim("t", DimensionKind::Time, 0, 3, 1),
            dim("y", DimensionKind::Space, 2, 2, 1),
            dim("x", DimensionKind::Space, 2, 2, 1),
        ],
        DataType::Uint8,
    );

    assert_eq!(core.frames_in_band(), 0);
    for i in 0..3 {
        core.stage_frame(&[0; 4]);
        core.frames_written += 1;
        assert_eq!(core.frames_in_band(), i + 1);
    }
    assert!(core.band_complete());

    core.advance_band();
    assert_eq!(core.frames_in_band(), 0);
    assert_eq!(core.append_chunk_index, 1);
    assert_eq!(core.bytes_to_flush, 0);
    assert!(core.chunk_buffers.iter().all(|b| b.iter().all(|&x| x == 0)));
}

#[test]
fn latched_writer_refuses() {
    let mut core = core_for(
        vec![
            dim("t", DimensionKind::Time, 0, 1, 1),
            dim("y", DimensionKind::Space, 2, 2, 1),
            dim("x", DimensionKind::Space, 2, 2, 1),
        ],
        DataType::Uint8,
    );
    assert!(core.refuse_if_latched().is_ok());
    core.latch(&crate::foundation::error::ZarrError::io("sink failed"));
    let err = core.refuse_if_latched().unwrap_err();
    assert!(err.to_string().contains("sink failed"));
}

#[test]
fn uncompressed_payloads_borrow_the_staging_buffers() {
    let mut core = core_for(
        vec![
            dim("t", DimensionKind::Time, 0, 1, 1),
            dim("y", DimensionKind::Space, 2, 2, 1),
            dim("x", DimensionKind::Space, 2, 2, 1),
        ],
        DataType::Uint8,
    );
    core.stage_frame(&[9, 8, 7, 6]);
    let payloads = core.band_payloads().unwrap();
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0].as_ref(), &[9, 8, 7, 6]);
    assert!(matches!(payloads[0], std::borrow::Cow::Borrowed(_)));
}
