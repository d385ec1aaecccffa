use super::*;

fn as_u16_le(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .collect()
}

#[test]
fn even_plane_is_a_plain_2x2_mean() {
    let src: Vec<u8> = vec![
        0, 2, 10, 12, //
        4, 6, 14, 16, //
        100, 100, 0, 0, //
        100, 100, 0, 0,
    ];
    let mut width = 4;
    let mut height = 4;
    let dst = scale_frame(DataType::Uint8, &src, &mut width, &mut height).unwrap();
    assert_eq!((width, height), (2, 2));
    assert_eq!(dst, vec![3, 13, 100, 0]);
}

#[test]
fn odd_extents_duplicate_the_last_column_and_row() {
    // 5x5 ramp; downscaling yields 3x3 with the edge sample doubled up
    let src: Vec<u8> = (0..25).collect();
    let mut width = 5;
    let mut height = 5;
    let dst = scale_frame(DataType::Uint8, &src, &mut width, &mut height).unwrap();
    assert_eq!((width, height), (3, 3));

    // interior: mean of {0,1,5,6} = 3
    assert_eq!(dst[0], 3);
    // last column: mean of {4,4,9,9} = 6 (column 4 duplicated)
    assert_eq!(dst[2], 6);
    // last row: mean of {20,21,20,21} = 20 (row 4 duplicated, truncating)
    assert_eq!(dst[6], 20);
    // corner: all four samples collapse to src[24]
    assert_eq!(dst[8], 24);
}

#[test]
fn integer_means_accumulate_in_floating_point() {
    // all-255 u8 plane must stay 255, not wrap
    let src = vec![255u8; 16];
    let mut width = 4;
    let mut height = 4;
    let dst = scale_frame(DataType::Uint8, &src, &mut width, &mut height).unwrap();
    assert!(dst.iter().all(|&v| v == 255));
}

#[test]
fn scales_every_plane_of_a_multi_channel_frame() {
    // two 2x2 planes downscale to two 1x1 planes
    let src: Vec<u8> = vec![0, 4, 8, 12, 100, 104, 108, 112];
    let mut width = 2;
    let mut height = 2;
    let dst = scale_frame(DataType::Uint8, &src, &mut width, &mut height).unwrap();
    assert_eq!((width, height), (1, 1));
    assert_eq!(dst, vec![6, 106]);
}

#[test]
fn u16_planes_keep_wide_values() {
    let src: Vec<u8> = [1000u16, 2000, 3000, 4000]
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect();
    let mut width = 2;
    let mut height = 2;
    let dst = scale_frame(DataType::Uint16, &src, &mut width, &mut height).unwrap();
    assert_eq!(as_u16_le(&dst), vec![2500]);
}

#[test]
fn f32_means_are_exact() {
    let src: Vec<u8> = [1.0f32, 2.0, 3.0, 4.0]
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect();
    let mut width = 2;
    let mut height = 2;
    let dst = scale_frame(DataType::Float32, &src, &mut width, &mut height).unwrap();
    let out = f32::from_le_bytes([dst[0], dst[1], dst[2], dst[3]]);
    assert_eq!(out, 2.5);
}

#[test]
fn ragged_frame_is_rejected() {
    let mut width = 4;
    let mut height = 4;
    let err = scale_frame(DataType::Uint8, &[0u8; 15], &mut width, &mut height).unwrap_err();
    assert!(err.to_string().contains("planes"));
}

#[test]
fn averaging_two_frames_is_elementwise() {
    let mut dst = vec![10u8, 20, 30, 255];
    let src = vec![20u8, 10, 31, 255];
    average_frames(DataType::Uint8, &mut dst, &src).unwrap();
    assert_eq!(dst, vec![15, 15, 30, 255]);
}

#[test]
fn averaging_u16_uses_the_sample_width() {
    let mut dst: Vec<u8> = [1000u16, 4000].iter().flat_map(|v| v.to_le_bytes()).collect();
    let src: Vec<u8> = [3000u16, 2000].iter().flat_map(|v| v.to_le_bytes()).collect();
    average_frames(DataType::Uint16, &mut dst, &src).unwrap();
    assert_eq!(as_u16_le(&dst), vec![2000, 3000]);
}

#[test]
fn averaging_length_mismatch_is_rejected() {
    let mut dst = vec![0u8; 4];
    assert!(average_frames(DataType::Uint8, &mut dst, &[0u8; 5]).is_err());
}
