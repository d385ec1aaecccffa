//! Spatial and temporal downsampling kernels for the multiscale pyramid.
//!
//! `scale_frame` computes the 2x2 local mean of every Y-X plane in a frame;
//! `average_frames` folds two consecutive frames of the same level together.
//! Both dispatch once on the tagged [`DataType`] and run monomorphic inner
//! loops, accumulating in `f64` so narrow integer types do not overflow.

use crate::foundation::dtype::DataType;
use crate::foundation::error::{ZarrError, ZarrResult};

trait Sample: Copy {
    const BYTES: usize;
    fn read_le(bytes: &[u8]) -> Self;
    fn write_le(self, bytes: &mut [u8]);
    fn to_f64(self) -> f64;
    fn from_f64(value: f64) -> Self;
}

macro_rules! impl_sample {
    ($($ty:ty),*) => {
        $(
            impl Sample for $ty {
                const BYTES: usize = std::mem::size_of::<$ty>();

                fn read_le(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(&bytes[..Self::BYTES]);
                    <$ty>::from_le_bytes(raw)
                }

                fn write_le(self, bytes: &mut [u8]) {
                    bytes[..Self::BYTES].copy_from_slice(&self.to_le_bytes());
                }

                fn to_f64(self) -> f64 {
                    self as f64
                }

                fn from_f64(value: f64) -> Self {
                    value as $ty
                }
            }
        )*
    };
}

impl_sample!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

macro_rules! dispatch_dtype {
    ($dtype:expr, $fn:ident ( $($arg:expr),* )) => {
        match $dtype {
            DataType::Uint8 => $fn::<u8>($($arg),*),
            DataType::Uint16 => $fn::<u16>($($arg),*),
            DataType::Uint32 => $fn::<u32>($($arg),*),
            DataType::Uint64 => $fn::<u64>($($arg),*),
            DataType::Int8 => $fn::<i8>($($arg),*),
            DataType::Int16 => $fn::<i16>($($arg),*),
            DataType::Int32 => $fn::<i32>($($arg),*),
            DataType::Int64 => $fn::<i64>($($arg),*),
            DataType::Float32 => $fn::<f32>($($arg),*),
            DataType::Float64 => $fn::<f64>($($arg),*),
        }
    };
}

/// Downscale every `width` x `height` plane of `src` by a 2x2 local mean.
///
/// Odd extents duplicate the last column/row, i.e. the missing neighbor is
/// treated as equal to the present one. `width` and `height` are updated in
/// place to the downscaled extents.
pub(crate) fn scale_frame(
    dtype: DataType,
    src: &[u8],
    width: &mut usize,
    height: &mut usize,
) -> ZarrResult<Vec<u8>> {
    let plane_bytes = *width * *height * dtype.size_of();
    if plane_bytes == 0 || !src.len().is_multiple_of(plane_bytes) {
        return Err(ZarrError::internal(format!(
            "frame of {} bytes is not a whole number of {}x{} planes",
            src.len(),
            width,
            height
        )));
    }

    let planes = src.len() / plane_bytes;
    let out_w = width.div_ceil(2);
    let out_h = height.div_ceil(2);
    let out_plane_bytes = out_w * out_h * dtype.size_of();

    let mut dst = vec![0u8; planes * out_plane_bytes];
    for plane in 0..planes {
        let src_plane = &src[plane * plane_bytes..(plane + 1) * plane_bytes];
        let dst_plane = &mut dst[plane * out_plane_bytes..(plane + 1) * out_plane_bytes];
        dispatch_dtype!(dtype, scale_plane(src_plane, dst_plane, *width, *height));
    }

    *width = out_w;
    *height = out_h;
    Ok(dst)
}

/// `dst[i] = (dst[i] + src[i]) / 2` elementwise, in the array dtype.
pub(crate) fn average_frames(dtype: DataType, dst: &mut [u8], src: &[u8]) -> ZarrResult<()> {
    if dst.len() != src.len() {
        return Err(ZarrError::internal(format!(
            "expected {} bytes in destination, got {}",
            src.len(),
            dst.len()
        )));
    }
    dispatch_dtype!(dtype, average_bytes(dst, src));
    Ok(())
}

fn scale_plane<T: Sample>(src: &[u8], dst: &mut [u8], width: usize, height: usize) {
    let get = |row: usize, col: usize| T::read_le(&src[(row * width + col) * T::BYTES..]).to_f64();

    let out_w = width.div_ceil(2);
    let out_h = height.div_ceil(2);
    for orow in 0..out_h {
        let r0 = orow * 2;
        let r1 = (r0 + 1).min(height - 1);
        for ocol in 0..out_w {
            let c0 = ocol * 2;
            let c1 = (c0 + 1).min(width - 1);

            let mean = 0.25 * (get(r0, c0) + get(r0, c1) + get(r1, c0) + get(r1, c1));
            T::from_f64(mean).write_le(&mut dst[(orow * out_w + ocol) * T::BYTES..]);
        }
    }
}

fn average_bytes<T: Sample>(dst: &mut [u8], src: &[u8]) {
    let count = src.len() / T::BYTES;
    for i in 0..count {
        let offset = i * T::BYTES;
        let a = T::read_le(&dst[offset..]).to_f64();
        let b = T::read_le(&src[offset..]).to_f64();
        T::from_f64(0.5 * (a + b)).write_le(&mut dst[offset..]);
    }
}

#[cfg(test)]
#[path = "../tests/unit/scale.rs"]
mod tests;
