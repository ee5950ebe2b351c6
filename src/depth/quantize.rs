use half::f16;

use crate::pixel::{PixelFormat, PixelType};

pub(crate) fn numeric_max(bits: u32) -> i64 {
    (1i64 << bits) - 1
}

pub(crate) fn integer_offset(bits: u32, fullrange: bool, chroma: bool) -> i64 {
    if chroma {
        1i64 << (bits - 1)
    } else if !fullrange {
        (16i64 << bits) >> 8
    } else {
        0
    }
}

pub(crate) fn integer_range(bits: u32, fullrange: bool, chroma: bool) -> i64 {
    if !fullrange && chroma {
        (224i64 << bits) >> 8
    } else if !fullrange {
        (219i64 << bits) >> 8
    } else {
        numeric_max(bits)
    }
}

/// Scale and offset normalizing an integer format to [0, 1] (plus chroma
/// recentering). Float formats are already normalized.
pub(crate) fn normalize_scale_offset(format: &PixelFormat) -> (f32, f32) {
    let range = if format.ty.is_integer() { integer_range(format.depth, format.fullrange, format.chroma) } else { 1 };
    let offset = if format.ty.is_integer() { integer_offset(format.depth, format.fullrange, format.chroma) } else { 0 };

    ((1.0 / range as f64) as f32, (-offset as f64 / range as f64) as f32)
}

/// Scale and offset mapping codes of `format_in` to codes of `format_out`.
pub(crate) fn requantize_scale_offset(format_in: &PixelFormat, format_out: &PixelFormat) -> (f32, f32) {
    let range_in = if format_in.ty.is_integer() { integer_range(format_in.depth, format_in.fullrange, format_in.chroma) } else { 1 };
    let offset_in = if format_in.ty.is_integer() { integer_offset(format_in.depth, format_in.fullrange, format_in.chroma) } else { 0 };
    let range_out = if format_out.ty.is_integer() { integer_range(format_out.depth, format_out.fullrange, format_out.chroma) } else { 1 };
    let offset_out = if format_out.ty.is_integer() { integer_offset(format_out.depth, format_out.fullrange, format_out.chroma) } else { 0 };

    let scale = range_out as f64 / range_in as f64;
    let offset = -offset_in as f64 * range_out as f64 / range_in as f64 + offset_out as f64;

    (scale as f32, offset as f32)
}

/// Input sample representations the scalar kernels read.
pub(crate) trait SampleIn: bytemuck::Pod {
    const TYPE: PixelType;

    fn to_f32(self) -> f32;
}

impl SampleIn for u8 {
    const TYPE: PixelType = PixelType::Byte;

    fn to_f32(self) -> f32 {
        self as f32
    }
}

impl SampleIn for u16 {
    const TYPE: PixelType = PixelType::Word;

    fn to_f32(self) -> f32 {
        self as f32
    }
}

impl SampleIn for f32 {
    const TYPE: PixelType = PixelType::Float;

    fn to_f32(self) -> f32 {
        self
    }
}

/// Integer sample representations the scalar kernels write.
pub(crate) trait SampleOut: bytemuck::Pod {
    const TYPE: PixelType;

    /// Truncating cast from a value already clamped to the code range.
    fn from_quantized(x: f32) -> Self;
}

impl SampleOut for u8 {
    const TYPE: PixelType = PixelType::Byte;

    fn from_quantized(x: f32) -> Self {
        x as u8
    }
}

impl SampleOut for u16 {
    const TYPE: PixelType = PixelType::Word;

    fn from_quantized(x: f32) -> Self {
        x as u16
    }
}

pub(crate) fn half_to_float_line(src: &[u8], dst: &mut [f32]) {
    let src: &[u16] = bytemuck::cast_slice(src);

    for (x, y) in src.iter().zip(dst.iter_mut()) {
        *y = f16::from_bits(*x).to_f32();
    }
}

pub(crate) fn float_to_half_line(src: &[f32], dst: &mut [u8]) {
    let dst: &mut [u16] = bytemuck::cast_slice_mut(dst);

    for (x, y) in src.iter().zip(dst.iter_mut()) {
        *y = f16::from_f32(*x).to_bits();
    }
}
