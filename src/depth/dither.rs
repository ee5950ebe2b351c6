use aligned_vec::AVec;

use super::quantize::{self, SampleIn, SampleOut};
use crate::{
    buffer::{ImageBufferMut, ImageBufferRef, LineBuffer, LineBufferMut},
    filter::{Filter, FilterFlags, ImageAttributes},
    pixel::{PixelFormat, PixelType},
    utils::{align_to, alignment_of, ALIGNMENT},
    Result,
};

const ORDERED_DITHER_SIZE: usize = 8;
const ORDERED_DITHER_NUM: usize = ORDERED_DITHER_SIZE * ORDERED_DITHER_SIZE;
const ORDERED_DITHER_SCALE: f32 = 65.0;

#[rustfmt::skip]
const ORDERED_DITHERS: [u16; ORDERED_DITHER_NUM] = [
     1, 49, 13, 61,  4, 52, 16, 64,
    33, 17, 45, 29, 36, 20, 48, 32,
     9, 57,  5, 53, 12, 60,  8, 56,
    41, 25, 37, 21, 44, 28, 40, 24,
     3, 51, 15, 63,  2, 50, 14, 62,
    35, 19, 47, 31, 34, 18, 46, 30,
    11, 59,  7, 55, 10, 58,  6, 54,
    43, 27, 39, 23, 42, 26, 38, 22,
];

const RANDOM_DITHER_NUM: usize = 128 * 128;

/// Reference MT19937 generator, used only to derive the random dither table
/// and its per-row phases.
struct Mt19937 {
    state: [u32; 624],
    index: usize,
}

impl Mt19937 {
    fn new(seed: u32) -> Self {
        let mut state = [0u32; 624];

        state[0] = seed;
        for i in 1..624 {
            state[i] = 1812433253u32.wrapping_mul(state[i - 1] ^ (state[i - 1] >> 30)).wrapping_add(i as u32);
        }

        Self {
            state,
            index: 624,
        }
    }

    fn generate(&mut self) {
        for i in 0..624 {
            let y = (self.state[i] & 0x8000_0000) | (self.state[(i + 1) % 624] & 0x7FFF_FFFF);
            let mut next = y >> 1;

            if y & 1 != 0 {
                next ^= 0x9908_B0DF;
            }
            self.state[i] = self.state[(i + 397) % 624] ^ next;
        }
        self.index = 0;
    }

    fn next_u32(&mut self) -> u32 {
        if self.index >= 624 {
            self.generate();
        }

        let mut y = self.state[self.index];
        self.index += 1;

        y ^= y >> 11;
        y ^= (y << 7) & 0x9D2C_5680;
        y ^= (y << 15) & 0xEFC6_0000;
        y ^= y >> 18;
        y
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum DitherPattern {
    None,
    Bayer,
    Random,
}

type DitherFn = fn(&[f32], usize, usize, &[u8], &mut [u8], f32, f32, u32);

fn dither_ordered_line<T: SampleIn, U: SampleOut>(dither: &[f32], dither_offset: usize, dither_len: usize, src: &[u8], dst: &mut [u8], scale: f32, offset: f32, depth: u32) {
    let src: &[T] = bytemuck::cast_slice(src);
    let dst: &mut [U] = bytemuck::cast_slice_mut(dst);
    let pixel_max = quantize::numeric_max(depth) as f32;

    for (j, (x, y)) in src.iter().zip(dst.iter_mut()).enumerate() {
        let d = dither[(dither_offset + j) % dither_len];
        let x = (x.to_f32() * scale + offset + d + 0.5).floor();

        *y = U::from_quantized(x.clamp(0.0, pixel_max));
    }
}

fn select_dither_fn(pixel_in: PixelType, pixel_out: PixelType) -> Option<DitherFn> {
    match (pixel_in, pixel_out) {
        (PixelType::Byte, PixelType::Byte) => Some(dither_ordered_line::<u8, u8>),
        (PixelType::Byte, PixelType::Word) => Some(dither_ordered_line::<u8, u16>),
        (PixelType::Word, PixelType::Byte) => Some(dither_ordered_line::<u16, u8>),
        (PixelType::Word, PixelType::Word) => Some(dither_ordered_line::<u16, u16>),
        (PixelType::Half | PixelType::Float, PixelType::Byte) => Some(dither_ordered_line::<f32, u8>),
        (PixelType::Half | PixelType::Float, PixelType::Word) => Some(dither_ordered_line::<f32, u16>),
        _ => None,
    }
}

/// Quantizes a plane to an integer format with a position-derived dither
/// offset in (-0.5, 0.5].
pub struct OrderedDither {
    func: Option<DitherFn>,
    half_input: bool,
    pattern: DitherPattern,
    dither: AVec<f32>,
    pixel_in: PixelType,
    pixel_out: PixelType,
    scale: f32,
    offset: f32,
    depth: u32,
    width: u32,
    height: u32,
}

impl OrderedDither {
    fn new_with_pattern(pattern: DitherPattern, width: u32, height: u32, pixel_in: &PixelFormat, pixel_out: &PixelFormat) -> Self {
        let (scale, offset) = quantize::requantize_scale_offset(pixel_in, pixel_out);
        let func = if pixel_in == pixel_out { None } else { select_dither_fn(pixel_in.ty, pixel_out.ty) };

        let mut dither = AVec::new(ALIGNMENT);
        match pattern {
            DitherPattern::None => {
                for _ in 0..16 {
                    dither.push(0.0);
                }
            }
            DitherPattern::Bayer => {
                for d in ORDERED_DITHERS {
                    dither.push(d as f32 / ORDERED_DITHER_SCALE - 0.5);
                }
            }
            DitherPattern::Random => {
                let mut mt = Mt19937::new(5489);
                for _ in 0..RANDOM_DITHER_NUM {
                    dither.push(((mt.next_u32() as f64 / u32::MAX as f64 - 0.5) * 0.5) as f32);
                }
            }
        }

        Self {
            func,
            half_input: pixel_in.ty == PixelType::Half && func.is_some(),
            pattern,
            dither,
            pixel_in: pixel_in.ty,
            pixel_out: pixel_out.ty,
            scale,
            offset,
            depth: pixel_out.depth,
            width,
            height,
        }
    }

    pub fn new(width: u32, height: u32, pixel_in: &PixelFormat, pixel_out: &PixelFormat) -> Self {
        Self::new_with_pattern(DitherPattern::None, width, height, pixel_in, pixel_out)
    }

    pub fn new_bayer(width: u32, height: u32, pixel_in: &PixelFormat, pixel_out: &PixelFormat) -> Self {
        Self::new_with_pattern(DitherPattern::Bayer, width, height, pixel_in, pixel_out)
    }

    pub fn new_random(width: u32, height: u32, pixel_in: &PixelFormat, pixel_out: &PixelFormat) -> Self {
        Self::new_with_pattern(DitherPattern::Random, width, height, pixel_in, pixel_out)
    }

    /// Table window and starting phase for row `i` at column `left`.
    fn dither_params(&self, i: u32, left: u32) -> (usize, usize, usize) {
        match self.pattern {
            DitherPattern::None => (0, 0, 16),
            DitherPattern::Bayer => (
                (i as usize % ORDERED_DITHER_SIZE) * ORDERED_DITHER_SIZE,
                left as usize % ORDERED_DITHER_SIZE,
                ORDERED_DITHER_SIZE,
            ),
            DitherPattern::Random => {
                let mut mt = Mt19937::new(i.wrapping_add(left));
                let offset = mt.next_u32() as usize % (RANDOM_DITHER_NUM / alignment_of::<f32>());

                (0, offset, RANDOM_DITHER_NUM)
            }
        }
    }
}

impl Filter for OrderedDither {
    fn flags(&self) -> FilterFlags {
        let mut flags = FilterFlags::SAME_ROW;

        if self.pixel_in.size() >= self.pixel_out.size() {
            flags |= FilterFlags::IN_PLACE;
        }
        flags
    }

    fn image_attributes(&self) -> ImageAttributes {
        ImageAttributes {
            width: self.width,
            height: self.height,
            pixel_type: self.pixel_out,
        }
    }

    fn tmp_size(&self, left: u32, right: u32) -> usize {
        if self.half_input {
            align_to((right - left) as usize, alignment_of::<f32>()) * std::mem::size_of::<f32>()
        } else {
            0
        }
    }

    fn process(&self, _ctx: &mut [u8], src: &ImageBufferRef, dst: &ImageBufferMut, tmp: &mut [u8], i: u32, left: u32, right: u32) -> Result<()> {
        let in_size = self.pixel_in.size();
        let out_size = self.pixel_out.size();
        let width = (right - left) as usize;

        let src_buf = LineBuffer::<u8>::new(src.plane(0), self.width * in_size as u32);
        let mut dst_buf = LineBufferMut::<u8>::new(dst.plane(0), self.width * out_size as u32);

        let Some(func) = self.func else {
            if src.plane(0).row_ptr(i) != dst.plane(0).row_ptr(i) as *const u8 {
                let src_row = &src_buf.row(i)[left as usize * out_size..right as usize * out_size];
                dst_buf.row_mut(i)[left as usize * out_size..right as usize * out_size].copy_from_slice(src_row);
            }
            return Ok(());
        };

        let (base, dither_offset, dither_len) = self.dither_params(i, left);
        let dither = &self.dither[base..base + dither_len];
        let dst_row = &mut dst_buf.row_mut(i)[left as usize * out_size..right as usize * out_size];

        if self.half_input {
            let line: &mut [f32] = &mut bytemuck::cast_slice_mut(tmp)[..width];
            quantize::half_to_float_line(&src_buf.row(i)[left as usize * in_size..right as usize * in_size], line);
            func(dither, dither_offset, dither_len, bytemuck::cast_slice(line), dst_row, self.scale, self.offset, self.depth);
        } else {
            let src_row = &src_buf.row(i)[left as usize * in_size..right as usize * in_size];
            func(dither, dither_offset, dither_len, src_row, dst_row, self.scale, self.offset, self.depth);
        }

        Ok(())
    }
}
