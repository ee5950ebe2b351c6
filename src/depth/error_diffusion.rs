use super::quantize::{self, SampleIn, SampleOut};
use crate::{
    buffer::{ImageBufferMut, ImageBufferRef, LineBuffer, LineBufferMut},
    filter::{Filter, FilterFlags, ImageAttributes},
    pixel::{PixelFormat, PixelType},
    utils::{align_to, alignment_of},
    Result,
};

type DiffusionFn = fn(&[u8], &mut [u8], &[f32], &mut [f32], f32, f32, u32);

// Error rows carry a one-pixel margin on each side; logical column j lives at
// index j + 1.
fn diffuse_line<T: SampleIn, U: SampleOut>(src: &[u8], dst: &mut [u8], error_top: &[f32], error_cur: &mut [f32], scale: f32, offset: f32, depth: u32) {
    let src: &[T] = bytemuck::cast_slice(src);
    let dst: &mut [U] = bytemuck::cast_slice_mut(dst);
    let pixel_max = quantize::numeric_max(depth) as f32;

    for (j, (x, y)) in src.iter().zip(dst.iter_mut()).enumerate() {
        let mut err = 0.0;

        err += error_cur[j] * (7.0 / 16.0);
        err += error_top[j + 2] * (3.0 / 16.0);
        err += error_top[j + 1] * (5.0 / 16.0);
        err += error_top[j] * (1.0 / 16.0);

        let x = (x.to_f32() * scale + offset + err).clamp(0.0, pixel_max);
        let q = (x + 0.5).floor();

        *y = U::from_quantized(q);
        error_cur[j + 1] = x - q;
    }
}

fn select_diffusion_fn(pixel_in: PixelType, pixel_out: PixelType) -> Option<DiffusionFn> {
    match (pixel_in, pixel_out) {
        (PixelType::Byte, PixelType::Byte) => Some(diffuse_line::<u8, u8>),
        (PixelType::Byte, PixelType::Word) => Some(diffuse_line::<u8, u16>),
        (PixelType::Word, PixelType::Byte) => Some(diffuse_line::<u16, u8>),
        (PixelType::Word, PixelType::Word) => Some(diffuse_line::<u16, u16>),
        (PixelType::Half | PixelType::Float, PixelType::Byte) => Some(diffuse_line::<f32, u8>),
        (PixelType::Half | PixelType::Float, PixelType::Word) => Some(diffuse_line::<f32, u16>),
        _ => None,
    }
}

/// Floyd-Steinberg error diffusion to an integer format.
///
/// Stateful: the frame context holds two error rows, so rows must arrive in
/// increasing order and whole rows at a time.
pub struct ErrorDiffusion {
    func: Option<DiffusionFn>,
    half_input: bool,
    pixel_in: PixelType,
    pixel_out: PixelType,
    scale: f32,
    offset: f32,
    depth: u32,
    width: u32,
    height: u32,
}

impl ErrorDiffusion {
    pub fn new(width: u32, height: u32, pixel_in: &PixelFormat, pixel_out: &PixelFormat) -> Self {
        let (scale, offset) = quantize::requantize_scale_offset(pixel_in, pixel_out);
        let func = if pixel_in == pixel_out { None } else { select_diffusion_fn(pixel_in.ty, pixel_out.ty) };

        Self {
            func,
            half_input: pixel_in.ty == PixelType::Half && func.is_some(),
            pixel_in: pixel_in.ty,
            pixel_out: pixel_out.ty,
            scale,
            offset,
            depth: pixel_out.depth,
            width,
            height,
        }
    }

    fn error_row_len(&self) -> usize {
        align_to(self.width as usize + 2, alignment_of::<f32>())
    }
}

impl Filter for ErrorDiffusion {
    fn flags(&self) -> FilterFlags {
        let mut flags = FilterFlags::HAS_STATE | FilterFlags::SAME_ROW | FilterFlags::ENTIRE_ROW;

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

    fn context_size(&self) -> usize {
        2 * self.error_row_len() * std::mem::size_of::<f32>()
    }

    fn tmp_size(&self, _left: u32, _right: u32) -> usize {
        if self.half_input {
            align_to(self.width as usize, alignment_of::<f32>()) * std::mem::size_of::<f32>()
        } else {
            0
        }
    }

    fn init_context(&self, ctx: &mut [u8]) {
        let rows: &mut [f32] = bytemuck::cast_slice_mut(&mut ctx[..self.context_size()]);
        rows.fill(0.0);
    }

    fn process(&self, ctx: &mut [u8], src: &ImageBufferRef, dst: &ImageBufferMut, tmp: &mut [u8], i: u32, _left: u32, _right: u32) -> Result<()> {
        let in_size = self.pixel_in.size();
        let out_size = self.pixel_out.size();
        let width = self.width as usize;
        let row_len = self.error_row_len();

        let src_buf = LineBuffer::<u8>::new(src.plane(0), self.width * in_size as u32);
        let mut dst_buf = LineBufferMut::<u8>::new(dst.plane(0), self.width * out_size as u32);

        let Some(func) = self.func else {
            if src.plane(0).row_ptr(i) != dst.plane(0).row_ptr(i) as *const u8 {
                let src_row = &src_buf.row(i)[..width * out_size];
                dst_buf.row_mut(i)[..width * out_size].copy_from_slice(src_row);
            }
            return Ok(());
        };

        let rows: &mut [f32] = bytemuck::cast_slice_mut(&mut ctx[..2 * row_len * std::mem::size_of::<f32>()]);
        let (row_a, row_b) = rows.split_at_mut(row_len);
        let (error_top, error_cur) = if i % 2 == 0 { (&*row_b, row_a) } else { (&*row_a, row_b) };

        let dst_row = &mut dst_buf.row_mut(i)[..width * out_size];

        if self.half_input {
            let line: &mut [f32] = &mut bytemuck::cast_slice_mut(tmp)[..width];
            quantize::half_to_float_line(&src_buf.row(i)[..width * in_size], line);
            func(bytemuck::cast_slice(line), dst_row, error_top, error_cur, self.scale, self.offset, self.depth);
        } else {
            func(&src_buf.row(i)[..width * in_size], dst_row, error_top, error_cur, self.scale, self.offset, self.depth);
        }

        Ok(())
    }
}
