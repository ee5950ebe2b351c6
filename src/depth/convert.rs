use super::quantize::{self, SampleIn};
use crate::{
    buffer::{ImageBufferMut, ImageBufferRef, LineBuffer, LineBufferMut},
    filter::{Filter, FilterFlags, ImageAttributes},
    internal_error,
    pixel::{PixelFormat, PixelType},
    utils::{align_to, alignment_of},
    Result,
};

type LineFn = fn(&[u8], &mut [f32], f32, f32);

fn integer_to_float_line<T: SampleIn>(src: &[u8], dst: &mut [f32], scale: f32, offset: f32) {
    let src: &[T] = bytemuck::cast_slice(src);

    for (x, y) in src.iter().zip(dst.iter_mut()) {
        *y = x.to_f32() * scale + offset;
    }
}

fn half_line(src: &[u8], dst: &mut [f32], _scale: f32, _offset: f32) {
    quantize::half_to_float_line(src, dst);
}

fn select_line_fn(pixel_in: &PixelFormat, pixel_out: &PixelFormat) -> (Option<LineFn>, bool) {
    let mut func: Option<LineFn> = match pixel_in.ty {
        PixelType::Byte => Some(integer_to_float_line::<u8>),
        PixelType::Word => Some(integer_to_float_line::<u16>),
        PixelType::Half => Some(half_line),
        PixelType::Float => None,
    };
    let mut to_half = pixel_out.ty == PixelType::Half;

    if pixel_in == pixel_out {
        func = None;
        to_half = false;
    }

    (func, to_half)
}

/// Converts a plane of any format to a floating point format.
///
/// The conversion is the affine normalization `y = x * scale + offset`; half
/// precision is widened before and narrowed after the arithmetic.
pub struct DepthConvert {
    func: Option<LineFn>,
    to_half: bool,
    pixel_in: PixelType,
    pixel_out: PixelType,
    scale: f32,
    offset: f32,
    width: u32,
    height: u32,
}

impl DepthConvert {
    pub fn new(width: u32, height: u32, pixel_in: &PixelFormat, pixel_out: &PixelFormat) -> Result<Self> {
        if !pixel_out.ty.is_float() {
            return Err(internal_error!("depth conversion only converts to floating point types"));
        }

        let (scale, offset) = quantize::normalize_scale_offset(pixel_in);
        let (func, to_half) = select_line_fn(pixel_in, pixel_out);

        Ok(Self {
            func,
            to_half,
            pixel_in: pixel_in.ty,
            pixel_out: pixel_out.ty,
            scale,
            offset,
            width,
            height,
        })
    }
}

impl Filter for DepthConvert {
    fn flags(&self) -> FilterFlags {
        let mut flags = FilterFlags::SAME_ROW;

        if !(self.func.is_some() && self.to_half) && self.pixel_in.size() >= self.pixel_out.size() {
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
        if self.func.is_some() && self.to_half {
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

        match (self.func, self.to_half) {
            (None, false) => {
                if src.plane(0).row_ptr(i) != dst.plane(0).row_ptr(i) as *const u8 {
                    let src_row = &src_buf.row(i)[left as usize * out_size..right as usize * out_size];
                    dst_buf.row_mut(i)[left as usize * out_size..right as usize * out_size].copy_from_slice(src_row);
                }
            }
            (Some(func), false) => {
                let src_row = &src_buf.row(i)[left as usize * in_size..right as usize * in_size];
                let dst_row = &mut dst_buf.row_mut(i)[left as usize * out_size..right as usize * out_size];
                func(src_row, bytemuck::cast_slice_mut(dst_row), self.scale, self.offset);
            }
            (Some(func), true) => {
                let line: &mut [f32] = &mut bytemuck::cast_slice_mut(tmp)[..width];
                let src_row = &src_buf.row(i)[left as usize * in_size..right as usize * in_size];
                func(src_row, line, self.scale, self.offset);

                let dst_row = &mut dst_buf.row_mut(i)[left as usize * out_size..right as usize * out_size];
                quantize::float_to_half_line(line, dst_row);
            }
            (None, true) => {
                let src_row = &src_buf.row(i)[left as usize * in_size..right as usize * in_size];
                let dst_row = &mut dst_buf.row_mut(i)[left as usize * out_size..right as usize * out_size];
                quantize::float_to_half_line(bytemuck::cast_slice(src_row), dst_row);
            }
        }

        Ok(())
    }
}
