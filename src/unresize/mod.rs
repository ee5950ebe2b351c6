mod bilinear;

use log::debug;

use self::bilinear::{create_bilinear_context, BilinearContext};
use crate::{
    buffer::{ImageBufferMut, ImageBufferRef, LineBuffer, LineBufferMut},
    cpu::CpuFeatures,
    filter::{CopyFilter, Filter, FilterFlags, ImageAttributes, BUFFER_MAX},
    graph::PairFilter,
    pixel::PixelType,
    unsupported_error, Result,
};

fn unresize_line_h_f32(ctx: &BilinearContext, src: &[f32], dst: &mut [f32]) {
    let c = &ctx.lu_c;
    let l = &ctx.lu_l;
    let u = &ctx.lu_u;

    let mut z = 0.0f32;

    for j in 0..ctx.output_width as usize {
        let top = ctx.matrix_row_offsets[j] as usize;
        let mut accum = 0.0f32;

        for k in 0..ctx.matrix_row_size as usize {
            accum += ctx.matrix_coefficients[j * ctx.matrix_row_stride as usize + k] * src[top + k];
        }

        z = (accum - c[j] * z) * l[j];
        dst[j] = z;
    }

    let mut w = 0.0f32;

    for j in (0..ctx.output_width as usize).rev() {
        w = dst[j] - u[j] * w;
        dst[j] = w;
    }
}

fn unresize_line_forward_v_f32(ctx: &BilinearContext, src: &LineBuffer<'_, f32>, dst: &mut LineBufferMut<'_, f32>, i: u32, left: u32, right: u32) {
    let c = &ctx.lu_c;
    let l = &ctx.lu_l;

    let top = ctx.matrix_row_offsets[i as usize];
    let coeff_base = i as usize * ctx.matrix_row_stride as usize;

    for j in left as usize..right as usize {
        let z = if i > 0 { dst.row(i - 1)[j] } else { 0.0 };
        let mut accum = 0.0f32;

        for k in 0..ctx.matrix_row_size as usize {
            accum += ctx.matrix_coefficients[coeff_base + k] * src.row(top + k as u32)[j];
        }

        dst.row_mut(i)[j] = (accum - c[i as usize] * z) * l[i as usize];
    }
}

fn unresize_line_back_v_f32(ctx: &BilinearContext, dst: &mut LineBufferMut<'_, f32>, i: u32, left: u32, right: u32) {
    let u = &ctx.lu_u;
    let height = ctx.output_width;

    for j in left as usize..right as usize {
        let w = if i < height { dst.row(i)[j] } else { 0.0 };
        let above = dst.row(i - 1)[j];

        dst.row_mut(i - 1)[j] = above - u[i as usize - 1] * w;
    }
}

/// Horizontal unresize: per-row forward and back substitution.
pub struct UnresizeH {
    context: BilinearContext,
    height: u32,
}

impl Filter for UnresizeH {
    fn flags(&self) -> FilterFlags {
        FilterFlags::SAME_ROW | FilterFlags::ENTIRE_ROW
    }

    fn image_attributes(&self) -> ImageAttributes {
        ImageAttributes {
            width: self.context.output_width,
            height: self.height,
            pixel_type: PixelType::Float,
        }
    }

    fn required_col_range(&self, _left: u32, _right: u32) -> (u32, u32) {
        (0, self.context.input_width)
    }

    fn process(&self, _ctx: &mut [u8], src: &ImageBufferRef, dst: &ImageBufferMut, _tmp: &mut [u8], i: u32, _left: u32, _right: u32) -> Result<()> {
        let src_buf = LineBuffer::<f32>::new(src.plane(0), self.context.input_width);
        let mut dst_buf = LineBufferMut::<f32>::new(dst.plane(0), self.context.output_width);

        unresize_line_h_f32(&self.context, src_buf.row(i), dst_buf.row_mut(i));

        Ok(())
    }
}

/// Vertical unresize: whole-plane forward sweep followed by a backward sweep.
pub struct UnresizeV {
    context: BilinearContext,
    width: u32,
}

impl Filter for UnresizeV {
    fn flags(&self) -> FilterFlags {
        FilterFlags::HAS_STATE | FilterFlags::ENTIRE_ROW | FilterFlags::ENTIRE_PLANE
    }

    fn image_attributes(&self) -> ImageAttributes {
        ImageAttributes {
            width: self.width,
            height: self.context.output_width,
            pixel_type: PixelType::Float,
        }
    }

    fn required_row_range(&self, _i: u32) -> (u32, u32) {
        (0, self.context.input_width)
    }

    fn required_col_range(&self, _left: u32, _right: u32) -> (u32, u32) {
        (0, self.width)
    }

    fn simultaneous_lines(&self) -> u32 {
        self.context.output_width
    }

    fn max_buffering(&self) -> u32 {
        BUFFER_MAX
    }

    fn process(&self, _ctx: &mut [u8], src: &ImageBufferRef, dst: &ImageBufferMut, _tmp: &mut [u8], _i: u32, left: u32, right: u32) -> Result<()> {
        let src_buf = LineBuffer::<f32>::new(src.plane(0), self.width);
        let mut dst_buf = LineBufferMut::<f32>::new(dst.plane(0), self.width);
        let height = self.context.output_width;

        for i in 0..height {
            unresize_line_forward_v_f32(&self.context, &src_buf, &mut dst_buf, i, left, right);
        }
        for i in (1..=height).rev() {
            unresize_line_back_v_f32(&self.context, &mut dst_buf, i, left, right);
        }

        Ok(())
    }
}

fn create_unresize_pass(pixel_type: PixelType, horizontal: bool, src_width: u32, src_height: u32, dst_width: u32, dst_height: u32, shift: f64) -> Result<Box<dyn Filter>> {
    if pixel_type != PixelType::Float {
        return Err(unsupported_error!("pixel type not supported by unresize"));
    }

    if horizontal {
        let context = create_bilinear_context(dst_width, src_width, shift)?;
        Ok(Box::new(UnresizeH {
            context,
            height: dst_height,
        }))
    } else {
        let context = create_bilinear_context(dst_height, src_height, shift)?;
        Ok(Box::new(UnresizeV {
            context,
            width: dst_width,
        }))
    }
}

/// Create a filter recovering the original plane from a bilinear upscale.
///
/// The destination dimensions must not exceed the source dimensions; axis
/// order follows the same cost model as resize.
pub fn create_unresize(
    pixel_type: PixelType,
    src_width: u32,
    src_height: u32,
    dst_width: u32,
    dst_height: u32,
    shift_w: f64,
    shift_h: f64,
    _cpu: CpuFeatures,
) -> Result<Box<dyn Filter>> {
    let skip_h = src_width == dst_width && shift_w == 0.0;
    let skip_v = src_height == dst_height && shift_h == 0.0;

    if skip_h && skip_v {
        return Ok(Box::new(CopyFilter::new(src_width, src_height, pixel_type)));
    } else if skip_h {
        return create_unresize_pass(pixel_type, false, src_width, src_height, dst_width, dst_height, shift_h);
    } else if skip_v {
        return create_unresize_pass(pixel_type, true, src_width, src_height, dst_width, dst_height, shift_w);
    }

    let h_first = crate::resize::resize_h_first(dst_width as f64 / src_width as f64, dst_height as f64 / src_height as f64);
    debug!("2-D unresize {}x{} -> {}x{}, horizontal first: {}", src_width, src_height, dst_width, dst_height, h_first);

    let (stage1, stage2) = if h_first {
        (
            create_unresize_pass(pixel_type, true, src_width, src_height, dst_width, src_height, shift_w)?,
            create_unresize_pass(pixel_type, false, dst_width, src_height, dst_width, dst_height, shift_h)?,
        )
    } else {
        (
            create_unresize_pass(pixel_type, false, src_width, src_height, src_width, dst_height, shift_h)?,
            create_unresize_pass(pixel_type, true, src_width, dst_height, dst_width, dst_height, shift_w)?,
        )
    };

    Ok(Box::new(PairFilter::new(stage1, stage2)?))
}
