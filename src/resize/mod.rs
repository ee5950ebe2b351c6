mod kernel;

pub use kernel::{BicubicKernel, BilinearKernel, LanczosKernel, PointKernel, ResampleKernel, Spline16Kernel, Spline36Kernel};

use log::debug;

use self::kernel::{compute_filter, FilterContext};
use crate::{
    buffer::{ImageBufferMut, ImageBufferRef, LineBuffer, LineBufferMut},
    cpu::CpuFeatures,
    filter::{CopyFilter, Filter, FilterFlags, ImageAttributes, BUFFER_MAX},
    graph::PairFilter,
    pixel::PixelType,
    unsupported_error, Result,
};

fn unpack_pixel_u16(x: u16) -> i32 {
    x as i32 + i32::from(i16::MIN)
}

fn pack_pixel_u16(x: i32, pixel_max: i32) -> u16 {
    let x = ((x + (1 << 13)) >> 14) - i32::from(i16::MIN);

    x.clamp(0, pixel_max) as u16
}

fn resize_line_h_u16(filter: &FilterContext, src: &[u16], dst: &mut [u16], left: u32, right: u32, pixel_max: i32) {
    for j in left as usize..right as usize {
        let top = filter.left[j] as usize;
        let mut accum = 0i32;

        for k in 0..filter.filter_width as usize {
            let coeff = filter.data_i16[j * filter.stride_i16 as usize + k] as i32;
            accum += coeff * unpack_pixel_u16(src[top + k]);
        }

        dst[j] = pack_pixel_u16(accum, pixel_max);
    }
}

fn resize_line_h_f32(filter: &FilterContext, src: &[f32], dst: &mut [f32], left: u32, right: u32) {
    for j in left as usize..right as usize {
        let top = filter.left[j] as usize;
        let mut accum = 0.0f32;

        for k in 0..filter.filter_width as usize {
            accum += filter.data[j * filter.stride as usize + k] * src[top + k];
        }

        dst[j] = accum;
    }
}

fn resize_line_v_u16(filter: &FilterContext, src: &LineBuffer<'_, u16>, dst: &mut LineBufferMut<'_, u16>, i: u32, left: u32, right: u32, pixel_max: i32) {
    let coeffs = &filter.data_i16[i as usize * filter.stride_i16 as usize..];
    let top = filter.left[i as usize];

    for j in left as usize..right as usize {
        let mut accum = 0i32;

        for k in 0..filter.filter_width as usize {
            accum += coeffs[k] as i32 * unpack_pixel_u16(src.row(top + k as u32)[j]);
        }

        dst.row_mut(i)[j] = pack_pixel_u16(accum, pixel_max);
    }
}

fn resize_line_v_f32(filter: &FilterContext, src: &LineBuffer<'_, f32>, dst: &mut LineBufferMut<'_, f32>, i: u32, left: u32, right: u32) {
    let coeffs = &filter.data[i as usize * filter.stride as usize..];
    let top = filter.left[i as usize];

    for j in left as usize..right as usize {
        let mut accum = 0.0f32;

        for k in 0..filter.filter_width as usize {
            accum += coeffs[k] * src.row(top + k as u32)[j];
        }

        dst.row_mut(i)[j] = accum;
    }
}

/// Horizontal resampling pass.
pub struct ResizeH {
    filter: FilterContext,
    height: u32,
    pixel_type: PixelType,
    pixel_max: i32,
    is_sorted: bool,
}

impl ResizeH {
    fn new(filter: FilterContext, height: u32, pixel_type: PixelType, depth: u32) -> Result<Self> {
        if pixel_type != PixelType::Word && pixel_type != PixelType::Float {
            return Err(unsupported_error!("pixel type not supported by resampler"));
        }

        let is_sorted = filter.left.windows(2).all(|w| w[0] <= w[1]);

        Ok(Self {
            filter,
            height,
            pixel_type,
            pixel_max: ((1u32 << depth) - 1) as i32,
            is_sorted,
        })
    }
}

impl Filter for ResizeH {
    fn flags(&self) -> FilterFlags {
        let mut flags = FilterFlags::SAME_ROW;

        if !self.is_sorted {
            flags |= FilterFlags::ENTIRE_ROW;
        }
        flags
    }

    fn image_attributes(&self) -> ImageAttributes {
        ImageAttributes {
            width: self.filter.filter_rows,
            height: self.height,
            pixel_type: self.pixel_type,
        }
    }

    fn required_col_range(&self, left: u32, right: u32) -> (u32, u32) {
        if self.is_sorted {
            (self.filter.left[left as usize], self.filter.left[right as usize - 1] + self.filter.filter_width)
        } else {
            (0, self.filter.input_width)
        }
    }

    fn process(&self, _ctx: &mut [u8], src: &ImageBufferRef, dst: &ImageBufferMut, _tmp: &mut [u8], i: u32, left: u32, right: u32) -> Result<()> {
        if self.pixel_type == PixelType::Word {
            let src_buf = LineBuffer::<u16>::new(src.plane(0), self.filter.input_width);
            let mut dst_buf = LineBufferMut::<u16>::new(dst.plane(0), self.filter.filter_rows);

            resize_line_h_u16(&self.filter, src_buf.row(i), dst_buf.row_mut(i), left, right, self.pixel_max);
        } else {
            let src_buf = LineBuffer::<f32>::new(src.plane(0), self.filter.input_width);
            let mut dst_buf = LineBufferMut::<f32>::new(dst.plane(0), self.filter.filter_rows);

            resize_line_h_f32(&self.filter, src_buf.row(i), dst_buf.row_mut(i), left, right);
        }

        Ok(())
    }
}

/// Vertical resampling pass.
pub struct ResizeV {
    filter: FilterContext,
    width: u32,
    pixel_type: PixelType,
    pixel_max: i32,
    is_sorted: bool,
}

impl ResizeV {
    fn new(filter: FilterContext, width: u32, pixel_type: PixelType, depth: u32) -> Result<Self> {
        if pixel_type != PixelType::Word && pixel_type != PixelType::Float {
            return Err(unsupported_error!("pixel type not supported by resampler"));
        }

        let is_sorted = filter.left.windows(2).all(|w| w[0] <= w[1]);

        Ok(Self {
            filter,
            width,
            pixel_type,
            pixel_max: ((1u32 << depth) - 1) as i32,
            is_sorted,
        })
    }
}

impl Filter for ResizeV {
    fn flags(&self) -> FilterFlags {
        let mut flags = FilterFlags::empty();

        if !self.is_sorted {
            flags |= FilterFlags::ENTIRE_ROW | FilterFlags::ENTIRE_PLANE;
        }
        flags
    }

    fn image_attributes(&self) -> ImageAttributes {
        ImageAttributes {
            width: self.width,
            height: self.filter.filter_rows,
            pixel_type: self.pixel_type,
        }
    }

    fn required_row_range(&self, i: u32) -> (u32, u32) {
        if self.is_sorted {
            let top = self.filter.left[i as usize];
            (top, top + self.filter.filter_width)
        } else {
            (0, self.filter.input_width)
        }
    }

    fn simultaneous_lines(&self) -> u32 {
        if self.is_sorted {
            1
        } else {
            self.filter.filter_rows
        }
    }

    fn max_buffering(&self) -> u32 {
        if self.is_sorted {
            self.filter.filter_width
        } else {
            BUFFER_MAX
        }
    }

    fn process(&self, _ctx: &mut [u8], src: &ImageBufferRef, dst: &ImageBufferMut, _tmp: &mut [u8], i: u32, left: u32, right: u32) -> Result<()> {
        let rows = if self.is_sorted { i..i + 1 } else { 0..self.filter.filter_rows };

        if self.pixel_type == PixelType::Word {
            let src_buf = LineBuffer::<u16>::new(src.plane(0), self.width);
            let mut dst_buf = LineBufferMut::<u16>::new(dst.plane(0), self.width);

            for n in rows {
                resize_line_v_u16(&self.filter, &src_buf, &mut dst_buf, n, left, right, self.pixel_max);
            }
        } else {
            let src_buf = LineBuffer::<f32>::new(src.plane(0), self.width);
            let mut dst_buf = LineBufferMut::<f32>::new(dst.plane(0), self.width);

            for n in rows {
                resize_line_v_f32(&self.filter, &src_buf, &mut dst_buf, n, left, right);
            }
        }

        Ok(())
    }
}

// Downscaling cost follows the input, upscaling cost the output; horizontal
// passes cost roughly twice a vertical pass on vector units.
pub(crate) fn resize_h_first(xscale: f64, yscale: f64) -> bool {
    let h_first_cost = xscale.max(1.0) * 2.0 + xscale * yscale.max(1.0);
    let v_first_cost = yscale.max(1.0) + yscale * xscale.max(1.0) * 2.0;

    h_first_cost < v_first_cost
}

fn create_resize_pass(
    kernel: &dyn ResampleKernel,
    pixel_type: PixelType,
    horizontal: bool,
    depth: u32,
    src_width: u32,
    src_height: u32,
    dst_width: u32,
    dst_height: u32,
    shift: f64,
    subwidth: f64,
) -> Result<Box<dyn Filter>> {
    let src_dim = if horizontal { src_width } else { src_height };
    let dst_dim = if horizontal { dst_width } else { dst_height };

    let filter = compute_filter(kernel, src_dim, dst_dim, shift, subwidth)?;

    if horizontal {
        Ok(Box::new(ResizeH::new(filter, dst_height, pixel_type, depth)?))
    } else {
        Ok(Box::new(ResizeV::new(filter, dst_width, pixel_type, depth)?))
    }
}

/// Create a separable resize from one plane geometry to another.
///
/// Passes that change nothing on their axis are skipped; when both axes run,
/// the cheaper order is selected and the passes are chained through a
/// [`PairFilter`].
#[allow(clippy::too_many_arguments)]
pub fn create_resize_filter(
    kernel: &dyn ResampleKernel,
    pixel_type: PixelType,
    depth: u32,
    src_width: u32,
    src_height: u32,
    dst_width: u32,
    dst_height: u32,
    shift_w: f64,
    shift_h: f64,
    subwidth: f64,
    subheight: f64,
    _cpu: CpuFeatures,
) -> Result<Box<dyn Filter>> {
    let skip_h = src_width == dst_width && shift_w == 0.0 && subwidth == src_width as f64;
    let skip_v = src_height == dst_height && shift_h == 0.0 && subheight == src_height as f64;

    if skip_h && skip_v {
        return Ok(Box::new(CopyFilter::new(src_width, src_height, pixel_type)));
    } else if skip_h {
        return create_resize_pass(kernel, pixel_type, false, depth, src_width, src_height, dst_width, dst_height, shift_h, subheight);
    } else if skip_v {
        return create_resize_pass(kernel, pixel_type, true, depth, src_width, src_height, dst_width, dst_height, shift_w, subwidth);
    }

    let h_first = resize_h_first(dst_width as f64 / src_width as f64, dst_height as f64 / src_height as f64);
    debug!("2-D resize {}x{} -> {}x{}, horizontal first: {}", src_width, src_height, dst_width, dst_height, h_first);

    let (stage1, stage2) = if h_first {
        (
            create_resize_pass(kernel, pixel_type, true, depth, src_width, src_height, dst_width, src_height, shift_w, subwidth)?,
            create_resize_pass(kernel, pixel_type, false, depth, dst_width, src_height, dst_width, dst_height, shift_h, subheight)?,
        )
    } else {
        (
            create_resize_pass(kernel, pixel_type, false, depth, src_width, src_height, src_width, dst_height, shift_h, subheight)?,
            create_resize_pass(kernel, pixel_type, true, depth, src_width, dst_height, dst_width, dst_height, shift_w, subwidth)?,
        )
    };

    Ok(Box::new(PairFilter::new(stage1, stage2)?))
}
