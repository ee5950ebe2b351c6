use bitflags::bitflags;

use crate::{
    buffer::{copy_buffer_lines, ImageBufferMut, ImageBufferRef, LineBuffer, LineBufferMut},
    pixel::PixelType,
    Result,
};

/// Line count sentinel for filters that buffer an entire plane.
pub const BUFFER_MAX: u32 = u32::MAX;

bitflags! {
    /// Static behavior of a filter.
    ///
    /// `ENTIRE_PLANE` implies `ENTIRE_ROW` and unbounded buffering;
    /// `IN_PLACE` implies `SAME_ROW`; `COLOR` filters read and write three
    /// planes together.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct FilterFlags: u32 {
        const HAS_STATE    = 1 << 0;
        const SAME_ROW     = 1 << 1;
        const IN_PLACE     = 1 << 2;
        const ENTIRE_ROW   = 1 << 3;
        const ENTIRE_PLANE = 1 << 4;
        const COLOR        = 1 << 5;
    }
}

/// Dimensions and sample type of a filter's output.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ImageAttributes {
    pub width: u32,
    pub height: u32,
    pub pixel_type: PixelType,
}

/// One stage of an image processing graph.
///
/// Filters are immutable once constructed; per-frame state lives in the
/// caller-provided context arena and scratch in the per-call `tmp` arena,
/// both subdivided at the crate alignment.
///
/// A stateful filter must be driven with monotonically non-decreasing `i`
/// and a constant `(left, right)` within one frame; re-initializing the
/// context resets it.
pub trait Filter: Send + Sync {
    fn flags(&self) -> FilterFlags;

    fn image_attributes(&self) -> ImageAttributes;

    /// Input rows needed to produce output rows `[i, i + step)`.
    /// Both endpoints are monotone non-decreasing in `i`.
    fn required_row_range(&self, i: u32) -> (u32, u32) {
        (i, i + 1)
    }

    /// Input columns needed to produce output columns `[left, right)`.
    fn required_col_range(&self, left: u32, right: u32) -> (u32, u32) {
        (left, right)
    }

    /// Number of output rows produced per `process` call.
    fn simultaneous_lines(&self) -> u32 {
        1
    }

    /// Worst-case input row span over all output positions.
    fn max_buffering(&self) -> u32 {
        1
    }

    fn context_size(&self) -> usize {
        0
    }

    fn tmp_size(&self, _left: u32, _right: u32) -> usize {
        0
    }

    fn init_context(&self, _ctx: &mut [u8]) {}

    /// Produce output rows `[i, i + step)` in columns `[left, right)`.
    fn process(&self, ctx: &mut [u8], src: &ImageBufferRef, dst: &ImageBufferMut, tmp: &mut [u8], i: u32, left: u32, right: u32) -> Result<()>;
}

/// Filter that forwards its input unchanged.
pub struct CopyFilter {
    width: u32,
    height: u32,
    pixel_type: PixelType,
}

impl CopyFilter {
    pub fn new(width: u32, height: u32, pixel_type: PixelType) -> Self {
        Self {
            width,
            height,
            pixel_type,
        }
    }
}

impl Filter for CopyFilter {
    fn flags(&self) -> FilterFlags {
        FilterFlags::SAME_ROW | FilterFlags::IN_PLACE
    }

    fn image_attributes(&self) -> ImageAttributes {
        ImageAttributes {
            width: self.width,
            height: self.height,
            pixel_type: self.pixel_type,
        }
    }

    fn process(&self, _ctx: &mut [u8], src: &ImageBufferRef, dst: &ImageBufferMut, _tmp: &mut [u8], i: u32, left: u32, right: u32) -> Result<()> {
        let size = self.pixel_type.size();
        let src_buf = LineBuffer::<u8>::new(src.plane(0), self.width * size as u32);
        let mut dst_buf = LineBufferMut::<u8>::new(dst.plane(0), self.width * size as u32);

        if src_buf.row(i).as_ptr() != dst_buf.row(i).as_ptr() {
            copy_buffer_lines(&src_buf, &mut dst_buf, i, i + 1, left as usize * size, right as usize * size);
        }

        Ok(())
    }
}
