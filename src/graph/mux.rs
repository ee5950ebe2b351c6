use crate::{
    alloc::FakeAllocator,
    buffer::{ImageBufferMut, ImageBufferRef},
    filter::{Filter, FilterFlags, ImageAttributes},
    internal_error,
    utils::{align_to, ALIGNMENT},
    Result,
};

/// Runs a greyscale filter across the three planes of a color image.
///
/// A separate chroma filter may be supplied when the chroma planes need a
/// variant of the operation; it must agree with the luma filter on output
/// attributes, step, and input row/column ranges.
pub struct MuxFilter {
    filter: Box<dyn Filter>,
    filter_uv: Option<Box<dyn Filter>>,
    flags: FilterFlags,
}

impl MuxFilter {
    pub fn new(filter: Box<dyn Filter>, filter_uv: Option<Box<dyn Filter>>) -> Result<Self> {
        let filter_flags = filter.flags();
        let filter_flags_uv = filter_uv.as_ref().map(|f| f.flags()).unwrap_or(filter_flags);

        if filter_flags.contains(FilterFlags::COLOR) || filter_flags_uv.contains(FilterFlags::COLOR) {
            return Err(internal_error!("can not mux color filters"));
        }

        if let Some(filter_uv) = &filter_uv {
            let attr = filter.image_attributes();
            let step = filter.simultaneous_lines();

            if filter_uv.image_attributes() != attr {
                return Err(internal_error!("can not mux filters with differing output formats"));
            }
            if filter_uv.simultaneous_lines() != step {
                return Err(internal_error!("chroma filter must produce the same number of lines"));
            }

            let mut i = 0;
            while i < attr.height {
                if filter.required_row_range(i) != filter_uv.required_row_range(i) {
                    return Err(internal_error!("chroma filter must operate on the same row range"));
                }
                i += step;
            }
            for j in 0..attr.width {
                if filter.required_col_range(j, j + 1) != filter_uv.required_col_range(j, j + 1) {
                    return Err(internal_error!("chroma filter must operate on the same column range"));
                }
            }
        }

        let mut flags = FilterFlags::COLOR;

        if filter_flags.contains(FilterFlags::HAS_STATE) || filter_flags_uv.contains(FilterFlags::HAS_STATE) {
            flags |= FilterFlags::HAS_STATE;
        }
        if filter_flags.contains(FilterFlags::SAME_ROW) && filter_flags_uv.contains(FilterFlags::SAME_ROW) {
            flags |= FilterFlags::SAME_ROW;
        }
        if filter_flags.contains(FilterFlags::IN_PLACE) && filter_flags_uv.contains(FilterFlags::IN_PLACE) {
            flags |= FilterFlags::IN_PLACE;
        }
        if filter_flags.contains(FilterFlags::ENTIRE_ROW) || filter_flags_uv.contains(FilterFlags::ENTIRE_ROW) {
            flags |= FilterFlags::ENTIRE_ROW;
        }
        if filter_flags.contains(FilterFlags::ENTIRE_PLANE) || filter_flags_uv.contains(FilterFlags::ENTIRE_PLANE) {
            flags |= FilterFlags::ENTIRE_PLANE;
        }

        Ok(Self {
            filter,
            filter_uv,
            flags,
        })
    }

    fn context_size_uv(&self) -> usize {
        self.filter_uv.as_ref().map(|f| f.context_size()).unwrap_or_else(|| self.filter.context_size())
    }

    fn plane_filter(&self, p: usize) -> &dyn Filter {
        match (&self.filter_uv, p) {
            (Some(filter_uv), 1 | 2) => filter_uv.as_ref(),
            _ => self.filter.as_ref(),
        }
    }

    fn carve<'a>(&self, ctx: &'a mut [u8]) -> [&'a mut [u8]; 3] {
        let size = align_to(self.filter.context_size(), ALIGNMENT);
        let size_uv = align_to(self.context_size_uv(), ALIGNMENT);

        let (ctx0, rest) = ctx.split_at_mut(size);
        let (ctx1, rest) = rest.split_at_mut(size_uv);
        let (ctx2, _) = rest.split_at_mut(size_uv);

        [ctx0, ctx1, ctx2]
    }
}

impl Filter for MuxFilter {
    fn flags(&self) -> FilterFlags {
        self.flags
    }

    fn image_attributes(&self) -> ImageAttributes {
        self.filter.image_attributes()
    }

    fn required_row_range(&self, i: u32) -> (u32, u32) {
        self.filter.required_row_range(i)
    }

    fn required_col_range(&self, left: u32, right: u32) -> (u32, u32) {
        self.filter.required_col_range(left, right)
    }

    fn simultaneous_lines(&self) -> u32 {
        self.filter.simultaneous_lines()
    }

    fn max_buffering(&self) -> u32 {
        self.filter.max_buffering()
    }

    fn context_size(&self) -> usize {
        let mut alloc = FakeAllocator::new();

        alloc.allocate(self.filter.context_size());
        alloc.allocate(self.context_size_uv());
        alloc.allocate(self.context_size_uv());

        alloc.count()
    }

    fn tmp_size(&self, left: u32, right: u32) -> usize {
        let tmp_size = self.filter.tmp_size(left, right);
        let tmp_size_uv = self.filter_uv.as_ref().map(|f| f.tmp_size(left, right)).unwrap_or(tmp_size);

        tmp_size.max(tmp_size_uv)
    }

    fn init_context(&self, ctx: &mut [u8]) {
        let [ctx0, ctx1, ctx2] = self.carve(ctx);

        self.filter.init_context(ctx0);
        self.plane_filter(1).init_context(ctx1);
        self.plane_filter(2).init_context(ctx2);
    }

    fn process(&self, ctx: &mut [u8], src: &ImageBufferRef, dst: &ImageBufferMut, tmp: &mut [u8], i: u32, left: u32, right: u32) -> Result<()> {
        let contexts = self.carve(ctx);

        for (p, plane_ctx) in contexts.into_iter().enumerate() {
            let src_p = src.select_plane(p);
            let dst_p = dst.select_plane(p);

            self.plane_filter(p).process(plane_ctx, &src_p, &dst_p, tmp, i, left, right)?;
        }

        Ok(())
    }
}
