use bytemuck::{Pod, Zeroable};

use crate::{
    alloc::FakeAllocator,
    buffer::{select_buffer_mask, ImageBufferMut, ImageBufferRef, PlaneMut},
    filter::{Filter, FilterFlags, ImageAttributes, BUFFER_MAX},
    internal_error,
    utils::{align_to, floor_to, ALIGNMENT},
    Result,
};

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct PairState {
    cache_line_pos: u32,
    col_left: u32,
    col_right: u32,
    reserved: u32,
}

/// Chains two filters through an internal circular line cache.
///
/// The cache holds just enough rows of the first stage's output to satisfy
/// the second stage's row window; when the second stage is in-place the
/// destination doubles as the cache.
pub struct PairFilter {
    first: Box<dyn Filter>,
    second: Box<dyn Filter>,
    first_flags: FilterFlags,
    second_flags: FilterFlags,
    first_attr: ImageAttributes,
    second_attr: ImageAttributes,
    first_step: u32,
    second_step: u32,
    second_buffering: u32,
    has_state: bool,
    in_place: bool,
    color: bool,
}

impl PairFilter {
    pub fn new(first: Box<dyn Filter>, second: Box<dyn Filter>) -> Result<Self> {
        let first_flags = first.flags();
        let second_flags = second.flags();

        if first_flags.contains(FilterFlags::COLOR) != second_flags.contains(FilterFlags::COLOR) {
            return Err(internal_error!("filter pair must be both color or both grey"));
        }

        let first_attr = first.image_attributes();
        let second_attr = second.image_attributes();
        let first_step = first.simultaneous_lines();
        let second_step = second.simultaneous_lines();

        let has_state = first_flags.contains(FilterFlags::HAS_STATE)
            || second_flags.contains(FilterFlags::HAS_STATE)
            || !first_flags.contains(FilterFlags::SAME_ROW)
            || !second_flags.contains(FilterFlags::SAME_ROW)
            || first_step != second_step;
        let in_place = first_flags.contains(FilterFlags::IN_PLACE)
            && second_flags.contains(FilterFlags::IN_PLACE)
            && first_attr.pixel_type == second_attr.pixel_type;

        Ok(Self {
            second_buffering: second.max_buffering(),
            color: first_flags.contains(FilterFlags::COLOR),
            first,
            second,
            first_flags,
            second_flags,
            first_attr,
            second_attr,
            first_step,
            second_step,
            has_state,
            in_place,
        })
    }

    fn cache_stride(&self) -> usize {
        align_to(self.first_attr.width as usize * self.first_attr.pixel_type.size(), ALIGNMENT)
    }

    fn cache_line_count(&self) -> u32 {
        if self.second_flags.contains(FilterFlags::IN_PLACE) {
            0
        } else if self.first_flags.contains(FilterFlags::ENTIRE_PLANE) || self.second_flags.contains(FilterFlags::ENTIRE_PLANE) {
            self.first_attr.height
        } else if self.second_flags.contains(FilterFlags::SAME_ROW) && self.first_step == self.second_step {
            self.second_buffering
        } else {
            self.first_step + self.second_buffering - 1
        }
    }

    fn cache_rows_allocated(&self) -> u32 {
        let count = self.cache_line_count();
        if count == 0 {
            return 0;
        }

        let mask = select_buffer_mask(count);

        // Once the mask stops folding within the plane height, rows occupy
        // their absolute indices.
        if mask == u32::MAX || mask >= self.first_attr.height.saturating_sub(1) {
            self.first_attr.height
        } else {
            mask + 1
        }
    }

    fn cache_size_one_plane(&self) -> usize {
        self.cache_rows_allocated() as usize * self.cache_stride()
    }

    fn num_planes(&self) -> usize {
        if self.color {
            3
        } else {
            1
        }
    }

    fn carve<'a>(&self, ctx: &'a mut [u8]) -> (&'a mut PairState, &'a mut [u8], &'a mut [u8], [&'a mut [u8]; 3]) {
        let plane_size = align_to(self.cache_size_one_plane(), ALIGNMENT);
        let uv_plane_size = if self.num_planes() == 3 { plane_size } else { 0 };

        let (state, rest) = ctx.split_at_mut(align_to(std::mem::size_of::<PairState>(), ALIGNMENT));
        let (first_ctx, rest) = rest.split_at_mut(align_to(self.first.context_size(), ALIGNMENT));
        let (second_ctx, rest) = rest.split_at_mut(align_to(self.second.context_size(), ALIGNMENT));
        let (cache0, rest) = rest.split_at_mut(plane_size);
        let (cache1, rest) = rest.split_at_mut(uv_plane_size);
        let (cache2, _) = rest.split_at_mut(uv_plane_size);

        let state = &mut bytemuck::cast_slice_mut::<u8, PairState>(&mut state[..std::mem::size_of::<PairState>()])[0];

        (state, first_ctx, second_ctx, [cache0, cache1, cache2])
    }
}

impl Filter for PairFilter {
    fn flags(&self) -> FilterFlags {
        let mut flags = FilterFlags::empty();

        if self.has_state {
            flags |= FilterFlags::HAS_STATE;
        }
        if self.first_flags.contains(FilterFlags::SAME_ROW) && self.second_flags.contains(FilterFlags::SAME_ROW) {
            flags |= FilterFlags::SAME_ROW;
        }
        if self.in_place {
            flags |= FilterFlags::IN_PLACE;
        }
        if self.first_flags.contains(FilterFlags::ENTIRE_ROW) || self.second_flags.contains(FilterFlags::ENTIRE_ROW) {
            flags |= FilterFlags::ENTIRE_ROW;
        }
        if self.second_flags.contains(FilterFlags::ENTIRE_PLANE) {
            flags |= FilterFlags::ENTIRE_PLANE;
        }
        if self.color {
            flags |= FilterFlags::COLOR;
        }

        flags
    }

    fn image_attributes(&self) -> ImageAttributes {
        self.second_attr
    }

    fn required_row_range(&self, i: u32) -> (u32, u32) {
        let second_range = self.second.required_row_range(i);
        let top_range = self.first.required_row_range(floor_to(second_range.0, self.first_step));
        let bot_range = self.first.required_row_range(floor_to(second_range.1 - 1, self.first_step));

        (top_range.0, bot_range.1)
    }

    fn required_col_range(&self, left: u32, right: u32) -> (u32, u32) {
        let second_range = self.second.required_col_range(left, right);

        self.first.required_col_range(second_range.0, second_range.1)
    }

    fn simultaneous_lines(&self) -> u32 {
        self.second_step
    }

    fn max_buffering(&self) -> u32 {
        if self.first_flags.contains(FilterFlags::ENTIRE_PLANE) || self.second_flags.contains(FilterFlags::ENTIRE_PLANE) {
            return BUFFER_MAX;
        }

        let mut buffering = 0;
        let mut i = 0;

        while i < self.second_attr.height {
            let range = self.required_row_range(i);
            buffering = buffering.max(range.1 - range.0);
            i += self.second_step;
        }

        buffering
    }

    fn context_size(&self) -> usize {
        let mut alloc = FakeAllocator::new();

        alloc.allocate(std::mem::size_of::<PairState>());
        alloc.allocate(self.first.context_size());
        alloc.allocate(self.second.context_size());

        for _ in 0..self.num_planes() {
            alloc.allocate(self.cache_size_one_plane());
        }

        alloc.count()
    }

    fn tmp_size(&self, left: u32, right: u32) -> usize {
        let range = self.second.required_col_range(left, right);

        self.first.tmp_size(range.0, range.1).max(self.second.tmp_size(left, right))
    }

    fn init_context(&self, ctx: &mut [u8]) {
        let (state, first_ctx, second_ctx, _) = self.carve(ctx);

        *state = PairState::zeroed();

        self.first.init_context(first_ctx);
        self.second.init_context(second_ctx);
    }

    fn process(&self, ctx: &mut [u8], src: &ImageBufferRef, dst: &ImageBufferMut, tmp: &mut [u8], i: u32, left: u32, right: u32) -> Result<()> {
        let (state, first_ctx, second_ctx, caches) = self.carve(ctx);

        let row_range = self.second.required_row_range(i);
        let col_range = self.second.required_col_range(left, right);
        let cache_stride = self.cache_stride();
        let cache_mask = select_buffer_mask(self.cache_line_count());

        if left != state.col_left || right != state.col_right {
            state.col_left = left;
            state.col_right = right;
            state.cache_line_pos = if self.first_flags.contains(FilterFlags::HAS_STATE) {
                0
            } else {
                floor_to(row_range.0, self.first_step)
            };
        }

        let cache_buf = if self.second_flags.contains(FilterFlags::IN_PLACE) {
            *dst
        } else {
            let [cache0, cache1, cache2] = caches;
            ImageBufferMut::new([
                PlaneMut::from_slice_masked(cache0, cache_stride, cache_mask),
                PlaneMut::from_slice_masked(cache1, cache_stride, cache_mask),
                PlaneMut::from_slice_masked(cache2, cache_stride, cache_mask),
            ])
        };

        while state.cache_line_pos < row_range.1 {
            self.first.process(first_ctx, src, &cache_buf, tmp, state.cache_line_pos, col_range.0, col_range.1)?;
            state.cache_line_pos += self.first_step;
        }

        self.second.process(second_ctx, &cache_buf.as_ref(), dst, tmp, i, left, right)
    }
}
