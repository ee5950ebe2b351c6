mod builder;
mod mux;
mod pair;

pub use builder::{GraphParams, ResampleFilter};
pub use mux::MuxFilter;
pub use pair::PairFilter;

use smallvec::SmallVec;

use crate::{
    alloc::{FakeAllocator, LinearAllocator},
    buffer::{select_buffer_mask, ImageBufferMut, ImageBufferRef, PlaneMut, PlaneRef},
    error::Error,
    filter::{CopyFilter, Filter, FilterFlags, ImageAttributes, BUFFER_MAX},
    illegal_argument_error, internal_error,
    pixel::PixelType,
    unsupported_error,
    utils::{align_to, ALIGNMENT},
    Result,
};

/// Callback reading or writing image rows on behalf of the caller.
///
/// Invoked as `cb(i, left, right)` where `i` is the first row of the group;
/// an `Err` return aborts processing.
pub type GraphCallback<'a> = &'a mut dyn FnMut(u32, u32, u32) -> std::result::Result<(), ()>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum StagePlanes {
    /// Three planes processed atomically.
    Color,
    /// Plane 0 only.
    Luma,
    /// Planes 1 and 2, one pass each with separate contexts.
    Chroma,
}

struct Stage {
    filter: Box<dyn Filter>,
    planes: StagePlanes,
}

#[derive(Clone, Copy)]
struct CacheSpec {
    mask: u32,
    rows: u32,
    stride: usize,
}

impl CacheSpec {
    fn bytes(&self) -> usize {
        self.rows as usize * self.stride
    }
}

#[derive(Clone, Copy, Default)]
struct StagePlan {
    pred_luma: Option<usize>,
    pred_chroma: Option<usize>,
    out_width: u32,
    out_height: u32,
    in_height: u32,
    step: u32,
    luma_cache: Option<CacheSpec>,
    chroma_cache: Option<CacheSpec>,
}

/// A linear chain of filters converting a source image into a target image.
///
/// The graph pulls scanlines through per-stage circular caches sized by each
/// stage's row window, so memory follows the filter support rather than the
/// image height. Build one with [`FilterGraph::build`] or assemble stages by
/// hand with `attach_filter` / `attach_filter_uv`.
pub struct FilterGraph {
    src_width: u32,
    src_height: u32,
    subsample_w: u32,
    subsample_h: u32,
    color: bool,
    stages: Vec<Stage>,
    luma_path: SmallVec<[usize; 8]>,
    chroma_path: SmallVec<[usize; 8]>,
    luma_attr: ImageAttributes,
    chroma_attr: ImageAttributes,
    subsample_w_out: u32,
    subsample_h_out: u32,
    plans: Vec<StagePlan>,
    completed: bool,
}

impl std::fmt::Debug for FilterGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterGraph")
            .field("src_width", &self.src_width)
            .field("src_height", &self.src_height)
            .field("completed", &self.completed)
            .finish_non_exhaustive()
    }
}

impl FilterGraph {
    pub fn new(width: u32, height: u32, pixel_type: PixelType, subsample_w: u32, subsample_h: u32, color: bool) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(illegal_argument_error!("image dimension must be non-zero"));
        }
        if subsample_w > 2 || subsample_h > 2 {
            return Err(unsupported_error!("subsampling factor too great"));
        }
        if width % (1 << subsample_w) != 0 || height % (1 << subsample_h) != 0 {
            return Err(illegal_argument_error!("image dimension not divisible by subsampling factor"));
        }
        if (width as u64) * (height as u64) * (pixel_type.size() as u64) > i32::MAX as u64 {
            return Err(illegal_argument_error!("image size exceeds limits"));
        }

        let luma_attr = ImageAttributes {
            width,
            height,
            pixel_type,
        };
        let chroma_attr = ImageAttributes {
            width: width >> subsample_w,
            height: height >> subsample_h,
            pixel_type,
        };

        Ok(Self {
            src_width: width,
            src_height: height,
            subsample_w,
            subsample_h,
            color,
            stages: Vec::new(),
            luma_path: SmallVec::new(),
            chroma_path: SmallVec::new(),
            luma_attr,
            chroma_attr,
            subsample_w_out: 0,
            subsample_h_out: 0,
            plans: Vec::new(),
            completed: false,
        })
    }

    /// Append a filter processing the luma plane, or all three planes for a
    /// `COLOR` filter.
    pub fn attach_filter(&mut self, filter: Box<dyn Filter>) -> Result<()> {
        if self.completed {
            return Err(internal_error!("graph already completed"));
        }

        let attr = filter.image_attributes();
        let idx = self.stages.len();

        if filter.flags().contains(FilterFlags::COLOR) {
            if !self.color {
                return Err(internal_error!("cannot use color filter in greyscale graph"));
            }

            self.stages.push(Stage {
                filter,
                planes: StagePlanes::Color,
            });
            self.luma_path.push(idx);
            self.chroma_path.push(idx);
            self.luma_attr = attr;
            self.chroma_attr = attr;
        } else {
            self.stages.push(Stage {
                filter,
                planes: StagePlanes::Luma,
            });
            self.luma_path.push(idx);
            self.luma_attr = attr;
        }

        Ok(())
    }

    /// Append a filter processing both chroma planes.
    pub fn attach_filter_uv(&mut self, filter: Box<dyn Filter>) -> Result<()> {
        if self.completed {
            return Err(internal_error!("graph already completed"));
        }
        if !self.color {
            return Err(internal_error!("cannot attach chroma filter in greyscale graph"));
        }
        if filter.flags().contains(FilterFlags::COLOR) {
            return Err(internal_error!("chroma filter cannot be a color filter"));
        }

        let attr = filter.image_attributes();
        let idx = self.stages.len();

        self.stages.push(Stage {
            filter,
            planes: StagePlanes::Chroma,
        });
        self.chroma_path.push(idx);
        self.chroma_attr = attr;

        Ok(())
    }

    /// Finish construction: pad empty chains with copies and size the
    /// inter-stage caches.
    pub fn complete(&mut self) -> Result<()> {
        if self.completed {
            return Err(internal_error!("graph already completed"));
        }

        if self.color && self.luma_path.is_empty() && self.chroma_path.is_empty() && self.luma_attr == self.chroma_attr {
            let copy = CopyFilter::new(self.luma_attr.width, self.luma_attr.height, self.luma_attr.pixel_type);
            self.attach_filter(Box::new(MuxFilter::new(Box::new(copy), None)?))?;
        }
        if self.luma_path.is_empty() {
            let copy = CopyFilter::new(self.luma_attr.width, self.luma_attr.height, self.luma_attr.pixel_type);
            self.attach_filter(Box::new(copy))?;
        }
        if self.color && self.chroma_path.is_empty() {
            let copy = CopyFilter::new(self.chroma_attr.width, self.chroma_attr.height, self.chroma_attr.pixel_type);
            self.attach_filter_uv(Box::new(copy))?;
        }

        if self.color {
            let ratio_w = self.luma_attr.width / self.chroma_attr.width.max(1);
            let ratio_h = self.luma_attr.height / self.chroma_attr.height.max(1);

            self.subsample_w_out = match ratio_w {
                1 => 0,
                2 => 1,
                4 => 2,
                _ => return Err(internal_error!("output chroma width is not a binary fraction of luma")),
            };
            self.subsample_h_out = match ratio_h {
                1 => 0,
                2 => 1,
                4 => 2,
                _ => return Err(internal_error!("output chroma height is not a binary fraction of luma")),
            };
        }

        self.plans = self.build_plans();
        self.completed = true;

        Ok(())
    }

    fn effective_step(filter: &dyn Filter, height: u32) -> u32 {
        if filter.flags().contains(FilterFlags::ENTIRE_PLANE) {
            height
        } else {
            filter.simultaneous_lines()
        }
    }

    fn cache_spec(&self, s: usize, d: usize, out_width: u32, out_height: u32, pixel_size: usize) -> CacheSpec {
        let s_filter = &self.stages[s].filter;
        let d_filter = &self.stages[d].filter;
        let s_flags = s_filter.flags();
        let d_flags = d_filter.flags();
        let s_step = Self::effective_step(s_filter.as_ref(), out_height);

        let count = if s_flags.contains(FilterFlags::ENTIRE_PLANE) || d_flags.contains(FilterFlags::ENTIRE_PLANE) {
            out_height
        } else if d_flags.contains(FilterFlags::SAME_ROW) && s_step == d_filter.simultaneous_lines() {
            d_filter.max_buffering()
        } else {
            s_step + d_filter.max_buffering() - 1
        };
        let count = count.min(out_height);

        let mask = select_buffer_mask(count);
        let rows = if mask == u32::MAX || mask >= out_height.saturating_sub(1) {
            out_height
        } else {
            mask + 1
        };

        CacheSpec {
            mask,
            rows,
            stride: align_to(out_width as usize * pixel_size, ALIGNMENT),
        }
    }

    fn build_plans(&self) -> Vec<StagePlan> {
        let mut plans: Vec<StagePlan> = self.stages.iter().map(|_| StagePlan::default()).collect();

        for (pos, &idx) in self.luma_path.iter().enumerate() {
            let attr = self.stages[idx].filter.image_attributes();
            let plan = &mut plans[idx];

            plan.pred_luma = if pos > 0 { Some(self.luma_path[pos - 1]) } else { None };
            plan.out_width = attr.width;
            plan.out_height = attr.height;
            plan.step = Self::effective_step(self.stages[idx].filter.as_ref(), attr.height);
            plan.in_height = match plan.pred_luma {
                Some(pred) => self.stages[pred].filter.image_attributes().height,
                None => self.src_height,
            };
        }

        for (pos, &idx) in self.chroma_path.iter().enumerate() {
            let attr = self.stages[idx].filter.image_attributes();
            let pred = if pos > 0 { Some(self.chroma_path[pos - 1]) } else { None };
            let in_height = match pred {
                Some(pred) => self.stages[pred].filter.image_attributes().height,
                None => self.src_height >> self.subsample_h,
            };
            let plan = &mut plans[idx];

            plan.pred_chroma = pred;
            if self.stages[idx].planes == StagePlanes::Chroma {
                plan.out_width = attr.width;
                plan.out_height = attr.height;
                plan.step = Self::effective_step(self.stages[idx].filter.as_ref(), attr.height);
                plan.in_height = in_height;
            }
        }

        for w in self.luma_path.windows(2) {
            let (s, d) = (w[0], w[1]);
            let (width, height, size) = (plans[s].out_width, plans[s].out_height, self.stages[s].filter.image_attributes().pixel_type.size());
            plans[s].luma_cache = Some(self.cache_spec(s, d, width, height, size));
        }
        for w in self.chroma_path.windows(2) {
            let (s, d) = (w[0], w[1]);
            // Color stages emit 4:4:4 chroma at luma geometry.
            let attr = self.stages[s].filter.image_attributes();
            plans[s].chroma_cache = Some(self.cache_spec(s, d, attr.width, attr.height, attr.pixel_type.size()));
        }

        plans
    }

    fn ensure_completed(&self) -> Result<()> {
        if !self.completed {
            return Err(internal_error!("graph not completed"));
        }
        Ok(())
    }

    fn scratch_size(&self) -> usize {
        let mut size = 0;

        for (stage, plan) in self.stages.iter().zip(&self.plans) {
            size = size.max(stage.filter.tmp_size(0, plan.out_width));
        }
        size
    }

    /// Size of the temporary buffer required by [`FilterGraph::process`].
    pub fn tmp_size(&self) -> Result<usize> {
        self.ensure_completed()?;

        let mut alloc = FakeAllocator::new();

        for stage in &self.stages {
            alloc.allocate(stage.filter.context_size());
            if stage.planes == StagePlanes::Chroma {
                alloc.allocate(stage.filter.context_size());
            }
        }
        for plan in &self.plans {
            if let Some(cache) = plan.luma_cache {
                alloc.allocate(cache.bytes());
            }
            if let Some(cache) = plan.chroma_cache {
                alloc.allocate(cache.bytes());
                alloc.allocate(cache.bytes());
            }
        }
        alloc.allocate(self.scratch_size());

        Ok(alloc.count())
    }

    /// Lines of the source image the caller must keep addressable when
    /// feeding the graph through a circular buffer.
    pub fn input_buffering(&self) -> Result<u32> {
        self.ensure_completed()?;

        let first_luma = &self.stages[self.luma_path[0]].filter;
        let mut lines = match first_luma.max_buffering() {
            BUFFER_MAX => self.src_height,
            n => n,
        };

        if self.color {
            let first_chroma = &self.stages[self.chroma_path[0]].filter;
            let chroma_lines = match first_chroma.max_buffering() {
                BUFFER_MAX => self.src_height,
                n => (n << self.subsample_h).min(self.src_height),
            };
            lines = lines.max(chroma_lines);
        }

        Ok(lines.min(self.src_height))
    }

    /// Lines of the destination image produced per output group.
    pub fn output_buffering(&self) -> Result<u32> {
        self.ensure_completed()?;
        Ok(self.output_group())
    }

    fn output_group(&self) -> u32 {
        let out_height = self.luma_attr.height;
        let base = 1u32 << self.subsample_h_out;

        let luma_sink = &self.stages[*self.luma_path.last().unwrap()].filter;
        let mut group = Self::effective_step(luma_sink.as_ref(), out_height);

        if self.color {
            let chroma_sink = &self.stages[*self.chroma_path.last().unwrap()].filter;
            let chroma_step = Self::effective_step(chroma_sink.as_ref(), self.chroma_attr.height);
            group = group.max(chroma_step << self.subsample_h_out);
        }

        align_to(group.max(base), base).min(align_to(out_height, base))
    }

    /// Run the graph over one frame.
    ///
    /// `tmp` must be at least [`FilterGraph::tmp_size`] bytes and aligned to
    /// the crate alignment. The unpack callback is invoked before source
    /// rows are first read; the pack callback after each output group is
    /// written. Either callback may abort processing by returning `Err`.
    pub fn process(
        &self,
        src: &ImageBufferRef,
        dst: &ImageBufferMut,
        tmp: &mut [u8],
        unpack_cb: Option<GraphCallback>,
        mut pack_cb: Option<GraphCallback>,
    ) -> Result<()> {
        self.ensure_completed()?;

        if tmp.len() < self.tmp_size()? {
            return Err(illegal_argument_error!("temporary buffer too small"));
        }

        let mut alloc = LinearAllocator::new(tmp);

        let mut contexts: Vec<(&mut [u8], &mut [u8])> = Vec::with_capacity(self.stages.len());
        for stage in &self.stages {
            let a = alloc.allocate(stage.filter.context_size());
            let b = alloc.allocate(if stage.planes == StagePlanes::Chroma { stage.filter.context_size() } else { 0 });

            stage.filter.init_context(a);
            if stage.planes == StagePlanes::Chroma {
                stage.filter.init_context(b);
            }
            contexts.push((a, b));
        }

        let mut caches: Vec<(&mut [u8], &mut [u8], &mut [u8])> = Vec::with_capacity(self.plans.len());
        for plan in &self.plans {
            let luma_bytes = plan.luma_cache.map(|c| c.bytes()).unwrap_or(0);
            let chroma_bytes = plan.chroma_cache.map(|c| c.bytes()).unwrap_or(0);

            caches.push((alloc.allocate(luma_bytes), alloc.allocate(chroma_bytes), alloc.allocate(chroma_bytes)));
        }

        let scratch = alloc.allocate(self.scratch_size());

        // Assemble raw plane descriptors for every stage up front; writers
        // and readers of one cache never run concurrently.
        let mut outputs: Vec<[PlaneMut; 3]> = Vec::with_capacity(self.stages.len());
        for ((stage, plan), cache) in self.stages.iter().zip(&self.plans).zip(caches.iter_mut()) {
            let luma = match (stage.planes, plan.luma_cache) {
                (StagePlanes::Chroma, _) => PlaneMut::empty(),
                (_, Some(spec)) => PlaneMut::from_slice_masked(cache.0, spec.stride, spec.mask),
                (_, None) => dst.plane(0),
            };
            let (chroma1, chroma2) = match (stage.planes, plan.chroma_cache) {
                (StagePlanes::Luma, _) => (PlaneMut::empty(), PlaneMut::empty()),
                (_, Some(spec)) => (
                    PlaneMut::from_slice_masked(cache.1, spec.stride, spec.mask),
                    PlaneMut::from_slice_masked(cache.2, spec.stride, spec.mask),
                ),
                (_, None) => (dst.plane(1), dst.plane(2)),
            };

            outputs.push([luma, chroma1, chroma2]);
        }

        let mut inputs: Vec<[PlaneRef; 3]> = Vec::with_capacity(self.stages.len());
        for plan in &self.plans {
            let luma = match plan.pred_luma {
                Some(pred) => outputs[pred][0].as_ref(),
                None => src.plane(0),
            };
            let (chroma1, chroma2) = match plan.pred_chroma {
                Some(pred) => (outputs[pred][1].as_ref(), outputs[pred][2].as_ref()),
                None => (src.plane(1), src.plane(2)),
            };

            inputs.push([luma, chroma1, chroma2]);
        }

        let mut exec = Exec {
            graph: self,
            contexts,
            inputs,
            outputs,
            scratch,
            cursors: vec![0; self.stages.len()],
            src_cursor: 0,
            unpack: unpack_cb,
        };

        let out_height = self.luma_attr.height;
        let out_width = self.luma_attr.width;
        let group = self.output_group();
        let luma_sink = *self.luma_path.last().unwrap();
        let chroma_sink = self.chroma_path.last().copied();

        let mut i = 0;
        while i < out_height {
            exec.ensure(luma_sink, i + group)?;
            if let Some(chroma_sink) = chroma_sink {
                exec.ensure(chroma_sink, (i + group) >> self.subsample_h_out)?;
            }

            if let Some(cb) = pack_cb.as_mut() {
                cb(i, 0, out_width).map_err(|_| Error::UserCallbackFailed)?;
            }

            i += group;
        }

        Ok(())
    }
}

struct Exec<'g, 'b, 'u> {
    graph: &'g FilterGraph,
    contexts: Vec<(&'b mut [u8], &'b mut [u8])>,
    inputs: Vec<[PlaneRef<'b>; 3]>,
    outputs: Vec<[PlaneMut<'b>; 3]>,
    scratch: &'b mut [u8],
    cursors: Vec<u32>,
    src_cursor: u32,
    unpack: Option<GraphCallback<'u>>,
}

impl Exec<'_, '_, '_> {
    fn pull_source(&mut self, upto: u32) -> Result<()> {
        let upto = upto.min(self.graph.src_height);

        if self.unpack.is_some() {
            let step = 1u32 << self.graph.subsample_h;
            let width = self.graph.src_width;

            while self.src_cursor < upto {
                let i = self.src_cursor;

                if let Some(cb) = self.unpack.as_mut() {
                    cb(i, 0, width).map_err(|_| Error::UserCallbackFailed)?;
                }
                self.src_cursor += step;
            }
        }

        Ok(())
    }

    fn ensure(&mut self, idx: usize, upto: u32) -> Result<()> {
        let plan = self.graph.plans[idx];
        let planes = self.graph.stages[idx].planes;
        let upto = upto.min(plan.out_height);

        while self.cursors[idx] < upto {
            let i = self.cursors[idx];
            let range = self.graph.stages[idx].filter.required_row_range(i);
            let in_upto = range.1.min(plan.in_height);

            match planes {
                StagePlanes::Luma => match plan.pred_luma {
                    Some(pred) => self.ensure(pred, in_upto)?,
                    None => self.pull_source(in_upto)?,
                },
                StagePlanes::Chroma => match plan.pred_chroma {
                    Some(pred) => self.ensure(pred, in_upto)?,
                    None => self.pull_source(in_upto << self.graph.subsample_h)?,
                },
                StagePlanes::Color => {
                    match plan.pred_luma {
                        Some(pred) => self.ensure(pred, in_upto)?,
                        None => self.pull_source(in_upto)?,
                    }
                    match plan.pred_chroma {
                        Some(pred) => self.ensure(pred, in_upto)?,
                        None => self.pull_source(in_upto << self.graph.subsample_h)?,
                    }
                }
            }

            let src_buf = ImageBufferRef::new(self.inputs[idx]);
            let dst_buf = ImageBufferMut::new(self.outputs[idx]);
            let stage = &self.graph.stages[idx];

            match planes {
                StagePlanes::Color | StagePlanes::Luma => {
                    stage.filter.process(self.contexts[idx].0, &src_buf, &dst_buf, self.scratch, i, 0, plan.out_width)?;
                }
                StagePlanes::Chroma => {
                    stage.filter.process(self.contexts[idx].0, &src_buf.select_plane(1), &dst_buf.select_plane(1), self.scratch, i, 0, plan.out_width)?;
                    stage.filter.process(self.contexts[idx].1, &src_buf.select_plane(2), &dst_buf.select_plane(2), self.scratch, i, 0, plan.out_width)?;
                }
            }

            self.cursors[idx] = i + plan.step;
        }

        Ok(())
    }
}
