use log::debug;

use super::{FilterGraph, MuxFilter};
use crate::{
    colorspace::{ColorPrimaries, Colorspace, ColorspaceFilter, MatrixCoefficients, TransferCharacteristics},
    cpu::CpuFeatures,
    depth::{create_depth_filter, DitherType},
    format::{self, ChromaLocation, ColorFamily, FieldParity, ImageFormat, PixelRange},
    illegal_argument_error,
    pixel::{PixelFormat, PixelType},
    resize::{create_resize_filter, BicubicKernel, BilinearKernel, LanczosKernel, PointKernel, ResampleKernel, Spline16Kernel, Spline36Kernel},
    unsupported_error, Result,
};

/// Resampling kernel selection for [`GraphParams`].
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ResampleFilter {
    Point = 0, // nearest neighbor, never anti-aliased
    Bilinear,  // bilinear interpolation
    #[default]
    Bicubic,   // bicubic convolution
    Spline16,  // "Spline16" from Avisynth
    Spline36,  // "Spline36" from Avisynth
    Lanczos,   // Lanczos with a variable number of taps
}

/// Parameters steering graph construction.
///
/// The filter parameters depend on the kernel: for bicubic they are the `b`
/// and `c` coefficients, for Lanczos the first is the tap count. `NAN`
/// selects the library default.
#[derive(Clone, Copy, Debug)]
pub struct GraphParams {
    pub resample_filter: ResampleFilter,
    pub filter_param_a: f64,
    pub filter_param_b: f64,
    pub resample_filter_uv: ResampleFilter,
    pub filter_param_a_uv: f64,
    pub filter_param_b_uv: f64,
    pub dither: DitherType,
    pub cpu: CpuFeatures,
}

impl Default for GraphParams {
    fn default() -> Self {
        Self {
            resample_filter: ResampleFilter::Bicubic,
            filter_param_a: f64::NAN,
            filter_param_b: f64::NAN,
            resample_filter_uv: ResampleFilter::Bilinear,
            filter_param_a_uv: f64::NAN,
            filter_param_b_uv: f64::NAN,
            dither: DitherType::None,
            cpu: CpuFeatures::Auto,
        }
    }
}

fn make_kernel(filter: ResampleFilter, param_a: f64, param_b: f64) -> Result<Box<dyn ResampleKernel>> {
    match filter {
        ResampleFilter::Point => Ok(Box::new(PointKernel)),
        ResampleFilter::Bilinear => Ok(Box::new(BilinearKernel)),
        ResampleFilter::Bicubic => {
            let b = if param_a.is_nan() { 1.0 / 3.0 } else { param_a };
            let c = if param_b.is_nan() { 1.0 / 3.0 } else { param_b };
            Ok(Box::new(BicubicKernel::new(b, c)))
        }
        ResampleFilter::Spline16 => Ok(Box::new(Spline16Kernel)),
        ResampleFilter::Spline36 => Ok(Box::new(Spline36Kernel)),
        ResampleFilter::Lanczos => {
            let taps = if param_a.is_nan() { 3.0 } else { param_a.floor() };
            if taps < 1.0 || taps > 64.0 {
                return Err(illegal_argument_error!("invalid Lanczos tap count"));
            }
            Ok(Box::new(LanczosKernel::new(taps as u32)))
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ChromaLocationW {
    Left,
    Center,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ChromaLocationH {
    Center,
    Top,
    Bottom,
}

fn split_chroma_location(location: ChromaLocation) -> (ChromaLocationW, ChromaLocationH) {
    match location {
        ChromaLocation::Left => (ChromaLocationW::Left, ChromaLocationH::Center),
        ChromaLocation::Center => (ChromaLocationW::Center, ChromaLocationH::Center),
        ChromaLocation::TopLeft => (ChromaLocationW::Left, ChromaLocationH::Top),
        ChromaLocation::Top => (ChromaLocationW::Center, ChromaLocationH::Top),
        ChromaLocation::BottomLeft => (ChromaLocationW::Left, ChromaLocationH::Bottom),
        ChromaLocation::Bottom => (ChromaLocationW::Center, ChromaLocationH::Bottom),
    }
}

fn chroma_shift_raw_w(location: ChromaLocationW, _parity: FieldParity) -> f64 {
    if location == ChromaLocationW::Left {
        -0.5
    } else {
        0.0
    }
}

fn chroma_shift_raw_h(location: ChromaLocationH, parity: FieldParity) -> f64 {
    let shift = match location {
        ChromaLocationH::Top => -0.5,
        ChromaLocationH::Bottom => 0.5,
        ChromaLocationH::Center => 0.0,
    };

    match parity {
        FieldParity::Top => (shift - 0.5) / 2.0,
        FieldParity::Bottom => (shift + 0.5) / 2.0,
        FieldParity::Progressive => shift,
    }
}

fn chroma_shift_factor(raw_in: f64, raw_out: f64, subsample_in: u32, subsample_out: u32, src_dim: u32, dst_dim: u32) -> f64 {
    let sub_scale = 1.0 / (1 << subsample_in) as f64;
    let mut shift = 0.0;

    if subsample_in != 0 {
        shift -= sub_scale * raw_in;
    }
    if subsample_out != 0 {
        shift += sub_scale * raw_out * src_dim as f64 / dst_dim as f64;
    }

    shift
}

fn translate_matrix(matrix: format::ColorMatrix) -> MatrixCoefficients {
    match matrix {
        format::ColorMatrix::Rgb => MatrixCoefficients::Rgb,
        format::ColorMatrix::Bt709 => MatrixCoefficients::Bt709,
        format::ColorMatrix::Bt470Bg | format::ColorMatrix::Smpte170M => MatrixCoefficients::Bt601,
        format::ColorMatrix::Bt2020Ncl => MatrixCoefficients::Bt2020Ncl,
        format::ColorMatrix::Bt2020Cl => MatrixCoefficients::Bt2020Cl,
        format::ColorMatrix::Unspecified => MatrixCoefficients::Unspecified,
    }
}

fn translate_transfer(transfer: format::ColorTransferCharacteristics) -> TransferCharacteristics {
    match transfer {
        format::ColorTransferCharacteristics::Bt709
        | format::ColorTransferCharacteristics::Smpte170M
        | format::ColorTransferCharacteristics::Bt2020_10
        | format::ColorTransferCharacteristics::Bt2020_12 => TransferCharacteristics::Bt709,
        format::ColorTransferCharacteristics::Linear => TransferCharacteristics::Linear,
        format::ColorTransferCharacteristics::Unspecified => TransferCharacteristics::Unspecified,
    }
}

fn translate_primaries(primaries: format::ColorPrimaries) -> ColorPrimaries {
    match primaries {
        format::ColorPrimaries::Bt709 => ColorPrimaries::Bt709,
        format::ColorPrimaries::Smpte170M | format::ColorPrimaries::Smpte240M => ColorPrimaries::SmpteC,
        format::ColorPrimaries::Bt2020 => ColorPrimaries::Bt2020,
        format::ColorPrimaries::Unspecified => ColorPrimaries::Unspecified,
    }
}

#[derive(Clone, Copy, Debug)]
struct BuilderState {
    width: u32,
    height: u32,
    ty: PixelType,
    subsample_w: u32,
    subsample_h: u32,
    color: ColorFamily,
    colorspace: Colorspace,
    depth: u32,
    fullrange: bool,
    parity: FieldParity,
    chroma_location_w: ChromaLocationW,
    chroma_location_h: ChromaLocationH,
}

impl BuilderState {
    fn import(format: &ImageFormat) -> Result<Self> {
        let depth = if format.depth == 0 { (format.pixel_type.size() * 8) as u32 } else { format.depth };
        let (chroma_location_w, chroma_location_h) = split_chroma_location(format.chroma_location);

        let state = Self {
            width: format.width,
            height: format.height,
            ty: format.pixel_type,
            subsample_w: format.subsample_w,
            subsample_h: format.subsample_h,
            color: format.color_family,
            colorspace: Colorspace::new(translate_matrix(format.matrix), translate_transfer(format.transfer), translate_primaries(format.primaries)),
            depth,
            fullrange: format.pixel_range == PixelRange::Full,
            parity: format.field_parity,
            chroma_location_w,
            chroma_location_h,
        };

        state.validate()?;
        Ok(state)
    }

    fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(illegal_argument_error!("image dimension must be non-zero"));
        }

        if self.is_greyscale() {
            if self.subsample_w != 0 || self.subsample_h != 0 {
                return Err(unsupported_error!("cannot subsample greyscale image"));
            }
            if self.colorspace.matrix != MatrixCoefficients::Unspecified
                || self.colorspace.transfer != TransferCharacteristics::Unspecified
                || self.colorspace.primaries != ColorPrimaries::Unspecified
            {
                return Err(unsupported_error!("cannot specify colorspace of greyscale image"));
            }
        }

        if self.is_rgb() {
            if self.subsample_w != 0 || self.subsample_h != 0 {
                return Err(unsupported_error!("cannot subsample RGB image"));
            }
            if self.colorspace.matrix != MatrixCoefficients::Unspecified && self.colorspace.matrix != MatrixCoefficients::Rgb {
                return Err(unsupported_error!("RGB image cannot be YUV"));
            }
        }

        if self.subsample_h > 1 && self.parity != FieldParity::Progressive {
            return Err(unsupported_error!("subsampling factor too great for interlaced image"));
        }
        if self.subsample_w > 2 || self.subsample_h > 2 {
            return Err(unsupported_error!("subsampling factor too great"));
        }
        if self.width % (1 << self.subsample_w) != 0 || self.height % (1 << self.subsample_h) != 0 {
            return Err(illegal_argument_error!("image dimension not divisible by subsampling factor"));
        }

        if self.depth > (self.ty.size() * 8) as u32 {
            return Err(illegal_argument_error!("bit depth exceeds limits of type"));
        }

        Ok(())
    }

    fn is_greyscale(&self) -> bool {
        self.color == ColorFamily::Grey
    }

    fn is_rgb(&self) -> bool {
        self.color == ColorFamily::Rgb
    }

    fn is_yuv(&self) -> bool {
        self.color == ColorFamily::Yuv
    }
}

struct GraphBuilder {
    graph: FilterGraph,
    state: BuilderState,
}

impl GraphBuilder {
    fn new(source: &ImageFormat) -> Result<Self> {
        let state = BuilderState::import(source)?;
        let graph = FilterGraph::new(state.width, state.height, state.ty, state.subsample_w, state.subsample_h, !state.is_greyscale())?;

        Ok(Self {
            graph,
            state,
        })
    }

    fn needs_colorspace(&self, target: &BuilderState) -> bool {
        self.state.colorspace != target.colorspace
    }

    fn needs_depth(&self, target: &BuilderState) -> bool {
        self.state.ty != target.ty || self.state.depth != target.depth || self.state.fullrange != target.fullrange
    }

    fn needs_resize(&self, target: &BuilderState) -> bool {
        self.state.width != target.width
            || self.state.height != target.height
            || self.state.subsample_w != target.subsample_w
            || self.state.subsample_h != target.subsample_h
            || (self.state.subsample_w != 0 && self.state.chroma_location_w != target.chroma_location_w)
            || (self.state.subsample_h != 0 && self.state.chroma_location_h != target.chroma_location_h)
    }

    fn select_working_type(&self, target: &BuilderState) -> PixelType {
        if self.needs_colorspace(target) {
            PixelType::Float
        } else if self.needs_resize(target) {
            match self.state.ty {
                PixelType::Byte => PixelType::Word,
                PixelType::Half => PixelType::Float,
                ty => ty,
            }
        } else {
            self.state.ty
        }
    }

    fn convert_colorspace(&mut self, colorspace: &Colorspace, params: &GraphParams) -> Result<()> {
        if self.state.is_greyscale() {
            return Err(unsupported_error!("cannot convert colorspace of greyscale image"));
        }
        if self.state.colorspace == *colorspace {
            return Ok(());
        }

        debug!("attach colorspace conversion {:?} -> {:?}", self.state.colorspace, colorspace);

        let filter = ColorspaceFilter::new(self.state.width, self.state.height, &self.state.colorspace, colorspace, params.cpu)?;
        self.graph.attach_filter(Box::new(filter))?;

        self.state.color = if colorspace.matrix == MatrixCoefficients::Rgb { ColorFamily::Rgb } else { ColorFamily::Yuv };
        self.state.colorspace = *colorspace;

        Ok(())
    }

    fn convert_depth(&mut self, format: &PixelFormat, dither: DitherType, params: &GraphParams) -> Result<()> {
        let src_format = PixelFormat::new(self.state.ty, self.state.depth, self.state.fullrange, false);
        if src_format == *format {
            return Ok(());
        }

        debug!("attach depth conversion {:?} -> {:?}", src_format, format);

        let filter = create_depth_filter(dither, self.state.width, self.state.height, &src_format, format, params.cpu)?;

        if self.state.is_yuv() {
            let src_format_uv = PixelFormat {
                chroma: true,
                ..src_format
            };
            let format_uv = PixelFormat {
                chroma: true,
                ..*format
            };
            let filter_uv = create_depth_filter(
                dither,
                self.state.width >> self.state.subsample_w,
                self.state.height >> self.state.subsample_h,
                &src_format_uv,
                &format_uv,
                params.cpu,
            )?;

            self.graph.attach_filter(filter)?;
            self.graph.attach_filter_uv(filter_uv)?;
        } else if self.state.is_rgb() {
            self.graph.attach_filter(Box::new(MuxFilter::new(filter, None)?))?;
        } else {
            self.graph.attach_filter(filter)?;
        }

        self.state.ty = format.ty;
        self.state.depth = format.depth;
        self.state.fullrange = format.fullrange;

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn convert_resize(
        &mut self,
        width: u32,
        height: u32,
        subsample_w: u32,
        subsample_h: u32,
        chroma_location_w: ChromaLocationW,
        chroma_location_h: ChromaLocationH,
        params: &GraphParams,
    ) -> Result<()> {
        let (subsample_w, subsample_h) = if self.state.is_greyscale() { (0, 0) } else { (subsample_w, subsample_h) };
        let chroma_location_w = if subsample_w == 0 { ChromaLocationW::Center } else { chroma_location_w };
        let chroma_location_h = if subsample_h == 0 { ChromaLocationH::Center } else { chroma_location_h };

        if self.state.width == width
            && self.state.height == height
            && self.state.subsample_w == subsample_w
            && self.state.subsample_h == subsample_h
            && self.state.chroma_location_w == chroma_location_w
            && self.state.chroma_location_h == chroma_location_h
        {
            return Ok(());
        }

        let do_resize_luma = self.state.width != width || self.state.height != height;
        let do_resize_chroma = (self.state.width >> self.state.subsample_w != width >> subsample_w)
            || (self.state.height >> self.state.subsample_h != height >> subsample_h)
            || ((self.state.subsample_w != 0 || subsample_w != 0) && self.state.chroma_location_w != chroma_location_w)
            || ((self.state.subsample_h != 0 || subsample_h != 0) && self.state.chroma_location_h != chroma_location_h);

        if do_resize_luma {
            debug!("attach luma resize {}x{} -> {}x{}", self.state.width, self.state.height, width, height);

            let kernel = make_kernel(params.resample_filter, params.filter_param_a, params.filter_param_b)?;
            let filter = create_resize_filter(
                kernel.as_ref(),
                self.state.ty,
                self.state.depth,
                self.state.width,
                self.state.height,
                width,
                height,
                0.0,
                0.0,
                self.state.width as f64,
                self.state.height as f64,
                params.cpu,
            )?;

            if self.state.is_rgb() {
                self.graph.attach_filter(Box::new(MuxFilter::new(filter, None)?))?;
            } else {
                self.graph.attach_filter(filter)?;
            }
        }

        if self.state.is_yuv() && do_resize_chroma {
            let raw_w_in = chroma_shift_raw_w(self.state.chroma_location_w, self.state.parity);
            let raw_w_out = chroma_shift_raw_w(chroma_location_w, self.state.parity);
            let raw_h_in = chroma_shift_raw_h(self.state.chroma_location_h, self.state.parity);
            let raw_h_out = chroma_shift_raw_h(chroma_location_h, self.state.parity);

            let shift_w = chroma_shift_factor(raw_w_in, raw_w_out, self.state.subsample_w, subsample_w, self.state.width, width);
            let shift_h = chroma_shift_factor(raw_h_in, raw_h_out, self.state.subsample_h, subsample_h, self.state.height, height);

            let chroma_width_in = self.state.width >> self.state.subsample_w;
            let chroma_height_in = self.state.height >> self.state.subsample_h;
            let chroma_width_out = width >> subsample_w;
            let chroma_height_out = height >> subsample_h;

            debug!("attach chroma resize {}x{} -> {}x{} shift ({}, {})", chroma_width_in, chroma_height_in, chroma_width_out, chroma_height_out, shift_w, shift_h);

            let kernel = make_kernel(params.resample_filter_uv, params.filter_param_a_uv, params.filter_param_b_uv)?;
            let filter_uv = create_resize_filter(
                kernel.as_ref(),
                self.state.ty,
                self.state.depth,
                chroma_width_in,
                chroma_height_in,
                chroma_width_out,
                chroma_height_out,
                shift_w,
                shift_h,
                chroma_width_in as f64,
                chroma_height_in as f64,
                params.cpu,
            )?;

            self.graph.attach_filter_uv(filter_uv)?;
        }

        self.state.width = width;
        self.state.height = height;
        self.state.subsample_w = subsample_w;
        self.state.subsample_h = subsample_h;
        self.state.chroma_location_w = chroma_location_w;
        self.state.chroma_location_h = chroma_location_h;

        Ok(())
    }

    fn build(mut self, target: &ImageFormat, params: &GraphParams) -> Result<FilterGraph> {
        let target = BuilderState::import(target)?;

        // Pin the CPU family now; filters never consult the selector again.
        let params = &GraphParams {
            cpu: crate::cpu::resolve(params.cpu),
            ..*params
        };

        if self.state.parity != target.parity {
            return Err(unsupported_error!("cannot convert between field parity"));
        }
        if self.state.is_greyscale() != target.is_greyscale() {
            return Err(unsupported_error!("cannot convert between greyscale and color image"));
        }

        let working = self.select_working_type(&target);
        debug!("working pixel type: {:?}", working);

        if self.state.ty != working {
            let format = PixelFormat::new(working, (working.size() * 8) as u32, self.state.fullrange, false);
            self.convert_depth(&format, DitherType::None, params)?;
        }

        loop {
            if self.needs_colorspace(&target) {
                let width_444 = self.state.width.min(target.width);
                let height_444 = self.state.height.min(target.height);

                self.convert_resize(width_444, height_444, 0, 0, ChromaLocationW::Center, ChromaLocationH::Center, params)?;
                self.convert_colorspace(&target.colorspace, params)?;
            } else if self.needs_resize(&target) {
                self.convert_resize(
                    target.width,
                    target.height,
                    target.subsample_w,
                    target.subsample_h,
                    target.chroma_location_w,
                    target.chroma_location_h,
                    params,
                )?;
            } else if self.needs_depth(&target) {
                let format = PixelFormat::new(target.ty, target.depth, target.fullrange, false);
                self.convert_depth(&format, params.dither, params)?;
            } else {
                break;
            }
        }

        self.graph.complete()?;
        Ok(self.graph)
    }
}

impl FilterGraph {
    /// Build a graph converting `src_format` into `dst_format`.
    pub fn build(src_format: &ImageFormat, dst_format: &ImageFormat, params: &GraphParams) -> Result<FilterGraph> {
        GraphBuilder::new(src_format)?.build(dst_format, params)
    }
}
