mod convert;
mod dither;
mod error_diffusion;
mod quantize;

pub use convert::DepthConvert;
pub use dither::OrderedDither;
pub use error_diffusion::ErrorDiffusion;

use crate::{cpu::CpuFeatures, filter::Filter, pixel::PixelFormat, Result};

/// Dithering method applied when quantizing to an integer format.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum DitherType {
    #[default]
    None = 0,       // round to nearest
    Ordered,        // Bayer-patterned dither
    Random,         // pseudo-random noise of magnitude 0.5
    ErrorDiffusion, // Floyd-Steinberg error diffusion
}

/// Create a filter converting a plane of `pixel_in` to `pixel_out`.
///
/// Floating point outputs are produced by scale-and-offset conversion;
/// integer outputs go through the selected dither.
pub fn create_depth_filter(
    dither: DitherType,
    width: u32,
    height: u32,
    pixel_in: &PixelFormat,
    pixel_out: &PixelFormat,
    _cpu: CpuFeatures,
) -> Result<Box<dyn Filter>> {
    if pixel_out.ty.is_float() {
        return Ok(Box::new(DepthConvert::new(width, height, pixel_in, pixel_out)?));
    }

    let filter: Box<dyn Filter> = match dither {
        DitherType::None => Box::new(OrderedDither::new(width, height, pixel_in, pixel_out)),
        DitherType::Ordered => Box::new(OrderedDither::new_bayer(width, height, pixel_in, pixel_out)),
        DitherType::Random => Box::new(OrderedDither::new_random(width, height, pixel_in, pixel_out)),
        DitherType::ErrorDiffusion => Box::new(ErrorDiffusion::new(width, height, pixel_in, pixel_out)),
    };

    Ok(filter)
}
