pub mod buffer;
pub mod colorspace;
pub mod cpu;
pub mod depth;
pub mod error;
pub mod filter;
pub mod format;
pub mod graph;
pub mod pixel;
pub mod resize;
pub mod unresize;

mod alloc;
mod matrix;
mod utils;

pub use buffer::{select_buffer_mask, ImageBufferMut, ImageBufferRef, PlaneMut, PlaneRef};
pub use cpu::{cpu_features, set_cpu_features, CpuFeatures};
pub use depth::DitherType;
pub use filter::{Filter, FilterFlags, ImageAttributes};
pub use format::*;
pub use graph::{FilterGraph, GraphCallback, GraphParams, ResampleFilter};
pub use pixel::{PixelFormat, PixelType};

use crate::error::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Alignment in bytes required of plane pointers, strides and the temporary
/// buffer passed to [`FilterGraph::process`].
pub const ALIGNMENT: usize = utils::ALIGNMENT;
