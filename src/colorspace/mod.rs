mod graph;
mod matrix3;
mod operation;
mod types;

pub use types::{ColorPrimaries, Colorspace, MatrixCoefficients, TransferCharacteristics};

use smallvec::SmallVec;

use self::operation::Operation;
use crate::{
    buffer::{ImageBufferMut, ImageBufferRef, LineBuffer, LineBufferMut},
    cpu::CpuFeatures,
    filter::{Filter, FilterFlags, ImageAttributes},
    illegal_argument_error,
    pixel::PixelType,
    Result,
};

/// Converts three f32 planes between colorspaces, one row at a time.
///
/// The conversion is planned as the shortest path through the colorspace
/// graph; adjacent matrix steps are pre-multiplied into a single operation.
/// Integer and half inputs are adapted by depth filters composed around this
/// one.
pub struct ColorspaceFilter {
    width: u32,
    height: u32,
    operations: SmallVec<[Box<dyn Operation>; 8]>,
}

impl std::fmt::Debug for ColorspaceFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColorspaceFilter")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl ColorspaceFilter {
    pub fn new(width: u32, height: u32, csp_in: &Colorspace, csp_out: &Colorspace, cpu: CpuFeatures) -> Result<Self> {
        if !csp_in.is_valid() || !csp_out.is_valid() {
            return Err(illegal_argument_error!("invalid colorspace definition"));
        }

        let mut operations = SmallVec::new();

        if csp_in != csp_out {
            let path = graph::operation_path(csp_in, csp_out)?;
            let mut pending = None;

            for op in &path {
                match op.matrix()? {
                    Some(m) => {
                        // Fold runs of matrix operations into one.
                        pending = Some(match pending {
                            Some(prev) => m * prev,
                            None => m,
                        });
                    }
                    None => {
                        if let Some(m) = pending.take() {
                            operations.push(operation::create_matrix_operation(&m, cpu));
                        }
                        operations.push(op.create(cpu)?);
                    }
                }
            }
            if let Some(m) = pending.take() {
                operations.push(operation::create_matrix_operation(&m, cpu));
            }
        }

        Ok(Self {
            width,
            height,
            operations,
        })
    }
}

impl Filter for ColorspaceFilter {
    fn flags(&self) -> FilterFlags {
        FilterFlags::SAME_ROW | FilterFlags::IN_PLACE | FilterFlags::COLOR
    }

    fn image_attributes(&self) -> ImageAttributes {
        ImageAttributes {
            width: self.width,
            height: self.height,
            pixel_type: PixelType::Float,
        }
    }

    fn process(&self, _ctx: &mut [u8], src: &ImageBufferRef, dst: &ImageBufferMut, _tmp: &mut [u8], i: u32, left: u32, right: u32) -> Result<()> {
        let left = left as usize;
        let right = right as usize;

        for p in 0..3 {
            if src.plane(p).row_ptr(i) != dst.plane(p).row_ptr(i) as *const u8 {
                let src_buf = LineBuffer::<f32>::new(src.plane(p), self.width);
                let mut dst_buf = LineBufferMut::<f32>::new(dst.plane(p), self.width);
                dst_buf.row_mut(i)[left..right].copy_from_slice(&src_buf.row(i)[left..right]);
            }
        }

        let mut dst0 = LineBufferMut::<f32>::new(dst.plane(0), self.width);
        let mut dst1 = LineBufferMut::<f32>::new(dst.plane(1), self.width);
        let mut dst2 = LineBufferMut::<f32>::new(dst.plane(2), self.width);
        let mut planes = [dst0.row_mut(i), dst1.row_mut(i), dst2.row_mut(i)];

        for op in &self.operations {
            op.process(&mut planes, left, right);
        }

        Ok(())
    }
}
