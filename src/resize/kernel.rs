use aligned_vec::AVec;

use crate::{illegal_argument_error, matrix::RowMatrix, utils::{align_to, alignment_of, ALIGNMENT}, Result};

fn sinc(x: f64) -> f64 {
    if x.abs() < 0.0001 {
        1.0
    } else {
        (x * std::f64::consts::PI).sin() / (x * std::f64::consts::PI)
    }
}

fn sq(x: f64) -> f64 {
    x * x
}

fn cube(x: f64) -> f64 {
    x * x * x
}

/// Continuous 1-D resampling kernel.
pub trait ResampleKernel: Send + Sync {
    /// Half the width of the kernel's nonzero region, in input samples.
    fn support(&self) -> u32;

    /// Kernel value at position `x`.
    fn eval(&self, x: f64) -> f64;
}

/// Nearest-neighbor kernel, never anti-aliased.
pub struct PointKernel;

impl ResampleKernel for PointKernel {
    fn support(&self) -> u32 {
        0
    }

    fn eval(&self, _x: f64) -> f64 {
        1.0
    }
}

/// Triangle kernel.
pub struct BilinearKernel;

impl ResampleKernel for BilinearKernel {
    fn support(&self) -> u32 {
        1
    }

    fn eval(&self, x: f64) -> f64 {
        (1.0 - x.abs()).max(0.0)
    }
}

/// Mitchell-Netravali two-parameter cubic.
pub struct BicubicKernel {
    p0: f64,
    p2: f64,
    p3: f64,
    q0: f64,
    q1: f64,
    q2: f64,
    q3: f64,
}

impl BicubicKernel {
    pub fn new(b: f64, c: f64) -> Self {
        Self {
            p0: (6.0 - 2.0 * b) / 6.0,
            p2: (-18.0 + 12.0 * b + 6.0 * c) / 6.0,
            p3: (12.0 - 9.0 * b - 6.0 * c) / 6.0,
            q0: (8.0 * b + 24.0 * c) / 6.0,
            q1: (-12.0 * b - 48.0 * c) / 6.0,
            q2: (6.0 * b + 30.0 * c) / 6.0,
            q3: (-b - 6.0 * c) / 6.0,
        }
    }
}

impl ResampleKernel for BicubicKernel {
    fn support(&self) -> u32 {
        2
    }

    fn eval(&self, x: f64) -> f64 {
        let x = x.abs();

        if x < 1.0 {
            self.p0 + self.p2 * sq(x) + self.p3 * cube(x)
        } else if x < 2.0 {
            self.q0 + self.q1 * x + self.q2 * sq(x) + self.q3 * cube(x)
        } else {
            0.0
        }
    }
}

/// "Spline16" kernel from Avisynth.
pub struct Spline16Kernel;

impl ResampleKernel for Spline16Kernel {
    fn support(&self) -> u32 {
        2
    }

    fn eval(&self, x: f64) -> f64 {
        let x = x.abs();

        if x < 1.0 {
            1.0 - (1.0 / 5.0 * x) - (9.0 / 5.0 * sq(x)) + cube(x)
        } else if x < 2.0 {
            let x = x - 1.0;
            (-7.0 / 15.0 * x) + (4.0 / 5.0 * sq(x)) - (1.0 / 3.0 * cube(x))
        } else {
            0.0
        }
    }
}

/// "Spline36" kernel from Avisynth.
pub struct Spline36Kernel;

impl ResampleKernel for Spline36Kernel {
    fn support(&self) -> u32 {
        3
    }

    fn eval(&self, x: f64) -> f64 {
        let x = x.abs();

        if x < 1.0 {
            1.0 - (3.0 / 209.0 * x) - (453.0 / 209.0 * sq(x)) + (13.0 / 11.0 * cube(x))
        } else if x < 2.0 {
            let x = x - 1.0;
            (-156.0 / 209.0 * x) + (270.0 / 209.0 * sq(x)) - (6.0 / 11.0 * cube(x))
        } else if x < 3.0 {
            let x = x - 2.0;
            (26.0 / 209.0 * x) - (45.0 / 209.0 * sq(x)) + (1.0 / 11.0 * cube(x))
        } else {
            0.0
        }
    }
}

/// Lanczos kernel with a variable number of taps.
pub struct LanczosKernel {
    taps: u32,
}

impl LanczosKernel {
    pub fn new(taps: u32) -> Self {
        Self {
            taps,
        }
    }
}

impl ResampleKernel for LanczosKernel {
    fn support(&self) -> u32 {
        self.taps
    }

    fn eval(&self, x: f64) -> f64 {
        let x = x.abs();

        if x < self.taps as f64 {
            sinc(x) * sinc(x / self.taps as f64)
        } else {
            0.0
        }
    }
}

/// Evaluated filter taps for a given scale and shift.
///
/// Each output sample `i` is the dot product of `filter_width` contiguous
/// input samples starting at `left[i]` with one row of the coefficient
/// matrix. The matrix is stored both in f32 and in Q1.14.
pub(crate) struct FilterContext {
    pub input_width: u32,
    pub filter_width: u32,
    pub filter_rows: u32,
    pub stride: u32,
    pub stride_i16: u32,
    pub data: AVec<f32>,
    pub data_i16: AVec<i16>,
    pub left: Vec<u32>,
}

/// Compute the sparse resampling matrix for a kernel, scale, and shift.
///
/// `width` is the active subwindow of the source axis in source samples.
pub(crate) fn compute_filter(kernel: &dyn ResampleKernel, src_dim: u32, dst_dim: u32, shift: f64, width: f64) -> Result<FilterContext> {
    let scale = dst_dim as f64 / width;
    let step = scale.min(1.0);
    let support = kernel.support() as f64 / step;
    let filter_size = ((support * 2.0).ceil() as i32).max(1);

    if shift.abs() >= src_dim as f64 || shift + width >= 2.0 * src_dim as f64 {
        return Err(illegal_argument_error!("subwindow too far from image"));
    }
    if (src_dim as f64) <= support {
        return Err(illegal_argument_error!("filter wider than image"));
    }
    if width <= support {
        return Err(illegal_argument_error!("subwindow smaller than filter"));
    }

    let minpos = 0.5;
    let maxpos = src_dim as f64 - 0.5;

    let mut m = RowMatrix::new(dst_dim as usize, src_dim as usize);

    for i in 0..dst_dim as usize {
        // Position of the output sample on the input grid.
        let pos = (i as f64 + 0.5) / scale + shift;
        let begin_pos = (pos + support - filter_size as f64 + 0.5).floor() + 0.5;

        let mut total = 0.0;
        for j in 0..filter_size {
            let xpos = begin_pos + j as f64;
            total += kernel.eval((xpos - pos) * step);
        }

        for j in 0..filter_size {
            let xpos = begin_pos + j as f64;

            // Mirror positions beyond the image bounds.
            let real_pos = if xpos < minpos {
                2.0 * minpos - xpos
            } else if xpos > maxpos {
                2.0 * maxpos - xpos
            } else {
                xpos
            };

            m.add(i, real_pos.floor() as usize, kernel.eval((xpos - pos) * step) / total);
        }
    }

    m.compress();
    Ok(compress_matrix(&m, src_dim))
}

fn compress_matrix(m: &RowMatrix, src_dim: u32) -> FilterContext {
    let rows = m.rows();
    let cols = m.cols();

    let mut filter_width = 0;
    for i in 0..rows {
        filter_width = filter_width.max(m.row_right(i) - m.row_left(i));
    }

    let stride = align_to(filter_width, alignment_of::<f32>());
    let stride_i16 = align_to(filter_width, alignment_of::<i16>());

    let mut data: AVec<f32> = AVec::new(ALIGNMENT);
    let mut data_i16: AVec<i16> = AVec::new(ALIGNMENT);
    let mut left = Vec::with_capacity(rows);

    for i in 0..rows {
        let row_left = m.row_left(i).min(cols - filter_width);

        for j in 0..stride {
            let coeff = if j < filter_width { m.get(i, row_left + j) as f32 } else { 0.0 };
            data.push(coeff);
        }
        for j in 0..stride_i16 {
            let coeff = if j < filter_width { m.get(i, row_left + j) as f32 } else { 0.0 };
            data_i16.push((coeff * (1 << 14) as f32).round() as i16);
        }
        left.push(row_left as u32);
    }

    FilterContext {
        input_width: src_dim,
        filter_width: filter_width as u32,
        filter_rows: rows as u32,
        stride: stride as u32,
        stride_i16: stride_i16 as u32,
        data,
        data_i16,
        left,
    }
}
