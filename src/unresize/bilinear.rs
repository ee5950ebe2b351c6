use aligned_vec::AVec;

use crate::{matrix::RowMatrix, utils::{align_to, alignment_of, ALIGNMENT}, Result};

/// Precomputed state for inverting a bilinear upscale along one axis.
///
/// `matrix_*` hold the packed rows of the transposed bilinear matrix A';
/// `lu_*` hold the LU decomposition of the tridiagonal normal matrix A'A,
/// with `lu_l` stored pre-inverted since it is used as a divisor.
pub(crate) struct BilinearContext {
    pub input_width: u32,
    pub output_width: u32,
    pub matrix_coefficients: AVec<f32>,
    pub matrix_row_offsets: Vec<u32>,
    pub matrix_row_size: u32,
    pub matrix_row_stride: u32,
    pub lu_c: AVec<f32>,
    pub lu_l: AVec<f32>,
    pub lu_u: AVec<f32>,
}

struct TridiagonalLu {
    l: Vec<f64>,
    u: Vec<f64>,
    c: Vec<f64>,
}

fn tridiagonal_decompose(m: &RowMatrix) -> TridiagonalLu {
    let n = m.rows();
    let eps = f64::EPSILON;

    let mut lu = TridiagonalLu {
        l: vec![0.0; n],
        u: vec![0.0; n],
        c: vec![0.0; n],
    };

    lu.c[0] = 0.0;
    lu.l[0] = m.get(0, 0);
    lu.u[0] = m.get(0, 1) / (m.get(0, 0) + eps);

    for i in 1..n - 1 {
        lu.c[i] = m.get(i, i - 1);
        lu.l[i] = m.get(i, i) - lu.c[i] * lu.u[i - 1];
        lu.u[i] = m.get(i, i + 1) / (lu.l[i] + eps);
    }

    lu.c[n - 1] = m.get(n - 1, n - 2);
    lu.l[n - 1] = m.get(n - 1, n - 1) - lu.c[n - 1] * lu.u[n - 2];
    lu.u[n - 1] = 0.0;

    lu
}

/// Weights of the bilinear upscale from `in_dim` to `out_dim` samples.
fn bilinear_weights(in_dim: u32, out_dim: u32, shift: f64) -> RowMatrix {
    let mut m = RowMatrix::new(out_dim as usize, in_dim as usize);

    // Position of the outermost input samples on the input grid.
    let leftmost = 0.5 + shift;
    let rightmost = in_dim as f64 - 0.5 + shift;

    let leftmost_idx = leftmost.floor().clamp(0.0, in_dim as f64 - 1.0) as usize;
    let rightmost_idx = rightmost.floor().clamp(0.0, in_dim as f64 - 1.0) as usize;

    for i in 0..out_dim as usize {
        let position = (i as f64 + 0.5) * in_dim as f64 / out_dim as f64;

        if position <= leftmost {
            // Outside the input range; clamp to the nearest input sample.
            m.set(i, leftmost_idx, 1.0);
        } else if position >= rightmost {
            m.set(i, rightmost_idx, 1.0);
        } else {
            let left_idx = (position - leftmost).floor() as usize;
            let distance = position - left_idx as f64 - leftmost;

            m.set(i, left_idx, 1.0 - distance);
            m.set(i, left_idx + 1, distance);
        }
    }

    m
}

/// Build the unresize context recovering `orig_dim` samples from `up_dim`.
///
/// `shift` is the center shift of the upscaled vector; it maps back to the
/// original grid as `-shift * orig / up`.
pub(crate) fn create_bilinear_context(orig_dim: u32, up_dim: u32, shift: f64) -> Result<BilinearContext> {
    let m = bilinear_weights(orig_dim, up_dim, -shift * orig_dim as f64 / up_dim as f64);
    let transpose_m = m.transpose();
    let pinv_m = transpose_m.mul(&m);
    let lu = tridiagonal_decompose(&pinv_m);

    let rows = transpose_m.rows();
    let cols = transpose_m.cols();

    let mut row_size = 0;
    for i in 0..rows {
        row_size = row_size.max(transpose_m.row_right(i) - transpose_m.row_left(i));
    }
    let row_stride = align_to(row_size, alignment_of::<f32>());

    let mut matrix_coefficients: AVec<f32> = AVec::new(ALIGNMENT);
    let mut matrix_row_offsets = Vec::with_capacity(rows);

    for i in 0..rows {
        let left = transpose_m.row_left(i).min(cols - row_size);

        for j in 0..row_stride {
            matrix_coefficients.push(if j < row_size { transpose_m.get(i, left + j) as f32 } else { 0.0 });
        }
        matrix_row_offsets.push(left as u32);
    }

    let mut lu_c: AVec<f32> = AVec::new(ALIGNMENT);
    let mut lu_l: AVec<f32> = AVec::new(ALIGNMENT);
    let mut lu_u: AVec<f32> = AVec::new(ALIGNMENT);

    for i in 0..rows {
        lu_c.push(lu.c[i] as f32);
        lu_l.push((1.0 / (lu.l[i] + f64::from(f32::EPSILON))) as f32);
        lu_u.push(lu.u[i] as f32);
    }

    Ok(BilinearContext {
        input_width: up_dim,
        output_width: orig_dim,
        matrix_coefficients,
        matrix_row_offsets,
        matrix_row_size: row_size as u32,
        matrix_row_stride: row_stride as u32,
        lu_c,
        lu_l,
        lu_u,
    })
}
