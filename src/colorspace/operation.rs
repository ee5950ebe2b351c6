use super::{
    matrix3::Matrix3x3,
    types::{
        ColorPrimaries, MatrixCoefficients, TransferCharacteristics, ILLUMINANT_D65, REC_2020_KB, REC_2020_KR, REC_2020_PRIMARIES, REC_601_KB,
        REC_601_KR, REC_709_KB, REC_709_KR, REC_709_PRIMARIES, SMPTE_C_PRIMARIES,
    },
};
use crate::{cpu::CpuFeatures, illegal_argument_error, unsupported_error, Result};

const REC_709_ALPHA: f32 = 1.09929682680944;
const REC_709_BETA: f32 = 0.018053968510807;

// Scale factors for the BT.2020 constant-luminance B'-Y' and R'-Y' channels.
const CL_PB: f32 = 0.7909854;
const CL_NB: f32 = -0.9701716;
const CL_PR: f32 = 0.4969147;
const CL_NR: f32 = -0.8591209;

pub(crate) fn rec_709_gamma(x: f32) -> f32 {
    if x < REC_709_BETA {
        x * 4.5
    } else {
        REC_709_ALPHA * x.powf(0.45) - (REC_709_ALPHA - 1.0)
    }
}

pub(crate) fn rec_709_inverse_gamma(x: f32) -> f32 {
    if x < 4.5 * REC_709_BETA {
        x / 4.5
    } else {
        ((x + (REC_709_ALPHA - 1.0)) / REC_709_ALPHA).powf(1.0 / 0.45)
    }
}

fn kr_kb(matrix: MatrixCoefficients) -> Result<(f64, f64)> {
    match matrix {
        MatrixCoefficients::Bt601 => Ok((REC_601_KR, REC_601_KB)),
        MatrixCoefficients::Bt709 => Ok((REC_709_KR, REC_709_KB)),
        MatrixCoefficients::Bt2020Ncl => Ok((REC_2020_KR, REC_2020_KB)),
        _ => Err(illegal_argument_error!("matrix is not a non-constant luminance system")),
    }
}

pub(crate) fn ncl_rgb_to_yuv_matrix(matrix: MatrixCoefficients) -> Result<Matrix3x3> {
    let (kr, kb) = kr_kb(matrix)?;
    let kg = 1.0 - kr - kb;

    let uscale = 1.0 / (2.0 * (1.0 - kb));
    let vscale = 1.0 / (2.0 * (1.0 - kr));

    Ok(Matrix3x3([
        [kr, kg, kb],
        [-kr * uscale, -kg * uscale, (1.0 - kb) * uscale],
        [(1.0 - kr) * vscale, -kg * vscale, -kb * vscale],
    ]))
}

pub(crate) fn ncl_yuv_to_rgb_matrix(matrix: MatrixCoefficients) -> Result<Matrix3x3> {
    Ok(ncl_rgb_to_yuv_matrix(matrix)?.inverse())
}

fn xy_primaries(primaries: ColorPrimaries) -> Result<&'static [[f64; 2]; 3]> {
    match primaries {
        ColorPrimaries::SmpteC => Ok(&SMPTE_C_PRIMARIES),
        ColorPrimaries::Bt709 => Ok(&REC_709_PRIMARIES),
        ColorPrimaries::Bt2020 => Ok(&REC_2020_PRIMARIES),
        ColorPrimaries::Unspecified => Err(illegal_argument_error!("unspecified primaries")),
    }
}

fn xy_to_xyz(x: f64, y: f64) -> [f64; 3] {
    [x / y, 1.0, (1.0 - x - y) / y]
}

pub(crate) fn gamut_rgb_to_xyz_matrix(primaries: ColorPrimaries) -> Result<Matrix3x3> {
    let xy = xy_primaries(primaries)?;

    let r = xy_to_xyz(xy[0][0], xy[0][1]);
    let g = xy_to_xyz(xy[1][0], xy[1][1]);
    let b = xy_to_xyz(xy[2][0], xy[2][1]);
    let white = xy_to_xyz(ILLUMINANT_D65[0], ILLUMINANT_D65[1]);

    let columns = Matrix3x3([[r[0], g[0], b[0]], [r[1], g[1], b[1]], [r[2], g[2], b[2]]]);
    let s = columns.inverse().mul_vec(white);

    Ok(Matrix3x3([
        [s[0] * r[0], s[1] * g[0], s[2] * b[0]],
        [s[0] * r[1], s[1] * g[1], s[2] * b[1]],
        [s[0] * r[2], s[1] * g[2], s[2] * b[2]],
    ]))
}

pub(crate) fn gamut_xyz_to_rgb_matrix(primaries: ColorPrimaries) -> Result<Matrix3x3> {
    Ok(gamut_rgb_to_xyz_matrix(primaries)?.inverse())
}

/// Atomic conversion step applied to three co-sited f32 channels.
pub(crate) trait Operation: Send + Sync {
    fn process(&self, planes: &mut [&mut [f32]; 3], left: usize, right: usize);
}

pub(crate) struct MatrixOperation {
    matrix: [[f32; 3]; 3],
}

impl MatrixOperation {
    pub fn new(m: &Matrix3x3) -> Self {
        let mut matrix = [[0.0f32; 3]; 3];

        for i in 0..3 {
            for j in 0..3 {
                matrix[i][j] = m.0[i][j] as f32;
            }
        }
        Self {
            matrix,
        }
    }
}

impl Operation for MatrixOperation {
    fn process(&self, planes: &mut [&mut [f32]; 3], left: usize, right: usize) {
        let m = &self.matrix;

        for i in left..right {
            let a = planes[0][i];
            let b = planes[1][i];
            let c = planes[2][i];

            planes[0][i] = m[0][0] * a + m[0][1] * b + m[0][2] * c;
            planes[1][i] = m[1][0] * a + m[1][1] * b + m[1][2] * c;
            planes[2][i] = m[2][0] * a + m[2][1] * b + m[2][2] * c;
        }
    }
}

struct Rec709GammaOperation;

impl Operation for Rec709GammaOperation {
    fn process(&self, planes: &mut [&mut [f32]; 3], left: usize, right: usize) {
        for plane in planes.iter_mut() {
            for x in &mut plane[left..right] {
                *x = rec_709_gamma(*x);
            }
        }
    }
}

struct Rec709InverseGammaOperation;

impl Operation for Rec709InverseGammaOperation {
    fn process(&self, planes: &mut [&mut [f32]; 3], left: usize, right: usize) {
        for plane in planes.iter_mut() {
            for x in &mut plane[left..right] {
                *x = rec_709_inverse_gamma(*x);
            }
        }
    }
}

struct Rec2020ClToRgbOperation;

impl Operation for Rec2020ClToRgbOperation {
    fn process(&self, planes: &mut [&mut [f32]; 3], left: usize, right: usize) {
        let kr = REC_2020_KR as f32;
        let kb = REC_2020_KB as f32;
        let kg = 1.0 - kr - kb;

        for i in left..right {
            let y = planes[0][i];
            let u = planes[1][i];
            let v = planes[2][i];

            let b_minus_y = if u < 0.0 { u * 2.0 * -CL_NB } else { u * 2.0 * CL_PB };
            let r_minus_y = if v < 0.0 { v * 2.0 * -CL_NR } else { v * 2.0 * CL_PR };

            let b = rec_709_inverse_gamma(b_minus_y + y);
            let r = rec_709_inverse_gamma(r_minus_y + y);

            let y = rec_709_inverse_gamma(y);
            let g = (y - kr * r - kb * b) / kg;

            planes[0][i] = r;
            planes[1][i] = g;
            planes[2][i] = b;
        }
    }
}

struct Rec2020ClToYuvOperation;

impl Operation for Rec2020ClToYuvOperation {
    fn process(&self, planes: &mut [&mut [f32]; 3], left: usize, right: usize) {
        let kr = REC_2020_KR as f32;
        let kb = REC_2020_KB as f32;
        let kg = 1.0 - kr - kb;

        for i in left..right {
            let r = planes[0][i];
            let g = planes[1][i];
            let b = planes[2][i];

            let y = rec_709_gamma(kr * r + kg * g + kb * b);
            let b = rec_709_gamma(b);
            let r = rec_709_gamma(r);

            let u = if b - y < 0.0 { (b - y) / (2.0 * -CL_NB) } else { (b - y) / (2.0 * CL_PB) };
            let v = if r - y < 0.0 { (r - y) / (2.0 * -CL_NR) } else { (r - y) / (2.0 * CL_PR) };

            planes[0][i] = y;
            planes[1][i] = u;
            planes[2][i] = v;
        }
    }
}

/// Edge label in the colorspace graph; resolved to a concrete operation at
/// filter construction.
#[derive(Clone, Copy, Debug)]
pub(crate) enum EdgeOp {
    NclYuvToRgb(MatrixCoefficients),
    NclRgbToYuv(MatrixCoefficients),
    GammaToLinear(TransferCharacteristics),
    LinearToGamma(TransferCharacteristics),
    Cl2020YuvToRgb,
    Cl2020RgbToYuv,
    Gamut(ColorPrimaries, ColorPrimaries),
}

impl EdgeOp {
    /// The 3x3 matrix equivalent, for edges that are pure matrix operations.
    pub fn matrix(&self) -> Result<Option<Matrix3x3>> {
        match *self {
            EdgeOp::NclYuvToRgb(m) => ncl_yuv_to_rgb_matrix(m).map(Some),
            EdgeOp::NclRgbToYuv(m) => ncl_rgb_to_yuv_matrix(m).map(Some),
            EdgeOp::Gamut(pin, pout) => Ok(Some(gamut_xyz_to_rgb_matrix(pout)? * gamut_rgb_to_xyz_matrix(pin)?)),
            _ => Ok(None),
        }
    }

    pub fn create(&self, cpu: CpuFeatures) -> Result<Box<dyn Operation>> {
        match *self {
            EdgeOp::NclYuvToRgb(m) => Ok(create_matrix_operation(&ncl_yuv_to_rgb_matrix(m)?, cpu)),
            EdgeOp::NclRgbToYuv(m) => Ok(create_matrix_operation(&ncl_rgb_to_yuv_matrix(m)?, cpu)),
            EdgeOp::Gamut(pin, pout) => Ok(create_matrix_operation(&(gamut_xyz_to_rgb_matrix(pout)? * gamut_rgb_to_xyz_matrix(pin)?), cpu)),
            EdgeOp::GammaToLinear(TransferCharacteristics::Bt709) => Ok(Box::new(Rec709InverseGammaOperation)),
            EdgeOp::LinearToGamma(TransferCharacteristics::Bt709) => Ok(Box::new(Rec709GammaOperation)),
            EdgeOp::GammaToLinear(_) | EdgeOp::LinearToGamma(_) => Err(unsupported_error!("unsupported transfer function")),
            EdgeOp::Cl2020YuvToRgb => Ok(Box::new(Rec2020ClToRgbOperation)),
            EdgeOp::Cl2020RgbToYuv => Ok(Box::new(Rec2020ClToYuvOperation)),
        }
    }
}

pub(crate) fn create_matrix_operation(m: &Matrix3x3, _cpu: CpuFeatures) -> Box<dyn Operation> {
    Box::new(MatrixOperation::new(m))
}
