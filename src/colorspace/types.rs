/// Kr and Kb YUV<->RGB constants.
pub(crate) const REC_601_KR: f64 = 0.299;
pub(crate) const REC_601_KB: f64 = 0.114;
pub(crate) const REC_709_KR: f64 = 0.2126;
pub(crate) const REC_709_KB: f64 = 0.0722;
pub(crate) const REC_2020_KR: f64 = 0.2627;
pub(crate) const REC_2020_KB: f64 = 0.0593;

/// R, G, B primaries in xy.
pub(crate) const SMPTE_C_PRIMARIES: [[f64; 2]; 3] = [[0.630, 0.340], [0.310, 0.595], [0.155, 0.070]];
pub(crate) const REC_709_PRIMARIES: [[f64; 2]; 3] = [[0.640, 0.330], [0.300, 0.600], [0.150, 0.060]];
pub(crate) const REC_2020_PRIMARIES: [[f64; 2]; 3] = [[0.708, 0.292], [0.170, 0.797], [0.131, 0.046]];

/// D65 white point in xy.
pub(crate) const ILLUMINANT_D65: [f64; 2] = [0.3127, 0.3290];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MatrixCoefficients {
    Unspecified,
    Rgb,
    Bt601,
    Bt709,
    Bt2020Ncl,
    Bt2020Cl,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransferCharacteristics {
    Unspecified,
    Linear,
    Bt709,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ColorPrimaries {
    Unspecified,
    SmpteC,
    Bt709,
    Bt2020,
}

pub(crate) const ALL_MATRICES: [MatrixCoefficients; 5] = [
    MatrixCoefficients::Rgb,
    MatrixCoefficients::Bt601,
    MatrixCoefficients::Bt709,
    MatrixCoefficients::Bt2020Ncl,
    MatrixCoefficients::Bt2020Cl,
];

pub(crate) const ALL_TRANSFERS: [TransferCharacteristics; 2] = [TransferCharacteristics::Linear, TransferCharacteristics::Bt709];

pub(crate) const ALL_PRIMARIES: [ColorPrimaries; 3] = [ColorPrimaries::SmpteC, ColorPrimaries::Bt709, ColorPrimaries::Bt2020];

/// Definition of a working colorspace.
///
/// The combination of a constant-luminance matrix with a linear transfer
/// function does not exist; `is_valid` rejects it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Colorspace {
    pub matrix: MatrixCoefficients,
    pub transfer: TransferCharacteristics,
    pub primaries: ColorPrimaries,
}

impl Colorspace {
    pub const fn new(matrix: MatrixCoefficients, transfer: TransferCharacteristics, primaries: ColorPrimaries) -> Self {
        Self {
            matrix,
            transfer,
            primaries,
        }
    }

    pub fn is_valid(&self) -> bool {
        !(self.matrix == MatrixCoefficients::Bt2020Cl && self.transfer == TransferCharacteristics::Linear)
    }

    pub fn with_matrix(self, matrix: MatrixCoefficients) -> Self {
        Self {
            matrix,
            ..self
        }
    }

    pub fn with_transfer(self, transfer: TransferCharacteristics) -> Self {
        Self {
            transfer,
            ..self
        }
    }

    pub fn with_primaries(self, primaries: ColorPrimaries) -> Self {
        Self {
            primaries,
            ..self
        }
    }

    pub fn to_rgb(self) -> Self {
        self.with_matrix(MatrixCoefficients::Rgb)
    }

    pub fn to_linear(self) -> Self {
        self.with_transfer(TransferCharacteristics::Linear)
    }
}
