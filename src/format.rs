use num_enum::TryFromPrimitive;

use crate::pixel::PixelType;

/// Plane layout of an image.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, TryFromPrimitive)]
pub enum ColorFamily {
    #[default]
    Grey = 0, // single image plane
    Rgb,      // generic RGB color image
    Yuv,      // generic YUV color image
}

/// YUV transform matrix, numbered as in ITU-T H.264 / H.265.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, TryFromPrimitive)]
pub enum ColorMatrix {
    Rgb = 0,     // identity
    Bt709 = 1,   // BT.709
    #[default]
    Unspecified = 2,
    Bt470Bg = 5,   // BT.601 PAL & SECAM
    Smpte170M = 6, // BT.601 NTSC, equivalent to 5
    Bt2020Ncl = 9, // BT.2020 non-constant luminance
    Bt2020Cl = 10, // BT.2020 constant luminance
}

/// Transfer characteristics, numbered as in ITU-T H.264 / H.265.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, TryFromPrimitive)]
pub enum ColorTransferCharacteristics {
    Bt709 = 1, // BT.709
    #[default]
    Unspecified = 2,
    Smpte170M = 6, // BT.601, equivalent to 1
    Linear = 8,    // linear light
    Bt2020_10 = 14, // BT.2020 10-bit, equivalent to 1
    Bt2020_12 = 15, // BT.2020 12-bit, equivalent to 1
}

/// Color primaries, numbered as in ITU-T H.264 / H.265.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, TryFromPrimitive)]
pub enum ColorPrimaries {
    Bt709 = 1, // BT.709
    #[default]
    Unspecified = 2,
    Smpte170M = 6, // SMPTE C
    Smpte240M = 7, // equivalent to 6
    Bt2020 = 9,    // BT.2020
}

/// Mapping of integer codes to normalized sample values.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, TryFromPrimitive)]
pub enum PixelRange {
    #[default]
    Limited = 0, // studio (TV) legal range, 16-235 in 8 bits
    Full,        // full (PC) dynamic range, 0-255 in 8 bits
}

/// Field parity for images processed as separated fields.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, TryFromPrimitive)]
pub enum FieldParity {
    #[default]
    Progressive = 0,
    Top,
    Bottom,
}

/// Sub-pixel position of chroma samples relative to luma.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, TryFromPrimitive)]
pub enum ChromaLocation {
    #[default]
    Left = 0, // MPEG-2
    Center,     // MPEG-1 / JPEG
    TopLeft,    // DV
    Top,
    BottomLeft,
    Bottom,
}

/// Full description of an image: resolution, storage, and interpretation.
///
/// `depth == 0` selects the native depth of the pixel type. Unspecified
/// colorspace components are legal as long as no conversion touches them.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ImageFormat {
    pub width: u32,
    pub height: u32,
    pub pixel_type: PixelType,
    pub subsample_w: u32,
    pub subsample_h: u32,
    pub color_family: ColorFamily,
    pub matrix: ColorMatrix,
    pub transfer: ColorTransferCharacteristics,
    pub primaries: ColorPrimaries,
    pub depth: u32,
    pub pixel_range: PixelRange,
    pub field_parity: FieldParity,
    pub chroma_location: ChromaLocation,
}

impl ImageFormat {
    pub fn new(width: u32, height: u32, pixel_type: PixelType) -> Self {
        Self {
            width,
            height,
            pixel_type,
            subsample_w: 0,
            subsample_h: 0,
            color_family: ColorFamily::default(),
            matrix: ColorMatrix::default(),
            transfer: ColorTransferCharacteristics::default(),
            primaries: ColorPrimaries::default(),
            depth: 0,
            pixel_range: PixelRange::default(),
            field_parity: FieldParity::default(),
            chroma_location: ChromaLocation::default(),
        }
    }
}
