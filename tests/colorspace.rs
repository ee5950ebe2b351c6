use aligned_vec::{avec, AVec, ConstAlign};
use scanpipe::{
    colorspace::{ColorPrimaries, Colorspace, ColorspaceFilter, MatrixCoefficients, TransferCharacteristics},
    filter::Filter,
    CpuFeatures, ImageBufferMut, ImageBufferRef, PlaneMut, PlaneRef, ALIGNMENT,
};

struct Image {
    planes: [AVec<u8, ConstAlign<64>>; 3],
    stride: usize,
    width: u32,
    height: u32,
}

impl Image {
    fn new(width: u32, height: u32) -> Self {
        let stride = (width as usize * 4 + ALIGNMENT - 1) / ALIGNMENT * ALIGNMENT;

        Self {
            planes: [
                avec![[64]| 0u8; stride * height as usize],
                avec![[64]| 0u8; stride * height as usize],
                avec![[64]| 0u8; stride * height as usize],
            ],
            stride,
            width,
            height,
        }
    }

    fn as_ref(&self) -> ImageBufferRef<'_> {
        ImageBufferRef::new([
            PlaneRef::from_slice(&self.planes[0], self.stride),
            PlaneRef::from_slice(&self.planes[1], self.stride),
            PlaneRef::from_slice(&self.planes[2], self.stride),
        ])
    }

    fn as_mut(&mut self) -> ImageBufferMut<'_> {
        let [p0, p1, p2] = &mut self.planes;

        ImageBufferMut::new([
            PlaneMut::from_slice(p0, self.stride),
            PlaneMut::from_slice(p1, self.stride),
            PlaneMut::from_slice(p2, self.stride),
        ])
    }

    fn pixel(&self, p: usize, i: u32, j: u32) -> f32 {
        let row: &[f32] = bytemuck::cast_slice(&self.planes[p][i as usize * self.stride..(i + 1) as usize * self.stride]);
        row[j as usize]
    }

    fn set_pixel(&mut self, p: usize, i: u32, j: u32, value: f32) {
        let row: &mut [f32] = bytemuck::cast_slice_mut(&mut self.planes[p][i as usize * self.stride..(i + 1) as usize * self.stride]);
        row[j as usize] = value;
    }
}

fn run_conversion(src: &Image, dst: &mut Image, csp_in: &Colorspace, csp_out: &Colorspace) {
    let filter = ColorspaceFilter::new(src.width, src.height, csp_in, csp_out, CpuFeatures::None).unwrap();
    let src_buf = src.as_ref();
    let dst_buf = dst.as_mut();

    let mut ctx = avec![[64]| 0u8; 64];
    let mut tmp = avec![[64]| 0u8; 64];

    for i in 0..src.height {
        filter.process(&mut ctx, &src_buf, &dst_buf, &mut tmp, i, 0, src.width).unwrap();
    }
}

const RGB_709_GAMMA: Colorspace = Colorspace::new(MatrixCoefficients::Rgb, TransferCharacteristics::Bt709, ColorPrimaries::Bt709);
const RGB_709_LINEAR: Colorspace = Colorspace::new(MatrixCoefficients::Rgb, TransferCharacteristics::Linear, ColorPrimaries::Bt709);
const YUV_709: Colorspace = Colorspace::new(MatrixCoefficients::Bt709, TransferCharacteristics::Bt709, ColorPrimaries::Bt709);
const YUV_2020_NCL: Colorspace = Colorspace::new(MatrixCoefficients::Bt2020Ncl, TransferCharacteristics::Bt709, ColorPrimaries::Bt2020);
const YUV_2020_CL: Colorspace = Colorspace::new(MatrixCoefficients::Bt2020Cl, TransferCharacteristics::Bt709, ColorPrimaries::Bt2020);

fn fill_test_colors(image: &mut Image) {
    for i in 0..image.height {
        for j in 0..image.width {
            let t = (i * image.width + j) as f32 / (image.width * image.height) as f32;

            image.set_pixel(0, i, j, 0.1 + 0.8 * t);
            image.set_pixel(1, i, j, 0.9 - 0.7 * t);
            image.set_pixel(2, i, j, 0.2 + 0.6 * t * t);
        }
    }
}

#[test]
fn test_identity_conversion() {
    let (width, height) = (32u32, 8u32);

    let mut src = Image::new(width, height);
    let mut dst = Image::new(width, height);

    fill_test_colors(&mut src);
    run_conversion(&src, &mut dst, &YUV_709, &YUV_709);

    for p in 0..3 {
        for i in 0..height {
            for j in 0..width {
                assert_eq!(src.pixel(p, i, j), dst.pixel(p, i, j), "plane {} ({}, {})", p, i, j);
            }
        }
    }
}

#[test]
fn test_rgb_yuv_709_round_trip() {
    let (width, height) = (32u32, 8u32);

    let mut rgb = Image::new(width, height);
    let mut yuv = Image::new(width, height);
    let mut back = Image::new(width, height);

    fill_test_colors(&mut rgb);
    run_conversion(&rgb, &mut yuv, &RGB_709_GAMMA, &YUV_709);
    run_conversion(&yuv, &mut back, &YUV_709, &RGB_709_GAMMA);

    for p in 0..3 {
        for i in 0..height {
            for j in 0..width {
                let x = rgb.pixel(p, i, j);
                let y = back.pixel(p, i, j);
                assert!((x - y).abs() < 1e-5, "plane {} ({}, {}): {} vs {}", p, i, j, x, y);
            }
        }
    }
}

#[test]
fn test_neutral_grey_has_zero_chroma() {
    let (width, height) = (16u32, 4u32);

    let mut rgb = Image::new(width, height);
    let mut yuv = Image::new(width, height);

    for i in 0..height {
        for j in 0..width {
            for p in 0..3 {
                rgb.set_pixel(p, i, j, 0.5);
            }
        }
    }

    run_conversion(&rgb, &mut yuv, &RGB_709_GAMMA, &YUV_709);

    for i in 0..height {
        for j in 0..width {
            assert!((yuv.pixel(0, i, j) - 0.5).abs() < 1e-6);
            assert!(yuv.pixel(1, i, j).abs() < 1e-6);
            assert!(yuv.pixel(2, i, j).abs() < 1e-6);
        }
    }
}

// Linear RGB in BT.709 primaries to gamma-encoded BT.2020 YUV crosses a
// transfer, a gamut, and a matrix step.
#[test]
fn test_linear_709_rgb_to_2020_ncl_round_trip() {
    let (width, height) = (32u32, 8u32);

    let mut rgb = Image::new(width, height);
    let mut yuv = Image::new(width, height);
    let mut back = Image::new(width, height);

    fill_test_colors(&mut rgb);
    run_conversion(&rgb, &mut yuv, &RGB_709_LINEAR, &YUV_2020_NCL);

    for i in 0..height {
        for j in 0..width {
            assert!(yuv.pixel(0, i, j) > -0.01 && yuv.pixel(0, i, j) < 1.01);
            assert!(yuv.pixel(1, i, j).abs() <= 0.5 + 1e-5);
            assert!(yuv.pixel(2, i, j).abs() <= 0.5 + 1e-5);
        }
    }

    run_conversion(&yuv, &mut back, &YUV_2020_NCL, &RGB_709_LINEAR);

    for p in 0..3 {
        for i in 0..height {
            for j in 0..width {
                let x = rgb.pixel(p, i, j);
                let y = back.pixel(p, i, j);
                assert!((x - y).abs() < 1e-4, "plane {} ({}, {}): {} vs {}", p, i, j, x, y);
            }
        }
    }
}

#[test]
fn test_2020_cl_round_trip() {
    let (width, height) = (32u32, 8u32);

    let mut rgb = Image::new(width, height);
    let mut yuv = Image::new(width, height);
    let mut back = Image::new(width, height);

    let linear_2020 = Colorspace::new(MatrixCoefficients::Rgb, TransferCharacteristics::Linear, ColorPrimaries::Bt2020);

    fill_test_colors(&mut rgb);
    run_conversion(&rgb, &mut yuv, &linear_2020, &YUV_2020_CL);
    run_conversion(&yuv, &mut back, &YUV_2020_CL, &linear_2020);

    for p in 0..3 {
        for i in 0..height {
            for j in 0..width {
                let x = rgb.pixel(p, i, j);
                let y = back.pixel(p, i, j);
                assert!((x - y).abs() < 1e-4, "plane {} ({}, {}): {} vs {}", p, i, j, x, y);
            }
        }
    }
}

#[test]
fn test_invalid_colorspace_rejected() {
    let invalid = Colorspace::new(MatrixCoefficients::Bt2020Cl, TransferCharacteristics::Linear, ColorPrimaries::Bt2020);

    let err = ColorspaceFilter::new(64, 64, &invalid, &YUV_709, CpuFeatures::None).unwrap_err();
    assert_eq!(err.code(), 300);
}
