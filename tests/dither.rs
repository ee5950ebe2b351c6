use aligned_vec::{avec, AVec, ConstAlign};
use scanpipe::{
    DitherType, FilterGraph, GraphParams, ImageBufferMut, ImageBufferRef, ImageFormat, PixelType, PlaneMut, PlaneRef, ALIGNMENT,
};

struct Plane {
    data: AVec<u8, ConstAlign<64>>,
    stride: usize,
}

#[allow(dead_code)]
impl Plane {
    fn new(width: u32, height: u32, pixel_size: usize) -> Self {
        let stride = (width as usize * pixel_size + ALIGNMENT - 1) / ALIGNMENT * ALIGNMENT;

        Self {
            data: avec![[64]| 0u8; stride * height as usize],
            stride,
        }
    }

    fn as_ref(&self) -> PlaneRef<'_> {
        PlaneRef::from_slice(&self.data, self.stride)
    }

    fn as_mut(&mut self) -> PlaneMut<'_> {
        PlaneMut::from_slice(&mut self.data, self.stride)
    }

    fn row_f32_mut(&mut self, i: u32) -> &mut [f32] {
        bytemuck::cast_slice_mut(&mut self.data[i as usize * self.stride..(i + 1) as usize * self.stride])
    }

    fn row_u8(&self, i: u32) -> &[u8] {
        &self.data[i as usize * self.stride..(i + 1) as usize * self.stride]
    }
}

fn quantize_grey(dither: DitherType, width: u32, height: u32, src: &Plane, dst: &mut Plane) {
    let src_format = ImageFormat::new(width, height, PixelType::Float);
    let dst_format = ImageFormat::new(width, height, PixelType::Byte);

    let params = GraphParams {
        dither,
        ..Default::default()
    };
    let graph = FilterGraph::build(&src_format, &dst_format, &params).unwrap();

    let src_buf = ImageBufferRef::new([src.as_ref(), src.as_ref(), src.as_ref()]);
    let dst_buf = ImageBufferMut::new([dst.as_mut(), PlaneMut::empty(), PlaneMut::empty()]);
    let mut tmp = avec![[64]| 0u8; graph.tmp_size().unwrap()];

    graph.process(&src_buf, &dst_buf, &mut tmp, None, None).unwrap();
}

fn fill_constant(plane: &mut Plane, width: u32, height: u32, value: f32) {
    for i in 0..height {
        plane.row_f32_mut(i)[..width as usize].fill(value);
    }
}

// A mid-grey between two codes must dither into exactly the two bracketing
// codes, and the dithered mean must recover the input level.
#[test]
fn test_ordered_dither_mean() {
    let (width, height) = (256u32, 256u32);
    let value = 0.5 + 0.31 / 219.0; // between two 8-bit codes

    let mut src = Plane::new(width, height, 4);
    let mut dst = Plane::new(width, height, 1);

    fill_constant(&mut src, width, height, value);
    quantize_grey(DitherType::Ordered, width, height, &src, &mut dst);

    let expected = 16.0 + value * 219.0;
    let (floor, ceil) = (expected.floor() as u8, expected.ceil() as u8);

    let mut sum = 0u64;
    for i in 0..height {
        for &x in &dst.row_u8(i)[..width as usize] {
            assert!(x == floor || x == ceil, "unexpected code {}", x);
            sum += x as u64;
        }
    }

    let mean = sum as f64 / (width as u64 * height as u64) as f64;
    assert!((mean - expected as f64).abs() < 0.02, "mean {} expected {}", mean, expected);
}

#[test]
fn test_random_dither_is_deterministic() {
    let (width, height) = (128u32, 64u32);

    let mut src = Plane::new(width, height, 4);
    let mut dst_a = Plane::new(width, height, 1);
    let mut dst_b = Plane::new(width, height, 1);

    for i in 0..height {
        for (j, x) in src.row_f32_mut(i)[..width as usize].iter_mut().enumerate() {
            *x = (i as f32 / height as f32 + j as f32 / width as f32) / 2.0;
        }
    }

    quantize_grey(DitherType::Random, width, height, &src, &mut dst_a);
    quantize_grey(DitherType::Random, width, height, &src, &mut dst_b);

    for i in 0..height {
        assert_eq!(dst_a.row_u8(i)[..width as usize], dst_b.row_u8(i)[..width as usize], "row {}", i);
    }
}

// Error diffusion keeps local block means close to the input level.
#[test]
fn test_error_diffusion_preserves_block_means() {
    let (width, height) = (256u32, 256u32);

    let mut src = Plane::new(width, height, 4);
    let mut dst = Plane::new(width, height, 1);

    for i in 0..height {
        for (j, x) in src.row_f32_mut(i)[..width as usize].iter_mut().enumerate() {
            *x = j as f32 / (width - 1) as f32 * 0.8 + i as f32 / (height - 1) as f32 * 0.1;
        }
    }

    quantize_grey(DitherType::ErrorDiffusion, width, height, &src, &mut dst);

    for bi in 0..(height / 16) {
        for bj in 0..(width / 16) {
            let mut src_mean = 0.0f64;
            let mut dst_mean = 0.0f64;

            for i in bi * 16..(bi + 1) * 16 {
                let src_row: &[f32] = bytemuck::cast_slice(&src.data[i as usize * src.stride..(i + 1) as usize * src.stride]);
                let dst_row = dst.row_u8(i);

                for j in (bj * 16) as usize..((bj + 1) * 16) as usize {
                    src_mean += src_row[j] as f64;
                    dst_mean += (dst_row[j] as f64 - 16.0) / 219.0;
                }
            }

            src_mean /= 256.0;
            dst_mean /= 256.0;

            assert!((src_mean - dst_mean).abs() < 1.0 / 255.0, "block ({}, {}): {} vs {}", bi, bj, src_mean, dst_mean);
        }
    }
}

#[test]
fn test_dither_none_rounds_to_nearest() {
    let (width, height) = (64u32, 8u32);

    let mut src = Plane::new(width, height, 4);
    let mut dst = Plane::new(width, height, 1);

    fill_constant(&mut src, width, height, 100.4 / 219.0);
    quantize_grey(DitherType::None, width, height, &src, &mut dst);

    for i in 0..height {
        assert!(dst.row_u8(i)[..width as usize].iter().all(|&x| x == 116));
    }
}
