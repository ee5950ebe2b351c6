use aligned_vec::{avec, AVec, ConstAlign};
use half::f16;
use scanpipe::{FilterGraph, GraphParams, ImageBufferMut, ImageBufferRef, ImageFormat, PixelRange, PixelType, PlaneMut, PlaneRef, ALIGNMENT};

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

    fn row_f32(&self, i: u32) -> &[f32] {
        bytemuck::cast_slice(&self.data[i as usize * self.stride..(i + 1) as usize * self.stride])
    }

    fn row_f32_mut(&mut self, i: u32) -> &mut [f32] {
        bytemuck::cast_slice_mut(&mut self.data[i as usize * self.stride..(i + 1) as usize * self.stride])
    }

    fn row_u8(&self, i: u32) -> &[u8] {
        &self.data[i as usize * self.stride..(i + 1) as usize * self.stride]
    }

    fn row_u8_mut(&mut self, i: u32) -> &mut [u8] {
        &mut self.data[i as usize * self.stride..(i + 1) as usize * self.stride]
    }

    fn row_u16(&self, i: u32) -> &[u16] {
        bytemuck::cast_slice(&self.data[i as usize * self.stride..(i + 1) as usize * self.stride])
    }
}

fn convert_grey(src_format: &ImageFormat, dst_format: &ImageFormat, src: &Plane, dst: &mut Plane) {
    let graph = FilterGraph::build(src_format, dst_format, &GraphParams::default()).unwrap();

    let src_buf = ImageBufferRef::new([src.as_ref(), src.as_ref(), src.as_ref()]);
    let dst_buf = ImageBufferMut::new([dst.as_mut(), PlaneMut::empty(), PlaneMut::empty()]);
    let mut tmp = avec![[64]| 0u8; graph.tmp_size().unwrap()];

    graph.process(&src_buf, &dst_buf, &mut tmp, None, None).unwrap();
}

#[test]
fn test_byte_limited_to_float() {
    let (width, height) = (64u32, 16u32);

    let src_format = ImageFormat::new(width, height, PixelType::Byte);
    let dst_format = ImageFormat::new(width, height, PixelType::Float);

    let mut src = Plane::new(width, height, 1);
    let mut dst = Plane::new(width, height, 4);

    for i in 0..height {
        let row = src.row_u8_mut(i);
        row[0] = 16;
        row[1] = 235;
        row[2] = 126;
        for j in 3..width as usize {
            row[j] = (j % 256) as u8;
        }
    }

    convert_grey(&src_format, &dst_format, &src, &mut dst);

    for i in 0..height {
        let row = dst.row_f32(i);
        assert!((row[0] - 0.0).abs() < 1e-6);
        assert!((row[1] - 1.0).abs() < 1e-6);
        assert!((row[2] - 110.0 / 219.0).abs() < 1e-6);
    }
}

#[test]
fn test_full_range_byte_to_float() {
    let (width, height) = (32u32, 8u32);

    let mut src_format = ImageFormat::new(width, height, PixelType::Byte);
    src_format.pixel_range = PixelRange::Full;
    let dst_format = ImageFormat::new(width, height, PixelType::Float);

    let mut src = Plane::new(width, height, 1);
    let mut dst = Plane::new(width, height, 4);

    for i in 0..height {
        src.row_u8_mut(i)[..width as usize].fill(255);
        src.row_u8_mut(i)[0] = 0;
    }

    convert_grey(&src_format, &dst_format, &src, &mut dst);

    for i in 0..height {
        assert!((dst.row_f32(i)[0] - 0.0).abs() < 1e-6);
        assert!((dst.row_f32(i)[1] - 1.0).abs() < 1e-6);
    }
}

// Quantizing to 8 bits and back lands on the quantization grid.
#[test]
fn test_float_byte_float_round_trip() {
    let (width, height) = (128u32, 8u32);

    let float_format = ImageFormat::new(width, height, PixelType::Float);
    let byte_format = ImageFormat::new(width, height, PixelType::Byte);

    let mut original = Plane::new(width, height, 4);
    let mut quantized = Plane::new(width, height, 1);
    let mut recovered = Plane::new(width, height, 4);

    for i in 0..height {
        for (j, x) in original.row_f32_mut(i)[..width as usize].iter_mut().enumerate() {
            *x = j as f32 / (width - 1) as f32;
        }
    }

    convert_grey(&float_format, &byte_format, &original, &mut quantized);
    convert_grey(&byte_format, &float_format, &quantized, &mut recovered);

    for i in 0..height {
        for j in 0..width as usize {
            let x = original.row_f32(i)[j];
            let y = recovered.row_f32(i)[j];

            // One quantization step of 8-bit TV range.
            assert!((x - y).abs() <= 0.5 / 219.0 + 1e-6, "({}, {}): {} vs {}", i, j, x, y);
        }
    }
}

#[test]
fn test_word_10bit_to_word_16bit() {
    let (width, height) = (64u32, 8u32);

    let mut src_format = ImageFormat::new(width, height, PixelType::Word);
    src_format.depth = 10;
    let dst_format = ImageFormat::new(width, height, PixelType::Word);

    let mut src = Plane::new(width, height, 2);
    let mut dst = Plane::new(width, height, 2);

    for i in 0..height {
        let row: &mut [u16] = bytemuck::cast_slice_mut(&mut src.data[i as usize * src.stride..(i + 1) as usize * src.stride]);
        row[..width as usize].fill(64); // 10-bit TV black
    }

    convert_grey(&src_format, &dst_format, &src, &mut dst);

    for i in 0..height {
        // 16-bit TV black.
        assert!(dst.row_u16(i)[..width as usize].iter().all(|&x| x == 4096), "row {}", i);
    }
}

#[test]
fn test_float_half_round_trip() {
    let (width, height) = (64u32, 8u32);

    let float_format = ImageFormat::new(width, height, PixelType::Float);
    let half_format = ImageFormat::new(width, height, PixelType::Half);

    let mut original = Plane::new(width, height, 4);
    let mut narrowed = Plane::new(width, height, 2);
    let mut recovered = Plane::new(width, height, 4);

    for i in 0..height {
        for (j, x) in original.row_f32_mut(i)[..width as usize].iter_mut().enumerate() {
            *x = j as f32 / 100.0;
        }
    }

    convert_grey(&float_format, &half_format, &original, &mut narrowed);

    for i in 0..height {
        for j in 0..width as usize {
            let expected = f16::from_f32(original.row_f32(i)[j]).to_bits();
            assert_eq!(narrowed.row_u16(i)[j], expected, "({}, {})", i, j);
        }
    }

    convert_grey(&half_format, &float_format, &narrowed, &mut recovered);

    for i in 0..height {
        for j in 0..width as usize {
            let x = original.row_f32(i)[j];
            let y = recovered.row_f32(i)[j];
            assert!((x - y).abs() <= x.abs() * 1e-3 + 1e-4, "({}, {}): {} vs {}", i, j, x, y);
        }
    }
}
