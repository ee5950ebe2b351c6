use aligned_vec::{avec, AVec, ConstAlign};
use scanpipe::{
    filter::{Filter, FilterFlags},
    resize::{create_resize_filter, BilinearKernel},
    unresize::create_unresize,
    CpuFeatures, ImageBufferMut, ImageBufferRef, PixelType, PlaneMut, PlaneRef, ALIGNMENT,
};

struct Plane {
    data: AVec<u8, ConstAlign<64>>,
    stride: usize,
}

impl Plane {
    fn new(width: u32, height: u32) -> Self {
        let stride = (width as usize * 4 + ALIGNMENT - 1) / ALIGNMENT * ALIGNMENT;

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
}

fn run_filter(filter: &dyn Filter, src: &Plane, dst: &mut Plane) {
    let attr = filter.image_attributes();
    let src_buf = ImageBufferRef::new([src.as_ref(), src.as_ref(), src.as_ref()]);
    let dst_buf = ImageBufferMut::new([dst.as_mut(), PlaneMut::empty(), PlaneMut::empty()]);

    let mut ctx = avec![[64]| 0u8; filter.context_size().max(64)];
    let mut tmp = avec![[64]| 0u8; filter.tmp_size(0, attr.width).max(64)];

    filter.init_context(&mut ctx);

    let step = if filter.flags().contains(FilterFlags::ENTIRE_PLANE) {
        attr.height
    } else {
        filter.simultaneous_lines()
    };

    let mut i = 0;
    while i < attr.height {
        filter.process(&mut ctx, &src_buf, &dst_buf, &mut tmp, i, 0, attr.width).unwrap();
        i += step;
    }
}

// Least-squares inversion of a bilinear upscale recovers the original.
#[test]
fn test_unresize_inverts_bilinear_upscale() {
    let (orig_w, orig_h) = (40u32, 24u32);
    let (up_w, up_h) = (80u32, 48u32);

    let mut original = Plane::new(orig_w, orig_h);
    let mut upscaled = Plane::new(up_w, up_h);
    let mut recovered = Plane::new(orig_w, orig_h);

    for i in 0..orig_h {
        for (j, x) in original.row_f32_mut(i)[..orig_w as usize].iter_mut().enumerate() {
            *x = ((i as f32 * 0.7).sin() + (j as f32 * 0.3).cos()) * 0.25 + 0.5;
        }
    }

    let upscale = create_resize_filter(
        &BilinearKernel,
        PixelType::Float,
        32,
        orig_w,
        orig_h,
        up_w,
        up_h,
        0.0,
        0.0,
        orig_w as f64,
        orig_h as f64,
        CpuFeatures::None,
    )
    .unwrap();
    run_filter(upscale.as_ref(), &original, &mut upscaled);

    let unresize = create_unresize(PixelType::Float, up_w, up_h, orig_w, orig_h, 0.0, 0.0, CpuFeatures::None).unwrap();
    run_filter(unresize.as_ref(), &upscaled, &mut recovered);

    for i in 0..orig_h {
        for j in 0..orig_w as usize {
            let x = original.row_f32(i)[j];
            let y = recovered.row_f32(i)[j];
            assert!((x - y).abs() < 1e-3, "({}, {}): {} vs {}", i, j, x, y);
        }
    }
}

#[test]
fn test_unresize_identity_is_copy() {
    let (width, height) = (33u32, 17u32);

    let filter = create_unresize(PixelType::Float, width, height, width, height, 0.0, 0.0, CpuFeatures::None).unwrap();

    let mut src = Plane::new(width, height);
    let mut dst = Plane::new(width, height);

    for i in 0..height {
        for (j, x) in src.row_f32_mut(i)[..width as usize].iter_mut().enumerate() {
            *x = (i * 100 + j as u32) as f32;
        }
    }

    run_filter(filter.as_ref(), &src, &mut dst);

    for i in 0..height {
        assert_eq!(src.row_f32(i)[..width as usize], dst.row_f32(i)[..width as usize]);
    }
}

#[test]
fn test_unresize_rejects_integer_types() {
    let err = create_unresize(PixelType::Word, 80, 48, 40, 24, 0.0, 0.0, CpuFeatures::None).unwrap_err();
    assert_eq!(err.code(), 400);
}
