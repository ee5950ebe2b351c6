use aligned_vec::{avec, AVec, ConstAlign};
use scanpipe::{
    depth::create_depth_filter,
    filter::{CopyFilter, Filter},
    graph::{MuxFilter, PairFilter},
    CpuFeatures, DitherType, ImageBufferMut, ImageBufferRef, PixelFormat, PixelType, PlaneMut, PlaneRef, ALIGNMENT,
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

    fn row_u8(&self, i: u32) -> &[u8] {
        &self.data[i as usize * self.stride..(i + 1) as usize * self.stride]
    }

    fn row_u8_mut(&mut self, i: u32) -> &mut [u8] {
        &mut self.data[i as usize * self.stride..(i + 1) as usize * self.stride]
    }

    fn row_f32(&self, i: u32) -> &[f32] {
        bytemuck::cast_slice(&self.data[i as usize * self.stride..(i + 1) as usize * self.stride])
    }
}

fn run_grey(filter: &dyn Filter, src: &Plane, dst: &mut Plane) {
    let attr = filter.image_attributes();
    let src_buf = ImageBufferRef::new([src.as_ref(), src.as_ref(), src.as_ref()]);
    let dst_buf = ImageBufferMut::new([dst.as_mut(), PlaneMut::empty(), PlaneMut::empty()]);

    let mut ctx = avec![[64]| 0u8; filter.context_size().max(64)];
    let mut tmp = avec![[64]| 0u8; filter.tmp_size(0, attr.width).max(64)];

    filter.init_context(&mut ctx);

    let mut i = 0;
    while i < attr.height {
        filter.process(&mut ctx, &src_buf, &dst_buf, &mut tmp, i, 0, attr.width).unwrap();
        i += filter.simultaneous_lines();
    }
}

fn byte_format(fullrange: bool) -> PixelFormat {
    PixelFormat::new(PixelType::Byte, 8, fullrange, false)
}

fn word_format(depth: u32) -> PixelFormat {
    PixelFormat::new(PixelType::Word, depth, false, false)
}

// Chaining through PairFilter must match running the stages one after the
// other through an intermediate plane.
#[test]
fn test_pair_filter_matches_sequential_stages() {
    let (width, height) = (96u32, 48u32);

    let make_first = || create_depth_filter(DitherType::None, width, height, &byte_format(false), &word_format(16), CpuFeatures::None).unwrap();
    let make_second = || {
        create_depth_filter(
            DitherType::None,
            width,
            height,
            &word_format(16),
            &PixelFormat::new(PixelType::Float, 32, false, false),
            CpuFeatures::None,
        )
        .unwrap()
    };

    let mut src = Plane::new(width, height, 1);
    for i in 0..height {
        for (j, x) in src.row_u8_mut(i)[..width as usize].iter_mut().enumerate() {
            *x = ((i as usize * 7 + j * 3) % 256) as u8;
        }
    }

    let mut intermediate = Plane::new(width, height, 2);
    let mut sequential = Plane::new(width, height, 4);
    run_grey(make_first().as_ref(), &src, &mut intermediate);
    run_grey(make_second().as_ref(), &intermediate, &mut sequential);

    let pair = PairFilter::new(make_first(), make_second()).unwrap();
    let mut chained = Plane::new(width, height, 4);
    run_grey(&pair, &src, &mut chained);

    for i in 0..height {
        assert_eq!(sequential.row_f32(i)[..width as usize], chained.row_f32(i)[..width as usize], "row {}", i);
    }
}

// Muxing a greyscale filter over three planes matches three single-plane
// invocations.
#[test]
fn test_mux_filter_matches_per_plane_runs() {
    let (width, height) = (64u32, 32u32);

    let make_filter = || create_depth_filter(DitherType::None, width, height, &byte_format(true), &byte_format(false), CpuFeatures::None).unwrap();

    let mut src_planes = [Plane::new(width, height, 1), Plane::new(width, height, 1), Plane::new(width, height, 1)];
    for (p, plane) in src_planes.iter_mut().enumerate() {
        for i in 0..height {
            for (j, x) in plane.row_u8_mut(i)[..width as usize].iter_mut().enumerate() {
                *x = ((i as usize * 5 + j + p * 11) % 256) as u8;
            }
        }
    }

    let mut expected = [Plane::new(width, height, 1), Plane::new(width, height, 1), Plane::new(width, height, 1)];
    for p in 0..3 {
        run_grey(make_filter().as_ref(), &src_planes[p], &mut expected[p]);
    }

    let mux = MuxFilter::new(make_filter(), None).unwrap();
    let mut dst_planes = [Plane::new(width, height, 1), Plane::new(width, height, 1), Plane::new(width, height, 1)];

    {
        let src_buf = ImageBufferRef::new([src_planes[0].as_ref(), src_planes[1].as_ref(), src_planes[2].as_ref()]);
        let [d0, d1, d2] = &mut dst_planes;
        let dst_buf = ImageBufferMut::new([d0.as_mut(), d1.as_mut(), d2.as_mut()]);

        let mut ctx = avec![[64]| 0u8; mux.context_size().max(64)];
        let mut tmp = avec![[64]| 0u8; mux.tmp_size(0, width).max(64)];

        mux.init_context(&mut ctx);
        for i in 0..height {
            mux.process(&mut ctx, &src_buf, &dst_buf, &mut tmp, i, 0, width).unwrap();
        }
    }

    for p in 0..3 {
        for i in 0..height {
            assert_eq!(expected[p].row_u8(i)[..width as usize], dst_planes[p].row_u8(i)[..width as usize], "plane {} row {}", p, i);
        }
    }
}

// Processing a column band must leave everything outside the band intact.
#[test]
fn test_partial_band_leaves_guard_area_untouched() {
    let (width, height) = (64u32, 16u32);

    let filter = create_depth_filter(DitherType::None, width, height, &byte_format(true), &byte_format(false), CpuFeatures::None).unwrap();

    let mut src = Plane::new(width, height, 1);
    for i in 0..height {
        src.row_u8_mut(i)[..width as usize].fill(200);
    }

    let mut dst = Plane::new(width, height, 1);
    dst.data.fill(0xCD);

    let src_buf = ImageBufferRef::new([src.as_ref(), src.as_ref(), src.as_ref()]);
    let dst_buf = ImageBufferMut::new([dst.as_mut(), PlaneMut::empty(), PlaneMut::empty()]);

    let mut ctx = avec![[64]| 0u8; 64];
    let mut tmp = avec![[64]| 0u8; 64];

    let (row, left, right) = (5u32, 8usize, 24usize);
    filter.process(&mut ctx, &src_buf, &dst_buf, &mut tmp, row, left as u32, right as u32).unwrap();

    for i in 0..height {
        for j in 0..width as usize {
            let x = dst.row_u8(i)[j];
            if i == row && j >= left && j < right {
                assert_ne!(x, 0xCD, "({}, {}) not written", i, j);
            } else {
                assert_eq!(x, 0xCD, "({}, {}) modified outside band", i, j);
            }
        }
    }
}

// An in-place capable filter must give the same answer when src aliases dst.
#[test]
fn test_in_place_matches_out_of_place() {
    let (width, height) = (64u32, 16u32);

    let filter = create_depth_filter(DitherType::Ordered, width, height, &byte_format(true), &byte_format(false), CpuFeatures::None).unwrap();

    let mut src = Plane::new(width, height, 1);
    for i in 0..height {
        for (j, x) in src.row_u8_mut(i)[..width as usize].iter_mut().enumerate() {
            *x = ((i as usize * 13 + j * 7) % 256) as u8;
        }
    }

    let mut separate = Plane::new(width, height, 1);
    run_grey(filter.as_ref(), &src, &mut separate);

    // Run again with src aliasing dst.
    let mut inplace = Plane::new(width, height, 1);
    inplace.data.copy_from_slice(&src.data);

    {
        let stride = inplace.stride as isize;
        let ptr = inplace.data.as_mut_ptr();
        let src_buf = ImageBufferRef::new([unsafe { PlaneRef::from_raw(ptr, stride, u32::MAX) }, PlaneRef::empty(), PlaneRef::empty()]);
        let dst_buf = ImageBufferMut::new([unsafe { PlaneMut::from_raw(ptr, stride, u32::MAX) }, PlaneMut::empty(), PlaneMut::empty()]);

        let mut ctx = avec![[64]| 0u8; 64];
        let mut tmp = avec![[64]| 0u8; 64];

        for i in 0..height {
            filter.process(&mut ctx, &src_buf, &dst_buf, &mut tmp, i, 0, width).unwrap();
        }
    }

    for i in 0..height {
        assert_eq!(separate.row_u8(i)[..width as usize], inplace.row_u8(i)[..width as usize], "row {}", i);
    }
}
