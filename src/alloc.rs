use crate::utils::{align_to, ALIGNMENT};

/// Bump allocator carving a caller-provided arena.
///
/// Every sub-allocation is rounded up to the crate alignment, so typed views
/// of the returned slices stay aligned as long as the arena itself is.
pub(crate) struct LinearAllocator<'a> {
    buf: &'a mut [u8],
}

impl<'a> LinearAllocator<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self {
            buf,
        }
    }

    pub fn allocate(&mut self, bytes: usize) -> &'a mut [u8] {
        let n = align_to(bytes, ALIGNMENT);
        let buf = std::mem::take(&mut self.buf);
        let (head, rest) = buf.split_at_mut(n);

        self.buf = rest;
        head
    }
}

/// Counting twin of [`LinearAllocator`]; sizes an arena without memory.
pub(crate) struct FakeAllocator {
    count: usize,
}

impl FakeAllocator {
    pub fn new() -> Self {
        Self {
            count: 0,
        }
    }

    pub fn allocate(&mut self, bytes: usize) {
        self.count += align_to(bytes, ALIGNMENT);
    }

    pub fn count(&self) -> usize {
        self.count
    }
}
