use std::ops::{Add, BitAnd, Not, Shl, Shr, Sub};

use num_traits::One;

/// 64-byte alignment covers vector units up to AVX-512.
pub(crate) const ALIGNMENT: usize = 64;

/// Number of samples of `T` in one aligned block.
pub(crate) const fn alignment_of<T>() -> usize {
    ALIGNMENT / std::mem::size_of::<T>()
}

pub(crate) fn align_to<T>(value: T, alignment: T) -> T
where
    T: Copy + Add<Output = T> + Sub<Output = T> + BitAnd<Output = T> + Not<Output = T> + One,
{
    (value + alignment - T::one()) & !(alignment - T::one())
}

#[allow(dead_code)]
pub(crate) fn ceil_rshift<T>(value: T, shift: T) -> T
where
    T: Copy + Add<Output = T> + Sub<Output = T> + Shl<Output = T> + Shr<Output = T> + One,
{
    (value + (T::one() << shift) - T::one()) >> shift
}

/// Round `value` down to a multiple of `alignment`.
pub(crate) fn floor_to(value: u32, alignment: u32) -> u32 {
    value - value % alignment
}
