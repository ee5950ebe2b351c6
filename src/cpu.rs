use std::sync::atomic::{AtomicU32, Ordering};

use cfg_if::cfg_if;

/// CPU feature family used to select kernel implementations.
///
/// The selector only influences dispatch when filters are constructed;
/// already-built filters are immutable.
#[repr(u32)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum CpuFeatures {
    None = 0,
    #[default]
    Auto = 1,
    Sse2 = 2,
    Sse41 = 3,
    Avx = 4,
    F16c = 5,
    Avx2 = 6,
}

impl From<u32> for CpuFeatures {
    fn from(value: u32) -> Self {
        match value {
            1 => CpuFeatures::Auto,
            2 => CpuFeatures::Sse2,
            3 => CpuFeatures::Sse41,
            4 => CpuFeatures::Avx,
            5 => CpuFeatures::F16c,
            6 => CpuFeatures::Avx2,
            _ => CpuFeatures::None,
        }
    }
}

static CPU_SELECTOR: AtomicU32 = AtomicU32::new(CpuFeatures::Auto as u32);

/// Set the process-wide CPU feature selector.
///
/// Shared with relaxed ordering; construction running concurrently with a
/// store may observe any prior value.
pub fn set_cpu_features(cpu: CpuFeatures) {
    CPU_SELECTOR.store(cpu as u32, Ordering::Relaxed);
}

/// Get the process-wide CPU feature selector.
pub fn cpu_features() -> CpuFeatures {
    CpuFeatures::from(CPU_SELECTOR.load(Ordering::Relaxed))
}

/// Resolve `Auto` to a concrete family for the host.
pub(crate) fn resolve(cpu: CpuFeatures) -> CpuFeatures {
    let cpu = if cpu == CpuFeatures::Auto { cpu_features() } else { cpu };

    if cpu == CpuFeatures::Auto {
        detect_host()
    } else {
        cpu
    }
}

fn detect_host() -> CpuFeatures {
    cfg_if! {
        if #[cfg(any(target_arch = "x86", target_arch = "x86_64"))] {
            if is_x86_feature_detected!("avx2") {
                CpuFeatures::Avx2
            } else if is_x86_feature_detected!("f16c") {
                CpuFeatures::F16c
            } else if is_x86_feature_detected!("avx") {
                CpuFeatures::Avx
            } else if is_x86_feature_detected!("sse4.1") {
                CpuFeatures::Sse41
            } else if is_x86_feature_detected!("sse2") {
                CpuFeatures::Sse2
            } else {
                CpuFeatures::None
            }
        } else {
            CpuFeatures::None
        }
    }
}
