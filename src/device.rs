//! Compute device selection

use candle_core::Device;
use tracing::{info, warn};

/// Pick the best available device: CUDA, then Metal, then CPU
pub fn select_device() -> Device {
    if candle_core::utils::cuda_is_available() {
        match Device::new_cuda(0) {
            Ok(device) => {
                info!("Using CUDA device 0");
                return device;
            }
            Err(e) => warn!("CUDA reported available but failed to initialize: {}", e),
        }
    }

    if candle_core::utils::metal_is_available() {
        match Device::new_metal(0) {
            Ok(device) => {
                info!("Using Metal device 0");
                return device;
            }
            Err(e) => warn!("Metal reported available but failed to initialize: {}", e),
        }
    }

    info!("Using CPU");
    Device::Cpu
}

/// Short human-readable device name
pub fn device_name(device: &Device) -> &'static str {
    match device {
        Device::Cpu => "cpu",
        Device::Cuda(_) => "cuda",
        Device::Metal(_) => "metal",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_name() {
        assert_eq!(device_name(&Device::Cpu), "cpu");
    }

    #[cfg(not(any(feature = "cuda", feature = "metal")))]
    #[test]
    fn test_default_build_selects_cpu() {
        assert!(select_device().is_cpu());
    }
}
