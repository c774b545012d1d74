use anyhow::{anyhow, Result};
use candle_core::Device;
use tracing::info;

/// Resolve the configured device name (`cpu`, `cuda`, `metal` or `auto`).
pub fn select_device(name: &str) -> Result<Device> {
    let device = match name.to_ascii_lowercase().as_str() {
        "cpu" => Device::Cpu,
        "cuda" => Device::new_cuda(0).map_err(|e| anyhow!("Failed to initialize CUDA device: {}", e))?,
        "metal" | "mps" => Device::new_metal(0).map_err(|e| anyhow!("Failed to initialize Metal device: {}", e))?,
        "auto" => auto_device(),
        other => return Err(anyhow!("Unknown device '{}'", other)),
    };
    info!(device = ?device, "compute device selected");
    Ok(device)
}

fn auto_device() -> Device {
    #[cfg(feature = "cuda")]
    {
        if let Ok(dev) = Device::new_cuda(0) { return dev; }
    }
    #[cfg(feature = "metal")]
    {
        if let Ok(dev) = Device::new_metal(0) { return dev; }
    }
    Device::Cpu
}
