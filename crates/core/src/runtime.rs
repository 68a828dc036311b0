use std::{fmt, str::FromStr};

use anyhow::{Context, Result, bail};
use candle_core::Device;
use serde::{Deserialize, Serialize};

/// Compute backend requested by configuration.
///
/// `Vulkan` and `Rocm` are accepted so that configuration shared with the
/// container build parses, but no candle backend exists for them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    #[default]
    Cpu,
    Cuda,
    Metal,
    Vulkan,
    Rocm,
}

impl DeviceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Cuda => "cuda",
            Self::Metal => "metal",
            Self::Vulkan => "vulkan",
            Self::Rocm => "rocm",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(Self::Cpu),
            "cuda" => Ok(Self::Cuda),
            "metal" => Ok(Self::Metal),
            "vulkan" => Ok(Self::Vulkan),
            "rocm" => Ok(Self::Rocm),
            other => bail!("unknown device `{other}` (expected cpu, cuda, metal, vulkan or rocm)"),
        }
    }
}

pub fn prepare_device(kind: DeviceKind) -> Result<Device> {
    match kind {
        DeviceKind::Cpu => Ok(Device::Cpu),
        DeviceKind::Cuda => Device::new_cuda(0)
            .context("failed to initialise CUDA device 0 (was the binary built with `--features cuda`?)"),
        DeviceKind::Metal => Device::new_metal(0)
            .context("failed to initialise Metal device 0 (was the binary built with `--features metal`?)"),
        DeviceKind::Vulkan | DeviceKind::Rocm => {
            bail!("device `{kind}` is not supported by this build; use cpu, cuda or metal")
        }
    }
}

pub fn backend_label(device: &Device) -> &'static str {
    if device.is_cuda() {
        "cuda"
    } else if device.is_metal() {
        "metal"
    } else {
        "cpu"
    }
}
