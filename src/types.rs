use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Which argv variant the merge tool is launched with.
///
/// - `Cuda`: an NVIDIA device is present; use the GPU-accelerated flags.
/// - `Cpu`: no accelerator; use the low-memory / sharded flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accelerator {
    Cuda,
    Cpu,
}

impl Accelerator {
    /// Probe the host once for an NVIDIA driver.
    pub fn detect() -> Self {
        let probes = ["/proc/driver/nvidia/version", "/dev/nvidia0"];
        if probes.iter().any(|p| std::path::Path::new(p).exists()) {
            Accelerator::Cuda
        } else {
            Accelerator::Cpu
        }
    }
}

/// Accelerator preference as written in settings or on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AcceleratorMode {
    #[default]
    Auto,
    Cuda,
    Cpu,
}

impl AcceleratorMode {
    pub fn resolve(self) -> Accelerator {
        match self {
            AcceleratorMode::Auto => Accelerator::detect(),
            AcceleratorMode::Cuda => Accelerator::Cuda,
            AcceleratorMode::Cpu => Accelerator::Cpu,
        }
    }
}

impl FromStr for AcceleratorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(AcceleratorMode::Auto),
            "cuda" | "gpu" => Ok(AcceleratorMode::Cuda),
            "cpu" => Ok(AcceleratorMode::Cpu),
            other => Err(format!(
                "invalid accelerator: {other} (expected \"auto\", \"cuda\" or \"cpu\")"
            )),
        }
    }
}

/// Severity of a streamed [`LogEvent`](crate::events::LogEvent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Info,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Info => f.write_str("INFO"),
            Level::Error => f.write_str("ERROR"),
        }
    }
}
