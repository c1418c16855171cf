//! Hardware discovery (§4.B).
//!
//! Pure with respect to its inputs (environment + OS state); callers may
//! memoize per request. Never fails: a missing or erroring `nvidia-smi`
//! degrades quietly to the CPU path.

use ariv_common::HardwareProfile;
use sysinfo::System;

const FAKE_VRAM_ENV: &str = "ARIV_FAKE_VRAM_MB";

pub struct HardwareProbe;

impl HardwareProbe {
    pub fn new() -> Self {
        Self
    }

    /// Discover accelerator presence, VRAM, host memory, and device name.
    pub fn probe(&self) -> HardwareProfile {
        let cpu_mem_mb = host_memory_mb();
        match probe_nvidia() {
            Some((device_name, vram_mb)) => HardwareProfile {
                gpu: true,
                vram_mb,
                cpu_mem_mb,
                device_name,
            },
            None => HardwareProfile {
                gpu: false,
                vram_mb: fake_vram_override(),
                cpu_mem_mb,
                device_name: "cpu".to_string(),
            },
        }
    }
}

impl Default for HardwareProbe {
    fn default() -> Self {
        Self::new()
    }
}

fn host_memory_mb() -> u64 {
    let mut sys = System::new();
    sys.refresh_memory();
    sys.total_memory() / (1024 * 1024)
}

fn fake_vram_override() -> u64 {
    std::env::var(FAKE_VRAM_ENV)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

/// Run `nvidia-smi --query-gpu=name,memory.total --format=csv,noheader` and
/// parse the first line as `name, memory_mib`. Returns `None` on any failure
/// (binary missing, non-zero exit, unparsable output) — this path never
/// raises, by contract.
fn probe_nvidia() -> Option<(String, u64)> {
    let output = std::process::Command::new("nvidia-smi")
        .args(["--query-gpu=name,memory.total", "--format=csv,noheader"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let first_line = stdout.lines().next()?;
    parse_nvidia_line(first_line)
}

fn parse_nvidia_line(line: &str) -> Option<(String, u64)> {
    let mut parts = line.splitn(2, ',');
    let name = parts.next()?.trim();
    let mem = parts.next()?.trim();
    let mem_mb: u64 = mem
        .trim_end_matches("MiB")
        .trim()
        .parse()
        .ok()?;
    Some((name.to_string(), mem_mb))
}
