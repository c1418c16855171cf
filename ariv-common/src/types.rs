//! Value types shared by the registry, router, runner, and HTTP layers.
//!
//! Everything here is a plain, immutable record: constructed once and passed
//! by value or by `Arc`, never mutated in place.

use serde::{Deserialize, Serialize};

/// An immutable descriptor for one deployable model, as declared in the
/// registry document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub name: String,
    #[serde(rename = "type", default = "default_model_type")]
    pub model_type: String,
    #[serde(default)]
    pub family: String,
    #[serde(default)]
    pub quant: String,
    #[serde(default)]
    pub vram_mb: u64,
    #[serde(default = "default_task")]
    pub task: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub license: String,
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default)]
    pub preferred_langs: Vec<String>,
    #[serde(default)]
    pub fallback: Vec<String>,
    #[serde(default)]
    pub local_path: Option<String>,
}

fn default_model_type() -> String {
    "gguf".to_string()
}

fn default_task() -> String {
    "general".to_string()
}

impl ModelSpec {
    /// True when `local_path` is set and exists on disk right now.
    pub fn is_available_locally(&self) -> bool {
        self.local_path
            .as_deref()
            .map(|p| std::path::Path::new(p).exists())
            .unwrap_or(false)
    }
}

/// A snapshot of accelerator and host memory, as returned by the hardware probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareProfile {
    pub gpu: bool,
    pub vram_mb: u64,
    pub cpu_mem_mb: u64,
    pub device_name: String,
}

/// The router's product for one request. Created once, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteDecision {
    pub model: ModelSpec,
    pub fallback: Option<String>,
    pub num_gpu_layers: u32,
    pub estimated_vram_mb: u64,
    pub reason: String,
}

/// One row of benchmark output for a (model, lang, subset) triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchResult {
    pub model: String,
    pub lang: String,
    pub subset: String,
    pub bleu: f64,
    pub chrf: f64,
    pub throughput_tps: f64,
    pub latency_p50: f64,
    pub latency_p95: f64,
}
