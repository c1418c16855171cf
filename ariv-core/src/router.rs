//! Deterministic task + language + VRAM based model selection (§4.C).

use ariv_common::{HardwareProfile, ModelSpec, RouteDecision};

const INDIC_LANGS: &[&str] = &["hi", "ta", "te", "kn", "bn", "ml", "gu", "pa", "mr", "ur"];
const CODE_HINTS: &[&str] = &["code", "python", "java", "sql", "debug", "logic", "reasoning"];
const CODE_SHAPES: &[&str] = &["def ", "class ", "```", "import "];

pub const PRIMARY_CODE: &str = "qwen-2.5-3b-q4_k_m";
pub const PRIMARY_INDIC: &str = "sarvam-2b-q4_k_m";
pub const PRIMARY_GENERAL: &str = "llama-3.2-1b-q4_k_m";
const SAFETY_NET: &str = PRIMARY_GENERAL;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskType {
    CodeLogic,
    Indic,
}

fn classify_task(task_hint: Option<&str>, text: &str) -> TaskType {
    let hint = task_hint.unwrap_or("").to_lowercase();
    if CODE_HINTS.iter().any(|token| hint.contains(token)) {
        return TaskType::CodeLogic;
    }
    let lowered = text.to_lowercase();
    if CODE_SHAPES.iter().any(|token| lowered.contains(token)) {
        return TaskType::CodeLogic;
    }
    TaskType::Indic
}

fn detect_indic(preferred_lang: Option<&str>, text: &str) -> bool {
    if let Some(lang) = preferred_lang {
        if INDIC_LANGS.contains(&lang.to_lowercase().as_str()) {
            return true;
        }
    }
    text.chars().any(|c| ('\u{0900}'..='\u{0DFF}').contains(&c))
}

fn estimate_gpu_layers(vram_mb: u64, model_vram_mb: u64) -> u32 {
    if vram_mb == 0 {
        return 0;
    }
    if vram_mb >= model_vram_mb {
        return 999;
    }
    let ratio = (vram_mb as f64 / model_vram_mb.max(1) as f64).max(0.05);
    ((40.0 * ratio).floor() as u32).max(1)
}

/// Resolves a candidate model name to a `ModelSpec`, returning `None` if the
/// name is not registered. Callers pass a resolver closure so the router
/// itself stays a pure function of value types.
pub fn choose<'a, F>(
    hardware: &HardwareProfile,
    preferred_lang: Option<&str>,
    task_hint: Option<&str>,
    text: &str,
    resolve: F,
) -> Option<RouteDecision>
where
    F: Fn(&str) -> Option<&'a ModelSpec>,
{
    let task_type = classify_task(task_hint, text);
    let is_indic = detect_indic(preferred_lang, text);

    let primary_name = match task_type {
        TaskType::CodeLogic => PRIMARY_CODE,
        TaskType::Indic if is_indic => PRIMARY_INDIC,
        TaskType::Indic => PRIMARY_GENERAL,
    };

    let mut selected = resolve(primary_name)?;
    let mut fallback: Option<String> = None;

    if hardware.vram_mb > 0 && selected.vram_mb > hardware.vram_mb {
        for candidate_name in &selected.fallback {
            if let Some(candidate) = resolve(candidate_name) {
                if candidate.vram_mb <= hardware.vram_mb {
                    fallback = Some(selected.name.clone());
                    selected = candidate;
                    break;
                }
            }
        }
    }

    if hardware.vram_mb < selected.vram_mb {
        if fallback.is_none() {
            fallback = Some(selected.name.clone());
        }
        if let Some(safety_net) = resolve(SAFETY_NET) {
            selected = safety_net;
        }
    }

    let num_gpu_layers = estimate_gpu_layers(hardware.vram_mb, selected.vram_mb);
    let reason = format!(
        "task={}, indic={is_indic}, vram={}",
        if task_type == TaskType::CodeLogic {
            "code_logic"
        } else {
            "indic"
        },
        hardware.vram_mb
    );

    Some(RouteDecision {
        model: selected.clone(),
        fallback,
        num_gpu_layers,
        estimated_vram_mb: selected.vram_mb,
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn spec(name: &str, vram_mb: u64, fallback: &[&str]) -> ModelSpec {
        ModelSpec {
            name: name.to_string(),
            model_type: "gguf".to_string(),
            family: String::new(),
            quant: String::new(),
            vram_mb,
            task: "general".to_string(),
            url: String::new(),
            license: String::new(),
            sha256: None,
            preferred_langs: vec![],
            fallback: fallback.iter().map(|s| s.to_string()).collect(),
            local_path: None,
        }
    }

    fn registry_map() -> HashMap<String, ModelSpec> {
        let mut m = HashMap::new();
        m.insert(
            PRIMARY_GENERAL.to_string(),
            spec(PRIMARY_GENERAL, 1500, &[]),
        );
        m.insert(PRIMARY_CODE.to_string(), spec(PRIMARY_CODE, 3500, &[PRIMARY_GENERAL]));
        m.insert(PRIMARY_INDIC.to_string(), spec(PRIMARY_INDIC, 4000, &[PRIMARY_GENERAL]));
        m
    }

    fn hw(gpu: bool, vram_mb: u64) -> HardwareProfile {
        HardwareProfile {
            gpu,
            vram_mb,
            cpu_mem_mb: 16_000,
            device_name: if gpu { "gpu" } else { "cpu" }.to_string(),
        }
    }

    #[test]
    fn indic_text_routes_to_indic_branch() {
        let registry = registry_map();
        let decision = choose(&hw(true, 4096), Some("hi"), None, "नमस्ते", |n| {
            registry.get(n)
        })
        .unwrap();
        assert!(decision.model.name.starts_with("sarvam"));
    }

    #[test]
    fn code_hint_routes_to_code_logic() {
        let registry = registry_map();
        let decision = choose(&hw(true, 4096), None, Some("code"), "def add(a,b):", |n| {
            registry.get(n)
        })
        .unwrap();
        assert!(decision.model.name.starts_with("qwen"));
    }

    #[test]
    fn code_shape_in_text_overrides_indic_text() {
        let registry = registry_map();
        // Devanagari codepoint present, but the text also looks like code.
        let decision = choose(&hw(true, 4096), None, None, "def क():", |n| registry.get(n))
            .unwrap();
        assert!(decision.model.name.starts_with("qwen"));
    }

    #[test]
    fn neither_code_nor_indic_routes_to_general() {
        let registry = registry_map();
        let decision = choose(&hw(true, 4096), None, None, "hello there", |n| {
            registry.get(n)
        })
        .unwrap();
        assert!(decision.model.name.starts_with("llama-3.2"));
    }

    #[test]
    fn vram_downgrade_walks_fallback_list() {
        let mut registry = registry_map();
        registry.insert(
            PRIMARY_INDIC.to_string(),
            spec(PRIMARY_INDIC, 8000, &[PRIMARY_GENERAL]),
        );
        let decision = choose(&hw(true, 2000), Some("hi"), None, "text", |n| {
            registry.get(n)
        })
        .unwrap();
        assert_eq!(decision.model.name, PRIMARY_GENERAL);
        assert_eq!(decision.fallback.as_deref(), Some(PRIMARY_INDIC));
    }

    #[test]
    fn safety_net_fires_when_no_fallback_fits() {
        let mut registry = registry_map();
        registry.insert(PRIMARY_INDIC.to_string(), spec(PRIMARY_INDIC, 8000, &[]));
        let decision = choose(&hw(true, 500), Some("hi"), None, "text", |n| {
            registry.get(n)
        })
        .unwrap();
        assert_eq!(decision.model.name, PRIMARY_GENERAL);
        assert_eq!(decision.fallback.as_deref(), Some(PRIMARY_INDIC));
    }

    #[test]
    fn vram_safety_invariant_holds_or_safety_net_selected() {
        let registry = registry_map();
        for vram in [500u64, 1500, 2000, 4000, 8000] {
            let decision = choose(&hw(true, vram), None, None, "plain text", |n| {
                registry.get(n)
            })
            .unwrap();
            assert!(
                decision.model.vram_mb <= vram || decision.model.name == PRIMARY_GENERAL,
                "vram={vram} model={}",
                decision.model.name
            );
        }
    }

    #[test]
    fn zero_vram_yields_zero_gpu_layers() {
        assert_eq!(estimate_gpu_layers(0, 1500), 0);
    }

    #[test]
    fn abundant_vram_yields_sentinel() {
        assert_eq!(estimate_gpu_layers(8000, 1500), 999);
    }

    #[test]
    fn partial_vram_yields_proportional_layers() {
        // ratio = 750/1500 = 0.5 -> floor(40*0.5) = 20
        assert_eq!(estimate_gpu_layers(750, 1500), 20);
    }

    #[test]
    fn tiny_vram_still_yields_at_least_one_layer() {
        assert_eq!(estimate_gpu_layers(1, 1_000_000), 1);
    }

    #[test]
    fn choose_is_deterministic_for_fixed_inputs() {
        let registry = registry_map();
        let a = choose(&hw(true, 3000), Some("ta"), None, "hello", |n| registry.get(n));
        let b = choose(&hw(true, 3000), Some("ta"), None, "hello", |n| registry.get(n));
        assert_eq!(a, b);
    }
}
