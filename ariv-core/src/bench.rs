//! Benchmark harness (§4.G).
//!
//! Runs a dataset subset through the runner, scores the hypotheses against
//! the references with simple surrogate metrics, and writes CSV + Markdown
//! artifacts. Not a replacement for real BLEU/chrF: the surrogates exist so
//! the harness can run without a heavyweight scoring dependency.

use std::path::{Path, PathBuf};
use std::time::Instant;

use ariv_common::{ArivError, BenchResult, Result};
use serde::Deserialize;

use crate::runner::{ChatParams, StreamingRunner};

const BENCH_NUM_GPU_LAYERS: u32 = 10;
const BENCH_MAX_TOKENS: u32 = 64;
const BENCH_TEMPERATURE: f32 = 0.2;
const MIN_DURATION_SECS: f64 = 1e-6;

#[derive(Debug, Clone, Deserialize)]
struct DatasetRecord {
    lang: String,
    subset: String,
    source: String,
    reference: String,
}

fn load_dataset(path: impl AsRef<Path>, lang: &str, subset: &str) -> Result<Vec<DatasetRecord>> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|e| {
        ArivError::DatasetMissing(format!("cannot read {}: {e}", path.display()))
    })?;

    let mut records = Vec::new();
    for (lineno, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record: DatasetRecord = serde_json::from_str(line).map_err(|e| {
            ArivError::DatasetMissing(format!(
                "malformed record at {}:{}: {e}",
                path.display(),
                lineno + 1
            ))
        })?;
        if record.lang == lang && record.subset == subset {
            records.push(record);
        }
    }

    if records.is_empty() {
        return Err(ArivError::DatasetMissing(format!(
            "no records for lang={lang} subset={subset} in {}",
            path.display()
        )));
    }
    Ok(records)
}

/// Fraction of whitespace-tokenized hypothesis tokens also present in the
/// reference token multiset, treated as a set (membership, not decrement).
fn simple_bleu(hypothesis: &str, reference: &str) -> f64 {
    let hyp_tokens: Vec<&str> = hypothesis.split_whitespace().collect();
    if hyp_tokens.is_empty() || reference.trim().is_empty() {
        return 0.0;
    }
    let ref_tokens: std::collections::HashSet<&str> = reference.split_whitespace().collect();
    let hits = hyp_tokens.iter().filter(|t| ref_tokens.contains(*t)).count();
    hits as f64 / hyp_tokens.len() as f64
}

/// Fraction of hypothesis characters that appear in the reference character set.
fn simple_chrf(hypothesis: &str, reference: &str) -> f64 {
    if hypothesis.is_empty() || reference.is_empty() {
        return 0.0;
    }
    let ref_chars: std::collections::HashSet<char> = reference.chars().collect();
    let hyp_chars: Vec<char> = hypothesis.chars().collect();
    let hits = hyp_chars.iter().filter(|c| ref_chars.contains(c)).count();
    hits as f64 / hyp_chars.len() as f64
}

fn percentile(sorted_values: &[f64], pct: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }
    let idx = ((sorted_values.len() as f64) * pct) as usize;
    let idx = idx.min(sorted_values.len() - 1);
    sorted_values[idx]
}

fn median(sorted_values: &[f64]) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }
    let mid = sorted_values.len() / 2;
    if sorted_values.len() % 2 == 0 {
        (sorted_values[mid - 1] + sorted_values[mid]) / 2.0
    } else {
        sorted_values[mid]
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

pub struct BenchmarkHarness<'a> {
    runner: &'a StreamingRunner,
}

impl<'a> BenchmarkHarness<'a> {
    pub fn new(runner: &'a StreamingRunner) -> Self {
        Self { runner }
    }

    /// Run the (lang, subset) benchmark for every `(model_name, model_path)`
    /// pair in `models`, writing one shared CSV and one shared Markdown table
    /// under `output_dir`, named from `models[0]`. Returns every row plus the
    /// two artifact paths.
    pub async fn run(
        &self,
        models: &[(String, String)],
        dataset_path: impl AsRef<Path>,
        lang: &str,
        subset: &str,
        output_dir: impl AsRef<Path>,
    ) -> Result<(Vec<BenchResult>, PathBuf, PathBuf)> {
        let first_model = models
            .first()
            .ok_or_else(|| ArivError::DatasetMissing("bench run named no models".to_string()))?
            .0
            .clone();

        let records = load_dataset(dataset_path, lang, subset)?;
        let mut results = Vec::with_capacity(models.len());

        for (model_name, model_path) in models {
            let mut total_tokens = 0u64;
            let mut total_duration = 0f64;
            let mut durations = Vec::with_capacity(records.len());
            let mut bleu_sum = 0f64;
            let mut chrf_sum = 0f64;

            for record in &records {
                let params = ChatParams {
                    model_path: model_path.clone(),
                    prompt: record.source.clone(),
                    num_gpu_layers: BENCH_NUM_GPU_LAYERS,
                    max_tokens: BENCH_MAX_TOKENS,
                    temperature: BENCH_TEMPERATURE,
                    path_user_visible: true,
                };

                let started = Instant::now();
                let (hypothesis, tokens) = self.runner.run_chat(params).await?;
                let duration = started.elapsed().as_secs_f64().max(MIN_DURATION_SECS);

                total_tokens += tokens as u64;
                total_duration += duration;
                durations.push(duration);
                bleu_sum += simple_bleu(&hypothesis, &record.reference);
                chrf_sum += simple_chrf(&hypothesis, &record.reference);
            }

            durations.sort_by(|a, b| a.partial_cmp(b).unwrap());
            let n = records.len() as f64;

            results.push(BenchResult {
                model: model_name.clone(),
                lang: lang.to_string(),
                subset: subset.to_string(),
                bleu: round_to(bleu_sum / n, 4),
                chrf: round_to(chrf_sum / n, 4),
                throughput_tps: round_to(total_tokens as f64 / total_duration.max(MIN_DURATION_SECS), 2),
                latency_p50: round_to(median(&durations), 4),
                latency_p95: round_to(percentile(&durations, 0.95), 4),
            });
        }

        let (csv_path, md_path) = write_artifacts(&results, &first_model, output_dir)?;
        Ok((results, csv_path, md_path))
    }
}

fn write_artifacts(
    results: &[BenchResult],
    first_model: &str,
    output_dir: impl AsRef<Path>,
) -> Result<(PathBuf, PathBuf)> {
    let output_dir = output_dir.as_ref();
    std::fs::create_dir_all(output_dir)
        .map_err(|e| ArivError::Internal(format!("cannot create {}: {e}", output_dir.display())))?;

    let model_basename = first_model.rsplit('/').next().unwrap_or(first_model);
    let (lang, subset) = results
        .first()
        .map(|r| (r.lang.as_str(), r.subset.as_str()))
        .unwrap_or(("", ""));
    let stem = format!("{model_basename}-{lang}-{subset}");
    let csv_path = output_dir.join(format!("{stem}.csv"));
    let md_path = output_dir.join(format!("{stem}.md"));

    let mut writer = csv::Writer::from_path(&csv_path)
        .map_err(|e| ArivError::Internal(format!("cannot open {}: {e}", csv_path.display())))?;
    writer
        .write_record([
            "model",
            "lang",
            "subset",
            "bleu",
            "chrf",
            "throughput_tps",
            "latency_p50",
            "latency_p95",
        ])
        .map_err(|e| ArivError::Internal(e.to_string()))?;
    for result in results {
        writer
            .write_record([
                result.model.as_str(),
                result.lang.as_str(),
                result.subset.as_str(),
                &result.bleu.to_string(),
                &result.chrf.to_string(),
                &result.throughput_tps.to_string(),
                &result.latency_p50.to_string(),
                &result.latency_p95.to_string(),
            ])
            .map_err(|e| ArivError::Internal(e.to_string()))?;
    }
    writer
        .flush()
        .map_err(|e| ArivError::Internal(e.to_string()))?;

    let mut markdown = String::from(
        "| model | lang | subset | bleu | chrf | throughput_tps | latency_p50 | latency_p95 |\n\
         |---|---|---|---|---|---|---|---|\n",
    );
    for result in results {
        markdown.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} | {} |\n",
            result.model,
            result.lang,
            result.subset,
            result.bleu,
            result.chrf,
            result.throughput_tps,
            result.latency_p50,
            result.latency_p95,
        ));
    }
    std::fs::write(&md_path, markdown)
        .map_err(|e| ArivError::Internal(format!("cannot write {}: {e}", md_path.display())))?;

    Ok((csv_path, md_path))
}
