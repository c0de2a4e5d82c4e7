//! Collection loader: file or network acquisition of the JSONL dataset.
//!
//! A malformed or inadmissible line is dropped and counted, never fatal to
//! the batch. Acquisition failure is fatal to startup unless the caller
//! explicitly substitutes the built-in snapshot.

use crate::record::{AptamerRecord, to_record, validate_record};
use anyhow::{Context, Result, anyhow};
use std::path::Path;
use std::time::Duration;
use std::{env, fs, thread};

pub const DEFAULT_DATASET_PATH: &str = "assets/APTAMERS.jsonl";
pub const DATASET_PATH_ENV: &str = "APTAMERS_PATH";
pub const DATASET_URL_ENV: &str = "APTAMERS_URL";

const BUILTIN_SNAPSHOT_JSONL: &str = include_str!("../assets/fallback.jsonl");

const FETCH_ATTEMPTS: usize = 4;
const FETCH_TIMEOUT_SECS: u64 = 30;
const FETCH_RETRY_BASE_DELAY_MS: u64 = 500;

/// Where the dataset comes from, after override/env resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    File(String),
    Url(String),
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSource::File(path) => write!(f, "file '{path}'"),
            DataSource::Url(url) => write!(f, "url '{url}'"),
        }
    }
}

/// Per-load drop accounting, returned alongside the records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub lines: usize,
    pub parse_failures: usize,
    pub validation_failures: usize,
    pub loaded: usize,
}

/// Why one line was dropped; reported to the optional observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    MalformedJson,
    FailedValidation,
}

/// Explicit overrides beat environment variables beat the default path.
/// An env path pointing nowhere falls through to the default, so a stale
/// variable cannot brick startup.
pub fn resolve_source(path_override: Option<&str>, url_override: Option<&str>) -> DataSource {
    if let Some(path) = path_override {
        return DataSource::File(path.to_string());
    }
    if let Some(url) = url_override {
        return DataSource::Url(url.to_string());
    }
    if let Ok(url) = env::var(DATASET_URL_ENV) {
        let url = url.trim();
        if !url.is_empty() {
            return DataSource::Url(url.to_string());
        }
    }
    if let Ok(path) = env::var(DATASET_PATH_ENV) {
        let path = path.trim();
        if !path.is_empty() && Path::new(path).exists() {
            return DataSource::File(path.to_string());
        }
    }
    DataSource::File(DEFAULT_DATASET_PATH.to_string())
}

/// Parses newline-delimited JSON into validated records.
pub fn parse_jsonl(text: &str) -> (Vec<AptamerRecord>, LoadStats) {
    parse_jsonl_observed(text, &mut |_, _| {})
}

/// Like [`parse_jsonl`] but reports every dropped line to `on_drop` with its
/// 1-based line number. The observer cannot alter control flow; drops stay
/// non-fatal either way.
pub fn parse_jsonl_observed(
    text: &str,
    on_drop: &mut dyn FnMut(usize, DropReason),
) -> (Vec<AptamerRecord>, LoadStats) {
    let mut records = Vec::new();
    let mut stats = LoadStats::default();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        stats.lines += 1;
        let raw: serde_json::Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(_) => {
                stats.parse_failures += 1;
                on_drop(idx + 1, DropReason::MalformedJson);
                continue;
            }
        };
        match to_record(&raw) {
            None => {
                stats.parse_failures += 1;
                on_drop(idx + 1, DropReason::MalformedJson);
            }
            Some(rec) => {
                if validate_record(&rec) {
                    records.push(rec);
                    stats.loaded += 1;
                } else {
                    stats.validation_failures += 1;
                    on_drop(idx + 1, DropReason::FailedValidation);
                }
            }
        }
    }
    (records, stats)
}

pub fn load_from_path(path: &str) -> Result<(Vec<AptamerRecord>, LoadStats)> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Could not read aptamer dataset '{path}'"))?;
    Ok(parse_jsonl(&text))
}

/// Fetches the dataset over HTTP with a bounded retry policy.
///
/// Each attempt has an explicit timeout; attempts are separated by
/// exponentially growing backoff. Only after all attempts are exhausted does
/// a descriptive terminal error surface.
pub fn fetch_from_url(url: &str) -> Result<(Vec<AptamerRecord>, LoadStats)> {
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
        .build()
        .context("Could not build HTTP client")?;
    let mut last_error = String::new();
    for attempt in 1..=FETCH_ATTEMPTS {
        if attempt > 1 {
            thread::sleep(retry_backoff_duration(attempt));
        }
        match fetch_once(&client, url) {
            Ok(text) => return Ok(parse_jsonl(&text)),
            Err(e) => last_error = format!("{e:#}"),
        }
    }
    Err(anyhow!(
        "Could not fetch aptamer dataset '{url}' after {FETCH_ATTEMPTS} attempts: {last_error}"
    ))
}

fn fetch_once(client: &reqwest::blocking::Client, url: &str) -> Result<String> {
    let response = client
        .get(url)
        .send()
        .with_context(|| format!("Could not reach '{url}'"))?;
    if !response.status().is_success() {
        return Err(anyhow!("Unexpected HTTP status {} from '{url}'", response.status()));
    }
    response
        .text()
        .with_context(|| format!("Could not read response body from '{url}'"))
}

fn retry_backoff_duration(attempt: usize) -> Duration {
    let shift = (attempt.saturating_sub(1)).min(6) as u32;
    let multiplier = 1_u64 << shift;
    Duration::from_millis(FETCH_RETRY_BASE_DELAY_MS.saturating_mul(multiplier))
}

pub fn load(source: &DataSource) -> Result<(Vec<AptamerRecord>, LoadStats)> {
    match source {
        DataSource::File(path) => load_from_path(path),
        DataSource::Url(url) => fetch_from_url(url),
    }
}

/// Small dataset compiled into the binary; substituted for a failed load
/// only when the deployment opts in.
pub fn builtin_snapshot() -> (Vec<AptamerRecord>, LoadStats) {
    parse_jsonl(BUILTIN_SNAPSHOT_JSONL)
}
