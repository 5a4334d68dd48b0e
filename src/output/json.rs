//! JSON output formatter

use super::OutputFormatter;
use crate::engine::AuditRun;
use crate::finding::{Category, Finding};
use serde::Serialize;
use std::collections::BTreeMap;

/// JSON formatter for machine-readable output
#[derive(Default)]
pub struct JsonFormatter {
    /// Pretty print with indentation
    pub pretty: bool,
}

impl JsonFormatter {
    /// Create a new JSON formatter
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable pretty printing
    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }

    fn to_string<T: Serialize>(&self, value: &T) -> String {
        let result = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        result.unwrap_or_else(|e| {
            log::warn!("failed to serialize output: {}", e);
            String::new()
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonOutput<'a> {
    runs: Vec<JsonRun<'a>>,
    summary: JsonSummary,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonRun<'a> {
    suite: &'a str,
    title: &'a str,
    page: &'a str,
    status: String,
    counts: BTreeMap<String, usize>,
    results: BTreeMap<String, &'a [Finding]>,
    metrics: &'a BTreeMap<String, f64>,
    timings: Vec<JsonTiming<'a>>,
    duration_ms: u128,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonTiming<'a> {
    check: &'a str,
    duration_us: u128,
    findings: usize,
    failed: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonSummary {
    audits: usize,
    error_count: usize,
    warning_count: usize,
    info_count: usize,
    exit_code: i32,
}

fn json_run(run: &AuditRun) -> JsonRun<'_> {
    let categories: Vec<Category> = run.visible_categories();
    JsonRun {
        suite: &run.suite,
        title: &run.title,
        page: &run.page,
        status: run.status().to_string(),
        counts: categories
            .iter()
            .map(|c| (c.to_string(), run.count(*c)))
            .collect(),
        results: categories
            .iter()
            .map(|c| (c.to_string(), run.findings(*c)))
            .collect(),
        metrics: &run.metrics,
        timings: run
            .timings
            .iter()
            .map(|t| JsonTiming {
                check: &t.check_id,
                duration_us: t.duration.as_micros(),
                findings: t.findings,
                failed: t.failed,
            })
            .collect(),
        duration_ms: run.duration.as_millis(),
    }
}

impl OutputFormatter for JsonFormatter {
    fn format(&self, runs: &[AuditRun]) -> String {
        let output = JsonOutput {
            runs: runs.iter().map(json_run).collect(),
            summary: JsonSummary {
                audits: runs.len(),
                error_count: runs.iter().map(AuditRun::error_count).sum(),
                warning_count: runs.iter().map(AuditRun::warning_count).sum(),
                info_count: runs.iter().map(AuditRun::info_count).sum(),
                exit_code: runs.iter().map(AuditRun::exit_code).max().unwrap_or(0),
            },
        };
        self.to_string(&output)
    }

    fn format_finding(&self, finding: &Finding) -> String {
        self.to_string(finding)
    }
}
