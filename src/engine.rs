//! Core audit engine
//!
//! One [`Engine`] owns one catalog and at most one live [`AuditRun`]. A run
//! has two phases: every synchronous check runs first, in catalog order,
//! then the network checks run one after another. A failing check becomes a
//! single `error` finding and the remaining checks still run, so a run
//! always ends with a usable result.

use crate::config::Config;
use crate::finding::{Category, Finding, Severity};
use crate::page::{Page, PageContext};
use crate::probe::{OfflineProber, Prober};
use crate::rule::{Catalog, CheckError};
use crate::suites::Suite;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Lifecycle of an audit run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RunStatus {
    Ready,
    Running,
    Complete,
    Error,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Complete | RunStatus::Error)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Ready => write!(f, "ready"),
            RunStatus::Running => write!(f, "running"),
            RunStatus::Complete => write!(f, "complete"),
            RunStatus::Error => write!(f, "error"),
        }
    }
}

/// Illegal status change
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cannot move audit run from {from} to {to}")]
pub struct RunError {
    pub from: RunStatus,
    pub to: RunStatus,
}

/// Per-check timing statistics
#[derive(Debug, Clone, Default)]
pub struct CheckTiming {
    pub check_id: String,
    pub duration: Duration,
    pub findings: usize,
    pub failed: bool,
}

/// Results of one engine invocation
#[derive(Debug, Clone)]
pub struct AuditRun {
    /// Catalog name
    pub suite: String,
    /// Catalog title
    pub title: String,
    /// Page URL
    pub page: String,
    /// Findings per category, in the order they were produced
    pub results: BTreeMap<Category, Vec<Finding>>,
    /// Taxonomy of the catalog, in presentation order
    pub categories: Vec<Category>,
    /// Numeric measurements taken during the run
    pub metrics: BTreeMap<String, f64>,
    /// Per-check timings, in execution order
    pub timings: Vec<CheckTiming>,
    /// Wall-clock duration
    pub duration: Duration,
    status: RunStatus,
}

impl AuditRun {
    pub fn new(suite: &str, title: &str, page: &str, categories: &[Category]) -> Self {
        Self {
            suite: suite.to_string(),
            title: title.to_string(),
            page: page.to_string(),
            results: categories.iter().map(|c| (*c, Vec::new())).collect(),
            categories: categories.to_vec(),
            metrics: BTreeMap::new(),
            timings: Vec::new(),
            duration: Duration::ZERO,
            status: RunStatus::Ready,
        }
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Move to the next status. Status only moves forward:
    /// ready -> running -> complete | error (error is also reachable from ready).
    pub fn advance(&mut self, to: RunStatus) -> Result<(), RunError> {
        let allowed = matches!(
            (self.status, to),
            (RunStatus::Ready, RunStatus::Running)
                | (RunStatus::Ready, RunStatus::Error)
                | (RunStatus::Running, RunStatus::Complete)
                | (RunStatus::Running, RunStatus::Error)
        );

        if allowed {
            self.status = to;
            Ok(())
        } else {
            Err(RunError {
                from: self.status,
                to,
            })
        }
    }

    /// Add a finding to its category bucket. Ignored once the run is finished.
    pub fn record(&mut self, finding: Finding) {
        if self.status.is_terminal() {
            log::warn!("dropping finding recorded after run finished: {}", finding.kind);
            return;
        }
        self.results.entry(finding.category).or_default().push(finding);
    }

    pub fn set_metric(&mut self, key: &str, value: f64) {
        self.metrics.insert(key.to_string(), value);
    }

    pub fn metric(&self, key: &str) -> Option<f64> {
        self.metrics.get(key).copied()
    }

    /// Findings in one category
    pub fn findings(&self, category: Category) -> &[Finding] {
        self.results
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn count(&self, category: Category) -> usize {
        self.findings(category).len()
    }

    /// Categories to present: the taxonomy, plus any other non-empty bucket
    pub fn visible_categories(&self) -> Vec<Category> {
        let mut cats = self.categories.clone();
        for (cat, findings) in &self.results {
            if !findings.is_empty() && !cats.contains(cat) {
                cats.push(*cat);
            }
        }
        cats
    }

    /// Every finding, grouped by presentation order
    pub fn all_findings(&self) -> impl Iterator<Item = &Finding> {
        self.visible_categories()
            .into_iter()
            .flat_map(move |cat| self.findings(cat).iter())
    }

    pub fn total(&self) -> usize {
        self.results.values().map(Vec::len).sum()
    }

    fn severity_count(&self, severity: Severity) -> usize {
        self.results
            .iter()
            .filter(|(cat, _)| cat.severity() == severity)
            .map(|(_, f)| f.len())
            .sum()
    }

    pub fn error_count(&self) -> usize {
        self.severity_count(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.severity_count(Severity::Warning)
    }

    pub fn info_count(&self) -> usize {
        self.severity_count(Severity::Info)
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    /// Exit code (0 = clean, 1 = warnings, 2 = errors)
    pub fn exit_code(&self) -> i32 {
        if self.error_count() > 0 {
            2
        } else if self.warning_count() > 0 {
            1
        } else {
            0
        }
    }
}

/// The audit engine
pub struct Engine {
    catalog: Catalog,
    config: Config,
    prober: Box<dyn Prober>,
    run: AuditRun,
}

impl Engine {
    /// Create an engine. Until a prober is supplied, every probe fails at
    /// the transport level.
    pub fn new(catalog: Catalog, config: Config) -> Self {
        let run = AuditRun::new(catalog.name, catalog.title, "", &catalog.categories);
        Self {
            catalog,
            config,
            prober: Box::new(OfflineProber),
            run,
        }
    }

    /// Use a specific network prober
    pub fn with_prober(mut self, prober: Box<dyn Prober>) -> Self {
        self.prober = prober;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current (or last) run
    pub fn run(&self) -> &AuditRun {
        &self.run
    }

    pub fn status(&self) -> RunStatus {
        self.run.status()
    }

    pub fn into_run(self) -> AuditRun {
        self.run
    }

    /// Run every enabled check against the page.
    ///
    /// Replaces the previous run with a fresh one. Never fails: check
    /// failures are reported as findings.
    pub fn run_all(&mut self, page: &Page) -> &AuditRun {
        let start = Instant::now();
        self.run = AuditRun::new(
            self.catalog.name,
            self.catalog.title,
            page.url().as_str(),
            &self.catalog.categories,
        );
        if let Err(e) = self.run.advance(RunStatus::Running) {
            log::warn!("{}", e);
            return &self.run;
        }

        log::debug!("{} audit of {} started", self.catalog.name, page.url());
        record_page_metrics(&mut self.run, page);

        for check in &self.catalog.checks {
            if !self.config.is_rule_enabled(check.id()) {
                continue;
            }
            execute(&mut self.run, check.id(), || check.check(page, &self.config));
        }

        for probe in &self.catalog.probes {
            if !self.config.is_rule_enabled(probe.id()) {
                continue;
            }
            let prober = self.prober.as_ref();
            execute(&mut self.run, probe.id(), || {
                probe.check(page, &self.config, prober)
            });
        }

        self.run.duration = start.elapsed();
        self.run
            .set_metric("duration_ms", self.run.duration.as_secs_f64() * 1000.0);
        for cat in Category::ALL {
            let count = self.run.count(cat);
            if count > 0 {
                self.run.set_metric(&format!("findings.{}", cat), count as f64);
            }
        }

        if let Err(e) = self.run.advance(RunStatus::Complete) {
            log::warn!("{}", e);
        }
        log::debug!(
            "{} audit of {} finished with {} findings",
            self.catalog.name,
            page.url(),
            self.run.total()
        );
        &self.run
    }

    /// Record a run that could not start because the page was unavailable
    pub fn fail(&mut self, page: &str, error: &dyn fmt::Display) -> &AuditRun {
        self.run = AuditRun::new(
            self.catalog.name,
            self.catalog.title,
            page,
            &self.catalog.categories,
        );
        self.run.record(
            Finding::error("Page load failed", &format!("Failed to load page: {}", error))
                .with_meta("page", page),
        );
        if let Err(e) = self.run.advance(RunStatus::Error) {
            log::warn!("{}", e);
        }
        &self.run
    }

    /// Load a page from disk and audit it
    pub fn audit_file(&mut self, path: &Path, context: PageContext) -> &AuditRun {
        let label = context.url.to_string();
        match Page::load(path, context) {
            Ok(page) => self.run_all(&page),
            Err(e) => self.fail(&label, &e),
        }
    }
}

/// A page to audit: the file holding its HTML and where it is served from
#[derive(Debug, Clone)]
pub struct PageJob {
    pub path: PathBuf,
    pub context: PageContext,
}

/// Audit pages with each suite, one engine per page and suite.
///
/// Pages are spread over a thread pool when `engine.parallel` is set. Runs
/// come back in page order, then suite order.
pub fn audit_pages(
    pages: &[PageJob],
    suites: &[Suite],
    config: &Config,
    prober: Arc<dyn Prober>,
) -> Vec<AuditRun> {
    let audit = |job: &PageJob| -> Vec<AuditRun> {
        let page = match Page::load(&job.path, job.context.clone()) {
            Ok(page) => page,
            Err(e) => {
                return suites
                    .iter()
                    .map(|suite| {
                        let mut engine = Engine::new(suite.catalog(), config.clone());
                        engine.fail(job.context.url.as_str(), &e);
                        engine.into_run()
                    })
                    .collect();
            }
        };

        suites
            .iter()
            .map(|suite| {
                let mut engine = Engine::new(suite.catalog(), config.clone())
                    .with_prober(Box::new(Arc::clone(&prober)));
                engine.run_all(&page);
                engine.into_run()
            })
            .collect()
    };

    let runs: Vec<Vec<AuditRun>> = if config.engine.parallel && pages.len() > 1 {
        let threads = if config.engine.jobs > 0 {
            config.engine.jobs
        } else {
            num_cpus::get()
        };
        match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(pool) => pool.install(|| pages.par_iter().map(audit).collect()),
            Err(e) => {
                log::warn!("thread pool unavailable, auditing sequentially: {}", e);
                pages.iter().map(audit).collect()
            }
        }
    } else {
        pages.iter().map(audit).collect()
    };

    runs.into_iter().flatten().collect()
}

fn record_page_metrics(run: &mut AuditRun, page: &Page) {
    let (nodes, depth) = page.dom_stats();
    run.set_metric("dom.nodes", nodes as f64);
    run.set_metric("dom.depth", depth as f64);
    run.set_metric("images", page.select("img").len() as f64);
    run.set_metric("links", page.select("a[href]").len() as f64);
    run.set_metric("scripts", page.select("script[src]").len() as f64);
    run.set_metric(
        "stylesheets",
        page.select("link[rel~=stylesheet]").len() as f64,
    );
    run.set_metric("third_party", page.third_party_resources().len() as f64);
}

/// Run one check, converting errors and panics into a failure finding
fn execute<F>(run: &mut AuditRun, check_id: &str, f: F)
where
    F: FnOnce() -> Result<Vec<Finding>, CheckError>,
{
    let start = Instant::now();
    let outcome = panic::catch_unwind(AssertUnwindSafe(f));
    let mut timing = CheckTiming {
        check_id: check_id.to_string(),
        ..CheckTiming::default()
    };

    match outcome {
        Ok(Ok(findings)) => {
            timing.findings = findings.len();
            for mut finding in findings {
                if finding.check.is_empty() {
                    finding.check = check_id.to_string();
                }
                run.record(finding);
            }
        }
        Ok(Err(e)) => {
            log::warn!("check {} failed: {}", check_id, e);
            timing.failed = true;
            run.record(failure(check_id, &e.to_string()));
        }
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panicked".to_string());
            log::warn!("check {} panicked: {}", check_id, message);
            timing.failed = true;
            run.record(failure(check_id, &message));
        }
    }

    timing.duration = start.elapsed();
    run.timings.push(timing);
}

fn failure(check_id: &str, message: &str) -> Finding {
    let mut finding = Finding::error(
        "Check failed",
        &format!("Check '{}' failed: {}", check_id, message),
    )
    .with_meta("check", check_id);
    finding.check = check_id.to_string();
    finding
}
