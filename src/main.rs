//! Pageaudit CLI - development-time page auditor
//!
//! Audits static HTML pages for accessibility, performance, link and SEO
//! problems.

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use glob::glob;
use pageaudit::activation;
use pageaudit::config::{ColorMode, Config, OutputFormat};
use pageaudit::engine::{audit_pages, AuditRun, PageJob};
use pageaudit::output::formatter_for;
use pageaudit::page::PageContext;
use pageaudit::probe::{HttpProber, OfflineProber, Prober};
use pageaudit::report::Reporter;
use pageaudit::suites::Suite;
use reqwest::Url;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "pageaudit",
    version,
    about = "Development-time page auditor",
    long_about = "Audits static HTML pages: accessibility, performance, links and SEO."
)]
struct Cli {
    /// Files or glob patterns to audit
    files: Vec<String>,

    /// Suites to run (accessibility, performance, links, seo or all; comma-separated)
    #[arg(short, long, default_value = "all")]
    suite: String,

    /// URL the page is served from (default: http://localhost/<path>)
    #[arg(short, long)]
    url: Option<String>,

    /// Directory the site is served from
    #[arg(long)]
    site_root: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<Format>,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write a copy of each page with the results panel inserted
    #[arg(long)]
    inject: bool,

    /// Audit pages that are not served from a development URL
    #[arg(long)]
    force: bool,

    /// Never touch the network; every probe fails
    #[arg(long)]
    offline: bool,

    /// External hosts the pages are expected to link to
    #[arg(long = "allow-host", value_delimiter = ',')]
    allow_host: Option<Vec<String>>,

    /// Disable specific checks (comma-separated)
    #[arg(long, value_delimiter = ',')]
    disable: Option<Vec<String>>,

    /// Only enable specific checks (comma-separated)
    #[arg(long, value_delimiter = ',')]
    select: Option<Vec<String>>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Number of parallel jobs (0 = auto)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// List available checks and exit
    #[arg(long)]
    list_rules: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
    Html,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Text => OutputFormat::Text,
            Format::Json => OutputFormat::Json,
            Format::Html => OutputFormat::Html,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{}: {:#}", "error".red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    let suites = Suite::parse_list(&cli.suite).map_err(anyhow::Error::msg)?;

    if cli.list_rules {
        list_rules(&suites);
        return Ok(0);
    }

    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::load_default().context("failed to load config")?,
    };
    config.merge_cli(
        cli.format.map(OutputFormat::from),
        Some(cli.verbose),
        cli.jobs,
        cli.disable.clone(),
        cli.select.clone(),
        cli.allow_host.clone(),
    );

    if cli.no_color {
        config.output.color = ColorMode::Never;
    }
    match config.output.color {
        ColorMode::Never => colored::control::set_override(false),
        ColorMode::Always => colored::control::set_override(true),
        ColorMode::Auto => {}
    }

    let files = expand_files(&cli.files)?;
    let site_root = match &cli.site_root {
        Some(root) => root.clone(),
        None => std::env::current_dir().context("cannot determine current directory")?,
    };

    let base_url = parse_page_url(cli.url.as_deref(), files.len())?;

    let mut jobs = Vec::with_capacity(files.len());
    for path in files {
        let url = page_url(&path, &site_root, base_url.as_ref())?;
        if !activation::is_enabled(&url) && !cli.force {
            bail!(
                "{} is not a development URL; pass --force to audit it anyway",
                url
            );
        }
        log::debug!("auditing {} as {}", path.display(), url);
        jobs.push(PageJob {
            context: PageContext {
                url,
                site_root: Some(site_root.clone()),
            },
            path,
        });
    }

    let prober: Arc<dyn Prober> = if cli.offline {
        Arc::new(OfflineProber)
    } else {
        let timeout = config.links.probe_timeout_secs.map(Duration::from_secs);
        Arc::new(HttpProber::new(timeout)?)
    };

    let runs = audit_pages(&jobs, &suites, &config, prober);

    if cli.inject {
        let reporter = Reporter::from_config(&config.output);
        // Runs come back in page order, one per suite
        for (job, page_runs) in jobs.iter().zip(runs.chunks(suites.len())) {
            let written = inject_panels(job, page_runs, &reporter)?;
            if cli.verbose {
                eprintln!("Wrote {}", written.display());
            }
        }
    }

    let report = formatter_for(&config.output).format(&runs);
    match &cli.output {
        Some(path) => std::fs::write(path, report)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => print!("{}", report),
    }

    Ok(runs.iter().map(AuditRun::exit_code).max().unwrap_or(0))
}

fn list_rules(suites: &[Suite]) {
    for suite in suites {
        let catalog = suite.catalog();
        println!(
            "{} ({} checks)",
            catalog.title.bold(),
            catalog.len()
        );
        for info in catalog.infos() {
            let marker = if info.network {
                " [network]".yellow()
            } else {
                "".normal()
            };
            println!("    {}{}", info.id.cyan(), marker);
            println!("      {}", info.description);
        }
        println!();
    }
}

/// Expand glob patterns into the list of files to audit
fn expand_files(patterns: &[String]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = Vec::new();
    for pattern in patterns {
        let paths = glob(pattern).with_context(|| format!("invalid pattern '{}'", pattern))?;
        for entry in paths.flatten() {
            if is_injected_copy(&entry) {
                log::debug!("skipping injected copy {}", entry.display());
                continue;
            }
            if entry.is_file() && !files.contains(&entry) {
                files.push(entry);
            }
        }
    }

    if files.is_empty() {
        bail!("no files found to audit");
    }
    Ok(files)
}

/// Pages written by `--inject`
fn is_injected_copy(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.to_ascii_lowercase().ends_with(".audit.html"))
}

/// Parse `--url`. A URL whose path does not end in `/` names one page and
/// cannot be shared by several files.
fn parse_page_url(url: Option<&str>, file_count: usize) -> anyhow::Result<Option<Url>> {
    let Some(url) = url else {
        return Ok(None);
    };
    let parsed = Url::parse(url).with_context(|| format!("invalid URL '{}'", url))?;
    if !parsed.path().ends_with('/') && file_count > 1 {
        bail!(
            "--url {} names a single page but {} files were given; end it with '/' to use it as a base",
            parsed,
            file_count
        );
    }
    Ok(Some(parsed))
}

/// URL a page is audited as.
///
/// A `--url` ending in `/` is a base the page's site-relative path is
/// joined onto; any other `--url` is used verbatim.
fn page_url(path: &Path, site_root: &Path, url: Option<&Url>) -> anyhow::Result<Url> {
    let relative = site_path(path, site_root);
    match url {
        Some(base) if base.path().ends_with('/') => Ok(base.join(&relative)?),
        Some(page) => Ok(page.clone()),
        None => Ok(Url::parse("http://localhost/")?.join(&relative)?),
    }
}

/// Path of a file under the site root, `/`-separated
fn site_path(path: &Path, site_root: &Path) -> String {
    let absolute = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let root = std::fs::canonicalize(site_root).unwrap_or_else(|_| site_root.to_path_buf());
    let relative = absolute
        .strip_prefix(&root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| PathBuf::from(path.file_name().unwrap_or_default()));

    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Write `<name>.audit.html` next to the page with one panel per run.
/// `runs` are the runs of this page only.
fn inject_panels(job: &PageJob, runs: &[AuditRun], reporter: &Reporter) -> anyhow::Result<PathBuf> {
    let mut html = std::fs::read_to_string(&job.path)
        .with_context(|| format!("failed to read {}", job.path.display()))?;

    for run in runs {
        let mut panel = reporter.present(run);
        html = panel.inject(&html)?;
    }

    let target = job.path.with_extension("audit.html");
    std::fs::write(&target, html)
        .with_context(|| format!("failed to write {}", target.display()))?;
    Ok(target)
}
