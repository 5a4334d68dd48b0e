//! Pageaudit - development-time page auditor
//!
//! Runs batteries of rule checks over an HTML page and reports what they
//! find: accessibility problems, performance smells, broken or empty links,
//! and missing SEO metadata.
//!
//! # Architecture
//!
//! ```text
//! CLI/API -> Engine(Catalog) -> RuleCheck / ProbeCheck -> Page
//!                 |                               |
//!              AuditRun -> Reporter / formatters  Prober (HEAD, no-cache)
//! ```
//!
//! An [`Engine`] is built around one [`Catalog`]: an ordered list of checks
//! plus the finding categories it reports into. Synchronous checks run
//! first; network checks run afterwards, one probe at a time. Failures inside
//! a check are recorded as findings, so a run always completes.
//!
//! # Example
//!
//! ```no_run
//! use pageaudit::{Config, Engine, Page, PageContext, Reporter, Suite};
//!
//! let context = PageContext::new("http://localhost:8080/index.html").unwrap();
//! let page = Page::parse("<html><body><img src=\"a.png\"></body></html>", context);
//!
//! let mut engine = Engine::new(Suite::Accessibility.catalog(), Config::default());
//! let run = engine.run_all(&page);
//! assert_eq!(run.error_count(), 1);
//!
//! let mut panel = Reporter::new().present(run);
//! let html = panel.inject("<html><body></body></html>").unwrap();
//! # let _ = html;
//! ```

pub mod activation;
pub mod config;
pub mod css;
pub mod engine;
pub mod finding;
pub mod locator;
pub mod output;
pub mod page;
pub mod probe;
pub mod report;
pub mod rule;
pub mod suites;

// Re-export main types
pub use config::Config;
pub use engine::{audit_pages, AuditRun, CheckTiming, Engine, PageJob, RunError, RunStatus};
pub use finding::{Category, Finding, Severity, Target};
pub use page::{Page, PageContext, PageError};
pub use probe::{HttpProber, OfflineProber, ProbeError, ProbeResponse, Prober, Reachability};
pub use report::{Panel, PanelError, PanelState, Reporter};
pub use rule::{Catalog, CheckError, CheckInfo, ProbeCheck, RuleCheck};
pub use suites::Suite;
