//! Human-readable text output formatter

use super::OutputFormatter;
use crate::engine::{AuditRun, RunStatus};
use crate::finding::{Finding, Severity};
use colored::*;

/// Text formatter with optional color support
pub struct TextFormatter {
    /// Enable colored output
    pub colored: bool,

    /// Show the opening tag of the element each finding refers to
    pub show_snippets: bool,

    /// Show totals and metrics
    pub show_stats: bool,

    /// Show per-check timings
    pub show_timings: bool,
}

impl Default for TextFormatter {
    fn default() -> Self {
        Self {
            colored: true,
            show_snippets: true,
            show_stats: true,
            show_timings: false,
        }
    }
}

impl TextFormatter {
    /// Create a new text formatter
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable colors
    pub fn without_color(mut self) -> Self {
        self.colored = false;
        self
    }

    fn paint(&self, s: String, severity: Severity) -> String {
        if !self.colored {
            return s;
        }
        match severity {
            Severity::Error => s.red().bold().to_string(),
            Severity::Warning => s.yellow().bold().to_string(),
            Severity::Info => s.blue().to_string(),
        }
    }

    fn dim(&self, s: &str) -> String {
        if self.colored {
            s.dimmed().to_string()
        } else {
            s.to_string()
        }
    }

    fn format_run(&self, run: &AuditRun) -> String {
        let mut output = String::new();

        let header = format!("{} - {}", run.title, run.page);
        output.push_str(&if self.colored {
            format!("{}\n", header.underline())
        } else {
            format!("{}\n", header)
        });

        if run.status() == RunStatus::Error {
            output.push_str(&format!(
                "{}\n",
                self.paint("audit did not complete".to_string(), Severity::Error)
            ));
        }

        for category in run.visible_categories() {
            let findings = run.findings(category);
            if findings.is_empty() {
                continue;
            }
            output.push_str(&format!(
                "  {} ({})\n",
                self.paint(category.label().to_string(), category.severity()),
                findings.len()
            ));
            for finding in findings {
                output.push_str(&self.format_finding(finding));
            }
        }

        if self.show_timings && !run.timings.is_empty() {
            output.push_str("  Timings:\n");
            let mut timings: Vec<_> = run.timings.iter().collect();
            timings.sort_by(|a, b| b.duration.cmp(&a.duration));
            for t in timings {
                output.push_str(&format!(
                    "    {:<32} {:>8.2}ms {:>4} findings{}\n",
                    t.check_id,
                    t.duration.as_secs_f64() * 1000.0,
                    t.findings,
                    if t.failed { " (failed)" } else { "" }
                ));
            }
        }

        output
    }
}

impl OutputFormatter for TextFormatter {
    fn format(&self, runs: &[AuditRun]) -> String {
        let mut output = String::new();

        for run in runs {
            output.push_str(&self.format_run(run));
            output.push('\n');
        }

        if self.show_stats {
            let errors: usize = runs.iter().map(AuditRun::error_count).sum();
            let warnings: usize = runs.iter().map(AuditRun::warning_count).sum();
            let infos: usize = runs.iter().map(AuditRun::info_count).sum();

            output.push_str(&format!(
                "{} {} run",
                runs.len(),
                if runs.len() == 1 { "audit" } else { "audits" }
            ));

            let mut counts = Vec::new();
            if errors > 0 {
                counts.push(self.paint(
                    format!("{} {}", errors, if errors == 1 { "error" } else { "errors" }),
                    Severity::Error,
                ));
            }
            if warnings > 0 {
                counts.push(self.paint(
                    format!(
                        "{} {}",
                        warnings,
                        if warnings == 1 { "warning" } else { "warnings" }
                    ),
                    Severity::Warning,
                ));
            }
            if infos > 0 {
                counts.push(self.paint(
                    format!("{} {}", infos, if infos == 1 { "notice" } else { "notices" }),
                    Severity::Info,
                ));
            }
            if !counts.is_empty() {
                output.push_str(&format!(": {}", counts.join(", ")));
            }
            output.push('\n');

            let total: f64 = runs.iter().map(|r| r.duration.as_secs_f64()).sum();
            output.push_str(&format!("Finished in {:.2}s\n", total));
        }

        output
    }

    fn format_finding(&self, finding: &Finding) -> String {
        let mut output = format!(
            "    {}[{}]: {}\n",
            self.paint(finding.kind.clone(), finding.severity()),
            if self.colored {
                finding.check.cyan().to_string()
            } else {
                finding.check.clone()
            },
            finding.message
        );

        if let Some(locator) = &finding.locator {
            output.push_str(&format!("      {} {}\n", self.dim("at"), locator));
        }
        if self.show_snippets {
            if let Some(target) = &finding.target {
                output.push_str(&format!("      {} {}\n", self.dim("|"), target.snippet));
            }
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::Category;

    fn finished_run() -> AuditRun {
        let mut run = AuditRun::new(
            "links",
            "Link Audit",
            "http://localhost/",
            &[Category::Broken, Category::External],
        );
        run.advance(RunStatus::Running).unwrap();
        let mut finding = Finding::new(Category::Broken, "Broken internal link", "HTTP 404");
        finding.check = "links-internal".to_string();
        finding.locator = Some("#nav > a".to_string());
        run.record(finding);
        run.advance(RunStatus::Complete).unwrap();
        run
    }

    #[test]
    fn test_format_finding() {
        let formatter = TextFormatter::new().without_color();
        let output = formatter.format_finding(&finished_run().findings(Category::Broken)[0]);
        assert!(output.contains("Broken internal link[links-internal]: HTTP 404"));
        assert!(output.contains("at #nav > a"));
    }

    #[test]
    fn test_format_runs() {
        let formatter = TextFormatter::new().without_color();
        let output = formatter.format(&[finished_run()]);
        assert!(output.contains("Link Audit - http://localhost/"));
        assert!(output.contains("Broken (1)"));
        assert!(!output.contains("External ("));
        assert!(output.contains("1 audit run: 1 error"));
    }
}
