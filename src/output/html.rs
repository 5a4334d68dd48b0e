//! HTML output formatter
//!
//! Renders every run as a results panel inside one self-contained document.

use super::OutputFormatter;
use crate::config::OutputConfig;
use crate::engine::AuditRun;
use crate::finding::Finding;
use crate::report::{html_escape, Reporter};

/// HTML formatter
pub struct HtmlFormatter {
    reporter: Reporter,
    /// Document title
    title: String,
}

impl HtmlFormatter {
    pub fn new() -> Self {
        Self {
            reporter: Reporter::new().floating(false),
            title: "Page Audit Report".to_string(),
        }
    }

    pub fn from_config(output: &OutputConfig) -> Self {
        Self {
            reporter: Reporter::from_config(output).floating(false),
            ..Self::new()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

impl Default for HtmlFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputFormatter for HtmlFormatter {
    fn format(&self, runs: &[AuditRun]) -> String {
        let panels: Vec<String> = runs
            .iter()
            .filter_map(|run| {
                let mut panel = self.reporter.present(run);
                panel
                    .display()
                    .and_then(|_| panel.render())
                    .map_err(|e| log::warn!("cannot render panel for {}: {}", run.page, e))
                    .ok()
            })
            .collect();

        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>body {{ background: #f5f5f5; padding: 20px; }} .pageaudit-panel {{ margin: 0 auto 20px; }}</style>
</head>
<body>
<h1>{title}</h1>
{panels}
<footer><p>Generated by pageaudit v{version}</p></footer>
</body>
</html>
"#,
            title = html_escape(&self.title),
            panels = panels.join("\n"),
            version = env!("CARGO_PKG_VERSION"),
        )
    }

    fn format_finding(&self, finding: &Finding) -> String {
        format!(
            r#"<p class="pa-item pa-{}"><strong>{}</strong> {}</p>"#,
            finding.severity(),
            html_escape(&finding.kind),
            html_escape(&finding.message)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RunStatus;
    use crate::finding::Category;

    #[test]
    fn test_one_panel_per_run() {
        let runs: Vec<AuditRun> = ["a", "b"]
            .iter()
            .map(|page| {
                let mut run = AuditRun::new("seo", "SEO Audit", page, &[Category::Error]);
                run.advance(RunStatus::Running).unwrap();
                run.record(Finding::error("Missing title", "Page has no <title>"));
                run.advance(RunStatus::Complete).unwrap();
                run
            })
            .collect();

        let html = HtmlFormatter::new().format(&runs);
        assert_eq!(html.matches("class=\"pageaudit-panel\"").count(), 2);
        assert!(html.contains("Page has no &lt;title&gt;"));
        assert!(html.contains("position:static;"));
    }
}
