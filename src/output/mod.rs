//! Output formatters for audit runs

mod html;
mod json;
mod text;

pub use html::HtmlFormatter;
pub use json::JsonFormatter;
pub use text::TextFormatter;

use crate::config::{ColorMode, OutputConfig, OutputFormat};
use crate::engine::AuditRun;
use crate::finding::Finding;

/// Output formatter trait
pub trait OutputFormatter: Send + Sync {
    /// Format every run of an invocation
    fn format(&self, runs: &[AuditRun]) -> String;

    /// Format a single finding
    fn format_finding(&self, finding: &Finding) -> String;
}

/// Formatter for the configured output format
pub fn formatter_for(output: &OutputConfig) -> Box<dyn OutputFormatter> {
    match output.format {
        OutputFormat::Text => {
            let mut f = TextFormatter::new();
            if output.color == ColorMode::Never {
                f = f.without_color();
            }
            f.show_timings = output.verbose;
            Box::new(f)
        }
        OutputFormat::Json => Box::new(JsonFormatter::new().pretty()),
        OutputFormat::Html => Box::new(HtmlFormatter::from_config(output)),
    }
}
