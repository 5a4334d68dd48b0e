//! Configuration for the audit engine
//!
//! Reads configuration from:
//! - `.pageauditrc.yaml` / `.pageauditrc.json` (project-level)
//! - `~/.pageauditrc.yaml` (user-level)
//!
//! Every section falls back to its defaults when omitted, and unknown keys
//! are ignored.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Audit multiple pages in parallel
    pub parallel: bool,

    /// Number of parallel jobs (0 = auto-detect)
    pub jobs: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            jobs: 0,
        }
    }
}

/// Output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub color: ColorMode,
    pub verbose: bool,
    /// How long a clicked element stays highlighted in the panel, in ms
    pub highlight_ms: u64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            color: ColorMode::Auto,
            verbose: false,
            highlight_ms: 3000,
        }
    }
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Html,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "html" => Ok(OutputFormat::Html),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// Color mode options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Auto,
    Always,
    Never,
}

/// Named thresholds used by the checks
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Minimum WCAG contrast ratio for text
    pub min_contrast_ratio: f64,

    /// Maximum number of elements before the DOM counts as oversized
    pub max_dom_nodes: usize,

    /// Maximum element nesting depth
    pub max_dom_depth: usize,

    /// Maximum size of a same-origin script, in KiB
    pub max_script_kb: u64,

    /// Maximum size of a same-origin stylesheet, in KiB
    pub max_stylesheet_kb: u64,

    /// Number of leading images assumed to render above the fold
    pub above_fold_images: usize,

    /// Extensions of assets that are expected to be cached
    pub cacheable_extensions: Vec<String>,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_contrast_ratio: 4.5,
            max_dom_nodes: 1500,
            max_dom_depth: 32,
            max_script_kb: 100,
            max_stylesheet_kb: 50,
            above_fold_images: 2,
            cacheable_extensions: [
                "js", "css", "png", "jpg", "jpeg", "gif", "svg", "webp", "avif", "woff", "woff2",
                "ttf", "ico",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl Thresholds {
    pub fn is_cacheable(&self, extension: &str) -> bool {
        self.cacheable_extensions
            .iter()
            .any(|e| e.eq_ignore_ascii_case(extension))
    }
}

/// Link checker settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LinksConfig {
    /// External hosts the page is expected to link to. Reported, never probed.
    pub allowed_hosts: Vec<String>,

    /// Probe timeout in seconds (unset = transport default)
    pub probe_timeout_secs: Option<u64>,
}

impl LinksConfig {
    pub fn is_allowed_host(&self, host: &str) -> bool {
        self.allowed_hosts
            .iter()
            .any(|h| h.eq_ignore_ascii_case(host))
    }
}

/// Check selection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Disabled check ids
    pub disabled: Vec<String>,

    /// Enabled check ids (empty = all)
    pub enabled: Vec<String>,
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub output: OutputConfig,
    pub thresholds: Thresholds,
    pub links: LinksConfig,
    pub rules: RulesConfig,
}

impl Config {
    /// Create default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let config: Self = match ext {
            "yaml" | "yml" => serde_yaml::from_str(&content)?,
            "json" => serde_json::from_str(&content)?,
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "Unknown config file format: {}",
                    ext
                )))
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default locations
    pub fn load_default() -> Result<Self, ConfigError> {
        let config_names = [
            ".pageauditrc.yaml",
            ".pageauditrc.yml",
            ".pageauditrc.json",
        ];

        for name in &config_names {
            let path = PathBuf::from(name);
            if path.exists() {
                return Self::load(&path);
            }
        }

        if let Some(home) = dirs::home_dir() {
            for name in &config_names {
                let path = home.join(name);
                if path.exists() {
                    return Self::load(&path);
                }
            }
        }

        Ok(Self::default())
    }

    /// Reject thresholds that cannot be meaningful
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ratio = self.thresholds.min_contrast_ratio;
        if !(1.0..=21.0).contains(&ratio) {
            return Err(ConfigError::Invalid(format!(
                "min_contrast_ratio must be between 1 and 21, got {}",
                ratio
            )));
        }
        Ok(())
    }

    /// Merge CLI arguments into configuration
    pub fn merge_cli(
        &mut self,
        format: Option<OutputFormat>,
        verbose: Option<bool>,
        jobs: Option<usize>,
        disabled_rules: Option<Vec<String>>,
        enabled_rules: Option<Vec<String>>,
        allowed_hosts: Option<Vec<String>>,
    ) {
        if let Some(f) = format {
            self.output.format = f;
        }
        if let Some(v) = verbose {
            self.output.verbose = v;
        }
        if let Some(j) = jobs {
            self.engine.jobs = j;
        }
        if let Some(disabled) = disabled_rules {
            self.rules.disabled.extend(disabled);
        }
        if let Some(enabled) = enabled_rules {
            self.rules.enabled = enabled;
        }
        if let Some(hosts) = allowed_hosts {
            self.links.allowed_hosts.extend(hosts);
        }
    }

    /// Check if a rule check is enabled
    pub fn is_rule_enabled(&self, rule_id: &str) -> bool {
        if self.rules.disabled.iter().any(|r| r == rule_id) {
            return false;
        }

        if !self.rules.enabled.is_empty() {
            return self.rules.enabled.iter().any(|r| r == rule_id);
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::new();
        assert!(config.engine.parallel);
        assert_eq!(config.engine.jobs, 0);
        assert_eq!(config.output.format, OutputFormat::Text);
        assert_eq!(config.thresholds.max_dom_nodes, 1500);
        assert_eq!(config.thresholds.max_dom_depth, 32);
        assert!(config.thresholds.is_cacheable("WOFF2"));
        assert!(!config.thresholds.is_cacheable("html"));
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("HTML".parse::<OutputFormat>().unwrap(), OutputFormat::Html);
        assert!("sarif".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_omitted_thresholds_use_defaults() {
        let yaml = r#"
thresholds:
  max_dom_nodes: 800
  some_future_threshold: 12
unknown_section:
  key: value
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.thresholds.max_dom_nodes, 800);
        assert_eq!(config.thresholds.max_dom_depth, 32);
        assert_eq!(config.thresholds.min_contrast_ratio, 4.5);
    }

    #[test]
    fn test_load_json_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.json");
        fs::write(
            &path,
            r#"{"links": {"allowed_hosts": ["docs.example.com"]}, "rules": {"disabled": ["perf-dom-size"]}}"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert!(config.links.is_allowed_host("DOCS.example.com"));
        assert!(!config.is_rule_enabled("perf-dom-size"));
        assert!(config.is_rule_enabled("perf-dom-depth"));
    }

    #[test]
    fn test_load_rejects_unknown_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.toml");
        fs::write(&path, "").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_contrast_ratio() {
        let mut config = Config::new();
        config.thresholds.min_contrast_ratio = 30.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_merge_cli() {
        let mut config = Config::new();
        config.merge_cli(
            Some(OutputFormat::Json),
            Some(true),
            Some(4),
            Some(vec!["a11y-skip-link".to_string()]),
            None,
            Some(vec!["cdn.example.com".to_string()]),
        );

        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(config.output.verbose);
        assert_eq!(config.engine.jobs, 4);
        assert!(!config.is_rule_enabled("a11y-skip-link"));
        assert!(config.links.is_allowed_host("cdn.example.com"));
    }

    #[test]
    fn test_rule_enabled() {
        let mut config = Config::new();
        assert!(config.is_rule_enabled("any-rule"));

        config.rules.disabled.push("disabled-rule".to_string());
        assert!(!config.is_rule_enabled("disabled-rule"));

        config.rules.enabled = vec!["only-this".to_string()];
        assert!(!config.is_rule_enabled("other-rule"));
        assert!(config.is_rule_enabled("only-this"));
    }
}
