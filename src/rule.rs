//! Rule checks and the catalogs that group them

use crate::config::Config;
use crate::finding::{Category, Finding};
use crate::page::Page;
use crate::probe::Prober;
use thiserror::Error;

/// Failure inside a single check
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("invalid selector: {0}")]
    Selector(String),

    #[error("{0}")]
    Failed(String),
}

/// Signature of a synchronous check
pub type CheckFn = fn(&Page, &Config) -> Result<Vec<Finding>, CheckError>;

/// Signature of a check that needs the network
pub type ProbeFn = fn(&Page, &Config, &dyn Prober) -> Result<Vec<Finding>, CheckError>;

/// A named check evaluated against the whole page.
///
/// Checks read the page and never modify it.
pub trait RuleCheck: Send + Sync {
    /// Stable identifier used for enable/disable lists
    fn id(&self) -> &str;

    /// One-line description
    fn description(&self) -> &str;

    /// Run the check
    fn check(&self, page: &Page, config: &Config) -> Result<Vec<Finding>, CheckError>;
}

/// A check that issues reachability probes. These run after every
/// synchronous check has finished.
pub trait ProbeCheck: Send + Sync {
    fn id(&self) -> &str;

    fn description(&self) -> &str;

    fn check(
        &self,
        page: &Page,
        config: &Config,
        prober: &dyn Prober,
    ) -> Result<Vec<Finding>, CheckError>;
}

/// A check backed by a plain function
pub struct FnCheck {
    pub id: &'static str,
    pub description: &'static str,
    pub run: CheckFn,
}

impl RuleCheck for FnCheck {
    fn id(&self) -> &str {
        self.id
    }

    fn description(&self) -> &str {
        self.description
    }

    fn check(&self, page: &Page, config: &Config) -> Result<Vec<Finding>, CheckError> {
        (self.run)(page, config)
    }
}

/// A probe check backed by a plain function
pub struct FnProbe {
    pub id: &'static str,
    pub description: &'static str,
    pub run: ProbeFn,
}

impl ProbeCheck for FnProbe {
    fn id(&self) -> &str {
        self.id
    }

    fn description(&self) -> &str {
        self.description
    }

    fn check(
        &self,
        page: &Page,
        config: &Config,
        prober: &dyn Prober,
    ) -> Result<Vec<Finding>, CheckError> {
        (self.run)(page, config, prober)
    }
}

/// Id and description of a registered check, for listings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckInfo {
    pub id: String,
    pub description: String,
    pub network: bool,
}

/// An ordered battery of checks plus the categories it reports into
pub struct Catalog {
    /// Short name, e.g. "accessibility"
    pub name: &'static str,
    /// Panel title
    pub title: &'static str,
    /// Buckets in presentation order
    pub categories: Vec<Category>,
    /// Synchronous checks, run in order
    pub checks: Vec<Box<dyn RuleCheck>>,
    /// Network checks, run in order after the synchronous ones
    pub probes: Vec<Box<dyn ProbeCheck>>,
}

impl Catalog {
    pub fn new(name: &'static str, title: &'static str, categories: Vec<Category>) -> Self {
        Self {
            name,
            title,
            categories,
            checks: Vec::new(),
            probes: Vec::new(),
        }
    }

    /// Register a function check
    pub fn check(mut self, id: &'static str, description: &'static str, run: CheckFn) -> Self {
        self.checks.push(Box::new(FnCheck {
            id,
            description,
            run,
        }));
        self
    }

    /// Register a function probe check
    pub fn probe(mut self, id: &'static str, description: &'static str, run: ProbeFn) -> Self {
        self.probes.push(Box::new(FnProbe {
            id,
            description,
            run,
        }));
        self
    }

    /// Register a boxed check
    pub fn with_check(mut self, check: Box<dyn RuleCheck>) -> Self {
        self.checks.push(check);
        self
    }

    /// All registered checks, synchronous first
    pub fn infos(&self) -> Vec<CheckInfo> {
        let sync = self.checks.iter().map(|c| CheckInfo {
            id: c.id().to_string(),
            description: c.description().to_string(),
            network: false,
        });
        let net = self.probes.iter().map(|p| CheckInfo {
            id: p.id().to_string(),
            description: p.description().to_string(),
            network: true,
        });
        sync.chain(net).collect()
    }

    pub fn len(&self) -> usize {
        self.checks.len() + self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::PageContext;

    fn count_paragraphs(page: &Page, _: &Config) -> Result<Vec<Finding>, CheckError> {
        let n = page.select("p").len();
        Ok(vec![Finding::notice("Paragraphs", &format!("{} paragraphs", n))])
    }

    #[test]
    fn test_fn_check() {
        let catalog = Catalog::new("test", "Test", vec![Category::Notice]).check(
            "test-paragraphs",
            "Counts paragraphs",
            count_paragraphs,
        );

        let page = Page::parse("<p>a</p><p>b</p>", PageContext::default());
        let findings = catalog.checks[0].check(&page, &Config::default()).unwrap();
        assert_eq!(findings[0].message, "2 paragraphs");
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_infos_order() {
        fn nothing(_: &Page, _: &Config, _: &dyn Prober) -> Result<Vec<Finding>, CheckError> {
            Ok(Vec::new())
        }

        let catalog = Catalog::new("test", "Test", vec![])
            .probe("net", "network", nothing)
            .check("sync", "sync", count_paragraphs);

        let infos = catalog.infos();
        assert_eq!(infos[0].id, "sync");
        assert!(!infos[0].network);
        assert_eq!(infos[1].id, "net");
        assert!(infos[1].network);
    }

    #[test]
    fn test_check_error_display() {
        let err = CheckError::Failed("boom".to_string());
        assert_eq!(format!("{}", err), "boom");
        let err = CheckError::Selector("p[".to_string());
        assert_eq!(format!("{}", err), "invalid selector: p[");
    }
}
