//! Built-in rule catalogs

pub mod accessibility;
pub mod links;
pub mod performance;
pub mod seo;

use crate::rule::Catalog;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A built-in catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Suite {
    Accessibility,
    Performance,
    Links,
    Seo,
}

impl Suite {
    pub const ALL: [Suite; 4] = [
        Suite::Accessibility,
        Suite::Performance,
        Suite::Links,
        Suite::Seo,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Suite::Accessibility => "accessibility",
            Suite::Performance => "performance",
            Suite::Links => "links",
            Suite::Seo => "seo",
        }
    }

    /// Build a fresh catalog for this suite
    pub fn catalog(&self) -> Catalog {
        match self {
            Suite::Accessibility => accessibility::catalog(),
            Suite::Performance => performance::catalog(),
            Suite::Links => links::catalog(),
            Suite::Seo => seo::catalog(),
        }
    }

    /// Parse a suite selector; `all` expands to every suite
    pub fn parse_list(s: &str) -> Result<Vec<Suite>, String> {
        let mut suites = Vec::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            if part.eq_ignore_ascii_case("all") {
                return Ok(Suite::ALL.to_vec());
            }
            let suite: Suite = part.parse()?;
            if !suites.contains(&suite) {
                suites.push(suite);
            }
        }
        if suites.is_empty() {
            return Err("No suite selected".to_string());
        }
        Ok(suites)
    }
}

impl fmt::Display for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Suite {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "accessibility" | "a11y" => Ok(Suite::Accessibility),
            "performance" | "perf" => Ok(Suite::Performance),
            "links" => Ok(Suite::Links),
            "seo" => Ok(Suite::Seo),
            _ => Err(format!("Unknown suite: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_parse_list() {
        assert_eq!(Suite::parse_list("all").unwrap().len(), 4);
        assert_eq!(
            Suite::parse_list("a11y, links,a11y").unwrap(),
            vec![Suite::Accessibility, Suite::Links]
        );
        assert!(Suite::parse_list("speed").is_err());
        assert!(Suite::parse_list("").is_err());
    }

    #[test]
    fn test_check_ids_are_unique_and_prefixed() {
        let mut seen = HashSet::new();
        for suite in Suite::ALL {
            let catalog = suite.catalog();
            assert_eq!(catalog.name, suite.name());
            assert!(!catalog.is_empty());
            let prefix = match suite {
                Suite::Accessibility => "a11y-",
                Suite::Performance => "perf-",
                Suite::Links => "links-",
                Suite::Seo => "seo-",
            };
            for info in catalog.infos() {
                assert!(info.id.starts_with(prefix), "{} lacks {}", info.id, prefix);
                assert!(seen.insert(info.id.clone()), "duplicate id {}", info.id);
            }
        }
    }

    #[test]
    fn test_only_links_has_network_checks() {
        for suite in Suite::ALL {
            let network = suite.catalog().infos().iter().any(|i| i.network);
            assert_eq!(network, suite == Suite::Links);
        }
    }
}
