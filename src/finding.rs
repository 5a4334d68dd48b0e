//! Finding types for audit results

use crate::locator;
use scraper::ElementRef;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Bucket a finding is reported under.
///
/// Each catalog uses a subset of these as its taxonomy; `Error` is always
/// available because failed checks are reported there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    Error,
    Issue,
    Warning,
    Notice,
    Keyboard,
    Broken,
    EmptyHrefs,
    SamePage,
    External,
    Internal,
}

impl Category {
    /// Every category, in presentation order
    pub const ALL: [Category; 10] = [
        Category::Error,
        Category::Issue,
        Category::Warning,
        Category::Notice,
        Category::Keyboard,
        Category::Broken,
        Category::EmptyHrefs,
        Category::SamePage,
        Category::External,
        Category::Internal,
    ];

    /// Human-readable tab label
    pub fn label(&self) -> &'static str {
        match self {
            Category::Error => "Errors",
            Category::Issue => "Issues",
            Category::Warning => "Warnings",
            Category::Notice => "Notices",
            Category::Keyboard => "Keyboard",
            Category::Broken => "Broken",
            Category::EmptyHrefs => "Empty hrefs",
            Category::SamePage => "Same page",
            Category::External => "External",
            Category::Internal => "Internal",
        }
    }

    /// Severity used for exit codes and terminal colors
    pub fn severity(&self) -> Severity {
        match self {
            Category::Error | Category::Issue | Category::Broken => Severity::Error,
            Category::Warning | Category::EmptyHrefs => Severity::Warning,
            Category::Notice
            | Category::Keyboard
            | Category::SamePage
            | Category::External
            | Category::Internal => Severity::Info,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::Error => "error",
            Category::Issue => "issue",
            Category::Warning => "warning",
            Category::Notice => "notice",
            Category::Keyboard => "keyboard",
            Category::Broken => "broken",
            Category::EmptyHrefs => "emptyHrefs",
            Category::SamePage => "samePage",
            Category::External => "external",
            Category::Internal => "internal",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" | "errors" => Ok(Category::Error),
            "issue" | "issues" => Ok(Category::Issue),
            "warning" | "warnings" => Ok(Category::Warning),
            "notice" | "notices" => Ok(Category::Notice),
            "keyboard" => Ok(Category::Keyboard),
            "broken" => Ok(Category::Broken),
            "emptyhrefs" | "empty-hrefs" => Ok(Category::EmptyHrefs),
            "samepage" | "same-page" => Ok(Category::SamePage),
            "external" => Ok(Category::External),
            "internal" => Ok(Category::Internal),
            _ => Err(format!("Unknown category: {}", s)),
        }
    }
}

/// Severity level derived from a category
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational
    Info,
    /// Potential problem
    #[default]
    Warning,
    /// Definite problem
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Short description of the element a finding points at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Lowercase tag name
    pub tag: String,
    /// Opening tag, truncated for display
    pub snippet: String,
}

impl Target {
    const MAX_SNIPPET: usize = 120;

    pub fn from_element(element: &ElementRef<'_>) -> Self {
        let value = element.value();
        let mut snippet = format!("<{}", value.name());
        for (name, val) in value.attrs() {
            if val.is_empty() {
                snippet.push_str(&format!(" {}", name));
            } else {
                snippet.push_str(&format!(" {}=\"{}\"", name, val));
            }
        }
        snippet.push('>');

        if snippet.chars().count() > Self::MAX_SNIPPET {
            snippet = snippet.chars().take(Self::MAX_SNIPPET - 1).collect();
            snippet.push('…');
        }

        Self {
            tag: value.name().to_string(),
            snippet,
        }
    }
}

/// One reported observation from a rule check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Id of the check that produced it (filled in by the engine)
    #[serde(default)]
    pub check: String,
    /// Bucket the finding belongs to
    pub category: Category,
    /// Short label, e.g. "Missing alt attribute"
    pub kind: String,
    /// Human-readable detail
    pub message: String,
    /// Element the finding refers to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
    /// Selector path for re-locating the element
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,
    /// Extra detail (measured values, URLs, status codes)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

impl Finding {
    /// Create a new finding
    pub fn new(category: Category, kind: &str, message: &str) -> Self {
        Self {
            check: String::new(),
            category,
            kind: kind.to_string(),
            message: message.to_string(),
            target: None,
            locator: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn error(kind: &str, message: &str) -> Self {
        Self::new(Category::Error, kind, message)
    }

    pub fn warning(kind: &str, message: &str) -> Self {
        Self::new(Category::Warning, kind, message)
    }

    pub fn notice(kind: &str, message: &str) -> Self {
        Self::new(Category::Notice, kind, message)
    }

    /// Attach the element this finding is about, resolving its locator
    pub fn with_target(mut self, element: &ElementRef<'_>) -> Self {
        self.target = Some(Target::from_element(element));
        let path = locator::resolve(Some(element));
        if !path.is_empty() {
            self.locator = Some(path);
        }
        self
    }

    /// Add a metadata entry
    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn severity(&self) -> Severity {
        self.category.severity()
    }

    pub fn is_error(&self) -> bool {
        self.severity() == Severity::Error
    }

    pub fn is_warning(&self) -> bool {
        self.severity() == Severity::Warning
    }
}
