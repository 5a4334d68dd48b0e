//! Link checks
//!
//! Every anchor is classified by its destination. Empty, same-page and
//! external links are reported synchronously; same-origin links are probed
//! afterwards, one URL at a time in document order.

use crate::config::Config;
use crate::finding::{Category, Finding};
use crate::page::{self, Page};
use crate::probe::{self, Prober, Reachability};
use crate::rule::{Catalog, CheckError};
use reqwest::Url;
use scraper::ElementRef;
use std::collections::HashMap;

type CheckResult = Result<Vec<Finding>, CheckError>;

/// Where an anchor leads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    /// No usable destination
    Empty,
    /// A fragment on the current page
    SamePage(String),
    /// Another origin, or a non-web scheme such as `mailto:`
    External(Url),
    /// Same origin, eligible for probing
    Internal(Url),
}

/// Classify an anchor's `href` relative to the page
pub fn classify(page: &Page, href: Option<&str>) -> LinkTarget {
    let Some(href) = href.map(str::trim).filter(|h| !h.is_empty() && *h != "#") else {
        return LinkTarget::Empty;
    };
    if href.to_lowercase().starts_with("javascript:") {
        return LinkTarget::Empty;
    }
    if let Some(fragment) = href.strip_prefix('#') {
        return LinkTarget::SamePage(fragment.to_string());
    }

    let Some(url) = page.resolve_url(href) else {
        return LinkTarget::Empty;
    };

    if !matches!(url.scheme(), "http" | "https") || !page.is_same_origin(&url) {
        return LinkTarget::External(url);
    }

    let mut current = page.url().clone();
    current.set_fragment(None);
    let mut without_fragment = url.clone();
    without_fragment.set_fragment(None);
    if let Some(fragment) = url.fragment().filter(|_| without_fragment == current) {
        return LinkTarget::SamePage(fragment.to_string());
    }

    LinkTarget::Internal(url)
}

/// The link catalog
pub fn catalog() -> Catalog {
    Catalog::new(
        "links",
        "Link Audit",
        vec![
            Category::Broken,
            Category::EmptyHrefs,
            Category::SamePage,
            Category::External,
            Category::Internal,
            Category::Warning,
        ],
    )
    .check("links-empty-href", "Anchors need a destination", empty_hrefs)
    .check(
        "links-same-page",
        "Anchors to fragments on this page",
        same_page,
    )
    .check("links-external", "Links leaving the site", external)
    .probe(
        "links-internal",
        "Same-origin links must be reachable",
        internal,
    )
}

fn anchors(page: &Page) -> Vec<(ElementRef<'_>, LinkTarget)> {
    page.select("a")
        .into_iter()
        .filter(|a| !page::has_attr(a, "name") || page::has_attr(a, "href"))
        .map(|a| {
            let target = classify(page, page::attr(&a, "href"));
            (a, target)
        })
        .collect()
}

fn link_text(a: &ElementRef<'_>) -> String {
    let text = page::text_content(a);
    if !text.is_empty() {
        return text;
    }
    page::attr(a, "aria-label")
        .or_else(|| page::attr(a, "title"))
        .unwrap_or("")
        .to_string()
}

fn empty_hrefs(page: &Page, _: &Config) -> CheckResult {
    Ok(anchors(page)
        .into_iter()
        .filter(|(_, target)| *target == LinkTarget::Empty)
        .map(|(a, _)| {
            let href = page::attr(&a, "href");
            Finding::new(
                Category::EmptyHrefs,
                "Empty link target",
                &match href {
                    None => format!("Link \"{}\" has no href", link_text(&a)),
                    Some(h) => format!("Link \"{}\" has unusable href \"{}\"", link_text(&a), h),
                },
            )
            .with_target(&a)
            .with_meta("href", href.unwrap_or(""))
        })
        .collect())
}

/// Whether a fragment names an element on the page
fn fragment_exists(page: &Page, fragment: &str) -> bool {
    if fragment.is_empty() || fragment.eq_ignore_ascii_case("top") {
        return true;
    }
    page.by_id(fragment).is_some()
        || page
            .select("a[name]")
            .iter()
            .any(|a| page::attr(a, "name") == Some(fragment))
}

fn same_page(page: &Page, _: &Config) -> CheckResult {
    let mut findings = Vec::new();

    for (a, target) in anchors(page) {
        let LinkTarget::SamePage(fragment) = target else {
            continue;
        };

        findings.push(
            Finding::new(
                Category::SamePage,
                "Same-page anchor",
                &format!("Link \"{}\" jumps to #{}", link_text(&a), fragment),
            )
            .with_target(&a)
            .with_meta("fragment", fragment.as_str()),
        );

        if !fragment_exists(page, &fragment) {
            findings.push(
                Finding::warning(
                    "Dangling same-page anchor",
                    &format!("No element with id \"{}\" on this page", fragment),
                )
                .with_target(&a)
                .with_meta("fragment", fragment),
            );
        }
    }

    Ok(findings)
}

fn external(page: &Page, config: &Config) -> CheckResult {
    Ok(anchors(page)
        .into_iter()
        .filter_map(|(a, target)| match target {
            LinkTarget::External(url) => Some((a, url)),
            _ => None,
        })
        .map(|(a, url)| {
            let mut finding = Finding::new(
                Category::External,
                "External link",
                &format!("Link \"{}\" leaves the site: {}", link_text(&a), url),
            )
            .with_target(&a)
            .with_meta("url", url.as_str())
            .with_meta("scheme", url.scheme());

            if let Some(host) = url.host_str() {
                finding = finding
                    .with_meta("host", host)
                    .with_meta("allowListed", config.links.is_allowed_host(host));
            }
            finding
        })
        .collect())
}

fn internal(page: &Page, _: &Config, prober: &dyn Prober) -> CheckResult {
    let mut cache: HashMap<Url, Reachability> = HashMap::new();
    let mut findings = Vec::new();

    for (a, target) in anchors(page) {
        let LinkTarget::Internal(url) = target else {
            continue;
        };

        let mut key = url.clone();
        key.set_fragment(None);
        let outcome = cache
            .entry(key)
            .or_insert_with_key(|key| probe::check_link(prober, key))
            .clone();

        let text = link_text(&a);
        let finding = match outcome {
            Reachability::Reachable { status } => Finding::new(
                Category::Internal,
                "Internal link",
                &format!("Link \"{}\" to {} is reachable", text, url.path()),
            )
            .with_meta("status", status),
            Reachability::ClientRoute { reason } => Finding::new(
                Category::Internal,
                "Internal link",
                &format!(
                    "Link \"{}\" to {} did not answer but the site did; treating it as a client-side route",
                    text,
                    url.path()
                ),
            )
            .with_meta("provisional", true)
            .with_meta("reason", reason),
            Reachability::Broken { status, reason } => {
                let finding = Finding::new(
                    Category::Broken,
                    "Broken internal link",
                    &format!("Link \"{}\" to {} failed: {}", text, url.path(), reason),
                )
                .with_meta("reason", reason);
                match status {
                    Some(status) => finding.with_meta("status", status),
                    None => finding,
                }
            }
        };

        findings.push(finding.with_target(&a).with_meta("url", url.as_str()));
    }

    Ok(findings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::PageContext;
    use crate::probe::{ProbeError, ProbeResponse};
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    struct Scripted {
        answers: Vec<(&'static str, u16)>,
        calls: Mutex<Vec<String>>,
    }

    impl Prober for Scripted {
        fn head(&self, url: &Url) -> Result<ProbeResponse, ProbeError> {
            self.calls.lock().unwrap().push(url.to_string());
            self.answers
                .iter()
                .find(|(u, _)| *u == url.as_str())
                .map(|(_, status)| ProbeResponse { status: *status })
                .ok_or_else(|| ProbeError::Transport("refused".to_string()))
        }
    }

    fn page(html: &str) -> Page {
        Page::parse(html, PageContext::new("http://localhost/docs/").unwrap())
    }

    #[test]
    fn test_classify() {
        let p = page("");
        assert_eq!(classify(&p, None), LinkTarget::Empty);
        assert_eq!(classify(&p, Some("  ")), LinkTarget::Empty);
        assert_eq!(classify(&p, Some("#")), LinkTarget::Empty);
        assert_eq!(classify(&p, Some("javascript:void(0)")), LinkTarget::Empty);
        assert_eq!(
            classify(&p, Some("#intro")),
            LinkTarget::SamePage("intro".to_string())
        );
        assert_eq!(
            classify(&p, Some("http://localhost/docs/#faq")),
            LinkTarget::SamePage("faq".to_string())
        );
        assert!(matches!(
            classify(&p, Some("guide.html")),
            LinkTarget::Internal(u) if u.as_str() == "http://localhost/docs/guide.html"
        ));
        assert!(matches!(
            classify(&p, Some("https://example.com/")),
            LinkTarget::External(_)
        ));
        assert!(matches!(
            classify(&p, Some("mailto:hi@example.com")),
            LinkTarget::External(u) if u.scheme() == "mailto"
        ));
    }

    #[test]
    fn test_empty_hrefs() {
        let findings =
            empty_hrefs(&page(r##"<a>none</a><a href="">blank</a><a href="#">hash</a><a name="anchor"></a><a href="/x">ok</a>"##), &Config::default())
                .unwrap();
        assert_eq!(findings.len(), 3);
        assert!(findings.iter().all(|f| f.category == Category::EmptyHrefs));
    }

    #[test]
    fn test_same_page_and_dangling() {
        let findings = same_page(
            &page(r##"<a href="#top">Top</a><a href="#faq">FAQ</a><a href="#gone">Gone</a><h2 id="faq">FAQ</h2>"##),
            &Config::default(),
        )
        .unwrap();

        let kinds: Vec<_> = findings.iter().map(|f| (f.category, f.kind.as_str())).collect();
        assert_eq!(
            kinds,
            vec![
                (Category::SamePage, "Same-page anchor"),
                (Category::SamePage, "Same-page anchor"),
                (Category::SamePage, "Same-page anchor"),
                (Category::Warning, "Dangling same-page anchor"),
            ]
        );
    }

    #[test]
    fn test_external_never_probed() {
        let mut config = Config::default();
        config.links.allowed_hosts.push("partner.example.com".to_string());

        let html = r#"<a href="https://partner.example.com/">Partner</a><a href="https://other.example.org/">Other</a>"#;
        let findings = external(&page(html), &config).unwrap();
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].metadata["allowListed"], serde_json::json!(true));
        assert_eq!(findings[1].metadata["allowListed"], serde_json::json!(false));

        let prober = Scripted {
            answers: vec![],
            calls: Mutex::new(Vec::new()),
        };
        let probed = internal(&page(html), &config, &prober).unwrap();
        assert!(probed.is_empty());
        assert!(prober.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_internal_probe_outcomes_in_document_order() {
        let prober = Scripted {
            answers: vec![
                ("http://localhost/", 200),
                ("http://localhost/docs/ok.html", 200),
                ("http://localhost/docs/gone.html", 404),
            ],
            calls: Mutex::new(Vec::new()),
        };

        let html = r#"
            <a href="gone.html">Gone</a>
            <a href="ok.html">Ok</a>
            <a href="/app/settings">Route</a>
            <a href="ok.html#part">Ok again</a>
        "#;
        let findings = internal(&page(html), &Config::default(), &prober).unwrap();

        let summary: Vec<_> = findings.iter().map(|f| (f.category, f.kind.as_str())).collect();
        assert_eq!(
            summary,
            vec![
                (Category::Broken, "Broken internal link"),
                (Category::Internal, "Internal link"),
                (Category::Internal, "Internal link"),
                (Category::Internal, "Internal link"),
            ]
        );
        assert_eq!(findings[0].metadata["status"], serde_json::json!(404));
        assert_eq!(findings[2].metadata["provisional"], serde_json::json!(true));

        // ok.html is probed once; the route costs a probe plus the root fallback
        assert_eq!(prober.calls.lock().unwrap().len(), 4);
    }
}
