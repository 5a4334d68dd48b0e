//! SEO checks
//!
//! Head metadata (title, description, social cards, canonical link,
//! viewport, charset, favicon), structured data, top-level headings and
//! leftovers from development such as filler text and localhost URLs.

use crate::activation::is_development_host;
use crate::config::Config;
use crate::finding::{Category, Finding};
use crate::page::{self, Page};
use crate::rule::{Catalog, CheckError};
use regex::Regex;
use std::ops::RangeInclusive;
use std::sync::OnceLock;

type CheckResult = Result<Vec<Finding>, CheckError>;

/// Recommended meta description length in characters
const DESCRIPTION_LENGTH: RangeInclusive<usize> = 50..=160;

/// Titles longer than this are truncated in search results
const MAX_TITLE_LENGTH: usize = 60;

const OPEN_GRAPH_TAGS: &[&str] = &["og:title", "og:description", "og:image"];

/// Attributes that carry URLs
const URL_ATTRIBUTES: &[&str] = &["href", "src", "action", "content", "srcset", "poster"];

/// The SEO catalog
pub fn catalog() -> Catalog {
    Catalog::new(
        "seo",
        "SEO Audit",
        vec![Category::Error, Category::Warning, Category::Notice],
    )
    .check("seo-title", "Pages need a concise <title>", title)
    .check(
        "seo-meta-description",
        "Pages need a meta description of sensible length",
        meta_description,
    )
    .check("seo-open-graph", "Open Graph tags for link previews", open_graph)
    .check("seo-twitter-card", "Twitter card metadata", twitter_card)
    .check("seo-canonical", "Canonical link", canonical)
    .check("seo-viewport", "Viewport meta tag", viewport)
    .check("seo-charset", "Character set declaration", charset)
    .check(
        "seo-structured-data",
        "Schema.org structured data",
        structured_data,
    )
    .check("seo-h1", "Exactly one <h1> per page", h1)
    .check("seo-favicon", "Favicon link", favicon)
    .check("seo-placeholder-text", "Leftover lorem ipsum text", placeholder_text)
    .check(
        "seo-localhost-refs",
        "URLs pointing at a development host",
        localhost_refs,
    )
}

/// `content` of the first `<meta>` whose `name` or `property` matches
fn meta_content<'a>(page: &'a Page, key: &str) -> Option<&'a str> {
    page.select("meta")
        .into_iter()
        .find(|m| {
            page::attr(m, "name").is_some_and(|n| n.eq_ignore_ascii_case(key))
                || page::attr(m, "property").is_some_and(|p| p.eq_ignore_ascii_case(key))
        })
        .and_then(|m| page::attr(&m, "content"))
}

fn title(page: &Page, _: &Config) -> CheckResult {
    let text = page
        .first("title")
        .map(|t| page::text_content(&t))
        .unwrap_or_default();

    if text.is_empty() {
        return Ok(vec![Finding::error(
            "Missing title",
            "Page has no <title> or it is empty",
        )]);
    }

    let length = text.chars().count();
    if length > MAX_TITLE_LENGTH {
        let mut finding = Finding::warning(
            "Title too long",
            &format!(
                "Title is {} characters; search results show about {}",
                length, MAX_TITLE_LENGTH
            ),
        )
        .with_meta("length", length)
        .with_meta("title", text);
        if let Some(el) = page.first("title") {
            finding = finding.with_target(&el);
        }
        return Ok(vec![finding]);
    }

    Ok(Vec::new())
}

fn meta_description(page: &Page, _: &Config) -> CheckResult {
    let Some(description) = meta_content(page, "description").filter(|d| !d.is_empty()) else {
        return Ok(vec![Finding::error(
            "Missing meta description",
            "No <meta name=\"description\"> with content",
        )]);
    };

    let length = description.chars().count();
    if DESCRIPTION_LENGTH.contains(&length) {
        return Ok(Vec::new());
    }

    Ok(vec![Finding::warning(
        "Meta description length",
        &format!(
            "Meta description is {} characters; aim for {} to {}",
            length,
            DESCRIPTION_LENGTH.start(),
            DESCRIPTION_LENGTH.end()
        ),
    )
    .with_meta("length", length)])
}

fn open_graph(page: &Page, _: &Config) -> CheckResult {
    Ok(OPEN_GRAPH_TAGS
        .iter()
        .filter(|tag| meta_content(page, tag).map_or(true, str::is_empty))
        .map(|tag| {
            Finding::warning(
                "Missing Open Graph tag",
                &format!("No <meta property=\"{}\">; shared links will lack a preview", tag),
            )
            .with_meta("tag", *tag)
        })
        .collect())
}

fn twitter_card(page: &Page, _: &Config) -> CheckResult {
    if meta_content(page, "twitter:card").is_some_and(|c| !c.is_empty()) {
        return Ok(Vec::new());
    }
    Ok(vec![Finding::notice(
        "Missing Twitter card",
        "No <meta name=\"twitter:card\">",
    )])
}

fn canonical(page: &Page, _: &Config) -> CheckResult {
    let link = page.first("link[rel~=canonical]");
    let Some(link) = link else {
        return Ok(vec![Finding::warning(
            "Missing canonical link",
            "No <link rel=\"canonical\">; duplicate URLs may split ranking",
        )]);
    };

    let href = page::attr(&link, "href").unwrap_or("");
    match page.resolve_url(href) {
        Some(_) if !href.is_empty() => Ok(Vec::new()),
        _ => Ok(vec![Finding::warning(
            "Invalid canonical link",
            &format!("Canonical href \"{}\" is not a usable URL", href),
        )
        .with_target(&link)]),
    }
}

fn viewport(page: &Page, _: &Config) -> CheckResult {
    if page.first("meta[name=viewport]").is_some() {
        return Ok(Vec::new());
    }
    Ok(vec![Finding::error(
        "Missing viewport meta tag",
        "No <meta name=\"viewport\">; the page will not scale on mobile",
    )])
}

fn charset(page: &Page, _: &Config) -> CheckResult {
    let declared = page.first("meta[charset]").is_some()
        || page.select("meta[http-equiv]").iter().any(|m| {
            page::attr(m, "http-equiv").is_some_and(|h| h.eq_ignore_ascii_case("content-type"))
                && page::attr(m, "content").is_some_and(|c| c.to_lowercase().contains("charset="))
        });

    if declared {
        return Ok(Vec::new());
    }
    Ok(vec![Finding::warning(
        "Missing charset declaration",
        "No <meta charset>; declare UTF-8 in the first bytes of <head>",
    )])
}

fn structured_data(page: &Page, _: &Config) -> CheckResult {
    let has_json_ld = page.select("script[type]").iter().any(|s| {
        page::attr(s, "type").is_some_and(|t| t.eq_ignore_ascii_case("application/ld+json"))
    });
    if has_json_ld || page.first("[itemscope]").is_some() {
        return Ok(Vec::new());
    }
    Ok(vec![Finding::notice(
        "Missing structured data",
        "No JSON-LD or microdata found",
    )])
}

fn h1(page: &Page, _: &Config) -> CheckResult {
    let headings = page.select("h1");
    match headings.len() {
        0 => Ok(vec![Finding::error("Missing h1", "Page has no <h1> heading")]),
        1 => Ok(Vec::new()),
        n => {
            let texts: Vec<String> = headings.iter().take(3).map(page::text_content).collect();
            Ok(vec![Finding::warning(
                "Multiple h1 headings",
                &format!("Page has {} <h1> headings; use exactly one", n),
            )
            .with_target(&headings[1])
            .with_meta("count", n)
            .with_meta("headings", texts)])
        }
    }
}

fn favicon(page: &Page, _: &Config) -> CheckResult {
    if page.first("link[rel~=icon], link[rel~=apple-touch-icon]").is_some() {
        return Ok(Vec::new());
    }
    Ok(vec![Finding::notice(
        "Missing favicon",
        "No <link rel=\"icon\">",
    )])
}

fn placeholder_text(page: &Page, _: &Config) -> CheckResult {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(?i)\blorem\s+ipsum\b").expect("valid regex"));

    let Some(body) = page.first("body") else {
        return Ok(Vec::new());
    };

    let mut findings = Vec::new();
    for el in body.descendants().filter_map(scraper::ElementRef::wrap) {
        if matches!(page::tag(&el), "script" | "style" | "template") {
            continue;
        }
        // Only the element's own text nodes, so each occurrence is reported once
        let own: String = el
            .children()
            .filter_map(|c| c.value().as_text().map(|t| &**t))
            .collect();
        if !re.is_match(&own) {
            continue;
        }
        findings.push(
            Finding::warning(
                "Placeholder text",
                "Element contains lorem ipsum filler text",
            )
            .with_target(&el),
        );
    }

    Ok(findings)
}

fn localhost_refs(page: &Page, _: &Config) -> CheckResult {
    // A page served from a development host legitimately links to it
    if page.url().host_str().is_some_and(is_development_host) {
        return Ok(Vec::new());
    }

    let mut findings = Vec::new();
    for el in page.elements() {
        for name in URL_ATTRIBUTES {
            let Some(value) = page::attr(&el, name) else {
                continue;
            };
            let hit = value
                .split([',', ' '])
                .filter(|part| part.contains("://"))
                .filter_map(|part| reqwest::Url::parse(part).ok())
                .find(|url| url.host_str().is_some_and(is_development_host));

            if let Some(url) = hit {
                findings.push(
                    Finding::warning(
                        "Localhost reference",
                        &format!("{}=\"{}\" points at a development host", name, url),
                    )
                    .with_target(&el)
                    .with_meta("attribute", *name)
                    .with_meta("url", url.as_str()),
                );
            }
        }
    }

    Ok(findings)
}
