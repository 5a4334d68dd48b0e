//! Performance checks
//!
//! Image loading, render-blocking resources, DOM weight, same-origin asset
//! hygiene, web fonts and third-party resources. Asset sizes and stylesheet
//! contents are only available when the page has a site root.

use crate::config::Config;
use crate::css;
use crate::finding::{Category, Finding};
use crate::page::{self, Page};
use crate::rule::{Catalog, CheckError};
use scraper::ElementRef;
use std::collections::BTreeSet;

type CheckResult = Result<Vec<Finding>, CheckError>;

/// Raster formats with a modern replacement
const LEGACY_FORMATS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp"];

/// `font-display` values that avoid invisible text
const FONT_DISPLAY_HINTS: &[&str] = &["swap", "fallback", "optional"];

/// The performance catalog
pub fn catalog() -> Catalog {
    Catalog::new(
        "performance",
        "Performance Audit",
        vec![Category::Issue, Category::Warning, Category::Notice],
    )
    .check(
        "perf-image-dimensions",
        "Raster images need explicit width and height",
        image_dimensions,
    )
    .check(
        "perf-lazy-above-fold",
        "Images in the initial viewport should not be lazy-loaded",
        lazy_above_fold,
    )
    .check(
        "perf-next-gen-format",
        "Prefer WebP or AVIF images",
        next_gen_format,
    )
    .check(
        "perf-render-blocking-css",
        "Stylesheets without a media condition block rendering",
        render_blocking_css,
    )
    .check(
        "perf-render-blocking-script",
        "External scripts should be deferred or async",
        render_blocking_script,
    )
    .check("perf-dom-size", "DOM element count within limit", dom_size)
    .check("perf-dom-depth", "DOM nesting depth within limit", dom_depth)
    .check(
        "perf-unminified-asset",
        "Same-origin scripts and stylesheets should be minified",
        unminified_assets,
    )
    .check(
        "perf-asset-size",
        "Same-origin scripts and stylesheets within size limits",
        asset_size,
    )
    .check(
        "perf-font-display",
        "Web fonts need a font-display hint",
        font_display,
    )
    .check(
        "perf-third-party",
        "Cross-origin resources on the page",
        third_party,
    )
    .check(
        "perf-cache-busting",
        "Cacheable assets should not carry query parameters",
        cache_busting,
    )
}

fn is_svg(page: &Page, img: &ElementRef<'_>) -> bool {
    page::attr(img, "src")
        .and_then(|src| page.resolve_url(src))
        .and_then(|url| page::url_extension(&url))
        .is_some_and(|ext| ext == "svg")
}

fn has_dimension(img: &ElementRef<'_>, name: &str) -> bool {
    page::attr(img, name).is_some_and(|v| !v.is_empty()) || css::inline_value(img, name).is_some()
}

fn image_dimensions(page: &Page, _: &Config) -> CheckResult {
    Ok(page
        .select("img[src]")
        .into_iter()
        .filter(|img| !is_svg(page, img))
        .filter(|img| !(has_dimension(img, "width") && has_dimension(img, "height")))
        .map(|img| {
            let src = page::attr(&img, "src").unwrap_or("");
            Finding::warning(
                "Missing image dimensions",
                &format!(
                    "Image '{}' has no explicit width and height; layout will shift when it loads",
                    src
                ),
            )
            .with_target(&img)
            .with_meta("src", src)
        })
        .collect())
}

/// Whether an image is taken to render in the initial viewport: one of the
/// first `above_fold_images` images, or any image inside `<header>`
fn is_above_fold(img: &ElementRef<'_>, index: usize, config: &Config) -> bool {
    if index < config.thresholds.above_fold_images {
        return true;
    }
    let mut ancestor = img.parent().and_then(ElementRef::wrap);
    while let Some(node) = ancestor {
        if page::tag(&node) == "header" {
            return true;
        }
        ancestor = node.parent().and_then(ElementRef::wrap);
    }
    false
}

fn lazy_above_fold(page: &Page, config: &Config) -> CheckResult {
    Ok(page
        .select("img")
        .into_iter()
        .enumerate()
        .filter(|(index, img)| {
            page::attr(img, "loading").is_some_and(|l| l.eq_ignore_ascii_case("lazy"))
                && is_above_fold(img, *index, config)
        })
        .map(|(index, img)| {
            Finding::warning(
                "Above-fold lazy image",
                &format!(
                    "Image '{}' is likely visible on load but has loading=\"lazy\"",
                    page::attr(&img, "src").unwrap_or("")
                ),
            )
            .with_target(&img)
            .with_meta("position", index + 1)
        })
        .collect())
}

/// Formats offered by `<source>` siblings when the image sits in a `<picture>`
fn picture_formats(img: &ElementRef<'_>) -> BTreeSet<String> {
    let Some(picture) = img
        .parent()
        .and_then(ElementRef::wrap)
        .filter(|p| page::tag(p) == "picture")
    else {
        return BTreeSet::new();
    };

    picture
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|child| page::tag(child) == "source")
        .filter_map(|source| {
            if let Some(kind) = page::attr(&source, "type") {
                return kind.strip_prefix("image/").map(str::to_lowercase);
            }
            let srcset = page::attr(&source, "srcset")?;
            let first = srcset.split([',', ' ']).next()?;
            let (_, ext) = first.rsplit_once('.')?;
            Some(ext.to_lowercase())
        })
        .collect()
}

fn next_gen_format(page: &Page, _: &Config) -> CheckResult {
    let mut findings = Vec::new();

    for img in page.select("img[src]") {
        let Some(url) = page::attr(&img, "src").and_then(|src| page.resolve_url(src)) else {
            continue;
        };
        let Some(ext) = page::url_extension(&url) else {
            continue;
        };
        if !LEGACY_FORMATS.contains(&ext.as_str()) {
            continue;
        }

        let offered = picture_formats(&img);
        if offered.contains("webp") || offered.contains("avif") {
            continue;
        }

        findings.push(
            Finding::notice(
                "Non-next-gen image format",
                &format!("Image '{}' is {}; consider WebP or AVIF", url, ext.to_uppercase()),
            )
            .with_target(&img)
            .with_meta("format", ext),
        );
    }

    Ok(findings)
}

fn render_blocking_css(page: &Page, _: &Config) -> CheckResult {
    Ok(page
        .select("link[rel~=stylesheet][href]")
        .into_iter()
        .filter(|link| {
            page::attr(link, "media").map_or(true, |m| m.is_empty() || m.eq_ignore_ascii_case("all"))
        })
        .map(|link| {
            let href = page::attr(&link, "href").unwrap_or("");
            Finding::new(
                Category::Issue,
                "Render-blocking stylesheet",
                &format!("Stylesheet '{}' has no media condition and blocks first paint", href),
            )
            .with_target(&link)
            .with_meta("href", href)
        })
        .collect())
}

fn render_blocking_script(page: &Page, _: &Config) -> CheckResult {
    Ok(page
        .select("script[src]")
        .into_iter()
        .filter(|script| {
            !page::has_attr(script, "defer")
                && !page::has_attr(script, "async")
                && !page::attr(script, "type").is_some_and(|t| t.eq_ignore_ascii_case("module"))
        })
        .map(|script| {
            let src = page::attr(&script, "src").unwrap_or("");
            Finding::new(
                Category::Issue,
                "Render-blocking script",
                &format!("Script '{}' has neither defer nor async", src),
            )
            .with_target(&script)
            .with_meta("src", src)
        })
        .collect())
}

fn dom_size(page: &Page, config: &Config) -> CheckResult {
    let (count, _) = page.dom_stats();
    let limit = config.thresholds.max_dom_nodes;
    if count <= limit {
        return Ok(Vec::new());
    }

    Ok(vec![Finding::warning(
        "Oversized DOM",
        &format!("Page has {} elements (limit {})", count, limit),
    )
    .with_meta("count", count)
    .with_meta("threshold", limit)])
}

/// Deepest element, first in document order
fn deepest(page: &Page) -> Option<(ElementRef<'_>, usize)> {
    page.depths()
        .into_iter()
        .fold(None, |best, (el, depth)| match best {
            Some((_, d)) if d >= depth => best,
            _ => Some((el, depth)),
        })
}

fn dom_depth(page: &Page, config: &Config) -> CheckResult {
    let limit = config.thresholds.max_dom_depth;
    let Some((el, depth)) = deepest(page).filter(|(_, depth)| *depth > limit) else {
        return Ok(Vec::new());
    };

    Ok(vec![Finding::warning(
        "Deep DOM",
        &format!("DOM is nested {} levels deep (limit {})", depth, limit),
    )
    .with_target(&el)
    .with_meta("depth", depth)
    .with_meta("threshold", limit)])
}

/// Same-origin scripts and stylesheets with their asset type
fn same_origin_assets(page: &Page) -> Vec<(ElementRef<'_>, reqwest::Url, &'static str)> {
    page.select("script[src], link[rel~=stylesheet][href]")
        .into_iter()
        .filter_map(|el| {
            let (reference, kind) = if page::tag(&el) == "script" {
                (page::attr(&el, "src")?, "script")
            } else {
                (page::attr(&el, "href")?, "stylesheet")
            };
            let url = page.resolve_url(reference)?;
            page.is_same_origin(&url).then_some((el, url, kind))
        })
        .collect()
}

fn is_minified(url: &reqwest::Url) -> bool {
    let name = url.path().rsplit('/').next().unwrap_or("").to_lowercase();
    name.contains(".min.") || name.contains("-min.") || name.contains(".bundle.")
}

fn unminified_assets(page: &Page, _: &Config) -> CheckResult {
    Ok(same_origin_assets(page)
        .into_iter()
        .filter(|(_, url, _)| !is_minified(url))
        .map(|(el, url, kind)| {
            Finding::warning(
                "Unminified asset",
                &format!("{} '{}' has no .min marker", capitalize(kind), url.path()),
            )
            .with_target(&el)
            .with_meta("url", url.as_str())
            .with_meta("type", kind)
        })
        .collect())
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn asset_size(page: &Page, config: &Config) -> CheckResult {
    if page.context().site_root.is_none() {
        log::debug!("no site root, skipping asset sizes");
        return Ok(Vec::new());
    }

    let mut findings = Vec::new();
    for (el, url, kind) in same_origin_assets(page) {
        let Some(bytes) = page.local_size(&url) else {
            log::debug!("asset {} not found under site root", url);
            continue;
        };

        let limit_kb = if kind == "script" {
            config.thresholds.max_script_kb
        } else {
            config.thresholds.max_stylesheet_kb
        };
        let size_kb = bytes.div_ceil(1024);
        if bytes > limit_kb * 1024 {
            findings.push(
                Finding::warning(
                    "Oversized asset",
                    &format!(
                        "{} '{}' is {} KiB (limit {} KiB)",
                        capitalize(kind),
                        url.path(),
                        size_kb,
                        limit_kb
                    ),
                )
                .with_target(&el)
                .with_meta("url", url.as_str())
                .with_meta("size_kb", size_kb)
                .with_meta("limit_kb", limit_kb),
            );
        }
    }

    Ok(findings)
}

fn font_display(page: &Page, _: &Config) -> CheckResult {
    let mut findings = Vec::new();

    for source in css::style_sources(page) {
        for face in css::font_faces(&source.text) {
            let hinted = face
                .display
                .as_deref()
                .is_some_and(|d| FONT_DISPLAY_HINTS.contains(&d.to_lowercase().as_str()));
            if hinted {
                continue;
            }

            let family = face.family.clone().unwrap_or_else(|| "(unnamed)".to_string());
            let origin = source.href.clone().unwrap_or_else(|| "<style>".to_string());
            findings.push(
                Finding::warning(
                    "Missing font-display hint",
                    &format!(
                        "@font-face '{}' in {} has no font-display: swap or fallback",
                        family, origin
                    ),
                )
                .with_meta("family", family)
                .with_meta("stylesheet", origin),
            );
        }
    }

    Ok(findings)
}

fn third_party(page: &Page, _: &Config) -> CheckResult {
    let resources = page.third_party_resources();
    if resources.is_empty() {
        return Ok(Vec::new());
    }

    let hosts: BTreeSet<String> = resources
        .iter()
        .filter_map(|(_, url)| url.host_str().map(String::from))
        .collect();
    let items: Vec<String> = resources.iter().map(|(_, url)| url.to_string()).collect();

    Ok(vec![Finding::notice(
        "Third-party resources",
        &format!(
            "{} cross-origin resources from {} hosts: {}",
            items.len(),
            hosts.len(),
            hosts.iter().cloned().collect::<Vec<_>>().join(", ")
        ),
    )
    .with_meta("count", items.len())
    .with_meta("hosts", hosts.into_iter().collect::<Vec<_>>())
    .with_meta("resources", items)])
}

fn cache_busting(page: &Page, config: &Config) -> CheckResult {
    Ok(page
        .resources()
        .into_iter()
        .filter(|(_, url)| page.is_same_origin(url))
        .filter(|(_, url)| url.query().is_some_and(|q| !q.is_empty()))
        .filter(|(_, url)| {
            page::url_extension(url).is_some_and(|ext| config.thresholds.is_cacheable(&ext))
        })
        .map(|(el, url)| {
            Finding::warning(
                "Cache-busting query parameter",
                &format!(
                    "'{}' uses a query string; put the version in the file name instead",
                    url.path()
                ),
            )
            .with_target(&el)
            .with_meta("url", url.as_str())
            .with_meta("query", url.query().unwrap_or(""))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::PageContext;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn run(check: fn(&Page, &Config) -> CheckResult, html: &str) -> Vec<Finding> {
        let page = Page::parse(html, PageContext::default());
        check(&page, &Config::default()).unwrap()
    }

    #[test]
    fn test_image_dimensions() {
        let findings = run(
            image_dimensions,
            r#"<body>
                <img src="a.png" width="10" height="10" alt="">
                <img src="b.png" width="10" alt="">
                <img src="c.png" style="width: 10px; height: 10px" alt="">
                <img src="logo.svg" alt="">
            </body>"#,
        );
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].metadata["src"], serde_json::json!("b.png"));
    }

    #[test]
    fn test_lazy_above_fold() {
        let findings = run(
            lazy_above_fold,
            r#"<body>
                <img src="1.png" loading="lazy">
                <img src="2.png">
                <img src="3.png" loading="lazy">
                <header><img src="4.png" loading="lazy"></header>
            </body>"#,
        );
        let positions: Vec<_> = findings.iter().map(|f| f.metadata["position"].clone()).collect();
        assert_eq!(positions, vec![serde_json::json!(1), serde_json::json!(4)]);
    }

    #[test]
    fn test_next_gen_format() {
        let findings = run(
            next_gen_format,
            r#"<body>
                <img src="a.jpg">
                <img src="b.webp">
                <picture><source type="image/avif" srcset="c.avif"><img src="c.jpg"></picture>
                <picture><source srcset="d.webp 1x"><img src="d.png"></picture>
            </body>"#,
        );
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].metadata["format"], serde_json::json!("jpg"));
    }

    #[test]
    fn test_render_blocking() {
        let html = r#"<html><head>
            <link rel="stylesheet" href="main.css">
            <link rel="stylesheet" href="print.css" media="print">
            <link rel="stylesheet" href="all.css" media="all">
            <script src="app.js"></script>
            <script src="late.js" defer></script>
            <script src="mod.js" type="module"></script>
            <script>inline()</script>
        </head></html>"#;

        let css = run(render_blocking_css, html);
        assert_eq!(css.len(), 2);
        assert!(css.iter().all(|f| f.category == Category::Issue));

        let js = run(render_blocking_script, html);
        assert_eq!(js.len(), 1);
        assert_eq!(js[0].kind, "Render-blocking script");
    }

    #[test]
    fn test_oversized_dom_reports_count_once() {
        let mut config = Config::default();
        config.thresholds.max_dom_nodes = 5;

        let body: String = (0..10).map(|i| format!("<p>{}</p>", i)).collect();
        let page = Page::parse(&format!("<body>{}</body>", body), PageContext::default());
        let findings = dom_size(&page, &config).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, "Oversized DOM");
        assert_eq!(findings[0].metadata["count"], serde_json::json!(13));

        // html, head, body, p, p = 5 is at the limit
        let page = Page::parse("<body><p>a</p><p>b</p></body>", PageContext::default());
        assert!(dom_size(&page, &config).unwrap().is_empty());
    }

    #[test]
    fn test_deep_dom() {
        let mut config = Config::default();
        config.thresholds.max_dom_depth = 4;

        let page = Page::parse(
            "<body><div><div><span>deep</span></div></div></body>",
            PageContext::default(),
        );
        let findings = dom_depth(&page, &config).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].metadata["depth"], serde_json::json!(5));
        assert_eq!(findings[0].target.as_ref().unwrap().tag, "span");
    }

    #[test]
    fn test_unminified_assets_same_origin_only() {
        let findings = run(
            unminified_assets,
            r#"<head>
                <script src="/js/app.js"></script>
                <script src="/js/vendor.min.js"></script>
                <script src="https://cdn.example.com/lib.js"></script>
                <link rel="stylesheet" href="/css/site.css">
            </head>"#,
        );
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[1].metadata["type"], serde_json::json!("stylesheet"));
    }

    #[test]
    fn test_asset_size_uses_site_root() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("js")).unwrap();
        fs::write(dir.path().join("js/big.js"), vec![b'x'; 120 * 1024]).unwrap();
        fs::write(dir.path().join("js/small.js"), "let a = 1;").unwrap();

        let html = r#"<script src="/js/big.js"></script><script src="/js/small.js"></script><script src="/js/missing.js"></script>"#;
        let context = PageContext::default().with_site_root(dir.path());
        let page = Page::parse(html, context);
        let findings = asset_size(&page, &Config::default()).unwrap();

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].metadata["size_kb"], serde_json::json!(120));

        let page = Page::parse(html, PageContext::default());
        assert!(asset_size(&page, &Config::default()).unwrap().is_empty());
    }

    #[test]
    fn test_font_display() {
        let findings = run(
            font_display,
            r#"<head><style>
                @font-face { font-family: "Inter"; src: url(inter.woff2); font-display: swap; }
                @font-face { font-family: "Mono"; src: url(mono.woff2); font-display: block; }
                @font-face { font-family: "Serif"; src: url(serif.woff2); }
            </style></head>"#,
        );
        let families: Vec<_> = findings.iter().map(|f| f.metadata["family"].clone()).collect();
        assert_eq!(
            families,
            vec![serde_json::json!("Mono"), serde_json::json!("Serif")]
        );
    }

    #[test]
    fn test_cross_origin_stylesheet_is_skipped_for_fonts() {
        let findings = run(
            font_display,
            r#"<head><link rel="stylesheet" href="https://fonts.example.com/css"></head>"#,
        );
        assert!(findings.is_empty());
    }

    #[test]
    fn test_third_party_single_notice() {
        let findings = run(
            third_party,
            r#"<head>
                <script src="https://cdn.example.com/a.js"></script>
                <link rel="stylesheet" href="https://fonts.example.org/css">
                <script src="/local.js"></script>
            </head><body><img src="https://cdn.example.com/b.png"></body>"#,
        );
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].category, Category::Notice);
        assert_eq!(findings[0].metadata["count"], serde_json::json!(3));
        assert_eq!(
            findings[0].metadata["hosts"],
            serde_json::json!(["cdn.example.com", "fonts.example.org"])
        );
        assert!(run(third_party, "<script src='/a.js'></script>").is_empty());
    }

    #[test]
    fn test_cache_busting() {
        let findings = run(
            cache_busting,
            r#"<head>
                <link rel="stylesheet" href="/site.css?v=3">
                <script src="/app.js"></script>
                <script src="https://cdn.example.com/lib.js?v=1"></script>
                <link rel="stylesheet" href="/api/theme?dark=1">
            </head>"#,
        );
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].metadata["query"], serde_json::json!("v=3"));
    }
}
