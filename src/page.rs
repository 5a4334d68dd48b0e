//! Parsed page snapshot and element helpers
//!
//! A [`Page`] is the document tree every check reads. It pairs the parsed
//! HTML with a [`PageContext`]: the URL the page is served from (which fixes
//! its origin) and, optionally, the directory the site is served out of so
//! that same-origin assets can be inspected on disk.

use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error loading a page
#[derive(Debug, Error)]
pub enum PageError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid page URL: {0}")]
    Url(String),
}

/// Where the page lives
#[derive(Debug, Clone)]
pub struct PageContext {
    /// URL the page is served from
    pub url: Url,
    /// Directory the site root URL maps to
    pub site_root: Option<PathBuf>,
}

impl Default for PageContext {
    fn default() -> Self {
        Self {
            url: Url::parse("http://localhost/").expect("static URL is valid"),
            site_root: None,
        }
    }
}

impl PageContext {
    /// Context for a page URL
    pub fn new(url: &str) -> Result<Self, PageError> {
        let url = Url::parse(url).map_err(|e| PageError::Url(format!("{}: {}", url, e)))?;
        Ok(Self {
            url,
            site_root: None,
        })
    }

    pub fn with_site_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.site_root = Some(root.into());
        self
    }

    /// Root URL of the page's origin
    pub fn root_url(&self) -> Url {
        let mut root = self.url.clone();
        root.set_path("/");
        root.set_query(None);
        root.set_fragment(None);
        root
    }
}

/// A parsed page
pub struct Page {
    html: Html,
    context: PageContext,
}

impl Page {
    /// Parse HTML source. Parsing is lenient and never fails.
    pub fn parse(source: &str, context: PageContext) -> Self {
        Self {
            html: Html::parse_document(source),
            context,
        }
    }

    /// Read and parse an HTML file
    pub fn load(path: &Path, context: PageContext) -> Result<Self, PageError> {
        let source = std::fs::read_to_string(path).map_err(|source| PageError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&source, context))
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    pub fn context(&self) -> &PageContext {
        &self.context
    }

    pub fn url(&self) -> &Url {
        &self.context.url
    }

    /// All elements in document order, starting with `<html>`
    pub fn elements(&self) -> impl Iterator<Item = ElementRef<'_>> {
        self.html
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
    }

    /// Elements matching a selector. An invalid selector matches nothing.
    pub fn select(&self, css: &str) -> Vec<ElementRef<'_>> {
        match Selector::parse(css) {
            Ok(selector) => self.html.select(&selector).collect(),
            Err(e) => {
                log::warn!("invalid selector {:?}: {}", css, e);
                Vec::new()
            }
        }
    }

    pub fn first(&self, css: &str) -> Option<ElementRef<'_>> {
        self.select(css).into_iter().next()
    }

    /// Element with the given `id`
    pub fn by_id(&self, id: &str) -> Option<ElementRef<'_>> {
        self.elements().find(|el| el.value().id() == Some(id))
    }

    /// Every element with its nesting depth (`<html>` is depth 1), in
    /// document order. Walks with an explicit stack so nesting depth is
    /// bounded by memory, not by the thread's stack.
    pub fn depths(&self) -> Vec<(ElementRef<'_>, usize)> {
        let mut out = Vec::new();
        let mut stack = vec![(self.html.root_element(), 1)];

        while let Some((el, depth)) = stack.pop() {
            out.push((el, depth));
            let children: Vec<ElementRef<'_>> =
                el.children().filter_map(ElementRef::wrap).collect();
            stack.extend(children.into_iter().rev().map(|child| (child, depth + 1)));
        }
        out
    }

    /// Total element count and maximum nesting depth
    pub fn dom_stats(&self) -> (usize, usize) {
        let depths = self.depths();
        let max = depths.iter().map(|(_, depth)| *depth).max().unwrap_or(0);
        (depths.len(), max)
    }

    /// Resolve a (possibly relative) reference against the page URL
    pub fn resolve_url(&self, reference: &str) -> Option<Url> {
        self.context.url.join(reference.trim()).ok()
    }

    pub fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.context.url.origin()
    }

    /// On-disk path for a same-origin URL, when a site root is configured
    pub fn local_path(&self, url: &Url) -> Option<PathBuf> {
        let root = self.context.site_root.as_ref()?;
        if !self.is_same_origin(url) {
            return None;
        }

        let mut relative = url.path().trim_start_matches('/').to_string();
        if relative.is_empty() || relative.ends_with('/') {
            relative.push_str("index.html");
        }
        let relative = relative.replace("%20", " ");
        if relative.split('/').any(|part| part == "..") {
            return None;
        }

        Some(root.join(relative))
    }

    /// Size in bytes of a same-origin asset on disk
    pub fn local_size(&self, url: &Url) -> Option<u64> {
        let path = self.local_path(url)?;
        std::fs::metadata(path).ok().map(|m| m.len())
    }

    /// Contents of a same-origin text asset on disk
    pub fn read_local(&self, url: &Url) -> Option<String> {
        let path = self.local_path(url)?;
        std::fs::read_to_string(path).ok()
    }

    /// Subresources the page loads (scripts, stylesheets, images, frames,
    /// media, icons, preloads), resolved against the page URL
    pub fn resources(&self) -> Vec<(ElementRef<'_>, Url)> {
        let mut resources = Vec::new();
        for el in self.select(
            "script[src], link[href], img[src], iframe[src], source[src], video[src], audio[src], embed[src]",
        ) {
            let reference = if tag(&el) == "link" {
                let rel = attr(&el, "rel").unwrap_or("").to_lowercase();
                let loads = rel.split_whitespace().any(|r| {
                    matches!(
                        r,
                        "stylesheet" | "icon" | "preload" | "modulepreload" | "apple-touch-icon"
                    )
                });
                if !loads {
                    continue;
                }
                attr(&el, "href")
            } else {
                attr(&el, "src")
            };

            let Some(url) = reference.filter(|r| !r.is_empty()).and_then(|r| self.resolve_url(r))
            else {
                continue;
            };
            if matches!(url.scheme(), "http" | "https") {
                resources.push((el, url));
            }
        }
        resources
    }

    /// Cross-origin subresources
    pub fn third_party_resources(&self) -> Vec<(ElementRef<'_>, Url)> {
        self.resources()
            .into_iter()
            .filter(|(_, url)| !self.is_same_origin(url))
            .collect()
    }
}

/// Attribute value, trimmed
pub fn attr<'a>(el: &ElementRef<'a>, name: &str) -> Option<&'a str> {
    el.value().attr(name).map(str::trim)
}

pub fn has_attr(el: &ElementRef<'_>, name: &str) -> bool {
    el.value().attr(name).is_some()
}

pub fn tag<'a>(el: &ElementRef<'a>) -> &'a str {
    el.value().name()
}

/// Text content with whitespace collapsed
pub fn text_content(el: &ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Heading level for `h1`..`h6`
pub fn heading_level(el: &ElementRef<'_>) -> Option<u8> {
    match tag(el) {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

/// Explicit role, or `None`
pub fn role<'a>(el: &ElementRef<'a>) -> Option<&'a str> {
    attr(el, "role").filter(|r| !r.is_empty())
}

/// Marked as decorative via role or aria-hidden
pub fn is_decorative(el: &ElementRef<'_>) -> bool {
    matches!(role(el), Some("presentation") | Some("none"))
        || attr(el, "aria-hidden") == Some("true")
}

fn inline_hides(el: &ElementRef<'_>) -> bool {
    let Some(style) = attr(el, "style") else {
        return false;
    };
    let style: String = style.to_lowercase().split_whitespace().collect();
    style.contains("display:none") || style.contains("visibility:hidden")
}

/// Hidden from users through attributes or inline style, on itself or an ancestor
pub fn is_hidden(el: &ElementRef<'_>) -> bool {
    let mut current = Some(*el);
    while let Some(node) = current {
        if has_attr(&node, "hidden")
            || attr(&node, "aria-hidden") == Some("true")
            || inline_hides(&node)
        {
            return true;
        }
        current = node.parent().and_then(ElementRef::wrap);
    }
    false
}

/// Parsed `tabindex`, if present and numeric
pub fn tab_index(el: &ElementRef<'_>) -> Option<i32> {
    attr(el, "tabindex").and_then(|v| v.parse().ok())
}

/// Reachable with the Tab key
pub fn is_focusable(el: &ElementRef<'_>) -> bool {
    if has_attr(el, "disabled") {
        return false;
    }
    if let Some(index) = tab_index(el) {
        return index >= 0;
    }

    match tag(el) {
        "a" | "area" => has_attr(el, "href"),
        "input" => attr(el, "type").map(|t| !t.eq_ignore_ascii_case("hidden")).unwrap_or(true),
        "button" | "select" | "textarea" | "iframe" | "summary" => true,
        _ => matches!(attr(el, "contenteditable"), Some("") | Some("true")),
    }
}

/// Accessible name from ARIA, associated labels, or `title`
pub fn accessible_name(page: &Page, el: &ElementRef<'_>) -> Option<String> {
    if let Some(label) = attr(el, "aria-label").filter(|l| !l.is_empty()) {
        return Some(label.to_string());
    }

    if let Some(ids) = attr(el, "aria-labelledby") {
        let text: Vec<String> = ids
            .split_whitespace()
            .filter_map(|id| page.by_id(id))
            .map(|label| text_content(&label))
            .filter(|t| !t.is_empty())
            .collect();
        if !text.is_empty() {
            return Some(text.join(" "));
        }
    }

    if let Some(id) = el.value().id().filter(|id| !id.is_empty()) {
        let label = page
            .select("label[for]")
            .into_iter()
            .find(|label| attr(label, "for") == Some(id))
            .map(|label| text_content(&label))
            .filter(|t| !t.is_empty());
        if label.is_some() {
            return label;
        }
    }

    let mut ancestor = el.parent().and_then(ElementRef::wrap);
    while let Some(node) = ancestor {
        if tag(&node) == "label" {
            let text = text_content(&node);
            if !text.is_empty() {
                return Some(text);
            }
        }
        ancestor = node.parent().and_then(ElementRef::wrap);
    }

    attr(el, "title")
        .filter(|t| !t.is_empty())
        .map(String::from)
}

/// Lowercased extension of a URL path, if any
pub fn url_extension(url: &Url) -> Option<String> {
    let last = url.path().rsplit('/').next()?;
    let (_, ext) = last.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn page(html: &str) -> Page {
        Page::parse(html, PageContext::default())
    }

    #[test]
    fn test_dom_stats() {
        let p = page("<html><head></head><body><div><p><span>x</span></p></div></body></html>");
        let (count, depth) = p.dom_stats();
        // html, head, body, div, p, span
        assert_eq!(count, 6);
        assert_eq!(depth, 5);
    }

    #[test]
    fn test_same_origin() {
        let p = Page::parse("", PageContext::new("http://localhost:8080/about/").unwrap());
        let local = p.resolve_url("../css/site.css").unwrap();
        assert!(p.is_same_origin(&local));
        assert_eq!(local.path(), "/css/site.css");

        let other = p.resolve_url("https://cdn.example.com/x.js").unwrap();
        assert!(!p.is_same_origin(&other));

        let other_port = p.resolve_url("http://localhost:9090/").unwrap();
        assert!(!p.is_same_origin(&other_port));
    }

    #[test]
    fn test_local_path_and_size() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("js")).unwrap();
        fs::write(dir.path().join("js/app.js"), "let a = 1;").unwrap();
        fs::write(dir.path().join("index.html"), "<html></html>").unwrap();

        let ctx = PageContext::default().with_site_root(dir.path());
        let p = Page::parse("", ctx);

        let js = p.resolve_url("/js/app.js?v=2").unwrap();
        assert_eq!(p.local_size(&js), Some(10));
        assert_eq!(p.read_local(&js).as_deref(), Some("let a = 1;"));

        let root = p.resolve_url("/").unwrap();
        assert_eq!(p.local_path(&root), Some(dir.path().join("index.html")));

        let escape = p.resolve_url("/a/%2e%2e/secret").unwrap();
        assert!(p.local_path(&escape).map(|path| path.starts_with(dir.path())).unwrap_or(true));
    }

    #[test]
    fn test_accessible_name_sources() {
        let p = page(
            r#"<body>
                <span id="lbl">Email address</span>
                <input id="a" aria-label="Search">
                <input id="b" aria-labelledby="lbl">
                <label for="c">Name</label><input id="c">
                <label>Phone <input id="d"></label>
                <input id="e" title="Zip">
                <input id="f">
            </body>"#,
        );

        let name = |id: &str| accessible_name(&p, &p.by_id(id).unwrap());
        assert_eq!(name("a").as_deref(), Some("Search"));
        assert_eq!(name("b").as_deref(), Some("Email address"));
        assert_eq!(name("c").as_deref(), Some("Name"));
        assert_eq!(name("d").as_deref(), Some("Phone"));
        assert_eq!(name("e").as_deref(), Some("Zip"));
        assert_eq!(name("f"), None);
    }

    #[test]
    fn test_hidden_and_focusable() {
        let p = page(
            r#"<body>
                <div style="display: none"><button id="b1">x</button></div>
                <button id="b2">y</button>
                <div id="d1" tabindex="0"></div>
                <a id="a1">no href</a>
                <a id="a2" href="/">home</a>
                <button id="b3" disabled>z</button>
                <span id="s1" tabindex="-1"></span>
            </body>"#,
        );
        let el = |id: &str| p.by_id(id).unwrap();

        assert!(is_hidden(&el("b1")));
        assert!(!is_hidden(&el("b2")));
        assert!(is_focusable(&el("d1")));
        assert!(!is_focusable(&el("a1")));
        assert!(is_focusable(&el("a2")));
        assert!(!is_focusable(&el("b3")));
        assert!(!is_focusable(&el("s1")));
    }

    #[test]
    fn test_url_extension() {
        let url = Url::parse("http://localhost/img/Hero.JPG?x=1").unwrap();
        assert_eq!(url_extension(&url).as_deref(), Some("jpg"));
        let url = Url::parse("http://localhost/about/").unwrap();
        assert_eq!(url_extension(&url), None);
    }

    #[test]
    fn test_depths_in_document_order() {
        let p = page("<body><div><p>a</p></div><span>b</span></body>");
        let tags: Vec<(&str, usize)> = p.depths().iter().map(|(el, d)| (tag(el), *d)).collect();
        assert_eq!(
            tags,
            vec![("html", 1), ("head", 2), ("body", 2), ("div", 3), ("p", 4), ("span", 3)]
        );
        assert_eq!(p.dom_stats(), (6, 4));
    }

    #[test]
    fn test_dom_stats_on_deeply_nested_page() {
        let levels = 30_000;
        let html = format!(
            "<body>{}x{}</body>",
            "<span>".repeat(levels),
            "</span>".repeat(levels)
        );
        let p = page(&html);
        let (count, depth) = p.dom_stats();
        assert_eq!(count, levels + 3);
        assert_eq!(depth, levels + 2);
    }

    #[test]
    fn test_invalid_selector_matches_nothing() {
        let p = page("<body><p>x</p></body>");
        assert!(p.select("p[").is_empty());
    }
}
