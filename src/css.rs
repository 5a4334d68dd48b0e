//! Minimal stylesheet scanning
//!
//! Enough CSS understanding for the checks: `@font-face` blocks, rules that
//! suppress or restore the focus outline, inline declarations and colors.
//! This is pattern matching over source text, not a CSS parser.

use crate::page::{self, Page};
use regex::Regex;
use scraper::{ElementRef, Selector};
use std::sync::OnceLock;

/// A block of CSS and where it came from
#[derive(Debug, Clone)]
pub struct StyleSource {
    /// Stylesheet URL, or `None` for a `<style>` element
    pub href: Option<String>,
    pub text: String,
}

/// Collect readable stylesheets: `<style>` blocks and same-origin linked
/// sheets found under the site root. Other sheets are skipped.
pub fn style_sources(page: &Page) -> Vec<StyleSource> {
    let mut sources = Vec::new();

    for el in page.select("style, link[rel~=stylesheet][href]") {
        if page::tag(&el) == "style" {
            sources.push(StyleSource {
                href: None,
                text: el.text().collect(),
            });
            continue;
        }

        let Some(href) = page::attr(&el, "href") else {
            continue;
        };
        let Some(url) = page.resolve_url(href) else {
            continue;
        };

        if !page.is_same_origin(&url) {
            log::debug!("skipping cross-origin stylesheet {}", url);
            continue;
        }

        match page.read_local(&url) {
            Some(text) => sources.push(StyleSource {
                href: Some(url.to_string()),
                text,
            }),
            None => log::debug!("stylesheet {} not readable from site root", url),
        }
    }

    sources
}

/// Strip `/* ... */` comments
pub fn strip_comments(css: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(?s)/\*.*?\*/").expect("valid regex"));
    re.replace_all(css, "").into_owned()
}

/// Parse `name: value; ...` into lowercase names and trimmed values
pub fn declarations(block: &str) -> Vec<(String, String)> {
    block
        .split(';')
        .filter_map(|decl| {
            let (name, value) = decl.split_once(':')?;
            let name = name.trim().to_lowercase();
            let value = value.trim().trim_end_matches("!important").trim().to_string();
            if name.is_empty() {
                None
            } else {
                Some((name, value))
            }
        })
        .collect()
}

/// Value of a declaration in an inline style attribute
pub fn inline_value(el: &ElementRef<'_>, property: &str) -> Option<String> {
    let style = page::attr(el, "style")?;
    declarations(style)
        .into_iter()
        .rev()
        .find(|(name, _)| name == property)
        .map(|(_, value)| value)
}

/// A single `selector { declarations }` rule
#[derive(Debug, Clone)]
pub struct Rule {
    pub selector: String,
    pub declarations: Vec<(String, String)>,
}

/// Innermost rules of a stylesheet, including those nested in `@media`.
/// At-rule blocks such as `@font-face` are excluded.
pub fn rules(css: &str) -> Vec<Rule> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"([^{}]+)\{([^{}]*)\}").expect("valid regex"));

    let css = strip_comments(css);
    re.captures_iter(&css)
        .filter_map(|caps| {
            let selector = caps[1].trim();
            if selector.is_empty() || selector.starts_with('@') {
                return None;
            }
            Some(Rule {
                selector: selector.to_string(),
                declarations: declarations(&caps[2]),
            })
        })
        .collect()
}

/// A parsed `@font-face` block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontFace {
    pub family: Option<String>,
    pub display: Option<String>,
}

/// All `@font-face` blocks in a stylesheet
pub fn font_faces(css: &str) -> Vec<FontFace> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(?i)@font-face\s*\{([^}]*)\}").expect("valid regex"));

    let css = strip_comments(css);
    re.captures_iter(&css)
        .map(|caps| {
            let decls = declarations(&caps[1]);
            let get = |prop: &str| {
                decls
                    .iter()
                    .find(|(name, _)| name == prop)
                    .map(|(_, v)| v.trim_matches(|c| c == '"' || c == '\'').to_string())
            };
            FontFace {
                family: get("font-family"),
                display: get("font-display"),
            }
        })
        .collect()
}

fn suppresses_outline(decls: &[(String, String)]) -> bool {
    decls.iter().any(|(name, value)| {
        let value = value.to_lowercase();
        (name == "outline" && (value.starts_with("none") || value == "0" || value == "0px"))
            || (name == "outline-style" && value == "none")
            || (name == "outline-width" && (value == "0" || value == "0px"))
    })
}

fn draws_indicator(decls: &[(String, String)]) -> bool {
    decls.iter().any(|(name, value)| {
        let value = value.to_lowercase();
        match name.as_str() {
            "outline" => !(value.starts_with("none") || value == "0" || value == "0px"),
            "outline-style" => value != "none",
            "box-shadow" => value != "none",
            "border" | "border-color" | "border-bottom" | "text-decoration" | "background"
            | "background-color" => true,
            _ => false,
        }
    })
}

/// Rules that remove the default focus ring and rules that draw one back
#[derive(Default)]
pub struct FocusStyles {
    suppress: Vec<Selector>,
    restore: Vec<Selector>,
}

impl FocusStyles {
    /// Gather focus-related rules from every readable stylesheet
    pub fn collect(sources: &[StyleSource]) -> Self {
        let mut styles = Self::default();

        for source in sources {
            for rule in rules(&source.text) {
                let suppress = suppresses_outline(&rule.declarations);
                let restore = draws_indicator(&rule.declarations);
                if !suppress && !restore {
                    continue;
                }

                for part in rule.selector.split(',') {
                    let part = part.trim();
                    if part.contains(":focus-within") {
                        continue;
                    }
                    let on_focus = part.contains(":focus");
                    let base = part.replace(":focus-visible", "").replace(":focus", "");
                    let base = base.trim();
                    let base = if base.is_empty() { "*" } else { base };

                    let Ok(selector) = Selector::parse(base) else {
                        continue;
                    };

                    if on_focus && restore {
                        styles.restore.push(selector);
                    } else if suppress {
                        styles.suppress.push(selector);
                    }
                }
            }
        }

        styles
    }

    /// Whether focusing this element leaves no visible indicator
    pub fn lacks_indicator(&self, el: &ElementRef<'_>) -> bool {
        let inline_suppressed = inline_value(el, "outline")
            .map(|v| {
                let v = v.to_lowercase();
                v.starts_with("none") || v == "0" || v == "0px"
            })
            .unwrap_or(false);

        let suppressed = inline_suppressed || self.suppress.iter().any(|s| s.matches(el));
        suppressed && !self.restore.iter().any(|s| s.matches(el))
    }
}

/// An sRGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// WCAG relative luminance
    pub fn luminance(&self) -> f64 {
        fn channel(c: u8) -> f64 {
            let c = c as f64 / 255.0;
            if c <= 0.03928 {
                c / 12.92
            } else {
                ((c + 0.055) / 1.055).powf(2.4)
            }
        }
        0.2126 * channel(self.0) + 0.7152 * channel(self.1) + 0.0722 * channel(self.2)
    }
}

/// WCAG contrast ratio between two colors (1.0 to 21.0)
pub fn contrast_ratio(a: Rgb, b: Rgb) -> f64 {
    let (la, lb) = (a.luminance(), b.luminance());
    let (light, dark) = if la > lb { (la, lb) } else { (lb, la) };
    (light + 0.05) / (dark + 0.05)
}

/// Parse hex, `rgb()`/`rgba()` and a handful of named colors
pub fn parse_color(value: &str) -> Option<Rgb> {
    let value = value.trim().to_lowercase();

    if let Some(hex) = value.strip_prefix('#') {
        if !hex.is_ascii() {
            return None;
        }
        let expand = |s: &str| u8::from_str_radix(s, 16).ok();
        return match hex.len() {
            3 | 4 => {
                let d: Vec<u8> = hex
                    .chars()
                    .take(3)
                    .map(|c| expand(&format!("{}{}", c, c)))
                    .collect::<Option<_>>()?;
                Some(Rgb(d[0], d[1], d[2]))
            }
            6 | 8 => Some(Rgb(
                expand(&hex[0..2])?,
                expand(&hex[2..4])?,
                expand(&hex[4..6])?,
            )),
            _ => None,
        };
    }

    if let Some(args) = value
        .strip_prefix("rgba(")
        .or_else(|| value.strip_prefix("rgb("))
        .and_then(|rest| rest.strip_suffix(')'))
    {
        let parts: Vec<u8> = args
            .split(|c: char| c == ',' || c == '/' || c.is_whitespace())
            .filter(|p| !p.is_empty())
            .take(3)
            .map(|p| p.parse::<f64>().ok().map(|n| n.clamp(0.0, 255.0) as u8))
            .collect::<Option<_>>()?;
        return (parts.len() == 3).then(|| Rgb(parts[0], parts[1], parts[2]));
    }

    match value.as_str() {
        "black" => Some(Rgb(0, 0, 0)),
        "white" => Some(Rgb(255, 255, 255)),
        "red" => Some(Rgb(255, 0, 0)),
        "green" => Some(Rgb(0, 128, 0)),
        "blue" => Some(Rgb(0, 0, 255)),
        "yellow" => Some(Rgb(255, 255, 0)),
        "orange" => Some(Rgb(255, 165, 0)),
        "gray" | "grey" => Some(Rgb(128, 128, 128)),
        "silver" => Some(Rgb(192, 192, 192)),
        "navy" => Some(Rgb(0, 0, 128)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::PageContext;

    #[test]
    fn test_font_faces() {
        let css = r#"
            /* @font-face { font-family: Ghost; } */
            @font-face { font-family: "Inter"; src: url(inter.woff2); font-display: swap; }
            @font-face { font-family: 'Mono'; src: url(mono.woff2); }
        "#;
        let faces = font_faces(css);
        assert_eq!(faces.len(), 2);
        assert_eq!(faces[0].family.as_deref(), Some("Inter"));
        assert_eq!(faces[0].display.as_deref(), Some("swap"));
        assert_eq!(faces[1].display, None);
    }

    #[test]
    fn test_rules_skip_at_blocks() {
        let css = "@font-face { font-family: X; } a:focus { outline: none } @media (min-width: 1px) { .b { color: red } }";
        let rules = rules(css);
        let selectors: Vec<&str> = rules.iter().map(|r| r.selector.as_str()).collect();
        assert_eq!(selectors, vec!["a:focus", ".b"]);
    }

    #[test]
    fn test_focus_styles() {
        let html = r#"<html><head><style>
            a:focus { outline: none; }
            .nav a:focus-visible { box-shadow: 0 0 0 2px blue; }
            button { outline: 0 }
        </style></head><body>
            <a id="plain" href="/">x</a>
            <nav class="nav"><a id="nav" href="/">y</a></nav>
            <button id="btn">z</button>
            <input id="inp" style="outline: none">
            <select id="sel"></select>
        </body></html>"#;
        let page = Page::parse(html, PageContext::default());
        let styles = FocusStyles::collect(&style_sources(&page));
        let el = |id: &str| page.by_id(id).unwrap();

        assert!(styles.lacks_indicator(&el("plain")));
        assert!(!styles.lacks_indicator(&el("nav")));
        assert!(styles.lacks_indicator(&el("btn")));
        assert!(styles.lacks_indicator(&el("inp")));
        assert!(!styles.lacks_indicator(&el("sel")));
    }

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("#fff"), Some(Rgb(255, 255, 255)));
        assert_eq!(parse_color("#1a2B3c"), Some(Rgb(0x1a, 0x2b, 0x3c)));
        assert_eq!(parse_color("rgb(10, 20, 30)"), Some(Rgb(10, 20, 30)));
        assert_eq!(parse_color("rgba(10 20 30 / 0.5)"), Some(Rgb(10, 20, 30)));
        assert_eq!(parse_color("Black"), Some(Rgb(0, 0, 0)));
        assert_eq!(parse_color("var(--x)"), None);
        assert_eq!(parse_color("#12"), None);
    }

    #[test]
    fn test_contrast_ratio() {
        let ratio = contrast_ratio(Rgb(0, 0, 0), Rgb(255, 255, 255));
        assert!((ratio - 21.0).abs() < 0.01);
        let same = contrast_ratio(Rgb(120, 120, 120), Rgb(120, 120, 120));
        assert!((same - 1.0).abs() < 1e-9);
        // #777 on white is just under 4.5
        let grey = contrast_ratio(parse_color("#777").unwrap(), Rgb(255, 255, 255));
        assert!(grey < 4.5 && grey > 4.4);
    }

    #[test]
    fn test_inline_value() {
        let page = Page::parse(
            r#"<body><p id="p" style="color: #333; COLOR: red !important">x</p></body>"#,
            PageContext::default(),
        );
        let p = page.by_id("p").unwrap();
        assert_eq!(inline_value(&p, "color").as_deref(), Some("red"));
        assert_eq!(inline_value(&p, "background"), None);
    }
}
