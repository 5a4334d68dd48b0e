//! Accessibility checks
//!
//! Images, form controls, headings, landmarks, ARIA usage, keyboard access
//! and inline color contrast.

use crate::config::Config;
use crate::css::{self, FocusStyles};
use crate::finding::{Category, Finding};
use crate::page::{self, Page};
use crate::rule::{Catalog, CheckError};
use scraper::ElementRef;
use std::collections::BTreeMap;

type CheckResult = Result<Vec<Finding>, CheckError>;

/// Filler phrases that add nothing to alt text
const SUSPICIOUS_ALT: &[&str] = &[
    "image of",
    "picture of",
    "photo of",
    "graphic of",
    "image",
    "picture",
    "photo",
    "img",
    "spacer",
];

/// Recognised `aria-*` attributes (WAI-ARIA 1.2)
const KNOWN_ARIA: &[&str] = &[
    "aria-activedescendant",
    "aria-atomic",
    "aria-autocomplete",
    "aria-braillelabel",
    "aria-brailleroledescription",
    "aria-busy",
    "aria-checked",
    "aria-colcount",
    "aria-colindex",
    "aria-colindextext",
    "aria-colspan",
    "aria-controls",
    "aria-current",
    "aria-describedby",
    "aria-description",
    "aria-details",
    "aria-disabled",
    "aria-dropeffect",
    "aria-errormessage",
    "aria-expanded",
    "aria-flowto",
    "aria-grabbed",
    "aria-haspopup",
    "aria-hidden",
    "aria-invalid",
    "aria-keyshortcuts",
    "aria-label",
    "aria-labelledby",
    "aria-level",
    "aria-live",
    "aria-modal",
    "aria-multiline",
    "aria-multiselectable",
    "aria-orientation",
    "aria-owns",
    "aria-placeholder",
    "aria-posinset",
    "aria-pressed",
    "aria-readonly",
    "aria-relevant",
    "aria-required",
    "aria-roledescription",
    "aria-rowcount",
    "aria-rowindex",
    "aria-rowindextext",
    "aria-rowspan",
    "aria-selected",
    "aria-setsize",
    "aria-sort",
    "aria-valuemax",
    "aria-valuemin",
    "aria-valuenow",
    "aria-valuetext",
];

/// Roles that users operate directly and so must be focusable
const INTERACTIVE_ROLES: &[&str] = &[
    "button",
    "checkbox",
    "combobox",
    "link",
    "menuitem",
    "menuitemcheckbox",
    "menuitemradio",
    "radio",
    "searchbox",
    "slider",
    "spinbutton",
    "switch",
    "tab",
    "textbox",
];

/// Fragments conventionally used by skip links
const SKIP_TARGETS: &[&str] = &["main", "main-content", "maincontent", "content", "skip"];

/// The accessibility catalog
pub fn catalog() -> Catalog {
    Catalog::new(
        "accessibility",
        "Accessibility Audit",
        vec![
            Category::Error,
            Category::Warning,
            Category::Notice,
            Category::Keyboard,
        ],
    )
    .check("a11y-image-alt", "Images need alt text unless decorative", image_alt)
    .check("a11y-form-labels", "Form controls need an accessible name", form_labels)
    .check(
        "a11y-placeholder-label",
        "Placeholders are not a substitute for labels",
        placeholder_labels,
    )
    .check("a11y-heading-order", "Heading levels should not skip", heading_order)
    .check("a11y-multiple-h1", "Pages should have one top-level heading", multiple_h1)
    .check(
        "a11y-duplicate-landmarks",
        "Repeated landmarks need distinguishing names",
        duplicate_landmarks,
    )
    .check("a11y-main-landmark", "Pages need a main landmark", main_landmark)
    .check(
        "a11y-aria-required",
        "Roles must carry their required state attributes",
        aria_required,
    )
    .check("a11y-aria-values", "ARIA state attributes need valid values", aria_values)
    .check("a11y-aria-unknown", "Unknown aria-* attributes", aria_unknown)
    .check(
        "a11y-interactive-focus",
        "Interactive roles must be keyboard focusable",
        interactive_focus,
    )
    .check(
        "a11y-focus-indicator",
        "Focusable elements need a visible focus indicator",
        focus_indicator,
    )
    .check("a11y-positive-tabindex", "Avoid positive tabindex", positive_tabindex)
    .check("a11y-skip-link", "Pages should offer a skip navigation link", skip_link)
    .check("a11y-color-contrast", "Inline text colors need enough contrast", color_contrast)
}

fn image_alt(page: &Page, _: &Config) -> CheckResult {
    let mut findings = Vec::new();

    for img in page.select("img, input[type=image], area[href]") {
        if page::is_decorative(&img) {
            continue;
        }
        let src = page::attr(&img, "src").unwrap_or("");

        match page::attr(&img, "alt") {
            None => findings.push(
                Finding::error(
                    "Missing alt attribute",
                    &format!("Image {} has no alt attribute", describe_src(src)),
                )
                .with_target(&img)
                .with_meta("src", src),
            ),
            Some("") => findings.push(
                Finding::warning(
                    "Empty alt on informative image",
                    &format!(
                        "Image {} has empty alt text but is not marked decorative (role=\"presentation\")",
                        describe_src(src)
                    ),
                )
                .with_target(&img)
                .with_meta("src", src),
            ),
            Some(alt) => {
                let filler = SUSPICIOUS_ALT.iter().find(|phrase| is_filler(alt, phrase));
                if let Some(phrase) = filler {
                    findings.push(
                        Finding::notice(
                            "Suspicious alt text",
                            &format!("Alt text \"{}\" contains filler phrase \"{}\"", alt, phrase),
                        )
                        .with_target(&img)
                        .with_meta("alt", alt),
                    );
                }
            }
        }
    }

    Ok(findings)
}

/// Multi-word phrases match anywhere on word boundaries; single words only
/// when they are the whole alt text
fn is_filler(alt: &str, phrase: &str) -> bool {
    let lower = alt.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let wanted: Vec<&str> = phrase.split_whitespace().collect();

    if wanted.len() == 1 {
        return words == wanted;
    }
    words.windows(wanted.len()).any(|window| window == wanted.as_slice())
}

fn describe_src(src: &str) -> String {
    if src.is_empty() {
        "(no src)".to_string()
    } else {
        format!("'{}'", src)
    }
}

/// Form controls that need a label: not hidden, not buttons
fn labelable_controls(page: &Page) -> Vec<ElementRef<'_>> {
    page.select("input, select, textarea")
        .into_iter()
        .filter(|el| {
            let kind = page::attr(el, "type").unwrap_or("text").to_lowercase();
            !matches!(
                kind.as_str(),
                "hidden" | "submit" | "reset" | "button" | "image"
            ) && !page::is_hidden(el)
        })
        .collect()
}

fn form_labels(page: &Page, _: &Config) -> CheckResult {
    Ok(labelable_controls(page)
        .into_iter()
        .filter(|el| page::accessible_name(page, el).is_none())
        .map(|el| {
            let name = page::attr(&el, "name").unwrap_or("");
            Finding::error(
                "Missing form label",
                &format!(
                    "<{}> {}has no label, aria-label, aria-labelledby or title",
                    page::tag(&el),
                    if name.is_empty() {
                        String::new()
                    } else {
                        format!("'{}' ", name)
                    }
                ),
            )
            .with_target(&el)
        })
        .collect())
}

fn placeholder_labels(page: &Page, _: &Config) -> CheckResult {
    Ok(labelable_controls(page)
        .into_iter()
        .filter(|el| {
            page::attr(el, "placeholder").is_some_and(|p| !p.is_empty())
                && page::accessible_name(page, el).is_none()
        })
        .map(|el| {
            let placeholder = page::attr(&el, "placeholder").unwrap_or("");
            Finding::warning(
                "Placeholder used as label",
                &format!(
                    "Placeholder \"{}\" disappears on input; add a real label",
                    placeholder
                ),
            )
            .with_target(&el)
            .with_meta("placeholder", placeholder)
        })
        .collect())
}

fn heading_order(page: &Page, _: &Config) -> CheckResult {
    let mut findings = Vec::new();
    let mut previous: Option<u8> = None;

    for heading in page.select("h1, h2, h3, h4, h5, h6") {
        let Some(level) = page::heading_level(&heading) else {
            continue;
        };

        if let Some(prev) = previous {
            if level > prev + 1 {
                findings.push(
                    Finding::warning(
                        "Skipped heading level",
                        &format!(
                            "Heading jumps from h{} to h{}: \"{}\"",
                            prev,
                            level,
                            page::text_content(&heading)
                        ),
                    )
                    .with_target(&heading)
                    .with_meta("from", prev)
                    .with_meta("to", level),
                );
            }
        }
        previous = Some(level);
    }

    Ok(findings)
}

fn multiple_h1(page: &Page, _: &Config) -> CheckResult {
    let h1s = page.select("h1");
    if h1s.len() <= 1 {
        return Ok(Vec::new());
    }

    let texts: Vec<String> = h1s.iter().map(page::text_content).collect();
    Ok(vec![Finding::notice(
        "Multiple top-level headings",
        &format!("Found {} <h1> elements", h1s.len()),
    )
    .with_target(&h1s[1])
    .with_meta("count", h1s.len())
    .with_meta("headings", texts)])
}

/// Landmark role of an element, explicit or implied by its tag
fn landmark_role<'a>(page: &Page, el: &ElementRef<'a>) -> Option<&'a str> {
    if let Some(role) = page::role(el) {
        return matches!(
            role,
            "banner"
                | "complementary"
                | "contentinfo"
                | "form"
                | "main"
                | "navigation"
                | "region"
                | "search"
        )
        .then_some(role);
    }

    let sectioned = || {
        let mut ancestor = el.parent().and_then(ElementRef::wrap);
        while let Some(node) = ancestor {
            if matches!(page::tag(&node), "article" | "aside" | "main" | "nav" | "section") {
                return true;
            }
            ancestor = node.parent().and_then(ElementRef::wrap);
        }
        false
    };

    match page::tag(el) {
        "main" => Some("main"),
        "nav" => Some("navigation"),
        "aside" => Some("complementary"),
        "header" if !sectioned() => Some("banner"),
        "footer" if !sectioned() => Some("contentinfo"),
        "form" | "section" if landmark_name(page, el).is_some() => {
            Some(if page::tag(el) == "form" { "form" } else { "region" })
        }
        _ => None,
    }
}

fn landmark_name(page: &Page, el: &ElementRef<'_>) -> Option<String> {
    if let Some(label) = page::attr(el, "aria-label").filter(|l| !l.is_empty()) {
        return Some(label.to_string());
    }
    if let Some(ids) = page::attr(el, "aria-labelledby") {
        let text: Vec<String> = ids
            .split_whitespace()
            .filter_map(|id| page.by_id(id))
            .map(|e| page::text_content(&e))
            .filter(|t| !t.is_empty())
            .collect();
        if !text.is_empty() {
            return Some(text.join(" "));
        }
    }
    page::attr(el, "title")
        .filter(|t| !t.is_empty())
        .map(String::from)
}

fn duplicate_landmarks(page: &Page, _: &Config) -> CheckResult {
    let mut by_role: BTreeMap<&str, Vec<ElementRef>> = BTreeMap::new();
    let mut order: Vec<&str> = Vec::new();

    for el in page.elements() {
        if let Some(role) = landmark_role(page, &el) {
            if !by_role.contains_key(role) {
                order.push(role);
            }
            by_role.entry(role).or_default().push(el);
        }
    }

    let mut findings = Vec::new();
    for role in order {
        let elements = &by_role[role];
        if elements.len() < 2 {
            continue;
        }

        let names: Vec<Option<String>> =
            elements.iter().map(|el| landmark_name(page, el)).collect();

        for (el, name) in elements.iter().zip(&names) {
            let distinct = match name {
                Some(n) => names.iter().filter(|other| other.as_ref() == Some(n)).count() == 1,
                None => false,
            };
            if distinct {
                continue;
            }
            findings.push(
                Finding::warning(
                    "Unlabeled duplicate landmark",
                    &format!(
                        "{} '{}' landmarks found; this one has no distinguishing aria-label",
                        elements.len(),
                        role
                    ),
                )
                .with_target(el)
                .with_meta("role", role),
            );
        }
    }

    Ok(findings)
}

fn main_landmark(page: &Page, _: &Config) -> CheckResult {
    if page.first("main, [role=main]").is_some() {
        return Ok(Vec::new());
    }
    Ok(vec![Finding::warning(
        "Missing main landmark",
        "No <main> element or role=\"main\" found",
    )])
}

/// State attributes a role cannot do without
fn required_attributes(role: &str) -> &'static [&'static str] {
    match role {
        "checkbox" | "radio" | "switch" | "menuitemcheckbox" | "menuitemradio" => {
            &["aria-checked"]
        }
        "combobox" => &["aria-expanded"],
        "slider" => &["aria-valuenow"],
        "scrollbar" => &["aria-controls", "aria-valuenow"],
        "heading" => &["aria-level"],
        _ => &[],
    }
}

fn aria_required(page: &Page, _: &Config) -> CheckResult {
    let mut findings = Vec::new();

    for el in page.select("[role]") {
        let Some(role) = page::role(&el) else {
            continue;
        };

        // Native checkboxes and radios expose their checked state themselves
        let native_state = page::tag(&el) == "input"
            && matches!(
                page::attr(&el, "type").map(str::to_lowercase).as_deref(),
                Some("checkbox") | Some("radio")
            );

        for attr in required_attributes(role) {
            if *attr == "aria-checked" && native_state {
                continue;
            }
            if !page::has_attr(&el, attr) {
                findings.push(
                    Finding::error(
                        "Missing required ARIA attribute",
                        &format!("role=\"{}\" requires {}", role, attr),
                    )
                    .with_target(&el)
                    .with_meta("role", role)
                    .with_meta("attribute", *attr),
                );
            }
        }
    }

    Ok(findings)
}

const TRISTATE: &[&str] = &["true", "false", "mixed"];
const BOOLEAN: &[&str] = &["true", "false"];

fn allowed_values(attr: &str) -> Option<&'static [&'static str]> {
    match attr {
        "aria-checked" | "aria-pressed" => Some(TRISTATE),
        "aria-selected" | "aria-expanded" | "aria-hidden" | "aria-disabled" => Some(BOOLEAN),
        _ => None,
    }
}

fn aria_values(page: &Page, _: &Config) -> CheckResult {
    let mut findings = Vec::new();

    for el in page.elements() {
        for (name, value) in el.value().attrs() {
            let Some(allowed) = allowed_values(name) else {
                continue;
            };
            let value = value.trim();
            if !allowed.contains(&value) {
                findings.push(
                    Finding::error(
                        "Invalid ARIA state value",
                        &format!(
                            "{}=\"{}\" is not one of: {}",
                            name,
                            value,
                            allowed.join(", ")
                        ),
                    )
                    .with_target(&el)
                    .with_meta("attribute", name)
                    .with_meta("value", value),
                );
            }
        }
    }

    Ok(findings)
}

fn aria_unknown(page: &Page, _: &Config) -> CheckResult {
    let mut findings = Vec::new();

    for el in page.elements() {
        for (name, _) in el.value().attrs() {
            if name.starts_with("aria-") && !KNOWN_ARIA.contains(&name) {
                findings.push(
                    Finding::warning(
                        "Unknown ARIA attribute",
                        &format!("{} is not a recognized ARIA attribute", name),
                    )
                    .with_target(&el)
                    .with_meta("attribute", name),
                );
            }
        }
    }

    Ok(findings)
}

fn interactive_focus(page: &Page, _: &Config) -> CheckResult {
    Ok(page
        .select("[role]")
        .into_iter()
        .filter(|el| {
            page::role(el).is_some_and(|r| INTERACTIVE_ROLES.contains(&r))
                && !page::is_focusable(el)
                && !page::is_hidden(el)
        })
        .map(|el| {
            let role = page::role(&el).unwrap_or("");
            Finding::warning(
                "Interactive role not focusable",
                &format!(
                    "role=\"{}\" on <{}> cannot be reached with the keyboard; add tabindex=\"0\"",
                    role,
                    page::tag(&el)
                ),
            )
            .with_target(&el)
            .with_meta("role", role)
        })
        .collect())
}

fn focus_indicator(page: &Page, _: &Config) -> CheckResult {
    let styles = FocusStyles::collect(&css::style_sources(page));

    Ok(page
        .elements()
        .filter(|el| page::is_focusable(el) && !page::is_hidden(el))
        .filter(|el| styles.lacks_indicator(el))
        .map(|el| {
            Finding::new(
                Category::Keyboard,
                "Missing visible focus indicator",
                &format!(
                    "<{}> removes its focus outline without a replacement style",
                    page::tag(&el)
                ),
            )
            .with_target(&el)
        })
        .collect())
}

fn positive_tabindex(page: &Page, _: &Config) -> CheckResult {
    Ok(page
        .select("[tabindex]")
        .into_iter()
        .filter_map(|el| {
            let index = page::tab_index(&el).filter(|i| *i > 0)?;
            Some(
                Finding::warning(
                    "Positive tabindex",
                    &format!("tabindex=\"{}\" overrides the natural tab order", index),
                )
                .with_target(&el)
                .with_meta("tabindex", index),
            )
        })
        .collect())
}

fn skip_link(page: &Page, _: &Config) -> CheckResult {
    let main_id = page
        .first("main[id], [role=main][id]")
        .and_then(|m| m.value().id().map(str::to_lowercase));

    let has_skip = page.select("a[href]").iter().any(|a| {
        let href = page::attr(a, "href").unwrap_or("");
        let Some(fragment) = href.strip_prefix('#') else {
            return false;
        };
        let fragment = fragment.to_lowercase();
        SKIP_TARGETS.contains(&fragment.as_str()) || main_id.as_deref() == Some(fragment.as_str())
    });

    if has_skip {
        return Ok(Vec::new());
    }
    Ok(vec![Finding::notice(
        "Missing skip navigation link",
        "No link targets #main or #main-content; keyboard users must tab through navigation",
    )])
}

fn color_contrast(page: &Page, config: &Config) -> CheckResult {
    let min = config.thresholds.min_contrast_ratio;
    let mut findings = Vec::new();

    for el in page.select("[style]") {
        let fg = css::inline_value(&el, "color").and_then(|v| css::parse_color(&v));
        let bg = css::inline_value(&el, "background-color")
            .or_else(|| css::inline_value(&el, "background"))
            .and_then(|v| css::parse_color(&v));

        let (Some(fg), Some(bg)) = (fg, bg) else {
            continue;
        };
        if page::text_content(&el).is_empty() {
            continue;
        }

        let ratio = css::contrast_ratio(fg, bg);
        if ratio < min {
            let rounded = (ratio * 100.0).round() / 100.0;
            findings.push(
                Finding::warning(
                    "Low color contrast",
                    &format!("Contrast ratio {:.2}:1 is below {}:1", ratio, min),
                )
                .with_target(&el)
                .with_meta("ratio", rounded)
                .with_meta("minimum", min),
            );
        }
    }

    Ok(findings)
}
