//! Selector resolution for re-locating elements
//!
//! A locator is a CSS selector path built from the element up towards the
//! document root. Same-tag siblings are told apart with `:nth-of-type()`,
//! and the walk stops at the first element carrying an `id`, since that
//! anchors the rest of the path. Locators describe the tree at resolution
//! time only; nothing here caches them.

use scraper::ElementRef;

/// Resolve a selector path for an element. `None` yields an empty string.
pub fn resolve(element: Option<&ElementRef<'_>>) -> String {
    let Some(element) = element else {
        return String::new();
    };

    let mut segments: Vec<String> = Vec::new();
    let mut current = Some(*element);

    while let Some(el) = current {
        if let Some(id) = stable_id(&el) {
            segments.push(id_selector(id));
            break;
        }

        segments.push(segment(&el));
        current = el.parent().and_then(ElementRef::wrap);
    }

    segments.reverse();
    segments.join(" > ")
}

fn stable_id<'a>(el: &ElementRef<'a>) -> Option<&'a str> {
    el.value().id().map(str::trim).filter(|id| !id.is_empty())
}

fn id_selector(id: &str) -> String {
    let mut chars = id.chars();
    let plain = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if plain {
        format!("#{}", id)
    } else {
        format!("[id=\"{}\"]", id.replace('"', "\\\""))
    }
}

/// Tag name plus position among same-tag siblings when ambiguous
fn segment(el: &ElementRef<'_>) -> String {
    let tag = el.value().name();

    let Some(parent) = el.parent() else {
        return tag.to_string();
    };

    let same_tag: Vec<ElementRef> = parent
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|sibling| sibling.value().name() == tag)
        .collect();

    if same_tag.len() <= 1 {
        return tag.to_string();
    }

    let position = same_tag
        .iter()
        .position(|sibling| sibling.id() == el.id())
        .map(|i| i + 1)
        .unwrap_or(1);

    format!("{}:nth-of-type({})", tag, position)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    fn select<'a>(html: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
        let sel = Selector::parse(css).unwrap();
        html.select(&sel).collect()
    }

    #[test]
    fn test_null_input() {
        assert_eq!(resolve(None), "");
    }

    #[test]
    fn test_same_tag_siblings_disambiguated() {
        let html = Html::parse_document("<body><div><p>a</p><p>b</p></div></body>");
        let ps = select(&html, "p");

        assert_eq!(resolve(Some(&ps[0])), "html > body > div > p:nth-of-type(1)");
        assert_eq!(resolve(Some(&ps[1])), "html > body > div > p:nth-of-type(2)");
    }

    #[test]
    fn test_single_child_has_no_qualifier() {
        let html = Html::parse_document("<body><main><h1>x</h1></main></body>");
        let h1 = select(&html, "h1");
        assert_eq!(resolve(Some(&h1[0])), "html > body > main > h1");
    }

    #[test]
    fn test_id_on_element_terminates_path() {
        let html =
            Html::parse_document(r#"<body><div><section><img id="logo" src="x"></section></div></body>"#);
        let img = select(&html, "img");
        assert_eq!(resolve(Some(&img[0])), "#logo");
    }

    #[test]
    fn test_id_on_ancestor_short_circuits() {
        let html = Html::parse_document(
            r#"<body><div id="nav"><ul><li>a</li><li>b</li></ul></div></body>"#,
        );
        let lis = select(&html, "li");
        assert_eq!(resolve(Some(&lis[1])), "#nav > ul > li:nth-of-type(2)");
    }

    #[test]
    fn test_unusual_id_uses_attribute_selector() {
        let html = Html::parse_document(r#"<body><span id="1st item">x</span></body>"#);
        let span = select(&html, "span");
        assert_eq!(resolve(Some(&span[0])), "[id=\"1st item\"]");
    }

    #[test]
    fn test_resolved_path_selects_same_element() {
        let html = Html::parse_document(
            "<body><ul><li>a</li><li><a href='#'>x</a></li><li>c</li></ul></body>",
        );
        let links = select(&html, "a");
        let path = resolve(Some(&links[0]));

        let found = select(&html, &path);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id(), links[0].id());
    }

    #[test]
    fn test_deterministic() {
        let html = Html::parse_document("<body><div></div><div><span></span></div></body>");
        let span = select(&html, "span");
        assert_eq!(resolve(Some(&span[0])), resolve(Some(&span[0])));
    }
}
