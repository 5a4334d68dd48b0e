//! Result reporter
//!
//! Turns a finished [`AuditRun`] into a self-contained, closable panel: one
//! tab per category with its count, one item per finding. Items that carry a
//! locator scroll their element into view and highlight it for a short time
//! when clicked.
//!
//! Each [`Reporter::present`] call builds a fresh [`Panel`] with its own id.
//! A panel can be inserted into a page and removed again, leaving the page
//! exactly as it was.

use crate::config::OutputConfig;
use crate::engine::AuditRun;
use crate::finding::{Category, Finding, Severity};
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

static NEXT_PANEL: AtomicUsize = AtomicUsize::new(1);

/// Invalid interaction with a panel
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PanelError {
    #[error("panel {0} has been dismissed")]
    Dismissed(String),

    #[error("panel {0} is not displayed")]
    NotDisplayed(String),

    #[error("panel has no '{0}' tab")]
    UnknownTab(Category),
}

/// Lifecycle of a panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelState {
    Constructed,
    Displayed,
    Dismissed,
}

/// Builds panels from audit runs
#[derive(Debug, Clone)]
pub struct Reporter {
    title: Option<String>,
    highlight_ms: u64,
    floating: bool,
}

impl Reporter {
    pub fn new() -> Self {
        Self {
            title: None,
            highlight_ms: 3000,
            floating: true,
        }
    }

    pub fn from_config(output: &OutputConfig) -> Self {
        Self::new().with_highlight_ms(output.highlight_ms)
    }

    /// Override the run's title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_highlight_ms(mut self, ms: u64) -> Self {
        self.highlight_ms = ms;
        self
    }

    /// Fixed to the viewport corner (default) or laid out in flow
    pub fn floating(mut self, floating: bool) -> Self {
        self.floating = floating;
        self
    }

    /// Build a fresh panel for a run
    pub fn present(&self, run: &AuditRun) -> Panel {
        let n = NEXT_PANEL.fetch_add(1, Ordering::Relaxed);
        let id = format!("pageaudit-{}-{}", slug(&run.suite), n);

        let tabs: Vec<Tab> = run
            .visible_categories()
            .into_iter()
            .map(|category| Tab {
                category,
                items: run.findings(category).iter().map(PanelItem::from).collect(),
            })
            .collect();

        let active = tabs
            .iter()
            .find(|t| !t.items.is_empty())
            .or(tabs.first())
            .map(|t| t.category);

        Panel {
            id,
            title: self.title.clone().unwrap_or_else(|| run.title.clone()),
            page: run.page.clone(),
            status: run.status().to_string(),
            tabs,
            active,
            highlight_ms: self.highlight_ms,
            floating: self.floating,
            state: PanelState::Constructed,
        }
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}

fn slug(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect()
}

/// One category tab
#[derive(Debug, Clone)]
pub struct Tab {
    pub category: Category,
    pub items: Vec<PanelItem>,
}

impl Tab {
    pub fn count(&self) -> usize {
        self.items.len()
    }
}

/// One finding as shown in the panel
#[derive(Debug, Clone)]
pub struct PanelItem {
    pub check: String,
    pub kind: String,
    pub message: String,
    pub severity: Severity,
    /// `None` when the finding is about the page as a whole
    pub locator: Option<String>,
    pub snippet: Option<String>,
}

impl From<&Finding> for PanelItem {
    fn from(finding: &Finding) -> Self {
        Self {
            check: finding.check.clone(),
            kind: finding.kind.clone(),
            message: finding.message.clone(),
            severity: finding.severity(),
            locator: finding.locator.clone(),
            snippet: finding.target.as_ref().map(|t| t.snippet.clone()),
        }
    }
}

/// A rendered results panel
#[derive(Debug, Clone)]
pub struct Panel {
    id: String,
    title: String,
    page: String,
    status: String,
    tabs: Vec<Tab>,
    active: Option<Category>,
    highlight_ms: u64,
    floating: bool,
    state: PanelState,
}

impl Panel {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn state(&self) -> PanelState {
        self.state
    }

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn tab(&self, category: Category) -> Option<&Tab> {
        self.tabs.iter().find(|t| t.category == category)
    }

    pub fn active_tab(&self) -> Option<Category> {
        self.active
    }

    /// Show the panel. Showing an already displayed panel does nothing.
    pub fn display(&mut self) -> Result<(), PanelError> {
        match self.state {
            PanelState::Dismissed => Err(PanelError::Dismissed(self.id.clone())),
            _ => {
                self.state = PanelState::Displayed;
                Ok(())
            }
        }
    }

    /// Switch to another category tab
    pub fn select_tab(&mut self, category: Category) -> Result<(), PanelError> {
        match self.state {
            PanelState::Dismissed => return Err(PanelError::Dismissed(self.id.clone())),
            PanelState::Constructed => return Err(PanelError::NotDisplayed(self.id.clone())),
            PanelState::Displayed => {}
        }
        if self.tab(category).is_none() {
            return Err(PanelError::UnknownTab(category));
        }
        self.active = Some(category);
        Ok(())
    }

    /// Close the panel. Terminal: every later interaction fails.
    pub fn dismiss(&mut self) -> Result<(), PanelError> {
        if self.state == PanelState::Dismissed {
            return Err(PanelError::Dismissed(self.id.clone()));
        }
        self.state = PanelState::Dismissed;
        Ok(())
    }

    fn open_marker(&self) -> String {
        format!("<!-- pageaudit:{} -->", self.id)
    }

    fn close_marker(&self) -> String {
        format!("<!-- /pageaudit:{} -->", self.id)
    }

    /// Insert the panel as the last child of `<body>`, displaying it.
    ///
    /// The panel id is made unique within the page first.
    pub fn inject(&mut self, page_html: &str) -> Result<String, PanelError> {
        self.display()?;

        let base = self.id.clone();
        let mut suffix = 2;
        while page_html.contains(&format!("id=\"{}\"", self.id)) {
            self.id = format!("{}-{}", base, suffix);
            suffix += 1;
        }

        let fragment = format!(
            "{}\n{}\n{}\n",
            self.open_marker(),
            self.render()?,
            self.close_marker()
        );

        let lower = page_html.to_ascii_lowercase();
        let at = lower.rfind("</body>").unwrap_or(page_html.len());
        let mut out = String::with_capacity(page_html.len() + fragment.len());
        out.push_str(&page_html[..at]);
        out.push_str(&fragment);
        out.push_str(&page_html[at..]);
        Ok(out)
    }

    /// Take this panel back out of a page produced by [`Panel::inject`]
    pub fn remove(&self, page_html: &str) -> String {
        let open = self.open_marker();
        let close = self.close_marker();
        let Some(start) = page_html.find(&open) else {
            return page_html.to_string();
        };
        let Some(end) = page_html[start..].find(&close).map(|i| start + i + close.len()) else {
            return page_html.to_string();
        };
        let end = if page_html[end..].starts_with('\n') {
            end + 1
        } else {
            end
        };
        format!("{}{}", &page_html[..start], &page_html[end..])
    }

    /// The panel as an HTML fragment: container, scoped style block and
    /// behaviour script
    pub fn render(&self) -> Result<String, PanelError> {
        if self.state == PanelState::Dismissed {
            return Err(PanelError::Dismissed(self.id.clone()));
        }

        let summary: String = self
            .tabs
            .iter()
            .map(|t| {
                format!(
                    r#"<span class="pa-count pa-{sev}">{label}: {count}</span>"#,
                    sev = t.category.severity(),
                    label = t.category.label(),
                    count = t.count()
                )
            })
            .collect::<Vec<_>>()
            .join(" ");

        let buttons: String = self
            .tabs
            .iter()
            .map(|t| {
                let selected = self.active == Some(t.category);
                format!(
                    r#"<button type="button" class="pa-tab{cls}" role="tab" aria-selected="{sel}" data-tab="{cat}">{label} ({count})</button>"#,
                    cls = if selected { " pa-active" } else { "" },
                    sel = selected,
                    cat = t.category,
                    label = t.category.label(),
                    count = t.count()
                )
            })
            .collect();

        let panes: String = self
            .tabs
            .iter()
            .map(|t| self.render_pane(t))
            .collect::<Vec<_>>()
            .join("\n");

        let position = if self.floating {
            "position:fixed;right:16px;bottom:16px;z-index:2147483647;max-height:60vh;"
        } else {
            "position:static;"
        };

        Ok(format!(
            r#"<div id="{id}" class="pageaudit-panel" role="dialog" aria-label="{title}" data-status="{status}" style="{position}width:420px;overflow:auto;background:#fff;color:#222;border:1px solid #ccc;border-radius:8px;box-shadow:0 4px 16px rgba(0,0,0,.2);font:13px/1.4 -apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,sans-serif;">
<style>{css}</style>
<div class="pa-header"><strong>{title}</strong><button type="button" class="pa-close" aria-label="Close">&times;</button></div>
<div class="pa-page">{page}</div>
<div class="pa-summary">{summary}</div>
<div class="pa-tabs" role="tablist">{buttons}</div>
{panes}
<script>{script}</script>
</div>"#,
            id = self.id,
            title = html_escape(&self.title),
            status = html_escape(&self.status),
            position = position,
            css = scoped_css(&self.id),
            page = html_escape(&self.page),
            summary = summary,
            buttons = buttons,
            panes = panes,
            script = script(&self.id, self.highlight_ms),
        ))
    }

    fn render_pane(&self, tab: &Tab) -> String {
        let items = if tab.items.is_empty() {
            r#"<li class="pa-empty">Nothing found</li>"#.to_string()
        } else {
            tab.items
                .iter()
                .map(render_item)
                .collect::<Vec<_>>()
                .join("\n")
        };

        format!(
            r#"<ul class="pa-pane" role="tabpanel" data-pane="{cat}"{hidden}>
{items}
</ul>"#,
            cat = tab.category,
            hidden = if self.active == Some(tab.category) {
                ""
            } else {
                " hidden"
            },
            items = items
        )
    }

    /// A complete HTML document holding only the panel, laid out in flow
    pub fn standalone(&self) -> Result<String, PanelError> {
        let mut copy = self.clone();
        copy.floating = false;
        Ok(format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
</head>
<body>
{panel}
</body>
</html>
"#,
            title = html_escape(&self.title),
            panel = copy.render()?,
        ))
    }
}

fn render_item(item: &PanelItem) -> String {
    let locator = item
        .locator
        .as_ref()
        .map(|l| {
            format!(
                r#" data-locator="{}" tabindex="0" title="Show element""#,
                html_escape(l)
            )
        })
        .unwrap_or_default();
    let snippet = item
        .snippet
        .as_ref()
        .map(|s| format!(r#"<code class="pa-snippet">{}</code>"#, html_escape(s)))
        .unwrap_or_default();

    format!(
        r#"<li class="pa-item pa-{sev}"{locator}><span class="pa-kind">{kind}</span> <span class="pa-message">{message}</span>{snippet}<span class="pa-check">{check}</span></li>"#,
        sev = item.severity,
        locator = locator,
        kind = html_escape(&item.kind),
        message = html_escape(&item.message),
        snippet = snippet,
        check = html_escape(&item.check),
    )
}

fn scoped_css(id: &str) -> String {
    CSS.replace("#PANEL", &format!("#{}", id))
}

fn script(id: &str, highlight_ms: u64) -> String {
    SCRIPT
        .replace("PANEL_ID", id)
        .replace("HIGHLIGHT_MS", &highlight_ms.to_string())
}

pub(crate) fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

const CSS: &str = r#"
#PANEL * { box-sizing: border-box; }
#PANEL .pa-header { display: flex; justify-content: space-between; align-items: center; padding: 8px 12px; background: #1976d2; color: #fff; }
#PANEL .pa-close { background: none; border: 0; color: inherit; font-size: 18px; cursor: pointer; }
#PANEL .pa-page { padding: 4px 12px; color: #666; word-break: break-all; }
#PANEL .pa-summary { display: flex; flex-wrap: wrap; gap: 6px; padding: 6px 12px; }
#PANEL .pa-count { padding: 1px 6px; border-radius: 8px; background: #eee; }
#PANEL .pa-tabs { display: flex; flex-wrap: wrap; border-bottom: 1px solid #ddd; }
#PANEL .pa-tab { background: none; border: 0; border-bottom: 2px solid transparent; padding: 6px 10px; cursor: pointer; }
#PANEL .pa-tab.pa-active { border-bottom-color: #1976d2; font-weight: bold; }
#PANEL .pa-pane { list-style: none; margin: 0; padding: 0; }
#PANEL .pa-item { padding: 6px 12px; border-bottom: 1px solid #f0f0f0; border-left: 3px solid #9e9e9e; }
#PANEL .pa-item[data-locator] { cursor: pointer; }
#PANEL .pa-item[data-locator]:hover { background: #f5f9ff; }
#PANEL .pa-error { border-left-color: #d32f2f; }
#PANEL .pa-warning { border-left-color: #ff9800; }
#PANEL .pa-kind { font-weight: bold; }
#PANEL .pa-snippet { display: block; margin-top: 2px; color: #555; white-space: pre-wrap; word-break: break-all; }
#PANEL .pa-check { display: block; color: #999; font-size: 11px; }
#PANEL .pa-empty { padding: 12px; color: #999; }
"#;

const SCRIPT: &str = r#"
(function () {
    var panel = document.getElementById('PANEL_ID');
    if (!panel) { return; }
    panel.querySelector('.pa-close').addEventListener('click', function () {
        panel.parentNode.removeChild(panel);
    });
    panel.querySelectorAll('.pa-tab').forEach(function (tab) {
        tab.addEventListener('click', function () {
            panel.querySelectorAll('.pa-tab').forEach(function (t) {
                var on = t === tab;
                t.classList.toggle('pa-active', on);
                t.setAttribute('aria-selected', on ? 'true' : 'false');
            });
            panel.querySelectorAll('.pa-pane').forEach(function (pane) {
                pane.hidden = pane.getAttribute('data-pane') !== tab.getAttribute('data-tab');
            });
        });
    });
    function show(item) {
        var target;
        try { target = document.querySelector(item.getAttribute('data-locator')); } catch (e) { return; }
        if (!target) { return; }
        target.scrollIntoView({ behavior: 'smooth', block: 'center' });
        var outline = target.style.outline;
        var offset = target.style.outlineOffset;
        target.style.outline = '3px solid #e91e63';
        target.style.outlineOffset = '2px';
        setTimeout(function () {
            target.style.outline = outline;
            target.style.outlineOffset = offset;
        }, HIGHLIGHT_MS);
    }
    panel.querySelectorAll('.pa-item[data-locator]').forEach(function (item) {
        item.addEventListener('click', function () { show(item); });
        item.addEventListener('keydown', function (e) {
            if (e.key === 'Enter') { show(item); }
        });
    });
})();
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RunStatus;
    use pretty_assertions::assert_eq;

    fn sample_run() -> AuditRun {
        let mut run = AuditRun::new(
            "accessibility",
            "Accessibility Audit",
            "http://localhost/",
            &[Category::Error, Category::Warning, Category::Notice],
        );
        run.advance(RunStatus::Running).unwrap();
        let mut finding = Finding::warning("Skipped heading level", "h2 -> <h4>");
        finding.locator = Some("#content > h4".to_string());
        finding.check = "a11y-heading-order".to_string();
        run.record(finding);
        run.record(Finding::notice("Missing skip navigation link", "No skip link"));
        run.advance(RunStatus::Complete).unwrap();
        run
    }

    #[test]
    fn test_panel_state_machine() {
        let mut panel = Reporter::new().present(&sample_run());
        assert_eq!(panel.state(), PanelState::Constructed);
        assert!(matches!(
            panel.select_tab(Category::Notice),
            Err(PanelError::NotDisplayed(_))
        ));

        panel.display().unwrap();
        panel.select_tab(Category::Notice).unwrap();
        assert_eq!(panel.active_tab(), Some(Category::Notice));
        assert_eq!(
            panel.select_tab(Category::Broken),
            Err(PanelError::UnknownTab(Category::Broken))
        );

        panel.dismiss().unwrap();
        assert_eq!(panel.state(), PanelState::Dismissed);
        assert!(panel.display().is_err());
        assert!(panel.select_tab(Category::Warning).is_err());
        assert!(panel.dismiss().is_err());
        assert!(panel.render().is_err());
    }

    #[test]
    fn test_present_builds_fresh_panels() {
        let run = sample_run();
        let reporter = Reporter::new();
        let a = reporter.present(&run);
        let b = reporter.present(&run);
        assert_ne!(a.id(), b.id());

        let counts: Vec<_> = a.tabs().iter().map(|t| (t.category, t.count())).collect();
        assert_eq!(
            counts,
            vec![
                (Category::Error, 0),
                (Category::Warning, 1),
                (Category::Notice, 1)
            ]
        );
        assert_eq!(a.active_tab(), Some(Category::Warning));
    }

    #[test]
    fn test_render_escapes_and_carries_locators() {
        let panel = Reporter::new().with_highlight_ms(1500).present(&sample_run());
        let html = panel.render().unwrap();

        assert!(html.contains("h2 -&gt; &lt;h4&gt;"));
        assert!(html.contains(r##"data-locator="#content &gt; h4""##));
        assert!(html.contains("Warnings (1)"));
        assert!(html.contains("}, 1500);"));
        assert!(html.contains(&format!("#{} .pa-tab", panel.id())));
        assert!(!html.contains("PANEL_ID"));
    }

    #[test]
    fn test_inject_and_remove_round_trip() {
        let page = "<html><body><p>Hello</p></BODY></html>";
        let mut panel = Reporter::new().present(&sample_run());
        let injected = panel.inject(page).unwrap();

        assert_eq!(panel.state(), PanelState::Displayed);
        let body_end = injected.find("</BODY>").unwrap();
        let panel_at = injected.find(&format!("id=\"{}\"", panel.id())).unwrap();
        assert!(panel_at < body_end);
        assert!(injected.starts_with("<html><body><p>Hello</p>"));

        assert_eq!(panel.remove(&injected), page);
    }

    #[test]
    fn test_inject_keeps_ids_unique() {
        let mut first = Reporter::new().present(&sample_run());
        let once = first.inject("<body></body>").unwrap();

        // A page that already uses the next panel's id
        let mut second = Reporter::new().present(&sample_run());
        let clash = format!("<body><div id=\"{}\"></div></body>", second.id());
        let original = second.id().to_string();
        let twice = second.inject(&clash).unwrap();
        assert_ne!(second.id(), original);
        assert!(twice.contains(&format!("id=\"{}\"", second.id())));

        assert!(once.contains(first.id()));
    }

    #[test]
    fn test_standalone_document() {
        let panel = Reporter::new().with_title("Report <1>").present(&sample_run());
        let doc = panel.standalone().unwrap();
        assert!(doc.starts_with("<!DOCTYPE html>"));
        assert!(doc.contains("<title>Report &lt;1&gt;</title>"));
        assert!(doc.contains("position:static;"));
    }
}
