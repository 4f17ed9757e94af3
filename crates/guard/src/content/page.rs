//! Page adapter contract.
//!
//! The adapter owns the host page: it extracts the current content unit,
//! mounts and removes views at the insertion anchor, and reports structural
//! changes under the content root. Views carry data only; styling belongs to
//! the adapter.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use detection::{ContentUnit, VerdictLabel};
use serde::Serialize;

use super::banner::Severity;
use super::fingerprint::Fingerprint;

/// Subject selectors, highest priority first.
pub const SUBJECT_SELECTORS: &[&str] = &[r#"h2[role="heading"]"#, "h2.hP"];

/// Body selectors, highest priority first.
pub const BODY_SELECTORS: &[&str] = &[".ii", ".a3s", r#"div[role="listitem"] .a3s"#];

/// Insertion anchor selectors, highest priority first.
pub const ANCHOR_SELECTORS: &[&str] = &[".nH .ha", r#"h2[role="heading"]"#, r#"div[role="main"]"#];

/// Read access to the host document.
pub trait DomQuery {
    /// Inner text of every element matching `selector`, in document order.
    fn query_all(&self, selector: &str) -> Vec<String>;
}

/// Where views are inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Anchor {
    Selector(String),
    /// Document root fallback
    Root,
}

/// A fixed priority list of selectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorChain {
    selectors: Vec<String>,
}

impl SelectorChain {
    #[must_use]
    pub fn new(selectors: &[&str]) -> Self {
        Self {
            selectors: selectors.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    /// First selector with any match wins; several matches are joined with
    /// newlines; no match at all yields the empty string.
    #[must_use]
    pub fn extract<D: DomQuery + ?Sized>(&self, dom: &D) -> String {
        for selector in &self.selectors {
            let matches = dom.query_all(selector);
            match matches.len() {
                0 => continue,
                1 => return matches.into_iter().next().unwrap_or_default(),
                _ => return matches.join("\n"),
            }
        }
        String::new()
    }

    /// First selector with any match, else the document root.
    #[must_use]
    pub fn anchor<D: DomQuery + ?Sized>(&self, dom: &D) -> Anchor {
        self.selectors
            .iter()
            .find(|s| !dom.query_all(s).is_empty())
            .map_or(Anchor::Root, |s| Anchor::Selector(s.clone()))
    }
}

/// Selector chains for one page layout.
#[derive(Debug, Clone)]
pub struct PageSelectors {
    pub subject: SelectorChain,
    pub body: SelectorChain,
    pub anchor: SelectorChain,
}

impl Default for PageSelectors {
    fn default() -> Self {
        Self {
            subject: SelectorChain::new(SUBJECT_SELECTORS),
            body: SelectorChain::new(BODY_SELECTORS),
            anchor: SelectorChain::new(ANCHOR_SELECTORS),
        }
    }
}

impl PageSelectors {
    #[must_use]
    pub fn extract<D: DomQuery + ?Sized>(&self, dom: &D) -> ContentUnit {
        ContentUnit::new(
            self.subject.extract(dom).trim(),
            self.body.extract(dom).trim(),
        )
    }
}

/// Identifier of a mounted view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ViewId(pub u64);

/// Scan banner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BannerView {
    pub fingerprint: Fingerprint,
    pub severity: Severity,
    pub label: VerdictLabel,
    pub score: f64,
    pub headline: String,
    pub reason_count: usize,
}

/// Detail overlay for the current verdict.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailView {
    pub label: VerdictLabel,
    pub score: f64,
    /// Verbatim, in the order the service supplied
    pub reasons: Vec<String>,
    pub matched_domains: Vec<String>,
}

/// Persistent per-domain DNS alert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DnsAlertView {
    pub domain: String,
    pub score: f64,
    pub reasons: Vec<String>,
}

/// Everything the engine asks the adapter to mount.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum View {
    Banner(BannerView),
    Detail(DetailView),
    DnsAlert(DnsAlertView),
}

impl View {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Banner(_) => "banner",
            Self::Detail(_) => "detail",
            Self::DnsAlert(_) => "dns_alert",
        }
    }
}

/// Host page operations used by the content context.
pub trait PageSurface: Send {
    /// Extract the currently displayed content unit.
    fn extract(&self) -> ContentUnit;

    /// Insert `view` at the insertion anchor.
    fn mount(&mut self, view: View) -> ViewId;

    /// Remove a view; unknown ids are ignored.
    fn remove(&mut self, id: ViewId);

    /// Whether `id` is still in the document.
    fn is_attached(&self, id: ViewId) -> bool;

    /// Start or stop structural-change notifications under the content root.
    fn observe_structure(&mut self, enabled: bool);
}

#[derive(Debug, Default)]
struct PageState {
    elements: HashMap<String, Vec<String>>,
    views: BTreeMap<ViewId, (Anchor, View)>,
    mounted: Vec<(ViewId, View)>,
    next_id: u64,
    observing: bool,
}

impl DomQuery for PageState {
    fn query_all(&self, selector: &str) -> Vec<String> {
        self.elements.get(selector).cloned().unwrap_or_default()
    }
}

/// In-memory page; clones share one document.
#[derive(Debug, Clone, Default)]
pub struct MemoryPage {
    state: Arc<Mutex<PageState>>,
    selectors: PageSelectors,
}

impl MemoryPage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the texts matched by `selector`.
    pub fn set_element(&self, selector: &str, texts: &[&str]) {
        let texts = texts.iter().map(|t| (*t).to_string()).collect();
        self.state().elements.insert(selector.to_string(), texts);
    }

    /// Show a message with the default subject/body selectors.
    pub fn show_message(&self, subject: &str, body: &str) {
        self.set_element(SUBJECT_SELECTORS[0], &[subject]);
        self.set_element(BODY_SELECTORS[0], &[body]);
    }

    /// Simulate the host re-rendering over a mounted view.
    pub fn detach(&self, id: ViewId) {
        self.state().views.remove(&id);
    }

    /// Views currently in the document.
    #[must_use]
    pub fn attached(&self) -> Vec<(ViewId, View)> {
        self.state()
            .views
            .iter()
            .map(|(id, (_, view))| (*id, view.clone()))
            .collect()
    }

    /// Attached views of one kind.
    #[must_use]
    pub fn attached_of(&self, kind: &str) -> Vec<View> {
        self.attached()
            .into_iter()
            .map(|(_, v)| v)
            .filter(|v| v.kind() == kind)
            .collect()
    }

    /// Every mount ever performed, in order.
    #[must_use]
    pub fn mount_log(&self) -> Vec<(ViewId, View)> {
        self.state().mounted.clone()
    }

    #[must_use]
    pub fn anchor_of(&self, id: ViewId) -> Option<Anchor> {
        self.state().views.get(&id).map(|(a, _)| a.clone())
    }

    #[must_use]
    pub fn is_observing(&self) -> bool {
        self.state().observing
    }
}

impl PageSurface for MemoryPage {
    fn extract(&self) -> ContentUnit {
        self.selectors.extract(&*self.state())
    }

    fn mount(&mut self, view: View) -> ViewId {
        let anchor = self.selectors.anchor.anchor(&*self.state());
        let mut state = self.state();
        state.next_id += 1;
        let id = ViewId(state.next_id);
        state.views.insert(id, (anchor, view.clone()));
        state.mounted.push((id, view));
        id
    }

    fn remove(&mut self, id: ViewId) {
        self.state().views.remove(&id);
    }

    fn is_attached(&self, id: ViewId) -> bool {
        self.state().views.contains_key(&id)
    }

    fn observe_structure(&mut self, enabled: bool) {
        self.state().observing = enabled;
    }
}
