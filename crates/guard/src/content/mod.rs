//! Per-page scanning: extraction, dedup, banner and DNS alert views.

pub mod banner;
pub mod context;
pub mod deduper;
pub mod dns;
pub mod fingerprint;
pub mod page;
pub mod terminal;

pub use banner::{BannerLifecycle, Reconcile, Severity};
pub use context::{ContentContext, ContentEvent, ContentHandle, ContentTimings};
pub use deduper::{ContentDeduper, ScanTicket};
pub use dns::DnsAlertPresenter;
pub use fingerprint::Fingerprint;
pub use page::{
    Anchor, DomQuery, MemoryPage, PageSelectors, PageSurface, SelectorChain, View, ViewId,
};
pub use terminal::TerminalPage;
