//! Page surface that prints mounted views to the terminal.

use std::collections::BTreeSet;

use colored::Colorize;
use detection::ContentUnit;

use super::banner::Severity;
use super::page::{PageSurface, View, ViewId};

/// A fixed content unit "displayed" on stdout.
#[derive(Debug)]
pub struct TerminalPage {
    unit: ContentUnit,
    attached: BTreeSet<ViewId>,
    next_id: u64,
}

impl TerminalPage {
    #[must_use]
    pub fn new(unit: ContentUnit) -> Self {
        Self {
            unit,
            attached: BTreeSet::new(),
            next_id: 0,
        }
    }
}

/// Human-readable rendering of a view.
#[must_use]
pub fn render(view: &View) -> String {
    match view {
        View::Banner(banner) => {
            let tag = format!("[{}]", banner.severity.as_str().to_uppercase());
            let tag = match banner.severity {
                Severity::High => tag.red().bold(),
                Severity::Medium => tag.yellow().bold(),
                Severity::Low => tag.green().bold(),
            };
            format!(
                "{tag} {} (score {:.2}, {} reason{})",
                banner.headline.bold(),
                banner.score,
                banner.reason_count,
                if banner.reason_count == 1 { "" } else { "s" }
            )
        }
        View::Detail(detail) => {
            let mut out = format!("{} {:.2}", detail.label.as_str().bold(), detail.score);
            for reason in &detail.reasons {
                out.push_str(&format!("\n  - {reason}"));
            }
            if !detail.matched_domains.is_empty() {
                out.push_str(&format!(
                    "\n  {} {}",
                    "DNS alerts:".dimmed(),
                    detail.matched_domains.join(", ")
                ));
            }
            out
        }
        View::DnsAlert(alert) => format!(
            "{} {} ({:.2})",
            "DNS ALERT".red().bold(),
            alert.domain,
            alert.score
        ),
    }
}

impl PageSurface for TerminalPage {
    fn extract(&self) -> ContentUnit {
        self.unit.clone()
    }

    fn mount(&mut self, view: View) -> ViewId {
        self.next_id += 1;
        let id = ViewId(self.next_id);
        println!("{}", render(&view));
        self.attached.insert(id);
        id
    }

    fn remove(&mut self, id: ViewId) {
        self.attached.remove(&id);
    }

    fn is_attached(&self, id: ViewId) -> bool {
        self.attached.contains(&id)
    }

    fn observe_structure(&mut self, _enabled: bool) {}
}
