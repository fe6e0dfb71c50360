//! Result ordering and fixed-width report rendering

use crate::{
    models::Target,
    types::{Carrier, UnreachablePolicy},
};
use std::fmt::Write as _;
use unicode_width::UnicodeWidthStr;

/// What an unreachable target shows in the latency column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentinel {
    /// Fixed text such as `N/A`
    Text(&'static str),
    /// Placeholder millisecond value
    Millis(u64),
}

/// Column layout of one report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportLayout {
    /// Display width the label is padded to
    pub label_width: usize,
    /// Entries per output line
    pub per_row: usize,
    pub sentinel: Sentinel,
    /// Start a new block, separated by a blank line, whenever the carrier changes
    pub group_by_carrier: bool,
}

impl ReportLayout {
    pub const ISP: ReportLayout = ReportLayout {
        label_width: 16,
        per_row: 3,
        sentinel: Sentinel::Text("N/A"),
        group_by_carrier: true,
    };

    pub const RELAY: ReportLayout = ReportLayout {
        label_width: 20,
        per_row: 3,
        sentinel: Sentinel::Millis(9999),
        group_by_carrier: false,
    };

    pub const WEB: ReportLayout = ReportLayout {
        label_width: 20,
        per_row: 3,
        sentinel: Sentinel::Millis(999),
        group_by_carrier: false,
    };
}

/// Pad `label` with spaces to `width` display columns
///
/// CJK characters count as two columns. Labels already wider than `width`
/// are left as they are.
pub fn pad_label(label: &str, width: usize) -> String {
    let padding = width.saturating_sub(UnicodeWidthStr::width(label));
    format!("{}{}", label, " ".repeat(padding))
}

/// Latency column text, right-aligned to four characters
pub fn latency_cell(target: &Target, sentinel: Sentinel) -> String {
    if target.is_reachable() {
        return format!("{:>4}", target.measured_latency.as_millis());
    }
    match sentinel {
        Sentinel::Text(text) => format!("{:>4}", text),
        Sentinel::Millis(ms) => format!("{:>4}", ms),
    }
}

/// Sort ascending by latency with unreachable targets last, or drop them
///
/// The sort is stable, so equal latencies keep their incoming order.
pub fn sort_targets(mut targets: Vec<Target>, policy: UnreachablePolicy) -> Vec<Target> {
    if policy == UnreachablePolicy::Drop {
        targets.retain(Target::is_reachable);
    }
    targets.sort_by_key(|t| (!t.is_reachable(), t.measured_latency));
    targets
}

/// Render already ordered targets as `label | latency` cells
pub fn render(targets: &[Target], layout: &ReportLayout) -> String {
    let mut out = String::new();
    let mut in_row = 0usize;
    let mut current_carrier: Option<Carrier> = None;

    for (index, target) in targets.iter().enumerate() {
        if layout.group_by_carrier && index > 0 && target.carrier != current_carrier {
            out.push_str("\n\n");
            in_row = 0;
        } else if in_row > 0 && in_row % layout.per_row == 0 {
            out.push('\n');
        }
        current_carrier = target.carrier;

        let _ = write!(
            out,
            "{}{} | ",
            pad_label(&target.label, layout.label_width),
            latency_cell(target, layout.sentinel)
        );
        in_row += 1;
    }
    out
}

/// Orders each group and renders the concatenation
#[derive(Debug, Clone, Copy)]
pub struct ResultAggregator {
    policy: UnreachablePolicy,
}

impl ResultAggregator {
    pub fn new(policy: UnreachablePolicy) -> Self {
        Self { policy }
    }

    /// Order every group on its own, then join them in the given order
    pub fn order_groups(&self, groups: Vec<Vec<Target>>) -> Vec<Target> {
        groups
            .into_iter()
            .flat_map(|group| sort_targets(group, self.policy))
            .collect()
    }

    /// Ordered, rendered report for one or more groups
    pub fn aggregate(&self, groups: Vec<Vec<Target>>, layout: &ReportLayout) -> String {
        render(&self.order_groups(groups), layout)
    }
}
