//! Report output
//!
//! Probed targets are ordered and rendered as fixed-width `label | latency`
//! cells, three per line. Console decorations (banner, section rules) live in
//! [`colored`].

mod colored;
mod formatter;

pub use colored::{ColorScheme, ConsoleStyle};
pub use formatter::{latency_cell, pad_label, render, sort_targets, ReportLayout, ResultAggregator, Sentinel};

use crate::types::ReportMode;

/// Layout used for a report mode's result table
pub fn layout_for(mode: ReportMode) -> ReportLayout {
    match mode {
        ReportMode::Isp | ReportMode::Global => ReportLayout::ISP,
        ReportMode::Relay => ReportLayout::RELAY,
        ReportMode::Web => ReportLayout::WEB,
    }
}
