//! Colored console decorations around the reports

use crate::stats::ReportSummary;
use colored::{Color, ColoredString, Colorize};

/// Color scheme for the console decorations
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub header: Color,
    pub link: Color,
    pub success: Color,
    pub muted: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            header: Color::Cyan,
            link: Color::Blue,
            success: Color::Green,
            muted: Color::BrightBlack,
        }
    }
}

/// Banner, section headers and completion line
#[derive(Debug, Clone)]
pub struct ConsoleStyle {
    enable_color: bool,
    color_scheme: ColorScheme,
}

impl ConsoleStyle {
    pub fn new(enable_color: bool) -> Self {
        Self {
            enable_color: enable_color && Self::supports_color(),
            color_scheme: ColorScheme::default(),
        }
    }

    /// Style that never emits escape codes
    pub fn plain() -> Self {
        Self { enable_color: false, color_scheme: ColorScheme::default() }
    }

    /// Check if terminal supports colors
    pub fn supports_color() -> bool {
        std::env::var("NO_COLOR").is_err() && std::env::var("TERM").map(|term| term != "dumb").unwrap_or(true)
    }

    fn colorize(&self, text: &str, color: Color) -> ColoredString {
        if self.enable_color {
            text.color(color)
        } else {
            text.normal()
        }
    }

    /// Project line printed at startup
    pub fn banner(&self, name: &str, version: &str, url: &str) -> String {
        format!("{} v{}  {}", name, version, self.colorize(url, self.color_scheme.link))
    }

    /// Ruled header for one section of global mode
    pub fn section_header(&self, index: usize, total: usize, title: &str) -> String {
        let rule = "=".repeat(80);
        format!(
            "\n{}\n{}\n{}",
            self.colorize(&rule, self.color_scheme.muted),
            self.colorize(&format!("{}/{} {}", index, total, title), self.color_scheme.header),
            self.colorize(&rule, self.color_scheme.muted)
        )
    }

    pub fn completion(&self) -> String {
        format!("\n{}\n", self.colorize("All tests completed!", self.color_scheme.success))
    }

    /// One-line digest of a finished report
    pub fn summary_line(&self, summary: &ReportSummary) -> String {
        let fastest = summary
            .fastest_ms
            .map(|ms| format!("{:.0}ms", ms))
            .unwrap_or_else(|| "-".to_string());
        let text = format!(
            "{}/{} reachable ({:.1}%), fastest {}",
            summary.reachable,
            summary.total,
            summary.success_rate(),
            fastest
        );
        self.colorize(&text, self.color_scheme.muted).to_string()
    }
}
