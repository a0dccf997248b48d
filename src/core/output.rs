//! Compact output rendering helpers for CLI surfaces.
//!
//! Keeps command result output bounded and readable while preserving signal.

use crate::core::pass::RunSummary;
use colored::Colorize;

/// Error lines shown under a summary before eliding the rest.
pub const MAX_ERROR_LINES: usize = 5;
pub const MAX_LINE_CHARS: usize = 200;

/// Collapse newlines/extra whitespace and bound length for terminal display.
pub fn compact_line(input: &str, max_chars: usize) -> String {
    let collapsed = input.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut chars = collapsed.chars();
    let preview: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", preview)
    } else {
        preview
    }
}

/// Up to `max_items` compacted messages, plus a `(+N more)` line when cut.
pub fn preview_messages(messages: &[String], max_items: usize, max_chars: usize) -> Vec<String> {
    let mut lines: Vec<String> = messages
        .iter()
        .take(max_items)
        .map(|m| compact_line(m, max_chars))
        .collect();
    if messages.len() > max_items {
        lines.push(format!("(+{} more)", messages.len() - max_items));
    }
    lines
}

/// `processed N, <verb> M, errors E`
pub fn summary_line(processed: usize, verb: &str, changed: usize, errors: usize) -> String {
    format!("processed {}, {} {}, errors {}", processed, verb, changed, errors)
}

pub fn print_run_summary(summary: &RunSummary) {
    let glyph = if summary.errors == 0 {
        "✓".bright_green()
    } else {
        "⚠".bright_yellow()
    };
    let mode = if summary.dry_run { " (dry run)" } else { "" };
    println!(
        "{} {}{}",
        glyph,
        summary_line(summary.processed, &summary.verb, summary.changed, summary.errors),
        mode
    );
    print_error_preview(&summary.error_messages());
}

pub fn print_error_preview(messages: &[String]) {
    for line in preview_messages(messages, MAX_ERROR_LINES, MAX_LINE_CHARS) {
        println!("  {} {}", "✗".bright_red(), line);
    }
}
