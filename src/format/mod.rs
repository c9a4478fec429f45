//! Output formatting for `lijo`.
//!
//! Supports both human-readable text output and machine-parseable JSON.
//! JSON mode sends clean JSON to stdout with diagnostics to stderr.

use crate::error::{LijoError, Result};
use crate::model::{ListItem, TaskListWithCount, format_millis};
use serde::Serialize;

/// Output mode determining formatting strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// One line per record.
    #[default]
    Plain,
    /// Pretty JSON documents.
    Json,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OutputContext {
    mode: OutputMode,
}

impl OutputContext {
    #[must_use]
    pub const fn from_flags(json: bool) -> Self {
        Self {
            mode: if json {
                OutputMode::Json
            } else {
                OutputMode::Plain
            },
        }
    }

    #[must_use]
    pub const fn is_json(&self) -> bool {
        matches!(self.mode, OutputMode::Json)
    }

    /// Print `value` as JSON, or the text produced by `text`.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce() -> String) -> Result<()> {
        match self.mode {
            OutputMode::Json => println!("{}", serde_json::to_string_pretty(value)?),
            OutputMode::Plain => {
                let text = text();
                if !text.is_empty() {
                    println!("{text}");
                }
            }
        }
        Ok(())
    }
}

/// `#RRGGBB` for opaque colors, `#AARRGGBB` otherwise.
#[must_use]
pub fn format_color(argb: i64) -> String {
    let argb = argb & 0xFFFF_FFFF;
    if argb >> 24 == 0xFF {
        format!("#{:06X}", argb & 0x00FF_FFFF)
    } else {
        format!("#{argb:08X}")
    }
}

/// Parse `#RRGGBB`, `#AARRGGBB` (the `#` is optional) or a decimal ARGB value.
///
/// Six hex digits are treated as fully opaque. Bare digits are read as decimal.
///
/// # Errors
///
/// Returns a validation error for anything else.
pub fn parse_color(raw: &str) -> Result<i64> {
    let trimmed = raw.trim();
    let invalid = || {
        LijoError::validation(
            "color",
            format!("expected #RRGGBB, #AARRGGBB or an integer, got {raw:?}"),
        )
    };

    if let Some(hex) = trimmed.strip_prefix('#') {
        return parse_hex_color(hex).ok_or_else(invalid);
    }
    if let Ok(value) = trimmed.parse::<i64>() {
        return if (0..=0xFFFF_FFFF).contains(&value) {
            Ok(value)
        } else {
            Err(invalid())
        };
    }
    parse_hex_color(trimmed).ok_or_else(invalid)
}

fn parse_hex_color(hex: &str) -> Option<i64> {
    let value = i64::from_str_radix(hex, 16).ok()?;
    match hex.len() {
        6 => Some(0xFF00_0000 | value),
        8 => Some(value),
        _ => None,
    }
}

#[must_use]
pub fn format_list_line(entry: &TaskListWithCount) -> String {
    let list = &entry.list;
    let mut line = format!(
        "{:>4}  {}  ({} item{})",
        list.id,
        list.name,
        entry.item_count,
        if entry.item_count == 1 { "" } else { "s" }
    );
    if let Some(icon) = &list.icon {
        line.push_str(&format!("  [{icon}]"));
    }
    if let Some(color) = list.color {
        line.push_str(&format!("  {}", format_color(color)));
    }
    line
}

#[must_use]
pub fn format_item_line(item: &ListItem) -> String {
    let mark = if item.is_completed { 'x' } else { ' ' };
    let mut line = format!("{:>4}  [{mark}] {}", item.id, item.title);
    if let Some(done) = item.completed_at {
        line.push_str(&format!("  (done {})", format_millis(done)));
    }
    line
}

#[must_use]
pub fn format_lines<T>(rows: &[T], empty: &str, line: impl Fn(&T) -> String) -> String {
    if rows.is_empty() {
        return empty.to_string();
    }
    rows.iter().map(line).collect::<Vec<_>>().join("\n")
}
