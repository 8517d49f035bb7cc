//! CLI output formatting utilities.
//!
//! Colored JSON and small value formatters used by the tables.

use std::fmt::Write;

use colored::Colorize;
use serde_json::Value;

/// Prints JSON with syntax highlighting.
///
/// Colors:
/// - Keys: Cyan
/// - Strings: Green
/// - Numbers: Yellow
/// - Booleans/Null: Magenta
/// - Brackets/Braces: White (bold)
pub fn print_highlighted_json(value: &Value) { println!("{}", highlight_json(value)); }

/// Pretty-prints JSON with the colors of [`print_highlighted_json`].
/// Without colors the result equals `serde_json::to_string_pretty`.
#[must_use]
pub fn highlight_json(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value, 0);
    out
}

fn quoted(s: &str) -> String { serde_json::to_string(s).unwrap_or_else(|_| format!("\"{s}\"")) }

fn indent(out: &mut String, depth: usize) {
    out.push('\n');
    out.push_str(&"  ".repeat(depth));
}

fn write_value(out: &mut String, value: &Value, depth: usize) {
    let _ = match value {
        Value::Null => write!(out, "{}", "null".magenta()),
        Value::Bool(b) => write!(out, "{}", b.to_string().magenta()),
        Value::Number(n) => write!(out, "{}", n.to_string().yellow()),
        Value::String(s) => write!(out, "{}", quoted(s).green()),
        Value::Array(items) => {
            write_container(out, ('[', ']'), items.iter().map(|v| (None, v)), items.len(), depth);
            Ok(())
        }
        Value::Object(map) => {
            write_container(out, ('{', '}'), map.iter().map(|(k, v)| (Some(k), v)), map.len(), depth);
            Ok(())
        }
    };
}

fn write_container<'a>(
    out: &mut String,
    (open, close): (char, char),
    entries: impl Iterator<Item = (Option<&'a String>, &'a Value)>,
    len: usize,
    depth: usize,
) {
    let _ = write!(out, "{}", open.to_string().white().bold());
    if len > 0 {
        for (i, (key, value)) in entries.enumerate() {
            if i > 0 {
                let _ = write!(out, "{}", ",".white());
            }
            indent(out, depth + 1);
            if let Some(key) = key {
                let _ = write!(out, "{}{} ", quoted(key).cyan(), ":".white());
            }
            write_value(out, value, depth + 1);
        }
        indent(out, depth);
    }
    let _ = write!(out, "{}", close.to_string().white().bold());
}

/// Formats a depth band as `lo..hi` with two decimals.
#[must_use]
pub fn format_range([lo, hi]: [f32; 2]) -> String { format!("{lo:.2}..{hi:.2}") }

/// Formats a fraction in `[0, 1]` as a percentage.
#[must_use]
pub fn format_percent(fraction: f64) -> String { format!("{:.1}%", fraction * 100.0) }

/// Formats a boolean as a colored string.
#[must_use]
pub fn format_bool(value: bool) -> String {
    if value {
        "✓".green().to_string()
    } else {
        "✗".red().to_string()
    }
}
