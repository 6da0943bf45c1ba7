use std::sync::LazyLock;

use chart_types::ParsedFields;
use regex::{Captures, Regex};
use thiserror::Error;

use crate::normalize::coerce_count;

/// Why a chart line produced no record. Always carries the offending line.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ParseFailure {
    #[error("line does not match the chart grammar: {line:?}")]
    LineGrammarMismatch { line: String },
    #[error("{field} value {value:?} is not a count: {line:?}")]
    NumericCoercionFailure {
        line: String,
        field: &'static str,
        value: String,
    },
}

impl ParseFailure {
    pub fn line(&self) -> &str {
        match self {
            ParseFailure::LineGrammarMismatch { line }
            | ParseFailure::NumericCoercionFailure { line, .. } => line,
        }
    }
}

// Columns are positional: an absent rank/prev/unknown still leaves its separator.
static CHART_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^\(?\**(?P<rank>[0-9,.]+)?[()\-]*\**\)?[ \t]+",
        r"\(?\**(?P<prev_rank>[0-9,.]+)?-*\**\)?[ \t]+",
        r"\**(?P<unknown>[0-9,.]+)?-*\**\)?[ \t]+",
        r"\**(?P<sales>[0-9,.]+)[ \t]+",
        r"[*,]*(?P<cumulative_sales>[0-9,.]+)[ \t]+",
        r"\**(?P<weeks>[0-9]+)[ \t]+",
        r"(?P<title>.+)$",
    ))
    .expect("chart line grammar compiles")
});

/// Split one chart line into its positional columns.
///
/// Decorations around numbers (`*`, `(`, `)`, `-`) are dropped, grouping
/// separators are stripped before coercion, and empty leading columns come
/// back as `None`.
pub fn parse_line(line: &str) -> Result<ParsedFields, ParseFailure> {
    let line = line.trim_end();
    let caps = CHART_LINE
        .captures(line)
        .ok_or_else(|| ParseFailure::LineGrammarMismatch {
            line: line.to_string(),
        })?;

    let raw_title = caps
        .name("title")
        .map(|m| m.as_str().trim())
        .unwrap_or_default();
    if raw_title.is_empty() {
        return Err(ParseFailure::LineGrammarMismatch {
            line: line.to_string(),
        });
    }

    Ok(ParsedFields {
        rank: count(&caps, "rank", line)?,
        prev_rank: count(&caps, "prev_rank", line)?,
        unknown: count(&caps, "unknown", line)?,
        sales: count(&caps, "sales", line)?,
        cumulative_sales: count(&caps, "cumulative_sales", line)?,
        weeks: count(&caps, "weeks", line)?,
        raw_title: raw_title.to_string(),
    })
}

fn count<T: TryFrom<u64>>(
    caps: &Captures<'_>,
    field: &'static str,
    line: &str,
) -> Result<Option<T>, ParseFailure> {
    let Some(m) = caps.name(field) else {
        return Ok(None);
    };
    coerce_count(m.as_str())
        .and_then(|v| T::try_from(v).ok())
        .map(Some)
        .ok_or_else(|| ParseFailure::NumericCoercionFailure {
            line: line.to_string(),
            field,
            value: m.as_str().to_string(),
        })
}
