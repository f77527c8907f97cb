//! Tolerant line-oriented parser for the backlog document.
//!
//! Grammar, one feature per block:
//!
//! ```text
//! ## Feature name
//! [ ] Title of the feature
//!
//! ### Description
//! Free text.
//!
//! ### Requirements | Out of Scope | Notes | Context
//! Free text.
//!
//! ### Acceptance Criteria
//! - File exists: path/to/file
//! - Command succeeds: cargo test
//!
//! ---
//! ```
//!
//! A block ends at the next feature heading, a `---` separator, or end of
//! input. Malformed input never aborts the parse; it becomes a warning
//! prefixed with the block's starting line.

use crate::criterion::parse_criteria;
use crate::types::{Backlog, Feature, Section, UNTITLED_FEATURE};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

static FEATURE_RE: OnceLock<Regex> = OnceLock::new();
static SECTION_RE: OnceLock<Regex> = OnceLock::new();
static SEPARATOR_RE: OnceLock<Regex> = OnceLock::new();
static NAME_RE: OnceLock<Regex> = OnceLock::new();

fn feature_re() -> &'static Regex {
    FEATURE_RE.get_or_init(|| Regex::new(r"^ {0,3}## +Feature name\s*$").unwrap())
}

fn section_re() -> &'static Regex {
    SECTION_RE.get_or_init(|| Regex::new(r"^ {0,3}### +(.+?)\s*$").unwrap())
}

fn separator_re() -> &'static Regex {
    SEPARATOR_RE.get_or_init(|| Regex::new(r"^ {0,3}---+\s*$").unwrap())
}

fn name_re() -> &'static Regex {
    NAME_RE.get_or_init(|| Regex::new(r"^(?:\[([ xX])\]\s*)?(.*)$").unwrap())
}

/// One physical line. `text` has the line terminator (and any `\r`)
/// removed; `start..end` spans the line in the source excluding `\n`.
struct Line<'a> {
    text: &'a str,
    start: usize,
    end: usize,
}

fn split_lines(source: &str) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    let mut start = 0;
    for raw in source.split('\n') {
        let end = start + raw.len();
        lines.push(Line {
            text: raw.strip_suffix('\r').unwrap_or(raw),
            start,
            end,
        });
        start = end + 1;
    }
    lines
}

fn is_feature(line: &Line<'_>) -> bool {
    feature_re().is_match(line.text)
}

fn is_separator(line: &Line<'_>) -> bool {
    separator_re().is_match(line.text)
}

fn section_title<'a>(line: &Line<'a>) -> Option<&'a str> {
    section_re()
        .captures(line.text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

fn is_boundary(line: &Line<'_>) -> bool {
    is_feature(line) || is_separator(line) || section_title(line).is_some()
}

fn is_criteria_heading(title: &str) -> bool {
    matches!(
        title.to_lowercase().as_str(),
        "acceptance criteria" | "acceptance-criteria" | "acceptance_criteria"
    )
}

fn warning(line_index: usize, msg: &str) -> String {
    format!("[line {}] {msg}", line_index + 1)
}

/// Parse backlog text into features and warnings. Never fails.
pub fn parse(source: &str) -> Backlog {
    let lines = split_lines(source);
    let mut features = Vec::new();
    let mut warnings = Vec::new();

    let mut i = 0;
    while i < lines.len() {
        if !is_feature(&lines[i]) {
            i += 1;
            continue;
        }
        let block_start = i;
        i += 1;
        skip_blank(&lines, &mut i);

        let mut name = UNTITLED_FEATURE.to_string();
        let mut checked = false;
        if i < lines.len() && !is_boundary(&lines[i]) {
            let caps = name_re().captures(lines[i].text.trim());
            let title = caps
                .as_ref()
                .and_then(|c| c.get(2))
                .map(|m| m.as_str().trim())
                .unwrap_or("");
            if title.is_empty() {
                warnings.push(warning(
                    block_start,
                    "Invalid feature name line. Using default.",
                ));
            } else {
                checked = caps
                    .as_ref()
                    .and_then(|c| c.get(1))
                    .is_some_and(|m| m.as_str().eq_ignore_ascii_case("x"));
                name = title.to_string();
            }
            i += 1;
        }

        skip_blank(&lines, &mut i);

        let has_description = i < lines.len()
            && section_title(&lines[i]).is_some_and(|t| t.eq_ignore_ascii_case("description"));
        if !has_description {
            warnings.push(warning(
                block_start,
                &format!("Missing '### Description' section. Skipping feature '{name}'."),
            ));
            while i < lines.len() && !is_feature(&lines[i]) {
                i += 1;
            }
            continue;
        }
        i += 1;
        let description = take_body(&lines, &mut i);

        let mut optional_sections = BTreeMap::new();
        let mut acceptance_criteria = Vec::new();
        while i < lines.len() && !is_feature(&lines[i]) && !is_separator(&lines[i]) {
            let Some(title) = section_title(&lines[i]) else {
                i += 1;
                continue;
            };
            i += 1;
            let body_start = i;
            let body = take_body(&lines, &mut i);
            if let Some(section) = Section::from_heading(title) {
                optional_sections.insert(section, body);
            } else if is_criteria_heading(title) {
                let (criteria, rejected) =
                    parse_criteria(lines[body_start..i].iter().map(|l| l.text));
                acceptance_criteria.extend(criteria);
                warnings.extend(
                    rejected
                        .iter()
                        .map(|msg| warning(block_start, &format!("{msg} (feature '{name}')"))),
                );
            } else {
                warnings.push(warning(
                    block_start,
                    &format!("Unknown section '### {title}' in feature '{name}'. Ignored."),
                ));
            }
        }

        let block_end = i.saturating_sub(1).max(block_start);
        let start = lines[block_start].start;
        let end_exclusive = lines[block_end].end;
        features.push(Feature {
            name,
            checked,
            description,
            optional_sections,
            acceptance_criteria,
            raw_block: source[start..end_exclusive].to_string(),
            block_start_offset: start,
            block_end_offset: end_exclusive - 1,
            line: block_start + 1,
        });
    }

    for w in &warnings {
        tracing::debug!(warning = %w, "backlog parse warning");
    }

    Backlog { features, warnings }
}

fn skip_blank(lines: &[Line<'_>], i: &mut usize) {
    while *i < lines.len() && lines[*i].text.trim().is_empty() {
        *i += 1;
    }
}

/// Consume lines up to the next boundary and return them joined and trimmed.
fn take_body(lines: &[Line<'_>], i: &mut usize) -> String {
    let start = *i;
    while *i < lines.len() && !is_boundary(&lines[*i]) {
        *i += 1;
    }
    lines[start..*i]
        .iter()
        .map(|l| l.text)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
