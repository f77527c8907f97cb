//! Backlog persistence and in-place mutation of single feature blocks.
//!
//! Mutations never re-serialize the document: they splice the bytes at a
//! feature's recorded offsets after checking those bytes are still the
//! feature's raw block.

use crate::error::{ForchError, Result};
use crate::io::{append_block, atomic_write};
use crate::parser;
use crate::paths;
use crate::settings::{CompletionBehavior, Settings, EMPTY_FEATURE_TEMPLATE};
use crate::types::{Backlog, Feature, UNTITLED_FEATURE};
use std::path::{Path, PathBuf};

const BACKLOG_HEADER: &str = "# Backlog\n\n";
const COMPLETED_HEADER: &str = "# Completed Features\n\n";
const SEPARATOR: &str = "---";

pub trait BacklogStore: Send {
    /// Location of the backlog, if one exists.
    fn find(&self) -> Option<PathBuf>;
    fn read(&self) -> Result<String>;
    fn write(&self, text: &str) -> Result<()>;
    fn create_template(&self) -> Result<()>;
    fn append_template(&self) -> Result<()>;
    fn append_empty(&self) -> Result<()>;
    /// Apply `behavior` to `feature`'s block. Fails without touching the
    /// document when the block is no longer where it was parsed.
    fn apply_completion(&self, feature: &Feature, behavior: CompletionBehavior) -> Result<()>;

    /// Fresh parse, or `None` when there is no backlog.
    fn parse(&self) -> Result<Option<Backlog>> {
        if self.find().is_none() {
            return Ok(None);
        }
        Ok(Some(parser::parse(&self.read()?)))
    }
}

// ---------------------------------------------------------------------------
// FileBacklogStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FileBacklogStore {
    root: PathBuf,
    backlog_file: String,
    completed_file: String,
    template: String,
}

impl FileBacklogStore {
    pub fn new(root: &Path, settings: &Settings) -> Self {
        Self {
            root: root.to_path_buf(),
            backlog_file: settings.backlog_file.clone(),
            completed_file: settings.completed_file.clone(),
            template: settings.feature_template.clone(),
        }
    }

    fn target(&self) -> PathBuf {
        self.find()
            .unwrap_or_else(|| self.root.join(&self.backlog_file))
    }

    fn completed_path(&self) -> PathBuf {
        self.root.join(&self.completed_file)
    }

    fn append_feature(&self, block: &str) -> Result<()> {
        let existing = match self.find() {
            Some(path) => std::fs::read_to_string(path)?,
            None => BACKLOG_HEADER.to_string(),
        };
        let addition = if parser::parse(&existing).features.is_empty() {
            block.to_string()
        } else {
            format!("{SEPARATOR}\n\n{block}")
        };
        self.write(&append_block(&existing, &addition))
    }
}

impl BacklogStore for FileBacklogStore {
    fn find(&self) -> Option<PathBuf> {
        paths::find_backlog(&self.root, &self.backlog_file)
    }

    fn read(&self) -> Result<String> {
        let path = self
            .find()
            .ok_or_else(|| ForchError::BacklogNotFound(self.backlog_file.clone()))?;
        Ok(std::fs::read_to_string(path)?)
    }

    fn write(&self, text: &str) -> Result<()> {
        atomic_write(&self.target(), text.as_bytes())
    }

    fn create_template(&self) -> Result<()> {
        let text = format!("{BACKLOG_HEADER}{}", self.template.trim_end());
        self.write(&format!("{text}\n"))
    }

    fn append_template(&self) -> Result<()> {
        self.append_feature(&self.template)
    }

    fn append_empty(&self) -> Result<()> {
        self.append_feature(EMPTY_FEATURE_TEMPLATE)
    }

    fn apply_completion(&self, feature: &Feature, behavior: CompletionBehavior) -> Result<()> {
        let text = self.read()?;
        locate(&text, feature)?;
        let start = feature.block_start_offset;
        let end = feature.block_end_offset;

        match behavior {
            CompletionBehavior::CheckOff => {
                let updated = format!(
                    "{}{}{}",
                    &text[..start],
                    check_off_block(&feature.raw_block),
                    &text[end + 1..]
                );
                self.write(&updated)?;
            }
            CompletionBehavior::RemoveFeature => {
                self.write(&remove_span(&text, start, end))?;
            }
            CompletionBehavior::MoveToCompleted => {
                let path = self.completed_path();
                let existing = if path.exists() {
                    std::fs::read_to_string(&path)?
                } else {
                    COMPLETED_HEADER.to_string()
                };
                let block = check_off_block(&feature.raw_block);
                atomic_write(&path, append_block(&existing, &block).as_bytes())?;
                self.write(&remove_span(&text, start, end))?;
            }
        }
        tracing::info!(feature = %feature.name, %behavior, "backlog updated");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Splicing
// ---------------------------------------------------------------------------

/// Confirm `text` still holds `feature.raw_block` at the recorded offsets.
pub fn locate(text: &str, feature: &Feature) -> Result<()> {
    let start = feature.block_start_offset;
    let end = feature.block_end_offset;
    let found = (start <= end)
        .then(|| text.get(start..=end))
        .flatten();
    if found != Some(feature.raw_block.as_str()) {
        return Err(ForchError::OffsetMismatch {
            feature: feature.name.clone(),
            start,
            end,
        });
    }
    Ok(())
}

/// Mark the title line of a raw block as checked, adding a checkbox or a
/// whole title line when they are missing.
pub fn check_off_block(raw: &str) -> String {
    let mut lines: Vec<String> = raw.split('\n').map(str::to_string).collect();
    let title_idx = lines
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, l)| !l.trim().is_empty())
        .map(|(i, _)| i);

    let is_title = |line: &str| {
        let t = line.trim_start();
        !t.starts_with("###") && !t.starts_with("## ") && !t.starts_with(SEPARATOR)
    };

    match title_idx {
        Some(i) if is_title(&lines[i]) => {
            let line = &lines[i];
            let indent_len = line.len() - line.trim_start().len();
            let (indent, rest) = line.split_at(indent_len);
            let updated = match rest.get(..3) {
                Some("[ ]") | Some("[x]") | Some("[X]") => format!("{indent}[x]{}", &rest[3..]),
                _ => format!("{indent}[x] {rest}"),
            };
            lines[i] = updated;
        }
        _ => {
            let cr = if lines[0].ends_with('\r') { "\r" } else { "" };
            lines.insert(1, format!("[x] {UNTITLED_FEATURE}{cr}"));
        }
    }
    lines.join("\n")
}

/// Remove `text[start..=end]`, the line break after it, and a `---`
/// separator line that directly follows. When the block was the last one,
/// the separator directly before it goes instead.
pub fn remove_span(text: &str, start: usize, end: usize) -> String {
    let mut after = end + 1;
    if text[after..].starts_with('\n') {
        after += 1;
    }
    let rest = &text[after..];
    let line_end = rest.find('\n').map(|i| i + 1).unwrap_or(rest.len());
    if is_separator(&rest[..line_end]) {
        after += line_end;
    } else if rest.trim().is_empty() {
        let before = text[..start].trim_end();
        let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
        if is_separator(&before[line_start..]) {
            return format!("{}\n", before[..line_start].trim_end());
        }
    }
    format!("{}{}", &text[..start], &text[after..])
}

fn is_separator(line: &str) -> bool {
    let line = line.trim();
    line.len() >= 3 && line.chars().all(|c| c == '-')
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
