use crate::criterion::AcceptanceCriterion;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const UNTITLED_FEATURE: &str = "Untitled Feature";

// ---------------------------------------------------------------------------
// Section
// ---------------------------------------------------------------------------

/// Optional `###` sections a feature may carry besides its description.
///
/// Variant order is the order sections are rendered in a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Requirements,
    OutOfScope,
    Notes,
    Context,
}

impl Section {
    pub fn all() -> &'static [Section] {
        &[
            Section::Requirements,
            Section::OutOfScope,
            Section::Notes,
            Section::Context,
        ]
    }

    /// Match a `###` heading title against the alias table, case-insensitively.
    pub fn from_heading(title: &str) -> Option<Section> {
        match title.trim().to_lowercase().as_str() {
            "requirements" => Some(Section::Requirements),
            "out of scope" | "out-of-scope" | "out_of_scope" => Some(Section::OutOfScope),
            "notes" => Some(Section::Notes),
            "context" => Some(Section::Context),
            _ => None,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Section::Requirements => "Requirements",
            Section::OutOfScope => "Out of Scope",
            Section::Notes => "Notes",
            Section::Context => "Context",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

// ---------------------------------------------------------------------------
// Feature
// ---------------------------------------------------------------------------

/// One `## Feature name` block of the backlog.
///
/// `raw_block == source[block_start_offset..=block_end_offset]` for the text
/// the feature was parsed from. Offsets are byte offsets on line boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    pub checked: bool,
    pub description: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub optional_sections: BTreeMap<Section, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub acceptance_criteria: Vec<AcceptanceCriterion>,
    pub raw_block: String,
    pub block_start_offset: usize,
    pub block_end_offset: usize,
    /// 1-based line of the `## Feature name` heading.
    pub line: usize,
}

impl Feature {
    /// Build a feature that is not backed by any document text. Used for
    /// prompt rendering and tests.
    pub fn detached(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            checked: false,
            description: description.into(),
            optional_sections: BTreeMap::new(),
            acceptance_criteria: Vec::new(),
            raw_block: String::new(),
            block_start_offset: 0,
            block_end_offset: 0,
            line: 0,
        }
    }

    pub fn section(&self, section: Section) -> Option<&str> {
        self.optional_sections.get(&section).map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Backlog
// ---------------------------------------------------------------------------

/// Immutable snapshot of one parse. Re-derived on every read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backlog {
    pub features: Vec<Feature>,
    pub warnings: Vec<String>,
}

impl Backlog {
    pub fn first_unchecked(&self) -> Option<&Feature> {
        self.features.iter().find(|f| !f.checked)
    }

    pub fn unchecked_count(&self) -> usize {
        self.features.iter().filter(|f| !f.checked).count()
    }
}

/// Result of probing the project for a usable backlog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BacklogStatus {
    Ok,
    Missing,
    NoFeatures,
}

impl BacklogStatus {
    /// Status of a parsed backlog, or `Missing` when there is none.
    pub fn of(backlog: Option<&Backlog>) -> Self {
        match backlog {
            None => BacklogStatus::Missing,
            Some(b) if b.first_unchecked().is_none() => BacklogStatus::NoFeatures,
            Some(_) => BacklogStatus::Ok,
        }
    }
}

impl fmt::Display for BacklogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BacklogStatus::Ok => "ok",
            BacklogStatus::Missing => "missing",
            BacklogStatus::NoFeatures => "no_features",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
