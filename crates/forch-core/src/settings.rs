use crate::error::{ForchError, Result};
use crate::paths;
use crate::skills::Skill;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

// ---------------------------------------------------------------------------
// SettingsWarning
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsWarning {
    pub key: String,
    pub message: String,
}

// ---------------------------------------------------------------------------
// CompletionBehavior
// ---------------------------------------------------------------------------

/// What happens to a feature's block once it passes verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionBehavior {
    CheckOff,
    RemoveFeature,
    #[default]
    MoveToCompleted,
}

impl CompletionBehavior {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CheckOff => "check_off",
            Self::RemoveFeature => "remove_feature",
            Self::MoveToCompleted => "move_to_completed",
        }
    }
}

impl fmt::Display for CompletionBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompletionBehavior {
    type Err = ForchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "check_off" => Ok(Self::CheckOff),
            "remove_feature" => Ok(Self::RemoveFeature),
            "move_to_completed" => Ok(Self::MoveToCompleted),
            other => Err(ForchError::InvalidSetting {
                key: "completion_behavior".to_string(),
                reason: format!(
                    "'{other}' is not one of check_off, remove_feature, move_to_completed"
                ),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

pub const DEFAULT_FEATURE_TEMPLATE: &str = "## Feature name
[ ] New feature

### Description
Describe what the feature should do.

### Requirements
- First requirement

### Out of Scope
- What this feature does not cover

### Acceptance Criteria
- File exists: path/to/file
- Command succeeds: echo ok
- Manual: Describe what to check by hand
";

pub const EMPTY_FEATURE_TEMPLATE: &str = "## Feature name
[ ] New feature

### Description

";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub completion_behavior: CompletionBehavior,
    #[serde(default = "default_true")]
    pub copy_prompt_to_clipboard: bool,
    #[serde(default = "default_true")]
    pub notify_on_handoff: bool,
    #[serde(default = "default_timeout")]
    pub command_timeout_seconds: u64,
    #[serde(default = "default_backlog_file")]
    pub backlog_file: String,
    #[serde(default = "default_completed_file")]
    pub completed_file: String,
    #[serde(default = "default_template")]
    pub feature_template: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content_roots: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skills_dir: Option<PathBuf>,
    /// Skills injected into prompts. `None` means every installed skill.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_skills: Option<Vec<String>>,
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> u64 {
    600
}

fn default_backlog_file() -> String {
    paths::BACKLOG_FILE.to_string()
}

fn default_completed_file() -> String {
    paths::COMPLETED_FILE.to_string()
}

fn default_template() -> String {
    DEFAULT_FEATURE_TEMPLATE.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            completion_behavior: CompletionBehavior::default(),
            copy_prompt_to_clipboard: default_true(),
            notify_on_handoff: default_true(),
            command_timeout_seconds: default_timeout(),
            backlog_file: default_backlog_file(),
            completed_file: default_completed_file(),
            feature_template: default_template(),
            content_roots: Vec::new(),
            skills_dir: None,
            selected_skills: None,
        }
    }
}

impl Settings {
    /// Defaults when no settings file exists yet.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::settings_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        let settings: Settings = serde_yaml::from_str(&data)?;
        Ok(settings)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::settings_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    /// Command timeout as a `Duration` for the executor.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_seconds.saturating_mul(1000))
    }

    /// Skills directory: the configured override or the global default.
    pub fn skills_dir(&self) -> Result<PathBuf> {
        match &self.skills_dir {
            Some(dir) => Ok(dir.clone()),
            None => paths::default_skills_dir(),
        }
    }

    /// Narrow `installed` to the selected skills, keeping catalogue order.
    pub fn selected(&self, installed: Vec<Skill>) -> Vec<Skill> {
        match &self.selected_skills {
            None => installed,
            Some(names) => installed
                .into_iter()
                .filter(|s| names.contains(&s.name))
                .collect(),
        }
    }

    pub fn is_skill_selected(&self, name: &str) -> bool {
        self.selected_skills
            .as_ref()
            .map_or(true, |names| names.iter().any(|n| n == name))
    }

    /// Add `name` to an explicit selection. A no-op while every skill is
    /// selected.
    pub fn select_skill(&mut self, name: &str) {
        if let Some(names) = &mut self.selected_skills {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
    }

    /// Drop `name` from the selection. When every skill was selected, the
    /// selection becomes `installed` minus `name`.
    pub fn unselect_skill(&mut self, name: &str, installed: &[Skill]) {
        let names = self
            .selected_skills
            .get_or_insert_with(|| installed.iter().map(|s| s.name.clone()).collect());
        names.retain(|n| n != name);
    }

    /// Update a single field from its string form, as typed on the CLI.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let invalid = |reason: String| ForchError::InvalidSetting {
            key: key.to_string(),
            reason,
        };
        match key {
            "completion_behavior" => self.completion_behavior = value.parse()?,
            "copy_prompt_to_clipboard" => {
                self.copy_prompt_to_clipboard = parse_bool(value).ok_or_else(|| {
                    invalid(format!("'{value}' is not a boolean"))
                })?
            }
            "notify_on_handoff" => {
                self.notify_on_handoff = parse_bool(value)
                    .ok_or_else(|| invalid(format!("'{value}' is not a boolean")))?
            }
            "command_timeout_seconds" => {
                self.command_timeout_seconds = value
                    .trim()
                    .parse()
                    .map_err(|_| invalid(format!("'{value}' is not a whole number of seconds")))?
            }
            "backlog_file" => self.backlog_file = value.to_string(),
            "completed_file" => self.completed_file = value.to_string(),
            "feature_template" => self.feature_template = value.to_string(),
            "content_roots" => {
                self.content_roots = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(PathBuf::from)
                    .collect()
            }
            "skills_dir" => {
                self.skills_dir = (!value.trim().is_empty()).then(|| PathBuf::from(value))
            }
            "selected_skills" => {
                self.selected_skills = match value.trim() {
                    "all" => None,
                    "none" => Some(Vec::new()),
                    list => Some(
                        list.split(',')
                            .map(str::trim)
                            .filter(|s| !s.is_empty())
                            .map(str::to_string)
                            .collect(),
                    ),
                }
            }
            _ => return Err(invalid("unknown setting".to_string())),
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<SettingsWarning> {
        let mut warnings = Vec::new();

        if self.command_timeout_seconds == 0 {
            warnings.push(SettingsWarning {
                key: "command_timeout_seconds".to_string(),
                message: "timeout of 0s makes every command criterion fail".to_string(),
            });
        }

        if !self.feature_template.contains("## Feature name") {
            warnings.push(SettingsWarning {
                key: "feature_template".to_string(),
                message: "template has no '## Feature name' heading; appended features will not parse"
                    .to_string(),
            });
        }

        if self.backlog_file.eq_ignore_ascii_case(&self.completed_file) {
            warnings.push(SettingsWarning {
                key: "completed_file".to_string(),
                message: format!(
                    "completed file '{}' is the backlog itself",
                    self.completed_file
                ),
            });
        }

        warnings
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
