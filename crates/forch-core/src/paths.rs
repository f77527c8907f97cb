use crate::error::{ForchError, Result};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const FORCH_DIR: &str = ".forch";
pub const SETTINGS_FILE: &str = ".forch/settings.yaml";

pub const BACKLOG_FILE: &str = "BACKLOG.md";
pub const COMPLETED_FILE: &str = "COMPLETED.md";

pub const SKILL_MANIFEST: &str = "SKILL.md";
pub const SKILLS_SUBDIR: &str = "forch/skills";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn forch_dir(root: &Path) -> PathBuf {
    root.join(FORCH_DIR)
}

pub fn settings_path(root: &Path) -> PathBuf {
    root.join(SETTINGS_FILE)
}

/// Locate the backlog under `root`, accepting the configured name or its
/// lowercase spelling.
pub fn find_backlog(root: &Path, file_name: &str) -> Option<PathBuf> {
    let exact = root.join(file_name);
    if exact.is_file() {
        return Some(exact);
    }
    let lower = root.join(file_name.to_lowercase());
    if lower.is_file() {
        return Some(lower);
    }
    None
}

/// Global skills directory: `<data dir>/forch/skills`.
pub fn default_skills_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|d| d.join(SKILLS_SUBDIR))
        .ok_or(ForchError::DataDirNotFound)
}

/// True when `path` lies inside `root`. Both sides are compared as given;
/// callers pass absolute paths.
pub fn is_inside(root: &Path, path: &Path) -> bool {
    path.starts_with(root)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
