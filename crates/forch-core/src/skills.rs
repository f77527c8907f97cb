//! Agent skills catalogue: directories holding a `SKILL.md` whose YAML
//! frontmatter names and describes the skill.

use crate::paths::SKILL_MANIFEST;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    pub description: String,
    /// Location of the skill's `SKILL.md`.
    pub path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct Frontmatter {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
}

/// Extract `name`/`description` from a `---` delimited frontmatter block.
/// Returns `None` when the block is absent, malformed, or has no name.
pub fn parse_frontmatter(content: &str) -> Option<(String, String)> {
    let rest = content.strip_prefix("---")?;
    let end = rest.find("\n---")?;
    let fm: Frontmatter = serde_yaml::from_str(&rest[..end]).ok()?;
    let name = fm.name.trim().to_string();
    if name.is_empty() {
        return None;
    }
    Some((name, fm.description.trim().to_string()))
}

/// Scan `dir` for `<skill>/SKILL.md` entries. A missing directory yields an
/// empty list; unreadable or unnamed skills are skipped.
pub fn load_skills(dir: &Path) -> Vec<Skill> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut skills: Vec<Skill> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .filter_map(|p| {
            let manifest = p.join(SKILL_MANIFEST);
            let content = std::fs::read_to_string(&manifest).ok()?;
            match parse_frontmatter(&content) {
                Some((name, description)) => Some(Skill {
                    name,
                    description,
                    path: manifest,
                }),
                None => {
                    tracing::debug!(path = %manifest.display(), "skipping skill without frontmatter name");
                    None
                }
            }
        })
        .collect();
    skills.sort_by(|a, b| a.name.cmp(&b.name));
    skills
}

/// True when `dir` is missing or has no entries.
pub fn is_empty_dir(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut it| it.next().is_none())
        .unwrap_or(true)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
