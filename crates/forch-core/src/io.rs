use crate::error::Result;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Atomically write `data` to `path` using a tempfile in the same directory.
/// A crash mid-write leaves the previous backlog intact.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Create a directory and all parents, idempotent.
pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)?;
    Ok(())
}

/// Join `existing` and `addition` so the addition starts on its own line,
/// separated by exactly one blank line.
pub fn append_block(existing: &str, addition: &str) -> String {
    let trimmed = existing.trim_end_matches(['\n', '\r']);
    if trimmed.is_empty() {
        return format!("{}\n", addition.trim_end());
    }
    format!("{trimmed}\n\n{}\n", addition.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("BACKLOG.md");
        atomic_write(&path, b"# Backlog").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# Backlog");
    }

    #[test]
    fn atomic_write_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/settings.yaml");
        atomic_write(&path, b"data").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn append_block_separates_with_blank_line() {
        assert_eq!(append_block("a\n\n\n", "b"), "a\n\nb\n");
        assert_eq!(append_block("", "b\n"), "b\n");
    }
}
