//! Mirror of the public skills repository, fetched through the GitHub
//! contents API.

use anyhow::Context;
use forch_core::{io, skills};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.github.com/repos/anthropics/skills/contents/skills";

#[derive(Debug, Deserialize)]
struct Entry {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    url: String,
    #[serde(default)]
    download_url: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct DownloadReport {
    pub downloaded: Vec<String>,
    pub failed: Vec<String>,
}

pub struct SkillsFetcher {
    api_url: String,
    agent: ureq::Agent,
}

impl SkillsFetcher {
    pub fn new(api_url: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("forch/", env!("CARGO_PKG_VERSION")))
            .build();
        Self {
            api_url: api_url.into(),
            agent,
        }
    }

    /// Mirror every skill directory into `dest`. A skill that fails to
    /// download is logged and skipped; only a failed top-level listing is
    /// an error.
    pub fn download_all(&self, dest: &Path) -> anyhow::Result<DownloadReport> {
        let entries = self
            .list(&self.api_url)
            .with_context(|| format!("failed to list skills at {}", self.api_url))?;
        io::ensure_dir(dest)?;

        let mut report = DownloadReport::default();
        for entry in entries.into_iter().filter(|e| e.kind == "dir") {
            if !is_safe_name(&entry.name) {
                tracing::warn!(name = %entry.name, "skipping skill with unsafe name");
                continue;
            }
            match self.mirror_dir(&entry.url, &dest.join(&entry.name)) {
                Ok(files) => {
                    tracing::info!(skill = %entry.name, files, "skill downloaded");
                    report.downloaded.push(entry.name);
                }
                Err(e) => {
                    let error = format!("{e:#}");
                    tracing::warn!(skill = %entry.name, %error, "skill download failed");
                    report.failed.push(entry.name);
                }
            }
        }
        Ok(report)
    }

    /// Download only when `dest` is missing or empty.
    pub fn download_if_empty(&self, dest: &Path) -> anyhow::Result<Option<DownloadReport>> {
        if !skills::is_empty_dir(dest) {
            return Ok(None);
        }
        self.download_all(dest).map(Some)
    }

    fn list(&self, url: &str) -> anyhow::Result<Vec<Entry>> {
        let entries = self
            .agent
            .get(url)
            .set("Accept", "application/vnd.github+json")
            .call()?
            .into_json()?;
        Ok(entries)
    }

    fn mirror_dir(&self, url: &str, dest: &Path) -> anyhow::Result<usize> {
        io::ensure_dir(dest)?;
        let mut files = 0;
        for entry in self.list(url)? {
            if !is_safe_name(&entry.name) {
                continue;
            }
            let target = dest.join(&entry.name);
            match (entry.kind.as_str(), entry.download_url) {
                ("file", Some(download)) => {
                    let bytes = self.fetch(&download)?;
                    io::atomic_write(&target, &bytes)?;
                    files += 1;
                }
                ("dir", _) => files += self.mirror_dir(&entry.url, &target)?,
                _ => tracing::debug!(name = %entry.name, kind = %entry.kind, "skipping entry"),
            }
        }
        Ok(files)
    }

    fn fetch(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.agent
            .get(url)
            .call()?
            .into_reader()
            .read_to_end(&mut bytes)
            .with_context(|| format!("failed to read {url}"))?;
        Ok(bytes)
    }
}

impl Default for SkillsFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

fn is_safe_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}
