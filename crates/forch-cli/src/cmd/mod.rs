pub mod add;
pub mod config;
pub mod init;
pub mod list;
pub mod prompt;
pub mod run;
pub mod skills;
pub mod status;
pub mod verify;

use anyhow::Context;
use forch_core::settings::Settings;
use forch_core::store::{BacklogStore, FileBacklogStore};
use forch_core::types::Backlog;
use std::path::Path;

pub fn load_settings(root: &Path) -> anyhow::Result<Settings> {
    Settings::load(root).context("failed to load .forch/settings.yaml")
}

/// Parse the backlog, failing when it does not exist.
pub fn load_backlog(root: &Path, settings: &Settings) -> anyhow::Result<Backlog> {
    FileBacklogStore::new(root, settings)
        .parse()
        .context("failed to read backlog")?
        .with_context(|| {
            format!(
                "{} not found in {}; run `forch init` to create one",
                settings.backlog_file,
                root.display()
            )
        })
}
