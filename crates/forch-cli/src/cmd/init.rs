use super::load_settings;
use anyhow::Context;
use forch_core::settings::Settings;
use forch_core::store::{BacklogStore, FileBacklogStore};
use forch_core::{io, paths};
use std::path::Path;

pub fn run(root: &Path) -> anyhow::Result<()> {
    println!("Initializing forch in: {}", root.display());

    let dir = paths::forch_dir(root);
    io::ensure_dir(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let settings_path = paths::settings_path(root);
    if settings_path.exists() {
        println!("  exists:  {}", paths::SETTINGS_FILE);
    } else {
        Settings::default()
            .save(root)
            .context("failed to write settings.yaml")?;
        println!("  created: {}", paths::SETTINGS_FILE);
    }

    let settings = load_settings(root)?;
    let store = FileBacklogStore::new(root, &settings);
    match store.find() {
        Some(path) => println!("  exists:  {}", path.display()),
        None => {
            store
                .create_template()
                .context("failed to create backlog")?;
            println!("  created: {}", settings.backlog_file);
        }
    }
    Ok(())
}
