use super::load_settings;
use crate::output::print_json;
use anyhow::Context;
use forch_core::orchestrator::Controller;
use std::path::Path;

/// Append the feature template (or an empty stub) to the backlog, creating
/// it when missing.
pub fn run(root: &Path, empty: bool, json: bool) -> anyhow::Result<()> {
    let settings = load_settings(root)?;
    let backlog_file = settings.backlog_file.clone();
    let mut controller = Controller::for_project(root, settings);

    let status = if empty {
        controller.add_empty_feature()
    } else {
        controller.create_or_update_backlog()
    }
    .with_context(|| format!("failed to update {backlog_file}"))?;

    if json {
        return print_json(&serde_json::json!({ "status": status }));
    }
    println!(
        "Added {} feature to {backlog_file}.",
        if empty { "an empty" } else { "a template" }
    );
    Ok(())
}
