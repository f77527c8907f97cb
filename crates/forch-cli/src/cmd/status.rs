use super::load_settings;
use crate::output::print_json;
use anyhow::Context;
use forch_core::store::{BacklogStore, FileBacklogStore};
use forch_core::types::BacklogStatus;
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let settings = load_settings(root)?;
    let store = FileBacklogStore::new(root, &settings);
    let backlog = store.parse().context("failed to read backlog")?;

    let status = BacklogStatus::of(backlog.as_ref());
    let next = backlog.as_ref().and_then(|b| b.first_unchecked());
    let warnings: &[String] = backlog.as_ref().map(|b| b.warnings.as_slice()).unwrap_or(&[]);
    let unchecked = backlog.as_ref().map(|b| b.unchecked_count()).unwrap_or(0);
    let total = backlog.as_ref().map(|b| b.features.len()).unwrap_or(0);

    if json {
        let value = serde_json::json!({
            "status": status,
            "backlog": store.find(),
            "features": total,
            "unchecked": unchecked,
            "next": next.map(|f| serde_json::json!({
                "name": f.name,
                "line": f.line,
                "criteria": f.acceptance_criteria,
            })),
            "warnings": warnings,
        });
        return print_json(&value);
    }

    match store.find() {
        Some(path) => println!("Backlog:   {} ({status})", path.display()),
        None => {
            println!("Backlog:   {} not found", settings.backlog_file);
            println!("Run `forch init` to create it from the feature template.");
            return Ok(());
        }
    }
    println!("Features:  {total} ({unchecked} unchecked)");
    match next {
        Some(f) => {
            println!("Next:      {} (line {})", f.name, f.line);
            if f.acceptance_criteria.is_empty() {
                println!("           no acceptance criteria; completion needs confirmation");
            }
            for c in &f.acceptance_criteria {
                println!("           - {}", c.label());
            }
        }
        None => println!("Next:      (none)"),
    }
    for w in warnings {
        println!("warning: {w}");
    }
    Ok(())
}
