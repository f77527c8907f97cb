use super::{load_backlog, load_settings};
use crate::output::{print_json, print_table, truncate};
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let settings = load_settings(root)?;
    let backlog = load_backlog(root, &settings)?;

    if json {
        return print_json(&backlog);
    }

    let rows: Vec<Vec<String>> = backlog
        .features
        .iter()
        .map(|f| {
            vec![
                if f.checked { "[x]" } else { "[ ]" }.to_string(),
                f.name.clone(),
                f.acceptance_criteria.len().to_string(),
                f.line.to_string(),
                truncate(&f.description, 50),
            ]
        })
        .collect();
    print_table(&["DONE", "FEATURE", "CRITERIA", "LINE", "DESCRIPTION"], &rows);

    for w in &backlog.warnings {
        eprintln!("warning: {w}");
    }
    Ok(())
}
