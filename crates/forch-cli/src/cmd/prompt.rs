use super::{load_backlog, load_settings};
use crate::output::print_json;
use forch_core::{prompt, skills};
use std::path::Path;

/// Print the implementation prompt for the next unchecked feature.
pub fn run(root: &Path, with_skills: bool, json: bool) -> anyhow::Result<()> {
    let settings = load_settings(root)?;
    let backlog = load_backlog(root, &settings)?;

    let Some(feature) = backlog.first_unchecked() else {
        if json {
            return print_json(&serde_json::json!({ "feature": null, "prompt": null }));
        }
        println!("No unchecked features found in backlog.");
        return Ok(());
    };

    let skills = if with_skills {
        settings.selected(skills::load_skills(&settings.skills_dir()?))
    } else {
        Vec::new()
    };
    let text = prompt::generate(feature, &skills);

    if json {
        print_json(&serde_json::json!({
            "feature": feature.name,
            "prompt": text,
        }))
    } else {
        println!("{text}");
        Ok(())
    }
}
