use super::load_settings;
use crate::output::{print_json, print_table, truncate};
use crate::skills_fetch::{SkillsFetcher, DEFAULT_API_URL};
use anyhow::Context;
use clap::Subcommand;
use forch_core::settings::Settings;
use forch_core::skills::{self, Skill};
use std::path::Path;

#[derive(Subcommand)]
pub enum SkillsSubcommand {
    /// List installed skills
    List,

    /// Fetch the public skills catalogue into the skills directory
    Download {
        /// Download even when the directory already has content
        #[arg(long)]
        force: bool,

        /// Contents API endpoint listing the skills
        #[arg(long, env = "FORCH_SKILLS_URL", default_value = DEFAULT_API_URL, hide = true)]
        source: String,
    },

    /// Include an installed skill in prompts
    Select { name: String },

    /// Leave an installed skill out of prompts
    Unselect { name: String },
}

pub fn run(root: &Path, subcmd: SkillsSubcommand, json: bool) -> anyhow::Result<()> {
    let mut settings = load_settings(root)?;
    let dir = settings.skills_dir()?;

    match subcmd {
        SkillsSubcommand::List => {
            let found = skills::load_skills(&dir);
            if json {
                return print_json(&found);
            }
            println!("Skills directory: {}", dir.display());
            let rows: Vec<Vec<String>> = found
                .iter()
                .map(|s| {
                    let mark = if settings.is_skill_selected(&s.name) { "x" } else { " " };
                    vec![mark.to_string(), s.name.clone(), truncate(&s.description, 60)]
                })
                .collect();
            print_table(&["SELECTED", "NAME", "DESCRIPTION"], &rows);
            Ok(())
        }
        SkillsSubcommand::Download { force, source } => {
            let fetcher = SkillsFetcher::new(source);
            let report = if force {
                Some(fetcher.download_all(&dir)?)
            } else {
                fetcher.download_if_empty(&dir)?
            };

            if json {
                return print_json(&serde_json::json!({
                    "dir": dir,
                    "skipped": report.is_none(),
                    "report": report,
                }));
            }
            match report {
                None => println!(
                    "{} already has skills; use --force to download again.",
                    dir.display()
                ),
                Some(r) => {
                    println!("Downloaded {} skill(s) into {}", r.downloaded.len(), dir.display());
                    for name in &r.failed {
                        println!("  failed: {name}");
                    }
                }
            }
            Ok(())
        }
        SkillsSubcommand::Select { name } => {
            let installed = skills::load_skills(&dir);
            ensure_installed(&installed, &name, &dir)?;
            settings.select_skill(&name);
            save_selection(root, &settings, &name, json)
        }
        SkillsSubcommand::Unselect { name } => {
            let installed = skills::load_skills(&dir);
            ensure_installed(&installed, &name, &dir)?;
            settings.unselect_skill(&name, &installed);
            save_selection(root, &settings, &name, json)
        }
    }
}

fn ensure_installed(installed: &[Skill], name: &str, dir: &Path) -> anyhow::Result<()> {
    if !installed.iter().any(|s| s.name == name) {
        anyhow::bail!("no skill named '{name}' in {}", dir.display());
    }
    Ok(())
}

fn save_selection(root: &Path, settings: &Settings, name: &str, json: bool) -> anyhow::Result<()> {
    settings
        .save(root)
        .context("failed to write .forch/settings.yaml")?;
    let selected = settings.is_skill_selected(name);
    if json {
        return print_json(&serde_json::json!({
            "skill": name,
            "selected": selected,
            "selected_skills": settings.selected_skills,
        }));
    }
    let verb = if selected { "selected" } else { "unselected" };
    println!("{verb}: {name}");
    Ok(())
}
