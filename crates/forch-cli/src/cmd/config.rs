use super::load_settings;
use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print the effective settings
    Show,

    /// Change one setting
    Set {
        /// Setting name, e.g. completion_behavior
        key: String,
        /// New value; lists are comma separated
        value: String,
    },

    /// Check the settings for common mistakes
    Validate,
}

pub fn run(root: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show => show(root, json),
        ConfigSubcommand::Set { key, value } => set(root, &key, &value, json),
        ConfigSubcommand::Validate => validate(root, json),
    }
}

fn show(root: &Path, json: bool) -> anyhow::Result<()> {
    let settings = load_settings(root)?;
    if json {
        return print_json(&settings);
    }
    print!("{}", serde_yaml::to_string(&settings)?);
    Ok(())
}

fn set(root: &Path, key: &str, value: &str, json: bool) -> anyhow::Result<()> {
    let mut settings = load_settings(root)?;
    settings.set(key, value)?;
    settings
        .save(root)
        .context("failed to write .forch/settings.yaml")?;
    let warnings = settings.validate();

    if json {
        return print_json(&serde_json::json!({
            "key": key,
            "value": value,
            "warnings": warnings,
        }));
    }
    println!("{key} = {value}");
    for w in &warnings {
        println!("[warning] {}: {}", w.key, w.message);
    }
    Ok(())
}

fn validate(root: &Path, json: bool) -> anyhow::Result<()> {
    let settings = load_settings(root)?;
    let warnings = settings.validate();

    if json {
        print_json(&serde_json::json!({ "warnings": warnings }))?;
    } else if warnings.is_empty() {
        println!("Settings are valid. No warnings.");
    } else {
        for w in &warnings {
            println!("[warning] {}: {}", w.key, w.message);
        }
    }
    Ok(())
}
