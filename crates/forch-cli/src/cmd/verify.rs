use super::{load_backlog, load_settings};
use crate::output::print_json;
use forch_core::verifier::{CancelFlag, VerificationResult, Verifier};
use std::path::Path;
use std::sync::Arc;

/// One verification pass over the next unchecked feature. Does not touch
/// the backlog; fails (exit 1) when any criterion fails.
pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let settings = load_settings(root)?;
    let backlog = load_backlog(root, &settings)?;
    let Some(feature) = backlog.first_unchecked() else {
        println!("No unchecked features found in backlog.");
        return Ok(());
    };

    let verifier = Arc::new(Verifier::for_project(
        root,
        settings.content_roots.clone(),
        settings.timeout(),
    ));
    let cancel = CancelFlag::new();
    let rt = tokio::runtime::Runtime::new()?;
    let report = rt.block_on(async {
        let on_interrupt = cancel.clone();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                on_interrupt.cancel();
            }
        });
        let report = verifier
            .spawn(feature.acceptance_criteria.clone(), cancel)
            .join()
            .await;
        interrupt.abort();
        report
    })?;

    if json {
        print_json(&serde_json::json!({
            "feature": feature.name,
            "report": report,
        }))?;
    } else {
        print_report(&feature.name, &report);
    }

    if !report.success {
        anyhow::bail!("verification of '{}' failed", feature.name);
    }
    Ok(())
}

pub fn print_report(feature: &str, report: &VerificationResult) {
    println!("Verifying: {feature}");
    for line in &report.details {
        for (i, part) in line.lines().enumerate() {
            let indent = if i == 0 { "  " } else { "      " };
            println!("{indent}{part}");
        }
    }
    for check in &report.manual_verifications {
        println!("  ? Manual check: {}", check.description);
    }
    println!(
        "Result: {}",
        if report.success { "PASSED" } else { "FAILED" }
    );
}
