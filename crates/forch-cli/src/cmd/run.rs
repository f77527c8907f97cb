//! Interactive session: hand off the next feature, then verify, reset or
//! complete it from the keyboard until the user quits.

use super::load_settings;
use crate::handoff::TerminalSink;
use anyhow::Context;
use forch_core::orchestrator::{
    Controller, OrchestratorListener, OrchestratorState, RunOutcome, VerifyOutcome,
};
use forch_core::types::Feature;
use forch_core::verifier::CancelFlag;
use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const HELP: &str = "commands: [v]erify  [c]omplete  [r]eset  [n]ext  [f]iles  [q]uit  (Ctrl-C cancels a running verification, otherwise quits)";

/// Exit status after an interrupt outside a verification pass.
const INTERRUPTED: i32 = 130;

/// Prints controller activity to the terminal and asks yes/no questions on
/// stdin.
struct ConsoleListener;

impl OrchestratorListener for ConsoleListener {
    fn on_state_changed(&mut self, state: OrchestratorState) {
        println!("[{state}]");
    }

    fn on_log(&mut self, message: &str) {
        println!("  {message}");
    }

    fn on_prompt_generated(&mut self, prompt: &str) {
        println!("\n----- prompt -----\n{prompt}\n------------------\n");
    }

    fn on_completion(&mut self, success: bool) {
        if success {
            println!("Feature completed. Press n for the next one.");
        } else {
            println!("Feature failed. Press n to start over or r to reset.");
        }
    }

    fn confirm_completion_without_criteria(&mut self, feature: &Feature) -> bool {
        let question = format!(
            "Feature '{}' has no acceptance criteria. Mark it complete? [y/N] ",
            feature.name
        );
        matches!(ask(&question).as_deref(), Some("y" | "yes"))
    }
}

/// Prompt on stdout and read one trimmed, lowercased line. `None` on EOF.
fn ask(question: &str) -> Option<String> {
    print!("{question}");
    let _ = std::io::stdout().flush();
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim().to_lowercase()),
    }
}

pub fn run(root: &Path) -> anyhow::Result<()> {
    let settings = load_settings(root)?;
    let rt = tokio::runtime::Runtime::new()?;
    let mut controller = Controller::for_project(root, settings)
        .with_listener(Box::new(ConsoleListener))
        .with_sink(Box::new(TerminalSink::detect()));

    let verifying = Arc::new(AtomicBool::new(false));
    watch_interrupts(&rt, controller.cancel_handle(), Arc::clone(&verifying))?;

    controller.validate_backlog().context("failed to read backlog")?;
    if !start_next(&mut controller)? {
        return Ok(());
    }
    println!("{HELP}");

    loop {
        let changed = controller.refresh_change_count();
        let question = format!("{} | {changed} file(s) changed > ", controller.state());
        let Some(input) = ask(&question) else {
            break;
        };
        match input.as_str() {
            "v" | "verify" => {
                verifying.store(true, Ordering::SeqCst);
                let outcome = rt.block_on(controller.verify_now());
                verifying.store(false, Ordering::SeqCst);
                let outcome = outcome?;
                if outcome == VerifyOutcome::NoSession {
                    println!("Nothing to verify. Press n to start the next feature.");
                }
            }
            "c" | "complete" => {
                controller.complete_feature()?;
            }
            "r" | "reset" => controller.reset()?,
            "f" | "files" => match controller.session() {
                Some(session) => {
                    let paths = session.changed_files().snapshot();
                    if paths.is_empty() {
                        println!("No files changed since handoff.");
                    }
                    for path in paths {
                        let shown = path.strip_prefix(root).unwrap_or(&path);
                        println!("  {}", shown.display());
                    }
                }
                None => println!("No feature in progress."),
            },
            "n" | "next" => {
                if !controller.state().can_start() {
                    println!("A feature is already in progress; verify, complete or reset it first.");
                    continue;
                }
                if !start_next(&mut controller)? {
                    break;
                }
            }
            "q" | "quit" | "exit" => break,
            "" => {}
            _ => println!("{HELP}"),
        }
    }
    Ok(())
}

/// One SIGINT listener for the whole session: during a verification pass it
/// cancels the pass, otherwise it ends the process.
fn watch_interrupts(
    rt: &tokio::runtime::Runtime,
    cancel: CancelFlag,
    verifying: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    #[cfg(unix)]
    let mut interrupts = {
        let _guard = rt.enter();
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
            .context("failed to install Ctrl-C handler")?
    };

    rt.spawn(async move {
        loop {
            #[cfg(unix)]
            let received = interrupts.recv().await.is_some();
            #[cfg(not(unix))]
            let received = tokio::signal::ctrl_c().await.is_ok();
            if !received {
                break;
            }
            if verifying.load(Ordering::SeqCst) {
                cancel.cancel();
            } else {
                println!();
                std::process::exit(INTERRUPTED);
            }
        }
    });
    Ok(())
}

/// `false` when there is nothing left to hand off.
fn start_next(controller: &mut Controller) -> anyhow::Result<bool> {
    match controller.run_next_feature()? {
        RunOutcome::HandedOff { .. } => Ok(true),
        RunOutcome::NothingToDo => {
            println!("All features are done.");
            Ok(false)
        }
        RunOutcome::NoBacklog => {
            println!("Run `forch init` to create a backlog.");
            Ok(false)
        }
    }
}
