use super::listener::{HandoffSink, NullListener, NullSink, OrchestratorListener};
use super::machine::{self, Effect, Event, OrchestratorState};
use super::session::ExecutionSession;
use crate::error::{ForchError, Result};
use crate::monitor::{ChangeFeed, NotifyFeed};
use crate::prompt;
use crate::settings::Settings;
use crate::skills::{self, Skill};
use crate::store::{BacklogStore, FileBacklogStore};
use crate::types::{Backlog, BacklogStatus, Feature};
use crate::verifier::{CancelFlag, VerificationResult, Verifier};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    NoBacklog,
    NothingToDo,
    HandedOff { feature: String, prompt: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VerifyOutcome {
    /// Nothing to verify; no feature is in progress.
    NoSession,
    Completed {
        #[serde(skip_serializing_if = "Option::is_none")]
        report: Option<VerificationResult>,
    },
    /// Criteria failed; `prompt` is the corrective prompt.
    Retry {
        prompt: String,
        report: VerificationResult,
    },
    Cancelled,
    Failed { reason: String },
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Owns the orchestration state and the single active session. All
/// transitions go through [`machine::transition`]; a verification pass runs
/// on the blocking pool and its result is applied here once it returns.
pub struct Controller {
    root: PathBuf,
    settings: Settings,
    store: Box<dyn BacklogStore>,
    verifier: Arc<Verifier>,
    feed: Arc<dyn ChangeFeed>,
    sink: Box<dyn HandoffSink>,
    listener: Box<dyn OrchestratorListener>,
    skills: Vec<Skill>,
    state: OrchestratorState,
    session: Option<ExecutionSession>,
    cancel: CancelFlag,
    last_failure: Option<String>,
}

impl Controller {
    pub fn new(
        root: impl Into<PathBuf>,
        settings: Settings,
        store: Box<dyn BacklogStore>,
        verifier: Arc<Verifier>,
    ) -> Self {
        Self {
            root: root.into(),
            settings,
            store,
            verifier,
            feed: Arc::new(NotifyFeed),
            sink: Box::new(NullSink),
            listener: Box::new(NullListener),
            skills: Vec::new(),
            state: OrchestratorState::Idle,
            session: None,
            cancel: CancelFlag::new(),
            last_failure: None,
        }
    }

    /// File-backed store, shell verifier, filesystem watcher and the
    /// selected skills from the configured skills directory.
    pub fn for_project(root: &Path, settings: Settings) -> Self {
        let store = FileBacklogStore::new(root, &settings);
        let verifier = Verifier::for_project(root, settings.content_roots.clone(), settings.timeout());
        let skills = match settings.skills_dir() {
            Ok(dir) => settings.selected(skills::load_skills(&dir)),
            Err(e) => {
                tracing::debug!(error = %e, "no skills directory");
                Vec::new()
            }
        };
        Self::new(root, settings, Box::new(store), Arc::new(verifier)).with_skills(skills)
    }

    pub fn with_listener(mut self, listener: Box<dyn OrchestratorListener>) -> Self {
        self.listener = listener;
        self
    }

    pub fn with_sink(mut self, sink: Box<dyn HandoffSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_feed(mut self, feed: Arc<dyn ChangeFeed>) -> Self {
        self.feed = feed;
        self
    }

    pub fn with_skills(mut self, skills: Vec<Skill>) -> Self {
        self.skills = skills;
        self
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    pub fn session(&self) -> Option<&ExecutionSession> {
        self.session.as_ref()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn skills(&self) -> &[Skill] {
        &self.skills
    }

    /// Shared flag; cancelling it stops the running pass between criteria.
    pub fn cancel_handle(&self) -> CancelFlag {
        self.cancel.clone()
    }

    // -----------------------------------------------------------------------
    // Backlog
    // -----------------------------------------------------------------------

    /// Re-read the backlog and publish its status and the next feature.
    pub fn validate_backlog(&mut self) -> Result<BacklogStatus> {
        let backlog = self.store.parse()?;
        let status = BacklogStatus::of(backlog.as_ref());
        self.listener.on_backlog_status(status);
        self.listener
            .on_feature_preview(backlog.as_ref().and_then(Backlog::first_unchecked));
        Ok(status)
    }

    /// Create the backlog from the template, or append the template to an
    /// existing one.
    pub fn create_or_update_backlog(&mut self) -> Result<BacklogStatus> {
        if self.store.find().is_some() {
            self.store.append_template()?;
            self.info("Appended feature template to backlog.");
        } else {
            self.store.create_template()?;
            self.info(format!("Created {} from template.", self.settings.backlog_file));
        }
        self.validate_backlog()
    }

    pub fn add_empty_feature(&mut self) -> Result<BacklogStatus> {
        self.store.append_empty()?;
        self.info("Appended empty feature to backlog.");
        self.validate_backlog()
    }

    // -----------------------------------------------------------------------
    // Run
    // -----------------------------------------------------------------------

    /// Select the first unchecked feature and hand its prompt off. A missing
    /// backlog or an empty queue leaves state and session untouched.
    pub fn run_next_feature(&mut self) -> Result<RunOutcome> {
        machine::transition(self.state, Event::Start)?;

        let Some(backlog) = self.store.parse()? else {
            self.warn(format!(
                "{} not found. Create it in the project root.",
                self.settings.backlog_file
            ));
            self.listener.on_backlog_status(BacklogStatus::Missing);
            return Ok(RunOutcome::NoBacklog);
        };
        for warning in &backlog.warnings {
            self.warn(warning);
        }

        let Some(feature) = backlog.first_unchecked().cloned() else {
            self.info("No unchecked features found in backlog.");
            self.listener.on_backlog_status(BacklogStatus::NoFeatures);
            self.listener.on_feature_preview(None);
            return Ok(RunOutcome::NothingToDo);
        };

        self.listener.on_backlog_status(BacklogStatus::Ok);
        self.listener.on_feature_preview(Some(&feature));
        self.info(format!("Starting feature: {}", feature.name));

        let prompt = prompt::generate(&feature, &self.skills);
        self.fire(Event::Start, Some(&feature))?;
        self.listener.on_prompt_generated(&prompt);
        self.hand_off(&prompt, &format!("Prompt for '{}' is ready.", feature.name));
        self.fire(Event::PromptDelivered, None)?;
        self.set_status("Waiting for the AI agent.");
        self.info("Waiting for the AI agent. Verify when it is done.");

        Ok(RunOutcome::HandedOff {
            feature: feature.name,
            prompt,
        })
    }

    // -----------------------------------------------------------------------
    // Verify
    // -----------------------------------------------------------------------

    /// Verify the active feature. Every pass re-runs all criteria.
    pub async fn verify_now(&mut self) -> Result<VerifyOutcome> {
        let Some(feature) = self.session.as_ref().map(|s| s.feature.clone()) else {
            tracing::debug!("verify requested with no active session");
            return Ok(VerifyOutcome::NoSession);
        };
        self.fire(Event::Verify, None)?;
        self.set_status("Verifying...");

        if feature.acceptance_criteria.is_empty() {
            if self.listener.confirm_completion_without_criteria(&feature) {
                self.info("Completing feature without acceptance criteria.");
                self.fire(Event::Accepted, None)?;
                return Ok(self.completion_outcome(None));
            }
            let reason = "Completion without acceptance criteria declined.".to_string();
            self.warn(&reason);
            self.fire(Event::Declined, None)?;
            return Ok(VerifyOutcome::Failed { reason });
        }

        self.info("Validating implementation...");
        let task = self
            .verifier
            .spawn(feature.acceptance_criteria.clone(), self.cancel.clone());

        match task.join().await {
            Ok(report) => {
                for line in &report.details {
                    self.info(line);
                }
                for check in &report.manual_verifications {
                    self.info(format!("Manual check pending: {}", check.description));
                }
                if report.success {
                    self.info("Validation successfully completed.");
                    self.fire(Event::Accepted, None)?;
                    Ok(self.completion_outcome(Some(report)))
                } else {
                    self.warn("Validation failed.");
                    let prompt = prompt::generate_failure(&feature, &report.failures);
                    self.listener.on_prompt_generated(&prompt);
                    self.hand_off(
                        &prompt,
                        &format!("Corrective prompt for '{}' is ready.", feature.name),
                    );
                    self.fire(Event::Rejected, None)?;
                    self.set_status("Waiting for the AI agent to fix failures.");
                    Ok(VerifyOutcome::Retry { prompt, report })
                }
            }
            Err(ForchError::Cancelled) => {
                self.cancel.reset();
                self.warn("Verification cancelled.");
                self.fire(Event::Cancelled, None)?;
                Ok(VerifyOutcome::Cancelled)
            }
            Err(e) => {
                let reason = format!("Verification failed with exception: {e}");
                tracing::error!(error = %e, "verification crashed");
                self.listener.on_log(&format!("ERROR: {reason}"));
                self.fire(Event::Crashed, None)?;
                Ok(VerifyOutcome::Failed { reason })
            }
        }
    }

    /// Apply the completion policy without verifying. Uses the active
    /// session's feature, or the first unchecked one when idle.
    pub fn complete_feature(&mut self) -> Result<VerifyOutcome> {
        let feature = match &self.session {
            Some(s) => Some(s.feature.clone()),
            None => self
                .store
                .parse()?
                .and_then(|b| b.first_unchecked().cloned()),
        };
        let Some(feature) = feature else {
            self.info("No unchecked features found in backlog.");
            return Ok(VerifyOutcome::NoSession);
        };
        self.fire(Event::CompleteRequested, Some(&feature))?;
        Ok(self.completion_outcome(None))
    }

    /// Back to IDLE from anywhere, ending any session.
    pub fn reset(&mut self) -> Result<()> {
        self.fire(Event::Reset, None)?;
        self.listener.on_change_count(0);
        self.listener.on_clear_prompt();
        self.info("Orchestrator reset.");
        if let Err(e) = self.validate_backlog() {
            tracing::debug!(error = %e, "backlog check after reset failed");
        }
        Ok(())
    }

    /// Publish the current changed-file count. Informational only.
    pub fn refresh_change_count(&mut self) -> usize {
        let count = self
            .session
            .as_ref()
            .map(ExecutionSession::changed_file_count)
            .unwrap_or(0);
        self.listener.on_change_count(count);
        count
    }

    // -----------------------------------------------------------------------
    // Transitions and effects
    // -----------------------------------------------------------------------

    fn fire(&mut self, event: Event, feature: Option<&Feature>) -> Result<()> {
        let t = machine::transition(self.state, event)?;
        tracing::debug!(from = %self.state, to = %t.next, %event, "transition");
        if t.next != self.state {
            self.state = t.next;
            self.listener.on_state_changed(t.next);
        }
        for effect in t.effects {
            self.perform(effect, feature)?;
        }
        Ok(())
    }

    fn perform(&mut self, effect: Effect, feature: Option<&Feature>) -> Result<()> {
        match effect {
            Effect::OpenSession => {
                if let Some(feature) = feature {
                    self.session = Some(ExecutionSession::new(feature.clone()));
                }
            }
            Effect::StartMonitoring => self.start_monitoring(),
            Effect::ApplyCompletion => self.apply_completion()?,
            Effect::EndSession => self.end_session(),
            Effect::ClearLog => self.listener.on_clear_log(),
            Effect::ReportCompletion { success } => self.listener.on_completion(success),
        }
        Ok(())
    }

    fn start_monitoring(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match self.feed.subscribe(&self.root, session.changed_files().sink()) {
            Ok(sub) => session.attach(sub),
            Err(e) => self.warn(format!("File monitoring unavailable: {e}")),
        }
    }

    fn end_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.stop_monitoring();
        }
    }

    fn apply_completion(&mut self) -> Result<()> {
        let Some(feature) = self.session.as_ref().map(|s| s.feature.clone()) else {
            self.last_failure = Some("No active feature to complete.".to_string());
            return self.fire(Event::CompletionFailed, None);
        };
        let behavior = self.settings.completion_behavior;
        match self.store.apply_completion(&feature, behavior) {
            Ok(()) => {
                self.fire(Event::CompletionApplied, None)?;
                self.info(format!("Feature '{}' completed ({behavior}).", feature.name));
                self.listener.on_clear_prompt();
                self.listener.on_change_count(0);
                if let Err(e) = self.validate_backlog() {
                    tracing::debug!(error = %e, "backlog check after completion failed");
                }
            }
            Err(e) => {
                let reason = format!("Failed to update backlog: {e}");
                self.warn(&reason);
                self.last_failure = Some(reason);
                self.fire(Event::CompletionFailed, None)?;
            }
        }
        Ok(())
    }

    fn completion_outcome(&mut self, report: Option<VerificationResult>) -> VerifyOutcome {
        match self.state {
            OrchestratorState::Completed => VerifyOutcome::Completed { report },
            _ => VerifyOutcome::Failed {
                reason: self
                    .last_failure
                    .take()
                    .unwrap_or_else(|| "completion failed".to_string()),
            },
        }
    }

    fn hand_off(&mut self, prompt: &str, note: &str) {
        if self.settings.copy_prompt_to_clipboard {
            match self.sink.copy_to_clipboard(prompt) {
                Ok(()) => self.info("Prompt copied to clipboard."),
                Err(e) => self.warn(format!("Could not copy prompt to clipboard: {e}")),
            }
        }
        if self.settings.notify_on_handoff {
            if let Err(e) = self.sink.notify(note) {
                self.warn(format!("Could not send notification: {e}"));
            }
        }
    }

    fn set_status(&mut self, message: &str) {
        if let Some(session) = self.session.as_mut() {
            session.status_message = message.to_string();
        }
    }

    fn info(&mut self, message: impl AsRef<str>) {
        let message = message.as_ref();
        tracing::info!("{message}");
        self.listener.on_log(message);
    }

    fn warn(&mut self, message: impl AsRef<str>) {
        let message = message.as_ref();
        tracing::warn!("{message}");
        self.listener.on_log(&format!("WARN: {message}"));
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.end_session();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
