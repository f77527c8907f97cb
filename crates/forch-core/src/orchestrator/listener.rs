use super::machine::OrchestratorState;
use crate::error::Result;
use crate::types::{BacklogStatus, Feature};

/// Presentation callbacks. Every method defaults to a no-op so a front end
/// only implements what it shows.
pub trait OrchestratorListener: Send {
    fn on_state_changed(&mut self, _state: OrchestratorState) {}
    fn on_log(&mut self, _message: &str) {}
    fn on_clear_log(&mut self) {}
    fn on_feature_preview(&mut self, _feature: Option<&Feature>) {}
    fn on_change_count(&mut self, _count: usize) {}
    fn on_prompt_generated(&mut self, _prompt: &str) {}
    fn on_clear_prompt(&mut self) {}
    fn on_completion(&mut self, _success: bool) {}
    fn on_backlog_status(&mut self, _status: BacklogStatus) {}

    /// Asked when a feature without acceptance criteria is verified.
    /// `true` completes it, `false` fails the session.
    fn confirm_completion_without_criteria(&mut self, _feature: &Feature) -> bool {
        false
    }
}

#[derive(Debug, Default)]
pub struct NullListener;

impl OrchestratorListener for NullListener {}

/// Where a generated prompt goes when it is handed to the user. Failures
/// are logged by the controller and never change state.
pub trait HandoffSink: Send {
    fn copy_to_clipboard(&mut self, text: &str) -> Result<()>;
    fn notify(&mut self, message: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct NullSink;

impl HandoffSink for NullSink {
    fn copy_to_clipboard(&mut self, _text: &str) -> Result<()> {
        Ok(())
    }

    fn notify(&mut self, _message: &str) -> Result<()> {
        Ok(())
    }
}
