//! Pure orchestration state machine: `(state, event) -> (state, effects)`.
//!
//! Nothing here touches the backlog, the verifier or the listener. The
//! controller fires events and performs the returned effects in order.

use crate::error::{ForchError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// OrchestratorState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrchestratorState {
    #[default]
    Idle,
    Handoff,
    AwaitingAi,
    Verifying,
    Completed,
    Failed,
}

impl OrchestratorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Handoff => "HANDOFF",
            Self::AwaitingAi => "AWAITING_AI",
            Self::Verifying => "VERIFYING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    /// States from which a new feature may be started.
    pub fn can_start(&self) -> bool {
        matches!(self, Self::Idle | Self::Failed | Self::Completed)
    }
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Event / Effect
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A feature was selected and its prompt generated.
    Start,
    /// The prompt was handed to the user.
    PromptDelivered,
    /// User asked to verify the agent's work.
    Verify,
    /// All automatic criteria passed, or the user confirmed a feature that
    /// has none.
    Accepted,
    /// At least one criterion failed; a corrective prompt was issued.
    Rejected,
    Cancelled,
    /// User declined to complete a feature without criteria.
    Declined,
    /// Verification raised instead of producing a report.
    Crashed,
    /// User marked the feature complete without verifying.
    CompleteRequested,
    CompletionApplied,
    CompletionFailed,
    Reset,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    OpenSession,
    StartMonitoring,
    ApplyCompletion,
    /// Stop monitoring and drop the session.
    EndSession,
    ClearLog,
    ReportCompletion { success: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: OrchestratorState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn to(next: OrchestratorState, effects: &[Effect]) -> Self {
        Self {
            next,
            effects: effects.to_vec(),
        }
    }
}

// ---------------------------------------------------------------------------
// transition
// ---------------------------------------------------------------------------

const FAIL: &[Effect] = &[
    Effect::EndSession,
    Effect::ReportCompletion { success: false },
];

pub fn transition(state: OrchestratorState, event: Event) -> Result<Transition> {
    use Event as E;
    use OrchestratorState as S;

    let t = match (state, event) {
        (_, E::Reset) => Transition::to(S::Idle, &[Effect::EndSession]),

        (s, E::Start) if s.can_start() => Transition::to(S::Handoff, &[Effect::OpenSession]),
        (S::Handoff, E::PromptDelivered) => {
            Transition::to(S::AwaitingAi, &[Effect::StartMonitoring])
        }
        (S::AwaitingAi, E::Verify) => Transition::to(S::Verifying, &[]),

        (S::Verifying, E::Accepted) => Transition::to(S::Verifying, &[Effect::ApplyCompletion]),
        (S::Verifying, E::Rejected | E::Cancelled) => Transition::to(S::AwaitingAi, &[]),
        (S::Verifying, E::Declined | E::Crashed) => Transition::to(S::Failed, FAIL),

        (S::AwaitingAi, E::CompleteRequested) => {
            Transition::to(S::Verifying, &[Effect::ApplyCompletion])
        }
        (s, E::CompleteRequested) if s.can_start() => Transition::to(
            S::Verifying,
            &[Effect::OpenSession, Effect::ApplyCompletion],
        ),

        (S::Verifying, E::CompletionApplied) => Transition::to(
            S::Completed,
            &[
                Effect::EndSession,
                Effect::ClearLog,
                Effect::ReportCompletion { success: true },
            ],
        ),
        (S::Verifying, E::CompletionFailed) => Transition::to(S::Failed, FAIL),

        (from, event) => {
            return Err(ForchError::InvalidTransition {
                from: from.to_string(),
                event: event.to_string(),
            })
        }
    };
    Ok(t)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
