//! Signup progression state machine using rust-fsm.
//!
//! Models the strictly forward path from a fresh registration to a logged-in
//! session. The machine exists per attempt; a failed attempt stays failed and
//! a new attempt starts over with a new machine.
//!
//! ## State Diagram
//!
//! ```text
//! ┌───────┐ RegisterSucceeded ┌────────────┐ ConfirmSucceeded ┌────────────────┐
//! │ Start │ ────────────────► │ Registered │ ───────────────► │ EmailConfirmed │
//! └───┬───┘                   └─────┬──────┘                  └───────┬────────┘
//!     │                             │                                 │ LoginSucceeded
//!     │ StepFailed                  │ StepFailed                      ▼
//!     │                             │                          ┌──────────┐
//!     ▼                             ▼            StepFailed    │ LoggedIn │ (terminal)
//! ┌────────────────────────────────────────┐ ◄──────────────   └──────────┘
//! │            Failed (terminal)           │
//! └────────────────────────────────────────┘
//! ```

use rust_fsm::*;
use serde::{Deserialize, Serialize};

// The macro expands to a `signup_flow` module holding the State and Input
// enums plus the StateMachine type itself.
state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub signup_flow(Start)

    Start => {
        RegisterSucceeded => Registered,
        StepFailed => Failed
    },
    Registered => {
        ConfirmSucceeded => EmailConfirmed,
        StepFailed => Failed
    },
    EmailConfirmed => {
        LoginSucceeded => LoggedIn,
        StepFailed => Failed
    }
}

// Friendlier names for the generated types
pub use signup_flow::Input as FlowInput;
pub use signup_flow::State as FlowMachineState;
pub use signup_flow::StateMachine as FlowMachine;

/// Signup flow state for external consumption.
///
/// Unlike the raw machine state this carries the failure reason, which is
/// what the presentation layer wants to show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    /// Fresh attempt, nothing submitted yet.
    Start,
    /// Registration accepted, waiting for the emailed confirmation code.
    Registered,
    /// Email confirmed, waiting for the first login.
    EmailConfirmed,
    /// Attempt completed, session active.
    LoggedIn,
    /// Attempt failed; terminal until a new attempt starts.
    Failed(String),
}

impl FlowState {
    /// Returns true once the attempt can make no further progress.
    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowState::LoggedIn | FlowState::Failed(_))
    }

    /// Returns true if the attempt ended with an active session.
    pub fn is_logged_in(&self) -> bool {
        matches!(self, FlowState::LoggedIn)
    }
}

/// One signup attempt: the machine plus the reason it failed, if it did.
pub struct SignupFlow {
    machine: FlowMachine,
    failure: Option<String>,
}

impl SignupFlow {
    /// Start a fresh attempt.
    pub fn new() -> Self {
        Self {
            machine: FlowMachine::new(),
            failure: None,
        }
    }

    /// Current state of the attempt.
    pub fn state(&self) -> FlowState {
        match self.machine.state() {
            FlowMachineState::Start => FlowState::Start,
            FlowMachineState::Registered => FlowState::Registered,
            FlowMachineState::EmailConfirmed => FlowState::EmailConfirmed,
            FlowMachineState::LoggedIn => FlowState::LoggedIn,
            FlowMachineState::Failed => FlowState::Failed(
                self.failure.clone().unwrap_or_default(),
            ),
        }
    }

    /// Apply a success input. Returns false when the input is illegal in the
    /// current state, leaving the state unchanged.
    pub fn advance(&mut self, input: &FlowInput) -> bool {
        self.machine.consume(input).is_ok()
    }

    /// Mark the current step failed. Returns false when the attempt is
    /// already terminal; the reason is recorded only when the transition
    /// actually happens.
    pub fn fail(&mut self, reason: impl Into<String>) -> bool {
        if self.machine.consume(&FlowInput::StepFailed).is_ok() {
            self.failure = Some(reason.into());
            true
        } else {
            false
        }
    }
}

impl Default for SignupFlow {
    fn default() -> Self {
        Self::new()
    }
}
