//! Conversation session: the externally visible entry point.

use tracing::info;

use crate::controller::RigorController;
use crate::error::{Error, Result};
use crate::state::{RigorState, StateUpdate};
use crate::turn::{find_last_turn, Role, Turn};

/// Holds the evolving turn history and routes each user turn through the
/// rigor controller.
///
/// The session exclusively owns its [`RigorState`]; callers must
/// serialize turns per conversation, with no concurrent
/// [`Session::send`] for the same session. Conversation state is
/// process-resident for the
/// session's lifetime; persisting it is the caller's responsibility.
pub struct Session {
    controller: RigorController,
    state: RigorState,
}

impl Session {
    pub fn new(controller: RigorController) -> Self {
        Self {
            controller,
            state: RigorState::new(),
        }
    }

    /// Submit one user turn and run it through the workflow.
    ///
    /// Returns the final assistant turn produced by this call. The scan
    /// is scoped to the turns this call appended, so an answer from an
    /// earlier turn can never be handed back as the current one. On
    /// failure the whole turn fails; the caller decides whether to
    /// surface the error or retry the turn from scratch.
    pub async fn send(&mut self, content: impl Into<String>) -> Result<Turn> {
        let turn = Turn::user(content);
        info!(turn_id = %turn.id, "user turn received");
        self.state.apply(StateUpdate::new().with_turn(turn));

        let history_len = self.state.turns.len();
        self.controller.run_turn(&mut self.state).await?;

        find_last_turn(&self.state.turns[history_len..], Role::Assistant)
            .cloned()
            .ok_or_else(|| Error::precondition("workflow finished without an assistant turn"))
    }

    /// The full turn history so far.
    pub fn turns(&self) -> &[Turn] {
        &self.state.turns
    }

    /// The workflow state (facts, flags, statement lists).
    pub fn state(&self) -> &RigorState {
        &self.state
    }
}
