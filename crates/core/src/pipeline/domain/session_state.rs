use crate::shared::error::SwapError;

/// Lifecycle of a streaming swap session.
///
/// `Idle → Running → (Paused | Stopping) → Stopped`, with
/// `Paused → Running | Stopping` and `Running → Running` once per
/// processed frame. An idle session may also stop without running.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    Running,
    Paused,
    Stopping,
    Stopped,
}

impl SessionState {
    pub fn can_transition(self, to: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, to),
            (Idle, Running)
                | (Idle, Stopped)
                | (Running, Running)
                | (Running, Paused)
                | (Running, Stopping)
                | (Paused, Running)
                | (Paused, Stopping)
                | (Stopping, Stopped)
        )
    }

    pub fn transition(self, to: SessionState) -> Result<SessionState, SwapError> {
        if self.can_transition(to) {
            Ok(to)
        } else {
            Err(SwapError::InvalidTransition { from: self, to })
        }
    }

    /// Capture no longer admits frames.
    pub fn is_winding_down(self) -> bool {
        matches!(self, SessionState::Stopping | SessionState::Stopped)
    }
}
