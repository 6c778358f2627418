use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};

use crate::pipeline::domain::session_state::SessionState;
use crate::shared::error::SwapError;

/// Shared, thread-safe holder of a session's [`SessionState`].
///
/// Capture parks on the condvar while paused; every transition wakes it.
pub struct SessionControl {
    state: Mutex<SessionState>,
    changed: Condvar,
    processed: AtomicU64,
}

impl SessionControl {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SessionState::Idle),
            changed: Condvar::new(),
            processed: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.lock()
    }

    pub fn start(&self) -> Result<(), SwapError> {
        self.transition(SessionState::Running)
    }

    pub fn pause(&self) -> Result<(), SwapError> {
        self.transition(SessionState::Paused)
    }

    pub fn resume(&self) -> Result<(), SwapError> {
        self.transition(SessionState::Running)
    }

    /// Asks the session to wind down. Repeated calls are no-ops.
    pub fn stop(&self) {
        let mut state = self.lock();
        *state = match *state {
            SessionState::Idle => SessionState::Stopped,
            SessionState::Running | SessionState::Paused => SessionState::Stopping,
            other => other,
        };
        self.changed.notify_all();
    }

    /// Records one processed frame: the `Running → Running` step. A frame
    /// finished while paused or draining leaves the state as it is.
    /// Returns the number of frames processed so far.
    pub fn frame_processed(&self) -> u64 {
        let mut state = self.lock();
        if *state == SessionState::Running {
            if let Ok(next) = state.transition(SessionState::Running) {
                *state = next;
            }
        }
        self.processed.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn frames_processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Marks the session fully drained.
    pub fn finish(&self) {
        let mut state = self.lock();
        if *state != SessionState::Stopped {
            if state.can_transition(SessionState::Stopping) {
                *state = SessionState::Stopping;
            }
            *state = SessionState::Stopped;
        }
        self.changed.notify_all();
    }

    /// Blocks while paused; returns the state that ended the wait.
    pub fn wait_while_paused(&self) -> SessionState {
        let mut state = self.lock();
        while *state == SessionState::Paused {
            state = match self.changed.wait(state) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
        *state
    }

    fn transition(&self, to: SessionState) -> Result<(), SwapError> {
        let mut state = self.lock();
        *state = state.transition(to)?;
        self.changed.notify_all();
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for SessionControl {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_starts_idle() {
        assert_eq!(SessionControl::new().state(), SessionState::Idle);
    }

    #[test]
    fn test_pause_resume_cycle() {
        let control = SessionControl::new();
        control.start().unwrap();
        control.pause().unwrap();
        assert_eq!(control.state(), SessionState::Paused);
        control.resume().unwrap();
        assert_eq!(control.state(), SessionState::Running);
    }

    #[test]
    fn test_pause_before_start_rejected() {
        let control = SessionControl::new();
        assert!(matches!(
            control.pause(),
            Err(SwapError::InvalidTransition {
                from: SessionState::Idle,
                to: SessionState::Paused
            })
        ));
    }

    #[test]
    fn test_resume_after_stop_rejected() {
        let control = SessionControl::new();
        control.start().unwrap();
        control.stop();
        assert!(control.resume().is_err());
        assert_eq!(control.state(), SessionState::Stopping);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let control = SessionControl::new();
        control.start().unwrap();
        control.stop();
        control.stop();
        assert_eq!(control.state(), SessionState::Stopping);
        control.finish();
        control.stop();
        assert_eq!(control.state(), SessionState::Stopped);
    }

    #[test]
    fn test_stop_idle_goes_straight_to_stopped() {
        let control = SessionControl::new();
        control.stop();
        assert_eq!(control.state(), SessionState::Stopped);
        assert!(control.start().is_err());
    }

    #[test]
    fn test_finish_from_running() {
        let control = SessionControl::new();
        control.start().unwrap();
        control.finish();
        assert_eq!(control.state(), SessionState::Stopped);
    }

    #[test]
    fn test_frame_processed_keeps_state_and_counts() {
        let control = SessionControl::new();
        control.start().unwrap();
        assert_eq!(control.frame_processed(), 1);
        assert_eq!(control.state(), SessionState::Running);

        control.pause().unwrap();
        assert_eq!(control.frame_processed(), 2);
        assert_eq!(control.state(), SessionState::Paused);

        control.stop();
        assert_eq!(control.frame_processed(), 3);
        assert_eq!(control.state(), SessionState::Stopping);
        assert_eq!(control.frames_processed(), 3);
    }

    #[test]
    fn test_stop_wakes_paused_waiter() {
        let control = Arc::new(SessionControl::new());
        control.start().unwrap();
        control.pause().unwrap();

        let waiter = {
            let control = Arc::clone(&control);
            std::thread::spawn(move || control.wait_while_paused())
        };
        std::thread::sleep(Duration::from_millis(20));
        control.stop();

        assert_eq!(waiter.join().unwrap(), SessionState::Stopping);
    }

    #[test]
    fn test_wait_returns_immediately_when_running() {
        let control = SessionControl::new();
        control.start().unwrap();
        assert_eq!(control.wait_while_paused(), SessionState::Running);
    }
}
