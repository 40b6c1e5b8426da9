//! Cooperative pause / stop for long runs.
//!
//! The worker polls [`RunControl::checkpoint`] at well-defined points; the
//! controlling side (Ctrl-C handler, tests) flips the shared state. Nothing
//! is ever interrupted mid-write: a write-back only honours pause.

use std::sync::Arc;
use tokio::sync::watch;

/// How a run has been asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopRequest {
    #[default]
    None,
    /// Finish the current directory, then stop
    Cleanly,
    /// Stop at the next step checkpoint
    Now,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlState {
    pub paused: bool,
    pub stop: StopRequest,
}

/// Kind of checkpoint being passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    /// Inside resolution; honours pause and stop-now
    Step,
    /// Between directories; also honours stop-cleanly
    Directory,
    /// Inside write-back; only waits while paused
    PauseOnly,
}

/// The run was stopped at a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("run cancelled")]
pub struct Cancelled;

/// Cloneable handle shared between the worker and whoever controls it.
#[derive(Debug, Clone)]
pub struct RunControl {
    state: Arc<watch::Sender<ControlState>>,
}

impl Default for RunControl {
    fn default() -> Self {
        Self::new()
    }
}

impl RunControl {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ControlState::default());
        Self { state: Arc::new(tx) }
    }

    pub fn state(&self) -> ControlState {
        *self.state.borrow()
    }

    pub fn pause(&self) {
        self.state.send_modify(|s| s.paused = true);
    }

    pub fn resume(&self) {
        self.state.send_modify(|s| s.paused = false);
    }

    pub fn stop_now(&self) {
        self.state.send_modify(|s| s.stop = StopRequest::Now);
    }

    /// Request a clean stop; never downgrades a pending stop-now.
    pub fn stop_cleanly(&self) {
        self.state.send_modify(|s| {
            if s.stop == StopRequest::None {
                s.stop = StopRequest::Cleanly;
            }
        });
    }

    /// Escalate: first call stops cleanly, later calls stop now.
    pub fn escalate(&self) -> StopRequest {
        self.state.send_modify(|s| {
            s.stop = match s.stop {
                StopRequest::None => StopRequest::Cleanly,
                _ => StopRequest::Now,
            }
        });
        self.state().stop
    }

    /// Wait out a pause, then fail if the checkpoint honours a pending stop.
    ///
    /// A stop-now request also ends a pause so that a paused run can be
    /// aborted.
    pub async fn checkpoint(&self, kind: Checkpoint) -> Result<(), Cancelled> {
        let mut rx = self.state.subscribe();
        let state = match rx
            .wait_for(|s| !s.paused || s.stop == StopRequest::Now)
            .await
        {
            Ok(state) => *state,
            // Sender lives in self, so this is unreachable; treat as stop
            Err(_) => return Err(Cancelled),
        };

        let stopped = match kind {
            Checkpoint::Step => state.stop == StopRequest::Now,
            Checkpoint::Directory => state.stop != StopRequest::None,
            Checkpoint::PauseOnly => false,
        };
        if stopped { Err(Cancelled) } else { Ok(()) }
    }
}

/// Per-run settings threaded through the pipeline and resolver.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    pub control: RunControl,
    /// Resolve and log, but do not write tags, rename, or move
    pub dry_run: bool,
}

impl RunContext {
    pub fn new(control: RunControl, dry_run: bool) -> Self {
        Self { control, dry_run }
    }

    pub async fn checkpoint(&self, kind: Checkpoint) -> Result<(), Cancelled> {
        self.control.checkpoint(kind).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_running_passes_every_checkpoint() {
        let control = RunControl::new();
        for kind in [Checkpoint::Step, Checkpoint::Directory, Checkpoint::PauseOnly] {
            assert!(control.checkpoint(kind).await.is_ok());
        }
    }

    #[tokio::test]
    async fn test_stop_cleanly_only_stops_at_directories() {
        let control = RunControl::new();
        control.stop_cleanly();

        assert!(control.checkpoint(Checkpoint::Step).await.is_ok());
        assert!(control.checkpoint(Checkpoint::PauseOnly).await.is_ok());
        assert_eq!(control.checkpoint(Checkpoint::Directory).await, Err(Cancelled));
    }

    #[tokio::test]
    async fn test_stop_now_spares_write_back() {
        let control = RunControl::new();
        control.stop_now();

        assert_eq!(control.checkpoint(Checkpoint::Step).await, Err(Cancelled));
        assert_eq!(control.checkpoint(Checkpoint::Directory).await, Err(Cancelled));
        assert!(control.checkpoint(Checkpoint::PauseOnly).await.is_ok());
    }

    #[tokio::test]
    async fn test_pause_blocks_until_resume() {
        let control = RunControl::new();
        control.pause();

        let worker = control.clone();
        let handle = tokio::spawn(async move { worker.checkpoint(Checkpoint::Step).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());

        control.resume();
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_stop_now_ends_a_pause() {
        let control = RunControl::new();
        control.pause();

        let worker = control.clone();
        let handle = tokio::spawn(async move { worker.checkpoint(Checkpoint::Step).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        control.stop_now();
        assert_eq!(handle.await.unwrap(), Err(Cancelled));
    }

    #[test]
    fn test_escalation() {
        let control = RunControl::new();
        assert_eq!(control.escalate(), StopRequest::Cleanly);
        assert_eq!(control.escalate(), StopRequest::Now);
        control.stop_cleanly();
        assert_eq!(control.state().stop, StopRequest::Now);
    }
}
