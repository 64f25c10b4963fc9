//! Task handles and the one-shot delivery state machine.
//!
//! Every dispatched operation walks through these states:
//!
//! ```text
//!   Queued ──(worker picks up)──→ Running ──(op returns)──→ Completed
//!     │                              │                          │
//!     │                              │                 (owner runs job)
//!     │                              │                          ▼
//!     └────────── cancel() ──────────┴──────── cancel() ──→ Delivered
//!                    ▼
//!                Cancelled
//! ```
//!
//! Every transition is a compare-and-swap on a single atomic, so the
//! worker, the delivering thread, and a cancelling thread can never both
//! win: once `cancel()` has returned `true`, the delivery CAS
//! (`Completed → Delivered`) can't succeed and the callback never runs.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tracing::debug;

const QUEUED: u8 = 0;
const RUNNING: u8 = 1;
const COMPLETED: u8 = 2;
const DELIVERED: u8 = 3;
const CANCELLED: u8 = 4;

/// Identifies a dispatched task in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub(crate) u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Where a task is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Waiting for a free worker.
    Queued,
    /// The operation is executing on a worker.
    Running,
    /// The operation finished; its callback is waiting on the sink.
    Completed,
    /// The callback has run (or is running).
    Delivered,
    /// Cancelled, or the sink closed before delivery. The callback will
    /// never run.
    Cancelled,
}

/// Shared between the handle, the worker, and the delivery job.
#[derive(Debug)]
pub(crate) struct TaskState {
    status: AtomicU8,
}

impl TaskState {
    pub(crate) fn new() -> Self {
        Self {
            status: AtomicU8::new(QUEUED),
        }
    }

    fn transition(&self, from: u8, to: u8) -> bool {
        self.status
            .compare_exchange(from, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Worker side: claim the task. Fails if it was cancelled while queued.
    pub(crate) fn try_start(&self) -> bool {
        self.transition(QUEUED, RUNNING)
    }

    /// Worker side: the operation returned. Fails if cancelled meanwhile.
    pub(crate) fn try_complete(&self) -> bool {
        self.transition(RUNNING, COMPLETED)
    }

    /// Sink side: claim the right to run the callback.
    pub(crate) fn try_deliver(&self) -> bool {
        self.transition(COMPLETED, DELIVERED)
    }

    /// Worker side: the sink refused the delivery job.
    pub(crate) fn abandon(&self) -> bool {
        self.transition(COMPLETED, CANCELLED)
    }

    fn cancel(&self) -> bool {
        let mut current = self.status.load(Ordering::Acquire);
        loop {
            match current {
                DELIVERED => return false,
                CANCELLED => return true,
                _ => match self.status.compare_exchange(
                    current,
                    CANCELLED,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                ) {
                    Ok(_) => return true,
                    Err(actual) => current = actual,
                },
            }
        }
    }

    fn status(&self) -> TaskStatus {
        match self.status.load(Ordering::Acquire) {
            QUEUED => TaskStatus::Queued,
            RUNNING => TaskStatus::Running,
            COMPLETED => TaskStatus::Completed,
            DELIVERED => TaskStatus::Delivered,
            CANCELLED => TaskStatus::Cancelled,
            code => unreachable!("invalid task state {code}"),
        }
    }
}

/// A handle to a dispatched operation.
///
/// Cancelling silences delivery; it does not retract the remote action.
/// If the worker already started, the operation still runs to completion
/// and its effects stand, but the callback is dropped.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: TaskId,
    state: Arc<TaskState>,
}

impl TaskHandle {
    pub(crate) fn new(id: TaskId, state: Arc<TaskState>) -> Self {
        Self { id, state }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Cancels the task.
    ///
    /// Returns `true` if cancellation is acknowledged: the callback will
    /// not run. Returns `false` if it was already delivered. Calling it
    /// again after a successful cancel returns `true`.
    pub fn cancel(&self) -> bool {
        let before = self.state.status();
        let acknowledged = self.state.cancel();
        debug!(task = %self.id, ?before, acknowledged, "cancel requested");
        acknowledged
    }

    pub fn status(&self) -> TaskStatus {
        self.state.status()
    }

    pub fn is_cancelled(&self) -> bool {
        self.status() == TaskStatus::Cancelled
    }

    /// `true` once nothing more will happen on the caller's side
    /// (delivered or cancelled).
    pub fn is_done(&self) -> bool {
        matches!(self.status(), TaskStatus::Delivered | TaskStatus::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> TaskHandle {
        TaskHandle::new(TaskId(1), Arc::new(TaskState::new()))
    }

    #[test]
    fn test_happy_path_reaches_delivered() {
        let task = handle();

        assert!(task.state.try_start());
        assert_eq!(task.status(), TaskStatus::Running);
        assert!(task.state.try_complete());
        assert_eq!(task.status(), TaskStatus::Completed);
        assert!(task.state.try_deliver());
        assert!(task.is_done());
    }

    #[test]
    fn test_cancel_while_queued_blocks_start() {
        let task = handle();

        assert!(task.cancel());

        assert!(!task.state.try_start());
        assert!(task.is_cancelled());
    }

    #[test]
    fn test_cancel_while_running_blocks_completion() {
        let task = handle();
        task.state.try_start();

        assert!(task.cancel());

        assert!(!task.state.try_complete());
    }

    #[test]
    fn test_cancel_after_completion_blocks_delivery() {
        let task = handle();
        task.state.try_start();
        task.state.try_complete();

        assert!(task.cancel());

        assert!(!task.state.try_deliver());
    }

    #[test]
    fn test_cancel_after_delivery_is_not_acknowledged() {
        let task = handle();
        task.state.try_start();
        task.state.try_complete();
        task.state.try_deliver();

        assert!(!task.cancel());
        assert_eq!(task.status(), TaskStatus::Delivered);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let task = handle();

        assert!(task.cancel());
        assert!(task.cancel());
    }

    #[test]
    fn test_deliver_only_once() {
        let task = handle();
        task.state.try_start();
        task.state.try_complete();

        assert!(task.state.try_deliver());
        assert!(!task.state.try_deliver());
    }

    #[test]
    fn test_abandon_after_completion_is_terminal() {
        let task = handle();
        task.state.try_start();
        task.state.try_complete();

        assert!(task.state.abandon());

        assert!(!task.state.try_deliver());
        assert!(task.is_done());
        assert!(task.is_cancelled());
    }

    #[test]
    fn test_abandon_before_completion_fails() {
        let task = handle();
        task.state.try_start();

        assert!(!task.state.abandon());
        assert_eq!(task.status(), TaskStatus::Running);
    }

    #[test]
    fn test_task_id_display() {
        assert_eq!(TaskId(7).to_string(), "task-7");
    }
}
