//! Asynchronous dispatch for Tessera.
//!
//! Runs blocking operations on a bounded worker pool and delivers each
//! result back to the thread that asked for it.
//!
//! # Key types
//!
//! - [`EventLoop`]: a per-thread mailbox. A thread that wants callbacks
//!   creates one and pumps it ([`EventLoop::run_pending`],
//!   [`EventLoop::run_next`]).
//! - [`CompletionSink`]: anything that can accept a finished job.
//!   [`LoopHandle`] is the sink for an [`EventLoop`]; callers may bring
//!   their own.
//! - [`Dispatcher`]: the worker pool.
//! - [`TaskHandle`]: returned by every dispatch; cancels delivery.
//!
//! # Delivery contract
//!
//! ```text
//! caller thread                     worker
//!     │ dispatch(op, cb) ──────────→ op()          (blocking is fine)
//!     │ ← TaskHandle                  │
//!     │                               ▼
//!     │ ←──────── post(job) ──── Result<T, E>
//!     ▼
//! run_pending() → cb(result)        (exactly once, unless cancelled)
//! ```

mod config;
mod dispatcher;
mod error;
mod event_loop;
mod task;

pub use config::DispatchConfig;
pub use dispatcher::Dispatcher;
pub use error::DispatchError;
pub use event_loop::{CompletionSink, EventLoop, Job, LoopHandle};
pub use task::{TaskHandle, TaskId, TaskStatus};
