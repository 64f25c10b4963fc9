//! The bounded worker pool.
//!
//! A `Dispatcher` owns a Tokio runtime and uses only its blocking pool:
//! operations are plain synchronous closures (they block on the network),
//! so each one runs start to finish on one blocking thread.
//! `max_blocking_threads` is the pool bound; anything beyond it queues.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tokio::runtime::{Builder, Handle, Runtime};
use tracing::{debug, error, trace, warn};

use crate::task::TaskState;
use crate::{
    CompletionSink, DispatchConfig, DispatchError, Job, LoopHandle, TaskHandle, TaskId,
};

/// Runs operations on workers and routes results to completion sinks.
pub struct Dispatcher {
    config: DispatchConfig,
    handle: Handle,
    /// Taken on shutdown.
    runtime: Mutex<Option<Runtime>>,
    shut_down: AtomicBool,
    next_task: AtomicU64,
    in_flight: Arc<InFlight>,
}

/// Counts operations that were accepted but haven't finished (queued or
/// running). Tokio drops queued blocking tasks on shutdown, so `shutdown`
/// waits for this to reach zero first.
#[derive(Default)]
struct InFlight {
    count: Mutex<usize>,
    idle: Condvar,
}

impl InFlight {
    fn enter(self: &Arc<Self>) -> InFlightGuard {
        *self.count.lock() += 1;
        InFlightGuard(Arc::clone(self))
    }

    fn wait_idle(&self, deadline: Instant) -> bool {
        let mut count = self.count.lock();
        while *count > 0 {
            if self.idle.wait_until(&mut count, deadline).timed_out() {
                return *count == 0;
            }
        }
        true
    }

    fn len(&self) -> usize {
        *self.count.lock()
    }
}

/// Released when the worker closure is dropped, whether it ran or not.
struct InFlightGuard(Arc<InFlight>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut count = self.0.count.lock();
        *count -= 1;
        if *count == 0 {
            self.0.idle.notify_all();
        }
    }
}

impl Dispatcher {
    /// Starts a worker pool.
    ///
    /// # Errors
    /// Returns [`DispatchError::Runtime`] if the runtime can't be built.
    pub fn new(config: DispatchConfig) -> Result<Self, DispatchError> {
        let config = config.validated();
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(config.worker_threads)
            .thread_name(config.thread_name.clone())
            .build()
            .map_err(DispatchError::Runtime)?;

        debug!(
            workers = config.worker_threads,
            thread_name = %config.thread_name,
            "dispatcher started"
        );

        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Mutex::new(Some(runtime)),
            config,
            shut_down: AtomicBool::new(false),
            next_task: AtomicU64::new(1),
            in_flight: Arc::new(InFlight::default()),
        })
    }

    /// The (validated) configuration this pool runs with.
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Runs `operation` on a worker and delivers its result to the calling
    /// thread's [`EventLoop`](crate::EventLoop).
    ///
    /// # Errors
    /// - [`DispatchError::NoEventLoop`] if the calling thread has no loop.
    ///   Nothing is scheduled.
    /// - [`DispatchError::ShutDown`] after [`shutdown`](Self::shutdown).
    pub fn dispatch<T, E, F, C>(
        &self,
        operation: F,
        callback: C,
    ) -> Result<TaskHandle, DispatchError>
    where
        T: Send + 'static,
        E: Send + 'static,
        F: FnOnce() -> Result<T, E> + Send + 'static,
        C: FnOnce(Result<T, E>) + Send + 'static,
    {
        let sink = LoopHandle::current().ok_or(DispatchError::NoEventLoop)?;
        self.dispatch_to(sink, operation, callback)
    }

    /// Runs `operation` on a worker and posts the callback to `sink`.
    ///
    /// The callback receives exactly one `Result`, exactly once, on
    /// whatever thread the sink runs jobs on. It is skipped entirely if
    /// the task is cancelled first, or if the sink has closed.
    ///
    /// If `operation` panics, the callback never runs. The panic is
    /// re-raised on the sink's thread in its place.
    ///
    /// # Errors
    /// Returns [`DispatchError::ShutDown`] after [`shutdown`](Self::shutdown).
    pub fn dispatch_to<S, T, E, F, C>(
        &self,
        sink: S,
        operation: F,
        callback: C,
    ) -> Result<TaskHandle, DispatchError>
    where
        S: CompletionSink,
        T: Send + 'static,
        E: Send + 'static,
        F: FnOnce() -> Result<T, E> + Send + 'static,
        C: FnOnce(Result<T, E>) + Send + 'static,
    {
        // Registered before the flag check so `shutdown` can't miss it.
        let guard = self.in_flight.enter();
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(DispatchError::ShutDown);
        }

        let id = TaskId(self.next_task.fetch_add(1, Ordering::Relaxed));
        let state = Arc::new(TaskState::new());
        let worker_state = Arc::clone(&state);

        self.handle.spawn_blocking(move || {
            let _guard = guard;
            if !worker_state.try_start() {
                debug!(task = %id, "cancelled before start, skipping");
                return;
            }
            trace!(task = %id, "operation running");

            let outcome = panic::catch_unwind(AssertUnwindSafe(operation));
            if outcome.is_err() {
                error!(task = %id, "operation panicked");
            }

            if !worker_state.try_complete() {
                debug!(task = %id, "cancelled while running, result dropped");
                return;
            }

            let delivery_state = Arc::clone(&worker_state);
            let job: Job = Box::new(move || {
                if !delivery_state.try_deliver() {
                    debug!(task = %id, "cancelled before delivery");
                    return;
                }
                match outcome {
                    Ok(result) => callback(result),
                    // Surfaces on the thread that is waiting for the result.
                    Err(payload) => panic::resume_unwind(payload),
                }
            });
            if sink.post(job).is_err() {
                worker_state.abandon();
                warn!(task = %id, "completion sink closed, result dropped");
            }
        });

        debug!(task = %id, "operation dispatched");
        Ok(TaskHandle::new(id, state))
    }

    /// Stops accepting work and waits up to `timeout` for running and
    /// queued operations to finish. Operations still queued when the
    /// timeout expires never run.
    ///
    /// Must not be called from inside a dispatched operation.
    pub fn shutdown(&self, timeout: Duration) {
        self.shut_down.store(true, Ordering::SeqCst);
        let deadline = Instant::now() + timeout;
        if !self.in_flight.wait_idle(deadline) {
            warn!(
                pending = self.in_flight.len(),
                "shutdown timed out with operations in flight"
            );
        }

        let runtime = self.runtime.lock().take();
        if let Some(runtime) = runtime {
            runtime.shutdown_timeout(deadline.saturating_duration_since(Instant::now()));
            debug!("dispatcher shut down");
        }
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        // The last reference may be dropped on one of our own workers;
        // waiting here would deadlock.
        if let Some(runtime) = self.runtime.get_mut().take() {
            runtime.shutdown_background();
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
