//! Thread-affine callback delivery.
//!
//! An [`EventLoop`] is a mailbox owned by exactly one thread. Workers post
//! finished jobs into it through a [`LoopHandle`]; the owning thread runs
//! them when it pumps the loop. Because only the owner ever pumps, every
//! callback runs on the owner's thread.
//!
//! Each thread may have at most one loop. While it exists,
//! [`LoopHandle::current`] returns its handle, which is how
//! [`Dispatcher::dispatch`](crate::Dispatcher::dispatch) finds out where to
//! send results.
//!
//! Internally the loop is a current-thread Tokio runtime plus an unbounded
//! mpsc channel. The runtime only exists so `run_next_timeout` can wait
//! with a deadline; pumping must therefore happen outside any other Tokio
//! runtime.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::Rc;
use std::thread::{self, ThreadId};
use std::time::Duration;

use tokio::runtime::{Builder, Runtime};
use tokio::sync::mpsc;
use tracing::debug;

use crate::DispatchError;

/// A unit of work handed to a sink.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Somewhere a finished operation's callback can be sent to run.
///
/// The dispatcher doesn't care which thread a sink runs jobs on; that is
/// entirely the sink's decision. [`LoopHandle`] runs them on the thread
/// that owns the loop.
pub trait CompletionSink: Send + Sync + 'static {
    /// Queues a job. Returns it back if the sink can no longer run
    /// anything (e.g. its loop was dropped).
    fn post(&self, job: Job) -> Result<(), Job>;
}

thread_local! {
    static CURRENT: RefCell<Option<LoopHandle>> = const { RefCell::new(None) };
}

// ---------------------------------------------------------------------------
// LoopHandle
// ---------------------------------------------------------------------------

/// A cloneable, `Send` handle that posts jobs into an [`EventLoop`].
#[derive(Debug, Clone)]
pub struct LoopHandle {
    sender: mpsc::UnboundedSender<Job>,
    thread: ThreadId,
}

impl LoopHandle {
    /// The handle of the calling thread's event loop, if it has one.
    pub fn current() -> Option<LoopHandle> {
        CURRENT
            .try_with(|current| current.borrow().clone())
            .ok()
            .flatten()
    }

    /// The thread that owns the loop (and therefore runs its jobs).
    pub fn thread_id(&self) -> ThreadId {
        self.thread
    }

    /// Returns `true` once the loop has been dropped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl CompletionSink for LoopHandle {
    fn post(&self, job: Job) -> Result<(), Job> {
        self.sender.send(job).map_err(|rejected| rejected.0)
    }
}

// ---------------------------------------------------------------------------
// EventLoop
// ---------------------------------------------------------------------------

/// A per-thread mailbox for callbacks.
///
/// `EventLoop` is deliberately `!Send`: it is bound to the thread that
/// created it.
///
/// ```rust
/// use tessera_dispatch::{DispatchConfig, Dispatcher, EventLoop};
///
/// let mut event_loop = EventLoop::new().unwrap();
/// let dispatcher = Dispatcher::new(DispatchConfig::default()).unwrap();
///
/// let (tx, rx) = std::sync::mpsc::channel();
/// dispatcher
///     .dispatch(|| Ok::<_, ()>(21 * 2), move |result| tx.send(result).unwrap())
///     .unwrap();
///
/// event_loop.run_next();
/// assert_eq!(rx.try_recv().unwrap(), Ok(42));
/// ```
pub struct EventLoop {
    receiver: mpsc::UnboundedReceiver<Job>,
    handle: LoopHandle,
    runtime: Runtime,
    _not_send: PhantomData<Rc<()>>,
}

impl EventLoop {
    /// Creates an event loop and installs it on the calling thread.
    ///
    /// # Errors
    /// - [`DispatchError::LoopAlreadyInstalled`] if this thread already
    ///   has a loop.
    /// - [`DispatchError::Runtime`] if the timer runtime can't start.
    pub fn new() -> Result<Self, DispatchError> {
        if LoopHandle::current().is_some() {
            return Err(DispatchError::LoopAlreadyInstalled);
        }

        let runtime = Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(DispatchError::Runtime)?;
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = LoopHandle {
            sender,
            thread: thread::current().id(),
        };

        CURRENT.with(|current| *current.borrow_mut() = Some(handle.clone()));
        debug!(thread = ?handle.thread, "event loop installed");

        Ok(Self {
            receiver,
            handle,
            runtime,
            _not_send: PhantomData,
        })
    }

    /// A handle for posting into this loop.
    pub fn handle(&self) -> LoopHandle {
        self.handle.clone()
    }

    /// Runs every job that is already queued without waiting.
    /// Returns how many ran.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.receiver.try_recv() {
            job();
            ran += 1;
        }
        ran
    }

    /// Blocks until one job arrives, then runs it.
    ///
    /// The loop holds its own handle, so this only returns `false` if
    /// the channel is somehow closed.
    pub fn run_next(&mut self) -> bool {
        let Self {
            receiver, runtime, ..
        } = self;
        match runtime.block_on(receiver.recv()) {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Like [`run_next`](Self::run_next), but gives up after `timeout`.
    /// Returns `true` if a job ran.
    pub fn run_next_timeout(&mut self, timeout: Duration) -> bool {
        let Self {
            receiver, runtime, ..
        } = self;
        match runtime.block_on(async { tokio::time::timeout(timeout, receiver.recv()).await }) {
            Ok(Some(job)) => {
                job();
                true
            }
            Ok(None) | Err(_) => false,
        }
    }

    /// Runs jobs until `done` returns `true` or `timeout` passes without
    /// a new job arriving. Returns the final value of `done()`.
    pub fn run_until(&mut self, timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
        loop {
            self.run_pending();
            if done() {
                return true;
            }
            if !self.run_next_timeout(timeout) {
                return done();
            }
        }
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        // The thread-local may already be gone during thread teardown.
        let _ = CURRENT.try_with(|current| current.borrow_mut().take());
        self.receiver.close();
        debug!(thread = ?self.handle.thread, "event loop removed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_new_installs_current_handle() {
        let event_loop = EventLoop::new().unwrap();

        let current = LoopHandle::current().expect("loop should be installed");

        assert_eq!(current.thread_id(), thread::current().id());
        assert_eq!(event_loop.handle().thread_id(), current.thread_id());
    }

    #[test]
    fn test_new_twice_on_same_thread_returns_error() {
        let _first = EventLoop::new().unwrap();

        let second = EventLoop::new();

        assert!(matches!(second, Err(DispatchError::LoopAlreadyInstalled)));
    }

    #[test]
    fn test_drop_uninstalls_and_closes_handle() {
        let event_loop = EventLoop::new().unwrap();
        let handle = event_loop.handle();

        drop(event_loop);

        assert!(LoopHandle::current().is_none());
        assert!(handle.is_closed());
        assert!(handle.post(Box::new(|| {})).is_err());
        // A fresh loop can be installed afterwards.
        assert!(EventLoop::new().is_ok());
    }

    #[test]
    fn test_run_pending_runs_jobs_in_post_order() {
        let mut event_loop = EventLoop::new().unwrap();
        let handle = event_loop.handle();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));

        for i in 0..3 {
            let seen = Arc::clone(&seen);
            handle
                .post(Box::new(move || seen.lock().push(i)))
                .unwrap_or_else(|_| panic!("post failed"));
        }

        assert_eq!(event_loop.run_pending(), 3);
        assert_eq!(*seen.lock(), vec![0, 1, 2]);
        assert_eq!(event_loop.run_pending(), 0);
    }

    #[test]
    fn test_run_next_timeout_returns_false_when_idle() {
        let mut event_loop = EventLoop::new().unwrap();

        assert!(!event_loop.run_next_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn test_post_from_other_thread_runs_on_owner() {
        let mut event_loop = EventLoop::new().unwrap();
        let handle = event_loop.handle();
        let owner = thread::current().id();
        let hits = Arc::new(AtomicUsize::new(0));

        let hits_in_job = Arc::clone(&hits);
        thread::spawn(move || {
            let job: Job = Box::new(move || {
                assert_eq!(thread::current().id(), owner);
                hits_in_job.fetch_add(1, Ordering::SeqCst);
            });
            assert!(handle.post(job).is_ok());
        })
        .join()
        .unwrap();

        assert!(event_loop.run_next());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_current_is_none_on_fresh_thread() {
        let _event_loop = EventLoop::new().unwrap();

        let other = thread::spawn(|| LoopHandle::current().is_none())
            .join()
            .unwrap();

        assert!(other);
    }
}
