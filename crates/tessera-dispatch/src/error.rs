//! Error types for the dispatch layer.

/// Errors that prevent an operation from being scheduled at all.
///
/// These are returned synchronously from `dispatch`. If you got a
/// [`TaskHandle`](crate::TaskHandle), scheduling succeeded.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The calling thread has no [`EventLoop`](crate::EventLoop), so there
    /// would be nowhere to deliver the callback.
    #[error("asynchronous operations require an event loop on the calling thread")]
    NoEventLoop,

    /// `EventLoop::new` was called on a thread that already has one.
    #[error("an event loop is already installed on this thread")]
    LoopAlreadyInstalled,

    /// The dispatcher has been shut down and accepts no more work.
    #[error("dispatcher is shut down")]
    ShutDown,

    /// The worker runtime could not be started.
    #[error("failed to start worker runtime: {0}")]
    Runtime(#[source] std::io::Error),
}
