//! Externally driven, single-shot pause primitive.
//!
//! A computation awaiting a [`PauseHandle`] stays parked until some holder of
//! the handle signals it, exactly once, with success or failure. While it is
//! parked its frame can be captured safely.
//!
//! Completion callbacks registered before the signal are queued and run by
//! the signalling call; callbacks registered afterwards run immediately with
//! the stored outcome. Callback failures never suppress each other: all of
//! them are collected into `AggregateCallbackFailure`. A panicking callback
//! is caught and reported as a [`CallbackPanic`].
//!
//! # Example
//!
//! ```
//! use taskwire::pause::PauseHandle;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let handle = PauseHandle::new();
//! let waiter = handle.clone();
//! let parked = tokio::spawn(async move { waiter.park_until_signalled().await });
//!
//! handle.signal_success().unwrap();
//! parked.await.unwrap().unwrap();
//! assert!(handle.signal_success().is_err());
//! # }
//! ```

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::error::{Result, SharedError, TaskwireError};

/// Error type returned by completion callbacks.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Completion callback; receives the final signal.
pub type Callback = Box<dyn FnOnce(&Signal) -> std::result::Result<(), CallbackError> + Send + 'static>;

/// A completion callback that panicked instead of returning.
#[derive(Debug, thiserror::Error)]
#[error("completion callback panicked: {message}")]
pub struct CallbackPanic {
    pub message: String,
}

impl CallbackPanic {
    fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = match payload.downcast::<String>() {
            Ok(message) => *message,
            Err(payload) => match payload.downcast::<&'static str>() {
                Ok(message) => (*message).to_string(),
                Err(_) => "non-string panic payload".to_string(),
            },
        };
        Self { message }
    }
}

/// State of a pause handle.
#[derive(Debug, Clone, Default)]
pub enum Signal {
    /// Not signalled yet.
    #[default]
    Pending,
    Succeeded,
    Failed(SharedError),
}

impl Signal {
    #[inline]
    pub fn is_pending(&self) -> bool {
        matches!(self, Signal::Pending)
    }

    /// What a parked waiter observes, once signalled.
    pub fn result(&self) -> Option<Result<()>> {
        match self {
            Signal::Pending => None,
            Signal::Succeeded => Some(Ok(())),
            Signal::Failed(error) => Some(Err(TaskwireError::Faulted(error.clone()))),
        }
    }
}

struct State {
    signal: Signal,
    callbacks: Vec<Callback>,
}

struct Inner {
    state: Mutex<State>,
    /// Set once, after `state.signal` leaves `Pending`.
    signalled: AtomicBool,
    tx: watch::Sender<Signal>,
}

/// Handle to a single-shot pause point.
///
/// Cheaply cloneable; all clones share the same state.
#[derive(Clone)]
pub struct PauseHandle {
    inner: Arc<Inner>,
}

impl PauseHandle {
    /// Create an unsignalled handle.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Signal::Pending);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    signal: Signal::Pending,
                    callbacks: Vec::new(),
                }),
                signalled: AtomicBool::new(false),
                tx,
            }),
        }
    }

    /// Whether the handle has been signalled.
    #[inline]
    pub fn is_signalled(&self) -> bool {
        self.inner.signalled.load(Ordering::Acquire)
    }

    /// Current signal.
    pub fn outcome(&self) -> Signal {
        self.inner.state.lock().signal.clone()
    }

    /// Register a completion callback.
    ///
    /// Runs it right away when the handle is already signalled; a failure
    /// then comes back as `AggregateCallbackFailure`.
    pub fn on_signalled<F>(&self, callback: F) -> Result<()>
    where
        F: FnOnce(&Signal) -> std::result::Result<(), CallbackError> + Send + 'static,
    {
        let signal = {
            let mut state = self.inner.state.lock();
            if state.signal.is_pending() {
                state.callbacks.push(Box::new(callback));
                return Ok(());
            }
            state.signal.clone()
        };
        let callback: Callback = Box::new(callback);
        aggregate(run_all(vec![callback], &signal))
    }

    /// Signal success and run every queued callback.
    pub fn signal_success(&self) -> Result<()> {
        let callbacks = self.complete(Signal::Succeeded)?;
        aggregate(run_all(callbacks, &Signal::Succeeded))
    }

    /// Signal failure and run every queued callback.
    ///
    /// Waiters observe `Faulted(error)`. Callback failures are returned
    /// rather than raised, since the handle is already failed.
    pub fn signal_failure<E>(&self, error: E) -> Result<Option<TaskwireError>>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let signal = Signal::Failed(Arc::new(error));
        let callbacks = self.complete(signal.clone())?;
        Ok(aggregate(run_all(callbacks, &signal)).err())
    }

    /// Signal success and run the queued callbacks in parallel on the
    /// blocking pool.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn signal_success_concurrent(&self) -> Result<()> {
        let callbacks = self.complete(Signal::Succeeded)?;
        let tasks: Vec<_> = callbacks
            .into_iter()
            .map(|callback| tokio::task::spawn_blocking(move || callback(&Signal::Succeeded)))
            .collect();

        let mut failures = Vec::new();
        for task in tasks {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => failures.push(SharedError::from(e)),
                Err(join) => failures.push(Arc::new(join) as SharedError),
            }
        }
        aggregate(failures)
    }

    /// Wait until the handle is signalled.
    ///
    /// Returns `Faulted` when it was signalled with a failure.
    pub async fn park_until_signalled(&self) -> Result<()> {
        let mut rx = self.inner.tx.subscribe();
        let signal = match rx.wait_for(|s| !s.is_pending()).await {
            Ok(signal) => signal.clone(),
            Err(closed) => return Err(TaskwireError::Faulted(Arc::new(closed))),
        };
        signal.result().unwrap_or(Ok(()))
    }

    /// Store `signal` and take the queued callbacks, once.
    fn complete(&self, signal: Signal) -> Result<Vec<Callback>> {
        let callbacks = {
            let mut state = self.inner.state.lock();
            if !state.signal.is_pending() {
                return Err(TaskwireError::AlreadyCompleted);
            }
            state.signal = signal.clone();
            self.inner.signalled.store(true, Ordering::Release);
            std::mem::take(&mut state.callbacks)
        };
        tracing::debug!(callbacks = callbacks.len(), failed = matches!(signal, Signal::Failed(_)), "pause handle signalled");
        self.inner.tx.send_replace(signal);
        Ok(callbacks)
    }
}

impl Default for PauseHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PauseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PauseHandle")
            .field("signal", &self.outcome())
            .finish()
    }
}

fn run_all(callbacks: Vec<Callback>, signal: &Signal) -> Vec<SharedError> {
    callbacks
        .into_iter()
        .filter_map(|callback| match catch_unwind(AssertUnwindSafe(|| callback(signal))) {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(SharedError::from(e)),
            Err(payload) => Some(Arc::new(CallbackPanic::from_payload(payload)) as SharedError),
        })
        .collect()
}

fn aggregate(failures: Vec<SharedError>) -> Result<()> {
    if failures.is_empty() {
        return Ok(());
    }
    for failure in &failures {
        tracing::warn!(error = %failure, "completion callback failed");
    }
    Err(TaskwireError::AggregateCallbackFailure(failures))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> Callback) {
        let hits = Arc::new(AtomicUsize::new(0));
        let make = {
            let hits = hits.clone();
            move || -> Callback {
                let hits = hits.clone();
                Box::new(move |_: &Signal| -> std::result::Result<(), CallbackError> {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
            }
        };
        (hits, make)
    }

    fn failing(msg: &'static str) -> impl FnOnce(&Signal) -> std::result::Result<(), CallbackError> + Send {
        move |_: &Signal| -> std::result::Result<(), CallbackError> { Err(msg.into()) }
    }

    #[test]
    fn test_new_handle_is_pending() {
        let handle = PauseHandle::new();
        assert!(!handle.is_signalled());
        assert!(handle.outcome().is_pending());
        assert!(handle.outcome().result().is_none());
    }

    #[test]
    fn test_signal_twice_fails() {
        let handle = PauseHandle::new();
        handle.signal_success().unwrap();
        assert!(handle.is_signalled());
        assert!(matches!(handle.signal_success(), Err(TaskwireError::AlreadyCompleted)));
        assert!(matches!(
            handle.signal_failure(std::io::Error::new(std::io::ErrorKind::Other, "late")),
            Err(TaskwireError::AlreadyCompleted)
        ));
    }

    #[test]
    fn test_queued_and_late_callbacks_both_run() {
        let handle = PauseHandle::new();
        let (hits, make) = counter();
        handle.on_signalled(make()).unwrap();
        handle.on_signalled(make()).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        handle.signal_success().unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        handle.on_signalled(make()).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_panicking_callback_does_not_drop_the_rest() {
        let handle = PauseHandle::new();
        let (hits, make) = counter();
        handle.on_signalled(|_: &Signal| -> std::result::Result<(), CallbackError> {
            panic!("callback blew up")
        })
        .unwrap();
        handle.on_signalled(make()).unwrap();

        match handle.signal_success() {
            Err(TaskwireError::AggregateCallbackFailure(failures)) => {
                assert_eq!(failures.len(), 1);
                assert!(failures[0].to_string().contains("callback blew up"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(handle.is_signalled());
    }

    #[test]
    fn test_late_callback_sees_failure() {
        let handle = PauseHandle::new();
        let none = handle
            .signal_failure(std::io::Error::new(std::io::ErrorKind::Other, "boom"))
            .unwrap();
        assert!(none.is_none());

        let seen = Arc::new(Mutex::new(String::new()));
        let sink = seen.clone();
        handle
            .on_signalled(move |signal: &Signal| {
                if let Signal::Failed(e) = signal {
                    *sink.lock() = e.to_string();
                }
                Ok(())
            })
            .unwrap();
        assert_eq!(*seen.lock(), "boom");
    }

    #[test]
    fn test_callback_failures_are_collected() {
        let handle = PauseHandle::new();
        let (hits, make) = counter();
        handle.on_signalled(failing("first")).unwrap();
        handle.on_signalled(make()).unwrap();
        handle.on_signalled(failing("second")).unwrap();

        match handle.signal_success() {
            Err(TaskwireError::AggregateCallbackFailure(errors)) => {
                let messages: Vec<_> = errors.iter().map(|e| e.to_string()).collect();
                assert_eq!(messages, ["first", "second"]);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failure_returns_aggregate() {
        let handle = PauseHandle::new();
        handle.on_signalled(failing("cb")).unwrap();
        let aggregate = handle
            .signal_failure(std::io::Error::new(std::io::ErrorKind::Other, "boom"))
            .unwrap();
        assert!(matches!(aggregate, Some(TaskwireError::AggregateCallbackFailure(ref e)) if e.len() == 1));
    }

    #[test]
    fn test_late_failing_callback_reports() {
        let handle = PauseHandle::new();
        handle.signal_success().unwrap();
        assert!(matches!(
            handle.on_signalled(failing("late")),
            Err(TaskwireError::AggregateCallbackFailure(_))
        ));
    }

    #[tokio::test]
    async fn test_park_until_success() {
        let handle = PauseHandle::new();
        let waiter = handle.clone();
        let parked = tokio::spawn(async move { waiter.park_until_signalled().await });

        tokio::task::yield_now().await;
        handle.signal_success().unwrap();
        parked.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_park_observes_failure() {
        let handle = PauseHandle::new();
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let waiter = handle.clone();
                tokio::spawn(async move { waiter.park_until_signalled().await })
            })
            .collect();

        handle
            .signal_failure(std::io::Error::new(std::io::ErrorKind::Other, "boom"))
            .unwrap();
        for waiter in waiters {
            match waiter.await.unwrap() {
                Err(TaskwireError::Faulted(e)) => assert_eq!(e.to_string(), "boom"),
                other => panic!("unexpected result: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_park_after_signal_returns_immediately() {
        let handle = PauseHandle::new();
        handle.signal_success().unwrap();
        handle.park_until_signalled().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_signal_runs_all_callbacks() {
        let handle = PauseHandle::new();
        let (hits, make) = counter();
        for _ in 0..4 {
            handle.on_signalled(make()).unwrap();
        }
        handle.on_signalled(failing("one")).unwrap();

        let err = handle.signal_success_concurrent().await.unwrap_err();
        assert!(matches!(err, TaskwireError::AggregateCallbackFailure(ref e) if e.len() == 1));
        assert_eq!(hits.load(Ordering::SeqCst), 4);
        assert!(matches!(
            handle.signal_success_concurrent().await,
            Err(TaskwireError::AlreadyCompleted)
        ));
    }
}
