use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU8;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Weak;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::sleep_until;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::dispatch::current_runtime;
use super::WatchHandle;
use crate::Error;
use crate::Result;

/// How a `watch_chain` invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainOutcome {
    /// Every selector resolved and the handler ran
    Completed,
    /// The chain deadline elapsed first
    TimedOut,
    /// The chain was aborted through its scope
    Aborted,
}

impl ChainOutcome {
    /// Outcome for a chain broken by its scope's signal.
    pub(crate) fn from_cancellation(error: &Error) -> Self {
        match error {
            Error::Timeout { .. } => ChainOutcome::TimedOut,
            _ => ChainOutcome::Aborted,
        }
    }
}

const RUNNING: u8 = 0;
const TIMED_OUT: u8 = 1;
const ABORTED: u8 = 2;
const FINISHED: u8 = 3;

/// Everything one chain invocation owns: the handles of its steps and its
/// cancellation signal.
///
/// Released exactly once, when the chain returns (whatever the outcome), when
/// [`cancel`](Self::cancel) is called, or when the scope is dropped.
/// Releasing disposes every registered handle; handles registered after
/// release are disposed on arrival.
pub struct ChainScope {
    inner: Arc<ScopeInner>,
}

struct ScopeInner {
    timeout: Option<Duration>,
    signal: CancellationToken,
    armed: AtomicBool,
    state: AtomicU8,
    released: AtomicBool,
    handles: Mutex<Vec<WatchHandle>>,
}

/// Cloneable handle that aborts a running chain from elsewhere.
#[derive(Clone)]
pub struct ChainAbort {
    inner: Weak<ScopeInner>,
}

impl ChainScope {
    /// `timeout` bounds the whole chain, not each step. `None` or a zero
    /// duration means no deadline.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                timeout: timeout.filter(|timeout| !timeout.is_zero()),
                signal: CancellationToken::new(),
                armed: AtomicBool::new(false),
                state: AtomicU8::new(RUNNING),
                released: AtomicBool::new(false),
                handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.inner.timeout
    }

    pub fn abort_handle(&self) -> ChainAbort {
        ChainAbort {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Aborts the chain (if still running) and releases the scope.
    /// A no-op once the scope has been released.
    pub fn cancel(&self) {
        self.inner.abort();
        self.inner.release();
    }

    /// Registered handles still holding a subscription.
    pub fn live_handles(&self) -> usize {
        self.inner.handles.lock().iter().filter(|handle| handle.is_live()).count()
    }

    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::Acquire)
    }

    /// Starts the deadline, if any. Only the first call has an effect.
    pub(crate) fn arm(&self) -> Result<()> {
        let Some(timeout) = self.inner.timeout else {
            return Ok(());
        };
        if self.inner.armed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let runtime = current_runtime()?;
        let deadline = Instant::now() + timeout;
        let signal = self.inner.signal.clone();
        let scope = Arc::downgrade(&self.inner);
        runtime.spawn(async move {
            tokio::select! {
                _ = signal.cancelled() => {}
                _ = sleep_until(deadline) => {
                    if let Some(scope) = scope.upgrade() {
                        scope.expire();
                    }
                }
            }
        });
        Ok(())
    }

    pub(crate) fn register(
        &self,
        handle: WatchHandle,
    ) {
        let mut handles = self.inner.handles.lock();
        if self.is_released() {
            handle.dispose();
        }
        handles.push(handle);
    }

    pub(crate) fn signal(&self) -> &CancellationToken {
        &self.inner.signal
    }

    /// Rejection reason for a step interrupted by the scope's signal.
    pub(crate) fn cancellation_error(&self) -> Error {
        match (self.inner.state.load(Ordering::Acquire), self.inner.timeout) {
            (TIMED_OUT, Some(duration)) => Error::Timeout { duration },
            _ => Error::Aborted,
        }
    }

    /// Releases the scope when dropped, covering every exit path of a chain.
    pub(crate) fn release_guard(&self) -> ReleaseGuard<'_> {
        ReleaseGuard { scope: self }
    }
}

impl Drop for ChainScope {
    fn drop(&mut self) {
        self.inner.release();
    }
}

impl fmt::Debug for ChainScope {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("ChainScope")
            .field("timeout", &self.inner.timeout)
            .field("released", &self.is_released())
            .field("live_handles", &self.live_handles())
            .finish()
    }
}

impl ChainAbort {
    /// Aborts the chain if it is still running; otherwise does nothing.
    pub fn abort(&self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.abort();
        }
    }
}

impl ScopeInner {
    fn expire(&self) {
        if self
            .state
            .compare_exchange(RUNNING, TIMED_OUT, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            debug!(timeout = ?self.timeout, "chain deadline elapsed");
            self.signal.cancel();
        }
    }

    fn abort(&self) {
        if self
            .state
            .compare_exchange(RUNNING, ABORTED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            debug!("chain aborted");
            self.signal.cancel();
        }
    }

    fn release(&self) {
        let handles = {
            let mut handles = self.handles.lock();
            if self.released.swap(true, Ordering::AcqRel) {
                return;
            }
            // Late aborts and deadlines become no-ops from here on.
            let _ = self.state.compare_exchange(RUNNING, FINISHED, Ordering::AcqRel, Ordering::Acquire);
            std::mem::take(&mut *handles)
        };

        for handle in &handles {
            handle.dispose();
        }
        if self.armed.load(Ordering::Acquire) {
            self.signal.cancel();
        }
        debug!(handles = handles.len(), "chain scope released");

        // Keep the disposed handles around so `live_handles` can be inspected.
        self.handles.lock().extend(handles);
    }
}

pub(crate) struct ReleaseGuard<'a> {
    scope: &'a ChainScope,
}

impl Drop for ReleaseGuard<'_> {
    fn drop(&mut self) {
        self.scope.inner.release();
    }
}
