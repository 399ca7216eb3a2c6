//! Caller-supplied deadline and cancellation for one logical call.
//!
//! A `CallContext` bounds the whole call: every attempt and every backoff
//! wait draws from the same deadline. Waits park on a condition variable so
//! `CancelToken::cancel` from another thread wakes them immediately.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::error::DispatchError;

/// Shared cancellation flag. Clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the token cancelled and wake every waiter.
    pub fn cancel(&self) {
        let (flag, cvar) = &*self.inner;
        *flag.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block for `timeout` or until cancelled. Returns `true` if cancelled.
    pub fn wait(&self, timeout: Duration) -> bool {
        let (flag, cvar) = &*self.inner;
        let guard = flag.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = cvar
            .wait_timeout_while(guard, timeout, |cancelled| !*cancelled)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }

    /// Block until `done` returns `true` or the token is cancelled.
    ///
    /// `done` is re-checked whenever `notify` is called. Returns `true` if
    /// cancelled; cancellation wins when both hold.
    pub fn wait_until(&self, mut done: impl FnMut() -> bool) -> bool {
        let (flag, cvar) = &*self.inner;
        let mut guard = flag.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if *guard {
                return true;
            }
            if done() {
                return false;
            }
            guard = cvar.wait(guard).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Wake waiters in `wait_until` so they re-check their condition.
    pub fn notify(&self) {
        let (flag, cvar) = &*self.inner;
        let _guard = flag.lock().unwrap_or_else(PoisonError::into_inner);
        cvar.notify_all();
    }
}

/// Deadline and cancellation signal for one logical call.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
    cancel: Option<CancelToken>,
}

impl CallContext {
    /// No deadline, not cancellable.
    pub fn background() -> Self {
        Self::default()
    }

    /// Deadline `timeout` from now. A timeout too large to represent as an
    /// `Instant` means no deadline.
    pub fn with_timeout(timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => Self::background().with_deadline(deadline),
            None => Self::background(),
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline; `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn cancel_token(&self) -> Option<&CancelToken> {
        self.cancel.as_ref()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    /// Fail if the call was cancelled or its deadline has passed.
    pub fn check(&self) -> Result<(), DispatchError> {
        if self.is_cancelled() {
            return Err(DispatchError::Cancelled);
        }
        match self.remaining() {
            Some(left) if left.is_zero() => Err(DispatchError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Timeout for the next attempt: the per-call timeout clipped to what is
    /// left of the deadline.
    pub fn attempt_timeout(&self, per_call: Option<Duration>) -> Option<Duration> {
        match (per_call, self.remaining()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Backoff wait between attempts.
    ///
    /// A delay that cannot finish before the deadline fails right away with
    /// `DeadlineExceeded` rather than sleeping into it. Cancellation wakes the
    /// wait immediately.
    pub fn sleep(&self, delay: Duration) -> Result<(), DispatchError> {
        self.check()?;
        if let Some(left) = self.remaining() {
            if delay >= left {
                return Err(DispatchError::DeadlineExceeded);
            }
        }
        match &self.cancel {
            Some(token) => {
                if token.wait(delay) {
                    return Err(DispatchError::Cancelled);
                }
            }
            None => std::thread::sleep(delay),
        }
        Ok(())
    }
}
