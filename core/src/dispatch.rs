//! Request dispatchers.
//!
//! # Design
//! A `Dispatcher` runs one logical call. `DirectDispatcher` hands the request
//! to a `Transport` once; `RetryingDispatcher` decorates any other dispatcher
//! with exponential backoff. Both hold only immutable configuration, so a
//! single instance can serve any number of threads. Per-call retry state
//! lives on the stack of `execute`.
//!
//! Only transport failures are retried. A response with an error status is a
//! completed call and is returned as-is.

use std::sync::mpsc::{self, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::backoff;
use crate::config::RetryConfig;
use crate::context::{CallContext, CancelToken};
use crate::error::{DispatchError, TransportError};
use crate::http::{HttpRequest, HttpResponse};
use crate::transport::Transport;

/// Executes one logical call.
pub trait Dispatcher: Send + Sync {
    fn execute(
        &self,
        request: &HttpRequest,
        ctx: &CallContext,
    ) -> Result<HttpResponse, DispatchError>;
}

impl<D: Dispatcher + ?Sized> Dispatcher for Arc<D> {
    fn execute(
        &self,
        request: &HttpRequest,
        ctx: &CallContext,
    ) -> Result<HttpResponse, DispatchError> {
        (**self).execute(request, ctx)
    }
}

impl<D: Dispatcher + ?Sized> Dispatcher for Box<D> {
    fn execute(
        &self,
        request: &HttpRequest,
        ctx: &CallContext,
    ) -> Result<HttpResponse, DispatchError> {
        (**self).execute(request, ctx)
    }
}

/// Single attempt, straight to the transport.
///
/// With a cancellable context the send runs on a worker thread and the caller
/// waits for either its result or the cancel signal. A cancelled call returns
/// at once; the abandoned worker finishes in the background, bounded by the
/// attempt timeout when one is set.
#[derive(Debug)]
pub struct DirectDispatcher<T> {
    transport: Arc<T>,
    timeout: Option<Duration>,
}

impl<T> Clone for DirectDispatcher<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            timeout: self.timeout,
        }
    }
}

impl<T: Transport + 'static> DirectDispatcher<T> {
    /// `timeout` is the per-attempt limit; the context deadline may shorten it.
    pub fn new(transport: T, timeout: Option<Duration>) -> Self {
        Self {
            transport: Arc::new(transport),
            timeout,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn send_cancellable(
        &self,
        request: &HttpRequest,
        timeout: Option<Duration>,
        token: &CancelToken,
    ) -> Result<HttpResponse, DispatchError> {
        let (tx, rx) = mpsc::channel();
        let transport = Arc::clone(&self.transport);
        let owned = request.clone();
        let waker = token.clone();
        thread::Builder::new()
            .name("accounts-transport".to_string())
            .spawn(move || {
                // The receiver is gone if the call was cancelled.
                let _ = tx.send(transport.send(&owned, timeout));
                waker.notify();
            })
            .map_err(|e| TransportError::Failure(format!("spawn transport worker: {e}")))?;

        let mut outcome = None;
        let cancelled = token.wait_until(|| match rx.try_recv() {
            Ok(result) => {
                outcome = Some(result);
                true
            }
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Disconnected) => true,
        });

        if cancelled {
            debug!(
                method = %request.method,
                path = %request.path,
                "attempt cancelled in flight"
            );
            return Err(DispatchError::Cancelled);
        }
        match outcome {
            Some(result) => Ok(result?),
            None => Err(TransportError::Failure("transport worker exited".to_string()).into()),
        }
    }
}

impl<T: Transport + 'static> Dispatcher for DirectDispatcher<T> {
    fn execute(
        &self,
        request: &HttpRequest,
        ctx: &CallContext,
    ) -> Result<HttpResponse, DispatchError> {
        ctx.check()?;
        let timeout = ctx.attempt_timeout(self.timeout);
        match ctx.cancel_token() {
            Some(token) => self.send_cancellable(request, timeout, token),
            None => Ok(self.transport.send(request, timeout)?),
        }
    }
}

/// Retries transport failures of the wrapped dispatcher with backoff.
///
/// Timeouts are returned without retrying: the deadline that expired would
/// most likely expire again, and each retry adds another full timeout to the
/// caller's wait.
#[derive(Debug, Clone)]
pub struct RetryingDispatcher<D> {
    inner: D,
    policy: RetryConfig,
}

impl<D: Dispatcher> RetryingDispatcher<D> {
    pub fn new(inner: D, policy: RetryConfig) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    pub fn policy(&self) -> &RetryConfig {
        &self.policy
    }
}

impl<D: Dispatcher> Dispatcher for RetryingDispatcher<D> {
    fn execute(
        &self,
        request: &HttpRequest,
        ctx: &CallContext,
    ) -> Result<HttpResponse, DispatchError> {
        if !self.policy.is_enabled() {
            return self.inner.execute(request, ctx);
        }

        let mut state = RetryState::new(&self.policy);
        loop {
            let err = match self.inner.execute(request, ctx) {
                Ok(response) => {
                    if state.attempt > 0 {
                        debug!(attempts = state.attempt + 1, "request succeeded after retrying");
                    }
                    return Ok(response);
                }
                Err(DispatchError::Transport(err)) => err,
                Err(other) => return Err(other),
            };

            if err.is_timeout() {
                debug!(attempt = state.attempt + 1, "attempt timed out, not retrying");
                return Err(err.into());
            }

            let Some(wait) = state.next_delay() else {
                warn!(
                    attempts = state.max_attempts,
                    error = %err,
                    "retry limit reached"
                );
                return Err(DispatchError::RetryLimitExceeded {
                    attempts: state.max_attempts,
                    last: err,
                });
            };

            warn!(
                "{} {}: attempt {}/{} failed ({}), retrying in {}ms",
                request.method,
                request.path,
                state.attempt,
                state.max_attempts,
                err,
                wait.as_millis()
            );
            ctx.sleep(wait)?;
        }
    }
}

/// Retry bookkeeping for one `execute` call.
struct RetryState {
    /// 0-based index of the attempt in flight.
    attempt: u32,
    max_attempts: u32,
    base_interval_ms: u64,
    max_jitter_ms: u64,
}

impl RetryState {
    fn new(policy: &RetryConfig) -> Self {
        Self {
            attempt: 0,
            max_attempts: policy.max_attempts,
            base_interval_ms: policy.base_interval_ms,
            max_jitter_ms: policy.max_jitter_ms,
        }
    }

    /// Delay before the next attempt, or `None` once attempts are used up.
    fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt + 1 >= self.max_attempts {
            return None;
        }
        let wait = backoff::delay(self.attempt, self.base_interval_ms, self.max_jitter_ms);
        self.attempt += 1;
        Some(wait)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Instant;

    use crate::context::CancelToken;
    use crate::error::TransportError;
    use crate::http::HttpMethod;

    type Outcome = Result<HttpResponse, TransportError>;

    /// Plays back a fixed list of outcomes and counts calls.
    struct Scripted {
        outcomes: Mutex<VecDeque<Outcome>>,
        fallback: Outcome,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(outcomes: Vec<Outcome>, fallback: Outcome) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                fallback,
                calls: AtomicUsize::new(0),
            }
        }

        fn always(outcome: Outcome) -> Self {
            Self::new(Vec::new(), outcome)
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Transport for Scripted {
        fn send(&self, _: &HttpRequest, _: Option<Duration>) -> Outcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone())
        }
    }

    fn refused() -> Outcome {
        Err(TransportError::Failure("connection refused".into()))
    }

    fn ok(status: u16) -> Outcome {
        Ok(HttpResponse::new(status, ""))
    }

    fn request() -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            path: "http://localhost:8080/v1/organisation/accounts/x".into(),
            headers: Vec::new(),
            body: None,
        }
    }

    fn retrying(
        script: Scripted,
        policy: RetryConfig,
    ) -> RetryingDispatcher<DirectDispatcher<Scripted>> {
        RetryingDispatcher::new(DirectDispatcher::new(script, None), policy)
    }

    fn calls(d: &RetryingDispatcher<DirectDispatcher<Scripted>>) -> usize {
        d.inner().transport().calls()
    }

    #[test]
    fn direct_returns_transport_error_unchanged() {
        let d = DirectDispatcher::new(Scripted::always(refused()), None);
        let err = d.execute(&request(), &CallContext::background()).unwrap_err();
        assert_eq!(
            err,
            DispatchError::Transport(TransportError::Failure("connection refused".into()))
        );
        assert_eq!(d.transport().calls(), 1);
    }

    #[test]
    fn direct_clips_timeout_to_deadline() {
        let seen = Arc::new(Mutex::new(None));
        let record = seen.clone();
        let transport = move |_: &HttpRequest, timeout: Option<Duration>| {
            *record.lock().unwrap() = timeout;
            Ok::<_, TransportError>(HttpResponse::new(200, ""))
        };
        let d = DirectDispatcher::new(transport, Some(Duration::from_secs(30)));
        let ctx = CallContext::with_timeout(Duration::from_millis(200));
        d.execute(&request(), &ctx).unwrap();
        assert!(seen.lock().unwrap().unwrap() <= Duration::from_millis(200));
    }

    #[test]
    fn disabled_policy_makes_single_attempt() {
        for policy in [
            RetryConfig::new(0, 10, 10),
            RetryConfig::new(3, 0, 10),
            RetryConfig::new(3, 10, 0),
        ] {
            let d = retrying(Scripted::always(refused()), policy);
            let err = d.execute(&request(), &CallContext::background()).unwrap_err();
            assert!(matches!(err, DispatchError::Transport(_)), "{policy:?}");
            assert_eq!(calls(&d), 1, "{policy:?}");
        }
    }

    #[test]
    fn single_attempt_policy_calls_once() {
        let d = retrying(Scripted::always(refused()), RetryConfig::new(1, 1, 1));
        let err = d.execute(&request(), &CallContext::background()).unwrap_err();
        assert!(matches!(err, DispatchError::RetryLimitExceeded { attempts: 1, .. }));
        assert_eq!(calls(&d), 1);
    }

    #[test_log::test]
    fn exhausts_exactly_max_attempts() {
        let d = retrying(Scripted::always(refused()), RetryConfig::new(4, 1, 1));
        let err = d.execute(&request(), &CallContext::background()).unwrap_err();
        assert_eq!(
            err,
            DispatchError::RetryLimitExceeded {
                attempts: 4,
                last: TransportError::Failure("connection refused".into()),
            }
        );
        assert_eq!(calls(&d), 4);
    }

    #[test_log::test]
    fn succeeds_after_transient_failures() {
        let script = Scripted::new(vec![refused(), refused()], ok(200));
        let d = retrying(script, RetryConfig::new(4, 1, 1));
        let response = d.execute(&request(), &CallContext::background()).unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(calls(&d), 3);
    }

    #[test]
    fn error_status_is_not_retried() {
        let d = retrying(Scripted::always(ok(503)), RetryConfig::new(4, 1, 1));
        let response = d.execute(&request(), &CallContext::background()).unwrap();
        assert_eq!(response.status, 503);
        assert_eq!(calls(&d), 1);
    }

    #[test]
    fn timeout_is_not_retried() {
        let d = retrying(
            Scripted::always(Err(TransportError::Timeout)),
            RetryConfig::new(4, 1, 1),
        );
        let err = d.execute(&request(), &CallContext::background()).unwrap_err();
        assert_eq!(err, DispatchError::Transport(TransportError::Timeout));
        assert_eq!(calls(&d), 1);
    }

    #[test]
    fn deadline_cuts_backoff_short() {
        let d = retrying(Scripted::always(refused()), RetryConfig::new(5, 10_000, 1));
        let ctx = CallContext::with_timeout(Duration::from_millis(100));
        let started = Instant::now();
        let err = d.execute(&request(), &ctx).unwrap_err();
        assert_eq!(err, DispatchError::DeadlineExceeded);
        assert_eq!(calls(&d), 1);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn cancel_interrupts_backoff() {
        let token = CancelToken::new();
        let ctx = CallContext::background().with_cancel(token.clone());
        let d = retrying(Scripted::always(refused()), RetryConfig::new(5, 10_000, 1));

        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            token.cancel();
        });
        let started = Instant::now();
        let err = d.execute(&request(), &ctx).unwrap_err();
        canceller.join().unwrap();

        assert_eq!(err, DispatchError::Cancelled);
        assert_eq!(calls(&d), 1);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn cancel_abandons_blocked_attempt() {
        let transport = |_: &HttpRequest, _: Option<Duration>| {
            std::thread::sleep(Duration::from_secs(3));
            Ok::<_, TransportError>(HttpResponse::new(200, ""))
        };
        let d = DirectDispatcher::new(transport, None);
        let token = CancelToken::new();
        let ctx = CallContext::background().with_cancel(token.clone());

        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            token.cancel();
        });
        let started = Instant::now();
        let err = d.execute(&request(), &ctx).unwrap_err();
        canceller.join().unwrap();

        assert_eq!(err, DispatchError::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn cancellable_attempt_returns_transport_result() {
        let d = DirectDispatcher::new(Scripted::always(ok(201)), None);
        let ctx = CallContext::background().with_cancel(CancelToken::new());
        assert_eq!(d.execute(&request(), &ctx).unwrap().status, 201);

        let d = DirectDispatcher::new(Scripted::always(refused()), None);
        assert_eq!(
            d.execute(&request(), &ctx).unwrap_err(),
            DispatchError::Transport(TransportError::Failure("connection refused".into()))
        );
    }

    #[test]
    fn cancelled_before_start_sends_nothing() {
        let token = CancelToken::new();
        token.cancel();
        let ctx = CallContext::background().with_cancel(token);
        let d = retrying(Scripted::always(ok(200)), RetryConfig::new(3, 1, 1));
        assert_eq!(d.execute(&request(), &ctx).unwrap_err(), DispatchError::Cancelled);
        assert_eq!(calls(&d), 0);
    }

    #[test]
    fn shared_across_threads() {
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = counter.clone();
        let transport = move |_: &HttpRequest, _: Option<Duration>| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok::<_, TransportError>(HttpResponse::new(200, ""))
        };
        let d: Arc<dyn Dispatcher> = Arc::new(RetryingDispatcher::new(
            DirectDispatcher::new(transport, None),
            RetryConfig::new(3, 1, 1),
        ));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let d = d.clone();
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        d.execute(&request(), &CallContext::background()).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 80);
    }
}
