//! Condition polling for eventually-consistent cluster state
//!
//! Provides `wait` for blocking until a fetched value satisfies a predicate,
//! and the `ignore_if_*` helpers that make create/delete calls idempotent.
//!
//! Fetch errors are classified into an [`ErrorKind`]. A wait only swallows
//! the kinds it was told to tolerate; anything else is returned on the spot.
//!
//! # Example
//!
//! ```ignore
//! use operator_e2e::conditions::{wait, ErrorKind, WaitOptions};
//! use std::time::Duration;
//!
//! let options = WaitOptions::new(Duration::from_secs(50), Duration::from_secs(5))
//!     .tolerate(ErrorKind::NotFound);
//!
//! let running = wait(
//!     || pods.get("test-runner"),
//!     |pod| pod_phase(pod) == Some("Running"),
//!     &options,
//! )
//! .await?;
//! ```

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, trace};

/// Category of a failed cluster operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    Conflict,
    Forbidden,
    Unauthorized,
    Invalid,
    Unavailable,
    Timeout,
    Other,
}

impl ErrorKind {
    /// Classify a status code and reason returned by the API server
    pub fn from_status(code: u16, reason: &str) -> Self {
        match code {
            404 => Self::NotFound,
            409 if reason == "AlreadyExists" => Self::AlreadyExists,
            409 => Self::Conflict,
            403 => Self::Forbidden,
            401 => Self::Unauthorized,
            400 | 422 => Self::Invalid,
            429 | 500..=599 => Self::Unavailable,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotFound => "not found",
            Self::AlreadyExists => "already exists",
            Self::Conflict => "conflict",
            Self::Forbidden => "forbidden",
            Self::Unauthorized => "unauthorized",
            Self::Invalid => "invalid",
            Self::Unavailable => "unavailable",
            Self::Timeout => "timeout",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// Errors that can be sorted into an [`ErrorKind`]
pub trait Classify {
    fn kind(&self) -> ErrorKind;
}

impl Classify for kube::Error {
    fn kind(&self) -> ErrorKind {
        match self {
            kube::Error::Api(response) => ErrorKind::from_status(response.code, &response.reason),
            // Local failures building a request or decoding a response
            kube::Error::SerdeError(_)
            | kube::Error::FromUtf8(_)
            | kube::Error::BuildRequest(_)
            | kube::Error::HttpError(_) => ErrorKind::Other,
            // Transport, TLS and auth failures: the API server was not reached
            _ => ErrorKind::Unavailable,
        }
    }
}

/// Timing and error tolerance for a single wait
#[derive(Debug, Clone)]
pub struct WaitOptions {
    /// Give up once this much time has passed without the condition holding
    pub timeout: Duration,
    /// Delay between attempts
    pub interval: Duration,
    /// Fetch error kinds treated as "not ready yet"
    pub tolerated: HashSet<ErrorKind>,
}

impl WaitOptions {
    /// Create options with no tolerated error kinds
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self {
            timeout,
            interval,
            tolerated: HashSet::new(),
        }
    }

    /// Treat fetch errors of this kind as "not ready yet"
    pub fn tolerate(mut self, kind: ErrorKind) -> Self {
        self.tolerated.insert(kind);
        self
    }

    pub fn tolerates(&self, kind: ErrorKind) -> bool {
        self.tolerated.contains(&kind)
    }
}

/// Default timeout: 5 seconds
/// Default interval: 500ms
impl Default for WaitOptions {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), Duration::from_millis(500))
    }
}

/// Result of a completed wait
#[derive(Debug)]
pub enum Outcome<V> {
    /// The predicate held for `value`
    Ready {
        value: V,
        attempts: u32,
        elapsed: Duration,
    },
    /// The deadline passed first. `last` is the most recent value fetched
    /// successfully, if any.
    TimedOut {
        last: Option<V>,
        attempts: u32,
        elapsed: Duration,
    },
}

impl<V> Outcome<V> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Outcome::Ready { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Outcome::Ready { attempts, .. } | Outcome::TimedOut { attempts, .. } => *attempts,
        }
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            Outcome::Ready { elapsed, .. } | Outcome::TimedOut { elapsed, .. } => *elapsed,
        }
    }
}

/// Poll `fetch` until `predicate` holds or `options.timeout` elapses
///
/// Always fetches at least once. Returns immediately, without sleeping, once
/// the predicate holds. A fetch error outside `options.tolerated` is returned
/// as-is and ends the wait.
pub async fn poll_until<F, Fut, P, V, E>(
    mut fetch: F,
    predicate: P,
    options: &WaitOptions,
) -> Result<Outcome<V>, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<V, E>>,
    P: Fn(&V) -> bool,
    E: Classify + fmt::Display,
{
    let start = Instant::now();
    let mut attempts = 0u32;
    let mut last = None;

    loop {
        attempts += 1;

        match fetch().await {
            Ok(value) => {
                if predicate(&value) {
                    let elapsed = start.elapsed();
                    debug!(attempts, elapsed = ?elapsed, "Condition met");
                    return Ok(Outcome::Ready {
                        value,
                        attempts,
                        elapsed,
                    });
                }
                trace!(attempts, elapsed = ?start.elapsed(), "Condition not met yet");
                last = Some(value);
            }
            Err(err) => {
                let kind = err.kind();
                if !options.tolerates(kind) {
                    debug!(attempts, kind = %kind, error = %err, "Fetch failed, giving up");
                    return Err(err);
                }
                debug!(attempts, kind = %kind, error = %err, "Tolerated fetch error");
            }
        }

        let elapsed = start.elapsed();
        if elapsed >= options.timeout {
            debug!(attempts, elapsed = ?elapsed, timeout = ?options.timeout, "Wait timed out");
            return Ok(Outcome::TimedOut {
                last,
                attempts,
                elapsed,
            });
        }

        sleep(options.interval).await;
    }
}

/// Poll until `predicate` holds; `true` on success, `false` on timeout
pub async fn wait<F, Fut, P, V, E>(fetch: F, predicate: P, options: &WaitOptions) -> Result<bool, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<V, E>>,
    P: Fn(&V) -> bool,
    E: Classify + fmt::Display,
{
    Ok(poll_until(fetch, predicate, options).await?.is_ready())
}

/// Run `operation`, treating an "already exists" failure as success
///
/// Returns `Ok(None)` when the failure was suppressed.
pub async fn ignore_if_already_exists<F, Fut, T, E>(operation: F) -> Result<Option<T>, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify + fmt::Display,
{
    ignore_kind(ErrorKind::AlreadyExists, operation).await
}

/// Run `operation`, treating a "not found" failure as success
///
/// Returns `Ok(None)` when the failure was suppressed.
pub async fn ignore_if_doesnt_exist<F, Fut, T, E>(operation: F) -> Result<Option<T>, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify + fmt::Display,
{
    ignore_kind(ErrorKind::NotFound, operation).await
}

async fn ignore_kind<F, Fut, T, E>(kind: ErrorKind, operation: F) -> Result<Option<T>, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify + fmt::Display,
{
    match operation().await {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.kind() == kind => {
            debug!(kind = %kind, error = %err, "Ignoring expected error");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Debug)]
    struct FakeError(ErrorKind);

    impl fmt::Display for FakeError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "fake error: {}", self.0)
        }
    }

    impl Classify for FakeError {
        fn kind(&self) -> ErrorKind {
            self.0
        }
    }

    /// Minimal stand-in for an API server that refuses duplicate creates
    /// and deletes of unknown names
    #[derive(Default)]
    struct FakeStore {
        names: Mutex<HashSet<String>>,
    }

    impl FakeStore {
        async fn create(&self, name: &str) -> Result<(), FakeError> {
            if self.names.lock().unwrap().insert(name.to_string()) {
                Ok(())
            } else {
                Err(FakeError(ErrorKind::AlreadyExists))
            }
        }

        async fn delete(&self, name: &str) -> Result<(), FakeError> {
            if self.names.lock().unwrap().remove(name) {
                Ok(())
            } else {
                Err(FakeError(ErrorKind::NotFound))
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_succeeds_immediately_without_sleeping() {
        let start = Instant::now();
        let options = WaitOptions::new(Duration::from_secs(10), Duration::from_secs(1));

        let ready = wait(
            || async { Ok::<_, FakeError>("Running") },
            |phase: &&str| *phase == "Running",
            &options,
        )
        .await
        .unwrap();

        assert!(ready);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_checks_once_when_timeout_shorter_than_interval() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();
        let options = WaitOptions::new(Duration::from_millis(1), Duration::from_secs(1));

        let ready = wait(
            move || {
                let c = counter_clone.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, FakeError>(false)
                }
            },
            |ok: &bool| *ok,
            &options,
        )
        .await
        .unwrap();

        assert!(!ready);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tolerated_errors_time_out_no_earlier_than_deadline() {
        let start = Instant::now();
        let options = WaitOptions::new(Duration::from_secs(3), Duration::from_secs(1))
            .tolerate(ErrorKind::NotFound);

        let outcome = poll_until(
            || async { Err::<bool, _>(FakeError(ErrorKind::NotFound)) },
            |ok: &bool| *ok,
            &options,
        )
        .await
        .unwrap();

        assert!(!outcome.is_ready());
        assert!(start.elapsed() >= Duration::from_secs(3));
        assert!(outcome.elapsed() >= options.timeout);
        match outcome {
            Outcome::TimedOut { last, attempts, .. } => {
                assert!(last.is_none());
                assert_eq!(attempts, 4);
            }
            Outcome::Ready { .. } => panic!("expected TimedOut"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_untolerated_error_propagates_immediately() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();
        let options = WaitOptions::new(Duration::from_secs(10), Duration::from_secs(1))
            .tolerate(ErrorKind::NotFound);

        let result = wait(
            move || {
                let c = counter_clone.clone();
                async move {
                    let count = c.fetch_add(1, Ordering::SeqCst);
                    if count == 0 {
                        Err(FakeError(ErrorKind::NotFound))
                    } else {
                        Err(FakeError(ErrorKind::Forbidden))
                    }
                }
            },
            |_: &bool| true,
            &options,
        )
        .await;

        match result {
            Err(FakeError(kind)) => assert_eq!(kind, ErrorKind::Forbidden),
            Ok(_) => panic!("expected Forbidden to propagate"),
        }
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_pod_becomes_running_before_deadline() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();
        let start = Instant::now();
        let options = WaitOptions::new(Duration::from_secs(10), Duration::from_secs(1));

        let outcome = poll_until(
            move || {
                let c = counter_clone.clone();
                async move {
                    let count = c.fetch_add(1, Ordering::SeqCst);
                    let phase = if count < 3 { "Pending" } else { "Running" };
                    Ok::<_, FakeError>(phase.to_string())
                }
            },
            |phase: &String| phase == "Running",
            &options,
        )
        .await
        .unwrap();

        assert!(outcome.is_ready());
        assert_eq!(outcome.attempts(), 4);
        assert!(start.elapsed() >= Duration::from_secs(3));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_outcome_keeps_last_value() {
        let options = WaitOptions::new(Duration::from_secs(2), Duration::from_secs(1));

        let outcome = poll_until(
            || async { Ok::<_, FakeError>("Pending") },
            |phase: &&str| *phase == "Running",
            &options,
        )
        .await
        .unwrap();

        match outcome {
            Outcome::TimedOut { last, .. } => assert_eq!(last, Some("Pending")),
            Outcome::Ready { .. } => panic!("expected TimedOut"),
        }
    }

    #[tokio::test]
    async fn test_ignore_if_already_exists_is_idempotent() {
        let store = FakeStore::default();

        let first = ignore_if_already_exists(|| store.create("role")).await;
        let second = ignore_if_already_exists(|| store.create("role")).await;

        assert!(matches!(first, Ok(Some(()))));
        assert!(matches!(second, Ok(None)));
    }

    #[tokio::test]
    async fn test_ignore_if_doesnt_exist_on_missing_resource() {
        let store = FakeStore::default();

        let result = ignore_if_doesnt_exist(|| store.delete("test-runner")).await;

        assert!(matches!(result, Ok(None)));
    }

    #[tokio::test]
    async fn test_ignore_helpers_propagate_other_kinds() {
        let result =
            ignore_if_already_exists(|| async { Err::<(), _>(FakeError(ErrorKind::NotFound)) })
                .await;
        assert!(matches!(result, Err(FakeError(ErrorKind::NotFound))));

        let result =
            ignore_if_doesnt_exist(|| async { Err::<(), _>(FakeError(ErrorKind::Forbidden)) })
                .await;
        assert!(matches!(result, Err(FakeError(ErrorKind::Forbidden))));
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(ErrorKind::from_status(404, "NotFound"), ErrorKind::NotFound);
        assert_eq!(
            ErrorKind::from_status(409, "AlreadyExists"),
            ErrorKind::AlreadyExists
        );
        assert_eq!(ErrorKind::from_status(409, "Conflict"), ErrorKind::Conflict);
        assert_eq!(ErrorKind::from_status(403, "Forbidden"), ErrorKind::Forbidden);
        assert_eq!(ErrorKind::from_status(422, "Invalid"), ErrorKind::Invalid);
        assert_eq!(
            ErrorKind::from_status(503, "ServiceUnavailable"),
            ErrorKind::Unavailable
        );
        assert_eq!(ErrorKind::from_status(418, ""), ErrorKind::Other);
    }

    #[test]
    fn test_kube_error_classification() {
        let err = kube::Error::Api(kube::error::ErrorResponse {
            status: "Failure".to_string(),
            message: "pods \"test-runner\" already exists".to_string(),
            reason: "AlreadyExists".to_string(),
            code: 409,
        });
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);

        let err = kube::Error::Api(kube::error::ErrorResponse {
            status: "Failure".to_string(),
            message: "pods \"test-runner\" not found".to_string(),
            reason: "NotFound".to_string(),
            code: 404,
        });
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_non_api_kube_error_classification() {
        let transport = kube::Error::Service(Box::new(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        )));
        assert_eq!(transport.kind(), ErrorKind::Unavailable);

        let decode = kube::Error::SerdeError(serde_json::from_str::<u8>("{").unwrap_err());
        assert_eq!(decode.kind(), ErrorKind::Other);
    }

    #[test]
    fn test_wait_options_defaults() {
        let options = WaitOptions::default();
        assert_eq!(options.timeout, Duration::from_secs(5));
        assert_eq!(options.interval, Duration::from_millis(500));
        assert!(options.tolerated.is_empty());

        let options = options.tolerate(ErrorKind::NotFound);
        assert!(options.tolerates(ErrorKind::NotFound));
        assert!(!options.tolerates(ErrorKind::Forbidden));
    }
}
