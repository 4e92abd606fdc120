//! On-demand component loading with bounded retry.
//!
//! A load is attempted up to three times with exponential backoff (1s, then
//! 2s). Once attempts are spent the caller gets [`LoadError::Exhausted`] naming
//! the component, so it can render a stable fallback instead of the raw
//! failure. There is no cancellation: a started sequence runs to completion.

use std::error::Error as StdError;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, warn};

pub type BoxError = Box<dyn StdError + Send + Sync>;

type LoadFuture<T> = Pin<Box<dyn Future<Output = Result<T, BoxError>> + Send>>;
type Loader<T> = dyn Fn() -> LoadFuture<T> + Send + Sync;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to load component `{component}` after {attempts} attempts")]
    Exhausted {
        component: String,
        attempts: u32,
        #[source]
        source: BoxError,
    },
}

impl LoadError {
    #[must_use]
    pub fn component(&self) -> &str {
        match self {
            LoadError::Exhausted { component, .. } => component,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    /// 3 attempts, waiting 1s then 2s between them.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    #[must_use]
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait after the given failed attempt (1-based): base, 2x base, 4x base...
    #[must_use]
    pub fn backoff(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(2u32.pow(exponent))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs `loader` until it succeeds or the policy's attempts are spent.
///
/// # Errors
/// Returns [`LoadError::Exhausted`] carrying the last failure.
pub async fn load_with_retry<T, E, F, Fut>(
    component: &str,
    policy: &RetryPolicy,
    mut loader: F,
) -> Result<T, LoadError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Into<BoxError>,
{
    let mut attempt = 1;
    loop {
        match loader().await {
            Ok(loaded) => {
                debug!(component, attempt, "component loaded");
                return Ok(loaded);
            }
            Err(err) => {
                let err = err.into();
                if attempt >= policy.max_attempts {
                    error!(component, attempts = attempt, "component failed to load: {err}");
                    return Err(LoadError::Exhausted {
                        component: component.to_string(),
                        attempts: attempt,
                        source: err,
                    });
                }

                let delay = policy.backoff(attempt);
                warn!(
                    component,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "component load failed, retrying: {err}"
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

struct Inner<T> {
    name: String,
    policy: RetryPolicy,
    loader: Box<Loader<T>>,
    cell: OnceCell<T>,
}

/// Component loaded once on first use (or on [`LazyComponent::preload`]) and
/// cached afterwards. Clones share the cache.
pub struct LazyComponent<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for LazyComponent<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for LazyComponent<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyComponent")
            .field("name", &self.inner.name)
            .field("loaded", &self.inner.cell.initialized())
            .finish_non_exhaustive()
    }
}

impl<T> LazyComponent<T>
where
    T: Send + Sync + 'static,
{
    /// Component retried with the default [`RetryPolicy`].
    pub fn new<F, Fut, E>(name: impl Into<String>, loader: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        Self::with_retry_policy(name, RetryPolicy::new(), loader)
    }

    /// Component retried with `policy`. The policy is fixed for the
    /// component's lifetime and shared by every clone.
    pub fn with_retry_policy<F, Fut, E>(
        name: impl Into<String>,
        policy: RetryPolicy,
        loader: F,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        let loader: Box<Loader<T>> = Box::new(move || -> LoadFuture<T> {
            let load = loader();
            Box::pin(async move { load.await.map_err(|err| -> BoxError { err.into() }) })
        });
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                policy,
                loader,
                cell: OnceCell::new(),
            }),
        }
    }

    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        self.inner.policy
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.inner.cell.initialized()
    }

    /// Returns the component, loading it with retries if needed. Concurrent
    /// callers share one in-flight load.
    ///
    /// # Errors
    /// Returns [`LoadError::Exhausted`] if every attempt failed.
    pub async fn get(&self) -> Result<&T, LoadError> {
        let inner = &self.inner;
        inner
            .cell
            .get_or_try_init(|| load_with_retry(&inner.name, &inner.policy, || (inner.loader)()))
            .await
    }

    /// Starts loading ahead of navigation. A later [`get`](Self::get) reuses the result.
    pub fn preload(&self) -> JoinHandle<()> {
        let component = self.clone();
        tokio::spawn(async move {
            if let Err(err) = component.get().await {
                warn!(component = %component.name(), "preload failed: {err}");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn flaky(failures: u32, calls: Arc<AtomicU32>) -> impl Fn() -> LoadFuture<&'static str> {
        move || -> LoadFuture<&'static str> {
            let calls = Arc::clone(&calls);
            Box::pin(async move {
                let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
                let loaded: Result<&'static str, BoxError> = if call <= failures {
                    Err(format!("chunk fetch failed ({call})").into())
                } else {
                    Ok("dashboard")
                };
                loaded
            })
        }
    }

    #[test]
    fn backoff_doubles_from_base() {
        let policy = RetryPolicy::new();
        assert_eq!(policy.backoff(1), Duration::from_millis(1000));
        assert_eq!(policy.backoff(2), Duration::from_millis(2000));
        assert_eq!(policy.backoff(3), Duration::from_millis(4000));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_two_failures_with_two_waits() {
        let calls = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let loaded =
            load_with_retry("Dashboard", &RetryPolicy::new(), flaky(2, Arc::clone(&calls))).await;

        assert_eq!(loaded.ok(), Some("dashboard"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 1s + 2s of backoff, nothing more.
        assert_eq!(started.elapsed(), Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_names_the_component() {
        let calls = Arc::new(AtomicU32::new(0));

        let result =
            load_with_retry("Reports", &RetryPolicy::new(), flaky(u32::MAX, Arc::clone(&calls)))
                .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let err = result.err();
        assert_eq!(err.as_ref().map(LoadError::component), Some("Reports"));
        assert!(matches!(err, Some(LoadError::Exhausted { attempts: 3, .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn preload_warms_the_cache() {
        let calls = Arc::new(AtomicU32::new(0));
        let component = LazyComponent::new("Agenda", flaky(1, Arc::clone(&calls)));
        assert!(!component.is_loaded());

        component.preload().await.ok();
        assert!(component.is_loaded());

        assert_eq!(component.get().await.ok().copied(), Some("dashboard"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_load_can_be_retried_later() {
        let calls = Arc::new(AtomicU32::new(0));
        let component = LazyComponent::with_retry_policy(
            "Finance",
            RetryPolicy::new().with_base_delay(Duration::from_millis(10)),
            flaky(3, Arc::clone(&calls)),
        );

        assert!(component.get().await.is_err());
        assert!(!component.is_loaded());

        assert_eq!(component.get().await.ok().copied(), Some("dashboard"));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_policy_is_shared_by_clones() {
        let calls = Arc::new(AtomicU32::new(0));
        let component = LazyComponent::with_retry_policy(
            "Reports",
            RetryPolicy::new().with_max_attempts(1),
            flaky(1, Arc::clone(&calls)),
        );
        let preloaded = component.clone();
        assert_eq!(preloaded.policy().max_attempts(), 1);

        let started = Instant::now();
        match preloaded.get().await {
            Err(LoadError::Exhausted { attempts, .. }) => assert_eq!(attempts, 1),
            Ok(_) => panic!("single attempt should fail"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);

        assert_eq!(component.get().await.ok().copied(), Some("dashboard"));
    }
}
