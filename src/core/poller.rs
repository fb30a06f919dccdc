//! # Bounded fixed-interval polling.
//!
//! The host page renders asynchronously, so most of what the runtime needs
//! (the loading wheel, the counter, the login panel) has to be waited for.
//! [`poll`] re-runs a search until a predicate accepts its result or the
//! retry budget runs out; [`RetryPoller`] wraps it in a spawned task with
//! callbacks and ties every chain to one cancellation token.
//!
//! ## Chain
//! ```text
//! attempt 1 ── search() ─► is_found? ── yes ─► Found { value, attempt: 1 }
//!                              │ no
//!                       sleep(interval)
//! attempt 2 ── search() ─► is_found? ── yes ─► Found { value, attempt: 2 }
//!    ...                       │ no
//! attempt N+1 ─ search() ─► is_found? ─ no ─► Exhausted { attempts: N+1 }
//!
//! search() returns Err ──► PollError::SearchFailed (chain aborted)
//! token cancelled      ──► Cancelled (nothing delivered)
//! ```
//!
//! ## Rules
//! - Attempts are strictly sequential; the next one starts after the previous
//!   one returned and the interval elapsed.
//! - `max_retries = N` evaluates the predicate at most `N + 1` times.
//! - Each chain owns its countdown; chains never share state.
//! - Exhaustion is an outcome, not an error.

use std::fmt::Display;
use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::PollError;
use crate::page::{NodeRef, Page, Selector};
use crate::policies::RetryPolicy;

/// Result of a bounded wait that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    /// The predicate accepted a candidate.
    Found {
        /// Accepted candidate.
        value: T,
        /// Attempt (1-based) that produced it.
        attempt: u32,
    },
    /// Every attempt was rejected.
    Exhausted {
        /// Number of evaluations performed.
        attempts: u32,
    },
    /// The owning runtime tore the chain down.
    Cancelled {
        /// Evaluations performed before cancellation.
        attempts: u32,
    },
}

impl<T> PollOutcome<T> {
    /// Returns the accepted candidate, if any.
    pub fn found(self) -> Option<T> {
        match self {
            PollOutcome::Found { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, PollOutcome::Found { .. })
    }
}

/// Runs a bounded search.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use pagevisor::{poll, PollOutcome, RetryPolicy};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let mut n = 0;
/// let outcome = poll(
///     || -> Result<u32, std::convert::Infallible> { n += 1; Ok(n) },
///     |v| *v == 3,
///     RetryPolicy::new(Duration::from_millis(1), 10),
/// )
/// .await
/// .unwrap();
///
/// assert_eq!(outcome, PollOutcome::Found { value: 3, attempt: 3 });
/// # }
/// ```
pub async fn poll<T, E, S, P>(
    search: S,
    is_found: P,
    policy: RetryPolicy,
) -> Result<PollOutcome<T>, PollError>
where
    E: Display,
    S: FnMut() -> Result<T, E>,
    P: Fn(&T) -> bool,
{
    run_chain(search, is_found, policy, None).await
}

async fn run_chain<T, E, S, P>(
    mut search: S,
    is_found: P,
    policy: RetryPolicy,
    token: Option<&CancellationToken>,
) -> Result<PollOutcome<T>, PollError>
where
    E: Display,
    S: FnMut() -> Result<T, E>,
    P: Fn(&T) -> bool,
{
    let attempts = policy.max_attempts();
    let mut attempt = 0u32;

    loop {
        if token.is_some_and(CancellationToken::is_cancelled) {
            return Ok(PollOutcome::Cancelled { attempts: attempt });
        }

        attempt += 1;
        let candidate = search().map_err(|e| PollError::SearchFailed {
            attempt,
            reason: e.to_string(),
        })?;
        if is_found(&candidate) {
            return Ok(PollOutcome::Found {
                value: candidate,
                attempt,
            });
        }
        drop(candidate);

        if attempt >= attempts {
            return Ok(PollOutcome::Exhausted { attempts });
        }
        trace!(attempt, remaining = attempts - attempt, "not found yet");

        let delay = policy.delay(attempt - 1);
        match token {
            Some(token) => {
                tokio::select! {
                    _ = token.cancelled() => {
                        return Ok(PollOutcome::Cancelled { attempts: attempt });
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            None => tokio::time::sleep(delay).await,
        }
    }
}

/// Callback fired once when a wait exhausts its budget.
pub type ExhaustedFn = Box<dyn FnOnce() + Send + 'static>;

/// Spawns and cancels bounded waits.
///
/// Every chain started from one poller (or a clone of it) stops as soon as
/// the poller's token is cancelled. Cloning is cheap.
#[derive(Clone, Debug)]
pub struct RetryPoller {
    policy: RetryPolicy,
    token: CancellationToken,
}

impl Default for RetryPoller {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl RetryPoller {
    /// Creates a poller with its own cancellation token.
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_token(policy, CancellationToken::new())
    }

    /// Creates a poller bound to an existing token.
    pub fn with_token(policy: RetryPolicy, token: CancellationToken) -> Self {
        Self { policy, token }
    }

    /// Default policy for calls that don't override it.
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Stops every chain started from this poller.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Runs a cancellable bounded search in the current task.
    pub async fn poll<T, E, S, P>(
        &self,
        search: S,
        is_found: P,
        policy: RetryPolicy,
    ) -> Result<PollOutcome<T>, PollError>
    where
        E: Display,
        S: FnMut() -> Result<T, E>,
        P: Fn(&T) -> bool,
    {
        run_chain(search, is_found, policy, Some(&self.token)).await
    }

    /// Spawns a bounded search with callbacks.
    ///
    /// - `on_found(value)` fires once, in the attempt that found it.
    /// - `on_exhausted()` fires once when every attempt was rejected.
    /// - `max_retries` overrides the default budget; the interval stays.
    ///
    /// At most one of the two callbacks fires. A failing search aborts the
    /// chain without calling either and is logged.
    pub fn wait_for<T, E, S, P, F>(
        &self,
        search: S,
        is_found: P,
        on_found: F,
        max_retries: Option<u32>,
        on_exhausted: Option<ExhaustedFn>,
    ) -> JoinHandle<()>
    where
        T: Send + 'static,
        E: Display + Send + 'static,
        S: FnMut() -> Result<T, E> + Send + 'static,
        P: Fn(&T) -> bool + Send + 'static,
        F: FnOnce(T) + Send + 'static,
    {
        let policy = match max_retries {
            Some(n) => self.policy.with_max_retries(n),
            None => self.policy,
        };
        self.wait_with(policy, search, is_found, on_found, on_exhausted)
    }

    /// Like [`wait_for`](Self::wait_for) with a full per-call policy.
    pub fn wait_with<T, E, S, P, F>(
        &self,
        policy: RetryPolicy,
        search: S,
        is_found: P,
        on_found: F,
        on_exhausted: Option<ExhaustedFn>,
    ) -> JoinHandle<()>
    where
        T: Send + 'static,
        E: Display + Send + 'static,
        S: FnMut() -> Result<T, E> + Send + 'static,
        P: Fn(&T) -> bool + Send + 'static,
        F: FnOnce(T) + Send + 'static,
    {
        let token = self.token.clone();
        tokio::spawn(async move {
            match run_chain(search, is_found, policy, Some(&token)).await {
                Ok(PollOutcome::Found { value, attempt }) => {
                    trace!(attempt, "wait satisfied");
                    on_found(value);
                }
                Ok(PollOutcome::Exhausted { attempts }) => {
                    debug!(attempts, "wait exhausted");
                    if let Some(on_exhausted) = on_exhausted {
                        on_exhausted();
                    }
                }
                Ok(PollOutcome::Cancelled { attempts }) => {
                    trace!(attempts, "wait cancelled");
                }
                Err(e) => {
                    warn!(error = %e, label = e.as_label(), "wait aborted");
                }
            }
        })
    }

    /// Waits for the first element matching `selector`.
    ///
    /// Resolves to `None` when the budget runs out or the poller is
    /// cancelled.
    pub async fn element(
        &self,
        page: &dyn Page,
        selector: &Selector,
        policy: RetryPolicy,
    ) -> Result<Option<NodeRef>, PollError> {
        let outcome = self
            .poll(|| page.query(selector), Option::is_some, policy)
            .await?;
        if !outcome.is_found() {
            debug!(%selector, "element did not appear");
        }
        Ok(outcome.found().flatten())
    }

    /// Waits until `selector` matches at least one element, then returns
    /// every match.
    pub async fn elements(
        &self,
        page: &dyn Page,
        selector: &Selector,
        policy: RetryPolicy,
    ) -> Result<Option<Vec<NodeRef>>, PollError> {
        let outcome = self
            .poll(|| page.query_all(selector), |v| !v.is_empty(), policy)
            .await?;
        if !outcome.is_found() {
            debug!(%selector, "elements did not appear");
        }
        Ok(outcome.found())
    }

    /// Spawns `fut` unless the poller is already cancelled; the task stops
    /// at the next await once it is.
    pub(crate) fn spawn_guarded<Fut>(&self, fut: Fut) -> Option<JoinHandle<()>>
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.token.is_cancelled() {
            return None;
        }
        let handle = tokio::runtime::Handle::try_current().ok()?;
        let token = self.token.clone();
        Some(handle.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = fut => {}
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::time::Instant;

    use crate::page::{Element, MemoryPage};

    fn counting(calls: &Arc<AtomicU32>) -> impl FnMut() -> Result<u32, Infallible> + Send + 'static {
        let calls = Arc::clone(calls);
        move || Ok(calls.fetch_add(1, Ordering::SeqCst) + 1)
    }

    const POLICY: RetryPolicy = RetryPolicy::new(Duration::from_millis(250), 10);

    #[tokio::test(start_paused = true)]
    async fn found_on_third_attempt_after_two_intervals() {
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let outcome = poll(counting(&calls), |n| *n == 3, POLICY).await.unwrap();

        assert_eq!(outcome, PollOutcome::Found { value: 3, attempt: 3 });
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn never_found_evaluates_retries_plus_one() {
        for retries in [0u32, 1, 4, 10] {
            let calls = Arc::new(AtomicU32::new(0));
            let policy = POLICY.with_max_retries(retries);

            let outcome = poll(counting(&calls), |_| false, policy).await.unwrap();

            assert_eq!(outcome, PollOutcome::Exhausted { attempts: retries + 1 });
            assert_eq!(calls.load(Ordering::SeqCst), retries + 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failing_search_aborts_chain() {
        let mut calls = 0u32;
        let res = poll(
            || {
                calls += 1;
                if calls == 2 {
                    Err("boom")
                } else {
                    Ok(calls)
                }
            },
            |_| false,
            POLICY,
        )
        .await;

        assert_eq!(
            res,
            Err(PollError::SearchFailed {
                attempt: 2,
                reason: "boom".into()
            })
        );
        assert_eq!(calls, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_fires_on_found_once() {
        let poller = RetryPoller::new(POLICY);
        let found = Arc::new(AtomicU32::new(0));
        let exhausted = Arc::new(AtomicU32::new(0));
        let calls = Arc::new(AtomicU32::new(0));

        let f = Arc::clone(&found);
        let x = Arc::clone(&exhausted);
        poller
            .wait_for(
                counting(&calls),
                |n| *n == 2,
                move |n| {
                    f.fetch_add(n, Ordering::SeqCst);
                },
                None,
                Some(Box::new(move || {
                    x.fetch_add(1, Ordering::SeqCst);
                })),
            )
            .await
            .unwrap();

        assert_eq!(found.load(Ordering::SeqCst), 2);
        assert_eq!(exhausted.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_fires_on_exhausted_once() {
        let poller = RetryPoller::new(POLICY);
        let found = Arc::new(AtomicU32::new(0));
        let exhausted = Arc::new(AtomicU32::new(0));
        let calls = Arc::new(AtomicU32::new(0));

        let f = Arc::clone(&found);
        let x = Arc::clone(&exhausted);
        poller
            .wait_for(
                counting(&calls),
                |_| false,
                move |_| {
                    f.fetch_add(1, Ordering::SeqCst);
                },
                Some(3),
                Some(Box::new(move || {
                    x.fetch_add(1, Ordering::SeqCst);
                })),
            )
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(found.load(Ordering::SeqCst), 0);
        assert_eq!(exhausted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retries_checks_once_and_exhausts_silently() {
        let poller = RetryPoller::new(POLICY);
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        poller
            .wait_for(counting(&calls), |_| false, |_| panic!("not found"), Some(0), None)
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn chains_keep_independent_countdowns() {
        let poller = RetryPoller::new(POLICY);
        let a = Arc::new(AtomicU32::new(0));
        let b = Arc::new(AtomicU32::new(0));

        let ha = poller.wait_for(counting(&a), |_| false, |_| {}, Some(2), None);
        let hb = poller.wait_for(counting(&b), |_| false, |_| {}, Some(5), None);
        ha.await.unwrap();
        hb.await.unwrap();

        assert_eq!(a.load(Ordering::SeqCst), 3);
        assert_eq!(b.load(Ordering::SeqCst), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_pending_chain() {
        let poller = RetryPoller::new(POLICY);
        let calls = Arc::new(AtomicU32::new(0));
        let exhausted = Arc::new(AtomicU32::new(0));

        let x = Arc::clone(&exhausted);
        let handle = poller.wait_for(
            counting(&calls),
            |_| false,
            |_| panic!("not found"),
            None,
            Some(Box::new(move || {
                x.fetch_add(1, Ordering::SeqCst);
            })),
        );

        tokio::time::sleep(Duration::from_millis(600)).await;
        poller.cancel();
        handle.await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(exhausted.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_element_rendered_later() {
        let page = Arc::new(MemoryPage::new());
        let poller = RetryPoller::new(POLICY);

        let p = Arc::clone(&page);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(600)).await;
            p.append_to_body(Element::new("div").with_id("clock"));
        });

        let start = Instant::now();
        let node = poller
            .element(page.as_ref(), &Selector::id("clock"), POLICY)
            .await
            .unwrap();

        assert!(node.is_some());
        assert_eq!(start.elapsed(), Duration::from_millis(750));
    }

    #[tokio::test(start_paused = true)]
    async fn elements_wait_needs_a_non_empty_match() {
        let page = MemoryPage::new();
        let poller = RetryPoller::new(POLICY);

        let none = poller
            .elements(&page, &Selector::class("ap"), POLICY.with_max_retries(2))
            .await
            .unwrap();
        assert!(none.is_none());

        page.append_to_body(Element::new("span").with_class("ap"));
        page.append_to_body(Element::new("span").with_class("ap"));
        let some = poller
            .elements(&page, &Selector::class("ap"), POLICY)
            .await
            .unwrap();
        assert_eq!(some.map(|v| v.len()), Some(2));
    }

    #[tokio::test]
    async fn dom_errors_surface_as_search_failures() {
        let page = MemoryPage::new();
        let poller = RetryPoller::default();

        let err = poller
            .element(&page, &Selector::query("a:hover"), POLICY)
            .await
            .unwrap_err();
        assert_eq!(err.as_label(), "poll_search_failed");
    }
}
