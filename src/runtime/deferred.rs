//! Deferred - adapts callback-based native calls into awaitable promises.
//!
//! A `Deferred` is the producer side: native callbacks hold clones of it and
//! settle it exactly once with `resolve` or `reject`, optionally sending any
//! number of `notify` progress values first. A `Promise` is the consumer
//! side: it can be awaited for the outcome and subscribed to for progress.
//!
//! # Progress delivery
//!
//! Each subscriber gets its own unbounded stream. Native plugins may call back
//! synchronously, before the caller had a chance to subscribe, so a new
//! subscriber first receives the retained history (the most recent
//! `PROGRESS_HISTORY_LIMIT` values). Every stream closes once the deferred
//! settles or is abandoned. Notifications after settlement are ignored.

use std::collections::VecDeque;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::api::types::ApiError;

/// Number of progress values replayed to late subscribers
pub const PROGRESS_HISTORY_LIMIT: usize = 256;

type Outcome<T> = Option<Result<T, ApiError>>;

struct ProgressState<P> {
    /// Set once the deferred settles or is abandoned
    closed: bool,
    /// Most recent notifications, oldest first
    history: VecDeque<P>,
    /// Open subscriber streams
    subscribers: Vec<mpsc::UnboundedSender<P>>,
}

struct ProgressHub<P> {
    state: Mutex<ProgressState<P>>,
}

impl<P> ProgressHub<P> {
    fn new() -> Self {
        Self {
            state: Mutex::new(ProgressState {
                closed: false,
                history: VecDeque::new(),
                subscribers: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ProgressState<P>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        state.subscribers.clear();
    }
}

struct DeferredInner<T, P> {
    outcome: watch::Sender<Outcome<T>>,
    progress: Arc<ProgressHub<P>>,
}

impl<T, P> Drop for DeferredInner<T, P> {
    fn drop(&mut self) {
        // Last producer gone: close progress streams so consumers stop waiting
        self.progress.close();
    }
}

/// Producer side of a single asynchronous operation.
pub struct Deferred<T, P = f64> {
    inner: Arc<DeferredInner<T, P>>,
}

impl<T, P> Clone for Deferred<T, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, P> Deferred<T, P>
where
    T: Clone + Send + Sync + 'static,
    P: Clone + Send + 'static,
{
    pub fn new() -> Self {
        let (outcome, _) = watch::channel(None);
        Self {
            inner: Arc::new(DeferredInner {
                outcome,
                progress: Arc::new(ProgressHub::new()),
            }),
        }
    }

    /// Consumer view of this deferred. Can be called any number of times.
    pub fn promise(&self) -> Promise<T, P> {
        Promise {
            outcome: self.inner.outcome.subscribe(),
            progress: Arc::clone(&self.inner.progress),
        }
    }

    /// Settle successfully. Returns `false` if already settled.
    pub fn resolve(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    /// Settle with an error. Returns `false` if already settled.
    pub fn reject(&self, error: ApiError) -> bool {
        self.settle(Err(error))
    }

    /// Send a progress value. Returns `false` if already settled.
    pub fn notify(&self, value: P) -> bool {
        let mut state = self.inner.progress.lock();
        if state.closed {
            return false;
        }

        if state.history.len() == PROGRESS_HISTORY_LIMIT {
            state.history.pop_front();
        }
        state.history.push_back(value.clone());
        state
            .subscribers
            .retain(|subscriber| subscriber.send(value.clone()).is_ok());
        true
    }

    pub fn is_settled(&self) -> bool {
        self.inner.outcome.borrow().is_some()
    }

    fn settle(&self, outcome: Result<T, ApiError>) -> bool {
        let mut state = self.inner.progress.lock();
        if state.closed {
            log::trace!("Ignoring outcome for an already settled deferred");
            return false;
        }

        self.inner.outcome.send_replace(Some(outcome));
        state.closed = true;
        state.subscribers.clear();
        true
    }
}

impl<T, P> Default for Deferred<T, P>
where
    T: Clone + Send + Sync + 'static,
    P: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Consumer side of a `Deferred`.
///
/// Await it (`promise.await`) for the outcome, or use `progress()` and
/// `then()` to observe intermediate values.
pub struct Promise<T, P = f64> {
    outcome: watch::Receiver<Outcome<T>>,
    progress: Arc<ProgressHub<P>>,
}

impl<T, P> Clone for Promise<T, P> {
    fn clone(&self) -> Self {
        Self {
            outcome: self.outcome.clone(),
            progress: Arc::clone(&self.progress),
        }
    }
}

impl<T, P> Promise<T, P>
where
    T: Clone + Send + Sync + 'static,
    P: Clone + Send + 'static,
{
    /// Subscribe to progress values, starting with the retained history.
    pub fn progress(&self) -> mpsc::UnboundedReceiver<P> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.progress.lock();

        for value in &state.history {
            let _ = tx.send(value.clone());
        }
        if !state.closed {
            state.subscribers.push(tx);
        }

        rx
    }

    pub fn is_settled(&self) -> bool {
        self.outcome.borrow().is_some()
    }

    /// Wait for the outcome without consuming the promise.
    ///
    /// Returns `ApiError::Abandoned` if every producer was dropped unsettled.
    pub async fn settled(&self) -> Result<T, ApiError> {
        let mut outcome = self.outcome.clone();
        let settled = match outcome.wait_for(Option::is_some).await {
            Ok(slot) => (*slot).clone(),
            Err(_) => None,
        };
        settled.unwrap_or(Err(ApiError::Abandoned))
    }

    /// Observe the promise with callbacks.
    ///
    /// Spawns a task that delivers every progress value to `on_progress`,
    /// then exactly one of `on_resolve` or `on_reject`.
    pub fn then<R, E, N>(&self, on_resolve: R, on_reject: E, mut on_progress: N) -> JoinHandle<()>
    where
        R: FnOnce(T) + Send + 'static,
        E: FnOnce(ApiError) + Send + 'static,
        N: FnMut(P) + Send + 'static,
    {
        let mut progress = self.progress();
        let promise = self.clone();

        tokio::spawn(async move {
            while let Some(value) = progress.recv().await {
                on_progress(value);
            }
            match promise.settled().await {
                Ok(value) => on_resolve(value),
                Err(error) => on_reject(error),
            }
        })
    }
}

impl<T, P> IntoFuture for Promise<T, P>
where
    T: Clone + Send + Sync + 'static,
    P: Clone + Send + 'static,
{
    type Output = Result<T, ApiError>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.settled().await })
    }
}

/// Drain every value currently buffered in a progress stream.
#[cfg(test)]
pub(crate) fn drain<P>(rx: &mut mpsc::UnboundedReceiver<P>) -> Vec<P> {
    let mut values = Vec::new();
    while let Ok(value) = rx.try_recv() {
        values.push(value);
    }
    values
}
