use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use chrono::{DateTime, Utc};
use tokio::{sync::watch, task::JoinHandle, time::sleep};

use crate::{
    api::PriceSource,
    core::{
        document::PriceDocument,
        error::{ErrorKind, FetchError, ScheduleError},
        registry::Registry,
        schedule::ScheduleClock,
        view::ValueView,
    },
    prelude::*,
    quantity::CubicMeterPrice,
};

/// Last-known prices together with the outcome of the most recent fetch.
///
/// Never mutated in place: every refresh publishes a new `Arc<Snapshot>`.
#[derive(Clone, Debug, Default)]
#[must_use]
pub struct Snapshot {
    pub document: Option<Arc<PriceDocument>>,
    pub registry: Arc<Registry>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub last_error: Option<Arc<FetchError>>,
}

impl Snapshot {
    fn succeeded(document: PriceDocument, fetched_at: DateTime<Utc>) -> Self {
        Self {
            registry: Arc::new(Registry::from_document(&document)),
            document: Some(Arc::new(document)),
            fetched_at: Some(fetched_at),
            last_error: None,
        }
    }

    /// Keep the last good document and record the failure.
    fn failed(&self, error: FetchError) -> Self {
        Self { last_error: Some(Arc::new(error)), ..self.clone() }
    }

    /// Whether at least one fetch has ever succeeded.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.document.is_some()
    }

    #[must_use]
    pub fn last_error_kind(&self) -> Option<ErrorKind> {
        self.last_error.as_deref().map(FetchError::kind)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, derive_more::Display)]
pub enum State {
    /// No successful fetch yet, possibly with a failed one.
    Idle,

    FetchInFlight,

    /// The most recent fetch succeeded.
    Ready,

    /// The most recent fetch failed, an older snapshot is still served.
    Degraded,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[must_use]
pub enum Outcome {
    Updated,
    Failed(ErrorKind),

    /// Another fetch was already in flight, nothing was sent.
    Coalesced,
}

/// Owns the price snapshot and drives the daily refresh.
pub struct Coordinator<S> {
    source: S,
    clock: ScheduleClock,
    snapshot: watch::Sender<Arc<Snapshot>>,
    is_fetching: AtomicBool,
}

impl<S: PriceSource> Coordinator<S> {
    pub fn new(source: S, clock: ScheduleClock) -> Self {
        let (snapshot, _) = watch::channel(Arc::default());
        Self { source, clock, snapshot, is_fetching: AtomicBool::new(false) }
    }

    /// Current snapshot, never waits for an in-flight fetch.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&*self.snapshot.borrow())
    }

    /// Receiver that is notified on every published snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshot.subscribe()
    }

    pub fn view(&self, identifier: impl Into<String>) -> ValueView {
        ValueView::new(identifier, self.subscribe())
    }

    #[must_use]
    pub fn state(&self) -> State {
        if self.is_fetching.load(Ordering::Acquire) {
            return State::FetchInFlight;
        }
        let snapshot = self.snapshot.borrow();
        match (snapshot.is_available(), snapshot.last_error.is_some()) {
            (false, _) => State::Idle,
            (true, false) => State::Ready,
            (true, true) => State::Degraded,
        }
    }

    #[must_use]
    pub fn identifiers(&self) -> Vec<String> {
        self.snapshot.borrow().registry.identifiers().map(str::to_string).collect()
    }

    #[must_use]
    pub fn resolve(&self, identifier: &str) -> Option<CubicMeterPrice> {
        self.snapshot.borrow().registry.resolve(identifier)
    }

    /// Fetch the current window and publish the result.
    ///
    /// A call made while another fetch is in flight returns [`Outcome::Coalesced`] right away.
    #[instrument(skip_all)]
    pub async fn refresh(&self) -> Result<Outcome, ScheduleError> {
        let Some(_guard) = FetchGuard::try_acquire(&self.is_fetching) else {
            info!("a fetch is already in flight, skipping");
            return Ok(Outcome::Coalesced);
        };
        let window = self.clock.window(Utc::now())?;
        let result = self.source.fetch(&window).await;

        let (snapshot, outcome) = match result {
            Ok(document) => {
                let snapshot = Snapshot::succeeded(document, Utc::now());
                if snapshot.registry.is_empty() {
                    warn!("the response has no current interval, no values can be derived");
                }
                info!(n_values = snapshot.registry.len(), "refreshed");
                (snapshot, Outcome::Updated)
            }
            Err(error) => {
                let kind = error.kind();
                warn!(%kind, "fetch failed, keeping the last snapshot: {error}");
                (self.snapshot.borrow().failed(error), Outcome::Failed(kind))
            }
        };
        self.snapshot.send_replace(Arc::new(snapshot));
        Ok(outcome)
    }
}

impl<S: PriceSource + 'static> Coordinator<S> {
    /// Refresh right away, then at every new-prices boundary.
    ///
    /// Dropping or shutting down the returned handle cancels the timer. A fetch that is
    /// already in flight still completes and publishes its result.
    pub fn spawn(self: Arc<Self>) -> Handle {
        Handle(Some(tokio::spawn(self.run())))
    }

    async fn run(self: Arc<Self>) {
        loop {
            // Detached: aborting the timer must not abort the fetch.
            let fetch = tokio::spawn({
                let this = Arc::clone(&self);
                async move { this.refresh().await }
            });
            match fetch.await {
                Ok(Ok(Outcome::Failed(kind))) => {
                    warn!(%kind, "serving the last snapshot until the next boundary");
                }
                Ok(Ok(Outcome::Updated | Outcome::Coalesced)) => {}
                Ok(Err(error)) => {
                    error!("failed to compute the query window: {error:#}");
                    break;
                }
                Err(error) => {
                    error!("the refresh task failed: {error:#}");
                }
            }

            let now = Utc::now();
            let next_refresh = match self.clock.next_refresh(now) {
                Ok(next_refresh) => next_refresh,
                Err(error) => {
                    error!("failed to schedule the next refresh: {error:#}");
                    break;
                }
            };
            info!(next_refresh = %next_refresh.to_rfc3339(), "sleeping…");
            sleep((next_refresh.with_timezone(&Utc) - now).to_std().unwrap_or_default()).await;
        }
    }
}

/// Refresh timer of a spawned [`Coordinator`].
#[must_use]
pub struct Handle(Option<JoinHandle<()>>);

impl Handle {
    /// Cancel the timer and wait until it stops.
    pub async fn shutdown(mut self) {
        if let Some(timer) = self.0.take() {
            timer.abort();
            let _ = timer.await;
            info!("the refresh timer has stopped");
        }
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if let Some(timer) = &self.0 {
            timer.abort();
        }
    }
}

/// Holds the in-flight flag and releases it on drop, even if the fetch is cancelled.
struct FetchGuard<'a>(&'a AtomicBool);

impl<'a> FetchGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).ok()?;
        Some(Self(flag))
    }
}

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
