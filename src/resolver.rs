use crate::catalog::{ArtistSearch, ResolvedArtist};
use crate::config::ResolverConfig;
use crate::normalizer::{normalize, SeparatorPolicy};
use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// The batch was started with nothing to look up
    #[error("No candidate artist names to resolve")]
    NoCandidates,
    #[error("Batch {0} was abandoned before it completed")]
    Abandoned(Uuid),
}

/// A lookup that terminated with an error, tied to the name it was issued for
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupFailure {
    pub name: String,
    pub cause: String,
}

/// Everything a completed batch produced
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub batch_id: Uuid,
    /// Resolved artists, unique by catalog id, in arrival order
    pub artists: Vec<ResolvedArtist>,
    pub failures: Vec<LookupFailure>,
    /// Names whose lookup succeeded without a match
    pub unmatched: Vec<String>,
    pub total: usize,
    pub settled: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchResult {
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// One line describing every failed lookup, or `None` when nothing failed
    #[must_use]
    pub fn failure_summary(&self) -> Option<String> {
        if self.failures.is_empty() {
            return None;
        }
        let details = self
            .failures
            .iter()
            .map(|failure| format!("{} ({})", failure.name, failure.cause))
            .collect::<Vec<_>>()
            .join("; ");
        let noun = if self.total == 1 { "artist" } else { "artists" };
        Some(format!(
            "Could not look up {} of {} {noun}: {details}",
            self.failures.len(),
            self.total
        ))
    }
}

#[derive(Debug, Clone)]
pub enum BatchStatus {
    Running { total: usize, outstanding: usize },
    Complete(Arc<BatchResult>),
    /// The caller walked away; no result will ever be published
    Abandoned,
}

impl BatchStatus {
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self, BatchStatus::Running { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Upper bound for each lookup; `None` waits forever
    pub lookup_timeout: Option<Duration>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            lookup_timeout: Some(DEFAULT_LOOKUP_TIMEOUT),
        }
    }
}

impl ResolveOptions {
    #[must_use]
    pub fn from_config(config: &ResolverConfig) -> Self {
        Self {
            lookup_timeout: match config.lookup_timeout_seconds {
                0 => None,
                seconds => Some(Duration::from_secs(seconds)),
            },
        }
    }
}

/// Caller-side view of one in-flight batch
#[derive(Clone)]
pub struct BatchHandle {
    id: Uuid,
    status: Arc<watch::Sender<BatchStatus>>,
    cancel: CancellationToken,
}

impl BatchHandle {
    fn new(total: usize) -> Self {
        let (status, _) = watch::channel(BatchStatus::Running {
            total,
            outstanding: total,
        });
        Self {
            id: Uuid::new_v4(),
            status: Arc::new(status),
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn status(&self) -> BatchStatus {
        self.status.borrow().clone()
    }

    /// Receive every status change from now on
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<BatchStatus> {
        self.status.subscribe()
    }

    /// Stop observing the batch. Outstanding lookups still run but their
    /// results are dropped. Returns false if the batch had already finished.
    pub fn abandon(&self) -> bool {
        let abandoned = self.status.send_if_modified(|status| {
            if status.is_running() {
                *status = BatchStatus::Abandoned;
                true
            } else {
                false
            }
        });
        self.cancel.cancel();
        if abandoned {
            info!("Abandoned batch {}", self.id);
        }
        abandoned
    }

    /// Wait for the batch to finish; `None` if it was abandoned
    pub async fn wait(&self) -> Option<Arc<BatchResult>> {
        let mut receiver = self.subscribe();
        let status = match receiver.wait_for(|status| !status.is_running()).await {
            Ok(status) => status.clone(),
            Err(_) => return None,
        };
        match status {
            BatchStatus::Complete(result) => Some(result),
            _ => None,
        }
    }
}

impl std::fmt::Debug for BatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchHandle")
            .field("id", &self.id)
            .field("status", &*self.status.borrow())
            .finish()
    }
}

enum LookupOutcome {
    Matched(ResolvedArtist),
    NoMatch,
    Failed(String),
}

/// Accumulated state of a running batch, owned by its aggregating task
struct Accumulator {
    batch_id: Uuid,
    total: usize,
    outstanding: usize,
    seen_ids: HashSet<String>,
    artists: Vec<ResolvedArtist>,
    failures: Vec<LookupFailure>,
    unmatched: Vec<String>,
    started_at: DateTime<Utc>,
}

impl Accumulator {
    fn new(batch_id: Uuid, total: usize) -> Self {
        Self {
            batch_id,
            total,
            outstanding: total,
            seen_ids: HashSet::new(),
            artists: Vec::new(),
            failures: Vec::new(),
            unmatched: Vec::new(),
            started_at: Utc::now(),
        }
    }

    fn record(&mut self, name: String, outcome: LookupOutcome) {
        self.outstanding = self.outstanding.saturating_sub(1);
        match outcome {
            LookupOutcome::Matched(artist) => {
                if self.seen_ids.insert(artist.id.clone()) {
                    debug!("Resolved '{name}' to '{}' ({})", artist.name, artist.id);
                    self.artists.push(artist);
                } else {
                    debug!("'{name}' resolved to already collected artist {}", artist.id);
                }
            }
            LookupOutcome::NoMatch => {
                debug!("No catalog match for '{name}'");
                self.unmatched.push(name);
            }
            LookupOutcome::Failed(cause) => {
                warn!("Lookup for '{name}' failed: {cause}");
                self.failures.push(LookupFailure { name, cause });
            }
        }
    }

    fn finish(self) -> BatchResult {
        BatchResult {
            batch_id: self.batch_id,
            artists: self.artists,
            failures: self.failures,
            unmatched: self.unmatched,
            total: self.total,
            settled: self.total - self.outstanding,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}

async fn run_lookup<Fut, E>(lookup: Fut, timeout: Option<Duration>) -> LookupOutcome
where
    Fut: Future<Output = Result<Option<ResolvedArtist>, E>>,
    E: Display,
{
    let guarded = AssertUnwindSafe(lookup).catch_unwind();
    let settled = match timeout {
        Some(limit) => match tokio::time::timeout(limit, guarded).await {
            Ok(settled) => settled,
            Err(_) => return LookupOutcome::Failed(format!("lookup timed out after {limit:?}")),
        },
        None => guarded.await,
    };

    match settled {
        Ok(Ok(Some(artist))) => LookupOutcome::Matched(artist),
        Ok(Ok(None)) => LookupOutcome::NoMatch,
        Ok(Err(e)) => LookupOutcome::Failed(e.to_string()),
        Err(_) => LookupOutcome::Failed("lookup panicked".to_string()),
    }
}

/// Start one concurrent lookup per name and aggregate them in the background.
///
/// Fails with [`ResolveError::NoCandidates`] without calling `lookup` when
/// `names` is empty. Must be called from within a tokio runtime.
pub fn start_batch<F, Fut, E>(
    names: Vec<String>,
    lookup: F,
    options: ResolveOptions,
) -> Result<BatchHandle, ResolveError>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<Option<ResolvedArtist>, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    if names.is_empty() {
        return Err(ResolveError::NoCandidates);
    }

    let total = names.len();
    let handle = BatchHandle::new(total);
    let mut batch = Accumulator::new(handle.id, total);
    info!("Starting batch {} with {total} lookups", handle.id);

    let mut pending = FuturesUnordered::new();
    for name in names {
        let task = tokio::spawn(run_lookup(lookup(name.clone()), options.lookup_timeout));
        pending.push(async move { (name, task.await) });
    }

    let status = Arc::clone(&handle.status);
    let cancel = handle.cancel.clone();
    tokio::spawn(async move {
        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    // Dropping `pending` detaches the lookup tasks; they finish unobserved
                    debug!(
                        "Batch {} stopped with {} lookups outstanding",
                        batch.batch_id, batch.outstanding
                    );
                    return;
                }
                next = pending.next() => next,
            };
            let Some((name, joined)) = next else {
                break;
            };

            let outcome = joined
                .unwrap_or_else(|e| LookupOutcome::Failed(format!("lookup task failed: {e}")));
            batch.record(name, outcome);

            let outstanding = batch.outstanding;
            status.send_if_modified(|current| match current {
                BatchStatus::Running {
                    outstanding: shown, ..
                } => {
                    *shown = outstanding;
                    true
                }
                _ => false,
            });
        }

        let batch_id = batch.batch_id;
        let result = Arc::new(batch.finish());
        let summary = format!(
            "{} artists, {} failures, {} unmatched",
            result.artists.len(),
            result.failures.len(),
            result.unmatched.len()
        );
        let published = status.send_if_modified(|current| {
            if current.is_running() {
                *current = BatchStatus::Complete(result);
                true
            } else {
                false
            }
        });
        if published {
            info!("Batch {batch_id} complete: {summary}");
        } else {
            debug!("Batch {batch_id} finished after being abandoned; result discarded");
        }
    });

    Ok(handle)
}

/// Resolve every name with `lookup` and wait for the whole batch.
///
/// ```rust
/// use playlist_seeder::catalog::ResolvedArtist;
/// use playlist_seeder::resolver::{resolve_all, ResolveOptions};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let result = resolve_all(
///     vec!["Low".to_string(), "Unknown".to_string()],
///     |name: String| async move {
///         Ok::<_, String>((name == "Low").then(|| ResolvedArtist::new("low", "Low")))
///     },
///     ResolveOptions::default(),
/// )
/// .await
/// .unwrap();
///
/// assert_eq!(result.artists.len(), 1);
/// assert_eq!(result.unmatched, vec!["Unknown"]);
/// # });
/// ```
pub async fn resolve_all<F, Fut, E>(
    names: Vec<String>,
    lookup: F,
    options: ResolveOptions,
) -> Result<BatchResult, ResolveError>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<Option<ResolvedArtist>, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let handle = start_batch(names, lookup, options)?;
    await_result(&handle).await
}

async fn await_result(handle: &BatchHandle) -> Result<BatchResult, ResolveError> {
    match handle.wait().await {
        Some(result) => Ok(Arc::try_unwrap(result).unwrap_or_else(|shared| (*shared).clone())),
        None => Err(ResolveError::Abandoned(handle.id())),
    }
}

/// Resolves artist names against an injected search capability, keeping at
/// most one batch live at a time
pub struct ArtistResolver<S> {
    search: Arc<S>,
    options: ResolveOptions,
    current: Mutex<Option<BatchHandle>>,
}

impl<S: ArtistSearch + 'static> ArtistResolver<S> {
    pub fn new(search: Arc<S>, options: ResolveOptions) -> Self {
        Self {
            search,
            options,
            current: Mutex::new(None),
        }
    }

    /// Start a new batch, abandoning whichever batch was live before
    pub fn start(&self, names: Vec<String>) -> Result<BatchHandle, ResolveError> {
        // Held across start so concurrent callers agree on which batch is newest
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);

        let search = Arc::clone(&self.search);
        let handle = start_batch(
            names,
            move |name: String| {
                let search = Arc::clone(&search);
                async move { search.search_artist(&name).await }
            },
            self.options,
        )?;

        if let Some(previous) = current.replace(handle.clone()) {
            previous.abandon();
        }
        Ok(handle)
    }

    /// The most recently started batch, if any
    pub fn current(&self) -> Option<BatchHandle> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub async fn resolve(&self, names: Vec<String>) -> Result<BatchResult, ResolveError> {
        let handle = self.start(names)?;
        await_result(&handle).await
    }

    /// Normalize raw text with `policy`, then resolve the resulting candidates
    pub async fn resolve_text(
        &self,
        raw_text: &str,
        policy: SeparatorPolicy,
    ) -> Result<BatchResult, ResolveError> {
        let names = normalize(raw_text, policy);
        debug!("Extracted {} candidate names using {policy} separators", names.len());
        self.resolve(names).await
    }
}
