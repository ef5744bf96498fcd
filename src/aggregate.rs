//! Bounded-concurrency enrichment of list results.
//!
//! A list handler fetches a page of primary records, then needs one
//! secondary lookup per record (a user's post count, for instance).
//! [`ListAggregator`] runs those lookups concurrently, never more than
//! `max_concurrency` at once, and returns the results in input order no
//! matter which lookup finishes first.

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use blog_core::{AppError, AppResult};
use dashmap::DashMap;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Default upper bound on concurrent lookups.
pub const DEFAULT_MAX_FAN_OUT: usize = 1000;

/// Secondary lookup applied to each record.
pub trait Enrich: Send + Sync + 'static {
    type Record: Send + Sync + 'static;
    /// Identity of a record; duplicates share one result.
    type Key: Eq + Hash + Clone + Send + Sync + 'static;
    type Output: Clone + Send + Sync + 'static;

    fn key(&self, record: &Self::Record) -> Self::Key;

    /// `cancel` fires when a sibling lookup fails or the caller goes away.
    fn enrich(
        &self,
        record: &Self::Record,
        cancel: CancellationToken,
    ) -> impl Future<Output = AppResult<Self::Output>> + Send;
}

#[derive(Debug, Clone, Copy)]
pub struct ListAggregator {
    max_concurrency: usize,
}

impl Default for ListAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FAN_OUT)
    }
}

impl ListAggregator {
    /// `max_concurrency` is clamped to at least one.
    #[must_use]
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
        }
    }

    #[must_use]
    pub const fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Enrich every record and return the outputs in input order.
    ///
    /// The first failing lookup cancels and aborts the rest; its error is
    /// returned and partial results are dropped. No lookup is retried.
    ///
    /// # Errors
    /// The first lookup error, or `AppError::Unavailable` when `parent` is
    /// cancelled before all lookups finish.
    pub async fn aggregate<E: Enrich>(
        &self,
        records: Vec<E::Record>,
        enricher: Arc<E>,
        parent: &CancellationToken,
    ) -> AppResult<Vec<E::Output>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let cancel = parent.child_token();
        let permits = Arc::new(Semaphore::new(self.max_concurrency));
        let results: Arc<DashMap<E::Key, E::Output>> =
            Arc::new(DashMap::with_capacity(records.len()));
        let mut order = Vec::with_capacity(records.len());
        let mut tasks = JoinSet::new();

        for record in records {
            let key = enricher.key(&record);
            order.push(key.clone());

            let enricher = Arc::clone(&enricher);
            let permits = Arc::clone(&permits);
            let results = Arc::clone(&results);
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let _permit = tokio::select! {
                    () = cancel.cancelled() => return Err(cancelled()),
                    permit = permits.acquire_owned() => permit.map_err(|_| cancelled())?,
                };
                let output = tokio::select! {
                    () = cancel.cancelled() => return Err(cancelled()),
                    output = enricher.enrich(&record, cancel.clone()) => output?,
                };
                results.insert(key, output);
                Ok(())
            });
        }

        let outcome = loop {
            let joined = tokio::select! {
                biased;
                () = parent.cancelled() => break Err(cancelled()),
                joined = tasks.join_next() => joined,
            };
            match joined {
                None => break Ok(()),
                Some(Ok(Ok(()))) => {}
                Some(Ok(Err(e))) => break Err(e),
                Some(Err(e)) => break Err(AppError::Internal(format!("lookup task failed: {e}"))),
            }
        };

        if let Err(e) = outcome {
            cancel.cancel();
            tasks.abort_all();
            warn!(error = %e, "List enrichment abandoned");
            return Err(e);
        }

        debug!(records = order.len(), "List enriched");
        order
            .iter()
            .map(|key| {
                results
                    .get(key)
                    .map(|entry| entry.value().clone())
                    .ok_or_else(|| AppError::Internal("missing enrichment result".to_string()))
            })
            .collect()
    }
}

fn cancelled() -> AppError {
    AppError::Unavailable("request cancelled".to_string())
}
