use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{watch, Semaphore};
use tracing::{info, instrument, warn};

use crate::config::{Config, IndexingConfig};
use crate::error::{QuiverError, Result};
use crate::executor;
use crate::index::Catalog;
use crate::planner::Planner;
use crate::query::{BooleanQuery, QueryLimits};
use crate::types::TopKQueryResult;

/// Entry point for compound top-K queries.
///
/// Cheap to clone; clones share the catalog and the concurrency limit.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    catalog: Arc<Catalog>,
    indexing: Arc<IndexingConfig>,
    limits: QueryLimits,
    query_semaphore: Arc<Semaphore>,
}

impl QueryEngine {
    pub fn new(catalog: Arc<Catalog>, config: &Config) -> Self {
        Self {
            catalog,
            indexing: Arc::new(config.indexing.clone()),
            limits: QueryLimits::from(&config.engine),
            query_semaphore: Arc::new(Semaphore::new(config.engine.max_concurrent_queries)),
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Evaluate `query` against the current snapshot of `collection` on
    /// the calling thread.
    pub fn search(&self, collection: &str, query: &BooleanQuery) -> Result<TopKQueryResult> {
        let _permit = self
            .query_semaphore
            .try_acquire()
            .map_err(|_| QuiverError::QueryConcurrencyExhausted)?;
        self.execute(collection, query, None)
    }

    /// Like `search`, failing with `Cancelled` once `cancel` reads `true`.
    pub fn search_with_cancel(
        &self,
        collection: &str,
        query: &BooleanQuery,
        cancel: &watch::Receiver<bool>,
    ) -> Result<TopKQueryResult> {
        let _permit = self
            .query_semaphore
            .try_acquire()
            .map_err(|_| QuiverError::QueryConcurrencyExhausted)?;
        self.execute(collection, query, Some(cancel))
    }

    /// Evaluate on tokio's blocking pool.
    pub async fn search_async(
        &self,
        collection: &str,
        query: BooleanQuery,
        cancel: Option<watch::Receiver<bool>>,
    ) -> Result<TopKQueryResult> {
        let permit = self
            .query_semaphore
            .clone()
            .try_acquire_owned()
            .map_err(|_| QuiverError::QueryConcurrencyExhausted)?;
        let engine = self.clone();
        let collection = collection.to_string();
        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            engine.execute(&collection, &query, cancel.as_ref())
        });
        match handle.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "query task panicked");
                Err(QuiverError::Execution(e.to_string()))
            }
        }
    }

    #[instrument(skip(self, query, cancel), fields(collection = collection))]
    fn execute(
        &self,
        collection: &str,
        query: &BooleanQuery,
        cancel: Option<&watch::Receiver<bool>>,
    ) -> Result<TopKQueryResult> {
        let start = Instant::now();
        crate::metrics::ACTIVE_QUERIES.inc();
        let _guard = crate::metrics::GaugeGuard(&crate::metrics::ACTIVE_QUERIES);
        crate::metrics::QUERIES_TOTAL
            .with_label_values(&[collection])
            .inc();

        let result = self.run(collection, query, cancel);

        crate::metrics::QUERY_DURATION
            .with_label_values(&[collection])
            .observe(start.elapsed().as_secs_f64());
        match &result {
            Ok(r) => info!(
                nq = r.nq(),
                hits = r.results.iter().map(|q| q.len()).sum::<usize>(),
                ranking = ?r.ranking,
                duration_ms = start.elapsed().as_millis() as u64,
                "query complete"
            ),
            Err(e) => {
                crate::metrics::QUERY_ERRORS_TOTAL
                    .with_label_values(&[e.kind()])
                    .inc();
                warn!(error = %e, kind = e.kind(), "query failed");
            }
        }
        result
    }

    fn run(
        &self,
        collection: &str,
        query: &BooleanQuery,
        cancel: Option<&watch::Receiver<bool>>,
    ) -> Result<TopKQueryResult> {
        let snapshot = self.catalog.snapshot(collection)?;
        let plan = Planner::new(&snapshot, &self.indexing, self.limits).plan(query)?;
        executor::execute(&plan, &snapshot, cancel)
    }
}
