//! Bootstrap full fetch
//!
//! Runs once at process start, independent of the consumer loop. The three
//! entity kinds are fetched concurrently and fail independently: a dead
//! planning service still leaves the member replica populated, and the
//! change feed (or a manual resync) repairs the rest later.

use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use crate::db::ReplicaStore;
use crate::model::{Concert, Member, Rehearsal, Replicated};
use crate::upstream::Fetch;

/// One-shot full fetch of every entity kind
pub struct BootstrapSync<F> {
    pool: SqlitePool,
    fetcher: F,
}

impl<F: Fetch> BootstrapSync<F> {
    pub fn new(pool: SqlitePool, fetcher: F) -> Self {
        Self { pool, fetcher }
    }

    /// Fetch and upsert every entity of every kind.
    ///
    /// Never returns an error: a failed kind is logged and the others
    /// complete, leaving the replica partially populated at worst.
    pub async fn run_once(&self, cancel: CancellationToken) {
        tracing::info!("Syncing replica from upstream services");

        tokio::join!(
            self.sync_kind::<Member>(&cancel),
            self.sync_kind::<Concert>(&cancel),
            self.sync_kind::<Rehearsal>(&cancel),
        );

        tracing::info!("Bootstrap sync finished");
    }

    async fn sync_kind<E: Replicated>(&self, cancel: &CancellationToken) {
        let topic = E::KIND.topic();

        if cancel.is_cancelled() {
            return;
        }

        tracing::info!("Fetching {}", topic);
        let entities = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Fetch of {} cancelled", topic);
                return;
            }
            result = self.fetcher.fetch_all::<E>() => match result {
                Ok(entities) => entities,
                Err(e) => {
                    tracing::error!("Error while fetching {}: {}", topic, e);
                    return;
                }
            }
        };

        let store = ReplicaStore::new(&self.pool);
        let total = entities.len();
        let mut stored = 0usize;
        for entity in &entities {
            match store.upsert(entity).await {
                Ok(()) => stored += 1,
                Err(e) => {
                    tracing::error!("Error storing {} {}: {}", E::KIND, entity.id(), e);
                }
            }
        }

        tracing::info!("Synced {}/{} {}", stored, total, topic);
    }
}
