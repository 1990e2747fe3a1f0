//! Reconciliation dispatch
//!
//! Maps one decoded change event onto fetch and store calls. Every failure
//! is contained here: a bad message costs one reconciliation step, never
//! the consumer loop.

use sqlx::SqlitePool;

use crate::db::ReplicaStore;
use crate::model::{ChangeOp, Concert, EntityKind, Member, Rehearsal, Replicated};
use crate::upstream::{Fetch, FetchError};

use super::event::ChangeEvent;

/// Terminal state of one reconciliation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The replica was brought in line with the event.
    Applied,
    /// The message was not ours; no side effect.
    Skipped,
    /// The step failed; logged, not retried, replica left as it was.
    Failed,
}

/// Routes change events to fetch + store calls
pub struct Dispatcher<F> {
    pool: SqlitePool,
    fetcher: F,
}

impl<F: Fetch> Dispatcher<F> {
    pub fn new(pool: SqlitePool, fetcher: F) -> Self {
        Self { pool, fetcher }
    }

    /// Decode and apply one raw broker message.
    pub async fn dispatch_message(
        &self,
        topic: &str,
        key: &str,
        payload: &[u8],
    ) -> DispatchOutcome {
        let Some(event) = ChangeEvent::decode(topic, key, payload) else {
            tracing::debug!(topic, key, "Ignoring unrecognized message");
            return DispatchOutcome::Skipped;
        };

        self.dispatch(&event).await
    }

    /// Apply one decoded change event to the replica.
    pub async fn dispatch(&self, event: &ChangeEvent) -> DispatchOutcome {
        match event.kind {
            EntityKind::Member => self.apply::<Member>(event).await,
            EntityKind::Concert => self.apply::<Concert>(event).await,
            EntityKind::Rehearsal => self.apply::<Rehearsal>(event).await,
        }
    }

    async fn apply<E: Replicated>(&self, event: &ChangeEvent) -> DispatchOutcome {
        let store = ReplicaStore::new(&self.pool);

        match event.op {
            // Add and edit are the same step: fetch the authoritative row,
            // overwrite the local one. That makes duplicated or reordered
            // add/edit pairs converge instead of erroring.
            ChangeOp::Add | ChangeOp::Edit => {
                let entity = match self.fetcher.fetch_one::<E>(event.entity_id).await {
                    Ok(entity) => entity,
                    Err(FetchError::NotFound) => {
                        // NotFound on edit is ambiguous upstream state; the
                        // stale row stays rather than guessing at a delete.
                        tracing::warn!(
                            correlation_id = event.correlation_id.as_deref(),
                            "{} {} not found upstream during {}",
                            event.kind,
                            event.entity_id,
                            event.op,
                        );
                        return DispatchOutcome::Failed;
                    }
                    Err(e) => {
                        tracing::error!(
                            correlation_id = event.correlation_id.as_deref(),
                            "Error fetching {} {}: {}",
                            event.kind,
                            event.entity_id,
                            e,
                        );
                        return DispatchOutcome::Failed;
                    }
                };

                match store.upsert(&entity).await {
                    Ok(()) => {
                        tracing::info!(
                            correlation_id = event.correlation_id.as_deref(),
                            "Applied {} for {} {}",
                            event.op,
                            event.kind,
                            event.entity_id,
                        );
                        DispatchOutcome::Applied
                    }
                    Err(e) => {
                        tracing::error!(
                            correlation_id = event.correlation_id.as_deref(),
                            "Error storing {} {}: {}",
                            event.kind,
                            event.entity_id,
                            e,
                        );
                        DispatchOutcome::Failed
                    }
                }
            }
            ChangeOp::Delete => match store.delete(E::KIND, event.entity_id).await {
                Ok(removed) => {
                    tracing::info!(
                        correlation_id = event.correlation_id.as_deref(),
                        removed,
                        "Applied delete for {} {}",
                        event.kind,
                        event.entity_id,
                    );
                    DispatchOutcome::Applied
                }
                Err(e) => {
                    tracing::error!(
                        correlation_id = event.correlation_id.as_deref(),
                        "Error deleting {} {}: {}",
                        event.kind,
                        event.entity_id,
                        e,
                    );
                    DispatchOutcome::Failed
                }
            },
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::initialize_schema;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;

    /// Canned fetch results keyed by (kind, id); kinds listed in
    /// `failing_kinds` error on every call.
    pub(crate) struct StubFetch {
        pub entities: HashMap<(EntityKind, i64), serde_json::Value>,
        pub failing_kinds: Vec<EntityKind>,
    }

    impl StubFetch {
        pub fn new() -> Self {
            Self {
                entities: HashMap::new(),
                failing_kinds: Vec::new(),
            }
        }

        pub fn with(mut self, kind: EntityKind, id: i64, value: serde_json::Value) -> Self {
            self.entities.insert((kind, id), value);
            self
        }

        pub fn failing_for(mut self, kind: EntityKind) -> Self {
            self.failing_kinds.push(kind);
            self
        }
    }

    #[async_trait]
    impl Fetch for StubFetch {
        async fn fetch_all<E: Replicated>(&self) -> Result<Vec<E>, FetchError> {
            if self.failing_kinds.contains(&E::KIND) {
                return Err(FetchError::Graph("stubbed failure".to_string()));
            }

            self.entities
                .iter()
                .filter(|((kind, _), _)| *kind == E::KIND)
                .map(|(_, value)| {
                    serde_json::from_value(value.clone())
                        .map_err(|e| FetchError::Schema(e.to_string()))
                })
                .collect()
        }

        async fn fetch_one<E: Replicated>(&self, id: i64) -> Result<E, FetchError> {
            if self.failing_kinds.contains(&E::KIND) {
                return Err(FetchError::Graph("stubbed failure".to_string()));
            }

            match self.entities.get(&(E::KIND, id)) {
                Some(value) => serde_json::from_value(value.clone())
                    .map_err(|e| FetchError::Schema(e.to_string())),
                None => Err(FetchError::NotFound),
            }
        }
    }

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        initialize_schema(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn add_fetches_and_stores() {
        let pool = setup_test_db().await;
        let fetcher =
            StubFetch::new().with(EntityKind::Member, 7, json!({ "id": 7, "name": "Ada" }));
        let dispatcher = Dispatcher::new(pool.clone(), fetcher);

        let outcome = dispatcher
            .dispatch_message("members", "add_member", br#"{"entityId": 7}"#)
            .await;
        assert_eq!(outcome, DispatchOutcome::Applied);

        let store = ReplicaStore::new(&pool);
        let member: Member = store.get(7).await.unwrap().unwrap();
        assert_eq!(member.name, "Ada");
    }

    #[tokio::test]
    async fn edit_overwrites_all_fields() {
        let pool = setup_test_db().await;
        let store = ReplicaStore::new(&pool);
        store
            .upsert(&Concert {
                id: 2,
                title: "Old title".to_string(),
            })
            .await
            .unwrap();

        let fetcher =
            StubFetch::new().with(EntityKind::Concert, 2, json!({ "id": 2, "title": "New title" }));
        let dispatcher = Dispatcher::new(pool.clone(), fetcher);

        let outcome = dispatcher
            .dispatch_message("concerts", "edit_concert", br#"{"entityId": 2}"#)
            .await;
        assert_eq!(outcome, DispatchOutcome::Applied);

        let concert: Concert = store.get(2).await.unwrap().unwrap();
        assert_eq!(concert.title, "New title");
    }

    #[tokio::test]
    async fn duplicate_edit_converges() {
        let pool = setup_test_db().await;
        let fetcher =
            StubFetch::new().with(EntityKind::Member, 4, json!({ "id": 4, "name": "Grace" }));
        let dispatcher = Dispatcher::new(pool.clone(), fetcher);

        for _ in 0..2 {
            let outcome = dispatcher
                .dispatch_message("members", "edit_member", br#"{"entityId": 4}"#)
                .await;
            assert_eq!(outcome, DispatchOutcome::Applied);
        }

        let store = ReplicaStore::new(&pool);
        assert_eq!(store.count(EntityKind::Member).await.unwrap(), 1);
        let member: Member = store.get(4).await.unwrap().unwrap();
        assert_eq!(member.name, "Grace");
    }

    #[tokio::test]
    async fn edit_not_found_keeps_stale_row() {
        let pool = setup_test_db().await;
        let store = ReplicaStore::new(&pool);
        store
            .upsert(&Rehearsal {
                id: 9,
                title: "Thursday sectional".to_string(),
            })
            .await
            .unwrap();

        let dispatcher = Dispatcher::new(pool.clone(), StubFetch::new());

        let outcome = dispatcher
            .dispatch_message("rehearsals", "edit_rehearsal", br#"{"entityId": 9}"#)
            .await;
        assert_eq!(outcome, DispatchOutcome::Failed);

        // The ambiguous upstream miss must not turn into a delete.
        let rehearsal: Rehearsal = store.get(9).await.unwrap().unwrap();
        assert_eq!(rehearsal.title, "Thursday sectional");
    }

    #[tokio::test]
    async fn delete_skips_the_fetch() {
        let pool = setup_test_db().await;
        let store = ReplicaStore::new(&pool);
        store
            .upsert(&Member {
                id: 5,
                name: "Linus".to_string(),
            })
            .await
            .unwrap();

        // Fetcher errors for members, but delete never calls it.
        let fetcher = StubFetch::new().failing_for(EntityKind::Member);
        let dispatcher = Dispatcher::new(pool.clone(), fetcher);

        let outcome = dispatcher
            .dispatch_message("members", "delete_member", br#"{"entityId": 5}"#)
            .await;
        assert_eq!(outcome, DispatchOutcome::Applied);
        assert!(store.get::<Member>(5).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_of_absent_row_applies() {
        let pool = setup_test_db().await;
        let dispatcher = Dispatcher::new(pool.clone(), StubFetch::new());

        let outcome = dispatcher
            .dispatch_message("concerts", "delete_concert", br#"{"entityId": 404}"#)
            .await;
        assert_eq!(outcome, DispatchOutcome::Applied);
    }

    #[tokio::test]
    async fn fetch_failure_is_contained() {
        let pool = setup_test_db().await;
        let fetcher = StubFetch::new().failing_for(EntityKind::Member);
        let dispatcher = Dispatcher::new(pool.clone(), fetcher);

        let outcome = dispatcher
            .dispatch_message("members", "add_member", br#"{"entityId": 1}"#)
            .await;
        assert_eq!(outcome, DispatchOutcome::Failed);

        let store = ReplicaStore::new(&pool);
        assert_eq!(store.count(EntityKind::Member).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unrecognized_messages_have_no_side_effect() {
        let pool = setup_test_db().await;
        let dispatcher = Dispatcher::new(pool.clone(), StubFetch::new());

        let cases: [(&str, &str, &[u8]); 3] = [
            ("unknown-topic", "add_member", br#"{"entityId": 1}"#),
            ("members", "promote_member", br#"{"entityId": 1}"#),
            ("members", "add_member", b"garbage"),
        ];

        for (topic, key, payload) in cases {
            let outcome = dispatcher.dispatch_message(topic, key, payload).await;
            assert_eq!(outcome, DispatchOutcome::Skipped);
        }

        let store = ReplicaStore::new(&pool);
        for kind in EntityKind::ALL {
            assert_eq!(store.count(kind).await.unwrap(), 0);
        }
    }
}
