//! Store failures and slow stores surfacing through the engine.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tessera_core::{Entity, EntityId, GraphSettings, Relationship};
use tessera_graph::memory::MemorySession;
use tessera_graph::{
    EntityFilter, GraphError, GraphStore, MemoryStore, RelationshipFilter, StoreSession,
};
use tessera_snapshot::{SnapshotEngine, SnapshotError, SnapshotRequest};

/// Memory store whose relationship queries can fail or stall.
struct FaultyStore {
    inner: MemoryStore,
    /// 1-based relationship query that returns a connection error.
    fail_on: Option<usize>,
    /// Wait before answering every relationship query.
    delay: Option<Duration>,
    relationship_calls: AtomicUsize,
}

impl FaultyStore {
    fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            fail_on: None,
            delay: None,
            relationship_calls: AtomicUsize::new(0),
        }
    }

    fn failing_on(mut self, call: usize) -> Self {
        self.fail_on = Some(call);
        self
    }

    fn stalling_for(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn relationship_calls(&self) -> usize {
        self.relationship_calls.load(Ordering::SeqCst)
    }
}

impl GraphStore for FaultyStore {
    type Session<'a> = FaultySession<'a>;

    async fn session(&self) -> Result<FaultySession<'_>, GraphError> {
        Ok(FaultySession {
            inner: self.inner.session().await?,
            store: self,
        })
    }
}

struct FaultySession<'a> {
    inner: MemorySession<'a>,
    store: &'a FaultyStore,
}

impl StoreSession for FaultySession<'_> {
    async fn get_entity(&self, id: &EntityId) -> Result<Option<Entity>, GraphError> {
        self.inner.get_entity(id).await
    }

    async fn list_entities(
        &self,
        filter: &EntityFilter,
        limit: usize,
    ) -> Result<Vec<Entity>, GraphError> {
        self.inner.list_entities(filter, limit).await
    }

    async fn list_relationships(
        &self,
        filter: &RelationshipFilter,
        limit: Option<usize>,
    ) -> Result<Vec<Relationship>, GraphError> {
        let call = self.store.relationship_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(delay) = self.store.delay {
            tokio::time::sleep(delay).await;
        }
        if self.store.fail_on == Some(call) {
            return Err(GraphError::Connection("connection reset by peer".into()));
        }
        self.inner.list_relationships(filter, limit).await
    }
}

/// A -knows-> B -knows-> C
async fn knows_chain() -> (MemoryStore, [EntityId; 3]) {
    let store = MemoryStore::new();
    let mut ids = [EntityId::default(); 3];
    for (slot, name) in ids.iter_mut().zip(["A", "B", "C"]) {
        *slot = store
            .create_entity(Entity::new("person", name))
            .await
            .unwrap()
            .id;
    }
    store
        .create_relationship(Relationship::new(ids[0], ids[1], "knows"))
        .await
        .unwrap();
    store
        .create_relationship(Relationship::new(ids[1], ids[2], "knows"))
        .await
        .unwrap();
    (store, ids)
}

#[tokio::test]
async fn connection_lost_mid_traversal_is_store_error() {
    let (store, [a, _, _]) = knows_chain().await;
    // Level 1 issues queries 1 and 2; query 3 belongs to level 2.
    let engine = SnapshotEngine::new(
        FaultyStore::new(store).failing_on(3),
        GraphSettings::default(),
    );

    let err = engine
        .snapshot(SnapshotRequest::neighborhood(a, 2))
        .await
        .unwrap_err();

    assert!(
        matches!(err, SnapshotError::Store(GraphError::Connection(_))),
        "unexpected error: {err}"
    );
    assert!(engine.store().relationship_calls() >= 3);
}

#[tokio::test]
async fn connection_lost_on_first_query_is_store_error() {
    let (store, [a, _, _]) = knows_chain().await;
    let engine = SnapshotEngine::new(
        FaultyStore::new(store).failing_on(1),
        GraphSettings::default(),
    );

    for request in [
        SnapshotRequest::neighborhood(a, 1),
        SnapshotRequest::all(),
        SnapshotRequest::by_type("person"),
    ] {
        engine.store().relationship_calls.store(0, Ordering::SeqCst);
        let err = engine.snapshot(request).await.unwrap_err();
        assert!(matches!(err, SnapshotError::Store(GraphError::Connection(_))));
    }
}

#[tokio::test]
async fn healthy_wrapper_matches_plain_store() {
    let (store, [a, b, c]) = knows_chain().await;
    let engine = SnapshotEngine::new(FaultyStore::new(store), GraphSettings::default());

    let snapshot = engine
        .snapshot(SnapshotRequest::neighborhood(a, 2))
        .await
        .unwrap();
    let ids: Vec<_> = snapshot.nodes.iter().map(|n| n.id).collect();
    assert_eq!(ids.len(), 3);
    assert!([a, b, c].iter().all(|id| ids.contains(id)));
    assert!(!snapshot.stats.truncated);
}

#[tokio::test(start_paused = true)]
async fn slow_store_times_out() {
    let (store, [a, _, _]) = knows_chain().await;
    let settings = GraphSettings {
        request_timeout_secs: 1,
        ..GraphSettings::default()
    };
    let engine = SnapshotEngine::new(
        FaultyStore::new(store).stalling_for(Duration::from_secs(5)),
        settings,
    );

    let err = engine
        .snapshot(SnapshotRequest::neighborhood(a, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, SnapshotError::Timeout { max_seconds: 1 }));

    // The abandoned session no longer holds the read lock.
    engine
        .store()
        .inner
        .create_entity(Entity::new("person", "D"))
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn slow_store_within_timeout_succeeds() {
    let (store, [a, b, _]) = knows_chain().await;
    let settings = GraphSettings {
        request_timeout_secs: 10,
        ..GraphSettings::default()
    };
    let engine = SnapshotEngine::new(
        FaultyStore::new(store).stalling_for(Duration::from_secs(2)),
        settings,
    );

    let snapshot = engine
        .snapshot(SnapshotRequest::neighborhood(a, 1))
        .await
        .unwrap();
    let ids: Vec<_> = snapshot.nodes.iter().map(|n| n.id).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&b));
}
