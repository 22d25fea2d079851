//! End-to-end tests for the stock core.
//!
//! Tests: Command → atomic write → collection push → synchronized snapshot
//!
//! Verifies:
//! - The reference count scenario (100 on record, 95 counted)
//! - Approval is all-or-nothing and retryable
//! - The freeze rule and purge guards follow the count lifecycle
//! - Snapshot scoping by role and facility, readiness under failures

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::mpsc;

    use stockroom_auth::Role;
    use stockroom_core::{CountId, ErrorKind, InventoryItemId};
    use stockroom_events::InMemoryAuditSink;
    use stockroom_inventory::{
        AdjustmentReason, CountEntry, CountStatus, DispenseStock, TransferStock,
    };

    use crate::collection_store::{
        CollectionSnapshot, CollectionStore, InMemoryCollectionStore, SnapshotResult, StoreError, Subscription,
        SubscriptionId, WriteBatch,
    };
    use crate::config::StockroomConfig;
    use crate::counts::NewCount;
    use crate::session::Stockroom;
    use crate::sync::{CollectionName, Readiness, StockSnapshot, UserRecord};
    use crate::test_support::*;

    type Room = Stockroom<InMemoryCollectionStore>;

    fn setup(config: StockroomConfig) -> (Arc<InMemoryCollectionStore>, Arc<InMemoryAuditSink>, Room) {
        let store = Arc::new(InMemoryCollectionStore::new());
        seed_reference_data(&store);
        let audit = Arc::new(InMemoryAuditSink::new());
        let room = Stockroom::new(store.clone(), audit.clone(), config);
        (store, audit, room)
    }

    fn shelf_a_count() -> NewCount {
        NewCount {
            name: "Quarter-end shelf A".to_string(),
            location_id: "shelf-a".into(),
            counter_id: Some("enc-north".into()),
            notes: String::new(),
        }
    }

    fn entries(counted: &[(&str, i64)]) -> Vec<CountEntry> {
        counted
            .iter()
            .map(|(item, qty)| CountEntry {
                inventory_item_id: (*item).into(),
                counted_quantity: *qty,
            })
            .collect()
    }

    async fn status_becomes(room: &Room, id: &CountId, status: CountStatus) -> Arc<StockSnapshot> {
        room.wait_for(|s| s.count(id).map(|c| c.status) == Some(status), WAIT)
            .await
            .unwrap()
    }

    async fn quantity_becomes(room: &Room, item: &str, quantity: u64) -> Arc<StockSnapshot> {
        let id = InventoryItemId::new(item);
        room.wait_for(|s| s.item(&id).map(|i| i.quantity) == Some(quantity), WAIT)
            .await
            .unwrap()
    }

    /// Admin initiates at shelf A, the north encoder counts and submits, and
    /// the session is handed back to the admin for review.
    async fn submitted_count(room: &mut Room, counted: &[(&str, i64)]) -> CountId {
        assert!(room.open(admin()).await.is_ready());
        let count = room.initiate_count(shelf_a_count()).await.unwrap();

        room.switch_actor(encoder_north()).await;
        status_becomes(room, &count.id, CountStatus::Pending).await;
        room.record_count(&count.id, entries(counted)).await.unwrap();
        status_becomes(room, &count.id, CountStatus::InProgress).await;
        room.submit_count(&count.id).await.unwrap();
        status_becomes(room, &count.id, CountStatus::PendingReview).await;

        room.switch_actor(admin()).await;
        status_becomes(room, &count.id, CountStatus::PendingReview).await;
        count.id
    }

    #[tokio::test]
    async fn counted_shortfall_is_corrected_on_approval() {
        let (store, audit, mut room) = setup(StockroomConfig::default());
        assert!(room.open(admin()).await.is_ready());

        let count = room.initiate_count(shelf_a_count()).await.unwrap();
        let line = count.line(&"x".into()).unwrap();
        assert_eq!(line.system_quantity, 100);

        room.wait_for(|s| s.freeze.is_frozen(&"x".into()), WAIT).await.unwrap();
        let err = room
            .adjust_quantity(adjust("x", 98, AdjustmentReason::Damage))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(err.to_string().contains(count.id.as_str()));

        room.switch_actor(encoder_north()).await;
        room.record_count(&count.id, entries(&[("x", 95), ("y", 40)])).await.unwrap();
        status_becomes(&room, &count.id, CountStatus::InProgress).await;
        room.submit_count(&count.id).await.unwrap();

        room.switch_actor(admin()).await;
        status_becomes(&room, &count.id, CountStatus::PendingReview).await;
        let outcome = room.approve_count(&count.id).await.unwrap();

        assert_eq!(outcome.count.status, CountStatus::Completed);
        assert_eq!(outcome.count.reviewed_by.as_ref().map(|a| a.as_str()), Some("admin"));
        assert_eq!(outcome.adjustments.len(), 1);
        let correction = &outcome.adjustments[0];
        assert_eq!((correction.from_quantity, correction.to_quantity), (100, 95));
        assert_eq!(correction.reason, AdjustmentReason::PhysicalCountCorrection);

        let snapshot = quantity_becomes(&room, "x", 95).await;
        let snapshot = if snapshot.count(&count.id).map(|c| c.status) == Some(CountStatus::Completed) {
            snapshot
        } else {
            status_becomes(&room, &count.id, CountStatus::Completed).await
        };
        assert!(!snapshot.freeze.is_frozen(&"x".into()));
        assert_eq!(snapshot.count(&count.id).unwrap().line(&"x".into()).unwrap().system_quantity, 100);
        assert_eq!(store.records("adjustmentLogs").len(), 1);

        room.adjust_quantity(adjust("x", 94, AdjustmentReason::Damage)).await.unwrap();
        quantity_becomes(&room, "x", 94).await;

        assert_eq!(audited(&audit, "counts.count_approved", 1).await, 1);
        assert_eq!(audited(&audit, "inventory.quantity_adjusted", 2).await, 2);
    }

    #[tokio::test]
    async fn failed_approval_applies_nothing_and_retry_completes() {
        let (store, _audit, mut room) = setup(StockroomConfig::default());
        let count = submitted_count(&mut room, &[("x", 95), ("y", 38)]).await;

        store.fail_next_writes(1);
        let err = room.approve_count(&count).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(err.is_retryable());

        assert_eq!(store.value_at("inventoryItems/x/quantity"), Some(json!(100)));
        assert_eq!(store.value_at("inventoryItems/y/quantity"), Some(json!(40)));
        assert!(store.records("adjustmentLogs").is_empty());
        assert_eq!(
            room.snapshot().count(&count).map(|c| c.status),
            Some(CountStatus::PendingReview)
        );

        let outcome = room.approve_count(&count).await.unwrap();
        assert_eq!(outcome.adjustments.len(), 2);
        assert_eq!(store.records("adjustmentLogs").len(), 2);
        assert_eq!(store.value_at("inventoryItems/y/quantity"), Some(json!(38)));
        status_becomes(&room, &count, CountStatus::Completed).await;
    }

    #[tokio::test]
    async fn cancellation_unfreezes_items() {
        let (_store, _audit, mut room) = setup(StockroomConfig::default());
        room.open(admin()).await;
        let count = room.initiate_count(shelf_a_count()).await.unwrap();
        status_becomes(&room, &count.id, CountStatus::Pending).await;

        let dispense = DispenseStock {
            item_id: "y".into(),
            quantity: 5,
            notes: String::new(),
        };
        let err = room.dispense(dispense.clone()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err = room
            .transfer(TransferStock {
                item_id: "x".into(),
                destination: "shelf-b".into(),
                quantity: 1,
                notes: String::new(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let cancelled = room
            .cancel_count(&count.id, Some("wrong shelf".to_string()))
            .await
            .unwrap();
        assert_eq!(cancelled.cancellation_reason.as_deref(), Some("wrong shelf"));
        status_becomes(&room, &count.id, CountStatus::Cancelled).await;

        room.dispense(dispense).await.unwrap();
        quantity_becomes(&room, "y", 35).await;
    }

    #[tokio::test]
    async fn purge_waits_for_the_count_to_finish() {
        let (store, audit, mut room) = setup(StockroomConfig::default());
        room.open(admin()).await;
        let count = room.initiate_count(shelf_a_count()).await.unwrap();
        status_becomes(&room, &count.id, CountStatus::Pending).await;

        let err = room.purge_item(&"x".into()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(store.value_at("inventoryItems/x").is_some());

        room.cancel_count(&count.id, None).await.unwrap();
        status_becomes(&room, &count.id, CountStatus::Cancelled).await;

        room.purge_item(&"x".into()).await.unwrap();
        let snapshot = room
            .wait_for(|s| s.item(&"x".into()).is_none(), WAIT)
            .await
            .unwrap();
        assert_eq!(snapshot.items.len(), 2);
        assert_eq!(audited(&audit, "inventory.item_purged", 1).await, 1);
    }

    #[tokio::test]
    async fn empty_location_creates_no_count() {
        let (store, _audit, mut room) = setup(StockroomConfig::default());
        room.open(admin()).await;

        let mut request = shelf_a_count();
        request.location_id = "shelf-b".into();
        let err = room.initiate_count(request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let mut request = shelf_a_count();
        request.location_id = "basement".into();
        let err = room.initiate_count(request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        assert!(store.records("physicalCounts").is_empty());
        assert_eq!(store.committed_writes(), 0);
    }

    #[tokio::test]
    async fn stale_snapshot_cannot_double_apply() {
        let fx = Fixture::new(StockroomConfig::default()).await;
        let ledger = fx.ledger();
        let stale = fx.snapshot();

        ledger
            .adjust_quantity(&stale, &admin(), adjust("x", 90, AdjustmentReason::Correction))
            .await
            .unwrap();
        let err = ledger
            .adjust_quantity(&stale, &admin(), adjust("x", 90, AdjustmentReason::Correction))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(fx.store.records("adjustmentLogs").len(), 1);
        assert_eq!(fx.store.value_at("inventoryItems/x/quantity"), Some(json!(90)));
    }

    #[tokio::test]
    async fn quantity_tracks_the_latest_log_entry() {
        let fx = Fixture::new(StockroomConfig::default()).await;
        let ledger = fx.ledger();

        for target in [90u64, 120, 0, 7] {
            let snapshot = fx.snapshot();
            ledger
                .adjust_quantity(&snapshot, &admin(), adjust("x", target as i64, AdjustmentReason::Correction))
                .await
                .unwrap();
            fx.quantity_becomes("x", target).await;
        }

        let snapshot = fx
            .view
            .wait_for(|s| s.adjustments_for(&"x".into()).len() == 4, WAIT)
            .await
            .unwrap();
        let history = snapshot.adjustments_for(&"x".into());
        let chain: Vec<_> = history.iter().map(|e| (e.from_quantity, e.to_quantity)).collect();
        assert!(chain.contains(&(100, 90)));
        assert!(chain.contains(&(0, 7)));
        assert_eq!(snapshot.item(&"x".into()).map(|i| i.quantity), Some(7));
    }

    #[tokio::test]
    async fn repeated_transfers_merge_into_one_batch() {
        let fx = Fixture::new(StockroomConfig::default()).await;
        let ledger = fx.ledger();
        let transfer = TransferStock {
            item_id: "x".into(),
            destination: "shelf-b".into(),
            quantity: 10,
            notes: String::new(),
        };

        let first = ledger.transfer(&fx.snapshot(), &admin(), transfer.clone()).await.unwrap();
        assert!(first.creates_destination());
        let snapshot = fx.quantity_becomes(first.destination.id.as_str(), 10).await;

        let second = ledger.transfer(&snapshot, &admin(), transfer).await.unwrap();
        assert_eq!(second.destination.id, first.destination.id);
        assert_eq!(second.destination_expected, Some(10));

        let snapshot = fx.quantity_becomes(first.destination.id.as_str(), 20).await;
        assert_eq!(snapshot.items_at(&"shelf-b".into()).count(), 1);
        assert_eq!(snapshot.total_for_master(&"para".into()).quantity, 110);
    }

    #[tokio::test]
    async fn failing_audit_sink_never_fails_the_mutation() {
        let store = Arc::new(InMemoryCollectionStore::new());
        seed_reference_data(&store);
        let mut room = Stockroom::new(
            store.clone(),
            Arc::new(InMemoryAuditSink::failing()),
            StockroomConfig::default(),
        );
        room.open(admin()).await;

        let entry = room
            .adjust_quantity(adjust("y", 39, AdjustmentReason::Loss))
            .await
            .unwrap();
        assert_eq!(entry.to_quantity, 39);
        assert_eq!(store.value_at("inventoryItems/y/quantity"), Some(json!(39)));
    }

    #[tokio::test]
    async fn privileged_collections_follow_the_role() {
        let store = Arc::new(InMemoryCollectionStore::new());
        seed_reference_data(&store);
        let user = UserRecord {
            id: "enc-north".into(),
            display_name: "Nico Encoder".to_string(),
            role: Role::Encoder,
            facility_id: Some("north".into()),
        };
        store.seed("users", "enc-north", &user).unwrap();
        let mut room = Stockroom::with_store_audit(store.clone(), StockroomConfig::default());

        room.open(admin()).await;
        room.adjust_quantity(adjust("y", 41, AdjustmentReason::Correction)).await.unwrap();
        let snapshot = room
            .wait_for(|s| !s.audit_trail.is_empty(), WAIT)
            .await
            .unwrap();
        assert_eq!(snapshot.audit_trail[0].action, "inventory.quantity_adjusted");
        assert_eq!(snapshot.users.len(), 1);

        room.switch_actor(auditor()).await;
        assert_eq!(room.snapshot().audit_trail.len(), 1);

        room.switch_actor(encoder_north()).await;
        let snapshot = room.snapshot();
        assert!(snapshot.audit_trail.is_empty());
        assert!(snapshot.users.is_empty());
        assert_eq!(snapshot.items.len(), 2);
        assert!(snapshot.items.iter().all(|i| i.facility_id.as_str() == "north"));
        assert_eq!(snapshot.item_masters.len(), 2);
    }

    #[tokio::test]
    async fn encoders_cannot_reach_another_facility() {
        let (_store, _audit, mut room) = setup(StockroomConfig::default());
        room.open(encoder_north()).await;

        let err = room
            .adjust_quantity(adjust("z", 5, AdjustmentReason::Loss))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = room
            .transfer(TransferStock {
                item_id: "y".into(),
                destination: "cold-1".into(),
                quantity: 1,
                notes: String::new(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = room.purge_item(&"y".into()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);
    }

    #[tokio::test]
    async fn auditors_are_read_only() {
        let (_store, _audit, mut room) = setup(StockroomConfig::default());
        room.open(auditor()).await;

        let err = room
            .adjust_quantity(adjust("x", 5, AdjustmentReason::Loss))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);
        let err = room.initiate_count(shelf_a_count()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);
    }

    #[tokio::test]
    async fn denied_and_failed_collections_do_not_block_readiness() {
        let (store, _audit, mut room) = setup(StockroomConfig::default());
        store.seed_value("settings", "currency", json!("PHP")).unwrap();
        store.deny_collection("settings");

        assert_eq!(room.open(admin()).await, Readiness::Ready);
        assert!(room.snapshot().settings.is_empty());
        assert_eq!(room.snapshot().items.len(), 3);

        store.push_error("inventoryItems", StoreError::Transport("connection reset".to_string()));
        let snapshot = room.wait_for(|s| s.items.is_empty(), WAIT).await.unwrap();
        assert!(snapshot.ready);
    }

    /// Wraps the in-memory store; one collection stops delivering, either
    /// before its first load or right after it.
    struct StalledStore {
        inner: Arc<InMemoryCollectionStore>,
        stalled: &'static str,
        initial_load: bool,
        held: Mutex<Vec<mpsc::UnboundedSender<SnapshotResult>>>,
    }

    impl StalledStore {
        fn new(inner: Arc<InMemoryCollectionStore>, stalled: &'static str, initial_load: bool) -> Self {
            Self {
                inner,
                stalled,
                initial_load,
                held: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CollectionStore for StalledStore {
        async fn subscribe(&self, collection: &str) -> Result<Subscription, StoreError> {
            if collection == self.stalled {
                let (tx, rx) = mpsc::unbounded_channel();
                if self.initial_load {
                    let _ = tx.send(Ok(CollectionSnapshot {
                        collection: collection.to_string(),
                        records: self.inner.records(collection),
                    }));
                }
                self.held.lock().unwrap().push(tx);
                return Ok(Subscription::new(SubscriptionId(u64::MAX), collection, rx));
            }
            self.inner.subscribe(collection).await
        }

        fn unsubscribe(&self, id: SubscriptionId) {
            self.inner.unsubscribe(id);
        }

        async fn atomic_write(&self, batch: WriteBatch) -> Result<(), StoreError> {
            self.inner.atomic_write(batch).await
        }
    }

    #[tokio::test]
    async fn silent_collection_degrades_after_the_timeout() {
        let inner = Arc::new(InMemoryCollectionStore::new());
        seed_reference_data(&inner);
        let store = Arc::new(StalledStore::new(inner, "presence", false));
        let config = StockroomConfig::default().with_readiness_timeout(Duration::from_millis(50));
        let mut room = Stockroom::new(store, Arc::new(InMemoryAuditSink::new()), config);

        let readiness = room.open(admin()).await;
        assert_eq!(
            readiness,
            Readiness::Degraded {
                pending: vec![CollectionName::Presence]
            }
        );
        let snapshot = room.snapshot();
        assert!(snapshot.degraded);
        assert!(!snapshot.ready);
        assert_eq!(snapshot.items.len(), 3);

        // Commands still run against the partial snapshot.
        room.adjust_quantity(adjust("x", 99, AdjustmentReason::Correction)).await.unwrap();
    }

    #[tokio::test]
    async fn lagging_client_cannot_touch_a_counted_batch() {
        let (store, _audit, mut room) = setup(StockroomConfig::default());
        let lagging_store = Arc::new(StalledStore::new(store.clone(), "physicalCounts", true));
        let mut lagging = Stockroom::new(lagging_store, Arc::new(InMemoryAuditSink::new()), StockroomConfig::default());
        assert!(lagging.open(admin()).await.is_ready());

        assert!(room.open(admin()).await.is_ready());
        let count = room.initiate_count(shelf_a_count()).await.unwrap();
        status_becomes(&room, &count.id, CountStatus::Pending).await;
        assert!(lagging.snapshot().counts.is_empty());

        let err = lagging
            .adjust_quantity(adjust("x", 50, AdjustmentReason::Correction))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err = lagging.initiate_count(shelf_a_count()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        assert_eq!(store.value_at("inventoryItems/x/quantity"), Some(json!(100)));
        assert_eq!(store.records("physicalCounts").len(), 1);
        assert!(store.records("adjustmentLogs").is_empty());
    }
}
