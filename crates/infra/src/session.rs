//! Session facade: one synchronized view plus the command services, bound to
//! the signed-in actor.

use std::sync::Arc;
use std::time::Duration;

use stockroom_auth::Actor;
use stockroom_core::{CountId, InventoryItemId};
use stockroom_events::AuditSink;
use stockroom_inventory::{
    AdjustQuantity, AdjustmentLogEntry, CountEntry, DispenseStock, InventoryItem, PhysicalCount,
    ReceiveStock, StockMovement, TransferPlan, TransferStock,
};
use tracing::info;

use crate::audit::{AuditTrail, StoreAuditSink};
use crate::collection_store::CollectionStore;
use crate::config::StockroomConfig;
use crate::counts::{ApprovalOutcome, CountEngine, NewCount};
use crate::error::CommandError;
use crate::ledger::StockLedger;
use crate::sync::{MaterializedView, Readiness, StockSnapshot};

pub struct Stockroom<S: CollectionStore + 'static> {
    view: MaterializedView<S>,
    ledger: StockLedger<S>,
    counts: CountEngine<S>,
}

impl<S: CollectionStore + 'static> Stockroom<S> {
    pub fn new(store: Arc<S>, audit_sink: Arc<dyn AuditSink>, config: StockroomConfig) -> Self {
        let view = MaterializedView::new(Arc::clone(&store), config.readiness_timeout);
        let ledger = StockLedger::new(store, AuditTrail::new(audit_sink), config);
        let counts = CountEngine::new(ledger.clone());
        Self { view, ledger, counts }
    }

    /// Audit entries go to the store's own `auditTrail` collection.
    pub fn with_store_audit(store: Arc<S>, config: StockroomConfig) -> Self {
        let sink = Arc::new(StoreAuditSink::new(Arc::clone(&store)));
        Self::new(store, sink, config)
    }

    /// Sign in: subscribe for `actor` and wait for the initial load.
    pub async fn open(&mut self, actor: Actor) -> Readiness {
        self.view.open(actor).await;
        let readiness = self.view.wait_ready().await;
        info!(ready = readiness.is_ready(), "session opened");
        readiness
    }

    /// Close the current session and open one for `actor`.
    pub async fn switch_actor(&mut self, actor: Actor) -> Readiness {
        self.close();
        self.open(actor).await
    }

    pub fn close(&mut self) {
        self.view.close();
    }

    pub fn actor(&self) -> Option<&Actor> {
        self.view.actor()
    }

    pub fn snapshot(&self) -> Arc<StockSnapshot> {
        self.view.snapshot()
    }

    pub fn view(&self) -> &MaterializedView<S> {
        &self.view
    }

    pub async fn wait_for<F>(&self, predicate: F, timeout: Duration) -> Result<Arc<StockSnapshot>, CommandError>
    where
        F: FnMut(&StockSnapshot) -> bool,
    {
        Ok(self.view.wait_for(predicate, timeout).await?)
    }

    fn session(&self) -> Result<(Actor, Arc<StockSnapshot>), CommandError> {
        let actor = self.view.actor().cloned().ok_or_else(CommandError::no_session)?;
        Ok((actor, self.view.snapshot()))
    }

    pub async fn adjust_quantity(&self, cmd: AdjustQuantity) -> Result<AdjustmentLogEntry, CommandError> {
        let (actor, snapshot) = self.session()?;
        self.ledger.adjust_quantity(&snapshot, &actor, cmd).await
    }

    pub async fn receive(&self, cmd: ReceiveStock) -> Result<InventoryItem, CommandError> {
        let (actor, snapshot) = self.session()?;
        self.ledger.receive(&snapshot, &actor, cmd).await
    }

    pub async fn dispense(&self, cmd: DispenseStock) -> Result<StockMovement, CommandError> {
        let (actor, snapshot) = self.session()?;
        self.ledger.dispense(&snapshot, &actor, cmd).await
    }

    pub async fn transfer(&self, cmd: TransferStock) -> Result<TransferPlan, CommandError> {
        let (actor, snapshot) = self.session()?;
        self.ledger.transfer(&snapshot, &actor, cmd).await
    }

    pub async fn purge_item(&self, item_id: &InventoryItemId) -> Result<(), CommandError> {
        let (actor, snapshot) = self.session()?;
        self.ledger.purge_item(&snapshot, &actor, item_id).await
    }

    pub async fn initiate_count(&self, request: NewCount) -> Result<PhysicalCount, CommandError> {
        let (actor, snapshot) = self.session()?;
        self.counts.initiate_count(&snapshot, &actor, request).await
    }

    pub async fn record_count(&self, count_id: &CountId, entries: Vec<CountEntry>) -> Result<PhysicalCount, CommandError> {
        let (actor, snapshot) = self.session()?;
        self.counts.record_count(&snapshot, &actor, count_id, entries).await
    }

    pub async fn submit_count(&self, count_id: &CountId) -> Result<PhysicalCount, CommandError> {
        let (actor, snapshot) = self.session()?;
        self.counts.submit_count(&snapshot, &actor, count_id).await
    }

    pub async fn approve_count(&self, count_id: &CountId) -> Result<ApprovalOutcome, CommandError> {
        let (actor, snapshot) = self.session()?;
        self.counts.approve_count(&snapshot, &actor, count_id).await
    }

    pub async fn reject_count(&self, count_id: &CountId, reason: &str) -> Result<PhysicalCount, CommandError> {
        let (actor, snapshot) = self.session()?;
        self.counts.reject_count(&snapshot, &actor, count_id, reason).await
    }

    pub async fn cancel_count(&self, count_id: &CountId, reason: Option<String>) -> Result<PhysicalCount, CommandError> {
        let (actor, snapshot) = self.session()?;
        self.counts.cancel_count(&snapshot, &actor, count_id, reason).await
    }

    pub async fn purge_count_history(&self, count_id: &CountId) -> Result<(), CommandError> {
        let (actor, snapshot) = self.session()?;
        self.counts.purge_count_history(&snapshot, &actor, count_id).await
    }
}

#[cfg(test)]
mod tests {
    use stockroom_core::ErrorKind;
    use stockroom_events::InMemoryAuditSink;

    use super::*;
    use crate::collection_store::InMemoryCollectionStore;
    use crate::test_support::*;

    #[tokio::test]
    async fn commands_need_an_open_session() {
        let store = Arc::new(InMemoryCollectionStore::new());
        let mut stockroom = Stockroom::new(store, Arc::new(InMemoryAuditSink::new()), StockroomConfig::default());

        let err = stockroom
            .adjust_quantity(adjust("x", 1, "correction".into()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);

        assert!(stockroom.open(admin()).await.is_ready());
        stockroom.close();
        assert!(stockroom.actor().is_none());
        assert!(stockroom.purge_item(&"x".into()).await.is_err());
    }

    #[tokio::test]
    async fn switching_actor_rescopes_the_snapshot() {
        let store = Arc::new(InMemoryCollectionStore::new());
        seed_reference_data(&store);
        let mut stockroom = Stockroom::with_store_audit(store.clone(), StockroomConfig::default());

        stockroom.open(admin()).await;
        assert_eq!(stockroom.snapshot().items.len(), 3);

        assert!(stockroom.switch_actor(encoder_south()).await.is_ready());
        let snapshot = stockroom.snapshot();
        assert_eq!(snapshot.items.len(), 1);
        assert_eq!(snapshot.items[0].id.as_str(), "z");
        assert!(snapshot.users.is_empty());
        assert_eq!(stockroom.actor().map(|a| a.id.as_str()), Some("enc-south"));
    }
}
