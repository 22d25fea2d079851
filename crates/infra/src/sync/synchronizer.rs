//! Materialized view over the collection store.
//!
//! One delivery task per subscription applies whole-collection snapshots to
//! the shared state under a short-held lock and publishes the new composite
//! snapshot on a `watch` channel. Readiness is a counter barrier: the view is
//! ready once every subscribed collection delivered a snapshot or failed.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use stockroom_auth::Actor;
use stockroom_core::FacilityId;

use crate::collection_store::{CollectionStore, RawRecords, Subscription, SubscriptionId};

use super::collections::{subscription_plan, CollectionName};
use super::snapshot::StockSnapshot;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("condition not met within {0:?}")]
    Timeout(Duration),

    #[error("synchronized view closed")]
    Closed,
}

/// Outcome of waiting for the initial load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    /// The deadline passed; `pending` collections never delivered.
    Degraded { pending: Vec<CollectionName> },
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready)
    }
}

#[derive(Debug, Default)]
struct ViewState {
    snapshot: StockSnapshot,
    generation: u64,
    scope: Option<FacilityId>,
    plan: Vec<CollectionName>,
    delivered: BTreeSet<CollectionName>,
}

impl ViewState {
    fn pending(&self) -> Vec<CollectionName> {
        self.plan
            .iter()
            .filter(|c| !self.delivered.contains(c))
            .copied()
            .collect()
    }
}

/// State shared with the delivery tasks.
#[derive(Debug)]
struct Shared {
    state: Mutex<ViewState>,
    tx: watch::Sender<Arc<StockSnapshot>>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &ViewState) {
        self.tx.send_replace(Arc::new(state.snapshot.clone()));
    }

    /// Start a new session: bump the generation and reset to empty.
    fn begin(&self, scope: Option<FacilityId>, plan: Vec<CollectionName>) -> u64 {
        let mut state = self.lock();
        let generation = state.generation + 1;
        *state = ViewState {
            snapshot: StockSnapshot {
                generation,
                ready: plan.is_empty(),
                ..StockSnapshot::default()
            },
            generation,
            scope,
            plan,
            delivered: BTreeSet::new(),
        };
        self.publish(&state);
        generation
    }

    fn reset(&self) {
        let mut state = self.lock();
        let generation = state.generation + 1;
        *state = ViewState {
            snapshot: StockSnapshot {
                generation,
                ..StockSnapshot::default()
            },
            generation,
            ..ViewState::default()
        };
        self.publish(&state);
    }

    /// Apply a delivery. Failed collections are delivered as empty.
    fn deliver(&self, generation: u64, collection: CollectionName, records: &RawRecords) {
        let mut state = self.lock();
        if state.generation != generation {
            debug!(collection = %collection, generation, "discarding delivery from a closed session");
            return;
        }

        let scope = state.scope.clone();
        state.snapshot.replace(collection, records, scope.as_ref());

        if state.delivered.insert(collection) && state.pending().is_empty() && !state.snapshot.ready {
            state.snapshot.ready = true;
            if std::mem::take(&mut state.snapshot.degraded) {
                info!(generation, "late delivery completed a degraded view");
            }
            info!(generation, collections = state.plan.len(), "synchronized view ready");
        }
        self.publish(&state);
    }

    fn mark_degraded(&self) -> Vec<CollectionName> {
        let mut state = self.lock();
        let pending = state.pending();
        if !state.snapshot.ready && !state.snapshot.degraded {
            state.snapshot.degraded = true;
            self.publish(&state);
        }
        pending
    }
}

#[derive(Debug)]
struct Session {
    actor: Actor,
    subscriptions: Vec<SubscriptionId>,
    tasks: Vec<JoinHandle<()>>,
}

/// In-memory, actor-scoped mirror of the remote collections.
///
/// Owns its subscriptions: `close()` (or dropping the view) releases every
/// listener and stops every delivery task.
pub struct MaterializedView<S: CollectionStore + 'static> {
    store: Arc<S>,
    shared: Arc<Shared>,
    session: Option<Session>,
    readiness_timeout: Duration,
}

impl<S: CollectionStore + 'static> MaterializedView<S> {
    pub fn new(store: Arc<S>, readiness_timeout: Duration) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(StockSnapshot::default()));
        Self {
            store,
            shared: Arc::new(Shared {
                state: Mutex::new(ViewState::default()),
                tx,
            }),
            session: None,
            readiness_timeout,
        }
    }

    /// Subscribe to every collection the actor may read.
    ///
    /// An already-open session is closed first. A collection whose
    /// subscription fails counts as delivered (empty) for readiness.
    pub async fn open(&mut self, actor: Actor) {
        self.close();

        let plan = subscription_plan(&actor);
        let generation = self.shared.begin(actor.facility_scope().cloned(), plan.clone());
        info!(actor = %actor.id, role = %actor.role, generation, collections = plan.len(), "opening synchronized view");

        let mut subscriptions = Vec::with_capacity(plan.len());
        let mut tasks = Vec::with_capacity(plan.len());
        for collection in plan {
            match self.store.subscribe(collection.as_str()).await {
                Ok(subscription) => {
                    subscriptions.push(subscription.id());
                    tasks.push(tokio::spawn(run_delivery(
                        subscription,
                        collection,
                        generation,
                        Arc::clone(&self.shared),
                    )));
                }
                Err(e) => {
                    warn!(collection = %collection, error = %e, "subscription failed; collection left empty");
                    self.shared.deliver(generation, collection, &RawRecords::new());
                }
            }
        }

        self.session = Some(Session {
            actor,
            subscriptions,
            tasks,
        });
    }

    /// Release every subscription and reset to an empty snapshot. Idempotent.
    pub fn close(&mut self) {
        if let Some(session) = self.session.take() {
            for id in &session.subscriptions {
                self.store.unsubscribe(*id);
            }
            for task in &session.tasks {
                task.abort();
            }
            info!(actor = %session.actor.id, subscriptions = session.subscriptions.len(), "synchronized view closed");
            self.shared.reset();
        }
    }

    pub fn actor(&self) -> Option<&Actor> {
        self.session.as_ref().map(|s| &s.actor)
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Latest composite snapshot.
    pub fn snapshot(&self) -> Arc<StockSnapshot> {
        Arc::clone(&self.shared.tx.borrow())
    }

    pub fn is_ready(&self) -> bool {
        self.snapshot().ready
    }

    /// Receiver notified on every published snapshot.
    pub fn watch(&self) -> watch::Receiver<Arc<StockSnapshot>> {
        self.shared.tx.subscribe()
    }

    /// Wait for the initial load, up to the readiness timeout.
    pub async fn wait_ready(&self) -> Readiness {
        let mut rx = self.watch();
        let loaded = tokio::time::timeout(self.readiness_timeout, async {
            rx.wait_for(|s| s.ready).await.map(|_| ())
        })
        .await;

        match loaded {
            Ok(Ok(())) => Readiness::Ready,
            _ => {
                let pending = self.shared.mark_degraded();
                warn!(
                    pending = ?pending.iter().map(|c| c.as_str()).collect::<Vec<_>>(),
                    timeout_ms = self.readiness_timeout.as_millis() as u64,
                    "synchronized view degraded: not every collection delivered in time"
                );
                Readiness::Degraded { pending }
            }
        }
    }

    /// Wait until a published snapshot satisfies `predicate`.
    pub async fn wait_for<F>(&self, mut predicate: F, timeout: Duration) -> Result<Arc<StockSnapshot>, SyncError>
    where
        F: FnMut(&StockSnapshot) -> bool,
    {
        let mut rx = self.watch();
        let found = tokio::time::timeout(timeout, async {
            rx.wait_for(|s| predicate(&**s))
                .await
                .map(|s| Arc::clone(&*s))
                .map_err(|_| SyncError::Closed)
        })
        .await;

        found.map_err(|_| SyncError::Timeout(timeout))?
    }
}

impl<S: CollectionStore + 'static> Drop for MaterializedView<S> {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_delivery(mut subscription: Subscription, collection: CollectionName, generation: u64, shared: Arc<Shared>) {
    while let Some(message) = subscription.next().await {
        match message {
            Ok(snapshot) => {
                debug!(collection = %collection, records = snapshot.records.len(), "collection snapshot received");
                shared.deliver(generation, collection, &snapshot.records);
            }
            Err(e) => {
                warn!(collection = %collection, error = %e, "subscription ended with an error; collection left empty");
                shared.deliver(generation, collection, &RawRecords::new());
                break;
            }
        }
    }
}
