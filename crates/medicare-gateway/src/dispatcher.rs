use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};
use tracing::debug;
use uuid::Uuid;

use medicare_types::events::{ChangeReason, GatewayEvent};

const BROADCAST_CAPACITY: usize = 1024;

/// Fans patient-scoped events out to every gateway connection. Each
/// connection filters by the patients it subscribed to.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    broadcast_tx: broadcast::Sender<GatewayEvent>,

    /// Open gateway connections per user
    connections: RwLock<HashMap<Uuid, usize>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                connections: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Subscribe to gateway events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Broadcast an event. Unscoped events are dropped: they only make sense
    /// on the connection that produced them.
    pub fn broadcast(&self, event: GatewayEvent) {
        let Some(patient_id) = event.patient_id() else {
            debug!("Dropping unscoped gateway event {:?}", event);
            return;
        };
        // Err only means nobody is listening right now.
        if self.inner.broadcast_tx.send(event).is_err() {
            debug!("No gateway listeners for patient {}", patient_id);
        }
    }

    /// Tell everyone watching `patient_id` to re-fetch.
    pub fn patient_data_changed(&self, patient_id: Uuid, reason: ChangeReason) {
        self.broadcast(GatewayEvent::PatientDataChanged { patient_id, reason });
    }

    pub async fn connection_opened(&self, user_id: Uuid) {
        *self.inner.connections.write().await.entry(user_id).or_default() += 1;
    }

    pub async fn connection_closed(&self, user_id: Uuid) {
        let mut connections = self.inner.connections.write().await;
        if let Some(count) = connections.get_mut(&user_id) {
            *count -= 1;
            if *count == 0 {
                connections.remove(&user_id);
            }
        }
    }

    /// Number of distinct users with at least one open connection.
    pub async fn connected_users(&self) -> usize {
        self.inner.connections.read().await.len()
    }
}
