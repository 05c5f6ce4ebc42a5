//! Subscriber bookkeeping for the playback controller.
//!
//! Subscribers are held in a keyed slot table: the controller fans points
//! out to every live slot, and the [`SubscriptionHandle`] returned from
//! `subscribe` carries only its slot id plus a reference to the table, so
//! neither side stores raw channel pointers back-and-forth.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use super::model::Point;

/// Per-subscriber channel depth.
///
/// A depth of one with a blocking send means at most one point is in
/// flight per subscriber; a slow consumer stalls the emission loop.
const CHANNEL_DEPTH: usize = 1;

/// Keyed slot table of subscriber channels.
#[derive(Default)]
pub(crate) struct SubscriberTable {
    channels: Mutex<HashMap<u64, mpsc::Sender<Point>>>,
    next_id: AtomicU64,
}

impl SubscriberTable {
    /// Allocate a new subscriber slot.
    pub(crate) async fn add(self: &Arc<Self>) -> (mpsc::Receiver<Point>, SubscriptionHandle) {
        let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.channels.lock().await.insert(id, tx);

        let handle = SubscriptionHandle {
            id,
            table: Arc::clone(self),
            cancelled: AtomicBool::new(false),
        };
        (rx, handle)
    }

    /// Deliver one point to every subscriber.
    ///
    /// The table lock is held for the whole fan-out so all subscribers see
    /// tick `k` before any sees tick `k+1`. A send to a closed channel is
    /// contained to that subscriber and the fan-out continues.
    pub(crate) async fn broadcast(&self, point: Point) {
        let channels = self.channels.lock().await;
        for tx in channels.values() {
            let _ = tx.send(point).await;
        }
    }

    pub(crate) async fn len(&self) -> usize {
        self.channels.lock().await.len()
    }

    async fn remove(&self, id: u64) {
        self.channels.lock().await.remove(&id);
    }
}

/// Cancel handle for one subscription.
///
/// Only the first `cancel` call takes effect; the slot is removed from the
/// table and the producer side of the channel closes. Dropping the handle
/// cancels as well, so an abandoned subscription cannot stall the loop
/// forever.
pub struct SubscriptionHandle {
    id: u64,
    table: Arc<SubscriberTable>,
    cancelled: AtomicBool,
}

impl SubscriptionHandle {
    /// Remove this subscription from the controller. Idempotent.
    pub async fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        self.table.remove(self.id).await;
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        // Best-effort removal without an async context.
        if let Ok(mut channels) = self.table.channels.try_lock() {
            channels.remove(&self.id);
        } else if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let table = Arc::clone(&self.table);
            let id = self.id;
            runtime.spawn(async move { table.remove(id).await });
        }
    }
}
