//! Demultiplexes hare gossip into per-instance inboxes.
//!
//! One intake task reads the hare topic and routes every envelope by its
//! instance id. Live instances get a non-blocking send into their bounded
//! inbox. Unknown instances are buffered until they register, and
//! instances that already concluded have their traffic discarded. The
//! intake task never waits on a consumer.
//!
//! Lock order is `instances` then `early`. The early lock is only held
//! around buffer inserts and replays.

mod inbox;
mod pending;

pub use inbox::Inbox;

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};
use std::time::Instant;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

use hare_common::{HareEnvelope, HareError, InstanceId, Result};
use hare_p2p::{P2pSubscriber, HARE_PROTOCOL};

use crate::config::HareConfig;
use pending::{ConcludedInstances, EarlyMessageBuffer};

/// Point-in-time counters of the broker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BrokerStats {
    pub live_instances: usize,
    pub buffered: usize,
    pub dropped_full: u64,
    pub evicted_early: u64,
    pub discarded_concluded: u64,
    pub malformed: u64,
}

struct InstanceEntry {
    sender: mpsc::Sender<HareEnvelope>,
    registered_at: Instant,
}

/// Traffic for instances without a live entry.
struct EarlyState {
    pending: EarlyMessageBuffer,
    concluded: ConcludedInstances,
}

#[derive(Default)]
struct Counters {
    dropped_full: AtomicU64,
    evicted_early: AtomicU64,
    discarded_concluded: AtomicU64,
    malformed: AtomicU64,
}

struct BrokerInner {
    network: Arc<dyn P2pSubscriber>,
    instances: RwLock<HashMap<InstanceId, InstanceEntry>>,
    early: Mutex<EarlyState>,
    started: AtomicBool,
    closed: AtomicBool,
    counters: Counters,
    shutdown_tx: watch::Sender<bool>,
    done_tx: watch::Sender<bool>,
}

/// Routes hare envelopes to registered instances. Cheap to clone.
#[derive(Clone)]
pub struct Broker {
    inner: Arc<BrokerInner>,
}

impl Broker {
    pub fn new(network: Arc<dyn P2pSubscriber>, config: &HareConfig) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        let (done_tx, _) = watch::channel(false);
        let early = EarlyState {
            pending: EarlyMessageBuffer::new(
                config.early_buffer_capacity,
                config.early_buffer_per_instance,
            ),
            concluded: ConcludedInstances::new(config.concluded_memory),
        };
        Self {
            inner: Arc::new(BrokerInner {
                network,
                instances: RwLock::new(HashMap::new()),
                early: Mutex::new(early),
                started: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                counters: Counters::default(),
                shutdown_tx,
                done_tx,
            }),
        }
    }

    fn instances(&self) -> RwLockReadGuard<'_, HashMap<InstanceId, InstanceEntry>> {
        self.inner.instances.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn instances_mut(&self) -> RwLockWriteGuard<'_, HashMap<InstanceId, InstanceEntry>> {
        self.inner.instances.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn early(&self) -> MutexGuard<'_, EarlyState> {
        self.inner.early.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribes to the hare topic and spawns the intake loop.
    ///
    /// Must be called from within a tokio runtime. A second call fails with
    /// [`HareError::AlreadyStarted`] and leaves the running loop untouched.
    pub fn start(&self) -> Result<()> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Err(HareError::AlreadyStarted);
        }
        if self.inner.closed.load(Ordering::SeqCst) {
            self.inner.done_tx.send_replace(true);
            return Err(HareError::BrokerClosed);
        }

        let mut rx = self.inner.network.subscribe(HARE_PROTOCOL);
        let mut shutdown = self.inner.shutdown_tx.subscribe();
        let broker = self.clone();

        tokio::spawn(async move {
            info!(topic = HARE_PROTOCOL, "hare broker started");
            loop {
                if *shutdown.borrow() {
                    break;
                }
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    payload = rx.recv() => {
                        match payload {
                            Some(bytes) => broker.dispatch(&bytes),
                            None => {
                                debug!("hare subscription closed");
                                break;
                            }
                        }
                    }
                }
            }
            info!("hare broker stopped");
            broker.inner.done_tx.send_replace(true);
        });
        Ok(())
    }

    fn dispatch(&self, bytes: &[u8]) {
        let envelope = match HareEnvelope::decode(bytes) {
            Ok(envelope) => envelope,
            Err(err) => {
                self.inner.counters.malformed.fetch_add(1, Ordering::Relaxed);
                warn!(len = bytes.len(), %err, "dropping malformed hare envelope");
                return;
            }
        };
        let id = envelope.instance_id;
        let counters = &self.inner.counters;

        // held until the message is routed or buffered so a concurrent
        // register cannot miss it
        let instances = self.instances();
        if let Some(entry) = instances.get(&id) {
            match entry.sender.try_send(envelope) {
                Ok(()) => trace!(instance = %id, "message routed"),
                Err(mpsc::error::TrySendError::Full(_)) => {
                    counters.dropped_full.fetch_add(1, Ordering::Relaxed);
                    debug!(instance = %id, "inbox full, message dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(instance = %id, "inbox receiver gone, message dropped");
                }
            }
            return;
        }

        let mut early = self.early();
        if early.concluded.contains(&id) {
            counters.discarded_concluded.fetch_add(1, Ordering::Relaxed);
            trace!(instance = %id, "message for concluded instance discarded");
            return;
        }

        let evicted = early.pending.push(envelope);
        if evicted > 0 {
            counters.evicted_early.fetch_add(evicted as u64, Ordering::Relaxed);
            debug!(instance = %id, evicted, "early message buffer full, oldest evicted");
        }
        trace!(
            instance = %id,
            buffered = early.pending.len(),
            "message buffered for future instance"
        );
    }

    /// Creates the inbox of `id` with room for `capacity` messages and
    /// replays anything buffered for it.
    ///
    /// Registering a live id replaces the previous entry, whose inbox then
    /// ends after draining.
    pub fn register(&self, id: InstanceId, capacity: usize) -> Result<Inbox> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(HareError::BrokerClosed);
        }
        if capacity == 0 {
            return Err(HareError::InvalidCapacity);
        }

        let (tx, rx) = mpsc::channel(capacity);
        let mut instances = self.instances_mut();

        let replayed = {
            let mut early = self.early();
            early.concluded.remove(&id);
            let buffered = early.pending.take(&id);
            let replayed = buffered.len();
            for envelope in buffered {
                if tx.try_send(envelope).is_err() {
                    self.inner.counters.dropped_full.fetch_add(1, Ordering::Relaxed);
                }
            }
            replayed
        };

        let entry = InstanceEntry {
            sender: tx,
            registered_at: Instant::now(),
        };
        if instances.insert(id, entry).is_some() {
            warn!(instance = %id, "instance registered twice, previous inbox replaced");
        }
        debug!(instance = %id, capacity, replayed, "instance registered");
        Ok(Inbox::new(id, rx))
    }

    /// Removes `id`. Its inbox drains what it already holds and then ends.
    /// Later traffic for `id` is discarded. No-op if `id` is not registered.
    pub fn unregister(&self, id: &InstanceId) {
        let mut instances = self.instances_mut();
        if instances.remove(id).is_none() {
            trace!(instance = %id, "unregister of unknown instance ignored");
            return;
        }
        self.early().concluded.insert(*id);
        debug!(instance = %id, "instance unregistered");
    }

    /// Stops the intake loop and refuses further registrations. Idempotent.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("closing hare broker");
        self.inner.shutdown_tx.send_replace(true);
        if !self.inner.started.load(Ordering::SeqCst) {
            self.inner.done_tx.send_replace(true);
        }
    }

    /// Resolves once the intake loop has stopped after [`Broker::close`].
    pub fn close_channel(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.inner.done_tx.subscribe();
        async move {
            while !*rx.borrow_and_update() {
                if rx.changed().await.is_err() {
                    break;
                }
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    pub fn instance_count(&self) -> usize {
        self.instances().len()
    }

    pub fn is_registered(&self, id: &InstanceId) -> bool {
        self.instances().contains_key(id)
    }

    pub fn registered_at(&self, id: &InstanceId) -> Option<Instant> {
        self.instances().get(id).map(|e| e.registered_at)
    }

    pub fn stats(&self) -> BrokerStats {
        let live_instances = self.instance_count();
        let buffered = self.early().pending.len();
        let counters = &self.inner.counters;
        BrokerStats {
            live_instances,
            buffered,
            dropped_full: counters.dropped_full.load(Ordering::Relaxed),
            evicted_early: counters.evicted_early.load(Ordering::Relaxed),
            discarded_concluded: counters.discarded_concluded.load(Ordering::Relaxed),
            malformed: counters.malformed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hare_common::{Eligibility, LayerId, Message, Round};
    use hare_p2p::Simulator;

    fn broker(config: &HareConfig) -> Broker {
        let sim = Simulator::new();
        Broker::new(Arc::new(sim.new_node()), config)
    }

    fn envelope(id: InstanceId, layer: u32) -> Vec<u8> {
        let msg = Message::new(LayerId(layer), Round::Status, vec![], Eligibility::default());
        HareEnvelope::new(id, msg).encode().expect("encode")
    }

    #[test]
    fn test_register_rejects_zero_capacity() {
        let b = broker(&HareConfig::default());
        assert!(matches!(
            b.register(InstanceId::new([1; 32]), 0),
            Err(HareError::InvalidCapacity)
        ));
    }

    #[test]
    fn test_dispatch_buffers_then_replays() {
        let b = broker(&HareConfig::default());
        let id = InstanceId::new([7; 32]);
        for layer in 0..3 {
            b.dispatch(&envelope(id, layer));
        }
        assert_eq!(b.stats().buffered, 3);

        let mut inbox = b.register(id, 8).expect("register");
        let layers: Vec<u32> = std::iter::from_fn(|| inbox.try_recv())
            .map(|e| e.message.layer.value())
            .collect();
        assert_eq!(layers, vec![0, 1, 2]);
        assert_eq!(b.stats().buffered, 0);
    }

    #[test]
    fn test_replay_respects_inbox_capacity() {
        let b = broker(&HareConfig::default());
        let id = InstanceId::new([7; 32]);
        for layer in 0..3 {
            b.dispatch(&envelope(id, layer));
        }
        let inbox = b.register(id, 2).expect("register");
        assert_eq!(inbox.len(), 2);
        assert_eq!(b.stats().dropped_full, 1);
    }

    #[test]
    fn test_concluded_traffic_discarded_until_reregistered() {
        let b = broker(&HareConfig::default());
        let id = InstanceId::new([3; 32]);
        let _inbox = b.register(id, 4).expect("register");
        b.unregister(&id);
        b.dispatch(&envelope(id, 1));

        let stats = b.stats();
        assert_eq!(stats.discarded_concluded, 1);
        assert_eq!(stats.buffered, 0);

        let mut again = b.register(id, 4).expect("register");
        b.dispatch(&envelope(id, 2));
        assert_eq!(again.try_recv().map(|e| e.message.layer.value()), Some(2));
    }

    #[test]
    fn test_unregister_unknown_is_noop() {
        let b = broker(&HareConfig::default());
        let id = InstanceId::new([5; 32]);

        b.dispatch(&envelope(id, 1));
        b.unregister(&id);
        assert_eq!(b.stats().buffered, 1);

        b.dispatch(&envelope(id, 2));
        let stats = b.stats();
        assert_eq!(stats.buffered, 2);
        assert_eq!(stats.discarded_concluded, 0);
        assert_eq!(stats.live_instances, 0);

        let mut inbox = b.register(id, 4).expect("register");
        let layers: Vec<u32> = std::iter::from_fn(|| inbox.try_recv())
            .map(|e| e.message.layer.value())
            .collect();
        assert_eq!(layers, vec![1, 2]);
    }

    #[test]
    fn test_malformed_counted() {
        let b = broker(&HareConfig::default());
        b.dispatch(b"definitely not an envelope");
        assert_eq!(b.stats().malformed, 1);
    }

    #[test]
    fn test_reregister_replaces_entry() {
        let b = broker(&HareConfig::default());
        let id = InstanceId::new([4; 32]);
        let mut first = b.register(id, 4).expect("register");
        let mut second = b.register(id, 4).expect("register");
        assert_eq!(b.instance_count(), 1);

        b.dispatch(&envelope(id, 9));
        assert!(first.try_recv().is_none());
        assert!(second.try_recv().is_some());
    }

    #[tokio::test]
    async fn test_close_before_start_completes() {
        let b = broker(&HareConfig::default());
        b.close();
        b.close();
        tokio::time::timeout(std::time::Duration::from_secs(3), b.close_channel())
            .await
            .expect("closed in time");
        assert!(matches!(b.start(), Err(HareError::BrokerClosed)));
        assert!(matches!(b.register(InstanceId::new([1; 32]), 1), Err(HareError::BrokerClosed)));
    }
}
