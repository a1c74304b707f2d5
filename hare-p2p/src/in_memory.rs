use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::trace;

use crate::{
    error::P2pError,
    ports::{P2pPublisher, P2pSubscriber},
};

const SUBSCRIPTION_CAPACITY: usize = 1024;

struct Subscription {
    node: usize,
    tx: mpsc::Sender<Vec<u8>>,
}

#[derive(Default)]
struct SimState {
    next_node: usize,
    shut_down: bool,
    topics: HashMap<String, Vec<Subscription>>,
}

/// In-process gossip network.
///
/// Every payload published by a node is delivered to every other node
/// subscribed to the topic, in the order the publisher sent it.
#[derive(Clone, Default)]
pub struct Simulator {
    state: Arc<Mutex<SimState>>,
}

impl Simulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_node(&self) -> SimNode {
        let mut state = self.lock();
        let id = state.next_node;
        state.next_node += 1;
        SimNode { id, sim: self.clone() }
    }

    /// Takes the network down. Open subscriptions end once drained and
    /// every later publish fails with [`P2pError::Closed`].
    pub fn shutdown(&self) {
        let mut state = self.lock();
        state.shut_down = true;
        state.topics.clear();
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn peers_of(&self, node: usize, topic: &str) -> Result<Vec<mpsc::Sender<Vec<u8>>>, P2pError> {
        let mut state = self.lock();
        if state.shut_down {
            return Err(P2pError::Closed);
        }
        let Some(subs) = state.topics.get_mut(topic) else {
            return Ok(Vec::new());
        };
        subs.retain(|s| !s.tx.is_closed());
        Ok(subs
            .iter()
            .filter(|s| s.node != node)
            .map(|s| s.tx.clone())
            .collect())
    }
}

#[derive(Clone)]
pub struct SimNode {
    id: usize,
    sim: Simulator,
}

impl SimNode {
    pub fn id(&self) -> usize {
        self.id
    }
}

#[async_trait]
impl P2pPublisher for SimNode {
    async fn publish(&self, topic: &str, data: Vec<u8>) -> Result<(), P2pError> {
        for tx in self.sim.peers_of(self.id, topic)? {
            if tx.send(data.clone()).await.is_err() {
                trace!(node = self.id, topic, "subscriber went away during publish");
            }
        }
        Ok(())
    }
}

impl P2pSubscriber for SimNode {
    fn subscribe(&self, topic: &str) -> mpsc::Receiver<Vec<u8>> {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_CAPACITY);
        let mut state = self.sim.lock();
        if !state.shut_down {
            state
                .topics
                .entry(topic.to_string())
                .or_default()
                .push(Subscription { node: self.id, tx });
        }
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_publish_reaches_other_nodes_only() {
        let sim = Simulator::new();
        let n1 = sim.new_node();
        let n2 = sim.new_node();

        let mut rx1 = n1.subscribe("t");
        let mut rx2 = n2.subscribe("t");

        n2.publish("t", b"hello".to_vec()).await.unwrap();

        let got = timeout(Duration::from_secs(1), rx1.recv()).await.unwrap();
        assert_eq!(got.as_deref(), Some(&b"hello"[..]));
        assert!(rx2.try_recv().is_err(), "publisher must not hear itself");
    }

    #[tokio::test]
    async fn test_delivery_preserves_order() {
        let sim = Simulator::new();
        let n1 = sim.new_node();
        let n2 = sim.new_node();
        let mut rx = n1.subscribe("t");

        for i in 0..50u8 {
            n2.publish("t", vec![i]).await.unwrap();
        }
        for i in 0..50u8 {
            assert_eq!(rx.recv().await, Some(vec![i]));
        }
    }

    #[tokio::test]
    async fn test_topics_are_isolated() {
        let sim = Simulator::new();
        let n1 = sim.new_node();
        let n2 = sim.new_node();
        let mut rx = n1.subscribe("a");

        n2.publish("b", vec![1]).await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dropped_subscriber_is_pruned() {
        let sim = Simulator::new();
        let n1 = sim.new_node();
        let n2 = sim.new_node();
        drop(n1.subscribe("t"));

        n2.publish("t", vec![1]).await.unwrap();
        assert!(sim.lock().topics.get("t").map(|s| s.is_empty()).unwrap_or(true));
    }

    #[tokio::test]
    async fn test_shutdown_closes_network() {
        let sim = Simulator::new();
        let n1 = sim.new_node();
        let n2 = sim.new_node();
        let mut rx = n1.subscribe("t");

        n2.publish("t", vec![1]).await.unwrap();
        sim.shutdown();

        assert_eq!(rx.recv().await, Some(vec![1]));
        assert_eq!(rx.recv().await, None);
        assert!(matches!(n2.publish("t", vec![2]).await, Err(P2pError::Closed)));
        assert_eq!(n1.subscribe("t").recv().await, None);
    }
}
