use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::P2pError;

#[async_trait]
pub trait P2pPublisher: Send + Sync {
    async fn publish(&self, topic: &str, data: Vec<u8>) -> Result<(), P2pError>;
}

pub trait P2pSubscriber: Send + Sync {
    /// Raw payloads gossiped on `topic`, in delivery order.
    fn subscribe(&self, topic: &str) -> mpsc::Receiver<Vec<u8>>;
}
