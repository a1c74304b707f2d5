use tokio::sync::mpsc::{self, error::TryRecvError};

use hare_common::{HareEnvelope, InstanceId};

/// Receiving end of one registered instance.
///
/// Once the instance is unregistered, or the broker replaces it, the inbox
/// yields whatever is still queued and then ends.
#[derive(Debug)]
pub struct Inbox {
    instance_id: InstanceId,
    rx: mpsc::Receiver<HareEnvelope>,
}

impl Inbox {
    pub(crate) fn new(instance_id: InstanceId, rx: mpsc::Receiver<HareEnvelope>) -> Self {
        Self { instance_id, rx }
    }

    pub fn instance_id(&self) -> InstanceId {
        self.instance_id
    }

    /// Waits for the next message. `None` once the inbox is inert and empty.
    pub async fn recv(&mut self) -> Option<HareEnvelope> {
        self.rx.recv().await
    }

    /// Next queued message, if any, without waiting.
    pub fn try_recv(&mut self) -> Option<HareEnvelope> {
        match self.rx.try_recv() {
            Ok(envelope) => Some(envelope),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
