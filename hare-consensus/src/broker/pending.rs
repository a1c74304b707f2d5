use std::collections::{HashMap, HashSet, VecDeque};

use hare_common::{HareEnvelope, InstanceId};

/// Messages addressed to instances that have not registered yet.
///
/// Bounded per instance and in total. Once either bound is hit the oldest
/// message is evicted first.
#[derive(Debug)]
pub(crate) struct EarlyMessageBuffer {
    queues: HashMap<InstanceId, VecDeque<HareEnvelope>>,
    arrivals: VecDeque<InstanceId>,
    per_instance: usize,
    total: usize,
}

impl EarlyMessageBuffer {
    pub(crate) fn new(total: usize, per_instance: usize) -> Self {
        Self {
            queues: HashMap::new(),
            arrivals: VecDeque::new(),
            per_instance: per_instance.max(1),
            total: total.max(1),
        }
    }

    /// Buffers `envelope` and returns how many messages were evicted to make
    /// room for it.
    pub(crate) fn push(&mut self, envelope: HareEnvelope) -> usize {
        let id = envelope.instance_id;
        let mut evicted = 0;

        let queue = self.queues.entry(id).or_default();
        if queue.len() >= self.per_instance {
            queue.pop_front();
            if let Some(pos) = self.arrivals.iter().position(|a| *a == id) {
                self.arrivals.remove(pos);
            }
            evicted += 1;
        }
        queue.push_back(envelope);
        self.arrivals.push_back(id);

        while self.arrivals.len() > self.total {
            let Some(oldest) = self.arrivals.pop_front() else { break };
            if let Some(queue) = self.queues.get_mut(&oldest) {
                queue.pop_front();
                if queue.is_empty() {
                    self.queues.remove(&oldest);
                }
            }
            evicted += 1;
        }
        evicted
    }

    /// Removes and returns everything held for `id`, oldest first.
    pub(crate) fn take(&mut self, id: &InstanceId) -> Vec<HareEnvelope> {
        match self.queues.remove(id) {
            Some(queue) => {
                self.arrivals.retain(|a| a != id);
                queue.into()
            }
            None => Vec::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.arrivals.len()
    }

    pub(crate) fn len_for(&self, id: &InstanceId) -> usize {
        self.queues.get(id).map_or(0, VecDeque::len)
    }
}

/// Bounded memory of unregistered instances, oldest forgotten first.
#[derive(Debug)]
pub(crate) struct ConcludedInstances {
    ids: HashSet<InstanceId>,
    order: VecDeque<InstanceId>,
    capacity: usize,
}

impl ConcludedInstances {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            ids: HashSet::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    pub(crate) fn insert(&mut self, id: InstanceId) {
        if self.capacity == 0 || !self.ids.insert(id) {
            return;
        }
        self.order.push_back(id);
        while self.order.len() > self.capacity {
            if let Some(old) = self.order.pop_front() {
                self.ids.remove(&old);
            }
        }
    }

    pub(crate) fn remove(&mut self, id: &InstanceId) {
        if self.ids.remove(id) {
            self.order.retain(|o| o != id);
        }
    }

    pub(crate) fn contains(&self, id: &InstanceId) -> bool {
        self.ids.contains(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hare_common::{Eligibility, LayerId, Message, Round};

    fn envelope(instance: u8, layer: u32) -> HareEnvelope {
        let msg = Message::new(LayerId(layer), Round::Status, vec![], Eligibility::default());
        HareEnvelope::new(InstanceId::new([instance; 32]), msg)
    }

    fn layers(items: &[HareEnvelope]) -> Vec<u32> {
        items.iter().map(|e| e.message.layer.value()).collect()
    }

    #[test]
    fn test_take_preserves_arrival_order() {
        let mut buf = EarlyMessageBuffer::new(16, 16);
        for layer in 0..3 {
            buf.push(envelope(1, layer));
            buf.push(envelope(2, layer + 10));
        }
        assert_eq!(buf.len(), 6);
        assert_eq!(layers(&buf.take(&InstanceId::new([1; 32]))), vec![0, 1, 2]);
        assert_eq!(buf.len(), 3);
        assert!(buf.take(&InstanceId::new([1; 32])).is_empty());
    }

    #[test]
    fn test_per_instance_bound_drops_oldest() {
        let mut buf = EarlyMessageBuffer::new(16, 2);
        assert_eq!(buf.push(envelope(1, 0)), 0);
        assert_eq!(buf.push(envelope(1, 1)), 0);
        assert_eq!(buf.push(envelope(1, 2)), 1);
        assert_eq!(buf.len(), 2);
        assert_eq!(layers(&buf.take(&InstanceId::new([1; 32]))), vec![1, 2]);
    }

    #[test]
    fn test_total_bound_drops_globally_oldest() {
        let mut buf = EarlyMessageBuffer::new(3, 3);
        buf.push(envelope(1, 0));
        buf.push(envelope(2, 1));
        buf.push(envelope(2, 2));
        assert_eq!(buf.push(envelope(3, 3)), 1);

        assert_eq!(buf.len(), 3);
        assert_eq!(buf.len_for(&InstanceId::new([1; 32])), 0);
        assert_eq!(layers(&buf.take(&InstanceId::new([2; 32]))), vec![1, 2]);
        assert_eq!(layers(&buf.take(&InstanceId::new([3; 32]))), vec![3]);
    }

    #[test]
    fn test_concluded_forgets_oldest() {
        let mut concluded = ConcludedInstances::new(2);
        for b in 1..=3u8 {
            concluded.insert(InstanceId::new([b; 32]));
        }
        assert!(!concluded.contains(&InstanceId::new([1; 32])));
        assert!(concluded.contains(&InstanceId::new([3; 32])));

        concluded.remove(&InstanceId::new([3; 32]));
        assert!(!concluded.contains(&InstanceId::new([3; 32])));
    }
}
