use std::collections::HashMap;

use tracing::debug;

use hare_common::{crypto::Hash32, Message, Round, Set, SmesherId};

use super::{detect_equivocation, honest_weight, EquivocationHandler};

/// Counts notifications per certified set.
pub struct NotifyTracker {
    notifies: HashMap<SmesherId, Message>,
    threshold: u32,
    handler: EquivocationHandler,
}

impl NotifyTracker {
    pub fn new(threshold: u32, handler: EquivocationHandler) -> Self {
        Self {
            notifies: HashMap::new(),
            threshold,
            handler,
        }
    }

    /// Returns true if the sender had already notified.
    pub fn on_notify(&mut self, msg: Message) -> bool {
        if let Some(prev) = self.notifies.get(&msg.smesher_id) {
            if let Some(eq) = detect_equivocation(prev, &msg) {
                self.handler.punish(eq, "notify round");
            }
            return true;
        }

        debug!(smesher = %msg.smesher_id, values = %msg.value_set(), "notify recorded");
        self.handler
            .eligibility()
            .track(msg.smesher_id, Round::Notify, msg.eligibility.count, true);
        self.notifies.insert(msg.smesher_id, msg);
        false
    }

    /// Honest weight notifying `set`.
    pub fn notifications_count(&self, set: &Set) -> u32 {
        honest_weight(
            self.handler.eligibility(),
            Round::Notify,
            self.notifies.values().filter(|m| m.value_set() == *set),
        )
    }

    pub fn has_certificate(&self, set: &Set) -> bool {
        self.notifications_count(set) >= self.threshold
    }

    /// The set with the most honest notify weight, if it reaches the threshold.
    pub fn certified_set(&self) -> Option<Set> {
        let mut by_id: HashMap<Hash32, Set> = HashMap::new();
        for msg in self.notifies.values() {
            let set = msg.value_set();
            by_id.entry(set.id()).or_insert(set);
        }
        by_id
            .into_values()
            .map(|set| (self.notifications_count(&set), set))
            .filter(|(weight, _)| *weight >= self.threshold)
            .max_by(|(wa, a), (wb, b)| wa.cmp(wb).then_with(|| b.id().cmp(&a.id())))
            .map(|(_, set)| set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::test_utils::*;
    use hare_common::auth::ed25519::Ed25519Authenticator;

    #[test]
    fn test_certificate_per_set() {
        let (handler, _rx) = handler(4);
        let mut nt = NotifyTracker::new(3, handler);
        let a = Ed25519Authenticator::generate();
        let b = Ed25519Authenticator::generate();
        let c = Ed25519Authenticator::generate();

        assert!(!nt.on_notify(signed(&a, Round::Notify, &[1, 2], 2, vec![1])));
        assert!(!nt.on_notify(signed(&b, Round::Notify, &[2, 1], 1, vec![1])));
        assert!(!nt.on_notify(signed(&c, Round::Notify, &[5], 4, vec![1])));

        let set = Set::new([pid(1), pid(2)]);
        assert_eq!(nt.notifications_count(&set), 3);
        assert!(nt.has_certificate(&set));
        assert_eq!(nt.certified_set(), Some(Set::new([pid(5)])));
    }

    #[test]
    fn test_repeat_sender_reported() {
        let (handler, mut rx) = handler(4);
        let mut nt = NotifyTracker::new(1, handler);
        let a = Ed25519Authenticator::generate();

        assert!(!nt.on_notify(signed(&a, Round::Notify, &[1], 1, vec![1])));
        assert!(nt.on_notify(signed(&a, Round::Notify, &[1], 1, vec![1])));
        assert!(rx.try_recv().is_err());

        assert!(nt.on_notify(signed(&a, Round::Notify, &[2], 1, vec![1])));
        assert!(rx.try_recv().is_ok());
        assert_eq!(nt.notifications_count(&Set::new([pid(1)])), 0);
        assert!(nt.certified_set().is_none());
    }
}
