use std::collections::HashMap;

use tracing::debug;

use hare_common::{Message, Round, Set, SmesherId};

use super::{detect_equivocation, honest_weight, EquivocationHandler};

/// Collects status messages and decides whether enough honest weight backs
/// a safe value proposal.
pub struct StatusTracker {
    statuses: HashMap<SmesherId, Message>,
    threshold: u32,
    ready: bool,
    handler: EquivocationHandler,
}

impl StatusTracker {
    pub fn new(threshold: u32, handler: EquivocationHandler) -> Self {
        Self {
            statuses: HashMap::new(),
            threshold,
            ready: false,
            handler,
        }
    }

    pub fn record_status(&mut self, msg: Message) {
        if let Some(prev) = self.statuses.get(&msg.smesher_id) {
            if let Some(eq) = detect_equivocation(prev, &msg) {
                self.handler.punish(eq, "status round");
            }
            return;
        }

        debug!(smesher = %msg.smesher_id, values = %msg.value_set(), "status recorded");
        self.handler
            .eligibility()
            .track(msg.smesher_id, Round::Status, msg.eligibility.count, true);
        self.statuses.insert(msg.smesher_id, msg);
    }

    /// Re-evaluates readiness against the honest weight seen so far.
    pub fn analyze(&mut self) {
        let eligibility = self.handler.eligibility();
        let weight = honest_weight(eligibility, Round::Status, self.statuses.values());
        self.ready = weight >= self.threshold;
        debug!(weight, threshold = self.threshold, ready = self.ready, "status round analyzed");
    }

    pub fn is_svp_ready(&self) -> bool {
        self.ready
    }

    /// Union of the sets reported by senders that are still honest.
    pub fn proposal_set(&self) -> Option<Set> {
        if !self.ready {
            return None;
        }
        let eligibility = self.handler.eligibility();
        let set = self
            .statuses
            .values()
            .filter(|m| !eligibility.is_dishonest(&m.smesher_id, Round::Status))
            .fold(Set::empty(), |acc, m| acc.union(&m.value_set()));
        Some(set)
    }

    pub fn status_count(&self) -> usize {
        self.statuses.len()
    }
}
