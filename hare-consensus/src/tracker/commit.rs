use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use hare_common::{Message, Round, Set, SmesherId};

use super::{detect_equivocation, EquivocationHandler};

/// Commits backing the proposed set, enough of them to prove agreement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Certificate {
    pub values: Set,
    pub commits: Vec<Message>,
}

/// Counts commits for the set accepted in the proposal round.
pub struct CommitTracker {
    proposed: Option<Set>,
    commits: HashMap<SmesherId, Message>,
    threshold: u32,
    handler: EquivocationHandler,
}

impl CommitTracker {
    pub fn new(proposed: Option<Set>, threshold: u32, handler: EquivocationHandler) -> Self {
        Self {
            proposed,
            commits: HashMap::new(),
            threshold,
            handler,
        }
    }

    pub fn on_commit(&mut self, msg: Message) {
        if let Some(prev) = self.commits.get(&msg.smesher_id) {
            if let Some(eq) = detect_equivocation(prev, &msg) {
                self.handler.punish(eq, "commit round");
            }
            return;
        }

        if self.matches_proposed(&msg) {
            self.handler
                .eligibility()
                .track(msg.smesher_id, Round::Commit, msg.eligibility.count, true);
        } else {
            debug!(
                smesher = %msg.smesher_id,
                values = %msg.value_set(),
                "commit for a different set"
            );
        }
        self.commits.insert(msg.smesher_id, msg);
    }

    fn matches_proposed(&self, msg: &Message) -> bool {
        self.proposed.as_ref().is_some_and(|p| *p == msg.value_set())
    }

    fn matching(&self) -> impl Iterator<Item = &Message> {
        let eligibility = self.handler.eligibility();
        self.commits
            .values()
            .filter(move |m| !eligibility.is_dishonest(&m.smesher_id, Round::Commit))
            .filter(move |m| self.matches_proposed(m))
    }

    pub fn commit_weight(&self) -> u32 {
        self.matching().map(|m| u32::from(m.eligibility.count)).sum()
    }

    pub fn has_enough_commits(&self) -> bool {
        self.proposed.is_some() && self.commit_weight() >= self.threshold
    }

    pub fn build_certificate(&self) -> Option<Certificate> {
        if !self.has_enough_commits() {
            return None;
        }
        let values = self.proposed.clone()?;
        let mut commits: Vec<Message> = self.matching().cloned().collect();
        commits.sort_by_key(|m| m.smesher_id);
        Some(Certificate { values, commits })
    }

    pub fn proposed_set(&self) -> Option<&Set> {
        self.proposed.as_ref()
    }
}
