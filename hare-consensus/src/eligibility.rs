use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use hare_common::{Round, SmesherId};

/// Claimed weight of a participant and whether it is still considered honest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cred {
    pub count: u16,
    pub honest: bool,
}

/// Per-round ledger of participants' eligibility.
///
/// One tracker is shared by all round trackers of a single instance. Once a
/// participant is marked dishonest for a round it stays dishonest for that
/// round.
#[derive(Debug, Default)]
pub struct EligibilityTracker {
    rounds: RwLock<HashMap<Round, HashMap<SmesherId, Cred>>>,
}

impl EligibilityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&self, sender: SmesherId, round: Round, count: u16, honest: bool) {
        let mut rounds = self.rounds.write().unwrap_or_else(PoisonError::into_inner);
        rounds
            .entry(round)
            .or_default()
            .entry(sender)
            .and_modify(|cred| {
                cred.count = count;
                cred.honest &= honest;
            })
            .or_insert(Cred { count, honest });
    }

    pub fn cred(&self, sender: &SmesherId, round: Round) -> Option<Cred> {
        let rounds = self.rounds.read().unwrap_or_else(PoisonError::into_inner);
        rounds.get(&round).and_then(|r| r.get(sender)).copied()
    }

    pub fn is_dishonest(&self, sender: &SmesherId, round: Round) -> bool {
        matches!(self.cred(sender, round), Some(Cred { honest: false, .. }))
    }

    /// Sum of the weight claimed by honest participants in `round`.
    pub fn honest_weight(&self, round: Round) -> u32 {
        let rounds = self.rounds.read().unwrap_or_else(PoisonError::into_inner);
        rounds
            .get(&round)
            .map(|r| r.values().filter(|c| c.honest).map(|c| u32::from(c.count)).sum())
            .unwrap_or(0)
    }

    pub fn dishonest(&self, round: Round) -> Vec<SmesherId> {
        let rounds = self.rounds.read().unwrap_or_else(PoisonError::into_inner);
        let mut out: Vec<SmesherId> = rounds
            .get(&round)
            .map(|r| r.iter().filter(|(_, c)| !c.honest).map(|(id, _)| *id).collect())
            .unwrap_or_default();
        out.sort();
        out
    }

    pub fn for_each<F: FnMut(&SmesherId, &Cred)>(&self, round: Round, mut f: F) {
        let rounds = self.rounds.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(r) = rounds.get(&round) {
            for (id, cred) in r {
                f(id, cred);
            }
        }
    }
}
