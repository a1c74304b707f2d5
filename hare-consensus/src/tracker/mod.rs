//! Round trackers.
//!
//! Every tracker consumes the already-verified messages of one round of one
//! instance. They share the same conflict skeleton: the first message of a
//! sender is kept, and a later message from that sender with a different
//! value set is equivocation. Detection is the pure [`detect_equivocation`];
//! [`EquivocationHandler::punish`] carries out the side effects.

pub mod commit;
pub mod notify;
pub mod proposal;
pub mod status;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::warn;

use hare_common::{
    Eligibility, HareProofMsg, LayerId, MalfeasanceGossip, Message, Round, Set, SmesherId,
};

use crate::{eligibility::EligibilityTracker, malfeasance::report_equivocation};

/// Two conflicting messages from one sender in one round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Equivocation {
    pub smesher_id: SmesherId,
    pub layer: LayerId,
    pub round: Round,
    pub prev: HareProofMsg,
    pub this: HareProofMsg,
    pub prev_set: Set,
    pub this_set: Set,
    /// Eligibility carried by the later message.
    pub eligibility: Eligibility,
}

pub(crate) fn proof_msg(msg: &Message) -> HareProofMsg {
    HareProofMsg {
        inner_msg: msg.metadata(),
        signature: msg.signature,
    }
}

/// Returns the equivocation `curr` commits against `prev`, if any.
pub fn detect_equivocation(prev: &Message, curr: &Message) -> Option<Equivocation> {
    if prev.smesher_id != curr.smesher_id || prev.layer != curr.layer || prev.round != curr.round {
        return None;
    }
    let prev_set = prev.value_set();
    let this_set = curr.value_set();
    if prev_set == this_set {
        return None;
    }
    Some(Equivocation {
        smesher_id: curr.smesher_id,
        layer: curr.layer,
        round: curr.round,
        prev: proof_msg(prev),
        this: proof_msg(curr),
        prev_set,
        this_set,
        eligibility: curr.eligibility.clone(),
    })
}

/// Marks equivocators dishonest and emits their malfeasance proofs.
#[derive(Clone)]
pub struct EquivocationHandler {
    eligibility: Arc<EligibilityTracker>,
    mal_tx: mpsc::Sender<MalfeasanceGossip>,
}

impl EquivocationHandler {
    pub fn new(
        eligibility: Arc<EligibilityTracker>,
        mal_tx: mpsc::Sender<MalfeasanceGossip>,
    ) -> Self {
        Self { eligibility, mal_tx }
    }

    pub fn eligibility(&self) -> &Arc<EligibilityTracker> {
        &self.eligibility
    }

    pub fn punish(&self, eq: Equivocation, context: &str) {
        warn!(
            smesher = %eq.smesher_id,
            layer = %eq.layer,
            prev = %eq.prev_set,
            curr = %eq.this_set,
            "equivocation detected in {context}"
        );
        self.eligibility.track(eq.smesher_id, eq.round, eq.eligibility.count, false);
        let reported =
            report_equivocation(eq.smesher_id, eq.prev, eq.this, &eq.eligibility, &self.mal_tx);
        if let Err(err) = reported {
            warn!(smesher = %eq.smesher_id, %err, "failed to report equivocation in {context}");
        }
    }
}

/// Sum of the weight carried by `messages` from senders still honest in `round`.
pub(crate) fn honest_weight<'a, I>(
    eligibility: &EligibilityTracker,
    round: Round,
    messages: I,
) -> u32
where
    I: IntoIterator<Item = &'a Message>,
{
    messages
        .into_iter()
        .filter(|m| !eligibility.is_dishonest(&m.smesher_id, round))
        .map(|m| u32::from(m.eligibility.count))
        .sum()
}
