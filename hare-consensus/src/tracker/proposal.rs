use tracing::{debug, warn};

use hare_common::{Message, Set};

use super::{detect_equivocation, EquivocationHandler};

/// Tracks the leader proposal of one instance.
///
/// The accepted proposal is the one whose eligibility proof ranks highest
/// among those seen during the proposal round. Equivocation by the accepted
/// leader, or a higher ranked proposal arriving after the round closed,
/// marks the round conflicting and voids its output.
pub struct ProposalTracker {
    proposal: Option<Message>,
    is_conflicting: bool,
    handler: EquivocationHandler,
}

impl ProposalTracker {
    pub fn new(handler: EquivocationHandler) -> Self {
        Self {
            proposal: None,
            is_conflicting: false,
            handler,
        }
    }

    /// Tracks a proposal received during the proposal round.
    pub fn on_proposal(&mut self, msg: Message) {
        let Some(current) = &self.proposal else {
            // first leader
            self.proposal = Some(msg);
            return;
        };

        if current.smesher_id == msg.smesher_id {
            if let Some(eq) = detect_equivocation(current, &msg) {
                self.is_conflicting = true;
                self.handler.punish(eq, "proposal round");
            }
            return;
        }

        if !msg.eligibility.proof.outranks(&current.eligibility.proof) {
            debug!(
                smesher = %msg.smesher_id,
                leader = %current.smesher_id,
                "ignoring proposal ranked below current leader"
            );
            return;
        }

        debug!(
            smesher = %msg.smesher_id,
            replaced = %current.smesher_id,
            "higher ranked proposal replaces current leader"
        );
        self.proposal = Some(msg);
        self.is_conflicting = false;
    }

    /// Tracks a proposal that arrived after the proposal round closed.
    ///
    /// A late message never replaces the accepted proposal.
    pub fn on_late_proposal(&mut self, msg: &Message) {
        let Some(current) = &self.proposal else {
            return;
        };

        if current.smesher_id == msg.smesher_id {
            if let Some(eq) = detect_equivocation(current, msg) {
                self.is_conflicting = true;
                self.handler.punish(eq, "proposal round - late");
            }
            return;
        }

        if msg.eligibility.proof.outranks(&current.eligibility.proof) {
            warn!(
                smesher = %msg.smesher_id,
                leader = %current.smesher_id,
                "late higher ranked proposal detected"
            );
            self.is_conflicting = true;
        }
    }

    pub fn is_conflicting(&self) -> bool {
        self.is_conflicting
    }

    /// Value set of the accepted proposal, `None` if there is none or the
    /// round is conflicting.
    pub fn proposed_set(&self) -> Option<Set> {
        if self.is_conflicting {
            return None;
        }
        self.proposal.as_ref().map(Message::value_set)
    }

    pub fn proposal(&self) -> Option<&Message> {
        self.proposal.as_ref()
    }
}
