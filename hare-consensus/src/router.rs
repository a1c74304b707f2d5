use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use hare_common::{
    auth::Verifier, HareEnvelope, InstanceId, MalfeasanceGossip, Message, Round,
};

use crate::{
    broker::Inbox,
    config::HareConfig,
    eligibility::EligibilityTracker,
    tracker::{
        commit::CommitTracker, notify::NotifyTracker, proposal::ProposalTracker,
        status::StatusTracker, EquivocationHandler,
    },
};

/// Feeds one instance's inbox into its round trackers.
///
/// The consensus loop that owns the instance decides when rounds change
/// and calls [`RoundRouter::set_round`]; the router only verifies and
/// dispatches. All trackers share one [`EligibilityTracker`].
pub struct RoundRouter {
    instance_id: InstanceId,
    round: Round,
    threshold: u32,
    early_commit_limit: usize,
    verifier: Arc<dyn Verifier>,
    handler: EquivocationHandler,
    status: StatusTracker,
    proposal: ProposalTracker,
    commit: Option<CommitTracker>,
    early_commits: Vec<Message>,
    notify: NotifyTracker,
}

impl RoundRouter {
    pub fn new(
        instance_id: InstanceId,
        config: &HareConfig,
        verifier: Arc<dyn Verifier>,
        mal_tx: mpsc::Sender<MalfeasanceGossip>,
    ) -> Self {
        let handler = EquivocationHandler::new(Arc::new(EligibilityTracker::new()), mal_tx);
        let threshold = config.committee_threshold;
        Self {
            instance_id,
            round: Round::Status,
            threshold,
            early_commit_limit: config.inbox_capacity,
            verifier,
            status: StatusTracker::new(threshold, handler.clone()),
            proposal: ProposalTracker::new(handler.clone()),
            commit: None,
            early_commits: Vec::new(),
            notify: NotifyTracker::new(threshold, handler.clone()),
            handler,
        }
    }

    /// Moves the instance to `round`. Going backwards is ignored.
    pub fn set_round(&mut self, round: Round) {
        if round < self.round {
            warn!(
                instance = %self.instance_id,
                current = %self.round,
                requested = %round,
                "round cannot go backwards"
            );
            return;
        }
        debug!(instance = %self.instance_id, %round, "entering round");
        self.round = round;

        if round >= Round::Proposal {
            self.status.analyze();
        }
        if round >= Round::Commit && self.commit.is_none() {
            let proposed = self.proposal.proposed_set();
            let mut commit = CommitTracker::new(proposed, self.threshold, self.handler.clone());
            for msg in self.early_commits.drain(..) {
                commit.on_commit(msg);
            }
            self.commit = Some(commit);
        }
    }

    /// Verifies `envelope` and hands its message to the tracker of its
    /// round. Returns false if the envelope was rejected.
    pub fn handle(&mut self, envelope: HareEnvelope) -> bool {
        if envelope.instance_id != self.instance_id {
            warn!(
                instance = %self.instance_id,
                tagged = %envelope.instance_id,
                "dropping message tagged for another instance"
            );
            return false;
        }
        let msg = envelope.message;
        if !msg.verify(self.verifier.as_ref()) {
            warn!(
                instance = %self.instance_id,
                smesher = %msg.smesher_id,
                round = %msg.round,
                "dropping message with invalid signature"
            );
            return false;
        }

        trace!(
            instance = %self.instance_id,
            smesher = %msg.smesher_id,
            round = %msg.round,
            "routing message"
        );
        match msg.round {
            Round::Status => self.status.record_status(msg),
            Round::Proposal if self.round <= Round::Proposal => self.proposal.on_proposal(msg),
            Round::Proposal => self.proposal.on_late_proposal(&msg),
            Round::Commit => match self.commit.as_mut() {
                Some(commit) => commit.on_commit(msg),
                None if self.early_commits.len() < self.early_commit_limit => {
                    self.early_commits.push(msg)
                }
                None => {
                    debug!(
                        instance = %self.instance_id,
                        smesher = %msg.smesher_id,
                        "early commit buffer full"
                    );
                    return false;
                }
            },
            Round::Notify => {
                self.notify.on_notify(msg);
            }
        }
        true
    }

    /// Handles everything currently queued in `inbox` without waiting.
    pub fn drain_ready(&mut self, inbox: &mut Inbox) -> usize {
        let mut handled = 0;
        while let Some(envelope) = inbox.try_recv() {
            if self.handle(envelope) {
                handled += 1;
            }
        }
        handled
    }

    pub fn instance_id(&self) -> InstanceId {
        self.instance_id
    }

    pub fn round(&self) -> Round {
        self.round
    }

    pub fn eligibility(&self) -> &Arc<EligibilityTracker> {
        self.handler.eligibility()
    }

    pub fn status(&self) -> &StatusTracker {
        &self.status
    }

    pub fn proposal(&self) -> &ProposalTracker {
        &self.proposal
    }

    pub fn commit(&self) -> Option<&CommitTracker> {
        self.commit.as_ref()
    }

    pub fn notify(&self) -> &NotifyTracker {
        &self.notify
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::test_utils::*;
    use hare_common::{
        auth::{ed25519::{Ed25519Authenticator, Ed25519Verifier}, Authenticator},
        LayerId, Set,
    };

    fn router() -> (RoundRouter, mpsc::Receiver<MalfeasanceGossip>) {
        let (tx, rx) = mpsc::channel(8);
        let id = InstanceId::from_layer(LayerId(1));
        (RoundRouter::new(id, &HareConfig::default(), Arc::new(Ed25519Verifier), tx), rx)
    }

    fn wrap(msg: Message) -> HareEnvelope {
        HareEnvelope::new(InstanceId::from_layer(LayerId(1)), msg)
    }

    #[test]
    fn test_rejects_foreign_and_unsigned() {
        let (mut r, _rx) = router();
        let s = Ed25519Authenticator::generate();

        let foreign = HareEnvelope::new(
            InstanceId::from_layer(LayerId(2)),
            signed(&s, Round::Status, &[1], 1, vec![1]),
        );
        assert!(!r.handle(foreign));

        let mut forged = signed(&s, Round::Status, &[1], 1, vec![1]);
        forged.values.push(pid(2));
        assert!(!r.handle(wrap(forged)));
        assert_eq!(r.status().status_count(), 0);
    }

    #[test]
    fn test_full_layer_flow() {
        let (mut r, mut rx) = router();
        let a = Ed25519Authenticator::generate();
        let b = Ed25519Authenticator::generate();

        for s in [&a, &b] {
            assert!(r.handle(wrap(signed(s, Round::Status, &[1], 1, vec![1]))));
        }
        r.set_round(Round::Proposal);
        assert!(r.status().is_svp_ready());

        assert!(r.handle(wrap(signed(&a, Round::Proposal, &[1], 1, vec![0x02]))));
        // commit seen before the commit round starts
        assert!(r.handle(wrap(signed(&a, Round::Commit, &[1], 1, vec![1]))));
        assert!(r.commit().is_none());

        r.set_round(Round::Commit);
        assert!(r.handle(wrap(signed(&b, Round::Commit, &[1], 1, vec![1]))));
        let commit = r.commit().expect("commit tracker");
        assert!(commit.has_enough_commits());
        assert_eq!(commit.build_certificate().map(|c| c.commits.len()), Some(2));

        r.set_round(Round::Notify);
        for s in [&a, &b] {
            assert!(r.handle(wrap(signed(s, Round::Notify, &[1], 1, vec![1]))));
        }
        assert_eq!(r.notify().certified_set(), Some(Set::new([pid(1)])));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_late_proposal_routed_after_proposal_round() {
        let (mut r, _rx) = router();
        let leader = Ed25519Authenticator::generate();
        let rival = Ed25519Authenticator::generate();

        r.set_round(Round::Proposal);
        r.handle(wrap(signed(&leader, Round::Proposal, &[1], 1, vec![0x05])));
        r.set_round(Round::Commit);
        r.handle(wrap(signed(&rival, Round::Proposal, &[2], 1, vec![0x01])));

        assert!(r.proposal().is_conflicting());
        assert_eq!(r.proposal().proposal().map(|m| m.smesher_id), Some(leader.public_key()));
    }

    #[test]
    fn test_round_does_not_go_backwards() {
        let (mut r, _rx) = router();
        r.set_round(Round::Commit);
        r.set_round(Round::Status);
        assert_eq!(r.round(), Round::Commit);
    }
}
