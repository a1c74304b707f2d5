use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tracing::{info, warn};

use hare_common::{
    auth::ed25519::{Ed25519Authenticator, Ed25519Verifier},
    crypto::hash,
    Eligibility, EligibilityProof, HareEnvelope, HareError, InstanceId, LayerId, MalfeasanceGossip,
    Message, ProposalId, Round, Set,
};
use hare_consensus::{Broker, Certificate, HareConfig, RoundRouter};
use hare_p2p::{P2pError, P2pPublisher, SimNode, Simulator, HARE_PROTOCOL};

const CLOSE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Hare(#[from] HareError),
    #[error(transparent)]
    P2p(#[from] P2pError),
    #[error("broker did not shut down within {0:?}")]
    CloseTimeout(Duration),
}

#[derive(Debug, Clone)]
pub struct Scenario {
    pub layer: LayerId,
    pub peers: usize,
    pub equivocate: bool,
}

/// What the observing node concluded for one layer.
#[derive(Debug, Serialize)]
pub struct LayerOutcome {
    pub layer: LayerId,
    pub instance: String,
    pub svp_ready: bool,
    pub proposed: Option<Set>,
    pub conflicting: bool,
    pub certificate: Option<Certificate>,
    pub certified: Option<Set>,
    pub malfeasance: Vec<MalfeasanceGossip>,
}

struct Peer {
    auth: Ed25519Authenticator,
    node: SimNode,
    proof: EligibilityProof,
    candidate: ProposalId,
}

impl Peer {
    async fn send(
        &self,
        id: InstanceId,
        layer: LayerId,
        round: Round,
        values: Vec<ProposalId>,
    ) -> Result<(), NodeError> {
        let mut msg = Message::new(layer, round, values, Eligibility::new(1, self.proof.clone()));
        msg.sign(&self.auth)?;
        let bytes = HareEnvelope::new(id, msg).encode()?;
        self.node.publish(HARE_PROTOCOL, bytes).await?;
        Ok(())
    }
}

fn candidate(layer: LayerId, index: usize) -> ProposalId {
    let layer = layer.value().to_be_bytes();
    let index = (index as u64).to_be_bytes();
    let chunks: [&[u8]; 3] = [b"candidate", &layer, &index];
    let digest = hash::sum(&chunks);
    let mut id = [0u8; 20];
    id.copy_from_slice(&digest.as_bytes()[..20]);
    ProposalId(id)
}

fn spawn_peers(sim: &Simulator, scenario: &Scenario) -> Vec<Peer> {
    (0..scenario.peers)
        .map(|i| {
            // the equivocating leader must hold the best rank
            let proof = if scenario.equivocate && i == 0 {
                EligibilityProof(vec![0; 32])
            } else {
                EligibilityProof(rand::random::<[u8; 32]>().to_vec())
            };
            Peer {
                auth: Ed25519Authenticator::generate(),
                node: sim.new_node(),
                proof,
                candidate: candidate(scenario.layer, i),
            }
        })
        .collect()
}

/// Plays one layer between `scenario.peers` simulated members while an
/// observer routes the traffic through its broker and round trackers.
pub async fn run_layer(
    config: &HareConfig,
    scenario: &Scenario,
) -> Result<LayerOutcome, NodeError> {
    config.validate()?;
    let sim = Simulator::new();
    let broker = Broker::new(Arc::new(sim.new_node()), config);
    broker.start()?;

    let layer = scenario.layer;
    let id = InstanceId::from_layer(layer);
    let peers = spawn_peers(&sim, scenario);
    let round_duration = Duration::from_millis(config.round_duration_ms);
    info!(%layer, instance = %id, peers = peers.len(), "starting layer");

    let mut inbox = broker.register(id, config.inbox_capacity)?;
    let (mal_tx, mut mal_rx) = mpsc::channel(config.malfeasance_capacity);
    let mut router = RoundRouter::new(id, config, Arc::new(Ed25519Verifier), mal_tx);

    let all: Vec<ProposalId> = peers.iter().map(|p| p.candidate).collect();
    let leader = peers.iter().min_by(|a, b| a.proof.rank_cmp(&b.proof));

    for round in Round::ALL {
        router.set_round(round);
        match round {
            Round::Status => {
                for peer in &peers {
                    peer.send(id, layer, round, vec![peer.candidate]).await?;
                }
            }
            Round::Proposal => {
                for peer in &peers {
                    peer.send(id, layer, round, all.clone()).await?;
                }
                if let (true, Some(leader)) = (scenario.equivocate, leader) {
                    let twisted = all.iter().skip(1).copied().collect();
                    leader.send(id, layer, round, twisted).await?;
                }
            }
            Round::Commit | Round::Notify if !scenario.equivocate => {
                for peer in &peers {
                    peer.send(id, layer, round, all.clone()).await?;
                }
            }
            Round::Commit | Round::Notify => {}
        }
        sleep(round_duration).await;
        let handled = router.drain_ready(&mut inbox);
        info!(%layer, %round, handled, "round finished");
    }

    let mut malfeasance = Vec::new();
    while let Ok(gossip) = mal_rx.try_recv() {
        match gossip.proof.validate(&Ed25519Verifier) {
            Ok(()) => match serde_json::to_string(&gossip.proof) {
                Ok(json) => {
                    warn!(smesher = %gossip.proof.smesher_id, proof = %json, "malfeasance proof")
                }
                Err(err) => warn!(%err, "failed to render malfeasance proof"),
            },
            Err(err) => warn!(%err, "tracker produced an invalid proof"),
        }
        malfeasance.push(gossip);
    }

    let certified = router.notify().certified_set();
    let outcome = LayerOutcome {
        layer,
        instance: id.to_string(),
        svp_ready: router.status().is_svp_ready(),
        proposed: router.proposal().proposed_set(),
        conflicting: router.proposal().is_conflicting(),
        certificate: router.commit().and_then(|c| c.build_certificate()),
        certified,
        malfeasance,
    };

    broker.unregister(&id);
    broker.close();
    timeout(CLOSE_TIMEOUT, broker.close_channel())
        .await
        .map_err(|_| NodeError::CloseTimeout(CLOSE_TIMEOUT))?;
    info!(%layer, stats = ?broker.stats(), "layer done");
    Ok(outcome)
}
