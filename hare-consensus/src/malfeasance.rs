use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::info;

use hare_common::{
    Eligibility, HareEligibilityGossip, HareError, HareProofMsg, MalfeasanceGossip,
    MalfeasanceProof, Result, SmesherId,
};

/// Builds a malfeasance proof from two conflicting messages and hands it to
/// `sink` without waiting.
///
/// A saturated or closed sink is returned as an error for the caller to log;
/// it never blocks round processing.
pub fn report_equivocation(
    smesher_id: SmesherId,
    prev: HareProofMsg,
    this: HareProofMsg,
    eligibility: &Eligibility,
    sink: &mpsc::Sender<MalfeasanceGossip>,
) -> Result<()> {
    let layer = this.inner_msg.layer;
    let round = this.inner_msg.round;
    let gossip = MalfeasanceGossip {
        proof: MalfeasanceProof {
            smesher_id,
            messages: [prev, this],
            eligibility: eligibility.clone(),
        },
        eligibility: HareEligibilityGossip {
            layer,
            round,
            smesher_id,
            eligibility: eligibility.clone(),
        },
    };

    sink.try_send(gossip).map_err(|e| match e {
        TrySendError::Full(_) => HareError::MalfeasanceSinkFull,
        TrySendError::Closed(_) => HareError::MalfeasanceSinkClosed,
    })?;

    info!(smesher = %smesher_id, %layer, %round, "malfeasance proof emitted");
    Ok(())
}
