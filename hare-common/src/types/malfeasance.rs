use serde::{Deserialize, Serialize};

use crate::{
    auth::Verifier,
    crypto::Hash32,
    error::{HareError, Result},
};
use super::{
    eligibility::Eligibility,
    layer::{LayerId, Round},
    message::Signature,
    smesher::SmesherId,
};

/// The part of a hare message a signature commits to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HareMetadata {
    pub layer: LayerId,
    pub round: Round,
    pub msg_hash: Hash32,
}

impl HareMetadata {
    pub fn signed_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + 1 + 32);
        out.extend_from_slice(&self.layer.value().to_be_bytes());
        out.push(self.round.ordinal());
        out.extend_from_slice(self.msg_hash.as_bytes());
        out
    }
}

/// One half of an equivocation proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HareProofMsg {
    pub inner_msg: HareMetadata,
    pub signature: Signature,
}

/// Two conflicting signed messages from the same participant in the same round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MalfeasanceProof {
    pub smesher_id: SmesherId,
    pub messages: [HareProofMsg; 2],
    pub eligibility: Eligibility,
}

impl MalfeasanceProof {
    pub fn layer(&self) -> LayerId {
        self.messages[0].inner_msg.layer
    }

    pub fn round(&self) -> Round {
        self.messages[0].inner_msg.round
    }

    /// Checks that the two messages really conflict and were both signed by
    /// `smesher_id`.
    pub fn validate(&self, verifier: &dyn Verifier) -> Result<()> {
        let [first, second] = &self.messages;
        if first.inner_msg.layer != second.inner_msg.layer {
            return Err(HareError::InvalidProof("messages are for different layers".into()));
        }
        if first.inner_msg.round != second.inner_msg.round {
            return Err(HareError::InvalidProof("messages are for different rounds".into()));
        }
        if first.inner_msg.msg_hash == second.inner_msg.msg_hash {
            return Err(HareError::InvalidProof("messages are identical".into()));
        }
        for msg in &self.messages {
            if !verifier.verify(&self.smesher_id, &msg.inner_msg.signed_bytes(), &msg.signature) {
                return Err(HareError::InvalidProof(format!(
                    "signature for {} does not match {}",
                    msg.inner_msg.msg_hash.short(),
                    self.smesher_id
                )));
            }
        }
        Ok(())
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }
}

/// Eligibility of the offender in the round it equivocated in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HareEligibilityGossip {
    pub layer: LayerId,
    pub round: Round,
    pub smesher_id: SmesherId,
    pub eligibility: Eligibility,
}

/// Record handed to the gossip/persistence side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MalfeasanceGossip {
    pub proof: MalfeasanceProof,
    pub eligibility: HareEligibilityGossip,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ed25519::{Ed25519Authenticator, Ed25519Verifier};
    use crate::types::{
        eligibility::EligibilityProof,
        message::Message,
        set::ProposalId,
    };

    fn signed(auth: &Ed25519Authenticator, round: Round, value: u8) -> Message {
        let mut msg = Message::new(
            LayerId(3),
            round,
            vec![ProposalId([value; 20])],
            Eligibility::new(2, EligibilityProof(vec![9])),
        );
        msg.sign(auth).unwrap();
        msg
    }

    fn proof_of(a: &Message, b: &Message) -> MalfeasanceProof {
        MalfeasanceProof {
            smesher_id: a.smesher_id,
            messages: [
                HareProofMsg { inner_msg: a.metadata(), signature: a.signature },
                HareProofMsg { inner_msg: b.metadata(), signature: b.signature },
            ],
            eligibility: b.eligibility.clone(),
        }
    }

    #[test]
    fn test_valid_proof() {
        let auth = Ed25519Authenticator::generate();
        let a = signed(&auth, Round::Proposal, 1);
        let b = signed(&auth, Round::Proposal, 2);
        assert!(proof_of(&a, &b).validate(&Ed25519Verifier).is_ok());
    }

    #[test]
    fn test_identical_messages_rejected() {
        let auth = Ed25519Authenticator::generate();
        let a = signed(&auth, Round::Proposal, 1);
        assert!(proof_of(&a, &a).validate(&Ed25519Verifier).is_err());
    }

    #[test]
    fn test_different_rounds_rejected() {
        let auth = Ed25519Authenticator::generate();
        let a = signed(&auth, Round::Proposal, 1);
        let b = signed(&auth, Round::Commit, 2);
        assert!(proof_of(&a, &b).validate(&Ed25519Verifier).is_err());
    }

    #[test]
    fn test_foreign_signature_rejected() {
        let auth = Ed25519Authenticator::generate();
        let other = Ed25519Authenticator::generate();
        let a = signed(&auth, Round::Proposal, 1);
        let b = signed(&other, Round::Proposal, 2);
        let err = proof_of(&a, &b).validate(&Ed25519Verifier).unwrap_err();
        assert!(matches!(err, HareError::InvalidProof(_)));
    }
}
