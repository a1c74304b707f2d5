use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    auth::{Authenticator, Verifier},
    crypto::{hash, Hash32},
    error::{HareError, Result},
};
use super::{
    eligibility::Eligibility,
    instance::InstanceId,
    layer::{LayerId, Round},
    malfeasance::HareMetadata,
    set::{ProposalId, Set},
    smesher::SmesherId,
};

/// Upper bound on an encoded envelope; anything larger is rejected before decoding.
pub const MAX_ENVELOPE_SIZE: usize = 64 * 1024;

/// Detached ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature(#[serde(with = "hex::serde")] pub [u8; 64]);

impl Signature {
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

impl Default for Signature {
    fn default() -> Self {
        Self([0u8; 64])
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", hex::encode(&self.0[..5]))
    }
}

/// A signed hare protocol message for one round of one layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub layer: LayerId,
    pub round: Round,
    pub smesher_id: SmesherId,
    pub values: Vec<ProposalId>,
    pub eligibility: Eligibility,
    pub signature: Signature,
}

impl Message {
    /// Unsigned message; call [`Message::sign`] before sending it.
    pub fn new(
        layer: LayerId,
        round: Round,
        values: Vec<ProposalId>,
        eligibility: Eligibility,
    ) -> Self {
        Self {
            layer,
            round,
            smesher_id: SmesherId::default(),
            values,
            eligibility,
            signature: Signature::default(),
        }
    }

    /// Digest over layer, round and values.
    ///
    /// Sender, eligibility and signature are not covered, so two messages
    /// with the same content hash equally no matter who signed them.
    pub fn hash(&self) -> Hash32 {
        let layer = self.layer.value().to_be_bytes();
        let round = [self.round.ordinal()];
        let mut chunks: Vec<&[u8]> = Vec::with_capacity(self.values.len() + 2);
        chunks.push(&layer);
        chunks.push(&round);
        for value in &self.values {
            chunks.push(value.as_bytes());
        }
        hash::sum(&chunks)
    }

    pub fn metadata(&self) -> HareMetadata {
        HareMetadata {
            layer: self.layer,
            round: self.round,
            msg_hash: self.hash(),
        }
    }

    /// Bytes covered by the sender's signature.
    pub fn signed_bytes(&self) -> Vec<u8> {
        self.metadata().signed_bytes()
    }

    pub fn value_set(&self) -> Set {
        Set::from(self.values.as_slice())
    }

    pub fn sign(&mut self, auth: &dyn Authenticator) -> Result<()> {
        self.smesher_id = auth.public_key();
        self.signature = auth.sign(&self.signed_bytes())?;
        Ok(())
    }

    pub fn verify(&self, verifier: &dyn Verifier) -> bool {
        verifier.verify(&self.smesher_id, &self.signed_bytes(), &self.signature)
    }
}

/// What travels on the hare gossip topic: a message tagged with its instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HareEnvelope {
    pub instance_id: InstanceId,
    pub message: Message,
}

impl HareEnvelope {
    pub fn new(instance_id: InstanceId, message: Message) -> Self {
        Self { instance_id, message }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > MAX_ENVELOPE_SIZE {
            return Err(HareError::Codec(format!(
                "envelope of {} bytes exceeds limit",
                bytes.len()
            )));
        }
        Ok(bincode::deserialize(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ed25519::{Ed25519Authenticator, Ed25519Verifier};
    use crate::types::eligibility::EligibilityProof;

    fn message(values: Vec<ProposalId>) -> Message {
        Message::new(
            LayerId(10),
            Round::Proposal,
            values,
            Eligibility::new(1, EligibilityProof(vec![1, 2, 3])),
        )
    }

    #[test]
    fn test_hash_ignores_signer() {
        let a = Ed25519Authenticator::generate();
        let b = Ed25519Authenticator::generate();
        let mut m1 = message(vec![ProposalId([1; 20])]);
        let mut m2 = m1.clone();
        m1.sign(&a).unwrap();
        m2.sign(&b).unwrap();
        assert_eq!(m1.hash(), m2.hash());
        assert_ne!(m1.smesher_id, m2.smesher_id);
    }

    #[test]
    fn test_hash_covers_values() {
        let m1 = message(vec![ProposalId([1; 20])]);
        let m2 = message(vec![ProposalId([2; 20])]);
        assert_ne!(m1.hash(), m2.hash());
    }

    #[test]
    fn test_sign_and_verify() {
        let auth = Ed25519Authenticator::generate();
        let mut msg = message(vec![ProposalId([7; 20])]);
        msg.sign(&auth).unwrap();
        assert!(msg.verify(&Ed25519Verifier));

        msg.values.push(ProposalId([8; 20]));
        assert!(!msg.verify(&Ed25519Verifier), "tampered values must not verify");
    }

    #[test]
    fn test_envelope_decode_rejects_garbage() {
        assert!(HareEnvelope::decode(&[0xde, 0xad]).is_err());
        assert!(HareEnvelope::decode(&vec![0u8; MAX_ENVELOPE_SIZE + 1]).is_err());
    }

    #[test]
    fn test_envelope_keeps_instance_tag() {
        let env = HareEnvelope::new(InstanceId([3; 32]), message(vec![ProposalId([1; 20])]));
        let decoded = HareEnvelope::decode(&env.encode().unwrap()).unwrap();
        assert_eq!(decoded.instance_id, InstanceId([3; 32]));
        assert_eq!(decoded, env);
    }
}
