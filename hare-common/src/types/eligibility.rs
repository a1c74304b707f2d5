use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// VRF output proving a participant's right to take part in a round.
///
/// Proofs are totally ordered by their raw bytes. A lexicographically
/// smaller proof ranks higher and wins leader ties.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EligibilityProof(#[serde(with = "hex::serde")] pub Vec<u8>);

impl EligibilityProof {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// True if `self` strictly outranks `other`.
    pub fn outranks(&self, other: &EligibilityProof) -> bool {
        self.rank_cmp(other) == Ordering::Less
    }

    /// Raw byte comparison; `Less` means `self` ranks higher.
    pub fn rank_cmp(&self, other: &EligibilityProof) -> Ordering {
        self.0.as_slice().cmp(other.0.as_slice())
    }
}

impl fmt::Display for EligibilityProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let end = self.0.len().min(5);
        write!(f, "{}", hex::encode(&self.0[..end]))
    }
}

impl fmt::Debug for EligibilityProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EligibilityProof({})", self)
    }
}

/// Claimed voting weight together with the proof that backs it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eligibility {
    pub count: u16,
    pub proof: EligibilityProof,
}

impl Eligibility {
    pub fn new(count: u16, proof: EligibilityProof) -> Self {
        Self { count, proof }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smaller_bytes_outrank() {
        let high = EligibilityProof(vec![0x00, 0xff]);
        let low = EligibilityProof(vec![0x01, 0x00]);
        assert!(high.outranks(&low));
        assert!(!low.outranks(&high));
        assert!(!high.outranks(&high.clone()));
    }

    #[test]
    fn test_prefix_outranks_longer() {
        let short = EligibilityProof(vec![0x01]);
        let long = EligibilityProof(vec![0x01, 0x00]);
        assert!(short.outranks(&long));
    }
}
