use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::crypto::{hash, Hash32};

/// Identifier of a candidate block proposal.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProposalId(pub [u8; 20]);

impl ProposalId {
    pub fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..5]))
    }
}

impl fmt::Debug for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProposalId({})", self)
    }
}

/// A set of candidate proposals.
///
/// Equality ignores the order values were supplied in, and rendering is
/// always sorted, so two participants that hold the same values print the
/// same string and derive the same [`Set::id`].
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Set {
    values: BTreeSet<ProposalId>,
}

impl Set {
    pub fn new<I: IntoIterator<Item = ProposalId>>(values: I) -> Self {
        Self { values: values.into_iter().collect() }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &ProposalId) -> bool {
        self.values.contains(id)
    }

    pub fn add(&mut self, id: ProposalId) {
        self.values.insert(id);
    }

    pub fn remove(&mut self, id: &ProposalId) {
        self.values.remove(id);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn union(&self, other: &Set) -> Set {
        Set { values: self.values.union(&other.values).copied().collect() }
    }

    pub fn intersection(&self, other: &Set) -> Set {
        Set { values: self.values.intersection(&other.values).copied().collect() }
    }

    /// Values of `self` that are not in `other`.
    pub fn complement(&self, other: &Set) -> Set {
        Set { values: self.values.difference(&other.values).copied().collect() }
    }

    pub fn is_subset_of(&self, other: &Set) -> bool {
        self.values.is_subset(&other.values)
    }

    /// Digest over the sorted members.
    pub fn id(&self) -> Hash32 {
        let chunks: Vec<&[u8]> = self.values.iter().map(|v| v.0.as_slice()).collect();
        hash::sum(&chunks)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProposalId> {
        self.values.iter()
    }

    pub fn to_vec(&self) -> Vec<ProposalId> {
        self.values.iter().copied().collect()
    }
}

impl FromIterator<ProposalId> for Set {
    fn from_iter<I: IntoIterator<Item = ProposalId>>(iter: I) -> Self {
        Set::new(iter)
    }
}

impl From<&[ProposalId]> for Set {
    fn from(values: &[ProposalId]) -> Self {
        Set::new(values.iter().copied())
    }
}

impl fmt::Display for Set {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", v)?;
        }
        write!(f, "}}")
    }
}

impl fmt::Debug for Set {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Set{}", self)
    }
}
