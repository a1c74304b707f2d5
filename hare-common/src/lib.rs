//! Shared types for the hare round-message plumbing.
//!
//! Everything that travels between the network ingest path, the broker and
//! the round trackers lives here: wire envelopes, signed messages, value
//! sets, eligibility proofs and the malfeasance records produced when a
//! participant equivocates.

pub mod auth;
pub mod crypto;
pub mod error;
pub mod types;

pub use error::{HareError, Result};
pub use types::{
    eligibility::{Eligibility, EligibilityProof},
    instance::InstanceId,
    layer::{LayerId, Round},
    malfeasance::{
        HareEligibilityGossip, HareMetadata, HareProofMsg, MalfeasanceGossip, MalfeasanceProof,
    },
    message::{HareEnvelope, Message, Signature},
    set::{ProposalId, Set},
    smesher::SmesherId,
};
