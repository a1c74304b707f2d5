//! Signing capability consumed by the hare core.
//!
//! The core only needs to verify signatures; signing is used by whoever
//! produces messages (tests and the demo node).

pub mod ed25519;

use crate::{
    error::Result,
    types::{message::Signature, smesher::SmesherId},
};

pub trait Verifier: Send + Sync {
    fn verify(&self, signer: &SmesherId, message: &[u8], signature: &Signature) -> bool;
}

pub trait Authenticator: Verifier {
    fn sign(&self, message: &[u8]) -> Result<Signature>;
    fn public_key(&self) -> SmesherId;
}
