use ed25519_dalek::{Signature as DalekSignature, Signer, SigningKey, Verifier as _, VerifyingKey};
use rand::rngs::OsRng;

use super::{Authenticator, Verifier};
use crate::{
    error::{HareError, Result},
    types::{message::Signature, smesher::SmesherId},
};

/// Stateless ed25519 verification against the signer's identity key.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Verifier;

impl Verifier for Ed25519Verifier {
    fn verify(&self, signer: &SmesherId, message: &[u8], signature: &Signature) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(signer.as_bytes()) else {
            return false;
        };
        let signature = DalekSignature::from_bytes(signature.as_bytes());
        key.verify(message, &signature).is_ok()
    }
}

pub struct Ed25519Authenticator {
    keypair: SigningKey,
}

impl Ed25519Authenticator {
    pub fn new(keypair: SigningKey) -> Self {
        Self { keypair }
    }

    pub fn generate() -> Self {
        let mut csprng = OsRng;
        Self::new(SigningKey::generate(&mut csprng))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let secret: &[u8; 32] = bytes
            .try_into()
            .map_err(|_| HareError::Auth("invalid key length".into()))?;
        Ok(Self { keypair: SigningKey::from_bytes(secret) })
    }
}

impl Verifier for Ed25519Authenticator {
    fn verify(&self, signer: &SmesherId, message: &[u8], signature: &Signature) -> bool {
        Ed25519Verifier.verify(signer, message, signature)
    }
}

impl Authenticator for Ed25519Authenticator {
    fn sign(&self, message: &[u8]) -> Result<Signature> {
        Ok(Signature(self.keypair.sign(message).to_bytes()))
    }

    fn public_key(&self) -> SmesherId {
        SmesherId(self.keypair.verifying_key().to_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ed25519_signing_and_verification() {
        let auth = Ed25519Authenticator::generate();

        let message = b"hello world";
        let signature = auth.sign(message).expect("Signing failed");

        assert!(auth.verify(&auth.public_key(), message, &signature), "Signature should be valid");
        assert!(
            !auth.verify(&auth.public_key(), b"wrong message", &signature),
            "Signature should be invalid for wrong message"
        );
    }

    #[test]
    fn test_from_bytes_is_deterministic() {
        let a = Ed25519Authenticator::from_bytes(&[7u8; 32]).unwrap();
        let b = Ed25519Authenticator::from_bytes(&[7u8; 32]).unwrap();
        assert_eq!(a.public_key(), b.public_key());
        assert!(Ed25519Authenticator::from_bytes(&[1u8; 31]).is_err());
    }

    #[test]
    fn test_garbage_key_does_not_verify() {
        let auth = Ed25519Authenticator::generate();
        let signature = auth.sign(b"msg").unwrap();
        assert!(!Ed25519Verifier.verify(&SmesherId([0xff; 32]), b"msg", &signature));
    }
}
