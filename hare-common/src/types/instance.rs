use std::fmt;

use serde::{Deserialize, Serialize};

use crate::crypto::hash;
use super::layer::LayerId;

const INSTANCE_DOMAIN: &[u8] = b"hare/instance/v1";

/// Identifies one hare run. Derived from the layer it agrees on, but treated
/// as opaque by the broker.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(pub [u8; 32]);

impl InstanceId {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_layer(layer: LayerId) -> Self {
        let digest = hash::sum(&[INSTANCE_DOMAIN, &layer.value().to_be_bytes()]);
        Self(digest.0)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..5]))
    }
}

impl fmt::Debug for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InstanceId({})", self)
    }
}
