//! Network ports the hare core consumes.
//!
//! The production gossip transport lives elsewhere; this crate only defines
//! the publish/subscribe surface and an in-memory simulator that satisfies
//! it for tests and local runs.

pub mod error;
pub mod in_memory;
pub mod ports;

pub use error::P2pError;
pub use in_memory::{SimNode, Simulator};
pub use ports::{P2pPublisher, P2pSubscriber};

/// Gossip topic carrying hare envelopes.
pub const HARE_PROTOCOL: &str = "hare/1.0";
