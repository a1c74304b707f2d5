use std::fmt;

use serde::{Deserialize, Serialize};

/// Block-layer number a hare instance agrees on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerId(pub u32);

impl LayerId {
    pub fn new(layer: u32) -> Self {
        Self(layer)
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for LayerId {
    fn from(layer: u32) -> Self {
        Self(layer)
    }
}

/// Phases of one hare iteration, in protocol order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Round {
    Status = 0,
    Proposal = 1,
    Commit = 2,
    Notify = 3,
}

impl Round {
    pub const ALL: [Round; 4] = [Round::Status, Round::Proposal, Round::Commit, Round::Notify];

    /// The round after this one, `None` after Notify.
    pub fn next(self) -> Option<Round> {
        match self {
            Round::Status => Some(Round::Proposal),
            Round::Proposal => Some(Round::Commit),
            Round::Commit => Some(Round::Notify),
            Round::Notify => None,
        }
    }

    pub fn ordinal(self) -> u8 {
        self as u8
    }
}

impl Default for Round {
    fn default() -> Self {
        Self::Status
    }
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Round::Status => "status",
            Round::Proposal => "proposal",
            Round::Commit => "commit",
            Round::Notify => "notify",
        };
        write!(f, "{}", s)
    }
}

impl TryFrom<u8> for Round {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Round::Status),
            1 => Ok(Round::Proposal),
            2 => Ok(Round::Commit),
            3 => Ok(Round::Notify),
            _ => Err(()),
        }
    }
}
