//! Hare round plumbing: the broker that fans gossip out to per-instance
//! inboxes, the round trackers that turn those messages into protocol
//! facts, and the equivocation reporting that backs them.

pub mod broker;
pub mod config;
pub mod eligibility;
pub mod malfeasance;
pub mod router;
pub mod tracker;

pub use broker::{Broker, BrokerStats, Inbox};
pub use config::HareConfig;
pub use eligibility::{Cred, EligibilityTracker};
pub use malfeasance::report_equivocation;
pub use router::RoundRouter;
pub use tracker::{
    commit::{Certificate, CommitTracker},
    notify::NotifyTracker,
    proposal::ProposalTracker,
    status::StatusTracker,
};
