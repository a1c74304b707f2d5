pub mod eligibility;
pub mod instance;
pub mod layer;
pub mod malfeasance;
pub mod message;
pub mod set;
pub mod smesher;
