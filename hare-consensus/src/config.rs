use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use hare_common::{HareError, Result};

/// Tunables for the broker and the round trackers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HareConfig {
    /// Bound of each registered instance's inbox.
    pub inbox_capacity: usize,
    /// Total messages held for instances that are not registered yet.
    pub early_buffer_capacity: usize,
    /// Messages held per unregistered instance.
    pub early_buffer_per_instance: usize,
    /// How many unregistered instances are remembered as concluded.
    pub concluded_memory: usize,
    /// Bound of the outgoing malfeasance channel.
    pub malfeasance_capacity: usize,
    /// Eligibility weight the status, commit and notify rounds must reach.
    pub committee_threshold: u32,
    pub round_duration_ms: u64,
}

impl Default for HareConfig {
    fn default() -> Self {
        Self {
            inbox_capacity: 1024,
            early_buffer_capacity: 4096,
            early_buffer_per_instance: 512,
            concluded_memory: 64,
            malfeasance_capacity: 256,
            committee_threshold: 2,
            round_duration_ms: 200,
        }
    }
}

impl HareConfig {
    pub fn validate(&self) -> Result<()> {
        let capacities = [
            ("inbox_capacity", self.inbox_capacity),
            ("early_buffer_capacity", self.early_buffer_capacity),
            ("early_buffer_per_instance", self.early_buffer_per_instance),
            ("malfeasance_capacity", self.malfeasance_capacity),
        ];
        for (name, value) in capacities {
            if value == 0 {
                return Err(HareError::Config(format!("{name} must be greater than zero")));
            }
        }
        if self.early_buffer_per_instance > self.early_buffer_capacity {
            return Err(HareError::Config(
                "early_buffer_per_instance cannot exceed early_buffer_capacity".into(),
            ));
        }
        Ok(())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| HareError::Config(e.to_string()))?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        let parsed: HareConfig = serde_json::from_str(&data)
            .map_err(|e| HareError::Config(e.to_string()))?;
        parsed.validate()?;
        Ok(parsed)
    }
}
