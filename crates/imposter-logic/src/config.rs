//! Rule configuration: everything one simulated game needs.
//!
//! Every field is optional on the wire. Missing values fall back to the
//! physical board game's defaults from [`constants`](crate::constants), so an
//! empty JSON object is a valid configuration:
//!
//! ```
//! use imposter_logic::config::RuleConfiguration;
//!
//! let config: RuleConfiguration = serde_json::from_str(r#"{"seed": 1}"#).unwrap();
//! assert_eq!(config.seed, Some(1));
//! assert_eq!(config.imposter_chances, 20);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::{DEFAULT_IMPOSTER_CHANCES, DEFAULT_POTENTIAL_ROOMS};
use crate::planner::PlannerWeights;
use crate::roster::Role;

/// Input of a single [`Simulation`](crate::simulation::Simulation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfiguration {
    /// Run seed. `None` draws one from the OS.
    pub seed: Option<u64>,
    /// Role per player, in turn order. `None` shuffles the default 3 crew + 1 imposter.
    pub assignments: Option<Vec<Role>>,
    /// Room of each body. `None` places one body in a random default room.
    pub body_locations: Option<Vec<String>>,
    /// Exact card order. `None` shuffles the default 48-card deck.
    pub deck: Option<Vec<String>>,
    /// Room label → number of interchangeable sub-rooms.
    pub potential_rooms: BTreeMap<String, u8>,
    /// Turns after the first kill before the imposter is revealed.
    pub imposter_chances: u32,
    #[serde(flatten)]
    pub weights: PlannerWeights,
}

impl Default for RuleConfiguration {
    fn default() -> Self {
        Self {
            seed: None,
            assignments: None,
            body_locations: None,
            deck: None,
            potential_rooms: default_potential_rooms(),
            imposter_chances: DEFAULT_IMPOSTER_CHANCES,
            weights: PlannerWeights::default(),
        }
    }
}

impl RuleConfiguration {
    /// Default configuration with a fixed seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Default::default()
        }
    }

    /// Number of sub-rooms for a room label (1 for ordinary rooms).
    pub fn variant_count(&self, room: &str) -> u8 {
        self.potential_rooms.get(room).copied().unwrap_or(1)
    }
}

pub fn default_potential_rooms() -> BTreeMap<String, u8> {
    DEFAULT_POTENTIAL_ROOMS
        .iter()
        .map(|(room, count)| (room.to_string(), *count))
        .collect()
}
