//! Risk/reward room choice for rooms split into several sub-rooms.
//!
//! When a player draws a room type with K interchangeable variants, each
//! variant is scored `reward − 2 × risk` from the mover's point of view and the
//! best one is entered. Imposters chase other players; crew chase bodies and
//! avoid company (before the first kill) or imposters (after it). A variant
//! has to score above -1 to be entered at all; when none does, the token is
//! left unplaced.

use serde::{Deserialize, Serialize};

use crate::constants::weights;
use crate::roster::{Position, Role, Roster};

/// Tunable planner weights. All four are genome-controlled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerWeights {
    /// Added once per other player in the variant, for imposters.
    pub reward_imposter_to_crew: i32,
    /// Added once per body in the variant, for crew.
    pub reward_crew_to_body: i32,
    /// Crew entering an imposter's variant after a kill.
    pub risk_crew_to_imposter: i32,
    /// Crew entering an occupied variant before any kill.
    pub risk_crew_to_rival: i32,
}

impl Default for PlannerWeights {
    fn default() -> Self {
        Self {
            reward_imposter_to_crew: weights::REWARD_IMPOSTER_TO_CREW,
            reward_crew_to_body: weights::REWARD_CREW_TO_BODY,
            risk_crew_to_imposter: weights::RISK_CREW_TO_IMPOSTER,
            risk_crew_to_rival: weights::RISK_CREW_TO_RIVAL,
        }
    }
}

/// The token looking for a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mover {
    Player(usize),
    /// Bodies are placed through the same path at setup.
    Body,
}

/// Floor a variant's score has to beat to be chosen.
const UNPLACED_SCORE: i32 = -1;

/// Scores room variants against the current board.
pub struct RiskRewardPlanner<'a> {
    weights: &'a PlannerWeights,
    roster: &'a Roster,
}

impl<'a> RiskRewardPlanner<'a> {
    pub fn new(weights: &'a PlannerWeights, roster: &'a Roster) -> Self {
        Self { weights, roster }
    }

    fn role_of(&self, mover: Mover) -> Role {
        match mover {
            Mover::Player(index) => self.roster.player(index).role,
            Mover::Body => Role::Body,
        }
    }

    /// Players standing in `variant`, the mover included when it is already there.
    fn occupants<'r>(&'r self, variant: &'r Position) -> impl Iterator<Item = Role> + 'r {
        self.roster
            .players()
            .iter()
            .filter(move |p| p.position == *variant)
            .map(|p| p.role)
    }

    pub fn risk(&self, mover: Mover, variant: &Position) -> i32 {
        if self.role_of(mover) == Role::Imposter {
            return 0;
        }

        let mut risk = 0;
        let killed = self.roster.has_kills();
        if killed && self.occupants(variant).any(|r| r == Role::Imposter) {
            risk += self.weights.risk_crew_to_imposter;
        } else if !killed && self.occupants(variant).next().is_some() {
            risk += self.weights.risk_crew_to_rival;
        }
        risk
    }

    pub fn reward(&self, mover: Mover, variant: &Position) -> i32 {
        match self.role_of(mover) {
            Role::Imposter => {
                let others = self
                    .roster
                    .players()
                    .iter()
                    .enumerate()
                    .filter(|(i, p)| mover != Mover::Player(*i) && p.position == *variant)
                    .count() as i32;
                others * self.weights.reward_imposter_to_crew
            }
            Role::Crew => {
                let bodies = self
                    .roster
                    .bodies()
                    .iter()
                    .filter(|b| b.position == *variant)
                    .count() as i32;
                bodies * self.weights.reward_crew_to_body
            }
            Role::Body => 0,
        }
    }

    pub fn score(&self, mover: Mover, variant: &Position) -> i32 {
        self.reward(mover, variant) - 2 * self.risk(mover, variant)
    }

    /// Highest-scoring variant; the first one wins ties. `None` when no
    /// variant scores above -1.
    pub fn choose<'v>(&self, mover: Mover, variants: &'v [Position]) -> Option<&'v Position> {
        let mut best_score = UNPLACED_SCORE;
        let mut best = None;
        for variant in variants {
            let score = self.score(mover, variant);
            if score > best_score {
                best_score = score;
                best = Some(variant);
            }
        }
        best
    }
}
