//! Simulation and rule search for a hidden-role imposter board game.
//!
//! This crate holds everything needed to play the game headlessly and to
//! tune its rules: a seeded turn engine, a 43-bit genome that encodes a rule
//! set, a fitness oracle that plays many games per genome, and a genetic
//! search over genomes. Functions take plain data and return results; I/O is
//! limited to the [`store`] module.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Rule configuration for a single game, with defaults |
//! | [`constants`] | Default deck, roster, planner weights, baseline genome |
//! | [`deck`] | Room card deck with draw/reshuffle semantics |
//! | [`evolution`] | Parent selection, crossover, mutation, generation loop |
//! | [`fitness`] | Phenotype scenarios, win tally, fitness transform |
//! | [`genome`] | Genome codec, field table, rule validation |
//! | [`planner`] | Risk/reward choice among room variants |
//! | [`rng`] | Seeded Mersenne Twister stream for one game |
//! | [`roster`] | Player tokens, bodies, positions, ghosts |
//! | [`simulation`] | Turn engine and winner calculation |
//! | [`store`] | Poor-variant store and run history |

pub mod config;
pub mod constants;
pub mod deck;
pub mod evolution;
pub mod fitness;
pub mod genome;
pub mod planner;
pub mod rng;
pub mod roster;
pub mod simulation;
pub mod store;

pub mod prelude {
    pub use crate::config::RuleConfiguration;
    pub use crate::evolution::{EvolutionConfig, EvolutionController, EvolutionError, ScoredGenome};
    pub use crate::fitness::{calc_fitness, fitness_transform, FitnessError, Phenotype, WinTally};
    pub use crate::genome::{decode, encode, validate, Genome, GenomeTraits, ValidationError};
    pub use crate::roster::{Position, Role};
    pub use crate::simulation::{RunResult, SetupError, Simulation, Winner};
    pub use crate::store::{
        FilePoorVariantStore, JsonlRunHistory, MemoryPoorVariantStore, MemoryRunHistory,
        PoorVariantStore, RunHistory, StoreError, TopVariantRecord,
    };
}
