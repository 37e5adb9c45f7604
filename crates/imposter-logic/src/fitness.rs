//! Fitness evaluation: turn a genome into a balance score.
//!
//! A [`Phenotype`] is a validated genome plus a seed. Scoring plays
//! `iterations` freshly generated games and compares crew wins against
//! imposter wins; [`fitness_transform`] then maps that ratio onto `(0, 1]`,
//! peaking when both sides win equally often.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::config::RuleConfiguration;
use crate::constants::{CREW_WIN_EPSILON, IMPOSTER_WIN_EPSILON, MAX_SIMULATION_SEED};
use crate::genome::{self, DuplicateRoomStrategy, Genome, GenomeTraits, ValidationError};
use crate::roster::Role;
use crate::simulation::{SetupError, Simulation, Winner};

/// Winner counts over a batch of games.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinTally {
    pub crew: u32,
    pub crew_by_timeout: u32,
    pub imposter: u32,
    pub no_winner: u32,
}

impl WinTally {
    pub fn record(&mut self, winner: Winner) {
        match winner {
            Winner::Crew => self.crew += 1,
            Winner::CrewByTimeout => self.crew_by_timeout += 1,
            Winner::Imposter => self.imposter += 1,
            Winner::NoWinner => self.no_winner += 1,
        }
    }

    pub fn crew_wins(&self) -> u32 {
        self.crew + self.crew_by_timeout
    }

    pub fn total(&self) -> u32 {
        self.crew + self.crew_by_timeout + self.imposter + self.no_winner
    }

    /// Crew-to-imposter win ratio. Never zero, never infinite.
    pub fn score(&self) -> f64 {
        let imposter_wins = if self.imposter == 0 {
            IMPOSTER_WIN_EPSILON
        } else {
            self.imposter as f64
        };
        (self.crew_wins() as f64 + CREW_WIN_EPSILON) / imposter_wins
    }
}

/// Why a genome could not be scored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FitnessError {
    Validation(ValidationError),
    Setup(SetupError),
}

impl fmt::Display for FitnessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitnessError::Validation(e) => write!(f, "{e}"),
            FitnessError::Setup(e) => write!(f, "Scenario setup failed: {e}"),
        }
    }
}

impl std::error::Error for FitnessError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FitnessError::Validation(e) => Some(e),
            FitnessError::Setup(e) => Some(e),
        }
    }
}

impl From<ValidationError> for FitnessError {
    fn from(e: ValidationError) -> Self {
        FitnessError::Validation(e)
    }
}

impl From<SetupError> for FitnessError {
    fn from(e: SetupError) -> Self {
        FitnessError::Setup(e)
    }
}

/// A valid genome ready to be played.
#[derive(Debug, Clone)]
pub struct Phenotype {
    genome: Genome,
    traits: GenomeTraits,
    seed: u64,
    iterations: usize,
}

impl Phenotype {
    /// Fails if the genome decodes to an unplayable game.
    pub fn new(genome: Genome, seed: u64, iterations: usize) -> Result<Self, ValidationError> {
        let traits = genome::validate(&genome)?;
        Ok(Self {
            genome,
            traits,
            seed,
            iterations,
        })
    }

    pub fn genome(&self) -> &Genome {
        &self.genome
    }

    pub fn traits(&self) -> &GenomeTraits {
        &self.traits
    }

    /// One seed per game, drawn in order so results don't depend on thread scheduling.
    fn iteration_seeds(&self) -> Vec<u64> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        (0..self.iterations).map(|_| rng.gen()).collect()
    }

    /// Play one freshly generated game.
    fn play(&self, iteration_seed: u64) -> Result<Winner, SetupError> {
        let mut rng = ChaCha8Rng::seed_from_u64(iteration_seed);
        let config = scenario(&self.traits, &mut rng);
        let mut sim = Simulation::new(config)?;
        Ok(sim.run().winner)
    }

    /// Winner counts over every iteration.
    pub fn tally(&self) -> Result<WinTally, SetupError> {
        let winners = self
            .iteration_seeds()
            .par_iter()
            .map(|seed| self.play(*seed))
            .collect::<Result<Vec<Winner>, SetupError>>()?;

        let mut tally = WinTally::default();
        for winner in winners {
            tally.record(winner);
        }
        Ok(tally)
    }

    pub fn score(&self) -> Result<f64, SetupError> {
        Ok(self.tally()?.score())
    }
}

/// Build one game from decoded traits: shuffled roles, shuffled
/// `Room0..RoomN` deck, distinct body rooms, and duplicated rooms.
pub fn scenario(traits: &GenomeTraits, rng: &mut impl Rng) -> RuleConfiguration {
    let mut assignments = vec![Role::Imposter; traits.imposter_count as usize];
    assignments.extend(std::iter::repeat(Role::Crew).take(traits.crew_count() as usize));
    assignments.shuffle(rng);

    let labels: Vec<String> = (0..traits.room_type_count)
        .map(|i| format!("Room{i}"))
        .collect();

    let mut deck: Vec<String> = labels
        .iter()
        .flat_map(|label| std::iter::repeat(label.clone()).take(traits.cards_per_room_type as usize))
        .collect();
    deck.shuffle(rng);

    let body_locations: Vec<String> = labels
        .choose_multiple(rng, traits.body_count as usize)
        .cloned()
        .collect();

    let duplicated: Vec<&String> = labels
        .choose_multiple(rng, traits.duplicate_room_count as usize)
        .collect();
    let mut potential_rooms = BTreeMap::new();
    for (rank, room) in duplicated.into_iter().enumerate() {
        let variants = match traits.duplicate_room_strategy {
            DuplicateRoomStrategy::Equal => traits.duplicate_room_intensity,
            DuplicateRoomStrategy::Ladder => traits.duplicate_room_intensity + rank as u32,
        };
        potential_rooms.insert(room.clone(), variants as u8);
    }

    RuleConfiguration {
        seed: Some(rng.gen_range(1..=MAX_SIMULATION_SEED)),
        assignments: Some(assignments),
        body_locations: Some(body_locations),
        deck: Some(deck),
        potential_rooms,
        imposter_chances: traits.imposter_chances,
        weights: traits.weights(),
    }
}

/// Map a win ratio onto `(0, 1]`; 1.0 means perfectly balanced.
pub fn fitness_transform(score: f64) -> f64 {
    let fitness = (-10.0 * score.ln().powi(2)).exp();
    (fitness * 100_000.0).round() / 100_000.0
}

/// Validate, play and transform in one step.
pub fn calc_fitness(genome: &Genome, seed: u64, iterations: usize) -> Result<f64, FitnessError> {
    let phenotype = Phenotype::new(*genome, seed, iterations)?;
    let score = phenotype.score()?;
    let fitness = fitness_transform(score);
    log::debug!("Genome [{genome}] scored {score:.5}, fitness {fitness}");
    Ok(fitness)
}
