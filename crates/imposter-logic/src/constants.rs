//! Game constants: defaults for the deck, roster and planner, plus the genome layout.
//!
//! Everything here is plain data. The simulation falls back to these values
//! whenever a [`RuleConfiguration`](crate::config::RuleConfiguration) leaves a
//! key out.

/// Default room cards, grouped by room type (label, copies in the deck).
pub const DEFAULT_ROOM_CARDS: &[(&str, usize)] = &[
    ("Bedroom", 8),
    ("Office", 5),
    ("Bathroom", 5),
    ("Kitchen", 5),
    ("Garage", 5),
    ("Back Patio", 5),
    ("Living Room", 5),
    ("Fancy Room", 5),
    ("TV Room", 5),
];

/// Rooms that are split into several interchangeable sub-rooms by default.
pub const DEFAULT_POTENTIAL_ROOMS: &[(&str, u8)] = &[("Bedroom", 3), ("Bathroom", 2)];

/// Turns the imposter survives after the first kill before crew wins by timeout.
/// Genome scenarios carry their own window (3–18).
pub const DEFAULT_IMPOSTER_CHANCES: u32 = 20;

/// Hard stop for games where nobody can ever meet; such runs end with no winner.
pub const MAX_TURNS: u32 = 10_000;

/// Imposters per default game.
pub const DEFAULT_IMPOSTER_COUNT: usize = 1;
/// Crew per default game.
pub const DEFAULT_CREW_COUNT: usize = 3;

pub mod weights {
    pub const REWARD_IMPOSTER_TO_CREW: i32 = 10;
    pub const REWARD_CREW_TO_BODY: i32 = 1;
    pub const RISK_CREW_TO_IMPOSTER: i32 = 10;
    pub const RISK_CREW_TO_RIVAL: i32 = 5;
}

/// Upper bound (inclusive) for per-run simulation seeds drawn by the evaluator.
pub const MAX_SIMULATION_SEED: u64 = 100_000_000_000;

/// Default number of simulated games per fitness evaluation.
pub const DEFAULT_ITERATIONS: usize = 1000;

/// Added to the crew win count so a crew-less tally never scores exactly zero.
pub const CREW_WIN_EPSILON: f64 = 0.0001;
/// Stands in for zero imposter wins to avoid dividing by zero.
pub const IMPOSTER_WIN_EPSILON: f64 = 0.000_000_1;
/// Added to every fitness before parent selection so all-zero populations can still breed.
pub const SELECTION_EPSILON: f64 = 0.0001;

/// Number of loci in a genome.
pub const GENOME_LEN: usize = 43;

/// Reference genome: the hand-tuned rules of the physical board game.
#[rustfmt::skip]
pub const BASELINE_GENOME: [u8; GENOME_LEN] = [
    1, 0, 0, 0,     // 4 players
    0, 0, 0,        // 1 imposter
    0, 0, 0,        // 1 body
    0, 0, 1,        // 7 room types
    0, 1, 0, 0,     // 5 cards per room type
    0, 1, 0,        // 2 duplicate rooms
    1,              // ladder
    1, 0,           // intensity 2
    0, 1, 0, 0,     // 5 chances
    0, 1, 0, 1,     // reward imposter to crew 10
    1, 0, 0, 0,     // reward crew to body 1
    0, 1, 0, 1,     // risk crew to imposter 10
    1, 0, 1, 0,     // risk crew to rival 5
];

/// Default room list expanded into individual cards, in declaration order.
pub fn default_deck() -> Vec<String> {
    DEFAULT_ROOM_CARDS
        .iter()
        .flat_map(|(label, copies)| std::iter::repeat(label.to_string()).take(*copies))
        .collect()
}
