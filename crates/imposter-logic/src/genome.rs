//! Genome codec: the 43-bit encoding of a rule set.
//!
//! A genome is an ordered list of loci. The loci are cut into named fields;
//! each field is read as an unsigned little-endian integer and offset by a
//! fixed base, so an all-zero genome decodes to the smallest legal game.
//!
//! | field | loci | values |
//! |-------|------|--------|
//! | player_count | 0..4 | 3–18 |
//! | imposter_count | 4..6 | 1–4 |
//! | reserved | 6..7 | unused |
//! | body_count | 7..10 | 1–8 |
//! | room_type_count | 10..13 | 3–10 |
//! | cards_per_room_type | 13..17 | 3–18 |
//! | duplicate_room_count | 17..20 | 0–7 |
//! | duplicate_room_strategy | 20..21 | Equal / Ladder |
//! | duplicate_room_intensity | 21..23 | 1–4 |
//! | imposter_chances | 23..27 | 3–18 |
//! | reward_imposter_to_crew | 27..31 | 0–15 |
//! | reward_crew_to_body | 31..35 | 0–15 |
//! | risk_crew_to_imposter | 35..39 | 0–15 |
//! | risk_crew_to_rival | 39..43 | 0–15 |

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{BASELINE_GENOME, GENOME_LEN};
use crate::planner::PlannerWeights;

/// Fixed-length bit vector. Locus `i` is bit `i` of the inner word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Genome(u64);

const LOCUS_MASK: u64 = (1u64 << GENOME_LEN) - 1;

impl Genome {
    /// Build from a slice of 0/1 alleles.
    pub fn from_bits(bits: &[u8]) -> Result<Self, GenomeError> {
        if bits.len() != GENOME_LEN {
            return Err(GenomeError::WrongLength {
                expected: GENOME_LEN,
                found: bits.len(),
            });
        }
        let mut word = 0u64;
        for (locus, allele) in bits.iter().enumerate() {
            match allele {
                0 => {}
                1 => word |= 1 << locus,
                other => {
                    return Err(GenomeError::InvalidAllele {
                        locus,
                        value: *other,
                    })
                }
            }
        }
        Ok(Self(word))
    }

    /// Every locus zero: the smallest value of every field.
    pub fn zeros() -> Self {
        Self(0)
    }

    /// Every locus one.
    pub fn ones() -> Self {
        Self(LOCUS_MASK)
    }

    /// The hand-tuned board-game rules.
    pub fn baseline() -> Self {
        let mut word = 0u64;
        for (locus, allele) in BASELINE_GENOME.iter().enumerate() {
            word |= (*allele as u64) << locus;
        }
        Self(word)
    }

    /// Uniformly random alleles. May be invalid; see [`validate`].
    pub fn random(rng: &mut impl Rng) -> Self {
        Self(rng.gen::<u64>() & LOCUS_MASK)
    }

    pub fn bit(&self, locus: usize) -> u8 {
        ((self.0 >> locus) & 1) as u8
    }

    pub fn bits(&self) -> Vec<u8> {
        (0..GENOME_LEN).map(|locus| self.bit(locus)).collect()
    }

    /// Loci `[0, point)` from `self`, loci `[point, len)` from `tail`.
    pub fn splice(&self, tail: &Genome, point: usize) -> Genome {
        let head_mask = head_mask(point);
        Genome((self.0 & head_mask) | (tail.0 & !head_mask & LOCUS_MASK))
    }

    /// Read loci `[start, start + width)` as a little-endian integer.
    fn field(&self, start: usize, width: usize) -> u32 {
        ((self.0 >> start) & ((1u64 << width) - 1)) as u32
    }

    fn with_field(self, start: usize, width: usize, value: u32) -> Genome {
        let mask = ((1u64 << width) - 1) << start;
        Genome((self.0 & !mask) | (((value as u64) << start) & mask))
    }
}

fn head_mask(point: usize) -> u64 {
    if point >= GENOME_LEN {
        LOCUS_MASK
    } else {
        (1u64 << point) - 1
    }
}

/// Comma-separated alleles, e.g. `1,0,0,0,...`.
impl fmt::Display for Genome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for locus in 0..GENOME_LEN {
            if locus > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", self.bit(locus))?;
        }
        Ok(())
    }
}

impl std::str::FromStr for Genome {
    type Err = GenomeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bits = s
            .split(',')
            .map(|token| {
                token
                    .trim()
                    .parse::<u8>()
                    .map_err(|_| GenomeError::Unparseable(token.trim().to_string()))
            })
            .collect::<Result<Vec<u8>, _>>()?;
        Genome::from_bits(&bits)
    }
}

/// Serialized in the same comma-separated form as `Display`.
impl Serialize for Genome {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Genome {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// A named range of loci.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub start: usize,
    pub width: usize,
    pub base: u32,
}

impl FieldSpec {
    const fn new(name: &'static str, start: usize, width: usize, base: u32) -> Self {
        Self {
            name,
            start,
            width,
            base,
        }
    }

    pub fn decode(&self, genome: &Genome) -> u32 {
        self.base + genome.field(self.start, self.width)
    }

    /// Largest value the field can express.
    pub fn max_value(&self) -> u32 {
        self.base + ((1u32 << self.width) - 1)
    }
}

pub mod fields {
    use super::FieldSpec;

    pub const PLAYER_COUNT: FieldSpec = FieldSpec::new("player_count", 0, 4, 3);
    pub const IMPOSTER_COUNT: FieldSpec = FieldSpec::new("imposter_count", 4, 2, 1);
    pub const RESERVED: FieldSpec = FieldSpec::new("reserved", 6, 1, 0);
    pub const BODY_COUNT: FieldSpec = FieldSpec::new("body_count", 7, 3, 1);
    pub const ROOM_TYPE_COUNT: FieldSpec = FieldSpec::new("room_type_count", 10, 3, 3);
    pub const CARDS_PER_ROOM_TYPE: FieldSpec = FieldSpec::new("cards_per_room_type", 13, 4, 3);
    pub const DUPLICATE_ROOM_COUNT: FieldSpec = FieldSpec::new("duplicate_room_count", 17, 3, 0);
    pub const DUPLICATE_ROOM_STRATEGY: FieldSpec =
        FieldSpec::new("duplicate_room_strategy", 20, 1, 0);
    pub const DUPLICATE_ROOM_INTENSITY: FieldSpec =
        FieldSpec::new("duplicate_room_intensity", 21, 2, 1);
    pub const IMPOSTER_CHANCES: FieldSpec = FieldSpec::new("imposter_chances", 23, 4, 3);
    pub const REWARD_IMPOSTER_TO_CREW: FieldSpec =
        FieldSpec::new("reward_imposter_to_crew", 27, 4, 0);
    pub const REWARD_CREW_TO_BODY: FieldSpec = FieldSpec::new("reward_crew_to_body", 31, 4, 0);
    pub const RISK_CREW_TO_IMPOSTER: FieldSpec =
        FieldSpec::new("risk_crew_to_imposter", 35, 4, 0);
    pub const RISK_CREW_TO_RIVAL: FieldSpec = FieldSpec::new("risk_crew_to_rival", 39, 4, 0);

    /// All fields in locus order.
    pub const ALL: [FieldSpec; 14] = [
        PLAYER_COUNT,
        IMPOSTER_COUNT,
        RESERVED,
        BODY_COUNT,
        ROOM_TYPE_COUNT,
        CARDS_PER_ROOM_TYPE,
        DUPLICATE_ROOM_COUNT,
        DUPLICATE_ROOM_STRATEGY,
        DUPLICATE_ROOM_INTENSITY,
        IMPOSTER_CHANCES,
        REWARD_IMPOSTER_TO_CREW,
        REWARD_CREW_TO_BODY,
        RISK_CREW_TO_IMPOSTER,
        RISK_CREW_TO_RIVAL,
    ];
}

/// How duplicated rooms get their sub-room counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuplicateRoomStrategy {
    /// Every duplicated room gets `intensity` sub-rooms.
    Equal,
    /// The k-th duplicated room gets `intensity + k` sub-rooms.
    Ladder,
}

/// Decoded genome: scenario shape plus planner weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenomeTraits {
    pub player_count: u32,
    pub imposter_count: u32,
    pub body_count: u32,
    pub room_type_count: u32,
    pub cards_per_room_type: u32,
    pub duplicate_room_count: u32,
    pub duplicate_room_strategy: DuplicateRoomStrategy,
    pub duplicate_room_intensity: u32,
    pub imposter_chances: u32,
    pub reward_imposter_to_crew: u32,
    pub reward_crew_to_body: u32,
    pub risk_crew_to_imposter: u32,
    pub risk_crew_to_rival: u32,
}

impl GenomeTraits {
    pub fn weights(&self) -> PlannerWeights {
        PlannerWeights {
            reward_imposter_to_crew: self.reward_imposter_to_crew as i32,
            reward_crew_to_body: self.reward_crew_to_body as i32,
            risk_crew_to_imposter: self.risk_crew_to_imposter as i32,
            risk_crew_to_rival: self.risk_crew_to_rival as i32,
        }
    }

    pub fn crew_count(&self) -> u32 {
        self.player_count.saturating_sub(self.imposter_count)
    }
}

/// Decode every field of a genome. Pure; does not validate.
pub fn decode(genome: &Genome) -> GenomeTraits {
    use fields::*;

    let strategy = if DUPLICATE_ROOM_STRATEGY.decode(genome) == 1 {
        DuplicateRoomStrategy::Ladder
    } else {
        DuplicateRoomStrategy::Equal
    };

    GenomeTraits {
        player_count: PLAYER_COUNT.decode(genome),
        imposter_count: IMPOSTER_COUNT.decode(genome),
        body_count: BODY_COUNT.decode(genome),
        room_type_count: ROOM_TYPE_COUNT.decode(genome),
        cards_per_room_type: CARDS_PER_ROOM_TYPE.decode(genome),
        duplicate_room_count: DUPLICATE_ROOM_COUNT.decode(genome),
        duplicate_room_strategy: strategy,
        duplicate_room_intensity: DUPLICATE_ROOM_INTENSITY.decode(genome),
        imposter_chances: IMPOSTER_CHANCES.decode(genome),
        reward_imposter_to_crew: REWARD_IMPOSTER_TO_CREW.decode(genome),
        reward_crew_to_body: REWARD_CREW_TO_BODY.decode(genome),
        risk_crew_to_imposter: RISK_CREW_TO_IMPOSTER.decode(genome),
        risk_crew_to_rival: RISK_CREW_TO_RIVAL.decode(genome),
    }
}

/// Inverse of [`decode`]. The reserved locus is written as 0.
pub fn encode(traits: &GenomeTraits) -> Result<Genome, GenomeError> {
    use fields::*;

    let strategy = match traits.duplicate_room_strategy {
        DuplicateRoomStrategy::Equal => 0,
        DuplicateRoomStrategy::Ladder => 1,
    };
    let values = [
        (PLAYER_COUNT, traits.player_count),
        (IMPOSTER_COUNT, traits.imposter_count),
        (BODY_COUNT, traits.body_count),
        (ROOM_TYPE_COUNT, traits.room_type_count),
        (CARDS_PER_ROOM_TYPE, traits.cards_per_room_type),
        (DUPLICATE_ROOM_COUNT, traits.duplicate_room_count),
        (DUPLICATE_ROOM_STRATEGY, strategy),
        (DUPLICATE_ROOM_INTENSITY, traits.duplicate_room_intensity),
        (IMPOSTER_CHANCES, traits.imposter_chances),
        (REWARD_IMPOSTER_TO_CREW, traits.reward_imposter_to_crew),
        (REWARD_CREW_TO_BODY, traits.reward_crew_to_body),
        (RISK_CREW_TO_IMPOSTER, traits.risk_crew_to_imposter),
        (RISK_CREW_TO_RIVAL, traits.risk_crew_to_rival),
    ];

    let mut genome = Genome::zeros();
    for (field, value) in values {
        if value < field.base || value > field.max_value() {
            return Err(GenomeError::OutOfRange {
                field: field.name,
                value,
            });
        }
        genome = genome.with_field(field.start, field.width, value - field.base);
    }
    Ok(genome)
}

/// A broken game rule in a decoded genome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleViolation {
    /// Imposters must be outnumbered by players.
    TooManyImposters { imposters: u32, players: u32 },
    /// Each body needs its own room type.
    TooManyBodies { bodies: u32, room_types: u32 },
    /// Only existing room types can be duplicated.
    TooManyDuplicateRooms { duplicates: u32, room_types: u32 },
}

impl fmt::Display for RuleViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleViolation::TooManyImposters { imposters, players } => {
                write!(f, "{imposters} imposters with only {players} players")
            }
            RuleViolation::TooManyBodies { bodies, room_types } => {
                write!(f, "{bodies} bodies with only {room_types} room types")
            }
            RuleViolation::TooManyDuplicateRooms {
                duplicates,
                room_types,
            } => write!(
                f,
                "{duplicates} duplicate rooms with only {room_types} room types"
            ),
        }
    }
}

/// Check the decoded rules, returning every violation found.
pub fn validate_traits(traits: &GenomeTraits) -> Vec<RuleViolation> {
    let mut violations = Vec::new();

    if traits.imposter_count >= traits.player_count {
        violations.push(RuleViolation::TooManyImposters {
            imposters: traits.imposter_count,
            players: traits.player_count,
        });
    }
    if traits.body_count > traits.room_type_count {
        violations.push(RuleViolation::TooManyBodies {
            bodies: traits.body_count,
            room_types: traits.room_type_count,
        });
    }
    if traits.duplicate_room_count > traits.room_type_count {
        violations.push(RuleViolation::TooManyDuplicateRooms {
            duplicates: traits.duplicate_room_count,
            room_types: traits.room_type_count,
        });
    }

    violations
}

/// Decode and validate in one step.
pub fn validate(genome: &Genome) -> Result<GenomeTraits, ValidationError> {
    let traits = decode(genome);
    let violations = validate_traits(&traits);
    if violations.is_empty() {
        Ok(traits)
    } else {
        Err(ValidationError {
            genome: *genome,
            violations,
        })
    }
}

pub fn is_valid(genome: &Genome) -> bool {
    validate(genome).is_ok()
}

/// A genome that decodes to an unplayable game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub genome: Genome,
    pub violations: Vec<RuleViolation>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid genotype [{}]:", self.genome)?;
        for violation in &self.violations {
            write!(f, " {violation};")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Malformed genome input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenomeError {
    WrongLength { expected: usize, found: usize },
    InvalidAllele { locus: usize, value: u8 },
    Unparseable(String),
    OutOfRange { field: &'static str, value: u32 },
}

impl fmt::Display for GenomeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenomeError::WrongLength { expected, found } => {
                write!(f, "Genome length mismatch: expected {expected}, found {found}")
            }
            GenomeError::InvalidAllele { locus, value } => {
                write!(f, "Locus {locus} holds {value}, expected 0 or 1")
            }
            GenomeError::Unparseable(token) => write!(f, "Cannot parse allele '{token}'"),
            GenomeError::OutOfRange { field, value } => {
                write!(f, "Value {value} out of range for {field}")
            }
        }
    }
}

impl std::error::Error for GenomeError {}
