//! Simulation engine: one seeded game from setup to winner.
//!
//! # Turn structure
//!
//! Each turn every active player (alive, not ejected) acts in creation order:
//!
//! 1. **Leaving check** in the current room: an imposter kills the first
//!    non-body rival; crew next to a body call a meeting once someone died.
//! 2. **Draw and move**: draw a room card, pick the best sub-room if the room
//!    is split, enter it.
//! 3. **Entering check** in the new room: crew walking in on an imposter die,
//!    then the body check repeats.
//!
//! A meeting ejects every imposter to space, which ends the game at once.
//! The first kill schedules a reveal turn `imposter_chances + 1` turns later;
//! reaching it without an ejection is a crew win by timeout. The imposter
//! wins when only one living player besides the ghosts is left.
//!
//! Setup draws from the run rng in a fixed order: default roles, default
//! body room, default deck. A reshuffle of the default deck starts over from
//! the declared card order, so a seed always replays the same game.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::RuleConfiguration;
use crate::constants::{default_deck, DEFAULT_CREW_COUNT, DEFAULT_IMPOSTER_COUNT, MAX_TURNS};
use crate::deck::RoomDeck;
use crate::planner::{Mover, RiskRewardPlanner};
use crate::rng::RunRng;
use crate::roster::{Position, Rival, Role, Roster, Token};

/// How a game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Winner {
    /// The imposter was ejected by a meeting.
    Crew,
    /// The reveal turn came before the imposter could finish.
    CrewByTimeout,
    /// Only one player besides the ghosts is left.
    Imposter,
    /// Nothing decided the game.
    NoWinner,
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Winner::Crew => write!(f, "Crew"),
            Winner::CrewByTimeout => write!(f, "Crew (Imposter ran out of turns)"),
            Winner::Imposter => write!(f, "Imposter"),
            Winner::NoWinner => write!(f, "No Winner"),
        }
    }
}

/// Final state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub turn_count: u32,
    pub winner: Winner,
}

/// Invalid simulation input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupError {
    /// No players in the assignment list.
    NoPlayers,
    /// Bodies are placed through `body_locations`, not assigned to players.
    BodyAssigned { index: usize },
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupError::NoPlayers => write!(f, "Assignment list is empty"),
            SetupError::BodyAssigned { index } => {
                write!(f, "Player {} is assigned the Body role", index + 1)
            }
        }
    }
}

impl std::error::Error for SetupError {}

/// Encounter semantics: before the draw the player is leaving its room,
/// after the draw it is entering a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encounter {
    Leaving,
    Entering,
}

/// One game in progress.
pub struct Simulation {
    seed: u64,
    rng: RunRng,
    roster: Roster,
    deck: RoomDeck,
    config: RuleConfiguration,
    game_over: bool,
}

impl Simulation {
    /// Set up a game. The run rng is seeded here and only here.
    pub fn new(config: RuleConfiguration) -> Result<Self, SetupError> {
        let seed = config.seed.unwrap_or_else(rand::random);
        let mut rng = RunRng::seeded(seed);

        let assignments = match &config.assignments {
            Some(assignments) => assignments.clone(),
            None => {
                let mut assignments = vec![Role::Crew; DEFAULT_CREW_COUNT];
                assignments.extend(std::iter::repeat(Role::Imposter).take(DEFAULT_IMPOSTER_COUNT));
                rng.shuffle(&mut assignments);
                assignments
            }
        };
        if assignments.is_empty() {
            return Err(SetupError::NoPlayers);
        }
        if let Some(index) = assignments.iter().position(|r| *r == Role::Body) {
            return Err(SetupError::BodyAssigned { index });
        }

        let body_locations = match &config.body_locations {
            Some(locations) => locations.clone(),
            None => rng.choose(&default_deck()).cloned().into_iter().collect(),
        };

        let mut sim = Self {
            seed,
            rng,
            roster: Roster::from_assignments(&assignments),
            deck: RoomDeck::new(Vec::new()),
            config,
            game_over: false,
        };

        for location in &body_locations {
            let body = sim.roster.add_body();
            let position = sim.enter_room(Mover::Body, location);
            sim.roster.set_body_position(body, position);
        }

        sim.deck = match &sim.config.deck {
            Some(cards) => RoomDeck::new(cards.clone()),
            None => {
                let mut cards = default_deck();
                sim.rng.shuffle(&mut cards);
                RoomDeck::with_refill(cards, default_deck())
            }
        };

        log::debug!("Enter players {:?}", sim.roster.players());
        log::debug!("Using deck {:?}", sim.deck.cards().collect::<Vec<_>>());

        Ok(sim)
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn players(&self) -> &[Token] {
        self.roster.players()
    }

    pub fn bodies(&self) -> &[Token] {
        self.roster.bodies()
    }

    /// Killed players, in kill order.
    pub fn ghosts(&self) -> Vec<&Token> {
        self.roster
            .ghosts()
            .iter()
            .map(|i| self.roster.player(*i))
            .collect()
    }

    pub fn deck(&self) -> &RoomDeck {
        &self.deck
    }

    /// Every card drawn during the run.
    pub fn card_log(&self) -> &[String] {
        self.deck.draw_log()
    }

    /// Resolve the position a mover ends up in after drawing `room`.
    /// `Unset` when every sub-room scores too low to enter.
    fn enter_room(&self, mover: Mover, room: &str) -> Position {
        let variants = self.config.variant_count(room);
        if variants <= 1 {
            return Position::room(room);
        }

        let candidates: Vec<Position> = (0..variants).map(|v| Position::variant(room, v)).collect();
        let planner = RiskRewardPlanner::new(&self.config.weights, &self.roster);
        planner
            .choose(mover, &candidates)
            .cloned()
            .unwrap_or_default()
    }

    fn call_emergency_meeting(&mut self) {
        log::debug!("Calling emergency meeting");
        if self.roster.has_kills() && self.roster.alive_count() > 1 {
            self.roster.eject_imposters();
        }
    }

    fn take_action(&mut self, player: usize, encounter: Encounter) {
        let rivals = self.roster.rivals_of(player);
        if rivals.is_empty() {
            return;
        }

        if self.roster.player(player).is_imposter() {
            let victim = rivals.iter().find_map(|r| match r {
                Rival::Player(i) => Some(*i),
                Rival::Body(_) => None,
            });
            if let Some(victim) = victim {
                self.roster.kill(victim);
                log::debug!(
                    "{} killed {}",
                    self.roster.player(player).name,
                    self.roster.player(victim).name
                );
            }
            return;
        }

        if encounter == Encounter::Entering {
            let imposter = rivals.iter().find_map(|r| match r {
                Rival::Player(i) if self.roster.player(*i).is_imposter() => Some(*i),
                _ => None,
            });
            if let Some(imposter) = imposter {
                self.roster.kill(player);
                log::debug!(
                    "{} killed {}",
                    self.roster.player(imposter).name,
                    self.roster.player(player).name
                );
            }
        }

        for rival in &rivals {
            if matches!(rival, Rival::Body(_)) && self.roster.is_alive(player) {
                log::debug!("{} found a body!", self.roster.player(player));
                if self.roster.has_kills() {
                    self.call_emergency_meeting();
                }
            }
        }
    }

    /// Draw for the acting player, refilling first if a large roster emptied the deck mid-turn.
    fn draw_card(&mut self) -> Option<String> {
        if self.deck.is_empty() {
            log::debug!("Deck ran dry mid-turn, reshuffling");
            self.deck.reshuffle(&mut self.rng);
        }
        self.deck.draw()
    }

    fn move_player(&mut self, player: usize, room: &str) {
        let position = self.enter_room(Mover::Player(player), room);
        self.roster.set_player_position(player, position);
    }

    fn check_ejection(&mut self) {
        if self.roster.any_imposter_ejected() {
            self.game_over = true;
        }
    }

    /// Play the game to the end.
    pub fn run(&mut self) -> RunResult {
        let mut turn_count: u32 = 0;
        let mut reveal_turn: Option<u32> = None;

        while !self.deck.is_empty() && !self.game_over && turn_count < MAX_TURNS {
            log::debug!("Turn {} ({:?})", turn_count + 1, reveal_turn);

            for player in 0..self.roster.players().len() {
                if self.game_over || !self.roster.is_active(player) {
                    continue;
                }

                self.take_action(player, Encounter::Leaving);
                self.check_ejection();

                if self.game_over || !self.roster.is_alive(player) {
                    continue;
                }

                let Some(room) = self.draw_card() else {
                    self.game_over = true;
                    continue;
                };
                log::debug!("{} drew {}", self.roster.player(player).name, room);
                self.move_player(player, &room);

                self.take_action(player, Encounter::Entering);
                self.check_ejection();
            }

            if self.roster.has_kills() && reveal_turn.is_none() {
                reveal_turn = Some(
                    turn_count
                        .saturating_add(self.config.imposter_chances)
                        .saturating_add(1),
                );
            }

            if reveal_turn == Some(turn_count + 1) {
                break;
            }

            if self.roster.players().len() == self.roster.ghost_count() + 1 {
                break;
            }

            if self.deck.len() <= self.roster.alive_count() {
                self.deck.reshuffle(&mut self.rng);
            }

            turn_count += 1;
        }

        let winner = self.calculate_winner(turn_count, reveal_turn);

        log::debug!(
            "{}, {}, {}, {:?}, {:?}",
            self.seed,
            turn_count,
            winner,
            self.roster.players(),
            self.deck.draw_log()
        );

        RunResult { turn_count, winner }
    }

    fn calculate_winner(&self, turn_count: u32, reveal_turn: Option<u32>) -> Winner {
        if self.roster.any_imposter_ejected() {
            Winner::Crew
        } else if reveal_turn == Some(turn_count + 1) {
            Winner::CrewByTimeout
        } else if self.roster.players().len() == self.roster.ghost_count() + 1 {
            Winner::Imposter
        } else {
            Winner::NoWinner
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(cards: &[&str]) -> Vec<String> {
        cards.iter().map(|s| s.to_string()).collect()
    }

    fn graves_match_ghosts(sim: &Simulation) -> bool {
        let in_grave: Vec<&str> = sim
            .players()
            .iter()
            .filter(|p| p.position == Position::Grave)
            .map(|p| p.name.as_str())
            .collect();
        let mut ghosts: Vec<&str> = sim.ghosts().iter().map(|p| p.name.as_str()).collect();
        ghosts.sort();
        let mut graves = in_grave.clone();
        graves.sort();
        graves == ghosts
    }

    #[test]
    fn test_all_ghosts_in_grave_when_imposter_wins() {
        let mut sim = Simulation::new(RuleConfiguration::seeded(31316319423)).unwrap();
        let result = sim.run();
        assert_eq!(result, RunResult { turn_count: 4, winner: Winner::Imposter });
        assert!(graves_match_ghosts(&sim));
        assert_eq!(sim.ghosts().len(), 3);
    }

    #[test]
    fn test_seed_one_is_a_crew_win() {
        let mut sim = Simulation::new(RuleConfiguration::seeded(1)).unwrap();
        let result = sim.run();
        assert_eq!(result, RunResult { turn_count: 16, winner: Winner::Crew });
        assert!(sim.players().iter().any(|p| p.is_imposter() && p.position == Position::Space));
    }

    #[test]
    fn test_default_run_is_deterministic() {
        let mut a = Simulation::new(RuleConfiguration::seeded(1)).unwrap();
        let mut b = Simulation::new(RuleConfiguration::seeded(1)).unwrap();
        assert_eq!(a.run(), b.run());
        assert_eq!(a.card_log(), b.card_log());
    }

    #[test]
    fn test_huge_reveal_window_does_not_overflow() {
        let config: RuleConfiguration =
            serde_json::from_str(r#"{"seed": 3, "imposter_chances": 4294967295}"#).unwrap();
        let mut sim = Simulation::new(config).unwrap();
        assert_eq!(sim.run(), RunResult { turn_count: 2, winner: Winner::Crew });
    }

    #[test]
    fn test_single_room_deck_imposter_wins() {
        let config = RuleConfiguration {
            seed: Some(3208357999),
            deck: Some(labels(&["Room1", "Room1", "Room1", "Room1"])),
            body_locations: Some(labels(&["Bedroom"])),
            ..Default::default()
        };
        let mut sim = Simulation::new(config).unwrap();
        let result = sim.run();
        assert_eq!(result.winner, Winner::Imposter);
        assert_eq!(sim.ghosts().len(), 3);
    }

    #[test]
    fn test_single_room_deck_imposter_wins_every_seat() {
        for seat in 0..4 {
            let mut assignments = vec![Role::Crew; 4];
            assignments[seat] = Role::Imposter;
            let config = RuleConfiguration {
                seed: Some(seat as u64),
                assignments: Some(assignments),
                deck: Some(labels(&["Room1", "Room1", "Room1", "Room1"])),
                body_locations: Some(labels(&["Bedroom"])),
                ..Default::default()
            };
            let result = Simulation::new(config).unwrap().run();
            assert_eq!(result.winner, Winner::Imposter, "imposter in seat {seat}");
        }
    }

    #[test]
    fn test_body_found_after_kill_ejects_imposter() {
        let config = RuleConfiguration {
            seed: Some(5),
            assignments: Some(vec![Role::Imposter, Role::Crew, Role::Crew, Role::Crew]),
            deck: Some(labels(&[
                "Kitchen", "Kitchen", "Office", "Garage", "Attic", "Cellar", "Loft", "Hall",
            ])),
            body_locations: Some(labels(&["Office"])),
            ..Default::default()
        };
        let mut sim = Simulation::new(config).unwrap();
        let result = sim.run();

        assert_eq!(result.winner, Winner::Crew);
        assert_eq!(result.turn_count, 1);
        assert_eq!(sim.players()[0].position, Position::Space);
        assert_eq!(sim.ghosts().len(), 1);
        assert_eq!(sim.ghosts()[0].name, "Player 2");
        // Player 4 never drew: the game ended on Player 3's discovery
        assert_eq!(sim.card_log(), &labels(&["Kitchen", "Kitchen", "Office"])[..]);
    }

    #[test]
    fn test_body_without_kill_calls_no_meeting() {
        let config = RuleConfiguration {
            seed: Some(5),
            assignments: Some(vec![Role::Crew, Role::Imposter]),
            deck: Some(labels(&["Office", "Garage", "Attic", "Hall", "Loft", "Den"])),
            body_locations: Some(labels(&["Office"])),
            ..Default::default()
        };
        let mut sim = Simulation::new(config).unwrap();
        sim.run();
        assert_ne!(sim.players()[1].position, Position::Space);
    }

    #[test]
    fn test_reveal_turn_timeout() {
        let config = RuleConfiguration {
            seed: Some(9),
            assignments: Some(vec![
                Role::Imposter,
                Role::Crew,
                Role::Crew,
                Role::Crew,
                Role::Crew,
            ]),
            deck: Some(labels(&[
                "Kitchen", "Kitchen", "Garage", "Patio", "Den", "Attic", "Cellar", "Loft",
                "Hall", "Porch",
            ])),
            body_locations: Some(labels(&["Office"])),
            imposter_chances: 1,
            ..Default::default()
        };
        let mut sim = Simulation::new(config).unwrap();
        let result = sim.run();

        assert_eq!(result.winner, Winner::CrewByTimeout);
        assert_eq!(result.turn_count, 1);
        assert_eq!(sim.ghosts().len(), 1);
        assert_eq!(sim.card_log().len(), 9);
    }

    #[test]
    fn test_exhausted_deck_without_kill_is_no_winner() {
        let config = RuleConfiguration {
            seed: Some(2),
            assignments: Some(vec![Role::Crew, Role::Imposter]),
            deck: Some(Vec::new()),
            body_locations: Some(Vec::new()),
            ..Default::default()
        };
        let result = Simulation::new(config).unwrap().run();
        assert_eq!(result, RunResult { turn_count: 0, winner: Winner::NoWinner });
    }

    #[test]
    fn test_large_roster_small_deck_never_underflows() {
        let mut assignments = vec![Role::Crew; 17];
        assignments.push(Role::Imposter);
        let config = RuleConfiguration {
            seed: Some(77),
            assignments: Some(assignments),
            deck: Some(labels(&["Room0", "Room1", "Room2", "Room0", "Room1", "Room2"])),
            body_locations: Some(labels(&["Room2"])),
            ..Default::default()
        };
        let mut sim = Simulation::new(config).unwrap();
        sim.run();
        assert!(sim.deck().reshuffle_count() > 0);
        assert!(graves_match_ghosts(&sim));
    }

    #[test]
    fn test_bodies_use_first_variant() {
        let config = RuleConfiguration {
            seed: Some(1),
            body_locations: Some(labels(&["Bedroom", "Kitchen"])),
            ..Default::default()
        };
        let sim = Simulation::new(config).unwrap();
        assert_eq!(sim.bodies()[0].position, Position::variant("Bedroom", 0));
        assert_eq!(sim.bodies()[1].position, Position::room("Kitchen"));
        assert_eq!(sim.bodies()[1].name, "Body 2");
    }

    #[test]
    fn test_default_setup() {
        let sim = Simulation::new(RuleConfiguration::seeded(4)).unwrap();
        assert_eq!(sim.players().len(), 4);
        assert_eq!(sim.players().iter().filter(|p| p.is_imposter()).count(), 1);
        assert_eq!(sim.bodies().len(), 1);
        assert_eq!(sim.deck().len(), 48);
    }

    #[test]
    fn test_setup_errors() {
        let empty = RuleConfiguration {
            assignments: Some(Vec::new()),
            ..Default::default()
        };
        assert_eq!(Simulation::new(empty).err(), Some(SetupError::NoPlayers));

        let body = RuleConfiguration {
            assignments: Some(vec![Role::Crew, Role::Body]),
            ..Default::default()
        };
        assert_eq!(
            Simulation::new(body).err(),
            Some(SetupError::BodyAssigned { index: 1 })
        );
    }

    #[test]
    fn test_many_seeds_keep_invariants() {
        for seed in 0..200 {
            let mut sim = Simulation::new(RuleConfiguration::seeded(seed)).unwrap();
            let result = sim.run();
            assert!(graves_match_ghosts(&sim), "seed {seed}");
            if result.winner == Winner::Imposter {
                assert_eq!(sim.ghosts().len() + 1, sim.players().len(), "seed {seed}");
            }
            if result.winner == Winner::Crew {
                assert!(sim.players().iter().any(|p| p.is_imposter() && p.position == Position::Space));
            }
        }
    }
}
