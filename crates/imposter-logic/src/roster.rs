//! Roster: player tokens, body markers, positions and the ghost set.
//!
//! Players are indexed by creation order; that order is also the turn order.
//! Bodies are kept apart from players: they never act, never die and are
//! placed exactly once at setup.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What a token is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Crew,
    Imposter,
    Body,
}

/// Where a token is.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Position {
    /// Not placed yet (players before their first draw).
    #[default]
    Unset,
    /// A room, plus the sub-room index for rooms split into several variants.
    InRoom { room: String, variant: Option<u8> },
    /// Ejected by an emergency meeting.
    Space,
    /// Killed.
    Grave,
}

impl Position {
    pub fn room(room: impl Into<String>) -> Self {
        Position::InRoom {
            room: room.into(),
            variant: None,
        }
    }

    pub fn variant(room: impl Into<String>, variant: u8) -> Self {
        Position::InRoom {
            room: room.into(),
            variant: Some(variant),
        }
    }

    pub fn is_in_room(&self) -> bool {
        matches!(self, Position::InRoom { .. })
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Unset => write!(f, "-"),
            Position::InRoom {
                room,
                variant: None,
            } => write!(f, "{room}"),
            Position::InRoom {
                room,
                variant: Some(v),
            } => write!(f, "{room}{v}"),
            Position::Space => write!(f, "Space"),
            Position::Grave => write!(f, "Grave"),
        }
    }
}

/// A player or body on the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub name: String,
    pub role: Role,
    pub position: Position,
}

impl Token {
    pub fn new(name: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            role,
            position: Position::Unset,
        }
    }

    pub fn is_imposter(&self) -> bool {
        self.role == Role::Imposter
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?}, {})", self.name, self.role, self.position)
    }
}

/// Someone sharing a room with the acting player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rival {
    Player(usize),
    Body(usize),
}

/// All tokens of one run.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    players: Vec<Token>,
    bodies: Vec<Token>,
    ghosts: Vec<usize>,
}

impl Roster {
    /// One player per assignment, named `Player 1`, `Player 2`, ...
    pub fn from_assignments(assignments: &[Role]) -> Self {
        let players = assignments
            .iter()
            .enumerate()
            .map(|(i, role)| Token::new(format!("Player {}", i + 1), *role))
            .collect();
        Self {
            players,
            bodies: Vec::new(),
            ghosts: Vec::new(),
        }
    }

    /// Add an unplaced body marker and return its index.
    pub fn add_body(&mut self) -> usize {
        let index = self.bodies.len();
        self.bodies
            .push(Token::new(format!("Body {}", index + 1), Role::Body));
        index
    }

    pub fn players(&self) -> &[Token] {
        &self.players
    }

    pub fn bodies(&self) -> &[Token] {
        &self.bodies
    }

    pub fn player(&self, index: usize) -> &Token {
        &self.players[index]
    }

    pub fn set_player_position(&mut self, index: usize, position: Position) {
        self.players[index].position = position;
    }

    pub fn set_body_position(&mut self, index: usize, position: Position) {
        self.bodies[index].position = position;
    }

    /// Indices of killed players, in kill order.
    pub fn ghosts(&self) -> &[usize] {
        &self.ghosts
    }

    pub fn ghost_count(&self) -> usize {
        self.ghosts.len()
    }

    pub fn has_kills(&self) -> bool {
        !self.ghosts.is_empty()
    }

    pub fn is_alive(&self, index: usize) -> bool {
        !self.ghosts.contains(&index)
    }

    /// Players not in the ghost set (ejected imposters still count).
    pub fn alive_count(&self) -> usize {
        self.players.len() - self.ghosts.len()
    }

    /// Players that still take turns: alive and not ejected.
    pub fn is_active(&self, index: usize) -> bool {
        self.is_alive(index) && self.players[index].position != Position::Space
    }

    /// Send a player to the grave. Killing a ghost again is a no-op.
    pub fn kill(&mut self, index: usize) -> bool {
        if !self.is_alive(index) {
            return false;
        }
        self.ghosts.push(index);
        self.players[index].position = Position::Grave;
        true
    }

    /// Move every imposter to space.
    pub fn eject_imposters(&mut self) {
        for player in self.players.iter_mut().filter(|p| p.is_imposter()) {
            player.position = Position::Space;
        }
    }

    pub fn any_imposter_ejected(&self) -> bool {
        self.players
            .iter()
            .any(|p| p.is_imposter() && p.position == Position::Space)
    }

    /// Other players in the same room as `index`, then bodies in that room.
    pub fn rivals_of(&self, index: usize) -> Vec<Rival> {
        let position = &self.players[index].position;
        if !position.is_in_room() {
            return Vec::new();
        }

        let players = self
            .players
            .iter()
            .enumerate()
            .filter(|(i, p)| *i != index && p.position == *position)
            .map(|(i, _)| Rival::Player(i));
        let bodies = self
            .bodies
            .iter()
            .enumerate()
            .filter(|(_, b)| b.position == *position)
            .map(|(i, _)| Rival::Body(i));

        players.chain(bodies).collect()
    }
}
