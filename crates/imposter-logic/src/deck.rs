//! Room deck: the location cards players draw to move.
//!
//! The deck remembers the full card multiset it was built from so it can be
//! refilled on reshuffle, and keeps a log of every card drawn during a run.

use std::collections::VecDeque;

use crate::rng::RunRng;

/// Ordered, shuffleable sequence of room cards.
#[derive(Debug, Clone)]
pub struct RoomDeck {
    cards: VecDeque<String>,
    full_set: Vec<String>,
    draw_log: Vec<String>,
    reshuffles: u32,
}

impl RoomDeck {
    /// Build a deck that deals `cards` in the given order and refills from them.
    pub fn new(cards: Vec<String>) -> Self {
        let full_set = cards.clone();
        Self::with_refill(cards, full_set)
    }

    /// Deal `cards` now; reshuffles start over from `full_set` in its own order.
    pub fn with_refill(cards: Vec<String>, full_set: Vec<String>) -> Self {
        Self {
            cards: cards.into(),
            full_set,
            draw_log: Vec::new(),
            reshuffles: 0,
        }
    }

    /// Remove and return the front card. `None` only when the deck is empty.
    pub fn draw(&mut self) -> Option<String> {
        let card = self.cards.pop_front()?;
        self.draw_log.push(card.clone());
        Some(card)
    }

    /// Replace the remaining cards with a freshly shuffled copy of the full set.
    pub fn reshuffle(&mut self, rng: &mut RunRng) {
        let mut fresh = self.full_set.clone();
        rng.shuffle(&mut fresh);
        self.cards = fresh.into();
        self.reshuffles += 1;
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Cards still in the deck, front first.
    pub fn cards(&self) -> impl Iterator<Item = &str> {
        self.cards.iter().map(String::as_str)
    }

    /// Every card drawn so far, in draw order.
    pub fn draw_log(&self) -> &[String] {
        &self.draw_log
    }

    pub fn reshuffle_count(&self) -> u32 {
        self.reshuffles
    }
}
