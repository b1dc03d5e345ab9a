//! Multi-round drill: characters keep coming back until they have been written
//! without a mistake in enough consecutive rounds.

use std::collections::{HashMap, HashSet};

use rand::{Rng, seq::SliceRandom};
use serde::Serialize;

/// Consecutive perfect rounds needed to master a character.
pub const MASTERY_THRESHOLD: u32 = 2;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CharacterProgress {
    pub mistakes_this_round: u32,
    pub perfect_rounds: u32,
    pub mastered: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct RoundSnapshot {
    pub current_round: u32,
    pub remaining: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundOutcome {
    /// The next round's queue is ready.
    Next { round: u32, queue: Vec<String> },
    /// Every character is mastered.
    SessionComplete,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct UnknownCharacter;

#[derive(Debug, Clone)]
pub struct RoundScheduler {
    order: Vec<String>,
    progress: HashMap<String, CharacterProgress>,
    queue: Vec<String>,
    attempted: HashSet<String>,
    current_round: u32,
    mastery_threshold: u32,
    shuffle_later_rounds: bool,
    complete: bool,
}

impl RoundScheduler {
    /// Starts round 1 with `characters` in the given order. Duplicates are dropped.
    pub fn with_policy(
        characters: &[String],
        mastery_threshold: u32,
        shuffle_later_rounds: bool,
    ) -> Self {
        let mut order = Vec::with_capacity(characters.len());
        let mut progress = HashMap::new();
        for c in characters {
            if progress.insert(c.clone(), CharacterProgress::default()).is_none() {
                order.push(c.clone());
            }
        }
        Self {
            queue: order.clone(),
            complete: order.is_empty(),
            order,
            progress,
            attempted: HashSet::new(),
            current_round: 1,
            mastery_threshold: mastery_threshold.max(1),
            shuffle_later_rounds,
        }
    }

    pub fn current_round(&self) -> u32 {
        self.current_round
    }

    pub fn queue(&self) -> &[String] {
        &self.queue
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn progress(&self, character: &str) -> Option<CharacterProgress> {
        self.progress.get(character).copied()
    }

    /// Queued characters with no recorded attempt this round.
    pub fn unattempted(&self) -> Vec<String> {
        self.queue
            .iter()
            .filter(|c| !self.attempted.contains(*c))
            .cloned()
            .collect()
    }

    pub fn snapshot(&self) -> RoundSnapshot {
        RoundSnapshot {
            current_round: self.current_round,
            remaining: self.unattempted().len(),
        }
    }

    /// Adds one finished quiz's mistakes to the character's round tally.
    pub fn record_attempt(
        &mut self,
        character: &str,
        mistakes: u32,
    ) -> Result<(), UnknownCharacter> {
        let Some(progress) = self.progress.get_mut(character) else {
            log::warn!("attempt recorded for {character:?}, which is not in this drill");
            return Err(UnknownCharacter);
        };
        if progress.mastered {
            log::warn!("attempt recorded for already mastered {character:?}");
            return Ok(());
        }
        progress.mistakes_this_round = progress.mistakes_this_round.saturating_add(mistakes);
        self.attempted.insert(character.to_string());
        Ok(())
    }

    /// Closes the current round and builds the next one.
    ///
    /// Every queued character must have been attempted first. In release builds a
    /// character that was skipped is treated as attempted with one mistake.
    pub fn advance_round(&mut self, rng: &mut impl Rng) -> RoundOutcome {
        if self.complete {
            return RoundOutcome::SessionComplete;
        }
        let skipped = self.unattempted();
        if !skipped.is_empty() {
            log::error!(
                "round {} advanced with unattempted characters: {skipped:?}",
                self.current_round
            );
            debug_assert!(
                skipped.is_empty(),
                "round advanced before every character was attempted"
            );
            for c in &skipped {
                if let Some(p) = self.progress.get_mut(c) {
                    p.mistakes_this_round += 1;
                }
            }
        }

        for progress in self.progress.values_mut().filter(|p| !p.mastered) {
            if progress.mistakes_this_round == 0 {
                progress.perfect_rounds += 1;
            } else {
                progress.perfect_rounds = 0;
            }
            if progress.perfect_rounds >= self.mastery_threshold {
                progress.mastered = true;
            }
            progress.mistakes_this_round = 0;
        }

        self.attempted.clear();
        self.queue = self
            .order
            .iter()
            .filter(|c| self.progress.get(*c).is_some_and(|p| !p.mastered))
            .cloned()
            .collect();

        if self.queue.is_empty() {
            self.complete = true;
            log::info!("drill complete after {} rounds", self.current_round);
            return RoundOutcome::SessionComplete;
        }
        if self.shuffle_later_rounds {
            self.queue.shuffle(rng);
        }
        self.current_round += 1;
        log::info!(
            "round {} starts with {} characters",
            self.current_round,
            self.queue.len()
        );
        RoundOutcome::Next {
            round: self.current_round,
            queue: self.queue.clone(),
        }
    }
}
