//! Play order.
//!
//! [`OrderController`] answers "what plays next / before this" for a play mode,
//! the current index and the playlist length. It never holds entries, only
//! indices, and owns the shuffle permutation.
//!
//! Shuffle uses a Fisher-Yates shuffle over an injected RNG, so tests can seed
//! it and get a deterministic order.

use std::fmt;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Error;

/// How the next entry is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PlayMode {
    /// In list order, wrapping at the end.
    #[default]
    Sequential,
    /// Through a random permutation, reshuffled each cycle.
    Shuffle,
    /// Repeat the current entry.
    SingleLoop,
}

impl PlayMode {
    /// All modes, in UI order.
    pub const ALL: [Self; 3] = [Self::Sequential, Self::Shuffle, Self::SingleLoop];

    /// Tag used in storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Shuffle => "shuffle",
            Self::SingleLoop => "single-loop",
        }
    }
}

impl fmt::Display for PlayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlayMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidPlayMode(s.to_string()))
    }
}

/// Result of advancing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// Index to play.
    pub index: usize,
    /// Whether the advance went past the end of the cycle and started over.
    pub wrapped: bool,
}

/// Next/previous decisions and shuffle-order bookkeeping.
#[derive(Debug)]
pub struct OrderController<R = StdRng> {
    shuffle_order: Vec<usize>,
    shuffle_position: usize,
    rng: R,
}

impl OrderController<StdRng> {
    /// Controller seeded from the OS.
    #[must_use]
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Controller with a fixed seed.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }
}

impl Default for OrderController<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RngCore> OrderController<R> {
    /// Controller drawing randomness from `rng`.
    pub const fn with_rng(rng: R) -> Self {
        Self {
            shuffle_order: Vec::new(),
            shuffle_position: 0,
            rng,
        }
    }

    /// Current shuffle permutation (empty until first needed).
    #[must_use]
    pub fn shuffle_order(&self) -> &[usize] {
        &self.shuffle_order
    }

    /// Position of the current entry within the permutation.
    #[must_use]
    pub const fn shuffle_position(&self) -> usize {
        self.shuffle_position
    }

    /// Whether the permutation no longer covers a list of `len` entries.
    #[must_use]
    pub fn is_stale(&self, len: usize) -> bool {
        self.shuffle_order.len() != len
    }

    /// Draw a fresh permutation of `0..len` and rewind to its start.
    pub fn regenerate(&mut self, len: usize) {
        let mut order: Vec<usize> = (0..len).collect();
        order.shuffle(&mut self.rng);
        debug!("Generated shuffle order of {} entries", len);
        self.shuffle_order = order;
        self.shuffle_position = 0;
    }

    /// Regenerate the permutation if it doesn't match `len`.
    pub fn ensure_fresh(&mut self, len: usize) {
        if self.is_stale(len) {
            self.regenerate(len);
        }
    }

    /// Point the shuffle position at `index`, regenerating first if stale.
    pub fn sync_to(&mut self, index: usize, len: usize) {
        self.ensure_fresh(len);
        if let Some(position) = self.shuffle_order.iter().position(|&i| i == index) {
            self.shuffle_position = position;
        }
    }

    /// Drop the permutation; the next shuffle decision draws a new one.
    pub fn invalidate(&mut self) {
        self.shuffle_order.clear();
        self.shuffle_position = 0;
    }

    /// First index of a new cycle.
    pub fn start(&mut self, mode: PlayMode, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        match mode {
            PlayMode::Shuffle => {
                self.regenerate(len);
                self.shuffle_order.first().copied()
            }
            PlayMode::Sequential | PlayMode::SingleLoop => Some(0),
        }
    }

    /// Whether the next natural advance from `current` would start a new cycle.
    ///
    /// In shuffle the position is synced to `current` first, exactly as
    /// [`Self::next`] would, so the answer matches the `wrapped` flag of the
    /// following `next` call.
    pub fn is_cycle_end(&mut self, mode: PlayMode, current: Option<usize>, len: usize) -> bool {
        let Some(current) = current.filter(|&i| i < len) else {
            return false;
        };
        match mode {
            PlayMode::Sequential => current + 1 >= len,
            PlayMode::Shuffle => {
                self.sync_to(current, len);
                self.shuffle_position + 1 >= self.shuffle_order.len()
            }
            PlayMode::SingleLoop => false,
        }
    }

    /// Index to play after `current`.
    pub fn next(&mut self, mode: PlayMode, current: Option<usize>, len: usize) -> Option<Step> {
        if len == 0 {
            return None;
        }

        let current = current.filter(|&i| i < len);
        match (mode, current) {
            (PlayMode::SingleLoop, Some(index)) => Some(Step {
                index,
                wrapped: false,
            }),
            (PlayMode::Sequential | PlayMode::SingleLoop, None) => Some(Step {
                index: 0,
                wrapped: false,
            }),
            (PlayMode::Sequential, Some(index)) => {
                let wrapped = index + 1 >= len;
                Some(Step {
                    index: if wrapped { 0 } else { index + 1 },
                    wrapped,
                })
            }
            (PlayMode::Shuffle, current) => Some(self.next_shuffled(current, len)),
        }
    }

    fn next_shuffled(&mut self, current: Option<usize>, len: usize) -> Step {
        let Some(current) = current else {
            self.ensure_fresh(len);
            self.shuffle_position = 0;
            return Step {
                index: self.shuffle_order[0],
                wrapped: false,
            };
        };

        self.sync_to(current, len);
        self.shuffle_position += 1;

        let wrapped = self.shuffle_position >= self.shuffle_order.len();
        if wrapped {
            self.regenerate(len);
        }

        Step {
            index: self.shuffle_order[self.shuffle_position],
            wrapped,
        }
    }

    /// Index to play before `current`.
    pub fn previous(
        &mut self,
        mode: PlayMode,
        current: Option<usize>,
        len: usize,
    ) -> Option<usize> {
        if len == 0 {
            return None;
        }

        let current = current.filter(|&i| i < len);
        match mode {
            PlayMode::Sequential | PlayMode::SingleLoop => Some(match current {
                Some(0) | None => len - 1,
                Some(index) => index - 1,
            }),
            PlayMode::Shuffle => {
                match current {
                    Some(index) => {
                        self.sync_to(index, len);
                        self.shuffle_position = self
                            .shuffle_position
                            .checked_sub(1)
                            .unwrap_or(self.shuffle_order.len() - 1);
                    }
                    None => {
                        self.ensure_fresh(len);
                        self.shuffle_position = self.shuffle_order.len() - 1;
                    }
                }
                Some(self.shuffle_order[self.shuffle_position])
            }
        }
    }
}
