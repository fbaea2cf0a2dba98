//! Request id generators owned by a session.
//!
//! Ids only need to differ from the reserved values: the session never has
//! more than one request outstanding, so uniqueness over the session's
//! lifetime is not required.

use crate::core::packet::{AUTH_FAILED_ID, AUTH_REQUEST_ID};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of ids for command packets
pub trait RequestIdSource: Send {
    /// Next id. Must never return the auth id or the failure sentinel.
    fn next_id(&mut self) -> i32;
}

#[inline]
fn is_reserved(id: i32) -> bool {
    id == AUTH_REQUEST_ID || id == AUTH_FAILED_ID
}

/// Monotonic counter starting at 1, wrapping past `i32::MAX` back to 1
#[derive(Debug, Clone)]
pub struct SequentialIds {
    next: i32,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Counter whose first id is `first` (or 1 if `first` is reserved or negative)
    pub fn starting_at(first: i32) -> Self {
        let next = if first <= 0 { 1 } else { first };
        Self { next }
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestIdSource for SequentialIds {
    fn next_id(&mut self) -> i32 {
        let id = self.next;
        self.next = if id == i32::MAX { 1 } else { id + 1 };
        id
    }
}

/// Uniformly random positive ids
#[derive(Debug, Clone)]
pub struct RandomIds {
    rng: StdRng,
}

impl RandomIds {
    /// Generator seeded from operating-system entropy
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Reproducible generator for tests and replays
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomIds {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestIdSource for RandomIds {
    fn next_id(&mut self) -> i32 {
        loop {
            let id = self.rng.random_range(1..=i32::MAX);
            if !is_reserved(id) {
                return id;
            }
        }
    }
}
