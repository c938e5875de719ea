// ABOUTME: Monotonic, time-ordered 64-bit identifier allocation
// ABOUTME: Snowflake layout of 41-bit milliseconds, 10-bit node and 12-bit sequence
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::{Mutex, PoisonError};

use chrono::Utc;

/// 2024-01-01T00:00:00Z in Unix milliseconds
pub const EPOCH_MS: i64 = 1_704_067_200_000;

const NODE_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 12;
const TIMESTAMP_BITS: u32 = 41;

/// Largest node number that fits the layout
pub const MAX_NODE_ID: u16 = (1 << NODE_BITS) - 1;
const MAX_SEQUENCE: i64 = (1 << SEQUENCE_BITS) - 1;
const MAX_TIMESTAMP: i64 = (1 << TIMESTAMP_BITS) - 1;

#[derive(Debug, Default)]
struct GeneratorState {
    last_ms: i64,
    sequence: i64,
}

/// Thread-safe snowflake ID generator
///
/// IDs from one generator are strictly increasing. When the wall clock moves
/// backwards, or the 4096 IDs of a millisecond are exhausted, the generator
/// keeps counting on a logical clock one millisecond ahead instead of waiting.
#[derive(Debug)]
pub struct IdGenerator {
    node_id: i64,
    state: Mutex<GeneratorState>,
}

impl IdGenerator {
    /// Create a generator for a node; node numbers above [`MAX_NODE_ID`] are masked
    #[must_use]
    pub fn new(node_id: u16) -> Self {
        Self {
            node_id: i64::from(node_id & MAX_NODE_ID),
            state: Mutex::new(GeneratorState::default()),
        }
    }

    /// Allocate the next identifier
    #[must_use]
    pub fn next_id(&self) -> i64 {
        self.next_id_at(Utc::now().timestamp_millis())
    }

    fn next_id_at(&self, now_ms: i64) -> i64 {
        let elapsed = (now_ms - EPOCH_MS).clamp(0, MAX_TIMESTAMP);
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if elapsed > state.last_ms {
            state.last_ms = elapsed;
            state.sequence = 0;
        } else if state.sequence < MAX_SEQUENCE {
            state.sequence += 1;
        } else {
            state.last_ms += 1;
            state.sequence = 0;
        }

        ((state.last_ms & MAX_TIMESTAMP) << (NODE_BITS + SEQUENCE_BITS))
            | (self.node_id << SEQUENCE_BITS)
            | state.sequence
    }

    /// Millisecond timestamp (Unix) encoded in an identifier
    #[must_use]
    pub const fn timestamp_ms(id: i64) -> i64 {
        (id >> (NODE_BITS + SEQUENCE_BITS)) + EPOCH_MS
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn test_ids_are_positive_and_increasing() {
        let generator = IdGenerator::new(3);
        let mut previous = 0;
        for _ in 0..10_000 {
            let id = generator.next_id();
            assert!(id > previous);
            previous = id;
        }
    }

    #[test]
    fn test_clock_regression_stays_monotonic() {
        let generator = IdGenerator::new(1);
        let now = EPOCH_MS + 1_000_000;

        let first = generator.next_id_at(now);
        let second = generator.next_id_at(now - 5_000);
        let third = generator.next_id_at(now - 10_000);

        assert!(second > first);
        assert!(third > second);
    }

    #[test]
    fn test_sequence_exhaustion_rolls_forward() {
        let generator = IdGenerator::new(0);
        let now = EPOCH_MS + 42;

        let ids: Vec<i64> = (0..=MAX_SEQUENCE + 1)
            .map(|_| generator.next_id_at(now))
            .collect();

        assert!(ids.windows(2).all(|pair| pair[1] > pair[0]));
        let last = ids[ids.len() - 1];
        assert_eq!(IdGenerator::timestamp_ms(last), now + 1);
    }

    #[test]
    fn test_concurrent_allocation_is_unique() {
        let generator = Arc::new(IdGenerator::new(7));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let generator = Arc::clone(&generator);
                thread::spawn(move || (0..2_000).map(|_| generator.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 8_000);
    }

    #[test]
    fn test_timestamp_round_trip() {
        let generator = IdGenerator::new(5);
        let now = EPOCH_MS + 123_456_789;
        let id = generator.next_id_at(now);
        assert_eq!(IdGenerator::timestamp_ms(id), now);
    }
}
