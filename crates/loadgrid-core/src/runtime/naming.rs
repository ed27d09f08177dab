// crates/loadgrid-core/src/runtime/naming.rs
// ============================================================================
// Module: Loadgrid Name Generators
// Description: Random and sequential run-name generators.
// Purpose: Supply run names through the NameGenerator interface.
// Dependencies: crate::{core, interfaces}, rand
// ============================================================================

//! ## Overview
//! [`RandomNameGenerator`] draws a five character `[0-9a-z]` suffix from the
//! OS random source. [`SequenceNameGenerator`] numbers suffixes so tests can
//! predict names.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use rand::Rng;
use rand::rngs::OsRng;

use crate::core::identifiers::RunName;
use crate::core::naming::NAME_SUFFIX_ALPHABET;
use crate::core::naming::NAME_SUFFIX_LEN;
use crate::core::naming::run_name_for;
use crate::interfaces::NameGenerator;

/// Name generator backed by the OS random source.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomNameGenerator;

impl NameGenerator for RandomNameGenerator {
    fn run_name(&self, target: &str) -> RunName {
        let mut rng = OsRng;
        let suffix: String = (0..NAME_SUFFIX_LEN)
            .map(|_| char::from(NAME_SUFFIX_ALPHABET[rng.gen_range(0..NAME_SUFFIX_ALPHABET.len())]))
            .collect();
        run_name_for(target, &suffix)
    }
}

/// Deterministic generator producing suffixes `00001`, `00002`, ...
#[derive(Debug, Default)]
pub struct SequenceNameGenerator {
    /// Last issued sequence number.
    counter: AtomicU64,
}

impl SequenceNameGenerator {
    /// Creates a generator starting at `00001`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }
}

impl NameGenerator for SequenceNameGenerator {
    fn run_name(&self, target: &str) -> RunName {
        let next = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        run_name_for(target, &format!("{next:05}"))
    }
}
