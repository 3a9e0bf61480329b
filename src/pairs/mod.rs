// src/pairs/mod.rs — The ordered pair universe and pending-work selection
//
// Pending work is never stored. Each run recomputes it by scanning the
// universe in canonical order against the keys already present in the store,
// so a crash or restart can never desynchronize a queue from the data.

use std::collections::HashSet;
use std::fmt;

use thiserror::Error;

use crate::store::store::{ArgumentRow, Store};

/// Number of items in the collection (Psalms 1..=150).
pub const UNIVERSE_SIZE: u16 = 150;

/// Ordered pairs in the full universe: 150 × 149.
pub const TOTAL_PAIRS: usize = UNIVERSE_SIZE as usize * (UNIVERSE_SIZE as usize - 1);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PairError {
    #[error("item {0} is outside 1..={max}", max = UNIVERSE_SIZE)]
    OutOfRange(i64),

    #[error("self-pair {0} -> {0} is not part of the universe")]
    SelfPair(u16),
}

/// An ordered (source, target) pair. Only constructible when valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey {
    source: u16,
    target: u16,
}

impl PairKey {
    pub fn new(source: i64, target: i64) -> Result<Self, PairError> {
        let source = check_item(source)?;
        let target = check_item(target)?;
        if source == target {
            return Err(PairError::SelfPair(source));
        }
        Ok(Self { source, target })
    }

    pub fn source(&self) -> u16 {
        self.source
    }

    pub fn target(&self) -> u16 {
        self.target
    }

    /// Detail page file name, e.g. `003-117.html`.
    pub fn file_name(&self) -> String {
        format!("{:03}-{:03}.html", self.source, self.target)
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.target)
    }
}

fn check_item(value: i64) -> Result<u16, PairError> {
    if (1..=i64::from(UNIVERSE_SIZE)).contains(&value) {
        Ok(value as u16)
    } else {
        Err(PairError::OutOfRange(value))
    }
}

/// The scan domain: items `1..=size`. Production uses the full universe;
/// smaller sizes restrict the scan to a prefix of it.
#[derive(Debug, Clone, Copy)]
pub struct PairSpace {
    size: u16,
}

impl Default for PairSpace {
    fn default() -> Self {
        Self {
            size: UNIVERSE_SIZE,
        }
    }
}

impl PairSpace {
    pub fn with_size(size: u16) -> Result<Self, PairError> {
        if size < 2 || size > UNIVERSE_SIZE {
            return Err(PairError::OutOfRange(i64::from(size)));
        }
        Ok(Self { size })
    }

    pub fn size(&self) -> u16 {
        self.size
    }

    pub fn total_pairs(&self) -> usize {
        let n = self.size as usize;
        n * (n - 1)
    }

    /// Every pair in canonical order: source ascending, then target ascending.
    pub fn iter(&self) -> impl Iterator<Item = PairKey> {
        let size = self.size;
        (1..=size).flat_map(move |source| {
            (1..=size)
                .filter(move |&target| target != source)
                .map(move |target| PairKey { source, target })
        })
    }

    /// First `limit` pairs in canonical order that have no stored argument.
    pub fn pending_pairs(&self, store: &Store, limit: usize) -> anyhow::Result<Vec<PairKey>> {
        let completed = store.existing_pairs()?;
        Ok(self.pending_given(&completed, limit))
    }

    fn pending_given(&self, completed: &HashSet<PairKey>, limit: usize) -> Vec<PairKey> {
        self.iter()
            .filter(|pair| !completed.contains(pair))
            .take(limit)
            .collect()
    }

    /// Arguments in creation order lacking an evaluation at `rubric_version`.
    pub fn pending_evaluations(
        &self,
        store: &Store,
        limit: usize,
        rubric_version: u32,
    ) -> anyhow::Result<Vec<ArgumentRow>> {
        store.pending_evaluations(limit, rubric_version)
    }
}
