//! Open-addressing set of fine-face ids.
//!
//! [`FaceSet`] is the duplicate filter behind the coarse block adjacency:
//! every coarse connection records which fine faces constitute it, and the
//! same fine face may be offered many times while the connection graph is
//! built. The table stores non-negative keys with a distinguished empty
//! sentinel, hashes by the multiplication method (golden-ratio fraction),
//! probes by double hashing with an odd stride, and doubles in size when a
//! probe cycle fails. There is no deletion.
//!
//! # Invariants
//!
//! - Capacity is a power of two, at least 1; it never shrinks.
//! - A bounded probe visits every slot exactly once before reporting the
//!   table full (odd stride, power-of-two capacity).

use serde::{Deserialize, Serialize};

/// `(√5 − 1) / 2`, the multiplier of the multiplication hashing method.
const GOLDEN_RATIO: f64 = 0.618_033_988_749_894_9;

const EMPTY: i64 = -1;

/// Growable open-addressing set of `u32` keys.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FaceSet {
    table: Vec<i64>,
    len: usize,
}

enum Probe {
    /// Key newly written at this slot.
    Inserted,
    /// Key was already present.
    Present,
    /// Probe cycle exhausted; table must grow.
    Full,
}

/// Slot of `key` in a table of `m` slots (multiplication method).
///
/// `m` need not be a power of two here; the double-hash stride derives from
/// a table size of `2m − 1`.
fn hash_index(key: u32, m: usize) -> usize {
    let frac = (key as f64 * GOLDEN_RATIO).fract();
    (((m as f64) * frac) as usize).min(m - 1)
}

fn probe_insert(key: u32, table: &mut [i64]) -> Probe {
    let m = table.len();
    debug_assert!(m.is_power_of_two());

    let mut j = hash_index(key, m);
    if table[j] == EMPTY {
        table[j] = key as i64;
        return Probe::Inserted;
    }
    if table[j] == key as i64 {
        return Probe::Present;
    }

    // Odd stride, hence relatively prime to the power-of-two capacity: the
    // probe sequence is a full cycle of length m.
    let stride = 2 * hash_index(key, 2 * m - 1) + 1;
    for _ in 1..m {
        j = (j + stride) & (m - 1);
        if table[j] == EMPTY {
            table[j] = key as i64;
            return Probe::Inserted;
        }
        if table[j] == key as i64 {
            return Probe::Present;
        }
    }
    Probe::Full
}

impl FaceSet {
    /// Empty set sized to the next power of two ≥ `capacity_hint` (min 1).
    pub fn with_capacity(capacity_hint: usize) -> Self {
        let m = capacity_hint.next_power_of_two().max(1);
        Self {
            table: vec![EMPTY; m],
            len: 0,
        }
    }

    /// Number of distinct keys stored.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the set holds no keys.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current table capacity (always a power of two).
    #[inline]
    pub fn capacity(&self) -> usize {
        self.table.len()
    }

    /// Insert `key`; a no-op if already present.
    ///
    /// On a full probe cycle the table doubles, rehashes, and the insert is
    /// retried; insertion therefore always succeeds.
    pub fn insert(&mut self, key: u32) {
        loop {
            match probe_insert(key, &mut self.table) {
                Probe::Inserted => {
                    self.len += 1;
                    return;
                }
                Probe::Present => return,
                Probe::Full => self.grow(),
            }
        }
    }

    /// Membership test via the same bounded probe as insertion.
    pub fn contains(&self, key: u32) -> bool {
        let m = self.table.len();
        let mut j = hash_index(key, m);
        if self.table[j] == key as i64 {
            return true;
        }
        if self.table[j] == EMPTY {
            return false;
        }
        let stride = 2 * hash_index(key, 2 * m - 1) + 1;
        for _ in 1..m {
            j = (j + stride) & (m - 1);
            if self.table[j] == key as i64 {
                return true;
            }
            if self.table[j] == EMPTY {
                return false;
            }
        }
        false
    }

    /// Stored keys in table order (unspecified but deterministic).
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.table
            .iter()
            .filter(|&&s| s != EMPTY)
            .map(|&s| s as u32)
    }

    /// Stored keys in ascending order.
    pub fn sorted(&self) -> Vec<u32> {
        let mut keys: Vec<u32> = self.iter().collect();
        keys.sort_unstable();
        keys
    }

    fn grow(&mut self) {
        let mut table = vec![EMPTY; self.table.len() * 2];
        for &s in &self.table {
            if s != EMPTY {
                match probe_insert(s as u32, &mut table) {
                    Probe::Inserted => {}
                    // A fresh table twice the size holds every old key.
                    Probe::Present | Probe::Full => unreachable!("rehash of distinct keys"),
                }
            }
        }
        self.table = table;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn capacity_rounds_up_to_power_of_two() {
        assert_eq!(FaceSet::with_capacity(0).capacity(), 1);
        assert_eq!(FaceSet::with_capacity(1).capacity(), 1);
        assert_eq!(FaceSet::with_capacity(3).capacity(), 4);
        assert_eq!(FaceSet::with_capacity(8).capacity(), 8);
        assert_eq!(FaceSet::with_capacity(9).capacity(), 16);
    }

    #[test]
    fn duplicate_inserts_are_idempotent() {
        let mut s = FaceSet::with_capacity(2);
        for _ in 0..10 {
            s.insert(42);
        }
        assert_eq!(s.len(), 1);
        assert!(s.contains(42));
        assert!(!s.contains(7));
    }

    #[test]
    fn grows_past_initial_capacity() {
        let mut s = FaceSet::with_capacity(1);
        for k in 0..100 {
            s.insert(k);
        }
        assert_eq!(s.len(), 100);
        assert!(s.capacity().is_power_of_two());
        assert!(s.capacity() >= 100);
        for k in 0..100 {
            assert!(s.contains(k));
        }
        assert_eq!(s.sorted(), (0..100).collect::<Vec<_>>());
    }

    proptest! {
        #[test]
        fn membership_and_capacity(keys in proptest::collection::vec(0u32..10_000, 0..256),
                                   hint in 0usize..64) {
            let mut s = FaceSet::with_capacity(hint);
            for &k in &keys {
                s.insert(k);
            }
            let mut distinct = keys.clone();
            distinct.sort_unstable();
            distinct.dedup();
            prop_assert_eq!(s.len(), distinct.len());
            prop_assert!(s.capacity().is_power_of_two());
            prop_assert!(s.capacity() >= distinct.len());
            for &k in &distinct {
                prop_assert!(s.contains(k));
            }
            prop_assert_eq!(s.sorted(), distinct);
        }
    }
}
