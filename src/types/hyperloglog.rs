//! HyperLogLog cardinality estimator (spec §4.3), encoded into a string
//! value the same way a real bitmap is: the HLL "object" is just bytes
//! that PFADD/PFCOUNT/PFMERGE know how to interpret.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use bytes::Bytes;

const MAGIC: &[u8; 4] = b"HYLL";
const DEFAULT_P: u8 = 12; // 4096 registers, per spec §4.3 example.

#[derive(Debug, Clone)]
pub struct HyperLogLog {
    p: u8,
    registers: Vec<u8>,
}

impl HyperLogLog {
    pub fn new() -> Self {
        Self::with_precision(DEFAULT_P)
    }

    pub fn with_precision(p: u8) -> Self {
        HyperLogLog {
            p,
            registers: vec![0u8; 1usize << p],
        }
    }

    pub fn registers_len(&self) -> usize {
        self.registers.len()
    }

    /// Parses the on-disk/on-wire encoding: `HYLL` + precision byte +
    /// one byte per register. Returns `None` for anything else (the
    /// caller treats that as "not an HLL", i.e. a type error for a
    /// plain string reused for PFADD).
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 5 || &data[0..4] != MAGIC {
            return None;
        }
        let p = data[4];
        let expected_len = 5 + (1usize << p);
        if data.len() != expected_len {
            return None;
        }
        Some(HyperLogLog {
            p,
            registers: data[5..].to_vec(),
        })
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut out = Vec::with_capacity(5 + self.registers.len());
        out.extend_from_slice(MAGIC);
        out.push(self.p);
        out.extend_from_slice(&self.registers);
        Bytes::from(out)
    }

    /// Hashes `element`, splits the hash into a register index (low `p`
    /// bits) and a rank (position of the leading 1 in the remaining
    /// bits, plus 1), and updates the register if the new rank is
    /// higher. Returns `true` iff the structure changed.
    pub fn add(&mut self, element: &[u8]) -> bool {
        let hash = hash64(element);
        let m = self.registers.len() as u64;
        let index = (hash & (m - 1)) as usize;
        let remaining = hash >> self.p;
        // +1 so an all-zero remainder (rank "infinite") is representable
        // and ranks start at 1, matching the classic HLL definition.
        let rank = (remaining.leading_zeros() - self.p as u32 + 1) as u8;
        if rank > self.registers[index] {
            self.registers[index] = rank;
            true
        } else {
            false
        }
    }

    /// Bias-corrected harmonic-mean cardinality estimate, falling back
    /// to linear counting when many registers are still zero (spec
    /// §4.3).
    pub fn count(&self) -> u64 {
        estimate(&self.registers)
    }

    /// PFMERGE: elementwise max of another HLL's registers into this
    /// one. Precisions must match; mismatched precision is a no-op
    /// (the command layer rejects that case before calling this).
    pub fn merge_max(&mut self, other: &HyperLogLog) {
        if self.p != other.p {
            return;
        }
        for (a, b) in self.registers.iter_mut().zip(other.registers.iter()) {
            if *b > *a {
                *a = *b;
            }
        }
    }

    /// PFCOUNT over multiple keys: estimate the union's cardinality
    /// without materializing a merged key (spec §4.3).
    pub fn count_union(hlls: &[&HyperLogLog]) -> u64 {
        let Some(first) = hlls.first() else {
            return 0;
        };
        let mut merged = vec![0u8; first.registers.len()];
        for hll in hlls {
            for (m, r) in merged.iter_mut().zip(hll.registers.iter()) {
                if *r > *m {
                    *m = *r;
                }
            }
        }
        estimate(&merged)
    }
}

impl Default for HyperLogLog {
    fn default() -> Self {
        Self::new()
    }
}

fn hash64(data: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    data.hash(&mut hasher);
    hasher.finish()
}

fn alpha(m: usize) -> f64 {
    match m {
        16 => 0.673,
        32 => 0.697,
        64 => 0.709,
        _ => 0.7213 / (1.0 + 1.079 / m as f64),
    }
}

fn estimate(registers: &[u8]) -> u64 {
    let m = registers.len() as f64;
    let sum: f64 = registers.iter().map(|&r| 2f64.powi(-(r as i32))).sum();
    let raw_estimate = alpha(registers.len()) * m * m / sum;

    let zeros = registers.iter().filter(|&&r| r == 0).count();
    if raw_estimate <= 2.5 * m && zeros > 0 {
        (m * (m / zeros as f64).ln()).round() as u64
    } else {
        raw_estimate.round() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_through_bytes() {
        let mut hll = HyperLogLog::new();
        hll.add(b"a");
        hll.add(b"b");
        let bytes = hll.to_bytes();
        let restored = HyperLogLog::from_bytes(&bytes).unwrap();
        assert_eq!(restored.count(), hll.count());
    }

    #[test]
    fn from_bytes_rejects_non_hll_strings() {
        assert!(HyperLogLog::from_bytes(b"just a string").is_none());
    }

    #[test]
    fn add_returns_false_when_unchanged() {
        let mut hll = HyperLogLog::new();
        assert!(hll.add(b"x"));
        // Re-adding the same element can change a register only via a
        // fresh higher rank observation, which is deterministic here.
        let changed_again = hll.add(b"x");
        assert!(!changed_again);
    }

    #[test]
    fn cardinality_is_within_tolerance_for_known_set() {
        let mut hll = HyperLogLog::new();
        let n = 10_000;
        for i in 0..n {
            hll.add(format!("element-{i}").as_bytes());
        }
        let estimate = hll.count() as f64;
        let error = (estimate - n as f64).abs() / n as f64;
        assert!(error < 0.05, "estimate {estimate} too far from {n}");
    }

    #[test]
    fn merge_max_is_equivalent_to_count_union() {
        let mut a = HyperLogLog::new();
        let mut b = HyperLogLog::new();
        for i in 0..500 {
            a.add(format!("a-{i}").as_bytes());
        }
        for i in 0..500 {
            b.add(format!("b-{i}").as_bytes());
        }
        let union_count = HyperLogLog::count_union(&[&a, &b]);
        let mut merged = a.clone();
        merged.merge_max(&b);
        assert_eq!(merged.count(), union_count);
    }
}
