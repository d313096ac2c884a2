//! Fixed-width bit strings for culture tags, disease strains, and immunity.
//!
//! The algorithms are spelled out over a plain `Vec<bool>` rather than a
//! packed bit vector: the contiguous-subsequence test and the closest-window
//! search are the point of the disease model, so they stay explicit.
//!
//! On the wire a [`BitString`] is a string of `0` and `1` characters.

use core::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::enums::Tribe;

/// A fixed-length vector of bits.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct BitString {
    bits: Vec<bool>,
}

/// Error returned when parsing a [`BitString`] from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseBitStringError {
    /// The offending character.
    pub found: char,
    /// Character offset of the offending character.
    pub position: usize,
}

impl core::fmt::Display for ParseBitStringError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "invalid bit {:?} at position {} (expected '0' or '1')",
            self.found, self.position
        )
    }
}

impl std::error::Error for ParseBitStringError {}

impl BitString {
    /// Wrap an explicit bit vector.
    pub const fn new(bits: Vec<bool>) -> Self {
        Self { bits }
    }

    /// A bit string of `len` zero bits.
    pub fn zeros(len: usize) -> Self {
        Self {
            bits: vec![false; len],
        }
    }

    /// A bit string of `len` uniformly random bits.
    pub fn random(len: usize, rng: &mut impl Rng) -> Self {
        Self {
            bits: (0..len).map(|_| rng.random::<bool>()).collect(),
        }
    }

    /// Number of bits.
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    /// Whether the string has no bits at all.
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// The bit at `index`, or `None` when out of range.
    pub fn get(&self, index: usize) -> Option<bool> {
        self.bits.get(index).copied()
    }

    /// Set the bit at `index`. Returns `false` when out of range.
    pub fn set(&mut self, index: usize, value: bool) -> bool {
        self.bits.get_mut(index).is_some_and(|bit| {
            *bit = value;
            true
        })
    }

    /// Invert the bit at `index`. Returns `false` when out of range.
    pub fn flip(&mut self, index: usize) -> bool {
        self.bits.get_mut(index).is_some_and(|bit| {
            *bit = !*bit;
            true
        })
    }

    /// Borrow the underlying bits.
    pub fn as_slice(&self) -> &[bool] {
        &self.bits
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> usize {
        self.bits.iter().filter(|bit| **bit).count()
    }

    /// Derive the tribe by majority vote.
    ///
    /// Red only on a strict majority of set bits. An exact split (possible
    /// for even lengths) and the empty string both resolve to blue.
    pub fn tribe(&self) -> Tribe {
        let ones = self.count_ones();
        let zeros = self.len().saturating_sub(ones);
        if ones > zeros { Tribe::Red } else { Tribe::Blue }
    }

    /// Offset of the first occurrence of `pattern` as a contiguous run.
    ///
    /// The empty pattern occurs at offset 0 of every string.
    pub fn find_subsequence(&self, pattern: &Self) -> Option<usize> {
        if pattern.is_empty() {
            return Some(0);
        }
        self.bits
            .windows(pattern.len())
            .position(|window| window == pattern.bits.as_slice())
    }

    /// Whether `pattern` occurs as a contiguous run inside `self`.
    pub fn contains_subsequence(&self, pattern: &Self) -> bool {
        self.find_subsequence(pattern).is_some()
    }

    /// Hamming distance between `pattern` and the window of `self` starting
    /// at `offset`. `None` if the window does not fit.
    pub fn distance_at(&self, pattern: &Self, offset: usize) -> Option<usize> {
        let end = offset.checked_add(pattern.len())?;
        let window = self.bits.get(offset..end)?;
        Some(
            window
                .iter()
                .zip(&pattern.bits)
                .filter(|(a, b)| a != b)
                .count(),
        )
    }

    /// All window offsets whose Hamming distance to `pattern` is minimal,
    /// together with that distance. Empty when `pattern` is longer than
    /// `self` or empty.
    pub fn closest_windows(&self, pattern: &Self) -> (usize, Vec<usize>) {
        if pattern.is_empty() || pattern.len() > self.len() {
            return (0, Vec::new());
        }
        let distances: Vec<(usize, usize)> = self
            .bits
            .windows(pattern.len())
            .enumerate()
            .map(|(offset, window)| {
                let d = window
                    .iter()
                    .zip(&pattern.bits)
                    .filter(|(a, b)| a != b)
                    .count();
                (offset, d)
            })
            .collect();
        let best = distances.iter().map(|(_, d)| *d).min().unwrap_or(0);
        let offsets = distances
            .into_iter()
            .filter(|(_, d)| *d == best)
            .map(|(offset, _)| offset)
            .collect();
        (best, offsets)
    }

    /// Absolute indices (into `self`) where the window at `offset` differs
    /// from `pattern`.
    pub fn mismatches_at(&self, pattern: &Self, offset: usize) -> Vec<usize> {
        let Some(end) = offset.checked_add(pattern.len()) else {
            return Vec::new();
        };
        let Some(window) = self.bits.get(offset..end) else {
            return Vec::new();
        };
        window
            .iter()
            .zip(&pattern.bits)
            .enumerate()
            .filter(|(_, (a, b))| a != b)
            .filter_map(|(i, _)| offset.checked_add(i))
            .collect()
    }

    /// Build a child string choosing each bit uniformly from one of two
    /// parents. Lengths follow the shorter parent.
    pub fn crossover(a: &Self, b: &Self, rng: &mut impl Rng) -> Self {
        Self {
            bits: a
                .bits
                .iter()
                .zip(&b.bits)
                .map(|(x, y)| if rng.random::<bool>() { *x } else { *y })
                .collect(),
        }
    }
}

impl core::fmt::Display for BitString {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for bit in &self.bits {
            f.write_str(if *bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl FromStr for BitString {
    type Err = ParseBitStringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.chars()
            .enumerate()
            .map(|(position, c)| match c {
                '0' => Ok(false),
                '1' => Ok(true),
                found => Err(ParseBitStringError { found, position }),
            })
            .collect::<Result<Vec<bool>, _>>()
            .map(Self::new)
    }
}

impl Serialize for BitString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BitString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    fn bits(s: &str) -> BitString {
        s.parse().unwrap()
    }

    #[test]
    fn subsequence_found_at_offset() {
        let immunity = bits("0011010110");
        assert_eq!(immunity.find_subsequence(&bits("1011")), Some(5));
        assert!(immunity.contains_subsequence(&bits("0011")));
        assert!(!immunity.contains_subsequence(&bits("1111")));
    }

    #[test]
    fn pattern_longer_than_string_never_matches() {
        assert!(!bits("01").contains_subsequence(&bits("010")));
    }

    #[test]
    fn empty_pattern_always_matches() {
        assert_eq!(bits("101").find_subsequence(&BitString::default()), Some(0));
    }

    #[test]
    fn tribe_requires_strict_majority() {
        assert_eq!(bits("110").tribe(), Tribe::Red);
        assert_eq!(bits("100").tribe(), Tribe::Blue);
        assert_eq!(bits("1100").tribe(), Tribe::Blue);
        assert_eq!(BitString::default().tribe(), Tribe::Blue);
    }

    #[test]
    fn flip_and_set_respect_bounds() {
        let mut b = bits("000");
        assert!(b.flip(1));
        assert!(b.set(2, true));
        assert!(!b.flip(3));
        assert_eq!(b.to_string(), "011");
    }

    #[test]
    fn closest_windows_reports_minimum_distance() {
        let immunity = bits("000111");
        let (distance, offsets) = immunity.closest_windows(&bits("011"));
        assert_eq!(distance, 0);
        assert_eq!(offsets, vec![2]);

        let (distance, offsets) = bits("0000").closest_windows(&bits("11"));
        assert_eq!(distance, 2);
        assert_eq!(offsets, vec![0, 1, 2]);
    }

    #[test]
    fn mismatches_are_absolute_indices() {
        let immunity = bits("000000");
        assert_eq!(immunity.mismatches_at(&bits("101"), 2), vec![2, 4]);
        assert!(immunity.mismatches_at(&bits("101"), 5).is_empty());
    }

    #[test]
    fn parse_rejects_non_binary_characters() {
        let err = "01x".parse::<BitString>().unwrap_err();
        assert_eq!(err.position, 2);
        assert_eq!(err.found, 'x');
    }

    #[test]
    fn serde_uses_compact_string_form() {
        let b = bits("1010");
        let json = serde_json::to_string(&b).unwrap();
        assert_eq!(json, "\"1010\"");
        let back: BitString = serde_json::from_str(&json).unwrap();
        assert_eq!(back, b);
    }

    #[test]
    fn crossover_takes_each_bit_from_a_parent() {
        let mut rng = SmallRng::seed_from_u64(7);
        let a = bits("1111");
        let b = bits("0000");
        let child = BitString::crossover(&a, &b, &mut rng);
        assert_eq!(child.len(), 4);

        let same = BitString::crossover(&a, &a, &mut rng);
        assert_eq!(same, a);
    }
}
