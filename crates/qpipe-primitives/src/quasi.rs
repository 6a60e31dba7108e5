//! Quasi-probability distributions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use qpipe_hal::Counts;

/// Estimated probability per observed bitstring.
///
/// Keys are written with classical bit 0 rightmost, like [`Counts`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuasiDistribution {
    probabilities: BTreeMap<String, f64>,
    shots: u32,
}

impl QuasiDistribution {
    /// Observed count divided by the requested shot count.
    pub fn from_counts(counts: &Counts, shots: u32) -> Self {
        let total = f64::from(shots.max(1));
        let probabilities = counts
            .iter()
            .map(|(bits, &n)| (bits.clone(), n as f64 / total))
            .collect();
        Self {
            probabilities,
            shots,
        }
    }

    /// Probability of `bitstring`, zero if never observed.
    pub fn get(&self, bitstring: &str) -> f64 {
        self.probabilities.get(bitstring).copied().unwrap_or(0.0)
    }

    /// Probability of the outcome whose integer encoding is `key`.
    pub fn get_int(&self, key: u64) -> f64 {
        self.probabilities
            .iter()
            .find(|(bits, _)| u64::from_str_radix(bits, 2).ok() == Some(key))
            .map_or(0.0, |(_, &p)| p)
    }

    /// Outcomes in bitstring order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.probabilities.iter().map(|(k, &v)| (k.as_str(), v))
    }

    /// The distribution keyed by integer encoding, bit `i` being clbit `i`.
    ///
    /// `None` if any bitstring is wider than 64 bits.
    pub fn int_probabilities(&self) -> Option<BTreeMap<u64, f64>> {
        self.probabilities
            .iter()
            .map(|(bits, &p)| {
                if bits.len() > 64 {
                    return None;
                }
                let key = if bits.is_empty() {
                    0
                } else {
                    u64::from_str_radix(bits, 2).ok()?
                };
                Some((key, p))
            })
            .collect()
    }

    /// The bitstring-keyed map.
    pub fn binary_probabilities(&self) -> &BTreeMap<String, f64> {
        &self.probabilities
    }

    /// Shots the estimate is based on.
    pub fn shots(&self) -> u32 {
        self.shots
    }

    /// Number of distinct outcomes.
    pub fn len(&self) -> usize {
        self.probabilities.len()
    }

    /// True if nothing was observed.
    pub fn is_empty(&self) -> bool {
        self.probabilities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_counts() {
        let counts = Counts::from_pairs([("00", 512), ("11", 512)]);
        let dist = QuasiDistribution::from_counts(&counts, 1024);
        assert_eq!(dist.get("00"), 0.5);
        assert_eq!(dist.get("11"), 0.5);
        assert_eq!(dist.get("01"), 0.0);
        assert_eq!(dist.shots(), 1024);
    }

    #[test]
    fn test_int_keys() {
        let counts = Counts::from_pairs([("10", 1), ("01", 3)]);
        let dist = QuasiDistribution::from_counts(&counts, 4);
        let ints = dist.int_probabilities().unwrap();
        assert_eq!(ints[&1], 0.75);
        assert_eq!(ints[&2], 0.25);
        assert_eq!(dist.get_int(2), 0.25);
    }

    #[test]
    fn test_wide_bitstrings_have_no_int_view() {
        let counts = Counts::from_pairs([("1".repeat(65), 1)]);
        assert!(QuasiDistribution::from_counts(&counts, 1).int_probabilities().is_none());
    }
}
