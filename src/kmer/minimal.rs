//! Minimal canonical encoding of nucleotide k-mers
//!
//! Maps every canonical DNA k-mer to a dense index in `[0, number_of_canonical_kmers(k))`
//! such that a k-mer and its reverse complement share the same index, following
//! Wittler, R. (2023) "General Encoding of Canonical k-Mers", Peer Community Journal 3 (e87).
//! The index can address a flat table with no slots wasted on non-canonical k-mers.

use super::Kmer;
use crate::error::{KmerError, Result};

const ALL_ONES: u64 = u64::MAX;

/// Largest k supported by the single-word encoding
pub const MAX_MINIMAL_K: usize = 32;

/// Replacement bits for the first differing symbol pair, indexed by the 4-bit pattern of the
/// outermost differing symbols
const REPLACE: [u64; 16] = [
    0x06, 0x05, 0x04, 0x00, 0x08, 0x07, 0x00, 0x04, 0x09, 0x00, 0x07, 0x05, 0x00, 0x09, 0x08, 0x06,
];

/// Whether to encode the reverse complement instead of the forward k-mer for a pattern
const USE_REVERSE: [bool; 16] = [
    false, false, false, false, false, false, false, true, false, false, true, true, false, true,
    true, true,
];

/// Number of canonical DNA k-mers for `1 <= k <= 32`
///
/// Odd `k` has no palindromes, so exactly half of all k-mers are canonical. Even `k` adds
/// half of the `4^(k/2)` palindromes on top.
#[must_use]
pub fn number_of_canonical_kmers(k: usize) -> Option<u64> {
    if k == 0 || k > MAX_MINIMAL_K {
        return None;
    }
    let half = 1u64 << (2 * k - 1);
    if k % 2 == 1 {
        Some(half)
    } else {
        Some(half + (1u64 << (k - 1)))
    }
}

/// Number of DNA k-mers that equal their own reverse complement
#[must_use]
pub fn number_of_palindromes(k: usize) -> Option<u64> {
    if k == 0 || k > MAX_MINIMAL_K {
        return None;
    }
    if k % 2 == 1 {
        Some(0)
    } else {
        Some(1u64 << k)
    }
}

/// Reverse complement of a 2-bit packed DNA k-mer held in the low `2k` bits of a word
///
/// Works for any alphabet where the complement of code `c` is `3 - c`. Callers guarantee
/// `1 <= k <= 32`.
#[inline]
#[must_use]
pub(crate) fn reverse_complement_u64(value: u64, k: usize) -> u64 {
    debug_assert!((1..=MAX_MINIMAL_K).contains(&k), "k = {k} does not fit a word");
    // reverse the order of the 2-bit groups
    let mut x = value;
    x = ((x >> 2) & 0x3333_3333_3333_3333) | ((x & 0x3333_3333_3333_3333) << 2);
    x = ((x >> 4) & 0x0F0F_0F0F_0F0F_0F0F) | ((x & 0x0F0F_0F0F_0F0F_0F0F) << 4);
    x = x.swap_bytes();
    // complement and move back into the low bits
    (!x) >> (64 - 2 * k)
}

/// Dense index over the canonical DNA k-mers of a fixed `k`
#[derive(Debug, Clone)]
pub struct MinimalCanonicalEncoding {
    k: usize,
    remainder_mask: [u64; MAX_MINIMAL_K + 4],
    four_to_the_k_half_plus_one: u64,
    twice_four_to_the_k_half: u64,
}

impl MinimalCanonicalEncoding {
    /// Prepares the encoding tables for `k`
    ///
    /// # Errors
    ///
    /// Fails with [`KmerError::InvalidK`] unless `1 <= k <= 32`.
    pub fn new(k: usize) -> Result<Self> {
        if k == 0 || k > MAX_MINIMAL_K {
            return Err(KmerError::InvalidK {
                k,
                bits_per_symbol: 2,
                max_bits: 64,
            }
            .into());
        }

        let mut remainder_mask = [0u64; MAX_MINIMAL_K + 4];
        remainder_mask[0] = ALL_ONES;
        for (i, mask) in remainder_mask.iter_mut().enumerate().take(k + 1).skip(1) {
            let zeromask = ALL_ONES >> (64 - 2 * k + i);
            let onemask = ALL_ONES << i;
            *mask = zeromask & onemask;
        }

        Ok(Self {
            k,
            remainder_mask,
            four_to_the_k_half_plus_one: 4u64.pow((k / 2 + 1) as u32),
            twice_four_to_the_k_half: 2 * 4u64.pow((k / 2) as u32),
        })
    }

    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Size of the index space
    #[must_use]
    pub fn len(&self) -> u64 {
        number_of_canonical_kmers(self.k).unwrap_or_default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the index of a k-mer, identical for the k-mer and its reverse complement
    ///
    /// # Errors
    ///
    /// Fails with [`KmerError::RequiresNucleotides`] if the alphabet is not a 4-symbol
    /// alphabet with complement `3 - c`, and with [`KmerError::LengthMismatch`] if the k-mer
    /// length differs from this encoding's `k`.
    pub fn encode(&self, kmer: &Kmer<'_>) -> Result<u64> {
        if !kmer.alphabet().negation_is_complement() {
            return Err(KmerError::RequiresNucleotides.into());
        }
        if kmer.k() != self.k {
            return Err(KmerError::LengthMismatch {
                expected: self.k,
                got: kmer.k(),
            }
            .into());
        }
        let value = kmer.as_u64()?;
        Ok(self.encode_value(value, reverse_complement_u64(value, self.k)))
    }

    /// Encodes a packed value given together with its packed reverse complement
    #[must_use]
    pub fn encode_value(&self, value: u64, rev_comp: u64) -> u64 {
        let k = self.k as i64;

        // index of the outermost pair of symbols that differs between value and rev_comp
        let sym = value ^ rev_comp;
        let l: i64 = if sym == 0 {
            64
        } else {
            i64::from(sym.trailing_zeros() / 2 * 2)
        };

        let mut hash = if l < k - 1 {
            let upper = ((value >> (2 * k - l - 4)) & 0x0C) as usize;
            let lower = ((value >> l) & 0x03) as usize;
            let pattern = upper | lower;

            let mut hash = if USE_REVERSE[pattern] {
                self.encode_prime(rev_comp, l)
            } else {
                self.encode_prime(value, l)
            };
            hash |= REPLACE[pattern] << (2 * k - l - 4);
            hash
        } else if l == k - 1 {
            // odd k with only the central symbol differing
            let hash = self.encode_prime(value, l);
            let bit1 = (value & (1u64 << k)) >> 1;
            let bit2 = value & (1u64 << (k - 1));
            hash | (bit1 ^ bit2)
        } else {
            // palindrome
            self.encode_prime(value, k)
        };

        if l <= k - 4 {
            let shift = 2 * (k / 2 - l / 2 - 1);
            let mut gaps = if shift == 0 {
                ALL_ONES
            } else {
                ALL_ONES >> (64 - shift)
            };
            gaps <<= 2 * ((k + 1) / 2) - 1;
            hash = hash.wrapping_sub(gaps);
        }

        if k % 2 == 1 && hash >= self.four_to_the_k_half_plus_one {
            hash -= self.twice_four_to_the_k_half;
        }
        hash
    }

    #[inline]
    fn encode_prime(&self, value: u64, l: i64) -> u64 {
        let zeromask = if l == 0 { 0 } else { ALL_ONES >> (64 - l) };
        let right = (value & zeromask) ^ zeromask;
        let remainder = (value & self.remainder_mask[(l + 2) as usize]) >> 2;
        right | remainder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::Alphabet;
    use crate::Error;

    #[test]
    fn test_counts() {
        assert_eq!(number_of_canonical_kmers(1), Some(2));
        assert_eq!(number_of_canonical_kmers(2), Some(10));
        assert_eq!(number_of_canonical_kmers(3), Some(32));
        assert_eq!(number_of_canonical_kmers(32), Some(9_223_372_039_002_259_456));
        assert_eq!(number_of_canonical_kmers(33), None);
        assert_eq!(number_of_palindromes(2), Some(4));
        assert_eq!(number_of_palindromes(3), Some(0));
        assert_eq!(number_of_palindromes(32), Some(1 << 32));
    }

    #[test]
    fn test_reverse_complement_word() {
        let dna = Alphabet::dna();
        for (seq, k) in [("ACG", 3), ("AACGTG", 6), ("T", 1)] {
            let kmer = Kmer::from_string(dna, seq).unwrap();
            let rc = kmer.reverse_complement().unwrap();
            assert_eq!(
                reverse_complement_u64(kmer.as_u64().unwrap(), k),
                rc.as_u64().unwrap()
            );
        }
        let all_a = Kmer::from_bytes(dna, &[b'A'; 32]).unwrap();
        assert_eq!(reverse_complement_u64(all_a.as_u64().unwrap(), 32), u64::MAX);
    }

    /// Every k-mer maps into `[0, N)`, both orientations share an index, and every index is hit
    /// by exactly one canonical pair (palindromes once, in the first slots)
    fn check_bijection(k: usize) {
        let dna = Alphabet::dna();
        let encoder = MinimalCanonicalEncoding::new(k).unwrap();
        let total = number_of_canonical_kmers(k).unwrap();
        let palindromes = number_of_palindromes(k).unwrap();
        let mut counts = vec![0u32; total as usize];

        for value in 0..4u64.pow(k as u32) {
            let kmer = Kmer::from_u64(dna, k, value).unwrap();
            let rc = kmer.reverse_complement().unwrap();
            let index = encoder.encode(&kmer).unwrap();
            assert_eq!(index, encoder.encode(&rc).unwrap(), "k={k} {kmer}");
            assert!(index < total, "k={k} {kmer} -> {index}");
            counts[index as usize] += 1;

            if kmer == rc {
                assert!(index < palindromes, "k={k} palindrome {kmer} -> {index}");
            }
        }

        for (index, &count) in counts.iter().enumerate() {
            let expected = if (index as u64) < palindromes { 1 } else { 2 };
            assert_eq!(count, expected, "k={k} index {index}");
        }
    }

    #[test]
    fn test_bijection_small_k() {
        for k in 1..=8 {
            check_bijection(k);
        }
    }

    #[test]
    fn test_large_k_in_range() {
        let dna = Alphabet::dna();
        let encoder = MinimalCanonicalEncoding::new(32).unwrap();
        for seq in [
            "ACGTACGTACGTACGTACGTACGTACGTACGT",
            "TTTTTTTTTTTTTTTTTTTTTTTTTTTTTTTT",
            "GATTACAGATTACAGATTACAGATTACAGATT",
        ] {
            let kmer = Kmer::from_string(dna, seq).unwrap();
            let rc = kmer.reverse_complement().unwrap();
            let index = encoder.encode(&kmer).unwrap();
            assert!(index < encoder.len());
            assert_eq!(index, encoder.encode(&rc).unwrap());
        }
    }

    #[test]
    fn test_rejects_invalid_input() {
        assert!(MinimalCanonicalEncoding::new(0).is_err());
        assert!(MinimalCanonicalEncoding::new(33).is_err());

        let encoder = MinimalCanonicalEncoding::new(3).unwrap();
        let kmer = Kmer::from_string(Alphabet::dna(), "ACGT").unwrap();
        assert!(matches!(
            encoder.encode(&kmer),
            Err(Error::KmerError(KmerError::LengthMismatch { expected: 3, got: 4 }))
        ));
        let kmer = Kmer::from_string(Alphabet::dna_iupac(), "ACG").unwrap();
        assert!(matches!(
            encoder.encode(&kmer),
            Err(Error::KmerError(KmerError::RequiresNucleotides))
        ));
    }
}
