//! Enumeration of k-mers within a small substitution distance
//!
//! [`MicrovariantScanner`] lists the original k-mer (optionally) followed by every k-mer that
//! differs from it in `1..=max_substitutions` positions. Within one distance the positions are
//! visited in ascending tuple order and the replacement codes in ascending order, so with a
//! budget of one the sequence is position-major, then code-ascending. Insertions and deletions
//! are never produced.

use crate::alphabet::Alphabet;
use crate::error::{ConfigError, KmerError, Result};
use crate::extractor::KmerExtractor;
use crate::kmer::{CanonicalRace, Kmer};

/// A k-mer derived from an original by substitution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Microvariant<'a> {
    /// The variant, canonicalized if requested
    pub kmer: Kmer<'a>,
    /// Whether `kmer` is in the orientation of the substituted window
    pub is_forward: bool,
    /// Number of substituted positions, `0` for the original
    pub substitutions: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Original,
    Start(usize),
    Emit(usize),
    Done,
}

/// Lazy enumeration of the substitution neighbourhood of one k-mer
#[derive(Debug, Clone)]
pub struct MicrovariantScanner<'a> {
    original: Kmer<'a>,
    complement: Option<&'a [u8]>,
    max_substitutions: usize,
    include_original: bool,

    /// Ascending substituted positions of the current distance
    positions: Vec<usize>,
    /// Index into the `size - 1` alternative codes for each position
    alternatives: Vec<u8>,
    phase: Phase,
}

impl<'a> MicrovariantScanner<'a> {
    /// Creates a scanner with a budget of up to `max_substitutions` substituted positions
    ///
    /// # Errors
    ///
    /// Fails with [`ConfigError::SubstitutionBudgetTooLarge`] if the budget exceeds `k`, and
    /// with `NoComplementDefined` if canonical variants are requested for an alphabet without
    /// complement.
    pub fn new(original: Kmer<'a>, max_substitutions: usize, canonicalize: bool) -> Result<Self> {
        if max_substitutions > original.k() {
            return Err(ConfigError::SubstitutionBudgetTooLarge {
                budget: max_substitutions,
                k: original.k(),
            }
            .into());
        }
        let complement = if canonicalize {
            Some(
                original
                    .alphabet()
                    .complement_table()
                    .ok_or(KmerError::NoComplementDefined)?,
            )
        } else {
            None
        };
        Ok(Self::with_table(original, max_substitutions, complement))
    }

    /// Creates a scanner from an already validated budget and complement table
    pub(crate) fn with_table(
        original: Kmer<'a>,
        max_substitutions: usize,
        complement: Option<&'a [u8]>,
    ) -> Self {
        Self {
            original,
            complement,
            max_substitutions: max_substitutions.min(original.k()),
            include_original: true,
            positions: Vec::with_capacity(max_substitutions),
            alternatives: Vec::with_capacity(max_substitutions),
            phase: Phase::Original,
        }
    }

    /// Sets whether the unmodified k-mer is yielded first
    #[must_use]
    pub fn include_original(mut self, include: bool) -> Self {
        self.include_original = include;
        self
    }

    #[must_use]
    pub fn original(&self) -> &Kmer<'a> {
        &self.original
    }

    /// Number of variants at exactly `distance` substitutions
    #[must_use]
    pub fn variants_at_distance(&self, distance: usize) -> u64 {
        let k = self.original.k();
        if distance > k {
            return 0;
        }
        let alternatives = (self.original.alphabet().size() - 1) as u64;
        binomial(k, distance).saturating_mul(alternatives.saturating_pow(distance as u32))
    }

    fn alternatives_per_position(&self) -> u8 {
        (self.original.alphabet().size() - 1) as u8
    }

    fn build(&self) -> Microvariant<'a> {
        let mut kmer = self.original;
        for (&position, &alternative) in self.positions.iter().zip(&self.alternatives) {
            let original = self.original.code_unchecked(position);
            let code = if alternative < original {
                alternative
            } else {
                alternative + 1
            };
            kmer.set_code_unchecked(position, code);
        }
        self.finish(kmer, self.positions.len())
    }

    fn finish(&self, kmer: Kmer<'a>, substitutions: usize) -> Microvariant<'a> {
        let (kmer, is_forward) = match self.complement {
            Some(table) => CanonicalRace::with_table(&kmer, table).finish(),
            None => (kmer, true),
        };
        Microvariant {
            kmer,
            is_forward,
            substitutions,
        }
    }

    /// Moves to the next code combination, then to the next position tuple, then to the next
    /// distance
    fn advance(&mut self, distance: usize) {
        let limit = self.alternatives_per_position();
        for i in (0..distance).rev() {
            self.alternatives[i] += 1;
            if self.alternatives[i] < limit {
                return;
            }
            self.alternatives[i] = 0;
        }

        let k = self.original.k();
        let Some(i) = (0..distance).rev().find(|&i| self.positions[i] < k - distance + i) else {
            self.phase = Phase::Start(distance + 1);
            return;
        };
        self.positions[i] += 1;
        for j in i + 1..distance {
            self.positions[j] = self.positions[j - 1] + 1;
        }
    }
}

impl<'a> Iterator for MicrovariantScanner<'a> {
    type Item = Microvariant<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.phase {
                Phase::Original => {
                    self.phase = Phase::Start(1);
                    if self.include_original {
                        return Some(self.finish(self.original, 0));
                    }
                }
                Phase::Start(distance) => {
                    if distance > self.max_substitutions || self.alternatives_per_position() == 0
                    {
                        self.phase = Phase::Done;
                        return None;
                    }
                    self.positions.clear();
                    self.positions.extend(0..distance);
                    self.alternatives.clear();
                    self.alternatives.resize(distance, 0);
                    self.phase = Phase::Emit(distance);
                }
                Phase::Emit(distance) => {
                    let variant = self.build();
                    self.advance(distance);
                    return Some(variant);
                }
                Phase::Done => return None,
            }
        }
    }
}

/// `n choose k`, saturating at `u64::MAX`
fn binomial(n: usize, k: usize) -> u64 {
    let k = k.min(n - k);
    let mut acc = 1u128;
    for i in 0..k {
        // an overflowing intermediate implies a result far beyond u64
        let Some(product) = acc.checked_mul((n - i) as u128) else {
            return u64::MAX;
        };
        acc = product / (i + 1) as u128;
    }
    u64::try_from(acc).unwrap_or(u64::MAX)
}

/// A microvariant together with the input position of the window it was derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowVariant<'a> {
    pub position: usize,
    pub variant: Microvariant<'a>,
}

/// Runs a [`MicrovariantScanner`] over every forward window of an input stream
pub struct MicrovariantExtractor<'a, I> {
    extractor: KmerExtractor<'a, I>,
    max_substitutions: usize,
    complement: Option<&'a [u8]>,
    current: Option<(usize, MicrovariantScanner<'a>)>,
}

impl<'a, I: Iterator<Item = u8>> MicrovariantExtractor<'a, I> {
    /// Creates the wrapped forward extractor and checks the budget up front
    ///
    /// # Errors
    ///
    /// Fails for an invalid `k`, a budget larger than `k`, or canonical variants over an
    /// alphabet without complement.
    pub fn new(
        alphabet: &'a Alphabet,
        k: usize,
        max_substitutions: usize,
        canonicalize: bool,
        input: impl IntoIterator<IntoIter = I>,
    ) -> Result<Self> {
        let complement = if canonicalize {
            Some(
                alphabet
                    .complement_table()
                    .ok_or(KmerError::NoComplementDefined)?,
            )
        } else {
            None
        };
        let extractor = KmerExtractor::new(alphabet, k, false, input)?;
        if max_substitutions > k {
            return Err(ConfigError::SubstitutionBudgetTooLarge {
                budget: max_substitutions,
                k,
            }
            .into());
        }
        Ok(Self {
            extractor,
            max_substitutions,
            complement,
            current: None,
        })
    }

    /// Access to the wrapped extractor, e.g. for its symbol counts
    #[must_use]
    pub fn extractor(&self) -> &KmerExtractor<'a, I> {
        &self.extractor
    }
}

impl<'a, I: Iterator<Item = u8>> Iterator for MicrovariantExtractor<'a, I> {
    type Item = WindowVariant<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((position, scanner)) = self.current.as_mut() {
                if let Some(variant) = scanner.next() {
                    return Some(WindowVariant {
                        position: *position,
                        variant,
                    });
                }
            }
            let hit = self.extractor.next()?;
            let scanner =
                MicrovariantScanner::with_table(hit.kmer, self.max_substitutions, self.complement);
            self.current = Some((hit.position, scanner));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::Alphabet;
    use crate::error::KmerError;
    use crate::Error;
    use std::collections::HashSet;

    fn strings(scanner: MicrovariantScanner<'_>) -> Vec<(String, usize)> {
        scanner
            .map(|v| (v.kmer.to_string(), v.substitutions))
            .collect()
    }

    #[test]
    fn test_single_substitutions_order() {
        let kmer = Kmer::from_string(Alphabet::dna(), "AC").unwrap();
        let variants = strings(MicrovariantScanner::new(kmer, 1, false).unwrap());
        let expected = [
            ("AC", 0),
            ("CC", 1),
            ("GC", 1),
            ("TC", 1),
            ("AA", 1),
            ("AG", 1),
            ("AT", 1),
        ];
        let expected: Vec<_> = expected.iter().map(|(s, d)| (s.to_string(), *d)).collect();
        assert_eq!(variants, expected);
    }

    #[test]
    fn test_count_matches_formula() {
        let kmer = Kmer::from_string(Alphabet::dna(), "GATTACA").unwrap();
        let scanner = MicrovariantScanner::new(kmer, 1, false).unwrap();
        assert_eq!(scanner.variants_at_distance(1), 7 * 3);
        assert_eq!(scanner.clone().count(), 1 + 7 * 3);

        let scanner = MicrovariantScanner::new(kmer, 2, false).unwrap();
        assert_eq!(scanner.variants_at_distance(2), 21 * 9);
        assert_eq!(scanner.count(), 1 + 21 + 21 * 9);
    }

    #[test]
    fn test_count_saturates_for_long_kmers() {
        assert_eq!(binomial(64, 32), 1_832_624_140_942_590_534);
        assert_eq!(binomial(128, 64), u64::MAX);
        assert_eq!(binomial(128, 127), 128);

        let long = Kmer::from_bytes(Alphabet::dna(), &[b'A'; 128]).unwrap();
        let scanner = MicrovariantScanner::new(long, 64, false).unwrap();
        assert_eq!(scanner.variants_at_distance(1), 128 * 3);
        assert_eq!(scanner.variants_at_distance(64), u64::MAX);
        assert_eq!(scanner.variants_at_distance(128), u64::MAX);
    }

    #[test]
    fn test_variants_are_distinct_and_at_distance() {
        let kmer = Kmer::from_string(Alphabet::dna(), "ACGTA").unwrap();
        let scanner = MicrovariantScanner::new(kmer, 3, false).unwrap();
        let mut seen = HashSet::new();
        for variant in scanner {
            let distance = kmer
                .codes()
                .zip(variant.kmer.codes())
                .filter(|(a, b)| a != b)
                .count();
            assert_eq!(distance, variant.substitutions);
            assert!(seen.insert(variant.kmer.to_string()));
        }
        assert_eq!(seen.len(), 1 + 15 + 10 * 9 + 10 * 27);
    }

    #[test]
    fn test_full_budget_covers_everything() {
        let kmer = Kmer::from_string(Alphabet::dna(), "ACG").unwrap();
        let scanner = MicrovariantScanner::new(kmer, 3, false).unwrap();
        assert_eq!(scanner.count(), 64);
    }

    #[test]
    fn test_without_original() {
        let kmer = Kmer::from_string(Alphabet::dna(), "AC").unwrap();
        let scanner = MicrovariantScanner::new(kmer, 1, false)
            .unwrap()
            .include_original(false);
        let variants = strings(scanner);
        assert_eq!(variants.len(), 6);
        assert_eq!(variants[0], ("CC".to_string(), 1));

        let scanner = MicrovariantScanner::new(kmer, 0, false)
            .unwrap()
            .include_original(false);
        assert_eq!(scanner.count(), 0);
    }

    #[test]
    fn test_canonical_variants() {
        let kmer = Kmer::from_string(Alphabet::dna(), "CGT").unwrap();
        let scanner = MicrovariantScanner::new(kmer, 1, true).unwrap();
        for variant in scanner {
            let (canonical, forward) = variant.kmer.canonical().unwrap();
            assert_eq!(canonical, variant.kmer);
            assert!(forward);
        }
        let mut scanner = MicrovariantScanner::new(kmer, 1, true).unwrap();
        let first = scanner.next().unwrap();
        assert_eq!(first.kmer.to_string(), "ACG");
        assert!(!first.is_forward);
    }

    #[test]
    fn test_budget_too_large() {
        let kmer = Kmer::from_string(Alphabet::dna(), "AC").unwrap();
        assert!(matches!(
            MicrovariantScanner::new(kmer, 3, false),
            Err(Error::ConfigError(ConfigError::SubstitutionBudgetTooLarge {
                budget: 3,
                k: 2
            }))
        ));
    }

    #[test]
    fn test_protein_canonical_rejected() {
        let kmer = Kmer::from_string(Alphabet::protein(), "MK").unwrap();
        assert!(matches!(
            MicrovariantScanner::new(kmer, 1, true),
            Err(Error::KmerError(KmerError::NoComplementDefined))
        ));
        let scanner = MicrovariantScanner::new(kmer, 1, false).unwrap();
        assert_eq!(scanner.count(), 1 + 2 * 19);
    }

    #[test]
    fn test_single_symbol_alphabet() {
        let unary = Alphabet::new(b"A").unwrap();
        let kmer = Kmer::from_string(&unary, "AAA").unwrap();
        let scanner = MicrovariantScanner::new(kmer, 2, false).unwrap();
        assert_eq!(scanner.count(), 1);
    }

    #[test]
    fn test_extractor_wrapper() {
        let wrapper =
            MicrovariantExtractor::new(Alphabet::dna(), 2, 1, true, b"ACNGT".iter().copied())
                .unwrap();
        let hits: Vec<_> = wrapper.collect();
        assert_eq!(hits.len(), 2 * 7);
        assert!(hits[..7].iter().all(|hit| hit.position == 0));
        assert!(hits[7..].iter().all(|hit| hit.position == 3));
        assert_eq!(hits[0].variant.substitutions, 0);
        assert_eq!(hits[0].variant.kmer.to_string(), "AC");
        assert_eq!(hits[7].variant.kmer.to_string(), "AC");
        assert!(!hits[7].variant.is_forward);
        assert_eq!(wrapper_counts(), (4, 1));

        // rejected up front, so iteration never has to drop an error
        assert!(matches!(
            MicrovariantExtractor::new(Alphabet::protein(), 2, 1, true, b"MK".iter().copied()),
            Err(Error::KmerError(KmerError::NoComplementDefined))
        ));
        assert!(
            MicrovariantExtractor::new(Alphabet::dna(), 2, 3, true, b"AC".iter().copied())
                .is_err()
        );
    }

    fn wrapper_counts() -> (usize, usize) {
        let mut wrapper =
            MicrovariantExtractor::new(Alphabet::dna(), 2, 1, false, b"ACNGT".iter().copied())
                .unwrap();
        wrapper.by_ref().for_each(drop);
        (
            wrapper.extractor().valid_symbol_count(),
            wrapper.extractor().invalid_symbol_count(),
        )
    }
}
