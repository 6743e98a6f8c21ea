//! Validated settings for an indexing session
//!
//! [`IndexConfig`] is built with [`IndexConfigBuilder`] and checks every option when built,
//! so a misconfigured run fails before the first sequence is read.
//!
//! ```
//! use kmercolor::{AlphabetKind, IndexConfig};
//!
//! let config = IndexConfig::builder()
//!     .alphabet(AlphabetKind::Dna)
//!     .k(21)
//!     .canonicalize(true)
//!     .color_universe_size(8)
//!     .build()
//!     .unwrap();
//!
//! let kmers = config.extractor(b"ACGTACGTACGTACGTACGTACGT").unwrap().count();
//! assert_eq!(kmers, 4);
//! ```

use std::iter::Copied;
use std::slice::Iter;

use crate::alphabet::{Alphabet, AlphabetKind};
use crate::color::{ColorIndex, ColorSetStore, MAX_UNIVERSE_SIZE};
use crate::error::{ConfigError, Result};
use crate::extractor::KmerExtractor;
use crate::kmer::max_k;
use crate::microvariant::MicrovariantExtractor;

/// Settings shared by the extractor, the color set store and the index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexConfig {
    alphabet: AlphabetKind,
    k: usize,
    canonicalize: bool,
    max_substitutions: usize,
    color_universe_size: usize,
    max_color_count: Option<usize>,
    num_threads: usize,
}

impl IndexConfig {
    #[must_use]
    pub fn builder() -> IndexConfigBuilder {
        IndexConfigBuilder::new()
    }

    #[must_use]
    pub fn alphabet_kind(&self) -> AlphabetKind {
        self.alphabet
    }

    #[must_use]
    pub fn alphabet(&self) -> &'static Alphabet {
        self.alphabet.alphabet()
    }

    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }

    #[must_use]
    pub fn canonicalize(&self) -> bool {
        self.canonicalize
    }

    /// Substitution budget of approximate lookups, `0` if disabled
    #[must_use]
    pub fn max_substitutions(&self) -> usize {
        self.max_substitutions
    }

    #[must_use]
    pub fn color_universe_size(&self) -> usize {
        self.color_universe_size
    }

    #[must_use]
    pub fn max_color_count(&self) -> Option<usize> {
        self.max_color_count
    }

    /// Requested number of producer threads, `0` for all cores
    #[must_use]
    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Creates an extractor over `sequence` with the configured k and orientation
    pub fn extractor<'s>(
        &self,
        sequence: &'s [u8],
    ) -> Result<KmerExtractor<'static, Copied<Iter<'s, u8>>>> {
        KmerExtractor::new(
            self.alphabet(),
            self.k,
            self.canonicalize,
            sequence.iter().copied(),
        )
    }

    /// Creates a microvariant extractor over `sequence` with the configured budget
    pub fn microvariant_extractor<'s>(
        &self,
        sequence: &'s [u8],
    ) -> Result<MicrovariantExtractor<'static, Copied<Iter<'s, u8>>>> {
        MicrovariantExtractor::new(
            self.alphabet(),
            self.k,
            self.max_substitutions,
            self.canonicalize,
            sequence.iter().copied(),
        )
    }

    /// Creates an empty color set store for this session
    pub fn color_store(&self) -> Result<ColorSetStore> {
        match self.max_color_count {
            Some(max) => ColorSetStore::with_max_color_count(self.color_universe_size, max),
            None => ColorSetStore::new(self.color_universe_size),
        }
    }

    /// Creates an empty index backed by a new color set store
    pub fn color_index(&self) -> Result<ColorIndex<'static, ColorSetStore>> {
        ColorIndex::new(self.alphabet(), self.k, self.canonicalize, self.color_store()?)
    }
}

/// Builder for [`IndexConfig`]
#[derive(Debug, Clone, Default)]
pub struct IndexConfigBuilder {
    alphabet: AlphabetKind,
    k: Option<usize>,
    canonicalize: bool,
    max_substitutions: usize,
    color_universe_size: usize,
    max_color_count: Option<usize>,
    num_threads: usize,
}

impl IndexConfigBuilder {
    /// Creates a builder for the plain DNA alphabet without canonicalization
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn alphabet(mut self, alphabet: AlphabetKind) -> Self {
        self.alphabet = alphabet;
        self
    }

    /// Set the k-mer length (required)
    #[must_use]
    pub fn k(mut self, k: usize) -> Self {
        self.k = Some(k);
        self
    }

    /// Set whether k-mers are replaced by their canonical form
    #[must_use]
    pub fn canonicalize(mut self, canonicalize: bool) -> Self {
        self.canonicalize = canonicalize;
        self
    }

    /// Set the substitution budget of approximate lookups
    #[must_use]
    pub fn max_substitutions(mut self, max_substitutions: usize) -> Self {
        self.max_substitutions = max_substitutions;
        self
    }

    /// Set the number of colors (required, positive)
    #[must_use]
    pub fn color_universe_size(mut self, size: usize) -> Self {
        self.color_universe_size = size;
        self
    }

    /// Bound the number of stored color sets
    #[must_use]
    pub fn max_color_count(mut self, max: usize) -> Self {
        self.max_color_count = Some(max);
        self
    }

    #[must_use]
    pub fn num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    /// Validates all settings
    pub fn build(self) -> Result<IndexConfig> {
        let alphabet = self.alphabet.alphabet();
        let k = self.k.ok_or(ConfigError::MissingK)?;
        let max_k = max_k(alphabet);
        if k == 0 || k > max_k {
            return Err(ConfigError::InvalidK { k, max_k }.into());
        }
        if self.canonicalize && !alphabet.has_complement() {
            return Err(ConfigError::CanonicalWithoutComplement.into());
        }
        if self.max_substitutions > k {
            return Err(ConfigError::SubstitutionBudgetTooLarge {
                budget: self.max_substitutions,
                k,
            }
            .into());
        }
        if self.color_universe_size == 0 {
            return Err(ConfigError::ZeroColorUniverse.into());
        }
        if self.color_universe_size > MAX_UNIVERSE_SIZE {
            return Err(ConfigError::ColorUniverseTooLarge {
                size: self.color_universe_size,
                max: MAX_UNIVERSE_SIZE,
            }
            .into());
        }
        if let Some(max) = self.max_color_count {
            let required = self.color_universe_size + 1;
            if max < required {
                return Err(ConfigError::MaxColorCountTooSmall { max, required }.into());
            }
        }
        Ok(IndexConfig {
            alphabet: self.alphabet,
            k,
            canonicalize: self.canonicalize,
            max_substitutions: self.max_substitutions,
            color_universe_size: self.color_universe_size,
            max_color_count: self.max_color_count,
            num_threads: self.num_threads,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn base() -> IndexConfigBuilder {
        IndexConfig::builder().k(3).color_universe_size(4)
    }

    fn config_error(builder: IndexConfigBuilder) -> ConfigError {
        match builder.build() {
            Err(Error::ConfigError(err)) => err,
            other => panic!("expected a config error, got {other:?}"),
        }
    }

    #[test]
    fn test_defaults() {
        let config = base().build().unwrap();
        assert_eq!(config.alphabet_kind(), AlphabetKind::Dna);
        assert!(!config.canonicalize());
        assert_eq!(config.max_substitutions(), 0);
        assert_eq!(config.max_color_count(), None);
        assert_eq!(config.num_threads(), 0);
    }

    #[test]
    fn test_validation() {
        assert_eq!(
            config_error(IndexConfig::builder().color_universe_size(1)),
            ConfigError::MissingK
        );
        assert_eq!(
            config_error(base().k(0)),
            ConfigError::InvalidK { k: 0, max_k: 128 }
        );
        assert_eq!(
            config_error(base().alphabet(AlphabetKind::Protein).k(52)),
            ConfigError::InvalidK { k: 52, max_k: 51 }
        );
        assert_eq!(
            config_error(base().alphabet(AlphabetKind::Protein).canonicalize(true)),
            ConfigError::CanonicalWithoutComplement
        );
        assert_eq!(
            config_error(base().max_substitutions(4)),
            ConfigError::SubstitutionBudgetTooLarge { budget: 4, k: 3 }
        );
        assert_eq!(
            config_error(base().color_universe_size(0)),
            ConfigError::ZeroColorUniverse
        );
        assert_eq!(
            config_error(base().color_universe_size(usize::MAX)),
            ConfigError::ColorUniverseTooLarge {
                size: usize::MAX,
                max: MAX_UNIVERSE_SIZE
            }
        );
        assert_eq!(
            config_error(base().max_color_count(3)),
            ConfigError::MaxColorCountTooSmall {
                max: 3,
                required: 5
            }
        );
    }

    #[test]
    fn test_components() {
        let config = base()
            .canonicalize(true)
            .max_substitutions(1)
            .max_color_count(10)
            .build()
            .unwrap();
        let hits: Vec<_> = config.extractor(b"ACGTT").unwrap().collect();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].kmer, hits[1].kmer);

        // 3 windows, each with 1 + 3 * 3 variants
        assert_eq!(config.microvariant_extractor(b"ACGTT").unwrap().count(), 30);

        let store = config.color_store().unwrap();
        assert_eq!(store.universe_size(), 4);
        assert_eq!(store.max_color_count(), Some(10));

        let index = config.color_index().unwrap();
        assert_eq!(index.insert_sequence(3, b"ACGTT").unwrap(), 3);
        assert_eq!(index.len(), 2);
    }
}
