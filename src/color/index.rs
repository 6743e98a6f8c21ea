use std::sync::Arc;
use std::thread;

use ahash::{AHashMap, RandomState};
use log::{debug, info};
use parking_lot::RwLock;

use super::{ColorBits, ColorRegistry, ColorSetId};
use crate::alphabet::Alphabet;
use crate::error::{ColorSetError, Error, KmerError, Result};
use crate::extractor::KmerExtractor;
use crate::kmer::{validate_k, Kmer, KmerBits};
use crate::microvariant::{Microvariant, MicrovariantScanner};

/// Number of independently locked partitions of the k-mer table
pub const SHARD_COUNT: usize = 64;

/// Summary of a parallel index build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexStats {
    /// Number of sequences inserted
    pub sequences: usize,
    /// Number of k-mer occurrences inserted
    pub kmers: usize,
    /// Number of distinct k-mers in the index afterwards
    pub distinct_kmers: usize,
    /// Number of color sets in the registry afterwards
    pub color_sets: usize,
}

/// In-memory map from k-mer code to the id of its color set
///
/// The table is split into [`SHARD_COUNT`] shards, each behind its own lock. Updating a k-mer
/// holds its shard lock while the registry resolves the new color set, so concurrent inserts
/// of the same k-mer never lose a color. Locks are always taken shard first, registry second.
pub struct ColorIndex<'a, R> {
    alphabet: &'a Alphabet,
    k: usize,
    canonicalize: bool,
    registry: R,
    shards: Vec<RwLock<AHashMap<KmerBits, ColorSetId>>>,
    hasher: RandomState,
}

impl<'a, R: ColorRegistry> ColorIndex<'a, R> {
    /// Creates an empty index over `registry`
    pub fn new(alphabet: &'a Alphabet, k: usize, canonicalize: bool, registry: R) -> Result<Self> {
        validate_k(k, alphabet)?;
        if canonicalize && !alphabet.has_complement() {
            return Err(KmerError::NoComplementDefined.into());
        }
        debug!("Color index created with k={k}, canonicalize={canonicalize}");
        Ok(Self {
            alphabet,
            k,
            canonicalize,
            registry,
            shards: (0..SHARD_COUNT).map(|_| RwLock::default()).collect(),
            hasher: RandomState::new(),
        })
    }

    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }

    #[must_use]
    pub fn alphabet(&self) -> &'a Alphabet {
        self.alphabet
    }

    #[must_use]
    pub fn is_canonical(&self) -> bool {
        self.canonicalize
    }

    #[must_use]
    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Number of distinct k-mers with a color set
    #[must_use]
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.read().len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| shard.read().is_empty())
    }

    fn shard(&self, key: &KmerBits) -> &RwLock<AHashMap<KmerBits, ColorSetId>> {
        &self.shards[self.hasher.hash_one(key) as usize % SHARD_COUNT]
    }

    fn check_color(&self, color: usize) -> Result<()> {
        let universe_size = self.registry.universe_size();
        if color >= universe_size {
            return Err(ColorSetError::ColorOutOfRange {
                color,
                universe_size,
            }
            .into());
        }
        Ok(())
    }

    fn key(&self, kmer: &Kmer<'_>) -> Result<KmerBits> {
        if kmer.k() != self.k {
            return Err(KmerError::LengthMismatch {
                expected: self.k,
                got: kmer.k(),
            }
            .into());
        }
        if !std::ptr::eq(kmer.alphabet(), self.alphabet) && kmer.alphabet() != self.alphabet {
            return Err(KmerError::AlphabetMismatch.into());
        }
        if self.canonicalize {
            Ok(*kmer.canonical()?.0.value())
        } else {
            Ok(*kmer.value())
        }
    }

    fn add_to(&self, key: KmerBits, color: usize) -> Result<()> {
        let mut shard = self.shard(&key).write();
        let current = shard.get(&key).copied().unwrap_or(ColorSetId::EMPTY);
        let updated = self.registry.add_color(current, color)?;
        if updated != current {
            shard.insert(key, updated);
        }
        Ok(())
    }

    /// Adds `color` to every k-mer of `sequence`
    ///
    /// Windows covering a symbol the alphabet cannot encode are skipped. Returns the number
    /// of k-mers inserted.
    pub fn insert_sequence(&self, color: usize, sequence: &[u8]) -> Result<usize> {
        self.check_color(color)?;
        let extractor =
            KmerExtractor::new(self.alphabet, self.k, self.canonicalize, sequence.iter().copied())?;
        let mut count = 0;
        for hit in extractor {
            self.add_to(*hit.kmer.value(), color)?;
            count += 1;
        }
        Ok(count)
    }

    /// Adds `color` to a single k-mer
    pub fn insert_kmer(&self, color: usize, kmer: &Kmer<'_>) -> Result<()> {
        self.check_color(color)?;
        let key = self.key(kmer)?;
        self.add_to(key, color)
    }

    /// Id of the color set of `kmer`, canonicalized first if the index is canonical
    pub fn lookup(&self, kmer: &Kmer<'_>) -> Result<Option<ColorSetId>> {
        let key = self.key(kmer)?;
        Ok(self.shard(&key).read().get(&key).copied())
    }

    /// Colors of `kmer`, resolved through the registry
    pub fn lookup_colors(&self, kmer: &Kmer<'_>) -> Result<Option<Arc<ColorBits>>> {
        self.lookup(kmer)?
            .map(|id| self.registry.get(id))
            .transpose()
    }

    /// Finds every indexed k-mer within `max_substitutions` substitutions of `kmer`
    ///
    /// Variants are looked up in the deterministic order of [`MicrovariantScanner`], starting
    /// with `kmer` itself. A variant reached through several substitution paths is reported
    /// once per path.
    pub fn lookup_approximate(
        &self,
        kmer: &Kmer<'a>,
        max_substitutions: usize,
    ) -> Result<Vec<(Microvariant<'a>, ColorSetId)>> {
        self.key(kmer)?;
        let scanner = MicrovariantScanner::new(*kmer, max_substitutions, self.canonicalize)?;
        let mut hits = Vec::new();
        for variant in scanner {
            let key = *variant.kmer.value();
            if let Some(id) = self.shard(&key).read().get(&key).copied() {
                hits.push((variant, id));
            }
        }
        Ok(hits)
    }

    /// Looks up every window of `sequence`, yielding `(position, id)` for indexed k-mers
    pub fn lookup_sequence(&self, sequence: &[u8]) -> Result<Vec<(usize, ColorSetId)>> {
        let extractor =
            KmerExtractor::new(self.alphabet, self.k, self.canonicalize, sequence.iter().copied())?;
        Ok(extractor
            .filter_map(|hit| {
                let key = *hit.kmer.value();
                let id = self.shard(&key).read().get(&key).copied()?;
                Some((hit.position, id))
            })
            .collect())
    }
}

impl<R: ColorRegistry + 'static> ColorIndex<'static, R> {
    /// Inserts `(color, sequence)` records from `num_threads` producer threads
    ///
    /// A `num_threads` of 0 uses every available core; larger values are capped at the
    /// number of cores. Records are split into contiguous ranges, one per thread. All colors
    /// are checked before any thread starts.
    pub fn build_parallel(
        index: &Arc<Self>,
        records: Vec<(usize, Vec<u8>)>,
        num_threads: usize,
    ) -> Result<IndexStats> {
        for (color, _) in &records {
            index.check_color(*color)?;
        }

        let num_threads = if num_threads == 0 {
            num_cpus::get()
        } else {
            num_threads.min(num_cpus::get())
        };
        let num_records = records.len();
        let records = Arc::new(records);
        let per_thread = num_records.div_ceil(num_threads).max(1);
        debug!("Indexing {num_records} sequences on {num_threads} threads");

        let mut handles = Vec::with_capacity(num_threads);
        for tid in 0..num_threads {
            let start = (tid * per_thread).min(num_records);
            let end = ((tid + 1) * per_thread).min(num_records);
            if start == end {
                break;
            }
            let index = Arc::clone(index);
            let records = Arc::clone(&records);
            let handle = thread::spawn(move || -> Result<usize> {
                let mut kmers = 0;
                for (color, sequence) in &records[start..end] {
                    kmers += index.insert_sequence(*color, sequence)?;
                }
                Ok(kmers)
            });
            handles.push(handle);
        }

        let mut kmers = 0;
        for handle in handles {
            kmers += handle
                .join()
                .map_err(|_| Error::GenericError("index worker thread panicked".into()))??;
        }

        let stats = IndexStats {
            sequences: num_records,
            kmers,
            distinct_kmers: index.len(),
            color_sets: index.registry.len(),
        };
        info!(
            "Indexed {} sequences: {} k-mers, {} distinct, {} color sets",
            stats.sequences, stats.kmers, stats.distinct_kmers, stats.color_sets
        );
        Ok(stats)
    }
}
