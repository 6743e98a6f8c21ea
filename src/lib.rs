//! # kmercolor
//!
//! Bit-packed k-mer encoding with strand-independent canonical forms, and a deduplicating
//! color-set store for annotating k-mers with their sources.
//!
//! The crate is organized leaves first:
//!
//! - [`Alphabet`] maps symbols to dense codes and defines the complement relation.
//! - [`Bitfield`] is a fixed-capacity multi-word bit container with sub-field access.
//! - [`Kmer`] packs `k` codes into a bitfield, symbol 0 in the most significant position, so
//!   numeric order equals lexicographic order.
//! - [`CanonicalRace`] computes the canonical form in a single early-exit pass.
//! - [`KmerExtractor`] and [`MicrovariantExtractor`] stream k-mers out of a sequence.
//! - [`ColorSetStore`] deduplicates color sets shared by many threads, and [`ColorIndex`]
//!   maps k-mers to them.
//!
//! ```
//! use kmercolor::{Alphabet, ColorSetStore, ColorSetId, Kmer};
//!
//! let dna = Alphabet::dna();
//! let acg = Kmer::from_string(dna, "ACG").unwrap();
//! let cgt = Kmer::from_string(dna, "CGT").unwrap();
//! assert_eq!(acg.canonical().unwrap(), (acg, true));
//! assert_eq!(cgt.canonical().unwrap(), (acg, false));
//!
//! let store = ColorSetStore::new(4).unwrap();
//! let first = store.add_color(ColorSetId::EMPTY, 0).unwrap();
//! let both = store.add_color(first, 2).unwrap();
//! assert_eq!(store.get(both).unwrap().to_string(), "1010");
//! assert_eq!(store.get(first).unwrap().to_string(), "1000");
//! ```

pub mod alphabet;
pub mod bitfield;
pub mod color;
pub mod config;
pub mod error;
pub mod extractor;
pub mod kmer;
pub mod microvariant;

pub use alphabet::{Alphabet, AlphabetKind};
pub use bitfield::Bitfield;
pub use color::{
    ColorBits, ColorIndex, ColorRegistry, ColorSetId, ColorSetStore, IndexStats, StoreStats,
};
pub use config::{IndexConfig, IndexConfigBuilder};
pub use error::{Error, IntoKmerColorError, Result};
pub use extractor::{extract_kmers, ExtractorState, KmerExtractor, KmerHit};
pub use kmer::{CanonicalRace, Kmer, KmerBits, MinimalCanonicalEncoding, RaceState};
pub use microvariant::{Microvariant, MicrovariantExtractor, MicrovariantScanner};

/// Seed for reproducible random sequences in tests and benchmarks
pub const RNG_SEED: u64 = 42;

/// Magic bytes of a serialized color table
pub const TABLE_MAGIC: &[u8; 8] = b"KMCOLORS";

/// Current color table format version
pub const TABLE_VERSION: u8 = 1;
