//! Streaming k-mer extraction
//!
//! [`KmerExtractor`] slides a window of `k` symbols over an input byte stream and yields one
//! [`KmerHit`] per window. The forward window and, when canonicalizing, its reverse complement
//! are rolled one symbol at a time, so each step costs a constant number of word operations
//! independent of the sequence length.
//!
//! A byte the alphabet cannot encode clears the window; extraction resumes after it and no
//! emitted window ever covers such a byte.

use std::cmp::Ordering;

use log::debug;

use crate::alphabet::Alphabet;
use crate::error::{KmerError, Result};
use crate::kmer::{validate_k, Kmer, KmerBits};

/// State of the extractor after the most recently consumed symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorState {
    /// Fewer than `k` consecutive valid symbols are available
    Filling,
    /// The window is full and a k-mer was emitted for the last symbol
    Emitting,
    /// The last symbol was invalid and the window was cleared
    InvalidSkip,
}

/// One extracted k-mer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KmerHit<'a> {
    /// 0-based position of the first window symbol in the input
    pub position: usize,
    /// The k-mer, canonicalized if requested
    pub kmer: Kmer<'a>,
    /// Whether `kmer` is in the orientation of the input
    pub is_forward: bool,
}

/// Lazy, single-pass k-mer scanner over a byte stream
pub struct KmerExtractor<'a, I> {
    alphabet: &'a Alphabet,
    k: usize,
    width: usize,
    complement: Option<&'a [u8]>,
    input: I,

    forward: KmerBits,
    reverse: KmerBits,
    filled: usize,
    cursor: usize,
    state: ExtractorState,

    valid_symbols: usize,
    invalid_symbols: usize,
}

impl<'a, I: Iterator<Item = u8>> KmerExtractor<'a, I> {
    /// Creates an extractor over `input`
    ///
    /// # Errors
    ///
    /// Fails with [`KmerError::InvalidK`] for an unsupported `k`, and with
    /// [`KmerError::NoComplementDefined`] if `canonicalize` is requested for an alphabet
    /// without complement.
    pub fn new(
        alphabet: &'a Alphabet,
        k: usize,
        canonicalize: bool,
        input: impl IntoIterator<IntoIter = I>,
    ) -> Result<Self> {
        validate_k(k, alphabet)?;
        let complement = if canonicalize {
            Some(
                alphabet
                    .complement_table()
                    .ok_or(KmerError::NoComplementDefined)?,
            )
        } else {
            None
        };
        let width = alphabet.bits_per_symbol();
        let empty = KmerBits::new(k * width)?;
        debug!("Extractor created with k={k}, canonicalize={canonicalize}");

        Ok(Self {
            alphabet,
            k,
            width,
            complement,
            input: input.into_iter(),
            forward: empty,
            reverse: empty,
            filled: 0,
            cursor: 0,
            state: ExtractorState::Filling,
            valid_symbols: 0,
            invalid_symbols: 0,
        })
    }

    #[must_use]
    pub fn state(&self) -> ExtractorState {
        self.state
    }

    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }

    #[must_use]
    pub fn is_canonical(&self) -> bool {
        self.complement.is_some()
    }

    /// Number of valid symbols consumed so far
    #[must_use]
    pub fn valid_symbol_count(&self) -> usize {
        self.valid_symbols
    }

    /// Number of invalid symbols consumed so far
    #[must_use]
    pub fn invalid_symbol_count(&self) -> usize {
        self.invalid_symbols
    }

    fn clear_window(&mut self) {
        self.forward.clear();
        self.reverse.clear();
        self.filled = 0;
    }

    fn emit(&self, position: usize) -> KmerHit<'a> {
        let forward = Kmer::from_parts(self.alphabet, self.k, self.forward);
        if self.complement.is_none() {
            return KmerHit {
                position,
                kmer: forward,
                is_forward: true,
            };
        }

        // ties go to the forward orientation
        match self.forward.compare(&self.reverse) {
            Ordering::Greater => KmerHit {
                position,
                kmer: Kmer::from_parts(self.alphabet, self.k, self.reverse),
                is_forward: false,
            },
            Ordering::Less | Ordering::Equal => KmerHit {
                position,
                kmer: forward,
                is_forward: true,
            },
        }
    }
}

impl<'a, I: Iterator<Item = u8>> Iterator for KmerExtractor<'a, I> {
    type Item = KmerHit<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let symbol = self.input.next()?;
            let position = self.cursor;
            self.cursor += 1;

            let Some(code) = self.alphabet.encode(symbol) else {
                self.invalid_symbols += 1;
                self.clear_window();
                self.state = ExtractorState::InvalidSkip;
                continue;
            };

            self.valid_symbols += 1;
            self.forward.push_back(self.width, u64::from(code));
            if let Some(complement) = self.complement {
                self.reverse
                    .push_front(self.width, u64::from(complement[code as usize]));
            }
            self.filled = (self.filled + 1).min(self.k);

            if self.filled < self.k {
                self.state = ExtractorState::Filling;
                continue;
            }
            self.state = ExtractorState::Emitting;
            return Some(self.emit(position + 1 - self.k));
        }
    }
}

/// Convenience constructor for an extractor over a byte slice
pub fn extract_kmers<'a, 's>(
    alphabet: &'a Alphabet,
    k: usize,
    canonicalize: bool,
    sequence: &'s [u8],
) -> Result<KmerExtractor<'a, std::iter::Copied<std::slice::Iter<'s, u8>>>> {
    KmerExtractor::new(alphabet, k, canonicalize, sequence.iter().copied())
}
