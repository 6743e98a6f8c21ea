//! Bit-packed k-mers
//!
//! A [`Kmer`] binds a length `k`, an [`Alphabet`] and a [`KmerBits`] value of exactly
//! `k * bits_per_symbol` bits. Symbol `i` (0-based from the left end) occupies bits
//! `[i * b, (i + 1) * b)` of the field, so for `ACGT` codes `ACG` packs to `000110`.

mod canonical;
mod minimal;

pub use canonical::{CanonicalRace, RaceState};
pub(crate) use minimal::reverse_complement_u64;
pub use minimal::{number_of_canonical_kmers, number_of_palindromes, MinimalCanonicalEncoding};

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::alphabet::Alphabet;
use crate::bitfield::Bitfield;
use crate::error::{KmerError, Result};

/// Number of words backing a k-mer value
pub const KMER_WORDS: usize = 4;

/// Maximum encoded width of a k-mer in bits
pub const MAX_KMER_BITS: usize = KMER_WORDS * 64;

/// Bit container holding an encoded k-mer
pub type KmerBits = Bitfield<KMER_WORDS>;

/// Returns the largest `k` supported for an alphabet
#[must_use]
pub fn max_k(alphabet: &Alphabet) -> usize {
    MAX_KMER_BITS / alphabet.bits_per_symbol()
}

/// Checks that `k` is positive and fits into [`MAX_KMER_BITS`] for the alphabet
pub fn validate_k(k: usize, alphabet: &Alphabet) -> Result<()> {
    if k == 0 || k > max_k(alphabet) {
        return Err(KmerError::InvalidK {
            k,
            bits_per_symbol: alphabet.bits_per_symbol(),
            max_bits: MAX_KMER_BITS,
        }
        .into());
    }
    Ok(())
}

/// Number of distinct k-mers over an alphabet of the given size, if it fits into a `u64`
#[must_use]
pub fn number_of_kmers(k: usize, alphabet_size: usize) -> Option<u64> {
    let exponent = u32::try_from(k).ok()?;
    (alphabet_size as u64).checked_pow(exponent)
}

/// A fixed-length, bit-packed k-mer over an alphabet
///
/// K-mers are small `Copy` values that borrow their alphabet; they never allocate.
#[derive(Clone, Copy)]
pub struct Kmer<'a> {
    alphabet: &'a Alphabet,
    k: usize,
    value: KmerBits,
}

impl<'a> Kmer<'a> {
    /// Encodes a symbol string of length `k`
    ///
    /// # Errors
    ///
    /// Fails with [`KmerError::InvalidSymbol`] at the first byte the alphabet cannot encode,
    /// or with [`KmerError::InvalidK`] if the string is empty or too long.
    pub fn from_bytes(alphabet: &'a Alphabet, sequence: &[u8]) -> Result<Self> {
        let mut kmer = Self::zeroed(alphabet, sequence.len())?;
        let width = alphabet.bits_per_symbol();
        for (position, &symbol) in sequence.iter().enumerate() {
            let code = alphabet
                .encode(symbol)
                .ok_or(KmerError::InvalidSymbol { position, symbol })?;
            kmer.value.set_unchecked(position * width, width, u64::from(code));
        }
        Ok(kmer)
    }

    /// Encodes a string slice, see [`Kmer::from_bytes`]
    pub fn from_string(alphabet: &'a Alphabet, sequence: &str) -> Result<Self> {
        Self::from_bytes(alphabet, sequence.as_bytes())
    }

    /// Builds a k-mer from symbol codes
    pub fn from_codes(alphabet: &'a Alphabet, codes: &[u8]) -> Result<Self> {
        let mut kmer = Self::zeroed(alphabet, codes.len())?;
        let width = alphabet.bits_per_symbol();
        for (position, &code) in codes.iter().enumerate() {
            check_code(alphabet, code)?;
            kmer.value.set_unchecked(position * width, width, u64::from(code));
        }
        Ok(kmer)
    }

    /// The all-zero k-mer (the first symbol repeated `k` times)
    pub fn zeroed(alphabet: &'a Alphabet, k: usize) -> Result<Self> {
        validate_k(k, alphabet)?;
        Ok(Self {
            alphabet,
            k,
            value: KmerBits::new(k * alphabet.bits_per_symbol())?,
        })
    }

    /// Decodes a persisted value
    ///
    /// # Errors
    ///
    /// Fails with [`KmerError::MalformedValue`] if the value's capacity does not match
    /// `k * bits_per_symbol` or any packed code is outside the alphabet.
    pub fn from_value(alphabet: &'a Alphabet, k: usize, value: KmerBits) -> Result<Self> {
        validate_k(k, alphabet)?;
        let width = alphabet.bits_per_symbol();
        if value.capacity() != k * width {
            return Err(KmerError::MalformedValue { k }.into());
        }
        let kmer = Self { alphabet, k, value };
        if kmer.codes().any(|code| code as usize >= alphabet.size()) {
            return Err(KmerError::MalformedValue { k }.into());
        }
        Ok(kmer)
    }

    /// Decodes a persisted single-word value, see [`Kmer::from_value`]
    pub fn from_u64(alphabet: &'a Alphabet, k: usize, value: u64) -> Result<Self> {
        validate_k(k, alphabet)?;
        let bits = KmerBits::from_u64(k * alphabet.bits_per_symbol(), value)
            .map_err(|_| KmerError::MalformedValue { k })?;
        Self::from_value(alphabet, k, bits)
    }

    /// Internal constructor for values already known to be well formed
    pub(crate) fn from_parts(alphabet: &'a Alphabet, k: usize, value: KmerBits) -> Self {
        Self { alphabet, k, value }
    }

    #[inline]
    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }

    #[inline]
    #[must_use]
    pub fn alphabet(&self) -> &'a Alphabet {
        self.alphabet
    }

    #[inline]
    #[must_use]
    pub fn value(&self) -> &KmerBits {
        &self.value
    }

    /// Encoded width in bits
    #[must_use]
    pub fn bits(&self) -> usize {
        self.value.capacity()
    }

    /// Returns the encoded value as one word
    ///
    /// # Errors
    ///
    /// Fails with [`KmerError::TooWideForWord`] if the k-mer is wider than 64 bits.
    pub fn as_u64(&self) -> Result<u64> {
        if self.bits() > 64 {
            return Err(KmerError::TooWideForWord { bits: self.bits() }.into());
        }
        Ok(self.value.to_u64().unwrap_or_default())
    }

    /// Returns the code of symbol `i`
    pub fn symbol(&self, i: usize) -> Result<u8> {
        let width = self.alphabet.bits_per_symbol();
        Ok(self.value.get(i * width, width)? as u8)
    }

    /// Returns a copy with symbol `i` replaced by `code`
    pub fn with_symbol(&self, i: usize, code: u8) -> Result<Self> {
        check_code(self.alphabet, code)?;
        let width = self.alphabet.bits_per_symbol();
        let mut kmer = *self;
        kmer.value.set(i * width, width, u64::from(code))?;
        Ok(kmer)
    }

    /// Iterates over the symbol codes from left to right
    pub fn codes(&self) -> impl Iterator<Item = u8> + '_ {
        let width = self.alphabet.bits_per_symbol();
        (0..self.k).map(move |i| self.value.get_unchecked(i * width, width) as u8)
    }

    #[inline]
    pub(crate) fn code_unchecked(&self, i: usize) -> u8 {
        let width = self.alphabet.bits_per_symbol();
        self.value.get_unchecked(i * width, width) as u8
    }

    #[inline]
    pub(crate) fn set_code_unchecked(&mut self, i: usize, code: u8) {
        let width = self.alphabet.bits_per_symbol();
        self.value.set_unchecked(i * width, width, u64::from(code));
    }

    /// Decodes the k-mer back into its symbol bytes
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.codes()
            .map(|code| self.alphabet.decode(code).unwrap_or(b'?'))
            .collect()
    }

    /// Computes the reverse complement: symbol order reversed, each code complemented
    ///
    /// # Errors
    ///
    /// Fails with [`KmerError::NoComplementDefined`] for alphabets without a complement.
    pub fn reverse_complement(&self) -> Result<Self> {
        let complement = self
            .alphabet
            .complement_table()
            .ok_or(KmerError::NoComplementDefined)?;

        if self.alphabet.negation_is_complement() && self.bits() <= 64 {
            let value = reverse_complement_u64(self.as_u64()?, self.k);
            let bits = KmerBits::from_u64(self.bits(), value)?;
            return Ok(Self::from_parts(self.alphabet, self.k, bits));
        }

        let width = self.alphabet.bits_per_symbol();
        let mut value = self.value;
        for i in 0..self.k {
            let code = self.code_unchecked(self.k - 1 - i);
            value.set_unchecked(
                i * width,
                width,
                u64::from(complement[code as usize]),
            );
        }
        Ok(Self::from_parts(self.alphabet, self.k, value))
    }

    /// Checks if the k-mer equals its own reverse complement
    pub fn is_palindrome(&self) -> Result<bool> {
        Ok(self.reverse_complement()?.value == self.value)
    }

    /// Returns the canonical form and whether the original orientation was kept
    ///
    /// The canonical form is the numerically smaller of the k-mer and its reverse complement.
    /// Palindromes keep their original orientation. See [`CanonicalRace`] for the algorithm.
    pub fn canonical(&self) -> Result<(Self, bool)> {
        Ok(CanonicalRace::new(self)?.finish())
    }

    fn same_alphabet(&self, other: &Self) -> bool {
        std::ptr::eq(self.alphabet, other.alphabet) || self.alphabet == other.alphabet
    }
}

fn check_code(alphabet: &Alphabet, code: u8) -> Result<()> {
    if code as usize >= alphabet.size() {
        return Err(KmerError::InvalidCode {
            code,
            size: alphabet.size(),
        }
        .into());
    }
    Ok(())
}

impl PartialEq for Kmer<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.k == other.k && self.value == other.value && self.same_alphabet(other)
    }
}
impl Eq for Kmer<'_> {}

impl Hash for Kmer<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.k.hash(state);
        self.value.hash(state);
    }
}

impl PartialOrd for Kmer<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        if !self.same_alphabet(other) {
            return None;
        }
        Some(self.k.cmp(&other.k).then_with(|| self.value.compare(&other.value)))
    }
}

impl fmt::Display for Kmer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for code in self.codes() {
            let symbol = self.alphabet.decode(code).unwrap_or(b'?');
            write!(f, "{}", char::from(symbol))?;
        }
        Ok(())
    }
}

impl fmt::Debug for Kmer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kmer")
            .field("k", &self.k)
            .field("sequence", &self.to_string())
            .field("value", &self.value)
            .finish()
    }
}
