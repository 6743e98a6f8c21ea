use super::{Kmer, KmerBits};
use crate::error::{KmerError, Result};

/// Progress of the forward / reverse-complement comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaceState {
    /// All symbols compared so far are equal in both orientations
    Undecided,
    /// The forward k-mer is smaller; it is the canonical form
    ForwardWins,
    /// The reverse complement is smaller; only it is built further
    ReverseWins,
}

/// Single-pass canonicalization of a k-mer
///
/// Walks the forward symbols once. At step `i` the forward symbol is `x[i]` and the
/// reverse-complement symbol is `comp(x[k - 1 - i])`; the first position where they differ
/// settles which orientation is smaller. Once the forward side wins nothing more is computed,
/// and once the reverse side wins only the remaining reverse-complement symbols are written.
/// A palindrome never differs and finishes after `k` steps in the forward orientation.
#[derive(Debug, Clone)]
pub struct CanonicalRace<'k, 'a> {
    kmer: &'k Kmer<'a>,
    complement: &'a [u8],
    reverse: KmerBits,
    position: usize,
    state: RaceState,
}

impl<'k, 'a> CanonicalRace<'k, 'a> {
    /// Starts a race for the given k-mer
    ///
    /// # Errors
    ///
    /// Fails with [`KmerError::NoComplementDefined`] if the alphabet has no complement.
    pub fn new(kmer: &'k Kmer<'a>) -> Result<Self> {
        let complement = kmer
            .alphabet()
            .complement_table()
            .ok_or(KmerError::NoComplementDefined)?;
        Ok(Self::with_table(kmer, complement))
    }

    /// Starts a race with a complement table the caller has already resolved
    pub(crate) fn with_table(kmer: &'k Kmer<'a>, complement: &'a [u8]) -> Self {
        Self {
            kmer,
            complement,
            reverse: *kmer.value(),
            position: 0,
            state: RaceState::Undecided,
        }
    }

    #[must_use]
    pub fn state(&self) -> RaceState {
        self.state
    }

    /// Number of symbols consumed so far
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Checks if no further step changes the result
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state == RaceState::ForwardWins || self.position == self.kmer.k()
    }

    /// Advances the race by one symbol and returns the new state
    pub fn step(&mut self) -> RaceState {
        if self.is_finished() {
            return self.state;
        }

        let k = self.kmer.k();
        let i = self.position;
        let forward = self.kmer.code_unchecked(i);
        let reverse = self.complement[self.kmer.code_unchecked(k - 1 - i) as usize];

        match self.state {
            RaceState::Undecided => {
                self.write_reverse(i, reverse);
                if forward < reverse {
                    self.state = RaceState::ForwardWins;
                } else if forward > reverse {
                    self.state = RaceState::ReverseWins;
                }
            }
            RaceState::ReverseWins => self.write_reverse(i, reverse),
            RaceState::ForwardWins => {}
        }
        self.position += 1;
        self.state
    }

    fn write_reverse(&mut self, i: usize, code: u8) {
        let width = self.kmer.alphabet().bits_per_symbol();
        self.reverse.set_unchecked(i * width, width, u64::from(code));
    }

    /// Runs the race to completion and returns `(canonical, is_original_orientation)`
    #[must_use]
    pub fn finish(mut self) -> (Kmer<'a>, bool) {
        while !self.is_finished() {
            self.step();
        }
        match self.state {
            RaceState::ReverseWins => (
                Kmer::from_parts(self.kmer.alphabet(), self.kmer.k(), self.reverse),
                false,
            ),
            RaceState::ForwardWins | RaceState::Undecided => (*self.kmer, true),
        }
    }
}
