//! Fixed-capacity, multi-word bit container
//!
//! A [`Bitfield`] treats `W` 64-bit words as one contiguous bit string of `capacity` bits.
//! Sub-fields are addressed as `[offset, offset + width)` where offset `0` is the most
//! significant bit of the field, so the first symbol of a k-mer lands in the highest bits and
//! the numeric order of two fields matches the lexicographic order of their symbol strings.
//!
//! Internally the field occupies the lowest `capacity` bits of the word array, with
//! `words[0]` being the least significant word. Accesses that straddle a word boundary are
//! split into at most two word accesses by [`read_bits`] and [`write_bits`].

use std::cmp::Ordering;
use std::fmt;

use crate::error::{BitfieldError, Result};

/// Number of bits per backing word
pub const WORD_BITS: usize = u64::BITS as usize;

/// Returns a mask with the lowest `width` bits set (`width <= 64`)
#[inline]
#[must_use]
pub fn low_mask(width: usize) -> u64 {
    if width >= WORD_BITS {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// Reads `width <= 64` bits starting at absolute bit `lo` (counted from the least significant
/// bit of `words[0]`)
///
/// The caller guarantees that `lo + width <= words.len() * 64`.
#[inline]
pub(crate) fn read_bits(words: &[u64], lo: usize, width: usize) -> u64 {
    // an empty field at the top end of a full buffer has `lo == words.len() * 64`
    if width == 0 {
        return 0;
    }
    let index = lo / WORD_BITS;
    let shift = lo % WORD_BITS;
    if shift + width <= WORD_BITS {
        (words[index] >> shift) & low_mask(width)
    } else {
        // straddles: low part from `index`, high part from `index + 1`
        let low_bits = WORD_BITS - shift;
        let low = words[index] >> shift;
        let high = words[index + 1] & low_mask(width - low_bits);
        low | (high << low_bits)
    }
}

/// Writes the lowest `width <= 64` bits of `value` at absolute bit `lo`, leaving all other
/// bits untouched
///
/// The caller guarantees that `lo + width <= words.len() * 64` and `value <= low_mask(width)`.
#[inline]
pub(crate) fn write_bits(words: &mut [u64], lo: usize, width: usize, value: u64) {
    if width == 0 {
        return;
    }
    let index = lo / WORD_BITS;
    let shift = lo % WORD_BITS;
    if shift + width <= WORD_BITS {
        let mask = low_mask(width) << shift;
        words[index] = (words[index] & !mask) | (value << shift);
    } else {
        let low_bits = WORD_BITS - shift;
        let low_mask_in_word = u64::MAX << shift;
        words[index] = (words[index] & !low_mask_in_word) | (value << shift);

        let high_mask = low_mask(width - low_bits);
        words[index + 1] = (words[index + 1] & !high_mask) | (value >> low_bits);
    }
}

/// Shifts the whole word array towards the most significant end by `n` bits
fn shift_words_left(words: &mut [u64], n: usize) {
    let word_shift = n / WORD_BITS;
    let bit_shift = n % WORD_BITS;
    for i in (0..words.len()).rev() {
        words[i] = if i < word_shift {
            0
        } else {
            let src = i - word_shift;
            let mut value = words[src] << bit_shift;
            if bit_shift > 0 && src > 0 {
                value |= words[src - 1] >> (WORD_BITS - bit_shift);
            }
            value
        };
    }
}

/// Shifts the whole word array towards the least significant end by `n` bits
fn shift_words_right(words: &mut [u64], n: usize) {
    let word_shift = n / WORD_BITS;
    let bit_shift = n % WORD_BITS;
    let len = words.len();
    for i in 0..len {
        let src = i + word_shift;
        words[i] = if src >= len {
            0
        } else {
            let mut value = words[src] >> bit_shift;
            if bit_shift > 0 && src + 1 < len {
                value |= words[src + 1] << (WORD_BITS - bit_shift);
            }
            value
        };
    }
}

/// Clears every bit at or above `capacity`
fn clear_above(words: &mut [u64], capacity: usize) {
    for (i, word) in words.iter_mut().enumerate() {
        let start = i * WORD_BITS;
        if start >= capacity {
            *word = 0;
        } else if capacity - start < WORD_BITS {
            *word &= low_mask(capacity - start);
        }
    }
}

/// A bit string of fixed capacity stored inline in `W` words
///
/// Bitfields are plain values: they are `Copy`, never allocate, and need no synchronization.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bitfield<const W: usize> {
    words: [u64; W],
    capacity: usize,
}

impl<const W: usize> Bitfield<W> {
    /// Maximum capacity in bits
    pub const MAX_CAPACITY: usize = W * WORD_BITS;

    /// Creates a zeroed bitfield of `capacity` bits
    ///
    /// # Errors
    ///
    /// Returns [`BitfieldError::CapacityTooLarge`] if `capacity` exceeds `W * 64`.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity > Self::MAX_CAPACITY {
            return Err(BitfieldError::CapacityTooLarge {
                requested: capacity,
                max: Self::MAX_CAPACITY,
            }
            .into());
        }
        Ok(Self {
            words: [0; W],
            capacity,
        })
    }

    /// Creates a bitfield from raw words (least significant word first)
    ///
    /// # Errors
    ///
    /// Fails if the capacity is too large or any bit at or above `capacity` is set.
    pub fn from_words(capacity: usize, words: [u64; W]) -> Result<Self> {
        let mut field = Self::new(capacity)?;
        field.words = words;
        clear_above(&mut field.words, capacity);
        if field.words != words {
            return Err(BitfieldError::OutOfRange {
                offset: 0,
                width: Self::MAX_CAPACITY,
                capacity,
            }
            .into());
        }
        Ok(field)
    }

    /// Creates a bitfield holding `value` in its lowest bits
    pub fn from_u64(capacity: usize, value: u64) -> Result<Self> {
        let mut words = [0; W];
        match words.first_mut() {
            Some(first) => *first = value,
            None if value != 0 => {
                return Err(BitfieldError::ValueTooWide { value, width: 0 }.into());
            }
            None => {}
        }
        Self::from_words(capacity, words).map_err(|_| {
            BitfieldError::ValueTooWide {
                value,
                width: capacity,
            }
            .into()
        })
    }

    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Raw backing words, least significant first
    #[must_use]
    pub fn words(&self) -> &[u64; W] {
        &self.words
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Resets every bit to zero
    pub fn clear(&mut self) {
        self.words = [0; W];
    }

    /// Returns the value as a single word if no bit above 64 is set
    #[must_use]
    pub fn to_u64(&self) -> Option<u64> {
        match self.words.split_first() {
            None => Some(0),
            Some((first, rest)) if rest.iter().all(|&w| w == 0) => Some(*first),
            Some(_) => None,
        }
    }

    /// Validates an access and converts the field offset into an absolute low bit
    #[inline]
    fn locate(&self, offset: usize, width: usize) -> Result<usize> {
        match offset.checked_add(width) {
            Some(end) if end <= self.capacity && width <= WORD_BITS => Ok(self.capacity - end),
            _ => Err(BitfieldError::OutOfRange {
                offset,
                width,
                capacity: self.capacity,
            }
            .into()),
        }
    }

    /// Reads `width` bits starting at `offset`, zero-extended
    ///
    /// # Errors
    ///
    /// Returns [`BitfieldError::OutOfRange`] if `offset + width > capacity` or `width > 64`.
    pub fn get(&self, offset: usize, width: usize) -> Result<u64> {
        let lo = self.locate(offset, width)?;
        Ok(read_bits(&self.words, lo, width))
    }

    /// Writes `value` into `[offset, offset + width)`
    ///
    /// # Errors
    ///
    /// Returns [`BitfieldError::OutOfRange`] for an invalid range and
    /// [`BitfieldError::ValueTooWide`] if `value >= 2^width`.
    pub fn set(&mut self, offset: usize, width: usize, value: u64) -> Result<()> {
        let lo = self.locate(offset, width)?;
        if value & !low_mask(width) != 0 {
            return Err(BitfieldError::ValueTooWide { value, width }.into());
        }
        write_bits(&mut self.words, lo, width, value);
        Ok(())
    }

    /// Writes the lowest `width` bits of `value`, silently dropping the rest
    pub fn set_truncating(&mut self, offset: usize, width: usize, value: u64) -> Result<()> {
        let lo = self.locate(offset, width)?;
        write_bits(&mut self.words, lo, width, value & low_mask(width));
        Ok(())
    }

    /// Shifts the numeric value left by `n` bits, discarding bits that leave the field
    ///
    /// Shifting by exactly `capacity` clears the field.
    pub fn shift_left(&mut self, n: usize) -> Result<()> {
        self.check_shift(n)?;
        shift_words_left(&mut self.words, n);
        clear_above(&mut self.words, self.capacity);
        Ok(())
    }

    /// Shifts the numeric value right by `n` bits
    pub fn shift_right(&mut self, n: usize) -> Result<()> {
        self.check_shift(n)?;
        shift_words_right(&mut self.words, n);
        Ok(())
    }

    fn check_shift(&self, n: usize) -> Result<()> {
        if n > self.capacity {
            return Err(BitfieldError::OutOfRange {
                offset: 0,
                width: n,
                capacity: self.capacity,
            }
            .into());
        }
        Ok(())
    }

    /// Shifts in `value` at the least significant end, dropping the leading `width` bits
    ///
    /// This is the rolling-window push used by the extractor; `width` and `value` are trusted.
    #[inline]
    pub(crate) fn push_back(&mut self, width: usize, value: u64) {
        shift_words_left(&mut self.words, width);
        clear_above(&mut self.words, self.capacity);
        self.words[0] |= value;
    }

    /// Shifts in `value` at the most significant end, dropping the trailing `width` bits
    #[inline]
    pub(crate) fn push_front(&mut self, width: usize, value: u64) {
        shift_words_right(&mut self.words, width);
        write_bits(&mut self.words, self.capacity - width, width, value);
    }

    /// Trusted read without range checks
    #[inline]
    pub(crate) fn get_unchecked(&self, offset: usize, width: usize) -> u64 {
        read_bits(&self.words, self.capacity - offset - width, width)
    }

    /// Trusted write without range checks
    #[inline]
    pub(crate) fn set_unchecked(&mut self, offset: usize, width: usize, value: u64) {
        write_bits(&mut self.words, self.capacity - offset - width, width, value);
    }

    /// Compares the two fields as unsigned integers, ignoring their capacities
    #[must_use]
    pub fn compare(&self, other: &Self) -> Ordering {
        self.words.iter().rev().cmp(other.words.iter().rev())
    }
}

impl<const W: usize> PartialOrd for Bitfield<W> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<const W: usize> Ord for Bitfield<W> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
            .then_with(|| self.capacity.cmp(&other.capacity))
    }
}

impl<const W: usize> fmt::Binary for Bitfield<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for offset in 0..self.capacity {
            let bit = self.get_unchecked(offset, 1);
            f.write_str(if bit == 1 { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl<const W: usize> fmt::Debug for Bitfield<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bitfield({}: {:b})", self.capacity, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, RNG_SEED};
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    /// Reference model: bit `i` of the field (offset order) as a bool
    fn bits_of<const W: usize>(field: &Bitfield<W>) -> Vec<bool> {
        (0..field.capacity())
            .map(|i| field.get(i, 1).unwrap() == 1)
            .collect()
    }

    fn random_field<const W: usize>(rng: &mut SmallRng, capacity: usize) -> Bitfield<W> {
        let mut words = [0u64; W];
        for word in &mut words {
            *word = rng.random();
        }
        clear_above(&mut words, capacity);
        Bitfield::from_words(capacity, words).unwrap()
    }

    fn check_every_range<const W: usize>(capacity: usize) {
        let mut rng = SmallRng::seed_from_u64(RNG_SEED);
        for width in 0..=WORD_BITS.min(capacity) {
            for offset in 0..=(capacity - width) {
                let mut field: Bitfield<W> = random_field(&mut rng, capacity);
                let before = bits_of(&field);
                let value = rng.random::<u64>() & low_mask(width);

                field.set(offset, width, value).unwrap();
                assert_eq!(
                    field.get(offset, width).unwrap(),
                    value,
                    "offset {offset} width {width}"
                );

                let after = bits_of(&field);
                for i in 0..capacity {
                    if i < offset || i >= offset + width {
                        assert_eq!(before[i], after[i], "bit {i} leaked for {offset}+{width}");
                    } else {
                        let expected = (value >> (width - 1 - (i - offset))) & 1 == 1;
                        assert_eq!(after[i], expected, "bit {i} wrong for {offset}+{width}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_every_range_word_aligned() {
        check_every_range::<2>(128);
    }

    #[test]
    fn test_every_range_unaligned_capacity() {
        check_every_range::<3>(130);
    }

    #[test]
    fn test_every_range_single_word() {
        check_every_range::<1>(64);
        check_every_range::<1>(37);
    }

    #[test]
    fn test_empty_field_at_full_capacity() {
        let mut full = Bitfield::<2>::new(128).unwrap();
        full.set(0, 64, u64::MAX).unwrap();
        for offset in [0, 64, 127, 128] {
            assert_eq!(full.get(offset, 0).unwrap(), 0);
            full.set(offset, 0, 0).unwrap();
            full.set_truncating(offset, 0, 5).unwrap();
        }
        assert_eq!(full.get(0, 64).unwrap(), u64::MAX);
        assert_eq!(full.get(64, 64).unwrap(), 0);

        let single = Bitfield::<1>::new(64).unwrap();
        assert_eq!(single.get(0, 0).unwrap(), 0);
        assert_eq!(read_bits(&[u64::MAX], 64, 0), 0);
    }

    #[test]
    fn test_split_and_combine_straddling() {
        let mut words = [0u64; 2];
        write_bits(&mut words, 60, 8, 0xAB);
        assert_eq!(words[0], 0xB << 60);
        assert_eq!(words[1], 0xA);
        assert_eq!(read_bits(&words, 60, 8), 0xAB);
        write_bits(&mut words, 1, 64, u64::MAX);
        assert_eq!(words[0], u64::MAX - 1);
        assert_eq!(words[1], 0xB);
        assert_eq!(read_bits(&words, 1, 64), u64::MAX);
    }

    #[test]
    fn test_offset_zero_is_most_significant() {
        let mut field = Bitfield::<1>::new(6).unwrap();
        field.set(0, 2, 0b00).unwrap();
        field.set(2, 2, 0b01).unwrap();
        field.set(4, 2, 0b10).unwrap();
        assert_eq!(field.to_u64(), Some(0b000110));
        assert_eq!(format!("{field:b}"), "000110");
    }

    #[test]
    fn test_out_of_range() {
        let mut field = Bitfield::<2>::new(100).unwrap();
        assert!(matches!(
            field.get(99, 2),
            Err(Error::BitfieldError(BitfieldError::OutOfRange { .. }))
        ));
        assert!(matches!(
            field.set(0, 65, 0),
            Err(Error::BitfieldError(BitfieldError::OutOfRange { .. }))
        ));
        assert!(field.get(usize::MAX, 2).is_err());
        assert!(field.get(36, 64).is_ok());
    }

    #[test]
    fn test_capacity_too_large() {
        assert!(matches!(
            Bitfield::<2>::new(129),
            Err(Error::BitfieldError(BitfieldError::CapacityTooLarge {
                requested: 129,
                max: 128
            }))
        ));
    }

    #[test]
    fn test_value_too_wide() {
        let mut field = Bitfield::<1>::new(8).unwrap();
        assert!(matches!(
            field.set(0, 3, 8),
            Err(Error::BitfieldError(BitfieldError::ValueTooWide { value: 8, width: 3 }))
        ));
        field.set_truncating(0, 3, 0b1111).unwrap();
        assert_eq!(field.get(0, 3).unwrap(), 0b111);
        assert_eq!(field.get(3, 5).unwrap(), 0);
    }

    #[test]
    fn test_shifts() {
        let mut field = Bitfield::<2>::new(70).unwrap();
        field.set(60, 10, 0b11_0000_0001).unwrap();
        field.shift_left(3).unwrap();
        assert_eq!(field.get(57, 10).unwrap(), 0b11_0000_0001);
        assert_eq!(field.get(67, 3).unwrap(), 0);

        field.shift_left(57).unwrap();
        assert_eq!(field.get(0, 10).unwrap(), 0b11_0000_0001);

        // bits pushed out of the top are lost
        field.shift_left(1).unwrap();
        assert_eq!(field.get(0, 10).unwrap(), 0b10_0000_0010);

        field.shift_right(60).unwrap();
        assert_eq!(field.get(60, 10).unwrap(), 0b10_0000_0010);

        field.shift_right(70).unwrap();
        assert!(field.is_zero());
        assert!(field.shift_right(71).is_err());
    }

    #[test]
    fn test_push_back_and_front() {
        let mut field = Bitfield::<1>::new(6).unwrap();
        for code in [0, 1, 2, 3] {
            field.push_back(2, code);
        }
        // ACGT with k=3 keeps CGT
        assert_eq!(field.to_u64(), Some(0b011011));
        field.push_front(2, 0);
        assert_eq!(field.to_u64(), Some(0b000110));
    }

    #[test]
    fn test_compare_numeric() {
        let small = Bitfield::<2>::from_u64(128, 5).unwrap();
        let mut large = Bitfield::<2>::new(128).unwrap();
        large.set(0, 1, 1).unwrap();
        assert_eq!(small.compare(&large), Ordering::Less);
        assert_eq!(large.compare(&small), Ordering::Greater);
        assert_eq!(small.compare(&small), Ordering::Equal);
        assert!(small < large);
        assert_eq!(large.to_u64(), None);
    }

    #[test]
    fn test_from_words_rejects_stray_bits() {
        assert!(Bitfield::<1>::from_words(4, [0b1_0000]).is_err());
        assert!(Bitfield::<1>::from_u64(4, 0b1111).is_ok());
        assert!(matches!(
            Bitfield::<1>::from_u64(4, 0b1_0000),
            Err(Error::BitfieldError(BitfieldError::ValueTooWide { .. }))
        ));
    }
}
