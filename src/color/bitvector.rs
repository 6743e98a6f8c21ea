use std::fmt;

use crate::error::{ColorSetError, Result};

const GOLDEN_RATIO: u64 = 0x9e37_79b9_7f4a_7c15;

/// A fixed-width bit vector indexed by color
///
/// `bit[c] == 1` iff color `c` is in the set. The width is the color universe size of the
/// store the set belongs to and never changes.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ColorBits {
    words: Vec<u64>,
    len: usize,
}

impl ColorBits {
    /// Creates an empty set over `len` colors
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(64)],
            len,
        }
    }

    /// Creates a set containing exactly the given colors
    pub fn from_colors(len: usize, colors: &[usize]) -> Result<Self> {
        let mut bits = Self::new(len);
        for &color in colors {
            bits.insert(color)?;
        }
        Ok(bits)
    }

    /// Creates the set of all colors
    #[must_use]
    pub fn all(len: usize) -> Self {
        let mut bits = Self::new(len);
        bits.words.fill(u64::MAX);
        bits.clear_tail();
        bits
    }

    /// Creates a set from raw words, clearing any bits past `len`
    #[must_use]
    pub fn from_words(len: usize, mut words: Vec<u64>) -> Self {
        words.resize(len.div_ceil(64), 0);
        let mut bits = Self { words, len };
        bits.clear_tail();
        bits
    }

    fn clear_tail(&mut self) {
        let rem = self.len % 64;
        if rem > 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1u64 << rem) - 1;
            }
        }
    }

    /// Number of colors in the universe
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Checks if the universe has no colors at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    fn check(&self, color: usize) -> Result<()> {
        if color >= self.len {
            return Err(ColorSetError::ColorOutOfRange {
                color,
                universe_size: self.len,
            }
            .into());
        }
        Ok(())
    }

    /// Checks whether `color` is in the set; colors outside the universe are never contained
    #[must_use]
    pub fn contains(&self, color: usize) -> bool {
        color < self.len && (self.words[color / 64] >> (color % 64)) & 1 == 1
    }

    /// Adds `color` to the set
    pub fn insert(&mut self, color: usize) -> Result<()> {
        self.check(color)?;
        self.words[color / 64] |= 1u64 << (color % 64);
        Ok(())
    }

    /// Returns a copy with `color` added
    pub fn with_color(&self, color: usize) -> Result<Self> {
        let mut bits = self.clone();
        bits.insert(color)?;
        Ok(bits)
    }

    /// Returns the union of two sets of the same width
    pub fn union(&self, other: &Self) -> Result<Self> {
        self.check_width(other)?;
        let words = self
            .words
            .iter()
            .zip(&other.words)
            .map(|(a, b)| a | b)
            .collect();
        Ok(Self {
            words,
            len: self.len,
        })
    }

    pub(crate) fn check_width(&self, other: &Self) -> Result<()> {
        if self.len != other.len {
            return Err(ColorSetError::WidthMismatch {
                expected: self.len,
                got: other.len,
            }
            .into());
        }
        Ok(())
    }

    /// Checks if every color of `self` is also in `other`
    #[must_use]
    pub fn is_subset_of(&self, other: &Self) -> bool {
        self.len == other.len
            && self
                .words
                .iter()
                .zip(&other.words)
                .all(|(a, b)| a & !b == 0)
    }

    /// Number of colors in the set
    #[must_use]
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    #[must_use]
    pub fn is_all_set(&self) -> bool {
        self.count_ones() == self.len
    }

    /// Iterates over the contained colors in ascending order
    pub fn iter_colors(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(i, &word)| {
            let mut word = word;
            std::iter::from_fn(move || {
                if word == 0 {
                    return None;
                }
                let bit = word.trailing_zeros() as usize;
                word &= word - 1;
                Some(i * 64 + bit)
            })
        })
    }

    /// Hash of the full content, combined word by word and seeded with the width
    ///
    /// Used as the deduplication key of the color set store; equal hashes are always
    /// confirmed by comparing the words.
    #[must_use]
    pub fn content_hash(&self) -> u64 {
        self.words.iter().fold(self.len as u64, |seed, &word| {
            seed ^ word
                .wrapping_add(GOLDEN_RATIO)
                .wrapping_add(seed << 6)
                .wrapping_add(seed >> 2)
        })
    }
}

impl fmt::Display for ColorBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for color in 0..self.len {
            f.write_str(if self.contains(color) { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl fmt::Debug for ColorBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ColorBits({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_from_colors() {
        let bits = ColorBits::from_colors(4, &[0, 2]).unwrap();
        assert_eq!(bits.to_string(), "1010");
        assert!(bits.contains(2));
        assert!(!bits.contains(1));
        assert!(!bits.contains(100));
        assert_eq!(bits.count_ones(), 2);
        assert_eq!(bits.iter_colors().collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn test_out_of_range() {
        assert!(matches!(
            ColorBits::from_colors(4, &[4]),
            Err(Error::ColorSetError(ColorSetError::ColorOutOfRange {
                color: 4,
                universe_size: 4
            }))
        ));
    }

    #[test]
    fn test_with_color_leaves_original() {
        let bits = ColorBits::from_colors(130, &[129]).unwrap();
        let more = bits.with_color(64).unwrap();
        assert_eq!(bits.iter_colors().collect::<Vec<_>>(), vec![129]);
        assert_eq!(more.iter_colors().collect::<Vec<_>>(), vec![64, 129]);
        assert!(bits.is_subset_of(&more));
        assert!(!more.is_subset_of(&bits));
    }

    #[test]
    fn test_all_and_tail() {
        let all = ColorBits::all(70);
        assert_eq!(all.count_ones(), 70);
        assert!(all.is_all_set());
        let trimmed = ColorBits::from_words(3, vec![u64::MAX, 7]);
        assert_eq!(trimmed.words(), &[0b111]);
        assert_eq!(trimmed, ColorBits::all(3));
    }

    #[test]
    fn test_union() {
        let a = ColorBits::from_colors(5, &[0, 1]).unwrap();
        let b = ColorBits::from_colors(5, &[1, 4]).unwrap();
        assert_eq!(a.union(&b).unwrap().to_string(), "11001");
        let c = ColorBits::new(6);
        assert!(matches!(
            a.union(&c),
            Err(Error::ColorSetError(ColorSetError::WidthMismatch {
                expected: 5,
                got: 6
            }))
        ));
    }

    #[test]
    fn test_content_hash() {
        let a = ColorBits::from_colors(100, &[3, 70]).unwrap();
        let b = ColorBits::new(100).with_color(70).unwrap().with_color(3).unwrap();
        assert_eq!(a.content_hash(), b.content_hash());
        assert_ne!(a.content_hash(), ColorBits::new(100).content_hash());
        // same words, different width
        assert_ne!(ColorBits::new(10).content_hash(), ColorBits::new(11).content_hash());
    }
}
