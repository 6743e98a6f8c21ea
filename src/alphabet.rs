//! Symbol alphabets and their dense integer codes
//!
//! An [`Alphabet`] maps symbol bytes (nucleotide or amino acid letters) to dense codes in
//! `[0, size)` and back, and reports how many bits are needed to store one code.
//! Codes follow the order in which symbols were given, so the numeric order of encoded
//! k-mers matches the lexicographic order of their strings under that symbol order.
//!
//! Unknown bytes never map to a valid code: [`Alphabet::encode`] returns `None` for them,
//! which the extractor turns into a window restart.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::error::{AlphabetError, Result};

/// Maximum number of symbols an alphabet can hold
pub const MAX_ALPHABET_SIZE: usize = 256;

/// A fixed, ordered set of symbols with an optional complement relation
#[derive(Clone, PartialEq, Eq)]
pub struct Alphabet {
    /// Symbols in code order
    symbols: Vec<u8>,
    /// Lookup table from raw byte to code
    ranks: [Option<u8>; 256],
    /// Complement code for each code, if the alphabet defines one
    complement: Option<Vec<u8>>,
    /// Bits required per encoded symbol
    bits_per_symbol: usize,
    /// Whether both letter cases of symbols and aliases are accepted
    fold_case: bool,
}

impl Alphabet {
    /// Creates a case-sensitive alphabet from the given symbols in code order
    ///
    /// # Errors
    ///
    /// Fails with [`AlphabetError::Empty`] or [`AlphabetError::TooLarge`] if the symbol set is
    /// empty or has more than 256 symbols, and with [`AlphabetError::DuplicateSymbol`] if a
    /// symbol repeats.
    pub fn new(symbols: &[u8]) -> Result<Self> {
        if symbols.is_empty() {
            return Err(AlphabetError::Empty.into());
        }
        if symbols.len() > MAX_ALPHABET_SIZE {
            return Err(AlphabetError::TooLarge(symbols.len()).into());
        }

        let mut ranks = [None; 256];
        for (code, &symbol) in symbols.iter().enumerate() {
            if ranks[symbol as usize].is_some() {
                return Err(AlphabetError::DuplicateSymbol(symbol).into());
            }
            ranks[symbol as usize] = Some(code as u8);
        }

        Ok(Self {
            symbols: symbols.to_vec(),
            ranks,
            complement: None,
            bits_per_symbol: bits_for_size(symbols.len()),
            fold_case: false,
        })
    }

    /// Accepts the other letter case of every alphabetic symbol as the same code
    ///
    /// Applies to aliases registered before and after this call.
    pub fn case_insensitive(mut self) -> Result<Self> {
        self.fold_case = true;
        let mapped: Vec<(u8, u8)> = (0..=u8::MAX)
            .filter_map(|byte| self.ranks[byte as usize].map(|code| (byte, code)))
            .collect();
        for (byte, code) in mapped {
            self.map_other_case(byte, code)?;
        }
        Ok(self)
    }

    fn map_other_case(&mut self, byte: u8, code: u8) -> Result<()> {
        for other in [byte.to_ascii_lowercase(), byte.to_ascii_uppercase()] {
            if other == byte {
                continue;
            }
            match self.ranks[other as usize] {
                None => self.ranks[other as usize] = Some(code),
                Some(existing) if existing == code => {}
                Some(_) => return Err(AlphabetError::DuplicateSymbol(other).into()),
            }
        }
        Ok(())
    }

    /// Maps additional input bytes onto existing symbols (e.g. `U` read as `T`)
    ///
    /// Aliases only affect encoding; decoding always yields the canonical symbol.
    pub fn with_aliases(mut self, aliases: &[(u8, u8)]) -> Result<Self> {
        for &(alias, target) in aliases {
            let code = self.ranks[target as usize]
                .ok_or(AlphabetError::UnknownComplementSymbol(target))?;
            if self.ranks[alias as usize].is_some_and(|existing| existing != code) {
                return Err(AlphabetError::DuplicateSymbol(alias).into());
            }
            self.ranks[alias as usize] = Some(code);
            if self.fold_case {
                self.map_other_case(alias, code)?;
            }
        }
        Ok(self)
    }

    /// Defines the complement relation through symbol pairs
    ///
    /// Every symbol must appear in exactly one pair; a symbol paired with itself is its own
    /// complement (e.g. `N` or `S` in the IUPAC alphabet).
    pub fn with_complement(mut self, pairs: &[(u8, u8)]) -> Result<Self> {
        let mut table: Vec<Option<u8>> = vec![None; self.symbols.len()];
        for &(a, b) in pairs {
            let ca = self.ranks[a as usize].ok_or(AlphabetError::UnknownComplementSymbol(a))?;
            let cb = self.ranks[b as usize].ok_or(AlphabetError::UnknownComplementSymbol(b))?;
            for (from, to) in [(ca, cb), (cb, ca)] {
                match table[from as usize] {
                    None => table[from as usize] = Some(to),
                    Some(existing) if existing == to => {}
                    Some(_) => {
                        return Err(
                            AlphabetError::InconsistentComplement(self.symbols[from as usize])
                                .into(),
                        )
                    }
                }
            }
        }

        let mut complement = Vec::with_capacity(table.len());
        for (code, entry) in table.into_iter().enumerate() {
            match entry {
                Some(to) => complement.push(to),
                None => {
                    return Err(AlphabetError::InconsistentComplement(self.symbols[code]).into())
                }
            }
        }
        self.complement = Some(complement);
        Ok(self)
    }

    /// The four nucleotides `ACGT` with Watson-Crick complements
    ///
    /// Lowercase input is accepted and `U` is read as `T`.
    #[must_use]
    pub fn dna() -> &'static Self {
        static DNA: OnceLock<Alphabet> = OnceLock::new();
        DNA.get_or_init(|| {
            build_preset(b"ACGT", &[(b'A', b'T'), (b'C', b'G')], &[(b'U', b'T')])
        })
    }

    /// The four ribonucleotides `ACGU` with complements
    #[must_use]
    pub fn rna() -> &'static Self {
        static RNA: OnceLock<Alphabet> = OnceLock::new();
        RNA.get_or_init(|| build_preset(b"ACGU", &[(b'A', b'U'), (b'C', b'G')], &[]))
    }

    /// The IUPAC nucleotide ambiguity codes, `N` included as a valid symbol
    #[must_use]
    pub fn dna_iupac() -> &'static Self {
        static IUPAC: OnceLock<Alphabet> = OnceLock::new();
        IUPAC.get_or_init(|| {
            build_preset(
                b"ACGTRYSWKMBDHVN",
                &[
                    (b'A', b'T'),
                    (b'C', b'G'),
                    (b'R', b'Y'),
                    (b'S', b'S'),
                    (b'W', b'W'),
                    (b'K', b'M'),
                    (b'B', b'V'),
                    (b'D', b'H'),
                    (b'N', b'N'),
                ],
                &[(b'U', b'T')],
            )
        })
    }

    /// The twenty standard amino acids; no complement is defined
    #[must_use]
    pub fn protein() -> &'static Self {
        static PROTEIN: OnceLock<Alphabet> = OnceLock::new();
        PROTEIN.get_or_init(|| build_preset(b"ACDEFGHIKLMNPQRSTVWY", &[], &[]))
    }

    /// Encodes a symbol byte into its code, or `None` if the byte is not in the alphabet
    #[inline]
    #[must_use]
    pub fn encode(&self, symbol: u8) -> Option<u8> {
        self.ranks[symbol as usize]
    }

    /// Decodes a code back into its symbol byte
    #[inline]
    #[must_use]
    pub fn decode(&self, code: u8) -> Option<u8> {
        self.symbols.get(code as usize).copied()
    }

    /// Returns the complement code of `code`, if the alphabet defines complements
    #[inline]
    #[must_use]
    pub fn complement(&self, code: u8) -> Option<u8> {
        self.complement
            .as_ref()
            .and_then(|table| table.get(code as usize).copied())
    }

    /// Returns the full complement table indexed by code
    #[must_use]
    pub fn complement_table(&self) -> Option<&[u8]> {
        self.complement.as_deref()
    }

    #[must_use]
    pub fn has_complement(&self) -> bool {
        self.complement.is_some()
    }

    /// Checks if a raw byte is encodable
    #[inline]
    #[must_use]
    pub fn is_valid(&self, symbol: u8) -> bool {
        self.ranks[symbol as usize].is_some()
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.symbols.len()
    }

    /// Number of bits needed per symbol: `ceil(log2(size))`, at least one
    #[must_use]
    pub fn bits_per_symbol(&self) -> usize {
        self.bits_per_symbol
    }

    #[must_use]
    pub fn symbols(&self) -> &[u8] {
        &self.symbols
    }

    /// Checks for the layout that allows bitwise complementing: four codes where the
    /// complement of `c` is `3 - c` (as in `ACGT`)
    #[must_use]
    pub fn negation_is_complement(&self) -> bool {
        self.size() == 4
            && self
                .complement
                .as_ref()
                .is_some_and(|table| table.iter().enumerate().all(|(c, &r)| r as usize == 3 - c))
    }
}

impl fmt::Debug for Alphabet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Alphabet")
            .field("symbols", &String::from_utf8_lossy(&self.symbols))
            .field("bits_per_symbol", &self.bits_per_symbol)
            .field("complement", &self.complement.is_some())
            .finish()
    }
}

fn bits_for_size(size: usize) -> usize {
    let bits = (usize::BITS - (size - 1).leading_zeros()) as usize;
    bits.max(1)
}

/// Builds one of the static presets; the inputs are fixed and known to be valid.
fn build_preset(symbols: &[u8], pairs: &[(u8, u8)], aliases: &[(u8, u8)]) -> Alphabet {
    let build = || -> Result<Alphabet> {
        let mut alphabet = Alphabet::new(symbols)?.with_aliases(aliases)?;
        if !pairs.is_empty() {
            alphabet = alphabet.with_complement(pairs)?;
        }
        alphabet.case_insensitive()
    };
    match build() {
        Ok(alphabet) => alphabet,
        Err(err) => unreachable!("preset alphabet is malformed: {err}"),
    }
}

/// Named alphabets that can be selected from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlphabetKind {
    /// `ACGT` nucleotides
    #[default]
    Dna,
    /// `ACGU` ribonucleotides
    Rna,
    /// IUPAC nucleotide codes including ambiguity symbols
    DnaIupac,
    /// The twenty standard amino acids
    Protein,
}
impl AlphabetKind {
    /// Returns the shared alphabet for this kind
    #[must_use]
    pub fn alphabet(&self) -> &'static Alphabet {
        match self {
            Self::Dna => Alphabet::dna(),
            Self::Rna => Alphabet::rna(),
            Self::DnaIupac => Alphabet::dna_iupac(),
            Self::Protein => Alphabet::protein(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Dna => "dna",
            Self::Rna => "rna",
            Self::DnaIupac => "dna-iupac",
            Self::Protein => "protein",
        }
    }
}
impl FromStr for AlphabetKind {
    type Err = AlphabetError;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "dna" | "DNA" | "nt" => Ok(Self::Dna),
            "rna" | "RNA" => Ok(Self::Rna),
            "dna-iupac" | "iupac" | "IUPAC" => Ok(Self::DnaIupac),
            "protein" | "aa" | "AA" => Ok(Self::Protein),
            _ => Err(AlphabetError::UnknownAlphabet(s.to_string())),
        }
    }
}
impl fmt::Display for AlphabetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_dna_codes() {
        let dna = Alphabet::dna();
        assert_eq!(dna.size(), 4);
        assert_eq!(dna.bits_per_symbol(), 2);
        for (code, &symbol) in b"ACGT".iter().enumerate() {
            assert_eq!(dna.encode(symbol), Some(code as u8));
            assert_eq!(dna.decode(code as u8), Some(symbol));
        }
        assert_eq!(dna.encode(b'c'), Some(1));
        assert_eq!(dna.encode(b'U'), Some(3));
        assert_eq!(dna.encode(b'u'), Some(3));
        assert_eq!(dna.encode(b'N'), None);
        assert_eq!(dna.encode(b'n'), None);
        assert_eq!(dna.decode(4), None);
    }

    #[test]
    fn test_aliases_follow_case_folding() {
        let before = Alphabet::new(b"ACGT")
            .unwrap()
            .with_aliases(&[(b'U', b'T')])
            .unwrap()
            .case_insensitive()
            .unwrap();
        let after = Alphabet::new(b"ACGT")
            .unwrap()
            .case_insensitive()
            .unwrap()
            .with_aliases(&[(b'U', b'T')])
            .unwrap();
        for alphabet in [&before, &after] {
            assert_eq!(alphabet.encode(b'u'), Some(3));
            assert_eq!(alphabet.encode(b't'), Some(3));
            assert_eq!(alphabet.decode(3), Some(b'T'));
        }

        let sensitive = Alphabet::new(b"ACGT")
            .unwrap()
            .with_aliases(&[(b'U', b'T')])
            .unwrap();
        assert_eq!(sensitive.encode(b'u'), None);
    }

    #[test]
    fn test_dna_complement() {
        let dna = Alphabet::dna();
        assert_eq!(dna.complement_table(), Some(&[3, 2, 1, 0][..]));
        assert!(dna.negation_is_complement());
    }

    #[test]
    fn test_bits_per_symbol() {
        assert_eq!(bits_for_size(1), 1);
        assert_eq!(bits_for_size(2), 1);
        assert_eq!(bits_for_size(3), 2);
        assert_eq!(bits_for_size(4), 2);
        assert_eq!(bits_for_size(5), 3);
        assert_eq!(bits_for_size(16), 4);
        assert_eq!(bits_for_size(20), 5);
        assert_eq!(bits_for_size(256), 8);
    }

    #[test]
    fn test_presets() {
        assert_eq!(Alphabet::protein().bits_per_symbol(), 5);
        assert!(!Alphabet::protein().has_complement());
        let iupac = Alphabet::dna_iupac();
        assert_eq!(iupac.bits_per_symbol(), 4);
        let n = iupac.encode(b'N').unwrap();
        assert_eq!(iupac.complement(n), Some(n));
        let r = iupac.encode(b'R').unwrap();
        assert_eq!(iupac.complement(r), iupac.encode(b'Y'));
        assert!(!iupac.negation_is_complement());
        assert_eq!(Alphabet::rna().encode(b'u'), Some(3));
    }

    #[test]
    fn test_empty_alphabet() {
        let err = Alphabet::new(b"").unwrap_err();
        assert!(matches!(err, Error::AlphabetError(AlphabetError::Empty)));
    }

    #[test]
    fn test_too_large_alphabet() {
        let symbols: Vec<u8> = (0..=255u8).chain(std::iter::once(0)).collect();
        let err = Alphabet::new(&symbols).unwrap_err();
        assert!(matches!(err, Error::AlphabetError(AlphabetError::TooLarge(257))));
    }

    #[test]
    fn test_full_byte_alphabet() {
        let symbols: Vec<u8> = (0..=255u8).collect();
        let alphabet = Alphabet::new(&symbols).unwrap();
        assert_eq!(alphabet.size(), 256);
        assert_eq!(alphabet.bits_per_symbol(), 8);
        assert_eq!(alphabet.encode(255), Some(255));
    }

    #[test]
    fn test_duplicate_symbol() {
        let err = Alphabet::new(b"ACGA").unwrap_err();
        assert!(matches!(
            err,
            Error::AlphabetError(AlphabetError::DuplicateSymbol(b'A'))
        ));
        let err = Alphabet::new(b"Aa").unwrap().case_insensitive().unwrap_err();
        assert!(matches!(err, Error::AlphabetError(AlphabetError::DuplicateSymbol(_))));
    }

    #[test]
    fn test_incomplete_complement() {
        let err = Alphabet::new(b"ACGT")
            .unwrap()
            .with_complement(&[(b'A', b'T')])
            .unwrap_err();
        assert!(matches!(
            err,
            Error::AlphabetError(AlphabetError::InconsistentComplement(b'C'))
        ));
    }

    #[test]
    fn test_inconsistent_complement() {
        let err = Alphabet::new(b"ACGT")
            .unwrap()
            .with_complement(&[(b'A', b'T'), (b'A', b'C'), (b'G', b'G')])
            .unwrap_err();
        assert!(matches!(
            err,
            Error::AlphabetError(AlphabetError::InconsistentComplement(_))
        ));
    }

    #[test]
    fn test_custom_complement() {
        let binary = Alphabet::new(b"01")
            .unwrap()
            .with_complement(&[(b'0', b'1')])
            .unwrap();
        assert_eq!(binary.bits_per_symbol(), 1);
        assert_eq!(binary.complement(0), Some(1));
        assert_eq!(binary.complement(1), Some(0));
    }

    #[test]
    fn test_alphabet_kind_from_str() {
        assert_eq!("dna".parse::<AlphabetKind>().unwrap(), AlphabetKind::Dna);
        assert_eq!("iupac".parse::<AlphabetKind>().unwrap(), AlphabetKind::DnaIupac);
        assert_eq!("aa".parse::<AlphabetKind>().unwrap(), AlphabetKind::Protein);
        assert!("xyz".parse::<AlphabetKind>().is_err());
        assert_eq!(AlphabetKind::DnaIupac.to_string(), "dna-iupac");
        assert_eq!(AlphabetKind::default().alphabet(), Alphabet::dna());
    }
}
