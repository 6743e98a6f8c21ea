use std::error::Error as StdError;

/// Custom Result type for kmercolor operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the kmercolor library, encompassing all possible error cases
/// that can occur while encoding k-mers or maintaining color sets.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Errors raised while constructing an alphabet
    #[error("Error building alphabet: {0}")]
    AlphabetError(#[from] AlphabetError),

    /// Errors raised by the multi-word bit container
    #[error("Error accessing bitfield: {0}")]
    BitfieldError(#[from] BitfieldError),

    /// Errors raised while encoding, decoding or canonicalizing k-mers
    #[error("Error processing k-mer: {0}")]
    KmerError(#[from] KmerError),

    /// Errors raised by the color set store
    #[error("Error processing color set: {0}")]
    ColorSetError(#[from] ColorSetError),

    /// Errors raised while validating an index configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(#[from] ConfigError),

    /// Errors raised while reading a serialized color table
    #[error("Error reading color table: {0}")]
    TableError(#[from] TableError),

    /// Standard I/O errors
    #[error("Error with IO: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic errors for other unexpected situations
    #[error("Generic error: {0}")]
    GenericError(#[from] Box<dyn StdError + Send + Sync>),
}
impl Error {
    /// Checks if the error was caused by the input data rather than by the setup
    ///
    /// Data errors (an unencodable symbol in a sequence) are recoverable: the extractor
    /// already turns them into window restarts, and other callers may skip the record.
    ///
    /// # Returns
    ///
    /// * `true` if the error is a `KmerError::InvalidSymbol`
    /// * `false` for all other error types
    #[must_use]
    pub fn is_data_error(&self) -> bool {
        matches!(self, Self::KmerError(KmerError::InvalidSymbol { .. }))
    }

    /// Checks if the error indicates a misconfiguration of the caller's setup
    ///
    /// These errors are never recovered locally and should abort an indexing run
    /// before any work is done.
    #[must_use]
    pub fn is_misconfiguration(&self) -> bool {
        match self {
            Self::AlphabetError(_) | Self::ConfigError(_) | Self::BitfieldError(_) => true,
            Self::KmerError(err) => !matches!(err, KmerError::InvalidSymbol { .. }),
            Self::ColorSetError(err) => matches!(
                err,
                ColorSetError::ColorOutOfRange { .. } | ColorSetError::WidthMismatch { .. }
            ),
            _ => false,
        }
    }
}

/// Errors that can occur while constructing an [`Alphabet`](crate::Alphabet)
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum AlphabetError {
    /// No symbols were provided
    #[error("Alphabet must contain at least one symbol")]
    Empty,

    /// More symbols were provided than can be addressed by a byte
    #[error("Alphabet has {0} symbols but at most 256 are supported")]
    TooLarge(usize),

    /// The same symbol (case-folded if case-insensitive) appears twice
    #[error("Duplicate symbol '{}' in alphabet", as_char(.0))]
    DuplicateSymbol(u8),

    /// A complement pair names a symbol outside of the alphabet
    #[error("Complement pair references unknown symbol '{}'", as_char(.0))]
    UnknownComplementSymbol(u8),

    /// A complement mapping does not cover every symbol or is not an involution
    #[error("Complement mapping is incomplete or inconsistent for symbol '{}'", as_char(.0))]
    InconsistentComplement(u8),

    /// Alphabet name could not be parsed
    #[error("Unknown alphabet: {0}")]
    UnknownAlphabet(String),
}

/// Errors that can occur while accessing a [`Bitfield`](crate::Bitfield)
///
/// These indicate a logic bug in the caller: correctly sized k-mers never trigger them.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum BitfieldError {
    /// An access addressed bits beyond the capacity of the field
    ///
    /// # Fields
    /// * `offset` - First addressed bit
    /// * `width` - Number of addressed bits
    /// * `capacity` - Capacity of the field in bits
    #[error("Bit range [{offset}, {offset}+{width}) is out of range for capacity {capacity}")]
    OutOfRange {
        offset: usize,
        width: usize,
        capacity: usize,
    },

    /// A value does not fit into the addressed sub-field
    #[error("Value {value} does not fit into a field of {width} bits")]
    ValueTooWide { value: u64, width: usize },

    /// A requested capacity exceeds what the backing words can hold
    #[error("Requested capacity {requested} exceeds the maximum of {max} bits")]
    CapacityTooLarge { requested: usize, max: usize },
}

/// Errors that can occur while encoding, decoding or canonicalizing k-mers
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum KmerError {
    /// A symbol could not be encoded by the alphabet
    ///
    /// # Fields
    /// * `position` - 0-based position of the offending symbol
    /// * `symbol` - The raw byte that was found
    #[error("Invalid symbol '{}' at position {position}", as_char(.symbol))]
    InvalidSymbol { position: usize, symbol: u8 },

    /// The input does not have exactly `k` symbols
    #[error("Expected {expected} symbols but got {got}")]
    LengthMismatch { expected: usize, got: usize },

    /// `k` is zero or the encoded width exceeds the supported number of bits
    #[error("Invalid k ({k}) for {bits_per_symbol} bits per symbol: at most {max_bits} bits supported")]
    InvalidK {
        k: usize,
        bits_per_symbol: usize,
        max_bits: usize,
    },

    /// The alphabet has no complement relation, so reverse complements are undefined
    #[error("No complement is defined for this alphabet")]
    NoComplementDefined,

    /// A code is not a valid rank in the alphabet
    #[error("Code {code} is out of range for an alphabet of size {size}")]
    InvalidCode { code: u8, size: usize },

    /// A persisted value has bits set outside of the k-mer width or invalid codes
    #[error("Encoded value is not a valid {k}-mer for this alphabet")]
    MalformedValue { k: usize },

    /// The k-mer does not fit into a single machine word
    #[error("K-mer of {bits} bits does not fit into a 64 bit word")]
    TooWideForWord { bits: usize },

    /// The operation requires the plain 4-symbol nucleotide alphabet
    #[error("Operation requires the 2-bit nucleotide alphabet with negation as complement")]
    RequiresNucleotides,

    /// The k-mer was encoded with a different alphabet than the index expects
    #[error("K-mer alphabet does not match the alphabet of the index")]
    AlphabetMismatch,
}

/// Errors raised by the [`ColorSetStore`](crate::ColorSetStore)
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ColorSetError {
    /// A color index is beyond the configured color universe
    #[error("Color {color} is out of range for a universe of {universe_size} colors")]
    ColorOutOfRange { color: usize, universe_size: usize },

    /// An identifier was never issued by this store
    #[error("Unknown color set id {0}")]
    UnknownId(u32),

    /// A bit vector does not have the width of the store's color universe
    #[error("Bit vector of {got} bits does not match the color universe of {expected}")]
    WidthMismatch { expected: usize, got: usize },

    /// The store has reached its maximum number of color sets
    #[error("Color set store is saturated at {0} color sets")]
    Saturated(usize),

    /// No stored color set is a superset of the requested one
    #[error("No stored color set is a superset of the requested set")]
    NoSuperset,

    /// Secondary colors were requested with an invalid bit vector
    #[error("Secondary colors need at least two set bits and must be unique")]
    InvalidSecondaryColor,

    /// Secondary colors can only be initialized once, before any other set is created
    #[error("Secondary colors have already been initialized")]
    SecondaryColorsInitialized,

    /// Joins can only be precomputed once no further sets can be stored
    #[error("Color set store is not saturated")]
    NotSaturated,

    /// Two ids name the same content
    #[error("Color set ids {first} and {second} have the same content")]
    DuplicateContent { first: u32, second: u32 },
}

/// Errors raised while validating an [`IndexConfig`](crate::IndexConfig)
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// `k` was not provided
    #[error("Missing k-mer length")]
    MissingK,

    /// `k` is zero or too large for the alphabet's bit width
    #[error("K-mer length {k} is invalid: must be in [1, {max_k}] for this alphabet")]
    InvalidK { k: usize, max_k: usize },

    /// The color universe must hold at least one color
    #[error("Color universe size must be positive")]
    ZeroColorUniverse,

    /// The pre-seeded sets of the color universe do not fit the id space
    #[error("Color universe size {size} exceeds the maximum of {max}")]
    ColorUniverseTooLarge { size: usize, max: usize },

    /// Canonical k-mers were requested for an alphabet without complement
    #[error("Canonical k-mers require an alphabet with a complement relation")]
    CanonicalWithoutComplement,

    /// The maximum number of color sets cannot hold the pre-seeded sets
    #[error("Max color count {max} cannot hold the {required} pre-seeded color sets")]
    MaxColorCountTooSmall { max: usize, required: usize },

    /// The substitution budget exceeds the k-mer length
    #[error("Substitution budget {budget} exceeds k ({k})")]
    SubstitutionBudgetTooLarge { budget: usize, k: usize },
}

/// Errors raised while decoding a serialized color table
#[derive(thiserror::Error, Debug)]
pub enum TableError {
    /// The magic bytes did not match
    #[error("Invalid color table magic")]
    InvalidMagic,

    /// The format version is not supported
    #[error("Invalid color table version: {0}")]
    InvalidVersion(u8),

    /// The table does not begin with the pre-seeded empty and primary sets
    #[error("Color table does not start with the empty and primary color sets")]
    MissingSeedColors,

    /// A stored set repeats the content of an earlier one
    #[error("Color table stores the content of id {0} twice")]
    DuplicateColorSet(u32),

    /// A header field is out of range for a loadable table
    #[error("Color table header field {field} has invalid value {value}")]
    InvalidHeader { field: &'static str, value: u64 },
}

fn as_char(byte: &u8) -> char {
    char::from(*byte)
}

/// Trait for converting arbitrary errors into `Error`
pub trait IntoKmerColorError {
    fn into_kmercolor_error(self) -> Error;
}

impl<E> IntoKmerColorError for E
where
    E: StdError + Send + Sync + 'static,
{
    fn into_kmercolor_error(self) -> Error {
        Error::GenericError(Box::new(self))
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum MyError {
        #[error("Custom error: {0}")]
        CustomError(String),
    }

    #[test]
    fn test_into_kmercolor_error() {
        let my_error = MyError::CustomError(String::from("some error"));
        let error = my_error.into_kmercolor_error();
        assert!(matches!(error, Error::GenericError(_)));
    }

    #[test]
    fn test_invalid_symbol_is_data_error() {
        let error: Error = KmerError::InvalidSymbol {
            position: 3,
            symbol: b'N',
        }
        .into();
        assert!(error.is_data_error());
        assert!(!error.is_misconfiguration());
    }

    #[test]
    fn test_misconfiguration_errors() {
        let errors: Vec<Error> = vec![
            AlphabetError::Empty.into(),
            KmerError::NoComplementDefined.into(),
            BitfieldError::OutOfRange {
                offset: 60,
                width: 8,
                capacity: 64,
            }
            .into(),
            ColorSetError::ColorOutOfRange {
                color: 5,
                universe_size: 4,
            }
            .into(),
            ConfigError::ZeroColorUniverse.into(),
        ];
        for error in errors {
            assert!(error.is_misconfiguration(), "{error}");
            assert!(!error.is_data_error());
        }
    }

    #[test]
    fn test_unknown_id_is_not_misconfiguration() {
        let error: Error = ColorSetError::UnknownId(17).into();
        assert!(!error.is_misconfiguration());
        assert!(format!("{error}").contains("17"));
    }

    #[test]
    fn test_invalid_symbol_display() {
        let error = KmerError::InvalidSymbol {
            position: 2,
            symbol: b'N',
        };
        let error_str = format!("{error}");
        assert!(error_str.contains('N'));
        assert!(error_str.contains('2'));
    }

    #[test]
    fn test_out_of_range_display() {
        let error = BitfieldError::OutOfRange {
            offset: 60,
            width: 8,
            capacity: 64,
        };
        let error_str = format!("{error}");
        assert!(error_str.contains("60"));
        assert!(error_str.contains("64"));
    }

    #[test]
    fn test_value_too_wide_display() {
        let error = BitfieldError::ValueTooWide { value: 9, width: 3 };
        let error_str = format!("{error}");
        assert!(error_str.contains('9'));
        assert!(error_str.contains('3'));
    }

    #[test]
    fn test_duplicate_symbol_display() {
        let error = AlphabetError::DuplicateSymbol(b'A');
        assert!(format!("{error}").contains("'A'"));
    }

    #[test]
    fn test_error_from_color_set_error() {
        let error: Error = ColorSetError::Saturated(128).into();
        assert!(matches!(error, Error::ColorSetError(_)));
        assert!(format!("{error}").contains("128"));
    }

    #[test]
    fn test_error_from_io_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let error: Error = io_error.into();
        assert!(matches!(error, Error::IoError(_)));
    }

    #[test]
    fn test_error_debug_output() {
        let error = Error::ConfigError(ConfigError::MissingK);
        let debug_str = format!("{error:?}");
        assert!(debug_str.contains("ConfigError"));
    }
}
