//! Error types for bank loading.

use crate::riff::FourCc;
use thiserror::Error;

/// Errors that can occur while loading an instrument bank.
///
/// The loaders distinguish three classes of trouble:
///
/// - Structural errors: the file contradicts its own declared layout
///   (bad sizes, backwards indices, dangling references). The bank is
///   rejected as a whole.
/// - Resource errors: the environment failed underneath the loader
///   (I/O, allocation). Also fatal for the load in progress.
/// - Validation findings: questionable values inside an otherwise
///   well-formed bank. These are repaired or disabled in place and only
///   logged, so they never appear in this enum.
#[derive(Error, Debug)]
pub enum LoadError {
    /// The file does not start with a RIFF container.
    #[error("not a RIFF file")]
    NotRiff,

    /// The container's form type is not the expected bank type.
    #[error("RIFF form type is '{found}', expected '{expected}'")]
    WrongFormType { expected: FourCc, found: FourCc },

    /// A chunk appeared where a different one was required.
    #[error("unexpected chunk '{found}', expected '{expected}'")]
    UnexpectedChunk { expected: FourCc, found: FourCc },

    /// A chunk's declared size contradicts its content or its parent.
    #[error("invalid size for chunk '{0}'")]
    BadChunkSize(FourCc),

    /// A record table's size does not divide into whole records.
    #[error("'{0}' table size is not a multiple of its record size")]
    BadTableSize(FourCc),

    /// Zone start indices in a header or bag table ran backwards.
    #[error("{0} indices are not monotonic")]
    NonMonotonic(&'static str),

    /// A cross-table reference points past the end of its target table.
    #[error("{what} reference {index} out of range (table has {len} entries)")]
    InvalidReference {
        what: &'static str,
        index: usize,
        len: usize,
    },

    /// The bank declares a format version this loader does not handle.
    #[error("unsupported bank version {major}.{minor:02}")]
    UnsupportedVersion { major: u16, minor: u16 },

    /// A conditional-load expression pushed past its value stack.
    #[error("conditional-load expression stack overflow")]
    CdlStackOverflow,

    /// A conditional-load expression popped an empty value stack.
    #[error("conditional-load expression stack underflow")]
    CdlStackUnderflow,

    /// A conditional-load expression used an opcode outside the defined set.
    #[error("unknown conditional-load opcode {0:#06x}")]
    CdlBadOpcode(u16),

    /// A conditional-load expression asked for the value of a capability
    /// this implementation does not define.
    #[error("conditional-load query for an unsupported capability")]
    CdlUnsupportedQuery,

    /// A conditional-load expression ended without leaving a result.
    #[error("conditional-load expression left no result")]
    CdlNoResult,

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Structural corruption that fits no more specific variant.
    #[error("{0}")]
    Corrupt(String),
}

/// Result type alias using LoadError.
pub type Result<T> = std::result::Result<T, LoadError>;
