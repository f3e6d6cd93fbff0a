//! The error taxonomy for the codec core.
//!
//! Every fallible operation in this crate returns [`Result<T>`], an alias
//! for `std::result::Result<T, BcfError>`. Errors are structural: the
//! codec never retries or skips ahead on a malformed record, it reports
//! and the caller closes the stream.

use std::io;

use thiserror::Error;

/// Where in the stream an error was encountered, when that information is
/// available at the call site. `byte_offset` is relative to the start of
/// the record's sites or genotypes block, not the whole file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
    pub record_index: usize,
    pub byte_offset: usize,
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "record {} (byte offset {})",
            self.record_index, self.byte_offset
        )
    }
}

#[derive(Error, Debug)]
pub enum BcfError {
    #[error("not a BCF2 file: expected magic b\"BCF\\x02\", got {found:?}")]
    InvalidMagic { found: Vec<u8> },

    #[error("unsupported BCF version {major}.{minor}: only major=2, minor in {{1,2}} are supported")]
    UnsupportedVersion { major: u8, minor: u8 },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("malformed record at {at}: {reason}")]
    MalformedRecord { at: Position, reason: String },

    #[error("invalid typing byte at {at}: {reason}")]
    InvalidTyping { at: Position, reason: String },

    #[error(
        "field {key:?} carries {observed} values but the header bounds it to {bound} at {at}"
    )]
    CardinalityViolation {
        at: Position,
        key: String,
        observed: usize,
        bound: usize,
    },

    #[error("value for field {key:?} is not compatible with its declared header type: {reason}")]
    IncompatibleValue { key: String, reason: String },

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, BcfError>;
