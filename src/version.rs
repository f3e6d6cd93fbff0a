//! BCF2 prologue version gating.

use crate::error::{BcfError, Result};

pub const MAGIC: &[u8; 4] = b"BCF\x02";
const MAGIC_PREFIX: &[u8; 3] = b"BCF";
const MAJOR_VERSION: u8 = 2;

/// The two supported minor versions. The difference between them is
/// confined to FORMAT/INFO vector padding and multi-string joins;
/// everything else in the wire layout is identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinorVersion {
    V1,
    V2,
}

impl MinorVersion {
    pub fn from_byte(minor: u8) -> Result<Self> {
        match minor {
            1 => Ok(MinorVersion::V1),
            2 => Ok(MinorVersion::V2),
            other => Err(BcfError::UnsupportedVersion {
                major: MAJOR_VERSION,
                minor: other,
            }),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            MinorVersion::V1 => 1,
            MinorVersion::V2 => 2,
        }
    }

    /// Vectors shorter than the declared length are padded with the
    /// end-of-vector sentinel in v2.2 and with the missing sentinel in
    /// v2.1 — the sole behavioral vector-padding difference between the
    /// two minor versions.
    pub fn pads_with_eov(self) -> bool {
        matches!(self, MinorVersion::V2)
    }

    /// Multi-string INFO/FORMAT joins carry a leading comma in v2.1 and
    /// do not in v2.2.
    pub fn leading_comma_join(self) -> bool {
        matches!(self, MinorVersion::V1)
    }

    /// Dictionary entries carrying an `IDX=` attribute are only honored
    /// starting at minor version 2; a v2.1 header building an indexed
    /// dictionary from `IDX=` would be a spec violation.
    pub fn honors_idx(self) -> bool {
        matches!(self, MinorVersion::V2)
    }
}

pub fn check_magic(bytes: &[u8]) -> Result<()> {
    if bytes.len() < 3 || &bytes[..3] != MAGIC_PREFIX {
        return Err(BcfError::InvalidMagic {
            found: bytes.to_vec(),
        });
    }
    Ok(())
}

pub fn check_major(major: u8) -> Result<()> {
    if major != MAJOR_VERSION {
        return Err(BcfError::UnsupportedVersion { major, minor: 0 });
    }
    Ok(())
}
