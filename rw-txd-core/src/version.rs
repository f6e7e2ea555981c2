//! RenderWare library version handling
//!
//! A RenderWare version is four small numbers (`3.6.0.3`) plus an optional
//! build number. Chunk headers carry it in a packed "stamp" whose layout
//! changed with 3.1.0.1; both layouts are understood here.

use crate::error::{CoreError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Build number sentinel meaning "no build number"
pub const NO_BUILD_NUMBER: u16 = 0xFFFF;

static VERSION_REGEX: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"^\s*(\d+)\.(\d+)\.(\d+)\.(\d+)\s*(?:\(build:\s*(\d+)\s*\))?\s*$").ok()
});

/// RenderWare library version
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LibraryVersion {
    pub lib_major: u8,
    pub lib_minor: u8,
    pub rev_major: u8,
    pub rev_minor: u8,
    pub build_number: u16,
}

impl Default for LibraryVersion {
    fn default() -> Self {
        Self::new(3, 0, 0, 0)
    }
}

impl LibraryVersion {
    /// Create a version without a build number
    pub const fn new(lib_major: u8, lib_minor: u8, rev_major: u8, rev_minor: u8) -> Self {
        Self {
            lib_major,
            lib_minor,
            rev_major,
            rev_minor,
            build_number: NO_BUILD_NUMBER,
        }
    }

    /// Same version with the given build number
    pub const fn with_build(mut self, build_number: u16) -> Self {
        self.build_number = build_number;
        self
    }

    /// The version most commonly found in San Andreas era archives
    pub const fn san_andreas() -> Self {
        Self::new(3, 6, 0, 3).with_build(NO_BUILD_NUMBER)
    }

    /// Packed 32-bit value, major in the highest byte
    pub const fn packed(&self) -> u32 {
        (self.lib_major as u32) << 24
            | (self.lib_minor as u32) << 16
            | (self.rev_major as u32) << 8
            | self.rev_minor as u32
    }

    /// Rebuild a version from its packed 32-bit value
    pub const fn from_packed(packed: u32, build_number: u16) -> Self {
        Self {
            lib_major: (packed >> 24) as u8,
            lib_minor: (packed >> 16) as u8,
            rev_major: (packed >> 8) as u8,
            rev_minor: packed as u8,
            build_number,
        }
    }

    pub fn has_build_number(&self) -> bool {
        self.build_number != NO_BUILD_NUMBER
    }

    /// Whether this version uses the 3.1.0.1+ chunk stamp layout
    pub fn uses_new_stamp(&self) -> bool {
        self.packed() >= Self::new(3, 1, 0, 1).packed()
    }

    /// Decode a chunk header version stamp
    pub fn from_stamp(stamp: u32) -> Self {
        if stamp & 0xFFFF_0000 == 0 {
            // Pre 3.1 stamps: 0x0MNR
            Self::new(
                ((stamp >> 8) & 0xF) as u8,
                ((stamp >> 4) & 0xF) as u8,
                (stamp & 0xF) as u8,
                0,
            )
        } else {
            Self {
                lib_major: (3 + ((stamp >> 30) & 0x3)) as u8,
                lib_minor: ((stamp >> 26) & 0xF) as u8,
                rev_major: ((stamp >> 22) & 0xF) as u8,
                rev_minor: ((stamp >> 16) & 0x3F) as u8,
                build_number: (stamp & 0xFFFF) as u16,
            }
        }
    }

    /// Encode into a chunk header version stamp
    pub fn to_stamp(&self) -> u32 {
        if self.uses_new_stamp() {
            (self.lib_major.saturating_sub(3) as u32 & 0x3) << 30
                | (self.lib_minor as u32 & 0xF) << 26
                | (self.rev_major as u32 & 0xF) << 22
                | (self.rev_minor as u32 & 0x3F) << 16
                | self.build_number as u32
        } else {
            (self.lib_major as u32 & 0xF) << 8
                | (self.lib_minor as u32 & 0xF) << 4
                | (self.rev_major as u32 & 0xF)
        }
    }

    /// Texture dictionaries carry a recommended platform after 3.5
    pub fn supports_recommended_platform(&self) -> bool {
        !(self.lib_major <= 2 || (self.lib_major == 3 && self.lib_minor <= 5))
    }

    /// Compare only the four version fields, ignoring the build number
    pub fn is_same_library(&self, other: &LibraryVersion) -> bool {
        self.packed() == other.packed()
    }

    /// Parse "a.b.c.d" or "a.b.c.d (build: N)"
    pub fn parse_version(text: &str) -> Result<Self> {
        let regex = VERSION_REGEX
            .as_ref()
            .ok_or_else(|| CoreError::version("version pattern failed to compile"))?;

        let captures = regex
            .captures(text)
            .ok_or_else(|| CoreError::version(format!("invalid version string '{}'", text)))?;

        let field = |idx: usize| -> Result<u8> {
            let raw = captures.get(idx).map(|m| m.as_str()).unwrap_or("0");
            raw.parse::<u8>()
                .map_err(|_| CoreError::version(format!("version field '{}' out of range", raw)))
        };

        let mut version = Self::new(field(1)?, field(2)?, field(3)?, field(4)?);

        if let Some(build) = captures.get(5) {
            version.build_number = build
                .as_str()
                .parse::<u16>()
                .map_err(|_| CoreError::version(format!("build number '{}' out of range", build.as_str())))?;
        }

        Ok(version)
    }
}

impl PartialEq for LibraryVersion {
    fn eq(&self, other: &Self) -> bool {
        self.packed() == other.packed() && self.build_number == other.build_number
    }
}

impl Eq for LibraryVersion {}

impl PartialOrd for LibraryVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LibraryVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.packed()
            .cmp(&other.packed())
            .then(self.build_number.cmp(&other.build_number))
    }
}

impl fmt::Display for LibraryVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.lib_major, self.lib_minor, self.rev_major, self.rev_minor
        )?;
        if self.has_build_number() {
            write!(f, " (build: {})", self.build_number)?;
        }
        Ok(())
    }
}

impl FromStr for LibraryVersion {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_version(s)
    }
}
