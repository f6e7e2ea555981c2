//! RenderWare TXD Core
//!
//! Types shared by every part of the texture dictionary toolchain: the
//! library version and its chunk stamp encoding, chunk identifiers, the
//! warning sink used for recoverable anomalies and the engine configuration.

pub mod config;
pub mod constants;
pub mod diagnostics;
pub mod error;
pub mod version;

// Re-export main types
pub use config::{BlockLengthMode, DxtRuntime, EngineConfig, PaletteRuntime};
pub use constants::*;
pub use diagnostics::{CollectingWarnings, Diagnostics, TracingWarnings, WarningSink};
pub use error::{CoreError, Result};
pub use version::{LibraryVersion, NO_BUILD_NUMBER};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_functionality() {
        let config = EngineConfig::default();
        let stamp = config.version.to_stamp();
        assert_eq!(LibraryVersion::from_stamp(stamp), config.version);
        assert_eq!(chunk_name(CHUNK_STRUCT), "Struct");
    }
}
