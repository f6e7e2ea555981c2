//! Engine configuration
//!
//! Settings that influence how dictionaries are read and written. They can be
//! built in code or loaded from YAML:
//!
//! ```yaml
//! version: "3.6.0.3"
//! warning_level: 2
//! block_length_mode: Ignore
//! ```

use crate::diagnostics::Diagnostics;
use crate::error::{CoreError, Result};
use crate::version::LibraryVersion;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::Path;

/// Highest meaningful warning level
pub const MAX_WARNING_LEVEL: u8 = 3;

/// How declared chunk lengths are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlockLengthMode {
    /// Lengths are reliable; a failing block can be skipped
    #[default]
    Trust,
    /// Lengths may be wrong; only root level recovery is possible
    Ignore,
}

/// Palette generation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PaletteRuntime {
    #[default]
    Native,
}

/// DXT compression runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DxtRuntime {
    #[default]
    Native,
}

/// Configuration for reading and writing texture dictionaries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    #[serde(serialize_with = "serialize_version", deserialize_with = "deserialize_version")]
    pub version: LibraryVersion,
    pub warning_level: u8,
    pub block_length_mode: BlockLengthMode,
    pub ignore_secure_warnings: bool,
    pub fix_incompatible_rasters: bool,
    pub palette_runtime: PaletteRuntime,
    pub dxt_runtime: DxtRuntime,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: LibraryVersion::san_andreas(),
            warning_level: MAX_WARNING_LEVEL,
            block_length_mode: BlockLengthMode::Trust,
            ignore_secure_warnings: false,
            fix_incompatible_rasters: true,
            palette_runtime: PaletteRuntime::Native,
            dxt_runtime: DxtRuntime::Native,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: EngineConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.warning_level > MAX_WARNING_LEVEL {
            return Err(CoreError::config(format!(
                "warning level {} out of range (0-{})",
                self.warning_level, MAX_WARNING_LEVEL
            )));
        }
        if self.version.lib_major < 3 || self.version.lib_major > 6 {
            return Err(CoreError::config(format!(
                "unsupported library version {}",
                self.version
            )));
        }
        Ok(())
    }

    pub fn with_version(mut self, version: LibraryVersion) -> Self {
        self.version = version;
        self
    }

    pub fn with_warning_level(mut self, level: u8) -> Self {
        self.warning_level = level.min(MAX_WARNING_LEVEL);
        self
    }

    pub fn with_block_length_mode(mut self, mode: BlockLengthMode) -> Self {
        self.block_length_mode = mode;
        self
    }

    /// Fresh diagnostics handle carrying this configuration's thresholds
    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics::new(self.warning_level).with_ignore_secure_warnings(self.ignore_secure_warnings)
    }
}

fn serialize_version<S: Serializer>(version: &LibraryVersion, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&version.to_string())
}

fn deserialize_version<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<LibraryVersion, D::Error> {
    let text = String::deserialize(deserializer)?;
    text.parse().map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.version, LibraryVersion::new(3, 6, 0, 3));
        assert_eq!(config.warning_level, 3);
        assert_eq!(config.block_length_mode, BlockLengthMode::Trust);
        assert!(config.fix_incompatible_rasters);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_partial_config() {
        let config = EngineConfig::from_yaml_str(
            "version: \"3.4.0.3\"\nwarning_level: 1\nblock_length_mode: Ignore\n",
        )
        .unwrap();
        assert_eq!(config.version, LibraryVersion::new(3, 4, 0, 3));
        assert_eq!(config.warning_level, 1);
        assert_eq!(config.block_length_mode, BlockLengthMode::Ignore);
        assert!(!config.ignore_secure_warnings);
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = EngineConfig::default().with_warning_level(2);
        let text = config.to_yaml_string().unwrap();
        assert_eq!(EngineConfig::from_yaml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_invalid_warning_level() {
        let err = EngineConfig::from_yaml_str("warning_level: 9\n").unwrap_err();
        assert!(matches!(err, CoreError::Config { .. }));
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"ignore_secure_warnings: true\n").unwrap();
        let config = EngineConfig::from_yaml_file(file.path()).unwrap();
        assert!(config.ignore_secure_warnings);
        assert!(config.diagnostics().reports_at(3));
    }
}
