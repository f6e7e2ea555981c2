//! Error types for TXD parsing and native texture transcoding

use rw_txd_core::CoreError;
use thiserror::Error;

/// Result type for TXD binary operations
pub type Result<T> = std::result::Result<T, BinaryError>;

/// Errors that can occur while reading, writing or converting textures
#[derive(Error, Debug)]
pub enum BinaryError {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stream is not what it claims to be
    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    /// Invalid data
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Not enough data
    #[error("Not enough data: expected {expected}, got {actual}")]
    NotEnoughData { expected: usize, actual: usize },

    /// Chunk id differs from the one the parser requires
    #[error("Unexpected chunk: expected 0x{expected:X}, got 0x{actual:X}")]
    UnexpectedChunk { expected: u32, actual: u32 },

    /// A read crossed the end of the enclosing block
    #[error("Block overrun: read of {requested} bytes at offset {offset} passes block end {block_end}")]
    BlockOverrun {
        offset: u64,
        requested: u64,
        block_end: u64,
    },

    /// Unsupported feature or format combination
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// No codec understands the native texture
    #[error("Unknown native texture platform: {0}")]
    UnknownPlatform(String),

    /// Corrupted data
    #[error("Corrupted data detected: {0}")]
    CorruptedData(String),

    /// A codec refused an operation
    #[error("{codec}: {message}")]
    Codec { codec: String, message: String },

    /// Memory allocation error
    #[error("Memory allocation error: {0}")]
    MemoryError(String),

    /// Errors from the core crate
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl BinaryError {
    /// Create a new invalid format error
    pub fn invalid_format<S: Into<String>>(msg: S) -> Self {
        Self::InvalidFormat(msg.into())
    }

    /// Create a new invalid data error
    pub fn invalid_data<S: Into<String>>(msg: S) -> Self {
        Self::InvalidData(msg.into())
    }

    /// Create a new not enough data error
    pub fn not_enough_data(expected: usize, actual: usize) -> Self {
        Self::NotEnoughData { expected, actual }
    }

    /// Create a new unexpected chunk error
    pub fn unexpected_chunk(expected: u32, actual: u32) -> Self {
        Self::UnexpectedChunk { expected, actual }
    }

    /// Create a new block overrun error
    pub fn block_overrun(offset: u64, requested: u64, block_end: u64) -> Self {
        Self::BlockOverrun {
            offset,
            requested,
            block_end,
        }
    }

    /// Create a new unsupported feature error
    pub fn unsupported<S: Into<String>>(feature: S) -> Self {
        Self::Unsupported(feature.into())
    }

    /// Create a new unknown platform error
    pub fn unknown_platform<S: Into<String>>(msg: S) -> Self {
        Self::UnknownPlatform(msg.into())
    }

    /// Create a corrupted data error
    pub fn corrupted_data(msg: impl Into<String>) -> Self {
        BinaryError::CorruptedData(msg.into())
    }

    /// Create a codec error
    pub fn codec(codec: impl Into<String>, message: impl Into<String>) -> Self {
        BinaryError::Codec {
            codec: codec.into(),
            message: message.into(),
        }
    }

    /// Create a memory error
    pub fn memory_error(msg: impl Into<String>) -> Self {
        BinaryError::MemoryError(msg.into())
    }
}

impl From<binrw::Error> for BinaryError {
    fn from(err: binrw::Error) -> Self {
        match err {
            binrw::Error::Io(io) => Self::Io(io),
            other => Self::invalid_data(format!("Malformed header: {}", other)),
        }
    }
}

impl From<std::string::FromUtf8Error> for BinaryError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        Self::invalid_data(format!("Invalid UTF-8 string: {}", err))
    }
}

impl From<std::collections::TryReserveError> for BinaryError {
    fn from(err: std::collections::TryReserveError) -> Self {
        Self::memory_error(format!("Buffer allocation failed: {}", err))
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Low severity - can be ignored
    Low,
    /// Medium severity - should be logged
    Medium,
    /// High severity - requires attention
    High,
    /// Critical severity - operation cannot continue
    Critical,
}

impl BinaryError {
    /// Whether the error is structural, i.e. the block it occurred in is lost
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            BinaryError::Io(_)
                | BinaryError::InvalidFormat(_)
                | BinaryError::NotEnoughData { .. }
                | BinaryError::UnexpectedChunk { .. }
                | BinaryError::BlockOverrun { .. }
        )
    }

    /// Check if a container could skip the failing block and continue
    pub fn is_recoverable(&self) -> bool {
        match self {
            BinaryError::Io(_) => false,
            BinaryError::InvalidFormat(_) => false,
            BinaryError::InvalidData(_) => true,
            BinaryError::NotEnoughData { .. } => true, // Block can be skipped by its length
            BinaryError::UnexpectedChunk { .. } => true,
            BinaryError::BlockOverrun { .. } => true,
            BinaryError::Unsupported(_) => true,
            BinaryError::UnknownPlatform(_) => true,
            BinaryError::CorruptedData(_) => true,
            BinaryError::Codec { .. } => true,
            BinaryError::MemoryError(_) => false,
            BinaryError::Core(_) => false,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            BinaryError::Io(_) => ErrorSeverity::Critical,
            BinaryError::InvalidFormat(_) => ErrorSeverity::Critical,
            BinaryError::InvalidData(_) => ErrorSeverity::Medium,
            BinaryError::NotEnoughData { .. } => ErrorSeverity::High,
            BinaryError::UnexpectedChunk { .. } => ErrorSeverity::High,
            BinaryError::BlockOverrun { .. } => ErrorSeverity::High,
            BinaryError::Unsupported(_) => ErrorSeverity::Low,
            BinaryError::UnknownPlatform(_) => ErrorSeverity::Medium,
            BinaryError::CorruptedData(_) => ErrorSeverity::Medium,
            BinaryError::Codec { .. } => ErrorSeverity::Medium,
            BinaryError::MemoryError(_) => ErrorSeverity::Critical,
            BinaryError::Core(_) => ErrorSeverity::High,
        }
    }

    /// Get suggested recovery action
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            BinaryError::InvalidData(_) => Some("Skip the texture and continue"),
            BinaryError::NotEnoughData { .. } => Some("Skip to the declared block end"),
            BinaryError::BlockOverrun { .. } => Some("Skip to the declared block end"),
            BinaryError::UnexpectedChunk { .. } => Some("Skip the block and continue"),
            BinaryError::UnknownPlatform(_) => Some("Keep the texture as a failed placeholder"),
            BinaryError::Unsupported(_) => Some("Convert the raster to a supported format first"),
            BinaryError::CorruptedData(_) => Some("Skip corrupted section and continue"),
            BinaryError::Codec { .. } => Some("Try a different platform"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = BinaryError::invalid_format("test message");
        assert!(matches!(err, BinaryError::InvalidFormat(_)));

        let err = BinaryError::not_enough_data(100, 50);
        assert!(matches!(
            err,
            BinaryError::NotEnoughData {
                expected: 100,
                actual: 50
            }
        ));
    }

    #[test]
    fn test_error_display() {
        let err = BinaryError::unexpected_chunk(0x16, 0x01);
        assert_eq!(err.to_string(), "Unexpected chunk: expected 0x16, got 0x1");

        let err = BinaryError::codec("PlayStation2", "unknown palette depth");
        assert_eq!(err.to_string(), "PlayStation2: unknown palette depth");
    }

    #[test]
    fn test_error_classification() {
        assert!(BinaryError::block_overrun(10, 4, 12).is_structural());
        assert!(!BinaryError::memory_error("oom").is_recoverable());
        assert_eq!(
            BinaryError::memory_error("oom").severity(),
            ErrorSeverity::Critical
        );
        assert!(BinaryError::unsupported("palette").recovery_suggestion().is_some());
    }
}
