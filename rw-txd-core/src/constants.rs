//! Chunk identifiers and platform constants
//!
//! Every RenderWare stream is a tree of chunks. The identifiers below are the
//! ones a texture dictionary stream is made of; anything else is treated as
//! an opaque extension and carried through unchanged.

/// Size of a classic chunk header: id, version stamp and length
pub const CHUNK_HEADER_SIZE: u64 = 12;

/// Plain structure payload
pub const CHUNK_STRUCT: u32 = 0x01;
/// Zero terminated string payload
pub const CHUNK_STRING: u32 = 0x02;
/// Extension container, holds plugin sub-chunks
pub const CHUNK_EXTENSION: u32 = 0x03;
/// Platform specific texture
pub const CHUNK_TEXTURENATIVE: u32 = 0x15;
/// Texture dictionary root
pub const CHUNK_TEXDICTIONARY: u32 = 0x16;
/// PS2 sky mipmap K/L values
pub const CHUNK_SKYMIPMAP: u32 = 0x110;

/// Human readable chunk name, used in diagnostics
pub fn chunk_name(id: u32) -> &'static str {
    match id {
        CHUNK_STRUCT => "Struct",
        CHUNK_STRING => "String",
        CHUNK_EXTENSION => "Extension",
        CHUNK_TEXTURENATIVE => "Texture Native",
        CHUNK_TEXDICTIONARY => "Texture Dictionary",
        CHUNK_SKYMIPMAP => "Sky Mipmap Val",
        _ => "Unknown",
    }
}

/// Platform descriptors stored in the first word of a native texture
pub mod platform {
    pub const D3D8: u32 = 8;
    pub const D3D9: u32 = 9;
    pub const PVR: u32 = 10;
    /// "PS2\0" as a little-endian FOURCC
    pub const PS2_FOURCC: u32 = 0x0032_5350;
}

/// Driver identifiers written as the recommended platform of a dictionary
pub mod driver {
    pub const NONE: u16 = 0;
    pub const D3D8: u16 = 1;
    pub const D3D9: u16 = 2;
    pub const PS2: u16 = 6;
    pub const PVR: u16 = 11;

    /// Codec name for a driver identifier
    pub fn name(id: u16) -> Option<&'static str> {
        match id {
            D3D8 => Some("Direct3D8"),
            D3D9 => Some("Direct3D9"),
            PS2 => Some("PlayStation2"),
            PVR => Some("PowerVR"),
            _ => None,
        }
    }
}

/// Fixed width of serialized texture and mask names
pub const TEXTURE_NAME_LENGTH: usize = 32;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_names() {
        assert_eq!(chunk_name(CHUNK_TEXDICTIONARY), "Texture Dictionary");
        assert_eq!(chunk_name(0xDEAD), "Unknown");
    }

    #[test]
    fn test_driver_names() {
        assert_eq!(driver::name(driver::PS2), Some("PlayStation2"));
        assert_eq!(driver::name(3), None);
        assert_eq!(&platform::PS2_FOURCC.to_le_bytes(), b"PS2\0");
    }
}
