//! Texel encodings and GS memory layouts

use serde::{Deserialize, Serialize};

use crate::pixel::{PaletteType, RasterFormat};
use rw_txd_core::LibraryVersion;

/// GS pixel storage mode (PSM)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemoryLayout {
    Psmct32 = 0,
    Psmct24 = 1,
    Psmct16 = 2,
    Psmct16s = 10,
    Psmt8 = 19,
    Psmt4 = 20,
    Psmt8h = 27,
    Psmt4hl = 36,
    Psmt4hh = 44,
    Psmz32 = 48,
    Psmz24 = 49,
    Psmz16 = 50,
    Psmz16s = 58,
}

impl MemoryLayout {
    pub fn from_u32(value: u32) -> Option<Self> {
        Some(match value {
            0 => Self::Psmct32,
            1 => Self::Psmct24,
            2 => Self::Psmct16,
            10 => Self::Psmct16s,
            19 => Self::Psmt8,
            20 => Self::Psmt4,
            27 => Self::Psmt8h,
            36 => Self::Psmt4hl,
            44 => Self::Psmt4hh,
            48 => Self::Psmz32,
            49 => Self::Psmz24,
            50 => Self::Psmz16,
            58 => Self::Psmz16s,
            _ => return None,
        })
    }

    /// Encoding of texels stored in this layout
    pub fn encoding(self) -> FormatEncoding {
        match self {
            Self::Psmt4 => FormatEncoding::IdTex8Compressed,
            Self::Psmt8 => FormatEncoding::IdTex8,
            Self::Psmct16 | Self::Psmct16s => FormatEncoding::Tex16,
            Self::Psmct32 => FormatEncoding::Tex32,
            _ => FormatEncoding::Unknown,
        }
    }
}

/// How texels are packed into a GS transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FormatEncoding {
    #[default]
    Unknown,
    IdTex4,
    IdTex8,
    /// 8-bit indices stored as 4-bit
    IdTex8Compressed,
    Tex16,
    Tex32,
}

impl FormatEncoding {
    /// Bits per encoded item
    pub fn depth(self) -> u32 {
        match self {
            Self::IdTex4 | Self::IdTex8Compressed => 4,
            Self::IdTex8 => 8,
            Self::Tex16 => 16,
            Self::Tex32 => 32,
            Self::Unknown => 0,
        }
    }

    pub fn memory_layout(self) -> Option<MemoryLayout> {
        match self {
            Self::IdTex4 | Self::IdTex8Compressed => Some(MemoryLayout::Psmt4),
            Self::IdTex8 => Some(MemoryLayout::Psmt8),
            Self::Tex16 => Some(MemoryLayout::Psmct16s),
            Self::Tex32 => Some(MemoryLayout::Psmct32),
            Self::Unknown => None,
        }
    }

    /// Encoding the texels of a raster format decode to
    pub fn from_raster_format(format: RasterFormat, palette_type: PaletteType) -> Self {
        match palette_type {
            PaletteType::Pal4 | PaletteType::Pal4Lsb => return Self::IdTex8Compressed,
            PaletteType::Pal8 => return Self::IdTex8,
            PaletteType::None => {}
        }
        match format {
            RasterFormat::Lum => Self::IdTex8,
            RasterFormat::R1555 | RasterFormat::R565 | RasterFormat::R4444 | RasterFormat::D16 | RasterFormat::R555 => {
                Self::Tex16
            }
            RasterFormat::R8888 | RasterFormat::R888 | RasterFormat::D32 => Self::Tex32,
            _ => Self::Unknown,
        }
    }

    /// Encoding the GS transfer uses for a texture of this kind
    ///
    /// Palette textures are uploaded as 32-bit blocks, except 4-bit
    /// palettes of the oldest library versions.
    pub fn hardware_required(
        format: RasterFormat,
        palette_type: PaletteType,
        version: LibraryVersion,
    ) -> Self {
        match palette_type {
            PaletteType::Pal4 | PaletteType::Pal4Lsb if version.lib_minor <= 1 => Self::IdTex8Compressed,
            PaletteType::Pal4 | PaletteType::Pal4Lsb | PaletteType::Pal8 => Self::Tex32,
            PaletteType::None => Self::from_raster_format(format, palette_type),
        }
    }
}

/// Whether converting `src` to `dst` packs several items into one
pub fn is_pack_operation(src: FormatEncoding, dst: FormatEncoding) -> bool {
    use FormatEncoding::*;
    if src == dst {
        return false;
    }
    match src {
        IdTex4 => matches!(dst, IdTex8 | IdTex8Compressed | Tex16 | Tex32),
        IdTex8 | IdTex8Compressed => matches!(dst, Tex16 | Tex32),
        Tex16 => dst == Tex32,
        Tex32 | Unknown => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_operations() {
        use FormatEncoding::*;
        assert!(is_pack_operation(IdTex8, Tex32));
        assert!(is_pack_operation(IdTex8Compressed, Tex32));
        assert!(is_pack_operation(Tex16, Tex32));
        assert!(!is_pack_operation(Tex32, IdTex8));
        assert!(!is_pack_operation(IdTex8, IdTex8Compressed));
        assert!(!is_pack_operation(Tex32, Tex32));
    }

    #[test]
    fn test_encoding_from_format() {
        assert_eq!(
            FormatEncoding::from_raster_format(RasterFormat::R8888, PaletteType::Pal4),
            FormatEncoding::IdTex8Compressed
        );
        assert_eq!(
            FormatEncoding::from_raster_format(RasterFormat::R1555, PaletteType::None),
            FormatEncoding::Tex16
        );
        assert_eq!(
            FormatEncoding::from_raster_format(RasterFormat::LumAlpha, PaletteType::None),
            FormatEncoding::Unknown
        );
        assert_eq!(FormatEncoding::IdTex8Compressed.memory_layout(), Some(MemoryLayout::Psmt4));
        assert_eq!(MemoryLayout::Psmct16s.encoding(), FormatEncoding::Tex16);
    }

    #[test]
    fn test_hardware_encoding_depends_on_version() {
        let old = LibraryVersion::new(3, 1, 0, 0);
        let sa = LibraryVersion::san_andreas();
        assert_eq!(
            FormatEncoding::hardware_required(RasterFormat::R8888, PaletteType::Pal4, old),
            FormatEncoding::IdTex8Compressed
        );
        assert_eq!(
            FormatEncoding::hardware_required(RasterFormat::R8888, PaletteType::Pal4, sa),
            FormatEncoding::Tex32
        );
        assert_eq!(
            FormatEncoding::hardware_required(RasterFormat::R1555, PaletteType::None, sa),
            FormatEncoding::Tex16
        );
    }
}
