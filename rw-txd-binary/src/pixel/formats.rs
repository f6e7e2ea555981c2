//! Raster format definitions
//!
//! The canonical description of texel data that every native texture codec
//! converts to and from: the sample format, palette kind, color channel
//! ordering and block compression. Also holds the serialized helpers shared
//! by the codecs (raster format flags and the `texFormatInfo` word).

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Library-wide sample format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u32)]
pub enum RasterFormat {
    #[default]
    Default = 0,
    R1555 = 1,
    R565 = 2,
    R4444 = 3,
    /// Luminance, 4 or 8 bit
    Lum = 4,
    R8888 = 5,
    R888 = 6,
    /// Depth formats
    D16 = 7,
    D24 = 8,
    D32 = 9,
    R555 = 10,
    LumAlpha = 11,
}

impl RasterFormat {
    pub fn from_u32(value: u32) -> Option<Self> {
        Some(match value {
            0 => RasterFormat::Default,
            1 => RasterFormat::R1555,
            2 => RasterFormat::R565,
            3 => RasterFormat::R4444,
            4 => RasterFormat::Lum,
            5 => RasterFormat::R8888,
            6 => RasterFormat::R888,
            7 => RasterFormat::D16,
            8 => RasterFormat::D24,
            9 => RasterFormat::D32,
            10 => RasterFormat::R555,
            11 => RasterFormat::LumAlpha,
            _ => return None,
        })
    }

    /// Standard name as used by third-party tools
    pub fn standard_name(&self) -> &'static str {
        match self {
            RasterFormat::Default => "unspecified",
            RasterFormat::R1555 => "RASTER_1555",
            RasterFormat::R565 => "RASTER_565",
            RasterFormat::R4444 => "RASTER_4444",
            RasterFormat::Lum => "RASTER_LUM",
            RasterFormat::R8888 => "RASTER_8888",
            RasterFormat::R888 => "RASTER_888",
            RasterFormat::D16 => "RASTER_16",
            RasterFormat::D24 => "RASTER_24",
            RasterFormat::D32 => "RASTER_32",
            RasterFormat::R555 => "RASTER_555",
            RasterFormat::LumAlpha => "RASTER_LUM_ALPHA",
        }
    }

    /// Short name without the `RASTER_` prefix
    pub fn short_name(&self) -> &'static str {
        let name = self.standard_name();
        name.strip_prefix("RASTER_").unwrap_or(name)
    }

    /// Look a format up by "RASTER_8888" or "8888", case insensitive
    pub fn find_by_name(name: &str) -> Option<Self> {
        let upper = name.trim().to_ascii_uppercase();
        let key = upper.strip_prefix("RASTER_").unwrap_or(&upper);
        let prefixed = upper.starts_with("RASTER_");

        Some(match key {
            "1555" => RasterFormat::R1555,
            "565" => RasterFormat::R565,
            "4444" => RasterFormat::R4444,
            "LUM" => RasterFormat::Lum,
            "8888" => RasterFormat::R8888,
            "888" => RasterFormat::R888,
            "555" => RasterFormat::R555,
            "LUM_ALPHA" => RasterFormat::LumAlpha,
            // Depth formats only by their full name
            "16" if prefixed => RasterFormat::D16,
            "24" if prefixed => RasterFormat::D24,
            "32" if prefixed => RasterFormat::D32,
            _ => return None,
        })
    }

    pub fn can_have_alpha(&self) -> bool {
        matches!(
            self,
            RasterFormat::R1555 | RasterFormat::R4444 | RasterFormat::R8888 | RasterFormat::LumAlpha
        )
    }

    /// Natural bit depth of one sample in this format
    pub fn natural_depth(&self) -> u32 {
        match self {
            RasterFormat::R1555
            | RasterFormat::R565
            | RasterFormat::R4444
            | RasterFormat::R555
            | RasterFormat::D16
            | RasterFormat::LumAlpha => 16,
            RasterFormat::Lum => 8,
            RasterFormat::R8888 | RasterFormat::R888 | RasterFormat::D32 => 32,
            RasterFormat::D24 => 24,
            RasterFormat::Default => 0,
        }
    }

    pub fn color_model(&self) -> ColorModel {
        match self {
            RasterFormat::Lum | RasterFormat::LumAlpha => ColorModel::Luminance,
            RasterFormat::D16 | RasterFormat::D24 | RasterFormat::D32 => ColorModel::Depth,
            _ => ColorModel::Rgba,
        }
    }
}

/// Which browse/put family handles a format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorModel {
    Rgba,
    Luminance,
    Depth,
}

pub fn can_raster_format_have_alpha(format: RasterFormat) -> bool {
    format.can_have_alpha()
}

/// Palette kind of a raster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PaletteType {
    #[default]
    None,
    /// 16 entries, first texel in the high nibble
    Pal4,
    /// 256 entries
    Pal8,
    /// 16 entries, first texel in the low nibble
    Pal4Lsb,
}

impl PaletteType {
    pub fn item_count(&self) -> u32 {
        match self {
            PaletteType::None => 0,
            PaletteType::Pal4 | PaletteType::Pal4Lsb => 16,
            PaletteType::Pal8 => 256,
        }
    }

    pub fn is_palette(&self) -> bool {
        *self != PaletteType::None
    }

    pub fn is_4bit(&self) -> bool {
        matches!(self, PaletteType::Pal4 | PaletteType::Pal4Lsb)
    }

    /// Depth of an index in its natural packing
    pub fn index_depth(&self) -> u32 {
        match self {
            PaletteType::None => 0,
            PaletteType::Pal4 | PaletteType::Pal4Lsb => 4,
            PaletteType::Pal8 => 8,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PaletteType::None => "none",
            PaletteType::Pal4 => "PAL4",
            PaletteType::Pal8 => "PAL8",
            PaletteType::Pal4Lsb => "PAL4_LSB",
        }
    }
}

/// Channel ordering of color samples in memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ColorOrdering {
    #[default]
    Rgba,
    Bgra,
    Abgr,
}

impl ColorOrdering {
    pub fn name(&self) -> &'static str {
        match self {
            ColorOrdering::Rgba => "RGBA",
            ColorOrdering::Bgra => "BGRA",
            ColorOrdering::Abgr => "ABGR",
        }
    }
}

/// Block compression of the texel data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CompressionType {
    #[default]
    None,
    Dxt1,
    Dxt2,
    Dxt3,
    Dxt4,
    Dxt5,
}

impl CompressionType {
    pub fn from_dxt_number(value: u32) -> Option<Self> {
        Some(match value {
            0 => CompressionType::None,
            1 => CompressionType::Dxt1,
            2 => CompressionType::Dxt2,
            3 => CompressionType::Dxt3,
            4 => CompressionType::Dxt4,
            5 => CompressionType::Dxt5,
            _ => return None,
        })
    }

    pub fn dxt_number(&self) -> u32 {
        match self {
            CompressionType::None => 0,
            CompressionType::Dxt1 => 1,
            CompressionType::Dxt2 => 2,
            CompressionType::Dxt3 => 3,
            CompressionType::Dxt4 => 4,
            CompressionType::Dxt5 => 5,
        }
    }

    pub fn is_compressed(&self) -> bool {
        *self != CompressionType::None
    }

    /// Bytes per 4x4 block
    pub fn block_size(&self) -> u32 {
        match self {
            CompressionType::None => 0,
            CompressionType::Dxt1 => 8,
            _ => 16,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CompressionType::None => "none",
            CompressionType::Dxt1 => "DXT1",
            CompressionType::Dxt2 => "DXT2",
            CompressionType::Dxt3 => "DXT3",
            CompressionType::Dxt4 => "DXT4",
            CompressionType::Dxt5 => "DXT5",
        }
    }
}

/// Texture filter mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FilterMode {
    #[default]
    Disable = 0,
    Point = 1,
    Linear = 2,
    PointPoint = 3,
    LinearPoint = 4,
    PointLinear = 5,
    LinearLinear = 6,
    Anisotropy = 7,
}

impl FilterMode {
    pub fn from_u32(value: u32) -> Option<Self> {
        Some(match value {
            0 => FilterMode::Disable,
            1 => FilterMode::Point,
            2 => FilterMode::Linear,
            3 => FilterMode::PointPoint,
            4 => FilterMode::LinearPoint,
            5 => FilterMode::PointLinear,
            6 => FilterMode::LinearLinear,
            7 => FilterMode::Anisotropy,
            _ => return None,
        })
    }

    /// Whether the mode samples between mipmap levels
    pub fn uses_mipmaps(&self) -> bool {
        matches!(
            self,
            FilterMode::PointPoint
                | FilterMode::LinearPoint
                | FilterMode::PointLinear
                | FilterMode::LinearLinear
        )
    }

    /// Same minification without sampling between levels
    pub fn without_mipmaps(self) -> Self {
        match self {
            FilterMode::PointPoint | FilterMode::PointLinear => FilterMode::Point,
            FilterMode::LinearPoint | FilterMode::LinearLinear => FilterMode::Linear,
            other => other,
        }
    }

    /// Mipmap sampling variant of a plain filter
    pub fn with_mipmaps(self) -> Self {
        match self {
            FilterMode::Point => FilterMode::PointPoint,
            FilterMode::Linear => FilterMode::LinearLinear,
            other => other,
        }
    }
}

/// Texture coordinate addressing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AddressMode {
    #[default]
    Wrap = 1,
    Mirror = 2,
    Clamp = 3,
    Border = 4,
}

impl AddressMode {
    pub fn from_u32(value: u32) -> Option<Self> {
        Some(match value {
            1 => AddressMode::Wrap,
            2 => AddressMode::Mirror,
            3 => AddressMode::Clamp,
            4 => AddressMode::Border,
            _ => return None,
        })
    }
}

/// Serialized `texFormatInfo`: filter 8 bits, U 4 bits, V 4 bits, 16 bits padding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TexFormatInfo {
    pub filter_mode: u8,
    pub u_addressing: u8,
    pub v_addressing: u8,
}

impl TexFormatInfo {
    pub fn from_u32(value: u32) -> Self {
        Self {
            filter_mode: (value & 0xFF) as u8,
            u_addressing: ((value >> 8) & 0xF) as u8,
            v_addressing: ((value >> 12) & 0xF) as u8,
        }
    }

    pub fn to_u32(&self) -> u32 {
        self.filter_mode as u32
            | (self.u_addressing as u32 & 0xF) << 8
            | (self.v_addressing as u32 & 0xF) << 12
    }

    pub fn new(filter: FilterMode, u: AddressMode, v: AddressMode) -> Self {
        Self {
            filter_mode: filter as u8,
            u_addressing: u as u8,
            v_addressing: v as u8,
        }
    }

    pub fn filter(&self) -> Option<FilterMode> {
        FilterMode::from_u32(self.filter_mode as u32)
    }

    pub fn u_mode(&self) -> Option<AddressMode> {
        AddressMode::from_u32(self.u_addressing as u32)
    }

    pub fn v_mode(&self) -> Option<AddressMode> {
        AddressMode::from_u32(self.v_addressing as u32)
    }

    /// Drop mipmap filtering when only one level exists; returns whether it changed
    pub fn fix_filtering(&mut self, mipmap_count: usize) -> bool {
        if mipmap_count > 1 {
            return false;
        }
        match self.filter() {
            Some(mode) if mode.uses_mipmaps() => {
                self.filter_mode = mode.without_mipmaps() as u8;
                true
            }
            _ => false,
        }
    }
}

bitflags! {
    /// Flag bits of a serialized raster format word
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RasterFormatFlags: u32 {
        const AUTO_MIPMAP = 0x1000;
        const PAL8 = 0x2000;
        const PAL4 = 0x4000;
        const MIPMAP = 0x8000;
    }
}

/// Decoded raster format word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterFormatInfo {
    pub format: RasterFormat,
    pub palette_type: PaletteType,
    pub has_mipmaps: bool,
    pub auto_mipmaps: bool,
}

/// Build the serialized raster format word
pub fn generate_raster_format_flags(
    format: RasterFormat,
    palette_type: PaletteType,
    has_mipmaps: bool,
    auto_mipmaps: bool,
) -> u32 {
    let mut flags = RasterFormatFlags::empty();
    match palette_type {
        PaletteType::Pal8 => flags |= RasterFormatFlags::PAL8,
        PaletteType::Pal4 | PaletteType::Pal4Lsb => flags |= RasterFormatFlags::PAL4,
        PaletteType::None => {}
    }
    flags.set(RasterFormatFlags::MIPMAP, has_mipmaps);
    flags.set(RasterFormatFlags::AUTO_MIPMAP, auto_mipmaps);

    ((format as u32) & 0xF) << 8 | flags.bits()
}

/// Split a serialized raster format word; unknown formats map to `Default`
pub fn read_raster_format_flags(value: u32) -> RasterFormatInfo {
    let flags = RasterFormatFlags::from_bits_truncate(value);
    let palette_type = if flags.contains(RasterFormatFlags::PAL8) {
        PaletteType::Pal8
    } else if flags.contains(RasterFormatFlags::PAL4) {
        PaletteType::Pal4
    } else {
        PaletteType::None
    };

    RasterFormatInfo {
        format: RasterFormat::from_u32((value >> 8) & 0xF).unwrap_or_default(),
        palette_type,
        has_mipmaps: flags.contains(RasterFormatFlags::MIPMAP),
        auto_mipmaps: flags.contains(RasterFormatFlags::AUTO_MIPMAP),
    }
}

/// Human readable description shared by the codec format strings
///
/// `"8888 (BGRA)"`, `"PAL8 8888"`, `"LUM"`.
pub fn default_raster_format_string(
    format: RasterFormat,
    palette_type: PaletteType,
    order: ColorOrdering,
) -> String {
    let mut text = String::new();
    match palette_type {
        PaletteType::Pal4 | PaletteType::Pal4Lsb => text.push_str("PAL4 "),
        PaletteType::Pal8 => text.push_str("PAL8 "),
        PaletteType::None => {}
    }
    text.push_str(format.short_name());

    if !palette_type.is_palette() && format.color_model() == ColorModel::Rgba && format != RasterFormat::Default {
        text.push_str(&format!(" ({})", order.name()));
    }
    text
}
