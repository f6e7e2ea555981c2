//! Canonical pixel data exchanged between codecs

use super::formats::{ColorOrdering, CompressionType, PaletteType, RasterFormat};
use super::layout::{mipmap_dimensions, raster_row_size};
use serde::{Deserialize, Serialize};

/// Default raster type tag (bitmap)
pub const RASTER_TYPE_BITMAP: u8 = 4;

/// One mipmap level
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MipmapLayer {
    /// Encoded dimensions (block aligned for compressed data)
    pub width: u32,
    pub height: u32,
    /// Visible dimensions
    pub layer_width: u32,
    pub layer_height: u32,
    #[serde(skip)]
    pub texels: Vec<u8>,
}

impl MipmapLayer {
    pub fn new(width: u32, height: u32, texels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            layer_width: width,
            layer_height: height,
            texels,
        }
    }

    pub fn with_layer_size(mut self, layer_width: u32, layer_height: u32) -> Self {
        self.layer_width = layer_width;
        self.layer_height = layer_height;
        self
    }

    pub fn data_size(&self) -> usize {
        self.texels.len()
    }
}

/// Raw mipmap as handed out by a codec without full conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMipmapLayer {
    pub layer: MipmapLayer,
    pub raster_format: RasterFormat,
    pub depth: u32,
    pub row_alignment: u32,
    pub color_order: ColorOrdering,
    pub palette_type: PaletteType,
    pub palette_data: Vec<u8>,
    pub palette_size: u32,
    pub compression: CompressionType,
    pub is_newly_allocated: bool,
}

/// Format-agnostic pixel container
///
/// Level 0 defines the base size; each following level halves it (minimum 1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelData {
    pub raster_format: RasterFormat,
    pub depth: u32,
    pub row_alignment: u32,
    pub color_order: ColorOrdering,
    pub palette_type: PaletteType,
    #[serde(skip)]
    pub palette_data: Vec<u8>,
    pub palette_size: u32,
    pub compression: CompressionType,
    pub mipmaps: Vec<MipmapLayer>,
    pub has_alpha: bool,
    pub auto_mipmaps: bool,
    pub cube_texture: bool,
    pub raster_type: u8,
    /// Buffers were produced by a conversion rather than copied verbatim
    pub is_newly_allocated: bool,
}

impl Default for PixelData {
    fn default() -> Self {
        Self {
            raster_format: RasterFormat::R8888,
            depth: 32,
            row_alignment: 4,
            color_order: ColorOrdering::Bgra,
            palette_type: PaletteType::None,
            palette_data: Vec::new(),
            palette_size: 0,
            compression: CompressionType::None,
            mipmaps: Vec::new(),
            has_alpha: false,
            auto_mipmaps: false,
            cube_texture: false,
            raster_type: RASTER_TYPE_BITMAP,
            is_newly_allocated: false,
        }
    }
}

impl PixelData {
    /// Uncompressed, unpalettized pixel data
    pub fn new(raster_format: RasterFormat, depth: u32, color_order: ColorOrdering) -> Self {
        Self {
            raster_format,
            depth,
            color_order,
            ..Default::default()
        }
    }

    pub fn with_row_alignment(mut self, alignment: u32) -> Self {
        self.row_alignment = alignment;
        self
    }

    pub fn with_palette(mut self, palette_type: PaletteType, palette_data: Vec<u8>, palette_size: u32) -> Self {
        self.palette_type = palette_type;
        self.palette_data = palette_data;
        self.palette_size = palette_size;
        self
    }

    pub fn push_mipmap(&mut self, layer: MipmapLayer) {
        self.mipmaps.push(layer);
    }

    pub fn mipmap_count(&self) -> usize {
        self.mipmaps.len()
    }

    /// Base level dimensions
    pub fn base_size(&self) -> (u32, u32) {
        self.mipmaps
            .first()
            .map(|m| (m.layer_width, m.layer_height))
            .unwrap_or((0, 0))
    }

    pub fn is_compressed(&self) -> bool {
        self.compression.is_compressed()
    }

    /// Row size of a level's encoded width
    pub fn row_size(&self, width: u32) -> u32 {
        raster_row_size(width, self.depth, self.row_alignment)
    }

    /// Check the mipmap chain halves correctly from the base level
    pub fn has_valid_mipmap_chain(&self) -> bool {
        let (base_w, base_h) = self.base_size();
        self.mipmaps.iter().enumerate().all(|(level, layer)| {
            let expected = mipmap_dimensions(base_w, base_h, level as u32);
            (layer.layer_width, layer.layer_height) == expected
        })
    }

    /// Limit to `max` levels, dropping the rest
    pub fn truncate_mipmaps(&mut self, max: usize) {
        self.mipmaps.truncate(max);
    }
}
