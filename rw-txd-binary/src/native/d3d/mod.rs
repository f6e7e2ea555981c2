//! Direct3D 8 and Direct3D 9 native textures
//!
//! Both platforms store linear surfaces (rows aligned to 4 bytes) or DXT
//! blocks, preceded by an 88 byte packed meta header. The surface model in
//! [`D3dSurface`] is shared; the codecs differ in header layout and in the
//! formats they accept.

mod d3d8;
mod d3d9;

pub use d3d8::{D3D8Codec, D3D8MetaHeader, NativeTextureD3D8};
pub use d3d9::{D3D9Codec, D3D9MetaHeader, NativeTextureD3D9, d3d_format};

use crate::chunk::{BlockReader, BlockWriter};
use crate::codec::CodecContext;
use crate::error::{BinaryError, Result};
use crate::pixel::{
    ColorOrdering, CompressionType, MipmapLayer, PaletteType, PixelData, RasterFormat, RasterLayout, RawMipmapLayer,
    SizeRules, calculate_has_alpha, convert_mipmap_layer, convert_pixel_data, default_raster_format_string,
    mipmap_dimensions, palette_data_size, palette_entry_depth,
};

/// Row alignment of Direct3D surfaces
pub const D3D_ROW_ALIGNMENT: u32 = 4;

/// Largest surface edge accepted by the Direct3D codecs
pub const D3D_MAX_DIMENSION: u32 = 4096;

/// Palette entries stored for a palette type
pub fn d3d_palette_count(palette_type: PaletteType) -> u32 {
    match palette_type {
        PaletteType::Pal4 | PaletteType::Pal4Lsb => 32,
        PaletteType::Pal8 => 256,
        PaletteType::None => 0,
    }
}

/// Texel storage common to both Direct3D codecs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct D3dSurface {
    pub raster_format: RasterFormat,
    pub depth: u32,
    pub color_order: ColorOrdering,
    pub palette_type: PaletteType,
    pub palette: Vec<u8>,
    pub palette_size: u32,
    pub compression: CompressionType,
    pub mipmaps: Vec<MipmapLayer>,
    pub auto_mipmaps: bool,
    pub raster_type: u8,
    pub has_alpha: bool,
}

impl Default for D3dSurface {
    fn default() -> Self {
        Self {
            raster_format: RasterFormat::R8888,
            depth: 0,
            color_order: ColorOrdering::Bgra,
            palette_type: PaletteType::None,
            palette: Vec::new(),
            palette_size: 0,
            compression: CompressionType::None,
            mipmaps: Vec::new(),
            auto_mipmaps: false,
            raster_type: crate::pixel::RASTER_TYPE_BITMAP,
            has_alpha: true,
        }
    }
}

/// Uncompressed layout a codec wants for incoming pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SurfaceTarget {
    pub raster_format: RasterFormat,
    pub depth: u32,
    pub color_order: ColorOrdering,
    pub palette_type: PaletteType,
}

impl SurfaceTarget {
    fn layout(&self) -> RasterLayout {
        RasterLayout::new(self.raster_format, self.depth, self.color_order, D3D_ROW_ALIGNMENT)
            .with_palette(self.palette_type)
    }
}

impl D3dSurface {
    pub fn base_size(&self) -> (u32, u32) {
        self.mipmaps
            .first()
            .map(|m| (m.layer_width, m.layer_height))
            .unwrap_or((0, 0))
    }

    fn layout(&self) -> RasterLayout {
        RasterLayout::new(self.raster_format, self.depth, self.color_order, D3D_ROW_ALIGNMENT)
            .with_palette(self.palette_type)
    }

    pub fn format_string(&self) -> String {
        if self.compression.is_compressed() {
            self.compression.name().to_string()
        } else {
            default_raster_format_string(self.raster_format, self.palette_type, self.color_order)
        }
    }

    pub fn size_rules(&self) -> SizeRules {
        SizeRules {
            maximum: Some(D3D_MAX_DIMENSION),
            ..SizeRules::unrestricted()
        }
    }

    pub(crate) fn read_palette(&mut self, reader: &mut BlockReader<'_>) -> Result<()> {
        if !self.palette_type.is_palette() {
            return Ok(());
        }
        let count = d3d_palette_count(self.palette_type);
        let size = palette_data_size(count, palette_entry_depth(self.raster_format));
        self.palette = reader.read_bytes(size as usize)?;
        self.palette_size = count;
        Ok(())
    }

    pub(crate) fn write_palette(&self, writer: &mut BlockWriter<'_>) -> Result<()> {
        if !self.palette_type.is_palette() {
            return Ok(());
        }
        let required = palette_data_size(d3d_palette_count(self.palette_type), palette_entry_depth(self.raster_format))
            as usize;
        let have = self.palette.len().min(required);
        writer.write_bytes(&self.palette[..have])?;
        writer.write_zeros(required - have)
    }

    pub(crate) fn write_levels(&self, writer: &mut BlockWriter<'_>) -> Result<()> {
        for layer in &self.mipmaps {
            let size = u32::try_from(layer.texels.len())
                .map_err(|_| BinaryError::invalid_data("mipmap level larger than 4 GiB"))?;
            writer.write_u32(size)?;
            writer.write_bytes(&layer.texels)?;
        }
        Ok(())
    }

    /// Copy of the surface as canonical pixel data
    pub fn pixel_data(&self) -> Result<PixelData> {
        let mut pixels = PixelData {
            raster_format: self.raster_format,
            depth: self.depth,
            row_alignment: D3D_ROW_ALIGNMENT,
            color_order: self.color_order,
            palette_type: self.palette_type,
            palette_data: self.palette.clone(),
            palette_size: self.palette_size,
            compression: self.compression,
            mipmaps: self.mipmaps.clone(),
            has_alpha: self.has_alpha,
            auto_mipmaps: self.auto_mipmaps,
            cube_texture: false,
            raster_type: self.raster_type,
            is_newly_allocated: false,
        };
        pixels.has_alpha = calculate_has_alpha(&pixels)?;
        Ok(pixels)
    }

    /// Take over canonical pixels, converting uncompressed data to `target`
    ///
    /// Returns whether the buffers were adopted unchanged.
    pub(crate) fn set_pixels(
        &mut self,
        pixels: PixelData,
        target: SurfaceTarget,
        ctx: &CodecContext<'_>,
        codec: &str,
    ) -> Result<bool> {
        if pixels.mipmaps.is_empty() {
            return Err(BinaryError::codec(codec, "pixel data has no mipmap levels"));
        }

        let has_alpha = calculate_has_alpha(&pixels)?;
        let level_count = pixels.mipmaps.len();

        let (data, direct) = if pixels.is_compressed() {
            let mut data = pixels;
            data.raster_format = match data.compression {
                CompressionType::Dxt1 if has_alpha => RasterFormat::R1555,
                CompressionType::Dxt1 => RasterFormat::R565,
                _ => RasterFormat::R4444,
            };
            data.depth = 16;
            data.palette_type = PaletteType::None;
            data.palette_data.clear();
            data.palette_size = 0;
            (data, true)
        } else {
            let source = RasterLayout::of(&pixels);
            if source == target.layout() {
                (pixels, true)
            } else if !ctx.config.fix_incompatible_rasters {
                return Err(BinaryError::unsupported(format!(
                    "{} cannot store {} at depth {} without conversion",
                    codec,
                    pixels.raster_format.standard_name(),
                    pixels.depth
                )));
            } else {
                (convert_pixel_data(&pixels, &target.layout())?, false)
            }
        };

        self.raster_format = data.raster_format;
        self.depth = data.depth;
        self.color_order = data.color_order;
        self.palette_type = data.palette_type;
        self.palette = data.palette_data;
        self.palette_size = data.palette_size;
        self.compression = data.compression;
        self.mipmaps = data.mipmaps;
        self.auto_mipmaps = data.auto_mipmaps && level_count <= 1;
        self.raster_type = data.raster_type;
        self.has_alpha = has_alpha;
        Ok(direct)
    }

    pub(crate) fn unset(&mut self) {
        *self = D3dSurface {
            raster_format: RasterFormat::Default,
            has_alpha: false,
            ..D3dSurface::default()
        };
    }

    pub(crate) fn raw_layer(&self, index: usize, codec: &str) -> Result<RawMipmapLayer> {
        let layer = crate::codec::layer_at(&self.mipmaps, index, codec)?;
        Ok(RawMipmapLayer {
            layer: layer.clone(),
            raster_format: self.raster_format,
            depth: self.depth,
            row_alignment: D3D_ROW_ALIGNMENT,
            color_order: self.color_order,
            palette_type: self.palette_type,
            palette_data: self.palette.clone(),
            palette_size: self.palette_size,
            compression: self.compression,
            is_newly_allocated: false,
        })
    }

    pub(crate) fn add_layer(&mut self, raw: RawMipmapLayer, codec: &str) -> Result<bool> {
        let (base_width, base_height) = self.base_size();
        if self.mipmaps.is_empty() {
            return Err(BinaryError::codec(codec, "cannot add a mipmap level to an empty texture"));
        }
        let level = self.mipmaps.len() as u32;
        let expected = mipmap_dimensions(base_width, base_height, level);
        if (raw.layer.layer_width, raw.layer.layer_height) != expected {
            return Err(BinaryError::invalid_data(format!(
                "mipmap {} must be {}x{}, got {}x{}",
                level, expected.0, expected.1, raw.layer.layer_width, raw.layer.layer_height
            )));
        }
        if raw.compression != self.compression {
            return Err(BinaryError::unsupported(format!(
                "{} mipmap cannot join a {} texture",
                raw.compression.name(),
                self.compression.name()
            )));
        }

        self.auto_mipmaps = false;
        if self.compression.is_compressed() {
            self.mipmaps.push(raw.layer);
            return Ok(true);
        }

        if self.palette_type.is_palette() && (!raw.palette_type.is_palette() || raw.palette_data != self.palette) {
            return Err(BinaryError::unsupported("mipmap palette differs from the texture palette"));
        }

        let source = RasterLayout::new(raw.raster_format, raw.depth, raw.color_order, raw.row_alignment)
            .with_palette(raw.palette_type);
        let target = self.layout();
        if source == target {
            self.mipmaps.push(raw.layer);
            return Ok(true);
        }

        let layer = &raw.layer;
        let texels = convert_mipmap_layer(
            &layer.texels,
            layer.width,
            layer.height,
            &source,
            &raw.palette_data,
            raw.palette_size,
            &target,
        )?;
        self.mipmaps.push(
            MipmapLayer::new(layer.width, layer.height, texels).with_layer_size(layer.layer_width, layer.layer_height),
        );
        Ok(false)
    }

    pub(crate) fn clear_mipmaps(&mut self) {
        self.mipmaps.truncate(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface_with_base() -> D3dSurface {
        D3dSurface {
            depth: 32,
            mipmaps: vec![MipmapLayer::new(4, 4, vec![0xFF; 64])],
            ..Default::default()
        }
    }

    #[test]
    fn test_add_layer_checks_dimensions() {
        let mut surface = surface_with_base();
        let mut raw = surface.raw_layer(0, "test").unwrap();
        raw.layer = MipmapLayer::new(2, 2, vec![0; 16]);
        assert!(surface.add_layer(raw.clone(), "test").unwrap());

        raw.layer = MipmapLayer::new(2, 2, vec![0; 16]);
        assert!(surface.add_layer(raw, "test").is_err());
        assert_eq!(surface.mipmaps.len(), 2);

        surface.clear_mipmaps();
        assert_eq!(surface.mipmaps.len(), 1);
    }

    #[test]
    fn test_add_layer_converts_order() {
        let mut surface = surface_with_base();
        let mut raw = surface.raw_layer(0, "test").unwrap();
        raw.color_order = ColorOrdering::Rgba;
        raw.layer = MipmapLayer::new(2, 2, [1u8, 2, 3, 4].repeat(4));
        assert!(!surface.add_layer(raw, "test").unwrap());
        assert_eq!(&surface.mipmaps[1].texels[..4], &[3, 2, 1, 4]);
    }
}
