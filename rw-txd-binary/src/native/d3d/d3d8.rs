//! Direct3D 8 native texture

use binrw::{BinRead, BinWrite};
use rw_txd_core::{CHUNK_STRUCT, LibraryVersion, driver, platform};

use super::{D3D_ROW_ALIGNMENT, D3dSurface, SurfaceTarget};
use crate::chunk::{BlockReader, BlockWriter, FixedHeader, name_from_fixed};
use crate::codec::{
    CodecCapabilities, CodecContext, CompatibilityResult, NativeTexture, NativeTextureCodec, TextureProperties,
    downcast_native, downcast_native_mut,
};
use crate::error::{BinaryError, Result};
use crate::native::common::{encode_name_field, read_sized_levels};
use crate::pixel::{
    ColorOrdering, CompressionType, PaletteType, PixelData, RasterFormat, RawMipmapLayer, SizeRules, TexFormatInfo,
    generate_raster_format_flags, read_raster_format_flags,
};

const CODEC_NAME: &str = "Direct3D8";

/// Packed meta header of a Direct3D 8 texture (88 bytes)
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct D3D8MetaHeader {
    pub platform: u32,
    pub tex_format: u32,
    pub name: [u8; 32],
    pub mask_name: [u8; 32],
    pub raster_format: u32,
    pub has_alpha: u32,
    pub width: u16,
    pub height: u16,
    pub depth: u8,
    pub mipmap_count: u8,
    /// Raster type in the low 3 bits
    pub raster_type: u8,
    /// DXT number, 0 for uncompressed
    pub dxt_compression: u8,
}

impl FixedHeader for D3D8MetaHeader {
    const SIZE: usize = 88;
}

/// Direct3D 8 texture state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeTextureD3D8 {
    pub version: LibraryVersion,
    pub surface: D3dSurface,
}

crate::impl_native_texture!(NativeTextureD3D8);

impl NativeTextureD3D8 {
    pub fn new(version: LibraryVersion) -> Self {
        Self {
            version,
            surface: D3dSurface::default(),
        }
    }
}

/// Layout Direct3D 8 stores for the given source description
///
/// Colors are BGRA, palettes RGBA. 4-bit palettes keep 4-bit indices.
fn compatible_target(
    format: RasterFormat,
    order: ColorOrdering,
    depth: u32,
    palette_type: PaletteType,
) -> SurfaceTarget {
    let _ = order;
    match palette_type {
        PaletteType::Pal4 | PaletteType::Pal4Lsb => SurfaceTarget {
            raster_format: format,
            depth: 4,
            color_order: ColorOrdering::Rgba,
            palette_type: PaletteType::Pal4,
        },
        PaletteType::Pal8 => SurfaceTarget {
            raster_format: format,
            depth: 8,
            color_order: ColorOrdering::Rgba,
            palette_type: PaletteType::Pal8,
        },
        PaletteType::None => {
            let (raster_format, depth) = match format {
                RasterFormat::R1555 | RasterFormat::R565 | RasterFormat::R4444 | RasterFormat::R555 => (format, 16),
                RasterFormat::Lum if depth == 8 => (format, 8),
                RasterFormat::R888 => (format, 32),
                _ => (RasterFormat::R8888, 32),
            };
            SurfaceTarget {
                raster_format,
                depth,
                color_order: ColorOrdering::Bgra,
                palette_type: PaletteType::None,
            }
        }
    }
}

/// Direct3D 8 codec
#[derive(Debug, Clone, Copy, Default)]
pub struct D3D8Codec;

impl D3D8Codec {
    fn native<'a>(&self, native: &'a dyn NativeTexture) -> Result<&'a NativeTextureD3D8> {
        downcast_native(native, CODEC_NAME)
    }

    fn native_mut<'a>(&self, native: &'a mut dyn NativeTexture) -> Result<&'a mut NativeTextureD3D8> {
        downcast_native_mut(native, CODEC_NAME)
    }
}

impl NativeTextureCodec for D3D8Codec {
    fn name(&self) -> &'static str {
        CODEC_NAME
    }

    fn driver_id(&self) -> u16 {
        driver::D3D8
    }

    fn capabilities(&self) -> CodecCapabilities {
        CodecCapabilities {
            compressions: vec![
                CompressionType::Dxt1,
                CompressionType::Dxt2,
                CompressionType::Dxt3,
                CompressionType::Dxt4,
                CompressionType::Dxt5,
            ],
            palette_types: vec![PaletteType::Pal4, PaletteType::Pal8],
            supports_cube_textures: false,
            row_alignment: D3D_ROW_ALIGNMENT,
            max_mipmaps: None,
            is_compressed_format: false,
        }
    }

    fn create_native(&self, version: LibraryVersion) -> Box<dyn NativeTexture> {
        Box::new(NativeTextureD3D8::new(version))
    }

    fn is_compatible_block(&self, reader: &mut BlockReader<'_>) -> Result<CompatibilityResult> {
        let (_, platform_id) = reader.with_block(|r, header| {
            if header.id != CHUNK_STRUCT {
                return Ok(None);
            }
            Ok(Some(r.read_u32()?))
        })?;
        Ok(match platform_id {
            Some(platform::D3D8) => CompatibilityResult::Absolute,
            _ => CompatibilityResult::None,
        })
    }

    fn deserialize(
        &self,
        reader: &mut BlockReader<'_>,
        version: LibraryVersion,
        ctx: &CodecContext<'_>,
    ) -> Result<(Box<dyn NativeTexture>, TextureProperties)> {
        let mut native = NativeTextureD3D8::new(version);

        let (_, properties) = reader.expect_block(CHUNK_STRUCT, |r, _| {
            let meta: D3D8MetaHeader = r.read_fixed()?;
            if meta.platform != platform::D3D8 {
                return Err(BinaryError::invalid_format(format!(
                    "platform descriptor {} is not Direct3D 8",
                    meta.platform
                )));
            }

            let properties = TextureProperties {
                name: name_from_fixed(&meta.name),
                mask_name: name_from_fixed(&meta.mask_name),
                format_info: TexFormatInfo::from_u32(meta.tex_format),
            };

            let info = read_raster_format_flags(meta.raster_format);
            let surface = &mut native.surface;
            surface.raster_format = info.format;
            surface.palette_type = info.palette_type;
            surface.auto_mipmaps = info.auto_mipmaps;
            surface.depth = meta.depth as u32;
            surface.raster_type = meta.raster_type & 0x7;
            surface.has_alpha = meta.has_alpha != 0;
            surface.color_order = if info.palette_type.is_palette() {
                ColorOrdering::Rgba
            } else {
                ColorOrdering::Bgra
            };

            if meta.dxt_compression != 0 {
                surface.compression = CompressionType::from_dxt_number(meta.dxt_compression as u32).ok_or_else(|| {
                    BinaryError::codec(
                        CODEC_NAME,
                        format!("texture '{}' has unknown DXT type {}", properties.name, meta.dxt_compression),
                    )
                })?;
            }

            surface.read_palette(r)?;
            surface.mipmaps = read_sized_levels(
                r,
                ctx,
                &properties.name,
                meta.mipmap_count as u32,
                meta.width as u32,
                meta.height as u32,
                surface.depth,
                D3D_ROW_ALIGNMENT,
                surface.compression,
            )?;

            Ok(properties)
        })?;

        Ok((Box::new(native), properties))
    }

    fn serialize(
        &self,
        native: &dyn NativeTexture,
        properties: &TextureProperties,
        writer: &mut BlockWriter<'_>,
        ctx: &CodecContext<'_>,
    ) -> Result<()> {
        let native = self.native(native)?;
        let surface = &native.surface;
        let level_count = surface.mipmaps.len();
        if level_count == 0 {
            return Err(BinaryError::codec(CODEC_NAME, "texture has no mipmap levels"));
        }
        let (width, height) = surface.base_size();

        let meta = D3D8MetaHeader {
            platform: platform::D3D8,
            tex_format: properties.format_info.to_u32(),
            name: encode_name_field(ctx, &properties.name, &properties.name, "name"),
            mask_name: encode_name_field(ctx, &properties.name, &properties.mask_name, "mask name"),
            raster_format: generate_raster_format_flags(
                surface.raster_format,
                surface.palette_type,
                level_count > 1,
                surface.auto_mipmaps,
            ),
            has_alpha: surface.has_alpha as u32,
            width: width as u16,
            height: height as u16,
            depth: surface.depth as u8,
            mipmap_count: level_count as u8,
            raster_type: surface.raster_type & 0x7,
            dxt_compression: surface.compression.dxt_number() as u8,
        };

        writer.with_block(CHUNK_STRUCT, |w| {
            w.write_fixed(&meta)?;
            surface.write_palette(w)?;
            surface.write_levels(w)
        })
    }

    fn get_pixel_data(&self, native: &dyn NativeTexture, _ctx: &CodecContext<'_>) -> Result<PixelData> {
        self.native(native)?.surface.pixel_data()
    }

    fn set_pixel_data(
        &self,
        native: &mut dyn NativeTexture,
        pixels: PixelData,
        ctx: &CodecContext<'_>,
    ) -> Result<bool> {
        let native = self.native_mut(native)?;
        if pixels.cube_texture {
            ctx.warn("Direct3D 8 has no cube textures; only the first face chain is kept");
        }
        let target = compatible_target(pixels.raster_format, pixels.color_order, pixels.depth, pixels.palette_type);
        let mut pixels = pixels;
        if pixels.cube_texture {
            let (w, h) = pixels.base_size();
            let chain = pixels
                .mipmaps
                .iter()
                .skip(1)
                .position(|m| (m.layer_width, m.layer_height) == (w, h))
                .map(|p| p + 1)
                .unwrap_or(pixels.mipmaps.len());
            pixels.truncate_mipmaps(chain);
            pixels.cube_texture = false;
        }
        native.surface.set_pixels(pixels, target, ctx, CODEC_NAME)
    }

    fn unset_pixel_data(&self, native: &mut dyn NativeTexture) -> Result<()> {
        self.native_mut(native)?.surface.unset();
        Ok(())
    }

    fn mipmap_count(&self, native: &dyn NativeTexture) -> usize {
        self.native(native).map(|n| n.surface.mipmaps.len()).unwrap_or(0)
    }

    fn get_mipmap_layer(&self, native: &dyn NativeTexture, index: usize) -> Result<RawMipmapLayer> {
        self.native(native)?.surface.raw_layer(index, CODEC_NAME)
    }

    fn add_mipmap_layer(
        &self,
        native: &mut dyn NativeTexture,
        layer: RawMipmapLayer,
        _ctx: &CodecContext<'_>,
    ) -> Result<bool> {
        self.native_mut(native)?.surface.add_layer(layer, CODEC_NAME)
    }

    fn clear_mipmaps(&self, native: &mut dyn NativeTexture) -> Result<()> {
        self.native_mut(native)?.surface.clear_mipmaps();
        Ok(())
    }

    fn size(&self, native: &dyn NativeTexture) -> (u32, u32) {
        self.native(native).map(|n| n.surface.base_size()).unwrap_or((0, 0))
    }

    fn size_rules(&self, native: &dyn NativeTexture) -> SizeRules {
        self.native(native).map(|n| n.surface.size_rules()).unwrap_or_default()
    }

    fn format_string(&self, native: &dyn NativeTexture) -> String {
        self.native(native)
            .map(|n| n.surface.format_string())
            .unwrap_or_else(|_| String::from("unknown"))
    }

    fn raster_format(&self, native: &dyn NativeTexture) -> RasterFormat {
        self.native(native).map(|n| n.surface.raster_format).unwrap_or_default()
    }

    fn palette_type(&self, native: &dyn NativeTexture) -> PaletteType {
        self.native(native).map(|n| n.surface.palette_type).unwrap_or_default()
    }

    fn compression(&self, native: &dyn NativeTexture) -> CompressionType {
        self.native(native).map(|n| n.surface.compression).unwrap_or_default()
    }

    fn has_alpha(&self, native: &dyn NativeTexture) -> bool {
        self.native(native).map(|n| n.surface.has_alpha).unwrap_or(false)
    }

    fn version(&self, native: &dyn NativeTexture) -> LibraryVersion {
        self.native(native).map(|n| n.version).unwrap_or_default()
    }

    fn set_version(&self, native: &mut dyn NativeTexture, version: LibraryVersion) {
        if let Ok(native) = self.native_mut(native) {
            native.version = version;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compatible_targets() {
        let target = compatible_target(RasterFormat::R8888, ColorOrdering::Rgba, 4, PaletteType::Pal4Lsb);
        assert_eq!(target.palette_type, PaletteType::Pal4);
        assert_eq!(target.depth, 4);

        let target = compatible_target(RasterFormat::R565, ColorOrdering::Rgba, 16, PaletteType::None);
        assert_eq!((target.depth, target.color_order), (16, ColorOrdering::Bgra));

        let target = compatible_target(RasterFormat::LumAlpha, ColorOrdering::Rgba, 16, PaletteType::None);
        assert_eq!(target.raster_format, RasterFormat::R8888);
    }

    #[test]
    fn test_meta_header_size() {
        let header = D3D8MetaHeader {
            platform: platform::D3D8,
            tex_format: 0,
            name: [0; 32],
            mask_name: [0; 32],
            raster_format: 0,
            has_alpha: 1,
            width: 4,
            height: 4,
            depth: 32,
            mipmap_count: 1,
            raster_type: 4,
            dxt_compression: 0,
        };
        let bytes = crate::chunk::encode_fixed(&header).unwrap();
        assert_eq!(bytes.len(), D3D8MetaHeader::SIZE);
        assert_eq!(&bytes[..4], &[8, 0, 0, 0]);
    }
}
