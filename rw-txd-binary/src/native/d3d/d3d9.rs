//! Direct3D 9 native texture

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

const CODEC_NAME: &str = "Direct3D9";

/// D3DFORMAT values understood by the codec
pub mod d3d_format {
    pub const UNKNOWN: u32 = 0;
    pub const R8G8B8: u32 = 20;
    pub const A8R8G8B8: u32 = 21;
    pub const X8R8G8B8: u32 = 22;
    pub const R5G6B5: u32 = 23;
    pub const X1R5G5B5: u32 = 24;
    pub const A1R5G5B5: u32 = 25;
    pub const A4R4G4B4: u32 = 26;
    pub const A8B8G8R8: u32 = 32;
    pub const X8B8G8R8: u32 = 33;
    pub const P8: u32 = 41;
    pub const L8: u32 = 50;

    const fn fourcc(code: &[u8; 4]) -> u32 {
        u32::from_le_bytes(*code)
    }

    pub const DXT1: u32 = fourcc(b"DXT1");
    pub const DXT2: u32 = fourcc(b"DXT2");
    pub const DXT3: u32 = fourcc(b"DXT3");
    pub const DXT4: u32 = fourcc(b"DXT4");
    pub const DXT5: u32 = fourcc(b"DXT5");

    /// Compression named by a FOURCC format
    pub fn compression(format: u32) -> Option<super::CompressionType> {
        use super::CompressionType;
        match format {
            DXT1 => Some(CompressionType::Dxt1),
            DXT2 => Some(CompressionType::Dxt2),
            DXT3 => Some(CompressionType::Dxt3),
            DXT4 => Some(CompressionType::Dxt4),
            DXT5 => Some(CompressionType::Dxt5),
            _ => None,
        }
    }

    pub fn for_compression(compression: super::CompressionType) -> u32 {
        use super::CompressionType;
        match compression {
            CompressionType::None => UNKNOWN,
            CompressionType::Dxt1 => DXT1,
            CompressionType::Dxt2 => DXT2,
            CompressionType::Dxt3 => DXT3,
            CompressionType::Dxt4 => DXT4,
            CompressionType::Dxt5 => DXT5,
        }
    }
}

/// Color order of a linear D3DFORMAT
fn format_color_order(format: u32) -> Option<ColorOrdering> {
    use d3d_format::*;
    match format {
        R8G8B8 | A8R8G8B8 | X8R8G8B8 | R5G6B5 | X1R5G5B5 | A1R5G5B5 | A4R4G4B4 => Some(ColorOrdering::Bgra),
        A8B8G8R8 | X8B8G8R8 | P8 | L8 => Some(ColorOrdering::Rgba),
        _ => None,
    }
}

/// D3DFORMAT describing a raster layout, if Direct3D 9 has one
pub fn d3d_format_for_raster(
    format: RasterFormat,
    palette_type: PaletteType,
    order: ColorOrdering,
    depth: u32,
) -> Option<u32> {
    use d3d_format::*;
    if palette_type.is_palette() {
        return (depth == 8 && order == ColorOrdering::Rgba).then_some(P8);
    }
    match (format, depth, order) {
        (RasterFormat::R1555, 16, ColorOrdering::Bgra) => Some(A1R5G5B5),
        (RasterFormat::R565, 16, ColorOrdering::Bgra) => Some(R5G6B5),
        (RasterFormat::R4444, 16, ColorOrdering::Bgra) => Some(A4R4G4B4),
        (RasterFormat::Lum, 8, _) => Some(L8),
        (RasterFormat::R8888, 32, ColorOrdering::Bgra) => Some(A8R8G8B8),
        (RasterFormat::R8888, 32, ColorOrdering::Rgba) => Some(A8B8G8R8),
        (RasterFormat::R888, 32, ColorOrdering::Bgra) => Some(X8R8G8B8),
        (RasterFormat::R888, 24, ColorOrdering::Bgra) => Some(R8G8B8),
        (RasterFormat::R888, 32, ColorOrdering::Rgba) => Some(X8B8G8R8),
        (RasterFormat::R555, 16, ColorOrdering::Bgra) => Some(X1R5G5B5),
        _ => None,
    }
}

/// Closest layout Direct3D 9 can store, plus its D3DFORMAT
fn compatible_target(
    format: RasterFormat,
    order: ColorOrdering,
    depth: u32,
    palette_type: PaletteType,
) -> (SurfaceTarget, u32) {
    use d3d_format::*;
    let target = |raster_format, depth, color_order| SurfaceTarget {
        raster_format,
        depth,
        color_order,
        palette_type: PaletteType::None,
    };

    if palette_type.is_palette() {
        let palette_type = match palette_type {
            PaletteType::Pal4Lsb => PaletteType::Pal4,
            other => other,
        };
        return (
            SurfaceTarget {
                raster_format: format,
                depth: 8,
                color_order: ColorOrdering::Rgba,
                palette_type,
            },
            P8,
        );
    }

    match format {
        RasterFormat::R1555 => (target(format, 16, ColorOrdering::Bgra), A1R5G5B5),
        RasterFormat::R565 => (target(format, 16, ColorOrdering::Bgra), R5G6B5),
        RasterFormat::R4444 => (target(format, 16, ColorOrdering::Bgra), A4R4G4B4),
        RasterFormat::R555 => (target(format, 16, ColorOrdering::Bgra), X1R5G5B5),
        RasterFormat::Lum if depth == 8 => (target(format, 8, order), L8),
        RasterFormat::R8888 => match order {
            ColorOrdering::Rgba => (target(format, 32, order), A8B8G8R8),
            _ => (target(format, 32, ColorOrdering::Bgra), A8R8G8B8),
        },
        RasterFormat::R888 => match (order, depth) {
            (ColorOrdering::Bgra, 24) => (target(format, 24, order), R8G8B8),
            (ColorOrdering::Rgba, _) => (target(format, 32, order), X8B8G8R8),
            _ => (target(format, 32, ColorOrdering::Bgra), X8R8G8B8),
        },
        _ => (target(RasterFormat::R8888, 32, ColorOrdering::Bgra), A8R8G8B8),
    }
}

/// Packed meta header of a Direct3D 9 texture (88 bytes)
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct D3D9MetaHeader {
    pub platform: u32,
    pub tex_format: u32,
    pub name: [u8; 32],
    pub mask_name: [u8; 32],
    pub raster_format: u32,
    pub d3d_format: u32,
    pub width: u16,
    pub height: u16,
    pub depth: u8,
    pub mipmap_count: u8,
    /// Raster type in the low 3 bits
    pub raster_type: u8,
    /// hasAlpha 0x1, isCubeTexture 0x2, autoMipMaps 0x4, isNotRwCompatible 0x8
    pub flags: u8,
}

impl FixedHeader for D3D9MetaHeader {
    const SIZE: usize = 88;
}

const FLAG_HAS_ALPHA: u8 = 0x1;
const FLAG_CUBE_TEXTURE: u8 = 0x2;
const FLAG_AUTO_MIPMAPS: u8 = 0x4;
const FLAG_NOT_RW_COMPATIBLE: u8 = 0x8;

/// Faces stored per level of a cube texture
const CUBE_FACES: usize = 6;

/// Direct3D 9 texture state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeTextureD3D9 {
    pub version: LibraryVersion,
    pub surface: D3dSurface,
    pub d3d_format: u32,
    /// Whether `d3d_format` matches the RenderWare raster description
    pub format_link: bool,
    /// Cube textures keep six faces; `surface.mipmaps` is face major
    pub cube_texture: bool,
}

crate::impl_native_texture!(NativeTextureD3D9);

impl NativeTextureD3D9 {
    pub fn new(version: LibraryVersion) -> Self {
        Self {
            version,
            surface: D3dSurface::default(),
            d3d_format: d3d_format::A8R8G8B8,
            format_link: false,
            cube_texture: false,
        }
    }

    /// Pixels can be interpreted by the RenderWare raster model
    pub fn is_rw_compatible(&self) -> bool {
        self.format_link || self.surface.compression.is_compressed()
    }

    /// Levels per face
    pub fn level_count(&self) -> usize {
        if self.cube_texture {
            self.surface.mipmaps.len() / CUBE_FACES
        } else {
            self.surface.mipmaps.len()
        }
    }
}

/// Direct3D 9 codec
#[derive(Debug, Clone, Copy, Default)]
pub struct D3D9Codec;

impl D3D9Codec {
    fn native<'a>(&self, native: &'a dyn NativeTexture) -> Result<&'a NativeTextureD3D9> {
        downcast_native(native, CODEC_NAME)
    }

    fn native_mut<'a>(&self, native: &'a mut dyn NativeTexture) -> Result<&'a mut NativeTextureD3D9> {
        downcast_native_mut(native, CODEC_NAME)
    }
}

impl NativeTextureCodec for D3D9Codec {
    fn name(&self) -> &'static str {
        CODEC_NAME
    }

    fn driver_id(&self) -> u16 {
        driver::D3D9
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
            supports_cube_textures: true,
            row_alignment: D3D_ROW_ALIGNMENT,
            max_mipmaps: None,
            is_compressed_format: false,
        }
    }

    fn create_native(&self, version: LibraryVersion) -> Box<dyn NativeTexture> {
        Box::new(NativeTextureD3D9::new(version))
    }

    fn is_compatible_block(&self, reader: &mut BlockReader<'_>) -> Result<CompatibilityResult> {
        let (_, platform_id) = reader.with_block(|r, header| {
            if header.id != CHUNK_STRUCT {
                return Ok(None);
            }
            Ok(Some(r.read_u32()?))
        })?;
        // Some tools stamp descriptor 9 on other layouts, so this is never certain
        Ok(match platform_id {
            Some(platform::D3D9) => CompatibilityResult::Maybe,
            _ => CompatibilityResult::None,
        })
    }

    fn deserialize(
        &self,
        reader: &mut BlockReader<'_>,
        version: LibraryVersion,
        ctx: &CodecContext<'_>,
    ) -> Result<(Box<dyn NativeTexture>, TextureProperties)> {
        let mut native = NativeTextureD3D9::new(version);

        let (_, properties) = reader.expect_block(CHUNK_STRUCT, |r, _| {
            let meta: D3D9MetaHeader = r.read_fixed()?;
            if meta.platform != platform::D3D9 {
                return Err(BinaryError::invalid_format(format!(
                    "platform descriptor {} is not Direct3D 9",
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
            surface.depth = meta.depth as u32;
            surface.raster_type = meta.raster_type & 0x7;
            surface.has_alpha = meta.flags & FLAG_HAS_ALPHA != 0;
            surface.auto_mipmaps = meta.flags & FLAG_AUTO_MIPMAPS != 0;
            native.cube_texture = meta.flags & FLAG_CUBE_TEXTURE != 0;
            native.d3d_format = meta.d3d_format;

            if let Some(compression) = d3d_format::compression(meta.d3d_format) {
                surface.compression = compression;
                surface.color_order = ColorOrdering::Bgra;
                native.format_link = true;
            } else {
                surface.color_order = format_color_order(meta.d3d_format).unwrap_or(ColorOrdering::Bgra);
                native.format_link = d3d_format_for_raster(
                    surface.raster_format,
                    surface.palette_type,
                    surface.color_order,
                    surface.depth,
                ) == Some(meta.d3d_format);
            }

            if !native.format_link && !surface.compression.is_compressed() {
                ctx.warn(format!(
                    "texture '{}' uses D3DFORMAT {} without a RenderWare raster equivalent",
                    properties.name, meta.d3d_format
                ));
            }
            let rw_compatible = native.format_link || surface.compression.is_compressed();
            if (meta.flags & FLAG_NOT_RW_COMPATIBLE != 0) == rw_compatible {
                tracing::debug!("texture '{}' RW compatibility flag disagrees with its format", properties.name);
            }

            surface.read_palette(r)?;

            let faces = if native.cube_texture { CUBE_FACES } else { 1 };
            for _ in 0..faces {
                let levels = read_sized_levels(
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
                surface.mipmaps.extend(levels);
            }

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
        let (width, height) = surface.base_size();
        let level_count = native.level_count();
        if level_count == 0 {
            return Err(BinaryError::codec(CODEC_NAME, "texture has no mipmap levels"));
        }

        let mut flags = 0u8;
        if surface.has_alpha {
            flags |= FLAG_HAS_ALPHA;
        }
        if native.cube_texture {
            flags |= FLAG_CUBE_TEXTURE;
        }
        if surface.auto_mipmaps {
            flags |= FLAG_AUTO_MIPMAPS;
        }
        if !native.format_link {
            flags |= FLAG_NOT_RW_COMPATIBLE;
        }

        let meta = D3D9MetaHeader {
            platform: platform::D3D9,
            tex_format: properties.format_info.to_u32(),
            name: encode_name_field(ctx, &properties.name, &properties.name, "name"),
            mask_name: encode_name_field(ctx, &properties.name, &properties.mask_name, "mask name"),
            raster_format: generate_raster_format_flags(
                surface.raster_format,
                surface.palette_type,
                level_count > 1,
                surface.auto_mipmaps,
            ),
            d3d_format: native.d3d_format,
            width: width as u16,
            height: height as u16,
            depth: surface.depth as u8,
            mipmap_count: level_count as u8,
            raster_type: surface.raster_type & 0x7,
            flags,
        };

        writer.with_block(CHUNK_STRUCT, |w| {
            w.write_fixed(&meta)?;
            surface.write_palette(w)?;
            surface.write_levels(w)
        })
    }

    fn get_pixel_data(&self, native: &dyn NativeTexture, _ctx: &CodecContext<'_>) -> Result<PixelData> {
        let native = self.native(native)?;
        if !native.is_rw_compatible() {
            return Err(BinaryError::codec(
                CODEC_NAME,
                "cannot fetch pixels from a raster that has no representation in RenderWare",
            ));
        }
        let mut pixels = native.surface.pixel_data()?;
        pixels.cube_texture = native.cube_texture;
        Ok(pixels)
    }

    fn set_pixel_data(
        &self,
        native: &mut dyn NativeTexture,
        pixels: PixelData,
        ctx: &CodecContext<'_>,
    ) -> Result<bool> {
        let native = self.native_mut(native)?;
        let cube_texture = pixels.cube_texture && pixels.mipmaps.len() % CUBE_FACES == 0;

        let (target, format) = compatible_target(pixels.raster_format, pixels.color_order, pixels.depth, pixels.palette_type);
        let compression = pixels.compression;
        let direct = native.surface.set_pixels(pixels, target, ctx, CODEC_NAME)?;

        native.cube_texture = cube_texture;
        native.d3d_format = if compression.is_compressed() {
            d3d_format::for_compression(compression)
        } else {
            format
        };
        native.format_link = true;
        Ok(direct)
    }

    fn unset_pixel_data(&self, native: &mut dyn NativeTexture) -> Result<()> {
        let native = self.native_mut(native)?;
        native.surface.unset();
        native.d3d_format = d3d_format::UNKNOWN;
        native.cube_texture = false;
        Ok(())
    }

    fn mipmap_count(&self, native: &dyn NativeTexture) -> usize {
        self.native(native).map(|n| n.level_count()).unwrap_or(0)
    }

    fn get_mipmap_layer(&self, native: &dyn NativeTexture, index: usize) -> Result<RawMipmapLayer> {
        let native = self.native(native)?;
        if !native.is_rw_compatible() {
            return Err(BinaryError::codec(CODEC_NAME, "mipmap has an unknown D3DFORMAT"));
        }
        native.surface.raw_layer(index, CODEC_NAME)
    }

    fn add_mipmap_layer(
        &self,
        native: &mut dyn NativeTexture,
        layer: RawMipmapLayer,
        _ctx: &CodecContext<'_>,
    ) -> Result<bool> {
        let native = self.native_mut(native)?;
        if !native.is_rw_compatible() {
            return Err(BinaryError::codec(CODEC_NAME, "cannot add mipmaps to a texture with an unknown D3DFORMAT"));
        }
        if native.cube_texture {
            return Err(BinaryError::unsupported("adding single mipmap levels to cube textures"));
        }
        native.surface.add_layer(layer, CODEC_NAME)
    }

    fn clear_mipmaps(&self, native: &mut dyn NativeTexture) -> Result<()> {
        let native = self.native_mut(native)?;
        if native.cube_texture {
            let levels = native.level_count();
            let faces: Vec<_> = native.surface.mipmaps.chunks(levels.max(1)).map(|face| face[0].clone()).collect();
            native.surface.mipmaps = faces;
        } else {
            native.surface.clear_mipmaps();
        }
        Ok(())
    }

    fn size(&self, native: &dyn NativeTexture) -> (u32, u32) {
        self.native(native).map(|n| n.surface.base_size()).unwrap_or((0, 0))
    }

    fn size_rules(&self, native: &dyn NativeTexture) -> SizeRules {
        self.native(native)
            .map(|n| n.surface.size_rules())
            .unwrap_or_default()
    }

    fn format_string(&self, native: &dyn NativeTexture) -> String {
        match self.native(native) {
            Ok(n) if !n.is_rw_compatible() => format!("D3DFORMAT {}", n.d3d_format),
            Ok(n) => n.surface.format_string(),
            Err(_) => String::from("unknown"),
        }
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
    fn test_fourcc_values() {
        assert_eq!(d3d_format::DXT1, 0x3154_5844);
        assert_eq!(d3d_format::compression(d3d_format::DXT5), Some(CompressionType::Dxt5));
        assert_eq!(d3d_format::compression(d3d_format::A8R8G8B8), None);
    }

    #[test]
    fn test_format_links() {
        assert_eq!(
            d3d_format_for_raster(RasterFormat::R8888, PaletteType::None, ColorOrdering::Bgra, 32),
            Some(d3d_format::A8R8G8B8)
        );
        assert_eq!(
            d3d_format_for_raster(RasterFormat::R8888, PaletteType::Pal8, ColorOrdering::Rgba, 8),
            Some(d3d_format::P8)
        );
        assert_eq!(d3d_format_for_raster(RasterFormat::R565, PaletteType::None, ColorOrdering::Rgba, 16), None);
    }

    #[test]
    fn test_compatible_targets() {
        let (target, format) = compatible_target(RasterFormat::R888, ColorOrdering::Abgr, 24, PaletteType::None);
        assert_eq!((target.depth, target.color_order, format), (32, ColorOrdering::Bgra, d3d_format::X8R8G8B8));

        let (target, format) = compatible_target(RasterFormat::R8888, ColorOrdering::Bgra, 4, PaletteType::Pal4Lsb);
        assert_eq!(target.palette_type, PaletteType::Pal4);
        assert_eq!((target.depth, format), (8, d3d_format::P8));

        let (target, _) = compatible_target(RasterFormat::D24, ColorOrdering::Rgba, 24, PaletteType::None);
        assert_eq!(target.raster_format, RasterFormat::R8888);
    }

    #[test]
    fn test_meta_header_size() {
        let header = D3D9MetaHeader {
            platform: 9,
            tex_format: 0,
            name: [0; 32],
            mask_name: [0; 32],
            raster_format: 0,
            d3d_format: 0,
            width: 0,
            height: 0,
            depth: 0,
            mipmap_count: 0,
            raster_type: 0,
            flags: 0,
        };
        let bytes = crate::chunk::encode_fixed(&header).unwrap();
        assert_eq!(bytes.len(), D3D9MetaHeader::SIZE);
    }
}
