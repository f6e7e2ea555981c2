//! PowerVR (PVRTC) native texture
//!
//! Mobile ports store every level PVRTC1 compressed. The struct block is a
//! 100 byte meta header, one `u32` size per level and then the level data.
//! Reading decompresses to 888/8888 RGBA; storing pixels always re-encodes,
//! so a round trip through this codec is lossy.

mod pvrtc;

pub use pvrtc::{PvrtcMode, decode_pvrtc, encode_pvrtc, morton_index};

use binrw::{BinRead, BinWrite};
use rw_txd_core::{CHUNK_STRUCT, LibraryVersion, driver, platform};

use crate::chunk::{BlockReader, BlockWriter, FixedHeader, name_from_fixed};
use crate::codec::{
    CodecCapabilities, CodecContext, CompatibilityResult, NativeTexture, NativeTextureCodec, TextureProperties,
    downcast_native, downcast_native_mut, layer_at,
};
use crate::error::{BinaryError, Result};
use crate::native::common::encode_name_field;
use crate::pixel::{
    ColorOrdering, CompressionType, MipmapLayer, PaletteType, PixelData, RASTER_TYPE_BITMAP, RasterFormat,
    RasterLayout, RawMipmapLayer, SizeRules, TexFormatInfo, block_aligned_dimensions, calculate_has_alpha,
    convert_pixel_data, mipmap_dimensions,
};

const CODEC_NAME: &str = "PowerVR";

/// Row alignment of decoded PVR pixels
const PVR_EXPORT_ROW_ALIGNMENT: u32 = 4;

/// Base level area from which the 2bpp variants are chosen
const LOW_BITRATE_AREA: u32 = 100 * 100;

/// GL internal format stored in the meta header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PvrInternalFormat {
    Rgb4bpp,
    Rgb2bpp,
    Rgba4bpp,
    Rgba2bpp,
}

impl PvrInternalFormat {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0x8C00 => Some(Self::Rgb4bpp),
            0x8C01 => Some(Self::Rgb2bpp),
            0x8C02 => Some(Self::Rgba4bpp),
            0x8C03 => Some(Self::Rgba2bpp),
            _ => None,
        }
    }

    pub fn to_u32(&self) -> u32 {
        match self {
            Self::Rgb4bpp => 0x8C00,
            Self::Rgb2bpp => 0x8C01,
            Self::Rgba4bpp => 0x8C02,
            Self::Rgba2bpp => 0x8C03,
        }
    }

    /// Format chosen for newly stored pixels
    pub fn for_pixels(has_alpha: bool, base_width: u32, base_height: u32) -> Self {
        let low_bitrate = base_width * base_height >= LOW_BITRATE_AREA;
        match (has_alpha, low_bitrate) {
            (true, true) => Self::Rgba2bpp,
            (true, false) => Self::Rgba4bpp,
            (false, true) => Self::Rgb2bpp,
            (false, false) => Self::Rgb4bpp,
        }
    }

    pub fn mode(&self) -> PvrtcMode {
        match self {
            Self::Rgb4bpp | Self::Rgba4bpp => PvrtcMode::FourBpp,
            Self::Rgb2bpp | Self::Rgba2bpp => PvrtcMode::TwoBpp,
        }
    }

    pub fn has_alpha(&self) -> bool {
        matches!(self, Self::Rgba4bpp | Self::Rgba2bpp)
    }

    /// Layout texels are decoded to
    pub fn decoded_layout(&self) -> RasterLayout {
        let format = if self.has_alpha() {
            RasterFormat::R8888
        } else {
            RasterFormat::R888
        };
        RasterLayout::new(format, 32, ColorOrdering::Rgba, PVR_EXPORT_ROW_ALIGNMENT)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Rgb4bpp => "RGB 4bit",
            Self::Rgb2bpp => "RGB 2bit",
            Self::Rgba4bpp => "RGBA 4bit",
            Self::Rgba2bpp => "RGBA 2bit",
        }
    }
}

/// Packed meta header of a PowerVR texture (100 bytes)
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct PvrMetaHeader {
    pub platform: u32,
    pub tex_format: u32,
    pub pad1: [u8; 8],
    pub name: [u8; 32],
    pub mask_name: [u8; 32],
    pub mipmap_count: u8,
    pub unk1: u8,
    pub has_alpha: u8,
    pub pad2: u8,
    pub width: u16,
    pub height: u16,
    pub internal_format: u32,
    /// Level data plus one size word per level
    pub image_data_stream_size: u32,
    pub unk8: u32,
}

impl FixedHeader for PvrMetaHeader {
    const SIZE: usize = 100;
}

/// PowerVR texture state
///
/// Levels keep their block aligned dimensions in `width`/`height` and the
/// visible ones in `layer_width`/`layer_height`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeTexturePVR {
    pub version: LibraryVersion,
    pub internal_format: PvrInternalFormat,
    pub has_alpha: bool,
    pub mipmaps: Vec<MipmapLayer>,
    pub unk1: u8,
    pub unk8: u32,
}

crate::impl_native_texture!(NativeTexturePVR);

impl NativeTexturePVR {
    pub fn new(version: LibraryVersion) -> Self {
        Self {
            version,
            internal_format: PvrInternalFormat::Rgb4bpp,
            has_alpha: false,
            mipmaps: Vec::new(),
            unk1: 0,
            unk8: 0,
        }
    }

    pub fn base_size(&self) -> (u32, u32) {
        self.mipmaps
            .first()
            .map(|m| (m.layer_width, m.layer_height))
            .unwrap_or((0, 0))
    }

    /// Decode one level to the layer size
    pub fn decode_level(&self, index: usize) -> Result<MipmapLayer> {
        let layer = layer_at(&self.mipmaps, index, CODEC_NAME)?;
        let decoded = decode_pvrtc(&layer.texels, layer.width, layer.height, self.internal_format.mode())?;

        let opaque = !self.internal_format.has_alpha();
        let (lw, lh) = (layer.layer_width, layer.layer_height);
        let mut texels = Vec::with_capacity(lw as usize * lh as usize * 4);
        for y in 0..lh as usize {
            let start = y * layer.width as usize * 4;
            let row = &decoded[start..start + lw as usize * 4];
            if opaque {
                texels.extend(row.chunks_exact(4).flat_map(|px| [px[0], px[1], px[2], 255]));
            } else {
                texels.extend_from_slice(row);
            }
        }
        Ok(MipmapLayer::new(lw, lh, texels))
    }

    /// Compress an RGBA8 level (tightly packed, layer sized)
    fn encode_level(&self, rgba: &[u8], layer_width: u32, layer_height: u32) -> Result<MipmapLayer> {
        let mode = self.internal_format.mode();
        let (align_w, align_h) = mode.alignment();
        let (width, height) = block_aligned_dimensions(layer_width, layer_height, align_w, align_h);

        let padded = if (width, height) == (layer_width, layer_height) {
            rgba.to_vec()
        } else {
            // clamp to the edge texel so padding does not bleed into the visible area
            let mut padded = Vec::with_capacity(width as usize * height as usize * 4);
            for y in 0..height {
                let src_y = y.min(layer_height - 1);
                for x in 0..width {
                    let offset = ((src_y * layer_width + x.min(layer_width - 1)) * 4) as usize;
                    padded.extend_from_slice(&rgba[offset..offset + 4]);
                }
            }
            padded
        };

        let texels = encode_pvrtc(&padded, width, height, mode, self.internal_format.has_alpha())?;
        Ok(MipmapLayer::new(width, height, texels).with_layer_size(layer_width, layer_height))
    }

    fn size_rules() -> SizeRules {
        SizeRules {
            power_of_two: true,
            squared: true,
            ..SizeRules::unrestricted()
        }
    }

    fn image_data_stream_size(&self) -> u32 {
        self.mipmaps.iter().map(|m| m.texels.len() as u32 + 4).sum()
    }
}

/// Tightly packed RGBA8 texels of every level
fn rgba_levels(pixels: &PixelData) -> Result<PixelData> {
    let layout = RasterLayout::new(RasterFormat::R8888, 32, ColorOrdering::Rgba, 1);
    convert_pixel_data(pixels, &layout)
}

/// PowerVR codec
#[derive(Debug, Clone, Copy, Default)]
pub struct PvrCodec;

impl PvrCodec {
    fn native<'a>(&self, native: &'a dyn NativeTexture) -> Result<&'a NativeTexturePVR> {
        downcast_native(native, CODEC_NAME)
    }

    fn native_mut<'a>(&self, native: &'a mut dyn NativeTexture) -> Result<&'a mut NativeTexturePVR> {
        downcast_native_mut(native, CODEC_NAME)
    }
}

impl NativeTextureCodec for PvrCodec {
    fn name(&self) -> &'static str {
        CODEC_NAME
    }

    fn driver_id(&self) -> u16 {
        driver::PVR
    }

    fn capabilities(&self) -> CodecCapabilities {
        CodecCapabilities {
            compressions: Vec::new(),
            palette_types: Vec::new(),
            supports_cube_textures: false,
            row_alignment: PVR_EXPORT_ROW_ALIGNMENT,
            max_mipmaps: None,
            is_compressed_format: true,
        }
    }

    fn create_native(&self, version: LibraryVersion) -> Box<dyn NativeTexture> {
        Box::new(NativeTexturePVR::new(version))
    }

    fn is_compatible_block(&self, reader: &mut BlockReader<'_>) -> Result<CompatibilityResult> {
        let (_, platform_id) = reader.with_block(|r, header| {
            if header.id != CHUNK_STRUCT {
                return Ok(None);
            }
            Ok(Some(r.read_u32()?))
        })?;
        Ok(match platform_id {
            Some(platform::PVR) => CompatibilityResult::Absolute,
            _ => CompatibilityResult::None,
        })
    }

    fn deserialize(
        &self,
        reader: &mut BlockReader<'_>,
        version: LibraryVersion,
        ctx: &CodecContext<'_>,
    ) -> Result<(Box<dyn NativeTexture>, TextureProperties)> {
        let mut native = NativeTexturePVR::new(version);

        let (_, properties) = reader.expect_block(CHUNK_STRUCT, |r, _| {
            let meta: PvrMetaHeader = r.read_fixed()?;
            if meta.platform != platform::PVR {
                return Err(BinaryError::invalid_format(format!(
                    "platform descriptor {} is not PowerVR",
                    meta.platform
                )));
            }

            let properties = TextureProperties {
                name: name_from_fixed(&meta.name),
                mask_name: name_from_fixed(&meta.mask_name),
                format_info: TexFormatInfo::from_u32(meta.tex_format),
            };

            native.internal_format = PvrInternalFormat::from_u32(meta.internal_format).ok_or_else(|| {
                BinaryError::codec(
                    CODEC_NAME,
                    format!(
                        "texture '{}' has unknown internal format {:#x}",
                        properties.name, meta.internal_format
                    ),
                )
            })?;
            native.has_alpha = meta.has_alpha != 0;
            native.unk1 = meta.unk1;
            native.unk8 = meta.unk8;

            let count = meta.mipmap_count as usize;
            let mut sizes = Vec::with_capacity(count);
            for _ in 0..count {
                sizes.push(r.read_u32()? as usize);
            }

            let mode = native.internal_format.mode();
            let (align_w, align_h) = mode.alignment();
            for (level, size) in sizes.into_iter().enumerate() {
                let (layer_width, layer_height) =
                    mipmap_dimensions(meta.width as u32, meta.height as u32, level as u32);
                let (width, height) = block_aligned_dimensions(layer_width, layer_height, align_w, align_h);
                let expected = mode.data_size(width, height);
                if size < expected {
                    return Err(BinaryError::invalid_data(format!(
                        "texture '{}' mipmap {} holds {} bytes, {} required",
                        properties.name, level, size, expected
                    )));
                }
                let mut texels = r.read_bytes(size)?;
                if size > expected {
                    ctx.warn(format!(
                        "texture '{}' mipmap {} has {} surplus bytes",
                        properties.name,
                        level,
                        size - expected
                    ));
                    texels.truncate(expected);
                }
                native
                    .mipmaps
                    .push(MipmapLayer::new(width, height, texels).with_layer_size(layer_width, layer_height));
            }

            if meta.image_data_stream_size != native.image_data_stream_size() {
                tracing::debug!(
                    "texture '{}' declares {} image bytes, levels hold {}",
                    properties.name,
                    meta.image_data_stream_size,
                    native.image_data_stream_size()
                );
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
        if native.mipmaps.is_empty() {
            return Err(BinaryError::codec(CODEC_NAME, "texture has no mipmap levels"));
        }
        let (width, height) = native.base_size();

        let meta = PvrMetaHeader {
            platform: platform::PVR,
            tex_format: properties.format_info.to_u32(),
            pad1: [0; 8],
            name: encode_name_field(ctx, &properties.name, &properties.name, "name"),
            mask_name: encode_name_field(ctx, &properties.name, &properties.mask_name, "mask name"),
            mipmap_count: native.mipmaps.len() as u8,
            unk1: native.unk1,
            has_alpha: native.has_alpha as u8,
            pad2: 0,
            width: width as u16,
            height: height as u16,
            internal_format: native.internal_format.to_u32(),
            image_data_stream_size: native.image_data_stream_size(),
            unk8: native.unk8,
        };

        writer.with_block(CHUNK_STRUCT, |w| {
            w.write_fixed(&meta)?;
            for layer in &native.mipmaps {
                w.write_u32(layer.texels.len() as u32)?;
            }
            for layer in &native.mipmaps {
                w.write_bytes(&layer.texels)?;
            }
            Ok(())
        })
    }

    fn get_pixel_data(&self, native: &dyn NativeTexture, _ctx: &CodecContext<'_>) -> Result<PixelData> {
        let native = self.native(native)?;
        let layout = native.internal_format.decoded_layout();
        let mut pixels = PixelData::new(layout.raster_format, layout.depth, layout.color_order)
            .with_row_alignment(layout.row_alignment);
        for index in 0..native.mipmaps.len() {
            pixels.push_mipmap(native.decode_level(index)?);
        }
        pixels.has_alpha = native.has_alpha;
        pixels.raster_type = RASTER_TYPE_BITMAP;
        pixels.auto_mipmaps = false;
        pixels.is_newly_allocated = true;
        Ok(pixels)
    }

    fn set_pixel_data(
        &self,
        native: &mut dyn NativeTexture,
        pixels: PixelData,
        ctx: &CodecContext<'_>,
    ) -> Result<bool> {
        let native = self.native_mut(native)?;
        if pixels.mipmaps.is_empty() {
            return Err(BinaryError::codec(CODEC_NAME, "pixel data has no mipmap levels"));
        }
        let (base_width, base_height) = pixels.base_size();
        if !NativeTexturePVR::size_rules().verify_dimensions(base_width, base_height) {
            return Err(BinaryError::codec(
                CODEC_NAME,
                format!("{}x{} is not a square power of two", base_width, base_height),
            ));
        }
        if pixels.cube_texture {
            ctx.warn("PowerVR has no cube textures; only the first face chain is kept");
        }

        let has_alpha = calculate_has_alpha(&pixels)?;
        let rgba = rgba_levels(&pixels)?;

        native.internal_format = PvrInternalFormat::for_pixels(has_alpha, base_width, base_height);
        native.has_alpha = has_alpha;
        native.mipmaps.clear();
        for (level, layer) in rgba.mipmaps.iter().enumerate() {
            let expected = mipmap_dimensions(base_width, base_height, level as u32);
            if (layer.layer_width, layer.layer_height) != expected {
                break;
            }
            let encoded = native.encode_level(&layer.texels, layer.layer_width, layer.layer_height)?;
            native.mipmaps.push(encoded);
        }
        Ok(false)
    }

    fn unset_pixel_data(&self, native: &mut dyn NativeTexture) -> Result<()> {
        self.native_mut(native)?.mipmaps.clear();
        Ok(())
    }

    fn mipmap_count(&self, native: &dyn NativeTexture) -> usize {
        self.native(native).map(|n| n.mipmaps.len()).unwrap_or(0)
    }

    fn get_mipmap_layer(&self, native: &dyn NativeTexture, index: usize) -> Result<RawMipmapLayer> {
        let native = self.native(native)?;
        let layout = native.internal_format.decoded_layout();
        Ok(RawMipmapLayer {
            layer: native.decode_level(index)?,
            raster_format: layout.raster_format,
            depth: layout.depth,
            row_alignment: layout.row_alignment,
            color_order: layout.color_order,
            palette_type: PaletteType::None,
            palette_data: Vec::new(),
            palette_size: 0,
            compression: CompressionType::None,
            is_newly_allocated: true,
        })
    }

    fn add_mipmap_layer(
        &self,
        native: &mut dyn NativeTexture,
        layer: RawMipmapLayer,
        _ctx: &CodecContext<'_>,
    ) -> Result<bool> {
        let native = self.native_mut(native)?;
        if native.mipmaps.is_empty() {
            return Err(BinaryError::codec(CODEC_NAME, "cannot add a mipmap level to an empty texture"));
        }
        let (base_width, base_height) = native.base_size();
        let level = native.mipmaps.len() as u32;
        let expected = mipmap_dimensions(base_width, base_height, level);
        if (layer.layer.layer_width, layer.layer.layer_height) != expected {
            return Err(BinaryError::invalid_data(format!(
                "mipmap {} must be {}x{}, got {}x{}",
                level, expected.0, expected.1, layer.layer.layer_width, layer.layer.layer_height
            )));
        }

        let single = PixelData {
            raster_format: layer.raster_format,
            depth: layer.depth,
            row_alignment: layer.row_alignment,
            color_order: layer.color_order,
            palette_type: layer.palette_type,
            palette_data: layer.palette_data,
            palette_size: layer.palette_size,
            compression: layer.compression,
            mipmaps: vec![layer.layer],
            ..PixelData::default()
        };
        let rgba = rgba_levels(&single)?;
        let source = layer_at(&rgba.mipmaps, 0, CODEC_NAME)?;
        let encoded = native.encode_level(&source.texels, source.layer_width, source.layer_height)?;
        native.mipmaps.push(encoded);
        Ok(false)
    }

    fn clear_mipmaps(&self, native: &mut dyn NativeTexture) -> Result<()> {
        self.native_mut(native)?.mipmaps.truncate(1);
        Ok(())
    }

    fn size(&self, native: &dyn NativeTexture) -> (u32, u32) {
        self.native(native).map(|n| n.base_size()).unwrap_or((0, 0))
    }

    fn size_rules(&self, _native: &dyn NativeTexture) -> SizeRules {
        NativeTexturePVR::size_rules()
    }

    fn format_string(&self, native: &dyn NativeTexture) -> String {
        self.native(native)
            .map(|n| format!("PVR {}", n.internal_format.name()))
            .unwrap_or_else(|_| String::from("unknown"))
    }

    fn raster_format(&self, native: &dyn NativeTexture) -> RasterFormat {
        self.native(native)
            .map(|n| n.internal_format.decoded_layout().raster_format)
            .unwrap_or_default()
    }

    fn palette_type(&self, _native: &dyn NativeTexture) -> PaletteType {
        PaletteType::None
    }

    fn compression(&self, _native: &dyn NativeTexture) -> CompressionType {
        CompressionType::None
    }

    fn is_compressed(&self, _native: &dyn NativeTexture) -> bool {
        true
    }

    fn has_alpha(&self, native: &dyn NativeTexture) -> bool {
        self.native(native).map(|n| n.has_alpha).unwrap_or(false)
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
    use crate::chunk::{ChunkReader, ChunkWriter, ReadSeek, WriteSeek};
    use rw_txd_core::{BlockLengthMode, CHUNK_TEXTURENATIVE, Diagnostics, EngineConfig};
    use std::io::Cursor;

    fn solid(size: u32, levels: u32, color: [u8; 4]) -> PixelData {
        let mut pixels = PixelData::new(RasterFormat::R8888, 32, ColorOrdering::Rgba);
        for level in 0..levels {
            let (w, h) = mipmap_dimensions(size, size, level);
            pixels.push_mipmap(MipmapLayer::new(w, h, color.repeat((w * h) as usize)));
        }
        pixels
    }

    fn encoded(pixels: PixelData) -> NativeTexturePVR {
        let config = EngineConfig::default();
        let diagnostics = Diagnostics::default();
        let ctx = CodecContext::new(&config, &diagnostics);
        let mut native = PvrCodec.create_native(LibraryVersion::san_andreas());
        assert!(!PvrCodec.set_pixel_data(native.as_mut(), pixels, &ctx).unwrap());
        downcast_native::<NativeTexturePVR>(native.as_ref(), CODEC_NAME).unwrap().clone()
    }

    #[test]
    fn test_internal_format_selection() {
        assert_eq!(PvrInternalFormat::for_pixels(true, 128, 128), PvrInternalFormat::Rgba2bpp);
        assert_eq!(PvrInternalFormat::for_pixels(true, 64, 64), PvrInternalFormat::Rgba4bpp);
        assert_eq!(PvrInternalFormat::for_pixels(false, 100, 100), PvrInternalFormat::Rgb2bpp);
        assert_eq!(PvrInternalFormat::for_pixels(false, 64, 64), PvrInternalFormat::Rgb4bpp);
        assert_eq!(PvrInternalFormat::from_u32(0x8C03), Some(PvrInternalFormat::Rgba2bpp));
        assert_eq!(PvrInternalFormat::from_u32(0x8C04), None);
    }

    #[test]
    fn test_small_levels_are_block_aligned() {
        let native = encoded(solid(16, 5, [10, 200, 30, 255]));
        assert_eq!(native.internal_format, PvrInternalFormat::Rgb4bpp);
        assert_eq!(native.mipmaps.len(), 5);
        let last = &native.mipmaps[4];
        assert_eq!((last.width, last.height), (8, 8));
        assert_eq!((last.layer_width, last.layer_height), (1, 1));
        assert_eq!(last.texels.len(), 32);
    }

    #[test]
    fn test_decoded_pixels_keep_layer_size() {
        let native = encoded(solid(16, 2, [200, 100, 50, 255]));
        let config = EngineConfig::default();
        let diagnostics = Diagnostics::default();
        let ctx = CodecContext::new(&config, &diagnostics);
        let pixels = PvrCodec.get_pixel_data(&native, &ctx).unwrap();

        assert_eq!(pixels.raster_format, RasterFormat::R888);
        assert_eq!(pixels.depth, 32);
        assert_eq!(pixels.color_order, ColorOrdering::Rgba);
        assert!(pixels.is_newly_allocated);
        assert!(!pixels.has_alpha);
        assert_eq!(pixels.mipmaps[1].texels.len(), 8 * 8 * 4);
        let texel = pixels.texel(0, 3, 3).unwrap();
        assert!((texel.r as i32 - 200).abs() <= 16);
        assert!((texel.g as i32 - 100).abs() <= 16);
    }

    #[test]
    fn test_rejects_non_square_pixels() {
        let config = EngineConfig::default();
        let diagnostics = Diagnostics::default();
        let ctx = CodecContext::new(&config, &diagnostics);
        let mut pixels = PixelData::new(RasterFormat::R8888, 32, ColorOrdering::Rgba);
        pixels.push_mipmap(MipmapLayer::new(16, 8, vec![0; 16 * 8 * 4]));
        let mut native = PvrCodec.create_native(LibraryVersion::san_andreas());
        assert!(PvrCodec.set_pixel_data(native.as_mut(), pixels, &ctx).is_err());
    }

    #[test]
    fn test_serialize_round_trip() {
        let mut native = encoded(solid(32, 3, [0, 0, 255, 128]));
        native.unk8 = 7;
        assert!(native.has_alpha);
        assert_eq!(native.internal_format, PvrInternalFormat::Rgba4bpp);

        let config = EngineConfig::default();
        let diagnostics = Diagnostics::default();
        let ctx = CodecContext::new(&config, &diagnostics);
        let properties = TextureProperties {
            name: "water".to_string(),
            mask_name: String::new(),
            format_info: TexFormatInfo::from_u32(0x1106),
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let sink: &mut dyn WriteSeek = &mut cursor;
            let mut writer = ChunkWriter::new(sink, native.version);
            writer
                .with_block(CHUNK_TEXTURENATIVE, |w| PvrCodec.serialize(&native, &properties, w, &ctx))
                .unwrap();
        }
        let bytes = cursor.into_inner();
        // chunk headers, meta, size words, 32x32 + 16x16 + 8x8 at 4bpp
        assert_eq!(bytes.len(), 12 + 12 + PvrMetaHeader::SIZE + 3 * 4 + 512 + 128 + 32);

        let mut cursor = Cursor::new(bytes);
        let source: &mut dyn ReadSeek = &mut cursor;
        let mut reader = ChunkReader::new(source, BlockLengthMode::Trust).unwrap();
        let (_, (read, read_properties)) = reader
            .expect_block(CHUNK_TEXTURENATIVE, |r, header| {
                assert_eq!(PvrCodec.is_compatible_block(r).unwrap(), CompatibilityResult::Absolute);
                PvrCodec.deserialize(r, header.version, &ctx)
            })
            .unwrap();
        let read = downcast_native::<NativeTexturePVR>(read.as_ref(), CODEC_NAME).unwrap();
        assert_eq!(read, &native);
        assert_eq!(read_properties, properties);
        assert!(diagnostics.warnings().is_empty());
        assert_eq!(PvrCodec.format_string(read), "PVR RGBA 4bit");
    }

    #[test]
    fn test_add_mipmap_layer_encodes() {
        let mut native: Box<dyn NativeTexture> = Box::new(encoded(solid(16, 1, [255, 255, 255, 255])));
        let config = EngineConfig::default();
        let diagnostics = Diagnostics::default();
        let ctx = CodecContext::new(&config, &diagnostics);

        let raw = PvrCodec.get_mipmap_layer(native.as_ref(), 0).unwrap();
        assert_eq!(raw.layer.layer_width, 16);
        assert!(PvrCodec.add_mipmap_layer(native.as_mut(), raw.clone(), &ctx).is_err());

        let mut half = raw;
        half.layer = MipmapLayer::new(8, 8, [255u8, 255, 255, 255].repeat(64));
        assert!(!PvrCodec.add_mipmap_layer(native.as_mut(), half, &ctx).unwrap());
        assert_eq!(PvrCodec.mipmap_count(native.as_ref()), 2);

        PvrCodec.clear_mipmaps(native.as_mut()).unwrap();
        assert_eq!(PvrCodec.mipmap_count(native.as_ref()), 1);
        PvrCodec.unset_pixel_data(native.as_mut()).unwrap();
        assert_eq!(PvrCodec.size(native.as_ref()), (0, 0));
    }
}
