//! PlayStation 2 native texture
//!
//! Texels are stored the way the Graphics Synthesizer receives them: every
//! mipmap and the CLUT is a GIF packet, optionally prefixed by the transfer
//! registers, and palette textures are packed into 32-bit transfers. The
//! meta header keeps TEX0/TEX1/MIPTBP1/MIPTBP2 as they were set up for the
//! texture; on load they are recomputed and compared.
//!
//! ```text
//! Struct  FOURCC "PS2\0" | texFormatInfo
//! String  name
//! String  mask name
//! Struct
//!   Struct  meta header (64 bytes)
//!   Struct  mipmap GIF packets | CLUT GIF packet
//! ```

mod allocation;
mod encoding;
mod gif;
mod memory;
mod registers;

pub use allocation::{
    ClutAllocation, ClutSource, GS_MEMORY_BLOCKS, GsParams, MAX_PS2_MIPMAPS, MipmapAllocation, TextureAllocation,
    allocate_texture_memory, calculate_gpu_data_size, generate_gpu_data,
};
pub use encoding::{FormatEncoding, MemoryLayout, is_pack_operation};
pub use gif::{GifReadResult, GsMipmap, GsRegisterEntry, GsTexture, TransferCheck, TransmissionOffset};
pub use memory::{LayoutGeometry, clut_permute, packed_dimensions, resize_rows, swizzle, unswizzle};
pub use registers::{GifTag, GsRegisters, MipTbp, RawGifTag, Tex0, Tex1, TrxDir, TrxPos, TrxReg, gs_register};

use binrw::{BinRead, BinWrite};
use rw_txd_core::{CHUNK_HEADER_SIZE, CHUNK_STRUCT, LibraryVersion, driver, platform};

use crate::chunk::{BlockReader, BlockWriter, FixedHeader};
use crate::codec::{
    CodecCapabilities, CodecContext, CompatibilityResult, NativeTexture, NativeTextureCodec, TextureProperties,
    downcast_native, downcast_native_mut,
};
use crate::error::{BinaryError, Result};
use crate::pixel::{
    ColorOrdering, CompressionType, MipmapLayer, PaletteType, PixelData, RASTER_TYPE_BITMAP, RasterFormat,
    RasterLayout, RawMipmapLayer, SizeRules, TexFormatInfo, calculate_has_alpha, convert_mipmap_layer,
    convert_pixel_data, decompress_pixel_data, default_raster_format_string, generate_raster_format_flags,
    mipmap_dimensions, palette_entry_depth, read_raster_format_flags,
};

const CODEC_NAME: &str = "PlayStation2";

/// Raster format bit: texels are packed into the hardware transfer encoding
const RASTER_HAS_SWIZZLE: u32 = 0x10000;
/// Raster format bit: GIF packets carry their register headers
const RASTER_REQUIRES_HEADERS: u32 = 0x20000;

pub const DEFAULT_SKY_MIPMAP_VALUE: u32 = 4032;

/// Row alignment of pixel data handed out by the codec
const PS2_ROW_ALIGNMENT: u32 = 4;

/// PS2 meta header (64 bytes, little-endian)
#[derive(Debug, Clone, PartialEq, Eq, Default, BinRead, BinWrite)]
#[brw(little)]
pub struct Ps2MetaHeader {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub raster_format: u32,
    pub tex0: u64,
    pub tex1: u64,
    pub miptbp1: u64,
    pub miptbp2: u64,
    /// Mipmap packets including their headers
    pub data_size: u32,
    pub palette_data_size: u32,
    pub combined_gpu_data_size: u32,
    pub sky_mipmap_value: u32,
}

impl FixedHeader for Ps2MetaHeader {
    const SIZE: usize = 64;
}

impl Ps2MetaHeader {
    fn registers(&self) -> GsRegisters {
        GsRegisters {
            tex0: Tex0::from_u64(self.tex0),
            tex1: Tex1::from_u64(self.tex1),
            miptbp1: MipTbp::from_u64(self.miptbp1),
            miptbp2: MipTbp::from_u64(self.miptbp2),
        }
    }
}

/// 8-bit alpha to the GS range 0..=128
pub fn pc_alpha_to_ps2(alpha: u8) -> u8 {
    ((alpha as f64 / 255.0).clamp(0.0, 1.0) * 128.0 + 0.5).floor() as u8
}

/// GS alpha (0..=128) to 8 bits
pub fn ps2_alpha_to_pc(alpha: u8) -> u8 {
    ((alpha as f64 / 128.0).min(1.0) * 255.0 + 0.495).floor() as u8
}

fn remap_alpha(rgba: &mut [u8], convert: fn(u8) -> u8) {
    for texel in rgba.chunks_exact_mut(4) {
        texel[3] = convert(texel[3]);
    }
}

/// Dimensions of the CLUT texture of a palette type
pub fn palette_dimensions(palette_type: PaletteType, version: LibraryVersion) -> (u32, u32) {
    match palette_type {
        PaletteType::Pal4 | PaletteType::Pal4Lsb if version.lib_minor <= 1 => (8, 2),
        PaletteType::Pal4 | PaletteType::Pal4Lsb => (8, 3),
        PaletteType::Pal8 => (16, 16),
        PaletteType::None => (0, 0),
    }
}

/// Registers and GPU size read from a file, kept until the pixels change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StoredGpuData {
    registers: GsRegisters,
    gpu_data_size: u32,
}

/// PlayStation 2 texture state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeTexturePS2 {
    pub version: LibraryVersion,
    pub mipmaps: Vec<GsMipmap>,
    pub raster_format: RasterFormat,
    pub depth: u32,
    pub palette_type: PaletteType,
    pub palette_texture: GsTexture,
    pub recommended_buffer_base_pointer: u32,
    /// Encoding the mipmaps are transferred with
    pub swizzle_encoding: FormatEncoding,
    pub palette_encoding: FormatEncoding,
    pub requires_headers: bool,
    pub has_swizzle: bool,
    pub auto_mipmaps: bool,
    pub has_alpha: bool,
    pub sky_mipmap_value: u32,
    pub raster_type: u8,
    pub color_order: ColorOrdering,
    pub gs_params: GsParams,
    stored_gpu: Option<StoredGpuData>,
}

crate::impl_native_texture!(NativeTexturePS2);

impl NativeTexturePS2 {
    pub fn new(version: LibraryVersion) -> Self {
        Self {
            version,
            mipmaps: Vec::new(),
            raster_format: RasterFormat::Default,
            depth: 0,
            palette_type: PaletteType::None,
            palette_texture: GsTexture::default(),
            recommended_buffer_base_pointer: 0,
            swizzle_encoding: FormatEncoding::Unknown,
            palette_encoding: FormatEncoding::Unknown,
            requires_headers: true,
            has_swizzle: false,
            auto_mipmaps: false,
            has_alpha: true,
            sky_mipmap_value: DEFAULT_SKY_MIPMAP_VALUE,
            raster_type: RASTER_TYPE_BITMAP,
            color_order: ColorOrdering::Rgba,
            gs_params: GsParams {
                max_mip_level: MAX_PS2_MIPMAPS as u32,
                ..Default::default()
            },
            stored_gpu: None,
        }
    }

    /// Encoding the texels decode to
    pub fn decode_encoding(&self) -> FormatEncoding {
        FormatEncoding::from_raster_format(self.raster_format, self.palette_type)
    }

    pub fn base_size(&self) -> (u32, u32) {
        self.mipmaps.first().map(|m| (m.width, m.height)).unwrap_or((0, 0))
    }

    fn clut_source(&self) -> Option<ClutSource> {
        self.palette_type.is_palette().then_some(ClutSource {
            encoding: self.palette_encoding,
            width: self.palette_texture.swizzle_width,
            height: self.palette_texture.swizzle_height,
        })
    }

    /// GS memory placement of the current mipmaps and CLUT
    pub fn allocate(&self) -> Result<TextureAllocation> {
        let levels: Vec<(u32, u32)> = self.mipmaps.iter().map(|m| (m.width, m.height)).collect();
        allocate_texture_memory(
            self.recommended_buffer_base_pointer,
            self.decode_encoding(),
            self.swizzle_encoding,
            &levels,
            self.clut_source(),
        )
    }

    fn raster_format_word(&self) -> u32 {
        let mut word = generate_raster_format_flags(
            self.raster_format,
            self.palette_type,
            self.mipmaps.len() > 1,
            self.auto_mipmaps,
        ) | self.raster_type as u32;
        if self.has_swizzle {
            word |= RASTER_HAS_SWIZZLE;
        }
        if self.requires_headers {
            word |= RASTER_REQUIRES_HEADERS;
        }
        word
    }

    /// Take over the meta header fields
    fn apply_meta(&mut self, meta: &Ps2MetaHeader, properties: &TextureProperties, block_version: LibraryVersion) -> Result<()> {
        let info = read_raster_format_flags(meta.raster_format);
        let registers = meta.registers();

        self.raster_format = info.format;
        self.palette_type = info.palette_type;
        self.auto_mipmaps = info.auto_mipmaps;
        self.raster_type = (meta.raster_format & 0xFF) as u8;
        self.has_swizzle = meta.raster_format & RASTER_HAS_SWIZZLE != 0;
        self.requires_headers = meta.raster_format & RASTER_REQUIRES_HEADERS != 0;
        self.depth = meta.depth;
        self.sky_mipmap_value = meta.sky_mipmap_value;
        self.color_order = ColorOrdering::Rgba;
        self.gs_params = GsParams::from_registers(&registers);
        if block_version.lib_minor <= 3 {
            self.recommended_buffer_base_pointer = registers.tex0.texture_base_pointer;
        }
        self.has_alpha = !properties.mask_name.is_empty()
            || meta.depth == 16
            || registers.tex0.texture_color_component != 0;

        let expected_depth = match self.palette_type {
            PaletteType::Pal4 | PaletteType::Pal4Lsb => 4,
            PaletteType::Pal8 => 8,
            PaletteType::None => self.raster_format.natural_depth(),
        };
        if expected_depth != meta.depth {
            return Err(BinaryError::codec(
                CODEC_NAME,
                format!("texture {} has an invalid depth", properties.name),
            ));
        }

        // The swizzle bit is kept as stored, it does not decide the texel layout
        self.swizzle_encoding = FormatEncoding::hardware_required(self.raster_format, self.palette_type, block_version);
        self.stored_gpu = Some(StoredGpuData {
            registers,
            gpu_data_size: meta.combined_gpu_data_size,
        });
        Ok(())
    }

    /// Read the mipmap and CLUT packets and check them against the registers
    fn read_gs_packets(
        &mut self,
        reader: &mut BlockReader<'_>,
        meta: &Ps2MetaHeader,
        name: &str,
        block_version: LibraryVersion,
        ctx: &CodecContext<'_>,
    ) -> Result<()> {
        let decode = self.decode_encoding();
        let swizzle_encoding = self.swizzle_encoding;
        let has_headers = self.requires_headers;
        let info = read_raster_format_flags(meta.raster_format);

        let start = reader.position()?;
        let end = start + meta.data_size as u64;
        let mut transfer_offsets = Vec::new();
        let (mut width, mut height) = (meta.width, meta.height);

        for level in 0..MAX_PS2_MIPMAPS {
            if reader.position()? >= end {
                break;
            }
            if level > 0 {
                if !info.has_mipmaps || (width == 1 && height == 1) {
                    break;
                }
                width = (width / 2).max(1);
                height = (height / 2).max(1);
            }

            let (swizzle_width, swizzle_height) = packed_dimensions(decode, swizzle_encoding, width, height)?;
            let mut texture = GsTexture::new(swizzle_width, swizzle_height);
            let data_size = texture.data_size(swizzle_encoding);
            let result = texture.read_gif_packet(reader, data_size, has_headers)?;

            if result.corrupted_headers {
                ctx.warn(format!("texture {} has corrupted image GIF packets", name));
            } else {
                let check = texture.verify_transfer(has_headers, swizzle_encoding, decode);
                if !check.consistent {
                    ctx.diagnostics
                        .push_leveled_warning(2, format!("texture {} has invalid image transfer registers", name));
                }
                transfer_offsets.push(check.offset);
            }

            self.mipmaps.push(GsMipmap { width, height, texture });
        }

        if self.mipmaps.is_empty() {
            return Err(BinaryError::codec(CODEC_NAME, format!("texture {} is empty", name)));
        }

        let position = reader.position()?;
        if position < end {
            ctx.warn(format!("texture {} has image meta data", name));
            reader.seek_to(end)?;
        }

        let mut clut_offset = None;
        if self.palette_type.is_palette() {
            let encoding = FormatEncoding::from_raster_format(self.raster_format, PaletteType::None);
            if !matches!(encoding, FormatEncoding::Tex32 | FormatEncoding::Tex16) {
                return Err(BinaryError::codec(
                    CODEC_NAME,
                    format!("texture {} has an invalid palette raster format", name),
                ));
            }
            self.palette_encoding = encoding;

            let (width, height) = palette_dimensions(self.palette_type, block_version);
            let mut texture = GsTexture::new(width, height);
            let data_size = texture.data_size(encoding);
            let result = texture.read_gif_packet(reader, data_size, has_headers)?;

            if result.corrupted_headers {
                ctx.warn(format!("texture {} has corrupted palette GIF packets", name));
            } else {
                let check = texture.verify_transfer(has_headers, encoding, encoding);
                if !check.consistent {
                    ctx.diagnostics
                        .push_leveled_warning(2, format!("texture {} has invalid palette transfer registers", name));
                }
                clut_offset = Some(check.offset);
            }

            let remaining = meta.palette_data_size.saturating_sub(result.bytes_read);
            if remaining > 0 {
                ctx.warn(format!("texture {} has palette meta data", name));
                reader.skip(remaining as u64)?;
            }
            self.palette_texture = texture;
        }

        self.verify_gpu_data(meta, name, &transfer_offsets, clut_offset, ctx)
    }

    fn verify_gpu_data(
        &self,
        meta: &Ps2MetaHeader,
        name: &str,
        transfer_offsets: &[TransmissionOffset],
        clut_offset: Option<TransmissionOffset>,
        ctx: &CodecContext<'_>,
    ) -> Result<()> {
        let diagnostics = ctx.diagnostics;
        let allocation = self.allocate().map_err(|err| {
            BinaryError::codec(CODEC_NAME, format!("failed to allocate texture memory for {}: {}", name, err))
        })?;

        let gpu_size = calculate_gpu_data_size(&allocation);
        if meta.combined_gpu_data_size > gpu_size {
            diagnostics.push_leveled_warning(1, format!("too small GPU data size for texture {}", name));
        } else if meta.combined_gpu_data_size != gpu_size {
            diagnostics.push_leveled_warning(1, format!("invalid GPU data size for texture {}", name));
        }

        let (width, height) = self.base_size();
        let generated = generate_gpu_data(&allocation, &self.gs_params, width, height)
            .map_err(|_| BinaryError::codec(CODEC_NAME, format!("texture {} has an invalid texture format", name)))?;
        let stored = meta.registers();

        if generated.tex0 != stored.tex0 {
            diagnostics.push_leveled_warning(3, format!("texture {} has invalid TEX0 register", name));
        }
        if generated.tex1 != stored.tex1 {
            diagnostics.push_leveled_warning(2, format!("texture {} has invalid TEX1 register", name));
        }
        if generated.miptbp1 != stored.miptbp1 {
            diagnostics.push_leveled_warning(1, format!("texture {} has invalid MIPTBP1 register", name));
        }
        if generated.miptbp2 != stored.miptbp2 {
            diagnostics.push_leveled_warning(1, format!("texture {} has invalid MIPTBP2 register", name));
        }

        if self.requires_headers {
            let offsets_match = transfer_offsets
                .iter()
                .zip(&allocation.mipmaps)
                .all(|(stored, placed)| *stored == placed.offset);
            if !offsets_match {
                ctx.warn(format!("texture {} has invalid mipmap transmission offsets", name));
            }
            if let (Some(stored), Some(placed)) = (clut_offset, allocation.clut) {
                if stored != placed.offset {
                    ctx.warn(format!("texture {} has invalid CLUT transmission offset", name));
                }
            }
        }
        Ok(())
    }

    /// Mipmap packets with transfer registers filled in where missing
    fn packets_for_writing(&self, allocation: &TextureAllocation) -> Vec<GsTexture> {
        let decode = self.decode_encoding();
        self.mipmaps
            .iter()
            .zip(&allocation.mipmaps)
            .map(|(mip, placed)| {
                let mut texture = mip.texture.clone();
                if self.requires_headers && texture.registers.is_empty() {
                    texture.set_transfer_registers(placed.offset, self.swizzle_encoding, decode);
                }
                texture
            })
            .collect()
    }

    fn clut_for_writing(&self, allocation: &TextureAllocation) -> Option<GsTexture> {
        if !self.palette_type.is_palette() {
            return None;
        }
        let mut texture = self.palette_texture.clone();
        if self.requires_headers && texture.registers.is_empty() {
            let offset = allocation.clut.map(|c| c.offset).unwrap_or_default();
            texture.set_transfer_registers(offset, self.palette_encoding, self.palette_encoding);
        }
        Some(texture)
    }

    /// Linear palette in the codec's color order
    fn decoded_palette(&self) -> (Vec<u8>, u32) {
        if !self.palette_type.is_palette() {
            return (Vec::new(), 0);
        }
        let count = self.palette_type.item_count();
        let entry = (palette_entry_depth(self.raster_format) / 8) as usize;
        let mut palette = if self.palette_type == PaletteType::Pal8 {
            clut_permute(&self.palette_texture.texels, entry)
        } else {
            self.palette_texture.texels.clone()
        };
        palette.resize(count as usize * entry, 0);
        if self.raster_format == RasterFormat::R8888 {
            remap_alpha(&mut palette, ps2_alpha_to_pc);
        }
        (palette, count)
    }

    /// Linear texels of a level at row alignment 4
    fn decoded_level(&self, index: usize) -> Result<MipmapLayer> {
        let mip = crate::codec::layer_at(&self.mipmaps, index, CODEC_NAME)?;
        let decode = self.decode_encoding();
        let texture = &mip.texture;

        let mut texels = if self.swizzle_encoding != decode {
            unswizzle(
                self.swizzle_encoding,
                decode,
                mip.width,
                mip.height,
                texture.swizzle_width,
                texture.swizzle_height,
                &texture.texels,
                PS2_ROW_ALIGNMENT,
            )?
        } else {
            resize_rows(
                &texture.texels,
                texture.swizzle_width,
                texture.swizzle_height,
                self.depth,
                1,
                mip.width,
                mip.height,
                PS2_ROW_ALIGNMENT,
            )
        };
        if self.raster_format == RasterFormat::R8888 && !self.palette_type.is_palette() {
            remap_alpha(&mut texels, ps2_alpha_to_pc);
        }
        Ok(MipmapLayer::new(mip.width, mip.height, texels))
    }

    fn pixel_layout(&self) -> RasterLayout {
        RasterLayout::new(self.raster_format, self.depth, self.color_order, PS2_ROW_ALIGNMENT)
            .with_palette(self.palette_type)
    }

    /// Encode one linear level (row alignment 1) for the GS
    fn encode_level(&self, width: u32, height: u32, mut texels: Vec<u8>) -> Result<GsMipmap> {
        let decode = self.decode_encoding();
        if self.raster_format == RasterFormat::R8888 && !self.palette_type.is_palette() {
            remap_alpha(&mut texels, pc_alpha_to_ps2);
        }
        let texture = if self.swizzle_encoding != decode {
            let (swizzle_width, swizzle_height, data) =
                swizzle(decode, self.swizzle_encoding, width, height, &texels, 1)?;
            GsTexture {
                swizzle_width,
                swizzle_height,
                texels: data,
                registers: Vec::new(),
            }
        } else {
            GsTexture {
                swizzle_width: width,
                swizzle_height: height,
                texels,
                registers: Vec::new(),
            }
        };
        Ok(GsMipmap { width, height, texture })
    }

    /// Canonical pixels of the whole texture
    pub fn pixel_data(&self) -> Result<PixelData> {
        let (palette_data, palette_size) = self.decoded_palette();
        let mut pixels = PixelData {
            raster_format: self.raster_format,
            depth: self.depth,
            row_alignment: PS2_ROW_ALIGNMENT,
            color_order: self.color_order,
            palette_type: self.palette_type,
            palette_data,
            palette_size,
            compression: CompressionType::None,
            mipmaps: Vec::with_capacity(self.mipmaps.len()),
            has_alpha: self.has_alpha,
            auto_mipmaps: self.auto_mipmaps,
            cube_texture: false,
            raster_type: self.raster_type,
            is_newly_allocated: true,
        };
        for index in 0..self.mipmaps.len() {
            pixels.mipmaps.push(self.decoded_level(index)?);
        }
        pixels.has_alpha = calculate_has_alpha(&pixels)?;
        Ok(pixels)
    }

    /// Replace the texture contents with `pixels`, encoded for `version`
    pub fn encode_pixels(&mut self, pixels: &PixelData, version: LibraryVersion) -> Result<()> {
        if pixels.mipmaps.is_empty() {
            return Err(BinaryError::codec(CODEC_NAME, "pixel data has no mipmap levels"));
        }

        let raster_format = match pixels.raster_format {
            RasterFormat::R1555 => RasterFormat::R1555,
            _ => RasterFormat::R8888,
        };
        let (palette_type, depth) = match pixels.palette_type {
            PaletteType::Pal4 | PaletteType::Pal4Lsb => (PaletteType::Pal4, 4),
            PaletteType::Pal8 => (PaletteType::Pal8, 8),
            PaletteType::None => (PaletteType::None, raster_format.natural_depth()),
        };
        let target = RasterLayout::new(raster_format, depth, ColorOrdering::Rgba, 1).with_palette(palette_type);

        let mut capped = pixels.clone_metadata();
        capped.palette_data = pixels.palette_data.clone();
        capped.mipmaps = pixels.mipmaps.iter().take(MAX_PS2_MIPMAPS).cloned().collect();
        if capped.is_compressed() {
            capped = decompress_pixel_data(&capped)?;
        }
        let converted = convert_pixel_data(&capped, &target)?;

        let mut next = NativeTexturePS2 {
            version,
            raster_format,
            depth,
            palette_type,
            color_order: ColorOrdering::Rgba,
            auto_mipmaps: pixels.auto_mipmaps && converted.mipmaps.len() == 1,
            raster_type: pixels.raster_type,
            has_alpha: converted.has_alpha,
            requires_headers: self.requires_headers,
            sky_mipmap_value: self.sky_mipmap_value,
            recommended_buffer_base_pointer: self.recommended_buffer_base_pointer,
            ..NativeTexturePS2::new(version)
        };
        let decode = next.decode_encoding();
        next.swizzle_encoding = FormatEncoding::hardware_required(raster_format, palette_type, version);
        next.has_swizzle = next.swizzle_encoding != decode;

        for layer in converted.mipmaps {
            let mip = next.encode_level(layer.layer_width, layer.layer_height, layer.texels)?;
            next.mipmaps.push(mip);
        }

        if palette_type.is_palette() {
            let (width, height) = palette_dimensions(palette_type, version);
            let entry = (palette_entry_depth(raster_format) / 8) as usize;
            let mut palette = converted.palette_data;
            if raster_format == RasterFormat::R8888 {
                remap_alpha(&mut palette, pc_alpha_to_ps2);
            }
            palette.resize((width * height) as usize * entry, 0);
            if palette_type == PaletteType::Pal8 {
                palette = clut_permute(&palette, entry);
            }
            next.palette_encoding = FormatEncoding::from_raster_format(raster_format, PaletteType::None);
            next.palette_texture = GsTexture {
                swizzle_width: width,
                swizzle_height: height,
                texels: palette,
                registers: Vec::new(),
            };
        }

        next.gs_params = GsParams::optimal(next.mipmaps.len(), next.has_alpha);
        next.allocate()?;

        *self = next;
        Ok(())
    }

    /// Re-encode for a library version with different GS conventions
    fn restructure(&mut self, version: LibraryVersion) -> Result<()> {
        let layout_changes = FormatEncoding::hardware_required(self.raster_format, self.palette_type, version)
            != self.swizzle_encoding
            || palette_dimensions(self.palette_type, version)
                != (self.palette_texture.swizzle_width, self.palette_texture.swizzle_height);
        if self.mipmaps.is_empty() || !layout_changes {
            self.version = version;
            return Ok(());
        }
        let pixels = self.pixel_data()?;
        self.encode_pixels(&pixels, version)
    }
}

/// PlayStation 2 codec
#[derive(Debug, Clone, Copy, Default)]
pub struct Ps2Codec;

impl Ps2Codec {
    fn native<'a>(&self, native: &'a dyn NativeTexture) -> Result<&'a NativeTexturePS2> {
        downcast_native(native, CODEC_NAME)
    }

    fn native_mut<'a>(&self, native: &'a mut dyn NativeTexture) -> Result<&'a mut NativeTexturePS2> {
        downcast_native_mut(native, CODEC_NAME)
    }
}

fn has_struct_block(reader: &mut BlockReader<'_>) -> Result<bool> {
    if reader.remaining()? < CHUNK_HEADER_SIZE {
        return Ok(false);
    }
    Ok(reader.peek_header()?.id == CHUNK_STRUCT)
}

impl NativeTextureCodec for Ps2Codec {
    fn name(&self) -> &'static str {
        CODEC_NAME
    }

    fn driver_id(&self) -> u16 {
        driver::PS2
    }

    fn capabilities(&self) -> CodecCapabilities {
        CodecCapabilities {
            compressions: Vec::new(),
            palette_types: vec![PaletteType::Pal4, PaletteType::Pal8],
            supports_cube_textures: false,
            row_alignment: PS2_ROW_ALIGNMENT,
            max_mipmaps: Some(MAX_PS2_MIPMAPS),
            is_compressed_format: false,
        }
    }

    fn create_native(&self, version: LibraryVersion) -> Box<dyn NativeTexture> {
        Box::new(NativeTexturePS2::new(version))
    }

    fn is_compatible_block(&self, reader: &mut BlockReader<'_>) -> Result<CompatibilityResult> {
        let (_, platform_id) = reader.with_block(|r, header| {
            if header.id != CHUNK_STRUCT || header.length < 4 {
                return Ok(None);
            }
            Ok(Some(r.read_u32()?))
        })?;
        Ok(match platform_id {
            Some(platform::PS2_FOURCC) => CompatibilityResult::Absolute,
            _ => CompatibilityResult::None,
        })
    }

    fn deserialize(
        &self,
        reader: &mut BlockReader<'_>,
        version: LibraryVersion,
        ctx: &CodecContext<'_>,
    ) -> Result<(Box<dyn NativeTexture>, TextureProperties)> {
        let mut native = NativeTexturePS2::new(version);

        let (_, format_info) = reader.expect_block(CHUNK_STRUCT, |r, _| {
            let platform_id = r.read_u32()?;
            if platform_id != platform::PS2_FOURCC {
                return Err(BinaryError::invalid_format(format!(
                    "platform descriptor {:#x} is not PlayStation 2",
                    platform_id
                )));
            }
            Ok(TexFormatInfo::from_u32(r.read_u32()?))
        })?;

        let mut properties = TextureProperties {
            name: reader.read_string_block()?,
            mask_name: reader.read_string_block()?,
            format_info,
        };

        if !has_struct_block(reader)? {
            ctx.warn("could not find GS native data chunk in PS2 texture native");
            return Ok((Box::new(native), properties));
        }

        reader.with_block(|r, _| {
            if !has_struct_block(r)? {
                return Err(BinaryError::codec(
                    CODEC_NAME,
                    format!("could not find meta header of texture {}", properties.name),
                ));
            }
            let (_, meta) = r.expect_block(CHUNK_STRUCT, |r, _| r.read_fixed::<Ps2MetaHeader>())?;

            if !has_struct_block(r)? {
                ctx.warn("could not find GS image packet block in PS2 texture native");
                return native.apply_meta(&meta, &properties, version);
            }

            r.expect_block(CHUNK_STRUCT, |r, packet_header| {
                native.apply_meta(&meta, &properties, packet_header.version)?;
                native.read_gs_packets(r, &meta, &properties.name, packet_header.version, ctx)
            })?;

            if properties.format_info.fix_filtering(native.mipmaps.len()) {
                tracing::debug!("texture {} uses mipmap filtering without mipmaps", properties.name);
            }
            Ok(())
        })?;

        Ok((Box::new(native), properties))
    }

    fn serialize(
        &self,
        native: &dyn NativeTexture,
        properties: &TextureProperties,
        writer: &mut BlockWriter<'_>,
        _ctx: &CodecContext<'_>,
    ) -> Result<()> {
        let native = self.native(native)?;
        if native.mipmaps.is_empty() {
            return Err(BinaryError::codec(CODEC_NAME, "texture has no mipmap levels"));
        }

        let allocation = native.allocate()?;
        let (registers, gpu_data_size) = match native.stored_gpu {
            Some(stored) => (stored.registers, stored.gpu_data_size),
            None => {
                let (width, height) = native.base_size();
                (
                    generate_gpu_data(&allocation, &native.gs_params, width, height)?,
                    calculate_gpu_data_size(&allocation),
                )
            }
        };

        let packets = native.packets_for_writing(&allocation);
        let clut = native.clut_for_writing(&allocation);
        let headers = native.requires_headers;
        let (width, height) = native.base_size();

        let meta = Ps2MetaHeader {
            width,
            height,
            depth: native.depth,
            raster_format: native.raster_format_word(),
            tex0: registers.tex0.to_u64(),
            tex1: registers.tex1.to_u64(),
            miptbp1: registers.miptbp1.to_u64(),
            miptbp2: registers.miptbp2.to_u64(),
            data_size: packets.iter().map(|p| p.stream_size(headers)).sum(),
            palette_data_size: clut.as_ref().map(|c| c.stream_size(headers)).unwrap_or(0),
            combined_gpu_data_size: gpu_data_size,
            sky_mipmap_value: native.sky_mipmap_value,
        };

        writer.with_block(CHUNK_STRUCT, |w| {
            w.write_u32(platform::PS2_FOURCC)?;
            w.write_u32(properties.format_info.to_u32())
        })?;
        writer.write_string_block(&properties.name)?;
        writer.write_string_block(&properties.mask_name)?;
        writer.with_block(CHUNK_STRUCT, |w| {
            w.with_block(CHUNK_STRUCT, |w| w.write_fixed(&meta))?;
            w.with_block(CHUNK_STRUCT, |w| {
                for packet in &packets {
                    packet.write_gif_packet(w, headers)?;
                }
                if let Some(clut) = &clut {
                    clut.write_gif_packet(w, headers)?;
                }
                Ok(())
            })
        })
    }

    fn get_pixel_data(&self, native: &dyn NativeTexture, _ctx: &CodecContext<'_>) -> Result<PixelData> {
        self.native(native)?.pixel_data()
    }

    fn set_pixel_data(
        &self,
        native: &mut dyn NativeTexture,
        pixels: PixelData,
        ctx: &CodecContext<'_>,
    ) -> Result<bool> {
        let native = self.native_mut(native)?;
        if pixels.cube_texture {
            ctx.warn("PlayStation 2 has no cube textures; faces are stored as mipmaps");
        }
        let version = native.version;
        native.encode_pixels(&pixels, version)?;
        Ok(false)
    }

    fn unset_pixel_data(&self, native: &mut dyn NativeTexture) -> Result<()> {
        let native = self.native_mut(native)?;
        let version = native.version;
        *native = NativeTexturePS2 {
            raster_format: RasterFormat::Default,
            has_alpha: false,
            gs_params: GsParams::default(),
            ..NativeTexturePS2::new(version)
        };
        Ok(())
    }

    fn mipmap_count(&self, native: &dyn NativeTexture) -> usize {
        self.native(native).map(|n| n.mipmaps.len()).unwrap_or(0)
    }

    fn get_mipmap_layer(&self, native: &dyn NativeTexture, index: usize) -> Result<RawMipmapLayer> {
        let native = self.native(native)?;
        let layer = native.decoded_level(index)?;
        let (palette_data, palette_size) = native.decoded_palette();
        Ok(RawMipmapLayer {
            layer,
            raster_format: native.raster_format,
            depth: native.depth,
            row_alignment: PS2_ROW_ALIGNMENT,
            color_order: native.color_order,
            palette_type: native.palette_type,
            palette_data,
            palette_size,
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
        if native.mipmaps.len() >= MAX_PS2_MIPMAPS {
            return Err(BinaryError::codec(
                CODEC_NAME,
                "cannot add mipmap in PS2 texture because too many",
            ));
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
        if layer.compression.is_compressed() {
            return Err(BinaryError::unsupported("PlayStation 2 textures cannot hold compressed mipmaps"));
        }
        if native.palette_type.is_palette() {
            let (palette, _) = native.decoded_palette();
            if !layer.palette_type.is_palette() || layer.palette_data != palette {
                return Err(BinaryError::unsupported("mipmap palette differs from the texture palette"));
            }
        }

        let source = RasterLayout::new(layer.raster_format, layer.depth, layer.color_order, layer.row_alignment)
            .with_palette(layer.palette_type);
        let mut target = native.pixel_layout();
        target.row_alignment = 1;
        let texels = convert_mipmap_layer(
            &layer.layer.texels,
            layer.layer.width,
            layer.layer.height,
            &source,
            &layer.palette_data,
            layer.palette_size,
            &target,
        )?;

        let mip = native.encode_level(expected.0, expected.1, texels)?;
        native.mipmaps.push(mip);
        native.auto_mipmaps = false;
        native.stored_gpu = None;
        native.gs_params = GsParams::optimal(native.mipmaps.len(), native.has_alpha);
        Ok(false)
    }

    fn clear_mipmaps(&self, native: &mut dyn NativeTexture) -> Result<()> {
        let native = self.native_mut(native)?;
        if native.mipmaps.len() > 1 {
            native.mipmaps.truncate(1);
            native.stored_gpu = None;
            native.gs_params = GsParams::optimal(1, native.has_alpha);
        }
        Ok(())
    }

    fn size(&self, native: &dyn NativeTexture) -> (u32, u32) {
        self.native(native).map(|n| n.base_size()).unwrap_or((0, 0))
    }

    fn size_rules(&self, _native: &dyn NativeTexture) -> SizeRules {
        SizeRules {
            power_of_two: true,
            squared: false,
            multiple_of: None,
            maximum: None,
        }
    }

    fn format_string(&self, native: &dyn NativeTexture) -> String {
        self.native(native)
            .map(|n| format!("PS2 {}", default_raster_format_string(n.raster_format, n.palette_type, n.color_order)))
            .unwrap_or_else(|_| String::from("unknown"))
    }

    fn raster_format(&self, native: &dyn NativeTexture) -> RasterFormat {
        self.native(native).map(|n| n.raster_format).unwrap_or_default()
    }

    fn palette_type(&self, native: &dyn NativeTexture) -> PaletteType {
        self.native(native).map(|n| n.palette_type).unwrap_or_default()
    }

    fn compression(&self, _native: &dyn NativeTexture) -> CompressionType {
        CompressionType::None
    }

    fn has_alpha(&self, native: &dyn NativeTexture) -> bool {
        self.native(native).map(|n| n.has_alpha).unwrap_or(false)
    }

    fn version(&self, native: &dyn NativeTexture) -> LibraryVersion {
        self.native(native).map(|n| n.version).unwrap_or_default()
    }

    fn set_version(&self, native: &mut dyn NativeTexture, version: LibraryVersion) {
        if let Ok(native) = self.native_mut(native) {
            if let Err(err) = native.restructure(version) {
                tracing::error!("failed to re-encode PS2 texture for version {}: {}", version, err);
                native.version = version;
            }
        }
    }
}
