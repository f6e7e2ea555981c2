//! GS buffer placement and register generation
//!
//! Mipmaps are laid out from the recommended base pointer in page units.
//! Levels smaller than a page are packed together with the CLUT into a
//! shared page. The registers RenderWare stores in the meta header and
//! the TRXPOS destinations of every upload are derived from this placement.

use super::encoding::{FormatEncoding, MemoryLayout};
use super::gif::TransmissionOffset;
use super::memory::{BLOCK_SIZE, BLOCKS_PER_PAGE, LayoutGeometry};
use super::registers::{GsRegisters, MipTbp, Tex0, Tex1};
use crate::error::{BinaryError, Result};

/// Blocks of GS local memory (4 MiB)
pub const GS_MEMORY_BLOCKS: u32 = 16384;

/// Mipmaps a GS texture can address (base + MIPTBP1 + MIPTBP2)
pub const MAX_PS2_MIPMAPS: usize = 7;

/// Largest log2 texture edge TEX0 can describe
const MAX_SIZE_LOG2: u32 = 10;

/// Sampling state carried by TEX0/TEX1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GsParams {
    pub max_mip_level: u32,
    pub mtba: u32,
    pub lod_calculation_model: u32,
    pub mmag: u32,
    pub mmin: u32,
    pub lod_param_l: u32,
    pub lod_param_k: u32,
    pub unknown: u32,
    pub unknown2: u32,
    pub texture_function: u32,
    pub texture_color_component: u32,
}

impl GsParams {
    pub fn from_registers(registers: &GsRegisters) -> Self {
        let tex1 = &registers.tex1;
        Self {
            max_mip_level: tex1.maximum_mip_level,
            mtba: tex1.mtba,
            lod_calculation_model: tex1.lod_calculation_model,
            mmag: tex1.mmag,
            mmin: tex1.mmin,
            lod_param_l: tex1.lod_param_l,
            lod_param_k: tex1.lod_param_k,
            unknown: tex1.unknown,
            unknown2: tex1.unknown2,
            texture_function: registers.tex0.texture_function,
            texture_color_component: registers.tex0.texture_color_component,
        }
    }

    /// Parameters for a freshly encoded texture
    pub fn optimal(mipmap_count: usize, has_alpha: bool) -> Self {
        Self {
            max_mip_level: mipmap_count.saturating_sub(1) as u32,
            mmag: 1,
            mmin: if mipmap_count > 1 { 5 } else { 1 },
            texture_color_component: has_alpha as u32,
            ..Default::default()
        }
    }
}

/// Placement of one mipmap level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MipmapAllocation {
    pub base_pointer: u32,
    pub buffer_width: u32,
    /// Size in blocks
    pub memory_size: u32,
    pub offset: TransmissionOffset,
}

/// Placement of the CLUT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClutAllocation {
    pub base_pointer: u32,
    pub memory_size: u32,
    pub layout: MemoryLayout,
    pub offset: TransmissionOffset,
}

/// Where a texture lives in GS memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureAllocation {
    pub decode_layout: MemoryLayout,
    pub mipmaps: Vec<MipmapAllocation>,
    pub clut: Option<ClutAllocation>,
}

impl TextureAllocation {
    fn end_block(&self) -> u32 {
        let mip_end = self
            .mipmaps
            .iter()
            .map(|m| m.base_pointer + m.memory_size)
            .max()
            .unwrap_or(0);
        let clut_end = self.clut.map(|c| c.base_pointer + c.memory_size).unwrap_or(0);
        mip_end.max(clut_end)
    }

    /// Bytes of GS memory the texture occupies from its base pointer
    pub fn gpu_data_size(&self) -> u32 {
        let base = self.mipmaps.first().map(|m| m.base_pointer).unwrap_or(0);
        (self.end_block() - base) * BLOCK_SIZE
    }
}

/// Palette texture description for [`allocate_texture_memory`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClutSource {
    pub encoding: FormatEncoding,
    pub width: u32,
    pub height: u32,
}

/// Page-granular cursor that packs sub-page rectangles into a shared page
///
/// GS block numbers interleave the column and row bits, so a range of `n`
/// blocks aligned to `n` (a power of two) covers the same rectangle a
/// transfer to the page origin would, shifted by the range start.
struct PagePacker {
    base_pointer: u32,
    next_page: u32,
    shared: Option<(u32, u32)>,
}

impl PagePacker {
    fn new(base_pointer: u32) -> Self {
        Self {
            base_pointer,
            next_page: 0,
            shared: None,
        }
    }

    fn take_pages(&mut self, count: u32) -> u32 {
        let start = self.base_pointer + self.next_page * BLOCKS_PER_PAGE;
        self.next_page += count;
        start
    }

    /// Page start and page-relative block of a `memory_size` block range
    fn place(&mut self, memory_size: u32) -> (u32, u32) {
        if memory_size >= BLOCKS_PER_PAGE {
            let page = self.take_pages(memory_size.div_ceil(BLOCKS_PER_PAGE));
            return (page, 0);
        }

        let span = memory_size.max(1).next_power_of_two();
        let mask = if span == BLOCKS_PER_PAGE { u32::MAX } else { (1u32 << span) - 1 };
        if let Some((page, used)) = self.shared.as_mut() {
            let free_slot = (0..BLOCKS_PER_PAGE)
                .step_by(span as usize)
                .find(|&slot| *used & (mask << slot) == 0);
            if let Some(slot) = free_slot {
                *used |= mask << slot;
                return (*page, slot);
            }
        }
        let page = self.take_pages(1);
        self.shared = Some((page, mask));
        (page, 0)
    }
}

/// Transfer destination of page-relative `block`, in `transfer` texels
fn block_offset(transfer: &LayoutGeometry, block: u32) -> TransmissionOffset {
    let (col, row) = transfer.block_position(block);
    TransmissionOffset {
        x: col * transfer.block_width,
        y: row * transfer.block_height,
    }
}

/// Place the mipmaps (`(width, height)` per level) and CLUT of a texture
///
/// Levels spanning a page or more start on their own page. Smaller levels
/// and the CLUT share a page and are uploaded to an offset inside it,
/// expressed in texels of the `transfer` encoding.
pub fn allocate_texture_memory(
    base_pointer: u32,
    decode: FormatEncoding,
    transfer: FormatEncoding,
    levels: &[(u32, u32)],
    clut: Option<ClutSource>,
) -> Result<TextureAllocation> {
    if levels.is_empty() || levels.len() > MAX_PS2_MIPMAPS {
        return Err(BinaryError::invalid_data(format!(
            "cannot place {} mipmap levels in GS memory",
            levels.len()
        )));
    }
    let geometry = LayoutGeometry::for_encoding(decode)?;
    let transfer_geometry = match transfer {
        FormatEncoding::Unknown => geometry,
        other => LayoutGeometry::for_encoding(other)?,
    };

    let mut packer = PagePacker::new(base_pointer);
    let mut mipmaps = Vec::with_capacity(levels.len());
    for &(width, height) in levels {
        let memory_size = geometry.memory_size(width, height);
        let (page, block) = packer.place(memory_size);
        mipmaps.push(MipmapAllocation {
            base_pointer: page + block,
            buffer_width: geometry.buffer_width(width),
            memory_size,
            offset: block_offset(&transfer_geometry, block),
        });
    }

    let clut = match clut {
        Some(source) => {
            let clut_geometry = LayoutGeometry::for_encoding(source.encoding)?;
            let memory_size = clut_geometry.memory_size(source.width, source.height);
            let (page, block) = packer.place(memory_size);
            Some(ClutAllocation {
                base_pointer: page + block,
                memory_size,
                layout: clut_geometry.layout,
                offset: block_offset(&clut_geometry, block),
            })
        }
        None => None,
    };

    let allocation = TextureAllocation {
        decode_layout: geometry.layout,
        mipmaps,
        clut,
    };
    if allocation.end_block() > GS_MEMORY_BLOCKS {
        return Err(BinaryError::invalid_data(format!(
            "texture needs {} GS blocks, only {} exist",
            allocation.end_block(),
            GS_MEMORY_BLOCKS
        )));
    }
    Ok(allocation)
}

/// Bytes of GS memory needed by an allocation
pub fn calculate_gpu_data_size(allocation: &TextureAllocation) -> u32 {
    allocation.gpu_data_size()
}

fn size_log2(value: u32) -> Option<u32> {
    let log = value.max(1).next_power_of_two().trailing_zeros();
    (log <= MAX_SIZE_LOG2).then_some(log)
}

/// Registers for a texture placed by [`allocate_texture_memory`]
///
/// Fails when the base level cannot be described by TEX0.
pub fn generate_gpu_data(
    allocation: &TextureAllocation,
    params: &GsParams,
    width: u32,
    height: u32,
) -> Result<GsRegisters> {
    let (Some(tw), Some(th)) = (size_log2(width), size_log2(height)) else {
        return Err(BinaryError::invalid_data(format!(
            "{}x{} exceeds the GS texture size limit",
            width, height
        )));
    };
    let base = allocation
        .mipmaps
        .first()
        .copied()
        .ok_or_else(|| BinaryError::invalid_data("texture has no mipmap placement"))?;

    let mut tex0 = Tex0 {
        texture_base_pointer: base.base_pointer,
        texture_buffer_width: base.buffer_width,
        pixel_storage_format: allocation.decode_layout as u32,
        texture_width_log2: tw,
        texture_height_log2: th,
        texture_color_component: params.texture_color_component,
        texture_function: params.texture_function,
        ..Default::default()
    };
    if let Some(clut) = allocation.clut {
        tex0.clut_base_pointer = clut.base_pointer;
        tex0.clut_storage_format = clut.layout as u32;
        tex0.clut_load_control = 1;
    }

    let tex1 = Tex1 {
        lod_calculation_model: params.lod_calculation_model,
        unknown2: params.unknown2,
        maximum_mip_level: params.max_mip_level,
        mmag: params.mmag,
        mmin: params.mmin,
        mtba: params.mtba,
        unknown: params.unknown,
        lod_param_l: params.lod_param_l,
        lod_param_k: params.lod_param_k,
    };

    let mut miptbp = [MipTbp::default(), MipTbp::default()];
    for (level, mip) in allocation.mipmaps.iter().enumerate().skip(1) {
        let register = &mut miptbp[(level - 1) / 3];
        let slot = (level - 1) % 3;
        register.base_pointer[slot] = mip.base_pointer;
        register.buffer_width[slot] = mip.buffer_width;
    }

    Ok(GsRegisters {
        tex0,
        tex1,
        miptbp1: miptbp[0],
        miptbp2: miptbp[1],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_sized_levels_start_on_page_boundaries() {
        let levels = [(64, 64), (32, 32), (16, 16)];
        let allocation =
            allocate_texture_memory(0, FormatEncoding::Tex32, FormatEncoding::Tex32, &levels, None).unwrap();
        assert_eq!(allocation.mipmaps[0].memory_size, 64);
        assert_eq!(allocation.mipmaps[0].buffer_width, 1);
        assert_eq!(allocation.mipmaps[1].base_pointer, 64);
        assert_eq!(allocation.mipmaps[1].offset, TransmissionOffset::default());

        // 16 blocks of the shared page are taken, the next level packs beside them
        assert_eq!(allocation.mipmaps[2].base_pointer, 64 + 16);
        assert_eq!(allocation.mipmaps[2].offset, TransmissionOffset { x: 32, y: 0 });
        assert_eq!(calculate_gpu_data_size(&allocation), (64 + 16 + 4) * BLOCK_SIZE);
    }

    #[test]
    fn test_small_psmt8_levels_share_a_page() {
        let levels = [(128, 128), (64, 64), (32, 32), (16, 16), (8, 8)];
        let clut = ClutSource {
            encoding: FormatEncoding::Tex32,
            width: 16,
            height: 16,
        };
        let allocation =
            allocate_texture_memory(0, FormatEncoding::IdTex8, FormatEncoding::Tex32, &levels, Some(clut)).unwrap();

        let placed: Vec<(u32, TransmissionOffset)> =
            allocation.mipmaps.iter().map(|m| (m.base_pointer, m.offset)).collect();
        assert_eq!(
            placed,
            vec![
                (0, TransmissionOffset { x: 0, y: 0 }),
                (64, TransmissionOffset { x: 0, y: 0 }),
                (80, TransmissionOffset { x: 32, y: 0 }),
                (84, TransmissionOffset { x: 48, y: 0 }),
                (85, TransmissionOffset { x: 56, y: 0 }),
            ]
        );

        let clut = allocation.clut.unwrap();
        assert_eq!(clut.base_pointer, 88);
        assert_eq!(clut.offset, TransmissionOffset { x: 32, y: 16 });
        assert_eq!(calculate_gpu_data_size(&allocation), 92 * BLOCK_SIZE);
    }

    #[test]
    fn test_clut_follows_page_sized_level() {
        let clut = ClutSource {
            encoding: FormatEncoding::Tex32,
            width: 16,
            height: 16,
        };
        let allocation =
            allocate_texture_memory(16, FormatEncoding::IdTex8, FormatEncoding::Tex32, &[(128, 128)], Some(clut))
                .unwrap();
        let clut = allocation.clut.unwrap();
        assert_eq!(clut.base_pointer, 16 + allocation.mipmaps[0].memory_size);
        assert_eq!(clut.offset, TransmissionOffset::default());
        assert_eq!(clut.layout, MemoryLayout::Psmct32);
    }

    #[test]
    fn test_generated_registers() {
        let levels = [(256, 128), (128, 64), (64, 32), (32, 16), (16, 8)];
        let allocation =
            allocate_texture_memory(0, FormatEncoding::Tex32, FormatEncoding::Tex32, &levels, None).unwrap();
        let params = GsParams::optimal(5, true);
        let registers = generate_gpu_data(&allocation, &params, 256, 128).unwrap();

        assert_eq!(registers.tex0.texture_width_log2, 8);
        assert_eq!(registers.tex0.texture_height_log2, 7);
        assert_eq!(registers.tex0.texture_color_component, 1);
        assert_eq!(registers.tex1.maximum_mip_level, 4);
        assert_eq!(registers.miptbp1.base_pointer[0], allocation.mipmaps[1].base_pointer);
        assert_eq!(registers.miptbp2.base_pointer[0], allocation.mipmaps[4].base_pointer);
        assert_eq!(allocation.mipmaps[4].base_pointer, allocation.mipmaps[3].base_pointer + 8);
        assert_eq!(GsParams::from_registers(&registers), params);
    }

    #[test]
    fn test_oversized_textures_are_rejected() {
        let allocation =
            allocate_texture_memory(0, FormatEncoding::IdTex8, FormatEncoding::Tex32, &[(2048, 8)], None).unwrap();
        assert!(generate_gpu_data(&allocation, &GsParams::optimal(1, false), 2048, 8).is_err());
        assert!(
            allocate_texture_memory(0, FormatEncoding::Tex32, FormatEncoding::Tex32, &[(1024, 1024), (512, 512)], None)
                .is_err()
        );
    }
}
