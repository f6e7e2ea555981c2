//! GS local memory addressing and swizzling
//!
//! GS memory is organised in 8 KiB pages of 32 blocks of 256 bytes. Each
//! storage mode arranges blocks inside a page and texels inside a block
//! differently. Writing a rectangle with one mode and reading it back with
//! another is how palette textures get packed into 32-bit transfers; the
//! same emulation undoes it.

use super::encoding::{FormatEncoding, MemoryLayout};
use crate::error::{BinaryError, Result};
use crate::pixel::raster_row_size;

pub const PAGE_SIZE: u32 = 8192;
pub const BLOCK_SIZE: u32 = 256;
pub const BLOCKS_PER_PAGE: u32 = 32;

const BLOCK_TABLE_32: [u8; 32] = [
    0, 1, 4, 5, 16, 17, 20, 21, //
    2, 3, 6, 7, 18, 19, 22, 23, //
    8, 9, 12, 13, 24, 25, 28, 29, //
    10, 11, 14, 15, 26, 27, 30, 31,
];

const BLOCK_TABLE_16: [u8; 32] = [
    0, 2, 8, 10, //
    1, 3, 9, 11, //
    4, 6, 12, 14, //
    5, 7, 13, 15, //
    16, 18, 24, 26, //
    17, 19, 25, 27, //
    20, 22, 28, 30, //
    21, 23, 29, 31,
];

const BLOCK_TABLE_16S: [u8; 32] = [
    0, 2, 16, 18, //
    1, 3, 17, 19, //
    8, 10, 24, 26, //
    9, 11, 25, 27, //
    4, 6, 20, 22, //
    5, 7, 21, 23, //
    12, 14, 28, 30, //
    13, 15, 29, 31,
];

/// Page and block geometry of a storage mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutGeometry {
    pub layout: MemoryLayout,
    pub page_width: u32,
    pub page_height: u32,
    pub block_width: u32,
    pub block_height: u32,
    /// Bits per texel
    pub depth: u32,
    block_table: &'static [u8; 32],
    table_columns: u32,
}

impl LayoutGeometry {
    pub fn of(layout: MemoryLayout) -> Option<Self> {
        let (page_width, page_height, block_width, block_height, depth, block_table, table_columns) = match layout {
            MemoryLayout::Psmct32 | MemoryLayout::Psmct24 => (64, 32, 8, 8, 32, &BLOCK_TABLE_32, 8),
            MemoryLayout::Psmct16 => (64, 64, 16, 8, 16, &BLOCK_TABLE_16, 4),
            MemoryLayout::Psmct16s => (64, 64, 16, 8, 16, &BLOCK_TABLE_16S, 4),
            MemoryLayout::Psmt8 => (128, 64, 16, 16, 8, &BLOCK_TABLE_32, 8),
            MemoryLayout::Psmt4 => (128, 128, 32, 16, 4, &BLOCK_TABLE_16, 4),
            _ => return None,
        };
        Some(Self {
            layout,
            page_width,
            page_height,
            block_width,
            block_height,
            depth,
            block_table,
            table_columns,
        })
    }

    pub fn for_encoding(encoding: FormatEncoding) -> Result<Self> {
        encoding
            .memory_layout()
            .and_then(Self::of)
            .ok_or_else(|| BinaryError::unsupported(format!("no GS memory layout for {:?}", encoding)))
    }

    /// Block number of the block holding page-relative texel (x, y)
    pub fn block_number(&self, x: u32, y: u32) -> u32 {
        let col = x / self.block_width;
        let row = y / self.block_height;
        self.block_table[(row * self.table_columns + col) as usize] as u32
    }

    /// Column and row of a block inside its page
    pub fn block_position(&self, block: u32) -> (u32, u32) {
        let index = self
            .block_table
            .iter()
            .position(|&b| b as u32 == block)
            .unwrap_or(0) as u32;
        (index % self.table_columns, index / self.table_columns)
    }

    /// Texel index inside a block, in units of `depth` bits
    fn texel_in_block(&self, x: u32, y: u32) -> u32 {
        match self.layout {
            MemoryLayout::Psmt8 => {
                let column = y >> 2;
                let row = y & 3;
                let xx = if ((row >> 1) ^ column) & 1 != 0 { ((x + 4) & 7) | (x & 8) } else { x };
                column * 64 + ((xx & 7) >> 1) * 16 + (xx & 1) * 4 + ((xx >> 3) & 1) * 2 + (row & 1) * 8 + (row >> 1)
            }
            MemoryLayout::Psmt4 => {
                let column = y >> 2;
                let row = y & 3;
                let xx = if ((row >> 1) ^ column) & 1 != 0 { ((x + 4) & 7) | (x & 0x18) } else { x };
                column * 128 + ((xx & 7) >> 1) * 32 + (xx & 1) * 8 + ((xx >> 3) & 3) * 2 + (row & 1) * 16 + (row >> 1)
            }
            MemoryLayout::Psmct16 | MemoryLayout::Psmct16s => {
                (y >> 1) * 32 + (y & 1) * 4 + ((x & 7) >> 1) * 8 + (x & 1) * 2 + (x >> 3)
            }
            _ => (y >> 1) * 16 + (x >> 1) * 4 + (y & 1) * 2 + (x & 1),
        }
    }

    /// Bit address of texel (x, y) in a buffer `pages_per_row` pages wide
    pub fn bit_address(&self, x: u32, y: u32, pages_per_row: u32) -> u64 {
        let page = (y / self.page_height) * pages_per_row + x / self.page_width;
        let px = x % self.page_width;
        let py = y % self.page_height;
        let block = self.block_number(px, py);
        let texel = self.texel_in_block(px % self.block_width, py % self.block_height);
        (page as u64 * PAGE_SIZE as u64 + block as u64 * BLOCK_SIZE as u64) * 8 + texel as u64 * self.depth as u64
    }

    pub fn pages_per_row(&self, width: u32) -> u32 {
        width.div_ceil(self.page_width).max(1)
    }

    pub fn page_rows(&self, height: u32) -> u32 {
        height.div_ceil(self.page_height).max(1)
    }

    /// GS buffer width (units of 64 texels) covering `width`
    pub fn buffer_width(&self, width: u32) -> u32 {
        self.pages_per_row(width) * self.page_width / 64
    }

    /// Blocks spanned by a `width`x`height` rectangle at block 0
    pub fn memory_size(&self, width: u32, height: u32) -> u32 {
        let pages_per_row = self.pages_per_row(width);
        let mut end = 0;
        for by in 0..height.div_ceil(self.block_height) {
            for bx in 0..width.div_ceil(self.block_width) {
                let x = bx * self.block_width;
                let y = by * self.block_height;
                let page = (y / self.page_height) * pages_per_row + x / self.page_width;
                let block = self.block_number(x % self.page_width, y % self.page_height);
                end = end.max(page * BLOCKS_PER_PAGE + block + 1);
            }
        }
        end
    }
}

/// Emulated slice of GS local memory
struct GsMemory {
    bytes: Vec<u8>,
}

impl GsMemory {
    fn new(pages: u32) -> Result<Self> {
        let size = pages as usize * PAGE_SIZE as usize;
        let mut bytes = Vec::new();
        bytes.try_reserve_exact(size)?;
        bytes.resize(size, 0);
        Ok(Self { bytes })
    }

    fn write(&mut self, bit_address: u64, depth: u32, value: u32) {
        let byte = (bit_address / 8) as usize;
        match depth {
            4 => {
                if let Some(slot) = self.bytes.get_mut(byte) {
                    if bit_address % 8 == 0 {
                        *slot = (*slot & 0xF0) | (value as u8 & 0x0F);
                    } else {
                        *slot = (*slot & 0x0F) | ((value as u8 & 0x0F) << 4);
                    }
                }
            }
            _ => {
                let count = (depth / 8) as usize;
                if let Some(slot) = self.bytes.get_mut(byte..byte + count) {
                    slot.copy_from_slice(&value.to_le_bytes()[..count]);
                }
            }
        }
    }

    fn read(&self, bit_address: u64, depth: u32) -> u32 {
        let byte = (bit_address / 8) as usize;
        match depth {
            4 => self
                .bytes
                .get(byte)
                .map(|b| (if bit_address % 8 == 0 { b & 0x0F } else { b >> 4 }) as u32)
                .unwrap_or(0),
            _ => {
                let count = (depth / 8) as usize;
                let mut raw = [0u8; 4];
                if let Some(slot) = self.bytes.get(byte..byte + count) {
                    raw[..count].copy_from_slice(slot);
                }
                u32::from_le_bytes(raw)
            }
        }
    }
}

/// Read item `x` of a linear row; 4-bit rows keep the first texel in the high nibble
fn linear_item(row: &[u8], x: u32, depth: u32) -> u32 {
    match depth {
        4 => row
            .get((x / 2) as usize)
            .map(|b| (if x % 2 == 0 { b >> 4 } else { b & 0x0F }) as u32)
            .unwrap_or(0),
        _ => {
            let count = (depth / 8) as usize;
            let start = x as usize * count;
            let mut raw = [0u8; 4];
            if let Some(slot) = row.get(start..start + count) {
                raw[..count].copy_from_slice(slot);
            }
            u32::from_le_bytes(raw)
        }
    }
}

fn put_linear_item(row: &mut [u8], x: u32, depth: u32, value: u32) {
    match depth {
        4 => {
            if let Some(slot) = row.get_mut((x / 2) as usize) {
                if x % 2 == 0 {
                    *slot = (*slot & 0x0F) | ((value as u8 & 0x0F) << 4);
                } else {
                    *slot = (*slot & 0xF0) | (value as u8 & 0x0F);
                }
            }
        }
        _ => {
            let count = (depth / 8) as usize;
            let start = x as usize * count;
            if let Some(slot) = row.get_mut(start..start + count) {
                slot.copy_from_slice(&value.to_le_bytes()[..count]);
            }
        }
    }
}

/// Dimensions of a `width`x`height` raster of `raw` texels re-read as `packed`
pub fn packed_dimensions(raw: FormatEncoding, packed: FormatEncoding, width: u32, height: u32) -> Result<(u32, u32)> {
    if raw == packed {
        return Ok((width, height));
    }
    let src = LayoutGeometry::for_encoding(raw)?;
    let dst = LayoutGeometry::for_encoding(packed)?;
    let pages_per_row = src.pages_per_row(width);

    let (mut max_x, mut max_y) = (0, 0);
    for by in 0..height.div_ceil(src.block_height) {
        for bx in 0..width.div_ceil(src.block_width) {
            let x = bx * src.block_width;
            let y = by * src.block_height;
            let page = (y / src.page_height) * pages_per_row + x / src.page_width;
            let block = src.block_number(x % src.page_width, y % src.page_height);
            let (col, row) = dst.block_position(block);
            let page_x = (page % pages_per_row) * dst.page_width;
            let page_y = (page / pages_per_row) * dst.page_height;
            max_x = max_x.max(page_x + (col + 1) * dst.block_width);
            max_y = max_y.max(page_y + (row + 1) * dst.block_height);
        }
    }
    Ok((max_x, max_y))
}

/// Re-encode a linear raster of `raw` texels as a `packed` transfer
///
/// Returns the packed dimensions and texels (row alignment 1).
pub fn swizzle(
    raw: FormatEncoding,
    packed: FormatEncoding,
    width: u32,
    height: u32,
    texels: &[u8],
    row_alignment: u32,
) -> Result<(u32, u32, Vec<u8>)> {
    let src = LayoutGeometry::for_encoding(raw)?;
    let dst = LayoutGeometry::for_encoding(packed)?;
    let (packed_width, packed_height) = packed_dimensions(raw, packed, width, height)?;
    let pages_per_row = src.pages_per_row(width);
    let mut memory = GsMemory::new(pages_per_row * src.page_rows(height))?;

    let src_row = raster_row_size(width, raw.depth(), row_alignment) as usize;
    for y in 0..height {
        let row = texels.get(y as usize * src_row..(y as usize + 1) * src_row).unwrap_or(&[]);
        for x in 0..width {
            memory.write(src.bit_address(x, y, pages_per_row), src.depth, linear_item(row, x, raw.depth()));
        }
    }

    let dst_row = raster_row_size(packed_width, packed.depth(), 1) as usize;
    let mut out = vec![0u8; dst_row * packed_height as usize];
    for y in 0..packed_height {
        let row = &mut out[y as usize * dst_row..(y as usize + 1) * dst_row];
        for x in 0..packed_width {
            let value = memory.read(dst.bit_address(x, y, pages_per_row), dst.depth);
            put_linear_item(row, x, packed.depth(), value);
        }
    }
    Ok((packed_width, packed_height, out))
}

/// Undo [`swizzle`]: decode a packed transfer into linear `raw` texels
#[allow(clippy::too_many_arguments)]
pub fn unswizzle(
    packed: FormatEncoding,
    raw: FormatEncoding,
    width: u32,
    height: u32,
    packed_width: u32,
    packed_height: u32,
    texels: &[u8],
    row_alignment: u32,
) -> Result<Vec<u8>> {
    let src = LayoutGeometry::for_encoding(packed)?;
    let dst = LayoutGeometry::for_encoding(raw)?;
    let pages_per_row = dst.pages_per_row(width);
    let mut memory = GsMemory::new(pages_per_row * dst.page_rows(height))?;

    let src_row = raster_row_size(packed_width, packed.depth(), 1) as usize;
    let needed = src_row * packed_height as usize;
    if texels.len() < needed {
        return Err(BinaryError::not_enough_data(needed, texels.len()));
    }
    for y in 0..packed_height {
        let row = &texels[y as usize * src_row..(y as usize + 1) * src_row];
        for x in 0..packed_width {
            memory.write(src.bit_address(x, y, pages_per_row), src.depth, linear_item(row, x, packed.depth()));
        }
    }

    let dst_row = raster_row_size(width, raw.depth(), row_alignment) as usize;
    let mut out = vec![0u8; dst_row * height as usize];
    for y in 0..height {
        let row = &mut out[y as usize * dst_row..(y as usize + 1) * dst_row];
        for x in 0..width {
            let value = memory.read(dst.bit_address(x, y, pages_per_row), dst.depth);
            put_linear_item(row, x, raw.depth(), value);
        }
    }
    Ok(out)
}

/// Copy a raster into a differently sized one, cropping or zero padding
pub fn resize_rows(
    texels: &[u8],
    width: u32,
    height: u32,
    depth: u32,
    src_alignment: u32,
    dst_width: u32,
    dst_height: u32,
    dst_alignment: u32,
) -> Vec<u8> {
    let src_row = raster_row_size(width, depth, src_alignment) as usize;
    let dst_row = raster_row_size(dst_width, depth, dst_alignment) as usize;
    let copy = raster_row_size(width.min(dst_width), depth, 1) as usize;
    let mut out = vec![0u8; dst_row * dst_height as usize];
    for y in 0..height.min(dst_height) as usize {
        if let Some(row) = texels.get(y * src_row..y * src_row + copy) {
            out[y * dst_row..y * dst_row + copy].copy_from_slice(row);
        }
    }
    if depth == 4 && width < dst_width && width % 2 == 1 {
        // The half byte past the last texel belongs to the padding
        for y in 0..height.min(dst_height) as usize {
            out[y * dst_row + copy - 1] &= 0xF0;
        }
    }
    out
}

const CLUT_PERMUTE: [usize; 32] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, //
    0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f, 0x18, 0x19, 0x1a, 0x1b, 0x1c, 0x1d, 0x1e, 0x1f,
];

/// Swap the CLUT entry order of an 8-bit palette (self inverse)
///
/// Inside every group of 32 entries, entries 8-15 and 16-23 trade places.
pub fn clut_permute(palette: &[u8], entry_size: usize) -> Vec<u8> {
    let group = 32 * entry_size;
    let mut out = palette.to_vec();
    for (chunk_index, chunk) in palette.chunks(group).enumerate() {
        if chunk.len() < group {
            break;
        }
        let base = chunk_index * group;
        for (dst, &src) in CLUT_PERMUTE.iter().enumerate() {
            out[base + dst * entry_size..base + (dst + 1) * entry_size]
                .copy_from_slice(&chunk[src * entry_size..(src + 1) * entry_size]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 + 3) as u8).collect()
    }

    #[test]
    fn test_packed_dimensions() {
        use FormatEncoding::*;
        assert_eq!(packed_dimensions(IdTex8, Tex32, 128, 128).unwrap(), (64, 64));
        assert_eq!(packed_dimensions(IdTex8, Tex32, 32, 32).unwrap(), (16, 16));
        assert_eq!(packed_dimensions(IdTex8Compressed, Tex32, 128, 128).unwrap(), (64, 32));
        assert_eq!(packed_dimensions(Tex32, Tex32, 5, 3).unwrap(), (5, 3));
    }

    #[test]
    fn test_swizzle_round_trip_8bit() {
        let (w, h) = (64, 32);
        let texels = pattern((w * h) as usize);
        let (pw, ph, packed) = swizzle(FormatEncoding::IdTex8, FormatEncoding::Tex32, w, h, &texels, 1).unwrap();
        assert_eq!(packed.len(), (pw * ph * 4) as usize);
        assert_ne!(packed[..texels.len()], texels[..]);
        let back = unswizzle(FormatEncoding::Tex32, FormatEncoding::IdTex8, w, h, pw, ph, &packed, 1).unwrap();
        assert_eq!(back, texels);
    }

    #[test]
    fn test_swizzle_round_trip_4bit() {
        let (w, h) = (32, 16);
        let texels = pattern((w * h / 2) as usize);
        let (pw, ph, packed) =
            swizzle(FormatEncoding::IdTex8Compressed, FormatEncoding::Tex32, w, h, &texels, 1).unwrap();
        let back =
            unswizzle(FormatEncoding::Tex32, FormatEncoding::IdTex8Compressed, w, h, pw, ph, &packed, 4).unwrap();
        assert_eq!(back, texels);
    }

    #[test]
    fn test_memory_size() {
        let psmt8 = LayoutGeometry::of(MemoryLayout::Psmt8).unwrap();
        assert_eq!(psmt8.memory_size(128, 64), BLOCKS_PER_PAGE);
        assert_eq!(psmt8.memory_size(16, 16), 1);
        assert_eq!(psmt8.buffer_width(16), 2);
    }

    #[test]
    fn test_clut_permute_is_involution() {
        let palette: Vec<u8> = (0..256u32).flat_map(|i| i.to_le_bytes()).collect();
        let once = clut_permute(&palette, 4);
        assert_eq!(&once[8 * 4..8 * 4 + 4], &16u32.to_le_bytes());
        assert_eq!(&once[16 * 4..16 * 4 + 4], &8u32.to_le_bytes());
        assert_eq!(clut_permute(&once, 4), palette);
    }

    #[test]
    fn test_resize_rows() {
        let texels = vec![1u8, 2, 3, 4];
        let padded = resize_rows(&texels, 2, 2, 8, 1, 4, 3, 1);
        assert_eq!(padded, vec![1, 2, 0, 0, 3, 4, 0, 0, 0, 0, 0, 0]);
        assert_eq!(resize_rows(&padded, 4, 3, 8, 1, 2, 2, 1), texels);
    }
}
