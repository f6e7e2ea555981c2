//! PVRTC1 block encoder and decoder glue
//!
//! A block is 64 bits: 32 bits of modulation followed by two 16 bit
//! colours. Colour A sits in bits 1-15 of the first colour word (bit 0 is
//! the modulation mode, always 0 here), colour B in the second. Opaque
//! colours are RGB 554 / 555, translucent ones ARGB 3443 / 3444. Blocks
//! are stored in Morton order.
//!
//! Every texel is shaded from the A and B colours of the four blocks around
//! it (bilinear upscale), blended by its modulation weight. The encoder
//! picks bounding colours per block and then chooses, for each texel, the
//! weight closest to the source against the upscaled colours.

use crate::error::{BinaryError, Result};
use crate::pixel::texel::scale_to_8bit;

/// Modulation weights out of 8, standard mode
const WEIGHTS_4BPP: [u32; 4] = [0, 3, 5, 8];
const WEIGHTS_2BPP: [u32; 2] = [0, 8];

/// Bits per texel variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PvrtcMode {
    FourBpp,
    TwoBpp,
}

impl PvrtcMode {
    pub fn bits_per_texel(&self) -> u32 {
        match self {
            PvrtcMode::FourBpp => 4,
            PvrtcMode::TwoBpp => 2,
        }
    }

    /// Texels covered by one 64 bit block
    pub fn block_dimensions(&self) -> (u32, u32) {
        match self {
            PvrtcMode::FourBpp => (4, 4),
            PvrtcMode::TwoBpp => (8, 4),
        }
    }

    /// Smallest surface the format can describe (two blocks per side)
    pub fn alignment(&self) -> (u32, u32) {
        match self {
            PvrtcMode::FourBpp => (8, 8),
            PvrtcMode::TwoBpp => (16, 8),
        }
    }

    pub fn data_size(&self, width: u32, height: u32) -> usize {
        width as usize * height as usize * self.bits_per_texel() as usize / 8
    }

    fn modulation_bits(&self) -> u32 {
        match self {
            PvrtcMode::FourBpp => 2,
            PvrtcMode::TwoBpp => 1,
        }
    }

    fn weights(&self) -> &'static [u32] {
        match self {
            PvrtcMode::FourBpp => &WEIGHTS_4BPP,
            PvrtcMode::TwoBpp => &WEIGHTS_2BPP,
        }
    }
}

/// Block offset of block `(x, y)` in a grid whose smaller side is `min_dim`
pub fn morton_index(x: u32, y: u32, min_dim: u32) -> usize {
    let mut offset = 0u32;
    let mut shift = 0u32;
    let mut mask = 1u32;
    while mask < min_dim {
        offset |= ((y & mask) | ((x & mask) << 1)) << shift;
        mask <<= 1;
        shift += 1;
    }
    offset |= ((x | y) >> shift) << (shift * 2);
    offset as usize
}

fn quantize(value: u8, bits: u32) -> u32 {
    let max = (1u32 << bits) - 1;
    (value as u32 * max + 127) / 255
}

/// 4 bit channel widened to 5 bits the way the hardware does
fn widen_4_to_5(value: u32) -> u32 {
    (value << 1) | (value >> 3)
}

/// Translucent alpha: 3 stored bits read back as a 4 bit value
fn expand_alpha3(a3: u32) -> u8 {
    scale_to_8bit(a3 << 1, 4)
}

fn quantize_alpha3(alpha: u8) -> u32 {
    ((alpha as u32 * 7 + 119) / 238).min(7)
}

/// Packed block colour together with what a decoder makes of it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BlockColor {
    word: u16,
    rgba: [i32; 4],
}

fn pack_color_a(color: [u8; 4]) -> BlockColor {
    if color[3] == 255 {
        let (r, g, b) = (quantize(color[0], 5), quantize(color[1], 5), quantize(color[2], 4));
        BlockColor {
            word: (0x8000 | r << 10 | g << 5 | b << 1) as u16,
            rgba: [
                scale_to_8bit(r, 5) as i32,
                scale_to_8bit(g, 5) as i32,
                scale_to_8bit(widen_4_to_5(b), 5) as i32,
                255,
            ],
        }
    } else {
        let (r, g, b) = (quantize(color[0], 4), quantize(color[1], 4), quantize(color[2], 3));
        let a = quantize_alpha3(color[3]);
        BlockColor {
            word: (a << 12 | r << 8 | g << 4 | b << 1) as u16,
            rgba: [
                scale_to_8bit(r, 4) as i32,
                scale_to_8bit(g, 4) as i32,
                scale_to_8bit(b, 3) as i32,
                expand_alpha3(a) as i32,
            ],
        }
    }
}

fn pack_color_b(color: [u8; 4]) -> BlockColor {
    if color[3] == 255 {
        let (r, g, b) = (quantize(color[0], 5), quantize(color[1], 5), quantize(color[2], 5));
        BlockColor {
            word: (0x8000 | r << 10 | g << 5 | b) as u16,
            rgba: [
                scale_to_8bit(r, 5) as i32,
                scale_to_8bit(g, 5) as i32,
                scale_to_8bit(b, 5) as i32,
                255,
            ],
        }
    } else {
        let (r, g, b) = (quantize(color[0], 4), quantize(color[1], 4), quantize(color[2], 4));
        let a = quantize_alpha3(color[3]);
        BlockColor {
            word: (a << 12 | r << 8 | g << 4 | b) as u16,
            rgba: [
                scale_to_8bit(r, 4) as i32,
                scale_to_8bit(g, 4) as i32,
                scale_to_8bit(b, 4) as i32,
                expand_alpha3(a) as i32,
            ],
        }
    }
}

struct BlockGrid {
    blocks_x: u32,
    blocks_y: u32,
    block_width: u32,
    block_height: u32,
    colors: Vec<(BlockColor, BlockColor)>,
}

impl BlockGrid {
    fn at(&self, bx: i64, by: i64) -> &(BlockColor, BlockColor) {
        let x = bx.rem_euclid(self.blocks_x as i64) as u32;
        let y = by.rem_euclid(self.blocks_y as i64) as u32;
        &self.colors[(y * self.blocks_x + x) as usize]
    }

    /// Bilinearly upscaled A and B colours at texel `(x, y)`
    fn upscaled(&self, x: u32, y: u32) -> ([i32; 4], [i32; 4]) {
        let (bw, bh) = (self.block_width as i64, self.block_height as i64);
        let fx = x as i64 - bw / 2;
        let fy = y as i64 - bh / 2;
        let (bx, wx) = (fx.div_euclid(bw), fx.rem_euclid(bw));
        let (by, wy) = (fy.div_euclid(bh), fy.rem_euclid(bh));

        let corners = [
            (self.at(bx, by), (bw - wx) * (bh - wy)),
            (self.at(bx + 1, by), wx * (bh - wy)),
            (self.at(bx, by + 1), (bw - wx) * wy),
            (self.at(bx + 1, by + 1), wx * wy),
        ];
        let total = (bw * bh) as i32;
        let mut a = [0i32; 4];
        let mut b = [0i32; 4];
        for ((color_a, color_b), weight) in corners {
            for channel in 0..4 {
                a[channel] += color_a.rgba[channel] * weight as i32;
                b[channel] += color_b.rgba[channel] * weight as i32;
            }
        }
        for channel in 0..4 {
            a[channel] = (a[channel] + total / 2) / total;
            b[channel] = (b[channel] + total / 2) / total;
        }
        (a, b)
    }
}

fn texel(rgba: &[u8], width: u32, x: u32, y: u32, with_alpha: bool) -> [u8; 4] {
    let offset = ((y * width + x) * 4) as usize;
    let mut color = [rgba[offset], rgba[offset + 1], rgba[offset + 2], rgba[offset + 3]];
    if !with_alpha {
        color[3] = 255;
    }
    color
}

fn check_surface(mode: PvrtcMode, width: u32, height: u32) -> Result<()> {
    let (align_w, align_h) = mode.alignment();
    if !width.is_power_of_two() || !height.is_power_of_two() || width < align_w || height < align_h {
        return Err(BinaryError::invalid_data(format!(
            "{}x{} is not a valid {}bpp PVRTC surface",
            width,
            height,
            mode.bits_per_texel()
        )));
    }
    Ok(())
}

/// Compress an RGBA8 surface
///
/// The surface must be a power of two and at least [`PvrtcMode::alignment`]
/// in each direction. Without `with_alpha` every block is encoded opaque.
pub fn encode_pvrtc(rgba: &[u8], width: u32, height: u32, mode: PvrtcMode, with_alpha: bool) -> Result<Vec<u8>> {
    check_surface(mode, width, height)?;
    let needed = width as usize * height as usize * 4;
    if rgba.len() < needed {
        return Err(BinaryError::not_enough_data(needed, rgba.len()));
    }

    let (block_width, block_height) = mode.block_dimensions();
    let blocks_x = width / block_width;
    let blocks_y = height / block_height;

    let mut colors = Vec::with_capacity((blocks_x * blocks_y) as usize);
    for by in 0..blocks_y {
        for bx in 0..blocks_x {
            let mut low = [255u8; 4];
            let mut high = [0u8; 4];
            for ty in 0..block_height {
                for tx in 0..block_width {
                    let color = texel(rgba, width, bx * block_width + tx, by * block_height + ty, with_alpha);
                    for channel in 0..4 {
                        low[channel] = low[channel].min(color[channel]);
                        high[channel] = high[channel].max(color[channel]);
                    }
                }
            }
            colors.push((pack_color_a(low), pack_color_b(high)));
        }
    }
    let grid = BlockGrid {
        blocks_x,
        blocks_y,
        block_width,
        block_height,
        colors,
    };

    let weights = mode.weights();
    let bits = mode.modulation_bits();
    let min_dim = blocks_x.min(blocks_y);
    let mut out = vec![0u8; mode.data_size(width, height)];

    for by in 0..blocks_y {
        for bx in 0..blocks_x {
            let mut modulation = 0u32;
            for ty in 0..block_height {
                for tx in 0..block_width {
                    let (x, y) = (bx * block_width + tx, by * block_height + ty);
                    let source = texel(rgba, width, x, y, with_alpha);
                    let (a, b) = grid.upscaled(x, y);

                    let best = weights
                        .iter()
                        .enumerate()
                        .min_by_key(|&(_, &w)| {
                            (0..4)
                                .map(|c| {
                                    let value = (a[c] * (8 - w as i32) + b[c] * w as i32) / 8;
                                    let diff = value - source[c] as i32;
                                    diff * diff
                                })
                                .sum::<i32>()
                        })
                        .map(|(index, _)| index as u32)
                        .unwrap_or(0);
                    modulation |= best << (bits * (ty * block_width + tx));
                }
            }

            let (color_a, color_b) = grid.colors[(by * blocks_x + bx) as usize];
            let offset = morton_index(bx, by, min_dim) * 8;
            out[offset..offset + 4].copy_from_slice(&modulation.to_le_bytes());
            out[offset + 4..offset + 6].copy_from_slice(&(color_a.word & !1).to_le_bytes());
            out[offset + 6..offset + 8].copy_from_slice(&color_b.word.to_le_bytes());
        }
    }
    Ok(out)
}

/// Decompress a PVRTC surface into RGBA8 texels
pub fn decode_pvrtc(data: &[u8], width: u32, height: u32, mode: PvrtcMode) -> Result<Vec<u8>> {
    check_surface(mode, width, height)?;
    let needed = mode.data_size(width, height);
    if data.len() < needed {
        return Err(BinaryError::not_enough_data(needed, data.len()));
    }

    let (w, h) = (width as usize, height as usize);
    let mut output = vec![0u32; w * h];
    let decoded = match mode {
        PvrtcMode::FourBpp => texture2ddecoder::decode_pvrtc_4bpp(data, w, h, &mut output),
        PvrtcMode::TwoBpp => texture2ddecoder::decode_pvrtc_2bpp(data, w, h, &mut output),
    };
    decoded.map_err(|e| BinaryError::corrupted_data(format!("PVRTC decoding failed: {}", e)))?;

    // decoder texels are BGRA in little endian order
    Ok(output
        .iter()
        .flat_map(|pixel| {
            let [b, g, r, a] = pixel.to_le_bytes();
            [r, g, b, a]
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
        color.repeat((width * height) as usize)
    }

    #[test]
    fn test_morton_order() {
        assert_eq!(morton_index(0, 0, 2), 0);
        assert_eq!(morton_index(0, 1, 2), 1);
        assert_eq!(morton_index(1, 0, 2), 2);
        assert_eq!(morton_index(1, 1, 2), 3);
        assert_eq!(morton_index(2, 0, 4), 8);
        // rectangular grid: the long side continues linearly
        assert_eq!(morton_index(2, 0, 2), 4);
        assert_eq!(morton_index(3, 1, 2), 7);
    }

    #[test]
    fn test_sizes_and_alignment() {
        assert_eq!(PvrtcMode::FourBpp.data_size(8, 8), 32);
        assert_eq!(PvrtcMode::TwoBpp.data_size(16, 8), 32);
        assert!(encode_pvrtc(&solid(4, 4, [0; 4]), 4, 4, PvrtcMode::FourBpp, false).is_err());
        assert!(encode_pvrtc(&solid(8, 8, [0; 4]), 8, 8, PvrtcMode::TwoBpp, false).is_err());
        assert!(encode_pvrtc(&solid(12, 8, [0; 4]), 12, 8, PvrtcMode::FourBpp, false).is_err());
    }

    #[test]
    fn test_opaque_color_words() {
        let a = pack_color_a([255, 0, 255, 255]);
        assert_eq!(a.word, 0x8000 | 31 << 10 | 15 << 1);
        assert_eq!(a.rgba, [255, 0, 255, 255]);
        let b = pack_color_b([0, 255, 0, 255]);
        assert_eq!(b.word, 0x8000 | 31 << 5);
        let translucent = pack_color_b([255, 255, 255, 0]);
        assert_eq!(translucent.word & 0x8000, 0);
        assert_eq!(translucent.rgba[3], 0);
    }

    #[test]
    fn test_solid_surface_is_uniform() {
        let encoded = encode_pvrtc(&solid(8, 8, [200, 100, 50, 255]), 8, 8, PvrtcMode::FourBpp, true).unwrap();
        assert_eq!(encoded.len(), 32);
        let blocks: Vec<&[u8]> = encoded.chunks(8).collect();
        assert!(blocks.iter().all(|block| block[4..] == blocks[0][4..]));
        // mode bit is clear on every block
        assert!(blocks.iter().all(|block| block[4] & 1 == 0));
    }

    #[test]
    fn test_solid_color_decodes_close() {
        for mode in [PvrtcMode::FourBpp, PvrtcMode::TwoBpp] {
            let (w, h) = mode.alignment();
            let (w, h) = (w * 2, h * 2);
            let color = [200, 100, 50, 255];
            let encoded = encode_pvrtc(&solid(w, h, color), w, h, mode, false).unwrap();
            let decoded = decode_pvrtc(&encoded, w, h, mode).unwrap();
            assert_eq!(decoded.len(), (w * h * 4) as usize);
            for texel in decoded.chunks_exact(4) {
                for channel in 0..3 {
                    let diff = (texel[channel] as i32 - color[channel] as i32).abs();
                    assert!(diff <= 16, "{:?} vs {:?}", texel, color);
                }
            }
        }
    }
}
