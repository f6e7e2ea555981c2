//! Texel browse/put dispatch
//!
//! Every conversion between raster layouts funnels through
//! [`ColorDispatcher`], which reads or writes a single texel of a row given
//! the raster format, depth, color ordering and palette. Channels of packed
//! formats are laid out lowest bits first in the order named by the
//! [`ColorOrdering`] (RGBA puts red in the lowest bits).

use super::formats::{ColorModel, ColorOrdering, PaletteType, RasterFormat};

/// 8-bit RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn gray(lum: u8, a: u8) -> Self {
        Self {
            r: lum,
            g: lum,
            b: lum,
            a,
        }
    }

    /// Rec. 601 luminance
    pub fn luminance(&self) -> u8 {
        ((self.r as u32 * 299 + self.g as u32 * 587 + self.b as u32 * 114 + 500) / 1000) as u8
    }
}

#[derive(Debug, Clone, Copy)]
struct PackedLayout {
    /// Widths of R, G, B, A; alpha width 0 means no alpha channel
    widths: [u32; 4],
    /// Unused bits in the alpha slot
    alpha_pad: u32,
    bytes: usize,
}

fn packed_layout(format: RasterFormat, depth: u32) -> Option<PackedLayout> {
    let layout = |widths: [u32; 4], alpha_pad: u32, bytes: usize| {
        Some(PackedLayout {
            widths,
            alpha_pad,
            bytes,
        })
    };
    match (format, depth) {
        (RasterFormat::R1555, 16) => layout([5, 5, 5, 1], 0, 2),
        (RasterFormat::R565, 16) => layout([5, 6, 5, 0], 0, 2),
        (RasterFormat::R4444, 16) => layout([4, 4, 4, 4], 0, 2),
        (RasterFormat::R555, 16) => layout([5, 5, 5, 0], 1, 2),
        (RasterFormat::R8888, 32) => layout([8, 8, 8, 8], 0, 4),
        (RasterFormat::R888, 32) => layout([8, 8, 8, 0], 8, 4),
        (RasterFormat::R888, 24) => layout([8, 8, 8, 0], 0, 3),
        _ => None,
    }
}

/// Channel slots (0 = R, 1 = G, 2 = B, 3 = A) from the lowest bits upward
fn channel_sequence(order: ColorOrdering) -> [usize; 4] {
    match order {
        ColorOrdering::Rgba => [0, 1, 2, 3],
        ColorOrdering::Bgra => [2, 1, 0, 3],
        ColorOrdering::Abgr => [3, 2, 1, 0],
    }
}

/// Scale an n-bit value to 8 bits
pub fn scale_to_8bit(value: u32, bits: u32) -> u8 {
    match bits {
        0 => 255,
        8 => value as u8,
        _ => {
            let max = (1u32 << bits) - 1;
            ((value.min(max) * 255 + max / 2) / max) as u8
        }
    }
}

/// Scale an 8-bit value down to n bits
pub fn scale_from_8bit(value: u8, bits: u32) -> u32 {
    match bits {
        0 => 0,
        8 => value as u32,
        _ => {
            let max = (1u32 << bits) - 1;
            (value as u32 * max + 127) / 255
        }
    }
}

fn read_le(row: &[u8], offset: usize, bytes: usize) -> Option<u32> {
    let slice = row.get(offset..offset + bytes)?;
    Some(
        slice
            .iter()
            .enumerate()
            .fold(0u32, |acc, (i, &b)| acc | (b as u32) << (i * 8)),
    )
}

fn write_le(row: &mut [u8], offset: usize, bytes: usize, value: u32) -> bool {
    match row.get_mut(offset..offset + bytes) {
        Some(slice) => {
            for (i, byte) in slice.iter_mut().enumerate() {
                *byte = (value >> (i * 8)) as u8;
            }
            true
        }
        None => false,
    }
}

fn read_nibble(row: &[u8], x: u32, high_first: bool) -> Option<u8> {
    let byte = *row.get((x / 2) as usize)?;
    let high = (x % 2 == 0) == high_first;
    Some(if high { byte >> 4 } else { byte & 0x0F })
}

fn write_nibble(row: &mut [u8], x: u32, high_first: bool, value: u8) -> bool {
    match row.get_mut((x / 2) as usize) {
        Some(byte) => {
            let high = (x % 2 == 0) == high_first;
            if high {
                *byte = (*byte & 0x0F) | (value & 0x0F) << 4;
            } else {
                *byte = (*byte & 0xF0) | (value & 0x0F);
            }
            true
        }
        None => false,
    }
}

/// Read the palette index of texel `x`
pub fn get_palette_index(row: &[u8], x: u32, palette_type: PaletteType, depth: u32) -> Option<u8> {
    match (palette_type, depth) {
        (PaletteType::None, _) => None,
        (PaletteType::Pal4, 4) => read_nibble(row, x, true),
        (PaletteType::Pal4Lsb, 4) => read_nibble(row, x, false),
        (_, 8) => row.get(x as usize).copied(),
        _ => None,
    }
}

/// Write the palette index of texel `x`
pub fn set_palette_index(row: &mut [u8], x: u32, palette_type: PaletteType, depth: u32, index: u8) -> bool {
    match (palette_type, depth) {
        (PaletteType::None, _) => false,
        (PaletteType::Pal4, 4) => write_nibble(row, x, true, index),
        (PaletteType::Pal4Lsb, 4) => write_nibble(row, x, false, index),
        (_, 8) => match row.get_mut(x as usize) {
            Some(byte) => {
                *byte = index;
                true
            }
            None => false,
        },
        _ => false,
    }
}

/// Depth a palette entry of `format` is stored with
pub fn palette_entry_depth(format: RasterFormat) -> u32 {
    format.natural_depth()
}

/// Reads and writes texels of one raster layout
#[derive(Debug, Clone, Copy)]
pub struct ColorDispatcher<'a> {
    pub format: RasterFormat,
    pub depth: u32,
    pub order: ColorOrdering,
    pub palette_type: PaletteType,
    pub palette: &'a [u8],
    pub palette_size: u32,
}

impl<'a> ColorDispatcher<'a> {
    pub fn new(format: RasterFormat, depth: u32, order: ColorOrdering) -> Self {
        Self {
            format,
            depth,
            order,
            palette_type: PaletteType::None,
            palette: &[],
            palette_size: 0,
        }
    }

    pub fn with_palette(mut self, palette_type: PaletteType, palette: &'a [u8], palette_size: u32) -> Self {
        self.palette_type = palette_type;
        self.palette = palette;
        self.palette_size = palette_size;
        self
    }

    /// Whether texels of this layout can be read
    pub fn is_supported(&self) -> bool {
        if self.palette_type.is_palette() {
            let index_ok = matches!(
                (self.palette_type, self.depth),
                (PaletteType::Pal4 | PaletteType::Pal4Lsb, 4) | (_, 8)
            );
            let entry = ColorDispatcher::new(self.format, palette_entry_depth(self.format), self.order);
            return index_ok && entry.is_supported();
        }
        match self.format.color_model() {
            ColorModel::Rgba => packed_layout(self.format, self.depth).is_some(),
            ColorModel::Luminance => self.luminance_layout().is_some(),
            ColorModel::Depth => self.depth_bytes().is_some(),
        }
    }

    fn luminance_layout(&self) -> Option<(u32, u32)> {
        // (luminance bits, alpha bits)
        match (self.format, self.depth) {
            (RasterFormat::Lum, 4) => Some((4, 0)),
            (RasterFormat::Lum, 8) => Some((8, 0)),
            (RasterFormat::LumAlpha, 8) => Some((4, 4)),
            (RasterFormat::LumAlpha, 16) => Some((8, 8)),
            _ => None,
        }
    }

    fn depth_bytes(&self) -> Option<usize> {
        match (self.format, self.depth) {
            (RasterFormat::D16, 16) => Some(2),
            (RasterFormat::D24, 24) => Some(3),
            (RasterFormat::D32, 32) => Some(4),
            _ => None,
        }
    }

    fn palette_entry(&self, index: u8) -> Option<Rgba> {
        if index as u32 >= self.palette_size {
            return None;
        }
        let entry = ColorDispatcher::new(self.format, palette_entry_depth(self.format), self.order);
        entry.browse_direct(self.palette, index as u32)
    }

    /// Color of texel `x` in `row`
    pub fn browse_rgba(&self, row: &[u8], x: u32) -> Option<Rgba> {
        if self.palette_type.is_palette() {
            let index = get_palette_index(row, x, self.palette_type, self.depth)?;
            return self.palette_entry(index);
        }
        self.browse_direct(row, x)
    }

    fn browse_direct(&self, row: &[u8], x: u32) -> Option<Rgba> {
        match self.format.color_model() {
            ColorModel::Rgba => {
                let layout = packed_layout(self.format, self.depth)?;
                let value = read_le(row, x as usize * layout.bytes, layout.bytes)?;
                let mut channels = [0u8; 4];
                let mut shift = 0;
                for slot in channel_sequence(self.order) {
                    let width = layout.widths[slot];
                    if slot == 3 && width == 0 {
                        channels[3] = 255;
                        shift += layout.alpha_pad;
                        continue;
                    }
                    let raw = (value >> shift) & ((1u32 << width) - 1);
                    channels[slot] = scale_to_8bit(raw, width);
                    shift += width;
                }
                Some(Rgba::new(channels[0], channels[1], channels[2], channels[3]))
            }
            ColorModel::Luminance | ColorModel::Depth => {
                let (lum, alpha) = self.browse_luminance_direct(row, x)?;
                Some(Rgba::gray(lum, alpha))
            }
        }
    }

    /// Luminance and alpha of texel `x`
    pub fn browse_luminance(&self, row: &[u8], x: u32) -> Option<(u8, u8)> {
        if self.palette_type.is_palette() || self.format.color_model() == ColorModel::Rgba {
            let color = self.browse_rgba(row, x)?;
            return Some((color.luminance(), color.a));
        }
        self.browse_luminance_direct(row, x)
    }

    fn browse_luminance_direct(&self, row: &[u8], x: u32) -> Option<(u8, u8)> {
        if let Some((lum_bits, alpha_bits)) = self.luminance_layout() {
            return match (lum_bits, alpha_bits) {
                (4, 0) => Some((scale_to_8bit(read_nibble(row, x, true)? as u32, 4), 255)),
                (8, 0) => Some((*row.get(x as usize)?, 255)),
                (4, 4) => {
                    let byte = *row.get(x as usize)?;
                    Some((
                        scale_to_8bit((byte & 0x0F) as u32, 4),
                        scale_to_8bit((byte >> 4) as u32, 4),
                    ))
                }
                _ => {
                    let pair = row.get(x as usize * 2..x as usize * 2 + 2)?;
                    Some((pair[0], pair[1]))
                }
            };
        }
        let bytes = self.depth_bytes()?;
        let value = read_le(row, x as usize * bytes, bytes)?;
        Some(((value >> ((bytes - 1) * 8)) as u8, 255))
    }

    /// Store a color at texel `x`; palette rasters cannot be written this way
    pub fn put_rgba(&self, row: &mut [u8], x: u32, color: Rgba) -> bool {
        if self.palette_type.is_palette() {
            return false;
        }
        match self.format.color_model() {
            ColorModel::Rgba => {
                let Some(layout) = packed_layout(self.format, self.depth) else {
                    return false;
                };
                let channels = [color.r, color.g, color.b, color.a];
                let mut value = 0u32;
                let mut shift = 0;
                for slot in channel_sequence(self.order) {
                    let width = layout.widths[slot];
                    if slot == 3 && width == 0 {
                        if layout.alpha_pad > 0 {
                            value |= ((1u32 << layout.alpha_pad) - 1) << shift;
                        }
                        shift += layout.alpha_pad;
                        continue;
                    }
                    value |= scale_from_8bit(channels[slot], width) << shift;
                    shift += width;
                }
                write_le(row, x as usize * layout.bytes, layout.bytes, value)
            }
            ColorModel::Luminance | ColorModel::Depth => {
                self.put_luminance(row, x, color.luminance(), color.a)
            }
        }
    }

    /// Store luminance and alpha at texel `x`
    pub fn put_luminance(&self, row: &mut [u8], x: u32, lum: u8, alpha: u8) -> bool {
        if self.palette_type.is_palette() {
            return false;
        }
        if self.format.color_model() == ColorModel::Rgba {
            return self.put_rgba(row, x, Rgba::gray(lum, alpha));
        }
        if let Some(layout) = self.luminance_layout() {
            return match layout {
                (4, 0) => write_nibble(row, x, true, scale_from_8bit(lum, 4) as u8),
                (8, 0) => match row.get_mut(x as usize) {
                    Some(byte) => {
                        *byte = lum;
                        true
                    }
                    None => false,
                },
                (4, 4) => match row.get_mut(x as usize) {
                    Some(byte) => {
                        *byte = scale_from_8bit(lum, 4) as u8 | (scale_from_8bit(alpha, 4) as u8) << 4;
                        true
                    }
                    None => false,
                },
                _ => match row.get_mut(x as usize * 2..x as usize * 2 + 2) {
                    Some(pair) => {
                        pair[0] = lum;
                        pair[1] = alpha;
                        true
                    }
                    None => false,
                },
            };
        }
        match self.depth_bytes() {
            Some(bytes) => {
                // Replicate the sample over the full depth range
                let value = (0..bytes).fold(0u32, |acc, i| acc | (lum as u32) << (i * 8));
                write_le(row, x as usize * bytes, bytes, value)
            }
            None => false,
        }
    }
}

/// Read texel `x` of `row` as RGBA
#[allow(clippy::too_many_arguments)]
pub fn browse_texel_rgba(
    row: &[u8],
    x: u32,
    format: RasterFormat,
    depth: u32,
    order: ColorOrdering,
    palette_type: PaletteType,
    palette: &[u8],
    palette_size: u32,
) -> Option<Rgba> {
    ColorDispatcher::new(format, depth, order)
        .with_palette(palette_type, palette, palette_size)
        .browse_rgba(row, x)
}

/// Write texel `x` of `row` from RGBA
pub fn put_texel_rgba(
    row: &mut [u8],
    x: u32,
    format: RasterFormat,
    depth: u32,
    order: ColorOrdering,
    color: Rgba,
) -> bool {
    ColorDispatcher::new(format, depth, order).put_rgba(row, x, color)
}

/// Read texel `x` of `row` as luminance and alpha
pub fn browse_texel_luminance(
    row: &[u8],
    x: u32,
    format: RasterFormat,
    depth: u32,
    palette_type: PaletteType,
    palette: &[u8],
    palette_size: u32,
) -> Option<(u8, u8)> {
    ColorDispatcher::new(format, depth, ColorOrdering::Rgba)
        .with_palette(palette_type, palette, palette_size)
        .browse_luminance(row, x)
}

/// Write texel `x` of `row` from luminance and alpha
pub fn put_texel_luminance(row: &mut [u8], x: u32, format: RasterFormat, depth: u32, lum: u8, alpha: u8) -> bool {
    ColorDispatcher::new(format, depth, ColorOrdering::Rgba).put_luminance(row, x, lum, alpha)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_8888_orderings() {
        let row = [1u8, 2, 3, 4];
        let rgba = browse_texel_rgba(&row, 0, RasterFormat::R8888, 32, ColorOrdering::Rgba, PaletteType::None, &[], 0);
        assert_eq!(rgba, Some(Rgba::new(1, 2, 3, 4)));

        let bgra = browse_texel_rgba(&row, 0, RasterFormat::R8888, 32, ColorOrdering::Bgra, PaletteType::None, &[], 0);
        assert_eq!(bgra, Some(Rgba::new(3, 2, 1, 4)));

        let abgr = browse_texel_rgba(&row, 0, RasterFormat::R8888, 32, ColorOrdering::Abgr, PaletteType::None, &[], 0);
        assert_eq!(abgr, Some(Rgba::new(4, 3, 2, 1)));
    }

    #[test]
    fn test_1555_bgra_matches_d3d_layout() {
        // A1R5G5B5: alpha bit 15, red 10-14, green 5-9, blue 0-4
        let value: u16 = 0x8000 | (31 << 10) | (0 << 5) | 16;
        let row = value.to_le_bytes();
        let color = browse_texel_rgba(&row, 0, RasterFormat::R1555, 16, ColorOrdering::Bgra, PaletteType::None, &[], 0)
            .unwrap();
        assert_eq!(color.r, 255);
        assert_eq!(color.g, 0);
        assert_eq!(color.a, 255);

        let mut out = [0u8; 2];
        assert!(put_texel_rgba(&mut out, 0, RasterFormat::R1555, 16, ColorOrdering::Bgra, color));
        assert_eq!(out, row);
    }

    #[test]
    fn test_888_ignores_padding() {
        let row = [10u8, 20, 30, 0];
        let color = browse_texel_rgba(&row, 0, RasterFormat::R888, 32, ColorOrdering::Bgra, PaletteType::None, &[], 0)
            .unwrap();
        assert_eq!(color, Rgba::opaque(30, 20, 10));

        let mut out = [0u8; 3];
        put_texel_rgba(&mut out, 0, RasterFormat::R888, 24, ColorOrdering::Rgba, color);
        assert_eq!(out, [30, 20, 10]);
    }

    #[test]
    fn test_palette_nibble_orders() {
        let palette = [0u8, 0, 0, 255, 255, 255, 255, 255];
        let row = [0x10u8];

        let msb = browse_texel_rgba(&row, 0, RasterFormat::R8888, 4, ColorOrdering::Rgba, PaletteType::Pal4, &palette, 2);
        assert_eq!(msb, Some(Rgba::new(255, 255, 255, 255)));

        let lsb = browse_texel_rgba(&row, 0, RasterFormat::R8888, 4, ColorOrdering::Rgba, PaletteType::Pal4Lsb, &palette, 2);
        assert_eq!(lsb, Some(Rgba::new(0, 0, 0, 255)));

        let mut row = [0u8];
        assert!(set_palette_index(&mut row, 1, PaletteType::Pal4Lsb, 4, 0xA));
        assert_eq!(row[0], 0xA0);
        assert_eq!(get_palette_index(&row, 1, PaletteType::Pal4Lsb, 4), Some(0xA));
    }

    #[test]
    fn test_palette_index_out_of_range() {
        let palette = [1u8, 2, 3, 4];
        let row = [5u8];
        assert_eq!(
            browse_texel_rgba(&row, 0, RasterFormat::R8888, 8, ColorOrdering::Rgba, PaletteType::Pal8, &palette, 1),
            None
        );
    }

    #[test]
    fn test_luminance() {
        let mut row = [0u8; 2];
        assert!(put_texel_luminance(&mut row, 0, RasterFormat::LumAlpha, 16, 200, 100));
        assert_eq!(
            browse_texel_luminance(&row, 0, RasterFormat::LumAlpha, 16, PaletteType::None, &[], 0),
            Some((200, 100))
        );

        let gray = browse_texel_rgba(&[128u8], 0, RasterFormat::Lum, 8, ColorOrdering::Rgba, PaletteType::None, &[], 0);
        assert_eq!(gray, Some(Rgba::gray(128, 255)));
    }

    #[test]
    fn test_scaling() {
        assert_eq!(scale_to_8bit(31, 5), 255);
        assert_eq!(scale_to_8bit(0, 5), 0);
        assert_eq!(scale_from_8bit(255, 6), 63);
        for bits in [1, 4, 5, 6] {
            let max = (1u32 << bits) - 1;
            for v in 0..=max {
                assert_eq!(scale_from_8bit(scale_to_8bit(v, bits), bits), v);
            }
        }
    }
}
