//! Palette generation for direct color rasters
//!
//! Median cut over RGBA samples of every mipmap level, then nearest color
//! mapping. Used when a raster is converted to a palettized layout.

use std::collections::HashMap;

use super::convert::{RasterLayout, convert_pixel_data};
use super::formats::{ColorOrdering, PaletteType, RasterFormat};
use super::texel::{ColorDispatcher, Rgba, palette_entry_depth, set_palette_index};
use super::types::{MipmapLayer, PixelData};
use crate::error::{BinaryError, Result};

/// Build a palette of at most `max_colors` entries
pub fn median_cut(colors: &[Rgba], max_colors: usize) -> Vec<Rgba> {
    if colors.is_empty() || max_colors == 0 {
        return vec![Rgba::opaque(0, 0, 0)];
    }

    let mut unique = colors.to_vec();
    unique.sort_by_key(|c| u32::from_le_bytes([c.r, c.g, c.b, c.a]));
    unique.dedup();
    if unique.len() <= max_colors {
        return unique;
    }

    let mut buckets: Vec<Vec<Rgba>> = vec![colors.to_vec()];
    while buckets.len() < max_colors {
        let Some((split_idx, widest)) = buckets
            .iter()
            .enumerate()
            .map(|(i, b)| (i, widest_channel(b)))
            .max_by_key(|(_, (_, range))| *range)
        else {
            break;
        };
        let (channel, range) = widest;
        if range == 0 {
            break;
        }

        let mut bucket = buckets.swap_remove(split_idx);
        bucket.sort_by_key(|c| channel_value(c, channel));
        let right = bucket.split_off(bucket.len() / 2);
        buckets.push(bucket);
        buckets.push(right);
    }

    buckets.iter().map(|b| average_color(b)).collect()
}

fn channel_value(color: &Rgba, channel: usize) -> u8 {
    match channel {
        0 => color.r,
        1 => color.g,
        2 => color.b,
        _ => color.a,
    }
}

/// (channel, range) of the widest channel in a bucket
fn widest_channel(colors: &[Rgba]) -> (usize, u8) {
    if colors.len() <= 1 {
        return (0, 0);
    }
    (0..4)
        .map(|channel| {
            let (min, max) = colors.iter().fold((u8::MAX, 0u8), |(min, max), c| {
                let v = channel_value(c, channel);
                (min.min(v), max.max(v))
            });
            (channel, max - min)
        })
        .max_by_key(|(_, range)| *range)
        .unwrap_or((0, 0))
}

fn average_color(colors: &[Rgba]) -> Rgba {
    let n = colors.len().max(1) as u32;
    let sum = colors.iter().fold([0u32; 4], |mut acc, c| {
        acc[0] += c.r as u32;
        acc[1] += c.g as u32;
        acc[2] += c.b as u32;
        acc[3] += c.a as u32;
        acc
    });
    Rgba::new(
        ((sum[0] + n / 2) / n) as u8,
        ((sum[1] + n / 2) / n) as u8,
        ((sum[2] + n / 2) / n) as u8,
        ((sum[3] + n / 2) / n) as u8,
    )
}

fn nearest_color(target: Rgba, palette: &[Rgba]) -> u8 {
    let mut best = (0u8, u32::MAX);
    for (i, color) in palette.iter().enumerate() {
        let dr = target.r as i32 - color.r as i32;
        let dg = target.g as i32 - color.g as i32;
        let db = target.b as i32 - color.b as i32;
        let da = target.a as i32 - color.a as i32;
        let dist = (dr * dr + 2 * dg * dg + db * db + da * da) as u32;
        if dist < best.1 {
            best = (i as u8, dist);
            if dist == 0 {
                break;
            }
        }
    }
    best.0
}

/// Quantize a raster into `palette_type` indices with `format` palette entries
pub fn palettize_pixel_data(
    pixels: &PixelData,
    palette_type: PaletteType,
    format: RasterFormat,
    order: ColorOrdering,
) -> Result<PixelData> {
    if !palette_type.is_palette() {
        return Err(BinaryError::invalid_data("palettization needs a palette type"));
    }
    if pixels.palette_type.is_palette() {
        return Err(BinaryError::unsupported("raster is already palettized"));
    }

    // Normalize the source to 8888 RGBA rows so samples are cheap to read
    let rgba = convert_pixel_data(pixels, &RasterLayout::new(RasterFormat::R8888, 32, ColorOrdering::Rgba, 4))?;

    let mut samples = Vec::new();
    for layer in &rgba.mipmaps {
        let row_size = rgba.row_size(layer.width) as usize;
        for y in 0..layer.height as usize {
            let row = &layer.texels[y * row_size..y * row_size + layer.width as usize * 4];
            samples.extend(row.chunks_exact(4).map(|p| Rgba::new(p[0], p[1], p[2], p[3])));
        }
    }

    let palette = median_cut(&samples, palette_type.item_count() as usize);
    let mut lookup: HashMap<Rgba, u8> = HashMap::new();

    let entry_depth = palette_entry_depth(format);
    let entry_writer = ColorDispatcher::new(format, entry_depth, order);
    if !entry_writer.is_supported() {
        return Err(BinaryError::unsupported(format!(
            "palette entries of {}",
            format.standard_name()
        )));
    }
    let mut palette_data = vec![0u8; (entry_depth / 8) as usize * palette.len()];
    for (i, color) in palette.iter().enumerate() {
        entry_writer.put_rgba(&mut palette_data, i as u32, *color);
    }

    let index_depth = palette_type.index_depth();
    let mut out = PixelData {
        raster_format: format,
        depth: index_depth,
        color_order: order,
        palette_type,
        palette_data,
        palette_size: palette.len() as u32,
        mipmaps: Vec::with_capacity(rgba.mipmaps.len()),
        is_newly_allocated: true,
        ..rgba.clone_metadata()
    };

    for layer in &rgba.mipmaps {
        let src_row = rgba.row_size(layer.width) as usize;
        let dst_row = out.row_size(layer.width) as usize;
        let mut texels = vec![0u8; dst_row * layer.height as usize];
        for y in 0..layer.height as usize {
            let out_row = &mut texels[y * dst_row..(y + 1) * dst_row];
            for x in 0..layer.width {
                let p = &layer.texels[y * src_row + x as usize * 4..][..4];
                let color = Rgba::new(p[0], p[1], p[2], p[3]);
                let index = *lookup.entry(color).or_insert_with(|| nearest_color(color, &palette));
                set_palette_index(out_row, x, palette_type, index_depth, index);
            }
        }
        out.mipmaps.push(
            MipmapLayer::new(layer.width, layer.height, texels).with_layer_size(layer.layer_width, layer.layer_height),
        );
    }

    out.has_alpha = palette.iter().any(|c| c.a != 255) && format.can_have_alpha();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_cut_keeps_few_colors() {
        let colors = vec![Rgba::opaque(255, 0, 0), Rgba::opaque(0, 255, 0), Rgba::opaque(255, 0, 0)];
        let palette = median_cut(&colors, 16);
        assert_eq!(palette.len(), 2);
    }

    #[test]
    fn test_median_cut_limits_palette() {
        let colors: Vec<Rgba> = (0..=255).map(|v| Rgba::gray(v, 255)).collect();
        let palette = median_cut(&colors, 16);
        assert_eq!(palette.len(), 16);
    }

    #[test]
    fn test_palettize_exact_colors() {
        let mut pixels = PixelData::new(RasterFormat::R8888, 32, ColorOrdering::Rgba);
        pixels.push_mipmap(MipmapLayer::new(
            2,
            2,
            vec![255, 0, 0, 255, 0, 0, 255, 255, 0, 0, 255, 255, 255, 0, 0, 128],
        ));

        let out = palettize_pixel_data(&pixels, PaletteType::Pal8, RasterFormat::R8888, ColorOrdering::Rgba).unwrap();
        assert_eq!(out.depth, 8);
        assert_eq!(out.palette_size, 3);
        assert!(out.has_alpha);
        for (x, y) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
            assert_eq!(out.texel(0, x, y), pixels.texel(0, x, y));
        }
    }
}
