//! Raster layout conversion

use super::formats::{ColorModel, ColorOrdering, PaletteType, RasterFormat};
use super::layout::raster_row_size;
use super::texel::{ColorDispatcher, Rgba, get_palette_index, palette_entry_depth, set_palette_index};
use super::types::{MipmapLayer, PixelData};
use crate::error::{BinaryError, Result};

/// Memory layout of uncompressed texel rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterLayout {
    pub raster_format: RasterFormat,
    pub depth: u32,
    pub row_alignment: u32,
    pub color_order: ColorOrdering,
    pub palette_type: PaletteType,
}

impl RasterLayout {
    pub fn new(raster_format: RasterFormat, depth: u32, color_order: ColorOrdering, row_alignment: u32) -> Self {
        Self {
            raster_format,
            depth,
            row_alignment,
            color_order,
            palette_type: PaletteType::None,
        }
    }

    pub fn with_palette(mut self, palette_type: PaletteType) -> Self {
        self.palette_type = palette_type;
        self
    }

    pub fn of(pixels: &PixelData) -> Self {
        Self {
            raster_format: pixels.raster_format,
            depth: pixels.depth,
            row_alignment: pixels.row_alignment,
            color_order: pixels.color_order,
            palette_type: pixels.palette_type,
        }
    }

    pub fn row_size(&self, width: u32) -> u32 {
        raster_row_size(width, self.depth, self.row_alignment)
    }

    pub fn data_size(&self, width: u32, height: u32) -> usize {
        self.row_size(width) as usize * height as usize
    }

    fn same_samples(&self, other: &RasterLayout) -> bool {
        self.raster_format == other.raster_format
            && self.depth == other.depth
            && self.color_order == other.color_order
            && self.palette_type == other.palette_type
    }
}

fn checked_rows(texels: &[u8], row_size: usize, height: u32) -> Result<()> {
    let needed = row_size * height as usize;
    if texels.len() < needed {
        return Err(BinaryError::not_enough_data(needed, texels.len()));
    }
    Ok(())
}

/// Convert one level of texels between layouts
///
/// Palette targets only accept palette sources (indices are re-packed);
/// everything else goes texel by texel through [`ColorDispatcher`].
pub fn convert_mipmap_layer(
    texels: &[u8],
    width: u32,
    height: u32,
    src: &RasterLayout,
    src_palette: &[u8],
    src_palette_size: u32,
    dst: &RasterLayout,
) -> Result<Vec<u8>> {
    let src_row = src.row_size(width) as usize;
    let dst_row = dst.row_size(width) as usize;
    checked_rows(texels, src_row, height)?;

    if src.same_samples(dst) && src_row == dst_row {
        return Ok(texels[..src_row * height as usize].to_vec());
    }

    let mut out = Vec::new();
    out.try_reserve_exact(dst_row * height as usize)?;
    out.resize(dst_row * height as usize, 0);

    if dst.palette_type.is_palette() {
        if !src.palette_type.is_palette() {
            return Err(BinaryError::unsupported(
                "converting direct color texels into palette indices needs palettization",
            ));
        }
        for y in 0..height as usize {
            let in_row = &texels[y * src_row..(y + 1) * src_row];
            let out_row = &mut out[y * dst_row..(y + 1) * dst_row];
            for x in 0..width {
                let index = get_palette_index(in_row, x, src.palette_type, src.depth).unwrap_or(0);
                set_palette_index(out_row, x, dst.palette_type, dst.depth, index);
            }
        }
        return Ok(out);
    }

    let reader = ColorDispatcher::new(src.raster_format, src.depth, src.color_order).with_palette(
        src.palette_type,
        src_palette,
        src_palette_size,
    );
    let writer = ColorDispatcher::new(dst.raster_format, dst.depth, dst.color_order);

    if !reader.is_supported() {
        return Err(BinaryError::unsupported(format!(
            "cannot read texels of {} at depth {}",
            src.raster_format.standard_name(),
            src.depth
        )));
    }
    if !writer.is_supported() {
        return Err(BinaryError::unsupported(format!(
            "cannot write texels of {} at depth {}",
            dst.raster_format.standard_name(),
            dst.depth
        )));
    }

    let luminance_path = !src.palette_type.is_palette()
        && src.raster_format.color_model() != ColorModel::Rgba
        && dst.raster_format.color_model() != ColorModel::Rgba;

    for y in 0..height as usize {
        let in_row = &texels[y * src_row..(y + 1) * src_row];
        let out_row = &mut out[y * dst_row..(y + 1) * dst_row];
        for x in 0..width {
            if luminance_path {
                let (lum, alpha) = reader.browse_luminance(in_row, x).unwrap_or((0, 0));
                writer.put_luminance(out_row, x, lum, alpha);
            } else {
                let color = reader.browse_rgba(in_row, x).unwrap_or_default();
                writer.put_rgba(out_row, x, color);
            }
        }
    }
    Ok(out)
}

/// Convert palette entries, padding to `dst_count` entries
pub fn convert_palette_data(
    palette: &[u8],
    count: u32,
    src_format: RasterFormat,
    src_order: ColorOrdering,
    dst_format: RasterFormat,
    dst_order: ColorOrdering,
    dst_count: u32,
) -> Result<Vec<u8>> {
    let src_depth = palette_entry_depth(src_format);
    let dst_depth = palette_entry_depth(dst_format);
    let reader = ColorDispatcher::new(src_format, src_depth, src_order);
    let writer = ColorDispatcher::new(dst_format, dst_depth, dst_order);

    if !reader.is_supported() || !writer.is_supported() {
        return Err(BinaryError::unsupported(format!(
            "palette conversion {} -> {}",
            src_format.standard_name(),
            dst_format.standard_name()
        )));
    }

    let dst_entry = (dst_depth / 8) as usize;
    let mut out = vec![0u8; dst_entry * dst_count as usize];
    for index in 0..count.min(dst_count) {
        if let Some(color) = reader.browse_rgba(palette, index) {
            writer.put_rgba(&mut out, index, color);
        }
    }
    Ok(out)
}

/// Whether any texel of the raster has alpha below 255
pub fn calculate_has_alpha(pixels: &PixelData) -> Result<bool> {
    if pixels.is_compressed() {
        return super::dxt::compressed_has_alpha(pixels);
    }
    if !pixels.raster_format.can_have_alpha() {
        return Ok(false);
    }

    let layout = RasterLayout::of(pixels);
    let dispatcher = ColorDispatcher::new(pixels.raster_format, pixels.depth, pixels.color_order).with_palette(
        pixels.palette_type,
        &pixels.palette_data,
        pixels.palette_size,
    );

    for layer in &pixels.mipmaps {
        let row_size = layout.row_size(layer.width) as usize;
        for y in 0..layer.layer_height as usize {
            let Some(row) = layer.texels.get(y * row_size..(y + 1) * row_size) else {
                break;
            };
            for x in 0..layer.layer_width {
                if dispatcher.browse_rgba(row, x).is_some_and(|c| c.a != 255) {
                    return Ok(true);
                }
            }
        }
    }
    Ok(false)
}

/// Convert a complete raster to another uncompressed layout
///
/// Compressed input is decompressed first. The palette is converted when
/// both sides are palettized; a palette source written to a direct color
/// target is resolved through its palette.
pub fn convert_pixel_data(pixels: &PixelData, dst: &RasterLayout) -> Result<PixelData> {
    let decompressed;
    let source = if pixels.is_compressed() {
        decompressed = super::dxt::decompress_pixel_data(pixels)?;
        &decompressed
    } else {
        pixels
    };

    let src = RasterLayout::of(source);
    let mut out = PixelData {
        raster_format: dst.raster_format,
        depth: dst.depth,
        row_alignment: dst.row_alignment,
        color_order: dst.color_order,
        palette_type: dst.palette_type,
        palette_data: Vec::new(),
        palette_size: 0,
        mipmaps: Vec::with_capacity(source.mipmaps.len()),
        is_newly_allocated: true,
        ..source.clone_metadata()
    };

    if dst.palette_type.is_palette() {
        if !src.palette_type.is_palette() {
            return Err(BinaryError::unsupported(
                "target layout is palettized but the source has no palette",
            ));
        }
        let dst_count = dst.palette_type.item_count();
        if source.palette_size > dst_count {
            return Err(BinaryError::unsupported(format!(
                "palette of {} entries does not fit {}",
                source.palette_size,
                dst.palette_type.name()
            )));
        }
        out.palette_data = convert_palette_data(
            &source.palette_data,
            source.palette_size,
            source.raster_format,
            source.color_order,
            dst.raster_format,
            dst.color_order,
            source.palette_size,
        )?;
        out.palette_size = source.palette_size;
    }

    for layer in &source.mipmaps {
        let texels = convert_mipmap_layer(
            &layer.texels,
            layer.width,
            layer.height,
            &src,
            &source.palette_data,
            source.palette_size,
            dst,
        )?;
        out.mipmaps.push(
            MipmapLayer::new(layer.width, layer.height, texels).with_layer_size(layer.layer_width, layer.layer_height),
        );
    }

    out.has_alpha = calculate_has_alpha(&out)?;
    Ok(out)
}

impl PixelData {
    /// Copy of every field except buffers
    pub(crate) fn clone_metadata(&self) -> PixelData {
        PixelData {
            raster_format: self.raster_format,
            depth: self.depth,
            row_alignment: self.row_alignment,
            color_order: self.color_order,
            palette_type: self.palette_type,
            palette_data: Vec::new(),
            palette_size: self.palette_size,
            compression: self.compression,
            mipmaps: Vec::new(),
            has_alpha: self.has_alpha,
            auto_mipmaps: self.auto_mipmaps,
            cube_texture: self.cube_texture,
            raster_type: self.raster_type,
            is_newly_allocated: self.is_newly_allocated,
        }
    }

    /// Color of a single texel in a level
    pub fn texel(&self, level: usize, x: u32, y: u32) -> Option<Rgba> {
        if self.is_compressed() {
            return None;
        }
        let layer = self.mipmaps.get(level)?;
        let row_size = self.row_size(layer.width) as usize;
        let row = layer.texels.get(y as usize * row_size..(y as usize + 1) * row_size)?;
        ColorDispatcher::new(self.raster_format, self.depth, self.color_order)
            .with_palette(self.palette_type, &self.palette_data, self.palette_size)
            .browse_rgba(row, x)
    }
}
