//! Helpers shared by the native texture codecs

use rw_txd_core::TEXTURE_NAME_LENGTH;

use crate::chunk::{BlockReader, name_to_fixed};
use crate::codec::CodecContext;
use crate::error::{BinaryError, Result};
use crate::pixel::{CompressionType, MipmapLayer, block_aligned_dimensions, compressed_data_size, mipmap_dimensions, raster_row_size};

/// Fixed width name field for a meta header, warning on truncation
pub(crate) fn encode_name_field(
    ctx: &CodecContext<'_>,
    texture: &str,
    value: &str,
    field: &str,
) -> [u8; TEXTURE_NAME_LENGTH] {
    let (bytes, truncated) = name_to_fixed::<TEXTURE_NAME_LENGTH>(value);
    if truncated {
        ctx.diagnostics.push_secure_warning(format!(
            "texture '{}' {} was truncated to {} characters",
            texture,
            field,
            TEXTURE_NAME_LENGTH - 1
        ));
    }
    bytes
}

/// Encoded dimensions and byte size of a mipmap level
pub(crate) fn level_geometry(
    base_width: u32,
    base_height: u32,
    level: u32,
    depth: u32,
    row_alignment: u32,
    compression: CompressionType,
) -> (u32, u32, u32, u32, usize) {
    let (layer_width, layer_height) = mipmap_dimensions(base_width, base_height, level);
    if compression.is_compressed() {
        let (w, h) = block_aligned_dimensions(layer_width, layer_height, 4, 4);
        let size = compressed_data_size(compression, layer_width, layer_height);
        (w, h, layer_width, layer_height, size)
    } else {
        let size = raster_row_size(layer_width, depth, row_alignment) as usize * layer_height as usize;
        (layer_width, layer_height, layer_width, layer_height, size)
    }
}

/// Read `count` levels stored as `u32 size` + bytes
#[allow(clippy::too_many_arguments)]
pub(crate) fn read_sized_levels(
    reader: &mut BlockReader<'_>,
    ctx: &CodecContext<'_>,
    texture: &str,
    count: u32,
    base_width: u32,
    base_height: u32,
    depth: u32,
    row_alignment: u32,
    compression: CompressionType,
) -> Result<Vec<MipmapLayer>> {
    let mut layers = Vec::with_capacity(count as usize);
    for level in 0..count {
        let (width, height, layer_width, layer_height, expected) =
            level_geometry(base_width, base_height, level, depth, row_alignment, compression);

        let size = reader.read_u32()? as usize;
        if size < expected {
            return Err(BinaryError::invalid_data(format!(
                "texture '{}' mipmap {} holds {} bytes, {} required",
                texture, level, size, expected
            )));
        }
        let mut texels = reader.read_bytes(size)?;
        if size > expected {
            ctx.warn(format!(
                "texture '{}' mipmap {} has {} surplus bytes",
                texture,
                level,
                size - expected
            ));
            texels.truncate(expected);
        }
        layers.push(MipmapLayer::new(width, height, texels).with_layer_size(layer_width, layer_height));
    }
    Ok(layers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_geometry() {
        assert_eq!(level_geometry(64, 32, 0, 32, 4, CompressionType::None), (64, 32, 64, 32, 8192));
        assert_eq!(level_geometry(64, 32, 5, 32, 4, CompressionType::None), (2, 1, 2, 1, 8));
        assert_eq!(level_geometry(8, 8, 2, 16, 4, CompressionType::Dxt1), (4, 4, 2, 2, 8));
        assert_eq!(level_geometry(3, 3, 0, 24, 4, CompressionType::None), (3, 3, 3, 3, 36));
    }
}
