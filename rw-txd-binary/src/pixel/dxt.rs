//! DXT1-5 block compression support
//!
//! Decompression into 8888 BGRA rasters. DXT1 and DXT4/5 go through
//! `texture2ddecoder`; DXT2/3 carry explicit 4-bit alpha and are decoded
//! here. Requires the `texture-advanced` feature.

use super::formats::{ColorOrdering, CompressionType, RasterFormat};
use super::layout::block_aligned_dimensions;
use super::types::{MipmapLayer, PixelData};
use crate::error::{BinaryError, Result};

/// Byte size of a compressed level
pub fn compressed_data_size(compression: CompressionType, width: u32, height: u32) -> usize {
    let (w, h) = block_aligned_dimensions(width, height, 4, 4);
    (w / 4) as usize * (h / 4) as usize * compression.block_size() as usize
}

fn block_count(data: &[u8], block_size: usize) -> usize {
    data.len() / block_size
}

/// Whether compressed data uses any non-opaque alpha
pub fn compressed_has_alpha(pixels: &PixelData) -> Result<bool> {
    for layer in &pixels.mipmaps {
        if layer_has_alpha(pixels.compression, &layer.texels) {
            return Ok(true);
        }
    }
    Ok(false)
}

fn layer_has_alpha(compression: CompressionType, data: &[u8]) -> bool {
    match compression {
        CompressionType::None => false,
        CompressionType::Dxt1 => (0..block_count(data, 8)).any(|i| {
            let block = &data[i * 8..i * 8 + 8];
            let c0 = u16::from_le_bytes([block[0], block[1]]);
            let c1 = u16::from_le_bytes([block[2], block[3]]);
            if c0 > c1 {
                return false;
            }
            let indices = u32::from_le_bytes([block[4], block[5], block[6], block[7]]);
            (0..16).any(|t| (indices >> (t * 2)) & 3 == 3)
        }),
        CompressionType::Dxt2 | CompressionType::Dxt3 => (0..block_count(data, 16))
            .any(|i| data[i * 16..i * 16 + 8].iter().any(|&b| b != 0xFF)),
        CompressionType::Dxt4 | CompressionType::Dxt5 => (0..block_count(data, 16)).any(|i| {
            let block = &data[i * 16..i * 16 + 8];
            let palette = dxt5_alpha_palette(block[0], block[1]);
            let bits = block[2..8]
                .iter()
                .enumerate()
                .fold(0u64, |acc, (n, &b)| acc | (b as u64) << (n * 8));
            (0..16).any(|t| palette[((bits >> (t * 3)) & 7) as usize] != 255)
        }),
    }
}

fn dxt5_alpha_palette(a0: u8, a1: u8) -> [u8; 8] {
    let (a0, a1) = (a0 as u32, a1 as u32);
    let mut palette = [a0 as u8, a1 as u8, 0, 0, 0, 0, 0, 255];
    if a0 > a1 {
        for i in 1..7 {
            palette[i + 1] = (((7 - i as u32) * a0 + i as u32 * a1) / 7) as u8;
        }
    } else {
        for i in 1..5 {
            palette[i + 1] = (((5 - i as u32) * a0 + i as u32 * a1) / 5) as u8;
        }
        palette[6] = 0;
    }
    palette
}

fn rgb565(value: u16) -> [u32; 3] {
    let r = ((value >> 11) & 0x1F) as u32;
    let g = ((value >> 5) & 0x3F) as u32;
    let b = (value & 0x1F) as u32;
    [(r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2)]
}

/// DXT3 block: explicit alpha, four color mode
fn decode_dxt3_block(block: &[u8], out: &mut [u32; 16]) {
    let c0 = rgb565(u16::from_le_bytes([block[8], block[9]]));
    let c1 = rgb565(u16::from_le_bytes([block[10], block[11]]));
    let mut colors = [[0u32; 3]; 4];
    colors[0] = c0;
    colors[1] = c1;
    for ch in 0..3 {
        colors[2][ch] = (2 * c0[ch] + c1[ch]) / 3;
        colors[3][ch] = (c0[ch] + 2 * c1[ch]) / 3;
    }
    let indices = u32::from_le_bytes([block[12], block[13], block[14], block[15]]);
    for (t, texel) in out.iter_mut().enumerate() {
        let nibble = (block[t / 2] >> ((t % 2) * 4)) & 0xF;
        let alpha = (nibble as u32) * 17;
        let [r, g, b] = colors[((indices >> (t * 2)) & 3) as usize];
        *texel = b | g << 8 | r << 16 | alpha << 24;
    }
}

fn decode_dxt3(data: &[u8], width: usize, height: usize, out: &mut [u32]) -> Result<()> {
    let blocks_x = width.div_ceil(4);
    let blocks_y = height.div_ceil(4);
    if data.len() < blocks_x * blocks_y * 16 {
        return Err(BinaryError::not_enough_data(blocks_x * blocks_y * 16, data.len()));
    }
    let mut texels = [0u32; 16];
    for by in 0..blocks_y {
        for bx in 0..blocks_x {
            let offset = (by * blocks_x + bx) * 16;
            decode_dxt3_block(&data[offset..offset + 16], &mut texels);
            for ty in 0..4 {
                for tx in 0..4 {
                    let (x, y) = (bx * 4 + tx, by * 4 + ty);
                    if x < width && y < height {
                        out[y * width + x] = texels[ty * 4 + tx];
                    }
                }
            }
        }
    }
    Ok(())
}

/// Decode one compressed level into BGRA texels of the encoded size
#[cfg(feature = "texture-advanced")]
pub fn decode_dxt_layer(compression: CompressionType, data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let (w, h) = (width as usize, height as usize);
    let mut output = vec![0u32; w * h];

    match compression {
        CompressionType::Dxt1 => texture2ddecoder::decode_bc1(data, w, h, &mut output)
            .map_err(|e| BinaryError::corrupted_data(format!("DXT1 decoding failed: {}", e)))?,
        CompressionType::Dxt2 | CompressionType::Dxt3 => decode_dxt3(data, w, h, &mut output)?,
        CompressionType::Dxt4 | CompressionType::Dxt5 => texture2ddecoder::decode_bc3(data, w, h, &mut output)
            .map_err(|e| BinaryError::corrupted_data(format!("DXT5 decoding failed: {}", e)))?,
        CompressionType::None => {
            return Err(BinaryError::invalid_data("layer is not compressed"));
        }
    }

    Ok(output.iter().flat_map(|pixel| pixel.to_le_bytes()).collect())
}

#[cfg(not(feature = "texture-advanced"))]
pub fn decode_dxt_layer(compression: CompressionType, data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    if matches!(compression, CompressionType::Dxt2 | CompressionType::Dxt3) {
        let mut output = vec![0u32; width as usize * height as usize];
        decode_dxt3(data, width as usize, height as usize, &mut output)?;
        return Ok(output.iter().flat_map(|pixel| pixel.to_le_bytes()).collect());
    }
    Err(BinaryError::unsupported(format!(
        "{} decompression requires the texture-advanced feature",
        compression.name()
    )))
}

/// Decompress every level into an 8888 BGRA raster (row alignment 4)
pub fn decompress_pixel_data(pixels: &PixelData) -> Result<PixelData> {
    if !pixels.is_compressed() {
        return Ok(pixels.clone());
    }

    let mut out = PixelData {
        raster_format: RasterFormat::R8888,
        depth: 32,
        row_alignment: 4,
        color_order: ColorOrdering::Bgra,
        compression: CompressionType::None,
        is_newly_allocated: true,
        ..pixels.clone_metadata()
    };
    out.palette_size = 0;

    for layer in &pixels.mipmaps {
        let (enc_w, enc_h) = block_aligned_dimensions(layer.width, layer.height, 4, 4);
        let decoded = decode_dxt_layer(pixels.compression, &layer.texels, enc_w, enc_h)?;

        let (lw, lh) = (layer.layer_width.max(1), layer.layer_height.max(1));
        let mut texels = Vec::with_capacity(lw as usize * lh as usize * 4);
        for y in 0..lh as usize {
            let start = y * enc_w as usize * 4;
            texels.extend_from_slice(&decoded[start..start + lw as usize * 4]);
        }
        out.mipmaps.push(MipmapLayer::new(lw, lh, texels));
    }

    out.has_alpha = layer_alpha_scan(&out);
    Ok(out)
}

fn layer_alpha_scan(pixels: &PixelData) -> bool {
    pixels
        .mipmaps
        .iter()
        .any(|layer| layer.texels.chunks_exact(4).any(|px| px[3] != 255))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dxt3_block() -> Vec<u8> {
        let mut block = vec![0xFFu8; 8];
        block[0] = 0x0F; // texel 0 alpha 0xF, texel 1 alpha 0
        // red and blue endpoints, all indices 0
        block.extend_from_slice(&0xF800u16.to_le_bytes());
        block.extend_from_slice(&0x001Fu16.to_le_bytes());
        block.extend_from_slice(&[0, 0, 0, 0]);
        block
    }

    #[test]
    fn test_compressed_sizes() {
        assert_eq!(compressed_data_size(CompressionType::Dxt1, 64, 64), 2048);
        assert_eq!(compressed_data_size(CompressionType::Dxt5, 2, 2), 16);
    }

    #[test]
    fn test_dxt1_alpha_detection() {
        // c0 > c1: opaque four color block
        let opaque = [0x00, 0xF8, 0x1F, 0x00, 0xFF, 0xFF, 0xFF, 0xFF];
        assert!(!layer_has_alpha(CompressionType::Dxt1, &opaque));
        // c0 <= c1 with index 3 used: punch-through alpha
        let punch = [0x1F, 0x00, 0x00, 0xF8, 0xFF, 0xFF, 0xFF, 0xFF];
        assert!(layer_has_alpha(CompressionType::Dxt1, &punch));
    }

    #[test]
    fn test_dxt3_decode() {
        let block = dxt3_block();
        let mut out = [0u32; 16];
        decode_dxt3_block(&block, &mut out);
        let bytes = out[0].to_le_bytes();
        assert_eq!(bytes, [0, 0, 255, 255]); // BGRA red, opaque
        assert_eq!(out[1] >> 24, 0);
        assert!(layer_has_alpha(CompressionType::Dxt3, &block));
    }

    #[test]
    fn test_decompress_crops_to_layer_size() {
        let mut pixels = PixelData::default();
        pixels.compression = CompressionType::Dxt3;
        pixels.push_mipmap(MipmapLayer::new(4, 4, dxt3_block()).with_layer_size(2, 2));

        let out = decompress_pixel_data(&pixels).unwrap();
        assert_eq!(out.mipmaps[0].width, 2);
        assert_eq!(out.mipmaps[0].texels.len(), 16);
        assert!(out.has_alpha);
        assert_eq!(out.compression, CompressionType::None);
    }

    #[test]
    fn test_dxt5_alpha_palette() {
        let palette = dxt5_alpha_palette(255, 0);
        assert_eq!(palette[0], 255);
        assert_eq!(palette[7], 36);
        let palette = dxt5_alpha_palette(0, 255);
        assert_eq!(palette[6], 0);
        assert_eq!(palette[7], 255);
    }
}
