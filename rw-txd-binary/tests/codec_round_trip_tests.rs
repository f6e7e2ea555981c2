//! Native Texture Codec Tests
//!
//! Pixel data pushed through a codec and a full dictionary write/read must
//! come back unchanged when the codec can hold it natively.

use rw_txd_binary::native::ps2::{MAX_PS2_MIPMAPS, clut_permute, pc_alpha_to_ps2, ps2_alpha_to_pc};
use rw_txd_binary::pixel::{mipmap_dimensions, raster_row_size};
use rw_txd_binary::{
    ColorOrdering, CompressionType, MipmapLayer, PaletteType, PixelData, Raster, RasterFormat, TexDictionary,
    TextureBase, TxdSerializer,
};
use rw_txd_core::LibraryVersion;

/// Deterministic bytes for every level of a chain
fn pixel_chain(format: RasterFormat, depth: u32, order: ColorOrdering, size: u32, levels: u32) -> PixelData {
    let mut pixels = PixelData::new(format, depth, order);
    let mut seed = 0x1234_5678u32;
    for level in 0..levels {
        let (width, height) = mipmap_dimensions(size, size, level);
        let length = raster_row_size(width, depth, 4) * height;
        let texels = (0..length)
            .map(|_| {
                seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                (seed >> 16) as u8
            })
            .collect();
        pixels.push_mipmap(MipmapLayer::new(width, height, texels));
    }
    pixels
}

fn opaque(mut pixels: PixelData) -> PixelData {
    for layer in &mut pixels.mipmaps {
        for texel in layer.texels.chunks_exact_mut(4) {
            texel[3] = 0xFF;
        }
    }
    pixels
}

/// Put `pixels` into a one-texture dictionary on `platform`, write and read it back
fn through_dictionary(platform: &str, pixels: &PixelData) -> PixelData {
    let serializer = TxdSerializer::default();
    let version = LibraryVersion::san_andreas();
    let raster = Raster::new(serializer.registry().require(platform).unwrap(), version);
    raster.set_pixel_data(pixels.clone(), &serializer.context()).unwrap();

    let mut texture = TextureBase::new("sample", version);
    texture.set_raster(Some(raster));
    let mut dictionary = TexDictionary::new(version);
    dictionary.add_texture(texture);

    let bytes = serializer.to_bytes(&dictionary).unwrap();
    let read = serializer.from_bytes(&bytes).unwrap();
    assert!(read.failed.is_empty(), "{:?}", read.failed);
    read.textures()[0]
        .raster()
        .unwrap()
        .get_pixel_data(&serializer.context())
        .unwrap()
}

fn assert_same_texels(expected: &PixelData, actual: &PixelData) {
    assert_eq!(actual.raster_format, expected.raster_format);
    assert_eq!(actual.depth, expected.depth);
    assert_eq!(actual.color_order, expected.color_order);
    assert_eq!(actual.compression, expected.compression);
    assert_eq!(actual.mipmaps.len(), expected.mipmaps.len());
    for (level, (a, b)) in actual.mipmaps.iter().zip(&expected.mipmaps).enumerate() {
        assert_eq!((a.layer_width, a.layer_height), (b.layer_width, b.layer_height), "level {}", level);
        assert_eq!(hex::encode(&a.texels), hex::encode(&b.texels), "level {}", level);
    }
}

#[test]
fn test_d3d9_direct_color_round_trip() {
    for (format, depth) in [(RasterFormat::R8888, 32), (RasterFormat::R565, 16), (RasterFormat::R1555, 16), (RasterFormat::R4444, 16)] {
        let pixels = pixel_chain(format, depth, ColorOrdering::Bgra, 16, 4);
        let back = through_dictionary("Direct3D9", &pixels);
        assert_same_texels(&pixels, &back);
    }
}

#[test]
fn test_d3d8_direct_color_round_trip() {
    let pixels = pixel_chain(RasterFormat::R8888, 32, ColorOrdering::Bgra, 32, 3);
    let back = through_dictionary("Direct3D8", &pixels);
    assert_same_texels(&pixels, &back);
}

#[test]
fn test_ps2_opaque_round_trip() {
    let pixels = opaque(pixel_chain(RasterFormat::R8888, 32, ColorOrdering::Rgba, 32, 3));
    let back = through_dictionary("PlayStation2", &pixels);
    assert_eq!(back.mipmaps.len(), 3);
    for level in 0..3 {
        let (width, height) = mipmap_dimensions(32, 32, level as u32);
        for y in 0..height {
            for x in 0..width {
                assert_eq!(back.texel(level, x, y), pixels.texel(level, x, y), "level {} at {},{}", level, x, y);
            }
        }
    }
}

#[test]
fn test_ps2_alpha_conversion_is_close() {
    for alpha in 0..=255u8 {
        let back = ps2_alpha_to_pc(pc_alpha_to_ps2(alpha));
        assert!((back as i32 - alpha as i32).abs() <= 2, "{} came back as {}", alpha, back);
    }
    assert_eq!(ps2_alpha_to_pc(pc_alpha_to_ps2(255)), 255);
    assert_eq!(pc_alpha_to_ps2(255), 128);
}

#[test]
fn test_ps2_keeps_seven_levels() {
    let pixels = opaque(pixel_chain(RasterFormat::R8888, 32, ColorOrdering::Rgba, 256, 9));
    let serializer = TxdSerializer::default();
    let raster = Raster::new(serializer.registry().require("PlayStation2").unwrap(), LibraryVersion::san_andreas());
    raster.set_pixel_data(pixels, &serializer.context()).unwrap();
    assert_eq!(raster.mipmap_count(), MAX_PS2_MIPMAPS);
    assert_eq!(raster.get_mipmap_layer(6).unwrap().layer.layer_width, 4);
}

#[test]
fn test_clut_permute_round_trip() {
    let palette: Vec<u8> = (0..256u32 * 4).map(|i| (i * 7 % 251) as u8).collect();
    let permuted = clut_permute(&palette, 4);
    assert_ne!(permuted, palette);
    assert_eq!(clut_permute(&permuted, 4), palette);
}

#[test]
fn test_lsb_palette_stored_as_pal4() {
    let palette: Vec<u8> = (0..16u8).flat_map(|i| [i * 16, 255 - i * 16, i, 0xFF]).collect();
    let mut pixels = PixelData::new(RasterFormat::R8888, 4, ColorOrdering::Rgba).with_palette(
        PaletteType::Pal4Lsb,
        palette.clone(),
        16,
    );
    let row = raster_row_size(8, 4, 4);
    let texels = (0..row * 8).map(|i| ((i % 16) as u8) | (((i + 5) % 16) as u8) << 4).collect();
    pixels.push_mipmap(MipmapLayer::new(8, 8, texels));

    for platform in ["Direct3D9", "PlayStation2"] {
        let back = through_dictionary(platform, &pixels);
        assert_eq!(back.palette_type, PaletteType::Pal4, "{}", platform);
        assert_eq!(&back.palette_data[..palette.len()], &palette[..], "{}", platform);
        for y in 0..8 {
            for x in 0..8 {
                assert_eq!(back.texel(0, x, y), pixels.texel(0, x, y), "{} at {},{}", platform, x, y);
            }
        }
    }
}

#[test]
fn test_compressed_raster_moves_to_ps2() {
    // Four white DXT1 blocks
    let block = [0xFF, 0xFF, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
    let mut pixels = PixelData::new(RasterFormat::R565, 16, ColorOrdering::Bgra);
    pixels.compression = CompressionType::Dxt1;
    pixels.push_mipmap(MipmapLayer::new(8, 8, block.repeat(4)));

    let serializer = TxdSerializer::default();
    let ctx = serializer.context();
    let raster = Raster::new(serializer.registry().require("Direct3D9").unwrap(), LibraryVersion::san_andreas());
    raster.set_pixel_data(pixels, &ctx).unwrap();
    assert!(raster.is_compressed());

    let copy = raster.deep_clone();
    raster
        .convert_to(serializer.registry().require("PlayStation2").unwrap(), &ctx)
        .unwrap();
    assert_eq!(raster.platform_name(), "PlayStation2");
    assert!(!raster.is_compressed());
    assert_eq!(raster.size(), (8, 8));

    let decoded = raster.get_pixel_data(&ctx).unwrap();
    let texel = decoded.texel(0, 3, 5).unwrap();
    assert_eq!((texel.r, texel.g, texel.b, texel.a), (255, 255, 255, 255));

    // The clone kept its own native data
    assert_eq!(copy.platform_name(), "Direct3D9");
    assert!(copy.is_compressed());
}

#[test]
fn test_palettize_on_d3d9() {
    let pixels = opaque(pixel_chain(RasterFormat::R8888, 32, ColorOrdering::Bgra, 8, 1));
    let serializer = TxdSerializer::default();
    let ctx = serializer.context();
    let raster = Raster::new(serializer.registry().require("Direct3D9").unwrap(), LibraryVersion::san_andreas());
    raster.set_pixel_data(pixels, &ctx).unwrap();
    raster.palettize(PaletteType::Pal8, &ctx).unwrap();
    assert_eq!(raster.palette_type(), PaletteType::Pal8);
    assert!(raster.format_string().contains("PAL8"));
}
