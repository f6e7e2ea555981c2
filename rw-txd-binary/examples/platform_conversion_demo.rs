//! Platform conversion demonstration
//!
//! Builds a small dictionary on Direct3D 9, moves it to the PlayStation 2
//! and writes both the dictionary and a PNG of the converted texture.

use rw_txd_binary::{
    ColorOrdering, MipmapLayer, PixelData, Raster, RasterFormat, TexDictionary, TextureBase, TextureExporter,
    TxdSerializer, mipmap_to_rgba_image,
};
use rw_txd_core::LibraryVersion;
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("RenderWare TXD - Platform Conversion Demo");
    println!("=========================================");

    let serializer = TxdSerializer::default();
    let ctx = serializer.context();
    let version = LibraryVersion::san_andreas();

    let raster = Raster::new(serializer.registry().require("Direct3D9")?, version);
    raster.set_pixel_data(create_gradient(32, 32), &ctx)?;

    let mut texture = TextureBase::new("gradient", version);
    texture.set_raster(Some(Arc::clone(&raster)));
    let mut dictionary = TexDictionary::new(version);
    dictionary.add_texture(texture);

    println!("\nBefore: {} {}", raster.platform_name(), raster.format_string());
    raster.convert_to(serializer.registry().require("PlayStation2")?, &ctx)?;
    println!("After:  {} {}", raster.platform_name(), raster.format_string());

    std::fs::create_dir_all("target")?;
    serializer.save_to_file(&dictionary, "target/gradient_ps2.txd")?;
    println!("  Saved to: target/gradient_ps2.txd");

    let image = mipmap_to_rgba_image(&raster.get_pixel_data(&ctx)?, 0)?;
    TextureExporter::export_png(&image, "target/gradient_ps2.png")?;
    println!("  Saved to: target/gradient_ps2.png");

    for warning in serializer.diagnostics().warnings() {
        println!("  warning: {}", warning);
    }
    Ok(())
}

fn create_gradient(width: u32, height: u32) -> PixelData {
    let mut texels = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            let r = (x * 255 / (width - 1)) as u8;
            let g = (y * 255 / (height - 1)) as u8;
            texels.extend_from_slice(&[r, g, 0x80, 0xFF]);
        }
    }

    let mut pixels = PixelData::new(RasterFormat::R8888, 32, ColorOrdering::Rgba);
    pixels.push_mipmap(MipmapLayer::new(width, height, texels));
    pixels
}
