//! PNG and friends for texture levels

use std::path::Path;

use image::{ImageFormat, RgbaImage};

use crate::codec::CodecContext;
use crate::error::{BinaryError, Result};
use crate::objects::TextureBase;
use crate::pixel::{
    ColorOrdering, MipmapLayer, PixelData, RasterFormat, RasterLayout, calculate_has_alpha, convert_pixel_data,
};

/// Decode one mipmap level into an RGBA image
pub fn mipmap_to_rgba_image(pixels: &PixelData, level: usize) -> Result<RgbaImage> {
    let layer = pixels.mipmaps.get(level).ok_or_else(|| {
        BinaryError::invalid_data(format!("mipmap level {} out of range ({})", level, pixels.mipmap_count()))
    })?;

    let mut single = pixels.clone();
    single.mipmaps = vec![layer.clone()];
    let rgba = convert_pixel_data(&single, &RasterLayout::new(RasterFormat::R8888, 32, ColorOrdering::Rgba, 1))?;
    let converted = rgba
        .mipmaps
        .first()
        .ok_or_else(|| BinaryError::invalid_data("conversion produced no mipmap"))?;

    // Encoded rows may be wider than the visible layer
    let (width, height) = (converted.layer_width, converted.layer_height);
    let row_size = converted.width as usize * 4;
    let mut texels = Vec::with_capacity(width as usize * height as usize * 4);
    for y in 0..height as usize {
        let start = y * row_size;
        let row = converted
            .texels
            .get(start..start + width as usize * 4)
            .ok_or_else(|| BinaryError::not_enough_data(start + width as usize * 4, converted.texels.len()))?;
        texels.extend_from_slice(row);
    }

    RgbaImage::from_raw(width, height, texels)
        .ok_or_else(|| BinaryError::invalid_data("texel buffer does not match the image size"))
}

/// Single level 8888 RGBA pixel data from an image
pub fn pixel_data_from_rgba_image(image: &RgbaImage) -> PixelData {
    let (width, height) = image.dimensions();
    let mut pixels = PixelData::new(RasterFormat::R8888, 32, ColorOrdering::Rgba);
    pixels.push_mipmap(MipmapLayer::new(width, height, image.as_raw().clone()));
    pixels.has_alpha = calculate_has_alpha(&pixels).unwrap_or(true);
    pixels.is_newly_allocated = true;
    pixels
}

/// Texture export utility
pub struct TextureExporter;

impl TextureExporter {
    pub fn export_png<P: AsRef<Path>>(image: &RgbaImage, path: P) -> Result<()> {
        Self::export_with_format(image, path, ImageFormat::Png)
    }

    /// Pick the format from the file extension, PNG when unknown
    pub fn export_auto<P: AsRef<Path>>(image: &RgbaImage, path: P) -> Result<()> {
        let format = ImageFormat::from_path(path.as_ref()).unwrap_or(ImageFormat::Png);
        Self::export_with_format(image, path, format)
    }

    pub fn export_with_format<P: AsRef<Path>>(image: &RgbaImage, path: P, format: ImageFormat) -> Result<()> {
        image.save_with_format(path, format).map_err(|e| match e {
            image::ImageError::IoError(io) => BinaryError::Io(io),
            other => BinaryError::unsupported(format!("failed to save image as {:?}: {}", format, other)),
        })
    }

    /// Write one level of a texture's raster
    pub fn export_texture<P: AsRef<Path>>(
        texture: &TextureBase,
        level: usize,
        path: P,
        ctx: &CodecContext<'_>,
    ) -> Result<()> {
        let raster = texture
            .raster()
            .ok_or_else(|| BinaryError::invalid_data(format!("texture '{}' has no raster", texture.name())))?;
        let pixels = raster.get_pixel_data(ctx)?;
        let image = mipmap_to_rgba_image(&pixels, level)?;
        Self::export_auto(&image, path)
    }

    /// Load an image file as single level pixel data
    pub fn import_image<P: AsRef<Path>>(path: P) -> Result<PixelData> {
        let image = image::open(path.as_ref()).map_err(|e| match e {
            image::ImageError::IoError(io) => BinaryError::Io(io),
            other => BinaryError::invalid_format(format!("cannot decode {}: {}", path.as_ref().display(), other)),
        })?;
        Ok(pixel_data_from_rgba_image(&image.to_rgba8()))
    }

    /// File name for an exported texture, unsafe characters replaced
    pub fn create_filename(base_name: &str, extension: &str) -> String {
        let clean: String = base_name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        let clean = if clean.is_empty() { "texture".to_string() } else { clean };
        format!("{}.{}", clean, extension.to_ascii_lowercase())
    }
}
