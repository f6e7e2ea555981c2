//! Shared raster: a native texture plus the codec that owns it

use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use rw_txd_core::LibraryVersion;

use crate::codec::{CodecContext, NativeTexture, NativeTextureCodec};
use crate::error::{BinaryError, Result};
use crate::pixel::{
    ColorOrdering, CompressionType, PaletteType, PixelData, RasterFormat, RawMipmapLayer, SizeRules,
    decompress_pixel_data, palettize_pixel_data,
};

struct RasterState {
    codec: Arc<dyn NativeTextureCodec>,
    native: Box<dyn NativeTexture>,
}

/// Pixel storage shared between textures
///
/// Rasters are handed out as `Arc<Raster>`; the native texture sits behind
/// a `RwLock` so queries run concurrently while mutations are exclusive.
pub struct Raster {
    state: RwLock<RasterState>,
}

impl fmt::Debug for Raster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read();
        f.debug_struct("Raster")
            .field("platform", &state.codec.name())
            .field("size", &state.codec.size(state.native.as_ref()))
            .field("mipmaps", &state.codec.mipmap_count(state.native.as_ref()))
            .finish()
    }
}

impl Clone for Raster {
    /// Deep copy of the native data
    fn clone(&self) -> Self {
        let state = self.read();
        Self {
            state: RwLock::new(RasterState {
                codec: state.codec.clone(),
                native: state.native.clone(),
            }),
        }
    }
}

impl Raster {
    /// Empty raster of the given platform
    pub fn new(codec: Arc<dyn NativeTextureCodec>, version: LibraryVersion) -> Arc<Self> {
        let native = codec.create_native(version);
        Self::from_native(codec, native)
    }

    /// Wrap a native texture produced by `codec`
    pub fn from_native(codec: Arc<dyn NativeTextureCodec>, native: Box<dyn NativeTexture>) -> Arc<Self> {
        Arc::new(Self {
            state: RwLock::new(RasterState { codec, native }),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, RasterState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, RasterState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Independent copy behind a new `Arc`
    pub fn deep_clone(&self) -> Arc<Self> {
        Arc::new(self.clone())
    }

    pub fn codec(&self) -> Arc<dyn NativeTextureCodec> {
        self.read().codec.clone()
    }

    pub fn platform_name(&self) -> &'static str {
        self.read().codec.name()
    }

    pub fn driver_id(&self) -> u16 {
        self.read().codec.driver_id()
    }

    /// Run `f` with the codec and its native texture
    pub fn with_native<T>(&self, f: impl FnOnce(&dyn NativeTextureCodec, &dyn NativeTexture) -> T) -> T {
        let state = self.read();
        f(state.codec.as_ref(), state.native.as_ref())
    }

    pub fn size(&self) -> (u32, u32) {
        self.with_native(|codec, native| codec.size(native))
    }

    pub fn mipmap_count(&self) -> usize {
        self.with_native(|codec, native| codec.mipmap_count(native))
    }

    pub fn format_string(&self) -> String {
        self.with_native(|codec, native| codec.format_string(native))
    }

    pub fn size_rules(&self) -> SizeRules {
        self.with_native(|codec, native| codec.size_rules(native))
    }

    pub fn has_alpha(&self) -> bool {
        self.with_native(|codec, native| codec.has_alpha(native))
    }

    pub fn is_compressed(&self) -> bool {
        self.with_native(|codec, native| codec.is_compressed(native))
    }

    pub fn compression(&self) -> CompressionType {
        self.with_native(|codec, native| codec.compression(native))
    }

    pub fn palette_type(&self) -> PaletteType {
        self.with_native(|codec, native| codec.palette_type(native))
    }

    pub fn raster_format(&self) -> RasterFormat {
        self.with_native(|codec, native| codec.raster_format(native))
    }

    pub fn version(&self) -> LibraryVersion {
        self.with_native(|codec, native| codec.version(native))
    }

    pub fn set_version(&self, version: LibraryVersion) {
        let mut state = self.write();
        let codec = state.codec.clone();
        codec.set_version(state.native.as_mut(), version);
    }

    pub fn get_pixel_data(&self, ctx: &CodecContext<'_>) -> Result<PixelData> {
        self.with_native(|codec, native| codec.get_pixel_data(native, ctx))
    }

    /// Replace the pixels; returns whether the codec adopted them unchanged
    pub fn set_pixel_data(&self, pixels: PixelData, ctx: &CodecContext<'_>) -> Result<bool> {
        let mut state = self.write();
        let codec = state.codec.clone();
        codec.set_pixel_data(state.native.as_mut(), pixels, ctx)
    }

    pub fn unset_pixel_data(&self) -> Result<()> {
        let mut state = self.write();
        let codec = state.codec.clone();
        codec.unset_pixel_data(state.native.as_mut())
    }

    pub fn get_mipmap_layer(&self, index: usize) -> Result<RawMipmapLayer> {
        self.with_native(|codec, native| codec.get_mipmap_layer(native, index))
    }

    pub fn add_mipmap_layer(&self, layer: RawMipmapLayer, ctx: &CodecContext<'_>) -> Result<bool> {
        let mut state = self.write();
        let codec = state.codec.clone();
        codec.add_mipmap_layer(state.native.as_mut(), layer, ctx)
    }

    pub fn clear_mipmaps(&self) -> Result<()> {
        let mut state = self.write();
        let codec = state.codec.clone();
        codec.clear_mipmaps(state.native.as_mut())
    }

    /// Move the pixels into a native texture of another platform
    ///
    /// Compressed pixels are decompressed first when the target cannot
    /// store their compression.
    pub fn convert_to(&self, target: Arc<dyn NativeTextureCodec>, ctx: &CodecContext<'_>) -> Result<()> {
        let mut state = self.write();
        if state.codec.name() == target.name() {
            return Ok(());
        }

        let version = state.codec.version(state.native.as_ref());
        let mut pixels = state.codec.get_pixel_data(state.native.as_ref(), ctx)?;
        if pixels.mipmaps.is_empty() {
            return Err(BinaryError::invalid_data("cannot convert a raster without pixels"));
        }

        let caps = target.capabilities();
        if pixels.is_compressed() && !caps.supports_compression(pixels.compression) {
            pixels = decompress_pixel_data(&pixels)?;
        }

        let mut native = target.create_native(version);
        target.set_pixel_data(native.as_mut(), pixels, ctx)?;
        tracing::debug!("converted raster from {} to {}", state.codec.name(), target.name());
        state.codec = target;
        state.native = native;
        Ok(())
    }

    /// Quantize the pixels to a palette of `palette_type`
    pub fn palettize(&self, palette_type: PaletteType, ctx: &CodecContext<'_>) -> Result<()> {
        let mut state = self.write();
        let codec = state.codec.clone();
        if !codec.capabilities().palette_types.contains(&palette_type) {
            return Err(BinaryError::unsupported(format!(
                "{} cannot store {} rasters",
                codec.name(),
                palette_type.name()
            )));
        }
        let pixels = codec.get_pixel_data(state.native.as_ref(), ctx)?;
        if pixels.palette_type == palette_type {
            return Ok(());
        }
        let source = if pixels.palette_type.is_palette() {
            crate::pixel::convert_pixel_data(
                &pixels,
                &crate::pixel::RasterLayout::new(RasterFormat::R8888, 32, ColorOrdering::Rgba, 4),
            )?
        } else {
            pixels
        };
        let quantized = palettize_pixel_data(&source, palette_type, RasterFormat::R8888, ColorOrdering::Rgba)?;
        codec.set_pixel_data(state.native.as_mut(), quantized, ctx)?;
        Ok(())
    }
}
