//! Native texture codec interface
//!
//! Every platform backend implements [`NativeTextureCodec`]. The codec is
//! stateless; per-texture state lives in a boxed [`NativeTexture`] created
//! by the codec and downcast back by it on every call.

mod registry;

pub use registry::{CodecRegistry, default_registry};

use std::any::Any;
use std::fmt;

use rw_txd_core::{Diagnostics, EngineConfig, LibraryVersion};
use serde::{Deserialize, Serialize};

use crate::chunk::{BlockReader, BlockWriter};
use crate::error::{BinaryError, Result};
use crate::pixel::{
    CompressionType, PaletteType, PixelData, RasterFormat, RawMipmapLayer, SizeRules, TexFormatInfo,
};

/// Outcome of probing a texture block
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CompatibilityResult {
    None,
    Maybe,
    Absolute,
}

/// What a codec can store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecCapabilities {
    pub compressions: Vec<CompressionType>,
    pub palette_types: Vec<PaletteType>,
    pub supports_cube_textures: bool,
    pub row_alignment: u32,
    pub max_mipmaps: Option<usize>,
    /// Pixel data is stored compressed by the format itself (PVRTC)
    pub is_compressed_format: bool,
}

impl CodecCapabilities {
    pub fn supports_compression(&self, compression: CompressionType) -> bool {
        compression == CompressionType::None || self.compressions.contains(&compression)
    }

    pub fn supports_palette(&self) -> bool {
        !self.palette_types.is_empty()
    }
}

/// Name and sampling state stored alongside the native pixels
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureProperties {
    pub name: String,
    pub mask_name: String,
    pub format_info: TexFormatInfo,
}

/// Per-call state shared with codecs
#[derive(Clone, Copy)]
pub struct CodecContext<'a> {
    pub config: &'a EngineConfig,
    pub diagnostics: &'a Diagnostics,
}

impl<'a> CodecContext<'a> {
    pub fn new(config: &'a EngineConfig, diagnostics: &'a Diagnostics) -> Self {
        Self { config, diagnostics }
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.diagnostics.push_warning(message);
    }

    pub fn version(&self) -> LibraryVersion {
        self.config.version
    }
}

/// Codec specific texture state
pub trait NativeTexture: Any + Send + Sync + fmt::Debug {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn clone_box(&self) -> Box<dyn NativeTexture>;
}

impl Clone for Box<dyn NativeTexture> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Implement [`NativeTexture`] for a `Clone` type
#[macro_export]
macro_rules! impl_native_texture {
    ($ty:ty) => {
        impl $crate::codec::NativeTexture for $ty {
            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }
            fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
                self
            }
            fn clone_box(&self) -> Box<dyn $crate::codec::NativeTexture> {
                Box::new(self.clone())
            }
        }
    };
}

/// Borrow the concrete native texture of a codec
pub fn downcast_native<'a, T: NativeTexture>(native: &'a dyn NativeTexture, codec: &str) -> Result<&'a T> {
    native
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| BinaryError::codec(codec, "native texture belongs to another codec"))
}

/// Mutably borrow the concrete native texture of a codec
pub fn downcast_native_mut<'a, T: NativeTexture>(
    native: &'a mut dyn NativeTexture,
    codec: &str,
) -> Result<&'a mut T> {
    native
        .as_any_mut()
        .downcast_mut::<T>()
        .ok_or_else(|| BinaryError::codec(codec, "native texture belongs to another codec"))
}

/// Platform native texture backend
pub trait NativeTextureCodec: Send + Sync {
    /// Registry name, e.g. "Direct3D9"
    fn name(&self) -> &'static str;

    /// Driver identifier stored in dictionaries
    fn driver_id(&self) -> u16;

    fn capabilities(&self) -> CodecCapabilities;

    /// Fresh, empty native texture
    fn create_native(&self, version: LibraryVersion) -> Box<dyn NativeTexture>;

    /// Probe the texture native payload without consuming it
    fn is_compatible_block(&self, reader: &mut BlockReader<'_>) -> Result<CompatibilityResult>;

    /// Read the texture native payload (the stream is inside TEXTURENATIVE)
    fn deserialize(
        &self,
        reader: &mut BlockReader<'_>,
        version: LibraryVersion,
        ctx: &CodecContext<'_>,
    ) -> Result<(Box<dyn NativeTexture>, TextureProperties)>;

    /// Write the texture native payload (the writer is inside TEXTURENATIVE)
    fn serialize(
        &self,
        native: &dyn NativeTexture,
        properties: &TextureProperties,
        writer: &mut BlockWriter<'_>,
        ctx: &CodecContext<'_>,
    ) -> Result<()>;

    fn get_pixel_data(&self, native: &dyn NativeTexture, ctx: &CodecContext<'_>) -> Result<PixelData>;

    /// Store pixels; returns whether the buffers were adopted without conversion
    fn set_pixel_data(&self, native: &mut dyn NativeTexture, pixels: PixelData, ctx: &CodecContext<'_>)
    -> Result<bool>;

    fn unset_pixel_data(&self, native: &mut dyn NativeTexture) -> Result<()>;

    fn mipmap_count(&self, native: &dyn NativeTexture) -> usize;

    fn get_mipmap_layer(&self, native: &dyn NativeTexture, index: usize) -> Result<RawMipmapLayer>;

    /// Append a level; returns whether the buffer was adopted without conversion
    fn add_mipmap_layer(&self, native: &mut dyn NativeTexture, layer: RawMipmapLayer, ctx: &CodecContext<'_>)
    -> Result<bool>;

    fn clear_mipmaps(&self, native: &mut dyn NativeTexture) -> Result<()>;

    /// Base level size
    fn size(&self, native: &dyn NativeTexture) -> (u32, u32);

    fn size_rules(&self, native: &dyn NativeTexture) -> SizeRules;

    fn format_string(&self, native: &dyn NativeTexture) -> String;

    fn raster_format(&self, native: &dyn NativeTexture) -> RasterFormat;

    fn palette_type(&self, native: &dyn NativeTexture) -> PaletteType;

    fn compression(&self, native: &dyn NativeTexture) -> CompressionType;

    fn is_compressed(&self, native: &dyn NativeTexture) -> bool {
        self.compression(native).is_compressed()
    }

    fn has_alpha(&self, native: &dyn NativeTexture) -> bool;

    fn version(&self, native: &dyn NativeTexture) -> LibraryVersion;

    fn set_version(&self, native: &mut dyn NativeTexture, version: LibraryVersion);
}

impl fmt::Debug for dyn NativeTextureCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeTextureCodec")
            .field("name", &self.name())
            .field("driver_id", &self.driver_id())
            .finish()
    }
}

/// Mipmap level lookup shared by the codecs
pub(crate) fn layer_at<'a, T>(layers: &'a [T], index: usize, codec: &str) -> Result<&'a T> {
    layers
        .get(index)
        .ok_or_else(|| BinaryError::codec(codec, format!("mipmap level {} out of range ({})", index, layers.len())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Dummy(u32);
    impl_native_texture!(Dummy);

    #[derive(Debug, Clone)]
    struct Other;
    impl_native_texture!(Other);

    #[test]
    fn test_downcast_and_clone() {
        let boxed: Box<dyn NativeTexture> = Box::new(Dummy(7));
        let copy = boxed.clone();
        assert_eq!(downcast_native::<Dummy>(copy.as_ref(), "test").unwrap(), &Dummy(7));
        assert!(downcast_native::<Other>(boxed.as_ref(), "test").is_err());
    }

    #[test]
    fn test_layer_lookup() {
        let layers = vec![Dummy(1), Dummy(2)];
        // The layer outlives the codec name it was looked up with
        let found = {
            let codec = String::from("Direct3D9");
            layer_at(&layers, 1, &codec).unwrap()
        };
        assert_eq!(found, &Dummy(2));
        let err = layer_at(&layers, 2, "Direct3D9").unwrap_err();
        assert!(err.to_string().contains("mipmap level 2 out of range (2)"));
    }

    #[test]
    fn test_compatibility_ordering() {
        assert!(CompatibilityResult::Absolute > CompatibilityResult::Maybe);
        assert!(CompatibilityResult::Maybe > CompatibilityResult::None);
    }
}
