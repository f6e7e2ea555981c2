//! RenderWare Texture Dictionary Parser
//!
//! This crate reads and writes RenderWare texture dictionaries (`.txd`) and
//! transcodes their platform native textures:
//! - Direct3D 8 / Direct3D 9 (linear surfaces, DXT1-5, palettes)
//! - PlayStation 2 Graphics Synthesizer (GIF packets, swizzled memory, CLUTs)
//! - PowerVR (PVRTC 2bpp/4bpp)
//!
//! # Features
//!
//! - **Chunk stream**: bounds checked nested block reader and writer
//! - **Pixel model**: one canonical raster description every codec converts through
//! - **Failure isolation**: a broken texture becomes a placeholder, the rest of the dictionary loads
//! - **Round trip fidelity**: unknown extension blocks are written back verbatim
//!
//! ## Feature Flags
//!
//! - `texture-advanced`: DXT decompression and PVRTC decoding through texture2ddecoder
//! - `pvr`: PowerVR native texture codec (requires `texture-advanced`)
//! - `image-export`: PNG import/export helpers based on the `image` crate
//!
//! # Example
//!
//! ```rust,no_run
//! use rw_txd_binary::TxdSerializer;
//! use rw_txd_core::EngineConfig;
//!
//! let serializer = TxdSerializer::new(EngineConfig::default());
//! let dictionary = serializer.load_from_file("vehicle.txd")?;
//!
//! for texture in dictionary.textures() {
//!     if let Some(raster) = texture.raster() {
//!         let (width, height) = raster.size();
//!         println!(
//!             "{}: {} {}x{} {}",
//!             texture.name(),
//!             raster.platform_name(),
//!             width,
//!             height,
//!             raster.format_string()
//!         );
//!     }
//! }
//! for warning in serializer.diagnostics().warnings() {
//!     eprintln!("warning: {}", warning);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Core modules (always available)
pub mod chunk;
pub mod codec;
pub mod error;
pub mod extensions;
pub mod native;
pub mod objects;
pub mod pixel;
pub mod txd;

// Feature-gated modules
#[cfg(feature = "image-export")]
pub mod helpers;

// Re-export core types (always available)
pub use chunk::{BlockReader, BlockWriter, ChunkHeader, ChunkReader, ChunkWriter};
pub use codec::{
    CodecCapabilities, CodecContext, CodecRegistry, CompatibilityResult, NativeTexture, NativeTextureCodec,
    TextureProperties, default_registry,
};
pub use error::{BinaryError, ErrorSeverity, Result};
pub use extensions::{ExtensionBlock, Extensions, SkyMipmap};
pub use native::{D3D8Codec, D3D9Codec, NativeTextureD3D8, NativeTextureD3D9, NativeTexturePS2, Ps2Codec};
pub use objects::{FailedTexture, Raster, TexDictionary, TextureBase};
pub use pixel::{
    ColorOrdering, CompressionType, MipmapLayer, PaletteType, PixelData, RasterFormat, RawMipmapLayer, SizeRules,
};
pub use txd::{TxdSerializer, read_txd, write_txd};

// Re-export feature-gated types
#[cfg(feature = "pvr")]
pub use native::{NativeTexturePVR, PvrCodec};

#[cfg(feature = "image-export")]
pub use helpers::{TextureExporter, mipmap_to_rgba_image, pixel_data_from_rgba_image};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_contents() {
        let names = default_registry().names();
        assert!(names.contains(&"Direct3D8"));
        assert!(names.contains(&"Direct3D9"));
        assert!(names.contains(&"PlayStation2"));
        #[cfg(feature = "pvr")]
        assert!(names.contains(&"PowerVR"));
    }
}
