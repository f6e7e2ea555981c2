//! RenderWare Texture Dictionaries
//!
//! Read, write and transcode RenderWare `.txd` files.
//!
//! This crate bundles the core types (library versions, configuration,
//! diagnostics) and the binary layer (chunk stream, pixel model, native
//! texture codecs) behind one import.
//!
//! # Features
//!
//! - **Direct3D 8/9**: linear surfaces, DXT1-5, palettes, cube textures
//! - **PlayStation 2**: GS memory layout, swizzling, CLUT permutation
//! - **PowerVR**: PVRTC 2bpp/4bpp (enable with the `pvr` feature)
//! - **Image export**: PNG helpers (enable with the `image-export` feature)
//!
//! # Examples
//!
//! ## Inspecting a dictionary
//!
//! ```rust,no_run
//! use rw_txd::{EngineConfig, TxdSerializer};
//!
//! let serializer = TxdSerializer::new(EngineConfig::default());
//! let dictionary = serializer.load_from_file("particle.txd")?;
//!
//! for texture in dictionary.textures() {
//!     println!("{} ({:?})", texture.name(), texture.raster().map(|r| r.format_string()));
//! }
//!
//! # Ok::<(), rw_txd::BinaryError>(())
//! ```
//!
//! ## Moving a dictionary to another platform
//!
//! ```rust,no_run
//! use rw_txd::{EngineConfig, TxdSerializer, convert_dictionary};
//!
//! let serializer = TxdSerializer::new(EngineConfig::default());
//! let mut dictionary = serializer.load_from_file("vehicle.txd")?;
//! convert_dictionary(&mut dictionary, "PlayStation2", serializer.registry(), &serializer.context())?;
//! serializer.save_to_file(&dictionary, "vehicle_ps2.txd")?;
//!
//! # Ok::<(), rw_txd::BinaryError>(())
//! ```

// Re-export from core crate
pub use rw_txd_core::{
    BlockLengthMode, CollectingWarnings, CoreError, Diagnostics, DxtRuntime, EngineConfig, LibraryVersion,
    PaletteRuntime, TracingWarnings, WarningSink, constants::*,
};

// Re-export from binary crate
pub use rw_txd_binary::{
    BinaryError, CodecCapabilities, CodecContext, CodecRegistry, ColorOrdering, CompressionType, ErrorSeverity,
    ExtensionBlock, Extensions, FailedTexture, MipmapLayer, NativeTexture, NativeTextureCodec, PaletteType,
    PixelData, Raster, RasterFormat, Result, SizeRules, TexDictionary, TextureBase, TxdSerializer, default_registry,
    read_txd, write_txd,
};
pub use rw_txd_binary::{chunk, codec, native, pixel};

#[cfg(feature = "image-export")]
pub use rw_txd_binary::{TextureExporter, mipmap_to_rgba_image, pixel_data_from_rgba_image};

use std::sync::Arc;

/// Move every raster of a dictionary onto the named platform
///
/// Returns the number of rasters that changed platform. The dictionary's
/// stored recommended driver follows the new platform.
pub fn convert_dictionary(
    dictionary: &mut TexDictionary,
    platform: &str,
    registry: &CodecRegistry,
    ctx: &CodecContext<'_>,
) -> Result<usize> {
    let target = registry.require(platform)?;
    let mut converted = 0;
    for texture in dictionary.textures() {
        let Some(raster) = texture.raster() else {
            continue;
        };
        if raster.platform_name() == target.name() {
            continue;
        }
        raster.convert_to(Arc::clone(&target), ctx).map_err(|err| {
            BinaryError::codec(target.name(), format!("texture '{}': {}", texture.name(), err))
        })?;
        converted += 1;
    }
    dictionary.set_stored_recommended_driver(target.driver_id());
    tracing::info!("converted {} rasters to {}", converted, target.name());
    Ok(converted)
}

/// Environment for working with many dictionaries at once
pub mod environment {
    use crate::{BinaryError, Result, TexDictionary, TextureBase, TxdSerializer};
    use std::collections::BTreeMap;
    use std::path::{Path, PathBuf};

    /// Every dictionary found under one or more paths
    pub struct Environment<'a> {
        serializer: TxdSerializer<'a>,
        dictionaries: BTreeMap<PathBuf, TexDictionary>,
        failures: Vec<(PathBuf, String)>,
    }

    impl<'a> Environment<'a> {
        pub fn new(serializer: TxdSerializer<'a>) -> Self {
            Self {
                serializer,
                dictionaries: BTreeMap::new(),
                failures: Vec::new(),
            }
        }

        /// Load a `.txd` file or every one below a directory
        pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
            let path = path.as_ref();
            if path.is_dir() {
                self.traverse_directory(path)
            } else {
                self.load_file(path)
            }
        }

        pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
            let path = path.as_ref();
            let dictionary = self.serializer.load_from_file(path)?;
            self.dictionaries.insert(path.to_path_buf(), dictionary);
            Ok(())
        }

        fn traverse_directory(&mut self, dir: &Path) -> Result<()> {
            let mut entries = std::fs::read_dir(dir)?.collect::<std::io::Result<Vec<_>>>()?;
            entries.sort_by_key(|entry| entry.path());

            for entry in entries {
                let path = entry.path();
                if path.is_dir() {
                    self.traverse_directory(&path)?;
                } else if is_txd_path(&path) {
                    // One unreadable file does not stop the scan
                    if let Err(err) = self.load_file(&path) {
                        tracing::warn!("failed to load {}: {}", path.display(), err);
                        self.failures.push((path, err.to_string()));
                    }
                }
            }
            Ok(())
        }

        pub fn dictionaries(&self) -> &BTreeMap<PathBuf, TexDictionary> {
            &self.dictionaries
        }

        pub fn failures(&self) -> &[(PathBuf, String)] {
            &self.failures
        }

        pub fn serializer(&self) -> &TxdSerializer<'a> {
            &self.serializer
        }

        /// All textures with the file they came from
        pub fn textures(&self) -> impl Iterator<Item = (&Path, &TextureBase)> {
            self.dictionaries
                .iter()
                .flat_map(|(path, dictionary)| dictionary.textures().iter().map(move |t| (path.as_path(), t)))
        }

        /// First texture with the given name, case-insensitive
        pub fn find_texture(&self, name: &str) -> Option<(&Path, &TextureBase)> {
            self.dictionaries
                .iter()
                .find_map(|(path, dictionary)| dictionary.find_texture(name).map(|t| (path.as_path(), t)))
        }

        /// Write every dictionary back to the path it was loaded from
        pub fn save_all(&self) -> Result<()> {
            for (path, dictionary) in &self.dictionaries {
                self.serializer.save_to_file(dictionary, path).map_err(|err| {
                    BinaryError::invalid_data(format!("failed to save {}: {}", path.display(), err))
                })?;
            }
            Ok(())
        }
    }

    fn is_txd_path(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("txd"))
    }
}

#[cfg(test)]
mod tests {
    use super::environment::Environment;
    use super::*;

    fn sample_dictionary(platform: &str) -> TexDictionary {
        let version = LibraryVersion::san_andreas();
        let raster = Raster::new(default_registry().require(platform).unwrap(), version);
        let mut pixels = PixelData::new(RasterFormat::R8888, 32, ColorOrdering::Rgba);
        pixels.push_mipmap(MipmapLayer::new(4, 4, vec![0x80; 64]));
        let serializer = TxdSerializer::default();
        raster.set_pixel_data(pixels, &serializer.context()).unwrap();

        let mut texture = TextureBase::new("grey", version);
        texture.set_raster(Some(raster));
        let mut dictionary = TexDictionary::new(version);
        dictionary.add_texture(texture);
        dictionary
    }

    #[test]
    fn test_convert_dictionary() {
        let serializer = TxdSerializer::default();
        let mut dictionary = sample_dictionary("Direct3D9");
        let changed =
            convert_dictionary(&mut dictionary, "playstation2", serializer.registry(), &serializer.context()).unwrap();
        assert_eq!(changed, 1);
        assert_eq!(dictionary.recommended_platform(), Some("PlayStation2"));

        // Already there
        let changed =
            convert_dictionary(&mut dictionary, "PlayStation2", serializer.registry(), &serializer.context()).unwrap();
        assert_eq!(changed, 0);
        assert!(convert_dictionary(&mut dictionary, "Dreamcast", serializer.registry(), &serializer.context()).is_err());
    }

    #[test]
    fn test_environment_scans_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("models");
        std::fs::create_dir(&nested).unwrap();

        let serializer = TxdSerializer::default();
        serializer.save_to_file(&sample_dictionary("Direct3D9"), dir.path().join("a.txd")).unwrap();
        serializer.save_to_file(&sample_dictionary("Direct3D8"), nested.join("B.TXD")).unwrap();
        std::fs::write(nested.join("broken.txd"), b"not a dictionary").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let mut environment = Environment::new(TxdSerializer::default());
        environment.load(dir.path()).unwrap();
        assert_eq!(environment.dictionaries().len(), 2);
        assert_eq!(environment.failures().len(), 1);
        assert_eq!(environment.textures().count(), 2);
        assert!(environment.find_texture("GREY").is_some());
    }
}
