//! Texture dictionary (de)serializer
//!
//! Stream layout:
//!
//! ```text
//! TEXDICTIONARY
//!   STRUCT          u32 count (<= 3.5) | u16 count + u16 recommended driver
//!   TEXTURENATIVE   codec payload, then an optional EXTENSION
//!   ...
//!   EXTENSION       dictionary plugin blocks
//! ```
//!
//! Each texture is read in isolation: a texture whose codec fails is
//! recorded as a [`FailedTexture`] and the stream continues at the declared
//! end of its block. Only when the position cannot be restored (declared
//! lengths are ignored) does the whole load fail.

use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

use rw_txd_core::{
    BlockLengthMode, CHUNK_EXTENSION, CHUNK_HEADER_SIZE, CHUNK_STRUCT, CHUNK_TEXDICTIONARY, CHUNK_TEXTURENATIVE, Diagnostics,
    EngineConfig, LibraryVersion, driver,
};

use crate::chunk::{BlockReader, BlockWriter, ChunkReader, ChunkWriter, ReadSeek, WriteSeek};
use crate::codec::{CodecContext, CodecRegistry, default_registry};
use crate::error::{BinaryError, Result};
use crate::extensions::Extensions;
use crate::objects::{FailedTexture, Raster, TexDictionary, TextureBase};

/// Reads and writes texture dictionaries against a codec registry
pub struct TxdSerializer<'a> {
    registry: &'a CodecRegistry,
    config: EngineConfig,
    diagnostics: Diagnostics,
}

impl Default for TxdSerializer<'static> {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl TxdSerializer<'static> {
    /// Serializer over every codec compiled into this build
    pub fn new(config: EngineConfig) -> Self {
        Self::with_registry(default_registry(), config)
    }
}

impl<'a> TxdSerializer<'a> {
    pub fn with_registry(registry: &'a CodecRegistry, config: EngineConfig) -> Self {
        let diagnostics = config.diagnostics();
        Self {
            registry,
            config,
            diagnostics,
        }
    }

    /// Replace the diagnostics handle, e.g. to share one across calls
    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn registry(&self) -> &CodecRegistry {
        self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Context handed to codecs
    pub fn context(&self) -> CodecContext<'_> {
        CodecContext::new(&self.config, &self.diagnostics)
    }

    /// Read a dictionary from a seekable stream
    pub fn read<R: Read + Seek>(&self, mut source: R) -> Result<TexDictionary> {
        let source: &mut dyn ReadSeek = &mut source;
        let mut reader = ChunkReader::new(source, self.config.block_length_mode)?;
        let (_, dictionary) =
            reader.expect_block(CHUNK_TEXDICTIONARY, |r, header| self.read_dictionary_body(r, header.version))?;

        tracing::info!(
            "loaded texture dictionary: {} textures, {} failed, version {}, recommended platform {}",
            dictionary.texture_count(),
            dictionary.failed.len(),
            dictionary.version(),
            dictionary.recommended_platform().unwrap_or("none")
        );
        Ok(dictionary)
    }

    pub fn from_bytes(&self, data: &[u8]) -> Result<TexDictionary> {
        self.read(Cursor::new(data))
    }

    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> Result<TexDictionary> {
        let path = path.as_ref();
        tracing::debug!("reading {}", path.display());
        let file = std::fs::File::open(path)?;
        self.read(std::io::BufReader::new(file))
    }

    fn read_dictionary_body(&self, reader: &mut BlockReader<'_>, version: LibraryVersion) -> Result<TexDictionary> {
        let (_, (count, recommended)) = reader.expect_block(CHUNK_STRUCT, |r, _| {
            if version.supports_recommended_platform() {
                let count = r.read_u16()? as usize;
                let recommended = r.read_u16()?;
                Ok((count, recommended))
            } else {
                Ok((r.read_u32()? as usize, driver::NONE))
            }
        })?;
        tracing::debug!("dictionary declares {} textures, recommended driver {}", count, recommended);

        let mut dictionary = TexDictionary::new(version);
        dictionary.set_stored_recommended_driver(recommended);

        for index in 0..count {
            if reader.remaining()? < CHUNK_HEADER_SIZE {
                self.diagnostics.push_warning(format!(
                    "texture dictionary ends after {} of {} textures",
                    index, count
                ));
                break;
            }
            let start = reader.position()?;
            let header = reader.peek_header()?;
            if header.id == CHUNK_EXTENSION {
                self.diagnostics.push_warning(format!(
                    "texture dictionary ends after {} of {} textures",
                    index, count
                ));
                break;
            }
            // A block running past the dictionary cannot be skipped
            if self.config.block_length_mode == BlockLengthMode::Trust
                && start + header.total_size() > reader.current_end()
            {
                return Err(BinaryError::block_overrun(
                    start + CHUNK_HEADER_SIZE,
                    header.length as u64,
                    reader.current_end(),
                ));
            }

            match self.read_texture_entry(reader) {
                Ok(texture) => dictionary.push_loaded(texture),
                Err(err) if self.can_skip_after(&err) => {
                    self.diagnostics
                        .push_warning(format!("failed to load texture #{}: {}", index, err));
                    dictionary.failed.push(FailedTexture {
                        index,
                        name: None,
                        error: err.to_string(),
                    });
                }
                Err(err) => return Err(err),
            }
        }

        dictionary.extensions = match Extensions::read_optional(reader) {
            Ok(extensions) => extensions,
            Err(err) if self.can_skip_after(&err) => {
                self.diagnostics
                    .push_warning(format!("dropped unreadable dictionary extensions: {}", err));
                Extensions::new()
            }
            Err(err) => return Err(err),
        };
        Ok(dictionary)
    }

    /// Whether the stream is still positioned at a block boundary after `err`
    fn can_skip_after(&self, err: &BinaryError) -> bool {
        self.config.block_length_mode == BlockLengthMode::Trust
            && !matches!(err, BinaryError::MemoryError(_) | BinaryError::Io(_))
    }

    fn read_texture_entry(&self, reader: &mut BlockReader<'_>) -> Result<TextureBase> {
        let ctx = self.context();
        let (_, texture) = reader.expect_block(CHUNK_TEXTURENATIVE, |r, header| {
            let codec = self.registry.detect(r)?.ok_or_else(|| {
                BinaryError::unknown_platform("no registered native texture type accepts the texture block")
            })?;
            let (native, properties) = codec.deserialize(r, header.version, &ctx)?;
            tracing::debug!("texture '{}' decoded by {}", properties.name, codec.name());

            let extensions = match Extensions::read_optional(r) {
                Ok(extensions) => extensions,
                Err(err) => {
                    self.diagnostics.push_warning(format!(
                        "texture '{}' has unreadable extensions: {}",
                        properties.name, err
                    ));
                    Extensions::new()
                }
            };

            let raster = Raster::from_native(codec, native);
            Ok(TextureBase::from_properties(properties, raster, extensions))
        })?;

        let mut texture = texture;
        if self.config.fix_incompatible_rasters {
            texture.fix_filtering(&self.diagnostics);
        }
        Ok(texture)
    }

    /// Write a dictionary to a seekable sink
    pub fn write<W: Write + Seek>(&self, dictionary: &TexDictionary, mut sink: W) -> Result<()> {
        let version = dictionary.version();
        let sink: &mut dyn WriteSeek = &mut sink;
        let mut writer = ChunkWriter::new(sink, version);

        let textures: Vec<&TextureBase> = dictionary
            .textures()
            .iter()
            .filter(|texture| {
                if texture.raster().is_none() {
                    self.diagnostics
                        .push_warning(format!("texture '{}' has no raster and is not written", texture.name()));
                    false
                } else {
                    true
                }
            })
            .collect();

        writer.with_block(CHUNK_TEXDICTIONARY, |w| {
            w.with_block(CHUNK_STRUCT, |s| {
                if version.supports_recommended_platform() {
                    let count = u16::try_from(textures.len()).map_err(|_| {
                        BinaryError::invalid_data(format!(
                            "{} textures exceed the dictionary limit of 65535",
                            textures.len()
                        ))
                    })?;
                    s.write_u16(count)?;
                    s.write_u16(dictionary.recommended_driver())
                } else {
                    s.write_u32(textures.len() as u32)
                }
            })?;

            for texture in &textures {
                self.write_texture_entry(texture, w)?;
            }
            dictionary.extensions.write(w)
        })?;
        writer.flush()?;

        tracing::info!(
            "wrote texture dictionary: {} textures, version {}",
            textures.len(),
            version
        );
        Ok(())
    }

    fn write_texture_entry(&self, texture: &TextureBase, writer: &mut BlockWriter<'_>) -> Result<()> {
        let raster = texture
            .raster()
            .ok_or_else(|| BinaryError::invalid_data(format!("texture '{}' has no raster", texture.name())))?;
        let ctx = self.context();
        let properties = texture.properties();
        writer.with_block(CHUNK_TEXTURENATIVE, |w| {
            raster.with_native(|codec, native| codec.serialize(native, &properties, w, &ctx))?;
            texture.extensions.write(w)
        })
    }

    pub fn to_bytes(&self, dictionary: &TexDictionary) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        self.write(dictionary, &mut cursor)?;
        Ok(cursor.into_inner())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, dictionary: &TexDictionary, path: P) -> Result<()> {
        let bytes = self.to_bytes(dictionary)?;
        std::fs::write(path.as_ref(), bytes)?;
        Ok(())
    }
}

/// Read a dictionary with the default codecs and configuration
pub fn read_txd(data: &[u8]) -> Result<TexDictionary> {
    TxdSerializer::default().from_bytes(data)
}

/// Write a dictionary with the default codecs and configuration
pub fn write_txd(dictionary: &TexDictionary) -> Result<Vec<u8>> {
    TxdSerializer::default().to_bytes(dictionary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::{ColorOrdering, MipmapLayer, PixelData, RasterFormat};

    fn gradient(width: u32, height: u32) -> PixelData {
        let mut texels = Vec::new();
        for y in 0..height {
            for x in 0..width {
                texels.extend_from_slice(&[x as u8 * 16, y as u8 * 16, 0x40, 0xFF]);
            }
        }
        let mut pixels = PixelData::new(RasterFormat::R8888, 32, ColorOrdering::Bgra);
        pixels.push_mipmap(MipmapLayer::new(width, height, texels));
        pixels
    }

    fn dictionary_with(serializer: &TxdSerializer<'_>, platforms: &[&str]) -> TexDictionary {
        let version = LibraryVersion::san_andreas();
        let mut dictionary = TexDictionary::new(version);
        for (i, platform) in platforms.iter().enumerate() {
            let codec = serializer.registry().require(platform).unwrap();
            let raster = Raster::new(codec, version);
            raster.set_pixel_data(gradient(8, 8), &serializer.context()).unwrap();
            let mut texture = TextureBase::new(format!("tex{}", i), version);
            texture.set_raster(Some(raster));
            dictionary.add_texture(texture);
        }
        dictionary
    }

    #[test]
    fn test_empty_dictionary_round_trip() {
        let serializer = TxdSerializer::default();
        let mut dictionary = TexDictionary::new(LibraryVersion::san_andreas());
        dictionary.set_stored_recommended_driver(driver::D3D9);
        let bytes = serializer.to_bytes(&dictionary).unwrap();
        // root + struct(4) + empty extension
        assert_eq!(bytes.len(), 12 + 12 + 4 + 12);

        let read = serializer.from_bytes(&bytes).unwrap();
        assert_eq!(read.texture_count(), 0);
        assert_eq!(read.recommended_driver(), driver::D3D9);
    }

    #[test]
    fn test_recommended_platform_needs_agreement() {
        let serializer = TxdSerializer::default();
        let same = dictionary_with(&serializer, &["Direct3D9", "Direct3D9"]);
        assert_eq!(same.recommended_driver(), driver::D3D9);

        let mixed = dictionary_with(&serializer, &["Direct3D9", "Direct3D8"]);
        assert_eq!(mixed.recommended_driver(), driver::NONE);

        let bytes = serializer.to_bytes(&mixed).unwrap();
        // count, then the driver word
        assert_eq!(&bytes[24..28], &[2, 0, 0, 0]);
        let read = serializer.from_bytes(&bytes).unwrap();
        assert_eq!(read.texture_count(), 2);
        assert_eq!(read.textures()[1].raster().unwrap().platform_name(), "Direct3D8");
    }

    #[test]
    fn test_old_versions_store_a_plain_count() {
        let serializer = TxdSerializer::default();
        let mut dictionary = dictionary_with(&serializer, &["Direct3D8"]);
        dictionary.set_engine_version(LibraryVersion::new(3, 4, 0, 3));
        let bytes = serializer.to_bytes(&dictionary).unwrap();
        assert_eq!(&bytes[24..28], &[1, 0, 0, 0]);

        let read = serializer.from_bytes(&bytes).unwrap();
        assert_eq!(read.version(), LibraryVersion::new(3, 4, 0, 3));
        assert_eq!(read.textures()[0].name(), "tex0");
    }

    #[test]
    fn test_texture_without_raster_is_skipped() {
        let serializer = TxdSerializer::default();
        let mut dictionary = dictionary_with(&serializer, &["Direct3D9"]);
        dictionary.add_texture(TextureBase::new("empty", LibraryVersion::san_andreas()));
        let read = serializer.from_bytes(&serializer.to_bytes(&dictionary).unwrap()).unwrap();
        assert_eq!(read.texture_count(), 1);
        assert!(serializer
            .diagnostics()
            .warnings()
            .iter()
            .any(|w| w.contains("'empty' has no raster")));
    }
}
