//! Texture Dictionary Container Tests
//!
//! Synthetic dictionaries built byte by byte: loading, failure isolation,
//! codec detection order, extension passthrough and file round trips.

use std::io::Cursor;
use std::sync::Arc;

use rw_txd_binary::chunk::{ChunkReader, ReadSeek};
use rw_txd_binary::codec::{CodecCapabilities, CodecContext, CompatibilityResult, NativeTexture, TextureProperties};
use rw_txd_binary::{
    BinaryError, BlockReader, BlockWriter, CodecRegistry, ColorOrdering, CompressionType, ExtensionBlock,
    MipmapLayer, NativeTextureCodec, PaletteType, PixelData, Raster, RasterFormat, RawMipmapLayer, Result,
    SizeRules, TexDictionary, TextureBase, TxdSerializer,
};
use rw_txd_core::{
    BlockLengthMode, CHUNK_EXTENSION, CHUNK_STRUCT, CHUNK_TEXDICTIONARY, CHUNK_TEXTURENATIVE, EngineConfig,
    LibraryVersion, driver,
};

const D3DFMT_A8R8G8B8: u32 = 21;
const RASTER_FORMAT_8888: u32 = 0x0500;

fn stamp() -> u32 {
    LibraryVersion::san_andreas().to_stamp()
}

fn block(id: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(12 + payload.len());
    out.extend_from_slice(&id.to_le_bytes());
    out.extend_from_slice(&stamp().to_le_bytes());
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    out
}

fn fixed_name(name: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[..name.len()].copy_from_slice(name.as_bytes());
    out
}

/// TEXTURENATIVE holding an uncompressed 8888 Direct3D 9 texture
fn d3d9_texture(name: &str, width: u16, height: u16, texels: &[u8]) -> Vec<u8> {
    let mut meta = Vec::new();
    meta.extend_from_slice(&9u32.to_le_bytes());
    meta.extend_from_slice(&0x1102u32.to_le_bytes());
    meta.extend_from_slice(&fixed_name(name));
    meta.extend_from_slice(&fixed_name(""));
    meta.extend_from_slice(&RASTER_FORMAT_8888.to_le_bytes());
    meta.extend_from_slice(&D3DFMT_A8R8G8B8.to_le_bytes());
    meta.extend_from_slice(&width.to_le_bytes());
    meta.extend_from_slice(&height.to_le_bytes());
    meta.extend_from_slice(&[32, 1, 4, 0]);
    assert_eq!(meta.len(), 88);
    meta.extend_from_slice(&(texels.len() as u32).to_le_bytes());
    meta.extend_from_slice(texels);

    let mut payload = block(CHUNK_STRUCT, &meta);
    payload.extend(block(CHUNK_EXTENSION, &[]));
    block(CHUNK_TEXTURENATIVE, &payload)
}

fn dictionary(entries: &[Vec<u8>], recommended: u16, extensions: &[u8]) -> Vec<u8> {
    let mut meta = Vec::new();
    meta.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    meta.extend_from_slice(&recommended.to_le_bytes());

    let mut payload = block(CHUNK_STRUCT, &meta);
    for entry in entries {
        payload.extend_from_slice(entry);
    }
    payload.extend(block(CHUNK_EXTENSION, extensions));
    block(CHUNK_TEXDICTIONARY, &payload)
}

fn checker(width: u32, height: u32) -> Vec<u8> {
    let mut texels = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            let alpha = if (x + y) % 2 == 0 { 0xFF } else { 0x40 };
            texels.extend_from_slice(&[x as u8, y as u8, 0x80, alpha]);
        }
    }
    texels
}

#[test]
fn test_minimal_d3d9_8888_texture() {
    let bytes = dictionary(&[d3d9_texture("checker", 64, 64, &checker(64, 64))], driver::D3D9, &[]);
    let serializer = TxdSerializer::default();
    let dictionary = serializer.from_bytes(&bytes).unwrap();

    assert_eq!(dictionary.texture_count(), 1);
    assert!(dictionary.failed.is_empty());
    assert_eq!(dictionary.recommended_driver(), driver::D3D9);

    let texture = dictionary.find_texture("CHECKER").unwrap();
    let raster = texture.raster().unwrap();
    assert_eq!(raster.platform_name(), "Direct3D9");
    assert_eq!(raster.size(), (64, 64));

    let pixels = raster.get_pixel_data(&serializer.context()).unwrap();
    assert_eq!(pixels.depth, 32);
    assert_eq!(pixels.compression, CompressionType::None);
    assert!(pixels.has_alpha);
    assert_eq!(pixels.mipmaps.len(), 1);
    assert_eq!((pixels.mipmaps[0].width, pixels.mipmaps[0].height), (64, 64));
    assert!(serializer.diagnostics().warnings().is_empty(), "{:?}", serializer.diagnostics().warnings());
}

#[test]
fn test_opaque_content_has_no_alpha() {
    let texels: Vec<u8> = checker(8, 8)
        .chunks_exact(4)
        .flat_map(|p| [p[0], p[1], p[2], 0xFF])
        .collect();
    let bytes = dictionary(&[d3d9_texture("opaque", 8, 8, &texels)], driver::D3D9, &[]);
    let serializer = TxdSerializer::default();
    let dictionary = serializer.from_bytes(&bytes).unwrap();
    let pixels = dictionary.textures()[0]
        .raster()
        .unwrap()
        .get_pixel_data(&serializer.context())
        .unwrap();
    assert!(!pixels.has_alpha);
}

#[test]
fn test_leave_context_lands_on_declared_end() {
    const SENTINEL: u32 = 0xC0FF_EE11;
    let mut bytes = block(CHUNK_STRUCT, &[1, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0]);
    bytes.extend_from_slice(&SENTINEL.to_le_bytes());

    let mut cursor = Cursor::new(bytes);
    let source: &mut dyn ReadSeek = &mut cursor;
    let mut reader = ChunkReader::new(source, BlockLengthMode::Trust).unwrap();

    let result: Result<(_, ())> = reader.with_block(|r, _| {
        r.read_u32()?;
        Err(BinaryError::invalid_data("parse failure half way"))
    });
    assert!(result.is_err());
    assert_eq!(reader.position().unwrap(), 12 + 12);
    assert_eq!(reader.read_u32().unwrap(), SENTINEL);
}

#[test]
fn test_broken_texture_becomes_placeholder() {
    // Platform says Direct3D 9 but the meta header is cut short
    let broken = block(
        CHUNK_TEXTURENATIVE,
        &block(CHUNK_STRUCT, &[9, 0, 0, 0, 0, 0, 0, 0]),
    );
    let unknown = block(CHUNK_TEXTURENATIVE, &block(CHUNK_STRUCT, &[0x77, 0, 0, 0]));
    let good = d3d9_texture("good", 4, 4, &checker(4, 4));
    let bytes = dictionary(&[broken, unknown, good], driver::D3D9, &[]);

    let serializer = TxdSerializer::default();
    let dictionary = serializer.from_bytes(&bytes).unwrap();
    assert_eq!(dictionary.texture_count(), 1);
    assert_eq!(dictionary.textures()[0].name(), "good");

    assert_eq!(dictionary.failed.len(), 2);
    assert_eq!(dictionary.failed[0].index, 0);
    assert_eq!(dictionary.failed[1].index, 1);
    assert!(dictionary.failed[1].error.contains("no registered native texture type"));
    assert_eq!(serializer.diagnostics().warning_count(), 2);
}

#[test]
fn test_broken_texture_aborts_when_lengths_are_ignored() {
    let unknown = block(CHUNK_TEXTURENATIVE, &block(CHUNK_STRUCT, &[0x77, 0, 0, 0]));
    let bytes = dictionary(&[unknown, d3d9_texture("good", 4, 4, &checker(4, 4))], driver::D3D9, &[]);
    let config = EngineConfig::default().with_block_length_mode(BlockLengthMode::Ignore);
    assert!(TxdSerializer::new(config).from_bytes(&bytes).is_err());
}

#[test]
fn test_truncated_dictionary_keeps_loaded_textures() {
    let mut bytes = dictionary(&[d3d9_texture("a", 4, 4, &checker(4, 4))], driver::D3D9, &[]);
    // Claim two textures
    bytes[24] = 2;
    let serializer = TxdSerializer::default();
    let dictionary = serializer.from_bytes(&bytes).unwrap();
    assert_eq!(dictionary.texture_count(), 1);
    assert!(
        serializer
            .diagnostics()
            .warnings()
            .iter()
            .any(|w| w.contains("ends after 1 of 2"))
    );
}

#[test]
fn test_wrong_root_chunk_is_refused() {
    let bytes = block(CHUNK_STRUCT, &[0; 4]);
    let err = TxdSerializer::default().from_bytes(&bytes).unwrap_err();
    assert!(matches!(err, BinaryError::UnexpectedChunk { expected: CHUNK_TEXDICTIONARY, .. }));
}

#[test]
fn test_extension_blocks_survive_round_trip() {
    let mut plugin = Vec::new();
    plugin.extend_from_slice(&0x0253_F2FEu32.to_le_bytes());
    plugin.extend_from_slice(&stamp().to_le_bytes());
    plugin.extend_from_slice(&3u32.to_le_bytes());
    plugin.extend_from_slice(&[0xAA, 0xBB, 0xCC]);

    let bytes = dictionary(&[d3d9_texture("ext", 4, 4, &checker(4, 4))], driver::D3D9, &plugin);
    let serializer = TxdSerializer::default();
    let dictionary = serializer.from_bytes(&bytes).unwrap();

    let block = dictionary.extensions.get(0x0253_F2FE).unwrap();
    assert_eq!(block.data, vec![0xAA, 0xBB, 0xCC]);

    let written = serializer.to_bytes(&dictionary).unwrap();
    assert_eq!(hex::encode(&written), hex::encode(&bytes));
}

#[test]
fn test_file_round_trip() {
    let serializer = TxdSerializer::default();
    let version = LibraryVersion::san_andreas();
    let mut dictionary = TexDictionary::new(version);
    dictionary.extensions.insert(ExtensionBlock {
        id: 0x0253_F2F8,
        version,
        data: vec![1, 2, 3, 4],
    });

    let mut pixels = PixelData::new(RasterFormat::R8888, 32, ColorOrdering::Bgra);
    pixels.push_mipmap(MipmapLayer::new(16, 16, checker(16, 16)));
    pixels.push_mipmap(MipmapLayer::new(8, 8, checker(8, 8)));
    let raster = Raster::new(serializer.registry().require("direct3d9").unwrap(), version);
    raster.set_pixel_data(pixels.clone(), &serializer.context()).unwrap();
    let mut texture = TextureBase::new("tiles", version);
    texture.set_raster(Some(raster));
    dictionary.add_texture(texture);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tiles.txd");
    serializer.save_to_file(&dictionary, &path).unwrap();
    let read = serializer.load_from_file(&path).unwrap();

    assert_eq!(read.extensions, dictionary.extensions);
    let back = read.textures()[0].raster().unwrap().get_pixel_data(&serializer.context()).unwrap();
    assert_eq!(back.mipmaps.len(), 2);
    for (a, b) in back.mipmaps.iter().zip(&pixels.mipmaps) {
        assert_eq!(hex::encode(&a.texels), hex::encode(&b.texels));
    }
}

#[test]
fn test_removed_texture_outlives_dictionary_membership() {
    let serializer = TxdSerializer::default();
    let bytes = dictionary(
        &[
            d3d9_texture("first", 4, 4, &checker(4, 4)),
            d3d9_texture("second", 4, 4, &checker(4, 4)),
        ],
        driver::D3D9,
        &[],
    );
    let mut dictionary = serializer.from_bytes(&bytes).unwrap();
    let removed = dictionary.remove_texture(0).unwrap();
    assert_eq!(dictionary.texture_count(), 1);
    assert_eq!(removed.name(), "first");
    assert_eq!(removed.raster().unwrap().size(), (4, 4));

    dictionary.set_engine_version(LibraryVersion::new(3, 5, 0, 0));
    assert_eq!(dictionary.textures()[0].raster().unwrap().version(), LibraryVersion::new(3, 5, 0, 0));
}

// Detection order

#[derive(Debug, Clone)]
struct MockNative;
rw_txd_binary::impl_native_texture!(MockNative);

struct MockCodec {
    name: &'static str,
    answer: CompatibilityResult,
}

impl NativeTextureCodec for MockCodec {
    fn name(&self) -> &'static str {
        self.name
    }

    fn driver_id(&self) -> u16 {
        0
    }

    fn capabilities(&self) -> CodecCapabilities {
        CodecCapabilities {
            compressions: Vec::new(),
            palette_types: Vec::new(),
            supports_cube_textures: false,
            row_alignment: 4,
            max_mipmaps: None,
            is_compressed_format: false,
        }
    }

    fn create_native(&self, _version: LibraryVersion) -> Box<dyn NativeTexture> {
        Box::new(MockNative)
    }

    fn is_compatible_block(&self, reader: &mut BlockReader<'_>) -> Result<CompatibilityResult> {
        // Consume something so a missing position restore would show
        reader.read_u32()?;
        Ok(self.answer)
    }

    fn deserialize(
        &self,
        _reader: &mut BlockReader<'_>,
        _version: LibraryVersion,
        _ctx: &CodecContext<'_>,
    ) -> Result<(Box<dyn NativeTexture>, TextureProperties)> {
        Err(BinaryError::unsupported("mock"))
    }

    fn serialize(
        &self,
        _native: &dyn NativeTexture,
        _properties: &TextureProperties,
        _writer: &mut BlockWriter<'_>,
        _ctx: &CodecContext<'_>,
    ) -> Result<()> {
        Err(BinaryError::unsupported("mock"))
    }

    fn get_pixel_data(&self, _native: &dyn NativeTexture, _ctx: &CodecContext<'_>) -> Result<PixelData> {
        Err(BinaryError::unsupported("mock"))
    }

    fn set_pixel_data(
        &self,
        _native: &mut dyn NativeTexture,
        _pixels: PixelData,
        _ctx: &CodecContext<'_>,
    ) -> Result<bool> {
        Err(BinaryError::unsupported("mock"))
    }

    fn unset_pixel_data(&self, _native: &mut dyn NativeTexture) -> Result<()> {
        Ok(())
    }

    fn mipmap_count(&self, _native: &dyn NativeTexture) -> usize {
        0
    }

    fn get_mipmap_layer(&self, _native: &dyn NativeTexture, _index: usize) -> Result<RawMipmapLayer> {
        Err(BinaryError::unsupported("mock"))
    }

    fn add_mipmap_layer(
        &self,
        _native: &mut dyn NativeTexture,
        _layer: RawMipmapLayer,
        _ctx: &CodecContext<'_>,
    ) -> Result<bool> {
        Err(BinaryError::unsupported("mock"))
    }

    fn clear_mipmaps(&self, _native: &mut dyn NativeTexture) -> Result<()> {
        Ok(())
    }

    fn size(&self, _native: &dyn NativeTexture) -> (u32, u32) {
        (0, 0)
    }

    fn size_rules(&self, _native: &dyn NativeTexture) -> SizeRules {
        SizeRules::unrestricted()
    }

    fn format_string(&self, _native: &dyn NativeTexture) -> String {
        self.name.to_string()
    }

    fn raster_format(&self, _native: &dyn NativeTexture) -> RasterFormat {
        RasterFormat::Default
    }

    fn palette_type(&self, _native: &dyn NativeTexture) -> PaletteType {
        PaletteType::None
    }

    fn compression(&self, _native: &dyn NativeTexture) -> CompressionType {
        CompressionType::None
    }

    fn has_alpha(&self, _native: &dyn NativeTexture) -> bool {
        false
    }

    fn version(&self, _native: &dyn NativeTexture) -> LibraryVersion {
        LibraryVersion::san_andreas()
    }

    fn set_version(&self, _native: &mut dyn NativeTexture, _version: LibraryVersion) {}
}

fn detect_with(order: &[(&'static str, CompatibilityResult)]) -> Option<&'static str> {
    let mut registry = CodecRegistry::new();
    for (name, answer) in order {
        registry
            .register(Arc::new(MockCodec {
                name: *name,
                answer: *answer,
            }))
            .unwrap();
    }

    let mut cursor = Cursor::new(vec![0u8; 16]);
    let source: &mut dyn ReadSeek = &mut cursor;
    let mut reader = ChunkReader::new(source, BlockLengthMode::Trust).unwrap();
    let found = registry.detect(&mut reader).unwrap().map(|c| c.name());
    assert_eq!(reader.position().unwrap(), 0);
    found
}

#[test]
fn test_absolute_beats_maybe_in_any_order() {
    use CompatibilityResult::*;
    assert_eq!(detect_with(&[("maybe", Maybe), ("sure", Absolute)]), Some("sure"));
    assert_eq!(detect_with(&[("sure", Absolute), ("maybe", Maybe)]), Some("sure"));
    assert_eq!(detect_with(&[("no", None), ("maybe", Maybe), ("later", Maybe)]), Some("maybe"));
    assert_eq!(detect_with(&[("no", None)]), Option::None);
}

#[test]
fn test_duplicate_codec_names_are_rejected() {
    let mut registry = CodecRegistry::with_default_codecs();
    let err = registry
        .register(Arc::new(MockCodec {
            name: "DIRECT3D9",
            answer: CompatibilityResult::None,
        }))
        .unwrap_err();
    assert!(err.to_string().contains("already registered"));
}
