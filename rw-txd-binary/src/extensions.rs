//! Plugin extension blocks attached to textures and dictionaries
//!
//! Every object may be followed by an EXTENSION chunk holding plugin
//! blocks. They are kept as raw `(id, version, bytes)` triples and written
//! back verbatim; only the sky mipmap block is interpreted.

use rw_txd_core::{CHUNK_EXTENSION, CHUNK_HEADER_SIZE, CHUNK_SKYMIPMAP, LibraryVersion};
use serde::{Deserialize, Serialize};

use crate::chunk::{BlockReader, BlockWriter};
use crate::error::{BinaryError, Result};

/// Value PS2 textures carry when no sky mipmap block is present
pub const DEFAULT_SKY_MIPMAP: u32 = 4032;

/// One plugin block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionBlock {
    pub id: u32,
    pub version: LibraryVersion,
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        hex::decode(text).map_err(serde::de::Error::custom)
    }
}

/// Mipmap LOD parameters of the PS2 sky plugin
///
/// `k` is the TEX1 K value (signed 12 bit, 4 fractional bits) and `l` the
/// TEX1 L shift, packed as `l << 12 | k`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkyMipmap {
    pub k: i16,
    pub l: u8,
}

impl SkyMipmap {
    pub fn from_u32(value: u32) -> Self {
        let raw_k = (value & 0xFFF) as i16;
        // sign extend from 12 bits
        let k = (raw_k << 4) >> 4;
        Self {
            k,
            l: ((value >> 12) & 0x3) as u8,
        }
    }

    pub fn to_u32(&self) -> u32 {
        ((self.l as u32 & 0x3) << 12) | (self.k as u32 & 0xFFF)
    }

    /// K as a float
    pub fn k_value(&self) -> f32 {
        self.k as f32 / 16.0
    }
}

impl Default for SkyMipmap {
    fn default() -> Self {
        Self::from_u32(DEFAULT_SKY_MIPMAP)
    }
}

/// Extension blocks of an object, in stream order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extensions {
    blocks: Vec<ExtensionBlock>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExtensionBlock> {
        self.blocks.iter()
    }

    pub fn get(&self, id: u32) -> Option<&ExtensionBlock> {
        self.blocks.iter().find(|b| b.id == id)
    }

    /// Add a block, replacing one with the same id
    pub fn insert(&mut self, block: ExtensionBlock) {
        match self.blocks.iter_mut().find(|b| b.id == block.id) {
            Some(existing) => *existing = block,
            None => self.blocks.push(block),
        }
    }

    pub fn remove(&mut self, id: u32) -> Option<ExtensionBlock> {
        let index = self.blocks.iter().position(|b| b.id == id)?;
        Some(self.blocks.remove(index))
    }

    pub fn sky_mipmap(&self) -> Option<SkyMipmap> {
        let block = self.get(CHUNK_SKYMIPMAP)?;
        let bytes: [u8; 4] = block.data.get(..4)?.try_into().ok()?;
        Some(SkyMipmap::from_u32(u32::from_le_bytes(bytes)))
    }

    pub fn set_sky_mipmap(&mut self, value: SkyMipmap, version: LibraryVersion) {
        self.insert(ExtensionBlock {
            id: CHUNK_SKYMIPMAP,
            version,
            data: value.to_u32().to_le_bytes().to_vec(),
        });
    }

    /// Read an EXTENSION chunk at the current position
    pub fn read(reader: &mut BlockReader<'_>) -> Result<Self> {
        let (_, blocks) = reader.expect_block(CHUNK_EXTENSION, |r, header| {
            let end = r.position()? + header.length as u64;
            let mut blocks = Vec::new();
            while r.position()? + CHUNK_HEADER_SIZE <= end {
                let (_, block) = r.with_block(|b, inner| {
                    let available = b.remaining()?.min(inner.length as u64);
                    if available < inner.length as u64 {
                        return Err(BinaryError::not_enough_data(inner.length as usize, available as usize));
                    }
                    Ok(ExtensionBlock {
                        id: inner.id,
                        version: inner.version,
                        data: b.read_bytes(inner.length as usize)?,
                    })
                })?;
                tracing::debug!("extension block 0x{:X} ({} bytes)", block.id, block.data.len());
                blocks.push(block);
            }
            Ok(blocks)
        })?;
        Ok(Self { blocks })
    }

    /// Read a trailing EXTENSION chunk when one follows
    pub fn read_optional(reader: &mut BlockReader<'_>) -> Result<Self> {
        if reader.remaining()? < CHUNK_HEADER_SIZE {
            return Ok(Self::default());
        }
        if reader.peek_header()?.id != CHUNK_EXTENSION {
            return Ok(Self::default());
        }
        Self::read(reader)
    }

    /// Write the EXTENSION chunk (empty when there are no blocks)
    pub fn write(&self, writer: &mut BlockWriter<'_>) -> Result<()> {
        writer.with_block(CHUNK_EXTENSION, |w| {
            for block in &self.blocks {
                w.with_block_versioned(block.id, block.version, |inner| inner.write_bytes(&block.data))?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{ChunkReader, ChunkWriter, ReadSeek, WriteSeek};
    use rw_txd_core::BlockLengthMode;
    use std::io::Cursor;

    fn written(extensions: &Extensions) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let sink: &mut dyn WriteSeek = &mut cursor;
            let mut writer = ChunkWriter::new(sink, LibraryVersion::san_andreas());
            extensions.write(&mut writer).unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_sky_mipmap_packing() {
        let default = SkyMipmap::default();
        assert_eq!(default.k, -64);
        assert_eq!(default.l, 0);
        assert_eq!(default.k_value(), -4.0);
        assert_eq!(default.to_u32(), DEFAULT_SKY_MIPMAP);

        let value = SkyMipmap { k: 24, l: 2 };
        assert_eq!(SkyMipmap::from_u32(value.to_u32()), value);
    }

    #[test]
    fn test_blocks_are_written_back_verbatim() {
        let mut extensions = Extensions::new();
        extensions.insert(ExtensionBlock {
            id: 0x253F2F3,
            version: LibraryVersion::new(3, 4, 0, 3),
            data: vec![1, 2, 3, 4, 5],
        });
        extensions.set_sky_mipmap(SkyMipmap { k: -16, l: 1 }, LibraryVersion::san_andreas());

        let bytes = written(&extensions);
        assert_eq!(bytes.len(), 12 + 12 + 5 + 12 + 4);

        let mut cursor = Cursor::new(bytes);
        let source: &mut dyn ReadSeek = &mut cursor;
        let mut reader = ChunkReader::new(source, BlockLengthMode::Trust).unwrap();
        let read = Extensions::read_optional(&mut reader).unwrap();
        assert_eq!(read, extensions);
        assert_eq!(read.sky_mipmap(), Some(SkyMipmap { k: -16, l: 1 }));
    }

    #[test]
    fn test_missing_extension_is_empty() {
        let mut cursor = Cursor::new(vec![0u8; 4]);
        let source: &mut dyn ReadSeek = &mut cursor;
        let mut reader = ChunkReader::new(source, BlockLengthMode::Trust).unwrap();
        assert!(Extensions::read_optional(&mut reader).unwrap().is_empty());
    }
}
