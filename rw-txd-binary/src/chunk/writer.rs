//! Chunk writer with length back-patching

use super::{ChunkHeader, FixedHeader, encode_fixed};
use crate::error::{BinaryError, Result};
use binrw::BinWrite;
use byteorder::{LittleEndian, WriteBytesExt};
use rw_txd_core::{CHUNK_HEADER_SIZE, CHUNK_STRING, LibraryVersion};
use std::io::{Seek, SeekFrom, Write};

#[derive(Debug, Clone, Copy)]
struct OpenBlock {
    header_pos: u64,
    id: u32,
    version: LibraryVersion,
}

/// Chunk writer over any seekable sink
pub struct ChunkWriter<W: Write + Seek> {
    inner: W,
    version: LibraryVersion,
    open: Vec<OpenBlock>,
}

impl<W: Write + Seek> ChunkWriter<W> {
    /// New writer stamping blocks with `version`
    pub fn new(inner: W, version: LibraryVersion) -> Self {
        Self {
            inner,
            version,
            open: Vec::new(),
        }
    }

    pub fn version(&self) -> LibraryVersion {
        self.version
    }

    pub fn set_version(&mut self, version: LibraryVersion) {
        self.version = version;
    }

    pub fn depth(&self) -> usize {
        self.open.len()
    }

    pub fn position(&mut self) -> Result<u64> {
        Ok(self.inner.stream_position()?)
    }

    /// Open a block stamped with the writer version
    pub fn begin_block(&mut self, id: u32) -> Result<()> {
        let version = self.version;
        self.begin_block_versioned(id, version)
    }

    /// Open a block with an explicit version stamp
    pub fn begin_block_versioned(&mut self, id: u32, version: LibraryVersion) -> Result<()> {
        let header_pos = self.position()?;
        ChunkHeader::new(id, version, 0).write_to(&mut self.inner)?;
        self.open.push(OpenBlock {
            header_pos,
            id,
            version,
        });
        Ok(())
    }

    /// Close the innermost block and patch its length
    pub fn end_block(&mut self) -> Result<()> {
        let block = self
            .open
            .pop()
            .ok_or_else(|| BinaryError::invalid_data("end_block without an open block"))?;

        let end = self.position()?;
        let length = end - block.header_pos - CHUNK_HEADER_SIZE;
        let length = u32::try_from(length).map_err(|_| {
            BinaryError::invalid_data(format!("chunk 0x{:X} too large ({} bytes)", block.id, length))
        })?;

        self.inner.seek(SeekFrom::Start(block.header_pos))?;
        ChunkHeader::new(block.id, block.version, length).write_to(&mut self.inner)?;
        self.inner.seek(SeekFrom::Start(end))?;
        Ok(())
    }

    /// Write a complete block whose payload is produced by `f`
    pub fn with_block<F>(&mut self, id: u32, f: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        self.begin_block(id)?;
        f(self)?;
        self.end_block()
    }

    /// Write a complete block stamped with `version`
    pub fn with_block_versioned<F>(&mut self, id: u32, version: LibraryVersion, f: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        self.begin_block_versioned(id, version)?;
        f(self)?;
        self.end_block()
    }

    /// Write a zero terminated CHUNK_STRING block padded to 4 bytes
    pub fn write_string_block(&mut self, text: &str) -> Result<()> {
        self.with_block(CHUNK_STRING, |w| {
            let bytes = text.as_bytes();
            let padded = (bytes.len() + 1 + 3) & !3;
            w.write_bytes(bytes)?;
            w.write_zeros(padded - bytes.len())
        })
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        Ok(())
    }

    pub fn write_zeros(&mut self, count: usize) -> Result<()> {
        const ZEROS: [u8; 64] = [0u8; 64];
        let mut left = count;
        while left > 0 {
            let n = left.min(ZEROS.len());
            self.inner.write_all(&ZEROS[..n])?;
            left -= n;
        }
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        Ok(self.inner.write_u8(value)?)
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        Ok(self.inner.write_u16::<LittleEndian>(value)?)
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        Ok(self.inner.write_u32::<LittleEndian>(value)?)
    }

    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        Ok(self.inner.write_u64::<LittleEndian>(value)?)
    }

    /// Write a fixed size packed header
    pub fn write_fixed<T>(&mut self, value: &T) -> Result<()>
    where
        T: FixedHeader + for<'a> BinWrite<Args<'a> = ()>,
    {
        let bytes = encode_fixed(value)?;
        self.write_bytes(&bytes)
    }

    pub fn flush(&mut self) -> Result<()> {
        Ok(self.inner.flush()?)
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rw_txd_core::CHUNK_STRUCT;
    use std::io::Cursor;

    #[test]
    fn test_length_back_patch() {
        let mut writer = ChunkWriter::new(Cursor::new(Vec::new()), LibraryVersion::san_andreas());
        writer
            .with_block(0x16, |w| {
                w.with_block(CHUNK_STRUCT, |w| w.write_u32(7))?;
                w.write_u16(1)
            })
            .unwrap();
        let data = writer.into_inner().into_inner();

        assert_eq!(data.len(), 12 + 12 + 4 + 2);
        assert_eq!(&data[8..12], &18u32.to_le_bytes());
        assert_eq!(&data[20..24], &4u32.to_le_bytes());
    }

    #[test]
    fn test_end_without_begin() {
        let mut writer = ChunkWriter::new(Cursor::new(Vec::new()), LibraryVersion::san_andreas());
        assert!(writer.end_block().is_err());
    }
}
