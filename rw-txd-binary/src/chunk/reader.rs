//! Bounds-checked chunk reader

use super::{ChunkHeader, FixedHeader, decode_fixed};
use crate::error::{BinaryError, Result};
use binrw::BinRead;
use byteorder::{LittleEndian, ReadBytesExt};
use rw_txd_core::{BlockLengthMode, CHUNK_HEADER_SIZE, CHUNK_STRING};
use std::io::{Read, Seek, SeekFrom};

#[derive(Debug, Clone, Copy)]
struct BlockContext {
    header: ChunkHeader,
    data_start: u64,
    end: u64,
}

/// Chunk reader over any seekable stream
pub struct ChunkReader<R: Read + Seek> {
    inner: R,
    mode: BlockLengthMode,
    stream_size: u64,
    contexts: Vec<BlockContext>,
}

impl<R: Read + Seek> ChunkReader<R> {
    /// Wrap a stream; the current position becomes the reading start
    pub fn new(mut inner: R, mode: BlockLengthMode) -> Result<Self> {
        let start = inner.stream_position()?;
        let stream_size = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(start))?;
        Ok(Self {
            inner,
            mode,
            stream_size,
            contexts: Vec::new(),
        })
    }

    pub fn mode(&self) -> BlockLengthMode {
        self.mode
    }

    pub fn stream_size(&self) -> u64 {
        self.stream_size
    }

    /// Nesting depth, 0 at root level
    pub fn depth(&self) -> usize {
        self.contexts.len()
    }

    pub fn position(&mut self) -> Result<u64> {
        Ok(self.inner.stream_position()?)
    }

    pub fn seek_to(&mut self, pos: u64) -> Result<()> {
        self.inner.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    /// Header of the innermost open block
    pub fn current_header(&self) -> Option<&ChunkHeader> {
        self.contexts.last().map(|ctx| &ctx.header)
    }

    /// Offset reads may not pass
    pub fn current_end(&self) -> u64 {
        match (self.mode, self.contexts.last()) {
            (BlockLengthMode::Trust, Some(ctx)) => ctx.end,
            _ => self.stream_size,
        }
    }

    /// Bytes left before the current block end
    pub fn remaining(&mut self) -> Result<u64> {
        let pos = self.position()?;
        Ok(self.current_end().saturating_sub(pos))
    }

    /// Bytes consumed from the innermost block so far
    pub fn consumed_in_block(&mut self) -> Result<u64> {
        let pos = self.position()?;
        Ok(self
            .contexts
            .last()
            .map(|ctx| pos.saturating_sub(ctx.data_start))
            .unwrap_or(pos))
    }

    fn check_bounds(&mut self, count: u64) -> Result<()> {
        let pos = self.position()?;
        let end = self.current_end();
        if pos + count > end {
            return Err(BinaryError::block_overrun(pos, count, end));
        }
        Ok(())
    }

    /// Read a chunk header without consuming it
    pub fn peek_header(&mut self) -> Result<ChunkHeader> {
        self.check_bounds(CHUNK_HEADER_SIZE)?;
        let pos = self.position()?;
        let header = ChunkHeader::read_from(&mut self.inner);
        self.seek_to(pos)?;
        header
    }

    /// Peek a little-endian u32 without consuming it
    pub fn peek_u32(&mut self) -> Result<u32> {
        let pos = self.position()?;
        let value = self.read_u32();
        self.seek_to(pos)?;
        value
    }

    /// Read a chunk header and open its block
    pub fn enter_context(&mut self) -> Result<ChunkHeader> {
        self.check_bounds(CHUNK_HEADER_SIZE)?;
        let header = ChunkHeader::read_from(&mut self.inner)?;
        let data_start = self.position()?;
        let end = data_start + header.length as u64;

        if self.mode == BlockLengthMode::Trust {
            let parent_end = self.current_end();
            if end > parent_end {
                return Err(BinaryError::block_overrun(
                    data_start,
                    header.length as u64,
                    parent_end,
                ));
            }
        }

        tracing::debug!(
            "enter chunk {} (0x{:X}) version {} length {} at depth {}",
            header.name(),
            header.id,
            header.version,
            header.length,
            self.contexts.len()
        );

        self.contexts.push(BlockContext {
            header,
            data_start,
            end,
        });
        Ok(header)
    }

    /// Close the innermost block
    ///
    /// With trusted lengths the stream is put at the declared block end no
    /// matter how much of the payload was consumed.
    pub fn leave_context(&mut self) -> Result<()> {
        let ctx = self
            .contexts
            .pop()
            .ok_or_else(|| BinaryError::invalid_data("leave_context without an open block"))?;

        if self.mode == BlockLengthMode::Trust {
            self.seek_to(ctx.end)?;
        } else {
            let pos = self.position()?;
            if pos != ctx.end {
                tracing::debug!(
                    "chunk 0x{:X} consumed {} bytes, declared {}",
                    ctx.header.id,
                    pos - ctx.data_start,
                    ctx.header.length
                );
            }
        }
        Ok(())
    }

    /// Run `f` inside a block, always leaving it afterwards
    pub fn with_block<T, F>(&mut self, f: F) -> Result<(ChunkHeader, T)>
    where
        F: FnOnce(&mut Self, &ChunkHeader) -> Result<T>,
    {
        let header = self.enter_context()?;
        let result = f(self, &header);
        let left = self.leave_context();
        let value = result?;
        left?;
        Ok((header, value))
    }

    /// Like [`with_block`](Self::with_block) but requires the given chunk id
    pub fn expect_block<T, F>(&mut self, id: u32, f: F) -> Result<(ChunkHeader, T)>
    where
        F: FnOnce(&mut Self, &ChunkHeader) -> Result<T>,
    {
        self.with_block(|reader, header| {
            if header.id != id {
                return Err(BinaryError::unexpected_chunk(id, header.id));
            }
            f(reader, header)
        })
    }

    /// Read and check a chunk header without opening a context
    pub fn expect_id(&mut self, id: u32) -> Result<ChunkHeader> {
        let header = self.peek_header()?;
        if header.id != id {
            return Err(BinaryError::unexpected_chunk(id, header.id));
        }
        Ok(header)
    }

    /// Read a CHUNK_STRING block
    pub fn read_string_block(&mut self) -> Result<String> {
        let (_, text) = self.expect_block(CHUNK_STRING, |reader, header| {
            let bytes = reader.read_bytes(header.length as usize)?;
            Ok(super::name_from_fixed(&bytes))
        })?;
        Ok(text)
    }

    pub fn read_exact(&mut self, buffer: &mut [u8]) -> Result<()> {
        self.check_bounds(buffer.len() as u64)?;
        self.inner.read_exact(buffer)?;
        Ok(())
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        self.check_bounds(count as u64)?;
        let mut buffer = Vec::new();
        buffer.try_reserve_exact(count)?;
        buffer.resize(count, 0);
        self.inner.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    pub fn skip(&mut self, count: u64) -> Result<()> {
        self.check_bounds(count)?;
        self.inner.seek(SeekFrom::Current(count as i64))?;
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.check_bounds(1)?;
        Ok(self.inner.read_u8()?)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.check_bounds(2)?;
        Ok(self.inner.read_u16::<LittleEndian>()?)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.check_bounds(4)?;
        Ok(self.inner.read_u32::<LittleEndian>()?)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.check_bounds(8)?;
        Ok(self.inner.read_u64::<LittleEndian>()?)
    }

    /// Read a fixed size packed header
    pub fn read_fixed<T>(&mut self) -> Result<T>
    where
        T: FixedHeader + for<'a> BinRead<Args<'a> = ()>,
    {
        let bytes = self.read_bytes(T::SIZE)?;
        decode_fixed(&bytes)
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkWriter;
    use rw_txd_core::{CHUNK_EXTENSION, CHUNK_STRUCT, LibraryVersion};
    use std::io::Cursor;

    fn nested_stream() -> Vec<u8> {
        let mut writer = ChunkWriter::new(Cursor::new(Vec::new()), LibraryVersion::san_andreas());
        writer
            .with_block(CHUNK_STRUCT, |w| {
                w.write_u32(1)?;
                w.write_u32(2)?;
                w.write_u32(3)
            })
            .unwrap();
        writer.write_u32(0xCAFEBABE).unwrap();
        writer.into_inner().into_inner()
    }

    #[test]
    fn test_leave_context_skips_unread_payload() {
        let data = nested_stream();
        let mut reader = ChunkReader::new(Cursor::new(&data[..]), BlockLengthMode::Trust).unwrap();

        let header = reader.enter_context().unwrap();
        assert_eq!(header.length, 12);
        assert_eq!(reader.read_u32().unwrap(), 1);
        reader.leave_context().unwrap();

        assert_eq!(reader.read_u32().unwrap(), 0xCAFEBABE);
    }

    #[test]
    fn test_block_overrun() {
        let data = nested_stream();
        let mut reader = ChunkReader::new(Cursor::new(&data[..]), BlockLengthMode::Trust).unwrap();

        let result = reader.with_block(|r, _| {
            r.read_bytes(12)?;
            r.read_u32()
        });
        assert!(matches!(result, Err(BinaryError::BlockOverrun { .. })));
        // Even after the failure the stream is at the block end
        assert_eq!(reader.read_u32().unwrap(), 0xCAFEBABE);
    }

    #[test]
    fn test_ignore_mode_uses_stream_end() {
        let data = nested_stream();
        let mut reader = ChunkReader::new(Cursor::new(&data[..]), BlockLengthMode::Ignore).unwrap();

        reader.enter_context().unwrap();
        reader.read_bytes(12).unwrap();
        // Reading past the declared length is allowed
        assert_eq!(reader.read_u32().unwrap(), 0xCAFEBABE);
        reader.leave_context().unwrap();
    }

    #[test]
    fn test_declared_length_beyond_stream() {
        let mut data = Vec::new();
        ChunkHeader::new(CHUNK_EXTENSION, LibraryVersion::san_andreas(), 100)
            .write_to(&mut data)
            .unwrap();
        data.extend_from_slice(&[0u8; 8]);

        let mut reader = ChunkReader::new(Cursor::new(&data[..]), BlockLengthMode::Trust).unwrap();
        assert!(matches!(
            reader.enter_context(),
            Err(BinaryError::BlockOverrun { .. })
        ));
    }

    #[test]
    fn test_expect_block_mismatch() {
        let data = nested_stream();
        let mut reader = ChunkReader::new(Cursor::new(&data[..]), BlockLengthMode::Trust).unwrap();
        let result = reader.expect_block(CHUNK_EXTENSION, |_, _| Ok(()));
        assert!(matches!(
            result,
            Err(BinaryError::UnexpectedChunk {
                expected: CHUNK_EXTENSION,
                actual: CHUNK_STRUCT
            })
        ));
    }

    #[test]
    fn test_string_block() {
        let mut writer = ChunkWriter::new(Cursor::new(Vec::new()), LibraryVersion::san_andreas());
        writer.write_string_block("radar00").unwrap();
        let data = writer.into_inner().into_inner();
        assert_eq!(data.len(), 12 + 8);

        let mut reader = ChunkReader::new(Cursor::new(&data[..]), BlockLengthMode::Trust).unwrap();
        assert_eq!(reader.read_string_block().unwrap(), "radar00");
    }
}
