//! Chunk stream reader and writer
//!
//! A RenderWare stream is a tree of length-prefixed blocks:
//!
//! ```text
//! u32 id | u32 version stamp | u32 length | payload (length bytes)
//! ```
//!
//! [`ChunkReader`] tracks a stack of block contexts. Leaving a context always
//! puts the stream at the declared end of the block (when lengths are
//! trusted), which is how corrupt or unknown blocks get skipped.
//! [`ChunkWriter`] writes placeholder headers and back-patches lengths.

mod reader;
mod writer;

pub use reader::ChunkReader;
pub use writer::ChunkWriter;

use crate::error::Result;
use binrw::{BinRead, BinWrite};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use rw_txd_core::{CHUNK_HEADER_SIZE, LibraryVersion, chunk_name};
use std::io::{Cursor, Read, Seek, Write};

/// Object safe `Read + Seek`
pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

/// Object safe `Write + Seek`
pub trait WriteSeek: Write + Seek {}
impl<T: Write + Seek> WriteSeek for T {}

/// Reader handed to native texture codecs
pub type BlockReader<'a> = ChunkReader<&'a mut dyn ReadSeek>;

/// Writer handed to native texture codecs
pub type BlockWriter<'a> = ChunkWriter<&'a mut dyn WriteSeek>;

/// Header of a single chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub id: u32,
    pub version: LibraryVersion,
    pub length: u32,
}

impl ChunkHeader {
    pub fn new(id: u32, version: LibraryVersion, length: u32) -> Self {
        Self {
            id,
            version,
            length,
        }
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let id = reader.read_u32::<LittleEndian>()?;
        let stamp = reader.read_u32::<LittleEndian>()?;
        let length = reader.read_u32::<LittleEndian>()?;
        Ok(Self {
            id,
            version: LibraryVersion::from_stamp(stamp),
            length,
        })
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.id)?;
        writer.write_u32::<LittleEndian>(self.version.to_stamp())?;
        writer.write_u32::<LittleEndian>(self.length)?;
        Ok(())
    }

    /// Total size including the header
    pub fn total_size(&self) -> u64 {
        CHUNK_HEADER_SIZE + self.length as u64
    }

    pub fn name(&self) -> &'static str {
        chunk_name(self.id)
    }
}

/// Fixed size binary layout read and written through `binrw`
pub trait FixedHeader: Sized {
    const SIZE: usize;
}

pub(crate) fn decode_fixed<T>(bytes: &[u8]) -> Result<T>
where
    T: FixedHeader + for<'a> BinRead<Args<'a> = ()>,
{
    let mut cursor = Cursor::new(bytes);
    Ok(T::read_le(&mut cursor)?)
}

pub(crate) fn encode_fixed<T>(value: &T) -> Result<Vec<u8>>
where
    T: FixedHeader + for<'a> BinWrite<Args<'a> = ()>,
{
    let mut cursor = Cursor::new(Vec::with_capacity(T::SIZE));
    value.write_le(&mut cursor)?;
    Ok(cursor.into_inner())
}

/// Copy a fixed width name field, stopping at the first zero
pub fn name_from_fixed(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Build a fixed width, zero terminated name field
///
/// Returns the field and whether the name had to be truncated.
pub fn name_to_fixed<const N: usize>(name: &str) -> ([u8; N], bool) {
    let mut field = [0u8; N];
    let bytes = name.as_bytes();
    let copy = bytes.len().min(N.saturating_sub(1));
    field[..copy].copy_from_slice(&bytes[..copy]);
    (field, copy < bytes.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_round_trip() {
        let header = ChunkHeader::new(0x16, LibraryVersion::san_andreas(), 40);
        let mut bytes = Vec::new();
        header.write_to(&mut bytes).unwrap();
        assert_eq!(
            bytes,
            [0x16, 0, 0, 0, 0xFF, 0xFF, 0x03, 0x18, 40, 0, 0, 0]
        );
        assert_eq!(ChunkHeader::read_from(&mut bytes.as_slice()).unwrap(), header);
        assert_eq!(header.total_size(), 52);
    }

    #[test]
    fn test_fixed_names() {
        let (field, truncated) = name_to_fixed::<8>("grass");
        assert_eq!(&field, b"grass\0\0\0");
        assert!(!truncated);
        assert_eq!(name_from_fixed(&field), "grass");

        let (field, truncated) = name_to_fixed::<4>("roads");
        assert_eq!(&field, b"roa\0");
        assert!(truncated);

        // Hostile input without a terminator
        assert_eq!(name_from_fixed(b"abcd"), "abcd");
    }
}
