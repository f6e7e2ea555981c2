//! GS textures and their GIF upload packets
//!
//! With headers, each texture is stored as
//!
//! ```text
//! GIFtag (register list, A+D) | n x (u64 content, u64 register id)
//! GIFtag (IMAGE, nloop = data / 16) | texels
//! ```
//!
//! Without headers only the texels are present.

use super::encoding::FormatEncoding;
use super::registers::{GifTag, RawGifTag, TrxDir, TrxPos, TrxReg, gs_register};
use crate::chunk::{BlockReader, BlockWriter};
use crate::error::Result;
use crate::pixel::raster_row_size;

/// Bytes skipped when a header block cannot be parsed
const CORRUPT_HEADER_SKIP: u64 = 0x50;

const GIF_TAG_SIZE: u32 = 16;
const REGISTER_ENTRY_SIZE: u32 = 16;

/// Register write carried in a texture's GIF packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GsRegisterEntry {
    pub id: u8,
    pub content: u64,
}

/// Destination corner of a texture transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransmissionOffset {
    pub x: u32,
    pub y: u32,
}

/// Encoded texels plus their upload registers
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GsTexture {
    pub swizzle_width: u32,
    pub swizzle_height: u32,
    pub texels: Vec<u8>,
    pub registers: Vec<GsRegisterEntry>,
}

/// Outcome of reading one GIF packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GifReadResult {
    pub bytes_read: u32,
    pub corrupted_headers: bool,
}

/// What the transfer registers of a texture say
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransferCheck {
    pub offset: TransmissionOffset,
    pub consistent: bool,
}

impl GsTexture {
    pub fn new(swizzle_width: u32, swizzle_height: u32) -> Self {
        Self {
            swizzle_width,
            swizzle_height,
            ..Default::default()
        }
    }

    /// Byte size of the encoded texels (rows start on a byte)
    pub fn data_size(&self, encoding: FormatEncoding) -> u32 {
        raster_row_size(self.swizzle_width, encoding.depth(), 1) * self.swizzle_height
    }

    /// Byte size of the whole packet
    pub fn stream_size(&self, requires_headers: bool) -> u32 {
        let headers = if requires_headers {
            GIF_TAG_SIZE + self.registers.len() as u32 * REGISTER_ENTRY_SIZE + GIF_TAG_SIZE
        } else {
            0
        };
        headers + self.texels.len() as u32
    }

    pub fn register(&self, id: u8) -> Option<u64> {
        self.registers.iter().find(|r| r.id == id).map(|r| r.content)
    }

    pub fn set_register(&mut self, id: u8, content: u64) {
        match self.registers.iter_mut().find(|r| r.id == id) {
            Some(entry) => entry.content = content,
            None => self.registers.push(GsRegisterEntry { id, content }),
        }
    }

    /// Fill TRXPOS/TRXREG/TRXDIR for an upload to `offset`
    pub fn set_transfer_registers(
        &mut self,
        offset: TransmissionOffset,
        encoding: FormatEncoding,
        decode: FormatEncoding,
    ) {
        let mut width = self.swizzle_width;
        if encoding == FormatEncoding::Tex32 && decode == FormatEncoding::IdTex8Compressed {
            width *= 2;
        }
        let trxpos = TrxPos {
            dsax: offset.x,
            dsay: offset.y,
            ..Default::default()
        };
        let trxreg = TrxReg {
            width,
            height: self.swizzle_height,
        };
        self.set_register(gs_register::TRXPOS, trxpos.to_u64());
        self.set_register(gs_register::TRXREG, trxreg.to_u64());
        self.set_register(gs_register::TRXDIR, TrxDir::default().to_u64());
    }

    /// Read the packet of a texture whose encoded size is `data_size`
    ///
    /// Malformed headers are skipped (0x50 bytes) and reported through
    /// `corrupted_headers`; the texels are read regardless.
    pub fn read_gif_packet(
        &mut self,
        reader: &mut BlockReader<'_>,
        data_size: u32,
        has_headers: bool,
    ) -> Result<GifReadResult> {
        let mut bytes_read = 0u32;
        let mut corrupted_headers = false;

        if has_headers {
            let safe = reader.position()?;
            match self.read_headers(reader, data_size)? {
                Some(count) => bytes_read += count,
                None => {
                    tracing::debug!("GIF headers at {:#x} are malformed; skipping", safe);
                    self.registers.clear();
                    reader.seek_to(safe + CORRUPT_HEADER_SKIP)?;
                    bytes_read += CORRUPT_HEADER_SKIP as u32;
                    corrupted_headers = true;
                }
            }
        }

        self.texels = reader.read_bytes(data_size as usize)?;
        bytes_read += data_size;

        Ok(GifReadResult {
            bytes_read,
            corrupted_headers,
        })
    }

    /// Parse the register list and image tags; `None` when they are invalid
    fn read_headers(&mut self, reader: &mut BlockReader<'_>, data_size: u32) -> Result<Option<u32>> {
        let list = GifTag::from_raw(&reader.read_fixed::<RawGifTag>()?);
        if list.flg != 0 || list.eop || list.pre || list.prim != 0 {
            return Ok(None);
        }
        if list.nreg != 1 || list.register_id(0) != gs_register::A_D as u32 {
            return Ok(None);
        }

        let mut registers = Vec::with_capacity(list.nloop as usize);
        for _ in 0..list.nloop {
            let content = reader.read_u64()?;
            let id = (reader.read_u64()? & 0xFF) as u8;
            registers.push(GsRegisterEntry { id, content });
        }

        let image = GifTag::from_raw(&reader.read_fixed::<RawGifTag>()?);
        if image.eop || image.pre || image.prim != 0 || image.flg != 2 || image.nreg != 0 {
            return Ok(None);
        }
        if image.nloop != data_size / 16 {
            return Ok(None);
        }

        self.registers = registers;
        Ok(Some(GIF_TAG_SIZE + list.nloop * REGISTER_ENTRY_SIZE + GIF_TAG_SIZE))
    }

    pub fn write_gif_packet(&self, writer: &mut BlockWriter<'_>, requires_headers: bool) -> Result<()> {
        if requires_headers {
            writer.write_fixed(&GifTag::register_list(self.registers.len() as u32).to_raw())?;
            for entry in &self.registers {
                writer.write_u64(entry.content)?;
                writer.write_u64(entry.id as u64)?;
            }
            writer.write_fixed(&GifTag::image(self.texels.len() as u32).to_raw())?;
        }
        writer.write_bytes(&self.texels)
    }

    /// Cross-check the stored transfer registers against the texture
    pub fn verify_transfer(
        &self,
        has_headers: bool,
        encoding: FormatEncoding,
        decode: FormatEncoding,
    ) -> TransferCheck {
        if !has_headers {
            return TransferCheck {
                consistent: true,
                ..Default::default()
            };
        }

        let mut check = TransferCheck {
            consistent: true,
            ..Default::default()
        };

        match self.register(gs_register::TRXPOS).map(TrxPos::from_u64) {
            Some(pos) => {
                check.offset = TransmissionOffset {
                    x: pos.dsax,
                    y: pos.dsay,
                };
                check.consistent &= pos.ssax == 0 && pos.ssay == 0 && pos.dir == 0;
            }
            None => check.consistent = false,
        }

        match self.register(gs_register::TRXREG).map(TrxReg::from_u64) {
            Some(reg) => {
                let mut width = reg.width;
                if encoding == FormatEncoding::Tex32 && decode == FormatEncoding::IdTex8Compressed {
                    width /= 2;
                }
                check.consistent &= width == self.swizzle_width && reg.height == self.swizzle_height;
            }
            None => check.consistent = false,
        }

        match self.register(gs_register::TRXDIR).map(TrxDir::from_u64) {
            Some(dir) => check.consistent &= dir.xdir == 0,
            None => check.consistent = false,
        }

        check
    }
}

/// One mipmap level of a PS2 texture
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GsMipmap {
    pub width: u32,
    pub height: u32,
    pub texture: GsTexture,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{ChunkReader, ChunkWriter, ReadSeek, WriteSeek};
    use rw_txd_core::{BlockLengthMode, LibraryVersion};
    use std::io::Cursor;

    fn texture() -> GsTexture {
        let mut texture = GsTexture::new(4, 4);
        texture.texels = (0..64u8).collect();
        texture.set_transfer_registers(TransmissionOffset { x: 8, y: 0 }, FormatEncoding::Tex32, FormatEncoding::Tex32);
        texture
    }

    fn written(texture: &GsTexture, headers: bool) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let sink: &mut dyn WriteSeek = &mut cursor;
            let mut writer = ChunkWriter::new(sink, LibraryVersion::san_andreas());
            texture.write_gif_packet(&mut writer, headers).unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_gif_packet_round_trip() {
        let texture = texture();
        let bytes = written(&texture, true);
        assert_eq!(bytes.len() as u32, texture.stream_size(true));
        assert_eq!(bytes.len(), 16 + 3 * 16 + 16 + 64);

        let mut cursor = Cursor::new(bytes);
        let source: &mut dyn ReadSeek = &mut cursor;
        let mut reader = ChunkReader::new(source, BlockLengthMode::Ignore).unwrap();
        let mut read = GsTexture::new(4, 4);
        let result = read.read_gif_packet(&mut reader, 64, true).unwrap();
        assert!(!result.corrupted_headers);
        assert_eq!(result.bytes_read, 144);
        assert_eq!(read, texture);

        let check = read.verify_transfer(true, FormatEncoding::Tex32, FormatEncoding::Tex32);
        assert!(check.consistent);
        assert_eq!(check.offset, TransmissionOffset { x: 8, y: 0 });
    }

    #[test]
    fn test_corrupted_headers_are_skipped() {
        let mut bytes = vec![0xFFu8; 0x50];
        bytes.extend(0..64u8);

        let mut cursor = Cursor::new(bytes);
        let source: &mut dyn ReadSeek = &mut cursor;
        let mut reader = ChunkReader::new(source, BlockLengthMode::Ignore).unwrap();
        let mut read = GsTexture::new(4, 4);
        let result = read.read_gif_packet(&mut reader, 64, true).unwrap();
        assert!(result.corrupted_headers);
        assert_eq!(result.bytes_read, 0x50 + 64);
        assert_eq!(read.texels, (0..64u8).collect::<Vec<_>>());
    }

    #[test]
    fn test_halved_transfer_width_for_packed_4bit() {
        let mut texture = GsTexture::new(16, 8);
        texture.set_transfer_registers(
            TransmissionOffset::default(),
            FormatEncoding::Tex32,
            FormatEncoding::IdTex8Compressed,
        );
        let reg = TrxReg::from_u64(texture.register(gs_register::TRXREG).unwrap());
        assert_eq!(reg.width, 32);
        assert!(
            texture
                .verify_transfer(true, FormatEncoding::Tex32, FormatEncoding::IdTex8Compressed)
                .consistent
        );
    }
}
