//! Graphics Synthesizer register images
//!
//! Every register is a packed 64-bit word. The structs here unpack the
//! fields RenderWare cares about and pack them back losslessly.

use binrw::{BinRead, BinWrite};

use crate::chunk::FixedHeader;

/// GS register identifiers (GIF A+D addresses)
pub mod gs_register {
    pub const TEX0_1: u8 = 0x06;
    pub const TEX1_1: u8 = 0x14;
    pub const MIPTBP1_1: u8 = 0x34;
    pub const MIPTBP2_1: u8 = 0x36;
    pub const BITBLTBUF: u8 = 0x50;
    pub const TRXPOS: u8 = 0x51;
    pub const TRXREG: u8 = 0x52;
    pub const TRXDIR: u8 = 0x53;

    /// GIF register descriptor selecting packed A+D mode
    pub const A_D: u8 = 0x0E;
}

#[inline]
fn field(value: u64, shift: u32, width: u32) -> u64 {
    (value >> shift) & ((1u64 << width) - 1)
}

#[inline]
fn place(value: u64, shift: u32, width: u32) -> u64 {
    (value & ((1u64 << width) - 1)) << shift
}

/// TEX0: texture buffer, format, size and CLUT setup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tex0 {
    pub texture_base_pointer: u32,
    pub texture_buffer_width: u32,
    pub pixel_storage_format: u32,
    pub texture_width_log2: u32,
    pub texture_height_log2: u32,
    pub texture_color_component: u32,
    pub texture_function: u32,
    pub clut_base_pointer: u32,
    pub clut_storage_format: u32,
    pub clut_storage_mode: u32,
    pub clut_entry_offset: u32,
    pub clut_load_control: u32,
}

impl Tex0 {
    pub fn from_u64(v: u64) -> Self {
        Self {
            texture_base_pointer: field(v, 0, 14) as u32,
            texture_buffer_width: field(v, 14, 6) as u32,
            pixel_storage_format: field(v, 20, 6) as u32,
            texture_width_log2: field(v, 26, 4) as u32,
            texture_height_log2: field(v, 30, 4) as u32,
            texture_color_component: field(v, 34, 1) as u32,
            texture_function: field(v, 35, 2) as u32,
            clut_base_pointer: field(v, 37, 14) as u32,
            clut_storage_format: field(v, 51, 4) as u32,
            clut_storage_mode: field(v, 55, 1) as u32,
            clut_entry_offset: field(v, 56, 5) as u32,
            clut_load_control: field(v, 61, 3) as u32,
        }
    }

    pub fn to_u64(&self) -> u64 {
        place(self.texture_base_pointer as u64, 0, 14)
            | place(self.texture_buffer_width as u64, 14, 6)
            | place(self.pixel_storage_format as u64, 20, 6)
            | place(self.texture_width_log2 as u64, 26, 4)
            | place(self.texture_height_log2 as u64, 30, 4)
            | place(self.texture_color_component as u64, 34, 1)
            | place(self.texture_function as u64, 35, 2)
            | place(self.clut_base_pointer as u64, 37, 14)
            | place(self.clut_storage_format as u64, 51, 4)
            | place(self.clut_storage_mode as u64, 55, 1)
            | place(self.clut_entry_offset as u64, 56, 5)
            | place(self.clut_load_control as u64, 61, 3)
    }
}

/// TEX1: level of detail and filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tex1 {
    pub lod_calculation_model: u32,
    pub unknown2: u32,
    pub maximum_mip_level: u32,
    pub mmag: u32,
    pub mmin: u32,
    pub mtba: u32,
    pub unknown: u32,
    pub lod_param_l: u32,
    pub lod_param_k: u32,
}

impl Tex1 {
    pub fn from_u64(v: u64) -> Self {
        Self {
            lod_calculation_model: field(v, 0, 1) as u32,
            unknown2: field(v, 1, 1) as u32,
            maximum_mip_level: field(v, 2, 3) as u32,
            mmag: field(v, 5, 1) as u32,
            mmin: field(v, 6, 3) as u32,
            mtba: field(v, 9, 1) as u32,
            unknown: field(v, 10, 1) as u32,
            lod_param_l: field(v, 19, 2) as u32,
            lod_param_k: field(v, 32, 12) as u32,
        }
    }

    pub fn to_u64(&self) -> u64 {
        place(self.lod_calculation_model as u64, 0, 1)
            | place(self.unknown2 as u64, 1, 1)
            | place(self.maximum_mip_level as u64, 2, 3)
            | place(self.mmag as u64, 5, 1)
            | place(self.mmin as u64, 6, 3)
            | place(self.mtba as u64, 9, 1)
            | place(self.unknown as u64, 10, 1)
            | place(self.lod_param_l as u64, 19, 2)
            | place(self.lod_param_k as u64, 32, 12)
    }
}

/// MIPTBP1 / MIPTBP2: base pointer and buffer width of three mip levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MipTbp {
    pub base_pointer: [u32; 3],
    pub buffer_width: [u32; 3],
}

impl MipTbp {
    pub fn from_u64(v: u64) -> Self {
        let mut reg = Self::default();
        for i in 0..3 {
            let shift = i as u32 * 20;
            reg.base_pointer[i] = field(v, shift, 14) as u32;
            reg.buffer_width[i] = field(v, shift + 14, 6) as u32;
        }
        reg
    }

    pub fn to_u64(&self) -> u64 {
        (0..3).fold(0u64, |acc, i| {
            let shift = i as u32 * 20;
            acc | place(self.base_pointer[i] as u64, shift, 14) | place(self.buffer_width[i] as u64, shift + 14, 6)
        })
    }
}

/// TRXPOS: source and destination corner of a local transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrxPos {
    pub ssax: u32,
    pub ssay: u32,
    pub dsax: u32,
    pub dsay: u32,
    pub dir: u32,
}

impl TrxPos {
    pub fn from_u64(v: u64) -> Self {
        Self {
            ssax: field(v, 0, 11) as u32,
            ssay: field(v, 16, 11) as u32,
            dsax: field(v, 32, 11) as u32,
            dsay: field(v, 48, 11) as u32,
            dir: field(v, 59, 2) as u32,
        }
    }

    pub fn to_u64(&self) -> u64 {
        place(self.ssax as u64, 0, 11)
            | place(self.ssay as u64, 16, 11)
            | place(self.dsax as u64, 32, 11)
            | place(self.dsay as u64, 48, 11)
            | place(self.dir as u64, 59, 2)
    }
}

/// TRXREG: size of the transmission area
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrxReg {
    pub width: u32,
    pub height: u32,
}

impl TrxReg {
    pub fn from_u64(v: u64) -> Self {
        Self {
            width: field(v, 0, 12) as u32,
            height: field(v, 32, 12) as u32,
        }
    }

    pub fn to_u64(&self) -> u64 {
        place(self.width as u64, 0, 12) | place(self.height as u64, 32, 12)
    }
}

/// TRXDIR: transfer direction (0 = host to local)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrxDir {
    pub xdir: u32,
}

impl TrxDir {
    pub fn from_u64(v: u64) -> Self {
        Self {
            xdir: field(v, 0, 2) as u32,
        }
    }

    pub fn to_u64(&self) -> u64 {
        place(self.xdir as u64, 0, 2)
    }
}

/// Registers RenderWare keeps in the PS2 meta header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GsRegisters {
    pub tex0: Tex0,
    pub tex1: Tex1,
    pub miptbp1: MipTbp,
    pub miptbp2: MipTbp,
}

/// GIF tag, 128 bits on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GifTag {
    pub nloop: u32,
    pub eop: bool,
    pub pre: bool,
    pub prim: u32,
    pub flg: u32,
    pub nreg: u32,
    pub regs: u64,
}

impl GifTag {
    /// Register list tag: `count` A+D register writes follow
    pub fn register_list(count: u32) -> Self {
        Self {
            nloop: count,
            nreg: 1,
            regs: gs_register::A_D as u64,
            ..Default::default()
        }
    }

    /// IMAGE mode tag for `data_size` bytes of texels
    pub fn image(data_size: u32) -> Self {
        Self {
            nloop: data_size / 16,
            flg: 2,
            ..Default::default()
        }
    }

    pub fn register_id(&self, index: u32) -> u32 {
        ((self.regs >> (index * 4)) & 0xF) as u32
    }

    pub fn from_raw(raw: &RawGifTag) -> Self {
        let v = raw.props;
        Self {
            nloop: field(v, 0, 15) as u32,
            eop: field(v, 15, 1) != 0,
            pre: field(v, 46, 1) != 0,
            prim: field(v, 47, 11) as u32,
            flg: field(v, 58, 2) as u32,
            nreg: field(v, 60, 4) as u32,
            regs: raw.regs,
        }
    }

    pub fn to_raw(&self) -> RawGifTag {
        RawGifTag {
            props: place(self.nloop as u64, 0, 15)
                | place(self.eop as u64, 15, 1)
                | place(self.pre as u64, 46, 1)
                | place(self.prim as u64, 47, 11)
                | place(self.flg as u64, 58, 2)
                | place(self.nreg as u64, 60, 4),
            regs: self.regs,
        }
    }
}

/// Serialized GIF tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct RawGifTag {
    pub props: u64,
    pub regs: u64,
}

impl FixedHeader for RawGifTag {
    const SIZE: usize = 16;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tex0_fields() {
        let tex0 = Tex0 {
            texture_base_pointer: 0x3FFF,
            texture_buffer_width: 2,
            pixel_storage_format: 19,
            texture_width_log2: 7,
            texture_height_log2: 6,
            texture_color_component: 1,
            texture_function: 0,
            clut_base_pointer: 0x120,
            clut_storage_format: 0,
            clut_storage_mode: 0,
            clut_entry_offset: 0,
            clut_load_control: 1,
        };
        let raw = tex0.to_u64();
        assert_eq!(raw & 0x3FFF, 0x3FFF);
        assert_eq!((raw >> 20) & 0x3F, 19);
        assert_eq!((raw >> 61) & 0x7, 1);
        assert_eq!(Tex0::from_u64(raw), tex0);
    }

    #[test]
    fn test_transfer_registers() {
        let pos = TrxPos {
            dsax: 0x7FF,
            dsay: 3,
            ..Default::default()
        };
        assert_eq!(pos.to_u64(), (0x7FFu64 << 32) | (3u64 << 48));
        assert_eq!(TrxPos::from_u64(pos.to_u64()), pos);

        let reg = TrxReg { width: 64, height: 32 };
        assert_eq!(reg.to_u64(), 64 | (32u64 << 32));
    }

    #[test]
    fn test_gif_tags() {
        let tag = GifTag::register_list(3);
        let raw = tag.to_raw();
        assert_eq!(raw.props, 3 | (1u64 << 60));
        assert_eq!(raw.regs, 0xE);
        assert_eq!(GifTag::from_raw(&raw).register_id(0), 0xE);

        let image = GifTag::from_raw(&GifTag::image(256).to_raw());
        assert_eq!((image.nloop, image.flg, image.nreg), (16, 2, 0));
    }
}
