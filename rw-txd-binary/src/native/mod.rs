//! Platform native texture codecs

pub(crate) mod common;
pub mod d3d;
pub mod ps2;
#[cfg(feature = "pvr")]
pub mod pvr;

pub use d3d::{D3D8Codec, D3D9Codec, NativeTextureD3D8, NativeTextureD3D9};
pub use ps2::{NativeTexturePS2, Ps2Codec};
#[cfg(feature = "pvr")]
pub use pvr::{NativeTexturePVR, PvrCodec};
