//! In-memory RenderWare objects: rasters, textures and dictionaries

pub mod dictionary;
pub mod raster;
pub mod texture;

pub use dictionary::TexDictionary;
pub use raster::Raster;
pub use texture::{FailedTexture, TextureBase};
