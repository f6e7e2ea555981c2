//! Image import/export helpers
//!
//! Bridges between the canonical pixel model and the `image` crate.

pub mod export;

pub use export::{TextureExporter, mipmap_to_rgba_image, pixel_data_from_rgba_image};
