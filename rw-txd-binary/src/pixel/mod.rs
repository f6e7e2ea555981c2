//! Canonical pixel format model
//!
//! Raster descriptors, texel dispatch, layout conversion and the
//! block-compressed (DXT) support shared by every native texture codec.

pub mod convert;
pub mod dxt;
pub mod formats;
pub mod layout;
pub mod palette;
pub mod texel;
pub mod types;

pub use convert::{
    RasterLayout, calculate_has_alpha, convert_mipmap_layer, convert_palette_data, convert_pixel_data,
};
pub use dxt::{compressed_data_size, compressed_has_alpha, decompress_pixel_data};
pub use formats::{
    AddressMode, ColorModel, ColorOrdering, CompressionType, FilterMode, PaletteType, RasterFormat,
    RasterFormatFlags, RasterFormatInfo, TexFormatInfo, can_raster_format_have_alpha, default_raster_format_string,
    generate_raster_format_flags, read_raster_format_flags,
};
pub use layout::{
    SizeRules, align_size, block_aligned_dimensions, full_mipmap_count, mipmap_dimensions, palette_data_size,
    raster_data_size, raster_row_size,
};
pub use palette::{median_cut, palettize_pixel_data};
pub use texel::{
    ColorDispatcher, Rgba, browse_texel_luminance, browse_texel_rgba, get_palette_index, palette_entry_depth,
    put_texel_luminance, put_texel_rgba, set_palette_index,
};
pub use types::{MipmapLayer, PixelData, RASTER_TYPE_BITMAP, RawMipmapLayer};
