//! Named texture handle

use std::sync::Arc;

use rw_txd_core::{Diagnostics, LibraryVersion};
use serde::{Deserialize, Serialize};

use super::raster::Raster;
use crate::codec::TextureProperties;
use crate::extensions::Extensions;
use crate::pixel::{AddressMode, FilterMode, TexFormatInfo};

/// A texture: name, sampling state and an optional shared raster
#[derive(Debug, Clone)]
pub struct TextureBase {
    name: String,
    mask_name: String,
    format_info: TexFormatInfo,
    raster: Option<Arc<Raster>>,
    version: LibraryVersion,
    pub extensions: Extensions,
}

impl TextureBase {
    pub fn new(name: impl Into<String>, version: LibraryVersion) -> Self {
        Self {
            name: name.into(),
            mask_name: String::new(),
            format_info: TexFormatInfo::new(FilterMode::Linear, AddressMode::Wrap, AddressMode::Wrap),
            raster: None,
            version,
            extensions: Extensions::new(),
        }
    }

    /// Texture assembled from a codec's deserialized properties
    pub fn from_properties(properties: TextureProperties, raster: Arc<Raster>, extensions: Extensions) -> Self {
        let version = raster.version();
        Self {
            name: properties.name,
            mask_name: properties.mask_name,
            format_info: properties.format_info,
            raster: Some(raster),
            version,
            extensions,
        }
    }

    /// Properties handed to a codec when serializing
    pub fn properties(&self) -> TextureProperties {
        TextureProperties {
            name: self.name.clone(),
            mask_name: self.mask_name.clone(),
            format_info: self.format_info,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn mask_name(&self) -> &str {
        &self.mask_name
    }

    pub fn set_mask_name(&mut self, name: impl Into<String>) {
        self.mask_name = name.into();
    }

    pub fn format_info(&self) -> TexFormatInfo {
        self.format_info
    }

    pub fn filter_mode(&self) -> Option<FilterMode> {
        self.format_info.filter()
    }

    pub fn set_filter_mode(&mut self, mode: FilterMode) {
        self.format_info.filter_mode = mode as u8;
    }

    pub fn u_addressing(&self) -> Option<AddressMode> {
        self.format_info.u_mode()
    }

    pub fn v_addressing(&self) -> Option<AddressMode> {
        self.format_info.v_mode()
    }

    pub fn set_addressing(&mut self, u: AddressMode, v: AddressMode) {
        self.format_info.u_addressing = u as u8;
        self.format_info.v_addressing = v as u8;
    }

    pub fn raster(&self) -> Option<&Arc<Raster>> {
        self.raster.as_ref()
    }

    /// Attach a raster, returning the previous one
    pub fn set_raster(&mut self, raster: Option<Arc<Raster>>) -> Option<Arc<Raster>> {
        if let Some(raster) = &raster {
            raster.set_version(self.version);
        }
        std::mem::replace(&mut self.raster, raster)
    }

    pub fn version(&self) -> LibraryVersion {
        self.version
    }

    /// Change the engine version of the texture and its raster
    pub fn set_engine_version(&mut self, version: LibraryVersion) {
        self.version = version;
        if let Some(raster) = &self.raster {
            raster.set_version(version);
        }
    }

    fn raster_mipmap_count(&self) -> usize {
        self.raster.as_ref().map(|r| r.mipmap_count()).unwrap_or(0)
    }

    /// Switch point sampling to linear, using the mipmap variant when levels exist
    pub fn improve_filtering(&mut self) {
        let has_mipmaps = self.raster_mipmap_count() > 1;
        let improved = match self.filter_mode() {
            Some(FilterMode::Point | FilterMode::Linear) if has_mipmaps => FilterMode::LinearLinear,
            Some(FilterMode::Point) => FilterMode::Linear,
            Some(FilterMode::PointPoint | FilterMode::PointLinear | FilterMode::LinearPoint) => {
                if has_mipmaps {
                    FilterMode::LinearLinear
                } else {
                    FilterMode::Linear
                }
            }
            Some(other) => other,
            None => return,
        };
        self.set_filter_mode(improved);
    }

    /// Drop mipmap filter modes when the raster has a single level
    pub fn fix_filtering(&mut self, diagnostics: &Diagnostics) -> bool {
        let count = self.raster_mipmap_count();
        let changed = self.format_info.fix_filtering(count);
        if changed {
            diagnostics.push_leveled_warning(
                2,
                format!("texture '{}' uses mipmap filtering without mipmaps; fixed", self.name),
            );
        }
        changed
    }
}

/// Placeholder for a texture entry that could not be loaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedTexture {
    /// Position of the entry in the dictionary
    pub index: usize,
    pub name: Option<String>,
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filtering_without_raster() {
        let mut texture = TextureBase::new("grass", LibraryVersion::san_andreas());
        texture.set_filter_mode(FilterMode::Point);
        texture.improve_filtering();
        assert_eq!(texture.filter_mode(), Some(FilterMode::Linear));

        texture.set_filter_mode(FilterMode::LinearLinear);
        assert!(texture.fix_filtering(&Diagnostics::new(3)));
        assert_eq!(texture.filter_mode(), Some(FilterMode::Linear));
        assert!(!texture.fix_filtering(&Diagnostics::new(3)));
    }

    #[test]
    fn test_properties_round_trip() {
        let mut texture = TextureBase::new("road", LibraryVersion::san_andreas());
        texture.set_mask_name("roada");
        texture.set_addressing(AddressMode::Clamp, AddressMode::Mirror);
        let props = texture.properties();
        assert_eq!(props.name, "road");
        assert_eq!(props.mask_name, "roada");
        assert_eq!(props.format_info.u_mode(), Some(AddressMode::Clamp));
        assert_eq!(props.format_info.v_mode(), Some(AddressMode::Mirror));
    }
}
