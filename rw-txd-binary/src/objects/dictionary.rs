//! Texture dictionary object

use rw_txd_core::{LibraryVersion, driver};

use super::texture::{FailedTexture, TextureBase};
use crate::extensions::Extensions;

/// Ordered collection of textures
#[derive(Debug, Clone)]
pub struct TexDictionary {
    textures: Vec<TextureBase>,
    version: LibraryVersion,
    /// Driver id read from the meta block, used when the dictionary is empty
    stored_recommended_driver: u16,
    /// Entries that failed to load
    pub failed: Vec<FailedTexture>,
    pub extensions: Extensions,
}

impl Default for TexDictionary {
    fn default() -> Self {
        Self::new(LibraryVersion::default())
    }
}

impl TexDictionary {
    pub fn new(version: LibraryVersion) -> Self {
        Self {
            textures: Vec::new(),
            version,
            stored_recommended_driver: driver::NONE,
            failed: Vec::new(),
            extensions: Extensions::new(),
        }
    }

    pub fn textures(&self) -> &[TextureBase] {
        &self.textures
    }

    pub fn textures_mut(&mut self) -> impl Iterator<Item = &mut TextureBase> {
        self.textures.iter_mut()
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    /// Append a texture, moving it to the dictionary version
    pub fn add_texture(&mut self, mut texture: TextureBase) {
        if texture.version() != self.version {
            texture.set_engine_version(self.version);
        }
        self.textures.push(texture);
    }

    /// Append a deserialized texture as stored in the stream
    pub(crate) fn push_loaded(&mut self, texture: TextureBase) {
        self.textures.push(texture);
    }

    /// Detach a texture; the caller keeps it alive
    pub fn remove_texture(&mut self, index: usize) -> Option<TextureBase> {
        if index < self.textures.len() {
            Some(self.textures.remove(index))
        } else {
            None
        }
    }

    /// First texture with a case-insensitive name match
    pub fn find_texture(&self, name: &str) -> Option<&TextureBase> {
        self.textures.iter().find(|t| t.name().eq_ignore_ascii_case(name))
    }

    pub fn find_texture_mut(&mut self, name: &str) -> Option<&mut TextureBase> {
        self.textures.iter_mut().find(|t| t.name().eq_ignore_ascii_case(name))
    }

    pub fn version(&self) -> LibraryVersion {
        self.version
    }

    /// Change the engine version of the dictionary and everything it holds
    pub fn set_engine_version(&mut self, version: LibraryVersion) {
        self.version = version;
        for texture in &mut self.textures {
            texture.set_engine_version(version);
        }
    }

    pub fn set_stored_recommended_driver(&mut self, driver_id: u16) {
        self.stored_recommended_driver = driver_id;
    }

    /// Driver id every texture agrees on, `driver::NONE` otherwise
    ///
    /// Textures without a raster, or whose codec has no driver id, do not
    /// take part in the vote.
    pub fn recommended_driver(&self) -> u16 {
        if self.textures.is_empty() {
            return self.stored_recommended_driver;
        }
        let mut agreed: Option<u16> = None;
        for texture in &self.textures {
            let Some(raster) = texture.raster() else {
                continue;
            };
            let id = raster.driver_id();
            if id == driver::NONE {
                continue;
            }
            match agreed {
                None => agreed = Some(id),
                Some(current) if current != id => return driver::NONE,
                Some(_) => {}
            }
        }
        agreed.unwrap_or(driver::NONE)
    }

    /// Display name of the recommended platform
    pub fn recommended_platform(&self) -> Option<&'static str> {
        driver::name(self.recommended_driver())
    }
}
