//! Registry of native texture codecs

use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::Lazy;

use super::{CompatibilityResult, NativeTextureCodec};
use crate::chunk::BlockReader;
use crate::error::{BinaryError, Result};

static DEFAULT_REGISTRY: Lazy<CodecRegistry> = Lazy::new(CodecRegistry::with_default_codecs);

/// Shared registry holding the codecs compiled into this build
pub fn default_registry() -> &'static CodecRegistry {
    &DEFAULT_REGISTRY
}

/// Codecs known to a dictionary reader/writer, in registration order
///
/// Built once and passed by reference; lookups never mutate it.
#[derive(Debug, Clone, Default)]
pub struct CodecRegistry {
    codecs: IndexMap<String, Arc<dyn NativeTextureCodec>>,
}

impl CodecRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every codec compiled into this build
    pub fn with_default_codecs() -> Self {
        let mut registry = Self::new();
        #[allow(unused_mut)]
        let mut defaults: Vec<Arc<dyn NativeTextureCodec>> = vec![
            Arc::new(crate::native::d3d::D3D8Codec),
            Arc::new(crate::native::d3d::D3D9Codec),
            Arc::new(crate::native::ps2::Ps2Codec),
        ];
        #[cfg(feature = "pvr")]
        defaults.push(Arc::new(crate::native::pvr::PvrCodec));
        for codec in defaults {
            // Default names are distinct
            let _ = registry.register(codec);
        }
        registry
    }

    /// Add a codec; names must be unique (case insensitive)
    pub fn register(&mut self, codec: Arc<dyn NativeTextureCodec>) -> Result<()> {
        let key = codec.name().to_ascii_lowercase();
        if self.codecs.contains_key(&key) {
            return Err(BinaryError::invalid_data(format!(
                "native texture type '{}' is already registered",
                codec.name()
            )));
        }
        tracing::debug!("registered native texture type {} (driver {})", codec.name(), codec.driver_id());
        self.codecs.insert(key, codec);
        Ok(())
    }

    /// Remove a codec by name
    pub fn unregister(&mut self, name: &str) -> Option<Arc<dyn NativeTextureCodec>> {
        self.codecs.shift_remove(&name.to_ascii_lowercase())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn NativeTextureCodec>> {
        self.codecs.get(&name.to_ascii_lowercase()).cloned()
    }

    /// Like [`get`](Self::get) but fails with `UnknownPlatform`
    pub fn require(&self, name: &str) -> Result<Arc<dyn NativeTextureCodec>> {
        self.get(name)
            .ok_or_else(|| BinaryError::unknown_platform(format!("no native texture type named '{}'", name)))
    }

    pub fn by_driver_id(&self, driver_id: u16) -> Option<Arc<dyn NativeTextureCodec>> {
        self.codecs.values().find(|c| c.driver_id() == driver_id).cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.codecs.values().map(|c| c.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn NativeTextureCodec>> {
        self.codecs.values()
    }

    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }

    /// Find the codec for the texture native payload at the reader position
    ///
    /// The first `Absolute` answer wins; otherwise the first `Maybe`. The
    /// stream position is restored after every probe. Probe errors count as
    /// `None`.
    pub fn detect(&self, reader: &mut BlockReader<'_>) -> Result<Option<Arc<dyn NativeTextureCodec>>> {
        let start = reader.position()?;
        let mut fallback = None;

        for codec in self.codecs.values() {
            let depth = reader.depth();
            let result = codec.is_compatible_block(reader);
            reader.seek_to(start)?;
            if reader.depth() != depth {
                return Err(BinaryError::codec(codec.name(), "probe left a block context open"));
            }

            match result {
                Ok(CompatibilityResult::Absolute) => {
                    tracing::debug!("texture block claimed by {}", codec.name());
                    return Ok(Some(codec.clone()));
                }
                Ok(CompatibilityResult::Maybe) => {
                    if fallback.is_none() {
                        fallback = Some(codec.clone());
                    }
                }
                Ok(CompatibilityResult::None) => {}
                Err(err) => tracing::debug!("{} probe failed: {}", codec.name(), err),
            }
        }

        if let Some(codec) = &fallback {
            tracing::debug!("texture block tentatively matched by {}", codec.name());
        }
        Ok(fallback)
    }
}
