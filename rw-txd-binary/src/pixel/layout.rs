//! Row, mipmap and dimension arithmetic

use serde::{Deserialize, Serialize};

/// Bytes in one row of `width` samples at `depth` bits, padded to `alignment`
pub fn raster_row_size(width: u32, depth: u32, alignment: u32) -> u32 {
    let unaligned = (width as u64 * depth as u64).div_ceil(8) as u32;
    align_size(unaligned, alignment)
}

/// Round `value` up to a multiple of `alignment` (0 or 1 leaves it alone)
pub fn align_size(value: u32, alignment: u32) -> u32 {
    if alignment <= 1 {
        return value;
    }
    value.div_ceil(alignment) * alignment
}

pub fn raster_data_size(row_size: u32, height: u32) -> u32 {
    row_size * height
}

/// Byte size of `count` palette entries of `depth` bits
pub fn palette_data_size(count: u32, depth: u32) -> u32 {
    (count as u64 * depth as u64).div_ceil(8) as u32
}

/// Dimensions of mipmap `level` of a `width`x`height` base
pub fn mipmap_dimensions(width: u32, height: u32, level: u32) -> (u32, u32) {
    ((width >> level).max(1), (height >> level).max(1))
}

/// Number of levels in a full chain down to 1x1
pub fn full_mipmap_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// Dimensions that cover `width`x`height` in whole blocks
pub fn block_aligned_dimensions(width: u32, height: u32, block_width: u32, block_height: u32) -> (u32, u32) {
    (
        align_size(width.max(1), block_width),
        align_size(height.max(1), block_height),
    )
}

/// Dimension limitations of a native texture format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SizeRules {
    pub power_of_two: bool,
    pub squared: bool,
    pub multiple_of: Option<u32>,
    pub maximum: Option<u32>,
}

impl SizeRules {
    pub fn unrestricted() -> Self {
        Self::default()
    }

    pub fn verify_dimensions(&self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 {
            return false;
        }
        if self.power_of_two && (!width.is_power_of_two() || !height.is_power_of_two()) {
            return false;
        }
        if self.squared && width != height {
            return false;
        }
        if let Some(multiple) = self.multiple_of.filter(|&m| m > 1) {
            if width % multiple != 0 || height % multiple != 0 {
                return false;
            }
        }
        if let Some(max) = self.maximum {
            if width > max || height > max {
                return false;
            }
        }
        true
    }

    /// Smallest valid dimensions covering `width`x`height`
    pub fn adjust_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        let mut w = width.max(1);
        let mut h = height.max(1);

        if self.power_of_two {
            w = w.next_power_of_two();
            h = h.next_power_of_two();
        }
        if let Some(multiple) = self.multiple_of.filter(|&m| m > 1) {
            w = align_size(w, multiple);
            h = align_size(h, multiple);
        }
        if self.squared {
            let side = w.max(h);
            w = side;
            h = side;
        }
        if let Some(max) = self.maximum {
            w = w.min(max);
            h = h.min(max);
        }
        (w, h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_size() {
        assert_eq!(raster_row_size(3, 8, 4), 4);
        assert_eq!(raster_row_size(3, 4, 1), 2);
        assert_eq!(raster_row_size(64, 32, 4), 256);
        assert_eq!(raster_row_size(5, 24, 4), 16);
        assert_eq!(raster_row_size(5, 24, 1), 15);
        assert_eq!(palette_data_size(16, 32), 64);
    }

    #[test]
    fn test_mipmap_dimensions() {
        assert_eq!(mipmap_dimensions(64, 16, 5), (2, 1));
        assert_eq!(mipmap_dimensions(64, 16, 7), (1, 1));
        assert_eq!(full_mipmap_count(64, 16), 7);
        assert_eq!(full_mipmap_count(1, 1), 1);
    }

    #[test]
    fn test_size_rules() {
        let rules = SizeRules {
            power_of_two: true,
            squared: true,
            ..Default::default()
        };
        assert!(rules.verify_dimensions(64, 64));
        assert!(!rules.verify_dimensions(64, 32));
        assert!(!rules.verify_dimensions(48, 48));
        assert_eq!(rules.adjust_dimensions(48, 20), (64, 64));

        let rules = SizeRules {
            multiple_of: Some(4),
            maximum: Some(2048),
            ..Default::default()
        };
        assert!(rules.verify_dimensions(12, 8));
        assert!(!rules.verify_dimensions(6, 8));
        assert_eq!(rules.adjust_dimensions(6, 4096), (8, 2048));
    }
}
