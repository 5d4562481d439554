//! Mapping viewport positions to picking texels
//!
//! Picking textures are rendered at `pixel_ratio / downsizing_ratio` of the
//! viewport size, so one texel may cover several CSS pixels.

use crate::transform::{Coordinates, Dimensions};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickingSurface {
    pub width: u32,
    pub height: u32,
    scale: f64,
}

impl PickingSurface {
    pub fn new(dimensions: Dimensions, pixel_ratio: f64, downsizing_ratio: f64) -> Self {
        let scale = pixel_ratio / downsizing_ratio;
        Self {
            width: texture_extent(dimensions.width * scale),
            height: texture_extent(dimensions.height * scale),
            scale,
        }
    }

    /// Texel under a viewport position, if it lies inside the surface
    pub fn texel(&self, position: Coordinates) -> Option<(u32, u32)> {
        let x = (position.x * self.scale).floor();
        let y = (position.y * self.scale).floor();
        let inside = |value: f64, limit: u32| value >= 0.0 && value < f64::from(limit);
        if !inside(x, self.width) || !inside(y, self.height) {
            return None;
        }
        Some((x as u32, y as u32))
    }
}

/// Texture side for a fractional pixel size, at least one texel
pub fn texture_extent(size: f64) -> u32 {
    if size.is_finite() && size > 1.0 {
        size.ceil() as u32
    } else {
        1
    }
}
