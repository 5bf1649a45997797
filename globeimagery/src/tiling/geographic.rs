//! Equirectangular (geographic) tiling scheme.

use super::{tile_index, Cartographic, Extent, TileCoord, TileGrid};

/// Geographic tiling scheme.
///
/// Longitude and latitude map linearly onto tile columns and rows. The
/// default covers the whole globe with two level-zero tiles side by side,
/// each spanning 180° × 180°.
#[derive(Debug, Clone, PartialEq)]
pub struct GeographicTilingScheme {
    extent: Extent,
    level_zero_tiles_x: u32,
    level_zero_tiles_y: u32,
}

impl GeographicTilingScheme {
    /// Creates the whole-globe scheme with 2×1 level-zero tiles.
    pub fn new() -> Self {
        Self::with_extent(Extent::MAX_VALUE, 2, 1)
    }

    /// Creates a scheme over a custom extent.
    ///
    /// # Panics
    ///
    /// Panics if either level-zero tile count is zero.
    pub fn with_extent(extent: Extent, level_zero_tiles_x: u32, level_zero_tiles_y: u32) -> Self {
        assert!(
            level_zero_tiles_x > 0 && level_zero_tiles_y > 0,
            "level-zero tile counts must be positive"
        );
        Self {
            extent,
            level_zero_tiles_x,
            level_zero_tiles_y,
        }
    }
}

impl Default for GeographicTilingScheme {
    fn default() -> Self {
        Self::new()
    }
}

impl TileGrid for GeographicTilingScheme {
    fn extent(&self) -> Extent {
        self.extent
    }

    fn number_of_level_zero_tiles_x(&self) -> u32 {
        self.level_zero_tiles_x
    }

    fn number_of_level_zero_tiles_y(&self) -> u32 {
        self.level_zero_tiles_y
    }

    fn tile_xy_to_extent(&self, x: u32, y: u32, level: u32) -> Extent {
        let tile_width = self.extent.width() / self.number_of_x_tiles_at_level(level) as f64;
        let tile_height = self.extent.height() / self.number_of_y_tiles_at_level(level) as f64;

        let west = self.extent.west + x as f64 * tile_width;
        let north = self.extent.north - y as f64 * tile_height;

        Extent::new(west, north - tile_height, west + tile_width, north)
    }

    fn position_to_tile_xy(&self, position: &Cartographic, level: u32) -> Option<TileCoord> {
        if !self.extent.contains(position) {
            return None;
        }

        let tiles_x = self.number_of_x_tiles_at_level(level);
        let tiles_y = self.number_of_y_tiles_at_level(level);
        let tile_width = self.extent.width() / tiles_x as f64;
        let tile_height = self.extent.height() / tiles_y as f64;

        let x = tile_index(position.longitude - self.extent.west, tile_width, tiles_x);
        let y = tile_index(self.extent.north - position.latitude, tile_height, tiles_y);

        Some(TileCoord::new(x, y, level))
    }
}
