//! Web Mercator (EPSG:3857) tiling scheme.
//!
//! Tiles are square in projected meters. The projection cannot represent the
//! poles, so the scheme covers latitudes up to ±85.05112878°, where the
//! projected square closes.

use std::f64::consts::{FRAC_PI_2, PI};

use super::{tile_index, Cartographic, Extent, TileCoord, TileGrid};

/// Semi-major axis of the WGS84 ellipsoid in meters.
pub const WGS84_MAXIMUM_RADIUS: f64 = 6_378_137.0;

/// Web Mercator tiling scheme with a single level-zero tile.
#[derive(Debug, Clone, PartialEq)]
pub struct WebMercatorTilingScheme {
    radius: f64,
    level_zero_tiles_x: u32,
    level_zero_tiles_y: u32,
}

impl WebMercatorTilingScheme {
    /// Creates the standard scheme on the WGS84 ellipsoid.
    pub fn new() -> Self {
        Self {
            radius: WGS84_MAXIMUM_RADIUS,
            level_zero_tiles_x: 1,
            level_zero_tiles_y: 1,
        }
    }

    /// Latitude, in radians, at which the projected map becomes square.
    pub fn maximum_latitude() -> f64 {
        mercator_angle_to_geodetic_latitude(PI)
    }

    /// Projects a position to Web Mercator meters.
    pub fn project(&self, position: &Cartographic) -> (f64, f64) {
        (
            position.longitude * self.radius,
            geodetic_latitude_to_mercator_angle(position.latitude) * self.radius,
        )
    }

    /// Unprojects Web Mercator meters to a position.
    pub fn unproject(&self, x: f64, y: f64) -> Cartographic {
        Cartographic::new(
            x / self.radius,
            mercator_angle_to_geodetic_latitude(y / self.radius),
        )
    }

    /// Half the width of the projected square in meters.
    fn half_extent(&self) -> f64 {
        PI * self.radius
    }
}

impl Default for WebMercatorTilingScheme {
    fn default() -> Self {
        Self::new()
    }
}

impl TileGrid for WebMercatorTilingScheme {
    fn extent(&self) -> Extent {
        let max_lat = Self::maximum_latitude();
        Extent::new(-PI, -max_lat, PI, max_lat)
    }

    fn number_of_level_zero_tiles_x(&self) -> u32 {
        self.level_zero_tiles_x
    }

    fn number_of_level_zero_tiles_y(&self) -> u32 {
        self.level_zero_tiles_y
    }

    fn tile_xy_to_extent(&self, x: u32, y: u32, level: u32) -> Extent {
        let half = self.half_extent();
        let tile_width = 2.0 * half / self.number_of_x_tiles_at_level(level) as f64;
        let tile_height = 2.0 * half / self.number_of_y_tiles_at_level(level) as f64;

        let west = -half + x as f64 * tile_width;
        let north = half - y as f64 * tile_height;

        let north_west = self.unproject(west, north);
        let south_east = self.unproject(west + tile_width, north - tile_height);

        Extent::new(
            north_west.longitude,
            south_east.latitude,
            south_east.longitude,
            north_west.latitude,
        )
    }

    fn position_to_tile_xy(&self, position: &Cartographic, level: u32) -> Option<TileCoord> {
        if !self.extent().contains(position) {
            return None;
        }

        let half = self.half_extent();
        let tiles_x = self.number_of_x_tiles_at_level(level);
        let tiles_y = self.number_of_y_tiles_at_level(level);
        let tile_width = 2.0 * half / tiles_x as f64;
        let tile_height = 2.0 * half / tiles_y as f64;

        let (px, py) = self.project(position);
        let x = tile_index(px + half, tile_width, tiles_x);
        let y = tile_index(half - py, tile_height, tiles_y);

        Some(TileCoord::new(x, y, level))
    }
}

/// Converts a geodetic latitude to the Mercator angle, clamping to the
/// representable range.
fn geodetic_latitude_to_mercator_angle(latitude: f64) -> f64 {
    let max_lat = WebMercatorTilingScheme::maximum_latitude();
    let latitude = latitude.clamp(-max_lat, max_lat);
    let sin_latitude = latitude.sin();
    0.5 * ((1.0 + sin_latitude) / (1.0 - sin_latitude)).ln()
}

fn mercator_angle_to_geodetic_latitude(angle: f64) -> f64 {
    FRAC_PI_2 - 2.0 * (-angle).exp().atan()
}
