//! Tiling schemes for imagery quadtrees.
//!
//! A tiling scheme maps a cartographic extent onto a pyramid of tiles
//! addressed by `(x, y, level)` and back. Two schemes are supported:
//!
//! - [`GeographicTilingScheme`]: equirectangular, longitude/latitude map
//!   linearly onto tile columns/rows.
//! - [`WebMercatorTilingScheme`]: the EPSG:3857 projection used by most
//!   tiled web imagery services.
//!
//! # Coordinate Conventions
//!
//! All angles are radians. Tile `x` grows west to east and tile `y` grows
//! north to south, so `(0, 0)` is always the north-west tile of a level.

mod geographic;
mod web_mercator;

pub use geographic::GeographicTilingScheme;
pub use web_mercator::{WebMercatorTilingScheme, WGS84_MAXIMUM_RADIUS};

use std::f64::consts::PI;
use std::fmt;

/// A position on the globe in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cartographic {
    /// Longitude in radians, west negative.
    pub longitude: f64,
    /// Latitude in radians, south negative.
    pub latitude: f64,
}

impl Cartographic {
    /// Creates a position from radians.
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    /// Creates a position from decimal degrees.
    pub fn from_degrees(longitude: f64, latitude: f64) -> Self {
        Self::new(longitude.to_radians(), latitude.to_radians())
    }
}

/// A cartographic rectangle in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl Extent {
    /// The whole globe in geographic coordinates.
    pub const MAX_VALUE: Extent = Extent {
        west: -PI,
        south: -PI / 2.0,
        east: PI,
        north: PI / 2.0,
    };

    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Creates an extent from decimal degrees.
    pub fn from_degrees(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self::new(
            west.to_radians(),
            south.to_radians(),
            east.to_radians(),
            north.to_radians(),
        )
    }

    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    /// Returns true if the position lies inside the extent, edges included.
    pub fn contains(&self, position: &Cartographic) -> bool {
        position.longitude >= self.west
            && position.longitude <= self.east
            && position.latitude >= self.south
            && position.latitude <= self.north
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.west, self.south, self.east, self.north
        )
    }
}

/// A tile address in a quadtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub level: u32,
}

impl TileCoord {
    pub fn new(x: u32, y: u32, level: u32) -> Self {
        Self { x, y, level }
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "X: {} Y: {} Level: {}", self.x, self.y, self.level)
    }
}

/// Extent ↔ tile conversion shared by all tiling schemes.
pub trait TileGrid {
    /// The extent covered by the level-zero tiles.
    fn extent(&self) -> Extent;

    /// Number of tile columns at level zero.
    fn number_of_level_zero_tiles_x(&self) -> u32;

    /// Number of tile rows at level zero.
    fn number_of_level_zero_tiles_y(&self) -> u32;

    /// Returns the cartographic extent of a tile.
    fn tile_xy_to_extent(&self, x: u32, y: u32, level: u32) -> Extent;

    /// Returns the tile containing a position, or `None` outside the extent.
    fn position_to_tile_xy(&self, position: &Cartographic, level: u32) -> Option<TileCoord>;

    /// Number of tile columns at a level. Saturates at `u32::MAX` for levels
    /// deeper than [`has_level`](Self::has_level) allows.
    fn number_of_x_tiles_at_level(&self, level: u32) -> u32 {
        tiles_at_level(self.number_of_level_zero_tiles_x(), level).unwrap_or(u32::MAX)
    }

    /// Number of tile rows at a level. Saturates like the column count.
    fn number_of_y_tiles_at_level(&self, level: u32) -> u32 {
        tiles_at_level(self.number_of_level_zero_tiles_y(), level).unwrap_or(u32::MAX)
    }

    /// Whether every tile of `level` can be addressed with `u32` indices.
    fn has_level(&self, level: u32) -> bool {
        tiles_at_level(self.number_of_level_zero_tiles_x(), level).is_some()
            && tiles_at_level(self.number_of_level_zero_tiles_y(), level).is_some()
    }

    /// Checks whether a tile address exists at its level.
    fn contains_tile(&self, tile: &TileCoord) -> bool {
        tile.x < self.number_of_x_tiles_at_level(tile.level)
            && tile.y < self.number_of_y_tiles_at_level(tile.level)
    }
}

/// The tiling scheme resolved for a provider.
#[derive(Debug, Clone, PartialEq)]
pub enum TilingScheme {
    Geographic(GeographicTilingScheme),
    WebMercator(WebMercatorTilingScheme),
}

impl TilingScheme {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            TilingScheme::Geographic(_) => "geographic",
            TilingScheme::WebMercator(_) => "web-mercator",
        }
    }

    fn grid(&self) -> &dyn TileGrid {
        match self {
            TilingScheme::Geographic(scheme) => scheme,
            TilingScheme::WebMercator(scheme) => scheme,
        }
    }
}

impl From<GeographicTilingScheme> for TilingScheme {
    fn from(scheme: GeographicTilingScheme) -> Self {
        TilingScheme::Geographic(scheme)
    }
}

impl From<WebMercatorTilingScheme> for TilingScheme {
    fn from(scheme: WebMercatorTilingScheme) -> Self {
        TilingScheme::WebMercator(scheme)
    }
}

impl TileGrid for TilingScheme {
    fn extent(&self) -> Extent {
        self.grid().extent()
    }

    fn number_of_level_zero_tiles_x(&self) -> u32 {
        self.grid().number_of_level_zero_tiles_x()
    }

    fn number_of_level_zero_tiles_y(&self) -> u32 {
        self.grid().number_of_level_zero_tiles_y()
    }

    fn tile_xy_to_extent(&self, x: u32, y: u32, level: u32) -> Extent {
        self.grid().tile_xy_to_extent(x, y, level)
    }

    fn position_to_tile_xy(&self, position: &Cartographic, level: u32) -> Option<TileCoord> {
        self.grid().position_to_tile_xy(position, level)
    }
}

/// Tiles along an axis at `level`, or `None` when the count overflows `u32`.
fn tiles_at_level(level_zero_tiles: u32, level: u32) -> Option<u32> {
    1u32.checked_shl(level).and_then(|factor| level_zero_tiles.checked_mul(factor))
}

/// Index of the tile containing `offset` along an axis of `tiles` tiles of
/// `tile_size` each, clamped so the far edge maps to the last tile.
pub(crate) fn tile_index(offset: f64, tile_size: f64, tiles: u32) -> u32 {
    let index = (offset / tile_size).floor();
    if index <= 0.0 {
        0
    } else {
        (index as u32).min(tiles - 1)
    }
}
