//! # Spatial Dimensions
//!
//! Decides whether a variable can be rendered as a 2-D raster by looking at
//! the names of its dimensions, and owns the fixed set of coordinate names
//! that are never converted on their own.

use serde::Serialize;
use std::fmt;

/// Variable names that are never converted, even when requested explicitly.
pub const EXCLUDED_VARIABLES: [&str; 5] = ["lon", "lat", "longitude", "latitude", "time"];

/// A recognized pair of horizontal axis names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpatialPair {
    /// `lon` / `lat`
    LonLat,
    /// `longitude` / `latitude`
    LongitudeLatitude,
    /// `x` / `y`
    Xy,
}

impl SpatialPair {
    /// All pairs, in the order they are tested.
    pub const ALL: [SpatialPair; 3] = [
        SpatialPair::LonLat,
        SpatialPair::LongitudeLatitude,
        SpatialPair::Xy,
    ];

    /// Horizontal (x) dimension name.
    pub fn x_name(&self) -> &'static str {
        match self {
            SpatialPair::LonLat => "lon",
            SpatialPair::LongitudeLatitude => "longitude",
            SpatialPair::Xy => "x",
        }
    }

    /// Vertical (y) dimension name.
    pub fn y_name(&self) -> &'static str {
        match self {
            SpatialPair::LonLat => "lat",
            SpatialPair::LongitudeLatitude => "latitude",
            SpatialPair::Xy => "y",
        }
    }

    /// True when both members of the pair appear in `dimensions`.
    pub fn is_subset_of<S: AsRef<str>>(&self, dimensions: &[S]) -> bool {
        let contains = |name: &str| dimensions.iter().any(|d| d.as_ref() == name);
        contains(self.x_name()) && contains(self.y_name())
    }
}

impl fmt::Display for SpatialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.y_name(), self.x_name())
    }
}

/// Returns true if the dimensions include one of the following sets of
/// spatial dimension names:
///
/// * `{"lon", "lat"}`
/// * `{"longitude", "latitude"}`
/// * `{"x", "y"}`
///
/// Extra dimensions (e.g. `time`) do not affect the result.
///
/// ```rust
/// use net2cog::spatial::has_spatial_dimensions;
///
/// assert!(has_spatial_dimensions(&["time", "lat", "lon"]));
/// assert!(!has_spatial_dimensions(&["time", "lat"]));
/// ```
pub fn has_spatial_dimensions<S: AsRef<str>>(dimensions: &[S]) -> bool {
    spatial_pair(dimensions).is_some()
}

/// First recognized pair contained in `dimensions`, if any.
pub fn spatial_pair<S: AsRef<str>>(dimensions: &[S]) -> Option<SpatialPair> {
    SpatialPair::ALL
        .into_iter()
        .find(|pair| pair.is_subset_of(dimensions))
}

/// True when `variable_path` names one of [`EXCLUDED_VARIABLES`].
///
/// The comparison is made on the full path, so `group/lat` is not excluded.
pub fn is_excluded(variable_path: &str) -> bool {
    EXCLUDED_VARIABLES.contains(&variable_path)
}
