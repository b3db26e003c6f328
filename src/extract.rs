//! # Raster Extraction
//!
//! Reads one NetCDF variable into an in-memory [`Raster`] ready to be handed
//! to the raster engine.
//!
//! ## Key Components
//!
//! - [`AxisView`]: which dimensions (and coordinate variables) play the raster
//!   x and y roles
//! - [`rasterize`]: reads the variable through a view, decodes CF packing and
//!   derives the geotransform

use crate::granule::{Granule, VariableInfo, VariablePath};
use crate::spatial::SpatialPair;
use log::debug;
use netcdf::AttributeValue;
use netcdf::types::{FloatType, IntType, NcVariableType};
use thiserror::Error;

/// Errors raised while turning a variable into a raster.
#[derive(Error, Debug)]
pub enum RasterizeError {
    /// The view's x/y dimensions are not among the variable's dimensions.
    #[error("x dimension '{x}' and y dimension '{y}' not found in {dimensions:?}")]
    MissingAxes {
        x: String,
        y: String,
        dimensions: Vec<String>,
    },

    /// More than one non-spatial dimension remains after picking x and y.
    #[error("only 2D and 3D data arrays supported, found extra dimensions {extra:?}")]
    TooManyDimensions { extra: Vec<String> },

    #[error("coordinate variable '{name}' is not available")]
    MissingCoordinate { name: String },

    #[error("coordinate variable '{name}' has {found} values, expected {expected}")]
    CoordinateLength {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("variable '{name}' has unsupported type {data_type}")]
    UnsupportedType { name: String, data_type: String },

    #[error("variable '{0}' disappeared from the granule")]
    VariableNotFound(String),

    #[error("NetCDF read error: {0}")]
    NetCdf(#[from] netcdf::Error),
}

impl RasterizeError {
    /// Dimension errors are the ones an axis alias can resolve.
    pub fn is_dimension_error(&self) -> bool {
        matches!(
            self,
            RasterizeError::MissingAxes { .. } | RasterizeError::TooManyDimensions { .. }
        )
    }
}

/// One raster axis: the variable dimension it reads from and the name under
/// which coordinate values are looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Axis {
    pub dimension: String,
    pub coordinate: String,
    /// Missing coordinate values fall back to pixel indices unless required.
    pub coordinate_required: bool,
}

impl Axis {
    fn plain(name: &str) -> Self {
        Axis {
            dimension: name.to_string(),
            coordinate: name.to_string(),
            coordinate_required: false,
        }
    }

    /// An alias axis reading `source` values under a raster-oriented name.
    fn alias(source: &str) -> Self {
        Axis {
            dimension: source.to_string(),
            coordinate: source.to_string(),
            coordinate_required: true,
        }
    }
}

/// Mapping of raster x/y onto a variable's dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisView {
    pub x: Axis,
    pub y: Axis,
    pub label: &'static str,
}

impl AxisView {
    /// The axes the raster engine recognizes on its own: `x`/`y`, then
    /// `longitude`/`latitude`.
    pub fn direct(dimensions: &[String]) -> Self {
        let pair = if SpatialPair::LongitudeLatitude.is_subset_of(dimensions)
            && !SpatialPair::Xy.is_subset_of(dimensions)
        {
            SpatialPair::LongitudeLatitude
        } else {
            SpatialPair::Xy
        };
        AxisView {
            x: Axis::plain(pair.x_name()),
            y: Axis::plain(pair.y_name()),
            label: "direct",
        }
    }

    /// Derived view with `y <- lat` and `x <- lon`; the `lat`/`lon`
    /// coordinate variables must exist.
    pub fn lat_lon_alias() -> Self {
        AxisView {
            x: Axis::alias(SpatialPair::LonLat.x_name()),
            y: Axis::alias(SpatialPair::LonLat.y_name()),
            label: "lat/lon alias",
        }
    }
}

/// Sample storage of a raster, band-sequential and row-major.
#[derive(Debug, Clone, PartialEq)]
pub enum RasterData {
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

impl RasterData {
    pub fn len(&self) -> usize {
        match self {
            RasterData::Float32(values) => values.len(),
            RasterData::Float64(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A variable laid out as `bands × height × width`.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub width: usize,
    pub height: usize,
    pub bands: usize,
    /// One label per band, e.g. `time=3`; empty for single-band rasters.
    pub band_labels: Vec<String>,
    pub data: RasterData,
    /// GDAL-ordered affine transform.
    pub geo_transform: [f64; 6],
    pub nodata: Option<f64>,
}

/// CF packing attributes applied while reading.
#[derive(Debug, Clone, Copy, PartialEq)]
struct CfPacking {
    fill_value: Option<f64>,
    missing_value: Option<f64>,
    scale_factor: f64,
    add_offset: f64,
}

impl CfPacking {
    fn from_variable(var: &netcdf::Variable<'_>) -> Self {
        CfPacking {
            fill_value: numeric_attribute(var, "_FillValue"),
            missing_value: numeric_attribute(var, "missing_value"),
            scale_factor: numeric_attribute(var, "scale_factor").unwrap_or(1.0),
            add_offset: numeric_attribute(var, "add_offset").unwrap_or(0.0),
        }
    }

    fn is_masked(&self) -> bool {
        self.fill_value.is_some() || self.missing_value.is_some()
    }

    fn decode(&self, raw: f64) -> f64 {
        if self.fill_value == Some(raw) || self.missing_value == Some(raw) {
            return f64::NAN;
        }
        raw * self.scale_factor + self.add_offset
    }
}

fn numeric_attribute(var: &netcdf::Variable<'_>, name: &str) -> Option<f64> {
    match var.attribute_value(name)?.ok()? {
        AttributeValue::Uchar(v) => Some(v as f64),
        AttributeValue::Schar(v) => Some(v as f64),
        AttributeValue::Ushort(v) => Some(v as f64),
        AttributeValue::Short(v) => Some(v as f64),
        AttributeValue::Uint(v) => Some(v as f64),
        AttributeValue::Int(v) => Some(v as f64),
        AttributeValue::Ulonglong(v) => Some(v as f64),
        AttributeValue::Longlong(v) => Some(v as f64),
        AttributeValue::Float(v) => Some(v as f64),
        AttributeValue::Double(v) => Some(v),
        AttributeValue::Floats(v) => v.first().map(|x| *x as f64),
        AttributeValue::Doubles(v) => v.first().copied(),
        _ => None,
    }
}

/// Positions of the raster axes and the optional band dimension within a
/// variable's dimension list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisLayout {
    pub x: usize,
    pub y: usize,
    pub band: Option<usize>,
}

impl AxisLayout {
    /// Resolves `view` against `dimensions`.
    pub fn resolve(view: &AxisView, dimensions: &[String]) -> Result<Self, RasterizeError> {
        let position = |name: &str| dimensions.iter().position(|d| d == name);
        let (x, y) = match (position(&view.x.dimension), position(&view.y.dimension)) {
            (Some(x), Some(y)) => (x, y),
            _ => {
                return Err(RasterizeError::MissingAxes {
                    x: view.x.dimension.clone(),
                    y: view.y.dimension.clone(),
                    dimensions: dimensions.to_vec(),
                });
            }
        };

        let extra: Vec<usize> = (0..dimensions.len()).filter(|&i| i != x && i != y).collect();
        if extra.len() > 1 {
            return Err(RasterizeError::TooManyDimensions {
                extra: extra.iter().map(|&i| dimensions[i].clone()).collect(),
            });
        }

        Ok(AxisLayout {
            x,
            y,
            band: extra.first().copied(),
        })
    }
}

/// Reorders samples stored in `shape` order into `band × y × x` order.
pub fn reorder_samples<T: Copy>(values: &[T], shape: &[usize], layout: &AxisLayout) -> Vec<T> {
    let mut strides = vec![1usize; shape.len()];
    for i in (0..shape.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * shape[i + 1];
    }

    let width = shape[layout.x];
    let height = shape[layout.y];
    let bands = layout.band.map(|b| shape[b]).unwrap_or(1);

    let mut out = Vec::with_capacity(width * height * bands);
    for band in 0..bands {
        let band_offset = layout.band.map(|b| band * strides[b]).unwrap_or(0);
        for row in 0..height {
            let row_offset = band_offset + row * strides[layout.y];
            for col in 0..width {
                out.push(values[row_offset + col * strides[layout.x]]);
            }
        }
    }
    out
}

/// Geotransform of pixel-centred, evenly spaced coordinates.
///
/// A single coordinate gets a unit pixel size.
pub fn geo_transform_from_coordinates(x: &[f64], y: &[f64]) -> [f64; 6] {
    let (x_origin, x_res) = edge_and_resolution(x);
    let (y_origin, y_res) = edge_and_resolution(y);
    [x_origin, x_res, 0.0, y_origin, 0.0, y_res]
}

fn edge_and_resolution(centres: &[f64]) -> (f64, f64) {
    match centres {
        [] => (-0.5, 1.0),
        [only] => (only - 0.5, 1.0),
        [first, .., last] => {
            let resolution = (last - first) / (centres.len() - 1) as f64;
            (first - resolution / 2.0, resolution)
        }
    }
}

/// Reads `info` from `granule` through `view`.
pub fn rasterize(
    granule: &Granule,
    info: &VariableInfo,
    view: &AxisView,
) -> Result<Raster, RasterizeError> {
    let layout = AxisLayout::resolve(view, &info.dimensions)?;
    debug!(
        "Rasterizing {} through {} view: x={} y={} band={:?}",
        info.path,
        view.label,
        info.dimensions[layout.x],
        info.dimensions[layout.y],
        layout.band.map(|b| &info.dimensions[b])
    );

    let width = info.shape[layout.x];
    let height = info.shape[layout.y];
    let x_coords = axis_coordinates(granule, &info.path, &view.x, width)?;
    let y_coords = axis_coordinates(granule, &info.path, &view.y, height)?;

    let var = granule
        .variable(&info.path)
        .ok_or_else(|| RasterizeError::VariableNotFound(info.path.to_string()))?;
    let packing = CfPacking::from_variable(&var);
    let raw = read_widened(&var)?;
    let decoded: Vec<f64> = raw.into_iter().map(|v| packing.decode(v)).collect();
    let ordered = reorder_samples(&decoded, &info.shape, &layout);

    let double_precision = matches!(var.vartype(), NcVariableType::Float(FloatType::F64));
    let data = if double_precision {
        RasterData::Float64(ordered)
    } else {
        RasterData::Float32(ordered.into_iter().map(|v| v as f32).collect())
    };

    let (bands, band_labels) = match layout.band {
        Some(b) => {
            let name = &info.dimensions[b];
            let labels = (0..info.shape[b]).map(|i| format!("{}={}", name, i)).collect();
            (info.shape[b], labels)
        }
        None => (1, Vec::new()),
    };

    Ok(Raster {
        width,
        height,
        bands,
        band_labels,
        data,
        geo_transform: geo_transform_from_coordinates(&x_coords, &y_coords),
        nodata: packing.is_masked().then_some(f64::NAN),
    })
}

fn axis_coordinates(
    granule: &Granule,
    variable: &VariablePath,
    axis: &Axis,
    expected: usize,
) -> Result<Vec<f64>, RasterizeError> {
    let coordinate = variable
        .visible_paths(&axis.coordinate)
        .into_iter()
        .find_map(|path| granule.info(&path).filter(|info| info.rank() == 1).cloned());

    let Some(coordinate) = coordinate else {
        if axis.coordinate_required {
            return Err(RasterizeError::MissingCoordinate {
                name: axis.coordinate.clone(),
            });
        }
        return Ok((0..expected).map(|i| i as f64).collect());
    };

    let var = granule
        .variable(&coordinate.path)
        .ok_or_else(|| RasterizeError::VariableNotFound(coordinate.path.to_string()))?;
    let values = read_widened(&var)?;
    if values.len() != expected {
        return Err(RasterizeError::CoordinateLength {
            name: coordinate.path.to_string(),
            expected,
            found: values.len(),
        });
    }
    Ok(values)
}

macro_rules! widen {
    ($var:expr, $t:ty) => {
        $var.get_values::<$t, _>(..)?
            .into_iter()
            .map(|v| v as f64)
            .collect()
    };
}

/// Reads every value of a numeric variable in its stored type, widened to
/// `f64`.
fn read_widened(var: &netcdf::Variable<'_>) -> Result<Vec<f64>, RasterizeError> {
    let values = match var.vartype() {
        NcVariableType::Float(FloatType::F64) => var.get_values::<f64, _>(..)?,
        NcVariableType::Float(FloatType::F32) => widen!(var, f32),
        NcVariableType::Int(IntType::I8) => widen!(var, i8),
        NcVariableType::Int(IntType::U8) => widen!(var, u8),
        NcVariableType::Int(IntType::I16) => widen!(var, i16),
        NcVariableType::Int(IntType::U16) => widen!(var, u16),
        NcVariableType::Int(IntType::I32) => widen!(var, i32),
        NcVariableType::Int(IntType::U32) => widen!(var, u32),
        NcVariableType::Int(IntType::I64) => widen!(var, i64),
        NcVariableType::Int(IntType::U64) => widen!(var, u64),
        other => {
            return Err(RasterizeError::UnsupportedType {
                name: var.name(),
                data_type: format!("{:?}", other),
            });
        }
    };
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_direct_view_prefers_xy() {
        let view = AxisView::direct(&dims(&["y", "x"]));
        assert_eq!(view.x.dimension, "x");
        assert_eq!(view.y.dimension, "y");

        let view = AxisView::direct(&dims(&["time", "latitude", "longitude"]));
        assert_eq!(view.x.dimension, "longitude");
        assert_eq!(view.y.dimension, "latitude");
    }

    #[test]
    fn test_direct_view_does_not_resolve_lat_lon() {
        let dimensions = dims(&["lat", "lon"]);
        let err = AxisLayout::resolve(&AxisView::direct(&dimensions), &dimensions).unwrap_err();
        assert!(err.is_dimension_error());
        assert!(matches!(err, RasterizeError::MissingAxes { .. }));
    }

    #[test]
    fn test_alias_view_resolves_lat_lon() {
        let dimensions = dims(&["time", "lat", "lon"]);
        let layout = AxisLayout::resolve(&AxisView::lat_lon_alias(), &dimensions).unwrap();
        assert_eq!(layout, AxisLayout { x: 2, y: 1, band: Some(0) });
    }

    #[test]
    fn test_too_many_dimensions() {
        let dimensions = dims(&["time", "depth", "y", "x"]);
        let err = AxisLayout::resolve(&AxisView::direct(&dimensions), &dimensions).unwrap_err();
        assert!(err.is_dimension_error());
        assert!(err.to_string().contains("time"));
        assert!(err.to_string().contains("depth"));
    }

    #[test]
    fn test_non_dimension_errors() {
        let err = RasterizeError::MissingCoordinate {
            name: "lat".to_string(),
        };
        assert!(!err.is_dimension_error());
    }

    #[test]
    fn test_reorder_transposed_axes() {
        // shape (x=3, y=2) stored x-major
        let values = vec![0, 1, 2, 3, 4, 5];
        let layout = AxisLayout { x: 0, y: 1, band: None };
        let ordered = reorder_samples(&values, &[3, 2], &layout);
        // row 0 holds y=0 for x=0..3
        assert_eq!(ordered, vec![0, 2, 4, 1, 3, 5]);
    }

    #[test]
    fn test_reorder_with_band_dimension() {
        // shape (time=2, y=2, x=2)
        let values: Vec<i32> = (0..8).collect();
        let layout = AxisLayout { x: 2, y: 1, band: Some(0) };
        let ordered = reorder_samples(&values, &[2, 2, 2], &layout);
        assert_eq!(ordered, values);

        // band dimension last: shape (y=2, x=2, time=2)
        let layout = AxisLayout { x: 1, y: 0, band: Some(2) };
        let ordered = reorder_samples(&values, &[2, 2, 2], &layout);
        assert_eq!(ordered, vec![0, 2, 4, 6, 1, 3, 5, 7]);
    }

    #[test]
    fn test_geo_transform_from_coordinates() {
        let x = [-179.5, -178.5, -177.5];
        let y = [89.5, 88.5];
        let gt = geo_transform_from_coordinates(&x, &y);
        assert_eq!(gt, [-180.0, 1.0, 0.0, 90.0, 0.0, -1.0]);
    }

    #[test]
    fn test_geo_transform_degenerate_axes() {
        let gt = geo_transform_from_coordinates(&[10.0], &[]);
        assert_eq!(gt, [9.5, 1.0, 0.0, -0.5, 0.0, 1.0]);
    }

    #[test]
    fn test_cf_packing_decode() {
        let packing = CfPacking {
            fill_value: Some(-999.0),
            missing_value: None,
            scale_factor: 0.5,
            add_offset: 10.0,
        };
        assert!(packing.is_masked());
        assert!(packing.decode(-999.0).is_nan());
        assert_eq!(packing.decode(4.0), 12.0);
    }

    #[test]
    fn test_raster_data_access() {
        let data = RasterData::Float32(vec![1.5, 2.5]);
        assert_eq!(data.len(), 2);
        assert!(!data.is_empty());
    }
}
