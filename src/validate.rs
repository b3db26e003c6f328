//! COG validation.
//!
//! Opens a GeoTIFF through GDAL and checks that it is a Cloud-Optimized
//! GeoTIFF usable by downstream imagery services: COG layout, internal
//! tiling, a defined CRS and a displayable band count.

use gdal::{Dataset, Metadata};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Band counts accepted when no explicit count is expected.
pub const DISPLAYABLE_BAND_COUNTS: [usize; 3] = [1, 3, 4];

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Cannot open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: gdal::errors::GdalError,
    },

    #[error("{} has no raster band", .0.display())]
    NoBands(PathBuf),
}

/// Outcome of [`validate_cog`].
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ValidationReport {
    pub path: PathBuf,
    pub valid: bool,
    pub driver: String,
    pub width: usize,
    pub height: usize,
    pub bands: usize,
    pub block_size: (usize, usize),
    pub compression: Option<String>,
    pub crs: Option<String>,
    pub errors: Vec<String>,
}

/// Validates the COG at `path`.
///
/// `expected_bands` replaces the 1/3/4 band rule when given.
pub fn validate_cog(
    path: &Path,
    expected_bands: Option<usize>,
) -> Result<ValidationReport, ValidationError> {
    let dataset = Dataset::open(path).map_err(|source| ValidationError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let driver = dataset.driver().short_name();
    let (width, height) = dataset.raster_size();
    let bands = dataset.raster_count() as usize;
    if bands == 0 {
        return Err(ValidationError::NoBands(path.to_path_buf()));
    }
    let band = dataset
        .rasterband(1)
        .map_err(|source| ValidationError::Open {
            path: path.to_path_buf(),
            source,
        })?;
    let block_size = band.block_size();
    let layout = dataset.metadata_item("LAYOUT", "IMAGE_STRUCTURE");
    let compression = dataset.metadata_item("COMPRESSION", "IMAGE_STRUCTURE");
    let crs = dataset
        .spatial_ref()
        .ok()
        .and_then(|srs| srs.to_proj4().ok())
        .filter(|proj4| !proj4.trim().is_empty());

    let mut errors = Vec::new();
    if driver != "GTiff" {
        errors.push(format!("driver is {}, expected GTiff", driver));
    }
    if layout.as_deref() != Some("COG") {
        errors.push("file does not declare LAYOUT=COG".to_string());
    }
    if !is_tiled(block_size, (width, height)) {
        errors.push(format!(
            "raster {}x{} is striped with {}x{} blocks",
            width, height, block_size.0, block_size.1
        ));
    }
    if crs.is_none() {
        errors.push("COG does not have a defined CRS".to_string());
    }
    match expected_bands {
        Some(expected) if bands != expected => {
            errors.push(format!("COG has {} bands, expected {}", bands, expected));
        }
        None if !DISPLAYABLE_BAND_COUNTS.contains(&bands) => {
            errors.push(format!("COG has {} bands. Expected 1, 3, or 4 bands.", bands));
        }
        _ => {}
    }

    Ok(ValidationReport {
        path: path.to_path_buf(),
        valid: errors.is_empty(),
        driver,
        width,
        height,
        bands,
        block_size,
        compression,
        crs,
        errors,
    })
}

/// A raster is tiled when its blocks are not full-width strips, or when
/// the whole raster fits inside a single block.
fn is_tiled(block_size: (usize, usize), raster_size: (usize, usize)) -> bool {
    let (block_x, block_y) = block_size;
    let (width, height) = raster_size;
    block_x != width || (width <= block_x && height <= block_y)
}
