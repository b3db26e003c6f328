//! # COG Output Module
//!
//! This module turns in-memory rasters into Cloud-Optimized GeoTIFF files.
//! All encoding work is delegated to GDAL through the [`RasterEngine`] seam:
//!
//! 1. the raster is written to an intermediate GeoTIFF,
//! 2. the intermediate file is reopened and a plain geographic CRS is forced
//!    onto it (the source CRS is never propagated),
//! 3. it is copied through GDAL's `COG` driver with the configured
//!    [`CogProfile`].

use crate::extract::{Raster, RasterData};
use gdal::raster::{Buffer, GdalType, RasterCreationOptions};
use gdal::spatial_ref::SpatialRef;
use gdal::{Dataset, DatasetOptions, DriverManager, GdalOpenFlags, Metadata};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// CRS forced onto every output: longitude/latitude, prime meridian at zero.
pub const GEOGRAPHIC_PROJ4: &str = "+proj=latlong";

/// Errors reported by the raster engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("raster holds {found} samples, expected {expected}")]
    SampleCount { expected: usize, found: usize },

    #[error("raster has no samples ({width} x {height} x {bands})")]
    EmptyRaster {
        width: usize,
        height: usize,
        bands: usize,
    },

    #[error("path is not valid UTF-8: {0}")]
    InvalidPath(String),
}

/// Compression codecs offered by the GDAL COG driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Deflate,
    Lzw,
    Zstd,
    Lzma,
    Packbits,
    None,
}

impl Compression {
    /// Value of the driver's `COMPRESS` creation option.
    pub fn gdal_name(&self) -> &'static str {
        match self {
            Compression::Deflate => "DEFLATE",
            Compression::Lzw => "LZW",
            Compression::Zstd => "ZSTD",
            Compression::Lzma => "LZMA",
            Compression::Packbits => "PACKBITS",
            Compression::None => "NONE",
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.gdal_name().to_lowercase())
    }
}

impl FromStr for Compression {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "deflate" => Ok(Compression::Deflate),
            "lzw" => Ok(Compression::Lzw),
            "zstd" => Ok(Compression::Zstd),
            "lzma" => Ok(Compression::Lzma),
            "packbits" => Ok(Compression::Packbits),
            "none" | "raw" => Ok(Compression::None),
            other => Err(format!("Unknown compression '{}'", other)),
        }
    }
}

/// Encoding parameters handed to the COG driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CogProfile {
    pub compression: Compression,
    /// Internal tile edge in pixels.
    pub blocksize: usize,
    /// Let the driver build overviews.
    pub overviews: bool,
    pub overview_resampling: String,
}

impl Default for CogProfile {
    fn default() -> Self {
        CogProfile {
            compression: Compression::Deflate,
            blocksize: 512,
            overviews: true,
            overview_resampling: "NEAREST".to_string(),
        }
    }
}

impl CogProfile {
    /// Creation options for the `COG` driver.
    pub fn creation_options(&self) -> Vec<(&'static str, String)> {
        vec![
            ("COMPRESS", self.compression.gdal_name().to_string()),
            ("BLOCKSIZE", self.blocksize.to_string()),
            (
                "OVERVIEWS",
                if self.overviews { "AUTO" } else { "NONE" }.to_string(),
            ),
            ("OVERVIEW_RESAMPLING", self.overview_resampling.to_uppercase()),
        ]
    }
}

/// Basename of the COG produced for `variable_path`: the path with `.tif`
/// appended, leading slashes dropped and remaining slashes replaced by
/// underscores.
///
/// ```rust
/// use net2cog::output::output_basename;
///
/// assert_eq!(output_basename("/Grid/precipitation"), "Grid_precipitation.tif");
/// ```
pub fn output_basename(variable_path: &str) -> String {
    format!("{}.tif", variable_path)
        .trim_start_matches('/')
        .replace('/', "_")
}

/// The external raster engine.
pub trait RasterEngine {
    /// Writes `raster` as a plain GeoTIFF at `path`.
    fn write_raster(&self, raster: &Raster, path: &Path) -> Result<(), EngineError>;

    /// Forces the geographic CRS onto `source` and re-encodes it as a COG at
    /// `destination`.
    fn translate_to_cog(
        &self,
        source: &Path,
        destination: &Path,
        profile: &CogProfile,
    ) -> Result<(), EngineError>;
}

/// [`RasterEngine`] backed by GDAL's `GTiff` and `COG` drivers.
#[derive(Debug, Clone, Copy, Default)]
pub struct GdalEngine;

impl RasterEngine for GdalEngine {
    fn write_raster(&self, raster: &Raster, path: &Path) -> Result<(), EngineError> {
        let expected = raster.width * raster.height * raster.bands;
        if expected == 0 {
            return Err(EngineError::EmptyRaster {
                width: raster.width,
                height: raster.height,
                bands: raster.bands,
            });
        }
        if raster.data.len() != expected {
            return Err(EngineError::SampleCount {
                expected,
                found: raster.data.len(),
            });
        }

        debug!(
            "Writing intermediate GeoTIFF {} ({} x {} x {})",
            path.display(),
            raster.width,
            raster.height,
            raster.bands
        );
        match &raster.data {
            RasterData::Float32(values) => write_bands(raster, values, path),
            RasterData::Float64(values) => write_bands(raster, values, path),
        }
    }

    fn translate_to_cog(
        &self,
        source: &Path,
        destination: &Path,
        profile: &CogProfile,
    ) -> Result<(), EngineError> {
        let mut dataset = Dataset::open_ex(
            source,
            DatasetOptions {
                open_flags: GdalOpenFlags::GDAL_OF_UPDATE | GdalOpenFlags::GDAL_OF_RASTER,
                ..DatasetOptions::default()
            },
        )?;
        let srs = SpatialRef::from_proj4(GEOGRAPHIC_PROJ4)?;
        dataset.set_spatial_ref(&srs)?;

        let mut options = RasterCreationOptions::new();
        for (key, value) in profile.creation_options() {
            options.set_name_value(key, &value)?;
        }

        let driver = DriverManager::get_driver_by_name("COG")?;
        debug!(
            "Translating {} to COG {} with {:?}",
            source.display(),
            destination.display(),
            profile.creation_options()
        );
        let output = dataset.create_copy(&driver, destination, &options)?;
        drop(output);
        Ok(())
    }
}

fn write_bands<T: GdalType + Copy>(
    raster: &Raster,
    values: &[T],
    path: &Path,
) -> Result<(), EngineError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| EngineError::InvalidPath(path.display().to_string()))?;
    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let mut dataset =
        driver.create_with_band_type::<T, _>(path_str, raster.width, raster.height, raster.bands)?;
    dataset.set_geo_transform(&raster.geo_transform)?;

    let band_len = raster.width * raster.height;
    for (idx, chunk) in values.chunks(band_len).enumerate() {
        let mut band = dataset.rasterband(idx + 1)?;
        let mut buffer = Buffer::new((raster.width, raster.height), chunk.to_vec());
        band.write((0, 0), (raster.width, raster.height), &mut buffer)?;
        if let Some(nodata) = raster.nodata {
            band.set_no_data_value(Some(nodata))?;
        }
        if let Some(label) = raster.band_labels.get(idx) {
            band.set_description(label)?;
        }
    }
    Ok(())
}
