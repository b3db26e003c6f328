//! # net2cog
//!
//! A Rust library for converting the variables of NetCDF-4 granules into
//! single-band Cloud-Optimized GeoTIFFs (COGs).
//!
//! ## Features
//!
//! - **Hierarchical granules**: variables are discovered across nested groups
//! - **Spatial detection**: `lat`/`lon`, `longitude`/`latitude` and `x`/`y`
//!   axes are recognized, with a `lat`/`lon` alias retry for granules whose
//!   axes the raster engine does not recognize directly
//! - **Strict error reporting**: one error kind per failing variable,
//!   distinguishing missing, non-spatial and engine failures
//! - **GDAL encoding**: tiling, compression and overviews come from GDAL's
//!   `COG` driver
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use net2cog::{process_job, input::JobConfig};
//!
//! // Load configuration from JSON file
//! let config = JobConfig::from_file("job.json").expect("Failed to load config");
//!
//! // Convert the requested variables
//! let report = process_job(&config).expect("Failed to convert granule");
//! for cog in &report.outputs {
//!     println!("{}", cog.display());
//! }
//! ```
//!
//! ## Configuration Example
//!
//! ```json
//! {
//!   "input": "RSS_smap_SSS_L3_8day_running_2020_005_FNL_v04.0.nc",
//!   "output_dir": "cogs",
//!   "variables": ["sss_smap", "gland", "fland"],
//!   "profile": {
//!     "compression": "deflate",
//!     "blocksize": 512,
//!     "overviews": true
//!   }
//! }
//! ```

pub mod cli;
pub mod convert;
pub mod extract;
pub mod granule;
pub mod info;
pub mod input;
pub mod log;
pub mod output;
pub mod spatial;
pub mod validate;


use crate::convert::{ConversionReport, ConvertError, Converter};
use crate::input::{ConfigError, JobConfig};
use crate::log::ConversionLogger;
use std::path::Path;
use thiserror::Error;

pub use crate::convert::netcdf_converter;

/// Errors returned by [`process_job`].
#[derive(Error, Debug)]
pub enum JobError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Convert(#[from] ConvertError),
}

/// Runs a conversion job, logging through the process-wide logger.
///
/// This function orchestrates the entire conversion:
/// 1. Validates the job configuration
/// 2. Skips inputs without a NetCDF extension
/// 3. Opens the granule and resolves the variable list
/// 4. Converts each variable to `<output_dir>/<variable>.tif`
///
/// # Errors
///
/// Returns the configuration error, or the first variable that could not be
/// converted.
///
/// # Examples
///
/// ```rust,no_run
/// use net2cog::{process_job, input::JobConfig};
///
/// let config = JobConfig::from_file("job.yaml")?;
/// let report = process_job(&config)?;
/// println!("{} COGs written", report.outputs.len());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn process_job(config: &JobConfig) -> Result<ConversionReport, JobError> {
    process_job_with_logger(config, ConversionLogger::default())
}

/// Runs a conversion job with an explicit logging handle.
pub fn process_job_with_logger(
    config: &JobConfig,
    logger: ConversionLogger<'_>,
) -> Result<ConversionReport, JobError> {
    config.validate()?;
    let converter = Converter::from_config(config, logger);
    let report = converter.convert_with_report(
        Path::new(&config.input),
        Path::new(&config.output_dir),
        &config.variables,
    )?;
    Ok(report)
}
