//! # Conversion Core
//!
//! Drives the conversion of a NetCDF granule into one COG per variable.
//!
//! [`Converter::convert_variable`] handles a single variable: it checks the
//! exclusion list, classifies missing and non-spatial variables, rasterizes
//! the variable (retrying once through the `lat`/`lon` alias view when the
//! direct axes are not recognized) and hands the raster to the
//! [`RasterEngine`]. [`Converter::convert_granule`] resolves the variable list
//! and runs the single-variable step over it, stopping at the first failure.

use crate::extract::{AxisView, RasterizeError, rasterize};
use crate::granule::{Granule, VariablePath};
use crate::input::{DEFAULT_EXTENSIONS, JobConfig, is_supported_extension};
use crate::log::ConversionLogger;
use crate::output::{CogProfile, EngineError, GdalEngine, RasterEngine, output_basename};
use crate::spatial::{has_spatial_dimensions, is_excluded};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Why a single variable could not be converted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableFailure {
    /// The path does not name a variable of the granule.
    Missing { path: String },
    /// No recognized spatial dimension pair among the variable's dimensions.
    NonSpatial { path: String },
    /// Rasterization failed, including the alias retry.
    Rasterization(String),
    /// The raster engine rejected the raster or the COG translation.
    Encoding(String),
}

impl fmt::Display for VariableFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableFailure::Missing { path } => write!(f, "No variable named '{}'.", path),
            VariableFailure::NonSpatial { path } => write!(
                f,
                "{} does not have spatial dimensions such as lat / lon or x / y",
                path
            ),
            VariableFailure::Rasterization(message) | VariableFailure::Encoding(message) => {
                f.write_str(message)
            }
        }
    }
}

impl From<RasterizeError> for VariableFailure {
    fn from(err: RasterizeError) -> Self {
        VariableFailure::Rasterization(err.to_string())
    }
}

impl From<EngineError> for VariableFailure {
    fn from(err: EngineError) -> Self {
        VariableFailure::Encoding(err.to_string())
    }
}

/// Errors returned by the conversion core.
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Variable {variable} cannot be converted to tif: {failure}")]
    Variable {
        variable: String,
        failure: VariableFailure,
    },

    #[error("Failed to open NetCDF file {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: netcdf::Error,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConvertError {
    /// The per-variable failure, if this error is one.
    pub fn failure(&self) -> Option<&VariableFailure> {
        match self {
            ConvertError::Variable { failure, .. } => Some(failure),
            _ => None,
        }
    }
}

/// Converts granules with a given engine and COG profile.
pub struct Converter<'a, E: RasterEngine = GdalEngine> {
    engine: E,
    profile: CogProfile,
    extensions: Vec<String>,
    logger: ConversionLogger<'a>,
}

impl<'a> Converter<'a, GdalEngine> {
    /// GDAL-backed converter with the default profile.
    pub fn new(logger: ConversionLogger<'a>) -> Self {
        Converter::with_engine(GdalEngine, logger)
    }

    /// GDAL-backed converter configured from a job.
    pub fn from_config(config: &JobConfig, logger: ConversionLogger<'a>) -> Self {
        Converter::with_engine(GdalEngine, logger)
            .profile(config.profile.clone())
            .extensions(config.extensions.clone())
    }
}

impl<'a, E: RasterEngine> Converter<'a, E> {
    pub fn with_engine(engine: E, logger: ConversionLogger<'a>) -> Self {
        Converter {
            engine,
            profile: CogProfile::default(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            logger,
        }
    }

    pub fn profile(mut self, profile: CogProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Converts one variable of `granule` into `<output_dir>/<basename>.tif`.
    ///
    /// Returns `Ok(None)` for excluded variables.
    pub fn convert_variable(
        &self,
        output_dir: &Path,
        granule: &Granule,
        variable: &VariablePath,
    ) -> Result<Option<PathBuf>, ConvertError> {
        self.logger.debug(format_args!("NetCDF Var: {}", variable));
        if is_excluded(variable.as_str()) {
            self.logger.debug(format_args!(
                "Variable {} is excluded. Will not produce COG",
                variable
            ));
            return Ok(None);
        }

        let output_file = output_dir.join(output_basename(variable.as_str()));
        let scratch = tempfile::Builder::new()
            .prefix("net2cog-")
            .tempdir()
            .map_err(|source| ConvertError::Io {
                path: std::env::temp_dir(),
                source,
            })?;
        let intermediate = scratch.path().join(output_basename(variable.as_str()));

        match self.write_cog(granule, variable, &intermediate, &output_file) {
            Ok(()) => {
                self.logger.info(format_args!(
                    "Finished conversion, writing variable: {}",
                    output_file.display()
                ));
                Ok(Some(output_file))
            }
            Err(failure) => {
                self.logger.error(format_args!(
                    "Variable {} cannot be converted to tif: {}",
                    variable, failure
                ));
                Err(ConvertError::Variable {
                    variable: variable.to_string(),
                    failure,
                })
            }
        }
    }

    fn write_cog(
        &self,
        granule: &Granule,
        variable: &VariablePath,
        intermediate: &Path,
        output_file: &Path,
    ) -> Result<(), VariableFailure> {
        let info = granule
            .info(variable)
            .ok_or_else(|| VariableFailure::Missing {
                path: variable.to_string(),
            })?;
        if !has_spatial_dimensions(&info.dimensions) {
            return Err(VariableFailure::NonSpatial {
                path: variable.to_string(),
            });
        }

        let raster = match rasterize(granule, info, &AxisView::direct(&info.dimensions)) {
            Ok(raster) => raster,
            Err(err) if err.is_dimension_error() => {
                self.logger.info(format_args!(
                    "{}: No x or y dimensions, aliasing lat / lon...",
                    err
                ));
                rasterize(granule, info, &AxisView::lat_lon_alias())?
            }
            Err(err) => return Err(err.into()),
        };

        self.logger.info(format_args!(
            "Starting conversion... {}",
            output_file.display()
        ));
        self.engine.write_raster(&raster, intermediate)?;
        self.engine
            .translate_to_cog(intermediate, output_file, &self.profile)?;
        Ok(())
    }

    /// Converts `variables` of the granule at `input` into `output_dir`.
    ///
    /// An empty `variables` list converts every data variable. Files without
    /// a supported extension are skipped and yield an empty list. The first
    /// variable that cannot be converted aborts the whole call.
    pub fn convert_granule<S: AsRef<str>>(
        &self,
        input: &Path,
        output_dir: &Path,
        variables: &[S],
    ) -> Result<Vec<PathBuf>, ConvertError> {
        self.logger
            .info(format_args!("Input file name: {}", input.display()));
        if !is_supported_extension(input, &self.extensions) {
            self.logger.info(format_args!(
                "Not a NetCDF file; Skipped file: {}",
                input.display()
            ));
            return Ok(Vec::new());
        }

        self.logger.info(format_args!(
            "Reading {}",
            input
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| input.display().to_string())
        ));
        let granule = Granule::open(input).map_err(|source| ConvertError::Open {
            path: input.to_path_buf(),
            source,
        })?;

        let requested: Vec<VariablePath> = if variables.is_empty() {
            granule.data_variables()
        } else {
            variables
                .iter()
                .map(|v| VariablePath::new(v.as_ref()))
                .collect()
        };
        self.logger.info(format_args!(
            "Processing variables {}",
            requested
                .iter()
                .map(|v| v.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ));

        fs::create_dir_all(output_dir).map_err(|source| ConvertError::Io {
            path: output_dir.to_path_buf(),
            source,
        })?;

        let mut outputs = Vec::with_capacity(requested.len());
        for variable in &requested {
            if let Some(path) = self.convert_variable(output_dir, &granule, variable)? {
                outputs.push(path);
            }
        }
        self.logger
            .info(format_args!("NetCDF conversion complete. Returning COGs generated."));
        Ok(outputs)
    }
}

/// Converts a granule with the GDAL engine and the default COG profile.
pub fn netcdf_converter<S: AsRef<str>>(
    input: &Path,
    output_dir: &Path,
    variables: &[S],
    logger: ConversionLogger<'_>,
) -> Result<Vec<PathBuf>, ConvertError> {
    Converter::new(logger).convert_granule(input, output_dir, variables)
}

/// Summary of one granule conversion.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionReport {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub requested_variables: Vec<String>,
    pub outputs: Vec<PathBuf>,
    /// The input did not carry a supported extension.
    pub skipped: bool,
    pub generated_at: DateTime<Utc>,
    pub elapsed_ms: u128,
}

impl<'a, E: RasterEngine> Converter<'a, E> {
    /// Runs [`Converter::convert_granule`] and wraps the result in a report.
    pub fn convert_with_report<S: AsRef<str>>(
        &self,
        input: &Path,
        output_dir: &Path,
        variables: &[S],
    ) -> Result<ConversionReport, ConvertError> {
        let started = Instant::now();
        let outputs = self.convert_granule(input, output_dir, variables)?;
        Ok(ConversionReport {
            input: input.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
            requested_variables: variables.iter().map(|v| v.as_ref().to_string()).collect(),
            outputs,
            skipped: !is_supported_extension(input, &self.extensions),
            generated_at: Utc::now(),
            elapsed_ms: started.elapsed().as_millis(),
        })
    }
}
