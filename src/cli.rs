//! # CLI Module
//!
//! This module provides the command-line interface for net2cog, including:
//! - Argument parsing with clap
//! - Configuration file loading (JSON/YAML)
//! - Environment variable support with the NET2COG_ prefix
//! - Multi-source configuration merging with priority system
//! - Configuration templates

use crate::input::{ConfigError, JobConfig};
use crate::output::{CogProfile, Compression};
use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// NetCDF to Cloud-Optimized GeoTIFF converter
#[derive(Parser, Debug)]
#[command(name = "net2cog")]
#[command(about = "Convert NetCDF variables to Cloud-Optimized GeoTIFFs")]
#[command(version)]
#[command(long_about = "
net2cog converts the variables of a NetCDF-4 granule into single-variable
Cloud-Optimized GeoTIFFs (COGs), one file per variable.

FEATURES:
  • Hierarchical granules: variables in nested groups are found and converted
  • Spatial detection: lat/lon, longitude/latitude and x/y axes are recognized
  • COG output: tiled, compressed, with overviews and a geographic CRS
  • Configuration files: JSON and YAML format support with templates
  • Validation: check generated files for COG layout, CRS and band count
  • Shell completions: Auto-completion for bash, zsh, fish, and PowerShell

EXAMPLES:
  # Convert every data variable
  net2cog convert granule.nc -o cogs/

  # Convert selected variables
  net2cog convert granule.nc -o cogs/ -n sss_smap -n gland

  # Using config file
  net2cog convert --config job.yaml

  # Generate templates
  net2cog template subset --format yaml > job.yaml

  # Granule inspection
  net2cog info granule.nc --detailed

  # Validate generated COGs
  net2cog validate cogs/*.tif
")]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet mode - suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Output format for structured data
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Human)]
    pub output_format: OutputFormat,

    /// Configuration file path (JSON or YAML)
    #[arg(short, long, global = true, env = "NET2COG_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert NetCDF variables to COGs
    #[command(long_about = "
Convert the variables of one or more NetCDF granules to COGs.

Each variable becomes <output-dir>/<variable>.tif; variables inside groups
have their slashes replaced by underscores (grid/sst -> grid_sst.tif).
Without -n every data variable with two or more dimensions is converted.
Files without a .nc, .nc4 or .h5 extension are skipped.

The first requested variable that cannot be converted aborts the run.

EXAMPLES:
  # Convert everything
  net2cog convert granule.nc -o cogs/

  # Selected variables, zstd compression, 256px tiles
  net2cog convert granule.nc -o cogs/ -n sss_smap -n fland \\
    --compression zstd --blocksize 256

  # Hierarchical granule
  net2cog convert 3B-DAY.nc4 -o cogs/ -n /Grid/precipitationCal

  # Dry run for validation
  net2cog convert granule.nc -o cogs/ --dry-run
")]
    Convert {
        /// Input NetCDF granules
        #[arg(value_name = "INPUT")]
        inputs: Vec<PathBuf>,

        /// Directory receiving the generated COGs
        #[arg(short = 'o', long)]
        output_dir: Option<PathBuf>,

        /// Variable to convert (can be used multiple times)
        #[arg(short = 'n', long = "variable")]
        variables: Vec<String>,

        /// COG compression codec
        #[arg(long, value_parser = parse_compression)]
        compression: Option<Compression>,

        /// Internal tile size in pixels (multiple of 16)
        #[arg(long, value_parser = parse_blocksize)]
        blocksize: Option<usize>,

        /// Do not build overviews
        #[arg(long)]
        no_overviews: bool,

        /// Dry run - validate configuration without processing
        #[arg(long, env = "NET2COG_DRY_RUN")]
        dry_run: bool,
    },

    /// Show information about a NetCDF granule
    #[command(long_about = "
Inspect a NetCDF granule and list its variables across all groups.

Variables marked with * are converted when no variable list is given.

EXAMPLES:
  # Basic granule info
  net2cog info granule.nc

  # With attributes
  net2cog info granule.nc --detailed

  # Info about a specific variable
  net2cog info 3B-DAY.nc4 -n Grid/precipitationCal

  # JSON output for scripting
  net2cog info granule.nc --format json
")]
    Info {
        /// NetCDF file path
        file: PathBuf,

        /// Show variable and global attributes
        #[arg(long)]
        detailed: bool,

        /// Show only specific variable info
        #[arg(short = 'n', long)]
        variable: Option<String>,

        /// Output format for file information
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,
    },

    /// Validate generated COG files
    #[command(long_about = "
Validate Cloud-Optimized GeoTIFFs.

Each file is checked for:
• GeoTIFF driver and COG layout
• Internal tiling
• A defined CRS
• 1, 3 or 4 bands (or the count given with --bands)

The command exits with an error if any file is invalid.

EXAMPLES:
  net2cog validate cogs/sss_smap.tif
  net2cog validate cogs/*.tif --output-format json
")]
    Validate {
        /// COG files to validate
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Expected band count
        #[arg(long)]
        bands: Option<usize>,
    },

    /// Generate configuration templates
    #[command(long_about = "
Generate configuration file templates for common use cases.

Available templates:
• basic: Convert every variable of a granule
• subset: Convert selected variables with a custom COG profile
• hierarchical: Variables inside groups of a NetCDF-4 granule

EXAMPLES:
  # Generate basic JSON template
  net2cog template basic

  # Generate YAML template to file
  net2cog template subset --format yaml -o job.yaml
")]
    Template {
        /// Template type to generate
        #[arg(value_enum)]
        template_type: TemplateType,

        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Configuration format
        #[arg(long, value_enum, default_value_t = ConfigFormat::Json)]
        format: ConfigFormat,
    },

    /// Generate shell completions
    #[command(long_about = "
Generate shell completion scripts for various shells.

INSTALLATION:
  # Bash
  net2cog completions bash > ~/.bash_completion.d/net2cog

  # Zsh
  net2cog completions zsh > ~/.zsh/completions/_net2cog

  # Fish
  net2cog completions fish > ~/.config/fish/completions/net2cog.fish
")]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,

        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON structured output
    Json,
    /// YAML structured output
    Yaml,
    /// CSV output (where applicable)
    Csv,
}

#[derive(ValueEnum, Clone, Debug, PartialEq, Eq)]
pub enum TemplateType {
    /// Convert every variable
    Basic,
    /// Selected variables and a custom profile
    Subset,
    /// Grouped NetCDF-4 granule
    Hierarchical,
}

#[derive(ValueEnum, Clone, Debug, PartialEq, Eq)]
pub enum ConfigFormat {
    /// JSON configuration format
    Json,
    /// YAML configuration format
    Yaml,
}

/// Convert options given on the command line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConvertOverrides {
    pub output_dir: Option<PathBuf>,
    pub variables: Vec<String>,
    pub compression: Option<Compression>,
    pub blocksize: Option<usize>,
    pub no_overviews: bool,
}

fn parse_compression(s: &str) -> Result<Compression, String> {
    s.parse()
}

/// Parse a tile size: a positive multiple of 16
fn parse_blocksize(s: &str) -> Result<usize, String> {
    let size: usize = s
        .trim()
        .parse()
        .map_err(|_| format!("Invalid block size: {}", s))?;
    if size == 0 || size % 16 != 0 {
        return Err(format!("Block size must be a positive multiple of 16, got {}", size));
    }
    Ok(size)
}

/// Builds the base job configuration.
///
/// Priority: command line > environment variables > configuration file >
/// defaults. The input path is left to [`job_for_input`].
pub fn resolve_job_config(
    config_path: Option<&Path>,
    overrides: &ConvertOverrides,
) -> Result<JobConfig, ConfigError> {
    let mut config = match config_path {
        Some(path) => JobConfig::from_file(path)?,
        None => JobConfig::default(),
    };
    config.apply_env()?;

    if let Some(output_dir) = &overrides.output_dir {
        config.output_dir = output_dir.display().to_string();
    }
    if !overrides.variables.is_empty() {
        config.variables = overrides.variables.clone();
    }
    if let Some(compression) = overrides.compression {
        config.profile.compression = compression;
    }
    if let Some(blocksize) = overrides.blocksize {
        config.profile.blocksize = blocksize;
    }
    if overrides.no_overviews {
        config.profile.overviews = false;
    }
    Ok(config)
}

/// One job per command-line input; the configured input when none is given.
pub fn jobs_for_inputs(base: &JobConfig, inputs: &[PathBuf]) -> Vec<JobConfig> {
    if inputs.is_empty() {
        return vec![base.clone()];
    }
    inputs.iter().map(|input| job_for_input(base, input)).collect()
}

pub fn job_for_input(base: &JobConfig, input: &Path) -> JobConfig {
    JobConfig {
        input: input.display().to_string(),
        ..base.clone()
    }
}

/// Renders a configuration template.
pub fn generate_template(
    template_type: &TemplateType,
    format: &ConfigFormat,
) -> Result<String, ConfigError> {
    let config = template_config(template_type);
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(&config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(&config)?,
    })
}

fn template_config(template_type: &TemplateType) -> JobConfig {
    match template_type {
        TemplateType::Basic => JobConfig {
            input: "RSS_smap_SSS_L3_8day_running_2020_005_FNL_v04.0.nc".to_string(),
            output_dir: "cogs".to_string(),
            ..JobConfig::default()
        },
        TemplateType::Subset => JobConfig {
            input: "RSS_smap_SSS_L3_8day_running_2020_005_FNL_v04.0.nc".to_string(),
            output_dir: "cogs".to_string(),
            variables: vec![
                "sss_smap".to_string(),
                "gland".to_string(),
                "fland".to_string(),
            ],
            profile: CogProfile {
                compression: Compression::Zstd,
                blocksize: 256,
                ..CogProfile::default()
            },
            ..JobConfig::default()
        },
        TemplateType::Hierarchical => JobConfig {
            input: "3B-DAY.MS.MRG.3IMERG.20200101-S000000-E235959.V06.nc4".to_string(),
            output_dir: "cogs".to_string(),
            variables: vec![
                "/Grid/precipitationCal".to_string(),
                "/Grid/HQprecipitation".to_string(),
            ],
            extensions: vec!["nc4".to_string(), "h5".to_string()],
            ..JobConfig::default()
        },
    }
}
