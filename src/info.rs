//! # Granule Information Module
//!
//! This module inspects a NetCDF granule and reports, for every variable in
//! every group, its dimensions and whether net2cog would convert it.

use crate::extract::{AxisLayout, AxisView};
use crate::granule::{Granule, VariableInfo, VariablePath};
use crate::spatial::{is_excluded, spatial_pair};
use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Information about a NetCDF dimension
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionSummary {
    pub name: String,
    pub length: usize,
    pub is_unlimited: bool,
}

/// Information about one variable of the granule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableSummary {
    pub path: String,
    pub data_type: String,
    pub dimensions: Vec<String>,
    pub shape: Vec<usize>,
    /// Recognized spatial pair, e.g. `lat / lon`
    pub spatial_pair: Option<String>,
    pub is_coordinate: bool,
    /// Included when converting every variable of the granule, with x/y
    /// axes and at most one band dimension
    pub convertible: bool,
    pub attributes: BTreeMap<String, String>,
}

/// Complete information about a granule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GranuleSummary {
    pub path: String,
    pub file_size: Option<u64>,
    pub dimensions: Vec<DimensionSummary>,
    pub variables: Vec<VariableSummary>,
    pub global_attributes: BTreeMap<String, String>,
    pub total_groups: usize,
    pub total_variables: usize,
    pub convertible_variables: usize,
}

/// Extract information from a granule.
///
/// `variable` restricts the listing to one variable path; `detailed` adds
/// variable and global attributes.
pub fn get_granule_info(
    file_path: &Path,
    variable: Option<&str>,
    detailed: bool,
) -> Result<GranuleSummary> {
    debug!("Opening NetCDF file: {}", file_path.display());
    let granule = Granule::open(file_path)
        .with_context(|| format!("Failed to open NetCDF file: {}", file_path.display()))?;
    let file_size = std::fs::metadata(file_path).ok().map(|m| m.len());

    let dimensions = granule
        .file()
        .dimensions()
        .map(|dim| DimensionSummary {
            name: dim.name().to_string(),
            length: dim.len(),
            is_unlimited: dim.is_unlimited(),
        })
        .collect();

    let convertible_paths = granule.data_variables();
    let wanted = variable.map(VariablePath::new);

    let mut variables = Vec::new();
    for info in granule.root().all_variables() {
        if wanted.as_ref().is_some_and(|w| w != &info.path) {
            continue;
        }
        let attributes = if detailed {
            variable_attributes(&granule, info)
        } else {
            BTreeMap::new()
        };
        variables.push(VariableSummary {
            path: info.path.to_string(),
            data_type: info.data_type.clone(),
            dimensions: info.dimensions.clone(),
            shape: info.shape.clone(),
            spatial_pair: spatial_pair(&info.dimensions).map(|pair| pair.to_string()),
            is_coordinate: info.is_coordinate,
            convertible: convertible_paths.contains(&info.path) && has_raster_layout(info),
            attributes,
        });
    }
    if let (Some(wanted), true) = (&wanted, variables.is_empty()) {
        anyhow::bail!("No variable named '{}'.", wanted);
    }

    let mut global_attributes = BTreeMap::new();
    if detailed {
        for attr in granule.file().attributes() {
            if let Ok(value) = attr.value() {
                global_attributes.insert(attr.name().to_string(), format_attribute_value(&value));
            }
        }
    }

    Ok(GranuleSummary {
        path: file_path.display().to_string(),
        file_size,
        dimensions,
        total_groups: granule.root().descendant_count(),
        total_variables: variables.len(),
        convertible_variables: variables.iter().filter(|v| v.convertible).count(),
        variables,
        global_attributes,
    })
}

fn has_raster_layout(info: &VariableInfo) -> bool {
    if spatial_pair(&info.dimensions).is_none() || is_excluded(info.path.as_str()) {
        return false;
    }
    [AxisView::direct(&info.dimensions), AxisView::lat_lon_alias()]
        .iter()
        .any(|view| AxisLayout::resolve(view, &info.dimensions).is_ok())
}

fn variable_attributes(granule: &Granule, info: &VariableInfo) -> BTreeMap<String, String> {
    let mut attributes = BTreeMap::new();
    if let Some(var) = granule.variable(&info.path) {
        for attr in var.attributes() {
            if let Ok(value) = attr.value() {
                attributes.insert(attr.name().to_string(), format_attribute_value(&value));
            }
        }
    }
    attributes
}

/// Format netcdf attribute value for display
fn format_attribute_value(value: &netcdf::AttributeValue) -> String {
    match value {
        netcdf::AttributeValue::Str(s) => s.clone(),
        other => format!("{:?}", other),
    }
}

/// Print granule info in human-readable format
pub fn print_granule_info_human(info: &GranuleSummary) {
    println!("NetCDF Granule Information:");
    println!("  Path: {}", info.path);
    if let Some(size) = info.file_size {
        println!("  File Size: {:.2} MB", size as f64 / 1_048_576.0);
    }
    println!("  Groups: {}", info.total_groups);
    println!("  Root dimensions: {}", info.dimensions.len());
    for dim in &info.dimensions {
        println!(
            "    {} ({}{})",
            dim.name,
            dim.length,
            if dim.is_unlimited { ", unlimited" } else { "" }
        );
    }
    println!(
        "  Variables: {} total, {} convertible",
        info.total_variables, info.convertible_variables
    );
    for var in &info.variables {
        let marker = if var.convertible { "*" } else { " " };
        println!(
            "  {} {} ({}) - dimensions: [{}]",
            marker,
            var.path,
            var.data_type,
            var.dimensions.join(", ")
        );
        for (name, value) in &var.attributes {
            println!("        @{}: {}", name, value);
        }
    }
    if !info.global_attributes.is_empty() {
        println!("  Global Attributes:");
        for (name, value) in &info.global_attributes {
            println!("    @{}: {}", name, value);
        }
    }
}

/// Print granule info in JSON format
pub fn print_granule_info_json(info: &GranuleSummary) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(info)?);
    Ok(())
}

/// Print granule info in YAML format
pub fn print_granule_info_yaml(info: &GranuleSummary) -> Result<()> {
    let yaml = serde_yaml::to_string(info).context("Failed to serialize granule info to YAML")?;
    println!("{}", yaml);
    Ok(())
}

/// Print granule info in CSV format (variables only)
pub fn print_granule_info_csv(info: &GranuleSummary) -> Result<()> {
    println!("{}", granule_info_csv(info));
    Ok(())
}

fn granule_info_csv(info: &GranuleSummary) -> String {
    let mut lines = vec!["variable_path,data_type,dimensions,shape,convertible".to_string()];
    for var in &info.variables {
        lines.push(format!(
            "{},{},\"{}\",\"{}\",{}",
            var.path,
            var.data_type,
            var.dimensions.join(";"),
            var.shape
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join(";"),
            var.convertible
        ));
    }
    lines.join("\n")
}
