//! # Granule Access
//!
//! Read-only access to a NetCDF granule: an owned snapshot of its group tree
//! for discovery, and variable handles for data reads.
//!
//! ## Key Components
//!
//! - [`VariablePath`]: normalized slash-delimited variable reference
//! - [`GroupNode`] / [`VariableInfo`]: owned tree snapshot of the granule
//! - [`Granule`]: the open file plus its snapshot
//! - [`data_variables`]: the variable enumerator used for "convert everything"

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// A slash-delimited reference to a variable inside a granule.
///
/// Leading and repeated separators are dropped, so `/grid/sst`, `grid//sst`
/// and `grid/sst` all refer to the same variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct VariablePath(String);

impl VariablePath {
    pub fn new(path: &str) -> Self {
        let normalized = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>()
            .join("/");
        VariablePath(normalized)
    }

    /// Joins a group path and a variable name.
    pub fn join(group: &str, name: &str) -> Self {
        VariablePath::new(&format!("{}/{}", group, name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Final path segment.
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Path of the enclosing group; empty for root-level variables.
    pub fn group(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[..idx],
            None => "",
        }
    }

    /// Candidate paths for `name` as seen from this variable's group, nearest
    /// group first and the root group last.
    pub fn visible_paths(&self, name: &str) -> Vec<VariablePath> {
        let mut candidates = Vec::new();
        let mut group = self.group();
        loop {
            candidates.push(VariablePath::join(group, name));
            if group.is_empty() {
                break;
            }
            group = match group.rfind('/') {
                Some(idx) => &group[..idx],
                None => "",
            };
        }
        candidates
    }
}

impl fmt::Display for VariablePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VariablePath {
    fn from(path: &str) -> Self {
        VariablePath::new(path)
    }
}

impl From<String> for VariablePath {
    fn from(path: String) -> Self {
        VariablePath::new(&path)
    }
}

/// Metadata of one variable, detached from the file handle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableInfo {
    pub name: String,
    pub path: VariablePath,
    pub dimensions: Vec<String>,
    pub shape: Vec<usize>,
    pub data_type: String,
    /// Dimension coordinate or auxiliary coordinate named by a `coordinates`
    /// attribute in the same group.
    pub is_coordinate: bool,
}

impl VariableInfo {
    pub fn rank(&self) -> usize {
        self.dimensions.len()
    }
}

/// One group of the granule tree. The root group has an empty path.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupNode {
    pub name: String,
    pub path: String,
    pub variables: Vec<VariableInfo>,
    pub groups: Vec<GroupNode>,
}

impl GroupNode {
    /// Depth-first, pre-order walk: a group's own variables before its
    /// child groups, both in file order.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a VariableInfo)) {
        for variable in &self.variables {
            visit(variable);
        }
        for group in &self.groups {
            group.walk(visit);
        }
    }

    /// Every variable in the tree, in walk order.
    pub fn all_variables(&self) -> Vec<&VariableInfo> {
        let mut variables = Vec::new();
        self.walk(&mut |variable| variables.push(variable));
        variables
    }

    pub fn find(&self, path: &VariablePath) -> Option<&VariableInfo> {
        let mut found = None;
        self.walk(&mut |variable| {
            if found.is_none() && &variable.path == path {
                found = Some(variable);
            }
        });
        found
    }

    /// Number of groups below this one, at any depth.
    pub fn descendant_count(&self) -> usize {
        self.groups
            .iter()
            .map(|group| 1 + group.descendant_count())
            .sum()
    }
}

/// Returns the paths of all data variables with two or more dimensions,
/// across every group of the tree.
///
/// One-dimensional variables and coordinate variables are left out: they
/// carry axis values rather than raster data.
pub fn data_variables(root: &GroupNode) -> Vec<VariablePath> {
    let mut paths = Vec::new();
    root.walk(&mut |variable| {
        if variable.rank() >= 2 && !variable.is_coordinate {
            paths.push(variable.path.clone());
        }
    });
    paths
}

/// An open, read-only NetCDF granule.
pub struct Granule {
    path: PathBuf,
    file: netcdf::File,
    root: GroupNode,
}

impl Granule {
    /// Opens the granule and snapshots its group tree.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, netcdf::Error> {
        let path = path.as_ref().to_path_buf();
        let file = netcdf::open(&path)?;
        let root = snapshot_file(&file)?;
        Ok(Granule { path, file, root })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn root(&self) -> &GroupNode {
        &self.root
    }

    pub fn file(&self) -> &netcdf::File {
        &self.file
    }

    pub fn info(&self, path: &VariablePath) -> Option<&VariableInfo> {
        self.root.find(path)
    }

    /// Variable handle for data reads.
    pub fn variable(&self, path: &VariablePath) -> Option<netcdf::Variable<'_>> {
        self.root.find(path)?;
        self.file.variable(path.as_str())
    }

    /// Paths of every convertible data variable in the granule.
    pub fn data_variables(&self) -> Vec<VariablePath> {
        data_variables(&self.root)
    }
}

fn snapshot_file(file: &netcdf::File) -> Result<GroupNode, netcdf::Error> {
    let mut root = GroupNode {
        name: String::new(),
        path: String::new(),
        variables: snapshot_variables("", file.variables()),
        groups: Vec::new(),
    };
    for group in file.groups()? {
        root.groups.push(snapshot_group(&group, ""));
    }
    Ok(root)
}

fn snapshot_group(group: &netcdf::Group<'_>, parent: &str) -> GroupNode {
    let name = group.name();
    let path = if parent.is_empty() {
        name.clone()
    } else {
        format!("{}/{}", parent, name)
    };
    let variables = snapshot_variables(&path, group.variables());
    let groups = group
        .groups()
        .map(|child| snapshot_group(&child, &path))
        .collect();
    GroupNode {
        name,
        path,
        variables,
        groups,
    }
}

fn snapshot_variables<'f>(
    group_path: &str,
    variables: impl Iterator<Item = netcdf::Variable<'f>>,
) -> Vec<VariableInfo> {
    let variables: Vec<netcdf::Variable<'f>> = variables.collect();

    let mut auxiliary: Vec<String> = Vec::new();
    for var in &variables {
        if let Some(names) = string_attribute(var, "coordinates") {
            auxiliary.extend(names.split_whitespace().map(str::to_string));
        }
    }

    variables
        .iter()
        .map(|var| {
            let name = var.name();
            let dimensions: Vec<String> =
                var.dimensions().iter().map(|d| d.name().to_string()).collect();
            let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
            let is_dimension_coordinate = dimensions.len() == 1 && dimensions[0] == name;
            VariableInfo {
                path: VariablePath::join(group_path, &name),
                is_coordinate: is_dimension_coordinate || auxiliary.contains(&name),
                data_type: format!("{:?}", var.vartype()),
                name,
                dimensions,
                shape,
            }
        })
        .collect()
}

/// Reads a text attribute, ignoring attributes of any other type.
pub(crate) fn string_attribute(var: &netcdf::Variable<'_>, name: &str) -> Option<String> {
    match var.attribute_value(name)? {
        Ok(netcdf::AttributeValue::Str(value)) => Some(value),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variable(path: &str, dimensions: &[&str]) -> VariableInfo {
        let path = VariablePath::new(path);
        VariableInfo {
            name: path.name().to_string(),
            dimensions: dimensions.iter().map(|d| d.to_string()).collect(),
            shape: vec![2; dimensions.len()],
            data_type: "Float(F32)".to_string(),
            is_coordinate: dimensions.len() == 1 && dimensions[0] == path.name(),
            path,
        }
    }

    #[test]
    fn test_variable_path_normalization() {
        assert_eq!(VariablePath::new("/grid/sst").as_str(), "grid/sst");
        assert_eq!(VariablePath::new("grid//sst/").as_str(), "grid/sst");
        assert_eq!(VariablePath::join("", "sst").as_str(), "sst");
        assert_eq!(VariablePath::join("a/b", "sst").as_str(), "a/b/sst");
    }

    #[test]
    fn test_variable_path_parts() {
        let path = VariablePath::new("a/b/sst");
        assert_eq!(path.name(), "sst");
        assert_eq!(path.group(), "a/b");

        let root = VariablePath::new("sst");
        assert_eq!(root.name(), "sst");
        assert_eq!(root.group(), "");
    }

    #[test]
    fn test_visible_paths_walk_up_to_root() {
        let path = VariablePath::new("a/b/sst");
        let visible: Vec<String> = path
            .visible_paths("lat")
            .iter()
            .map(|p| p.to_string())
            .collect();
        assert_eq!(visible, vec!["a/b/lat", "a/lat", "lat"]);

        let root = VariablePath::new("sst");
        assert_eq!(root.visible_paths("lat"), vec![VariablePath::new("lat")]);
    }

    #[test]
    fn test_data_variables_flat() {
        let root = GroupNode {
            variables: vec![
                variable("lat", &["lat"]),
                variable("lon", &["lon"]),
                variable("sss_smap", &["lat", "lon"]),
                variable("gland", &["lat", "lon"]),
                variable("fland", &["lat", "lon"]),
                variable("quality", &["time"]),
            ],
            ..GroupNode::default()
        };

        let mut found: Vec<String> = data_variables(&root)
            .into_iter()
            .map(|p| p.to_string())
            .collect();
        found.sort();
        assert_eq!(found, vec!["fland", "gland", "sss_smap"]);
    }

    #[test]
    fn test_data_variables_nested_groups() {
        let root = GroupNode {
            groups: vec![
                GroupNode {
                    name: "grid".to_string(),
                    path: "grid".to_string(),
                    variables: vec![variable("grid/precipitation", &["time", "lon", "lat"])],
                    groups: vec![GroupNode {
                        name: "detail".to_string(),
                        path: "grid/detail".to_string(),
                        variables: vec![variable("grid/detail/error", &["y", "x"])],
                        groups: vec![],
                    }],
                },
                GroupNode {
                    name: "other".to_string(),
                    path: "other".to_string(),
                    variables: vec![variable("other/mask", &["y", "x"])],
                    groups: vec![],
                },
            ],
            ..GroupNode::default()
        };

        let found: Vec<String> = data_variables(&root)
            .into_iter()
            .map(|p| p.to_string())
            .collect();
        assert_eq!(
            found,
            vec!["grid/precipitation", "grid/detail/error", "other/mask"]
        );
        assert_eq!(root.descendant_count(), 3);
    }

    #[test]
    fn test_auxiliary_coordinates_are_not_data_variables() {
        let mut lat2d = variable("lat2d", &["y", "x"]);
        lat2d.is_coordinate = true;
        let root = GroupNode {
            variables: vec![lat2d, variable("radiance", &["y", "x"])],
            ..GroupNode::default()
        };
        assert_eq!(data_variables(&root), vec![VariablePath::new("radiance")]);
    }

    #[test]
    fn test_find_by_path() {
        let root = GroupNode {
            variables: vec![variable("sst", &["lat", "lon"])],
            groups: vec![GroupNode {
                name: "grid".to_string(),
                path: "grid".to_string(),
                variables: vec![variable("grid/sst", &["y", "x"])],
                groups: vec![],
            }],
            ..GroupNode::default()
        };

        let nested = root.find(&VariablePath::new("/grid/sst")).unwrap();
        assert_eq!(nested.dimensions, vec!["y", "x"]);
        assert!(root.find(&VariablePath::new("grid/missing")).is_none());
    }
}
