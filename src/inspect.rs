//! Read generated documents back into owned types.
//!
//! Used to verify output: configuration-scoped values are looked up by
//! evaluating the `Condition` attributes, and [`check_correlation`] reports
//! every way the filters document disagrees with the project document.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::Path;

use crate::condition::{configuration_vars, expand_properties, holds};
use crate::error::Result;

// ═══════════════════════════════════════════════════════════════════════════════
//  Project document
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyGroup {
    pub condition: Option<String>,
    pub label: Option<String>,
    pub properties: BTreeMap<String, String>,
}

/// A file item (`ClCompile`, `ClInclude`, `None`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectItem {
    pub element: String,
    pub include: String,
    /// Conditions of the `ExcludedFromBuild` children whose value is `true`.
    pub excluded_in: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectReference {
    pub include: String,
    pub project: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectDocument {
    /// `(variant, platform)` in document order.
    pub configurations: Vec<(String, String)>,
    pub property_groups: Vec<PropertyGroup>,
    pub items: Vec<ProjectItem>,
    pub references: Vec<ProjectReference>,
    pub imports: Vec<String>,
}

impl ProjectDocument {
    pub fn parse(source: &str) -> Result<Self> {
        let doc = roxmltree::Document::parse(source)?;
        let mut project = Self::default();

        for child in doc.root_element().children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "PropertyGroup" => project.property_groups.push(parse_property_group(&child)),
                "ItemGroup" => project.parse_item_group(&child),
                "Import" => {
                    project
                        .imports
                        .push(child.attribute("Project").unwrap_or("").to_string());
                }
                _ => {}
            }
        }

        Ok(project)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::parse(&source)
    }

    fn parse_item_group(&mut self, group: &roxmltree::Node) {
        for child in group.children().filter(|n| n.is_element()) {
            let include = child.attribute("Include").unwrap_or("").to_string();
            match child.tag_name().name() {
                "ProjectConfiguration" => {
                    let variant = find_child_text(&child, "Configuration").unwrap_or_default();
                    let platform = find_child_text(&child, "Platform").unwrap_or_default();
                    self.configurations.push((variant, platform));
                }
                "ProjectReference" => self.references.push(ProjectReference {
                    include,
                    project: find_child_text(&child, "Project"),
                }),
                element => {
                    let excluded_in = child
                        .children()
                        .filter(|n| n.is_element() && n.tag_name().name() == "ExcludedFromBuild")
                        .filter(|n| n.text().is_some_and(|t| t.trim().eq_ignore_ascii_case("true")))
                        .map(|n| n.attribute("Condition").unwrap_or("").to_string())
                        .collect();
                    self.items.push(ProjectItem {
                        element: element.to_string(),
                        include,
                        excluded_in,
                    });
                }
            }
        }
    }

    fn globals(&self) -> Option<&PropertyGroup> {
        self.property_groups
            .iter()
            .find(|pg| pg.label.as_deref() == Some("Globals"))
    }

    /// A value from the `Globals` property group.
    pub fn global(&self, name: &str) -> Option<&str> {
        self.globals()?.properties.get(name).map(String::as_str)
    }

    pub fn guid(&self) -> Option<&str> {
        self.global("ProjectGuid")
    }

    pub fn item(&self, include: &str) -> Option<&ProjectItem> {
        self.items.iter().find(|item| item.include == include)
    }

    /// Whether `include` is excluded from the build of one configuration.
    /// Files that are not in the project are not excluded.
    pub fn is_excluded(&self, include: &str, variant: &str, platform: &str) -> Result<bool> {
        let Some(item) = self.item(include) else {
            return Ok(false);
        };
        let vars = configuration_vars(variant, platform);
        for condition in &item.excluded_in {
            if holds(condition, &vars)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Value of property `name` for one configuration.  Later property
    /// groups override earlier ones, as in MSBuild evaluation.  `$(...)`
    /// references to the configuration and platform are expanded.
    pub fn property(&self, name: &str, variant: &str, platform: &str) -> Result<Option<String>> {
        let vars = configuration_vars(variant, platform);
        let mut value = None;
        for group in &self.property_groups {
            let applies = match &group.condition {
                Some(condition) => holds(condition, &vars)?,
                None => true,
            };
            if applies {
                if let Some(v) = group.properties.get(name) {
                    value = Some(expand_properties(v, &vars));
                }
            }
        }
        Ok(value)
    }

    pub fn configuration_type(&self, variant: &str, platform: &str) -> Result<Option<String>> {
        self.property("ConfigurationType", variant, platform)
    }

    pub fn out_dir(&self, variant: &str, platform: &str) -> Result<Option<String>> {
        self.property("OutDir", variant, platform)
    }
}

fn parse_property_group(node: &roxmltree::Node) -> PropertyGroup {
    PropertyGroup {
        condition: node.attribute("Condition").map(String::from),
        label: node.attribute("Label").map(String::from),
        properties: node
            .children()
            .filter(|n| n.is_element())
            .map(|n| (n.tag_name().name().to_string(), n.text().unwrap_or("").to_string()))
            .collect(),
    }
}

fn find_child_text(parent: &roxmltree::Node, tag: &str) -> Option<String> {
    parent
        .children()
        .find(|c| c.is_element() && c.tag_name().name() == tag)
        .and_then(|c| c.text())
        .map(String::from)
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Filters document
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterEntry {
    pub path: String,
    pub identifier: Option<String>,
    pub extensions: Option<String>,
}

/// Assignment of one file to a filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterAssignment {
    pub element: String,
    pub include: String,
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FiltersDocument {
    pub filters: Vec<FilterEntry>,
    pub assignments: Vec<FilterAssignment>,
}

impl FiltersDocument {
    pub fn parse(source: &str) -> Result<Self> {
        let doc = roxmltree::Document::parse(source)?;
        let mut filters = Self::default();

        let groups = doc
            .root_element()
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == "ItemGroup");
        for group in groups {
            for child in group.children().filter(|n| n.is_element()) {
                let include = child.attribute("Include").unwrap_or("").to_string();
                match child.tag_name().name() {
                    "Filter" => filters.filters.push(FilterEntry {
                        path: include,
                        identifier: find_child_text(&child, "UniqueIdentifier"),
                        extensions: find_child_text(&child, "Extensions"),
                    }),
                    element => filters.assignments.push(FilterAssignment {
                        element: element.to_string(),
                        include,
                        filter: find_child_text(&child, "Filter"),
                    }),
                }
            }
        }

        Ok(filters)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::parse(&source)
    }

    pub fn filter_for(&self, include: &str) -> Option<&str> {
        self.assignments
            .iter()
            .find(|a| a.include == include)
            .and_then(|a| a.filter.as_deref())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Correlation
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub enum CorrelationIssue {
    /// Project item with no filter assignment.
    MissingAssignment { include: String },
    DuplicateAssignment { include: String, count: usize },
    /// Filter assignment for a file the project does not list.
    OrphanAssignment { include: String },
    ElementMismatch { include: String, project: String, filters: String },
    /// Assignment without a `<Filter>` child.
    MissingFilter { include: String },
    UndeclaredFilter { include: String, filter: String },
    MissingParentFilter { filter: String, parent: String },
    DuplicateFilter { filter: String },
    DuplicateIdentifier { identifier: String },
}

impl fmt::Display for CorrelationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingAssignment { include } => {
                write!(f, "'{include}' has no filter assignment")
            }
            Self::DuplicateAssignment { include, count } => {
                write!(f, "'{include}' is assigned to a filter {count} times")
            }
            Self::OrphanAssignment { include } => {
                write!(f, "'{include}' is filed but not part of the project")
            }
            Self::ElementMismatch { include, project, filters } => write!(
                f,
                "'{include}' is a {project} in the project but a {filters} in the filters"
            ),
            Self::MissingFilter { include } => write!(f, "'{include}' names no filter"),
            Self::UndeclaredFilter { include, filter } => {
                write!(f, "'{include}' is filed under undeclared filter '{filter}'")
            }
            Self::MissingParentFilter { filter, parent } => {
                write!(f, "filter '{filter}' is declared without its parent '{parent}'")
            }
            Self::DuplicateFilter { filter } => write!(f, "filter '{filter}' is declared twice"),
            Self::DuplicateIdentifier { identifier } => {
                write!(f, "identifier {identifier} is used by more than one filter")
            }
        }
    }
}

/// Cross-check the two documents.  `unfiled` lists project items that are
/// expected to have no filter assignment (the build script).  An empty
/// result means the pair is consistent.
pub fn check_correlation(
    project: &ProjectDocument,
    filters: &FiltersDocument,
    unfiled: &[&str],
) -> Vec<CorrelationIssue> {
    let mut issues = Vec::new();

    let mut declared = HashSet::new();
    let mut identifiers = HashSet::new();
    for entry in &filters.filters {
        if !declared.insert(entry.path.as_str()) {
            issues.push(CorrelationIssue::DuplicateFilter {
                filter: entry.path.clone(),
            });
        }
        if let Some(id) = &entry.identifier {
            if !identifiers.insert(id.to_ascii_uppercase()) {
                issues.push(CorrelationIssue::DuplicateIdentifier {
                    identifier: id.clone(),
                });
            }
        }
    }
    for entry in &filters.filters {
        if let Some((parent, _)) = entry.path.rsplit_once('\\') {
            if !declared.contains(parent) {
                issues.push(CorrelationIssue::MissingParentFilter {
                    filter: entry.path.clone(),
                    parent: parent.to_string(),
                });
            }
        }
    }

    let mut assigned: HashMap<&str, Vec<&FilterAssignment>> = HashMap::new();
    for assignment in &filters.assignments {
        assigned.entry(assignment.include.as_str()).or_default().push(assignment);
        match &assignment.filter {
            None => issues.push(CorrelationIssue::MissingFilter {
                include: assignment.include.clone(),
            }),
            Some(filter) if !declared.contains(filter.as_str()) => {
                issues.push(CorrelationIssue::UndeclaredFilter {
                    include: assignment.include.clone(),
                    filter: filter.clone(),
                });
            }
            Some(_) => {}
        }
    }

    let mut listed = HashSet::new();
    for item in &project.items {
        listed.insert(item.include.as_str());
        if unfiled.contains(&item.include.as_str()) {
            continue;
        }
        match assigned.get(item.include.as_str()).map(Vec::as_slice) {
            None | Some([]) => issues.push(CorrelationIssue::MissingAssignment {
                include: item.include.clone(),
            }),
            Some([only]) => {
                if only.element != item.element {
                    issues.push(CorrelationIssue::ElementMismatch {
                        include: item.include.clone(),
                        project: item.element.clone(),
                        filters: only.element.clone(),
                    });
                }
            }
            Some(many) => issues.push(CorrelationIssue::DuplicateAssignment {
                include: item.include.clone(),
                count: many.len(),
            }),
        }
    }

    for assignment in &filters.assignments {
        if !listed.contains(assignment.include.as_str()) {
            issues.push(CorrelationIssue::OrphanAssignment {
                include: assignment.include.clone(),
            });
        }
    }

    issues
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════
