//! Drives generation of the project / filters document pair.
//!
//! Generation is one forward pass through fixed stages:
//!
//! ```text
//! Init → HeaderWritten → ConfigsWritten → SourcesWritten → Finalized
//! ```
//!
//! Everything that can fail on bad input (version check, path resolution)
//! happens while building the [`GenerationPlan`], before any output is
//! opened.

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use crate::condition::configuration_condition;
use crate::config::{BuildMetadata, ExclusionRule, FileCategory, GeneratorSettings};
use crate::document::{escape, filters_path, DocumentPair, FilterDeclaration, SourceItem};
use crate::emit::ConfigurationEmitter;
use crate::error::{Result, VcxprojError};
use crate::guid::identifier_for;
use crate::hierarchy::Folder;
use crate::paths::{normalize_windows, parent_of, relative_to};
use crate::policy::{exclusions_for, filter_path_for, partition_headers};

const MSBUILD_NS: &str = "http://schemas.microsoft.com/developer/msbuild/2003";

// ═══════════════════════════════════════════════════════════════════════════════
//  ProjectDescriptor
// ═══════════════════════════════════════════════════════════════════════════════

/// Identity of the project being generated.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectDescriptor {
    pub name: String,
    /// Where the `.vcxproj` is written.
    pub output_path: PathBuf,
    /// Directory every emitted path is relative to.
    pub project_dir: PathBuf,
    pub guid: String,
    /// Output path exactly as supplied, Windows-normalized.  Seeds every
    /// derived GUID so they do not depend on where the tree is checked out.
    pub scope_key: String,
}

impl ProjectDescriptor {
    pub fn from_metadata(meta: &BuildMetadata) -> Self {
        let scope_key = normalize_windows(&meta.output.to_string_lossy());
        let output_path = meta.resolve(&meta.output);
        let project_dir = match output_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let guid = meta
            .project_guid
            .clone()
            .filter(|guid| !guid.is_empty())
            .unwrap_or_else(|| identifier_for(&scope_key, ""));

        Self {
            name: meta.name.clone(),
            output_path,
            project_dir,
            guid,
            scope_key,
        }
    }

    /// GUID a reference to project `name` is recorded with.
    pub fn reference_guid(&self, name: &str) -> String {
        identifier_for(&self.scope_key, name)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  GenerationPlan
// ═══════════════════════════════════════════════════════════════════════════════

/// Folder tree for one non-empty category.
#[derive(Debug, Clone)]
pub struct CategoryTree {
    pub category: FileCategory,
    pub root: Folder,
}

/// Everything resolved from the inputs before writing starts.
pub struct GenerationPlan<'a> {
    meta: &'a BuildMetadata,
    settings: &'a GeneratorSettings,
    descriptor: ProjectDescriptor,
    emitter: ConfigurationEmitter<'a>,
    trees: Vec<CategoryTree>,
    external_headers: Vec<String>,
    build_script: Option<String>,
}

impl<'a> GenerationPlan<'a> {
    pub fn new(meta: &'a BuildMetadata, settings: &'a GeneratorSettings) -> Result<Self> {
        settings.check_version()?;

        let descriptor = ProjectDescriptor::from_metadata(meta);
        let project_dir = descriptor.project_dir.clone();
        let emitter = ConfigurationEmitter::new(meta, settings, &project_dir)?;

        let relative = |paths: &[String]| -> Result<Vec<String>> {
            paths
                .iter()
                .filter(|p| !p.trim().is_empty())
                .map(|p| relative_to(meta.resolve(p), &project_dir))
                .collect()
        };

        let sources = relative(meta.files.get(FileCategory::Source))?;
        let source_root = Folder::build(&sources);

        let mut affinity = partition_headers(&relative(meta.files.get(FileCategory::Header))?, &sources);
        // A source file named like a folder replaces it; headers redirected
        // into that folder would have no filter to be filed under.
        let (local, displaced): (Vec<String>, Vec<String>) = affinity
            .local
            .into_iter()
            .partition(|header| source_root.contains_folder(parent_of(header)));
        for header in &displaced {
            tracing::debug!(%header, "source folder replaced by a file, header left out");
        }
        affinity.local = local;
        affinity.external.extend(displaced);
        if !affinity.external.is_empty() {
            tracing::warn!(
                count = affinity.external.len(),
                "headers without a neighbouring source file are left out of the project"
            );
        }

        let mut trees = Vec::new();
        for category in FileCategory::in_label_order() {
            let root = match category {
                FileCategory::Source => source_root.clone(),
                FileCategory::Header => Folder::build(&affinity.local),
                other => Folder::build(relative(meta.files.get(other))?),
            };
            tracing::debug!(%category, files = root.file_count(), "category tree built");
            if !root.is_empty() {
                trees.push(CategoryTree { category, root });
            }
        }

        let build_script = meta
            .build_script
            .as_ref()
            .filter(|script| !script.as_os_str().is_empty())
            .map(|script| relative_to(meta.resolve(script), &project_dir))
            .transpose()?;

        Ok(Self {
            meta,
            settings,
            descriptor,
            emitter,
            trees,
            external_headers: affinity.external,
            build_script,
        })
    }

    pub fn descriptor(&self) -> &ProjectDescriptor {
        &self.descriptor
    }

    pub fn trees(&self) -> &[CategoryTree] {
        &self.trees
    }

    /// Headers dropped by the affinity rule, project-relative.
    pub fn external_headers(&self) -> &[String] {
        &self.external_headers
    }

    fn source_control_block(&self) -> Result<String> {
        let scc = &self.meta.source_control;
        let project_name = escape(scc.project_name.as_deref().unwrap_or(""));

        if let Some(provider) = scc.provider() {
            let root = scc
                .connection_root
                .as_deref()
                .filter(|root| !root.trim().is_empty())
                .unwrap_or(".");
            let local_path = relative_to(self.meta.resolve(root), &self.descriptor.project_dir)?;

            let mut out = format!("\t\t<SccProjectName>{project_name}</SccProjectName>\n");
            if let Some(aux) = scc.aux_path() {
                out.push_str(&format!("\t\t<SccAuxPath>{}</SccAuxPath>\n", escape(aux)));
            }
            out.push_str(&format!(
                "\t\t<SccLocalPath>{}</SccLocalPath>\n\t\t<SccProvider>{}</SccProvider>\n",
                escape(&local_path),
                escape(provider)
            ));
            Ok(out)
        } else if let Some(local_path) = scc.legacy_local_path() {
            Ok(format!(
                "\t\t<SccProjectName>{project_name}</SccProjectName>\n\
                 \t\t<SccLocalPath>{}</SccLocalPath>\n",
                escape(local_path)
            ))
        } else {
            Ok(String::new())
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  ProjectWriter
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    HeaderWritten,
    ConfigsWritten,
    SourcesWritten,
    Finalized,
}

impl Stage {
    fn name(self) -> &'static str {
        match self {
            Stage::Init => "Init",
            Stage::HeaderWritten => "HeaderWritten",
            Stage::ConfigsWritten => "ConfigsWritten",
            Stage::SourcesWritten => "SourcesWritten",
            Stage::Finalized => "Finalized",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub struct ProjectWriter<'a, W: Write> {
    plan: GenerationPlan<'a>,
    docs: DocumentPair<W>,
    stage: Stage,
}

impl<'a, W: Write> ProjectWriter<'a, W> {
    pub fn new(plan: GenerationPlan<'a>, docs: DocumentPair<W>) -> Self {
        Self {
            plan,
            docs,
            stage: Stage::Init,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    fn expect_stage(&self, expected: Stage) -> Result<()> {
        if self.stage != expected {
            return Err(VcxprojError::OutOfOrder {
                expected: expected.name(),
                found: self.stage.name(),
            });
        }
        Ok(())
    }

    /// Run every stage in order and return the flushed writers.
    pub fn run(mut self) -> Result<(W, W)> {
        self.write_header()?;
        self.write_configurations()?;
        self.write_sources()?;
        self.finalize()
    }

    /// Prologue, configuration list and globals.
    pub fn write_header(&mut self) -> Result<()> {
        self.expect_stage(Stage::Init)?;
        let descriptor = &self.plan.descriptor;
        tracing::debug!(project = %descriptor.name, guid = %descriptor.guid, "writing header");

        let mut out = format!(
            "<?xml version=\"1.0\" encoding=\"{}\"?>\n\
             <Project DefaultTargets=\"Build\" ToolsVersion=\"4.0\" xmlns=\"{MSBUILD_NS}\">\n",
            escape(&self.plan.settings.encoding)
        );
        out.push_str(&self.plan.emitter.project_configurations());
        out.push_str(&format!(
            "\t<PropertyGroup Label=\"Globals\">\n\
             \t\t<ProjectGuid>{}</ProjectGuid>\n\
             {}\
             \t\t<RootNamespace>{}</RootNamespace>\n\
             \t\t<Keyword>MakeFileProj</Keyword>\n\
             \t</PropertyGroup>\n",
            escape(&descriptor.guid),
            self.plan.source_control_block()?,
            escape(&descriptor.name),
        ));
        self.docs.write_project(&out)?;

        self.stage = Stage::HeaderWritten;
        Ok(())
    }

    /// Filter declarations into the filters document; configuration
    /// property groups and item definitions into the project document.
    pub fn write_configurations(&mut self) -> Result<()> {
        self.expect_stage(Stage::HeaderWritten)?;
        tracing::debug!(
            configurations = self.plan.emitter.configurations().len(),
            "writing configurations"
        );

        self.docs.write_filters(&format!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
             <Project ToolsVersion=\"4.0\" xmlns=\"{MSBUILD_NS}\">\n\
             \t<ItemGroup>\n"
        ))?;
        let scope = &self.plan.descriptor.scope_key;
        for tree in &self.plan.trees {
            // Header items are filed under the source tree.
            if tree.category == FileCategory::Header {
                continue;
            }
            let label = tree.category.label();
            self.docs.append_filter_declaration(&FilterDeclaration {
                path: label.to_string(),
                identifier: identifier_for(scope, label),
                extensions: Some(tree.category.extensions()),
            })?;
            declare_folders(&mut self.docs, scope, &tree.root, label)?;
        }
        self.docs.write_filters("\t</ItemGroup>\n")?;

        let emitter = &self.plan.emitter;
        let mut out = String::from("\t<Import Project=\"$(VCTargetsPath)\\Microsoft.Cpp.Default.props\" />\n");
        out.push_str(&emitter.property_groups());
        out.push_str(
            "\t<Import Project=\"$(VCTargetsPath)\\Microsoft.Cpp.props\" />\n\
             \t<ImportGroup Label=\"ExtensionSettings\">\n\
             \t</ImportGroup>\n",
        );
        out.push_str(&emitter.property_sheets());
        out.push_str("\t<PropertyGroup Label=\"UserMacros\" />\n");
        out.push_str(&emitter.item_definitions());
        self.docs.write_project(&out)?;

        self.stage = Stage::ConfigsWritten;
        Ok(())
    }

    /// One item group per category, mirrored in both documents.
    pub fn write_sources(&mut self) -> Result<()> {
        self.expect_stage(Stage::ConfigsWritten)?;

        let rules = &self.plan.settings.exclusions;
        for tree in &self.plan.trees {
            tracing::debug!(category = %tree.category, "writing items");
            self.docs.begin_item_group()?;
            write_folder(&mut self.docs, rules, tree.category, &tree.root, tree.category.label())?;
            self.docs.end_item_group()?;
        }

        self.stage = Stage::SourcesWritten;
        Ok(())
    }

    /// Project references, the build script item and both epilogues.
    pub fn finalize(mut self) -> Result<(W, W)> {
        self.expect_stage(Stage::SourcesWritten)?;

        let mut out = String::new();
        let references = &self.plan.meta.references;
        if !references.is_empty() {
            out.push_str("\t<ItemGroup>\n");
            for reference in references {
                let include = format!("{reference}{}", self.plan.settings.reference_suffix);
                out.push_str(&format!(
                    "\t\t<ProjectReference Include=\"{}\">\n\
                     \t\t\t<Project>{}</Project>\n\
                     \t\t</ProjectReference>\n",
                    escape(&include),
                    self.plan.descriptor.reference_guid(reference),
                ));
            }
            out.push_str("\t</ItemGroup>\n");
        }
        if let Some(script) = &self.plan.build_script {
            out.push_str(&format!(
                "\t<ItemGroup>\n\t\t<None Include=\"{}\" />\n\t</ItemGroup>\n",
                escape(script)
            ));
        }
        out.push_str(
            "\t<Import Project=\"$(VCTargetsPath)\\Microsoft.Cpp.targets\" />\n\
             \t<ImportGroup Label=\"ExtensionTargets\">\n\
             \t</ImportGroup>\n\
             </Project>\n",
        );
        self.docs.write_project(&out)?;
        self.docs.write_filters("</Project>\n")?;

        tracing::info!(
            project = %self.plan.descriptor.name,
            items = self.docs.item_count(),
            filters = self.docs.filter_count(),
            "project documents written"
        );
        self.stage = Stage::Finalized;
        self.docs.finish()
    }
}

/// Declare every folder below `folder`, depth-first, parents first.
fn declare_folders<W: Write>(
    docs: &mut DocumentPair<W>,
    scope: &str,
    folder: &Folder,
    path: &str,
) -> Result<()> {
    for (name, child) in folder.subfolders() {
        let child_path = format!("{path}\\{name}");
        docs.append_filter_declaration(&FilterDeclaration {
            identifier: identifier_for(scope, &child_path),
            path: child_path.clone(),
            extensions: None,
        })?;
        declare_folders(docs, scope, child, &child_path)?;
    }
    Ok(())
}

/// Write the files below `folder`: subfolders first, then this folder's own
/// files.
fn write_folder<W: Write>(
    docs: &mut DocumentPair<W>,
    rules: &[ExclusionRule],
    category: FileCategory,
    folder: &Folder,
    path: &str,
) -> Result<()> {
    for (name, child) in folder.subfolders() {
        write_folder(docs, rules, category, child, &format!("{path}\\{name}"))?;
    }

    let filter = filter_path_for(category, path);
    for (_, include) in folder.files() {
        let excluded_in = exclusions_for(include, rules)
            .into_iter()
            .map(|rule| configuration_condition(&escape(&rule.variant), &escape(&rule.platform)))
            .collect();
        let item = SourceItem {
            element: category.element(),
            include: include.to_string(),
            excluded_in,
        };
        docs.append_item(&item, &filter)?;
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Entry points
// ═══════════════════════════════════════════════════════════════════════════════

/// Summary of a generation run.
#[derive(Debug, Clone)]
pub struct GeneratedProject {
    pub project_path: PathBuf,
    pub filters_path: PathBuf,
    pub guid: String,
    pub external_headers: Vec<String>,
    /// Project-relative build script item, which has no filter assignment.
    pub build_script: Option<String>,
}

/// Generate both documents into caller-supplied writers.
pub fn generate_into<W: Write>(
    meta: &BuildMetadata,
    settings: &GeneratorSettings,
    project: W,
    filters: W,
) -> Result<(W, W)> {
    let plan = GenerationPlan::new(meta, settings)?;
    ProjectWriter::new(plan, DocumentPair::new(project, filters)).run()
}

/// Generate both documents on disk next to each other.
pub fn generate(meta: &BuildMetadata, settings: &GeneratorSettings) -> Result<GeneratedProject> {
    let plan = GenerationPlan::new(meta, settings)?;
    let descriptor = plan.descriptor().clone();
    let external_headers = plan.external_headers().to_vec();
    let build_script = plan.build_script.clone();

    let docs: DocumentPair<BufWriter<File>> =
        DocumentPair::create(&descriptor.output_path, &settings.filters_suffix)?;
    ProjectWriter::new(plan, docs).run()?;

    Ok(GeneratedProject {
        filters_path: filters_path(&descriptor.output_path, &settings.filters_suffix),
        project_path: descriptor.output_path,
        guid: descriptor.guid,
        external_headers,
        build_script,
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════
