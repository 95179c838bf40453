//! Input model and generator settings.
//!
//! [`BuildMetadata`] is what the build tool knows about one native target;
//! [`GeneratorSettings`] holds every fallback the generator would otherwise
//! hard-code (toolset, output directories, exclusion rules …).  Both
//! deserialize from the `[project]` / `[settings]` tables of a TOML
//! [`Manifest`].

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, VcxprojError};
use crate::paths::host_path;

// ═══════════════════════════════════════════════════════════════════════════════
//  File categories
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileCategory {
    Source,
    Header,
    LocalHeader,
    Resource,
    Other,
}

impl FileCategory {
    pub const ALL: [FileCategory; 5] = [
        FileCategory::Source,
        FileCategory::Header,
        FileCategory::LocalHeader,
        FileCategory::Resource,
        FileCategory::Other,
    ];

    /// Name of the top-level filter folder.
    pub fn label(self) -> &'static str {
        match self {
            FileCategory::Source => "Source Files",
            FileCategory::Header => "Header Files",
            FileCategory::LocalHeader => "Local Headers",
            FileCategory::Resource => "Resource Files",
            FileCategory::Other => "Other Files",
        }
    }

    /// MSBuild item type used for files of this category.
    pub fn element(self) -> &'static str {
        match self {
            FileCategory::Source => "ClCompile",
            FileCategory::Header | FileCategory::LocalHeader => "ClInclude",
            FileCategory::Resource | FileCategory::Other => "None",
        }
    }

    /// Extensions advertised on the category's top-level filter.
    pub fn extensions(self) -> &'static str {
        match self {
            FileCategory::Source => "cpp;c;cxx;l;y;def;odl;idl;hpj;bat",
            FileCategory::Header | FileCategory::LocalHeader => "h;hpp;hxx;hm;inl",
            FileCategory::Resource => "r;rc;ico;cur;bmp;dlg;rc2;rct;bin;cnt;rtf;gif;jpg;jpeg;jpe",
            FileCategory::Other => "",
        }
    }

    /// All categories ordered by case-insensitive label.
    pub fn in_label_order() -> Vec<FileCategory> {
        let mut all = Self::ALL.to_vec();
        all.sort_by_cached_key(|c| c.label().to_lowercase());
        all
    }
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Flat file lists, one per category.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CategoryFiles {
    pub source: Vec<String>,
    pub header: Vec<String>,
    pub local_header: Vec<String>,
    pub resource: Vec<String>,
    pub other: Vec<String>,
}

impl CategoryFiles {
    pub fn get(&self, category: FileCategory) -> &[String] {
        match category {
            FileCategory::Source => &self.source,
            FileCategory::Header => &self.header,
            FileCategory::LocalHeader => &self.local_header,
            FileCategory::Resource => &self.resource,
            FileCategory::Other => &self.other,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Configurations
// ═══════════════════════════════════════════════════════════════════════════════

/// One `(variant, platform)` build configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConfigurationRecord {
    pub variant: String,
    pub platform: String,
    /// Path of the artifact this configuration builds; its extension decides
    /// the [`ConfigurationKind`].
    pub build_target: String,
    /// Overrides [`GeneratorSettings::toolset`] for this configuration.
    #[serde(default)]
    pub toolset: Option<String>,
}

impl ConfigurationRecord {
    pub fn new(
        variant: impl Into<String>,
        platform: impl Into<String>,
        build_target: impl Into<String>,
    ) -> Self {
        Self {
            variant: variant.into(),
            platform: platform.into(),
            build_target: build_target.into(),
            toolset: None,
        }
    }

    /// `Variant|Platform`, the key configurations are sorted by.
    pub fn key(&self) -> String {
        format!("{}|{}", self.variant, self.platform)
    }

    pub fn kind(&self) -> ConfigurationKind {
        ConfigurationKind::from_build_target(&self.build_target)
    }

    /// Whether the artifact is routed into the shared binary directory.
    /// Unlike [`kind`](Self::kind), this ignores case.
    pub fn routes_to_shared_bin(&self) -> bool {
        extension_tail(&self.build_target).eq_ignore_ascii_case(".exe")
    }

    /// Debug flavours are recognised by name.
    pub fn is_debug(&self) -> bool {
        self.variant.to_ascii_lowercase().contains("debug")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigurationKind {
    StaticLibrary,
    Application,
    DynamicLibrary,
    /// Anything else: Visual Studio only drives an external build.
    Makefile,
}

impl ConfigurationKind {
    /// Infer the kind from the last four characters of a build target.
    /// The comparison is case-sensitive: `GAME.EXE` builds as a makefile
    /// project.
    pub fn from_build_target(target: &str) -> Self {
        match extension_tail(target) {
            ".lib" => ConfigurationKind::StaticLibrary,
            ".exe" => ConfigurationKind::Application,
            ".dll" => ConfigurationKind::DynamicLibrary,
            _ => ConfigurationKind::Makefile,
        }
    }

    /// `<ConfigurationType>` value.
    pub fn as_msbuild(self) -> &'static str {
        match self {
            ConfigurationKind::StaticLibrary => "StaticLibrary",
            ConfigurationKind::Application => "Application",
            ConfigurationKind::DynamicLibrary => "DynamicLibrary",
            ConfigurationKind::Makefile => "Makefile",
        }
    }
}

/// Last four characters of a build target, or `""` when it is shorter.
fn extension_tail(target: &str) -> &str {
    target
        .char_indices()
        .rev()
        .nth(3)
        .map(|(idx, _)| &target[idx..])
        .unwrap_or("")
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Build metadata
// ═══════════════════════════════════════════════════════════════════════════════

/// Source-control bindings written into the globals block.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SourceControl {
    pub provider: Option<String>,
    pub project_name: Option<String>,
    pub aux_path: Option<String>,
    /// Root the `SccLocalPath` is computed from; the current directory when
    /// absent.
    pub connection_root: Option<String>,
    /// Older spelling that gives `SccLocalPath` verbatim.  Only used when no
    /// provider is set.
    pub local_path: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl SourceControl {
    pub fn provider(&self) -> Option<&str> {
        non_empty(&self.provider)
    }

    pub fn aux_path(&self) -> Option<&str> {
        non_empty(&self.aux_path)
    }

    pub fn legacy_local_path(&self) -> Option<&str> {
        non_empty(&self.local_path)
    }
}

/// Everything the build tool knows about one target.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BuildMetadata {
    pub name: String,
    /// Where the `.vcxproj` is written.  Its directory is the project
    /// directory every emitted path is relative to.
    pub output: PathBuf,
    /// Explicit `<ProjectGuid>`; derived from `output` when absent.
    pub project_guid: Option<String>,
    pub files: CategoryFiles,
    pub include_paths: Vec<String>,
    pub defines: Vec<String>,
    pub lib_paths: Vec<String>,
    pub libs_debug: Vec<String>,
    pub libs_release: Vec<String>,
    pub configurations: Vec<ConfigurationRecord>,
    pub source_control: SourceControl,
    /// Names of other generated projects this one references.
    pub references: Vec<String>,
    /// The build script that produced this project.
    pub build_script: Option<PathBuf>,
    /// Output root for intermediate/output directories.  Defaults to
    /// `<top_dir>/<build_dir_name>/<platform>`.
    pub build_dir: Option<PathBuf>,
    pub top_dir: Option<PathBuf>,
    pub platform: Option<String>,

    /// Directory relative input paths are resolved against; the current
    /// directory when unset.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl BuildMetadata {
    /// Resolve an input path against [`base_dir`](Self::base_dir).
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = host_path(path);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path,
        }
    }

    /// The build directory, explicit or derived.
    pub fn build_dir(&self, settings: &GeneratorSettings) -> PathBuf {
        match &self.build_dir {
            Some(dir) => self.resolve(dir),
            None => {
                let top = self.top_dir.clone().unwrap_or_else(|| PathBuf::from("."));
                let platform = self
                    .platform
                    .as_deref()
                    .unwrap_or(&settings.default_platform);
                self.resolve(top.join(&settings.build_dir_name).join(platform))
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Settings
// ═══════════════════════════════════════════════════════════════════════════════

/// Files under `subtree` are listed in the project but excluded from the
/// build of one configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExclusionRule {
    /// Directory segments, e.g. `platform/web`.
    pub subtree: String,
    pub variant: String,
    pub platform: String,
}

impl ExclusionRule {
    pub fn new(
        subtree: impl Into<String>,
        variant: impl Into<String>,
        platform: impl Into<String>,
    ) -> Self {
        Self {
            subtree: subtree.into(),
            variant: variant.into(),
            platform: platform.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneratorSettings {
    /// Requested Visual Studio format, e.g. `12.0` or `12.0Exp`.
    pub format_version: String,
    pub minimum_version: f64,
    pub toolset: String,
    pub encoding: String,
    /// Where executables are routed, whatever their configuration.
    pub shared_bin_dir: String,
    pub build_dir_name: String,
    pub default_platform: String,
    pub filters_suffix: String,
    pub reference_suffix: String,
    pub exclusions: Vec<ExclusionRule>,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            format_version: "12.0".to_string(),
            minimum_version: 12.0,
            toolset: "v120".to_string(),
            encoding: "utf-8".to_string(),
            shared_bin_dir: "../../bin".to_string(),
            build_dir_name: "build".to_string(),
            default_platform: "win32".to_string(),
            filters_suffix: ".filters".to_string(),
            reference_suffix: ".vcxproj".to_string(),
            exclusions: vec![ExclusionRule::new("platform/web", "Debug", "Win32")],
        }
    }
}

impl GeneratorSettings {
    /// Reject format versions older than [`minimum_version`](Self::minimum_version).
    pub fn check_version(&self) -> Result<f64> {
        let (number, _suite) = parse_format_version(&self.format_version)?;
        if number < self.minimum_version {
            return Err(VcxprojError::UnsupportedVersion {
                requested: self.format_version.clone(),
                minimum: self.minimum_version,
            });
        }
        Ok(number)
    }
}

/// Split `12.0Exp` into `(12.0, "Exp")`.
pub fn parse_format_version(version: &str) -> Result<(f64, &str)> {
    let version = version.trim();
    let invalid = || VcxprojError::InvalidVersion(version.to_string());

    let major_len = version.find(|c: char| !c.is_ascii_digit()).unwrap_or(version.len());
    if major_len == 0 || version[major_len..].chars().next() != Some('.') {
        return Err(invalid());
    }
    let after_dot = &version[major_len + 1..];
    let minor_len = after_dot
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(after_dot.len());
    if minor_len == 0 {
        return Err(invalid());
    }

    let split = major_len + 1 + minor_len;
    let number = version[..split].parse::<f64>().map_err(|_| invalid())?;
    Ok((number, &version[split..]))
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Manifest
// ═══════════════════════════════════════════════════════════════════════════════

/// On-disk description consumed by the `vcxproj-gen` binary.
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    pub project: BuildMetadata,
    #[serde(default)]
    pub settings: GeneratorSettings,
}

impl Manifest {
    pub fn parse(source: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(source)
    }

    /// Load a manifest; relative paths inside it are taken relative to the
    /// manifest's own directory.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| VcxprojError::Manifest {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let mut manifest = Self::parse(&source).map_err(|e| VcxprojError::Manifest {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        manifest.project.base_dir = path.parent().map(Path::to_path_buf);
        Ok(manifest)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_in_label_order() {
        let labels: Vec<&str> = FileCategory::in_label_order()
            .into_iter()
            .map(FileCategory::label)
            .collect();
        assert_eq!(
            labels,
            ["Header Files", "Local Headers", "Other Files", "Resource Files", "Source Files"]
        );
    }

    #[test]
    fn kind_from_extension() {
        assert_eq!(ConfigurationKind::from_build_target("out/core.lib"), ConfigurationKind::StaticLibrary);
        assert_eq!(ConfigurationKind::from_build_target("bin/game.exe"), ConfigurationKind::Application);
        assert_eq!(ConfigurationKind::from_build_target("bin/net.dll"), ConfigurationKind::DynamicLibrary);
        assert_eq!(ConfigurationKind::from_build_target("bin/tool"), ConfigurationKind::Makefile);
        assert_eq!(ConfigurationKind::from_build_target(""), ConfigurationKind::Makefile);
        assert_eq!(ConfigurationKind::from_build_target("x.so"), ConfigurationKind::Makefile);
    }

    #[test]
    fn kind_matches_extension_case_sensitively() {
        assert_eq!(ConfigurationKind::from_build_target("GAME.EXE"), ConfigurationKind::Makefile);
        assert_eq!(ConfigurationKind::from_build_target("core.Lib"), ConfigurationKind::Makefile);
    }

    #[test]
    fn shared_bin_routing_ignores_case() {
        assert!(ConfigurationRecord::new("Debug", "Win32", "bin/GAME.EXE").routes_to_shared_bin());
        assert!(ConfigurationRecord::new("Debug", "Win32", "bin/game.exe").routes_to_shared_bin());
        assert!(!ConfigurationRecord::new("Debug", "Win32", "out/core.lib").routes_to_shared_bin());
        assert!(!ConfigurationRecord::new("Debug", "Win32", "exe").routes_to_shared_bin());
    }

    #[test]
    fn record_key_and_debug_detection() {
        let debug = ConfigurationRecord::new("Debug", "Win32", "a.lib");
        assert_eq!(debug.key(), "Debug|Win32");
        assert!(debug.is_debug());
        assert!(ConfigurationRecord::new("FastDebug", "x64", "a.lib").is_debug());
        assert!(!ConfigurationRecord::new("Release", "x64", "a.lib").is_debug());
    }

    #[test]
    fn version_parsing() {
        assert_eq!(parse_format_version("12.0").unwrap(), (12.0, ""));
        assert_eq!(parse_format_version("12.0Exp").unwrap(), (12.0, "Exp"));
        assert_eq!(parse_format_version("14.10").unwrap(), (14.1, ""));
        assert!(parse_format_version("twelve").is_err());
        assert!(parse_format_version("12").is_err());
        assert!(parse_format_version("12.").is_err());
    }

    #[test]
    fn old_version_rejected() {
        let settings = GeneratorSettings {
            format_version: "11.0".into(),
            ..Default::default()
        };
        assert!(matches!(
            settings.check_version(),
            Err(VcxprojError::UnsupportedVersion { .. })
        ));
        assert_eq!(GeneratorSettings::default().check_version().unwrap(), 12.0);
    }

    #[test]
    fn derived_build_dir() {
        let meta = BuildMetadata {
            top_dir: Some(PathBuf::from("/work")),
            ..Default::default()
        };
        let dir = meta.build_dir(&GeneratorSettings::default());
        assert_eq!(dir, Path::new("/work/build/win32"));
    }

    #[test]
    fn source_control_treats_empty_as_absent() {
        let scc = SourceControl {
            provider: Some(String::new()),
            local_path: Some("$/Depot".into()),
            ..Default::default()
        };
        assert_eq!(scc.provider(), None);
        assert_eq!(scc.legacy_local_path(), Some("$/Depot"));
    }

    #[test]
    fn manifest_from_toml() {
        let manifest = Manifest::parse(
            r#"
            [project]
            name = "engine"
            output = "build/engine.vcxproj"
            defines = ["WIN32", "_LIB"]
            references = ["core"]

            [project.files]
            source = ["src/a.cpp"]
            header = ["src/a.h"]

            [[project.configurations]]
            variant = "Debug"
            platform = "Win32"
            build_target = "out/engine.lib"

            [settings]
            toolset = "v141"
            exclusions = []
            "#,
        )
        .unwrap();

        assert_eq!(manifest.project.name, "engine");
        assert_eq!(manifest.project.files.get(FileCategory::Header), ["src/a.h"]);
        assert_eq!(manifest.project.configurations[0].kind(), ConfigurationKind::StaticLibrary);
        assert_eq!(manifest.settings.toolset, "v141");
        assert!(manifest.settings.exclusions.is_empty());
        // Unspecified settings keep their defaults.
        assert_eq!(manifest.settings.shared_bin_dir, "../../bin");
    }

    #[test]
    fn manifest_without_settings_uses_defaults() {
        let manifest = Manifest::parse(
            r#"
            [project]
            name = "tool"
            output = "tool.vcxproj"
            "#,
        )
        .unwrap();
        assert_eq!(manifest.settings.exclusions.len(), 1);
        assert_eq!(manifest.settings.format_version, "12.0");
    }
}
