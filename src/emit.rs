//! Configuration-scoped sections of the project document.

use std::collections::BTreeMap;
use std::path::Path;

use crate::condition::configuration_condition;
use crate::config::{BuildMetadata, ConfigurationRecord, GeneratorSettings};
use crate::document::escape;
use crate::error::Result;
use crate::paths::{relative_to, to_windows};

/// Configurations in case-sensitive `Variant|Platform` key order.  A
/// repeated key keeps the last record.
pub fn sorted_configurations(records: &[ConfigurationRecord]) -> Vec<&ConfigurationRecord> {
    let mut by_key: BTreeMap<String, &ConfigurationRecord> = BTreeMap::new();
    for record in records {
        if by_key.insert(record.key(), record).is_some() {
            tracing::warn!(key = %record.key(), "duplicate configuration, keeping the last one");
        }
    }
    by_key.into_values().collect()
}

/// Escaped `Condition` attribute value selecting one configuration.
pub fn condition_attr(record: &ConfigurationRecord) -> String {
    configuration_condition(&escape(&record.variant), &escape(&record.platform))
}

/// Renders the configuration list, the per-configuration property groups
/// and property sheets, and the shared item-definition block.
pub struct ConfigurationEmitter<'a> {
    configs: Vec<&'a ConfigurationRecord>,
    settings: &'a GeneratorSettings,
    build_dir: String,
    include_dirs: Vec<String>,
    lib_dirs: Vec<String>,
    defines: &'a [String],
    libs_debug: &'a [String],
    libs_release: &'a [String],
}

impl<'a> ConfigurationEmitter<'a> {
    /// Resolve every path the sections need against `project_dir`.
    pub fn new(
        meta: &'a BuildMetadata,
        settings: &'a GeneratorSettings,
        project_dir: &Path,
    ) -> Result<Self> {
        let relative = |p: &str| relative_to(meta.resolve(p), project_dir);

        let build_dir = relative_to(meta.build_dir(settings), project_dir)?;
        let include_dirs = meta
            .include_paths
            .iter()
            .filter(|p| !p.trim().is_empty())
            .map(|p| relative(p.as_str()))
            .collect::<Result<Vec<_>>>()?;
        let lib_dirs = meta
            .lib_paths
            .iter()
            .filter(|p| !p.trim().is_empty())
            .map(|p| relative(p.as_str()))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            configs: sorted_configurations(&meta.configurations),
            settings,
            build_dir,
            include_dirs,
            lib_dirs,
            defines: &meta.defines,
            libs_debug: &meta.libs_debug,
            libs_release: &meta.libs_release,
        })
    }

    pub fn configurations(&self) -> &[&'a ConfigurationRecord] {
        &self.configs
    }

    /// `<OutDir>` for a configuration.  Executables all land in the shared
    /// binary directory.
    pub fn output_dir(&self, record: &ConfigurationRecord) -> String {
        if record.routes_to_shared_bin() {
            format!("{}\\", to_windows(&self.settings.shared_bin_dir))
        } else {
            format!("{}\\$(Configuration)\\", self.build_dir)
        }
    }

    pub fn intermediate_dir(&self) -> String {
        format!("{}\\$(Configuration)\\$(ProjectName)\\", self.build_dir)
    }

    /// `<ItemGroup Label="ProjectConfigurations">`.
    pub fn project_configurations(&self) -> String {
        let mut out = String::from("\t<ItemGroup Label=\"ProjectConfigurations\">\n");
        for record in &self.configs {
            let variant = escape(&record.variant);
            let platform = escape(&record.platform);
            out.push_str(&format!(
                "\t\t<ProjectConfiguration Include=\"{variant}|{platform}\">\n\
                 \t\t\t<Configuration>{variant}</Configuration>\n\
                 \t\t\t<Platform>{platform}</Platform>\n\
                 \t\t</ProjectConfiguration>\n"
            ));
        }
        out.push_str("\t</ItemGroup>\n");
        out
    }

    /// Two property groups per configuration: the `Configuration`-labelled
    /// one (type, toolset) and the directory one.
    pub fn property_groups(&self) -> String {
        let mut out = String::new();
        let int_dir = escape(&self.intermediate_dir()).into_owned();

        for record in &self.configs {
            let condition = condition_attr(record);
            let toolset = record.toolset.as_deref().unwrap_or(&self.settings.toolset);
            tracing::debug!(
                configuration = %record.key(),
                kind = record.kind().as_msbuild(),
                "configuration property group"
            );
            out.push_str(&format!(
                "\t<PropertyGroup Condition=\"{condition}\" Label=\"Configuration\">\n\
                 \t\t<ConfigurationType>{}</ConfigurationType>\n\
                 \t\t<UseOfMfc>false</UseOfMfc>\n\
                 \t\t<PlatformToolset>{}</PlatformToolset>\n\
                 \t</PropertyGroup>\n\
                 \t<PropertyGroup Condition=\"{condition}\">\n\
                 \t\t<IntDir>{int_dir}</IntDir>\n\
                 \t\t<OutDir>{}</OutDir>\n\
                 \t\t<IncludePath>$(IncludePath)</IncludePath>\n\
                 \t</PropertyGroup>\n",
                record.kind().as_msbuild(),
                escape(toolset),
                escape(&self.output_dir(record)),
            ));
        }
        out
    }

    /// One `PropertySheets` import group per configuration.
    pub fn property_sheets(&self) -> String {
        let mut out = String::new();
        for record in &self.configs {
            out.push_str(&format!(
                "\t<ImportGroup Condition=\"{}\" Label=\"PropertySheets\">\n\
                 \t\t<Import Project=\"$(UserRootDir)\\Microsoft.Cpp.$(Platform).user.props\" \
                 Condition=\"exists('$(UserRootDir)\\Microsoft.Cpp.$(Platform).user.props')\" \
                 Label=\"LocalAppDataPlatform\" />\n\
                 \t</ImportGroup>\n",
                condition_attr(record)
            ));
        }
        out
    }

    /// The single `<ItemDefinitionGroup>`: shared include paths, macros and
    /// library paths, plus one conditional element per configuration for
    /// everything that differs between debug and release builds.
    pub fn item_definitions(&self) -> String {
        let includes = joined(&self.include_dirs, "");
        let defines = joined(self.defines, "");
        let lib_dirs = joined(&self.lib_dirs, "");

        let mut out = String::from("\t<ItemDefinitionGroup>\n\t\t<ClCompile>\n");
        out.push_str(&format!(
            "\t\t\t<AdditionalIncludeDirectories>{includes}</AdditionalIncludeDirectories>\n"
        ));
        out.push_str(&format!("\t\t\t<PreprocessorDefinitions>{defines}</PreprocessorDefinitions>\n"));

        self.per_configuration(&mut out, "RuntimeLibrary", |r| {
            let runtime = if r.is_debug() { "MultiThreadedDebugDLL" } else { "MultiThreadedDLL" };
            Some(runtime.to_string())
        });
        self.per_configuration(&mut out, "Optimization", |r| {
            r.is_debug().then(|| "Disabled".into())
        });
        self.per_configuration(&mut out, "MultiProcessorCompilation", |_| Some("true".into()));
        self.per_configuration(&mut out, "WarningLevel", |_| Some("Level3".into()));

        out.push_str("\t\t</ClCompile>\n\t\t<Link>\n");
        out.push_str(&format!(
            "\t\t\t<AdditionalLibraryDirectories>{lib_dirs}%(AdditionalLibraryDirectories)</AdditionalLibraryDirectories>\n"
        ));
        self.per_configuration(&mut out, "AdditionalDependencies", |r| {
            let libs = if r.is_debug() { self.libs_debug } else { self.libs_release };
            Some(format!("{}%(AdditionalDependencies)", joined(libs, ".lib")))
        });
        self.per_configuration(&mut out, "GenerateDebugInformation", |r| {
            r.is_debug().then(|| "true".into())
        });
        out.push_str("\t\t</Link>\n\t</ItemDefinitionGroup>\n");
        out
    }

    fn per_configuration<F>(&self, out: &mut String, tag: &str, value: F)
    where
        F: Fn(&ConfigurationRecord) -> Option<String>,
    {
        for record in &self.configs {
            if let Some(value) = value(record) {
                out.push_str(&format!(
                    "\t\t\t<{tag} Condition=\"{}\">{}</{tag}>\n",
                    condition_attr(record),
                    escape(&value)
                ));
            }
        }
    }
}

/// `a;b;` with `suffix` appended to every entry, escaped.
fn joined(values: &[String], suffix: &str) -> String {
    let mut out = String::new();
    for value in values {
        out.push_str(value);
        out.push_str(suffix);
        out.push(';');
    }
    escape(&out).into_owned()
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigurationKind;
    use std::path::PathBuf;

    fn metadata(configs: Vec<ConfigurationRecord>) -> BuildMetadata {
        BuildMetadata {
            name: "engine".into(),
            output: PathBuf::from("/work/build/proj/engine.vcxproj"),
            build_dir: Some(PathBuf::from("/work/build/win32")),
            include_paths: vec!["/work/include".into(), "/work/third party/zlib".into()],
            defines: vec!["WIN32".into(), "NAME=\"x\"".into()],
            lib_paths: vec!["/work/lib".into()],
            libs_debug: vec!["zlibd".into()],
            libs_release: vec!["zlib".into(), "ws2_32".into()],
            configurations: configs,
            ..Default::default()
        }
    }

    fn emitter<'a>(meta: &'a BuildMetadata, settings: &'a GeneratorSettings) -> ConfigurationEmitter<'a> {
        ConfigurationEmitter::new(meta, settings, Path::new("/work/build/proj")).unwrap()
    }

    fn debug_release() -> Vec<ConfigurationRecord> {
        vec![
            ConfigurationRecord::new("Release", "Win32", "out/engine.lib"),
            ConfigurationRecord::new("Debug", "Win32", "out/engine.lib"),
        ]
    }

    #[test]
    fn configurations_sorted_by_key() {
        let records = vec![
            ConfigurationRecord::new("Release", "x64", "a.lib"),
            ConfigurationRecord::new("Debug", "x64", "a.lib"),
            ConfigurationRecord::new("Debug", "Win32", "a.lib"),
            ConfigurationRecord::new("debug", "Win32", "a.lib"),
        ];
        let keys: Vec<String> = sorted_configurations(&records).iter().map(|r| r.key()).collect();
        assert_eq!(keys, ["Debug|Win32", "Debug|x64", "Release|x64", "debug|Win32"]);
    }

    #[test]
    fn duplicate_configuration_keeps_last() {
        let records = vec![
            ConfigurationRecord::new("Debug", "Win32", "a.lib"),
            ConfigurationRecord::new("Debug", "Win32", "a.exe"),
        ];
        let sorted = sorted_configurations(&records);
        assert_eq!(sorted.len(), 1);
        assert_eq!(sorted[0].kind(), ConfigurationKind::Application);
    }

    #[cfg(unix)]
    #[test]
    fn project_configuration_list() {
        let meta = metadata(debug_release());
        let settings = GeneratorSettings::default();
        let text = emitter(&meta, &settings).project_configurations();
        let debug = text.find("Include=\"Debug|Win32\"").unwrap();
        let release = text.find("Include=\"Release|Win32\"").unwrap();
        assert!(debug < release);
        assert!(text.contains("\t\t\t<Configuration>Debug</Configuration>\n\t\t\t<Platform>Win32</Platform>\n"));
    }

    #[cfg(unix)]
    #[test]
    fn library_output_goes_to_build_dir() {
        let meta = metadata(debug_release());
        let settings = GeneratorSettings::default();
        let em = emitter(&meta, &settings);
        let text = em.property_groups();
        assert!(text.contains("<ConfigurationType>StaticLibrary</ConfigurationType>"));
        assert!(text.contains("<PlatformToolset>v120</PlatformToolset>"));
        assert!(text.contains(r"<IntDir>..\win32\$(Configuration)\$(ProjectName)\</IntDir>"));
        assert!(text.contains(r"<OutDir>..\win32\$(Configuration)\</OutDir>"));
    }

    #[cfg(unix)]
    #[test]
    fn executables_share_bin_dir() {
        let meta = metadata(vec![
            ConfigurationRecord::new("Debug", "Win32", "bin/game.exe"),
            ConfigurationRecord::new("Profile", "Win32", "bin/game.exe"),
        ]);
        let settings = GeneratorSettings::default();
        let em = emitter(&meta, &settings);
        for record in em.configurations() {
            assert_eq!(em.output_dir(record), r"..\..\bin\");
        }
        let text = em.property_groups();
        assert_eq!(text.matches(r"<OutDir>..\..\bin\</OutDir>").count(), 2);
        assert!(text.contains("<ConfigurationType>Application</ConfigurationType>"));
    }

    #[cfg(unix)]
    #[test]
    fn upper_case_exe_is_routed_but_not_typed_as_application() {
        let meta = metadata(vec![ConfigurationRecord::new("Release", "Win32", "bin/GAME.EXE")]);
        let settings = GeneratorSettings::default();
        let text = emitter(&meta, &settings).property_groups();
        assert!(text.contains(r"<OutDir>..\..\bin\</OutDir>"));
        assert!(text.contains("<ConfigurationType>Makefile</ConfigurationType>"));
    }

    #[cfg(unix)]
    #[test]
    fn record_toolset_overrides_default() {
        let mut record = ConfigurationRecord::new("Debug", "x64", "tool");
        record.toolset = Some("v141".into());
        let meta = metadata(vec![record]);
        let settings = GeneratorSettings::default();
        let text = emitter(&meta, &settings).property_groups();
        assert!(text.contains("<PlatformToolset>v141</PlatformToolset>"));
        assert!(text.contains("<ConfigurationType>Makefile</ConfigurationType>"));
    }

    #[cfg(unix)]
    #[test]
    fn item_definitions_follow_every_configuration() {
        let meta = metadata(vec![
            ConfigurationRecord::new("Debug", "Win32", "a.lib"),
            ConfigurationRecord::new("Debug", "x64", "a.lib"),
            ConfigurationRecord::new("Release", "x64", "a.lib"),
        ]);
        let settings = GeneratorSettings::default();
        let text = emitter(&meta, &settings).item_definitions();

        assert_eq!(text.matches("<RuntimeLibrary ").count(), 3);
        assert_eq!(text.matches("<Optimization ").count(), 2);
        assert_eq!(text.matches("<GenerateDebugInformation ").count(), 2);
        assert!(text.contains(
            "<RuntimeLibrary Condition=\"'$(Configuration)|$(Platform)'=='Debug|x64'\">MultiThreadedDebugDLL</RuntimeLibrary>"
        ));
        assert!(text.contains(
            "<AdditionalDependencies Condition=\"'$(Configuration)|$(Platform)'=='Release|x64'\">zlib.lib;ws2_32.lib;%(AdditionalDependencies)</AdditionalDependencies>"
        ));
        assert!(text.contains(
            "<AdditionalDependencies Condition=\"'$(Configuration)|$(Platform)'=='Debug|Win32'\">zlibd.lib;%(AdditionalDependencies)</AdditionalDependencies>"
        ));
    }

    #[cfg(unix)]
    #[test]
    fn item_definitions_shared_values() {
        let meta = metadata(debug_release());
        let settings = GeneratorSettings::default();
        let text = emitter(&meta, &settings).item_definitions();
        assert!(text.contains(
            r"<AdditionalIncludeDirectories>..\..\include;..\..\third party\zlib;</AdditionalIncludeDirectories>"
        ));
        assert!(text.contains("<PreprocessorDefinitions>WIN32;NAME=&quot;x&quot;;</PreprocessorDefinitions>"));
        assert!(text.contains(
            r"<AdditionalLibraryDirectories>..\..\lib;%(AdditionalLibraryDirectories)</AdditionalLibraryDirectories>"
        ));
    }

    #[test]
    fn empty_metadata_degrades_to_empty_sections() {
        let meta = BuildMetadata::default();
        let settings = GeneratorSettings::default();
        let em = ConfigurationEmitter::new(&meta, &settings, Path::new(".")).unwrap();
        assert_eq!(
            em.project_configurations(),
            "\t<ItemGroup Label=\"ProjectConfigurations\">\n\t</ItemGroup>\n"
        );
        assert!(em.property_groups().is_empty());
        assert!(em.property_sheets().is_empty());
        assert!(em.item_definitions().contains("<PreprocessorDefinitions></PreprocessorDefinitions>"));
    }

    #[cfg(unix)]
    #[test]
    fn property_sheets_per_configuration() {
        let meta = metadata(debug_release());
        let settings = GeneratorSettings::default();
        let text = emitter(&meta, &settings).property_sheets();
        assert_eq!(text.matches("Label=\"PropertySheets\"").count(), 2);
        assert!(text.contains("Condition=\"exists('$(UserRootDir)\\Microsoft.Cpp.$(Platform).user.props')\""));
    }
}
