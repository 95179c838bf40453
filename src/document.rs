//! The `.vcxproj` / `.vcxproj.filters` pair, written in lock-step.
//!
//! Every file item goes to both documents through one call, and a filter
//! path must be declared before an item may be filed under it.  That keeps
//! the two documents consistent without relying on the caller's discipline.

use std::borrow::Cow;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, VcxprojError};

// ═══════════════════════════════════════════════════════════════════════════════
//  Escaping
// ═══════════════════════════════════════════════════════════════════════════════

/// Escape text for use in an XML attribute or element.  `&` goes first so
/// that the entities introduced afterwards are not escaped twice.
pub fn escape(value: &str) -> Cow<'_, str> {
    if !value.contains(['&', '\'', '"', '<', '>']) {
        return Cow::Borrowed(value);
    }
    Cow::Owned(
        value
            .replace('&', "&amp;")
            .replace('\'', "&apos;")
            .replace('"', "&quot;")
            .replace('<', "&lt;")
            .replace('>', "&gt;"),
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Entries
// ═══════════════════════════════════════════════════════════════════════════════

/// A `<Filter>` folder declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterDeclaration {
    /// Backslash-joined folder path, e.g. `Source Files\net`.
    pub path: String,
    pub identifier: String,
    /// Only top-level category folders advertise extensions.
    pub extensions: Option<&'static str>,
}

/// A file item as it appears in the project document.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceItem {
    /// MSBuild item type (`ClCompile`, `ClInclude`, `None`).
    pub element: &'static str,
    /// Project-relative path.
    pub include: String,
    /// Conditions of the configurations that must not build this file.
    pub excluded_in: Vec<String>,
}

// ═══════════════════════════════════════════════════════════════════════════════
//  DocumentPair
// ═══════════════════════════════════════════════════════════════════════════════

pub struct DocumentPair<W: Write> {
    project: W,
    filters: W,
    declared: HashSet<String>,
    items: usize,
}

/// Path of the filters document belonging to `project_path`.
pub fn filters_path(project_path: &Path, suffix: &str) -> PathBuf {
    let mut name = project_path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

impl DocumentPair<BufWriter<File>> {
    /// Open both documents on disk, project first.  Missing parent
    /// directories are created.
    pub fn create(project_path: &Path, filters_suffix: &str) -> Result<Self> {
        let project = open_output(project_path)?;
        let filters = open_output(&filters_path(project_path, filters_suffix))?;
        Ok(Self::new(project, filters))
    }
}

fn open_output(path: &Path) -> Result<BufWriter<File>> {
    let open_error = |source| VcxprojError::OpenOutput {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(open_error)?;
    }
    File::create(path).map(BufWriter::new).map_err(open_error)
}

impl<W: Write> DocumentPair<W> {
    pub fn new(project: W, filters: W) -> Self {
        Self {
            project,
            filters,
            declared: HashSet::new(),
            items: 0,
        }
    }

    /// Raw text for the project document only (headers, property groups,
    /// references …).
    pub fn write_project(&mut self, text: &str) -> Result<()> {
        self.project.write_all(text.as_bytes())?;
        Ok(())
    }

    /// Raw text for the filters document only (prologue, epilogue).
    pub(crate) fn write_filters(&mut self, text: &str) -> Result<()> {
        self.filters.write_all(text.as_bytes())?;
        Ok(())
    }

    /// Declare a filter folder.  Nested folders require their parent to be
    /// declared first.
    pub fn append_filter_declaration(&mut self, decl: &FilterDeclaration) -> Result<()> {
        if let Some((parent, _)) = decl.path.rsplit_once('\\') {
            if !self.declared.contains(parent) {
                return Err(VcxprojError::UndeclaredFilter {
                    include: decl.path.clone(),
                    filter: parent.to_string(),
                });
            }
        }

        let mut out = format!(
            "\t\t<Filter Include=\"{}\">\n\t\t\t<UniqueIdentifier>{}</UniqueIdentifier>\n",
            escape(&decl.path),
            escape(&decl.identifier)
        );
        if let Some(extensions) = decl.extensions {
            out.push_str(&format!("\t\t\t<Extensions>{}</Extensions>\n", escape(extensions)));
        }
        out.push_str("\t\t</Filter>\n");
        self.write_filters(&out)?;

        self.declared.insert(decl.path.clone());
        Ok(())
    }

    pub fn is_declared(&self, filter: &str) -> bool {
        self.declared.contains(filter)
    }

    /// Open an `<ItemGroup>` in both documents.
    pub fn begin_item_group(&mut self) -> Result<()> {
        self.write_project("\t<ItemGroup>\n")?;
        self.write_filters("\t<ItemGroup>\n")
    }

    pub fn end_item_group(&mut self) -> Result<()> {
        self.write_project("\t</ItemGroup>\n")?;
        self.write_filters("\t</ItemGroup>\n")
    }

    /// Write `item` to the project document and its filter assignment to
    /// the filters document.
    pub fn append_item(&mut self, item: &SourceItem, filter: &str) -> Result<()> {
        if !self.is_declared(filter) {
            return Err(VcxprojError::UndeclaredFilter {
                include: item.include.clone(),
                filter: filter.to_string(),
            });
        }

        let element = item.element;
        let include = escape(&item.include);

        let project = if item.excluded_in.is_empty() {
            format!("\t\t<{element} Include=\"{include}\" />\n")
        } else {
            let mut out = format!("\t\t<{element} Include=\"{include}\">\n");
            for condition in &item.excluded_in {
                out.push_str(&format!(
                    "\t\t\t<ExcludedFromBuild Condition=\"{condition}\">true</ExcludedFromBuild>\n"
                ));
            }
            out.push_str(&format!("\t\t</{element}>\n"));
            out
        };
        self.write_project(&project)?;

        self.write_filters(&format!(
            "\t\t<{element} Include=\"{include}\">\n\t\t\t<Filter>{}</Filter>\n\t\t</{element}>\n",
            escape(filter)
        ))?;

        self.items += 1;
        Ok(())
    }

    /// Items written so far.
    pub fn item_count(&self) -> usize {
        self.items
    }

    pub fn filter_count(&self) -> usize {
        self.declared.len()
    }

    /// Flush both documents and hand the writers back.
    pub fn finish(mut self) -> Result<(W, W)> {
        self.project.flush()?;
        self.filters.flush()?;
        Ok((self.project, self.filters))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn unescape(value: &str) -> String {
        value
            .replace("&gt;", ">")
            .replace("&lt;", "<")
            .replace("&quot;", "\"")
            .replace("&apos;", "'")
            .replace("&amp;", "&")
    }

    fn pair() -> DocumentPair<Vec<u8>> {
        DocumentPair::new(Vec::new(), Vec::new())
    }

    fn decl(path: &str) -> FilterDeclaration {
        FilterDeclaration {
            path: path.into(),
            identifier: "{00000000-0000-0000-0000-000000000000}".into(),
            extensions: None,
        }
    }

    fn item(include: &str) -> SourceItem {
        SourceItem {
            element: "ClCompile",
            include: include.into(),
            excluded_in: Vec::new(),
        }
    }

    fn texts(docs: DocumentPair<Vec<u8>>) -> (String, String) {
        let (p, f) = docs.finish().unwrap();
        (String::from_utf8(p).unwrap(), String::from_utf8(f).unwrap())
    }

    // ── Escaping ─────────────────────────────────────────────────────────

    #[test]
    fn escape_special_characters() {
        assert_eq!(escape(r#"R&D "lab's""#), "R&amp;D &quot;lab&apos;s&quot;");
    }

    #[test]
    fn escape_ampersand_first() {
        assert_eq!(escape("&apos;"), "&amp;apos;");
    }

    #[test]
    fn escape_plain_text_is_borrowed() {
        assert!(matches!(escape(r"src\main.cpp"), Cow::Borrowed(_)));
    }

    #[test]
    fn escape_round_trip() {
        for original in [r#"a&b'c"d"#, "&amp;", "<T>&'\"", "plain"] {
            assert_eq!(unescape(&escape(original)), original);
        }
    }

    // ── Declarations ─────────────────────────────────────────────────────

    #[test]
    fn nested_declaration_needs_parent() {
        let mut docs = pair();
        let err = docs.append_filter_declaration(&decl(r"Source Files\net")).unwrap_err();
        assert!(matches!(err, VcxprojError::UndeclaredFilter { .. }));

        docs.append_filter_declaration(&decl("Source Files")).unwrap();
        docs.append_filter_declaration(&decl(r"Source Files\net")).unwrap();
        assert_eq!(docs.filter_count(), 2);
    }

    #[test]
    fn declaration_with_extensions() {
        let mut docs = pair();
        docs.append_filter_declaration(&FilterDeclaration {
            path: "Source Files".into(),
            identifier: "{ID}".into(),
            extensions: Some("cpp;c"),
        })
        .unwrap();
        let (project, filters) = texts(docs);
        assert!(project.is_empty());
        assert_eq!(
            filters,
            "\t\t<Filter Include=\"Source Files\">\n\
             \t\t\t<UniqueIdentifier>{ID}</UniqueIdentifier>\n\
             \t\t\t<Extensions>cpp;c</Extensions>\n\
             \t\t</Filter>\n"
        );
    }

    // ── Items ────────────────────────────────────────────────────────────

    #[test]
    fn item_goes_to_both_documents() {
        let mut docs = pair();
        docs.append_filter_declaration(&decl("Source Files")).unwrap();
        docs.append_item(&item(r"..\src\a.cpp"), "Source Files").unwrap();
        assert_eq!(docs.item_count(), 1);

        let (project, filters) = texts(docs);
        assert_eq!(project, "\t\t<ClCompile Include=\"..\\src\\a.cpp\" />\n");
        assert!(filters.ends_with(
            "\t\t<ClCompile Include=\"..\\src\\a.cpp\">\n\
             \t\t\t<Filter>Source Files</Filter>\n\
             \t\t</ClCompile>\n"
        ));
    }

    #[test]
    fn item_with_undeclared_filter_is_rejected() {
        let mut docs = pair();
        let err = docs.append_item(&item("a.cpp"), "Source Files").unwrap_err();
        assert!(matches!(err, VcxprojError::UndeclaredFilter { .. }));
        assert_eq!(docs.item_count(), 0);
        let (project, _) = texts(docs);
        assert!(project.is_empty());
    }

    #[test]
    fn excluded_item_closes_with_its_own_element() {
        let mut docs = pair();
        docs.append_filter_declaration(&decl("Other Files")).unwrap();
        let excluded = SourceItem {
            element: "None",
            include: r"platform\web\shell.html".into(),
            excluded_in: vec!["'$(Configuration)|$(Platform)'=='Debug|Win32'".into()],
        };
        docs.append_item(&excluded, "Other Files").unwrap();

        let (project, _) = texts(docs);
        assert_eq!(
            project,
            "\t\t<None Include=\"platform\\web\\shell.html\">\n\
             \t\t\t<ExcludedFromBuild Condition=\"'$(Configuration)|$(Platform)'=='Debug|Win32'\">true</ExcludedFromBuild>\n\
             \t\t</None>\n"
        );
    }

    #[test]
    fn item_include_is_escaped() {
        let mut docs = pair();
        docs.append_filter_declaration(&decl("Source Files")).unwrap();
        docs.append_item(&item("R&D.cpp"), "Source Files").unwrap();
        let (project, filters) = texts(docs);
        assert!(project.contains("Include=\"R&amp;D.cpp\""));
        assert!(filters.contains("Include=\"R&amp;D.cpp\""));
    }

    #[test]
    fn item_groups_open_in_both() {
        let mut docs = pair();
        docs.begin_item_group().unwrap();
        docs.end_item_group().unwrap();
        let (project, filters) = texts(docs);
        assert_eq!(project, filters);
        assert_eq!(project, "\t<ItemGroup>\n\t</ItemGroup>\n");
    }

    #[test]
    fn filters_path_appends_suffix() {
        assert_eq!(
            filters_path(Path::new("build/app.vcxproj"), ".filters"),
            Path::new("build/app.vcxproj.filters")
        );
    }

    #[test]
    fn create_reports_failing_path() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let target = blocker.join("app.vcxproj");

        match DocumentPair::create(&target, ".filters") {
            Err(VcxprojError::OpenOutput { path, .. }) => assert_eq!(path, target),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected open failure"),
        }
    }
}
