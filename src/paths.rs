//! Path helpers for project generation.
//!
//! Every path that ends up inside a generated document is relative to the
//! directory holding the `.vcxproj` and uses Windows separators, whatever the
//! host OS.  Inputs may name files that do not exist yet (build outputs), so
//! resolution here is purely lexical: nothing is canonicalized.

use std::path::{Component, Path, PathBuf};

use crate::error::{Result, VcxprojError};

// ═══════════════════════════════════════════════════════════════════════════════
//  Decomposition
// ═══════════════════════════════════════════════════════════════════════════════

/// Split a path into its segments, outermost first.
///
/// Both `/` and `\` are separators so that a path spelled for either host
/// decomposes the same way.  Empty segments (leading root, doubled or
/// trailing separators) are dropped; `.` and `..` are kept and left for the
/// caller to interpret.
///
/// ```
/// use vcxproj_rs::paths::decompose;
/// assert_eq!(decompose(r"src\net/socket.cpp"), ["src", "net", "socket.cpp"]);
/// assert!(decompose("").is_empty());
/// ```
pub fn decompose(path: &str) -> Vec<String> {
    path.split(['/', '\\'])
        .filter(|segment| !segment.is_empty())
        .map(String::from)
        .collect()
}

/// Parent portion of a Windows-style relative path (`a\b\c.h` → `a\b`).
/// A bare file name has an empty parent.
pub fn parent_of(path: &str) -> &str {
    match path.rfind(['\\', '/']) {
        Some(idx) => &path[..idx],
        None => "",
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Separator normalization
// ═══════════════════════════════════════════════════════════════════════════════

/// Rewrite every `/` as `\`.
pub fn to_windows(path: &str) -> String {
    path.replace('/', "\\")
}

/// Lexically normalize a path the way Windows tooling would spell it.
///
/// Separators become `\`, repeated separators collapse, `.` segments vanish
/// and `..` consumes the preceding segment when there is one.  A leading
/// drive (`C:`) or root separator is preserved.  Case is left untouched.
pub fn normalize_windows(path: &str) -> String {
    let unified = to_windows(path);

    let (prefix, rest) = split_windows_prefix(&unified);
    let rooted = rest.starts_with('\\');

    let mut segments: Vec<&str> = Vec::new();
    for segment in rest.split('\\') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                // `..` above the root of an absolute path has nowhere to go.
                _ if rooted => {}
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    let mut out = String::from(prefix);
    if rooted {
        out.push('\\');
    }
    out.push_str(&segments.join("\\"));
    if out.is_empty() {
        out.push('.');
    }
    out
}

fn split_windows_prefix(path: &str) -> (&str, &str) {
    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
        path.split_at(2)
    } else {
        ("", path)
    }
}

/// Interpret a path string on the current host.  Windows spellings are
/// accepted everywhere so that manifests written on one OS work on another.
pub fn host_path(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if cfg!(windows) {
        path.to_path_buf()
    } else {
        PathBuf::from(path.to_string_lossy().replace('\\', "/"))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Project-relative paths
// ═══════════════════════════════════════════════════════════════════════════════

/// Express `path` relative to `project_dir`, using `\` separators.
///
/// Both arguments are made absolute against the current directory and
/// normalized lexically.  The path is first treated as a directory; when it
/// names an existing file, or the directory interpretation cannot be related
/// to the project directory, it is treated as `parent` + file name instead.
/// Only when both interpretations fail is an error returned.
///
/// Missing paths are fine: build outputs usually do not exist yet.
pub fn relative_to(path: impl AsRef<Path>, project_dir: impl AsRef<Path>) -> Result<String> {
    let raw = path.as_ref();
    let display = raw.to_string_lossy().into_owned();

    let base = absolutize(&host_path(project_dir))?;
    let target = absolutize(&host_path(raw))?;

    let directory_attempt = if target.is_file() {
        Err("names an existing file".to_string())
    } else {
        diff_components(&target, &base)
            .ok_or_else(|| format!("no common root with '{}'", base.display()))
    };

    match directory_attempt {
        Ok(relative) => Ok(relative),
        Err(dir_reason) => {
            file_relative(&target, &base).ok_or_else(|| {
                VcxprojError::path_resolution(
                    display,
                    format!("{dir_reason}; file fallback failed as well"),
                )
            })
        }
    }
}

/// Parent directory relative to `base`, joined with the file name.  A file
/// sitting directly in `base` comes back as its bare name.
fn file_relative(target: &Path, base: &Path) -> Option<String> {
    let name = target.file_name()?.to_string_lossy();
    let parent = target.parent()?;
    let parent_rel = diff_components(parent, base)?;
    if parent_rel == "." {
        Some(name.into_owned())
    } else {
        Some(format!("{parent_rel}\\{name}"))
    }
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(path)
        .map_err(|e| VcxprojError::path_resolution(path.to_string_lossy(), e.to_string()))?;

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}

/// Lexical relative path between two absolute, normalized paths.  `None`
/// when they do not share a prefix/root (e.g. different drives).
fn diff_components(target: &Path, base: &Path) -> Option<String> {
    let target: Vec<Component> = target.components().collect();
    let base: Vec<Component> = base.components().collect();

    let anchored = |c: &Component| matches!(c, Component::Prefix(_) | Component::RootDir);
    let target_anchor: Vec<_> = target.iter().take_while(|c| anchored(c)).collect();
    let base_anchor: Vec<_> = base.iter().take_while(|c| anchored(c)).collect();
    if target_anchor != base_anchor {
        return None;
    }

    let common = target
        .iter()
        .zip(base.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = Vec::new();
    parts.extend(std::iter::repeat_n("..".to_string(), base.len() - common));
    parts.extend(
        target[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );

    if parts.is_empty() {
        Some(".".to_string())
    } else {
        Some(parts.join("\\"))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════
