//! Deterministic GUIDs for projects, filters and project references.
//!
//! Visual Studio only needs these to be unique within a solution, but they
//! must not change between regenerations or the project file churns in
//! version control.  They are therefore derived from an MD5 digest of the
//! scope path (normalized to Windows separators, so every host agrees) plus a
//! logical name.

use crate::paths::normalize_windows;

/// Derive a `{XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX}` identifier from a scope
/// path and a name.
///
/// ```
/// use vcxproj_rs::guid::identifier_for;
/// let a = identifier_for("build/app.vcxproj", "Source Files");
/// let b = identifier_for(r"build\app.vcxproj", "Source Files");
/// assert_eq!(a, b);
/// ```
pub fn identifier_for(scope_key: &str, name: &str) -> String {
    let mut input = normalize_windows(scope_key);
    input.push_str(name);

    let digest = format!("{:X}", md5::compute(input.as_bytes()));
    format_guid(&digest)
}

/// Reshape 32 uppercase hex digits into the braced 8-4-4-4-12 form.
fn format_guid(hex: &str) -> String {
    format!(
        "{{{}-{}-{}-{}-{}}}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

/// Whether `s` has the braced, uppercase GUID shape produced here.
pub fn is_guid(s: &str) -> bool {
    let Some(inner) = s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) else {
        return false;
    };
    let groups: Vec<&str> = inner.split('-').collect();
    let lengths = [8, 4, 4, 4, 12];
    groups.len() == lengths.len()
        && groups.iter().zip(lengths).all(|(group, len)| {
            group.len() == len
                && group
                    .chars()
                    .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
        })
}
