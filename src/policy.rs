//! Structural rules deciding where files go.
//!
//! None of these look at build flags: they depend only on how paths relate
//! to each other.

use std::collections::HashSet;

use crate::config::{ExclusionRule, FileCategory};
use crate::paths::{decompose, parent_of};

// ═══════════════════════════════════════════════════════════════════════════════
//  Header affinity
// ═══════════════════════════════════════════════════════════════════════════════

/// Headers split by whether a source file lives next to them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderAffinity {
    /// Headers sharing a directory with at least one source file.
    pub local: Vec<String>,
    /// Everything else.  Not emitted as project items.
    pub external: Vec<String>,
}

/// Keep a header only when some source file has exactly the same parent
/// directory.  Both lists must already be project-relative and spelled the
/// same way.  Input order is preserved in both buckets.
pub fn partition_headers(headers: &[String], sources: &[String]) -> HeaderAffinity {
    let source_dirs: HashSet<&str> = sources.iter().map(|s| parent_of(s)).collect();

    let mut affinity = HeaderAffinity::default();
    for header in headers {
        if source_dirs.contains(parent_of(header)) {
            affinity.local.push(header.clone());
        } else {
            affinity.external.push(header.clone());
        }
    }
    affinity
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Per-configuration exclusion
// ═══════════════════════════════════════════════════════════════════════════════

impl ExclusionRule {
    /// Whether `path` lies somewhere below the rule's subtree.  The subtree
    /// must match whole, consecutive directory segments; the file name itself
    /// never counts.
    pub fn matches(&self, path: &str) -> bool {
        let marker = decompose(&self.subtree);
        if marker.is_empty() {
            return false;
        }
        let segments = decompose(path);
        let Some((_, dirs)) = segments.split_last() else {
            return false;
        };
        dirs.windows(marker.len()).any(|window| window == marker.as_slice())
    }
}

/// Rules whose subtree contains `path`, in declaration order.
pub fn exclusions_for<'r>(path: &str, rules: &'r [ExclusionRule]) -> Vec<&'r ExclusionRule> {
    rules.iter().filter(|rule| rule.matches(path)).collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Filter redirection
// ═══════════════════════════════════════════════════════════════════════════════

/// Filter an item is filed under in the filters document.
///
/// `folder` is the item's folder path in its own category tree, starting
/// with the category label (`Header Files\net`).  Headers are filed under the
/// same sub-path of the source tree instead; every other category keeps its
/// own folder.
pub fn filter_path_for(category: FileCategory, folder: &str) -> String {
    if category != FileCategory::Header {
        return folder.to_string();
    }
    let source = FileCategory::Source.label();
    match folder.find('\\') {
        Some(idx) => format!("{source}{}", &folder[idx..]),
        None => source.to_string(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════
