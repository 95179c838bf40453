//! Folder tree built from flat file lists.
//!
//! Each category's files are arranged into nested folders mirroring their
//! on-disk layout.  The tree only decides *shape*: a leaf keeps the path
//! string it was built from, untouched, so the writer can emit it verbatim.

use std::collections::BTreeMap;

use crate::paths::decompose;

/// A node of the folder tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Folder(Folder),
    /// A file, holding the original path it was inserted with.
    Leaf(String),
}

/// A folder: unique segment names mapped to child nodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Folder {
    children: BTreeMap<String, Node>,
}

impl Folder {
    /// Build a tree from `paths` in order.
    ///
    /// `.` and `..` never become folders.  When two inputs land on the same
    /// key in the same folder the later one replaces the earlier one,
    /// whichever of file or folder either of them was.
    pub fn build<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut root = Self::default();
        for path in paths {
            root.insert(path.as_ref());
        }
        root
    }

    /// Insert one path into the tree.
    pub fn insert(&mut self, path: &str) {
        let segments = decompose(path);
        let Some((file_name, dirs)) = segments.split_last() else {
            tracing::debug!(path, "empty path skipped");
            return;
        };
        if file_name == "." || file_name == ".." {
            tracing::debug!(path, "path names no file, skipped");
            return;
        }

        let mut folder = self;
        for dir in dirs {
            if dir == "." || dir == ".." {
                continue;
            }
            let Some(child) = folder.child_folder(dir) else {
                return;
            };
            folder = child;
        }
        folder
            .children
            .insert(file_name.clone(), Node::Leaf(path.to_string()));
    }

    /// Subfolder `name`, created on demand.  A file of the same name is
    /// replaced.
    fn child_folder(&mut self, name: &str) -> Option<&mut Folder> {
        let slot = self
            .children
            .entry(name.to_string())
            .or_insert_with(|| Node::Folder(Folder::default()));
        if !matches!(slot, Node::Folder(_)) {
            *slot = Node::Folder(Folder::default());
        }
        match slot {
            Node::Folder(folder) => Some(folder),
            Node::Leaf(_) => None,
        }
    }

    /// Whether the folder chain along `path` exists, with `.` and `..`
    /// skipped the way [`insert`](Self::insert) skips them.  The empty path
    /// names this folder itself.
    pub fn contains_folder(&self, path: &str) -> bool {
        let mut folder = self;
        for dir in decompose(path) {
            if dir == "." || dir == ".." {
                continue;
            }
            match folder.children.get(&dir) {
                Some(Node::Folder(child)) => folder = child,
                _ => return false,
            }
        }
        true
    }

    pub fn get(&self, name: &str) -> Option<&Node> {
        self.children.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Direct children sorted by case-insensitive name.  Names that differ
    /// only by case keep their byte order, so the result is total.
    pub fn entries(&self) -> Vec<(&str, &Node)> {
        let mut entries: Vec<(&str, &Node)> = self
            .children
            .iter()
            .map(|(name, node)| (name.as_str(), node))
            .collect();
        entries.sort_by_cached_key(|(name, _)| name.to_lowercase());
        entries
    }

    /// Direct subfolders, in [`entries`](Self::entries) order.
    pub fn subfolders(&self) -> Vec<(&str, &Folder)> {
        self.entries()
            .into_iter()
            .filter_map(|(name, node)| match node {
                Node::Folder(folder) => Some((name, folder)),
                Node::Leaf(_) => None,
            })
            .collect()
    }

    /// Direct files as `(name, original path)`, in [`entries`](Self::entries) order.
    pub fn files(&self) -> Vec<(&str, &str)> {
        self.entries()
            .into_iter()
            .filter_map(|(name, node)| match node {
                Node::Leaf(path) => Some((name, path.as_str())),
                Node::Folder(_) => None,
            })
            .collect()
    }

    /// Number of files anywhere below this folder.
    pub fn file_count(&self) -> usize {
        self.children
            .values()
            .map(|node| match node {
                Node::Folder(folder) => folder.file_count(),
                Node::Leaf(_) => 1,
            })
            .sum()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════
