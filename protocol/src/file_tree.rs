use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;

/// Relative path (forward slashes, no leading slash) to file content.
///
/// Insertion order is preserved so that trees extracted from model output keep
/// the order in which the files were written. Inserting an existing path
/// replaces its content in place; there is no merging of content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileTree {
    files: IndexMap<String, String>,
}

impl FileTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `content` at `path`, returning the previous content if any.
    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<String>) -> Option<String> {
        self.files.insert(path.into(), content.into())
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files
            .iter()
            .map(|(path, content)| (path.as_str(), content.as_str()))
    }

    /// Paths in lexical order, independent of insertion order.
    pub fn sorted_paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.paths().collect();
        paths.sort_unstable();
        paths
    }

    /// Rewrites every file's content with `f(path, content)`.
    pub fn map_contents<F>(&mut self, mut f: F)
    where
        F: FnMut(&str, &str) -> String,
    {
        for (path, content) in self.files.iter_mut() {
            let updated = f(path, content);
            if updated != *content {
                *content = updated;
            }
        }
    }

    /// Copies every entry of `patch` into `self` and returns how many paths
    /// were added or had their content changed.
    pub fn apply(&mut self, patch: FileTree) -> usize {
        let mut changed = 0;
        for (path, content) in patch.files {
            match self.files.get(&path) {
                Some(existing) if *existing == content => {}
                _ => {
                    changed += 1;
                    self.files.insert(path, content);
                }
            }
        }
        changed
    }

    /// Returns a tree holding only the entries whose path satisfies `keep`.
    pub fn filter<F>(&self, mut keep: F) -> FileTree
    where
        F: FnMut(&str) -> bool,
    {
        self.files
            .iter()
            .filter(|(path, _)| keep(path))
            .map(|(path, content)| (path.clone(), content.clone()))
            .collect()
    }

    /// First path whose last segment equals `file_name`.
    pub fn find_by_file_name(&self, file_name: &str) -> Option<&str> {
        self.paths()
            .find(|path| file_name_of(path) == file_name)
    }
}

/// Last `/`-separated segment of a tree path.
pub fn file_name_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

impl FromIterator<(String, String)> for FileTree {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for FileTree {
    type Item = (String, String);
    type IntoIter = indexmap::map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn insert_replaces_content_and_keeps_position() {
        let mut tree = FileTree::new();
        tree.insert("b.txt", "one");
        tree.insert("a.txt", "two");
        let previous = tree.insert("b.txt", "three");

        assert_eq!(previous.as_deref(), Some("one"));
        assert_eq!(tree.paths().collect::<Vec<_>>(), vec!["b.txt", "a.txt"]);
        assert_eq!(tree.get("b.txt"), Some("three"));
        assert_eq!(tree.sorted_paths(), vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn apply_counts_only_changed_or_new_paths() {
        let mut tree = FileTree::new();
        tree.insert("pom.xml", "<project/>");
        tree.insert("src/Main.java", "class Main {}");

        let mut patch = FileTree::new();
        patch.insert("pom.xml", "<project/>");
        patch.insert("src/Main.java", "public class Main {}");
        patch.insert("src/Extra.java", "class Extra {}");

        assert_eq!(tree.apply(patch), 2);
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.get("src/Main.java"), Some("public class Main {}"));
    }

    #[test]
    fn serializes_as_plain_json_object() {
        let mut tree = FileTree::new();
        tree.insert("plugin.yml", "name: Foo");

        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(json, serde_json::json!({ "plugin.yml": "name: Foo" }));

        let back: FileTree = serde_json::from_value(json).unwrap();
        assert_eq!(back, tree);
    }

    #[test]
    fn finds_files_by_last_segment() {
        let mut tree = FileTree::new();
        tree.insert("src/main/resources/plugin.yml", "");
        assert_eq!(
            tree.find_by_file_name("plugin.yml"),
            Some("src/main/resources/plugin.yml")
        );
        assert_eq!(tree.find_by_file_name("pom.xml"), None);
    }
}
