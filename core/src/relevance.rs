use forge_protocol::FileTree;
use forge_protocol::file_name_of;

/// Files whose name appears (case-insensitively) in `error_text`.
///
/// When nothing matches, the whole tree is returned. `pom.xml` is always part
/// of the result when the tree has one. The result only ever holds entries
/// of `tree`.
pub fn filter_relevant_files(error_text: &str, tree: &FileTree) -> FileTree {
    let haystack = error_text.to_lowercase();
    let mentioned = tree.filter(|path| {
        let file_name = file_name_of(path).to_lowercase();
        !file_name.is_empty() && haystack.contains(&file_name)
    });
    if mentioned.is_empty() {
        return tree.clone();
    }

    let mut relevant = mentioned;
    for (path, content) in tree.iter() {
        if file_name_of(path) == "pom.xml" && !relevant.contains(path) {
            relevant.insert(path, content);
        }
    }
    relevant
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tree() -> FileTree {
        [
            ("pom.xml", "<project/>"),
            ("src/main/java/a/Main.java", "class Main {}"),
            ("src/main/java/a/HealCommand.java", "class HealCommand {}"),
            ("src/main/resources/plugin.yml", "name: A"),
        ]
        .into_iter()
        .map(|(path, content)| (path.to_string(), content.to_string()))
        .collect()
    }

    #[test]
    fn keeps_mentioned_files_and_the_pom() {
        let error = "[ERROR] /work/src/main/java/a/healcommand.java:[3,5] cannot find symbol";
        let relevant = filter_relevant_files(error, &tree());
        assert_eq!(
            relevant.paths().collect::<Vec<_>>(),
            vec!["src/main/java/a/HealCommand.java", "pom.xml"]
        );
    }

    #[test]
    fn falls_back_to_the_whole_tree() {
        let relevant = filter_relevant_files("BUILD FAILURE", &tree());
        assert_eq!(relevant, tree());
    }

    #[test]
    fn never_invents_files() {
        let relevant = filter_relevant_files("Missing.java plugin.yml", &tree());
        for path in relevant.paths() {
            assert!(tree().contains(path));
        }
        assert!(relevant.contains("src/main/resources/plugin.yml"));
        assert!(!relevant.contains("src/main/java/a/Main.java"));
    }
}
