//! Textual clean-up applied to every file the model writes.
//!
//! Each rule is a plain string or regex rewrite. Running [`normalize_file`]
//! twice yields the same text as running it once.

use crate::util::compile_regex;
use crate::util::retain_lines;
use crate::util::strip_code_fences;
use forge_protocol::FileTree;
use forge_protocol::file_name_of;
use regex_lite::Captures;
use regex_lite::Regex;
use std::ops::Range;
use std::sync::LazyLock;

pub const NAMESPACE_ROOT: &str = "com.pluginforge";
pub const JAVA_SOURCE_ROOT: &str = "src/main/java/";
pub const MANIFEST_PATH: &str = "src/main/resources/plugin.yml";
pub const POM_PATH: &str = "pom.xml";

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;
const ATTRIBUTE_IMPORT: &str = "import org.bukkit.attribute.Attribute;";
const MAX_HEALTH_ATTRIBUTE: &str = "getAttribute(Attribute.GENERIC_MAX_HEALTH).getValue()";
const DEFAULT_VERSION: &str = "'1.0.0'";
const DEFAULT_API_VERSION: &str = "'1.20'";

/// Project-level POM sections; the project's own `<artifactId>` precedes them.
const POM_SECTION_TAGS: [&str; 7] = [
    "<dependencies>",
    "<dependencyManagement>",
    "<build>",
    "<profiles>",
    "<repositories>",
    "<pluginRepositories>",
    "<modules>",
];

static PLACEHOLDER_NAMESPACE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| compile_regex(r"\bcom\.example\b(\.[A-Za-z0-9_]+)?"));
static UNSUPPORTED_IMPORT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    compile_regex(
        r"^\s*import\s+(static\s+)?(org\.jetbrains\.annotations|net\.kyori\.adventure)\b.*;\s*$",
    )
});
static NULLABILITY_ANNOTATION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| compile_regex(r"@(NotNull|Nullable)\b[ \t]*"));
static MAX_HEALTH_REGEX: LazyLock<Regex> =
    LazyLock::new(|| compile_regex(r"\bgetMaxHealth\(\s*\)"));
static COMPONENT_TEXT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    compile_regex(r#"\bComponent\.text\(\s*("(?:[^"\\]|\\.)*")\s*\)"#)
});
static ONLINE_PLAYERS_LENGTH_REGEX: LazyLock<Regex> =
    LazyLock::new(|| compile_regex(r"\bgetOnlinePlayers\(\)\.length\b"));
static PACKAGE_DECLARATION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| compile_regex(r"(?m)^\s*package\s+([A-Za-z_][A-Za-z0-9_.]*)\s*;"));
static ATTRIBUTE_IMPORT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    compile_regex(r"(?m)^\s*import\s+org\.bukkit\.attribute\.(Attribute|\*)\s*;")
});

/// `com.pluginforge.<lowercase plugin name>`.
pub fn canonical_namespace(plugin_name: &str) -> String {
    format!("{NAMESPACE_ROOT}.{}", plugin_name.to_ascii_lowercase())
}

/// Normalizes one file according to its type. Unknown file types only get
/// the namespace rewrite.
pub fn normalize_file(path: &str, content: &str, plugin_name: &str) -> String {
    let namespace = canonical_namespace(plugin_name);
    let content = replace_placeholder_namespace(content, plugin_name, &namespace);
    let file_name = file_name_of(path);

    if path.ends_with(".java") {
        normalize_java(path, &content)
    } else if file_name == "pom.xml" {
        normalize_pom(&content, plugin_name)
    } else if file_name == "plugin.yml" {
        normalize_manifest(&content, plugin_name, &namespace)
    } else {
        content
    }
}

/// Normalizes every file of `tree` in place.
pub fn normalize_tree(tree: &mut FileTree, plugin_name: &str) {
    tree.map_contents(|path, content| normalize_file(path, content, plugin_name));
}

fn replace_placeholder_namespace(content: &str, plugin_name: &str, namespace: &str) -> String {
    let plugin_suffix = format!(".{}", plugin_name.to_ascii_lowercase());
    PLACEHOLDER_NAMESPACE_REGEX
        .replace_all(content, |caps: &Captures| match caps.get(1) {
            Some(suffix) if suffix.as_str() == plugin_suffix => {
                namespace.to_string()
            }
            Some(suffix) => format!("{namespace}{}", suffix.as_str()),
            None => namespace.to_string(),
        })
        .into_owned()
}

fn normalize_java(path: &str, content: &str) -> String {
    let content = strip_code_fences(content);
    let content = retain_lines(&content, |line| !UNSUPPORTED_IMPORT_REGEX.is_match(line));
    let content = NULLABILITY_ANNOTATION_REGEX.replace_all(&content, "");
    let content = MAX_HEALTH_REGEX.replace_all(&content, MAX_HEALTH_ATTRIBUTE);
    let content = COMPONENT_TEXT_REGEX.replace_all(&content, "$1");
    let content = ONLINE_PLAYERS_LENGTH_REGEX.replace_all(&content, "getOnlinePlayers().size()");

    let mut content = content.into_owned();
    if content.contains("Attribute.GENERIC_MAX_HEALTH") && !ATTRIBUTE_IMPORT_REGEX.is_match(&content)
    {
        content = insert_import(&content, ATTRIBUTE_IMPORT);
    }
    if !PACKAGE_DECLARATION_REGEX.is_match(&content)
        && let Some(package) = package_for_path(path)
    {
        content = format!("package {package};\n\n{}", content.trim_start());
    }
    content
}

/// Package implied by a path under `src/main/java/`, if the file is not at
/// the source root.
pub fn package_for_path(path: &str) -> Option<String> {
    let relative = path.split_once(JAVA_SOURCE_ROOT).map(|(_, rest)| rest)?;
    let (dir, _) = relative.rsplit_once('/')?;
    if dir.is_empty() {
        return None;
    }
    Some(dir.replace('/', "."))
}

/// Package declared by a Java source, if any.
pub fn declared_package(content: &str) -> Option<&str> {
    PACKAGE_DECLARATION_REGEX
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Rewrites the package declaration to `namespace`, whatever its spacing.
/// Returns `None` when the source declares no package.
pub fn replace_package_declaration(content: &str, namespace: &str) -> Option<String> {
    let found = PACKAGE_DECLARATION_REGEX.find(content)?;
    let leading = found.as_str().len() - found.as_str().trim_start().len();
    let mut updated = content.to_string();
    updated.replace_range(found.start() + leading..found.end(), &format!("package {namespace};"));
    Some(updated)
}

fn insert_import(content: &str, import: &str) -> String {
    match PACKAGE_DECLARATION_REGEX.find(content) {
        Some(package) => {
            let (head, tail) = content.split_at(package.end());
            format!("{head}\n\n{import}{tail}")
        }
        None => format!("{import}\n{content}"),
    }
}

fn normalize_pom(content: &str, plugin_name: &str) -> String {
    let content = strip_code_fences(content);
    let body = match content.find('<') {
        Some(start) => &content[start..],
        None => content.as_str(),
    };
    let mut pom = if body.starts_with("<?xml") {
        body.to_string()
    } else {
        format!("{XML_DECLARATION}\n{body}")
    };

    let artifact_id = plugin_name.to_ascii_lowercase();
    match project_artifact_slot(&pom) {
        Some(ArtifactSlot::Value(range)) => {
            if pom[range.clone()].trim() != artifact_id {
                pom.replace_range(range, &artifact_id);
            }
        }
        Some(ArtifactSlot::Missing(insert_at)) => {
            pom.insert_str(insert_at, &format!("\n    <artifactId>{artifact_id}</artifactId>"));
        }
        None => {}
    }
    pom
}

/// Where the project's own `<artifactId>` value sits, or where one belongs.
enum ArtifactSlot {
    Value(Range<usize>),
    Missing(usize),
}

/// Locates the project's own `<artifactId>`, skipping a `<parent>` block and
/// stopping at the first nested section. A new one goes right after
/// `</parent>` so the next pass finds it at the same place.
fn project_artifact_slot(pom: &str) -> Option<ArtifactSlot> {
    const PARENT_CLOSE: &str = "</parent>";

    let project_start = pom.find("<project")?;
    let body_start = pom[project_start..].find('>')? + project_start + 1;
    let limit = POM_SECTION_TAGS
        .iter()
        .filter_map(|tag| pom[body_start..].find(tag).map(|i| i + body_start))
        .min()
        .unwrap_or(pom.len());

    let Some(parent_start) = pom[body_start..limit].find("<parent>").map(|i| i + body_start) else {
        return Some(slot_between(pom, body_start, limit, body_start));
    };
    if let Some(range) = artifact_value(pom, body_start, parent_start) {
        return Some(ArtifactSlot::Value(range));
    }
    let slot = match pom[parent_start..limit].find(PARENT_CLOSE) {
        Some(i) => {
            let parent_end = parent_start + i + PARENT_CLOSE.len();
            slot_between(pom, parent_end, limit, parent_end)
        }
        // Unterminated `<parent>`: its first artifactId is the only candidate.
        None => slot_between(pom, parent_start, limit, body_start),
    };
    Some(slot)
}

fn slot_between(pom: &str, from: usize, to: usize, insert_at: usize) -> ArtifactSlot {
    artifact_value(pom, from, to).map_or(ArtifactSlot::Missing(insert_at), ArtifactSlot::Value)
}

fn artifact_value(pom: &str, from: usize, to: usize) -> Option<Range<usize>> {
    const OPEN: &str = "<artifactId>";
    const CLOSE: &str = "</artifactId>";

    let open = pom[from..to].find(OPEN)? + from + OPEN.len();
    let close = pom[open..to].find(CLOSE)? + open;
    Some(open..close)
}

fn normalize_manifest(content: &str, plugin_name: &str, namespace: &str) -> String {
    let content = strip_code_fences(content);
    let mut lines: Vec<String> = content.lines().map(str::to_string).collect();

    let name_index = match top_level_key_index(&lines, "name") {
        Some(index) => {
            if top_level_value(&lines[index]) != plugin_name {
                lines[index] = format!("name: {plugin_name}");
            }
            index
        }
        None => {
            lines.insert(0, format!("name: {plugin_name}"));
            0
        }
    };

    let defaults = [
        ("main", format!("{namespace}.{plugin_name}")),
        ("version", DEFAULT_VERSION.to_string()),
        ("api-version", DEFAULT_API_VERSION.to_string()),
    ];
    let mut insert_at = name_index + 1;
    for (key, value) in defaults {
        if top_level_key_index(&lines, key).is_none() {
            lines.insert(insert_at, format!("{key}: {value}"));
            insert_at += 1;
        }
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Sets (or adds) the top-level `main:` key of a `plugin.yml`.
pub fn set_manifest_main(content: &str, main_class: &str) -> String {
    let mut lines: Vec<String> = content.lines().map(str::to_string).collect();
    match top_level_key_index(&lines, "main") {
        Some(index) => {
            if top_level_value(&lines[index]) == main_class {
                return content.to_string();
            }
            lines[index] = format!("main: {main_class}");
        }
        None => {
            let at = top_level_key_index(&lines, "name").map_or(0, |index| index + 1);
            lines.insert(at, format!("main: {main_class}"));
        }
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Value of a top-level `key:` line, unquoted.
pub fn manifest_value<'a>(content: &'a str, key: &str) -> Option<&'a str> {
    content.lines().find_map(|line| {
        let rest = line.strip_prefix(key)?.strip_prefix(':')?;
        Some(yaml_scalar(rest))
    })
}

fn top_level_key_index(lines: &[String], key: &str) -> Option<usize> {
    lines.iter().position(|line| {
        line.strip_prefix(key)
            .is_some_and(|rest| rest.trim_start().starts_with(':'))
    })
}

fn top_level_value(line: &str) -> &str {
    line.split_once(':').map_or("", |(_, value)| yaml_scalar(value))
}

fn yaml_scalar(raw: &str) -> &str {
    let value = raw.trim();
    value
        .strip_prefix('\'')
        .and_then(|v| v.strip_suffix('\''))
        .or_else(|| value.strip_prefix('"').and_then(|v| v.strip_suffix('"')))
        .unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MAIN_PATH: &str = "src/main/java/com/pluginforge/healer/Healer.java";

    #[test]
    fn java_rewrites_unsupported_apis() {
        let input = "```java\n\
package com.pluginforge.healer;\n\
\n\
import org.jetbrains.annotations.NotNull;\n\
import net.kyori.adventure.text.Component;\n\
import org.bukkit.plugin.java.JavaPlugin;\n\
\n\
public class Healer extends JavaPlugin {\n\
    public void heal(@NotNull Player player) {\n\
        player.setHealth(player.getMaxHealth());\n\
        player.sendMessage(Component.text(\"Healed \\\"you\\\"\"));\n\
        int online = getServer().getOnlinePlayers().length;\n\
    }\n\
}\n\
```\n";
        let expected = "package com.pluginforge.healer;\n\
\n\
import org.bukkit.attribute.Attribute;\n\
\n\
import org.bukkit.plugin.java.JavaPlugin;\n\
\n\
public class Healer extends JavaPlugin {\n\
    public void heal(Player player) {\n\
        player.setHealth(player.getAttribute(Attribute.GENERIC_MAX_HEALTH).getValue());\n\
        player.sendMessage(\"Healed \\\"you\\\"\");\n\
        int online = getServer().getOnlinePlayers().size();\n\
    }\n\
}\n";

        assert_eq!(normalize_file(MAIN_PATH, input, "Healer"), expected);
    }

    #[test]
    fn java_gets_package_from_its_path() {
        let out = normalize_file(MAIN_PATH, "public class Healer {}\n", "Healer");
        assert_eq!(out, "package com.pluginforge.healer;\n\npublic class Healer {}\n");

        let root = normalize_file("src/main/java/Healer.java", "class Healer {}", "Healer");
        assert_eq!(root, "class Healer {}");
    }

    #[test]
    fn placeholder_namespace_is_replaced_everywhere() {
        let java = "package com.example.healer;\nimport com.example.util.Text;\n";
        assert_eq!(
            normalize_file(MAIN_PATH, java, "Healer"),
            "package com.pluginforge.healer;\nimport com.pluginforge.healer.util.Text;\n"
        );
        assert_eq!(
            normalize_file("README.md", "see com.example.Healer", "Healer"),
            "see com.pluginforge.healer.Healer"
        );
        assert_eq!(
            normalize_file("README.md", "com.examples stays", "Healer"),
            "com.examples stays"
        );
    }

    #[test]
    fn pom_gets_declaration_and_artifact_id() {
        let input = "Sure! Here is the pom:\n<project>\n  <parent>\n    <artifactId>parent-pom</artifactId>\n  </parent>\n  <groupId>com.example</groupId>\n  <artifactId>my-plugin</artifactId>\n  <dependencies>\n    <dependency><artifactId>spigot-api</artifactId></dependency>\n  </dependencies>\n</project>\n```\n";
        let out = normalize_file("pom.xml", input, "Healer");

        assert!(out.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<project>"));
        assert!(out.contains("<artifactId>parent-pom</artifactId>"));
        assert!(out.contains("<groupId>com.pluginforge.healer</groupId>"));
        assert!(out.contains("  <artifactId>healer</artifactId>\n  <dependencies>"));
        assert!(out.contains("<artifactId>spigot-api</artifactId>"));
        assert!(!out.contains("```"));
    }

    #[test]
    fn pom_without_artifact_id_gets_one() {
        let out = normalize_file("pom.xml", "<project>\n</project>", "Healer");
        assert_eq!(
            out,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<project>\n    <artifactId>healer</artifactId>\n</project>"
        );
    }

    #[test]
    fn pom_artifact_id_goes_after_the_parent_block() {
        let out = normalize_file(
            "pom.xml",
            "<project>\n  <parent><artifactId>p</artifactId></parent>\n  <dependencies/>\n</project>",
            "Healer",
        );
        assert_eq!(
            out,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<project>\n  <parent><artifactId>p</artifactId></parent>\n    <artifactId>healer</artifactId>\n  <dependencies/>\n</project>"
        );
    }

    #[test]
    fn manifest_fills_required_keys() {
        let out = normalize_file(MANIFEST_PATH, "name: \"Other\"\ncommands:\n  heal:\n    description: Heal\n", "Healer");
        assert_eq!(
            out,
            "name: Healer\nmain: com.pluginforge.healer.Healer\nversion: '1.0.0'\napi-version: '1.20'\ncommands:\n  heal:\n    description: Heal\n"
        );
    }

    #[test]
    fn manifest_keeps_existing_values() {
        let input = "name: Healer\nversion: 2.0\nmain: com.pluginforge.healer.Main\napi-version: 1.21\n";
        assert_eq!(normalize_file(MANIFEST_PATH, input, "Healer"), input);
    }

    #[test]
    fn normalization_is_idempotent() {
        let files = [
            (MAIN_PATH, "import org.jetbrains.annotations.Nullable;\nclass Healer { double h = p.getMaxHealth(); int n = getOnlinePlayers().length; }"),
            ("pom.xml", "junk <project><artifactId>x</artifactId></project>"),
            (MANIFEST_PATH, "```yaml\ndescription: heals\n```"),
            ("config.yml", "prefix: com.example"),
            (
                "pom.xml",
                "<project>\n  <parent>\n    <artifactId>parent-pom</artifactId>\n  <artifactId>x</artifactId>\n</project>",
            ),
            (
                "pom.xml",
                "<project>\n  <parent><artifactId>p</artifactId></parent>\n  <dependencies/>\n</project>",
            ),
            ("pom.xml", "<project><artifactId>broken\n<build/></project>"),
        ];
        for (path, content) in files {
            let once = normalize_file(path, content, "Healer");
            let twice = normalize_file(path, &once, "Healer");
            assert_eq!(once, twice, "{path}");
        }
    }

    #[test]
    fn set_manifest_main_replaces_or_inserts() {
        assert_eq!(
            set_manifest_main("name: A\nmain: x.Y\n", "a.b.A"),
            "name: A\nmain: a.b.A\n"
        );
        assert_eq!(set_manifest_main("name: A\n", "a.b.A"), "name: A\nmain: a.b.A\n");
        assert_eq!(manifest_value("name: 'A'\nmain: a.b.A\n", "main"), Some("a.b.A"));
        assert_eq!(manifest_value("mainly: no\n", "main"), None);
    }

    #[test]
    fn package_helpers() {
        assert_eq!(package_for_path(MAIN_PATH).as_deref(), Some("com.pluginforge.healer"));
        assert_eq!(package_for_path("src/main/resources/plugin.yml"), None);
        assert_eq!(declared_package("// x\npackage a.b;\n"), Some("a.b"));
        assert_eq!(
            replace_package_declaration("// x\n\tpackage  a.b ;\nclass A {}", "c.d").as_deref(),
            Some("// x\n\tpackage c.d;\nclass A {}")
        );
        assert_eq!(replace_package_declaration("class A {}", "c.d"), None);
    }
}
