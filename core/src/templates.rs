//! Built-in project files used when the model leaves a required file out.

use crate::normalize::JAVA_SOURCE_ROOT;
use crate::normalize::MANIFEST_PATH;
use crate::normalize::POM_PATH;
use crate::normalize::canonical_namespace;
use crate::prompts::render;
use forge_protocol::FileTree;

const POM_TEMPLATE: &str = include_str!("../templates/project/pom.xml");
const MANIFEST_TEMPLATE: &str = include_str!("../templates/project/plugin.yml");
const MAIN_CLASS_TEMPLATE: &str = include_str!("../templates/project/Main.java");

/// `src/main/java/<namespace dirs>/<PluginName>.java`.
pub fn main_class_path(plugin_name: &str) -> String {
    let package_dir = canonical_namespace(plugin_name).replace('.', "/");
    format!("{JAVA_SOURCE_ROOT}{package_dir}/{plugin_name}.java")
}

/// The three files every plugin needs, in the order they are listed to the
/// model.
pub fn required_paths(plugin_name: &str) -> [String; 3] {
    [
        POM_PATH.to_string(),
        MANIFEST_PATH.to_string(),
        main_class_path(plugin_name),
    ]
}

pub fn default_pom(plugin_name: &str) -> String {
    render_project_template(POM_TEMPLATE, plugin_name)
}

pub fn default_manifest(plugin_name: &str) -> String {
    render_project_template(MANIFEST_TEMPLATE, plugin_name)
}

pub fn default_main_class(plugin_name: &str) -> String {
    render_project_template(MAIN_CLASS_TEMPLATE, plugin_name)
}

/// Adds whichever of the pom, the manifest and a main class is missing.
///
/// A main class is considered present when any Java file extends
/// `JavaPlugin`. Returns the paths that were added.
pub fn fill_missing_required_files(tree: &mut FileTree, plugin_name: &str) -> Vec<String> {
    let mut added = Vec::new();
    if !tree.contains(POM_PATH) {
        tree.insert(POM_PATH, default_pom(plugin_name));
        added.push(POM_PATH.to_string());
    }
    if !tree.contains(MANIFEST_PATH) {
        tree.insert(MANIFEST_PATH, default_manifest(plugin_name));
        added.push(MANIFEST_PATH.to_string());
    }
    let has_main_class = tree
        .iter()
        .any(|(path, content)| path.ends_with(".java") && content.contains("extends JavaPlugin"));
    if !has_main_class {
        let path = main_class_path(plugin_name);
        tree.insert(path.clone(), default_main_class(plugin_name));
        added.push(path);
    }
    if !added.is_empty() {
        tracing::warn!(?added, "model omitted required files, using built-in templates");
    }
    added
}

fn render_project_template(template: &str, plugin_name: &str) -> String {
    let namespace = canonical_namespace(plugin_name);
    let artifact_id = plugin_name.to_ascii_lowercase();
    render(
        template,
        &[
            ("plugin_name", plugin_name),
            ("namespace", &namespace),
            ("artifact_id", &artifact_id),
        ],
    )
}
