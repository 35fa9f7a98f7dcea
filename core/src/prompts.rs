use crate::extract::file_block;
use forge_protocol::FileTree;
use forge_utils_string::take_bytes_at_char_boundary;

const REFINE_REQUIREMENTS: &str = include_str!("../templates/prompts/refine_requirements.md");
const BLUEPRINT: &str = include_str!("../templates/prompts/blueprint.md");
const FILE_LIST: &str = include_str!("../templates/prompts/file_list.md");
const DRAFT: &str = include_str!("../templates/prompts/draft.md");
const FIX: &str = include_str!("../templates/prompts/fix.md");
const CONSISTENCY: &str = include_str!("../templates/prompts/consistency.md");

/// Per-file budget when a whole tree is pasted into the consistency prompt.
pub const CONSISTENCY_FILE_BUDGET: usize = 2000;

/// Replaces `{{key}}` placeholders in a single pass, so substituted values are
/// never expanded again. Unknown placeholders are left as they are.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };
        let key = after[..end].trim();
        match vars.iter().find(|(name, _)| *name == key) {
            Some((_, value)) => out.push_str(value),
            None => out.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    out
}

pub fn refine_requirements(prompt: &str) -> String {
    render(REFINE_REQUIREMENTS, &[("prompt", prompt)])
}

pub fn blueprint(requirements: &str) -> String {
    render(BLUEPRINT, &[("requirements", requirements)])
}

pub fn file_list(plugin_name: &str, namespace: &str, blueprint: &str) -> String {
    let package_path = namespace.replace('.', "/");
    render(
        FILE_LIST,
        &[
            ("plugin_name", plugin_name),
            ("package_path", &package_path),
            ("blueprint", blueprint),
        ],
    )
}

pub struct DraftInputs<'a> {
    pub plugin_name: &'a str,
    pub namespace: &'a str,
    pub requirements: &'a str,
    pub blueprint: &'a str,
    pub files: &'a [String],
}

pub fn draft(inputs: &DraftInputs<'_>) -> String {
    let artifact_id = inputs.plugin_name.to_ascii_lowercase();
    let file_list = inputs
        .files
        .iter()
        .map(|path| format!("- {path}"))
        .collect::<Vec<_>>()
        .join("\n");
    render(
        DRAFT,
        &[
            ("plugin_name", inputs.plugin_name),
            ("namespace", inputs.namespace),
            ("artifact_id", &artifact_id),
            ("file_list", &file_list),
            ("requirements", inputs.requirements),
            ("blueprint", inputs.blueprint),
        ],
    )
}

pub fn fix(plugin_name: &str, errors: &str, files: &FileTree) -> String {
    render(
        FIX,
        &[
            ("plugin_name", plugin_name),
            ("errors", errors),
            ("files", &format_files(files, None)),
        ],
    )
}

pub fn consistency(files: &FileTree) -> String {
    render(
        CONSISTENCY,
        &[("files", &format_files(files, Some(CONSISTENCY_FILE_BUDGET)))],
    )
}

fn format_files(files: &FileTree, budget: Option<usize>) -> String {
    files
        .iter()
        .map(|(path, content)| {
            let content = match budget {
                Some(budget) => take_bytes_at_char_boundary(content, budget),
                None => content,
            };
            file_block(path, content)
        })
        .collect()
}
