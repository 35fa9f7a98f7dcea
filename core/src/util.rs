use regex_lite::Regex;

pub(crate) fn compile_regex(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(regex) => regex,
        // Every pattern is a literal in this crate and is exercised by the
        // module tests, so this is unreachable in practice.
        Err(err) => panic!("invalid regex pattern `{pattern}`: {err}"),
    }
}

/// Drops Markdown code-fence lines (```` ``` ```` with or without a language
/// tag). A trailing newline on the input is preserved.
pub(crate) fn strip_code_fences(content: &str) -> String {
    retain_lines(content, |line| !line.trim_start().starts_with("```"))
}

/// Keeps the lines for which `keep` returns true.
pub(crate) fn retain_lines<F>(content: &str, mut keep: F) -> String
where
    F: FnMut(&str) -> bool,
{
    let mut out = content
        .lines()
        .filter(|line| keep(line))
        .collect::<Vec<_>>()
        .join("\n");
    if content.ends_with('\n') && !out.is_empty() {
        out.push('\n');
    }
    out
}

/// Index of the first `[`, and the last `]` after it, as an inclusive slice.
pub(crate) fn bracketed_slice(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn strips_fences_and_keeps_trailing_newline() {
        assert_eq!(strip_code_fences("```java\nclass A {}\n```\n"), "class A {}\n");
        assert_eq!(strip_code_fences("a\nb"), "a\nb");
    }

    #[test]
    fn bracketed_slice_spans_outermost_brackets() {
        assert_eq!(bracketed_slice("noise [1, [2]] tail"), Some("[1, [2]]"));
        assert_eq!(bracketed_slice("] backwards ["), None);
        assert_eq!(bracketed_slice("none"), None);
    }
}
