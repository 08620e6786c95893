//! Prompt template rendering
//!
//! Templates use named placeholders: `{summary}`, `{repository}` and
//! `{language}`. `{{` and `}}` produce literal braces. Anything else in braces
//! is copied through untouched, and substituted values are never scanned for
//! placeholders themselves. Custom prompts come from tenants, so rendering
//! must never fail.

/// Values available to a template
#[derive(Debug, Clone, Copy)]
pub struct PromptContext<'a> {
    pub summary: &'a str,
    pub repository: &'a str,
    pub language: &'a str,
}

impl<'a> PromptContext<'a> {
    fn lookup(&self, name: &str) -> Option<&'a str> {
        match name {
            "summary" => Some(self.summary),
            "repository" => Some(self.repository),
            "language" => Some(self.language),
            _ => None,
        }
    }
}

/// Render a template; if it never references `{summary}` the summary is appended.
pub fn render_prompt(template: &str, context: &PromptContext<'_>) -> String {
    let (mut rendered, used_summary) = render(template, context);
    if !used_summary {
        if !rendered.is_empty() {
            rendered.push_str("\n\n");
        }
        rendered.push_str(context.summary);
    }
    rendered
}

fn render(template: &str, context: &PromptContext<'_>) -> (String, bool) {
    let mut output = String::with_capacity(template.len() + context.summary.len());
    let mut used_summary = false;
    let mut rest = template;

    while let Some(pos) = rest.find(&['{', '}'][..]) {
        output.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if tail.starts_with("{{") || tail.starts_with("}}") {
            output.push_str(&tail[..1]);
            rest = &tail[2..];
            continue;
        }

        if tail.starts_with('{') {
            if let Some((name, after)) = placeholder(tail) {
                if let Some(value) = context.lookup(name) {
                    used_summary |= name == "summary";
                    output.push_str(value);
                    rest = after;
                    continue;
                }
            }
        }

        // Stray brace or unknown placeholder: copy the brace and keep scanning
        output.push_str(&tail[..1]);
        rest = &tail[1..];
    }

    output.push_str(rest);
    (output, used_summary)
}

/// Split `{name}...` into `name` and the text after the closing brace.
fn placeholder(tail: &str) -> Option<(&str, &str)> {
    let inner = tail.strip_prefix('{')?;
    let end = inner.find('}')?;
    let name = &inner[..end];
    let is_identifier =
        !name.is_empty() && name.chars().all(|c| c.is_ascii_lowercase() || c == '_');
    is_identifier.then(|| (name, &inner[end + 1..]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CONTEXT: PromptContext<'static> = PromptContext {
        summary: "Repository: demo\nCommits: 1",
        repository: "demo",
        language: "en",
    };

    #[test]
    fn test_named_placeholders() {
        assert_eq!(
            render_prompt("Post about {repository} in {language}:\n{summary}", &CONTEXT),
            "Post about demo in en:\nRepository: demo\nCommits: 1"
        );
    }

    #[test]
    fn test_escaped_braces() {
        assert_eq!(
            render_prompt("Reply as JSON {{\"text\": ...}} for {summary}", &CONTEXT),
            "Reply as JSON {\"text\": ...} for Repository: demo\nCommits: 1"
        );
    }

    #[test]
    fn test_unknown_placeholders_and_stray_braces_are_kept() {
        assert_eq!(
            render_prompt("{summary} {unknown} %s %d { } {Repository} }", &CONTEXT),
            "Repository: demo\nCommits: 1 {unknown} %s %d { } {Repository} }"
        );
    }

    #[test]
    fn test_unclosed_brace() {
        assert_eq!(
            render_prompt("{summary} and {repository", &CONTEXT),
            "Repository: demo\nCommits: 1 and {repository"
        );
    }

    #[test]
    fn test_nested_brace_before_placeholder() {
        assert_eq!(
            render_prompt("{ {repository} {summary}", &CONTEXT),
            "{ demo Repository: demo\nCommits: 1"
        );
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let context = PromptContext {
            summary: "Message: use {language} and {{braces}}",
            repository: "{summary}",
            language: "ru",
        };
        assert_eq!(
            render_prompt("{repository} | {summary}", &context),
            "{summary} | Message: use {language} and {{braces}}"
        );
    }

    #[test]
    fn test_summary_appended_when_not_referenced() {
        assert_eq!(
            render_prompt("Write a cheerful post about {repository}.", &CONTEXT),
            "Write a cheerful post about demo.\n\nRepository: demo\nCommits: 1"
        );
        assert_eq!(render_prompt("", &CONTEXT), "Repository: demo\nCommits: 1");
    }

    #[test]
    fn test_multibyte_text_survives() {
        assert_eq!(
            render_prompt("Напиши пост про {repository} 🚀 {summary}", &CONTEXT),
            "Напиши пост про demo 🚀 Repository: demo\nCommits: 1"
        );
    }
}
