//! Fallback preview template.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use thiserror::Error;

use super::PageMetadata;

/// Built-in fallback page. Placeholders: `{{title}}`, `{{description}}`, `{{url}}`.
pub const DEFAULT_TEMPLATE: &str = include_str!("../../templates/default-template.html");

/// Element of the fallback page that gets captured.
pub const TEMPLATE_SELECTOR: &str = "#link-preview";

const CONTAINER_MARKER: &str = r#"id="link-preview""#;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(title|description|url)\}\}").expect("placeholder pattern compiles"));

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template has no #link-preview container")]
    MissingContainer,
}

/// Fills `template` with HTML-escaped metadata.
pub fn render_template(template: &str, metadata: &PageMetadata, url: &str) -> Result<String, TemplateError> {
    if !template.contains(CONTAINER_MARKER) {
        return Err(TemplateError::MissingContainer);
    }

    let title = escape_html(&metadata.title);
    let description = escape_html(&metadata.description);
    let url = word_break_url(url);

    // Single pass: substituted values are never scanned for placeholders.
    let rendered = PLACEHOLDER.replace_all(template, |caps: &Captures| match &caps[1] {
        "title" => title.clone(),
        "description" => description.clone(),
        _ => url.clone(),
    });
    Ok(rendered.into_owned())
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escapes `url`, then adds a `<wbr>` break opportunity before every `/`.
/// Escaping first keeps the inserted markup the only raw HTML.
fn word_break_url(url: &str) -> String {
    escape_html(url).replace('/', "<wbr>/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(title: &str, description: &str) -> PageMetadata {
        PageMetadata {
            title: title.to_string(),
            description: description.to_string(),
        }
    }

    #[test]
    fn test_default_template_fills_placeholders() {
        let html = render_template(
            DEFAULT_TEMPLATE,
            &metadata("Butterfly", "Link previews"),
            "https://chimbori.com/butterfly",
        )
        .unwrap();

        assert!(html.contains("<h1>Butterfly</h1>"));
        assert!(html.contains("<p>Link previews</p>"));
        assert!(html.contains("https:<wbr>/<wbr>/chimbori.com<wbr>/butterfly"));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn test_values_are_escaped() {
        let html = render_template(
            DEFAULT_TEMPLATE,
            &metadata("<script>alert(1)</script>", "Tom & \"Jerry\""),
            "https://example.com/?q=<b>",
        )
        .unwrap();

        assert!(!html.contains("<script>alert"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(html.contains("Tom &amp; &#34;Jerry&#34;"));
        assert!(html.contains("?q=&lt;b&gt;"));
    }

    #[test]
    fn test_missing_container() {
        let result = render_template("<div>{{title}}</div>", &metadata("t", "d"), "https://x.com");
        assert_eq!(result, Err(TemplateError::MissingContainer));
    }

    #[test]
    fn test_values_containing_placeholders_kept_verbatim() {
        let html = render_template(
            r#"<div id="link-preview">T={{title}}|D={{description}}|U={{url}}</div>"#,
            &metadata("{{description}}", "{{url}} secret"),
            "https://x.com/{{title}}",
        )
        .unwrap();

        assert_eq!(
            html,
            r#"<div id="link-preview">T={{description}}|D={{url}} secret|U=https:<wbr>/<wbr>/x.com<wbr>/{{title}}</div>"#
        );
    }

    #[test]
    fn test_unknown_placeholder_untouched() {
        let html = render_template(r#"<b id="link-preview">{{other}}</b>"#, &metadata("t", "d"), "u").unwrap();
        assert_eq!(html, r#"<b id="link-preview">{{other}}</b>"#);
    }

    #[test]
    fn test_word_break_url() {
        assert_eq!(word_break_url("a/b"), "a<wbr>/b");
        assert_eq!(word_break_url("<a>/"), "&lt;a&gt;<wbr>/");
    }
}
