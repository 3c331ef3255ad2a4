//! Template rendering.
//!
//! Templates use EJS-style tags around Tera expressions and statements:
//!
//! | tag              | effect                                   |
//! |------------------|------------------------------------------|
//! | `<%= expr %>`    | HTML-escaped output                      |
//! | `<%- expr %>`    | unescaped output                         |
//! | `<% stmt %>`     | `if` / `for` / `set` and their closers   |
//! | `<%# text %>`    | comment                                  |
//! | `<%%` / `%%>`    | literal `<%` / `%>`                      |
//! | `-%>`            | also drops the newline after the tag     |
//! | `<%_` / `_%>`    | strip spaces and tabs before / after     |
//!
//! The tags are rewritten into Tera syntax and evaluated with the request
//! payload bound as `data`. Templates are trusted input: they may read
//! anything in the payload, but Tera offers no access to the filesystem or
//! the process.

use std::error::Error as StdError;

use serde_json::Value;
use tera::{Context, Tera};
use thiserror::Error;

/// Name under which the payload is visible inside templates.
pub const DATA_FIELD: &str = "data";

// The `.html` suffix turns on Tera's autoescaping for `{{ }}` output.
const TEMPLATE_NAME: &str = "document.html";

const TAG_OPEN: &str = "<%";
const TAG_CLOSE: &str = "%>";

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("unterminated tag opened on line {line}")]
    Unterminated { line: usize },
    #[error("empty output tag on line {line}")]
    EmptyTag { line: usize },
    #[error("template syntax error: {0}")]
    Syntax(String),
    #[error("template evaluation failed: {0}")]
    Evaluation(String),
}

/// Render `source` against `data` and return the produced HTML.
pub fn render(source: &str, data: &Value) -> Result<String, TemplateError> {
    let translated = translate(source)?;

    let mut tera = Tera::default();
    tera.set_escape_fn(escape_markup);
    tera.add_raw_template(TEMPLATE_NAME, &translated)
        .map_err(|err| TemplateError::Syntax(error_chain(&err)))?;

    let mut context = Context::new();
    context.insert(DATA_FIELD, data);

    tera.render(TEMPLATE_NAME, &context)
        .map_err(|err| TemplateError::Evaluation(error_chain(&err)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagKind {
    Escaped,
    Raw,
    Statement,
    Comment,
}

/// Rewrite EJS-style tags into the equivalent Tera source.
fn translate(source: &str) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(source.len() + 32);
    let mut rest = source;

    while let Some(start) = rest.find(TAG_OPEN) {
        let line = line_of(source, source.len() - rest.len() + start);
        let (literal, tag) = rest.split_at(start);
        let after_open = &tag[TAG_OPEN.len()..];

        if let Some(after_escape) = after_open.strip_prefix('%') {
            push_literal(&mut out, literal);
            push_literal(&mut out, TAG_OPEN);
            rest = after_escape;
            continue;
        }

        let (kind, slurp_before, body) = match after_open.as_bytes().first() {
            Some(b'=') => (TagKind::Escaped, false, &after_open[1..]),
            Some(b'-') => (TagKind::Raw, false, &after_open[1..]),
            Some(b'#') => (TagKind::Comment, false, &after_open[1..]),
            Some(b'_') => (TagKind::Statement, true, &after_open[1..]),
            _ => (TagKind::Statement, false, after_open),
        };

        let close = body
            .find(TAG_CLOSE)
            .ok_or(TemplateError::Unterminated { line })?;
        let mut inner = &body[..close];
        let mut after = &body[close + TAG_CLOSE.len()..];

        if let Some(trimmed) = inner.strip_suffix('-') {
            inner = trimmed;
            after = after
                .strip_prefix("\r\n")
                .or_else(|| after.strip_prefix('\n'))
                .unwrap_or(after);
        } else if let Some(trimmed) = inner.strip_suffix('_') {
            inner = trimmed;
            after = after.trim_start_matches([' ', '\t']);
        }

        let literal = if slurp_before {
            literal.trim_end_matches([' ', '\t'])
        } else {
            literal
        };
        push_literal(&mut out, literal);

        let inner = inner.trim();
        match kind {
            TagKind::Comment => {}
            TagKind::Escaped | TagKind::Raw if inner.is_empty() => {
                return Err(TemplateError::EmptyTag { line });
            }
            TagKind::Escaped => {
                out.push_str("{{ ");
                out.push_str(inner);
                out.push_str(" }}");
            }
            TagKind::Raw => {
                out.push_str("{{ ");
                out.push_str(inner);
                out.push_str(" | safe }}");
            }
            TagKind::Statement => {
                if !inner.is_empty() {
                    out.push_str("{% ");
                    out.push_str(inner);
                    out.push_str(" %}");
                }
            }
        }

        rest = after;
    }

    push_literal(&mut out, rest);
    Ok(out)
}

/// Append literal text, quoting anything Tera would read as a delimiter.
fn push_literal(out: &mut String, text: &str) {
    let text = text.replace("%%>", TAG_CLOSE);
    let mut rest = text.as_str();

    while let Some(pos) = rest.find('{') {
        let (head, tail) = rest.split_at(pos);
        out.push_str(head);
        match tail.as_bytes().get(1) {
            Some(b'{' | b'%' | b'#') => {
                push_quoted(out, &tail[..2]);
                rest = &tail[2..];
            }
            // A trailing brace would fuse with the next emitted tag.
            None => {
                push_quoted(out, "{");
                rest = "";
            }
            Some(_) => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
}

fn push_quoted(out: &mut String, delimiter: &str) {
    out.push_str("{{ \"");
    out.push_str(delimiter);
    out.push_str("\" }}");
}

/// Escape the five characters that are significant in HTML text and attributes.
fn escape_markup(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&#34;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn line_of(source: &str, offset: usize) -> usize {
    source[..offset].matches('\n').count() + 1
}

fn error_chain(error: &dyn StdError) -> String {
    let mut message = error.to_string();
    let mut current = error.source();
    while let Some(inner) = current {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        current = inner.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn literal_templates_render_unchanged() {
        let payloads = [json!({}), json!({ "name": "World" }), json!([1, 2])];
        let sources = [
            "",
            "plain text",
            "<html><body><p>Invoice</p></body></html>\n",
            "css { color: red; } {{ not a tag }} {% nor this %} {# nor this #}",
            "dangling brace {",
            "100% sure > 50%",
        ];

        for data in &payloads {
            for source in sources {
                let rendered = render(source, data).expect("literal template renders");
                assert_eq!(rendered, source);
            }
        }
    }

    #[test]
    fn expression_tag_substitutes_payload_field() {
        let rendered =
            render("Hello <%= data.name %>", &json!({ "name": "World" })).expect("renders");
        assert_eq!(rendered, "Hello World");
    }

    #[test]
    fn numbers_render_as_text() {
        let rendered = render("Total: <%= data.total %>", &json!({ "total": 42 })).expect("renders");
        assert_eq!(rendered, "Total: 42");
    }

    #[test]
    fn escaped_output_encodes_markup_and_raw_output_does_not() {
        let data = json!({ "snippet": "<b>bold</b>" });
        let escaped = render("<%= data.snippet %>", &data).expect("renders");
        assert_eq!(escaped, "&lt;b&gt;bold&lt;/b&gt;");

        let raw = render("<%- data.snippet %>", &data).expect("renders");
        assert_eq!(raw, "<b>bold</b>");
    }

    #[test]
    fn escaping_leaves_slashes_in_urls_alone() {
        let data = json!({ "u": "http://a/b & c", "q": "it's \"quoted\"" });
        let rendered = render("<%= data.u %>|<%= data.q %>", &data).expect("renders");
        assert_eq!(rendered, "http://a/b &amp; c|it&#39;s &#34;quoted&#34;");
    }

    #[test]
    fn statements_drive_loops_and_conditionals() {
        let source = "<ul><% for item in data.items %><li><%= item %></li><% endfor %></ul>\
                      <% if data.paid %>PAID<% else %>DUE<% endif %>";
        let rendered = render(source, &json!({ "items": ["a", "b"], "paid": false }))
            .expect("renders");
        assert_eq!(rendered, "<ul><li>a</li><li>b</li></ul>DUE");
    }

    #[test]
    fn comments_and_escapes() {
        let rendered = render("a<%# hidden %>b <%% literal %%>", &json!({})).expect("renders");
        assert_eq!(rendered, "ab <% literal %>");
    }

    #[test]
    fn trim_markers_remove_whitespace() {
        let source = "<ul>\n<% for n in data.n -%>\n  <li><%= n %></li>\n<% endfor -%>\n</ul>";
        let rendered = render(source, &json!({ "n": [1, 2] })).expect("renders");
        assert_eq!(rendered, "<ul>\n  <li>1</li>\n  <li>2</li>\n</ul>");

        let rendered = render("a   <%_ set x = 1 _%>   b", &json!({})).expect("renders");
        assert_eq!(rendered, "ab");
    }

    #[test]
    fn literal_braces_next_to_tags_stay_literal() {
        let rendered = render("{<%= data.v %>}", &json!({ "v": "x" })).expect("renders");
        assert_eq!(rendered, "{x}");
    }

    #[test]
    fn undefined_reference_is_an_evaluation_error() {
        let err = render("<%= data.missing.field %>", &json!({ "name": "World" }))
            .expect_err("missing field fails");
        assert!(matches!(err, TemplateError::Evaluation(_)), "{err:?}");
        assert!(err.to_string().contains("data.missing.field"), "{err}");
    }

    #[test]
    fn unterminated_tag_reports_line() {
        let err = render("line one\nline two <%= data.name", &json!({})).expect_err("fails");
        assert!(matches!(err, TemplateError::Unterminated { line: 2 }), "{err:?}");
    }

    #[test]
    fn empty_output_tag_is_rejected() {
        let err = render("<%=   %>", &json!({})).expect_err("fails");
        assert!(matches!(err, TemplateError::EmptyTag { line: 1 }), "{err:?}");
    }

    #[test]
    fn invalid_statement_is_a_syntax_error() {
        let err = render("<% if (data.x) { %>yes<% } %>", &json!({ "x": true }))
            .expect_err("javascript blocks are not supported");
        assert!(matches!(err, TemplateError::Syntax(_)), "{err:?}");
    }
}
