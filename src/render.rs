// src/render.rs
//! Markdown/LaTeX rendering for generated problems.
//!
//! Math written as `$...$` or `$$...$$` is emitted as
//! `<span class="math math-inline">` / `<span class="math math-display">`
//! elements, which the page produced by [`render_document`] typesets with
//! KaTeX. Raw HTML inside the Markdown is passed through untouched.

use pulldown_cmark::{html, Options, Parser};

use crate::models::GeneratedOutput;

const KATEX_VERSION: &str = "0.16.11";

fn markdown_options() -> Options {
    Options::ENABLE_MATH | Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH
}

/// Renders Markdown with math to an HTML fragment. Empty input renders nothing.
pub fn render(markdown: &str) -> String {
    if markdown.is_empty() {
        return String::new();
    }
    let parser = Parser::new_ext(markdown, markdown_options());
    let mut html_output = String::new();
    html::push_html(&mut html_output, parser);
    html_output
}

/// Escapes text for use inside HTML element content or attribute values.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Builds a standalone HTML page for a completed job.
pub fn render_document(output: &GeneratedOutput, show_answers: bool) -> String {
    let title = escape_html(output.exam_title().unwrap_or("Generated problems"));

    let mut body = String::new();
    if output.has_questions() {
        for q in &output.questions {
            let topic = q.topic.as_deref().filter(|t| !t.is_empty()).unwrap_or("N/A");
            body.push_str("<div class=\"result-box\">\n");
            body.push_str(&format!(
                "<h4>Question {} (Topic: {})</h4>\n",
                escape_html(&q.question_index),
                escape_html(topic)
            ));
            body.push_str("<div class=\"markdown-content\">\n");
            body.push_str(&render(&q.question_text));
            body.push_str("</div>\n");
            if show_answers {
                body.push_str("<div class=\"answer-section\">\n<h5>Answer</h5>\n<div class=\"markdown-content\">\n");
                body.push_str(&render(&q.answer_text));
                body.push_str("</div>\n</div>\n");
            }
            body.push_str("</div>\n");
        }
    } else {
        body.push_str("<p>No questions were found.</p>\n");
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/katex@{katex}/dist/katex.min.css">
<script defer src="https://cdn.jsdelivr.net/npm/katex@{katex}/dist/katex.min.js"></script>
<style>
body {{ max-width: 900px; margin: 0 auto; padding: 1rem; font-family: sans-serif; }}
.result-box {{ margin-top: 1.5rem; padding: 1.5rem; border: 1px solid #e0e0e0; border-radius: 4px; }}
.markdown-content {{ background-color: #f9f9f9; padding: 1rem; border-radius: 4px; }}
.answer-section {{ margin-top: 1rem; padding-top: 1rem; border-top: 1px solid #eee; }}
</style>
</head>
<body>
<h3>{title}</h3>
{body}<script>
document.addEventListener("DOMContentLoaded", function () {{
  document.querySelectorAll("span.math").forEach(function (el) {{
    katex.render(el.textContent, el, {{
      displayMode: el.classList.contains("math-display"),
      throwOnError: false
    }});
  }});
}});
</script>
</body>
</html>
"#,
        title = title,
        katex = KATEX_VERSION,
        body = body,
    )
}
