//! Markdown → HTML conversion.
//!
//! The viewer never parses markdown itself; it hands the fetched text to one
//! of two renderer crates. When no renderer is configured the text is shown
//! as escaped preformatted text instead.

use clap::ValueEnum;
use comrak::{format_html, parse_document, Arena, Options};
use pulldown_cmark::{html, Event, Parser};

/// Renderer selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum RendererChoice {
    #[default]
    Comrak,
    Pulldown,
    /// No renderer: documents are displayed as escaped `<pre>` text.
    None,
}

impl RendererChoice {
    pub fn renderer(self) -> Option<Renderer> {
        match self {
            RendererChoice::Comrak => Some(Renderer::Comrak),
            RendererChoice::Pulldown => Some(Renderer::Pulldown),
            RendererChoice::None => None,
        }
    }
}

/// An available markdown renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Renderer {
    Comrak,
    Pulldown,
}

impl Renderer {
    /// Convert markdown to an HTML fragment.
    ///
    /// Both renderers use GFM tables, strikethrough and task lists, turn single
    /// newlines into `<br />`, and never pass raw HTML from the source through.
    pub fn render(self, markdown: &str) -> Result<String, String> {
        match self {
            Renderer::Comrak => render_comrak(markdown),
            Renderer::Pulldown => Ok(render_pulldown(markdown)),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Renderer::Comrak => "comrak",
            Renderer::Pulldown => "pulldown-cmark",
        }
    }
}

/// Render with `renderer`, or fall back to [`preformatted`] when there is no
/// renderer or it fails.
pub fn to_html(renderer: Option<Renderer>, markdown: &str) -> String {
    let Some(renderer) = renderer else {
        return preformatted(markdown);
    };
    match renderer.render(markdown) {
        Ok(html) => html,
        Err(e) => {
            eprintln!("[render] renderer={} error={e} fallback=pre", renderer.name());
            preformatted(markdown)
        }
    }
}

/// Build comrak options with GFM extensions, hard breaks and heading ids.
///
/// `render.unsafe_` stays `false`: raw HTML in the input is replaced with
/// `<!-- raw HTML omitted -->`.
fn make_options() -> Options<'static> {
    let mut options = Options::default();
    options.extension.strikethrough = true;
    options.extension.table = true;
    options.extension.autolink = true;
    options.extension.tasklist = true;
    options.extension.header_ids = Some(String::new());
    options.render.hardbreaks = true;
    options.render.unsafe_ = false;
    options
}

fn render_comrak(markdown: &str) -> Result<String, String> {
    let arena = Arena::new();
    let options = make_options();
    let root = parse_document(&arena, markdown, &options);

    let mut html_bytes = Vec::new();
    format_html(root, &options, &mut html_bytes).map_err(|e| e.to_string())?;
    String::from_utf8(html_bytes).map_err(|e| e.to_string())
}

fn render_pulldown(markdown: &str) -> String {
    let mut options = pulldown_cmark::Options::empty();
    options.insert(pulldown_cmark::Options::ENABLE_TABLES);
    options.insert(pulldown_cmark::Options::ENABLE_STRIKETHROUGH);
    options.insert(pulldown_cmark::Options::ENABLE_TASKLISTS);

    let events = Parser::new_ext(markdown, options).map(|event| match event {
        Event::SoftBreak => Event::HardBreak,
        // Text events are escaped by the HTML writer.
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, events);
    out
}

/// Minimal HTML entity escaping for text content and attribute values.
pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
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

/// The text as escaped preformatted HTML.
pub fn preformatted(text: &str) -> String {
    format!("<pre>{}</pre>", html_escape(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comrak(input: &str) -> String {
        Renderer::Comrak.render(input).unwrap()
    }

    fn pulldown(input: &str) -> String {
        Renderer::Pulldown.render(input).unwrap()
    }

    #[test]
    fn paragraph_renders() {
        assert_eq!(comrak("hello world\n"), "<p>hello world</p>\n");
        assert_eq!(pulldown("hello world\n"), "<p>hello world</p>\n");
    }

    #[test]
    fn single_newline_becomes_line_break() {
        assert!(comrak("one\ntwo\n").contains("<br />"));
        assert!(pulldown("one\ntwo\n").contains("<br />"));
    }

    #[test]
    fn headings_get_ids() {
        let html = comrak("# Project Velocity\n");
        assert!(html.contains("<h1>"), "got {html}");
        assert!(html.contains("id=\"project-velocity\""), "got {html}");
    }

    #[test]
    fn gfm_table_renders() {
        let input = "| A | B |\n|---|---|\n| 1 | 2 |\n";
        assert!(comrak(input).contains("<table>"));
        assert!(pulldown(input).contains("<table>"));
    }

    #[test]
    fn task_list_renders() {
        let input = "- [ ] todo\n- [x] done\n";
        for html in [comrak(input), pulldown(input)] {
            assert!(html.contains("<input"), "got {html}");
            assert!(html.contains("checkbox"), "got {html}");
        }
    }

    #[test]
    fn strikethrough_renders() {
        assert!(comrak("~~gone~~\n").contains("<del>gone</del>"));
        assert!(pulldown("~~gone~~\n").contains("<del>gone</del>"));
    }

    #[test]
    fn autolink_renders() {
        let html = comrak("see https://example.com\n");
        assert!(html.contains("<a href=\"https://example.com\">"), "got {html}");
    }

    #[test]
    fn script_tag_not_passed_through() {
        let input = "<script>alert(1)</script>\n";
        assert!(!comrak(input).contains("<script>"));
        let html = pulldown(input);
        assert!(!html.contains("<script>"), "got {html}");
        assert!(html.contains("&lt;script&gt;"), "got {html}");
    }

    #[test]
    fn missing_renderer_falls_back_to_escaped_pre() {
        assert_eq!(
            to_html(None, "# a < b & c\n"),
            "<pre># a &lt; b &amp; c\n</pre>"
        );
    }

    #[test]
    fn to_html_uses_renderer_output() {
        let input = "*hi*\n";
        assert_eq!(to_html(Some(Renderer::Comrak), input), comrak(input));
    }

    #[test]
    fn renderer_choice_maps_to_renderer() {
        assert_eq!(RendererChoice::default().renderer(), Some(Renderer::Comrak));
        assert_eq!(RendererChoice::Pulldown.renderer(), Some(Renderer::Pulldown));
        assert_eq!(RendererChoice::None.renderer(), None);
    }

    #[test]
    fn html_escape_handles_special_chars() {
        assert_eq!(
            html_escape(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;"
        );
    }
}
