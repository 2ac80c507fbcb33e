//! View regions and the HTML page that hosts them.
//!
//! The viewer is three addressable regions inside a page:
//!
//! - `document-viewer`: the container, hidden via the `hidden` class
//! - `document-title`: plain text
//! - `document-content`: an HTML fragment
//!
//! [`Surface`] is the adapter the controller writes through. [`PageSurface`]
//! keeps the regions in memory so the serve and open commands can turn them
//! into a complete document with [`build_page_shell`].

use crate::location::percent_encode_component;
use crate::markdown::html_escape;
use crate::registry::Registry;

/// Element id of the viewer container.
pub const VIEWER_ID: &str = "document-viewer";
/// Element id of the content region.
pub const CONTENT_ID: &str = "document-content";
/// Element id of the title region.
pub const TITLE_ID: &str = "document-title";
/// Presentation class that hides the viewer container.
pub const HIDDEN_CLASS: &str = "hidden";

/// Write access to the viewer regions.
pub trait Surface {
    fn set_hidden(&mut self, hidden: bool);
    /// Replace the title region with plain text.
    fn set_title(&mut self, text: &str);
    /// Replace the content region with an HTML fragment.
    fn set_content_html(&mut self, html: &str);
    fn scroll_to_top(&mut self);
}

/// In-memory viewer regions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSurface {
    pub hidden: bool,
    pub title: String,
    pub content_html: String,
    /// Vertical scroll offset of the page; reset by [`Surface::scroll_to_top`].
    pub scroll_y: u32,
}

impl Default for PageSurface {
    fn default() -> Self {
        Self {
            hidden: true,
            title: String::new(),
            content_html: String::new(),
            scroll_y: 0,
        }
    }
}

impl Surface for PageSurface {
    fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    fn set_title(&mut self, text: &str) {
        self.title = text.to_owned();
    }

    fn set_content_html(&mut self, html: &str) {
        self.content_html = html.to_owned();
    }

    fn scroll_to_top(&mut self) {
        self.scroll_y = 0;
    }
}

/// Content shown while a document is being fetched.
pub fn loading_placeholder() -> String {
    "<div class=\"viewer-status\">Loading...</div>".to_owned()
}

/// Centered error panel with the failure message and a "Go Back" button.
///
/// The button submits a `GET` form to `home_path`, which lands on the closed
/// viewer without any script.
pub fn error_panel(message: &str, home_path: &str) -> String {
    format!(
        "<div class=\"viewer-status viewer-error\">\n\
<h3>Error loading document</h3>\n\
<p>{message}</p>\n\
<form method=\"get\" action=\"{action}\">\n\
<button type=\"submit\" class=\"viewer-close\" data-action=\"close\">Go Back</button>\n\
</form>\n\
</div>\n",
        message = html_escape(message),
        action = html_escape(home_path),
    )
}

/// Link that deep-links `file` on the viewer page at `home_path`.
pub fn document_href(home_path: &str, file: &str) -> String {
    format!("{home_path}?doc={}", percent_encode_component(file))
}

/// Build the `<ul>` of registered documents for the navigation sidebar.
fn build_nav_html(registry: &Registry, home_path: &str) -> String {
    let mut html = String::from("<ul class=\"doc-list\">\n");
    for entry in registry.iter() {
        html.push_str(&format!(
            "<li><a href=\"{href}\" data-file=\"{file}\">{title}</a></li>\n",
            href = html_escape(&document_href(home_path, &entry.file)),
            file = html_escape(&entry.file),
            title = html_escape(&entry.title),
        ));
    }
    html.push_str("</ul>\n");
    html
}

/// Build the full HTML page: navigation list plus the viewer regions as
/// currently held by `surface`.
pub fn build_page_shell(registry: &Registry, surface: &PageSurface, home_path: &str) -> String {
    let page_title = if surface.hidden || surface.title.is_empty() {
        "Documents".to_owned()
    } else {
        html_escape(&surface.title)
    };
    let viewer_class = if surface.hidden {
        format!("document-viewer {HIDDEN_CLASS}")
    } else {
        "document-viewer".to_owned()
    };
    let nav_html = build_nav_html(registry, home_path);
    let title_text = html_escape(&surface.title);
    let content_html = &surface.content_html;
    let home = html_escape(home_path);

    format!(
        "<!DOCTYPE html>\n\
<html lang=\"en\">\n\
<head>\n\
<meta charset=\"utf-8\">\n\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
<title>{page_title} · docview</title>\n\
<link rel=\"stylesheet\" href=\"/assets/docview.css\">\n\
</head>\n\
<body>\n\
<div class=\"layout\">\n\
<nav class=\"doc-sidebar\">\n\
<a class=\"home-link\" href=\"{home}\">Documents</a>\n\
{nav_html}</nav>\n\
<main class=\"content\">\n\
<section id=\"{VIEWER_ID}\" class=\"{viewer_class}\">\n\
<header class=\"viewer-header\">\n\
<h2 id=\"{TITLE_ID}\">{title_text}</h2>\n\
<form method=\"get\" action=\"{home}\"><button type=\"submit\" class=\"viewer-close\" aria-label=\"Close document\">&times;</button></form>\n\
</header>\n\
<article id=\"{CONTENT_ID}\" class=\"markdown-body\">{content_html}</article>\n\
</section>\n\
</main>\n\
</div>\n\
</body>\n\
</html>\n"
    )
}
