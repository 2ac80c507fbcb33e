//! Embedded static web assets for the viewer page.
//!
//! The stylesheet is compiled into the binary via `include_str!` so the
//! binary is fully self-contained; no external asset files need to be
//! distributed.

/// Stylesheet for the viewer page, including the `hidden` presentation class
/// that toggles the viewer container.
///
/// Loaded from `src/assets/docview.css` at compile time.
pub const CSS: &str = include_str!("assets/docview.css");
