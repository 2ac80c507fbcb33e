//! docview: a single-page markdown document viewer.
//!
//! The [`controller`] drives everything: it looks titles up in the
//! [`registry`], fetches text through a [`fetch`] source, renders it with
//! [`markdown`], keeps [`state`] and [`history`] in step, and writes the result
//! through a [`page::Surface`]. [`serve`] exposes it over HTTP.

pub mod controller;
pub mod fetch;
pub mod history;
pub mod location;
pub mod markdown;
pub mod page;
pub mod registry;
pub mod serve;
pub mod state;
pub mod web_assets;
