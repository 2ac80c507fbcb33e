//! Document viewer controller.
//!
//! Ties the registry, a document source, an optional renderer, the viewer
//! state and the session history together, and pushes every state change out
//! through a [`Surface`].
//!
//! Public entry points:
//!
//! - [`Controller::load_document`]: open a document without touching history
//! - [`Controller::load_document_with_history`]: user-initiated open, pushes
//!   one `{view: document}` entry first
//! - [`Controller::close_document`]: close the viewer, pushes `{view: home}`
//!
//! History replay ([`Controller::back`], [`Controller::forward`],
//! [`Controller::navigate_to_hash`]) and the initial deep link re-enter the
//! same load/close paths without pushing entries.

use std::sync::Arc;

use crate::fetch::{DocumentSource, LoadError};
use crate::history::{History, HistoryState, NavEvent};
use crate::location::Location;
use crate::markdown::{self, Renderer};
use crate::page::{self, Surface};
use crate::registry::Registry;
use crate::state::{LoadTicket, ViewerState};

/// What happened to a finished load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The document was rendered into the content region.
    Rendered,
    /// The error panel was shown.
    Failed(LoadError),
    /// A newer load or a close superseded this one; nothing was written.
    Stale,
}

pub struct Controller<S, V> {
    registry: Arc<Registry>,
    source: S,
    renderer: Option<Renderer>,
    surface: V,
    state: ViewerState,
    history: History,
}

impl<S: DocumentSource, V: Surface> Controller<S, V> {
    /// Create a controller whose session starts at `location`.
    ///
    /// The first history entry is stamped with `{view: document}` when the
    /// location's fragment names a registered document and `{view: home}`
    /// otherwise, so returning to it later replays correctly.
    pub fn new(
        registry: Arc<Registry>,
        source: S,
        renderer: Option<Renderer>,
        surface: V,
        location: Location,
    ) -> Self {
        let mut history = History::new(location);
        let fragment = history.location().fragment();
        if registry.contains(&fragment) {
            history.replace_state(HistoryState::Document { file: fragment });
        } else {
            history.replace_state(HistoryState::Home);
        }
        let mut controller = Self {
            registry,
            source,
            renderer,
            surface,
            state: ViewerState::new(),
            history,
        };
        controller.present();
        controller
    }

    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn surface(&self) -> &V {
        &self.surface
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Path the viewer returns to when closed.
    pub fn home_path(&self) -> &str {
        &self.history.location().path
    }

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    /// Open `file`: show the viewer with its title and the loading
    /// placeholder, fetch, then render the text or the error panel.
    ///
    /// Unregistered filenames are still fetched; their raw name is the title.
    pub async fn load_document(&mut self, file: &str) -> LoadOutcome {
        let ticket = self.begin_load(file);
        let result = self.source.fetch(file).await;
        self.finish_load(&ticket, result)
    }

    /// First half of [`load_document`](Self::load_document): everything up to
    /// the fetch.
    pub fn begin_load(&mut self, file: &str) -> LoadTicket {
        let title = self.registry.title_or_file(file).to_owned();
        let ticket = self.state.begin_load(file, &title);
        eprintln!("[load] file={file} generation={}", ticket.generation());
        self.present();
        self.surface.scroll_to_top();
        ticket
    }

    /// Second half of [`load_document`](Self::load_document): turn the fetch
    /// result into content and commit it if `ticket` is still current.
    pub fn finish_load(
        &mut self,
        ticket: &LoadTicket,
        result: Result<String, LoadError>,
    ) -> LoadOutcome {
        if !self.state.is_current(ticket) {
            eprintln!(
                "[load] file={} stale generation={} current={}",
                ticket.file,
                ticket.generation(),
                self.state.generation()
            );
            return LoadOutcome::Stale;
        }

        let (content, outcome) = match result {
            Ok(text) => (markdown::to_html(self.renderer, &text), LoadOutcome::Rendered),
            Err(e) => {
                eprintln!("[load] file={} error=\"{e}\"", ticket.file);
                let panel = page::error_panel(&e.to_string(), self.home_path());
                (panel, LoadOutcome::Failed(e))
            }
        };

        self.state.finish_load(ticket, content);
        self.present();
        outcome
    }

    /// Push a `{view: document}` entry at `#file`, then load it.
    pub async fn load_document_with_history(&mut self, file: &str) -> LoadOutcome {
        let location = self.history.location().with_hash(file);
        self.history.push_state(
            HistoryState::Document {
                file: file.to_owned(),
            },
            location,
        );
        self.load_document(file).await
    }

    // -----------------------------------------------------------------------
    // Closing
    // -----------------------------------------------------------------------

    /// Hide the viewer, clear its content and push a `{view: home}` entry at
    /// the current path without fragment.
    pub fn close_document(&mut self) {
        self.apply_close();
        let location = self.history.location().without_hash();
        self.history.push_state(HistoryState::Home, location);
    }

    fn apply_close(&mut self) {
        self.state.close();
        eprintln!("[close] generation={}", self.state.generation());
        self.present();
    }

    // -----------------------------------------------------------------------
    // Navigation reactions
    // -----------------------------------------------------------------------

    /// A history move restored `state`. Home closes the viewer without adding
    /// an entry; document states are left to the accompanying fragment change.
    pub fn handle_popstate(&mut self, state: Option<&HistoryState>) {
        if let Some(HistoryState::Home) = state {
            self.apply_close();
        }
    }

    /// The fragment changed to `fragment`. Registered documents are loaded
    /// without adding an entry.
    pub async fn handle_hashchange(&mut self, fragment: &str) -> Option<LoadOutcome> {
        if !self.registry.contains(fragment) {
            return None;
        }
        Some(self.load_document(fragment).await)
    }

    /// Deep link: open the document named by the starting fragment, if any.
    pub async fn handle_initial_load(&mut self) -> Option<LoadOutcome> {
        let fragment = self.history.location().fragment();
        self.handle_hashchange(&fragment).await
    }

    /// Browser back button.
    pub async fn back(&mut self) -> Option<LoadOutcome> {
        let events = self.history.back();
        self.dispatch(events).await
    }

    /// Browser forward button.
    pub async fn forward(&mut self) -> Option<LoadOutcome> {
        let events = self.history.forward();
        self.dispatch(events).await
    }

    /// The user edited the fragment directly.
    pub async fn navigate_to_hash(&mut self, hash: &str) -> Option<LoadOutcome> {
        let events = self.history.navigate_to_hash(hash);
        self.dispatch(events).await
    }

    /// Run navigation events in order; returns the outcome of the last load
    /// they triggered.
    async fn dispatch(&mut self, events: Vec<NavEvent>) -> Option<LoadOutcome> {
        let mut outcome = None;
        for event in events {
            match event {
                NavEvent::PopState(state) => self.handle_popstate(state.as_ref()),
                NavEvent::HashChange { new_hash, .. } => {
                    let fragment = Location::new("/", &new_hash).fragment();
                    if let Some(o) = self.handle_hashchange(&fragment).await {
                        outcome = Some(o);
                    }
                }
            }
        }
        outcome
    }

    /// Mirror the viewer state onto the surface.
    fn present(&mut self) {
        self.surface.set_hidden(!self.state.visible);
        self.surface.set_title(&self.state.title);
        self.surface.set_content_html(&self.state.content);
    }
}
