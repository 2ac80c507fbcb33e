//! # Viewer state
//!
//! The explicit model behind the viewer region. Transitions here are pure:
//! they only touch the struct, and the controller forwards the result to a
//! [`Surface`](crate::page::Surface).
//!
//! ```text
//! ViewerState
//! ├── visible: bool       // viewer container shown
//! ├── title: String       // plain text for the title region
//! ├── content: String     // HTML for the content region
//! └── generation: u64     // bumped by every load start and close
//! ```
//!
//! A load is a two-step transition. `begin_load` hands out a [`LoadTicket`]
//! stamped with the new generation; `finish_load` commits only if no other
//! load or close has started since. Overlapping loads therefore resolve to the
//! most recently started one, whatever order their fetches complete in.

use crate::page;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewerState {
    pub visible: bool,
    pub title: String,
    pub content: String,
    generation: u64,
}

/// Proof that a load was started, checked when its result arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    pub file: String,
    generation: u64,
}

impl LoadTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl ViewerState {
    /// Hidden and empty.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Show the viewer with `title` and the loading placeholder.
    pub fn begin_load(&mut self, file: &str, title: &str) -> LoadTicket {
        self.generation += 1;
        self.visible = true;
        self.title = title.to_owned();
        self.content = page::loading_placeholder();
        LoadTicket {
            file: file.to_owned(),
            generation: self.generation,
        }
    }

    /// Commit `content` if `ticket` still belongs to the latest transition.
    pub fn finish_load(&mut self, ticket: &LoadTicket, content: String) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.content = content;
        true
    }

    pub fn is_current(&self, ticket: &LoadTicket) -> bool {
        ticket.generation == self.generation
    }

    /// Hide the viewer and drop its content. Pending loads become stale.
    pub fn close(&mut self) {
        self.generation += 1;
        self.visible = false;
        self.content.clear();
    }
}
