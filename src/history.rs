//! Session history: a stack of viewer locations with an optional state object
//! per entry and a cursor, modelled on the browser's history API.
//!
//! ```text
//! push_state ──► truncate forward entries, append, cursor = last
//! back/forward ──► move cursor, emit PopState (+ HashChange if fragment differs)
//! navigate_to_hash ──► append stateless entry, emit HashChange
//! ```
//!
//! `push_state` and `replace_state` never emit events; only moves and fragment
//! edits do, in the order a browser fires them.

use serde::{Deserialize, Serialize};

use crate::location::Location;

/// State object stored on a history entry.
///
/// Serialises as `{"view":"home"}` or `{"view":"document","file":"DMS.md"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "view", rename_all = "lowercase")]
pub enum HistoryState {
    Home,
    Document { file: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// `None` for entries created by fragment navigation or the initial load.
    pub state: Option<HistoryState>,
    pub location: Location,
}

/// Navigation event produced by moving through the history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavEvent {
    PopState(Option<HistoryState>),
    HashChange { old_hash: String, new_hash: String },
}

#[derive(Debug, Clone)]
pub struct History {
    entries: Vec<HistoryEntry>,
    index: usize,
}

impl History {
    pub fn new(initial: Location) -> Self {
        Self {
            entries: vec![HistoryEntry {
                state: None,
                location: initial,
            }],
            index: 0,
        }
    }

    pub fn current(&self) -> &HistoryEntry {
        &self.entries[self.index]
    }

    pub fn location(&self) -> &Location {
        &self.current().location
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Append an entry after the cursor, discarding any forward entries.
    pub fn push_state(&mut self, state: HistoryState, location: Location) {
        eprintln!("[history] push state={} url={location}", describe(&state));
        self.push_entry(HistoryEntry {
            state: Some(state),
            location,
        });
    }

    /// Overwrite the state of the current entry.
    pub fn replace_state(&mut self, state: HistoryState) {
        self.entries[self.index].state = Some(state);
    }

    /// Change only the fragment, as typing a new `#...` into the address bar
    /// does. A no-op when the fragment is unchanged.
    pub fn navigate_to_hash(&mut self, hash: &str) -> Vec<NavEvent> {
        let old = self.location().clone();
        let new = old.with_hash(hash);
        if new.hash == old.hash {
            return Vec::new();
        }
        self.push_entry(HistoryEntry {
            state: None,
            location: new.clone(),
        });
        vec![NavEvent::HashChange {
            old_hash: old.hash,
            new_hash: new.hash,
        }]
    }

    pub fn back(&mut self) -> Vec<NavEvent> {
        self.go(-1)
    }

    pub fn forward(&mut self) -> Vec<NavEvent> {
        self.go(1)
    }

    /// Move the cursor by `delta` entries. Out-of-range moves do nothing.
    pub fn go(&mut self, delta: isize) -> Vec<NavEvent> {
        let Some(target) = self.index.checked_add_signed(delta) else {
            return Vec::new();
        };
        if delta == 0 || target >= self.entries.len() {
            return Vec::new();
        }
        let old_hash = self.location().hash.clone();
        self.index = target;
        let entry = self.current();
        let mut events = vec![NavEvent::PopState(entry.state.clone())];
        if entry.location.hash != old_hash {
            events.push(NavEvent::HashChange {
                old_hash,
                new_hash: entry.location.hash.clone(),
            });
        }
        events
    }

    fn push_entry(&mut self, entry: HistoryEntry) {
        self.entries.truncate(self.index + 1);
        self.entries.push(entry);
        self.index = self.entries.len() - 1;
    }
}

fn describe(state: &HistoryState) -> String {
    match state {
        HistoryState::Home => "home".to_owned(),
        HistoryState::Document { file } => format!("document file={file}"),
    }
}
