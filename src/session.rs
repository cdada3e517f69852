//! Hand-off of the selected message between the list and detail views.

use crate::board::Id;

/// One-shot slot carrying the message id the user picked in the list view.
/// The detail view consumes it on entry.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    selected: Option<Id>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember the message to open; replaces any earlier selection.
    pub fn select(&mut self, id: Id) {
        tracing::debug!(message_id = %id, "Message selected");
        self.selected = Some(id);
    }

    /// Take the selection, leaving the slot empty.
    pub fn take(&mut self) -> Option<Id> {
        self.selected.take()
    }

    pub fn peek(&self) -> Option<&Id> {
        self.selected.as_ref()
    }
}
