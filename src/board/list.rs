//! Message list view-model: filter, then sort, then paginate.
//!
//! The derived order is recomputed eagerly whenever the message set, the search
//! query or the sort mode changes, so reads never see stale data.

use serde::Serialize;

use crate::config::MESSAGES_PER_PAGE;

use super::{total_pages, Id, Message, PaginationInfo, SortMode};

/// Messages for the current page along with the pagination metadata.
#[derive(Debug, Clone, Serialize)]
pub struct PageView<'a> {
    pub messages: Vec<&'a Message>,
    pub pagination: PaginationInfo,
}

/// Holds the fetched messages and the user's search/sort/page selection.
#[derive(Debug, Clone)]
pub struct MessageListModel {
    messages: Vec<Message>,
    /// Search text as entered (trimmed)
    query: String,
    /// Lowercased query used for matching
    needle: String,
    sort: SortMode,
    /// 1-based
    current_page: usize,
    page_size: usize,
    /// Indices into `messages` after filtering and sorting
    view: Vec<usize>,
}

impl Default for MessageListModel {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageListModel {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            query: String::new(),
            needle: String::new(),
            sort: SortMode::default(),
            current_page: 1,
            page_size: MESSAGES_PER_PAGE,
            view: Vec::new(),
        }
    }

    /// Replace the whole working set. The filter resets to the full set; sort
    /// and page survive, with the page clamped if the new set is shorter.
    pub fn set_messages(&mut self, messages: Vec<Message>) {
        self.messages = messages;
        self.query.clear();
        self.needle.clear();
        self.recompute();
        self.clamp_page();
        tracing::debug!(
            total = self.messages.len(),
            filtered = self.view.len(),
            page = self.current_page,
            "Message set replaced"
        );
    }

    /// Filter by a case-insensitive substring of name, content or email.
    /// Blank queries match everything. Returns the filtered count.
    pub fn search(&mut self, query: &str) -> usize {
        self.query = query.trim().to_string();
        self.needle = self.query.to_lowercase();
        self.recompute();
        self.current_page = 1;
        tracing::debug!(query = %self.query, filtered = self.view.len(), "Search applied");
        self.view.len()
    }

    pub fn clear_search(&mut self) -> usize {
        self.search("")
    }

    pub fn set_sort(&mut self, mode: SortMode) {
        self.sort = mode;
        self.recompute();
        self.current_page = 1;
    }

    /// Move to page `n`. Out-of-range requests are rejected and leave the
    /// current page unchanged.
    pub fn goto_page(&mut self, n: usize) -> bool {
        let total = self.total_pages();
        if n < 1 || n > total {
            tracing::debug!(requested = n, total, "Page out of range");
            return false;
        }
        self.current_page = n;
        true
    }

    pub fn next_page(&mut self) -> bool {
        self.goto_page(self.current_page + 1)
    }

    pub fn prev_page(&mut self) -> bool {
        match self.current_page.checked_sub(1) {
            Some(n) => self.goto_page(n),
            None => false,
        }
    }

    pub fn page(&self) -> PageView<'_> {
        let start = (self.current_page - 1) * self.page_size;
        let end = (start + self.page_size).min(self.view.len());

        let messages = if start < self.view.len() {
            self.view[start..end]
                .iter()
                .map(|&i| &self.messages[i])
                .collect()
        } else {
            Vec::new()
        };

        PageView {
            messages,
            pagination: PaginationInfo::new(
                self.current_page,
                self.view.len(),
                self.messages.len(),
                self.page_size,
            ),
        }
    }

    /// Look up a message in the full set, ignoring the filter.
    pub fn find(&self, id: &Id) -> Option<&Message> {
        self.messages.iter().find(|m| &m.id == id)
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn sort(&self) -> SortMode {
        self.sort
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn total_pages(&self) -> usize {
        total_pages(self.view.len(), self.page_size)
    }

    pub fn total_count(&self) -> usize {
        self.messages.len()
    }

    pub fn filtered_count(&self) -> usize {
        self.view.len()
    }

    fn recompute(&mut self) {
        let messages = &self.messages;
        let needle = self.needle.as_str();

        let mut view: Vec<usize> = (0..messages.len())
            .filter(|&i| needle.is_empty() || messages[i].matches(needle))
            .collect();

        // sort_by is stable: equal timestamps keep their input order in both modes
        match self.sort {
            SortMode::NewestFirst => {
                view.sort_by(|&a, &b| messages[b].created_at.cmp(&messages[a].created_at))
            }
            SortMode::OldestFirst => {
                view.sort_by(|&a, &b| messages[a].created_at.cmp(&messages[b].created_at))
            }
        }

        self.view = view;
    }

    fn clamp_page(&mut self) {
        self.current_page = self.current_page.clamp(1, self.total_pages());
    }
}
