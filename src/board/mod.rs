//! Guestbook data model and view-models.
//!
//! This module contains the value types for messages and replies as the REST API
//! delivers them, the sort mode and pagination metadata shared by the list view,
//! and the two view-models built on top of them.
//!
//! Key re-exports:
//! - [`MessageListModel`] - filter, sort and paginate the fetched message set
//! - [`ReplyTree`] - nested reply forest rebuilt from parent pointers
//! - [`ComposeState`] - reply composition state machine

mod compose;
mod list;
mod replies;

pub use compose::{ComposeState, MessageDraft, ReplyDraft, ReplyTarget};
pub use list::{MessageListModel, PageView};
pub use replies::{build_tree, FlatReply, ReplyNode, ReplyTree};

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::config::{PAGINATION_EDGE_PAGES, PAGINATION_WINDOW};

/// Opaque identifier assigned by the API.
///
/// The server sends integers today, but nothing on the client depends on that,
/// so both JSON numbers and strings are accepted and kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id(String);

impl Id {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for Id {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for Id {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl FromStr for Id {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err("identifier must not be empty".to_string());
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Int(i64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Int(n) => Id(n.to_string()),
            RawId::Text(s) => Id(s),
        })
    }
}

/// Serde helpers for API timestamps ("YYYY-MM-DD HH:MM:SS", RFC 3339 accepted on input).
pub(crate) mod timestamp {
    use chrono::{DateTime, NaiveDateTime};
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::config::API_TIMESTAMP_FORMAT;

    pub fn parse(value: &str) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(value, API_TIMESTAMP_FORMAT)
            .ok()
            .or_else(|| DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.naive_utc()))
    }

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.format(API_TIMESTAMP_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {:?}", raw)))
    }
}

/// A top-level guestbook post. Read-only once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "MessagePayload")]
pub struct Message {
    pub id: Id,
    pub name: String,
    pub email: String,
    pub content: String,
    #[serde(serialize_with = "timestamp::serialize")]
    pub created_at: NaiveDateTime,
    /// Image attachment references (server-relative paths)
    pub images: Vec<String>,
    pub video: Option<String>,
    /// Generic file attachment references
    pub files: Vec<String>,
}

impl Message {
    /// Case-insensitive substring match over name, content and email.
    /// `needle` must already be lowercase.
    pub(crate) fn matches(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle)
            || self.content.to_lowercase().contains(needle)
            || self.email.to_lowercase().contains(needle)
    }
}

/// Wire shape of a message; older servers only send the single `image_path`.
#[derive(Deserialize)]
struct MessagePayload {
    id: Id,
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    content: String,
    #[serde(with = "timestamp")]
    created_at: NaiveDateTime,
    #[serde(default)]
    image_paths: Vec<String>,
    #[serde(default)]
    image_path: Option<String>,
    #[serde(default)]
    video_path: Option<String>,
    #[serde(default)]
    file_paths: Vec<String>,
}

impl From<MessagePayload> for Message {
    fn from(raw: MessagePayload) -> Self {
        let mut images = raw.image_paths;
        if images.is_empty() {
            images.extend(raw.image_path.filter(|p| !p.trim().is_empty()));
        }

        Self {
            id: raw.id,
            name: raw.name,
            email: raw.email,
            content: raw.content,
            created_at: raw.created_at,
            images,
            video: raw.video_path.filter(|p| !p.trim().is_empty()),
            files: raw.file_paths,
        }
    }
}

/// A comment on a message or on another reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    pub id: Id,
    /// Absent for replies attached directly to the message
    pub parent_id: Option<Id>,
    pub name: String,
    pub email: String,
    pub content: String,
    #[serde(serialize_with = "timestamp::serialize")]
    pub created_at: NaiveDateTime,
    pub image: Option<String>,
    pub video: Option<String>,
}

/// Ordering applied to the filtered message set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortMode {
    #[default]
    NewestFirst,
    OldestFirst,
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortMode::NewestFirst => write!(f, "newest-first"),
            SortMode::OldestFirst => write!(f, "oldest-first"),
        }
    }
}

impl FromStr for SortMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "newest" | "newest-first" | "new" => Ok(SortMode::NewestFirst),
            "oldest" | "oldest-first" | "old" => Ok(SortMode::OldestFirst),
            other => Err(format!("unknown sort mode {:?} (expected newest or oldest)", other)),
        }
    }
}

/// One entry in the page-button row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageLink {
    Page { number: usize, current: bool },
    /// Stands in for a run of hidden pages
    Gap,
}

/// Pagination state for the message list view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaginationInfo {
    pub current_page: usize,
    pub total_pages: usize,
    /// Messages in the full fetched set
    pub total_count: usize,
    /// Messages left after the search filter
    pub filtered_count: usize,
    pub items_per_page: usize,
    pub has_prev: bool,
    pub has_next: bool,
    /// Page-button layout; empty when everything fits on one page
    pub links: Vec<PageLink>,
}

impl PaginationInfo {
    pub fn new(
        current_page: usize,
        filtered_count: usize,
        total_count: usize,
        items_per_page: usize,
    ) -> Self {
        let total_pages = total_pages(filtered_count, items_per_page);
        let links = Self::compute_links(current_page, total_pages);

        Self {
            current_page,
            total_pages,
            total_count,
            filtered_count,
            items_per_page,
            has_prev: current_page > 1,
            has_next: current_page < total_pages,
            links,
        }
    }

    /// First and last few pages plus a window around the current page;
    /// each hidden run collapses into a single gap.
    fn compute_links(current: usize, total: usize) -> Vec<PageLink> {
        if total <= 1 {
            return Vec::new();
        }

        let mut links = Vec::new();
        let mut in_gap = false;
        for page in 1..=total {
            let visible = page <= PAGINATION_EDGE_PAGES
                || page + PAGINATION_EDGE_PAGES > total
                || page.abs_diff(current) <= PAGINATION_WINDOW;

            if visible {
                links.push(PageLink::Page {
                    number: page,
                    current: page == current,
                });
                in_gap = false;
            } else if !in_gap {
                links.push(PageLink::Gap);
                in_gap = true;
            }
        }
        links
    }
}

/// Number of pages needed for `count` items; never less than one.
pub fn total_pages(count: usize, per_page: usize) -> usize {
    if count == 0 || per_page == 0 {
        1
    } else {
        count.div_ceil(per_page)
    }
}
