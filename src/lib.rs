//! Guestbook - a terminal client for guestbook message boards
//!
//! Fetches messages and replies from a guestbook REST API, shows them as a
//! searchable, sortable, paginated list and as nested reply trees, and posts
//! new messages and replies.

pub mod api;
pub mod board;
pub mod config;
pub mod controller;
pub mod error;
pub mod poller;
pub mod profile;
pub mod session;
pub mod state;
pub mod templates;

pub use error::*;
