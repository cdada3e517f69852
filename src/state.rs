//! Shared application state for the controller and the CLI commands.

use std::sync::Arc;
use tera::Tera;

use crate::api::GuestbookApi;
use crate::config::AppConfig;

/// Shared application state, cloneable via Arc-wrapped fields.
///
/// Contains the application configuration, Tera template engine, and the
/// API client used to reach the guestbook server.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub tera: Arc<Tera>,
    pub api: Arc<dyn GuestbookApi>,
}

impl AppState {
    pub fn new(config: AppConfig, tera: Tera, api: Arc<dyn GuestbookApi>) -> Self {
        Self {
            config: Arc::new(config),
            tera: Arc::new(tera),
            api,
        }
    }
}
