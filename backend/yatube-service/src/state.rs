use std::sync::Arc;

use crate::cache::PageCache;
use crate::config::Config;
use crate::db::Repository;
use crate::templates::Templates;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repository>,
    pub cache: Arc<dyn PageCache>,
    pub templates: Arc<Templates>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        repo: Arc<dyn Repository>,
        cache: Arc<dyn PageCache>,
        templates: Templates,
        config: Config,
    ) -> Self {
        Self {
            repo,
            cache,
            templates: Arc::new(templates),
            config: Arc::new(config),
        }
    }
}
