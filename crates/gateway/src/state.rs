use std::sync::Arc;

use {omnidesk_registry::LinkRegistry, omnidesk_zalo::ZaloService};

/// Shared state for the HTTP routes.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<LinkRegistry>,
    pub zalo: Arc<ZaloService>,
}
