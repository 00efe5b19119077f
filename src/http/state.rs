use crate::service::LiveService;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub service: LiveService,
}

impl AppState {
    pub fn new(service: LiveService) -> Self {
        Self { service }
    }
}
