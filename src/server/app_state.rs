use std::sync::Arc;

use crate::{configs::Config, control::ControlSurface};

/// Top-level application state shared by every HTTP handler.
pub struct AppState {
    pub config: Config,
    pub control: Arc<ControlSurface>,
}

impl AppState {
    pub fn new(config: Config, control: Arc<ControlSurface>) -> Arc<Self> {
        Arc::new(Self { config, control })
    }
}
