// Application state module
// Immutable state shared by every connection once the server is running

use super::types::Config;
use crate::handler::Router;

/// Application state
///
/// Built once during bootstrap after the store has been opened; never
/// mutated afterwards, so connections share it through an `Arc` without
/// locking.
pub struct AppState {
    pub config: Config,
    pub router: Router,
}

impl AppState {
    pub const fn new(config: Config, router: Router) -> Self {
        Self { config, router }
    }
}
