use runq_core::Config;
use runq_queue::RunScheduler;

/// Shared application state handed to every handler.
pub struct AppState {
    pub scheduler: RunScheduler,
    pub config: Config,
}
