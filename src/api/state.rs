use std::path::PathBuf;
use std::sync::Arc;

use crate::engine::Engine;
use crate::notify::NotifyHub;
use crate::pricing::PriceTable;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    /// Same hub the engine notifies through; handlers subscribe to it for live streams.
    pub hub: Arc<NotifyHub>,
    pub prices: Arc<PriceTable>,
    /// Where price updates are written back, if configured.
    pub prices_file: Option<PathBuf>,
}
