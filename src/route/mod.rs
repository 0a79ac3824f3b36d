use std::sync::Arc;

use db::StreamRepo;
use storage::AnyStore;

use crate::config::Config;
use crate::hook::StreamEventHook;

pub mod stream;
pub mod webhook;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub streams: StreamRepo,
    pub live_store: Arc<AnyStore>,
    pub stream_events: StreamEventHook,
}
