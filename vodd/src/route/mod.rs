use std::sync::Arc;

use db::{RecordingRepo, VideoRepo};
use storage::AnyStore;

use crate::config::Config;

pub mod import;
pub mod video;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub videos: VideoRepo,
    pub recordings: RecordingRepo,
    pub videos_store: Arc<AnyStore>,
}
