use std::sync::Arc;

use db::RecordingRepo;

use crate::monitor::Monitor;

pub mod recording;
pub mod webhook;

#[derive(Clone)]
pub struct AppState {
    pub monitor: Arc<Monitor>,
    pub recordings: RecordingRepo,
}
