use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Error {
    pub error: String,
}

impl Error {
    pub fn new<T: ToString>(message: T) -> Self {
        Self {
            error: message.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new<T: ToString>(message: T) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

/// Response of the internal recording import endpoint.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ImportRecording {
    pub video_id: Uuid,
    pub message: String,
}
