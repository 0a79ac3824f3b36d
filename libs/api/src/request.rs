use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CreateStream {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UpdateStream {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// Internal import request: promote a completed recording to a VOD asset.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ImportRecording {
    pub recording_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub visibility: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct UpdateVideo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub visibility: Option<String>,
}

/// Pagination query shared by the listing endpoints.
#[derive(Serialize, Deserialize, Clone, Copy, Debug)]
pub struct Page {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            offset: 0,
        }
    }
}

impl Page {
    /// Clamps the limit to the maximum page size.
    pub fn clamped(self) -> Self {
        Self {
            limit: self.limit.clamp(1, 100),
            offset: self.offset.max(0),
        }
    }
}

fn default_limit() -> i64 {
    20
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_clamps_limit_and_offset() {
        let page = Page {
            limit: 5000,
            offset: -3,
        }
        .clamped();
        assert_eq!(page.limit, 100);
        assert_eq!(page.offset, 0);

        let page = Page::default().clamped();
        assert_eq!(page.limit, 20);
    }
}
