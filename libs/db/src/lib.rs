use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub mod model;
pub mod recording;
pub mod stream;
pub mod video;

pub use model::{Recording, Stream, Video};
pub use recording::RecordingRepo;
pub use stream::StreamRepo;
pub use video::VideoRepo;

/// Status and visibility vocabulary shared with the wire format.
pub mod status {
    pub mod stream {
        pub const OFFLINE: &str = "offline";
        pub const LIVE: &str = "live";
    }

    pub mod recording {
        pub const RECORDING: &str = "recording";
        pub const COMPLETED: &str = "completed";
        pub const FAILED: &str = "failed";
    }

    pub mod video {
        pub const PROCESSING: &str = "processing";
        pub const READY: &str = "ready";
        pub const FAILED: &str = "failed";
    }

    pub mod visibility {
        pub const PUBLIC: &str = "public";
        pub const PRIVATE: &str = "private";
        pub const UNLISTED: &str = "unlisted";
    }

    pub mod source {
        pub const RECORDING: &str = "recording";
        pub const UPLOAD: &str = "upload";
    }
}

/// Opens the shared metadata pool: 25 connections max, 5 kept idle,
/// 5 minute connection lifetime.
pub async fn connect(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(25)
        .min_connections(5)
        .max_lifetime(Duration::from_secs(300))
        .connect(database_url)
        .await
}

/// Applies the bundled schema. Production deployments manage the schema
/// externally; this is for development and test databases.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
