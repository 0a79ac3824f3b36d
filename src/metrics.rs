use lazy_static::lazy_static;
use prometheus::{Counter, Gauge, Registry, TextEncoder};

lazy_static! {
    pub static ref SESSION: Gauge = Gauge::new("session", "active ingest sessions").unwrap();
    pub static ref SEGMENT: Counter =
        Counter::new("segment_uploads", "segments uploaded to the live bucket").unwrap();
    pub static ref REGISTRY: Registry =
        Registry::new_custom(Some("streamd".to_string()), None).unwrap();
    pub static ref ENCODER: TextEncoder = TextEncoder::new();
}
