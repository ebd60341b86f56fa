use std::time::{SystemTime, UNIX_EPOCH};

/// Tag of the mutable record that always holds the most recent save.
pub const LATEST: &str = "latest";

/// Default tag for a save: nanoseconds since the UNIX epoch, in decimal.
pub fn timestamp_tag() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
        .to_string()
}

/// A random v4 UUID rendered in its hyphenated form.
pub fn generate_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}
