/// All entity identifiers are UUIDs, assigned locally (v4).
pub type Id = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
