//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A create DTO for inserts
//!
//! Vector columns never appear on entity structs; create DTOs carry raw
//! `Vec<f32>` values that repositories cast to pgvector in SQL.

pub mod face_profile;
pub mod job;
pub mod queue_task;
pub mod scene;
pub mod user;
pub mod video;
