//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` (or `&mut PgConnection` for statements that must
//! join an open transaction) as the first argument.

pub mod face_profile_repo;
pub mod job_repo;
pub mod queue_repo;
pub mod scene_repo;
pub mod user_repo;
pub mod video_repo;

pub use face_profile_repo::FaceProfileRepo;
pub use job_repo::JobRepo;
pub use queue_repo::QueueRepo;
pub use scene_repo::SceneRepo;
pub use user_repo::UserRepo;
pub use video_repo::VideoRepo;
