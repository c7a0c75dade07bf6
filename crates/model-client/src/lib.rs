//! Client crate for the model inference service.
//!
//! [`protocol`] defines the wire DTOs (shared with the service itself, so
//! the two sides cannot drift) and [`client`] provides the HTTP client the
//! pipeline workers use, including the mandated retry/backoff behavior
//! when the service sheds load.

pub mod client;
pub mod protocol;

pub use client::{ModelClient, ModelClientError};
