//! Detection service integration.
//!
//! The pipeline only knows the [`DetectionService`] trait: one encoded tile
//! in, one encoded image of the same size out. [`HttpDetector`] implements it
//! against the multipart `/detect` endpoint of the inference server.

pub(crate) mod http;
pub(crate) mod service;

pub use http::{HealthStatus, HttpDetector};
pub use service::{DetectionService, TileRequest};
