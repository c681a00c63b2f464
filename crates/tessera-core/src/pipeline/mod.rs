//! Job pipeline components.
//!
//! - **validate**: Pre-decode checks on source files
//! - **decode**: Load and decode source images
//! - **discovery**: Find source images in directories
//! - **state**: Job state machine and status channel
//! - **composite**: Reassemble processed tiles on a canvas
//! - **processor**: Orchestrates a full job

pub mod composite;
pub mod decode;
pub mod discovery;
pub mod processor;
pub mod state;
pub mod validate;

pub use composite::{composite, BACKGROUND};
pub use decode::{DecodedImage, ImageDecoder};
pub use discovery::{result_path_for, FileDiscovery};
pub use processor::{JobOptions, TilePipeline};
pub use state::{JobState, JobStatus, Progress, StatusTracker, CANCELLED};
pub use validate::Validator;
