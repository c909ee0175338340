//! Kilnflow Core Domain Model
//!
//! This crate provides the shared domain model for Kilnflow:
//! container snapshots, port bindings, network/volume configuration,
//! and the progress event model for streaming daemon operations.

pub mod model;
pub mod progress;

pub use model::container::{Container, PortBinding};
pub use model::network::NetworkCreateConfig;
pub use model::volume::RunVolumeConfiguration;
pub use progress::ProgressEvent;
