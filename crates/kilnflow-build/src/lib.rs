//! Kilnflow Image Build
//!
//! This crate assembles the build context archive sent to the daemon's
//! build endpoint and orchestrates image build/push on top of
//! `kilnflow-docker` and `kilnflow-registry`.

pub mod config;
pub mod context;
pub mod dirs;
pub mod error;
pub mod naming;
pub mod resolver;
pub mod service;

pub use config::BuildConfig;
pub use context::ContextBuilder;
pub use dirs::BuildDirs;
pub use error::{BuildError, Result};
pub use naming::{extract_registry, resolve_tag, split_image_tag, validate_tag};
pub use resolver::BuildResolver;
pub use service::BuildService;
