//! Kilnflow Registry Authentication
//!
//! This crate resolves per-registry credentials and produces the
//! `X-Registry-Auth` header value the Docker daemon expects. Handlers are
//! composed statically at startup; no dynamic discovery is involved.

pub mod authconfig;
pub mod config_file;
pub mod error;
pub mod handler;
pub mod resolver;

pub use authconfig::AuthConfig;
pub use config_file::{ConfigFileAuthHandler, CredentialHelperExtender};
pub use error::{AuthError, Result};
pub use handler::{AuthExtender, AuthHandler, InlineAuthHandler, RegistryAuthKind, SecretDecryptor};
pub use resolver::AuthResolver;
