//! Kilnflow Docker Daemon Access
//!
//! This crate talks to the Docker daemon over its local IPC channel
//! (Unix domain socket or Windows named pipe) instead of a TCP socket.
//! It provides the pooled IPC transport, the log stream handle for
//! long-running build/pull/push operations, and the REST facade.

pub mod client;
pub mod error;
pub mod host;
pub mod models;
pub mod stream;
pub mod transport;

pub use client::{BuildImageOptions, DockerClient};
pub use error::{DockerError, Result};
pub use host::DaemonAddress;
pub use stream::{LogHandle, LogStream};
pub use transport::{Transport, TransportBuilder};
