pub mod container;
pub mod network;
pub mod volume;

pub use container::{Container, PortBinding};
pub use network::NetworkCreateConfig;
pub use volume::RunVolumeConfiguration;
