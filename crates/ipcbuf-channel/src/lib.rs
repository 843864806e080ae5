//! Concrete IPC channels for the buffer probe.
//!
//! This crate turns a transport choice into open, non-blocking descriptors:
//! anonymous pipes, named FIFOs, socket pairs, and bound sockets in the
//! local, IPv4 and IPv6 domains. It also owns the OS-specific pieces around
//! them: capacity hints, queue-depth ioctls, buffer metrics and sysctl
//! tunables.

pub mod cleanup;
pub mod endpoint;
pub mod hints;
pub mod metrics;
pub mod peer;
pub mod platform;
pub mod provision;
pub mod transport;

pub use cleanup::PathGuard;
pub use endpoint::Endpoint;
pub use hints::CapacityHints;
pub use metrics::Metric;
pub use peer::{Acceptor, Role, StreamRendezvous};
pub use platform::{Platform, Queue, QueueControl};
pub use provision::{Channel, Provisioned, Provisioner};
pub use transport::{ChannelSpec, SocketDomain, SocketFlavor, SocketKind, TransportKind};
