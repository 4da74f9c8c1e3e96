//! Fedvid federation layer
//!
//! Outbound delivery of video events to peer pods. Structural events
//! (add/update) are delivered synchronously inside the caller's mutation
//! transaction and must reach every configured peer; counter deltas and
//! view events are fire-and-forget.

pub mod broadcaster;
pub mod registry;
pub mod transport;

pub use broadcaster::FederationBroadcaster;
pub use registry::{PeerAddress, PeerRegistry, StaticPeerRegistry};
pub use transport::{FederationError, HttpPeerTransport, PeerTransport};
