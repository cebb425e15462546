pub mod binder;
pub mod events;
pub mod registry;
pub mod session;

pub use binder::SessionBinder;
pub use events::{WsInboundEvent, WsOutboundEvent};
pub use registry::{ConnectionId, LiveConnection, PresenceRegistry, PushError};
pub use session::{ConnectionSession, ConnectionState};
