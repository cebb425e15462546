pub mod auth;
pub mod contact_graph;
pub mod contact_store;
pub mod delivery;
pub mod memory;
pub mod message_store;
pub mod messaging;
pub mod presence;
pub mod user_directory;

pub use auth::{AuthService, IdentityProvider, SessionTokens};
pub use contact_graph::ContactGraph;
pub use delivery::{DeliveryReport, DeliveryRouter};
pub use messaging::ChatService;
pub use presence::PresenceBroadcaster;
