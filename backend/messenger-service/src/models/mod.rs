pub mod contact;
pub mod message;
pub mod user;

pub use contact::RelationshipKind;
pub use message::{HistoryCursor, HistoryDirection, HistoryPage, HistoryQuery, Message, MessageView};
pub use user::{PublicUser, User};
