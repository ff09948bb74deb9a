pub mod actor;
pub mod api;
pub mod config;
pub mod error;
pub mod message_store;
pub mod push;
pub mod reactions;
pub mod read_tracker;
pub mod reply;
pub mod session;
pub mod synchronizer;
pub mod typing;
pub mod upload;

pub use actor::{spawn_synchronizer, SyncHandle};
pub use api::{ChatApi, HttpChatApi};
pub use config::{load_settings, load_settings_from, ClientSettings};
pub use error::{ErrorCategory, SyncError, SyncResult};
pub use push::{PushConnector, WsConnector};
pub use reactions::{ReactionPolicy, ReactionSummary, QUICK_REACTIONS};
pub use session::{login, register, SessionContext};
pub use synchronizer::{
    ChatView, ConnectionState, MessageView, SessionPhase, SyncEvent, Synchronizer,
};
pub use upload::Attachment;
