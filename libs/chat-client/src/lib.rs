//! Client side of HealthSight chat.
//!
//! - [`transport`]: `append` / `fetch_once` over HTTP.
//! - [`subscription`]: live snapshots over WebSocket.
//! - [`view`]: the optimistic chat view as a pure reducer.
//! - [`session`]: drives a view against a transport.

pub mod error;
pub mod session;
pub mod subscription;
pub mod transport;
pub mod view;

pub use chat_core::{resolve_conversation_key, ChatMessage, ConversationKey, NewMessage};
pub use error::{ClientError, ClientResult};
pub use session::ChatSession;
pub use subscription::{subscribe, ClientSubscription};
pub use transport::{ChatTransport, HttpTransport};
pub use view::{ChatView, OutboxEntry, SendState, ViewAction};
