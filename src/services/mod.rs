pub mod chat_service;
pub mod message_store;
pub mod pg_message_store;

pub use chat_service::ChatService;
pub use message_store::{InMemoryMessageStore, MessageStore};
pub use pg_message_store::PgMessageStore;
