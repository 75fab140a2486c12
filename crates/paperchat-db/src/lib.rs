pub mod chat_store;

pub use chat_store::{ChatStore, Conversation, MessageRow, Sender};
