//! quaderno-core: tipi condivisi tra client e server (modelli, messaggi WS, DTO HTTP, errori).
//! Niente I/O o dipendenze non compatibili con WASM.

pub mod error;
pub mod models;
pub mod protocol;
pub mod utils;

// Re-export utili per ridurre i percorsi nei crate client/server
pub use error::Error;
pub use models::{chat::Chat, message::ChatMessage};
pub use protocol::http::ChatHistoryResponse;
pub use protocol::ws::{
    CheckOnlineStatus, IsOnline, JoinChat, MessageReceived, OnlineStatus, SendMessage, WsMessage,
};
pub use utils::{new_id, now_timestamp};
