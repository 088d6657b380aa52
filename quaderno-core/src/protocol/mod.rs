pub mod http;
pub mod ws;

// Re-export comodi
pub use http::ChatHistoryResponse;
pub use ws::{
    CheckOnlineStatus, IsOnline, JoinChat, MessageReceived, OnlineStatus, SendMessage, WsMessage,
};
