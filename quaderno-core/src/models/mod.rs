pub mod chat;
pub mod message;

// Re-export per comodità
pub use chat::Chat;
pub use message::ChatMessage;
