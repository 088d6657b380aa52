use serde::{Deserialize, Serialize};

use crate::models::ChatMessage;

/*
    http dto for the chat history endpoint
*/
// GET /api/chat/{userId}/{targetUserId}
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatHistoryResponse {
    pub chat_id: String,
    pub participants: Vec<String>, // due userId, ordinati
    pub messages: Vec<ChatMessage>, // in ordine cronologico di append
    pub created_at: String,
    pub updated_at: String,
}
