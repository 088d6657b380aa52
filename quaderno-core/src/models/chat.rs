use serde::{Deserialize, Serialize};

/// Conversazione a due tra utenti, esposta sul wire.
/// I partecipanti sono sempre due e ordinati lessicograficamente:
/// la coppia identifica la chat in modo univoco nel sistema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub chat_id: String,
    pub participants: Vec<String>, // due userId, ordinati
    pub created_at: String,        // RFC3339 UTC
    pub updated_at: String,        // RFC3339 UTC, toccato ad ogni append
}
