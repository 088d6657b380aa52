use serde::{Deserialize, Serialize};

/// Messaggio persistito dal server e notificato via WS.
/// `sender_name` è una copia denormalizzata catturata al momento dell'invio:
/// non segue eventuali cambi di nome successivi.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub sender_id: String,
    pub sender_name: String,
    pub text: String,
    pub timestamp: String, // RFC3339 UTC, assegnato dal server
}
