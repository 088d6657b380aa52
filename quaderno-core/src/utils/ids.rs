use uuid::Uuid;

/// Genera un nuovo identificatore unico (UUIDv4) come stringa.
/// Usato per chatId, messageId e id di connessione.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
