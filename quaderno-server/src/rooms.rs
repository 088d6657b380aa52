use std::collections::HashMap;

use dashmap::DashMap;
use tokio::sync::mpsc::UnboundedSender;

/// Registro delle stanze broadcast: per ogni chat, le connessioni iscritte a
/// ricevere i suoi nuovi messaggi. L'iscrizione è esplicita (niente stato
/// ambient del trasporto) e la disconnessione la smonta in un passo solo.
#[derive(Default)]
pub struct RoomRegistry {
    /// chatId -> { connId -> canale di uscita della connessione }
    rooms: DashMap<String, HashMap<String, UnboundedSender<String>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Iscrive la connessione alla stanza della chat. Entrare in una seconda
    /// stanza non fa uscire dalla prima.
    pub fn join(&self, chat_id: &str, conn_id: &str, tx: UnboundedSender<String>) {
        self.rooms
            .entry(chat_id.to_string())
            .or_default()
            .insert(conn_id.to_string(), tx);
    }

    /// Toglie la connessione da tutte le stanze, in un'unica passata.
    /// Le stanze rimaste vuote vengono eliminate.
    pub fn leave_all(&self, conn_id: &str) {
        self.rooms.retain(|_, members| {
            members.remove(conn_id);
            !members.is_empty()
        });
    }

    /// Consegna il testo a tutti i membri della stanza, mittente incluso.
    /// L'invio verso una connessione ormai chiusa è un no-op: la voce morta
    /// viene eliminata al passaggio.
    pub fn broadcast(&self, chat_id: &str, text: &str) {
        if let Some(mut members) = self.rooms.get_mut(chat_id) {
            members.retain(|_, tx| tx.send(text.to_string()).is_ok());
        }
    }
}
