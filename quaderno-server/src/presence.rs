use std::collections::HashSet;

use dashmap::DashMap;

/// Registro di processo delle connessioni realtime aperte, per rispondere a
/// "questo utente è online?". È un servizio iniettato nello stato (niente
/// singleton di modulo), così i test ne istanziano copie isolate.
///
/// Politica multi-connessione: un utente può avere più connessioni registrate
/// (più tab o dispositivi) e risulta online finché almeno una è aperta.
/// La risposta è puramente indicativa: dice solo che questo processo tiene
/// una connessione aperta per l'utente, non che l'utente sia disponibile.
#[derive(Default)]
pub struct PresenceTracker {
    /// userId -> insieme delle connessioni registrate
    online: DashMap<String, HashSet<String>>,
    /// connId -> userId proprietario, per la rimozione alla disconnessione
    owners: DashMap<String, String>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra la connessione come online per l'utente. Idempotente: una
    /// connessione già registrata sotto lo stesso utente non cambia nulla;
    /// se era registrata sotto un altro utente viene prima spostata.
    pub fn mark_online(&self, user_id: &str, conn_id: &str) {
        if let Some(prev) = self
            .owners
            .insert(conn_id.to_string(), user_id.to_string())
        {
            if prev != user_id {
                self.remove_conn(&prev, conn_id);
            }
        }
        self.online
            .entry(user_id.to_string())
            .or_default()
            .insert(conn_id.to_string());
    }

    /// Rimuove la connessione da qualunque utente la possieda. No-op per una
    /// connessione mai registrata (o già rimossa): le voci degli altri utenti
    /// non vengono toccate.
    pub fn mark_offline(&self, conn_id: &str) {
        if let Some((_, user_id)) = self.owners.remove(conn_id) {
            self.remove_conn(&user_id, conn_id);
        }
    }

    /// Lettura pura, senza effetti collaterali.
    pub fn is_online(&self, user_id: &str) -> bool {
        self.online
            .get(user_id)
            .map(|conns| !conns.is_empty())
            .unwrap_or(false)
    }

    fn remove_conn(&self, user_id: &str, conn_id: &str) {
        let now_empty = match self.online.get_mut(user_id) {
            Some(mut conns) => {
                conns.remove(conn_id);
                conns.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.online.remove_if(user_id, |_, conns| conns.is_empty());
        }
    }
}
